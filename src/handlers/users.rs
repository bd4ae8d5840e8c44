use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::user::{ManageUserRoleRequest, Role, User, UserListParams, UserWithRolesResponse},
    store::Repositories,
    utils::jwt::Claims,
};

async fn find_user(repos: &Repositories, request: &ManageUserRoleRequest) -> Result<User, AppError> {
    repos
        .users
        .find_by_id(request.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(user_id = %request.user_id, "user not found");
            AppError::NotFound("User not found".to_string())
        })
}

/// All users with their roles, optionally filtered by role.
/// Requires: Admin.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(("role" = Option<String>, Query, description = "'Admin' or 'User'")),
    responses(
        (status = 200, description = "Users", body = [UserWithRolesResponse]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    State(repos): State<Repositories>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let role = match params.role.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<Role>().map_err(AppError::BadRequest)?),
    };

    let users: Vec<UserWithRolesResponse> = repos
        .users
        .list(role)
        .await?
        .iter()
        .map(UserWithRolesResponse::from)
        .collect();

    tracing::info!(
        count = users.len(),
        role = role.map(|r| r.as_str()).unwrap_or("All"),
        "users listed"
    );
    Ok(Json(users))
}

/// Promote a user to Admin.
/// Requires: SuperAdmin.
#[utoipa::path(
    post,
    path = "/api/v1/users/promote",
    tag = "users",
    request_body = ManageUserRoleRequest,
    responses(
        (status = 200, description = "Promoted"),
        (status = 400, description = "Already an admin"),
        (status = 404, description = "No such user")
    )
)]
pub async fn promote_user(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ManageUserRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = find_user(&repos, &payload).await?;

    if user.is_admin() {
        return Err(AppError::BadRequest("User is already an Admin".to_string()));
    }

    user.role = Role::Admin;
    repos.users.update(&user).await?;

    tracing::info!(user_id = %user.id, by = %claims.sub, "user promoted to Admin");
    Ok(Json(json!({
        "message": format!("User {} promoted to Admin successfully", user.username)
    })))
}

/// Demote an Admin back to User. SuperAdmins cannot be demoted.
/// Requires: SuperAdmin.
#[utoipa::path(
    post,
    path = "/api/v1/users/demote",
    tag = "users",
    request_body = ManageUserRoleRequest,
    responses(
        (status = 200, description = "Demoted"),
        (status = 400, description = "Not an admin, or a SuperAdmin"),
        (status = 404, description = "No such user")
    )
)]
pub async fn demote_user(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ManageUserRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = find_user(&repos, &payload).await?;

    if !user.is_admin() {
        return Err(AppError::BadRequest("User is not an Admin".to_string()));
    }
    if user.super_admin {
        tracing::warn!(user_id = %user.id, "refused to demote SuperAdmin");
        return Err(AppError::BadRequest(
            "SuperAdmin users cannot be demoted".to_string(),
        ));
    }

    user.role = Role::User;
    repos.users.update(&user).await?;

    tracing::info!(user_id = %user.id, by = %claims.sub, "user demoted from Admin");
    Ok(Json(json!({
        "message": format!("User {} demoted from Admin successfully", user.username)
    })))
}

/// Grant SuperAdmin (and the Admin role with it).
/// Requires: SuperAdmin.
#[utoipa::path(
    post,
    path = "/api/v1/users/assign-superadmin",
    tag = "users",
    request_body = ManageUserRoleRequest,
    responses(
        (status = 200, description = "SuperAdmin assigned"),
        (status = 400, description = "Already a SuperAdmin"),
        (status = 404, description = "No such user")
    )
)]
pub async fn assign_super_admin(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ManageUserRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = find_user(&repos, &payload).await?;

    if user.super_admin {
        return Err(AppError::BadRequest(
            "User already has SuperAdmin privileges".to_string(),
        ));
    }

    user.super_admin = true;
    user.role = Role::Admin;
    repos.users.update(&user).await?;

    tracing::info!(user_id = %user.id, by = %claims.sub, "SuperAdmin assigned");
    Ok(Json(json!({
        "message": format!("SuperAdmin privileges assigned to {} successfully", user.username)
    })))
}
