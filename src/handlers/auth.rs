// src/handlers/auth.rs

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{
        AuthResponse, ChangePasswordRequest, LoginRequest, NewUser, RegisterRequest, Role,
        UpdateUserProfileRequest, User, UserResponse,
    },
    sanitize::InputSanitizer,
    store::{Repositories, StoreError},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, auth_cookie, removal_cookie, sign_jwt},
    },
};

/// Failed logins in a row before the account is locked.
pub const MAX_FAILED_LOGINS: i32 = 5;
/// How long a locked account stays locked.
pub const LOCKOUT_MINUTES: i64 = 5;

const INVALID_CREDENTIALS: &str = "Invalid email/username or password";
const ACCOUNT_LOCKED: &str = "Account locked due to multiple failed login attempts";

/// Registers a new user.
///
/// The payload is sanitized, then validated. New accounts get the `User` role
/// and are confirmed immediately.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registration successful"),
        (status = 400, description = "Validation failed or email/username taken")
    )
)]
pub async fn register(
    State(repos): State<Repositories>,
    State(sanitizer): State<InputSanitizer>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    sanitizer.sanitize_object(&mut payload)?;
    payload.validate()?;

    if repos.users.find_by_email(&payload.email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }
    if repos.users.find_by_username(&payload.username).await?.is_some() {
        return Err(AppError::BadRequest("Username already taken".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = repos
        .users
        .create(NewUser {
            email: payload.email,
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            photo: payload.photo,
            date_of_birth: payload.date_of_birth,
            password_hash,
            role: Role::User,
            super_admin: false,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict("username") => {
                AppError::BadRequest("Username already taken".to_string())
            }
            StoreError::Conflict(_) => {
                AppError::BadRequest("Email already registered".to_string())
            }
            other => {
                tracing::error!("Failed to register user: {}", other);
                AppError::from(other)
            }
        })?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok(Json(json!({
        "message": "Registration successful. You can now log in."
    })))
}

/// Authenticates a user and sets the `AuthToken` cookie.
///
/// Five consecutive failures lock the account for five minutes.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials or account locked")
    )
)]
pub async fn login(
    State(repos): State<Repositories>,
    State(sanitizer): State<InputSanitizer>,
    State(config): State<Config>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    sanitizer.sanitize_object(&mut payload)?;
    payload.validate()?;

    let mut user = repos
        .users
        .find_by_email_or_username(&payload.email_or_username)
        .await?
        .ok_or_else(|| AppError::AuthError(INVALID_CREDENTIALS.to_string()))?;

    let now = Utc::now();
    if user.is_locked_out(now) {
        tracing::warn!(user_id = %user.id, "login attempt on locked account");
        return Err(AppError::AuthError(ACCOUNT_LOCKED.to_string()));
    }

    if !verify_password(&payload.password, &user.password_hash)? {
        user.failed_login_count += 1;
        let locked = user.failed_login_count >= MAX_FAILED_LOGINS;
        if locked {
            user.failed_login_count = 0;
            user.lockout_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
            tracing::warn!(user_id = %user.id, "account locked after failed logins");
        }
        repos.users.update(&user).await?;

        let message = if locked { ACCOUNT_LOCKED } else { INVALID_CREDENTIALS };
        return Err(AppError::AuthError(message.to_string()));
    }

    if user.failed_login_count != 0 || user.lockout_until.is_some() {
        user.failed_login_count = 0;
        user.lockout_until = None;
        user = repos.users.update(&user).await?;
    }

    tracing::info!(user_id = %user.id, "user logged in");
    issue_session(&user, &config)
}

/// Clears the auth cookie.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    tracing::info!(user_id = %claims.sub, "user logged out");

    (
        [(
            header::SET_COOKIE,
            removal_cookie(config.cookie_secure).to_string(),
        )],
        Json(json!({ "message": "Logged out successfully" })),
    )
}

/// Returns the current user's profile.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&repos, &claims).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Updates profile fields. Absent fields are left unchanged.
#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    tag = "auth",
    request_body = UpdateUserProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_profile(
    State(repos): State<Repositories>,
    State(sanitizer): State<InputSanitizer>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<UpdateUserProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    sanitizer.sanitize_object(&mut payload)?;
    payload.validate()?;

    let mut user = current_user(&repos, &claims).await?;

    if let Some(first_name) = payload.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        user.last_name = Some(last_name);
    }
    if let Some(photo) = payload.photo {
        user.photo = Some(photo);
    }
    if let Some(date_of_birth) = payload.date_of_birth {
        user.date_of_birth = Some(date_of_birth);
    }

    let user = repos.users.update(&user).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Changes the password after checking the current one.
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password")
    )
)]
pub async fn change_password(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut user = current_user(&repos, &claims).await?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest(
            "Password change failed: current password is incorrect".to_string(),
        ));
    }

    user.password_hash = hash_password(&payload.new_password)?;
    repos.users.update(&user).await?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// Issues a new token when the presented one expires within the refresh
/// threshold.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh-token",
    tag = "auth",
    responses(
        (status = 200, description = "New token, or confirmation that the current one is still valid")
    )
)]
pub async fn refresh_token(
    State(repos): State<Repositories>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    if !claims.is_expiring_soon(config.jwt.refresh_threshold_hours, Utc::now()) {
        return Ok(Json(json!({ "message": "Token is still valid" })).into_response());
    }

    let user = current_user(&repos, &claims).await?;
    tracing::info!(user_id = %user.id, "token refreshed");
    Ok(issue_session(&user, &config)?.into_response())
}

async fn current_user(repos: &Repositories, claims: &Claims) -> Result<User, AppError> {
    repos
        .users
        .find_by_id(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Signs a token for `user` and returns it both as cookie and body.
fn issue_session(user: &User, config: &Config) -> Result<Response, AppError> {
    let issued = sign_jwt(user, &config.jwt)?;
    let cookie = auth_cookie(
        &issued.token,
        config.jwt.expiration_hours,
        config.cookie_secure,
    );

    let body = AuthResponse {
        token: issued.token,
        user: UserResponse::from(user),
        expires_at: issued.expires_at,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(body),
    )
        .into_response())
}
