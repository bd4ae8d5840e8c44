//! OpenAPI document served at `/api-docs/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use super::{auth, comments, posts, users};
use crate::models::{
    comment::{Comment, CreateCommentRequest},
    post::{CreatePostRequest, PostResponse, UpdatePostRequest},
    user::{
        AuthResponse, ChangePasswordRequest, LoginRequest, ManageUserRoleRequest,
        RegisterRequest, Role, UpdateUserProfileRequest, UserResponse, UserWithRolesResponse,
    },
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Bloggit API", version = "1.0"),
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        auth::update_profile,
        auth::change_password,
        auth::refresh_token,
        posts::list_posts,
        posts::get_post,
        posts::create_post,
        posts::update_post,
        posts::delete_post,
        comments::list_comments,
        comments::create_comment,
        users::list_users,
        users::promote_user,
        users::demote_user,
        users::assign_super_admin,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        UpdateUserProfileRequest,
        ChangePasswordRequest,
        ManageUserRoleRequest,
        UserResponse,
        UserWithRolesResponse,
        AuthResponse,
        Role,
        CreatePostRequest,
        UpdatePostRequest,
        PostResponse,
        Comment,
        CreateCommentRequest,
    )),
    tags(
        (name = "auth", description = "Registration, login and profile"),
        (name = "posts", description = "Blog posts"),
        (name = "comments", description = "Comments on posts"),
        (name = "users", description = "Role administration")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
