use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::posts::{find_post, post_not_found},
    models::comment::{Comment, CreateCommentRequest, NewComment},
    sanitize::InputSanitizer,
    store::{Repositories, StoreError},
    utils::jwt::Claims,
};

/// Comments of a post, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/comments",
    tag = "comments",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "No such post")
    )
)]
pub async fn list_comments(
    State(repos): State<Repositories>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    find_post(&repos, post_id).await?;
    let comments = repos.comments.list_for_post(post_id).await?;
    Ok(Json(comments))
}

/// Adds a comment to a post.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/comments",
    tag = "comments",
    params(("id" = i64, Path, description = "Post id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 404, description = "No such post")
    )
)]
pub async fn create_comment(
    State(repos): State<Repositories>,
    State(sanitizer): State<InputSanitizer>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(mut payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    sanitizer.sanitize_object(&mut payload)?;
    payload.validate()?;

    let comment = repos
        .comments
        .create(NewComment {
            post_id,
            commenter_id: claims.user_id()?,
            content: payload.content,
        })
        .await
        .map_err(|e| match e {
            StoreError::NotFound => post_not_found(post_id),
            other => AppError::from(other),
        })?;

    tracing::info!(comment_id = comment.id, post_id, "comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}
