use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    auth::can_modify_post,
    error::AppError,
    models::post::{CreatePostRequest, Post, PostResponse, UpdatePostRequest},
    sanitize::InputSanitizer,
    store::Repositories,
    utils::jwt::Claims,
};

pub(crate) fn post_not_found(id: i64) -> AppError {
    AppError::NotFound(format!(
        "The post with id = {id} has been removed or not found in the server"
    ))
}

pub(crate) async fn find_post(repos: &Repositories, id: i64) -> Result<Post, AppError> {
    repos.posts.find(id).await?.ok_or_else(|| post_not_found(id))
}

/// List posts (Recent first).
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "posts",
    responses((status = 200, description = "All posts, newest first", body = [PostResponse]))
)]
pub async fn list_posts(State(repos): State<Repositories>) -> Result<impl IntoResponse, AppError> {
    let posts: Vec<PostResponse> = repos
        .posts
        .list()
        .await?
        .into_iter()
        .map(PostResponse::from)
        .collect();

    Ok(Json(posts))
}

/// Get a single post by ID.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "The post", body = PostResponse),
        (status = 404, description = "No such post")
    )
)]
pub async fn get_post(
    State(repos): State<Repositories>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = find_post(&repos, id).await?;
    Ok(Json(PostResponse::from(post)))
}

/// Create a new post.
/// Requires: Login. The author is taken from the token.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_post(
    State(repos): State<Repositories>,
    State(sanitizer): State<InputSanitizer>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Sanitize, then validate what will actually be stored
    sanitizer.sanitize_object(&mut payload)?;
    payload.validate()?;

    // 2. Insert Post
    let author_id = claims.user_id()?;
    let post = repos.posts.create(payload.into_new_post(author_id)).await?;

    tracing::info!(post_id = post.id, user_id = %author_id, "post created");

    let location = format!("/api/v1/posts/{}", post.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(PostResponse::from(post)),
    ))
}

/// Update a post.
/// Requires: Login + (Author OR Admin). A missing post is reported before
/// any permission check.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 403, description = "Not the author or an admin"),
        (status = 404, description = "No such post")
    )
)]
pub async fn update_post(
    State(repos): State<Repositories>,
    State(sanitizer): State<InputSanitizer>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(mut payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    sanitizer.sanitize_object(&mut payload)?;
    payload.validate()?;

    let mut post = find_post(&repos, id).await?;

    if !can_modify_post(&claims, &post) {
        tracing::warn!(
            user_id = %claims.sub,
            post_id = id,
            author_id = %post.author_id,
            "update of another user's post refused"
        );
        return Err(AppError::Forbidden(
            "You are not authorized to update this post".to_string(),
        ));
    }

    payload.apply_to(&mut post, Utc::now());
    repos.posts.update(&post).await?;

    tracing::info!(post_id = id, user_id = %claims.sub, "post updated");
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a post and its comments.
/// Requires: Login + (Author OR Admin).
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author or an admin"),
        (status = 404, description = "No such post")
    )
)]
pub async fn delete_post(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Fetch Post to check ownership
    let post = find_post(&repos, id).await?;

    // 2. Check Permission
    if !can_modify_post(&claims, &post) {
        tracing::warn!(
            user_id = %claims.sub,
            post_id = id,
            author_id = %post.author_id,
            "deletion of another user's post refused"
        );
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    // 3. Delete
    if !repos.posts.delete(id).await? {
        return Err(post_not_found(id));
    }

    let deleted_by = if claims.is_admin() { "admin" } else { "author" };
    tracing::info!(post_id = id, user_id = %claims.sub, deleted_by, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}
