// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::policy::{admin_only, super_admin_only},
    handlers::{auth, comments, docs, posts, users},
    middleware::security_headers,
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Versioned API under `/api/v1` (auth, posts, comments, users).
/// * Applies global middleware (Trace, CORS, security headers).
/// * Injects global state (repositories, sanitizer, config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Protected auth routes
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/me", get(auth::me))
                .route("/profile", put(auth::update_profile))
                .route("/change-password", post(auth::change_password))
                .route("/refresh-token", post(auth::refresh_token))
                .layer(require_auth.clone()),
        );

    let post_routes = Router::new()
        .route("/", get(posts::list_posts))
        .route("/{id}", get(posts::get_post))
        .route("/{id}/comments", get(comments::list_comments))
        // Protected post routes
        .merge(
            Router::new()
                .route("/", post(posts::create_post))
                .route("/{id}", put(posts::update_post).delete(posts::delete_post))
                .route("/{id}/comments", post(comments::create_comment))
                .layer(require_auth.clone()),
        );

    let user_routes = Router::new()
        .route("/", get(users::list_users).layer(middleware::from_fn(admin_only)))
        .merge(
            Router::new()
                .route("/promote", post(users::promote_user))
                .route("/demote", post(users::demote_user))
                .route("/assign-superadmin", post(users::assign_super_admin))
                .layer(middleware::from_fn(super_admin_only)),
        )
        // Auth runs first, then the role checks above
        .layer(require_auth);

    let api_v1 = Router::new()
        .nest("/auth", auth_routes)
        .nest("/posts", post_routes)
        .nest("/users", user_routes);

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        // Global Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(state)
}
