// src/auth/policy.rs

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::{error::AppError, models::post::Post, utils::jwt::Claims};

/// Named authorization policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Role `Admin`.
    AdminOnly,
    /// The `super_admin` claim.
    SuperAdminOnly,
}

impl Policy {
    pub fn allows(&self, claims: &Claims) -> bool {
        match self {
            Policy::AdminOnly => claims.is_admin(),
            Policy::SuperAdminOnly => claims.super_admin,
        }
    }

    pub fn check(&self, claims: &Claims) -> Result<(), AppError> {
        if self.allows(claims) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}

/// Admins may modify any post; everyone else only their own.
pub fn can_modify_post(claims: &Claims, post: &Post) -> bool {
    claims.is_admin() || claims.sub == post.author_id.to_string()
}

async fn enforce(policy: Policy, req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    policy.check(claims)?;
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`.
pub async fn admin_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    enforce(Policy::AdminOnly, req, next).await
}

/// Axum Middleware: SuperAdmin Authorization.
///
/// Must be used AFTER `auth_middleware`.
pub async fn super_admin_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    enforce(Policy::SuperAdminOnly, req, next).await
}
