// src/utils/jwt.rs

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{Config, JwtSettings},
    error::AppError,
    models::user::{Role, User},
};

/// Name of the cookie carrying the JWT.
pub const AUTH_COOKIE: &str = "AuthToken";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID.
    pub sub: String,
    /// Username.
    pub name: String,
    pub email: String,
    pub first_name: String,
    pub role: Role,
    /// Set for accounts allowed to manage roles.
    #[serde(default)]
    pub super_admin: bool,
    /// Unique token id.
    pub jti: String,
    pub iss: String,
    pub aud: String,
    /// Expiration time as Unix timestamp.
    pub exp: i64,
    /// Issued-at time as Unix timestamp.
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Whether the token expires within `threshold_hours` of `now`.
    pub fn is_expiring_soon(&self, threshold_hours: i64, now: DateTime<Utc>) -> bool {
        self.expires_at() - now <= Duration::hours(threshold_hours)
    }
}

/// A freshly signed token and the moment it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs a new HS256 JWT for the user.
pub fn sign_jwt(user: &User, settings: &JwtSettings) -> Result<IssuedToken, AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(settings.expiration_hours);

    let claims = Claims {
        sub: user.id.to_string(),
        name: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        role: user.role,
        super_admin: user.super_admin,
        jti: Uuid::new_v4().to_string(),
        iss: settings.issuer.clone(),
        aud: settings.audience.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(IssuedToken { token, expires_at })
}

/// Verifies signature, issuer, audience and expiry (no leeway).
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, settings: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[settings.issuer.as_str()]);
    validation.set_audience(&[settings.audience.as_str()]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Reads the token from the `AuthToken` cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie_str| {
            Cookie::split_parse(cookie_str)
                .filter_map(|c| c.ok())
                .find(|c| c.name() == AUTH_COOKIE && !c.value().is_empty())
                .map(|c| c.value().to_string())
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// HttpOnly, SameSite=Strict cookie holding the token for its whole lifetime.
pub fn auth_cookie(token: &str, lifetime_hours: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token.to_owned()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(cookie::time::Duration::hours(lifetime_hours))
        .build()
}

/// Expired, empty `AuthToken` cookie instructing the browser to drop it.
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(cookie::time::Duration::ZERO)
        .build()
}

/// Axum Middleware: Authentication.
///
/// Validates the token from the cookie or bearer header. If valid, injects
/// `Claims` into the request extensions for handlers to use. Otherwise 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = token_from_headers(req.headers())
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    let claims = verify_jwt(&token, &config.jwt)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn settings() -> JwtSettings {
        JwtSettings {
            secret: "a-test-secret-that-is-at-least-32-bytes".to_string(),
            issuer: "bloggit".to_string(),
            audience: "bloggit-clients".to_string(),
            expiration_hours: 24,
            refresh_threshold_hours: 1,
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "john@example.com".to_string(),
            username: "johndoe".to_string(),
            first_name: "John".to_string(),
            last_name: None,
            photo: None,
            date_of_birth: None,
            password_hash: String::new(),
            role: Role::Admin,
            super_admin: true,
            email_confirmed: true,
            failed_login_count: 0,
            lockout_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn signed_token_round_trips_claims() {
        let user = user();
        let issued = sign_jwt(&user, &settings()).unwrap();

        let claims = verify_jwt(&issued.token, &settings()).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.name, "johndoe");
        assert!(claims.is_admin());
        assert!(claims.super_admin);
        assert_eq!(claims.expires_at(), DateTime::from_timestamp(issued.expires_at.timestamp(), 0).unwrap());
    }

    #[test]
    fn wrong_audience_or_secret_is_rejected() {
        let issued = sign_jwt(&user(), &settings()).unwrap();

        let other_audience = JwtSettings {
            audience: "someone-else".to_string(),
            ..settings()
        };
        assert!(verify_jwt(&issued.token, &other_audience).is_err());

        let other_secret = JwtSettings {
            secret: "another-secret-that-is-at-least-32-bytes".to_string(),
            ..settings()
        };
        assert!(verify_jwt(&issued.token, &other_secret).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = JwtSettings {
            expiration_hours: -1,
            ..settings()
        };
        let issued = sign_jwt(&user(), &expired).unwrap();

        assert!(verify_jwt(&issued.token, &settings()).is_err());
    }

    #[test]
    fn expiring_soon_uses_the_threshold() {
        let issued = sign_jwt(&user(), &settings()).unwrap();
        let claims = verify_jwt(&issued.token, &settings()).unwrap();
        let now = Utc::now();

        assert!(!claims.is_expiring_soon(1, now));
        assert!(claims.is_expiring_soon(1, now + Duration::hours(23) + Duration::minutes(30)));
    }

    #[test]
    fn token_is_read_from_cookie_before_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; AuthToken=from-cookie"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn auth_cookie_attributes() {
        let cookie = auth_cookie("tok", 24, true).to_string();

        assert!(cookie.starts_with("AuthToken=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=86400"));

        let removal = removal_cookie(false).to_string();
        assert!(removal.contains("Max-Age=0"));
        assert!(!removal.contains("Secure"));
    }
}
