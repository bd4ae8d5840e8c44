// src/config.rs

use std::env;
use std::fmt;

use dotenvy::dotenv;

/// Minimum HS256 key length in bytes.
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt: JwtSettings,
    /// Whether the auth cookie is marked `Secure`.
    pub cookie_secure: bool,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub rust_log: String,
    pub superadmin: Option<SuperAdminSeed>,
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expiration_hours: i64,
    /// Tokens expiring within this window may be refreshed.
    pub refresh_threshold_hours: i64,
}

/// Credentials for the account created at startup when none exists.
#[derive(Clone)]
pub struct SuperAdminSeed {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SuperAdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperAdminSeed")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
            ConfigError::Invalid { key, reason } => write!(f, "{key} is invalid: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = optional("DATABASE_URL");

        let secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let jwt = JwtSettings {
            secret,
            issuer: optional("JWT_ISSUER").unwrap_or_else(|| "bloggit".to_string()),
            audience: optional("JWT_AUDIENCE").unwrap_or_else(|| "bloggit-clients".to_string()),
            expiration_hours: parsed("JWT_EXPIRATION_HOURS", 24)?,
            refresh_threshold_hours: parsed("JWT_REFRESH_THRESHOLD_HOURS", 1)?,
        };

        let cookie_secure = parsed("COOKIE_SECURE", true)?;

        let bind_addr = optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let cors_origins = optional("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let rust_log = optional("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let superadmin = match (
            optional("SUPERADMIN_EMAIL"),
            optional("SUPERADMIN_USERNAME"),
            optional("SUPERADMIN_PASSWORD"),
        ) {
            (Some(email), Some(username), Some(password)) => Some(SuperAdminSeed {
                email,
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            cookie_secure,
            bind_addr,
            cors_origins,
            rust_log,
            superadmin,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}
