// src/models/user.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::sanitize::{GraphWalker, Sanitize};
use crate::utils::password::validate_password_strength;

/// Account role. SuperAdmin is a separate flag on top of `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "User" | "user" => Ok(Role::User),
            "Admin" | "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{other}'")),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub photo: Option<String>,
    pub date_of_birth: Option<NaiveDate>,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    pub role: Role,
    pub super_admin: bool,
    pub email_confirmed: bool,

    /// Consecutive failed logins since the last success.
    pub failed_login_count: i32,
    pub lockout_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| until > now)
    }
}

/// Fields needed to insert a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub photo: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub password_hash: String,
    pub role: Role,
    pub super_admin: bool,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub photo: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub email_confirmed: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            photo: user.photo.clone(),
            date_of_birth: user.date_of_birth,
            email_confirmed: user.email_confirmed,
        }
    }
}

/// Account listing for administrators.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserWithRolesResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email_confirmed: bool,
    pub roles: Vec<String>,
    pub super_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserWithRolesResponse {
    fn from(user: &User) -> Self {
        UserWithRolesResponse {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email_confirmed: user.email_confirmed,
            roles: vec![user.role.to_string()],
            super_admin: user.super_admin,
            created_at: user.created_at,
        }
    }
}

/// Returned after a successful login or token refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: DateTime<Utc>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be a valid email address."))]
    pub email: String,

    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    #[validate(
        length(
            min = 7,
            max = 100,
            message = "Password length must be between 7 and 100 characters."
        ),
        custom(function = validate_password_strength)
    )]
    pub password: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "First name must be between 1 and 100 characters."
    ))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Last name cannot exceed 100 characters."))]
    pub last_name: Option<String>,

    #[validate(
        length(max = 500, message = "Photo URL cannot exceed 500 characters."),
        custom(function = validate_photo_url)
    )]
    pub photo: Option<String>,

    pub date_of_birth: Option<NaiveDate>,
}

// The password is a credential, not display text; it is hashed as typed.
impl Sanitize for RegisterRequest {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.text(&mut self.email);
        walker.text(&mut self.username);
        walker.text(&mut self.first_name);
        walker.optional_text(&mut self.last_name);
        walker.optional_text(&mut self.photo);
    }
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 256, message = "Email or username is required."))]
    pub email_or_username: String,
    #[validate(length(min = 1, max = 128, message = "Password is required."))]
    pub password: String,
}

impl Sanitize for LoginRequest {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.text(&mut self.email_or_username);
    }
}

/// Partial profile update. `None` leaves the stored value alone.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserProfileRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "First name must be between 1 and 100 characters."
    ))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name cannot exceed 100 characters."))]
    pub last_name: Option<String>,

    #[validate(
        length(max = 500, message = "Photo URL cannot exceed 500 characters."),
        custom(function = validate_photo_url)
    )]
    pub photo: Option<String>,

    pub date_of_birth: Option<NaiveDate>,
}

impl Sanitize for UpdateUserProfileRequest {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>) {
        walker.optional_text(&mut self.first_name);
        walker.optional_text(&mut self.last_name);
        walker.optional_text(&mut self.photo);
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required."))]
    pub current_password: String,

    #[validate(
        length(
            min = 7,
            max = 100,
            message = "Password length must be between 7 and 100 characters."
        ),
        custom(function = validate_password_strength)
    )]
    pub new_password: String,
}

/// Target of a promote/demote/assign-superadmin call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ManageUserRoleRequest {
    pub user_id: Uuid,
}

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    /// 'Admin', 'User', or absent for everyone.
    pub role: Option<String>,
}

/// Photos must be absolute `http`/`https` URLs.
fn validate_photo_url(photo: &str) -> Result<(), validator::ValidationError> {
    match Url::parse(photo) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_url")
            .with_message("Photo must be an http(s) URL.".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::InputSanitizer;

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            email: "john@example.com".to_string(),
            username: "johndoe".to_string(),
            password: "Secret#123".to_string(),
            first_name: "John".to_string(),
            last_name: None,
            photo: None,
            date_of_birth: None,
        }
    }

    #[test]
    fn register_request_is_sanitized_except_password() {
        let mut request = RegisterRequest {
            first_name: "John<script>alert(1)</script>".to_string(),
            last_name: Some("<b>Doe</b>".to_string()),
            password: "<b>pass</b>1#a".to_string(),
            ..register_request()
        };

        InputSanitizer::default().sanitize_object(&mut request).unwrap();

        assert_eq!(request.first_name, "John");
        assert_eq!(request.last_name.as_deref(), Some("Doe"));
        assert_eq!(request.password, "<b>pass</b>1#a");
    }

    #[test]
    fn register_request_validation() {
        assert!(register_request().validate().is_ok());

        let short_username = RegisterRequest {
            username: "jo".to_string(),
            ..register_request()
        };
        assert!(short_username.validate().is_err());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..register_request()
        };
        assert!(bad_email.validate().is_err());

        let weak_password = RegisterRequest {
            password: "password".to_string(),
            ..register_request()
        };
        assert!(weak_password.validate().is_err());

        let javascript_photo = RegisterRequest {
            photo: Some("javascript:alert(1)".to_string()),
            ..register_request()
        };
        assert!(javascript_photo.validate().is_err());

        let https_photo = RegisterRequest {
            photo: Some("https://cdn.example.com/me.png".to_string()),
            ..register_request()
        };
        assert!(https_photo.validate().is_ok());
    }

    #[test]
    fn role_parses_both_cases() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
    }
}
