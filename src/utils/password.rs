//! Password strength rules: at least one digit, one lowercase letter and one
//! non-alphanumeric character. Length is checked by the DTO.

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").unwrap());
static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Ll}").unwrap());
static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]").unwrap());

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let failure = if !DIGIT.is_match(password) {
        Some("Password must contain at least one digit.")
    } else if !LOWERCASE.is_match(password) {
        Some("Password must contain at least one lowercase letter.")
    } else if !NON_ALPHANUMERIC.is_match(password) {
        Some("Password must contain at least one non-alphanumeric character.")
    } else {
        None
    };

    match failure {
        Some(message) => Err(ValidationError::new("weak_password").with_message(message.into())),
        None => Ok(()),
    }
}
