use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::repo_types::UserView;
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 3;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub expertise: Vec<String>,
}

impl RegisterRequest {
    /// Trims the email and rejects malformed input before any service call.
    pub fn validate(&mut self) -> AppResult<()> {
        self.email = self.email.trim().to_string();
        self.username = self.username.trim().to_string();
        if !is_valid_email(&self.email) {
            return Err(AppError::Validation("Invalid email".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(AppError::Validation(format!(
                "Username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminStatusRequest {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Response returned after login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

/// Response returned after refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str, password: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            username: username.into(),
            bio: None,
            location: None,
            expertise: vec![],
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("alice example@x.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn register_validation() {
        let mut ok = req("  Alice@Example.com ", "secret1", "alice");
        ok.validate().expect("valid request");
        assert_eq!(ok.email, "Alice@Example.com");

        assert!(matches!(
            req("bad", "secret1", "alice").validate(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            req("a@b.io", "short", "alice").validate(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            req("a@b.io", "secret1", "al").validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn refresh_request_uses_camel_case() {
        let r: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(r.refresh_token, "abc");
        let s: SetAdminStatusRequest = serde_json::from_str(r#"{"isAdmin":true}"#).unwrap();
        assert!(s.is_admin);
    }
}
