use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub username: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub expertise: Vec<String>,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expires: Option<OffsetDateTime>,
    pub is_admin: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A pending verification: token and expiry always travel together.
#[derive(Debug, Clone)]
pub struct PendingVerification {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub expertise: Vec<String>,
    pub is_email_verified: bool,
    pub verification: Option<PendingVerification>,
}

/// Partial profile update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub expertise: Option<Vec<String>>,
}

/// Public part of the user returned to clients. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub expertise: Vec<String>,
    pub is_email_verified: bool,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            username: u.username.clone(),
            bio: u.bio.clone(),
            location: u.location.clone(),
            expertise: u.expertise.clone(),
            is_email_verified: u.is_email_verified,
            is_admin: u.is_admin,
            created_at: u.created_at,
        }
    }
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self::from(&u)
    }
}
