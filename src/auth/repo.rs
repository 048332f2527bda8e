use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, PendingVerification, ProfileUpdate, User};

/// Persistence seam for user records.
///
/// Implementations must make `insert_if_absent` and `consume_verification_token`
/// atomic: two concurrent callers can never both insert the same email or both
/// consume the same token.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Returns `None` when the email is already taken.
    async fn insert_if_absent(&self, user: NewUser) -> anyhow::Result<Option<User>>;
    /// Finds the user holding `token` with an expiry strictly after `now`,
    /// marks it verified and clears the pending verification.
    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;
    /// Replaces any pending verification of an unverified user.
    async fn set_pending_verification(
        &self,
        id: Uuid,
        pending: PendingVerification,
    ) -> anyhow::Result<Option<User>>;
    async fn mark_email_verified(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<Option<User>>;
    async fn set_admin(&self, id: Uuid, is_admin: bool) -> anyhow::Result<Option<User>>;
    async fn list_all(&self) -> anyhow::Result<Vec<User>>;
}

const USER_COLUMNS: &str = "id, email, password_hash, username, bio, location, expertise, \
     is_email_verified, email_verification_token, email_verification_expires, \
     is_admin, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn insert_if_absent(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let (token, expires) = match user.verification {
            Some(p) => (Some(p.token), Some(p.expires_at)),
            None => (None, None),
        };
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, username, bio, location, expertise,
                               is_email_verified, email_verification_token, email_verification_expires)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.username)
        .bind(&user.bio)
        .bind(&user.location)
        .bind(&user.expertise)
        .bind(user.is_email_verified)
        .bind(token)
        .bind(expires)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(created)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET is_email_verified = TRUE,
                   email_verification_token = NULL,
                   email_verification_expires = NULL,
                   updated_at = NOW()
             WHERE email_verification_token = $1
               AND email_verification_expires > $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("consume verification token")?;
        Ok(user)
    }

    async fn set_pending_verification(
        &self,
        id: Uuid,
        pending: PendingVerification,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email_verification_token = $2,
                   email_verification_expires = $3,
                   updated_at = NOW()
             WHERE id = $1 AND is_email_verified = FALSE
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&pending.token)
        .bind(pending.expires_at)
        .fetch_optional(&self.db)
        .await
        .context("set pending verification")?;
        Ok(user)
    }

    async fn mark_email_verified(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET is_email_verified = TRUE,
                   email_verification_token = NULL,
                   email_verification_expires = NULL,
                   updated_at = NOW()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("mark email verified")?;
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password hash")?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   bio = COALESCE($3, bio),
                   location = COALESCE($4, location),
                   expertise = COALESCE($5, expertise),
                   updated_at = NOW()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.username)
        .bind(update.bio)
        .bind(update.location)
        .bind(update.expertise)
        .fetch_optional(&self.db)
        .await
        .context("update profile")?;
        Ok(user)
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_admin)
        .fetch_optional(&self.db)
        .await
        .context("set admin flag")?;
        Ok(user)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }
}
