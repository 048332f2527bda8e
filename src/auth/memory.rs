use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::UserDirectory;
use crate::auth::repo_types::{NewUser, PendingVerification, ProfileUpdate, User};

/// Process-local directory used when no database is configured, and in tests.
/// Every mutation happens under a single write lock.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate<F>(&self, id: Uuid, f: F) -> Option<User>
    where
        F: FnOnce(&mut User) -> bool,
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id)?;
        if !f(user) {
            return None;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Some(user.clone())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_if_absent(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let (token, expires) = match new.verification {
            Some(p) => (Some(p.token), Some(p.expires_at)),
            None => (None, None),
        };
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            username: new.username,
            bio: new.bio,
            location: new.location,
            expertise: new.expertise,
            is_email_verified: new.is_email_verified,
            email_verification_token: token,
            email_verification_expires: expires,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        let found = users.values_mut().find(|u| {
            u.email_verification_token.as_deref() == Some(token)
                && u.email_verification_expires.is_some_and(|exp| exp > now)
        });
        Ok(found.map(|u| {
            u.is_email_verified = true;
            u.email_verification_token = None;
            u.email_verification_expires = None;
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn set_pending_verification(
        &self,
        id: Uuid,
        pending: PendingVerification,
    ) -> anyhow::Result<Option<User>> {
        Ok(self
            .mutate(id, |u| {
                if u.is_email_verified {
                    return false;
                }
                u.email_verification_token = Some(pending.token);
                u.email_verification_expires = Some(pending.expires_at);
                true
            })
            .await)
    }

    async fn mark_email_verified(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .mutate(id, |u| {
                u.is_email_verified = true;
                u.email_verification_token = None;
                u.email_verification_expires = None;
                true
            })
            .await)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        self.mutate(id, |u| {
            u.password_hash = password_hash.to_string();
            true
        })
        .await;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> anyhow::Result<Option<User>> {
        Ok(self
            .mutate(id, |u| {
                if let Some(username) = update.username {
                    u.username = username;
                }
                if let Some(bio) = update.bio {
                    u.bio = Some(bio);
                }
                if let Some(location) = update.location {
                    u.location = Some(location);
                }
                if let Some(expertise) = update.expertise {
                    u.expertise = expertise;
                }
                true
            })
            .await)
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> anyhow::Result<Option<User>> {
        Ok(self
            .mutate(id, |u| {
                u.is_admin = is_admin;
                true
            })
            .await)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}
