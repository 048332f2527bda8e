use rand::{distributions::Uniform, rngs::OsRng, Rng, RngCore};
use tracing::{error, info, instrument};

use crate::auth::google::GoogleProfile;
use crate::auth::password::hash_password;
use crate::auth::repo_types::{NewUser, User};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 4;

/// Lowercased name parts plus a short random suffix. Reduces collisions, does not prevent them.
pub(crate) fn generate_username(first_name: &str, last_name: &str) -> String {
    let base: String = format!("{first_name}{last_name}")
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    let base = if base.is_empty() { "user".to_string() } else { base };
    let suffix: String = OsRng
        .sample_iter(Uniform::from(0..BASE36.len()))
        .take(SUFFIX_LEN)
        .map(|i| BASE36[i] as char)
        .collect();
    format!("{base}{suffix}")
}

fn random_password() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Finds the account for a Google identity or creates it. Always returns a
/// verified account; repeated calls with the same email resolve to the same id.
#[instrument(skip(state, profile), fields(email = %profile.email))]
pub async fn resolve_or_create(state: &AppState, profile: &GoogleProfile) -> AppResult<User> {
    if let Some(existing) = state.directory.find_by_email(&profile.email).await? {
        return ensure_verified(state, existing).await;
    }

    let password_hash = hash_password(&random_password())?;
    let created = state
        .directory
        .insert_if_absent(NewUser {
            email: profile.email.clone(),
            password_hash,
            username: generate_username(&profile.first_name, &profile.last_name),
            bio: None,
            location: None,
            expertise: vec![],
            is_email_verified: true,
            verification: None,
        })
        .await?;

    match created {
        Some(user) => {
            info!(user_id = %user.id, "user created from google profile");
            Ok(user)
        }
        // Lost a race with a concurrent sign-in for the same email.
        None => match state.directory.find_by_email(&profile.email).await? {
            Some(existing) => ensure_verified(state, existing).await,
            None => {
                error!("google user vanished after conflicting insert");
                Err(AppError::Internal(anyhow::anyhow!(
                    "could not process google login"
                )))
            }
        },
    }
}

async fn ensure_verified(state: &AppState, user: User) -> AppResult<User> {
    if user.is_email_verified {
        return Ok(user);
    }
    let verified = state
        .directory
        .mark_email_verified(user.id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished while verifying")))?;
    info!(user_id = %verified.id, "email verified through google");
    Ok(verified)
}
