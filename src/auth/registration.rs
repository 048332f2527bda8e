use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::auth::dto::{MessageResponse, RegisterRequest};
use crate::auth::password::hash_password;
use crate::auth::repo_types::{NewUser, PendingVerification};
use crate::error::{AppError, AppResult};
use crate::mail::dispatch_verification_email;
use crate::state::AppState;

const RESEND_REJECTED: &str = "Unable to resend verification email for this address.";

/// 32 random bytes, hex encoded.
pub(crate) fn generate_verification_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn new_pending_verification(state: &AppState) -> PendingVerification {
    PendingVerification {
        token: generate_verification_token(),
        expires_at: OffsetDateTime::now_utc()
            + Duration::minutes(state.config.verification_ttl_minutes),
    }
}

/// Creates an unverified account and sends the verification email.
/// Returns no tokens: the account cannot log in until verified.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<MessageResponse> {
    let password_hash = hash_password(&req.password)?;
    let pending = new_pending_verification(state);
    let token = pending.token.clone();

    let created = state
        .directory
        .insert_if_absent(NewUser {
            email: req.email,
            password_hash,
            username: req.username,
            bio: req.bio,
            location: req.location,
            expertise: req.expertise,
            is_email_verified: false,
            verification: Some(pending),
        })
        .await?;

    let Some(user) = created else {
        warn!("email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    };

    info!(user_id = %user.id, "user registered");
    dispatch_verification_email(state.mailer.clone(), user.email, user.username, token);

    Ok(MessageResponse::new(
        "Registration successful. Please check your email for verification link.",
    ))
}

/// Issues a fresh verification token, replacing any pending one, and resends it.
/// Unknown and already-verified addresses get the same rejection.
#[instrument(skip(state))]
pub async fn resend_verification_email(state: &AppState, email: &str) -> AppResult<MessageResponse> {
    let email = email.trim();
    let user = match state.directory.find_by_email(email).await? {
        Some(u) if !u.is_email_verified => u,
        Some(_) => {
            warn!("resend requested for verified account");
            return Err(AppError::BadRequest(RESEND_REJECTED.into()));
        }
        None => {
            warn!("resend requested for unknown email");
            return Err(AppError::BadRequest(RESEND_REJECTED.into()));
        }
    };

    let pending = new_pending_verification(state);
    let token = pending.token.clone();
    let Some(user) = state
        .directory
        .set_pending_verification(user.id, pending)
        .await?
    else {
        // Verified (or removed) between the lookup and the update.
        return Err(AppError::BadRequest(RESEND_REJECTED.into()));
    };

    info!(user_id = %user.id, "verification email reissued");
    dispatch_verification_email(state.mailer.clone(), user.email, user.username, token);

    Ok(MessageResponse::new(
        "Verification email sent. Please check your inbox.",
    ))
}
