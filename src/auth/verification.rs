use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::auth::dto::MessageResponse;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Consumes a pending verification token. A token works once, and only before it expires.
#[instrument(skip(state, token))]
pub async fn verify_email(state: &AppState, token: &str) -> AppResult<MessageResponse> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("Missing token".into()));
    }

    let consumed = state
        .directory
        .consume_verification_token(token, OffsetDateTime::now_utc())
        .await?;

    match consumed {
        Some(user) => {
            info!(user_id = %user.id, "email verified");
            Ok(MessageResponse::new(
                "Email verified successfully. You can now log in.",
            ))
        }
        None => {
            warn!("invalid or expired verification token");
            Err(AppError::BadRequest(
                "Invalid or expired verification token.".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{NewUser, PendingVerification};
    use time::Duration;
    use tokio::task::JoinSet;

    async fn pending_user(state: &AppState, token: &str, expires_at: OffsetDateTime) {
        state
            .directory
            .insert_if_absent(NewUser {
                email: "pending@example.com".into(),
                password_hash: "x".into(),
                username: "pending".into(),
                bio: None,
                location: None,
                expertise: vec![],
                is_email_verified: false,
                verification: Some(PendingVerification {
                    token: token.into(),
                    expires_at,
                }),
            })
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let (state, _) = AppState::fake();
        pending_user(&state, "tok-1", OffsetDateTime::now_utc() + Duration::hours(1)).await;

        verify_email(&state, "tok-1").await.expect("first use succeeds");
        let user = state
            .directory
            .find_by_email("pending@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_email_verified);
        assert!(user.email_verification_token.is_none());
        assert!(user.email_verification_expires.is_none());

        let err = verify_email(&state, "tok-1").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (state, _) = AppState::fake();
        pending_user(&state, "old", OffsetDateTime::now_utc() - Duration::seconds(1)).await;
        let err = verify_email(&state, "old").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let user = state
            .directory
            .find_by_email("pending@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(!user.is_email_verified);
    }

    #[tokio::test]
    async fn unknown_and_blank_tokens_fail() {
        let (state, _) = AppState::fake();
        assert!(matches!(
            verify_email(&state, "nope").await.unwrap_err(),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            verify_email(&state, "  ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_verifications_succeed_once() {
        let (state, _) = AppState::fake();
        pending_user(&state, "tok-race", OffsetDateTime::now_utc() + Duration::hours(1)).await;

        let mut set = JoinSet::new();
        for _ in 0..16 {
            let state = state.clone();
            set.spawn(async move { verify_email(&state, "tok-race").await });
        }
        let (mut ok, mut rejected) = (0, 0);
        while let Some(res) = set.join_next().await {
            match res.unwrap() {
                Ok(_) => ok += 1,
                Err(AppError::BadRequest(_)) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(rejected, 15);
    }
}
