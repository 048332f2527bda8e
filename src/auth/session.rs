use tracing::{error, info, instrument, warn};

use crate::auth::claims::Claims;
use crate::auth::dto::{AccessTokenResponse, AuthResponse, LoginRequest};
use crate::auth::jwt::TokenError;
use crate::auth::password::{hash_password, needs_rehash, verify_password};
use crate::auth::repo_types::{User, UserView};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

/// Signs an access/refresh pair for a user that already passed every gate.
pub fn issue_session(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let access_token = state.keys.sign_access(user)?;
    let refresh_token = state.keys.sign_refresh(user)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: UserView::from(user),
    })
}

/// Password login. Unverified accounts are refused before any token is signed.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<AuthResponse> {
    let email = req.email.trim();
    let Some(user) = state.directory.find_by_email(email).await? else {
        warn!("login unknown email");
        return Err(invalid_credentials());
    };

    let ok = verify_password(&req.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "stored credential unreadable");
        invalid_credentials()
    })?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    if !user.is_email_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AppError::Forbidden(
            "Please verify your email address before logging in.".into(),
        ));
    }

    if needs_rehash(&user.password_hash) {
        match hash_password(&req.password) {
            Ok(upgraded) => {
                if let Err(e) = state.directory.update_password_hash(user.id, &upgraded).await {
                    error!(error = %e, user_id = %user.id, "credential upgrade failed");
                } else {
                    info!(user_id = %user.id, "legacy credential upgraded");
                }
            }
            Err(e) => error!(error = %e, user_id = %user.id, "credential upgrade failed"),
        }
    }

    let session = issue_session(state, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(session)
}

/// Current record of the token's subject; never the possibly stale claims.
#[instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn get_me(state: &AppState, claims: &Claims) -> AppResult<UserView> {
    let user = state
        .directory
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(UserView::from(user))
}

/// New access token from a refresh token. Claims come from the current record.
/// The refresh token itself is not rotated.
#[instrument(skip(state, refresh_token))]
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<AccessTokenResponse> {
    let claims = state.keys.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        match e {
            TokenError::Expired => AppError::Unauthorized("Refresh token expired".into()),
            _ => AppError::Unauthorized("Invalid refresh token".into()),
        }
    })?;

    let user = state
        .directory
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if !user.is_email_verified {
        return Err(AppError::Unauthorized("Email not verified".into()));
    }

    let access_token = state.keys.sign_access(&user)?;
    info!(user_id = %user.id, "access token refreshed");
    Ok(AccessTokenResponse { access_token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{NewUser, ProfileUpdate};

    async fn seed(state: &AppState, email: &str, password_hash: String, verified: bool) -> User {
        state
            .directory
            .insert_if_absent(NewUser {
                email: email.into(),
                password_hash,
                username: "alice".into(),
                bio: None,
                location: None,
                expertise: vec![],
                is_email_verified: verified,
                verification: None,
            })
            .await
            .unwrap()
            .unwrap()
    }

    fn creds(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn login_issues_both_tokens_for_verified_user() {
        let (state, _) = AppState::fake();
        let user = seed(&state, "a@example.com", hash_password("secret1").unwrap(), true).await;
        let res = login(&state, creds("a@example.com", "secret1")).await.unwrap();
        assert_eq!(res.user.id, user.id);
        assert!(res.user.is_email_verified);
        assert_eq!(state.keys.verify_access(&res.access_token).unwrap().sub, user.id);
        assert_eq!(state.keys.verify_refresh(&res.refresh_token).unwrap().sub, user.id);
        let json = serde_json::to_string(&res).unwrap();
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let (state, _) = AppState::fake();
        seed(&state, "a@example.com", hash_password("secret1").unwrap(), true).await;
        assert!(matches!(
            login(&state, creds("a@example.com", "wrong")).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            login(&state, creds("ghost@example.com", "secret1")).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn unverified_user_is_forbidden_only_with_right_password() {
        let (state, _) = AppState::fake();
        seed(&state, "u@example.com", hash_password("secret1").unwrap(), false).await;
        assert!(matches!(
            login(&state, creds("u@example.com", "secret1")).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            login(&state, creds("u@example.com", "nope")).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn legacy_credential_is_upgraded_on_login() {
        use ring::pbkdf2;
        use std::num::NonZeroU32;

        let salt = "0123456789abcdef0123456789abcdef";
        let mut out = [0u8; 64];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA512,
            NonZeroU32::new(1000).unwrap(),
            salt.as_bytes(),
            b"secret1",
            &mut out,
        );
        let legacy = format!("{}:{}", salt, hex::encode(out));

        let (state, _) = AppState::fake();
        let user = seed(&state, "l@example.com", legacy, true).await;
        login(&state, creds("l@example.com", "secret1")).await.unwrap();
        let stored = state.directory.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn get_me_reads_current_record() {
        let (state, _) = AppState::fake();
        let user = seed(&state, "me@example.com", hash_password("secret1").unwrap(), true).await;
        let session = issue_session(&state, &user).unwrap();
        let claims = state.keys.verify_access(&session.access_token).unwrap();

        state
            .directory
            .update_profile(
                user.id,
                ProfileUpdate {
                    location: Some("Lviv".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let me = get_me(&state, &claims).await.unwrap();
        assert_eq!(me.location.as_deref(), Some("Lviv"));
    }

    #[tokio::test]
    async fn get_me_fails_for_vanished_subject() {
        let (state, _) = AppState::fake();
        let other = AppState::fake().0;
        let ghost = seed(&other, "ghost@example.com", "x".into(), true).await;
        let session = issue_session(&state, &ghost).unwrap();
        let claims = state.keys.verify_access(&session.access_token).unwrap();
        assert!(matches!(
            get_me(&state, &claims).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn refresh_uses_current_username() {
        let (state, _) = AppState::fake();
        let user = seed(&state, "r@example.com", hash_password("secret1").unwrap(), true).await;
        let session = login(&state, creds("r@example.com", "secret1")).await.unwrap();

        state
            .directory
            .update_profile(
                user.id,
                ProfileUpdate {
                    username: Some("beekeeper42".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let refreshed = refresh(&state, &session.refresh_token).await.unwrap();
        let claims = state.keys.verify_access(&refreshed.access_token).unwrap();
        assert_eq!(claims.username, "beekeeper42");
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens_and_garbage() {
        let (state, _) = AppState::fake();
        seed(&state, "r@example.com", hash_password("secret1").unwrap(), true).await;
        let session = login(&state, creds("r@example.com", "secret1")).await.unwrap();
        assert!(matches!(
            refresh(&state, &session.access_token).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            refresh(&state, "garbage").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn refresh_requires_existing_verified_user() {
        let (state, _) = AppState::fake();
        let unverified = seed(&state, "n@example.com", "x".into(), false).await;
        let token = state.keys.sign_refresh(&unverified).unwrap();
        assert!(matches!(
            refresh(&state, &token).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }
}
