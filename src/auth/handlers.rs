use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};
use url::Url;

use crate::{
    auth::{
        dto::{
            AccessTokenResponse, AuthResponse, GoogleCallbackQuery, LoginRequest, MessageResponse,
            RefreshRequest, RegisterRequest, ResendVerificationRequest, VerifyEmailRequest,
        },
        extractors::AuthUser,
        federation, registration,
        repo_types::UserView,
        session, verification,
    },
    error::{AppError, AppResult},
    extract::AppJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification-email", post(resend_verification_email))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    payload.validate()?;
    let res = registration::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }
    Ok(Json(session::login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> AppResult<Json<AccessTokenResponse>> {
    Ok(Json(session::refresh(&state, &payload.refresh_token).await?))
}

#[instrument(skip(state, claims))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<UserView>> {
    Ok(Json(session::get_me(&state, &claims).await?))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(verification::verify_email(&state, &payload.token).await?))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResendVerificationRequest>,
) -> AppResult<Json<MessageResponse>> {
    if payload.email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".into()));
    }
    Ok(Json(
        registration::resend_verification_email(&state, &payload.email).await?,
    ))
}

#[instrument(skip(state))]
pub async fn google_start(State(state): State<AppState>) -> AppResult<Response> {
    let provider = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Google sign-in is not configured".into()))?;
    Ok(found(&provider.authorize_url()?))
}

#[instrument(skip(state, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    match google_session(&state, query).await {
        Ok(session) => match frontend_url(
            &state.config.frontend_url,
            "/auth/callback",
            &[
                ("accessToken", session.access_token.as_str()),
                ("refreshToken", session.refresh_token.as_str()),
            ],
        ) {
            Ok(url) => found(&url),
            Err(e) => {
                error!(error = %e, "failed to build oauth success redirect");
                oauth_failed(&state)
            }
        },
        Err(e) => {
            warn!(error = %e, "google sign-in failed");
            oauth_failed(&state)
        }
    }
}

async fn google_session(state: &AppState, query: GoogleCallbackQuery) -> AppResult<AuthResponse> {
    let provider = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Google sign-in is not configured".into()))?;
    if let Some(err) = query.error {
        return Err(AppError::BadRequest(format!("provider returned error: {err}")));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing authorization code".into()))?;
    let profile = provider.fetch_profile(&code).await?;
    let user = federation::resolve_or_create(state, &profile).await?;
    session::issue_session(state, &user)
}

/// 302 Found, which is what browser OAuth flows expect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn oauth_failed(state: &AppState) -> Response {
    let fallback = format!(
        "{}/login?error=oauth_failed",
        state.config.frontend_url.trim_end_matches('/')
    );
    let url = frontend_url(&state.config.frontend_url, "/login", &[("error", "oauth_failed")])
        .unwrap_or(fallback);
    found(&url)
}

fn frontend_url(base: &str, path: &str, params: &[(&str, &str)]) -> anyhow::Result<String> {
    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))?;
    url.query_pairs_mut().extend_pairs(params.iter());
    Ok(url.into())
}
