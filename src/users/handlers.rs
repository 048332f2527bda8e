use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::SetAdminStatusRequest,
        extractors::{AdminUser, AuthUser},
        repo_types::{ProfileUpdate, UserView},
    },
    error::AppResult,
    extract::{AppJson, AppPath},
    state::AppState,
    users::services,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/admin/all", get(list_all_users))
        .route("/users/admin/:id/set-admin-status", patch(set_admin_status))
        .route("/users/:id", get(get_user).patch(update_profile))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_all_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<Vec<UserView>>> {
    Ok(Json(services::list_all_users(&state).await?))
}

#[instrument(skip(state, admin, payload))]
pub async fn set_admin_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<SetAdminStatusRequest>,
) -> AppResult<Json<UserView>> {
    Ok(Json(
        services::set_admin_status(&state, &admin, id, payload.is_admin).await?,
    ))
}

#[instrument(skip(state, _claims))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<UserView>> {
    Ok(Json(services::get_user(&state, id).await?))
}

#[instrument(skip(state, claims, payload), fields(actor_id = %claims.sub))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ProfileUpdate>,
) -> AppResult<Json<UserView>> {
    Ok(Json(
        services::update_profile(&state, claims.sub, id, payload).await?,
    ))
}
