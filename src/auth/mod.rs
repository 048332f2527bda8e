use crate::state::AppState;
use axum::Router;

pub mod authorize;
pub mod claims;
pub mod dto;
pub mod extractors;
pub mod federation;
pub mod google;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod registration;
pub mod repo;
pub mod repo_types;
pub mod session;
pub mod verification;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
