use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::MIN_USERNAME_LEN;
use crate::auth::repo_types::{ProfileUpdate, User, UserView};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

/// Every user, oldest first. Callers must already hold the admin gate.
pub async fn list_all_users(state: &AppState) -> AppResult<Vec<UserView>> {
    let users = state.directory.list_all().await?;
    Ok(users.iter().map(UserView::from).collect())
}

/// Grants or revokes admin. An admin cannot revoke their own flag.
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn set_admin_status(
    state: &AppState,
    actor: &User,
    target: Uuid,
    is_admin: bool,
) -> AppResult<UserView> {
    if actor.id == target && !is_admin {
        warn!("admin attempted self-demotion");
        return Err(AppError::BadRequest(
            "Admins cannot revoke their own admin status".into(),
        ));
    }
    let user = state
        .directory
        .set_admin(target, is_admin)
        .await?
        .ok_or_else(user_not_found)?;
    info!(user_id = %user.id, is_admin, "admin status changed");
    Ok(UserView::from(user))
}

pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<UserView> {
    let user = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(UserView::from(user))
}

/// Profile edits are allowed on one's own record, or on any record by an admin.
#[instrument(skip(state, update))]
pub async fn update_profile(
    state: &AppState,
    actor_id: Uuid,
    target: Uuid,
    mut update: ProfileUpdate,
) -> AppResult<UserView> {
    if actor_id != target {
        let actor = state.directory.find_by_id(actor_id).await?;
        if !actor.is_some_and(|a| a.is_admin) {
            return Err(AppError::Forbidden(
                "You can only edit your own profile".into(),
            ));
        }
    }
    if let Some(username) = update.username.as_mut() {
        *username = username.trim().to_string();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AppError::Validation(format!(
                "Username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
    }
    let user = state
        .directory
        .update_profile(target, update)
        .await?
        .ok_or_else(user_not_found)?;
    info!(user_id = %user.id, "profile updated");
    Ok(UserView::from(user))
}
