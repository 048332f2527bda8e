use tracing::warn;

use crate::auth::claims::Claims;
use crate::auth::repo::UserDirectory;
use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};

/// Admin gate. Reads the admin flag from the directory, never from the token,
/// and denies whenever the caller cannot be positively identified as an admin.
pub async fn require_admin(directory: &dyn UserDirectory, claims: Option<&Claims>) -> AppResult<User> {
    let Some(claims) = claims else {
        return Err(AppError::Unauthorized("Authentication required".into()));
    };
    let user = match directory.find_by_id(claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id = %claims.sub, "admin check for unknown subject");
            return Err(AppError::Unauthorized("User not found".into()));
        }
        Err(e) => {
            warn!(error = %e, user_id = %claims.sub, "admin check could not read directory");
            return Err(AppError::Forbidden(
                "Access denied. Admin privileges required.".into(),
            ));
        }
    };
    if !user.is_admin {
        warn!(user_id = %user.id, "non-admin denied");
        return Err(AppError::Forbidden(
            "Access denied. Admin privileges required.".into(),
        ));
    }
    Ok(user)
}
