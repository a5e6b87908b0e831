//! Profile Use Cases
//!
//! Reading and editing the caller's own account, and deleting it.

use kernel::id::UserId;
use platform::client::ClientInfo;

use crate::application::deps::AuthDeps;
use crate::application::invalidate_sessions::InvalidateAllSessionsUseCase;
use crate::domain::entity::user::User;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier, UserRepository};
use crate::error::{AuthError, AuthResult};

const MAX_FULL_NAME_LEN: usize = 100;
const MAX_AVATAR_URL_LEN: usize = 2048;

/// Fields left as `None` keep their stored value. An empty `avatar_url`
/// removes the avatar.
#[derive(Debug, Default)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct ProfileUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> ProfileUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    pub async fn get_profile(&self, user_id: &UserId) -> AuthResult<User> {
        let deps = &self.deps;
        deps.bounded("find_user_by_id", deps.repo.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: &UserId,
        input: UpdateProfileInput,
    ) -> AuthResult<User> {
        let deps = &self.deps;

        let full_name = input.full_name.map(validate_full_name).transpose()?;
        let avatar_url = input.avatar_url.map(validate_avatar_url).transpose()?;

        let mut user = self.get_profile(user_id).await?;
        if full_name.is_none() && avatar_url.is_none() {
            return Ok(user);
        }

        if let Some(full_name) = full_name {
            user.full_name = full_name;
        }
        if let Some(avatar_url) = avatar_url {
            user.avatar_url = avatar_url;
        }
        user.updated_at = deps.now();

        deps.bounded("update_user", deps.repo.update(&user)).await?;

        tracing::info!(user_id = %user.user_id, "Profile updated");
        Ok(user)
    }

    /// Delete the account, then end all of its sessions
    ///
    /// Session cleanup after the delete is best-effort: the refresh tokens
    /// left behind name a user that no longer exists.
    pub async fn delete_account(&self, user_id: &UserId, client: &ClientInfo) -> AuthResult<()> {
        let deps = &self.deps;

        let deleted = deps
            .bounded("delete_user", deps.repo.delete_user(user_id))
            .await?;
        if !deleted {
            return Err(AuthError::UserNotFound);
        }

        if let Err(e) = InvalidateAllSessionsUseCase::new(deps.clone())
            .execute(user_id)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to revoke sessions of deleted account");
        }

        tracing::info!(user_id = %user_id, ip = ?client.ip, "Account deleted");
        Ok(())
    }
}

fn validate_full_name(name: String) -> AuthResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::Validation("Full name is required".to_string()));
    }
    if name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(AuthError::Validation(format!(
            "Full name must be at most {MAX_FULL_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_avatar_url(url: String) -> AuthResult<Option<String>> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    if url.len() > MAX_AVATAR_URL_LEN
        || !(url.starts_with("https://") || url.starts_with("http://"))
    {
        return Err(AuthError::Validation("Invalid avatar URL".to_string()));
    }
    Ok(Some(url.to_string()))
}
