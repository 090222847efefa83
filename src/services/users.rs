//! Account lifecycle: creation, login, archiving, deletion and password
//! flows, kept in step with the per-user database shards.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::db::{StoreRegistry, UserAccount};
use crate::domain::UserSlug;
use crate::services::queries::QueryService;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),

    #[error("A user with this name already exists.")]
    Duplicate,

    #[error("User not found")]
    NotFound,

    #[error("Administrator accounts cannot be archived or deleted.")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// What a login attempt came back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(UserAccount),
    /// The account exists but an administrator reset its password; the user
    /// must choose a new one before logging in.
    ResetRequired,
    /// The account is archived and cannot log in until restored.
    Inactive,
    InvalidCredentials,
}

const MIN_PASSWORD_LEN: usize = 4;

pub struct UserService {
    registry: Arc<StoreRegistry>,
    queries: Arc<QueryService>,
}

impl UserService {
    #[must_use]
    pub const fn new(registry: Arc<StoreRegistry>, queries: Arc<QueryService>) -> Self {
        Self { registry, queries }
    }

    /// Creates an account and its database shard.
    pub async fn create_user(
        &self,
        name: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<UserAccount, UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::Validation("User name is required.".into()));
        }
        validate_password(password)?;

        let users = self.registry.shared().users();
        if users.get_by_name(name).await?.is_some() {
            return Err(UserError::Duplicate);
        }

        let account = users.create(name, password, is_admin).await?;
        self.registry.ensure_user_database(name).await?;

        self.queries.invalidate_all();
        Ok(account)
    }

    /// Checks credentials and account state in one step.
    pub async fn verify_login(&self, name: &str, password: &str) -> Result<LoginOutcome, UserError> {
        let users = self.registry.shared().users();

        let Some(account) = users.get_by_name(name.trim()).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };
        if account.is_deleted {
            return Ok(LoginOutcome::InvalidCredentials);
        }
        if !account.is_active {
            return Ok(LoginOutcome::Inactive);
        }
        if account.must_reset_password {
            return Ok(LoginOutcome::ResetRequired);
        }

        if users.verify_password(&account.name, password).await? {
            Ok(LoginOutcome::Success(account))
        } else {
            Ok(LoginOutcome::InvalidCredentials)
        }
    }

    /// Whether any (non-deleted) administrator account exists yet.
    pub async fn admin_exists(&self) -> Result<bool, UserError> {
        Ok(self.registry.shared().users().admin_exists().await?)
    }

    pub async fn list_users(&self, include_archived: bool) -> Result<Vec<UserAccount>, UserError> {
        Ok(self
            .registry
            .shared()
            .users()
            .list(include_archived)
            .await?)
    }

    /// Deactivates an account and moves its shard file aside.
    pub async fn archive_user(&self, name: &str) -> Result<(), UserError> {
        let account = self.require_account(name).await?;
        if account.is_admin {
            return Err(UserError::Forbidden);
        }

        self.registry
            .shared()
            .users()
            .set_archived(&account.name, true)
            .await?;

        let slug = UserSlug::from_name(&account.name);
        if !self.registry.archive_user_database(&slug).await {
            warn!("Shard file for '{}' was not archived", account.name);
        }

        self.queries.invalidate_all();
        Ok(())
    }

    /// Reactivates an archived account and moves its shard file back.
    pub async fn restore_user(&self, name: &str) -> Result<(), UserError> {
        let account = self.require_account(name).await?;

        self.registry
            .shared()
            .users()
            .set_archived(&account.name, false)
            .await?;

        let slug = UserSlug::from_name(&account.name);
        if !self.registry.restore_user_database(&slug).await {
            warn!("Shard file for '{}' was not restored", account.name);
        }

        self.queries.invalidate_all();
        Ok(())
    }

    /// Soft-deletes an account and removes its shard file. A file still held
    /// open elsewhere stays behind for the maintenance purge to collect.
    pub async fn delete_user(&self, name: &str) -> Result<(), UserError> {
        let account = self.require_account(name).await?;
        if account.is_admin {
            return Err(UserError::Forbidden);
        }

        self.registry
            .shared()
            .users()
            .mark_deleted(&account.name)
            .await?;

        let slug = UserSlug::from_name(&account.name);
        if !self.registry.remove_user_database(&slug).await {
            warn!(
                "Shard file for '{}' not removed now; deferred to maintenance",
                account.name
            );
        }

        self.queries.invalidate_all();
        Ok(())
    }

    /// Invalidates the current password and flags the account so the next
    /// login asks for a new one. Administrator action.
    pub async fn reset_password(&self, name: &str) -> Result<(), UserError> {
        let account = self.require_account(name).await?;
        self.registry
            .shared()
            .users()
            .begin_password_reset(&account.name)
            .await?;
        Ok(())
    }

    /// Sets the new password chosen after a reset (or by an administrator)
    /// and clears the pending flag.
    pub async fn complete_password_reset(
        &self,
        name: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        validate_password(new_password)?;
        let account = self.require_account(name).await?;
        self.registry
            .shared()
            .users()
            .set_password(&account.name, new_password)
            .await?;
        Ok(())
    }

    /// Self-service password change; the current password must check out.
    pub async fn change_password(
        &self,
        name: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        validate_password(new_password)?;
        if current_password == new_password {
            return Err(UserError::Validation(
                "New password must be different from the current password.".into(),
            ));
        }

        let account = self.require_account(name).await?;
        let users = self.registry.shared().users();

        if !users.verify_password(&account.name, current_password).await? {
            return Err(UserError::Validation(
                "Current password is incorrect.".into(),
            ));
        }

        users.set_password(&account.name, new_password).await?;
        Ok(())
    }

    /// Whether the account is waiting for a new password after a reset.
    pub async fn password_reset_pending(&self, name: &str) -> Result<bool, UserError> {
        let account = self.require_account(name).await?;
        Ok(account.must_reset_password)
    }

    async fn require_account(&self, name: &str) -> Result<UserAccount, UserError> {
        self.registry
            .shared()
            .users()
            .get_by_name(name.trim())
            .await?
            .ok_or(UserError::NotFound)
    }
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(UserError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    Ok(())
}
