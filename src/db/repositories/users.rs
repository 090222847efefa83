use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tokio::task;

use crate::entities::users;

/// User data returned from the repository (without the password hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: i32,
    pub name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub is_deleted: bool,
    pub archived_at: Option<String>,
    pub must_reset_password: bool,
    pub created_at: String,
}

impl From<users::Model> for UserAccount {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            is_admin: model.is_admin,
            is_active: model.is_active,
            is_deleted: model.is_deleted,
            archived_at: model.archived_at,
            must_reset_password: model.must_reset_password,
            created_at: model.created_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<UserAccount>> {
        let user = users::Entity::find()
            .filter(users::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query user by name")?;

        Ok(user.map(UserAccount::from))
    }

    /// Creates an account with a freshly hashed password. The caller is
    /// responsible for rejecting duplicate names first.
    pub async fn create(&self, name: &str, password: &str, is_admin: bool) -> Result<UserAccount> {
        let password = password.to_string();
        let hash = task::spawn_blocking(move || hash_password(&password))
            .await
            .context("Password hashing task panicked")??;

        let model = users::ActiveModel {
            name: Set(name.to_string()),
            password_hash: Set(hash),
            is_admin: Set(is_admin),
            is_active: Set(true),
            is_deleted: Set(false),
            archived_at: Set(None),
            must_reset_password: Set(false),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let created = model
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(UserAccount::from(created))
    }

    /// Verify a password for a user.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, name: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        // An emptied hash means a reset is pending and no password matches.
        if user.password_hash.is_empty() {
            return Ok(false);
        }

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Stores a new password hash and clears any pending reset flag.
    /// Returns `false` when the user does not exist.
    pub async fn set_password(&self, name: &str, new_password: &str) -> Result<bool> {
        let Some(user) = self.find_model(name).await? else {
            return Ok(false);
        };

        let password = new_password.to_string();
        let new_hash = task::spawn_blocking(move || hash_password(&password))
            .await
            .context("Password hashing task panicked")??;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.must_reset_password = Set(false);
        active.update(&self.conn).await?;

        Ok(true)
    }

    /// Blanks the stored hash so the old password stops working and marks
    /// the account as awaiting a new password.
    pub async fn begin_password_reset(&self, name: &str) -> Result<bool> {
        let Some(user) = self.find_model(name).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(String::new());
        active.must_reset_password = Set(true);
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn set_archived(&self, name: &str, archived: bool) -> Result<bool> {
        let Some(user) = self.find_model(name).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        if archived {
            active.is_active = Set(false);
            active.archived_at = Set(Some(chrono::Utc::now().to_rfc3339()));
        } else {
            active.is_active = Set(true);
            active.archived_at = Set(None);
        }
        active.update(&self.conn).await?;

        Ok(true)
    }

    /// Soft-deletes an account. The row stays behind so the name cannot be
    /// silently reused while the shard file still exists.
    pub async fn mark_deleted(&self, name: &str) -> Result<bool> {
        let Some(user) = self.find_model(name).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        active.is_deleted = Set(true);
        active.is_active = Set(false);
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn admin_exists(&self) -> Result<bool> {
        let admin = users::Entity::find()
            .filter(users::Column::IsAdmin.eq(true))
            .filter(users::Column::IsDeleted.eq(false))
            .one(&self.conn)
            .await
            .context("Failed to query for an admin user")?;

        Ok(admin.is_some())
    }

    pub async fn list(&self, include_archived: bool) -> Result<Vec<UserAccount>> {
        let mut query = users::Entity::find().filter(users::Column::IsDeleted.eq(false));

        if !include_archived {
            query = query.filter(users::Column::IsActive.eq(true));
        }

        let rows = query
            .order_by_asc(users::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(UserAccount::from).collect())
    }

    /// Names of accounts whose shards take part in global queries.
    pub async fn active_names(&self) -> Result<Vec<String>> {
        let rows = self.list(false).await?;
        Ok(rows.into_iter().map(|u| u.name).collect())
    }

    /// Every name ever registered, including archived and deleted accounts.
    /// Shard files not matching any of these are orphans.
    pub async fn all_names(&self) -> Result<Vec<String>> {
        let rows = users::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list user names")?;

        Ok(rows.into_iter().map(|u| u.name).collect())
    }

    /// Names of soft-deleted accounts whose shard files may still linger.
    pub async fn deleted_names(&self) -> Result<Vec<String>> {
        let rows = users::Entity::find()
            .filter(users::Column::IsDeleted.eq(true))
            .all(&self.conn)
            .await
            .context("Failed to list deleted users")?;

        Ok(rows.into_iter().map(|u| u.name).collect())
    }

    async fn find_model(&self, name: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query user by name")
    }
}

/// Hash a password using Argon2id with the default parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
