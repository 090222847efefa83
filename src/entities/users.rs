use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    /// Argon2id password hash; empty while an admin-forced reset is pending.
    pub password_hash: String,

    pub is_admin: bool,

    /// Cleared when the account is archived; archived users keep their data
    /// but cannot log in and their shard is skipped by global queries.
    pub is_active: bool,

    /// Soft-delete flag. The row stays behind so the name is not silently
    /// reused and so deferred cleanup can retry removing the shard file.
    pub is_deleted: bool,

    pub archived_at: Option<String>,

    /// Forces the user through the set-new-password flow on next login.
    pub must_reset_password: bool,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
