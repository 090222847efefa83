use sea_orm_migration::prelude::*;

mod m20240101_records_initial;
mod m20240101_shared_initial;
mod m20240612_user_lifecycle;
mod m20240718_add_cut_time;

/// Migrations for the shared accounts database (`system.db`).
pub struct SharedMigrator;

#[async_trait::async_trait]
impl MigratorTrait for SharedMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_shared_initial::Migration),
            Box::new(m20240612_user_lifecycle::Migration),
        ]
    }
}

/// Migrations for the per-user shard databases (`usuario_<slug>.db`).
///
/// Shards created by old builds migrate forward the first time they are
/// opened; columns are only ever added, never dropped or renamed.
pub struct UserMigrator;

#[async_trait::async_trait]
impl MigratorTrait for UserMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_records_initial::Migration),
            Box::new(m20240718_add_cut_time::Migration),
        ]
    }
}
