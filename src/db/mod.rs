use anyhow::Result;
use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, SqlxSqliteConnector, Statement};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::StorageConfig;
use crate::domain::UserSlug;

pub mod migrator;
pub mod registry;
pub mod repositories;

pub use registry::StoreRegistry;
pub use repositories::records::{RecordData, RecordFilter, RecordRepository, RecordTotals};
pub use repositories::users::{UserAccount, UserRepository};

/// Connection to the shared database holding the account table.
#[derive(Clone)]
pub struct SharedStore {
    pub conn: DatabaseConnection,
}

impl SharedStore {
    pub async fn new(db_path: &Path) -> Result<Self> {
        Self::with_pool_options(db_path, &StorageConfig::default()).await
    }

    pub async fn with_pool_options(db_path: &Path, storage: &StorageConfig) -> Result<Self> {
        let conn = connect_sqlite(db_path, storage).await?;

        migrator::SharedMigrator::up(&conn, None).await?;

        info!(
            "Shared database connected & migrations applied (pool: {}-{})",
            storage.min_connections, storage.max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.conn.clone())
    }

    pub async fn close(&self) -> Result<()> {
        self.conn.close_by_ref().await?;
        Ok(())
    }
}

/// Connection to one per-user shard holding that user's order records.
#[derive(Clone)]
pub struct UserStore {
    slug: UserSlug,
    pub conn: DatabaseConnection,
}

impl UserStore {
    pub async fn new(db_path: &Path, slug: UserSlug) -> Result<Self> {
        Self::with_pool_options(db_path, slug, &StorageConfig::default()).await
    }

    pub async fn with_pool_options(
        db_path: &Path,
        slug: UserSlug,
        storage: &StorageConfig,
    ) -> Result<Self> {
        let conn = connect_sqlite(db_path, storage).await?;

        migrator::UserMigrator::up(&conn, None).await?;

        info!(
            "User database '{}' connected & migrations applied (pool: {}-{})",
            slug, storage.min_connections, storage.max_connections
        );

        Ok(Self { slug, conn })
    }

    #[must_use]
    pub const fn slug(&self) -> &UserSlug {
        &self.slug
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn records(&self) -> RecordRepository {
        RecordRepository::new(self.conn.clone())
    }

    pub async fn close(&self) -> Result<()> {
        self.conn.close_by_ref().await?;
        Ok(())
    }
}

/// Opens an SQLite pool with the pragmas every connection must carry.
///
/// DELETE journaling keeps the files usable from network shares where WAL
/// is unreliable; the remaining pragmas trade memory for read speed.
async fn connect_sqlite(db_path: &Path, storage: &StorageConfig) -> Result<DatabaseConnection> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(storage.busy_timeout_ms))
        .page_size(4096)
        .pragma("temp_store", "MEMORY")
        .pragma("cache_size", "-64000")
        .pragma("mmap_size", "268435456");

    let pool = SqlitePoolOptions::new()
        .max_connections(storage.max_connections)
        .min_connections(storage.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(3600))
        .connect_with(options)
        .await?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}
