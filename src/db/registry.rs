use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::db::{SharedStore, UserStore};
use crate::domain::{self, UserSlug};

/// Delay between closing a shard pool and touching its file, so SQLite can
/// release its locks first.
const SETTLE_DELAY: Duration = Duration::from_millis(200);

const UNLINK_ATTEMPTS: u32 = 3;
const UNLINK_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Owns the shared store plus one lazily opened store per user shard.
///
/// All stores hand out cheap clones backed by the same pool, so the registry
/// is the only place that opens, closes, renames or deletes database files.
pub struct StoreRegistry {
    data_dir: PathBuf,
    storage: StorageConfig,
    shared: SharedStore,
    users: RwLock<HashMap<UserSlug, UserStore>>,
}

impl StoreRegistry {
    /// Opens the shared database eagerly; user shards open on first use.
    pub async fn open(storage: &StorageConfig) -> Result<Self> {
        let data_dir = PathBuf::from(&storage.data_dir);
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let shared_path = domain::shared_db_path(&data_dir);
        let shared = SharedStore::with_pool_options(&shared_path, storage).await?;

        Ok(Self {
            data_dir,
            storage: storage.clone(),
            shared,
            users: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub const fn shared(&self) -> &SharedStore {
        &self.shared
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Store for one user, opened (and migrated) on first access.
    pub async fn user_store(&self, name: &str) -> Result<UserStore> {
        let slug = UserSlug::from_name(name);
        self.store_for_slug(&slug).await
    }

    pub async fn store_for_slug(&self, slug: &UserSlug) -> Result<UserStore> {
        if let Some(store) = self.users.read().await.get(slug) {
            return Ok(store.clone());
        }

        let path = domain::user_db_path(&self.data_dir, slug);
        let store = UserStore::with_pool_options(&path, slug.clone(), &self.storage).await?;

        let mut map = self.users.write().await;
        let entry = map.entry(slug.clone()).or_insert(store);
        Ok(entry.clone())
    }

    /// Creates and migrates the shard for a new user.
    pub async fn ensure_user_database(&self, name: &str) -> Result<()> {
        self.user_store(name).await.map(|_| ())
    }

    /// Stores for every user whose shard takes part in a query: a single
    /// store when a user filter is set, otherwise one per active account.
    pub async fn stores_for_user(&self, user: Option<&str>) -> Result<Vec<UserStore>> {
        match user.map(str::trim) {
            Some(name) if !name.is_empty() => Ok(vec![self.user_store(name).await?]),
            _ => self.active_user_stores().await,
        }
    }

    pub async fn active_user_stores(&self) -> Result<Vec<UserStore>> {
        let names = self.shared.users().active_names().await?;

        let mut stores = Vec::with_capacity(names.len());
        for name in names {
            stores.push(self.user_store(&name).await?);
        }
        Ok(stores)
    }

    /// Closes and deletes a user's shard file. Returns `true` when the file
    /// is gone afterwards.
    pub async fn remove_user_database(&self, slug: &UserSlug) -> bool {
        if self.detach(slug).await {
            tokio::time::sleep(SETTLE_DELAY).await;
        }

        let path = domain::user_db_path(&self.data_dir, slug);
        if !path.exists() {
            return false;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed user database '{}'", slug);
                true
            }
            Err(e) => {
                warn!("Failed to remove user database '{}': {e}", slug);
                false
            }
        }
    }

    /// Renames a shard out of the active namespace. Returns `true` when the
    /// archived file exists afterwards.
    pub async fn archive_user_database(&self, slug: &UserSlug) -> bool {
        if self.detach(slug).await {
            tokio::time::sleep(SETTLE_DELAY).await;
        }

        let from = domain::user_db_path(&self.data_dir, slug);
        let to = self.data_dir.join(slug.archived_db_file_name());
        if !from.exists() {
            return to.exists();
        }

        match tokio::fs::rename(&from, &to).await {
            Ok(()) => {
                info!("Archived user database '{}'", slug);
                true
            }
            Err(e) => {
                warn!("Failed to archive user database '{}': {e}", slug);
                false
            }
        }
    }

    /// Moves an archived shard back into the active namespace.
    pub async fn restore_user_database(&self, slug: &UserSlug) -> bool {
        let from = self.data_dir.join(slug.archived_db_file_name());
        let to = domain::user_db_path(&self.data_dir, slug);
        if !from.exists() {
            return to.exists();
        }

        match tokio::fs::rename(&from, &to).await {
            Ok(()) => {
                info!("Restored user database '{}'", slug);
                true
            }
            Err(e) => {
                warn!("Failed to restore user database '{}': {e}", slug);
                false
            }
        }
    }

    /// Shard files currently on disk as `(slug, path)` pairs. By default only
    /// shards of active accounts are listed; `include_archived` widens the
    /// scan to archived and orphaned files.
    pub async fn user_database_files(
        &self,
        include_archived: bool,
    ) -> Result<Vec<(UserSlug, PathBuf)>> {
        let active: Option<HashSet<UserSlug>> = if include_archived {
            None
        } else {
            let names = self.shared.users().active_names().await?;
            Some(names.iter().map(|n| UserSlug::from_name(n)).collect())
        };

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .with_context(|| format!("Failed to read data directory {}", self.data_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(slug) = UserSlug::from_db_file_name(file_name) else {
                continue;
            };
            if let Some(active) = &active {
                if !active.contains(&slug) {
                    continue;
                }
            }
            files.push((slug, entry.path()));
        }

        Ok(files)
    }

    /// Deletes shard files whose slug no longer matches any account.
    /// Returns how many files were removed.
    pub async fn cleanup_orphan_databases(&self) -> Result<usize> {
        let names = self.shared.users().all_names().await?;
        let valid: HashSet<UserSlug> = names.iter().map(|n| UserSlug::from_name(n)).collect();

        let mut removed = 0;
        for (slug, path) in self.user_database_files(true).await? {
            if valid.contains(&slug) {
                continue;
            }

            self.detach(&slug).await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Removed orphan user database '{}'", slug);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove orphan user database '{}': {e}", slug),
            }
        }

        Ok(removed)
    }

    /// Retries shard file deletion for accounts already marked deleted, for
    /// files that were locked when the deletion first ran. Returns how many
    /// files were removed.
    pub async fn purge_deleted_users(&self) -> Result<usize> {
        let names = self.shared.users().deleted_names().await?;

        let mut purged = 0;
        for name in names {
            let slug = UserSlug::from_name(&name);
            if self.detach(&slug).await {
                tokio::time::sleep(SETTLE_DELAY).await;
            }

            let live = domain::user_db_path(&self.data_dir, &slug);
            let archived = self.data_dir.join(slug.archived_db_file_name());
            for path in [live, archived] {
                if path.exists() && remove_with_retries(&path).await {
                    purged += 1;
                }
            }
        }

        Ok(purged)
    }

    /// Closes every open pool. Used on shutdown.
    pub async fn close_all(&self) -> Result<()> {
        let stores: Vec<UserStore> = self.users.write().await.drain().map(|(_, s)| s).collect();
        for store in stores {
            if let Err(e) = store.close().await {
                warn!("Failed to close user database '{}': {e}", store.slug());
            }
        }
        self.shared.close().await
    }

    /// Drops a shard from the registry and closes its pool. Returns whether
    /// an open store was found.
    async fn detach(&self, slug: &UserSlug) -> bool {
        let removed = self.users.write().await.remove(slug);
        match removed {
            Some(store) => {
                if let Err(e) = store.close().await {
                    warn!("Failed to close user database '{}': {e}", slug);
                }
                true
            }
            None => false,
        }
    }
}

async fn remove_with_retries(path: &Path) -> bool {
    for attempt in 1..=UNLINK_ATTEMPTS {
        match tokio::fs::remove_file(path).await {
            Ok(()) => return true,
            Err(e) => {
                warn!(
                    "Attempt {attempt} to remove '{}' failed: {e}",
                    path.display()
                );
                if attempt < UNLINK_ATTEMPTS {
                    tokio::time::sleep(UNLINK_RETRY_DELAY).await;
                }
            }
        }
    }
    false
}
