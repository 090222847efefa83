//! Periodic database upkeep: lightweight `ANALYZE` + `PRAGMA optimize`
//! sweeps over the shared database and every active user shard, rate-limited
//! by a marker file so app startups stay cheap.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::StoreRegistry;

const MARKER_FILE: &str = "last_optimization.txt";

pub struct MaintenanceService {
    registry: Arc<StoreRegistry>,
    runtime_dir: PathBuf,
    interval_days: u64,
}

impl MaintenanceService {
    #[must_use]
    pub const fn new(registry: Arc<StoreRegistry>, runtime_dir: PathBuf, interval_days: u64) -> Self {
        Self {
            registry,
            runtime_dir,
            interval_days,
        }
    }

    /// Optimizes every database unless a sweep ran recently. Returns whether
    /// a sweep actually happened. Individual databases failing to optimize
    /// are logged and skipped, never fatal.
    pub async fn run_auto_maintenance(&self) -> Result<bool> {
        if !self.needs_optimization().await {
            debug!("Automatic maintenance skipped (last sweep is recent)");
            return Ok(false);
        }

        info!("Starting automatic database maintenance");

        let mut optimized = 0usize;
        if let Err(e) = optimize(&self.registry.shared().conn).await {
            warn!("Failed to optimize shared database: {e}");
        } else {
            optimized += 1;
        }

        match self.registry.active_user_stores().await {
            Ok(stores) => {
                for store in stores {
                    match optimize(&store.conn).await {
                        Ok(()) => optimized += 1,
                        Err(e) => warn!("Failed to optimize user database '{}': {e}", store.slug()),
                    }
                }
            }
            Err(e) => warn!("Could not enumerate user databases for maintenance: {e}"),
        }

        self.record_optimization().await;
        info!("Automatic maintenance finished ({optimized} database(s) optimized)");
        Ok(true)
    }

    /// A sweep is due when no marker exists, the marker is unreadable, or
    /// the configured interval has elapsed.
    async fn needs_optimization(&self) -> bool {
        let marker = self.runtime_dir.join(MARKER_FILE);
        let Ok(content) = tokio::fs::read_to_string(&marker).await else {
            return true;
        };
        let Ok(last) = DateTime::parse_from_rfc3339(content.trim()) else {
            return true;
        };

        let elapsed = Utc::now() - last.with_timezone(&Utc);
        elapsed > chrono::Duration::days(self.interval_days.try_into().unwrap_or(i64::MAX))
    }

    async fn record_optimization(&self) {
        if let Err(e) = tokio::fs::create_dir_all(&self.runtime_dir).await {
            warn!("Could not create runtime directory for maintenance marker: {e}");
            return;
        }
        let marker = self.runtime_dir.join(MARKER_FILE);
        if let Err(e) = tokio::fs::write(&marker, Utc::now().to_rfc3339()).await {
            warn!("Could not record maintenance run: {e}");
        }
    }
}

async fn optimize(conn: &sea_orm::DatabaseConnection) -> Result<()> {
    conn.execute_unprepared("ANALYZE").await?;
    conn.execute_unprepared("PRAGMA optimize").await?;
    Ok(())
}
