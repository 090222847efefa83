//! Command marker files polled by running instances.
//!
//! Only a marker's existence carries meaning; contents are fixed short
//! strings. `shutdown.cmd` asks every instance to close,
//! `shutdown_session_<id>.cmd` targets one specific instance, and
//! `admin_shutdown.cmd` targets the administration tool.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

const SHUTDOWN_FILE: &str = "shutdown.cmd";
const ADMIN_SHUTDOWN_FILE: &str = "admin_shutdown.cmd";
const SESSION_SHUTDOWN_PREFIX: &str = "shutdown_session_";

const ACTIVE_MARKER: &str = "active";
const SHUTDOWN_MARKER: &str = "shutdown";

#[derive(Debug, Clone)]
pub struct CommandChannel {
    commands_dir: PathBuf,
}

impl CommandChannel {
    #[must_use]
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands_dir: runtime_dir.into().join("commands"),
        }
    }

    #[must_use]
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    /// Asks every running instance to close.
    pub async fn request_shutdown(&self) -> Result<()> {
        self.write_marker(SHUTDOWN_FILE, ACTIVE_MARKER).await
    }

    /// Consumes a pending broadcast shutdown, reporting whether one was set.
    pub async fn take_shutdown(&self) -> bool {
        remove_marker(self.commands_dir.join(SHUTDOWN_FILE)).await
    }

    pub async fn clear_shutdown(&self) {
        remove_marker(self.commands_dir.join(SHUTDOWN_FILE)).await;
    }

    /// Asks one specific instance to close.
    pub async fn request_session_shutdown(&self, session_id: Uuid) -> Result<()> {
        self.write_marker(&session_file_name(session_id), ACTIVE_MARKER)
            .await
    }

    /// Consumes a shutdown directed at `session_id`, reporting whether one
    /// was set. Callers poll with their own session id.
    pub async fn take_session_shutdown(&self, session_id: Uuid) -> bool {
        remove_marker(self.commands_dir.join(session_file_name(session_id))).await
    }

    pub async fn clear_session_shutdown(&self, session_id: Uuid) {
        remove_marker(self.commands_dir.join(session_file_name(session_id))).await;
    }

    /// Asks the administration tool to close.
    pub async fn request_admin_shutdown(&self) -> Result<()> {
        self.write_marker(ADMIN_SHUTDOWN_FILE, SHUTDOWN_MARKER).await
    }

    /// Consumes a pending admin-tool shutdown, reporting whether one was set.
    pub async fn take_admin_shutdown(&self) -> bool {
        remove_marker(self.commands_dir.join(ADMIN_SHUTDOWN_FILE)).await
    }

    pub async fn clear_admin_shutdown(&self) {
        remove_marker(self.commands_dir.join(ADMIN_SHUTDOWN_FILE)).await;
    }

    /// Drops every pending command, leaving an empty commands directory.
    pub async fn clear_all(&self) {
        if let Err(e) = fs::remove_dir_all(&self.commands_dir).await
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(
                "Could not clear command directory {:?}: {}",
                self.commands_dir, e
            );
        }

        if let Err(e) = fs::create_dir_all(&self.commands_dir).await {
            warn!(
                "Could not recreate command directory {:?}: {}",
                self.commands_dir, e
            );
        }
    }

    async fn write_marker(&self, file_name: &str, content: &str) -> Result<()> {
        fs::create_dir_all(&self.commands_dir).await.with_context(|| {
            format!(
                "creating command directory {}",
                self.commands_dir.display()
            )
        })?;

        let path = self.commands_dir.join(file_name);
        fs::write(&path, content)
            .await
            .with_context(|| format!("writing command file {}", path.display()))?;
        Ok(())
    }
}

fn session_file_name(session_id: Uuid) -> String {
    format!("{SESSION_SHUTDOWN_PREFIX}{session_id}.cmd")
}

/// Removes a marker file. Already gone means no command was pending; any
/// other failure still counts as consumed so pollers do not loop on it.
async fn remove_marker(path: PathBuf) -> bool {
    match fs::remove_file(&path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove command file {:?}: {}", path, e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_take_consumes_broadcast_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let channel = CommandChannel::new(dir.path());

        assert!(!channel.take_shutdown().await);

        channel.request_shutdown().await.unwrap();
        let raw = tokio::fs::read_to_string(channel.commands_dir().join("shutdown.cmd"))
            .await
            .unwrap();
        assert_eq!(raw, "active");

        assert!(channel.take_shutdown().await);
        assert!(!channel.take_shutdown().await);
    }

    #[tokio::test]
    async fn test_directed_shutdown_targets_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let channel = CommandChannel::new(dir.path());
        let target = Uuid::new_v4();
        let bystander = Uuid::new_v4();

        channel.request_session_shutdown(target).await.unwrap();

        assert!(!channel.take_session_shutdown(bystander).await);
        assert!(channel.take_session_shutdown(target).await);
        assert!(!channel.take_session_shutdown(target).await);
    }

    #[tokio::test]
    async fn test_admin_channel_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let channel = CommandChannel::new(dir.path());

        channel.request_admin_shutdown().await.unwrap();
        let raw = tokio::fs::read_to_string(channel.commands_dir().join("admin_shutdown.cmd"))
            .await
            .unwrap();
        assert_eq!(raw, "shutdown");

        assert!(channel.take_admin_shutdown().await);
        assert!(!channel.take_admin_shutdown().await);
    }

    #[tokio::test]
    async fn test_clears_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let channel = CommandChannel::new(dir.path());

        channel.clear_shutdown().await;
        channel.clear_shutdown().await;
        channel.clear_session_shutdown(Uuid::new_v4()).await;
        channel.clear_admin_shutdown().await;

        channel.clear_all().await;
        assert!(channel.commands_dir().exists());
        channel.clear_all().await;
    }
}
