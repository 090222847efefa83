//! Session marker files advertising live instances.
//!
//! Each running instance owns one `<session-id>.session` file whose JSON
//! payload names the user and host. The file's modification time doubles as
//! a liveness signal: instances refresh it periodically and stale files are
//! swept by [`SessionRegistry::cleanup_inactive`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::InstanceContext;
use super::commands::CommandChannel;

const SESSION_EXT: &str = "session";

/// What kind of process owns a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    App,
    AdminTool,
}

/// What gets written into the session file. Older files may lack the kind
/// field and read back as [`SessionKind::App`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionPayload {
    user: String,
    hostname: String,
    #[serde(default)]
    kind: SessionKind,
}

/// A live session as read back from the sessions directory.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub user: String,
    pub hostname: String,
    pub kind: SessionKind,
    pub last_updated: DateTime<Utc>,
}

pub struct SessionRegistry {
    sessions_dir: PathBuf,
    context: InstanceContext,
    registered: RwLock<Option<SessionPayload>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(runtime_dir: impl Into<PathBuf>, context: InstanceContext) -> Self {
        Self {
            sessions_dir: runtime_dir.into().join("sessions"),
            context,
            registered: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    #[must_use]
    pub const fn context(&self) -> &InstanceContext {
        &self.context
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.context.session_id
    }

    /// Writes this instance's session file, replacing any previous one.
    pub async fn register(&self, user: &str, kind: SessionKind) -> Result<()> {
        let payload = SessionPayload {
            user: user.trim().to_string(),
            hostname: self.context.hostname.clone(),
            kind,
        };

        info!(
            "Registering session {} for user {} on {} ({:?})",
            self.context.session_id, payload.user, payload.hostname, kind
        );
        self.write_session_file(&payload).await?;
        *self.registered.write().await = Some(payload);
        Ok(())
    }

    /// Removes this instance's session file; already gone is fine.
    pub async fn unregister(&self) {
        info!("Removing session {}", self.context.session_id);
        self.remove_session_file(self.context.session_id).await;
        // A later stray heartbeat must not resurrect the file.
        *self.registered.write().await = None;
    }

    /// Bumps the session file's modification time so other instances keep
    /// seeing this one as alive. Recreates the file if it vanished.
    pub async fn heartbeat(&self) {
        let path = self.session_file(self.context.session_id);
        if filetime::set_file_mtime(&path, FileTime::now()).is_ok() {
            return;
        }

        let payload = self.registered.read().await.clone();
        let Some(payload) = payload else {
            debug!("Heartbeat before registration, nothing to refresh");
            return;
        };

        warn!("Session file {:?} went missing, recreating it", path);
        if let Err(e) = self.write_session_file(&payload).await {
            warn!("Could not recreate session file {:?}: {}", path, e);
        }
    }

    /// Scans the sessions directory. Unreadable or corrupt files are skipped
    /// with a warning, never failing the scan.
    pub async fn active_sessions(&self) -> Vec<SessionInfo> {
        match self.scan_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Could not list sessions in {:?}: {}", self.sessions_dir, e);
                Vec::new()
            }
        }
    }

    pub async fn sessions_for_user(&self, user: &str) -> Vec<SessionInfo> {
        let mut sessions = self.active_sessions().await;
        sessions.retain(|session| session.user == user);
        sessions
    }

    /// Looks for another session belonging to the same user. Only the session
    /// id separates "another" from this one; the hostname plays no part.
    pub async fn already_logged_in(
        &self,
        user: &str,
        ignore_admin_tools: bool,
    ) -> Option<SessionInfo> {
        self.sessions_for_user(user).await.into_iter().find(|session| {
            session.session_id != self.context.session_id
                && !(ignore_admin_tools && session.kind == SessionKind::AdminTool)
        })
    }

    /// Looks for another admin-tool session belonging to the same user.
    pub async fn admin_session_elsewhere(&self, user: &str) -> Option<SessionInfo> {
        self.sessions_for_user(user).await.into_iter().find(|session| {
            session.session_id != self.context.session_id
                && session.kind == SessionKind::AdminTool
        })
    }

    /// Deletes a session file. A session that is already gone counts as
    /// terminated.
    pub async fn terminate(&self, session_id: Uuid) -> Result<()> {
        let path = self.session_file(session_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("removing session file {}", path.display()))
            }
        }
    }

    /// Sweeps session files whose modification time is older than `timeout`,
    /// covering instances that crashed without unregistering.
    pub async fn cleanup_inactive(&self, timeout: Duration) -> usize {
        let cutoff = Utc::now() - timeout;
        let mut removed = 0;

        for session in self.active_sessions().await {
            if session.last_updated < cutoff && self.remove_session_file(session.session_id).await
            {
                debug!(
                    "Removed inactive session {} (user {})",
                    session.session_id, session.user
                );
                removed += 1;
            }
        }

        removed
    }

    /// Removes every session belonging to `user` without signalling them,
    /// used when a fresh login displaces the previous one.
    pub async fn remove_sessions_for_user(&self, user: &str) -> usize {
        let mut removed = 0;
        for session in self.sessions_for_user(user).await {
            if self.remove_session_file(session.session_id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Asks every session of `user` to close through a directed command, then
    /// removes the session files. Administrative archive and delete go
    /// through here so the targeted instances learn why they were closed.
    pub async fn shutdown_sessions_for_user(
        &self,
        user: &str,
        commands: &CommandChannel,
    ) -> usize {
        let sessions = self.sessions_for_user(user).await;

        for session in &sessions {
            info!("Sending shutdown command to session {}", session.session_id);
            if let Err(e) = commands.request_session_shutdown(session.session_id).await {
                warn!("Could not signal session {}: {}", session.session_id, e);
            }
        }

        let mut removed = 0;
        for session in sessions {
            if self.remove_session_file(session.session_id).await {
                removed += 1;
            }
        }
        removed
    }

    async fn scan_sessions(&self) -> Result<Vec<SessionInfo>> {
        let mut sessions = Vec::new();

        if !self.sessions_dir.exists() {
            return Ok(sessions);
        }

        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_EXT) {
                continue;
            }

            match read_session(&path).await {
                Ok(info) => sessions.push(info),
                Err(e) => warn!("Skipping unreadable session file {:?}: {}", path, e),
            }
        }

        Ok(sessions)
    }

    async fn write_session_file(&self, payload: &SessionPayload) -> Result<()> {
        fs::create_dir_all(&self.sessions_dir).await.with_context(|| {
            format!(
                "creating session directory {}",
                self.sessions_dir.display()
            )
        })?;

        let path = self.session_file(self.context.session_id);
        let json = serde_json::to_string(payload)?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("writing session file {}", path.display()))?;
        Ok(())
    }

    async fn remove_session_file(&self, session_id: Uuid) -> bool {
        let path = self.session_file(session_id);
        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Could not remove session file {:?}: {}", path, e);
                false
            }
        }
    }

    fn session_file(&self, session_id: Uuid) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.{SESSION_EXT}"))
    }
}

async fn read_session(path: &Path) -> Result<SessionInfo> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow::anyhow!("file name is not valid UTF-8"))?;
    let session_id = Uuid::parse_str(stem).context("file name is not a session id")?;

    let raw = fs::read_to_string(path).await?;
    let payload: SessionPayload = serde_json::from_str(&raw)?;

    let metadata = fs::metadata(path).await?;
    let modified: DateTime<Utc> = metadata.modified()?.into();

    Ok(SessionInfo {
        session_id,
        user: payload.user,
        hostname: payload.hostname,
        kind: payload.kind,
        last_updated: modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(hostname: &str) -> InstanceContext {
        InstanceContext {
            session_id: Uuid::new_v4(),
            hostname: hostname.to_string(),
        }
    }

    #[tokio::test]
    async fn test_corrupt_session_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path(), context("posto-01"));
        registry.register("ana", SessionKind::App).await.unwrap();

        fs::write(registry.sessions_dir().join("not-a-uuid.session"), "{}")
            .await
            .unwrap();
        fs::write(
            registry
                .sessions_dir()
                .join(format!("{}.session", Uuid::new_v4())),
            "not json",
        )
        .await
        .unwrap();

        let sessions = registry.active_sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user, "ana");
        assert_eq!(sessions[0].hostname, "posto-01");
    }

    #[tokio::test]
    async fn test_payload_without_kind_reads_as_app() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path(), context("posto-01"));
        let id = Uuid::new_v4();

        fs::create_dir_all(registry.sessions_dir()).await.unwrap();
        fs::write(
            registry.sessions_dir().join(format!("{id}.session")),
            r#"{"user":"rui","hostname":"posto-02"}"#,
        )
        .await
        .unwrap();

        let sessions = registry.active_sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, id);
        assert_eq!(sessions[0].kind, SessionKind::App);
    }

    #[tokio::test]
    async fn test_heartbeat_recreates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path(), context("posto-01"));
        registry.register("ana", SessionKind::App).await.unwrap();

        let path = registry
            .sessions_dir()
            .join(format!("{}.session", registry.session_id()));
        fs::remove_file(&path).await.unwrap();

        registry.heartbeat().await;

        assert!(path.exists());
        let sessions = registry.active_sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user, "ana");
    }
}
