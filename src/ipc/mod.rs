//! File-based coordination between running instances.
//!
//! Instances sharing a data directory discover each other through small
//! session marker files and ask each other to close through command marker
//! files, both kept under the runtime directory. There is no file locking:
//! every operation is idempotent, and two processes racing to delete the
//! same file both treat "already gone" as success.

pub mod commands;
pub mod session;

pub use commands::CommandChannel;
pub use session::{SessionInfo, SessionKind, SessionRegistry};

use uuid::Uuid;

/// Identity of this process, created once at startup and shared with every
/// session operation.
#[derive(Debug, Clone)]
pub struct InstanceContext {
    pub session_id: Uuid,
    pub hostname: String,
}

impl InstanceContext {
    #[must_use]
    pub fn new() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            session_id: Uuid::new_v4(),
            hostname,
        }
    }
}

impl Default for InstanceContext {
    fn default() -> Self {
        Self::new()
    }
}
