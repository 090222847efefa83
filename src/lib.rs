//! Persistence and inter-process coordination for a shared-folder order
//! tracking application: per-user SQLite shards behind one registry, cached
//! cross-shard queries, billing-period math, account lifecycle, and
//! file-based sessions between running instances.

pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod ipc;
pub mod logging;
pub mod parser;
pub mod services;

pub use config::Config;
