//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for transactions, alert rules and triggers
//! - File-copy backups

pub mod backup;
pub mod migrations;
pub mod repo;

pub use backup::{create_backup, list_backups, BackupError, BackupInfo};
pub use migrations::init_db;
pub use repo::{RepoError, Repository};
