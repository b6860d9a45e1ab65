//! File-copy backups of the SQLite database.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const BACKUP_PREFIX: &str = "portfolio_backup_";
const BACKUP_SUFFIX: &str = ".db";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Backup file name for a given instant, `portfolio_backup_<YYYYMMDD_HHMMSS>.db`.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{BACKUP_PREFIX}{}{BACKUP_SUFFIX}",
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Checkpoint the WAL into the main file and copy it into `backup_dir`.
pub async fn create_backup(
    pool: &SqlitePool,
    db_path: &Path,
    backup_dir: &Path,
) -> Result<BackupInfo, BackupError> {
    create_backup_at(pool, db_path, backup_dir, Utc::now()).await
}

pub async fn create_backup_at(
    pool: &SqlitePool,
    db_path: &Path,
    backup_dir: &Path,
    at: DateTime<Utc>,
) -> Result<BackupInfo, BackupError> {
    sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
        .execute(pool)
        .await?;

    tokio::fs::create_dir_all(backup_dir).await?;
    let file_name = backup_file_name(at);
    let path = backup_dir.join(&file_name);
    let size_bytes = tokio::fs::copy(db_path, &path).await?;

    info!(path = %path.display(), size_bytes, "Database backup created");
    Ok(BackupInfo {
        file_name,
        path,
        size_bytes,
    })
}

/// Backups in `backup_dir`, newest first. A missing directory yields an empty list.
pub async fn list_backups(backup_dir: &Path) -> Result<Vec<BackupInfo>, BackupError> {
    let mut entries = match tokio::fs::read_dir(backup_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !(file_name.starts_with(BACKUP_PREFIX) && file_name.ends_with(BACKUP_SUFFIX)) {
            continue;
        }
        let size_bytes = entry.metadata().await?.len();
        backups.push(BackupInfo {
            file_name,
            path: entry.path(),
            size_bytes,
        });
    }

    // The timestamp format sorts lexicographically.
    backups.sort_by(|a, b| b.file_name.cmp(&a.file_name));
    Ok(backups)
}
