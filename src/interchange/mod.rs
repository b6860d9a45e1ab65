//! CSV and JSON import/export of the transaction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub mod csv_io;
pub mod json_io;

pub use csv_io::{export_transactions_csv, import_csv, parse_transactions_csv, CsvImport};
pub use json_io::{
    build_export, export_portfolio_json, import_json, parse_portfolio_json, JsonImport,
    PortfolioExport,
};

/// Framing failure that aborts a whole import or export.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("invalid JSON document: {0}")]
    Json(String),
    #[error("export I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// A row or section that was skipped during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportIssue {
    pub section: String,
    /// CSV line number or array index within the JSON section.
    pub index: usize,
    pub message: String,
}

impl ImportIssue {
    pub fn new(section: &str, index: usize, message: impl Into<String>) -> Self {
        Self {
            section: section.to_string(),
            index,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub transactions_imported: usize,
    pub transaction_ids: Vec<i64>,
    pub alerts_imported: usize,
    pub errors: Vec<ImportIssue>,
}

/// `portfolio_export_<YYYYMMDD_HHMMSS>.<ext>`
pub fn export_file_name(ext: &str, at: DateTime<Utc>) -> String {
    format!("portfolio_export_{}.{}", at.format("%Y%m%d_%H%M%S"), ext)
}

/// Write an export document into `dir`, creating it if needed.
pub async fn write_export(
    dir: &Path,
    ext: &str,
    contents: &[u8],
    at: DateTime<Utc>,
) -> Result<PathBuf, InterchangeError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(export_file_name(ext, at));
    tokio::fs::write(&path, contents).await?;
    info!(path = %path.display(), bytes = contents.len(), "Export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_export_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(export_file_name("csv", at), "portfolio_export_20241231_235958.csv");
    }

    #[tokio::test]
    async fn test_write_export_creates_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("exports");
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = write_export(&dir, "json", b"{}", at).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }
}
