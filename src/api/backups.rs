use crate::api::AppState;
use crate::db::{self, BackupInfo};
use crate::error::AppError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::path::Path;

pub async fn create_backup(State(state): State<AppState>) -> Result<(StatusCode, Json<BackupInfo>), AppError> {
    let info = db::create_backup(
        state.repo.pool(),
        Path::new(&state.config.database_path),
        Path::new(&state.config.backup_dir),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn list_backups(State(state): State<AppState>) -> Result<Json<Vec<BackupInfo>>, AppError> {
    Ok(Json(db::list_backups(Path::new(&state.config.backup_dir)).await?))
}
