use crate::api::AppState;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::interchange::{self, ImportReport};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::Json;
use serde::Deserialize;
use std::path::Path;

const EXPORT_PATH_HEADER: HeaderName = HeaderName::from_static("x-export-path");

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Also write the document into the export directory.
    #[serde(default)]
    pub save: bool,
}

async fn respond_with_export(
    state: &AppState,
    save: bool,
    ext: &str,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let at = TimeMs::now();
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));

    let file_name = interchange::export_file_name(ext, at.to_datetime());
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    if save {
        let path = interchange::write_export(
            Path::new(&state.config.export_dir),
            ext,
            &body,
            at.to_datetime(),
        )
        .await?;
        if let Ok(value) = HeaderValue::from_str(&path.to_string_lossy()) {
            headers.insert(EXPORT_PATH_HEADER, value);
        }
    }
    Ok((headers, body))
}

pub async fn export_csv(
    Query(params): Query<ExportQuery>,
    State(state): State<AppState>,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let transactions = state.repo.list_transactions_asc().await?;
    let body = interchange::export_transactions_csv(&transactions)?;
    respond_with_export(&state, params.save, "csv", "text/csv; charset=utf-8", body).await
}

pub async fn export_json(
    Query(params): Query<ExportQuery>,
    State(state): State<AppState>,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let export = interchange::export_portfolio_json(&state.repo, TimeMs::now()).await?;
    let body = serde_json::to_vec_pretty(&export)
        .map_err(|e| AppError::Internal(format!("Failed to encode export: {}", e)))?;
    respond_with_export(&state, params.save, "json", "application/json", body).await
}

pub async fn import_csv(State(state): State<AppState>, body: Bytes) -> Result<Json<ImportReport>, AppError> {
    Ok(Json(interchange::import_csv(&state.repo, &body).await?))
}

pub async fn import_json(State(state): State<AppState>, body: Bytes) -> Result<Json<ImportReport>, AppError> {
    Ok(Json(
        interchange::import_json(&state.repo, &state.alerts, &body).await?,
    ))
}
