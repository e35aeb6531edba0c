use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppError,
    services::{
        engine::RawTable,
        sheet::{
            suggest_mapping,
            types::{ColumnKind, ColumnProfile, SuggestedMapping},
            utils::{file_name_from_url, load_file_from_url},
            SheetAnalyzer, SheetReader,
        },
    },
    AppState,
};

const SAMPLE_ROWS: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sheets/inspect", post(inspect_sheet))
        .route("/sheets/import", post(import_sheet))
}

#[derive(Debug, Deserialize)]
pub struct InspectParams {
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    url: String,
    filename: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ColumnAnalysis {
    name: String,
    kind: ColumnKind,
    sample_values: Vec<String>,
    null_count: usize,
    unique_count: usize,
    looks_like_serial: bool,
}

impl From<ColumnProfile> for ColumnAnalysis {
    fn from(profile: ColumnProfile) -> Self {
        Self {
            name: profile.name,
            kind: profile.kind,
            sample_values: profile.sample_values.to_vec(),
            null_count: profile.null_count,
            unique_count: profile.unique_count,
            looks_like_serial: profile.looks_like_serial,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InspectResponse {
    dataset_id: String,
    row_count: usize,
    column_count: usize,
    headers: Vec<String>,
    sample_data: Vec<Vec<String>>,
    column_analysis: Vec<ColumnAnalysis>,
    suggested_mapping: SuggestedMapping,
}

/// Accepts the sheet as the raw request body.
async fn inspect_sheet(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InspectParams>,
    body: Bytes,
) -> Result<Json<InspectResponse>, AppError> {
    tracing::info!(
        "Inspecting uploaded sheet {:?} ({}KB)",
        params.filename,
        body.len() / 1024
    );
    ingest(&state, body, params.filename).await.map(Json)
}

async fn import_sheet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<InspectResponse>, AppError> {
    if request.url.trim().is_empty() {
        return Err(AppError::InvalidInput("No file URL provided".to_string()));
    }

    tracing::info!("Downloading file from URL...");
    let download_start = std::time::Instant::now();
    let file_data = load_file_from_url(&request.url, state.config.fetch_timeout).await?;
    tracing::info!(
        "File downloaded, size: {}KB, took: {:?}",
        file_data.len() / 1024,
        download_start.elapsed()
    );

    let file_name = request.filename.or_else(|| file_name_from_url(&request.url));
    ingest(&state, file_data, file_name).await.map(Json)
}

async fn ingest(
    state: &AppState,
    file_data: Bytes,
    file_name: Option<String>,
) -> Result<InspectResponse, AppError> {
    if file_data.is_empty() {
        return Err(AppError::InvalidInput("File is empty".to_string()));
    }
    if file_data.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File is {}KB, the limit is {}KB",
            file_data.len() / 1024,
            state.config.max_file_size / 1024
        )));
    }

    let start = std::time::Instant::now();
    let (table, profiles) = tokio::task::spawn_blocking(move || {
        let table = SheetReader.read(file_data, file_name.as_deref())?;
        let profiles = SheetAnalyzer.profile(&table);
        Ok::<_, AppError>((table, profiles))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Sheet task failed: {}", e)))??;

    let suggested_mapping = suggest_mapping(&table.headers, &profiles);
    let sample_data = sample_rows(&table);
    let headers = table.headers.clone();
    let row_count = table.rows.len();
    let dataset_id = state.store.insert_raw(table);

    tracing::info!(
        "Sheet {} stored: {} rows, {} columns, analyzed in {:?}",
        dataset_id,
        row_count,
        headers.len(),
        start.elapsed()
    );

    Ok(InspectResponse {
        dataset_id,
        row_count,
        column_count: headers.len(),
        headers,
        sample_data,
        column_analysis: profiles.into_iter().map(ColumnAnalysis::from).collect(),
        suggested_mapping,
    })
}

fn sample_rows(table: &RawTable) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, config::Config};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    const CSV: &str = "日期与时间,主播姓名,千川消耗,销售数量,销售额\n\
                       2026-01-01 10:00,A,50,1,100\n\
                       2026-01-01 14:00,B,50,5,250\n";

    async fn send(state: Arc<AppState>, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let response = app(state)
            .oneshot(Request::post(uri).body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_inspect_csv_suggests_mapping() {
        let state = Arc::new(AppState::new(Config::default()));
        let (status, body) = send(state.clone(), "/sheets/inspect?filename=sales.csv", CSV).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["row_count"], 2);
        assert_eq!(body["column_count"], 5);
        assert_eq!(body["suggested_mapping"]["time"], "日期与时间");
        assert_eq!(body["suggested_mapping"]["performer"], "主播姓名");
        assert_eq!(body["suggested_mapping"]["revenue"], "销售额");
        assert_eq!(body["sample_data"][0][1], "A");

        let id = body["dataset_id"].as_str().unwrap();
        assert_eq!(state.store.raw(id).unwrap().rows.len(), 2);
    }

    #[tokio::test]
    async fn test_inspect_rejects_empty_body() {
        let state = Arc::new(AppState::new(Config::default()));
        let (status, body) = send(state, "/sheets/inspect", "").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::new(AppState::new(Config::default())))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
