//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query parameters or the multipart body via axum
//! extractors, calls into AppState services, and returns JSON responses.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use resume_core::types::Metadata;
use resume_vector::{InsertOutcome, QueryHit};

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the uploaded document.
const FILE_FIELD: &str = "file";

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub top_k: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<QueryHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub entries: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub entries: usize,
    pub dimension: Option<usize>,
    pub generation: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /upload - add a document to the index.
///
/// 200 with the new metadata, or 409 with the stored metadata when the
/// filename is already indexed.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    };
    if filename.is_empty() {
        return Err(ApiError::BadRequest("Empty filename".to_string()));
    }

    let outcome = state.pipeline.ingest_document(&filename, &bytes).await?;

    let response = match outcome {
        InsertOutcome::Inserted(metadata) => (
            StatusCode::OK,
            Json(UploadResponse {
                message: "Resume uploaded and embedded".to_string(),
                metadata,
            }),
        ),
        InsertOutcome::Duplicate(metadata) => {
            info!(filename = %metadata.filename, "Upload rejected as duplicate");
            (
                StatusCode::CONFLICT,
                Json(UploadResponse {
                    message: format!("Resume \"{}\" already uploaded.", metadata.filename),
                    metadata,
                }),
            )
        }
    };

    Ok(response)
}

/// GET /search - nearest documents to free-text `query`.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query param".to_string()))?;

    let top_k = state.config.effective_top_k(params.top_k);
    let results = state.search_engine.search(&query, top_k).await?;

    Ok(Json(SearchResponse { query, results }))
}

/// GET /health - liveness and entry count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        entries: state.store.len(),
    })
}

/// GET /stats - store summary.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.stats()?;
    Ok(Json(StatsResponse {
        entries: stats.entries,
        dimension: stats.dimension,
        generation: stats.generation,
    }))
}
