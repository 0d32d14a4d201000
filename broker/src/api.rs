//! HTTP API of the credential broker

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::BrokerError;
use crate::service::{DownloadAuthorization, ListEntry, UploadAuthorization};
use crate::AppState;

/// Create the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/s3-upload-url", get(upload_url))
        .route("/api/list-files", get(list_files))
        .route("/api/get-download-url", get(download_url))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    file_name: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadQuery {
    key: Option<String>,
    user_id: Option<String>,
}

/// `GET /api/s3-upload-url?fileName=..&userId=..`
async fn upload_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
) -> Result<Json<UploadAuthorization>, BrokerError> {
    state
        .broker
        .issue_upload_authorization(query.file_name.as_deref(), query.user_id.as_deref())
        .map(Json)
}

/// `GET /api/list-files?userId=..`
async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListEntry>>, BrokerError> {
    state
        .broker
        .list_objects(query.user_id.as_deref())
        .await
        .map(Json)
}

/// `GET /api/get-download-url?key=..&userId=..`
async fn download_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadAuthorization>, BrokerError> {
    state
        .broker
        .issue_download_authorization(query.key.as_deref(), query.user_id.as_deref())
        .map(Json)
}
