//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::catalog::{TitleEntry, TitleFilter, TitleId};
use crate::core::JobOptions;

const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Catalog entry as served over HTTP
#[derive(Debug, Serialize)]
pub struct TitleView {
    pub id: TitleId,
    pub name: String,
    pub region: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub platform: &'static str,
    pub format: &'static str,
}

impl From<&TitleEntry> for TitleView {
    fn from(entry: &TitleEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            region: entry.region.label(),
            kind: entry.id.kind().label(),
            platform: entry.id.platform().label(),
            format: entry.id.format().label(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleQuery {
    pub category: Option<String>,
    pub region: Option<String>,
    pub platform: Option<String>,
    pub format: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub title_id: Option<String>,
    #[serde(default, alias = "decrypt")]
    pub transform: bool,
    #[serde(default, alias = "delete_encrypted")]
    pub delete_after: bool,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "time": Utc::now().to_rfc3339(),
        "version": API_VERSION,
    }))
}

pub async fn openapi(headers: HeaderMap) -> Json<Value> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");

    Json(json!({
        "openapi": "3.0.3",
        "info": {
            "title": "titledl API",
            "version": API_VERSION,
        },
        "servers": [
            { "url": format!("http://{}/api", host), "description": "API Server" }
        ],
        "paths": {
            "/titles": { "get": { "summary": "List catalog titles" } },
            "/titles/{id}": { "get": { "summary": "Get one title" } },
            "/download": { "post": { "summary": "Start a download job" } },
            "/downloads": { "get": { "summary": "List download jobs" } },
            "/download/{id}": {
                "get": { "summary": "Get job status" },
                "delete": { "summary": "Cancel a job" }
            }
        }
    }))
}

pub async fn list_titles(
    State(state): State<AppState>,
    Query(query): Query<TitleQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = TitleFilter::from_tokens(
        query.category.as_deref(),
        query.region.as_deref(),
        query.platform.as_deref(),
        query.format.as_deref(),
        query.search.as_deref(),
    )?;

    let titles: Vec<TitleView> = state
        .catalog
        .filter(&filter)
        .into_iter()
        .map(TitleView::from)
        .collect();

    Ok(Json(json!({
        "count": titles.len(),
        "titles": titles,
    })))
}

pub async fn get_title(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TitleView>, ApiError> {
    let title_id: TitleId = id.parse()?;
    state
        .catalog
        .lookup(title_id)
        .map(|entry| Json(TitleView::from(entry)))
        .ok_or_else(|| ApiError::NotFound("Title not found".to_string()))
}

pub async fn start_download(
    State(state): State<AppState>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;

    let raw_id = request
        .title_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("title_id is required".to_string()))?;
    let title_id: TitleId = raw_id.parse()?;

    let options = JobOptions {
        transform: request.transform,
        delete_after: request.delete_after,
    };
    let snapshot = state.registry.create_job(title_id, options).await?;
    info!(job_id = %snapshot.id, "Download accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": snapshot.id,
            "status": "started",
            "title": snapshot.title_name,
        })),
    ))
}

pub async fn list_downloads(State(state): State<AppState>) -> Json<Value> {
    let jobs = state.registry.list_jobs().await;
    Json(json!({
        "count": jobs.len(),
        "jobs": jobs,
    }))
}

pub async fn get_download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registry
        .get_job(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}

pub async fn cancel_download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.registry.cancel_job(&job_id).await?;
    Ok(Json(json!({
        "status": "cancelled",
        "job_id": job_id,
    })))
}
