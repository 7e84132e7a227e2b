//! HTTP service over the catalog and job registry.
//!
//! Routes:
//! - `GET /health`
//! - `GET /api/openapi.json`
//! - `GET /api/titles`, `GET /api/titles/:id`
//! - `POST /api/download`, `GET /api/downloads`
//! - `GET /api/download/:job_id`, `DELETE /api/download/:job_id`
//!
//! Every response carries permissive CORS headers and `OPTIONS` is answered
//! with 200 before routing.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::{info, warn};

use crate::adapters::ContentFetcher;
use crate::catalog::Catalog;
use crate::core::JobRegistry;

pub use error::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub registry: JobRegistry,
}

impl AppState {
    pub fn new(
        catalog: Arc<Catalog>,
        fetcher: Arc<dyn ContentFetcher>,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        let registry = JobRegistry::new(catalog.clone(), fetcher, downloads_dir);
        Self { catalog, registry }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/openapi.json", get(handlers::openapi))
        .route("/titles", get(handlers::list_titles))
        .route("/titles/:id", get(handlers::get_title))
        .route("/download", post(handlers::start_download))
        .route("/downloads", get(handlers::list_downloads))
        .route(
            "/download/:job_id",
            get(handlers::get_download).delete(handlers::cancel_download),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("API server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
