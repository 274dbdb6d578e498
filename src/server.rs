//! HTTP comparison server
//!
//! An explicit server object constructed with its configuration and route
//! table; no process-wide mutable state. Each compare request gets its own
//! working directory for archive extraction, removed on every exit path:
//! success, failure and timeout alike.

use crate::acquire::{acquire_in, DataSource};
use crate::error::{Result, StorediffError};
use crate::report::ComparisonReport;
use crate::resolver::{compare_store_sets, CancelToken, DiffOptions};
use crate::snapshot::DirStoreSet;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Maximum divergent keys reported per store.
    pub key_diff_limit: usize,
    /// Per-request deadline; comparisons abort at the next store boundary
    /// once it passes.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().expect("valid default address"),
            key_diff_limit: crate::DEFAULT_KEY_DIFF_LIMIT,
            request_timeout_secs: 300,
        }
    }
}

/// Body of `POST /v1/compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    /// Left snapshot: directory or .tar.zst archive path.
    pub left: String,
    /// Right snapshot: directory or .tar.zst archive path.
    pub right: String,
    #[serde(default)]
    pub version_left: Option<i64>,
    #[serde(default)]
    pub version_right: Option<i64>,
    /// Overrides the server's per-store key diff limit.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Force the coarse shape diff for every differing store.
    #[serde(default)]
    pub shape: bool,
}

/// Comparison HTTP server.
pub struct DiffServer {
    config: ServerConfig,
}

impl DiffServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> Router {
        build_router(Arc::new(self.config.clone()))
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> Result<()> {
        let app = build_router(Arc::new(self.config.clone()));
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        log::info!("storediff server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("shutdown signal received");
}

fn build_router(config: Arc<ServerConfig>) -> Router {
    Router::new()
        .route("/v1/health", get(health_handler))
        .route("/v1/compare", post(compare_handler))
        .with_state(config)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "storediff",
        "version": env!("CARGO_PKG_VERSION"),
        "format_version": crate::FORMAT_VERSION,
    }))
}

async fn compare_handler(
    State(config): State<Arc<ServerConfig>>,
    Json(request): Json<CompareRequest>,
) -> Response {
    let result = tokio::task::spawn_blocking(move || run_compare(&config, request)).await;

    match result {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => error_response(StorediffError::Generic(anyhow::anyhow!(
            "comparison task failed: {}",
            e
        ))),
    }
}

/// Runs one comparison inside a per-request working directory.
fn run_compare(config: &ServerConfig, request: CompareRequest) -> Result<ComparisonReport> {
    let workspace = RequestWorkspace::create()?;
    log::debug!("request workspace at {}", workspace.path().display());

    let left_source = DataSource::parse(&request.left)?;
    let right_source = DataSource::parse(&request.right)?;
    let left_acquired = acquire_in(&left_source, Some(workspace.path()))?;
    let right_acquired = acquire_in(&right_source, Some(workspace.path()))?;

    let left_set = DirStoreSet::open(left_acquired.path(), request.version_left)?;
    let right_set = DirStoreSet::open(right_acquired.path(), request.version_right)?;

    let options = DiffOptions {
        key_diff_limit: request.limit.unwrap_or(config.key_diff_limit),
        shape_diff: request.shape,
        ..DiffOptions::default()
    };
    let cancel = CancelToken::with_timeout(Duration::from_secs(config.request_timeout_secs));

    compare_store_sets(&left_set, &right_set, options, &cancel)
    // workspace drops here, removing all request scratch space
}

fn error_response(error: StorediffError) -> Response {
    let status = match &error {
        StorediffError::Acquisition(_)
        | StorediffError::InvalidInput { .. }
        | StorediffError::Json(_) => StatusCode::BAD_REQUEST,
        StorediffError::StoreOpen { .. } | StorediffError::VersionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        StorediffError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log::warn!("compare request failed ({}): {}", status, error);
    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}

/// Scratch directory for one request, removed when dropped.
struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("storediff-req-{}-", Uuid::new_v4()))
            .tempdir()?;
        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}
