//!
//! contentd HTTP server
//! --------------------
//! This module defines the Axum-based HTTP API for contentd.
//!
//! Responsibilities:
//! - Contents API: GET/PUT/DELETE under `/api/v1/contents`, delegating to the
//!   fingerprint-guarded `FileStore` on the blocking thread pool.
//! - Device passthrough: screenshot and UI hierarchy for an attached device.
//! - Permissive CORS headers and `OPTIONS` preflight on every route.
//! - Startup logging and graceful shutdown that tears down the device pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine as _;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::contents::{DeleteRequest, Entry, FileStore, FsEntry, PutRequest, WriteStatus};
use crate::device::{AdbConnector, DevicePool, ImageKind};
use crate::error::{AppError, AppResult};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub devices: Arc<DevicePool>,
}

impl AppState {
    pub fn new(store: FileStore, devices: DevicePool) -> Self {
        Self { store: Arc::new(store), devices: Arc::new(devices) }
    }
}

/// Log where we are running from and what will be served.
fn log_startup_folders(cfg: &ServerConfig, store: &FileStore) {
    let cwd = std::env::current_dir().ok();
    let exe = std::env::current_exe().ok();
    info!(
        target: "startup",
        "contentd starting. cwd={:?}, exe={:?}, root_param={:?}, root_resolved={:?}, adb={:?}",
        cwd, exe, cfg.root, store.root(), cfg.adb_path
    );
}

/// Build the HTTP router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "contentd ok" }))
        .route("/api/v1/version", get(version))
        .route("/api/v1/contents", get(get_root))
        .route("/api/v1/contents/", get(get_root))
        .route("/api/v1/contents/{*path}", get(get_contents).put(put_contents).delete(delete_contents))
        .route("/api/v1/devices/{serial}/screenshot", get(device_screenshot))
        .route("/api/v1/devices/{serial}/uiview", get(device_uiview))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Start the server with the given configuration and block until Ctrl-C.
pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cfg.root)
        .with_context(|| format!("Failed to create or access contents root: {}", cfg.root.display()))?;
    let store = FileStore::new(&cfg.root)
        .map_err(|e| anyhow::anyhow!("While opening contents root {}: {}", cfg.root.display(), e))?;
    log_startup_folders(&cfg, &store);

    let devices = DevicePool::new(Arc::new(AdbConnector::new(cfg.adb_path.clone())));
    let state = AppState::new(store, devices);
    let devices = state.devices.clone();
    let app = router(state);

    let addr = SocketAddr::new(cfg.bind_addr, cfg.http_port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    devices.shutdown();
    info!("exit success");
    Ok(())
}

/// Convenience entry point using environment configuration only.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::from_env()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("exiting...");
}

/// Run blocking filesystem or device work off the async workers.
/// A panic in `f` surfaces as an internal error instead of taking the server down.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(r) => r,
        Err(e) => Err(AppError::internal("task_failed", format!("blocking task failed: {}", e))),
    }
}

async fn cors(req: Request, next: Next) -> Response {
    debug!(target: "http", method = %req.method(), uri = %req.uri(), "request");
    let mut resp = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    let h = resp.headers_mut();
    h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    h.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("x-requested-with"));
    h.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST, GET, PUT, DELETE, OPTIONS"));
    resp
}

async fn version() -> impl IntoResponse {
    Json(json!({ "name": env!("CARGO_PKG_VERSION") }))
}

async fn get_root(State(state): State<AppState>) -> AppResult<Response> {
    get_contents_at(state, String::new()).await
}

async fn get_contents(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    get_contents_at(state, path).await
}

async fn get_contents_at(state: AppState, path: String) -> AppResult<Response> {
    let store = state.store.clone();
    let entry = blocking(move || store.get(&path)).await?;
    Ok(match entry {
        FsEntry::File(f) => Json(Entry::File(f)).into_response(),
        FsEntry::Directory(entries) => Json(entries).into_response(),
    })
}

async fn put_contents(State(state): State<AppState>, Path(path): Path<String>, body: Bytes) -> AppResult<Response> {
    let req: PutRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::user("bad_request", format!("invalid request body: {}", e)))?;
    let store = state.store.clone();
    let out = blocking(move || store.put(&path, &req.content, req.sha.as_deref())).await?;
    let status = match out.status {
        WriteStatus::Created => StatusCode::CREATED,
        WriteStatus::Updated => StatusCode::OK,
    };
    Ok((status, Json(json!({ "content": Entry::File(out.entry) }))).into_response())
}

async fn delete_contents(State(state): State<AppState>, Path(path): Path<String>, body: Bytes) -> AppResult<Response> {
    // An empty or null body carries no fingerprint, which never matches.
    let req: DeleteRequest = if body.iter().all(|b| b.is_ascii_whitespace()) {
        DeleteRequest::default()
    } else {
        serde_json::from_slice::<Option<DeleteRequest>>(&body)
            .map_err(|e| AppError::user("bad_request", format!("invalid request body: {}", e)))?
            .unwrap_or_default()
    };
    let store = state.store.clone();
    blocking(move || store.delete(&path, req.sha.as_deref())).await?;
    Ok(Json(json!({ "content": null, "description": "successfully deleted file" })).into_response())
}

async fn device_screenshot(State(state): State<AppState>, Path(serial): Path<String>) -> AppResult<Response> {
    let devices = state.devices.clone();
    let image = blocking(move || -> AppResult<Vec<u8>> { Ok(devices.get(&serial)?.capture_screenshot()?) }).await?;
    let kind = ImageKind::detect(&image)
        .ok_or_else(|| AppError::device("device_bad_image", "screenshot is neither PNG nor JPEG"))?;
    Ok(Json(json!({
        "type": kind.as_str(),
        "encoding": "base64",
        "data": base64::engine::general_purpose::STANDARD.encode(&image),
    }))
    .into_response())
}

async fn device_uiview(State(state): State<AppState>, Path(serial): Path<String>) -> AppResult<Response> {
    let devices = state.devices.clone();
    let nodes = blocking(move || -> AppResult<_> { Ok(devices.get(&serial)?.dump_ui_tree()?) }).await?;
    Ok(Json(json!({ "nodes": nodes })).into_response())
}
