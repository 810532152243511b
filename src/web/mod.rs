//! Web server: axum HTTP endpoints for the browser UI.
//!
//! - `GET /` — single-page UI
//! - `GET /api/frame` — one JPEG frame from the source
//! - `GET|POST|DELETE /api/screenshots` — list / capture+save / clear
//! - `GET|POST|DELETE /api/archives` — list / create / clear
//! - `POST /api/archives/bundle` — bundle every archive into one zip
//! - `POST /api/auto-refresh` — flip the live-view refresh toggle
//! - `GET /screenshots/*`, `GET /archives/*` — artifact downloads
//!
//! Every failure is rendered as a short status string; nothing here takes
//! the process down once it is serving.

mod ui;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use image::RgbImage;
use serde_json::{json, Value};
use tokio::task::JoinError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::capture::FrameSource;
use crate::store::{format_entries, ArchiveOutcome, ArtifactStore, NO_ARCHIVES, NO_SCREENSHOTS};

/// JPEG quality for the live view.
const JPEG_QUALITY: u8 = 85;

/// Shared state behind every handler.
pub struct AppState {
    source: Mutex<Box<dyn FrameSource>>,
    store: ArtifactStore,
    auto_refresh: AtomicBool,
    started_at: Instant,
}

impl AppState {
    pub fn new(source: Box<dyn FrameSource>, store: ArtifactStore) -> Self {
        Self {
            source: Mutex::new(source),
            store,
            auto_refresh: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Release the capture source; called once on shutdown.
    pub fn release_source(&self) {
        self.source.lock().unwrap().release();
    }

    fn capture_frame(&self) -> Result<RgbImage, String> {
        self.source
            .lock()
            .unwrap()
            .capture()
            .map_err(|e| e.to_string())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let screenshots_dir = state.store.screenshots_dir().to_path_buf();
    let archives_dir = state.store.archives_dir().to_path_buf();

    Router::new()
        .route("/", get(index))
        .route("/api/frame", get(frame))
        .route("/api/status", get(status))
        .route("/api/auto-refresh", post(toggle_auto_refresh))
        .route(
            "/api/screenshots",
            get(list_screenshots)
                .post(take_screenshot)
                .delete(clear_screenshots),
        )
        .route(
            "/api/archives",
            get(list_archives).post(create_archive).delete(clear_archives),
        )
        .route("/api/archives/bundle", post(bundle_archives))
        .nest_service("/screenshots", ServeDir::new(screenshots_dir))
        .nest_service("/archives", ServeDir::new(archives_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: Arc<AppState>, bind: SocketAddr) -> Result<(), std::io::Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!("Web server listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown requested");
}

async fn index() -> Html<&'static str> {
    Html(ui::INDEX_HTML)
}

/// GET /api/frame — capture one frame and return it as JPEG bytes.
async fn frame(State(state): State<Arc<AppState>>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let frame = state.capture_frame()?;
        encode_jpeg(&frame)
    })
    .await;

    match flatten(result) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(message) => {
            warn!("Frame request failed: {}", message);
            (StatusCode::SERVICE_UNAVAILABLE, message).into_response()
        }
    }
}

/// GET /api/status — mode-independent server status.
async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "autoRefresh": state.auto_refresh.load(Ordering::SeqCst),
    }))
}

/// POST /api/auto-refresh — flip the toggle consulted by the UI timer.
async fn toggle_auto_refresh(State(state): State<Arc<AppState>>) -> Json<Value> {
    let enabled = !state.auto_refresh.fetch_xor(true, Ordering::SeqCst);
    let status = if enabled {
        "Auto refresh enabled"
    } else {
        "Auto refresh disabled"
    };
    Json(json!({ "enabled": enabled, "status": status }))
}

/// POST /api/screenshots — capture a frame and persist it.
async fn take_screenshot(State(state): State<Arc<AppState>>) -> Json<Value> {
    let result = tokio::task::spawn_blocking(move || {
        let frame = state.capture_frame()?;
        state
            .store
            .save_screenshot(&frame)
            .map_err(|e| e.to_string())
    })
    .await;

    match flatten(result) {
        Ok(filename) => Json(json!({
            "status": format!("Screenshot saved: {}", filename),
            "filename": filename,
        })),
        Err(message) => {
            warn!("Screenshot failed: {}", message);
            Json(json!({
                "status": format!("Screenshot failed: {}", message),
                "filename": Value::Null,
            }))
        }
    }
}

async fn list_screenshots(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.store.list_screenshots() {
        Ok(entries) => Json(json!({
            "entries": entries,
            "formatted": format_entries(&entries, NO_SCREENSHOTS),
        })),
        Err(e) => listing_error(e.to_string()),
    }
}

async fn list_archives(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.store.list_archives() {
        Ok(entries) => Json(json!({
            "entries": entries,
            "formatted": format_entries(&entries, NO_ARCHIVES),
        })),
        Err(e) => listing_error(e.to_string()),
    }
}

fn listing_error(message: String) -> Json<Value> {
    warn!("Listing failed: {}", message);
    Json(json!({
        "entries": [],
        "formatted": format!("Listing failed: {}", message),
    }))
}

async fn clear_screenshots(State(state): State<Arc<AppState>>) -> Json<Value> {
    let deleted = state.store.clear_screenshots();
    Json(json!({
        "status": format!("Cleared {} screenshot(s)", deleted),
        "deleted": deleted,
    }))
}

async fn clear_archives(State(state): State<Arc<AppState>>) -> Json<Value> {
    let deleted = state.store.clear_archives();
    Json(json!({
        "status": format!("Cleared {} archive(s)", deleted),
        "deleted": deleted,
    }))
}

/// POST /api/archives — bundle current screenshots into a new zip.
async fn create_archive(State(state): State<Arc<AppState>>) -> Json<Value> {
    let result =
        tokio::task::spawn_blocking(move || state.store.archive_screenshots().map_err(|e| e.to_string()))
            .await;
    archive_response(result, "Nothing to archive")
}

/// POST /api/archives/bundle — bundle every archive into one outer zip.
async fn bundle_archives(State(state): State<Arc<AppState>>) -> Json<Value> {
    let result =
        tokio::task::spawn_blocking(move || state.store.archive_all_archives().map_err(|e| e.to_string()))
            .await;
    archive_response(result, "No archives to bundle")
}

fn archive_response(
    result: Result<Result<ArchiveOutcome, String>, JoinError>,
    empty_message: &str,
) -> Json<Value> {
    match flatten(result) {
        Ok(ArchiveOutcome::Created { path, count }) => Json(json!({
            "status": format!("Created archive with {} file(s)", count),
            "path": path.to_string_lossy(),
            "count": count,
        })),
        Ok(ArchiveOutcome::Empty) => Json(json!({
            "status": empty_message,
            "path": Value::Null,
            "count": 0,
        })),
        Err(message) => {
            warn!("Archive failed: {}", message);
            Json(json!({
                "status": format!("Archive failed: {}", message),
                "path": Value::Null,
                "count": 0,
            }))
        }
    }
}

fn flatten<T>(result: Result<Result<T, String>, JoinError>) -> Result<T, String> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(format!("background task failed: {}", e)),
    }
}

fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode_image(frame)
        .map_err(|e| format!("Failed to encode JPEG: {}", e))?;
    Ok(bytes)
}
