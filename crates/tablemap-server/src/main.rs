//! Tablemap Relay Server
//!
//! Holds the admin's latest scene in memory for guests to poll, lists the
//! token and asset images on disk, and stores saved map renders.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /api/map/sync        -> { "timestamp": 17, "data": <scene or null> }
//! POST /api/map/sync        <- <scene>            -> { "status": "success" }
//! GET  /api/map/assets      -> { "nature": ["/static/assets/map/nature/tree.png"] }
//! GET  /api/map/characters  -> ["/static/assets/characters/elf.png"]
//! POST /api/map/save        <- { image, filename, metadata } -> { status, path }
//! GET  /data/maps/{file}
//! GET  /static/assets/{file}
//! ```

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

/// Scenes with embedded backgrounds are large.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];
const DEFAULT_MAP_NAME: &str = "untitled_map";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "tablemap-server", version, about = "Tablemap relay and asset server")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: SocketAddr,

    /// Directory holding `map/<category>/*` assets and `characters/*` portraits
    #[arg(long, default_value = "static/assets")]
    assets_dir: PathBuf,

    /// Directory saved maps are written to
    #[arg(long, default_value = "data/maps")]
    maps_dir: PathBuf,
}

/// Latest scene pushed by the admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct SyncState {
    data: Option<Value>,
    timestamp: u64,
}

/// Shared application state
struct AppState {
    sync: RwLock<SyncState>,
    assets_dir: PathBuf,
    maps_dir: PathBuf,
}

impl AppState {
    fn new(assets_dir: PathBuf, maps_dir: PathBuf) -> Self {
        Self {
            sync: RwLock::new(SyncState::default()),
            assets_dir,
            maps_dir,
        }
    }

    /// Store a scene under a timestamp strictly greater than the previous one.
    async fn publish(&self, data: Value) -> u64 {
        let mut sync = self.sync.write().await;
        sync.timestamp = (sync.timestamp + 1).max(unix_millis());
        sync.data = Some(data);
        sync.timestamp
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Error returned as `{ "error": message }`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablemap_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    tokio::fs::create_dir_all(&args.maps_dir).await?;
    tokio::fs::create_dir_all(args.assets_dir.join("map")).await?;
    tokio::fs::create_dir_all(args.assets_dir.join("characters")).await?;

    let state = Arc::new(AppState::new(args.assets_dir.clone(), args.maps_dir.clone()));
    let app = router(state);

    info!("Tablemap server listening on {}", args.addr);
    info!("Assets from {}, maps in {}", args.assets_dir.display(), args.maps_dir.display());

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, app).await
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/map/sync", get(get_sync).post(post_sync))
        .route("/api/map/assets", get(list_assets))
        .route("/api/map/characters", get(list_characters))
        .route("/api/map/save", post(save_map))
        .route("/health", get(health))
        .nest_service("/data/maps", ServeDir::new(&state.maps_dir))
        .nest_service("/static/assets", ServeDir::new(&state.assets_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn get_sync(State(state): State<Arc<AppState>>) -> Json<SyncState> {
    Json(state.sync.read().await.clone())
}

async fn post_sync(State(state): State<Arc<AppState>>, Json(data): Json<Value>) -> Json<Value> {
    let timestamp = state.publish(data).await;
    info!("Scene published at {}", timestamp);
    Json(json!({ "status": "success" }))
}

async fn list_assets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, Vec<String>>>, ApiError> {
    let root = state.assets_dir.join("map");
    let mut assets = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(&root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let category = entry.file_name().to_string_lossy().into_owned();
        let files = list_images(&entry.path(), &format!("/static/assets/map/{category}")).await?;
        assets.insert(category, files);
    }
    Ok(Json(assets))
}

async fn list_characters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let dir = state.assets_dir.join("characters");
    Ok(Json(list_images(&dir, "/static/assets/characters").await?))
}

/// URLs of the image files directly inside `dir`, sorted by name.
async fn list_images(dir: &Path, url_prefix: &str) -> std::io::Result<Vec<String>> {
    let mut urls = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_image_name(&name) {
            urls.push(format!("{url_prefix}/{name}"));
        }
    }
    urls.sort();
    Ok(urls)
}

fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Body of a save request.
#[derive(Debug, Deserialize)]
struct SaveRequest {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct SaveResponse {
    status: String,
    path: String,
}

async fn save_map(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    let image = request
        .image
        .filter(|image| !image.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image data provided"))?;
    let bytes = decode_image_data(&image)?;

    let name = sanitize_filename(request.filename.as_deref().unwrap_or(DEFAULT_MAP_NAME));
    let image_path = state.maps_dir.join(format!("{name}.png"));
    let meta_path = state.maps_dir.join(format!("{name}_meta.json"));

    let metadata = serde_json::to_string_pretty(&request.metadata)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    tokio::fs::write(&image_path, &bytes).await?;
    tokio::fs::write(&meta_path, metadata).await?;

    info!("Saved map {} ({} bytes)", image_path.display(), bytes.len());
    Ok(Json(SaveResponse {
        status: "success".to_string(),
        path: image_path.display().to_string(),
    }))
}

/// Decode a base64 payload, with or without a `data:...;base64,` header.
fn decode_image_data(image: &str) -> Result<Vec<u8>, ApiError> {
    let encoded = image.split_once(',').map_or(image, |(_, data)| data);
    STANDARD.decode(encoded.trim()).map_err(|e| {
        warn!("Rejected save with invalid image data: {}", e);
        ApiError::bad_request(format!("Invalid image data: {e}"))
    })
}

/// Keep letters, digits, spaces, dashes and underscores; trim the result.
fn sanitize_filename(name: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let clean = clean.trim();
    if clean.is_empty() {
        DEFAULT_MAP_NAME.to_string()
    } else {
        clean.to_string()
    }
}
