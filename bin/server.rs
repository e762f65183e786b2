// finboard - Web Server
// REST API over the dashboard session with Axum

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use finboard::{AppPaths, BatchInfo, BatchSummary, FinboardError, Upload, ViewKind, WorkingSet};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

const ADDR_ENV: &str = "FINBOARD_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Shared server state; one dashboard session behind a mutex
#[derive(Clone)]
struct ServerState {
    app: Arc<Mutex<finboard::AppState>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, Response>;

fn status_for(err: &FinboardError) -> StatusCode {
    match err {
        FinboardError::NotFound { .. } => StatusCode::NOT_FOUND,
        FinboardError::DuplicateCategory(_) => StatusCode::CONFLICT,
        e if e.is_user_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fail(context: &str, err: FinboardError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("{}: {}", context, err);
    } else {
        warn!("{}: {}", context, err);
    }
    (status, Json(ApiResponse::failure(err.to_string()))).into_response()
}

fn lock(state: &ServerState) -> Result<MutexGuard<'_, finboard::AppState>, Response> {
    state.app.lock().map_err(|_| {
        error!("Session mutex poisoned");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::failure("Session unavailable".to_string())),
        )
            .into_response()
    })
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
struct UploadFile {
    name: String,
    content: String,
}

#[derive(Deserialize)]
struct UploadRequest {
    files: Vec<UploadFile>,
    /// Save the categorized result under this batch name
    #[serde(default)]
    save_as: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    working_set: WorkingSet,
    summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<BatchInfo>,
}

#[derive(Deserialize)]
struct NewCategory {
    name: String,
}

#[derive(Deserialize)]
struct NewKeyword {
    keyword: String,
}

#[derive(Serialize)]
struct KeywordResponse {
    added: bool,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/batches - Saved batches with counts
async fn list_batches(State(state): State<ServerState>) -> ApiResult<Vec<BatchInfo>> {
    let app = lock(&state)?;
    let infos = app
        .store()
        .list_batch_info()
        .map_err(|e| fail("Error listing batches", e))?;
    Ok(Json(ApiResponse::ok(infos)))
}

/// GET /api/batches/:name - Rows of one batch
async fn get_batch(State(state): State<ServerState>, Path(name): Path<String>) -> ApiResult<WorkingSet> {
    let mut app = lock(&state)?;
    let working = app
        .open_batch(&name)
        .map_err(|e| fail(&format!("Error loading batch {}", name), e))?
        .clone();
    Ok(Json(ApiResponse::ok(working)))
}

/// PUT /api/batches/:name - Save (replace) a batch from an edited working set
async fn save_batch(
    State(state): State<ServerState>,
    Path(name): Path<String>,
    Json(working): Json<WorkingSet>,
) -> ApiResult<BatchInfo> {
    let app = lock(&state)?;
    let info = app
        .store()
        .save_working_set(&name, &working)
        .map_err(|e| fail(&format!("Error saving batch {}", name), e))?;
    info!("Saved batch {} via API", info.name);
    Ok(Json(ApiResponse::ok(info)))
}

/// DELETE /api/batches/:name - Remove a batch (no error when absent)
async fn delete_batch(State(state): State<ServerState>, Path(name): Path<String>) -> ApiResult<DeleteResponse> {
    let mut app = lock(&state)?;
    let deleted = app
        .delete_batch(&name)
        .map_err(|e| fail(&format!("Error deleting batch {}", name), e))?;
    Ok(Json(ApiResponse::ok(DeleteResponse { deleted })))
}

/// GET /api/batches/:name/summary - Totals and group-bys
async fn batch_summary(State(state): State<ServerState>, Path(name): Path<String>) -> ApiResult<BatchSummary> {
    let app = lock(&state)?;
    let working = app
        .store()
        .load_batch(&name)
        .map_err(|e| fail(&format!("Error loading batch {}", name), e))?;
    Ok(Json(ApiResponse::ok(BatchSummary::from_working_set(&working))))
}

/// GET /api/categories - Category → keywords object, in file order
async fn list_categories(State(state): State<ServerState>) -> ApiResult<serde_json::Value> {
    let app = lock(&state)?;
    Ok(Json(ApiResponse::ok(app.categories.to_json())))
}

/// POST /api/categories - Create an empty category
async fn add_category(
    State(state): State<ServerState>,
    Json(body): Json<NewCategory>,
) -> Result<(StatusCode, Json<ApiResponse<String>>), Response> {
    let mut app = lock(&state)?;
    app.add_category(&body.name)
        .map_err(|e| fail("Error adding category", e))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(body.name.trim().to_string()))))
}

/// POST /api/categories/:name/keywords - Attach a keyword
async fn add_keyword(
    State(state): State<ServerState>,
    Path(category): Path<String>,
    Json(body): Json<NewKeyword>,
) -> ApiResult<KeywordResponse> {
    let mut app = lock(&state)?;
    let added = app
        .add_keyword(&category, &body.keyword)
        .map_err(|e| fail(&format!("Error adding keyword to {}", category), e))?;
    Ok(Json(ApiResponse::ok(KeywordResponse { added })))
}

/// POST /api/uploads - Normalize + categorize CSV payloads
async fn upload(State(state): State<ServerState>, Json(body): Json<UploadRequest>) -> ApiResult<UploadResponse> {
    let uploads: Vec<Upload> = body
        .files
        .into_iter()
        .map(|f| Upload::new(f.name, f.content))
        .collect();

    let mut app = lock(&state)?;
    let working_set = app
        .ingest(&uploads)
        .map_err(|e| fail("Error loading file", e))?
        .clone();

    let saved = match body.save_as {
        Some(name) => Some(
            app.save_view(ViewKind::Upload, &name)
                .map_err(|e| fail(&format!("Error saving batch {}", name), e))?,
        ),
        None => None,
    };

    Ok(Json(ApiResponse::ok(UploadResponse {
        summary: BatchSummary::from_working_set(&working_set),
        working_set,
        saved,
    })))
}

// ============================================================================
// Main Server
// ============================================================================

fn router(state: ServerState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/batches", get(list_batches))
        .route("/batches/:name", get(get_batch).put(save_batch).delete(delete_batch))
        .route("/batches/:name/summary", get(batch_summary))
        .route("/categories", get(list_categories).post(add_category))
        .route("/categories/:name/keywords", post(add_keyword))
        .route("/uploads", post(upload))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 finboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("❌ Could not resolve data directory: {}", e);
            eprintln!("   Set {} to choose one.", finboard::config::DATA_DIR_ENV);
            std::process::exit(1);
        }
    };

    let session = match finboard::AppState::open(&paths) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("❌ Failed to open session in {}: {}", paths.base_dir().display(), e);
            std::process::exit(1);
        }
    };
    println!("✓ Data directory: {}", paths.base_dir().display());

    let state = ServerState {
        app: Arc::new(Mutex::new(session)),
    };

    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/batches", addr);
    println!("\n   Press Ctrl+C to stop\n");

    if let Err(e) = axum::serve(listener, router(state)).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
