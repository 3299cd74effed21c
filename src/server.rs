use crate::boundary::{NativeHost, RecognizeRequest};
use crate::config::Config;
use crate::error::BoundaryError;
use crate::everything::SearchResultItem;
use crate::ocr::{OcrResult, OcrSupport};
use axum::{
    extract::{multipart::Field, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Room for multipart headers and the small text fields around the image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub host: Arc<NativeHost>,
    pub config: Arc<Config>,
}

/// Search request body
#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub options: Option<Value>,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: Option<String>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInfo {
    pub name: String,
    pub description: String,
    pub supported_languages: Vec<String>,
}

/// Server info response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub version: String,
    pub ocr: EngineInfo,
    pub ocr_support: OcrSupport,
    pub search_available: bool,
    pub max_image_size_bytes: usize,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let host = NativeHost::for_current_platform(config.everything_dll.clone());
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        host: Arc::new(host),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_image_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/ocr", post(handle_ocr))
        .route("/ocr/support", get(handle_ocr_support))
        .route("/search", post(handle_search))
        .route("/query", post(handle_query))
        .route("/everything/version", get(handle_everything_version))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn invalid(message: impl Into<String>) -> BoundaryError {
    BoundaryError::InvalidArgument(message.into())
}

async fn field_text(field: Field<'_>, name: &str) -> Result<String, BoundaryError> {
    field
        .text()
        .await
        .map_err(|e| invalid(format!("Invalid {}: {}", name, e)))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResult>, BoundaryError> {
    let mut request = RecognizeRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| invalid(format!("Failed to read image data: {}", e)))?;
                request.image = Some(bytes.to_vec());
            }
            "languageHint" => {
                request.language_hint = Some(field_text(field, "languageHint").await?);
            }
            "includeLayout" => {
                request.include_layout = Some(parse_flag(&field_text(field, "includeLayout").await?));
            }
            "maxBlocks" => {
                let text = field_text(field, "maxBlocks").await?;
                let max_blocks = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| invalid(format!("maxBlocks must be an integer, got '{}'", text)))?;
                request.max_blocks = Some(max_blocks);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    if let Some(image) = &request.image {
        if image.len() > state.config.max_image_size {
            return Err(invalid(format!(
                "Image too large: {} bytes (max: {} bytes)",
                image.len(),
                state.config.max_image_size
            )));
        }
    }

    let result = state.host.recognize_image_text(request).await?;

    tracing::info!(
        "OCR completed in {}ms with {}, text length: {}",
        result.duration_ms,
        result.engine,
        result.text.len()
    );

    Ok(Json(result))
}

async fn handle_ocr_support(State(state): State<AppState>) -> Json<OcrSupport> {
    Json(state.host.native_ocr_support())
}

fn search_body(
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<SearchRequest, BoundaryError> {
    body.map(|Json(body)| body)
        .map_err(|rejection| invalid(format!("Invalid search request: {}", rejection.body_text())))
}

/// The SDK query blocks until the index answers, so it runs off the runtime.
async fn search_blocking<F>(
    host: Arc<NativeHost>,
    call: F,
) -> Result<Json<Vec<SearchResultItem>>, BoundaryError>
where
    F: FnOnce(&NativeHost) -> Result<Vec<SearchResultItem>, BoundaryError> + Send + 'static,
{
    let items = tokio::task::spawn_blocking(move || call(&host))
        .await
        .map_err(|e| BoundaryError::Internal(format!("Everything search worker failed: {}", e)))??;
    Ok(Json(items))
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<SearchResultItem>>, BoundaryError> {
    let body = search_body(body)?;
    search_blocking(state.host, move |host| {
        host.search(&body.query, body.options.as_ref())
    })
    .await
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<SearchResultItem>>, BoundaryError> {
    let body = search_body(body)?;
    search_blocking(state.host, move |host| {
        host.query(&body.query, body.options.as_ref())
    })
    .await
}

async fn handle_everything_version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.host.everything_version(),
    })
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.host.ocr_provider();
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr: EngineInfo {
            name: provider.name().to_string(),
            description: provider.description().to_string(),
            supported_languages: provider.supported_languages(),
        },
        ocr_support: provider.support(),
        search_available: state.host.search_available(),
        max_image_size_bytes: state.config.max_image_size,
    })
}
