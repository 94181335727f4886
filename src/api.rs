use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_macros::debug_handler;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::classify::ActiveFilters;
use crate::config::Config;
use crate::enrichment::Enricher;
use crate::error::{AppError, AppResult};
use crate::generation::{GroqGenerator, TextGenerator, GENERATION_TIMEOUT};
use crate::markets::{
    Coordinates, Geocoder, MarketFinder, MarketPoint, OverpassClient, GEOCODE_TIMEOUT, OVERPASS_TIMEOUT,
};
use crate::product::{ProductClient, PRODUCT_LOOKUP_TIMEOUT};
use crate::scan::{ScanResponse, Scanner};
use crate::upload::{UploadStore, MAX_UPLOAD_BYTES};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScanFilters {
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub health: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanRequest {
    pub barcode: Option<String>,
    #[serde(default)]
    pub filters: ScanFilters,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FindMarketsRequest {
    pub zipcode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub place: String,
    pub state: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Serialize)]
pub struct FindMarketsResponse {
    pub success: bool,
    pub zipcode: String,
    pub location: LocationResponse,
    pub count: usize,
    pub markets: Vec<MarketPoint>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_enrichment: bool,
}

#[derive(Clone)]
pub struct AppState {
    scanner: Scanner,
    markets: MarketFinder,
    uploads: UploadStore,
    ai_enabled: bool,
}

impl AppState {
    pub fn new(scanner: Scanner, markets: MarketFinder, uploads: UploadStore, ai_enabled: bool) -> Self {
        Self {
            scanner,
            markets,
            uploads,
            ai_enabled,
        }
    }

    /// Builds every outbound client from the loaded configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let generator: Option<Arc<dyn TextGenerator>> = match config.groq_api_key.as_deref() {
            Some(key) => Some(Arc::new(GroqGenerator::new(
                key,
                &config.groq_api_base,
                &config.groq_model,
                GENERATION_TIMEOUT,
            )?) as Arc<dyn TextGenerator>),
            None => None,
        };
        let ai_enabled = generator.is_some();

        let scanner = Scanner::new(
            ProductClient::new(&config.product_api_base, PRODUCT_LOOKUP_TIMEOUT)?,
            Enricher::new(generator),
        );
        let markets = MarketFinder::new(
            Geocoder::new(&config.geocode_api_base, GEOCODE_TIMEOUT)?,
            OverpassClient::new(&config.overpass_api_url, OVERPASS_TIMEOUT)?,
            config.market_radius_miles,
        );

        Ok(Self::new(scanner, markets, UploadStore::new(config.upload_dir.clone()), ai_enabled))
    }
}

pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/health", get(health))
        .route("/scan", post(scan_barcode))
        .route("/find-markets", post(find_markets))
        .route("/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn json_error(rejection: JsonRejection, missing: &str) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge;
    }
    debug!(error = %rejection.body_text(), "Rejected request body");
    AppError::InvalidInput(missing.to_string())
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        warn!(error = %err.body_text(), "Malformed multipart body");
        AppError::InvalidInput("Error reading uploaded file".to_string())
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ai_enrichment: state.ai_enabled,
    })
}

#[debug_handler]
async fn scan_barcode(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> AppResult<Json<ScanResponse>> {
    let Json(request) = payload.map_err(|e| json_error(e, "No barcode provided"))?;
    let barcode = request
        .barcode
        .ok_or_else(|| AppError::InvalidInput("No barcode provided".to_string()))?;

    let filters = ActiveFilters::parse(&request.filters.dietary, &request.filters.health);
    let response = state.scanner.scan(&barcode, &filters).await?;
    Ok(Json(response))
}

#[debug_handler]
async fn find_markets(
    State(state): State<AppState>,
    payload: Result<Json<FindMarketsRequest>, JsonRejection>,
) -> AppResult<Json<FindMarketsResponse>> {
    let Json(request) = payload.map_err(|e| json_error(e, "No ZIP code provided"))?;
    let zipcode = request
        .zipcode
        .ok_or_else(|| AppError::InvalidInput("No ZIP code provided".to_string()))?;

    let search = state.markets.find(&zipcode).await?;
    Ok(Json(FindMarketsResponse {
        success: true,
        zipcode: zipcode.trim().to_string(),
        location: LocationResponse {
            place: search.location.place,
            state: search.location.state,
            coordinates: search.location.coordinates,
        },
        count: search.markets.len(),
        markets: search.markets,
    }))
}

#[debug_handler]
async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let mut multipart =
        multipart.map_err(|_| AppError::InvalidInput("No file uploaded".to_string()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let stored = state.uploads.save(&filename, &bytes).await?;

        return Ok(Json(UploadResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            filename: stored,
            note: "Barcode extraction from images is not yet implemented".to_string(),
        }));
    }

    Err(AppError::InvalidInput("No file uploaded".to_string()))
}
