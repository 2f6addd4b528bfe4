use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    cache::{CacheStatus, SourceKey},
    feeds::{
        types::{FireCollection, FireRecord, HotspotCollection, Satellite},
        FeedError,
    },
    render::{RenderPlan, RenderPlanError, DEFAULT_EXPAND_FACTOR, DEFAULT_ZOOM},
    service::WildfireService,
    utils::ErrorResponse,
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WildfireService>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenderPlanQuery {
    pub zoom: Option<u8>,
    pub expand: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cache_status: String,
    pub last_fetched: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub total: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Maps feed failures onto HTTP statuses with a JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse::new(error, message),
        }
    }

    fn from_feed(context: &str, err: FeedError) -> Self {
        let status = match err {
            FeedError::NotFound(_) => StatusCode::NOT_FOUND,
            FeedError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
            FeedError::MalformedResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::NOT_FOUND {
            tracing::error!("{}: {}", context, err);
        }
        Self::new(status, context, err.to_string())
    }
}

impl ApiError {
    fn from_render(err: RenderPlanError) -> Self {
        let status = match err {
            RenderPlanError::NoVertices(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RenderPlanError::InvalidExpandFactor(_) | RenderPlanError::TooManyTiles { .. } => {
                StatusCode::BAD_REQUEST
            }
        };
        Self::new(status, "Failed to plan fire render", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// Route handlers
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        status: "Wildfire feed API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache_status = match state.service.cache_status(SourceKey::Fires) {
        CacheStatus::Fresh => "valid",
        CacheStatus::Stale | CacheStatus::Empty => "expired",
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        cache_status: cache_status.to_string(),
        last_fetched: state.service.last_fetched(SourceKey::Fires),
    })
}

pub async fn get_fires(
    State(state): State<AppState>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<Arc<FireCollection>>, ApiError> {
    tracing::info!("Received request for fire data");

    let fires = state
        .service
        .fetch_fires(params.refresh)
        .await
        .map_err(|e| ApiError::from_feed("Failed to fetch fire data", e))?;

    Ok(Json(fires))
}

pub async fn get_fire_details(
    State(state): State<AppState>,
    Path(fire_id): Path<String>,
) -> Result<Json<FireRecord>, ApiError> {
    tracing::info!("Received request for fire details: {}", fire_id);

    match state.service.find_fire_by_id(&fire_id).await {
        Ok(fire) => Ok(Json(fire)),
        Err(FeedError::NotFound(what)) => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "Fire not found",
            format!("{} not found", what),
        )),
        Err(e) => Err(ApiError::from_feed("Failed to fetch fire details", e)),
    }
}

pub async fn refresh_fires(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    tracing::info!("Received request to refresh fire data cache");

    let fires = state
        .service
        .fetch_fires(true)
        .await
        .map_err(|e| ApiError::from_feed("Failed to refresh fire data", e))?;

    Ok(Json(RefreshResponse {
        message: "Fire data refreshed successfully".to_string(),
        total: fires.total,
        timestamp: chrono::Utc::now(),
    }))
}

pub async fn get_render_plan(
    State(state): State<AppState>,
    Path(fire_id): Path<String>,
    Query(params): Query<RenderPlanQuery>,
) -> Result<Json<RenderPlan>, ApiError> {
    let zoom = params.zoom.unwrap_or(DEFAULT_ZOOM).min(20);
    let expand = params.expand.unwrap_or(DEFAULT_EXPAND_FACTOR);
    if !expand.is_finite() || expand <= 0.0 {
        return Err(ApiError::from_render(RenderPlanError::InvalidExpandFactor(expand)));
    }

    let fire = state
        .service
        .find_fire_by_id(&fire_id)
        .await
        .map_err(|e| ApiError::from_feed("Failed to plan fire render", e))?;

    RenderPlan::for_fire(&fire, zoom, expand)
        .map(Json)
        .map_err(ApiError::from_render)
}

pub async fn get_hotspots(
    State(state): State<AppState>,
    Path(satellite): Path<String>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<Arc<HotspotCollection>>, ApiError> {
    let source: Satellite = satellite
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, "Endpoint not found", e))?;

    tracing::info!("Received request for {} hotspot data", source);

    let hotspots = state
        .service
        .fetch_hotspots(source, params.refresh)
        .await
        .map_err(|e| ApiError::from_feed(&format!("Failed to fetch {} data", source), e))?;

    Ok(Json(hotspots))
}

async fn not_found() -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "Endpoint not found",
        "The requested resource was not found",
    )
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/fires", get(get_fires))
        .route("/api/fires/refresh", post(refresh_fires))
        .route("/api/fires/:fire_id", get(get_fire_details))
        .route("/api/fires/:fire_id/render-plan", get(get_render_plan))
        .route("/api/:satellite", get(get_hotspots))
        .fallback(not_found)
        .with_state(state)
}
