mod error;
mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use camroute_agents::{
    parse_flag, CompletionBackend, PlanRouteRequest, PlannerConfig, RoutePlanner,
};
use camroute_core::{Location, NewLocation};
use camroute_observability::{AppMetrics, MetricsSnapshot};
use camroute_storage::Store;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use crate::error::ApiError;
pub use crate::rate_limit::IpRateLimiter;

pub const DEFAULT_API_KEY: &str = "dev-camroute-key";
const MAX_BODY_BYTES: usize = 64 * 1024;

pub type Planner = RoutePlanner<Store, CompletionBackend>;

/// Server settings read from `CAMROUTE_*` environment variables.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub api_key: String,
    pub database_url: Option<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
    pub seed_sample_data: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            database_url: None,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
            allowed_origins: vec!["http://localhost:5500".to_string()],
            seed_sample_data: false,
        }
    }
}

impl ApiSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("CAMROUTE_API_KEY")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.api_key),
            database_url: env::var("CAMROUTE_DATABASE_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            rate_limit_window: env::var("CAMROUTE_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env::var("CAMROUTE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            allowed_origins: env::var("CAMROUTE_ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().trim_end_matches('/').to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.allowed_origins),
            seed_sample_data: env::var("CAMROUTE_SEED_SAMPLE_DATA")
                .map(|value| parse_flag(&value))
                .unwrap_or(false),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<Planner>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
    pub storage_backend: &'static str,
    pub completion_backend: String,
    pub coordinate_retry: bool,
}

pub async fn build_app() -> Result<Router> {
    let config = PlannerConfig::from_env().context("invalid planner configuration")?;
    build_app_with(ApiSettings::from_env(), config).await
}

pub async fn build_app_with(settings: ApiSettings, config: PlannerConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();

    let store = match settings.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };
    let storage_backend = store.backend_name();

    let backend = CompletionBackend::from_config(config.gemini.clone())
        .context("failed to initialize completion backend")?;
    if !backend.is_enabled() {
        warn!("CAMROUTE_GEMINI_API_KEY is not set, every route will use fallback estimates");
    }
    let completion_backend = backend.describe();

    let planner = Arc::new(RoutePlanner::new(
        Arc::new(store),
        backend,
        &config,
        metrics.clone(),
    ));

    if settings.seed_sample_data {
        let created = planner
            .seed_sample_locations()
            .await
            .context("failed to seed sample locations")?;
        info!(created = created.len(), "sample data ready");
    }

    let state = ApiState {
        planner,
        metrics,
        api_key: settings.api_key,
        limiter: IpRateLimiter::new(settings.rate_limit_window, settings.rate_limit_max),
        allowed_origins: Arc::new(settings.allowed_origins),
        storage_backend,
        completion_backend,
        coordinate_retry: config.coordinate_retry,
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/locations", get(list_locations).post(create_location))
        .route("/v1/locations/search", get(search_locations))
        .route(
            "/v1/locations/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route("/v1/routes", get(route_history))
        .route("/v1/routes/optimize", post(optimize_route))
        .route("/v1/routes/preview", post(preview_route))
        .route("/v1/routes/compare", get(compare_routes))
        .route("/v1/routes/:id", get(route_detail))
        .route("/v1/statistics", get(statistics))
        .route("/v1/map", get(locations_map))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    completion: bool,
    completion_backend: String,
    storage: &'static str,
    coordinate_retry: bool,
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            completion: state.completion_backend != "disabled",
            completion_backend: state.completion_backend.clone(),
            storage: state.storage_backend,
            coordinate_retry: state.coordinate_retry,
        },
    };
    (StatusCode::OK, Json(payload))
}

#[derive(Debug, Default, Deserialize)]
struct LocationListQuery {
    search: Option<String>,
    page: Option<String>,
}

async fn list_locations(
    State(state): State<ApiState>,
    query: Result<Query<LocationListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = state
        .planner
        .list_locations(query.search.as_deref(), query.page.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

async fn create_location(
    State(state): State<ApiState>,
    payload: Result<Json<NewLocation>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(draft) = payload?;
    let location = state.planner.create_location(draft).await?;
    Ok((StatusCode::CREATED, Json(location)).into_response())
}

async fn get_location(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let location = state.planner.get_location(id).await?;
    Ok((StatusCode::OK, Json(location)).into_response())
}

async fn update_location(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NewLocation>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let Json(draft) = payload?;
    let location = state.planner.update_location(id, draft).await?;
    Ok((StatusCode::OK, Json(location)).into_response())
}

async fn delete_location(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let deletion = state.planner.delete_location(id).await?;
    Ok((StatusCode::OK, Json(deletion)).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct QuickSearchQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuickSearchHit {
    id: i64,
    name: String,
    address: String,
    coordinates: [f64; 2],
}

impl From<Location> for QuickSearchHit {
    fn from(location: Location) -> Self {
        Self {
            id: location.id,
            coordinates: [location.latitude, location.longitude],
            name: location.name,
            address: location.address,
        }
    }
}

async fn search_locations(
    State(state): State<ApiState>,
    query: Result<Query<QuickSearchQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let hits: Vec<QuickSearchHit> = state
        .planner
        .quick_search(query.q.as_deref())
        .await?
        .into_iter()
        .map(QuickSearchHit::from)
        .collect();
    Ok((StatusCode::OK, Json(serde_json::json!({ "locations": hits }))).into_response())
}

async fn optimize_route(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRouteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let detail = state.planner.plan_route(request).await?;
    Ok((StatusCode::CREATED, Json(detail)).into_response())
}

#[derive(Debug, Deserialize)]
struct PreviewRequest {
    #[serde(default)]
    departure: String,
    #[serde(default)]
    destination: String,
    #[serde(default)]
    transport_mode: String,
}

async fn preview_route(
    State(state): State<ApiState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = state
        .planner
        .preview(&request.departure, &request.destination, &request.transport_mode)
        .await?;
    Ok((StatusCode::OK, Json(result)).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    user_id: Option<String>,
    page: Option<String>,
}

async fn route_history(
    State(state): State<ApiState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let history = state
        .planner
        .route_history(query.user_id.as_deref(), query.page.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(history)).into_response())
}

async fn route_detail(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let detail = state.planner.route_detail(id).await?;
    Ok((StatusCode::OK, Json(detail)).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct CompareQuery {
    #[serde(default)]
    ids: String,
}

fn parse_route_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("invalid route id '{value}'")))
        })
        .collect()
}

async fn compare_routes(
    State(state): State<ApiState>,
    query: Result<Query<CompareQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let ids = parse_route_ids(&query.ids)?;
    let comparison = state.planner.compare_routes(&ids).await?;
    Ok((StatusCode::OK, Json(comparison)).into_response())
}

async fn statistics(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let statistics = state.planner.statistics().await?;
    Ok((StatusCode::OK, Json(statistics)).into_response())
}

async fn locations_map(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let map = state.planner.locations_map().await?;
    Ok((StatusCode::OK, Json(map)).into_response())
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if header_key != state.api_key {
        return ApiError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid x-api-key",
        )
        .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if let Err(wait) = state.limiter.check(&ip) {
        let mut response = ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this IP",
        )
        .into_response();
        if let Ok(value) = HeaderValue::from_str(&wait.as_secs().max(1).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}
