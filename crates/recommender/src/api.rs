//! HTTP API for the cluster recommender
//!
//! Recommendation endpoints, catalogue listings, health checks and
//! Prometheus metrics. Errors are rendered as problem-detail bodies and
//! mapped by kind to a status code.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use recommender_lib::{
    cache::CachingCloudInfo, ClusterRecommendationReq, ClusterScaleoutRecommendationReq,
    ComponentStatus, Engine, HealthRegistry, RecommenderError, RecommenderMetrics,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::CorsConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub catalogue: Arc<CachingCloudInfo>,
    pub health_registry: HealthRegistry,
    pub metrics: RecommenderMetrics,
}

/// RFC 7807 style error body
#[derive(Debug, Serialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    problem_type: String,
    title: String,
    status: u16,
    detail: String,
}

fn status_for(err: &RecommenderError) -> StatusCode {
    match err {
        RecommenderError::Validation(_)
        | RecommenderError::InvertedRange
        | RecommenderError::EmptyAttributeDomain
        | RecommenderError::AlreadySatisfied { .. }
        | RecommenderError::AnchorSatisfied { .. }
        | RecommenderError::InfeasibleOnDemandRatio { .. }
        | RecommenderError::Unsatisfiable => StatusCode::BAD_REQUEST,
        RecommenderError::UnsupportedProvider(_) | RecommenderError::CatalogueRejected { .. } => {
            StatusCode::NOT_FOUND
        }
        RecommenderError::CatalogueUnavailable(_) => StatusCode::BAD_GATEWAY,
        RecommenderError::NoViableVms { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn problem_response(err: &RecommenderError) -> (StatusCode, Json<ProblemDetail>) {
    let status = status_for(err);
    (
        status,
        Json(ProblemDetail {
            problem_type: "about:blank".to_string(),
            title: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            status: status.as_u16(),
            detail: err.to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, cors: &CorsConfig) -> Result<Router> {
    let cors_layer = if cors.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = cors
            .allowed_origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin '{origin}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Ok(Router::new()
        .route(
            "/api/v1/recommender/{provider}/{service}/{region}/cluster",
            post(recommend_cluster),
        )
        .route(
            "/api/v1/recommender/{provider}/{service}/{region}/cluster/scaleout",
            post(recommend_cluster_scaleout),
        )
        .route("/api/v1/providers", get(get_providers))
        .route("/api/v1/providers/{provider}/services", get(get_services))
        .route(
            "/api/v1/providers/{provider}/services/{service}/regions",
            get(get_regions),
        )
        .route(
            "/api/v1/providers/{provider}/services/{service}/regions/{region}/zones",
            get(get_zones),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Start the API server
pub async fn serve(listen_address: &str, state: Arc<AppState>, cors: &CorsConfig) -> Result<()> {
    let app = create_router(state, cors)?;

    info!(addr = %listen_address, "Starting API server");
    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `POST /api/v1/recommender/{provider}/{service}/{region}/cluster`
async fn recommend_cluster(
    State(state): State<Arc<AppState>>,
    Path((provider, service, region)): Path<(String, String, String)>,
    Json(req): Json<ClusterRecommendationReq>,
) -> impl IntoResponse {
    let start = Instant::now();
    let result = state
        .engine
        .recommend_cluster(&provider, &service, &region, req, None)
        .await;
    state
        .metrics
        .observe_recommendation_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(resp) => {
            state.metrics.inc_recommendations(&provider);
            Json(resp).into_response()
        }
        Err(e) => problem_response(&e).into_response(),
    }
}

/// `POST /api/v1/recommender/{provider}/{service}/{region}/cluster/scaleout`
async fn recommend_cluster_scaleout(
    State(state): State<Arc<AppState>>,
    Path((provider, service, region)): Path<(String, String, String)>,
    Json(req): Json<ClusterScaleoutRecommendationReq>,
) -> impl IntoResponse {
    let start = Instant::now();
    let result = state
        .engine
        .recommend_cluster_scaleout(&provider, &service, &region, req)
        .await;
    state
        .metrics
        .observe_recommendation_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(resp) => {
            state.metrics.inc_recommendations(&provider);
            Json(resp).into_response()
        }
        Err(e) => problem_response(&e).into_response(),
    }
}

/// `GET /api/v1/providers`
async fn get_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.catalogue.providers().await {
        Ok(providers) => Json(serde_json::json!({ "providers": &*providers })).into_response(),
        Err(e) => problem_response(&e).into_response(),
    }
}

/// `GET /api/v1/providers/{provider}/services`
async fn get_services(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> impl IntoResponse {
    match state.catalogue.services(&provider).await {
        Ok(services) => Json(serde_json::json!({ "services": &*services })).into_response(),
        Err(e) => problem_response(&e).into_response(),
    }
}

/// `GET /api/v1/providers/{provider}/services/{service}/regions`
async fn get_regions(
    State(state): State<Arc<AppState>>,
    Path((provider, service)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.catalogue.regions(&provider, &service).await {
        Ok(regions) => Json(serde_json::json!({ "regions": &*regions })).into_response(),
        Err(e) => problem_response(&e).into_response(),
    }
}

/// `GET /api/v1/providers/{provider}/services/{service}/regions/{region}/zones`
async fn get_zones(
    State(state): State<Arc<AppState>>,
    Path((provider, service, region)): Path<(String, String, String)>,
) -> impl IntoResponse {
    match state.catalogue.zones(&provider, &service, &region).await {
        Ok(zones) => Json(serde_json::json!({ "zones": &*zones })).into_response(),
        Err(e) => problem_response(&e).into_response(),
    }
}

/// Health check - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check - returns 200 once the first renewal cycle finished
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}
