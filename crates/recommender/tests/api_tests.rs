//! Integration tests for the recommender API endpoints

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use recommender_lib::{
    cache::CachingCloudInfo,
    cloudinfo::{CloudInfoSource, ProductDetails, Provider, Region, Service, ZonePrice},
    health::components,
    Attribute, ClusterRecommendationReq, ClusterScaleoutRecommendationReq, ComponentStatus,
    Engine, HealthRegistry, RecommenderError, RecommenderMetrics,
};
use tower::ServiceExt;

/// Catalogue stub with a small fixed product list
struct StubCloudInfo;

#[async_trait]
impl CloudInfoSource for StubCloudInfo {
    async fn get_providers(&self) -> Result<Vec<Provider>, RecommenderError> {
        Ok(vec![Provider {
            provider: "amazon".to_string(),
        }])
    }

    async fn get_services(&self, _provider: &str) -> Result<Vec<Service>, RecommenderError> {
        Ok(vec![Service {
            service: "eks".to_string(),
        }])
    }

    async fn get_regions(
        &self,
        _provider: &str,
        _service: &str,
    ) -> Result<Vec<Region>, RecommenderError> {
        Ok(vec![Region {
            id: "eu-west-1".to_string(),
            name: "EU (Ireland)".to_string(),
        }])
    }

    async fn get_zones(
        &self,
        _provider: &str,
        _service: &str,
        _region: &str,
    ) -> Result<Vec<String>, RecommenderError> {
        Ok(vec!["eu-west-1a".to_string(), "eu-west-1b".to_string()])
    }

    async fn get_attribute_values(
        &self,
        _provider: &str,
        _service: &str,
        _region: &str,
        attribute: Attribute,
    ) -> Result<Vec<f64>, RecommenderError> {
        Ok(match attribute {
            Attribute::Cpu => vec![2.0, 4.0, 8.0, 16.0],
            Attribute::Memory => vec![4.0, 8.0, 16.0, 32.0],
        })
    }

    async fn get_product_details(
        &self,
        _provider: &str,
        _service: &str,
        _region: &str,
    ) -> Result<Vec<ProductDetails>, RecommenderError> {
        let product = |instance_type: &str, cpus: f64, mem: f64, od: f64, spot: f64| {
            ProductDetails {
                instance_type: instance_type.to_string(),
                on_demand_price: od,
                spot_prices: vec![
                    ZonePrice {
                        zone: "eu-west-1a".to_string(),
                        price: spot,
                    },
                    ZonePrice {
                        zone: "eu-west-1b".to_string(),
                        price: spot,
                    },
                ],
                cpus,
                mem,
                gpus: 0.0,
                burst: false,
                ntw_perf: "Up to 10 Gigabit".to_string(),
                ntw_perf_cat: "high".to_string(),
                current_gen: true,
            }
        };
        Ok(vec![
            product("m5.large", 2.0, 4.0, 0.1, 0.03),
            product("m5.xlarge", 4.0, 8.0, 0.2, 0.06),
            product("m5.2xlarge", 8.0, 16.0, 0.4, 0.12),
        ])
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    health_registry: HealthRegistry,
}

fn status_for(err: &RecommenderError) -> StatusCode {
    match err {
        RecommenderError::UnsupportedProvider(_) | RecommenderError::CatalogueRejected { .. } => {
            StatusCode::NOT_FOUND
        }
        RecommenderError::CatalogueUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn recommend_cluster(
    State(state): State<Arc<AppState>>,
    Path((provider, service, region)): Path<(String, String, String)>,
    Json(req): Json<ClusterRecommendationReq>,
) -> impl IntoResponse {
    match state
        .engine
        .recommend_cluster(&provider, &service, &region, req, None)
        .await
    {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => (
            status_for(&e),
            Json(serde_json::json!({ "detail": e.to_string() })),
        )
            .into_response(),
    }
}

async fn recommend_cluster_scaleout(
    State(state): State<Arc<AppState>>,
    Path((provider, service, region)): Path<(String, String, String)>,
    Json(req): Json<ClusterScaleoutRecommendationReq>,
) -> impl IntoResponse {
    match state
        .engine
        .recommend_cluster_scaleout(&provider, &service, &region, req)
        .await
    {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => (
            status_for(&e),
            Json(serde_json::json!({ "detail": e.to_string() })),
        )
            .into_response(),
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let cache = Arc::new(CachingCloudInfo::new(
        Arc::new(StubCloudInfo),
        Duration::from_secs(3600),
        RecommenderMetrics::new(),
    ));
    let engine = Arc::new(Engine::new(cache));

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLOUD_INFO).await;
    health_registry.register(components::REFRESHER).await;

    let state = Arc::new(AppState {
        engine,
        health_registry,
    });
    let router = Router::new()
        .route(
            "/api/v1/recommender/{provider}/{service}/{region}/cluster",
            post(recommend_cluster),
        )
        .route(
            "/api/v1/recommender/{provider}/{service}/{region}/cluster/scaleout",
            post(recommend_cluster_scaleout),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state.clone());

    (router, state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_recommend_cluster_returns_node_pools() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/recommender/amazon/eks/eu-west-1/cluster",
            serde_json::json!({
                "sumCpu": 32,
                "sumMem": 64,
                "minNodes": 2,
                "maxNodes": 10,
                "onDemandPct": 50,
                "zones": ["eu-west-1a", "eu-west-1b"]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["provider"], "amazon");
    assert_eq!(body["service"], "eks");
    assert_eq!(body["region"], "eu-west-1");
    assert!(body["nodePools"].as_array().unwrap().len() > 1);
    assert!(body["accuracy"]["cpu"].as_f64().unwrap() >= 32.0);
    assert!(body["accuracy"]["memory"].as_f64().unwrap() >= 64.0);
    assert!(body["accuracy"]["totalPrice"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_recommend_cluster_rejects_inverted_bounds() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/recommender/amazon/eks/eu-west-1/cluster",
            serde_json::json!({
                "sumCpu": 32,
                "sumMem": 64,
                "minNodes": 10,
                "maxNodes": 5
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["detail"],
        "min value cannot be larger than the max value"
    );
}

#[tokio::test]
async fn test_recommend_cluster_unknown_provider_is_404() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/recommender/nimbus/eks/eu-west-1/cluster",
            serde_json::json!({
                "sumCpu": 32,
                "sumMem": 64,
                "minNodes": 2,
                "maxNodes": 10
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scaleout_of_satisfied_cluster_is_400() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/recommender/amazon/eks/eu-west-1/cluster/scaleout",
            serde_json::json!({
                "desiredCpu": 8,
                "desiredMem": 16,
                "actualLayout": [
                    {"instanceType": "m5.2xlarge", "vmClass": "spot", "sumNodes": 4}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("already enough resources"));
}

#[tokio::test]
async fn test_scaleout_grows_cluster() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/v1/recommender/amazon/eks/eu-west-1/cluster/scaleout",
            serde_json::json!({
                "desiredCpu": 64,
                "desiredMem": 128,
                "onDemandPct": 0,
                "zones": ["eu-west-1a"],
                "actualLayout": [
                    {"instanceType": "m5.2xlarge", "vmClass": "spot", "sumNodes": 2}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["accuracy"]["cpu"].as_f64().unwrap() >= 64.0);
}

#[tokio::test]
async fn test_healthz_reports_components() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["cloud_info"].is_object());
}

#[tokio::test]
async fn test_readyz_not_ready_before_first_renewal() {
    let (app, state) = setup_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
