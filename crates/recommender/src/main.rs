//! Cluster Recommender service
//!
//! Recommends cost-optimised node pool layouts built from regular and
//! spot/preemptible instances, backed by a continuously renewed product
//! info cache over the cloud-info catalogue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use recommender_lib::{
    cache::{CachingCloudInfo, RefreshConfig, Refresher},
    cloudinfo::{CloudInfoClient, CloudInfoClientConfig},
    health::components,
    Engine, HealthRegistry, RecommenderMetrics,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::RecommenderConfig::load()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(fmt::layer().json())
        .init();

    info!(cloud_info = %config.cloud_info_address, "Starting cluster recommender");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLOUD_INFO).await;
    health_registry.register(components::PRODUCT_CACHE).await;
    health_registry.register(components::REFRESHER).await;

    let metrics = RecommenderMetrics::new();

    let client = CloudInfoClient::new(CloudInfoClientConfig {
        address: config.cloud_info_address.clone(),
        ..Default::default()
    })?;
    let cache = Arc::new(CachingCloudInfo::new(
        Arc::new(client),
        Duration::from_secs(config.product_info_renewal_interval_secs),
        metrics.clone(),
    ));
    let engine = Arc::new(Engine::new(cache.clone()));

    // refresh loops run until the shutdown signal fires
    let (shutdown_tx, _) = broadcast::channel(1);
    let refresher = Refresher::new(
        cache.clone(),
        health_registry.clone(),
        metrics.clone(),
        RefreshConfig {
            renewal_interval: Duration::from_secs(config.product_info_renewal_interval_secs),
            ..Default::default()
        },
    );
    tokio::spawn(refresher.clone().run_long_lived(shutdown_tx.subscribe()));
    tokio::spawn(refresher.run_short_lived(shutdown_tx.subscribe()));

    let state = Arc::new(api::AppState {
        engine,
        catalogue: cache,
        health_registry,
        metrics,
    });

    let listen_address = config.listen_address.clone();
    let api_handle = tokio::spawn(async move { api::serve(&listen_address, state, &config.cors).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());
    api_handle.abort();

    Ok(())
}
