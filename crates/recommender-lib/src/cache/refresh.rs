//! Background renewal of the product info cache
//!
//! Two independent periodic tasks share one cancellation signal: the
//! long-lived loop renews attribute domains and product catalogues for
//! every (provider, service, region), the short-lived loop overwrites
//! per-instance spot prices every minute. Providers renew in parallel;
//! within a provider, regions renew in parallel for spot prices. A failed
//! renewal is logged and the stale entry stays until the next success or
//! TTL expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::CachingCloudInfo;
use crate::error::RecommenderError;
use crate::health::{components, HealthRegistry};
use crate::observability::RecommenderMetrics;

/// Configuration for the cache refresh loops
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Cadence of the long-lived renewal (default: 24 hours)
    pub renewal_interval: Duration,
    /// Cadence of the short-lived spot-price renewal (default: 1 minute)
    pub short_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            renewal_interval: Duration::from_secs(24 * 60 * 60),
            short_interval: Duration::from_secs(60),
        }
    }
}

/// Periodic renewal of the product info cache
#[derive(Clone)]
pub struct Refresher {
    cache: Arc<CachingCloudInfo>,
    health: HealthRegistry,
    metrics: RecommenderMetrics,
    config: RefreshConfig,
}

impl Refresher {
    pub fn new(
        cache: Arc<CachingCloudInfo>,
        health: HealthRegistry,
        metrics: RecommenderMetrics,
        config: RefreshConfig,
    ) -> Self {
        Self {
            cache,
            health,
            metrics,
            config,
        }
    }

    /// Run the long-lived renewal loop until the shutdown signal fires.
    /// The process is marked ready once the first full cycle completes.
    pub async fn run_long_lived(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.renewal_interval.as_secs(),
            "starting product info renewal loop"
        );

        self.renew_all().await;
        self.health.set_ready(true).await;

        let mut ticker = interval(self.config.renewal_interval);
        ticker.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = ticker.tick() => self.renew_all().await,
                _ = shutdown.recv() => {
                    info!("shutting down product info renewal loop");
                    break;
                }
            }
        }
    }

    /// Run the short-lived spot-price renewal loop until the shutdown
    /// signal fires.
    pub async fn run_short_lived(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.short_interval.as_secs(),
            "starting spot price renewal loop"
        );

        self.renew_short_lived().await;

        let mut ticker = interval(self.config.short_interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.renew_short_lived().await,
                _ = shutdown.recv() => {
                    info!("shutting down spot price renewal loop");
                    break;
                }
            }
        }
    }

    /// Enumerate every (provider, service, region) of the catalogue,
    /// grouped by provider.
    async fn scopes(&self) -> Result<Vec<(String, Vec<(String, String)>)>, RecommenderError> {
        let mut scopes = Vec::new();
        for provider in self.cache.providers().await?.iter() {
            let mut provider_scopes = Vec::new();
            for service in self.cache.services(&provider.provider).await?.iter() {
                for region in self
                    .cache
                    .regions(&provider.provider, &service.service)
                    .await?
                    .iter()
                {
                    provider_scopes.push((service.service.clone(), region.id.clone()));
                }
            }
            scopes.push((provider.provider.clone(), provider_scopes));
        }
        Ok(scopes)
    }

    async fn renew_all(&self) {
        let scopes = match self.scopes().await {
            Ok(scopes) => scopes,
            Err(e) => {
                warn!(error = %e, "couldn't enumerate catalogue scopes");
                self.metrics.inc_refresh_errors();
                self.health
                    .set_unhealthy(components::REFRESHER, e.to_string())
                    .await;
                return;
            }
        };

        let mut tasks = JoinSet::new();
        for (provider, provider_scopes) in scopes {
            let cache = self.cache.clone();
            let metrics = self.metrics.clone();
            tasks.spawn(async move {
                info!(provider = %provider, "renewing product info");
                let mut errors = 0usize;
                for (service, region) in provider_scopes {
                    if let Err(e) = cache.renew_long_lived(&provider, &service, &region).await {
                        warn!(
                            provider = %provider,
                            service = %service,
                            region = %region,
                            error = %e,
                            "couldn't renew product info"
                        );
                        metrics.inc_refresh_errors();
                        errors += 1;
                    }
                }
                errors
            });
        }

        let mut errors = 0usize;
        while let Some(joined) = tasks.join_next().await {
            errors += joined.unwrap_or(1);
        }

        self.metrics
            .set_cache_entries(self.cache.entry_count() as i64);
        if errors == 0 {
            self.health.set_healthy(components::REFRESHER).await;
        } else {
            self.health
                .set_degraded(components::REFRESHER, format!("{errors} renewal(s) failed"))
                .await;
        }
        info!("finished renewing product info");
    }

    async fn renew_short_lived(&self) {
        let scopes = match self.scopes().await {
            Ok(scopes) => scopes,
            Err(e) => {
                warn!(error = %e, "couldn't enumerate catalogue scopes");
                self.metrics.inc_refresh_errors();
                return;
            }
        };

        let mut tasks = JoinSet::new();
        for (provider, provider_scopes) in scopes {
            let cache = self.cache.clone();
            let metrics = self.metrics.clone();
            tasks.spawn(async move {
                debug!(provider = %provider, "renewing short lived product info");
                let mut regions = JoinSet::new();
                for (service, region) in provider_scopes {
                    let cache = cache.clone();
                    let metrics = metrics.clone();
                    let provider = provider.clone();
                    regions.spawn(async move {
                        if let Err(e) =
                            cache.renew_spot_prices(&provider, &service, &region).await
                        {
                            warn!(
                                provider = %provider,
                                region = %region,
                                error = %e,
                                "couldn't renew spot prices"
                            );
                            metrics.inc_refresh_errors();
                            return 1usize;
                        }
                        0usize
                    });
                }
                let mut errors = 0usize;
                while let Some(joined) = regions.join_next().await {
                    errors += joined.unwrap_or(1);
                }
                errors
            });
        }

        while tasks.join_next().await.is_some() {}
        debug!("finished renewing short lived product info");
    }
}
