//! Caching layer over the cloud-info catalogue
//!
//! Process-wide TTL cache keyed by (provider, service, region, ...):
//! - attribute value domains and product catalogues live for the
//!   configured renewal interval and are renewed daily by the refresher,
//! - per-instance spot-price records live for two minutes and are
//!   overwritten every minute,
//! - zone and region listings use the cache's default expiry and are
//!   populated lazily.
//!
//! Concurrent misses for the same key collapse into a single upstream
//! call. Entries are replaced whole, never mutated in place.

mod refresh;

pub use refresh::{RefreshConfig, Refresher};

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cloudinfo::{CloudInfoSource, ProductDetails, Provider, Region, Service, ZonePrice};
use crate::error::RecommenderError;
use crate::models::Attribute;
use crate::observability::RecommenderMetrics;

/// TTL of per-instance spot-price entries.
const SPOT_PRICE_TTL: Duration = Duration::from_secs(2 * 60);

/// Expiry of entries without a dedicated refresh regime (zones, regions,
/// provider and service listings).
const DEFAULT_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

fn providers_key() -> String {
    "/cluster-recommender/providers".to_string()
}

fn services_key(provider: &str) -> String {
    format!("/cluster-recommender/{provider}/services")
}

fn regions_key(provider: &str, service: &str) -> String {
    format!("/cluster-recommender/{provider}/{service}/regions")
}

fn zones_key(provider: &str, service: &str, region: &str) -> String {
    format!("/cluster-recommender/{provider}/{service}/{region}/zones")
}

fn attr_key(provider: &str, service: &str, region: &str, attribute: Attribute) -> String {
    format!("/cluster-recommender/{provider}/{service}/{region}/attrValues/{attribute}")
}

fn products_key(provider: &str, service: &str, region: &str) -> String {
    format!("/cluster-recommender/{provider}/{service}/{region}/products")
}

fn price_key(provider: &str, region: &str, instance_type: &str) -> String {
    format!("/cluster-recommender/{provider}/{region}/prices/{instance_type}")
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

/// Caching facade over a [`CloudInfoSource`].
///
/// The engine consumes it through the same trait as the raw client; the
/// background [`Refresher`] keeps the long- and short-lived entries warm.
pub struct CachingCloudInfo {
    source: Arc<dyn CloudInfoSource>,
    store: DashMap<String, CacheEntry>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    renewal_interval: Duration,
    metrics: RecommenderMetrics,
}

impl CachingCloudInfo {
    /// Create a caching layer around the given catalogue source.
    pub fn new(
        source: Arc<dyn CloudInfoSource>,
        renewal_interval: Duration,
        metrics: RecommenderMetrics,
    ) -> Self {
        Self {
            source,
            store: DashMap::new(),
            inflight: DashMap::new(),
            renewal_interval,
            metrics,
        }
    }

    /// Number of live entries.
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }

    fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = {
            let entry = self.store.get(key)?;
            if entry.expires_at <= Instant::now() {
                None
            } else {
                Some(entry.value.clone())
            }
        };
        match value {
            Some(value) => value.downcast::<T>().ok(),
            None => {
                // the ref guard is released above; safe to evict
                self.store.remove(key);
                None
            }
        }
    }

    fn set<T: Send + Sync + 'static>(&self, key: String, value: Arc<T>, ttl: Duration) {
        self.store.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Read-through with single-flight semantics: concurrent misses for
    /// the same key wait on a per-key gate and re-check the store before
    /// fetching.
    async fn get_or_populate<T, Fut>(
        &self,
        key: String,
        ttl: Duration,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Arc<T>, RecommenderError>
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, RecommenderError>>,
    {
        if let Some(value) = self.get::<T>(&key) {
            self.metrics.inc_cache_hits();
            return Ok(value);
        }

        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = gate.lock().await;

        // a concurrent caller may have populated the entry while this one
        // waited on the gate
        if let Some(value) = self.get::<T>(&key) {
            self.metrics.inc_cache_hits();
            return Ok(value);
        }

        self.metrics.inc_cache_misses();
        debug!(key = %key, "populating cache entry");
        let result = fetch().await.map(|value| {
            let value = Arc::new(value);
            self.set(key.clone(), value.clone(), ttl);
            value
        });

        drop(guard);
        self.inflight.remove(&key);
        result
    }

    /// Providers known to the catalogue (default expiry, lazily
    /// populated).
    pub async fn providers(&self) -> Result<Arc<Vec<Provider>>, RecommenderError> {
        self.get_or_populate(providers_key(), DEFAULT_EXPIRY, || {
            self.source.get_providers()
        })
        .await
    }

    /// Services of a provider (default expiry, lazily populated).
    pub async fn services(&self, provider: &str) -> Result<Arc<Vec<Service>>, RecommenderError> {
        self.get_or_populate(services_key(provider), DEFAULT_EXPIRY, || {
            self.source.get_services(provider)
        })
        .await
    }

    /// Regions of a provider's service (default expiry, lazily
    /// populated).
    pub async fn regions(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Arc<Vec<Region>>, RecommenderError> {
        self.get_or_populate(regions_key(provider, service), DEFAULT_EXPIRY, || {
            self.source.get_regions(provider, service)
        })
        .await
    }

    /// Availability zones of a region (default expiry, lazily populated).
    pub async fn zones(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Arc<Vec<String>>, RecommenderError> {
        self.get_or_populate(zones_key(provider, service, region), DEFAULT_EXPIRY, || {
            self.source.get_zones(provider, service, region)
        })
        .await
    }

    /// Attribute value domain (renewal-interval TTL).
    pub async fn attribute_values(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        attribute: Attribute,
    ) -> Result<Arc<Vec<f64>>, RecommenderError> {
        self.get_or_populate(
            attr_key(provider, service, region, attribute),
            self.renewal_interval,
            || self.source.get_attribute_values(provider, service, region, attribute),
        )
        .await
    }

    /// Product catalogue of a region (renewal-interval TTL), with any
    /// fresh short-lived spot prices overlaid over the catalogue's
    /// embedded ones.
    pub async fn product_details(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<ProductDetails>, RecommenderError> {
        let products = self
            .get_or_populate(
                products_key(provider, service, region),
                self.renewal_interval,
                || self.source.get_product_details(provider, service, region),
            )
            .await?;

        let mut details = Vec::with_capacity(products.len());
        for product in products.iter() {
            let mut product = product.clone();
            let key = price_key(provider, region, &product.instance_type);
            if let Some(prices) = self.get::<HashMap<String, f64>>(&key) {
                let mut spot_prices: Vec<ZonePrice> = prices
                    .iter()
                    .map(|(zone, price)| ZonePrice {
                        zone: zone.clone(),
                        price: *price,
                    })
                    .collect();
                // keyed storage is unordered; keep responses deterministic
                spot_prices.sort_by(|a, b| a.zone.cmp(&b.zone));
                product.spot_prices = spot_prices;
            }
            details.push(product);
        }
        Ok(details)
    }

    /// Renew the long-lived entries of one (provider, service, region):
    /// both attribute domains and the product catalogue.
    pub(crate) async fn renew_long_lived(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<(), RecommenderError> {
        for attribute in [Attribute::Cpu, Attribute::Memory] {
            let values = self
                .source
                .get_attribute_values(provider, service, region, attribute)
                .await?;
            self.set(
                attr_key(provider, service, region, attribute),
                Arc::new(values),
                self.renewal_interval,
            );
        }

        let products = self
            .source
            .get_product_details(provider, service, region)
            .await?;
        self.set(
            products_key(provider, service, region),
            Arc::new(products),
            self.renewal_interval,
        );
        Ok(())
    }

    /// Overwrite the short-lived per-instance spot-price entries of one
    /// (provider, region).
    pub(crate) async fn renew_spot_prices(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<(), RecommenderError> {
        let products = self
            .source
            .get_product_details(provider, service, region)
            .await?;
        for product in products {
            if product.spot_prices.is_empty() {
                continue;
            }
            let prices: HashMap<String, f64> = product
                .spot_prices
                .iter()
                .map(|zp| (zp.zone.clone(), zp.price))
                .collect();
            self.set(
                price_key(provider, region, &product.instance_type),
                Arc::new(prices),
                SPOT_PRICE_TTL,
            );
        }
        Ok(())
    }
}

#[async_trait]
impl CloudInfoSource for CachingCloudInfo {
    async fn get_providers(&self) -> Result<Vec<Provider>, RecommenderError> {
        self.providers().await.map(|p| (*p).clone())
    }

    async fn get_services(&self, provider: &str) -> Result<Vec<Service>, RecommenderError> {
        self.services(provider).await.map(|s| (*s).clone())
    }

    async fn get_regions(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Region>, RecommenderError> {
        self.regions(provider, service).await.map(|r| (*r).clone())
    }

    async fn get_zones(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<String>, RecommenderError> {
        self.zones(provider, service, region)
            .await
            .map(|z| (*z).clone())
    }

    async fn get_attribute_values(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        attribute: Attribute,
    ) -> Result<Vec<f64>, RecommenderError> {
        self.attribute_values(provider, service, region, attribute)
            .await
            .map(|v| (*v).clone())
    }

    async fn get_product_details(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<ProductDetails>, RecommenderError> {
        self.product_details(provider, service, region).await
    }
}
