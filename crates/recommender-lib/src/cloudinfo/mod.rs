//! Typed facade over the upstream cloud-info catalogue service
//!
//! The engine only ever talks to [`CloudInfoSource`]; the production
//! implementation is the REST [`client::CloudInfoClient`], wrapped by the
//! caching layer in [`crate::cache`].

pub mod client;

pub use client::{CloudInfoClient, CloudInfoClientConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RecommenderError;
use crate::models::Attribute;

/// Spot price of an instance type in a single availability zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePrice {
    pub zone: String,
    pub price: f64,
}

/// An instance type as described by the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    /// Instance type
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Regular price of the instance type
    pub on_demand_price: f64,
    /// Spot prices per availability zone; empty when the type is not
    /// offered as spot or preemptible
    #[serde(rename = "spotPrice", default)]
    pub spot_prices: Vec<ZonePrice>,
    /// Number of CPUs in the instance type
    #[serde(rename = "cpusPerVm")]
    pub cpus: f64,
    /// Available memory in the instance type (GiB)
    #[serde(rename = "memPerVm")]
    pub mem: f64,
    /// Number of GPUs in the instance type
    #[serde(rename = "gpusPerVm")]
    pub gpus: f64,
    /// Signals a burst type instance
    #[serde(default)]
    pub burst: bool,
    /// Raw network performance of the instance type
    #[serde(default)]
    pub ntw_perf: String,
    /// Network performance category
    #[serde(rename = "ntwPerfCategory", default)]
    pub ntw_perf_cat: String,
    /// The instance type is of the provider's current generation
    #[serde(default)]
    pub current_gen: bool,
}

/// A provider known to the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub provider: String,
}

/// A service of a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service: String,
}

/// A region of a provider's service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
}

/// Read-only operations the recommender needs from the cloud-info
/// catalogue. All calls are idempotent and free of side effects.
#[async_trait]
pub trait CloudInfoSource: Send + Sync {
    /// Providers known to the catalogue.
    async fn get_providers(&self) -> Result<Vec<Provider>, RecommenderError>;

    /// Services of a provider.
    async fn get_services(&self, provider: &str) -> Result<Vec<Service>, RecommenderError>;

    /// Regions of a provider's service.
    async fn get_regions(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Region>, RecommenderError>;

    /// Availability zones of a region.
    async fn get_zones(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<String>, RecommenderError>;

    /// Sorted or unsorted domain of an attribute's numeric values.
    async fn get_attribute_values(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        attribute: Attribute,
    ) -> Result<Vec<f64>, RecommenderError>;

    /// The full product list of a region, with per-zone spot prices.
    async fn get_product_details(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<ProductDetails>, RecommenderError>;
}
