//! REST client for the cloud-info catalogue service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{CloudInfoSource, ProductDetails, Provider, Region, Service};
use crate::error::RecommenderError;
use crate::models::Attribute;

/// Configuration for the cloud-info client.
#[derive(Debug, Clone)]
pub struct CloudInfoClientConfig {
    /// Base URL of the cloud-info service (e.g. "http://cloudinfo:8000")
    pub address: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Per-request timeout; a timed-out call surfaces as
    /// [`RecommenderError::CatalogueUnavailable`]
    pub request_timeout: Duration,
}

impl Default for CloudInfoClientConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the cloud-info catalogue.
pub struct CloudInfoClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    providers: Vec<Provider>,
}

#[derive(Debug, Deserialize)]
struct ServicesResponse {
    services: Vec<Service>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionDetailsResponse {
    #[allow(dead_code)]
    id: String,
    #[allow(dead_code)]
    name: String,
    #[serde(default)]
    zones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeValuesResponse {
    attribute_values: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ProductDetailsResponse {
    products: Vec<ProductDetails>,
}

impl CloudInfoClient {
    /// Create a new catalogue client.
    pub fn new(config: CloudInfoClientConfig) -> Result<Self, RecommenderError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RecommenderError::CatalogueUnavailable(e.to_string()))?;

        let base_url = Url::parse(&format!("{}/api/v1/", config.address.trim_end_matches('/')))
            .map_err(|e| {
                RecommenderError::Validation(format!(
                    "invalid cloud-info address '{}': {e}",
                    config.address
                ))
            })?;

        Ok(Self { client, base_url })
    }

    /// GET a JSON document relative to the service's API root.
    ///
    /// A transport failure maps to `CatalogueUnavailable`; a response the
    /// service produced itself (error status, undecodable body) maps to
    /// `CatalogueRejected`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RecommenderError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RecommenderError::Validation(format!("invalid path '{path}': {e}")))?;

        debug!(url = %url, "querying cloud info");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RecommenderError::CatalogueUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecommenderError::CatalogueRejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RecommenderError::CatalogueRejected {
                status: status.as_u16(),
                message: format!("undecodable response body: {e}"),
            })
    }
}

#[async_trait]
impl CloudInfoSource for CloudInfoClient {
    async fn get_providers(&self) -> Result<Vec<Provider>, RecommenderError> {
        let resp: ProvidersResponse = self.get_json("providers").await?;
        Ok(resp.providers)
    }

    async fn get_services(&self, provider: &str) -> Result<Vec<Service>, RecommenderError> {
        let resp: ServicesResponse = self
            .get_json(&format!("providers/{provider}/services"))
            .await?;
        Ok(resp.services)
    }

    async fn get_regions(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Region>, RecommenderError> {
        self.get_json(&format!("providers/{provider}/services/{service}/regions"))
            .await
    }

    async fn get_zones(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<String>, RecommenderError> {
        let resp: RegionDetailsResponse = self
            .get_json(&format!(
                "providers/{provider}/services/{service}/regions/{region}"
            ))
            .await?;
        Ok(resp.zones)
    }

    async fn get_attribute_values(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        attribute: Attribute,
    ) -> Result<Vec<f64>, RecommenderError> {
        let resp: AttributeValuesResponse = self
            .get_json(&format!(
                "providers/{provider}/services/{service}/regions/{region}/attributes/{attribute}"
            ))
            .await?;
        Ok(resp.attribute_values)
    }

    async fn get_product_details(
        &self,
        provider: &str,
        service: &str,
        region: &str,
    ) -> Result<Vec<ProductDetails>, RecommenderError> {
        let resp: ProductDetailsResponse = self
            .get_json(&format!(
                "providers/{provider}/services/{service}/regions/{region}/products"
            ))
            .await?;
        Ok(resp.products)
    }
}
