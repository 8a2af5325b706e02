//! Catalogue listing commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ProviderList, RegionList, ZoneList};
use crate::output::{print_warning, OutputFormat};

/// Row for the regions table
#[derive(Tabled)]
struct RegionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

/// List the providers known to the recommender
pub async fn list_providers(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: ProviderList = client.get("api/v1/providers").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.providers)?);
        }
        OutputFormat::Table => {
            if result.providers.is_empty() {
                print_warning("No providers found");
                return Ok(());
            }
            for provider in &result.providers {
                println!("{}", provider.provider);
            }
        }
    }

    Ok(())
}

/// List the regions of a provider's service
pub async fn list_regions(
    client: &ApiClient,
    provider: &str,
    service: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/providers/{provider}/services/{service}/regions");
    let result: RegionList = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.regions)?);
        }
        OutputFormat::Table => {
            if result.regions.is_empty() {
                print_warning("No regions found");
                return Ok(());
            }
            let rows: Vec<RegionRow> = result
                .regions
                .iter()
                .map(|r| RegionRow {
                    id: r.id.clone(),
                    name: r.name.clone(),
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// List the availability zones of a region
pub async fn list_zones(
    client: &ApiClient,
    provider: &str,
    service: &str,
    region: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/providers/{provider}/services/{service}/regions/{region}/zones");
    let result: ZoneList = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.zones)?);
        }
        OutputFormat::Table => {
            if result.zones.is_empty() {
                print_warning("No zones found");
                return Ok(());
            }
            for zone in &result.zones {
                println!("{zone}");
            }
        }
    }

    Ok(())
}
