//! Cluster recommendation commands

use std::path::Path;

use anyhow::{Context, Result};
use recommender_lib::{
    ClusterRecommendationReq, ClusterRecommendationResp, ClusterScaleoutRecommendationReq,
    NodePoolDesc, VmClass,
};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_amount, format_price, print_success, OutputFormat};

/// Row for the node pools table
#[derive(Tabled)]
struct NodePoolRow {
    #[tabled(rename = "Type")]
    vm_type: String,
    #[tabled(rename = "Class")]
    vm_class: String,
    #[tabled(rename = "Nodes")]
    sum_nodes: u64,
    #[tabled(rename = "CPU/VM")]
    cpus: String,
    #[tabled(rename = "Mem/VM")]
    mem: String,
    #[tabled(rename = "Price/VM")]
    price: String,
}

/// Request a cluster recommendation
pub async fn recommend(
    client: &ApiClient,
    provider: &str,
    service: &str,
    region: &str,
    req: ClusterRecommendationReq,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/recommender/{provider}/{service}/{region}/cluster");
    let resp: ClusterRecommendationResp = client.post(&path, &req).await?;
    render_response(&resp, format)
}

/// Request a scale-out recommendation; the current layout is read from a
/// JSON file.
pub async fn scale_out(
    client: &ApiClient,
    provider: &str,
    service: &str,
    region: &str,
    mut req: ClusterScaleoutRecommendationReq,
    layout_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let layout = std::fs::read_to_string(layout_path)
        .with_context(|| format!("Failed to read layout file {}", layout_path.display()))?;
    req.actual_layout = serde_json::from_str::<Vec<NodePoolDesc>>(&layout)
        .context("Failed to parse layout file")?;

    let path = format!("api/v1/recommender/{provider}/{service}/{region}/cluster/scaleout");
    let resp: ClusterRecommendationResp = client.post(&path, &req).await?;
    render_response(&resp, format)
}

fn render_response(resp: &ClusterRecommendationResp, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(resp)?);
        }
        OutputFormat::Table => {
            let rows: Vec<NodePoolRow> = resp
                .node_pools
                .iter()
                .map(|pool| NodePoolRow {
                    vm_type: pool.vm_type.vm_type.clone(),
                    vm_class: match pool.vm_class {
                        VmClass::Regular => "regular".to_string(),
                        VmClass::Spot => "spot".to_string(),
                    },
                    sum_nodes: pool.sum_nodes,
                    cpus: format_amount(pool.vm_type.cpus),
                    mem: format_amount(pool.vm_type.mem),
                    price: match pool.vm_class {
                        VmClass::Regular => format_price(pool.vm_type.on_demand_price),
                        VmClass::Spot => format_price(pool.vm_type.avg_price),
                    },
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let accuracy = &resp.accuracy;
            print_success(&format!(
                "{} nodes ({} regular, {} spot), {} CPUs, {} GiB",
                accuracy.rec_nodes,
                accuracy.rec_regular_nodes,
                accuracy.rec_spot_nodes,
                format_amount(accuracy.rec_cpu),
                format_amount(accuracy.rec_mem),
            ));
            println!(
                "Total price: {} (regular {}, spot {})",
                format_price(accuracy.rec_total_price),
                format_price(accuracy.rec_regular_price),
                format_price(accuracy.rec_spot_price),
            );
            if !resp.zones.is_empty() {
                println!("Zones: {}", resp.zones.join(", "));
            }
        }
    }

    Ok(())
}
