//! Cluster Recommender CLI
//!
//! A command-line client for requesting cluster layout recommendations
//! and browsing the provider catalogue.

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{catalog, cluster};
use recommender_lib::{ClusterRecommendationReq, ClusterScaleoutRecommendationReq};

/// Cluster Recommender CLI
#[derive(Parser)]
#[command(name = "crc")]
#[command(author, version, about = "CLI for the Cluster Recommender", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via CRC_API_URL env var)
    #[arg(long, env = "CRC_API_URL", default_value = "http://localhost:9090")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recommend cluster layouts
    #[command(subcommand)]
    Cluster(ClusterCommands),

    /// Browse the provider catalogue
    #[command(subcommand)]
    Catalog(CatalogCommands),
}

/// Provider, service and region a command targets
#[derive(Args)]
pub struct Scope {
    /// Cloud provider (e.g. amazon, google)
    #[arg(long, short)]
    pub provider: String,

    /// Provider service (e.g. eks, gke, compute)
    #[arg(long, short)]
    pub service: String,

    /// Region to recommend for
    #[arg(long, short)]
    pub region: String,
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// Recommend a cluster layout for a resource envelope
    Recommend {
        #[command(flatten)]
        scope: Scope,

        /// Total number of CPUs requested for the cluster
        #[arg(long)]
        cpu: f64,

        /// Total memory requested for the cluster (GiB)
        #[arg(long)]
        mem: f64,

        /// Total number of GPUs requested for the cluster
        #[arg(long, default_value_t = 0)]
        gpu: u64,

        /// Minimum number of nodes
        #[arg(long, default_value_t = 1)]
        min_nodes: u64,

        /// Maximum number of nodes
        #[arg(long, default_value_t = 10)]
        max_nodes: u64,

        /// Percentage of regular (on-demand) nodes
        #[arg(long, default_value_t = 0)]
        on_demand_pct: u32,

        /// Availability zones (repeatable)
        #[arg(long = "zone")]
        zones: Vec<String>,

        /// Instance types to include (repeatable)
        #[arg(long = "include")]
        includes: Vec<String>,

        /// Instance types to exclude (repeatable)
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        /// Network performance category filter
        #[arg(long)]
        network_perf: Option<String>,

        /// Disallow burst instances
        #[arg(long)]
        no_burst: bool,

        /// Allow older instance type generations
        #[arg(long)]
        allow_older_gen: bool,
    },

    /// Recommend the pools to add on top of an existing layout
    ScaleOut {
        #[command(flatten)]
        scope: Scope,

        /// Total desired number of CPUs after the scale out
        #[arg(long)]
        cpu: f64,

        /// Total desired memory (GiB) after the scale out
        #[arg(long)]
        mem: f64,

        /// Total desired number of GPUs after the scale out
        #[arg(long, default_value_t = 0)]
        gpu: u64,

        /// Percentage of regular (on-demand) nodes among the added nodes
        #[arg(long, default_value_t = 0)]
        on_demand_pct: u32,

        /// Availability zones (repeatable)
        #[arg(long = "zone")]
        zones: Vec<String>,

        /// Instance types to exclude (repeatable)
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        /// JSON file describing the current node pools
        #[arg(long)]
        layout: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List the supported providers
    Providers,

    /// List the regions of a provider's service
    Regions {
        /// Cloud provider
        #[arg(long, short)]
        provider: String,

        /// Provider service
        #[arg(long, short)]
        service: String,
    },

    /// List the availability zones of a region
    Zones {
        #[command(flatten)]
        scope: Scope,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Cluster(cluster_cmd) => match cluster_cmd {
            ClusterCommands::Recommend {
                scope,
                cpu,
                mem,
                gpu,
                min_nodes,
                max_nodes,
                on_demand_pct,
                zones,
                includes,
                excludes,
                network_perf,
                no_burst,
                allow_older_gen,
            } => {
                let req = ClusterRecommendationReq {
                    sum_cpu: cpu,
                    sum_mem: mem,
                    sum_gpu: gpu,
                    min_nodes,
                    max_nodes,
                    same_size: false,
                    on_demand_pct,
                    zones,
                    includes,
                    excludes,
                    network_perf,
                    allow_burst: no_burst.then_some(false),
                    allow_older_gen: allow_older_gen.then_some(true),
                };
                cluster::recommend(
                    &client,
                    &scope.provider,
                    &scope.service,
                    &scope.region,
                    req,
                    cli.format,
                )
                .await?;
            }
            ClusterCommands::ScaleOut {
                scope,
                cpu,
                mem,
                gpu,
                on_demand_pct,
                zones,
                excludes,
                layout,
            } => {
                let req = ClusterScaleoutRecommendationReq {
                    desired_cpu: cpu,
                    desired_mem: mem,
                    desired_gpu: gpu,
                    on_demand_pct,
                    zones,
                    excludes,
                    actual_layout: vec![],
                };
                cluster::scale_out(
                    &client,
                    &scope.provider,
                    &scope.service,
                    &scope.region,
                    req,
                    &layout,
                    cli.format,
                )
                .await?;
            }
        },
        Commands::Catalog(catalog_cmd) => match catalog_cmd {
            CatalogCommands::Providers => {
                catalog::list_providers(&client, cli.format).await?;
            }
            CatalogCommands::Regions { provider, service } => {
                catalog::list_regions(&client, &provider, &service, cli.format).await?;
            }
            CatalogCommands::Zones { scope } => {
                catalog::list_zones(
                    &client,
                    &scope.provider,
                    &scope.service,
                    &scope.region,
                    cli.format,
                )
                .await?;
            }
        },
    }

    Ok(())
}
