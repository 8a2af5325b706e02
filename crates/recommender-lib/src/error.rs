//! Error types shared by the recommendation engine and its subsystems

use thiserror::Error;

use crate::models::Attribute;

/// Errors produced while computing a recommendation.
///
/// Variants are behavioural: the HTTP layer maps them to status codes and
/// the engine recovers some of them locally (a `NoViableVms` on one anchor
/// attribute only skips that anchor).
#[derive(Debug, Error)]
pub enum RecommenderError {
    /// The request failed validation.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The requested provider is not registered with the engine.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// The attribute domain reported by the catalogue is empty.
    #[error("no attribute values found")]
    EmptyAttributeDomain,

    /// The per-VM attribute window is inverted.
    #[error("min value cannot be larger than the max value")]
    InvertedRange,

    /// The cloud-info service could be reached but rejected the call.
    #[error("cloud info rejected the request with status {status}: {message}")]
    CatalogueRejected { status: u16, message: String },

    /// The cloud-info service could not be reached at all.
    #[error("cloud info is unreachable: {0}")]
    CatalogueUnavailable(String),

    /// The filter pipeline eliminated every candidate for one anchor.
    #[error("no viable virtual machines found for {attribute}")]
    NoViableVms { attribute: Attribute },

    /// A scale-out request for a cluster that already holds enough of the
    /// anchor attribute. Recovered locally by trying the other anchor.
    #[error("there's already enough {attribute} resources in the cluster")]
    AnchorSatisfied { attribute: Attribute },

    /// A scale-out request for a cluster that already holds enough of both
    /// CPU and memory.
    #[error("there's already enough resources in the cluster, total available cpu: {cpu}, memory: {mem}")]
    AlreadySatisfied { cpu: f64, mem: f64 },

    /// The scale-out cannot meet the requested on-demand percentage even
    /// with on-demand instances only.
    #[error("couldn't scale out the cluster with the requested on-demand percentage: {on_demand_pct}")]
    InfeasibleOnDemandRatio { on_demand_pct: u32 },

    /// No anchor attribute produced a plan.
    #[error("could not recommend cluster with the requested resources")]
    Unsatisfiable,
}
