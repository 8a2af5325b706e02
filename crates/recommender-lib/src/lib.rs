//! Core library for the cluster recommender
//!
//! This crate provides:
//! - The recommendation engine (attribute ranges, filters, pool planning)
//! - A caching product-info subsystem with background renewal
//! - A typed client for the upstream cloud-info catalogue
//! - Health checks and observability

pub mod cache;
pub mod cloudinfo;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;

pub use engine::Engine;
pub use error::RecommenderError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::RecommenderMetrics;
