//! Core data model for the cluster recommender

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RecommenderError;

/// Network performance categories accepted in requests.
pub const NETWORK_PERF_CATEGORIES: &[&str] = &["low", "medium", "high", "extra"];

/// Accepted alias for the regular purchasing class on input.
const VM_CLASS_ONDEMAND: &str = "ondemand";

/// Anchor attribute that drives the node-count arithmetic of one planning
/// pass. Restricting this to an enum makes an unsupported attribute
/// unrepresentable past request binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Cpu,
    Memory,
}

impl Attribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Cpu => "cpu",
            Attribute::Memory => "memory",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchasing class of a node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmClass {
    Regular,
    Spot,
}

/// An instance type reduced to the characteristics the engine plans with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    /// Instance type
    #[serde(rename = "type")]
    pub vm_type: String,
    /// Average price of the instance across the requested zones (differs
    /// from the on-demand price for spot or preemptible instances)
    pub avg_price: f64,
    /// Regular price of the instance type
    pub on_demand_price: f64,
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
    pub burst: bool,
    /// Raw network performance of the instance type
    pub network_perf: String,
    /// Network performance category
    #[serde(rename = "networkPerfCategory")]
    pub network_perf_cat: String,
    /// The instance type is of the provider's current generation
    pub current_gen: bool,
}

impl VirtualMachine {
    /// Value of the given anchor attribute for this instance type.
    pub fn attr_value(&self, attribute: Attribute) -> f64 {
        match attribute {
            Attribute::Cpu => self.cpus,
            Attribute::Memory => self.mem,
        }
    }
}

/// A set of instances of a single type and purchasing class. A pool with
/// `sum_nodes == 0` is a candidate slot awaiting the fill loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    /// Recommended instance type
    #[serde(rename = "vm")]
    pub vm_type: VirtualMachine,
    /// Recommended number of nodes in the pool
    pub sum_nodes: u64,
    /// Purchasing class of the pool
    pub vm_class: VmClass,
}

impl NodePool {
    /// Total value of the given attribute across the pool.
    pub fn attr_sum(&self, attribute: Attribute) -> f64 {
        self.sum_nodes as f64 * self.vm_type.attr_value(attribute)
    }

    /// Total value of the attribute if the pool grew by one node.
    pub fn next_attr_sum(&self, attribute: Attribute) -> f64 {
        self.attr_sum(attribute) + self.vm_type.attr_value(attribute)
    }

    /// Price of the pool: on-demand price for regular pools, zone-averaged
    /// spot price for spot pools.
    pub fn pool_price(&self) -> f64 {
        match self.vm_class {
            VmClass::Regular => self.sum_nodes as f64 * self.vm_type.on_demand_price,
            VmClass::Spot => self.sum_nodes as f64 * self.vm_type.avg_price,
        }
    }
}

/// Cluster recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecommendationReq {
    /// Total number of CPUs requested for the cluster
    pub sum_cpu: f64,
    /// Total memory requested for the cluster (GiB)
    pub sum_mem: f64,
    /// Minimum number of nodes in the recommended cluster
    #[serde(default)]
    pub min_nodes: u64,
    /// Maximum number of nodes in the recommended cluster
    #[serde(default)]
    pub max_nodes: u64,
    /// Reserved: instance types of a similar size. Not supported yet.
    #[serde(default)]
    pub same_size: bool,
    /// Percentage of regular (on-demand) nodes in the recommended cluster
    #[serde(default)]
    pub on_demand_pct: u32,
    /// Availability zones the cluster should expand to; resolved from the
    /// catalogue when empty
    #[serde(default)]
    pub zones: Vec<String>,
    /// Total number of GPUs requested for the cluster
    #[serde(default)]
    pub sum_gpu: u64,
    /// Are burst instances allowed in the recommendation (unset means yes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_burst: Option<bool>,
    /// Network performance category filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_perf: Option<String>,
    /// Blacklist of instance types excluded from the recommendation
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Whitelist of instance types the recommendation may contain
    #[serde(default)]
    pub includes: Vec<String>,
    /// Allow older instance type generations (applies to amazon only;
    /// unset means current generation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_older_gen: Option<bool>,
}

impl ClusterRecommendationReq {
    /// Requested total for the given anchor attribute.
    pub fn sum(&self, attribute: Attribute) -> f64 {
        match attribute {
            Attribute::Cpu => self.sum_cpu,
            Attribute::Memory => self.sum_mem,
        }
    }

    /// Smallest per-VM attribute value that can still satisfy the request
    /// within the node-count bounds.
    pub fn min_value_per_vm(&self, attribute: Attribute) -> f64 {
        self.sum(attribute) / self.max_nodes as f64
    }

    /// Largest per-VM attribute value that can still satisfy the request
    /// within the node-count bounds.
    pub fn max_value_per_vm(&self, attribute: Attribute) -> f64 {
        self.sum(attribute) / self.min_nodes as f64
    }

    pub fn validate(&self) -> Result<(), RecommenderError> {
        if self.sum_cpu < 1.0 {
            return Err(invalid("sumCpu must be at least 1"));
        }
        if self.sum_mem < 1.0 {
            return Err(invalid("sumMem must be at least 1"));
        }
        if self.min_nodes < 1 {
            return Err(invalid("minNodes must be at least 1"));
        }
        if self.min_nodes > self.max_nodes {
            // same failure the attribute window would hit downstream
            return Err(RecommenderError::InvertedRange);
        }
        if self.on_demand_pct > 100 {
            return Err(invalid("onDemandPct must be between 0 and 100"));
        }
        if self.same_size {
            return Err(invalid("sameSize is not supported"));
        }
        if let Some(category) = &self.network_perf {
            if !NETWORK_PERF_CATEGORIES.contains(&category.as_str()) {
                return Err(invalid(format!(
                    "networkPerf must be one of {NETWORK_PERF_CATEGORIES:?}"
                )));
            }
        }
        validate_type_list("includes", &self.includes)?;
        validate_type_list("excludes", &self.excludes)?;
        Ok(())
    }
}

/// Scale-out recommendation request: desired totals plus the current
/// cluster layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScaleoutRecommendationReq {
    /// Total desired number of CPUs in the cluster after the scale out
    pub desired_cpu: f64,
    /// Total desired memory (GiB) in the cluster after the scale out
    pub desired_mem: f64,
    /// Total desired number of GPUs in the cluster after the scale out
    #[serde(default)]
    pub desired_gpu: u64,
    /// Percentage of regular (on-demand) nodes among the scale-out nodes
    #[serde(default)]
    pub on_demand_pct: u32,
    /// Availability zones to be included in the recommendation
    #[serde(default)]
    pub zones: Vec<String>,
    /// Blacklist of instance types excluded from the recommendation
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Description of the current cluster layout
    pub actual_layout: Vec<NodePoolDesc>,
}

impl ClusterScaleoutRecommendationReq {
    pub fn validate(&self) -> Result<(), RecommenderError> {
        if self.desired_cpu < 1.0 {
            return Err(invalid("desiredCpu must be at least 1"));
        }
        if self.desired_mem < 1.0 {
            return Err(invalid("desiredMem must be at least 1"));
        }
        if self.on_demand_pct > 100 {
            return Err(invalid("onDemandPct must be between 0 and 100"));
        }
        if self.actual_layout.is_empty() {
            return Err(invalid("actualLayout must not be empty"));
        }
        validate_type_list("excludes", &self.excludes)?;
        for desc in &self.actual_layout {
            desc.validate()?;
        }
        Ok(())
    }
}

/// One pool of an existing cluster layout, as described by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolDesc {
    /// Instance type of the VMs in the pool
    pub instance_type: String,
    /// Purchasing class of the pool: regular, ondemand (alias of regular)
    /// or spot
    pub vm_class: String,
    /// Number of VMs in the pool
    pub sum_nodes: u64,
}

impl NodePoolDesc {
    /// Purchasing class with the `ondemand` alias resolved; anything not
    /// recognised as regular counts as spot.
    pub fn vm_class(&self) -> VmClass {
        match self.vm_class.as_str() {
            "regular" | VM_CLASS_ONDEMAND => VmClass::Regular,
            _ => VmClass::Spot,
        }
    }

    fn validate(&self) -> Result<(), RecommenderError> {
        if self.instance_type.trim().is_empty() {
            return Err(invalid("actualLayout entries need an instanceType"));
        }
        if !matches!(self.vm_class.as_str(), "regular" | VM_CLASS_ONDEMAND | "spot") {
            return Err(invalid(format!(
                "unrecognised vmClass '{}', expected regular, ondemand or spot",
                self.vm_class
            )));
        }
        if self.sum_nodes < 1 {
            return Err(invalid("actualLayout entries need at least one node"));
        }
        Ok(())
    }
}

/// Cluster recommendation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecommendationResp {
    /// The cloud provider
    pub provider: String,
    /// Provider's service
    pub service: String,
    /// Service's region
    pub region: String,
    /// Availability zones in the recommendation; all node pools should
    /// expand to all zones of a multi-zone recommendation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    /// Recommended node pools
    pub node_pools: Vec<NodePool>,
    /// Accuracy of the recommendation
    pub accuracy: ClusterRecommendationAccuracy,
}

/// Sums across the recommended node pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecommendationAccuracy {
    /// Total memory in the recommended cluster (GiB)
    #[serde(rename = "memory")]
    pub rec_mem: f64,
    /// Total number of CPUs in the recommended cluster
    #[serde(rename = "cpu")]
    pub rec_cpu: f64,
    /// Total number of nodes in the recommended cluster
    #[serde(rename = "nodes")]
    pub rec_nodes: u64,
    /// Availability zones in the recommendation
    #[serde(rename = "zone", default, skip_serializing_if = "Vec::is_empty")]
    pub rec_zone: Vec<String>,
    /// Price of the regular pools in the recommended cluster
    #[serde(rename = "regularPrice")]
    pub rec_regular_price: f64,
    /// Number of regular nodes in the recommended cluster
    #[serde(rename = "regularNodes")]
    pub rec_regular_nodes: u64,
    /// Price of the spot pools in the recommended cluster
    #[serde(rename = "spotPrice")]
    pub rec_spot_price: f64,
    /// Number of spot nodes in the recommended cluster
    #[serde(rename = "spotNodes")]
    pub rec_spot_nodes: u64,
    /// Total price of the recommended cluster
    #[serde(rename = "totalPrice")]
    pub rec_total_price: f64,
}

fn invalid(message: impl Into<String>) -> RecommenderError {
    RecommenderError::Validation(message.into())
}

fn validate_type_list(field: &str, types: &[String]) -> Result<(), RecommenderError> {
    if types.iter().any(|t| t.trim().is_empty()) {
        return Err(invalid(format!("{field} must not contain empty instance types")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> ClusterRecommendationReq {
        ClusterRecommendationReq {
            sum_cpu: 100.0,
            sum_mem: 200.0,
            min_nodes: 5,
            max_nodes: 10,
            same_size: false,
            on_demand_pct: 50,
            zones: vec![],
            sum_gpu: 0,
            allow_burst: None,
            network_perf: None,
            excludes: vec![],
            includes: vec![],
            allow_older_gen: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_inverted_node_bounds_rejected() {
        let mut req = valid_request();
        req.min_nodes = 10;
        req.max_nodes = 5;
        let err = req.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "min value cannot be larger than the max value"
        );
    }

    #[test]
    fn test_same_size_unsupported() {
        let mut req = valid_request();
        req.same_size = true;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_unknown_network_perf_rejected() {
        let mut req = valid_request();
        req.network_perf = Some("warp".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_attr_window_bounds() {
        let req = valid_request();
        assert_eq!(req.min_value_per_vm(Attribute::Cpu), 10.0);
        assert_eq!(req.max_value_per_vm(Attribute::Cpu), 20.0);
        assert_eq!(req.min_value_per_vm(Attribute::Memory), 20.0);
        assert_eq!(req.max_value_per_vm(Attribute::Memory), 40.0);
    }

    #[test]
    fn test_ondemand_alias_maps_to_regular() {
        let desc = NodePoolDesc {
            instance_type: "m5.xlarge".to_string(),
            vm_class: "ondemand".to_string(),
            sum_nodes: 3,
        };
        assert!(desc.validate().is_ok());
        assert_eq!(desc.vm_class(), VmClass::Regular);
    }

    #[test]
    fn test_unknown_vm_class_rejected() {
        let desc = NodePoolDesc {
            instance_type: "m5.xlarge".to_string(),
            vm_class: "preemptible".to_string(),
            sum_nodes: 3,
        };
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_request_wire_names() {
        let req: ClusterRecommendationReq = serde_json::from_str(
            r#"{"sumCpu": 8, "sumMem": 16, "minNodes": 1, "maxNodes": 2, "allowBurst": false}"#,
        )
        .unwrap();
        assert_eq!(req.sum_cpu, 8.0);
        assert_eq!(req.allow_burst, Some(false));
        assert_eq!(req.allow_older_gen, None);
    }

    #[test]
    fn test_response_round_trip() {
        let resp = ClusterRecommendationResp {
            provider: "amazon".to_string(),
            service: "eks".to_string(),
            region: "eu-west-1".to_string(),
            zones: vec!["eu-west-1a".to_string()],
            node_pools: vec![NodePool {
                vm_type: VirtualMachine {
                    vm_type: "m5.xlarge".to_string(),
                    avg_price: 0.08,
                    on_demand_price: 0.2,
                    cpus: 4.0,
                    mem: 16.0,
                    gpus: 0.0,
                    burst: false,
                    network_perf: "Up to 10 Gigabit".to_string(),
                    network_perf_cat: "high".to_string(),
                    current_gen: true,
                },
                sum_nodes: 3,
                vm_class: VmClass::Spot,
            }],
            accuracy: ClusterRecommendationAccuracy {
                rec_mem: 48.0,
                rec_cpu: 12.0,
                rec_nodes: 3,
                rec_zone: vec!["eu-west-1a".to_string()],
                rec_regular_price: 0.0,
                rec_regular_nodes: 0,
                rec_spot_price: 0.24,
                rec_spot_nodes: 3,
                rec_total_price: 0.24,
            },
        };

        let encoded = serde_json::to_string(&resp).unwrap();
        let decoded: ClusterRecommendationResp = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, resp);
        assert!(encoded.contains(r#""vmClass":"spot""#));
        assert!(encoded.contains(r#""cpusPerVm":4.0"#));
    }
}
