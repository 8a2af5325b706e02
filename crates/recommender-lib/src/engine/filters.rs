//! Candidate filtering
//!
//! A filter is a predicate over a candidate VM and the request. The engine
//! composes the generic include/exclude filters, the provider policy's
//! filters and the anchor-specific ratio filter as a logical AND.
//!
//! Providers are a closed registry: a request for a provider without a
//! registered policy fails.

use crate::error::RecommenderError;
use crate::models::{Attribute, ClusterRecommendationReq, VirtualMachine};

pub type VmFilter = fn(&VirtualMachine, &ClusterRecommendationReq) -> bool;

/// Per-provider planning policy.
pub struct ProviderPolicy {
    pub name: &'static str,
    /// Filters the provider adds on top of the generic ones
    provider_filters: &'static [VmFilter],
    /// An on-demand percentage the provider mandates regardless of the
    /// request (no spot or preemptible offering)
    pub forced_on_demand_pct: Option<u32>,
}

const PROVIDER_POLICIES: &[ProviderPolicy] = &[
    ProviderPolicy {
        name: "amazon",
        provider_filters: &[current_gen_filter, burst_filter, ntw_performance_filter],
        forced_on_demand_pct: None,
    },
    ProviderPolicy {
        name: "google",
        provider_filters: &[ntw_performance_filter],
        forced_on_demand_pct: None,
    },
    ProviderPolicy {
        name: "azure",
        provider_filters: &[],
        forced_on_demand_pct: None,
    },
    ProviderPolicy {
        name: "oracle",
        provider_filters: &[],
        forced_on_demand_pct: Some(100),
    },
    ProviderPolicy {
        name: "alibaba",
        provider_filters: &[],
        forced_on_demand_pct: None,
    },
];

/// Look up the policy registered for a provider; unknown providers fail
/// closed.
pub fn policy_for(provider: &str) -> Result<&'static ProviderPolicy, RecommenderError> {
    PROVIDER_POLICIES
        .iter()
        .find(|policy| policy.name == provider)
        .ok_or_else(|| RecommenderError::UnsupportedProvider(provider.to_string()))
}

impl ProviderPolicy {
    /// The full filter chain for one anchor attribute.
    pub fn filters_for(&self, attribute: Attribute) -> Vec<VmFilter> {
        let mut filters: Vec<VmFilter> = vec![includes_filter, excludes_filter];
        filters.extend_from_slice(self.provider_filters);
        filters.push(match attribute {
            Attribute::Cpu => min_mem_ratio_filter,
            Attribute::Memory => min_cpu_ratio_filter,
        });
        filters
    }
}

/// True if every filter passes for the given vm.
pub fn filters_apply(
    vm: &VirtualMachine,
    filters: &[VmFilter],
    req: &ClusterRecommendationReq,
) -> bool {
    filters.iter().all(|filter| filter(vm, req))
}

fn includes_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    req.includes.is_empty() || req.includes.iter().any(|t| *t == vm.vm_type)
}

fn excludes_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    !req.excludes.iter().any(|t| *t == vm.vm_type)
}

/// Keeps VMs whose memory per CPU reaches the requested cluster ratio.
fn min_mem_ratio_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    vm.mem / vm.cpus >= req.sum_mem / req.sum_cpu
}

/// Keeps VMs whose CPU per memory reaches the requested cluster ratio.
fn min_cpu_ratio_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    vm.cpus / vm.mem >= req.sum_cpu / req.sum_mem
}

fn burst_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    // burst instances are allowed unless explicitly forbidden
    !(req.allow_burst == Some(false) && vm.burst)
}

fn ntw_performance_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    match &req.network_perf {
        Some(category) => vm.network_perf_cat == *category,
        None => true,
    }
}

fn current_gen_filter(vm: &VirtualMachine, req: &ClusterRecommendationReq) -> bool {
    req.allow_older_gen == Some(true) || vm.current_gen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(vm_type: &str) -> VirtualMachine {
        VirtualMachine {
            vm_type: vm_type.to_string(),
            avg_price: 0.05,
            on_demand_price: 0.2,
            cpus: 4.0,
            mem: 16.0,
            gpus: 0.0,
            burst: false,
            network_perf: "Up to 10 Gigabit".to_string(),
            network_perf_cat: "high".to_string(),
            current_gen: true,
        }
    }

    fn req() -> ClusterRecommendationReq {
        ClusterRecommendationReq {
            sum_cpu: 16.0,
            sum_mem: 32.0,
            min_nodes: 1,
            max_nodes: 4,
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
    fn test_includes_passes_when_empty_or_listed() {
        let vm = vm("m5.xlarge");
        let mut req = req();
        assert!(includes_filter(&vm, &req));

        req.includes = vec!["c5.large".to_string()];
        assert!(!includes_filter(&vm, &req));

        req.includes.push("m5.xlarge".to_string());
        assert!(includes_filter(&vm, &req));
    }

    #[test]
    fn test_excludes_wins_over_includes() {
        let vm = vm("m5.xlarge");
        let mut req = req();
        req.includes = vec!["m5.xlarge".to_string()];
        req.excludes = vec!["m5.xlarge".to_string()];

        let policy = policy_for("amazon").unwrap();
        let filters = policy.filters_for(Attribute::Cpu);
        assert!(!filters_apply(&vm, &filters, &req));
    }

    #[test]
    fn test_burst_tri_state() {
        let mut vm = vm("t3.large");
        vm.burst = true;
        let mut req = req();

        assert!(burst_filter(&vm, &req));
        req.allow_burst = Some(true);
        assert!(burst_filter(&vm, &req));
        req.allow_burst = Some(false);
        assert!(!burst_filter(&vm, &req));
    }

    #[test]
    fn test_ntw_performance_matches_category() {
        let vm = vm("m5.xlarge");
        let mut req = req();
        assert!(ntw_performance_filter(&vm, &req));

        req.network_perf = Some("high".to_string());
        assert!(ntw_performance_filter(&vm, &req));

        req.network_perf = Some("low".to_string());
        assert!(!ntw_performance_filter(&vm, &req));
    }

    #[test]
    fn test_current_gen_default_filters_old_generations() {
        let mut vm = vm("m1.xlarge");
        vm.current_gen = false;
        let mut req = req();

        assert!(!current_gen_filter(&vm, &req));
        req.allow_older_gen = Some(true);
        assert!(current_gen_filter(&vm, &req));
        req.allow_older_gen = Some(false);
        assert!(!current_gen_filter(&vm, &req));
    }

    #[test]
    fn test_ratio_filters() {
        // cluster wants 2 GiB per cpu; the vm offers 4
        let vm = vm("m5.xlarge");
        let req = req();
        assert!(min_mem_ratio_filter(&vm, &req));

        let mut lean = req.clone();
        lean.sum_mem = 128.0; // now 8 GiB per cpu required
        assert!(!min_mem_ratio_filter(&vm, &lean));

        // memory anchor: 0.5 cpus per GiB wanted, vm offers 0.25
        assert!(!min_cpu_ratio_filter(&vm, &req));
    }

    #[test]
    fn test_provider_policy_composition() {
        let amazon = policy_for("amazon").unwrap();
        assert_eq!(amazon.filters_for(Attribute::Cpu).len(), 6);

        let google = policy_for("google").unwrap();
        assert_eq!(google.filters_for(Attribute::Memory).len(), 4);

        let azure = policy_for("azure").unwrap();
        assert_eq!(azure.filters_for(Attribute::Cpu).len(), 3);
    }

    #[test]
    fn test_unknown_provider_fails_closed() {
        assert!(matches!(
            policy_for("nimbus"),
            Err(RecommenderError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_oracle_forces_on_demand() {
        let oracle = policy_for("oracle").unwrap();
        assert_eq!(oracle.forced_on_demand_pct, Some(100));
    }
}
