//! The recommendation engine
//!
//! Orchestrates one recommendation: for each anchor attribute it looks up
//! the attribute domain and the product catalogue, filters and selects
//! candidates, plans the node pools, and finally returns the cheaper of
//! the CPU- and memory-anchored plans. The engine is stateless; it holds
//! a reference to its (usually caching) catalogue source.

pub mod attrs;
pub mod filters;
pub mod planner;
pub mod selector;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cloudinfo::CloudInfoSource;
use crate::error::RecommenderError;
use crate::models::{
    Attribute, ClusterRecommendationAccuracy, ClusterRecommendationReq, ClusterRecommendationResp,
    ClusterScaleoutRecommendationReq, NodePool, NodePoolDesc, VirtualMachine, VmClass,
};

/// Scale-out requests carry no node-count bounds; the attribute window is
/// left wide open instead.
const SCALEOUT_MAX_NODES: u64 = 127;

/// The recommendation engine.
pub struct Engine {
    source: Arc<dyn CloudInfoSource>,
}

impl Engine {
    pub fn new(source: Arc<dyn CloudInfoSource>) -> Self {
        Self { source }
    }

    /// Recommend a cluster layout for the requested resource envelope.
    ///
    /// With a `layout_desc` the engine runs in scale-out mode: the request
    /// totals are treated as already-translated deltas and the layout's
    /// pools are carried over into the plan.
    pub async fn recommend_cluster(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        req: ClusterRecommendationReq,
        layout_desc: Option<&[NodePoolDesc]>,
    ) -> Result<ClusterRecommendationResp, RecommenderError> {
        req.validate()?;
        let policy = filters::policy_for(provider)?;

        let mut req = req;
        if let Some(pct) = policy.forced_on_demand_pct {
            if req.on_demand_pct != pct {
                warn!(
                    provider = %provider,
                    on_demand_pct = req.on_demand_pct,
                    "provider mandates a fixed on-demand percentage, request value ignored"
                );
                req.on_demand_pct = pct;
            }
        }

        info!(
            provider = %provider,
            service = %service,
            region = %region,
            sum_cpu = req.sum_cpu,
            sum_mem = req.sum_mem,
            on_demand_pct = req.on_demand_pct,
            scale_out = layout_desc.is_some(),
            "recommending cluster layout"
        );

        let desired_cpu = req.sum_cpu;
        let desired_mem = req.sum_mem;
        let desired_od_pct = req.on_demand_pct;

        let mut plans: Vec<(Attribute, Vec<NodePool>)> = Vec::new();
        for attribute in [Attribute::Cpu, Attribute::Memory] {
            let values = if layout_desc.is_none() {
                let values = self
                    .recommend_attr_values(provider, service, region, attribute, &req)
                    .await?;
                debug!(attribute = %attribute, values = ?values, "recommended attribute values");
                Some(values)
            } else {
                None
            };

            let vms_in_range = self
                .find_vms_with_attr_values(
                    provider,
                    service,
                    region,
                    &req.zones,
                    attribute,
                    values.as_deref(),
                )
                .await?;

            let layout = layout_desc.map(|desc| transform_layout(desc, &vms_in_range));

            let mut anchor_req = req.clone();
            if let Some(layout) = &layout {
                match compute_scaleout_resources(
                    layout,
                    attribute,
                    desired_cpu,
                    desired_mem,
                    desired_od_pct,
                ) {
                    Ok((cpu, mem, pct)) => {
                        if cpu <= 0.0 && mem <= 0.0 {
                            return Err(RecommenderError::AlreadySatisfied {
                                cpu: desired_cpu - cpu,
                                mem: desired_mem - mem,
                            });
                        }
                        anchor_req.sum_cpu = cpu;
                        anchor_req.sum_mem = mem;
                        // a provider-mandated percentage beats the computed one
                        anchor_req.on_demand_pct = policy.forced_on_demand_pct.unwrap_or(pct);
                    }
                    Err(e @ RecommenderError::InfeasibleOnDemandRatio { .. }) => return Err(e),
                    Err(e) => {
                        warn!(attribute = %attribute, error = %e, "skipping anchor attribute");
                        continue;
                    }
                }
            }

            let vm_filters = policy.filters_for(attribute);
            let (od_vms, spot_vms) = match selector::recommend_vms(
                &vms_in_range,
                attribute,
                &vm_filters,
                &anchor_req,
                layout.as_deref(),
            ) {
                Ok(candidates) => candidates,
                Err(e @ RecommenderError::NoViableVms { .. }) => {
                    debug!(attribute = %attribute, error = %e, "skipping anchor attribute");
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!(
                attribute = %attribute,
                on_demand = od_vms.len(),
                spot = spot_vms.len(),
                "recommended candidate virtual machines"
            );

            let pools = planner::recommend_node_pools(
                attribute,
                &od_vms,
                &spot_vms,
                &anchor_req,
                layout.as_deref(),
            );
            debug!(attribute = %attribute, pools = pools.len(), "planned node pools");
            plans.push((attribute, pools));
        }

        let Some(cheapest) = find_cheapest_plan(plans) else {
            debug!("no anchor attribute produced a plan");
            return Err(RecommenderError::Unsatisfiable);
        };

        let accuracy = response_sum(&req.zones, &cheapest);
        Ok(ClusterRecommendationResp {
            provider: provider.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            zones: req.zones.clone(),
            node_pools: cheapest,
            accuracy,
        })
    }

    /// Recommend the delta for scaling out an existing cluster layout.
    pub async fn recommend_cluster_scaleout(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        req: ClusterScaleoutRecommendationReq,
    ) -> Result<ClusterRecommendationResp, RecommenderError> {
        req.validate()?;

        let includes = req
            .actual_layout
            .iter()
            .map(|np| np.instance_type.clone())
            .collect();

        let cluster_req = ClusterRecommendationReq {
            sum_cpu: req.desired_cpu,
            sum_mem: req.desired_mem,
            sum_gpu: req.desired_gpu,
            min_nodes: 1,
            max_nodes: SCALEOUT_MAX_NODES,
            same_size: false,
            on_demand_pct: req.on_demand_pct,
            zones: req.zones.clone(),
            allow_burst: Some(true),
            network_perf: None,
            excludes: req.excludes.clone(),
            includes,
            allow_older_gen: Some(true),
        };

        self.recommend_cluster(provider, service, region, cluster_req, Some(&req.actual_layout))
            .await
    }

    /// Attribute values allowed to participate in the recommendation.
    async fn recommend_attr_values(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        attribute: Attribute,
        req: &ClusterRecommendationReq,
    ) -> Result<Vec<f64>, RecommenderError> {
        let domain = self
            .source
            .get_attribute_values(provider, service, region, attribute)
            .await?;
        attrs::select_attribute_values(
            domain,
            req.min_value_per_vm(attribute),
            req.max_value_per_vm(attribute),
        )
    }

    /// Reduce the catalogue to the VMs whose anchor attribute takes one of
    /// the selected values; `values` of `None` keeps the whole catalogue.
    /// Zones missing from the request are resolved from the catalogue for
    /// the spot price averaging.
    async fn find_vms_with_attr_values(
        &self,
        provider: &str,
        service: &str,
        region: &str,
        zones: &[String],
        attribute: Attribute,
        values: Option<&[f64]>,
    ) -> Result<Vec<VirtualMachine>, RecommenderError> {
        let zones = if zones.is_empty() {
            self.source.get_zones(provider, service, region).await?
        } else {
            zones.to_vec()
        };

        let products = self
            .source
            .get_product_details(provider, service, region)
            .await?;

        let mut vms = Vec::new();
        for product in products {
            let included = match values {
                Some(values) if !values.is_empty() => values.iter().any(|v| match attribute {
                    Attribute::Cpu => product.cpus == *v,
                    Attribute::Memory => product.mem == *v,
                }),
                _ => true,
            };
            if !included {
                continue;
            }
            let avg_price = zone_averaged_price(&product.spot_prices, &zones);
            vms.push(VirtualMachine {
                vm_type: product.instance_type,
                on_demand_price: product.on_demand_price,
                avg_price,
                cpus: product.cpus,
                mem: product.mem,
                gpus: product.gpus,
                burst: product.burst,
                network_perf: product.ntw_perf,
                network_perf_cat: product.ntw_perf_cat,
                current_gen: product.current_gen,
            });
        }
        Ok(vms)
    }
}

/// Resolve a layout description against the catalogue's VMs. Entries whose
/// instance type the catalogue does not know are dropped; they cannot
/// contribute capacity or candidates.
fn transform_layout(layout_desc: &[NodePoolDesc], vms: &[VirtualMachine]) -> Vec<NodePool> {
    layout_desc
        .iter()
        .filter_map(|desc| {
            vms.iter()
                .find(|vm| vm.vm_type == desc.instance_type)
                .map(|vm| NodePool {
                    vm_type: vm.clone(),
                    vm_class: desc.vm_class(),
                    sum_nodes: desc.sum_nodes,
                })
        })
        .collect()
}

/// Translate desired totals into the per-anchor scale-out deltas:
/// `(scaleoutCpu, scaleoutMem, scaleoutOnDemandPct)`.
fn compute_scaleout_resources(
    layout: &[NodePool],
    attribute: Attribute,
    desired_cpu: f64,
    desired_mem: f64,
    desired_od_pct: u32,
) -> Result<(f64, f64, u32), RecommenderError> {
    let mut current_cpu = 0.0;
    let mut current_mem = 0.0;
    let mut current_od_cpu = 0.0;
    let mut current_od_mem = 0.0;
    for np in layout {
        if np.vm_class == VmClass::Regular {
            current_od_cpu += np.attr_sum(Attribute::Cpu);
            current_od_mem += np.attr_sum(Attribute::Memory);
        }
        current_cpu += np.attr_sum(Attribute::Cpu);
        current_mem += np.attr_sum(Attribute::Memory);
    }

    let scaleout_cpu = desired_cpu - current_cpu;
    let scaleout_mem = desired_mem - current_mem;
    if scaleout_cpu <= 0.0 && scaleout_mem <= 0.0 {
        return Ok((scaleout_cpu, scaleout_mem, 0));
    }

    debug!(
        desired_cpu,
        desired_mem,
        current_cpu,
        current_mem,
        current_od_cpu,
        current_od_mem,
        desired_od_pct,
        "computing scale-out resources"
    );

    let (scaleout_attr, desired_attr, current_od_attr) = match attribute {
        Attribute::Cpu => (scaleout_cpu, desired_cpu, current_od_cpu),
        Attribute::Memory => (scaleout_mem, desired_mem, current_od_mem),
    };
    if scaleout_attr <= 0.0 {
        return Err(RecommenderError::AnchorSatisfied { attribute });
    }

    let desired_od_attr = desired_attr * desired_od_pct as f64 / 100.0;
    let scaleout_od_attr = desired_od_attr - current_od_attr;
    let scaleout_od_pct = (scaleout_od_attr / scaleout_attr * 100.0) as i64;
    debug!(
        attribute = %attribute,
        desired_od_attr,
        scaleout_od_attr,
        scaleout_od_pct,
        "on-demand share of the scale-out"
    );

    if scaleout_od_pct > 100 {
        // even a pure on-demand scale-out cannot reach the requested ratio
        return Err(RecommenderError::InfeasibleOnDemandRatio {
            on_demand_pct: desired_od_pct,
        });
    }
    Ok((scaleout_cpu, scaleout_mem, scaleout_od_pct.max(0) as u32))
}

/// Pick the cheaper plan; anchors are compared in deterministic
/// {cpu, memory} order, so equal prices keep the CPU-anchored plan.
fn find_cheapest_plan(plans: Vec<(Attribute, Vec<NodePool>)>) -> Option<Vec<NodePool>> {
    let mut best: Option<(f64, Vec<NodePool>)> = None;
    for (attribute, pools) in plans {
        let price: f64 = pools.iter().map(NodePool::pool_price).sum();
        debug!(attribute = %attribute, price, "checking plan price");
        if best.as_ref().map_or(true, |(best_price, _)| price < *best_price) {
            best = Some((price, pools));
        }
    }
    best.map(|(_, pools)| pools)
}

/// Mean of the product's spot prices over the requested zones; `0` when no
/// zone matches or the product has no spot data. The sum of the matching
/// zone prices is averaged over all of the product's zone entries.
fn zone_averaged_price(prices: &[crate::cloudinfo::ZonePrice], zones: &[String]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let matched: f64 = prices
        .iter()
        .filter(|zp| zones.iter().any(|z| *z == zp.zone))
        .map(|zp| zp.price)
        .sum();
    matched / prices.len() as f64
}

/// Accuracy summary of the chosen node pool set.
fn response_sum(zones: &[String], node_pools: &[NodePool]) -> ClusterRecommendationAccuracy {
    let mut accuracy = ClusterRecommendationAccuracy {
        rec_cpu: 0.0,
        rec_mem: 0.0,
        rec_nodes: 0,
        rec_zone: zones.to_vec(),
        rec_regular_price: 0.0,
        rec_regular_nodes: 0,
        rec_spot_price: 0.0,
        rec_spot_nodes: 0,
        rec_total_price: 0.0,
    };
    for pool in node_pools {
        accuracy.rec_cpu += pool.attr_sum(Attribute::Cpu);
        accuracy.rec_mem += pool.attr_sum(Attribute::Memory);
        accuracy.rec_nodes += pool.sum_nodes;
        match pool.vm_class {
            VmClass::Regular => {
                accuracy.rec_regular_price += pool.pool_price();
                accuracy.rec_regular_nodes += pool.sum_nodes;
            }
            VmClass::Spot => {
                accuracy.rec_spot_price += pool.pool_price();
                accuracy.rec_spot_nodes += pool.sum_nodes;
            }
        }
        accuracy.rec_total_price += pool.pool_price();
    }
    accuracy
}
