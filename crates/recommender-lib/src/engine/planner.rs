//! Node pool planning for one anchor attribute
//!
//! Builds the on-demand pool, seeds the diversified spot pools and runs
//! the balanced fill loop. In scale-out mode the existing layout's pools
//! are carried over and topped up instead.

use tracing::debug;

use crate::models::{Attribute, ClusterRecommendationReq, NodePool, VirtualMachine, VmClass};

/// Expected number of spot nodes, halfway between the node-count bounds
/// after subtracting the on-demand nodes.
fn avg_spot_node_count(min_nodes: u64, max_nodes: u64, od_nodes: u64) -> u64 {
    let count =
        (min_nodes as i64 - od_nodes as i64 + max_nodes as i64 - od_nodes as i64) as f64 / 2.0;
    (count.ceil() as i64).max(0) as u64
}

/// Number of spot pools the fill loop spreads load across.
fn find_n(avg: u64) -> u64 {
    match avg {
        0..=4 => avg,
        5..=8 => 4,
        9..=15 => 5,
        16..=24 => 6,
        25..=35 => 7,
        _ => 8,
    }
}

/// Number of candidate spot types materialised as pools; the tail beyond
/// `n` starts empty and may stay empty.
fn find_m(n: u64, spot_vm_count: usize) -> usize {
    if n > 0 {
        ((n as f64 * 1.5).ceil() as usize).min(spot_vm_count)
    } else {
        3.min(spot_vm_count)
    }
}

/// Number of pools to fill when an existing layout is carried over.
fn find_n_with_layout(non_zero_pools: usize, vm_options: usize) -> usize {
    if non_zero_pools == 0 {
        1
    } else {
        non_zero_pools.min(vm_options)
    }
}

/// Sort candidates ascending by average price per attribute unit. The
/// sort is stable, so equally priced candidates keep their input order.
fn sort_by_attr_price(attribute: Attribute, vms: &mut [VirtualMachine]) {
    vms.sort_by(|a, b| {
        (a.avg_price / a.attr_value(attribute)).total_cmp(&(b.avg_price / b.attr_value(attribute)))
    });
}

/// Plan the node pools for one anchor attribute: the on-demand pool(s)
/// first, then the spot pools.
pub fn recommend_node_pools(
    attribute: Attribute,
    od_vms: &[VirtualMachine],
    spot_vms: &[VirtualMachine],
    req: &ClusterRecommendationReq,
    layout: Option<&[NodePool]>,
) -> Vec<NodePool> {
    let sum_on_demand_value = req.sum(attribute) * req.on_demand_pct as f64 / 100.0;
    debug!(
        attribute = %attribute,
        requested = req.sum(attribute),
        on_demand = sum_on_demand_value,
        "planning node pools"
    );

    // carry over the layout's regular pools before adding new capacity
    let mut od_pools: Vec<NodePool> = layout
        .map(|pools| {
            pools
                .iter()
                .filter(|np| np.vm_class == VmClass::Regular)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let mut od_nodes_to_add = 0u64;
    let mut actual_on_demand_value = 0.0;
    if let Some(first) = od_vms.first() {
        // cheapest on-demand candidate by price per attribute unit
        let selected = od_vms.iter().skip(1).fold(first, |best, vm| {
            if vm.on_demand_price / vm.attr_value(attribute)
                < best.on_demand_price / best.attr_value(attribute)
            {
                vm
            } else {
                best
            }
        });

        od_nodes_to_add = (sum_on_demand_value / selected.attr_value(attribute)).ceil() as u64;
        match od_pools
            .iter_mut()
            .find(|np| np.vm_type.vm_type == selected.vm_type)
        {
            Some(existing) => existing.sum_nodes += od_nodes_to_add,
            None => od_pools.push(NodePool {
                vm_type: selected.clone(),
                sum_nodes: od_nodes_to_add,
                vm_class: VmClass::Regular,
            }),
        }
        // only the newly added nodes count toward the on-demand share
        actual_on_demand_value = selected.attr_value(attribute) * od_nodes_to_add as f64;
    }

    let sum_spot_value = req.sum(attribute) - actual_on_demand_value;
    debug!(attribute = %attribute, spot = sum_spot_value, "spot share to fill");

    let mut sorted_spots = spot_vms.to_vec();
    sort_by_attr_price(attribute, &mut sorted_spots);

    let mut spot_pools: Vec<NodePool> = Vec::new();
    let mut excluded_spot_pools: Vec<NodePool> = Vec::new();
    let n = match layout {
        None => {
            let n = (find_n(avg_spot_node_count(
                req.min_nodes,
                req.max_nodes,
                od_nodes_to_add,
            )) as usize)
                .min(sorted_spots.len());
            let m = find_m(n as u64, sorted_spots.len());
            debug!(n, m, "diversification numbers");

            for vm in &sorted_spots[..m] {
                spot_pools.push(NodePool {
                    vm_type: vm.clone(),
                    sum_nodes: 0,
                    vm_class: VmClass::Spot,
                });
            }
            n
        }
        Some(layout) => {
            let mut layout_pools: Vec<NodePool> = layout.to_vec();
            layout_pools.sort_by(|a, b| b.sum_nodes.cmp(&a.sum_nodes));

            let mut non_zero_pools = 0usize;
            for np in layout_pools {
                if np.vm_class != VmClass::Spot {
                    continue;
                }
                if np.sum_nodes > 0 {
                    non_zero_pools += 1;
                }
                if sorted_spots
                    .iter()
                    .any(|vm| vm.vm_type == np.vm_type.vm_type)
                {
                    spot_pools.push(np);
                } else {
                    // no longer a candidate; re-appended untouched below
                    excluded_spot_pools.push(np);
                }
            }
            find_n_with_layout(non_zero_pools, sorted_spots.len())
        }
    };
    debug!(
        regular = od_pools.len(),
        spot = spot_pools.len(),
        "created node pools"
    );

    fill_spot_node_pools(&mut spot_pools, sum_spot_value, n, attribute);

    od_pools.extend(spot_pools);
    od_pools.extend(excluded_spot_pools);
    od_pools
}

/// Distribute the required spot capacity across the first `n` pools,
/// keeping their attribute totals balanced: the pool with the smallest
/// total is always grown, the others only while they stay at or below it.
///
/// Terminates because the smallest pool grows by a strictly positive
/// amount at least once every `n` steps.
fn fill_spot_node_pools(pools: &mut [NodePool], sum_spot_value: f64, n: usize, attribute: Attribute) {
    let mut n = n.min(pools.len());
    if n == 0 {
        if sum_spot_value > 0.0 && !pools.is_empty() {
            // a positive spot share must land somewhere even when the
            // diversification heuristic suggests no active pools
            n = 1;
        } else {
            return;
        }
    }

    let mut sum_in_pools = 0.0;
    let mut min_index = 0;
    let mut min_value = 0.0;
    for (i, pool) in pools.iter().take(n).enumerate() {
        let v = pool.attr_sum(attribute);
        sum_in_pools += v;
        if i == 0 || v < min_value {
            min_value = v;
            min_index = i;
        }
    }

    let desired = sum_in_pools + sum_spot_value;
    let mut idx = min_index;
    while sum_in_pools < desired {
        let k = idx % n;
        if k == min_index {
            // always grow the smallest pool, then move on
            pools[k].sum_nodes += 1;
            sum_in_pools += pools[k].vm_type.attr_value(attribute);
            idx += 1;
        } else if pools[k].next_attr_sum(attribute) > pools[min_index].attr_sum(attribute) {
            // growing this pool would overtake the smallest one
            idx += 1;
        } else {
            // keep packing this pool until it catches up
            pools[k].sum_nodes += 1;
            sum_in_pools += pools[k].vm_type.attr_value(attribute);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(vm_type: &str, cpus: f64, mem: f64, avg_price: f64, od_price: f64) -> VirtualMachine {
        VirtualMachine {
            vm_type: vm_type.to_string(),
            avg_price,
            on_demand_price: od_price,
            cpus,
            mem,
            gpus: 0.0,
            burst: false,
            network_perf: String::new(),
            network_perf_cat: String::new(),
            current_gen: true,
        }
    }

    fn spot_pool(vm: VirtualMachine, sum_nodes: u64) -> NodePool {
        NodePool {
            vm_type: vm,
            sum_nodes,
            vm_class: VmClass::Spot,
        }
    }

    fn req(sum_cpu: f64, min_nodes: u64, max_nodes: u64, on_demand_pct: u32) -> ClusterRecommendationReq {
        ClusterRecommendationReq {
            sum_cpu,
            sum_mem: sum_cpu,
            min_nodes,
            max_nodes,
            same_size: false,
            on_demand_pct,
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
    fn test_avg_spot_node_count() {
        assert_eq!(avg_spot_node_count(5, 10, 0), 8);
        assert_eq!(avg_spot_node_count(1, 1, 0), 1);
        assert_eq!(avg_spot_node_count(1, 2, 5), 0);
    }

    #[test]
    fn test_find_n_buckets() {
        assert_eq!(find_n(0), 0);
        assert_eq!(find_n(3), 3);
        assert_eq!(find_n(4), 4);
        assert_eq!(find_n(8), 4);
        assert_eq!(find_n(9), 5);
        assert_eq!(find_n(15), 5);
        assert_eq!(find_n(24), 6);
        assert_eq!(find_n(35), 7);
        assert_eq!(find_n(36), 8);
        assert_eq!(find_n(1000), 8);
    }

    #[test]
    fn test_find_m() {
        assert_eq!(find_m(4, 10), 6);
        assert_eq!(find_m(4, 5), 5);
        assert_eq!(find_m(0, 10), 3);
        assert_eq!(find_m(0, 2), 2);
    }

    #[test]
    fn test_find_n_with_layout() {
        assert_eq!(find_n_with_layout(0, 5), 1);
        assert_eq!(find_n_with_layout(3, 5), 3);
        assert_eq!(find_n_with_layout(7, 5), 5);
    }

    #[test]
    fn test_fill_loop_balances_two_pools() {
        let mut pools = vec![
            spot_pool(vm("small", 4.0, 8.0, 0.02, 0.1), 0),
            spot_pool(vm("large", 8.0, 16.0, 0.08, 0.2), 0),
        ];
        fill_spot_node_pools(&mut pools, 16.0, 2, Attribute::Cpu);

        assert_eq!(pools[0].sum_nodes, 2);
        assert_eq!(pools[1].sum_nodes, 1);
        let total: f64 = pools.iter().map(|p| p.attr_sum(Attribute::Cpu)).sum();
        assert!(total >= 16.0);
        // neither pool overtakes the anchor pool by more than one step
        assert!(pools[1].attr_sum(Attribute::Cpu) <= pools[0].next_attr_sum(Attribute::Cpu));
    }

    #[test]
    fn test_fill_loop_resumes_from_existing_counts() {
        let mut pools = vec![
            spot_pool(vm("a", 2.0, 4.0, 0.01, 0.05), 3),
            spot_pool(vm("b", 2.0, 4.0, 0.02, 0.05), 1),
        ];
        fill_spot_node_pools(&mut pools, 8.0, 2, Attribute::Cpu);

        let total: f64 = pools.iter().map(|p| p.attr_sum(Attribute::Cpu)).sum();
        // 8 cpus existed, 8 more were requested
        assert!(total >= 16.0);
        // the initially smaller pool caught up
        assert!(pools[1].sum_nodes > 1);
    }

    #[test]
    fn test_fill_loop_without_pools_is_a_noop() {
        let mut pools: Vec<NodePool> = vec![];
        fill_spot_node_pools(&mut pools, 16.0, 1, Attribute::Cpu);
        assert!(pools.is_empty());
    }

    #[test]
    fn test_cold_start_emits_od_pool_and_seeded_spot_pools() {
        let candidates = vec![
            vm("a", 4.0, 8.0, 0.02, 0.1),
            vm("b", 4.0, 8.0, 0.03, 0.12),
            vm("c", 8.0, 16.0, 0.09, 0.2),
        ];
        let req = req(32.0, 2, 6, 50);

        let pools = recommend_node_pools(Attribute::Cpu, &candidates, &candidates, &req, None);

        // on-demand pool first, pinned to the cheapest type per cpu
        assert_eq!(pools[0].vm_class, VmClass::Regular);
        assert_eq!(pools[0].vm_type.vm_type, "a");
        assert_eq!(pools[0].sum_nodes, 4); // ceil(16 / 4)

        let spot: Vec<&NodePool> = pools.iter().filter(|p| p.vm_class == VmClass::Spot).collect();
        // avg spot nodes = ceil((2-4 + 6-4)/2) = 0 -> N = 0 -> M = 3
        assert_eq!(spot.len(), 3);
        // price-per-cpu ordering of the seeded pools
        assert_eq!(spot[0].vm_type.vm_type, "a");
        assert_eq!(spot[1].vm_type.vm_type, "b");
        assert_eq!(spot[2].vm_type.vm_type, "c");
        // the remaining 16 cpus of spot share landed in the first pool
        assert_eq!(spot[0].sum_nodes, 4);
        assert_eq!(spot[1].sum_nodes, 0);
        assert_eq!(spot[2].sum_nodes, 0);
    }

    #[test]
    fn test_zero_on_demand_pct_keeps_empty_regular_pool() {
        let candidates = vec![
            vm("a", 10.0, 20.0, 0.05, 0.2),
            vm("b", 10.0, 20.0, 0.06, 0.25),
            vm("c", 12.0, 24.0, 0.08, 0.3),
        ];
        let req = req(100.0, 5, 10, 0);

        let pools = recommend_node_pools(Attribute::Cpu, &candidates, &candidates, &req, None);

        assert_eq!(pools[0].vm_class, VmClass::Regular);
        assert_eq!(pools[0].sum_nodes, 0);

        let spot_cpus: f64 = pools
            .iter()
            .filter(|p| p.vm_class == VmClass::Spot)
            .map(|p| p.attr_sum(Attribute::Cpu))
            .sum();
        assert!(spot_cpus >= 100.0);
    }

    #[test]
    fn test_full_on_demand_leaves_spot_pools_empty() {
        let candidates = vec![vm("a", 4.0, 8.0, 0.02, 0.1), vm("b", 8.0, 16.0, 0.05, 0.2)];
        let req = req(16.0, 1, 4, 100);

        let pools = recommend_node_pools(Attribute::Cpu, &candidates, &candidates, &req, None);

        assert_eq!(pools[0].vm_class, VmClass::Regular);
        assert_eq!(pools[0].sum_nodes, 4);
        assert!(pools
            .iter()
            .filter(|p| p.vm_class == VmClass::Spot)
            .all(|p| p.sum_nodes == 0));
    }

    #[test]
    fn test_scaleout_tops_up_existing_regular_pool() {
        let existing = vm("a", 4.0, 8.0, 0.02, 0.1);
        let layout = vec![NodePool {
            vm_type: existing.clone(),
            sum_nodes: 2,
            vm_class: VmClass::Regular,
        }];
        let req = req(16.0, 1, 127, 100);

        let pools =
            recommend_node_pools(Attribute::Cpu, &[existing.clone()], &[existing], &req, Some(&layout));

        // ceil(16/4) = 4 new nodes on top of the carried-over 2
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].sum_nodes, 6);
    }

    #[test]
    fn test_scaleout_reappends_dropped_spot_pool_untouched() {
        let kept = vm("keep", 4.0, 8.0, 0.02, 0.1);
        let dropped = vm("gone", 4.0, 8.0, 0.03, 0.1);
        let layout = vec![
            spot_pool(kept.clone(), 2),
            spot_pool(dropped.clone(), 5),
        ];
        let req = req(16.0, 1, 127, 0);

        // "gone" is no longer among the candidates
        let pools = recommend_node_pools(Attribute::Cpu, &[], &[kept], &req, Some(&layout));

        let tail = pools.last().unwrap();
        assert_eq!(tail.vm_type.vm_type, "gone");
        assert_eq!(tail.sum_nodes, 5);
        // the kept pool absorbed the whole spot share
        assert!(pools[0].attr_sum(Attribute::Cpu) >= 16.0);
    }
}
