//! Candidate selection for one anchor attribute
//!
//! Produces the on-demand and spot candidate lists from the filtered
//! products, honouring an existing layout in scale-out mode.

use tracing::debug;

use super::filters::{filters_apply, VmFilter};
use crate::error::RecommenderError;
use crate::models::{Attribute, ClusterRecommendationReq, NodePool, VirtualMachine, VmClass};

/// Select on-demand and spot candidates for the given anchor attribute.
///
/// Without a layout both candidate lists are the filtered set. With a
/// layout, candidates are restricted to the types already present in the
/// layout's pools of the matching purchasing class. When the request asks
/// for any spot share, only types with an actual spot price remain spot
/// candidates.
pub fn recommend_vms(
    vms: &[VirtualMachine],
    attribute: Attribute,
    filters: &[VmFilter],
    req: &ClusterRecommendationReq,
    layout: Option<&[NodePool]>,
) -> Result<(Vec<VirtualMachine>, Vec<VirtualMachine>), RecommenderError> {
    let filtered: Vec<VirtualMachine> = vms
        .iter()
        .filter(|vm| filters_apply(vm, filters, req))
        .cloned()
        .collect();

    if filtered.is_empty() {
        debug!(attribute = %attribute, "filters eliminated every candidate");
        return Err(RecommenderError::NoViableVms { attribute });
    }

    let (od_vms, mut spot_vms) = match layout {
        None => (filtered.clone(), filtered),
        Some(layout) => {
            let mut od_vms = Vec::new();
            let mut spot_vms = Vec::new();
            for pool in layout {
                if let Some(vm) = filtered.iter().find(|vm| vm.vm_type == pool.vm_type.vm_type) {
                    match pool.vm_class {
                        VmClass::Regular => od_vms.push(vm.clone()),
                        VmClass::Spot => spot_vms.push(vm.clone()),
                    }
                }
            }
            (od_vms, spot_vms)
        }
    };

    if req.on_demand_pct < 100 {
        // retain only the types actually offered as spot or preemptible
        spot_vms.retain(|vm| vm.avg_price > 0.0);
        if spot_vms.is_empty() {
            debug!(attribute = %attribute, "no vms suitable for spot pools");
            return Err(RecommenderError::NoViableVms { attribute });
        }
    }

    if od_vms.is_empty() && req.on_demand_pct > 0 {
        debug!(attribute = %attribute, "no vms suitable for on-demand pools");
        return Err(RecommenderError::NoViableVms { attribute });
    }

    Ok((od_vms, spot_vms))
}
