//! Attribute value selection
//!
//! Picks, from the catalogue's value domain, the per-VM attribute values
//! that can satisfy the request within its node-count bounds.

use tracing::debug;

use crate::error::RecommenderError;

/// Select the domain values that fit `[min, max]`, in ascending order.
///
/// An empty window falls back to the nearest boundary value: the smallest
/// domain value when the window lies below the domain, the largest when it
/// lies above it, and the two surrounding values when the window falls in a
/// gap between adjacent domain values.
pub fn select_attribute_values(
    mut values: Vec<f64>,
    min: f64,
    max: f64,
) -> Result<Vec<f64>, RecommenderError> {
    if values.is_empty() {
        return Err(RecommenderError::EmptyAttributeDomain);
    }
    if min > max {
        return Err(RecommenderError::InvertedRange);
    }

    values.sort_by(f64::total_cmp);

    let smallest = values[0];
    let largest = values[values.len() - 1];
    if max < smallest {
        debug!(value = smallest, "window below domain, returning smallest value");
        return Ok(vec![smallest]);
    }
    if min > largest {
        debug!(value = largest, "window above domain, returning largest value");
        return Ok(vec![largest]);
    }

    let mut selected = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if *v >= min && *v <= max {
            selected.push(*v);
        } else if *v > max && selected.is_empty() {
            // the window fell between two adjacent domain values
            debug!(
                below = values[i - 1],
                above = *v,
                "no domain value in window, returning nearest values"
            );
            return Ok(vec![values[i - 1], *v]);
        }
    }
    Ok(selected)
}
