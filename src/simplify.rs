//! # Route Simplification
//!
//! Single-pass greedy reduction of a raw location stream.
//!
//! Each interior sample is tested against a three-point window: the last
//! retained sample, the sample itself, and the next *raw* sample. A sample is
//! kept when its perpendicular distance to the line through the other two
//! exceeds the tolerance. First and last samples are always kept.
//!
//! This is not Douglas-Peucker and must not be replaced by it: stored journeys
//! depend on this exact output shape. For the recursive algorithm see
//! [`crate::algorithms::douglas_peucker`].

use log::debug;

use crate::error::{Result, TelemetryError};
use crate::LocationSample;

/// Simplify a route, keeping samples that deviate more than
/// `tolerance_degrees` from their local chord.
///
/// Routes with fewer than 3 samples are returned unchanged. An empty route is
/// rejected with [`TelemetryError::InvalidInput`].
///
/// # Example
/// ```
/// use journey_telemetry::{simplify_route, LocationSample};
///
/// // Straight line: only the endpoints survive
/// let route: Vec<_> = (0..5)
///     .map(|i| LocationSample::new(i as f64, i as f64, i * 1000))
///     .collect();
/// let simplified = simplify_route(&route, 0.0).unwrap();
/// assert_eq!(simplified.len(), 2);
/// ```
pub fn simplify_route(
    route: &[LocationSample],
    tolerance_degrees: f64,
) -> Result<Vec<LocationSample>> {
    if route.is_empty() {
        return Err(TelemetryError::invalid_input(
            "cannot simplify an empty route",
        ));
    }
    if route.len() < 3 {
        return Ok(route.to_vec());
    }

    let last_index = route.len() - 1;
    let mut simplified = Vec::with_capacity(route.len());
    simplified.push(route[0]);

    for i in 1..last_index {
        // simplified is never empty here
        let anchor = simplified[simplified.len() - 1];
        let curr = &route[i];
        let next = &route[i + 1];

        if perpendicular_distance(&anchor, curr, next) > tolerance_degrees {
            simplified.push(*curr);
        }
    }

    simplified.push(route[last_index]);

    debug!(
        "[RouteSimplifier] {} -> {} samples (tolerance {})",
        route.len(),
        simplified.len(),
        tolerance_degrees
    );

    Ok(simplified)
}

/// Distance from `curr` to the line through `prev` and `next`, in degrees.
///
/// Returns 0 when `prev` and `next` coincide.
fn perpendicular_distance(
    prev: &LocationSample,
    curr: &LocationSample,
    next: &LocationSample,
) -> f64 {
    let d_lat = next.lat - prev.lat;
    let d_lng = next.lng - prev.lng;
    let denominator = d_lat.hypot(d_lng);
    if denominator == 0.0 {
        return 0.0;
    }

    let numerator =
        (d_lat * curr.lng - d_lng * curr.lat + next.lng * prev.lat - next.lat * prev.lng).abs();
    numerator / denominator
}
