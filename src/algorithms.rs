//! # Algorithm Toolbox
//!
//! Direct access to the pure algorithms in this crate, without the pipeline,
//! geocoder or any async machinery.
//!
//! ## Core Algorithms
//!
//! - **Route Simplification**: single-pass three-point-window reduction
//! - **Journey Aggregation**: summary statistics over stored journeys
//! - **Address Formatting**: Nominatim address components to a display string
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance between samples
//! - **Polyline Length**: Total distance along a path
//! - **Douglas-Peucker**: Recursive line simplification (reference only)
//!
//! # Example
//!
//! ```rust
//! use journey_telemetry::algorithms::{haversine_distance, simplify_route, LocationSample};
//!
//! let london = LocationSample::new(51.5074, -0.1278, 0);
//! let paris = LocationSample::new(48.8566, 2.3522, 0);
//! println!("London to Paris: {:.0} km", haversine_distance(&london, &paris) / 1000.0);
//!
//! let simplified = simplify_route(&[london, paris], 0.0001).unwrap();
//! assert_eq!(simplified.len(), 2);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Journey, JourneyStats, LocationSample};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    haversine_distance, is_valid_coordinate, polyline_length, validate_route,
};

// =============================================================================
// Route Simplification
// =============================================================================

/// Single-pass route simplification used by the journey pipeline.
pub use crate::simplify::simplify_route;

/// Recursive Douglas-Peucker line simplification.
///
/// Uses the geo crate's implementation. Output differs from
/// [`simplify_route`] on most inputs; the journey pipeline never calls this.
/// Timestamps of retained samples are preserved.
///
/// # Example
/// ```rust
/// use journey_telemetry::algorithms::{douglas_peucker, LocationSample};
///
/// let track = vec![
///     LocationSample::new(51.5074, -0.1278, 0),
///     LocationSample::new(51.5080, -0.1280, 1_000),
///     LocationSample::new(51.5090, -0.1300, 2_000),
/// ];
/// let simplified = douglas_peucker(&track, 0.0001);
/// assert_eq!(simplified.first(), track.first());
/// ```
pub fn douglas_peucker(samples: &[LocationSample], tolerance: f64) -> Vec<LocationSample> {
    use geo::{algorithm::simplify::SimplifyIdx, Coord, LineString};

    if samples.len() < 3 {
        return samples.to_vec();
    }

    let coords: Vec<Coord<f64>> = samples
        .iter()
        .map(|s| Coord { x: s.lng, y: s.lat })
        .collect();

    let line = LineString::new(coords);
    line.simplify_idx(&tolerance)
        .into_iter()
        .map(|i| samples[i])
        .collect()
}

// =============================================================================
// Aggregation and Formatting
// =============================================================================

/// Reduce journeys to summary statistics.
pub use crate::aggregate::aggregate_journeys;

/// Format Nominatim address components.
pub use crate::geocoding::format_address;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_douglas_peucker_keeps_corner() {
        let track: Vec<LocationSample> = [(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (1.0, 2.0), (2.0, 2.0)]
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| LocationSample::new(lat, lng, i as i64))
            .collect();

        let simplified = douglas_peucker(&track, 0.1);
        let times: Vec<i64> = simplified.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(times, vec![0, 2, 4]);
    }

    #[test]
    fn test_douglas_peucker_short_input() {
        let track = vec![LocationSample::new(1.0, 1.0, 0)];
        assert_eq!(douglas_peucker(&track, 1.0), track);
    }
}
