//! Geographic utilities: distances and input validation.

use geo::{Distance, Haversine, Point};

use crate::error::{Result, TelemetryError};
use crate::LocationSample;

/// Check that a coordinate pair is finite and within WGS84 bounds.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Calculate haversine distance between two samples in meters.
pub fn haversine_distance(a: &LocationSample, b: &LocationSample) -> f64 {
    let p1 = Point::new(a.lng, a.lat);
    let p2 = Point::new(b.lng, b.lat);
    Haversine::distance(p1, p2)
}

/// Total length of the path through `samples`, in meters.
pub fn polyline_length(samples: &[LocationSample]) -> f64 {
    samples
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Reject empty routes, invalid coordinates and decreasing timestamps.
pub fn validate_route(samples: &[LocationSample]) -> Result<()> {
    if samples.is_empty() {
        return Err(TelemetryError::invalid_input("route has no samples"));
    }

    if let Some((i, s)) = samples.iter().enumerate().find(|(_, s)| !s.is_valid()) {
        return Err(TelemetryError::invalid_input(format!(
            "sample {} has invalid coordinates ({}, {})",
            i, s.lat, s.lng
        )));
    }

    if let Some(i) = samples
        .windows(2)
        .position(|w| w[1].timestamp_ms < w[0].timestamp_ms)
    {
        return Err(TelemetryError::invalid_input(format!(
            "sample {} is older than the sample before it",
            i + 1
        )));
    }

    Ok(())
}
