//! # Journey Telemetry
//!
//! Geospatial telemetry processing for tracked driving journeys.
//!
//! This library provides:
//! - Single-pass route simplification of raw location samples
//! - Reverse/forward geocoding with a coordinate-grid cache and request coalescing
//! - Debounce and throttle controllers for bursty location updates
//! - Journey assembly, persistence hand-off and summary statistics
//!
//! ## Features
//!
//! - **`http`** - Enable the Nominatim client and memoized JSON fetching (default)
//!
//! ## Quick Start
//!
//! ```rust
//! use journey_telemetry::{simplify_route, LocationSample};
//!
//! let route = vec![
//!     LocationSample::new(51.5074, -0.1278, 0),
//!     LocationSample::new(51.5075, -0.1279, 1_000),
//!     LocationSample::new(51.5090, -0.1300, 2_000),
//! ];
//!
//! let simplified = simplify_route(&route, 0.00001).unwrap();
//! assert_eq!(simplified.first(), route.first());
//! assert_eq!(simplified.last(), route.last());
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TelemetryError};

// Configuration for the whole pipeline
pub mod config;
pub use config::{GeocoderConfig, RateConfig, TelemetryConfig};

// Geographic utilities (distance, validation)
pub mod geo_utils;

// Single-pass route simplification
pub mod simplify;
pub use simplify::simplify_route;

// Algorithm toolbox - modular access to all algorithms
pub mod algorithms;

// Time-bounded cache for addresses and request memoization
pub mod ttl_cache;
pub use ttl_cache::{SharedCache, Ttl, TtlCache};

// Debounce / throttle controllers
pub mod rate_control;
pub use rate_control::{Debouncer, Throttler};

// Geocoding with cache and request coalescing
pub mod geocoding;
pub use geocoding::{
    format_address, AddressLookupResult, CoordKey, ForwardGeocodeResult, GeoLookup,
    GeocodeProvider, ReverseGeocodeResponse, SearchHit,
};

// HTTP module for the Nominatim provider and cached fetches
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{JsonFetcher, NominatimClient};

// Journey records and external collaborators
pub mod journey;
pub use journey::{IdentityProvider, Journey, JourneyMetrics, JourneySession, JourneyStore};

// Journey statistics
pub mod aggregate;
pub use aggregate::{aggregate_journeys, JourneyStats};

// Orchestration
pub mod pipeline;
pub use pipeline::JourneyPipeline;

/// Initialize logging for Android.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("JourneyTelemetry"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// One timestamped GPS fix.
///
/// # Example
/// ```
/// use journey_telemetry::LocationSample;
/// let sample = LocationSample::new(51.5074, -0.1278, 1_700_000_000_000);
/// assert!(sample.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl LocationSample {
    /// Create a new location sample.
    pub fn new(lat: f64, lng: f64, timestamp_ms: i64) -> Self {
        Self {
            lat,
            lng,
            timestamp_ms,
        }
    }

    /// Check if the sample has valid coordinates.
    pub fn is_valid(&self) -> bool {
        geo_utils::is_valid_coordinate(self.lat, self.lng)
    }
}
