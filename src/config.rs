//! Pipeline configuration.
//!
//! All structs deserialize from camelCase JSON with every field optional, so a
//! host app can pass `{}` and get the defaults below.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TelemetryError};

/// Default Nominatim reverse endpoint.
pub const DEFAULT_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
/// Default Nominatim search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Top-level configuration for the telemetry pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Perpendicular-distance tolerance for route simplification (degrees).
    /// Default: 0.00001 (~1 meter)
    pub simplify_tolerance_degrees: f64,

    /// Resolve start/end addresses before persisting a journey.
    /// Default: true
    pub resolve_addresses: bool,

    /// Number of journeys returned by `recent_journeys` when no limit is given.
    /// Default: 10
    pub journey_query_limit: usize,

    /// TTL for memoized JSON requests in milliseconds.
    /// Default: 300000 (5 minutes)
    pub request_cache_ttl_ms: u64,

    pub geocoder: GeocoderConfig,

    pub rate: RateConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            simplify_tolerance_degrees: 0.00001,
            resolve_addresses: true,
            journey_query_limit: 10,
            request_cache_ttl_ms: 300_000,
            geocoder: GeocoderConfig::default(),
            rate: RateConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TelemetryConfig = serde_json::from_str(json)
            .map_err(|e| TelemetryError::config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.simplify_tolerance_degrees.is_finite() || self.simplify_tolerance_degrees < 0.0 {
            return Err(TelemetryError::config(format!(
                "simplifyToleranceDegrees must be a non-negative number, got {}",
                self.simplify_tolerance_degrees
            )));
        }
        if self.journey_query_limit == 0 {
            return Err(TelemetryError::config("journeyQueryLimit must be at least 1"));
        }
        self.geocoder.validate()?;
        self.rate.validate()
    }

    pub fn request_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.request_cache_ttl_ms)
    }
}

/// Configuration for the geocoding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeocoderConfig {
    pub reverse_url: String,
    pub search_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent
    pub user_agent: String,
    /// Per-request timeout. `None` leaves timeouts to the caller.
    pub timeout_ms: Option<u64>,
    pub pool_max_idle_per_host: usize,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            reverse_url: DEFAULT_REVERSE_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: concat!("journey-telemetry/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: None,
            pool_max_idle_per_host: 4,
        }
    }
}

impl GeocoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reverse_url.trim().is_empty() || self.search_url.trim().is_empty() {
            return Err(TelemetryError::config("geocoder URLs must not be empty"));
        }
        if self.timeout_ms == Some(0) {
            return Err(TelemetryError::config("geocoder timeoutMs must be positive"));
        }
        Ok(())
    }
}

/// Default intervals for the rate controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateConfig {
    /// Quiet window for debounced handlers. Default: 300
    pub debounce_ms: u64,
    /// Minimum spacing of throttled executions. Default: 1000
    pub throttle_ms: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            throttle_ms: 1000,
        }
    }
}

impl RateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 || self.throttle_ms == 0 {
            return Err(TelemetryError::config(
                "debounceMs and throttleMs must be positive",
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = TelemetryConfig::from_json("{}").unwrap();
        assert_eq!(config, TelemetryConfig::default());
        assert_eq!(config.request_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.rate.throttle(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_override() {
        let config = TelemetryConfig::from_json(
            r#"{"simplifyToleranceDegrees": 0.0001, "geocoder": {"timeoutMs": 5000}}"#,
        )
        .unwrap();
        assert_eq!(config.simplify_tolerance_degrees, 0.0001);
        assert_eq!(config.geocoder.timeout_ms, Some(5000));
        assert_eq!(config.geocoder.reverse_url, DEFAULT_REVERSE_URL);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = TelemetryConfig::from_json(r#"{"simplifyToleranceDegrees": -1.0}"#);
        assert!(matches!(err, Err(TelemetryError::ConfigError { .. })));

        let err = TelemetryConfig::from_json(r#"{"rate": {"throttleMs": 0}}"#);
        assert!(matches!(err, Err(TelemetryError::ConfigError { .. })));

        let err = TelemetryConfig::from_json("not json");
        assert!(matches!(err, Err(TelemetryError::ConfigError { .. })));
    }
}
