//! Journey records, the in-progress tracking session, and the external
//! collaborators a journey is handed to.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};
use crate::geo_utils::polyline_length;
use crate::LocationSample;

// ============================================================================
// Journey
// ============================================================================

/// One completed tracked driving session.
///
/// Built by the pipeline at the end of a session and never mutated afterwards;
/// the store owns it once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    /// Assigned by the store on insert
    pub id: Option<String>,
    pub user_id: String,
    pub start_point: LocationSample,
    pub end_point: LocationSample,
    /// Length of the raw (unsimplified) track in meters
    pub distance_meters: f64,
    pub duration_ms: i64,
    pub potholes_encountered: u32,
    /// Meters per second
    pub average_speed: f64,
    /// Simplified route
    pub tracking_points: Vec<LocationSample>,
    pub shared_via: BTreeSet<String>,
    #[serde(default)]
    pub start_address: Option<String>,
    #[serde(default)]
    pub end_address: Option<String>,
    /// Timestamp of the final sample
    pub created_at_ms: i64,
}

impl Journey {
    pub fn is_shared(&self) -> bool {
        !self.shared_via.is_empty()
    }
}

/// Distance, duration and speed derived from raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyMetrics {
    pub distance_meters: f64,
    pub duration_ms: i64,
    pub average_speed: f64,
}

impl JourneyMetrics {
    /// Metrics for a time-ordered track. Speed is 0 for a zero-length duration.
    pub fn from_samples(samples: &[LocationSample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let distance_meters = polyline_length(samples);
        let duration_ms = last.timestamp_ms - first.timestamp_ms;
        let average_speed = if duration_ms > 0 {
            distance_meters / (duration_ms as f64 / 1000.0)
        } else {
            0.0
        };

        Some(Self {
            distance_meters,
            duration_ms,
            average_speed,
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// Samples and events collected while a journey is being tracked.
#[derive(Debug, Clone, Default)]
pub struct JourneySession {
    samples: Vec<LocationSample>,
    potholes: u32,
    shared_via: BTreeSet<String>,
}

impl JourneySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Invalid coordinates and out-of-order timestamps are rejected.
    pub fn record(&mut self, sample: LocationSample) -> Result<()> {
        if !sample.is_valid() {
            return Err(TelemetryError::invalid_input(format!(
                "invalid coordinates ({}, {})",
                sample.lat, sample.lng
            )));
        }
        if let Some(last) = self.samples.last() {
            if sample.timestamp_ms < last.timestamp_ms {
                return Err(TelemetryError::invalid_input(format!(
                    "sample at {} is older than last sample at {}",
                    sample.timestamp_ms, last.timestamp_ms
                )));
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn report_pothole(&mut self) {
        self.potholes += 1;
    }

    /// Mark the journey as shared through `channel` (e.g. "sms").
    pub fn share_via(&mut self, channel: impl Into<String>) {
        self.shared_via.insert(channel.into());
    }

    pub fn samples(&self) -> &[LocationSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn potholes(&self) -> u32 {
        self.potholes
    }

    pub fn shared_via(&self) -> &BTreeSet<String> {
        &self.shared_via
    }

    pub fn metrics(&self) -> Option<JourneyMetrics> {
        JourneyMetrics::from_samples(&self.samples)
    }
}

// ============================================================================
// External collaborators
// ============================================================================

/// Where finished journeys are persisted. Schema and transport are the store's concern.
#[async_trait]
pub trait JourneyStore: Send + Sync {
    /// Persist a journey, returning it with its server-assigned id.
    async fn insert(&self, journey: Journey) -> Result<Journey>;

    /// A user's journeys, newest first, at most `limit`.
    async fn query(&self, user_id: &str, limit: usize) -> Result<Vec<Journey>>;
}

/// Supplies the authenticated user, if any.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user_id(&self) -> Option<String>;
}
