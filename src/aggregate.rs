//! Journey statistics.

use serde::{Deserialize, Serialize};

use crate::journey::Journey;

/// Summary of a collection of journeys. Derived on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyStats {
    pub total_journeys: usize,
    /// Meters
    pub total_distance: f64,
    /// Milliseconds
    pub total_time: i64,
    /// Mean of the per-journey average speeds
    pub average_speed: f64,
    pub total_potholes: u64,
    /// Journeys shared through at least one channel
    pub times_shared: usize,
}

/// Reduce journeys to summary statistics in a single pass.
///
/// An empty slice yields all-zero stats.
pub fn aggregate_journeys(journeys: &[Journey]) -> JourneyStats {
    let mut stats = JourneyStats::default();
    let mut speed_sum = 0.0;

    for journey in journeys {
        stats.total_journeys += 1;
        stats.total_distance += journey.distance_meters;
        stats.total_time += journey.duration_ms;
        stats.total_potholes += u64::from(journey.potholes_encountered);
        speed_sum += journey.average_speed;
        if journey.is_shared() {
            stats.times_shared += 1;
        }
    }

    if stats.total_journeys > 0 {
        stats.average_speed = speed_sum / stats.total_journeys as f64;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocationSample;
    use std::collections::BTreeSet;

    fn make_journey(distance: f64, duration: i64, speed: f64, potholes: u32, shared: &[&str]) -> Journey {
        let sample = LocationSample::new(0.0, 0.0, 0);
        Journey {
            id: None,
            user_id: "user-1".to_string(),
            start_point: sample,
            end_point: sample,
            distance_meters: distance,
            duration_ms: duration,
            potholes_encountered: potholes,
            average_speed: speed,
            tracking_points: vec![sample],
            shared_via: shared.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            start_address: None,
            end_address: None,
            created_at_ms: 0,
        }
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate_journeys(&[]), JourneyStats::default());
    }

    #[test]
    fn test_aggregate_totals() {
        let journeys = vec![
            make_journey(10.0, 5, 2.0, 1, &[]),
            make_journey(20.0, 10, 4.0, 0, &["sms"]),
            make_journey(30.0, 15, 6.0, 2, &[]),
        ];

        let stats = aggregate_journeys(&journeys);
        assert_eq!(stats.total_journeys, 3);
        assert_eq!(stats.total_distance, 60.0);
        assert_eq!(stats.total_time, 30);
        assert_eq!(stats.average_speed, 4.0);
        assert_eq!(stats.total_potholes, 3);
        assert_eq!(stats.times_shared, 1);
    }

    #[test]
    fn test_aggregate_single() {
        let stats = aggregate_journeys(&[make_journey(1500.0, 60_000, 25.0, 4, &["sms", "email"])]);
        assert_eq!(stats.average_speed, 25.0);
        assert_eq!(stats.times_shared, 1);
    }
}
