//! # Journey Pipeline
//!
//! Turns a finished [`JourneySession`] into a persisted [`Journey`]:
//!
//! 1. Resolve the current user (`NotAuthenticated` if none)
//! 2. Validate the raw track and derive distance/duration/speed
//! 3. Simplify the track
//! 4. Resolve start and end addresses concurrently (optional, never fails)
//! 5. Hand the journey to the [`JourneyStore`]
//!
//! Nothing is retried. A store failure surfaces as a single `StoreFailure`.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::aggregate::{aggregate_journeys, JourneyStats};
use crate::config::TelemetryConfig;
use crate::error::{OptionExt, Result, TelemetryError};
use crate::geo_utils::validate_route;
use crate::geocoding::{ForwardGeocodeResult, GeoLookup};
use crate::journey::{IdentityProvider, Journey, JourneyMetrics, JourneySession, JourneyStore};
use crate::rate_control::{Debouncer, Throttler};
use crate::simplify::simplify_route;
use crate::LocationSample;

fn store_failure(e: TelemetryError) -> TelemetryError {
    match e {
        TelemetryError::StoreFailure { .. } => e,
        other => TelemetryError::store(other.to_string()),
    }
}

/// Orchestrates simplification, geocoding and persistence of journeys.
pub struct JourneyPipeline {
    config: TelemetryConfig,
    geo: Option<GeoLookup>,
    store: Arc<dyn JourneyStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl JourneyPipeline {
    /// Create a pipeline without a geocoder; addresses stay empty.
    pub fn new(
        config: TelemetryConfig,
        store: Arc<dyn JourneyStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            geo: None,
            store,
            identity,
        })
    }

    /// Create a pipeline that geocodes through Nominatim with a fresh address cache.
    #[cfg(feature = "http")]
    pub fn with_nominatim(
        config: TelemetryConfig,
        store: Arc<dyn JourneyStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let provider = Arc::new(crate::http::NominatimClient::new(&config.geocoder)?);
        Ok(Self::new(config, store, identity)?.with_geocoder(GeoLookup::new(provider)))
    }

    pub fn with_geocoder(mut self, geo: GeoLookup) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn geocoder(&self) -> Option<&GeoLookup> {
        self.geo.as_ref()
    }

    /// Build the journey record for `session` without persisting it.
    pub async fn build_journey(&self, user_id: &str, session: &JourneySession) -> Result<Journey> {
        let samples = session.samples();
        validate_route(samples)?;

        let metrics = JourneyMetrics::from_samples(samples).ok_or_invalid("route has no samples")?;
        let tracking_points = simplify_route(samples, self.config.simplify_tolerance_degrees)?;

        // validate_route guarantees at least one sample
        let start_point = samples[0];
        let end_point = samples[samples.len() - 1];

        let (start_address, end_address) = self.resolve_endpoints(&start_point, &end_point).await;

        Ok(Journey {
            id: None,
            user_id: user_id.to_string(),
            start_point,
            end_point,
            distance_meters: metrics.distance_meters,
            duration_ms: metrics.duration_ms,
            potholes_encountered: session.potholes(),
            average_speed: metrics.average_speed,
            tracking_points,
            shared_via: session.shared_via().clone(),
            start_address,
            end_address,
            created_at_ms: end_point.timestamp_ms,
        })
    }

    async fn resolve_endpoints(
        &self,
        start: &LocationSample,
        end: &LocationSample,
    ) -> (Option<String>, Option<String>) {
        let geo = match (&self.geo, self.config.resolve_addresses) {
            (Some(geo), true) => geo,
            _ => return (None, None),
        };

        let (start_address, end_address) = tokio::join!(
            geo.reverse_geocode(start.lat, start.lng),
            geo.reverse_geocode(end.lat, end.lng),
        );
        if start_address.is_sentinel() || end_address.is_sentinel() {
            warn!(
                "[JourneyPipeline] Endpoint address unresolved: start='{}', end='{}'",
                start_address.formatted, end_address.formatted
            );
        }
        (Some(start_address.formatted), Some(end_address.formatted))
    }

    /// Finish a tracked session and persist it for the current user.
    pub async fn complete_journey(&self, session: JourneySession) -> Result<Journey> {
        let user_id = self.identity.current_user_id().await.ok_or_unauthenticated()?;

        let journey = self.build_journey(&user_id, &session).await?;
        debug!(
            "[JourneyPipeline] Persisting journey: {} raw -> {} simplified points",
            session.len(),
            journey.tracking_points.len()
        );

        let stored = self.store.insert(journey).await.map_err(store_failure)?;
        info!(
            "[JourneyPipeline] Saved journey {} for {}: {:.0} m in {} ms, {} potholes",
            stored.id.as_deref().unwrap_or("<unassigned>"),
            stored.user_id,
            stored.distance_meters,
            stored.duration_ms,
            stored.potholes_encountered
        );
        Ok(stored)
    }

    /// The current user's journeys, newest first.
    pub async fn recent_journeys(&self, limit: Option<usize>) -> Result<Vec<Journey>> {
        let user_id = self.identity.current_user_id().await.ok_or_unauthenticated()?;
        let limit = limit.unwrap_or(self.config.journey_query_limit);
        self.store
            .query(&user_id, limit)
            .await
            .map_err(store_failure)
    }

    /// Statistics over every stored journey of `user_id`.
    pub async fn journey_stats(&self, user_id: &str) -> Result<JourneyStats> {
        let journeys = self
            .store
            .query(user_id, usize::MAX)
            .await
            .map_err(store_failure)?;
        Ok(aggregate_journeys(&journeys))
    }

    /// Throttled sink that records live location updates into `session`.
    ///
    /// Bursts of GPS fixes are thinned to one per `rate.throttleMs`, always
    /// keeping the most recent fix. Rejected samples are logged and skipped.
    pub fn location_recorder(
        &self,
        session: Arc<Mutex<JourneySession>>,
    ) -> Throttler<LocationSample> {
        Throttler::new(
            move |sample: LocationSample| {
                let mut session = session.lock().unwrap_or_else(|p| p.into_inner());
                if let Err(e) = session.record(sample) {
                    warn!("[JourneyPipeline] Dropping location update: {}", e);
                }
            },
            self.config.rate.throttle(),
        )
    }

    /// Debounced forward geocoder for search-as-you-type input.
    ///
    /// Only the text still current after `rate.debounceMs` of quiet is looked
    /// up. `on_result` receives that text and the best hit, if any.
    pub fn address_search<F>(&self, on_result: F) -> Result<Debouncer<String>>
    where
        F: Fn(String, Option<ForwardGeocodeResult>) + Send + Sync + 'static,
    {
        let geo = self
            .geo
            .clone()
            .ok_or_else(|| TelemetryError::config("address search requires a geocoder"))?;
        let on_result = Arc::new(on_result);

        Ok(Debouncer::new(
            move |query: String| {
                let geo = geo.clone();
                let on_result = Arc::clone(&on_result);
                tokio::spawn(async move {
                    let hit = geo.forward_geocode(&query).await;
                    on_result(query, hit);
                });
            },
            self.config.rate.debounce(),
        ))
    }
}
