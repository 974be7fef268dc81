//! # Geocoding
//!
//! Reverse and forward geocoding on top of a pluggable [`GeocodeProvider`].
//!
//! Reverse lookups are cached forever on a ~11 m grid (coordinates rounded to
//! 4 decimals) and coalesced: concurrent lookups for the same grid cell share
//! one in-flight request. Failures never escape; they degrade to sentinel
//! strings so a missing address cannot block journey persistence.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo_utils::is_valid_coordinate;
use crate::ttl_cache::{SharedCache, Ttl, TtlCache};

/// Returned when the provider could not be reached or failed.
pub const UNABLE_TO_FETCH_ADDRESS: &str = "Unable to fetch address";
/// Returned when the provider answered without an address object.
pub const ADDRESS_NOT_FOUND: &str = "Address not found";
/// Returned when the address object had none of the formatted fields.
pub const ADDRESS_NOT_AVAILABLE: &str = "Address not available";

// ============================================================================
// Types
// ============================================================================

/// A formatted address plus the raw components it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressLookupResult {
    pub formatted: String,
    pub raw: BTreeMap<String, String>,
}

impl AddressLookupResult {
    fn sentinel(message: &str) -> Self {
        Self {
            formatted: message.to_string(),
            raw: BTreeMap::new(),
        }
    }

    /// Whether this is one of the degraded results rather than a real address.
    pub fn is_sentinel(&self) -> bool {
        self.raw.is_empty()
            && matches!(
                self.formatted.as_str(),
                UNABLE_TO_FETCH_ADDRESS | ADDRESS_NOT_FOUND
            )
    }
}

/// Result of a forward (text to coordinates) lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardGeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub formatted: String,
}

/// Provider answer to a reverse lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReverseGeocodeResponse {
    /// `None` when the provider returned no address object at all
    pub address: Option<BTreeMap<String, String>>,
}

/// One ranked forward-geocoding candidate, as sent by Nominatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

/// Cache key: a coordinate snapped to a 4-decimal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    lat_e4: i64,
    lng_e4: i64,
}

impl CoordKey {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat_e4: (lat * 10_000.0).round() as i64,
            lng_e4: (lng * 10_000.0).round() as i64,
        }
    }
}

impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4}_{:.4}",
            self.lat_e4 as f64 / 10_000.0,
            self.lng_e4 as f64 / 10_000.0
        )
    }
}

/// A reverse/forward geocoding backend.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<ReverseGeocodeResponse>;

    /// Ranked candidates for a free-text address, best first.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

// ============================================================================
// Address formatting
// ============================================================================

/// Format Nominatim address components for display.
///
/// Order: house number + road (road alone if no number), suburb or village,
/// city or town, state, country, postcode. Missing or empty fields are skipped.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use journey_telemetry::format_address;
///
/// let mut address = BTreeMap::new();
/// address.insert("road".to_string(), "Main St".to_string());
/// address.insert("city".to_string(), "Springfield".to_string());
/// assert_eq!(format_address(&address), "Main St, Springfield");
/// ```
pub fn format_address(address: &BTreeMap<String, String>) -> String {
    let field = |name: &str| {
        address
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let mut parts: Vec<String> = Vec::new();

    if let Some(road) = field("road") {
        match field("house_number") {
            Some(number) => parts.push(format!("{}, {}", number, road)),
            None => parts.push(road.to_string()),
        }
    }

    let groups: [&[&str]; 5] = [
        &["suburb", "village"],
        &["city", "town"],
        &["state"],
        &["country"],
        &["postcode"],
    ];
    for group in groups {
        if let Some(value) = group.iter().find_map(|&name| field(name)) {
            parts.push(value.to_string());
        }
    }

    if parts.is_empty() {
        ADDRESS_NOT_AVAILABLE.to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// GeoLookup
// ============================================================================

type PendingLookup = Shared<BoxFuture<'static, AddressLookupResult>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cached, coalescing geocoding client. Clones share the cache and in-flight map.
#[derive(Clone)]
pub struct GeoLookup {
    provider: Arc<dyn GeocodeProvider>,
    cache: SharedCache<CoordKey, AddressLookupResult>,
    in_flight: Arc<Mutex<HashMap<CoordKey, PendingLookup>>>,
}

impl GeoLookup {
    /// Create a lookup with its own unbounded address cache.
    pub fn new(provider: Arc<dyn GeocodeProvider>) -> Self {
        Self::with_cache(provider, SharedCache::new(TtlCache::unbounded()))
    }

    /// Create a lookup around an existing cache instance.
    pub fn with_cache(
        provider: Arc<dyn GeocodeProvider>,
        cache: SharedCache<CoordKey, AddressLookupResult>,
    ) -> Self {
        Self {
            provider,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &SharedCache<CoordKey, AddressLookupResult> {
        &self.cache
    }

    /// Number of reverse lookups currently waiting on the provider.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Resolve coordinates to an address. Never fails; see the sentinel constants.
    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> AddressLookupResult {
        if !is_valid_coordinate(lat, lng) {
            warn!("[GeoLookup] Refusing to geocode invalid coordinate ({}, {})", lat, lng);
            return AddressLookupResult::sentinel(UNABLE_TO_FETCH_ADDRESS);
        }

        let key = CoordKey::new(lat, lng);
        if let Some(hit) = self.cache.get(&key) {
            debug!("[GeoLookup] Cache hit for {}", key);
            return hit;
        }

        let pending = {
            let mut in_flight = lock(&self.in_flight);
            // A finished request writes the cache before leaving the map
            if let Some(hit) = self.cache.get(&key) {
                return hit;
            }
            match in_flight.get(&key) {
                Some(pending) => {
                    debug!("[GeoLookup] Joining in-flight lookup for {}", key);
                    pending.clone()
                }
                None => {
                    debug!("[GeoLookup] Cache miss for {}, calling provider", key);
                    let pending = self.start_lookup(key, lat, lng);
                    in_flight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_lookup(&self, key: CoordKey, lat: f64, lng: f64) -> PendingLookup {
        let provider = Arc::clone(&self.provider);
        let cache = self.cache.clone();
        let in_flight = Arc::clone(&self.in_flight);

        async move {
            let result = match provider.reverse(lat, lng).await {
                Ok(ReverseGeocodeResponse {
                    address: Some(address),
                }) => {
                    let result = AddressLookupResult {
                        formatted: format_address(&address),
                        raw: address,
                    };
                    cache.put(key, result.clone(), Ttl::Infinite);
                    result
                }
                Ok(ReverseGeocodeResponse { address: None }) => {
                    AddressLookupResult::sentinel(ADDRESS_NOT_FOUND)
                }
                Err(e) => {
                    warn!("[GeoLookup] Reverse geocoding failed for {}: {}", key, e);
                    AddressLookupResult::sentinel(UNABLE_TO_FETCH_ADDRESS)
                }
            };
            lock(&in_flight).remove(&key);
            result
        }
        .boxed()
        .shared()
    }

    /// Resolve free text to the best-ranked coordinate, or `None`.
    ///
    /// The text is sent to the provider as given. Blank input returns `None`
    /// without a request.
    pub async fn forward_geocode(&self, address: &str) -> Option<ForwardGeocodeResult> {
        if address.trim().is_empty() {
            return None;
        }

        let hits = match self.provider.search(address).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("[GeoLookup] Forward geocoding failed for '{}': {}", address, e);
                return None;
            }
        };

        let first = hits.into_iter().next()?;
        match (first.lat.trim().parse::<f64>(), first.lon.trim().parse::<f64>()) {
            (Ok(lat), Ok(lng)) if is_valid_coordinate(lat, lng) => Some(ForwardGeocodeResult {
                lat,
                lng,
                formatted: first.display_name,
            }),
            _ => {
                warn!(
                    "[GeoLookup] Unparseable coordinates '{}', '{}' for '{}'",
                    first.lat, first.lon, address
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn address(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    struct MockProvider {
        reverse_calls: AtomicUsize,
        search_calls: AtomicUsize,
        delay: Duration,
        reverse: Mutex<Result<ReverseGeocodeResponse>>,
        hits: Vec<SearchHit>,
        queries: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn answering(address: Option<BTreeMap<String, String>>) -> Self {
            Self {
                reverse_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                delay: Duration::from_millis(50),
                reverse: Mutex::new(Ok(ReverseGeocodeResponse { address })),
                hits: Vec::new(),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            let provider = Self::answering(None);
            *provider.reverse.lock().unwrap() =
                Err(TelemetryError::network("connection refused", None));
            provider
        }
    }

    #[async_trait]
    impl GeocodeProvider for MockProvider {
        async fn reverse(&self, _lat: f64, _lng: f64) -> Result<ReverseGeocodeResponse> {
            self.reverse_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reverse.lock().unwrap().clone()
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.hits.clone())
        }
    }

    #[test]
    fn test_format_full_address() {
        let a = address(&[
            ("road", "Main St"),
            ("house_number", "12"),
            ("city", "Springfield"),
            ("country", "Testland"),
        ]);
        assert_eq!(format_address(&a), "12, Main St, Springfield, Testland");
    }

    #[test]
    fn test_format_empty_address() {
        assert_eq!(format_address(&BTreeMap::new()), ADDRESS_NOT_AVAILABLE);
    }

    #[test]
    fn test_format_fallbacks() {
        let a = address(&[
            ("house_number", "7"),
            ("village", "Littleton"),
            ("suburb", ""),
            ("town", "Bigton"),
            ("state", "Region"),
            ("postcode", "12345"),
        ]);
        // House number without road is dropped; empty suburb falls back to village
        assert_eq!(format_address(&a), "Littleton, Bigton, Region, 12345");

        let a = address(&[("suburb", "Old Town"), ("village", "Ignored"), ("city", "C"), ("town", "T")]);
        assert_eq!(format_address(&a), "Old Town, C");
    }

    #[test]
    fn test_coord_key_grid() {
        assert_eq!(CoordKey::new(51.50741, -0.12779), CoordKey::new(51.50739, -0.12781));
        assert_ne!(CoordKey::new(51.5074, -0.1278), CoordKey::new(51.5075, -0.1278));
        assert_eq!(CoordKey::new(51.50741, -0.12779).to_string(), "51.5074_-0.1278");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_geocode_caches_success() {
        let provider = Arc::new(MockProvider::answering(Some(address(&[
            ("road", "Main St"),
            ("city", "Springfield"),
        ]))));
        let lookup = GeoLookup::new(provider.clone());

        let first = lookup.reverse_geocode(51.50741, -0.12779).await;
        assert_eq!(first.formatted, "Main St, Springfield");
        assert_eq!(first.raw.get("road").map(String::as_str), Some("Main St"));

        // Same grid cell: served from cache
        let second = lookup.reverse_geocode(51.50739, -0.12781).await;
        assert_eq!(second, first);
        assert_eq!(provider.reverse_calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookup.cache().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_geocode_failure_not_cached() {
        let provider = Arc::new(MockProvider::failing());
        let lookup = GeoLookup::new(provider.clone());

        let result = lookup.reverse_geocode(10.0, 10.0).await;
        assert_eq!(result.formatted, UNABLE_TO_FETCH_ADDRESS);
        assert!(result.is_sentinel());

        lookup.reverse_geocode(10.0, 10.0).await;
        assert_eq!(provider.reverse_calls.load(Ordering::SeqCst), 2);
        assert!(lookup.cache().is_empty());
        assert_eq!(lookup.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_geocode_missing_address_object() {
        let provider = Arc::new(MockProvider::answering(None));
        let lookup = GeoLookup::new(provider.clone());

        let result = lookup.reverse_geocode(10.0, 10.0).await;
        assert_eq!(result.formatted, ADDRESS_NOT_FOUND);
        assert!(lookup.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_address_object_is_cached() {
        let provider = Arc::new(MockProvider::answering(Some(BTreeMap::new())));
        let lookup = GeoLookup::new(provider.clone());

        let result = lookup.reverse_geocode(10.0, 10.0).await;
        assert_eq!(result.formatted, ADDRESS_NOT_AVAILABLE);
        assert!(!result.is_sentinel());
        assert_eq!(lookup.cache().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_are_coalesced() {
        let provider = Arc::new(MockProvider::answering(Some(address(&[("road", "High St")]))));
        let lookup = GeoLookup::new(provider.clone());

        let (a, b, c) = tokio::join!(
            lookup.reverse_geocode(40.00001, -3.00001),
            lookup.reverse_geocode(40.00002, -3.00002),
            lookup.reverse_geocode(41.0, -3.0),
        );

        assert_eq!(a, b);
        assert_eq!(c.formatted, "High St");
        // One call for the shared cell, one for the distinct cell
        assert_eq!(provider.reverse_calls.load(Ordering::SeqCst), 2);
        assert_eq!(lookup.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_coordinate_skips_provider() {
        let provider = Arc::new(MockProvider::answering(None));
        let lookup = GeoLookup::new(provider.clone());

        let result = lookup.reverse_geocode(123.0, 0.0).await;
        assert_eq!(result.formatted, UNABLE_TO_FETCH_ADDRESS);
        assert_eq!(provider.reverse_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_cache_is_shared() {
        let cache = SharedCache::new(TtlCache::unbounded());
        let provider = Arc::new(MockProvider::answering(Some(address(&[("road", "A Rd")]))));
        let first = GeoLookup::with_cache(provider.clone(), cache.clone());
        let second = GeoLookup::with_cache(provider.clone(), cache);

        first.reverse_geocode(1.0, 1.0).await;
        second.reverse_geocode(1.0, 1.0).await;
        assert_eq!(provider.reverse_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forward_geocode() {
        let mut provider = MockProvider::answering(None);
        provider.hits = vec![
            SearchHit {
                lat: "51.5074".to_string(),
                lon: "-0.1278".to_string(),
                display_name: "London, UK".to_string(),
            },
            SearchHit {
                lat: "0".to_string(),
                lon: "0".to_string(),
                display_name: "Second".to_string(),
            },
        ];
        let provider = Arc::new(provider);
        let lookup = GeoLookup::new(provider.clone());

        let result = lookup.forward_geocode(" London ").await.unwrap();
        assert_eq!(result.lat, 51.5074);
        assert_eq!(result.lng, -0.1278);
        assert_eq!(result.formatted, "London, UK");

        assert!(lookup.forward_geocode("   ").await.is_none());
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
        // Text reaches the provider untouched
        assert_eq!(*provider.queries.lock().unwrap(), vec![" London ".to_string()]);
    }

    #[tokio::test]
    async fn test_forward_geocode_no_results() {
        let lookup = GeoLookup::new(Arc::new(MockProvider::answering(None)));
        assert!(lookup.forward_geocode("Nowhere").await.is_none());
    }
}
