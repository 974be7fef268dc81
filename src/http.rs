//! HTTP clients for geocoding and memoized JSON requests.
//!
//! This module provides:
//! - [`NominatimClient`], the reqwest-backed [`GeocodeProvider`]
//! - [`JsonFetcher`], a GET-and-parse client with a TTL memo cache
//!
//! Each operation makes at most one request. Retries and timeouts beyond the
//! configured client timeout are left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{header, Client, Request, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{GeocoderConfig, TelemetryConfig};
use crate::error::{Result, TelemetryError};
use crate::geocoding::{GeocodeProvider, ReverseGeocodeResponse, SearchHit};
use crate::ttl_cache::{SharedCache, Ttl};

/// Nominatim zoom level for street-level detail
const REVERSE_ZOOM: &str = "18";

fn build_client(config: &GeocoderConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(config.pool_max_idle_per_host);
    if let Some(ms) = config.timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    builder
        .build()
        .map_err(|e| TelemetryError::config(format!("Failed to create HTTP client: {}", e)))
}

fn request_error(e: reqwest::Error) -> TelemetryError {
    TelemetryError::network(
        format!("Request error: {}", e),
        e.status().map(|s| s.as_u16()),
    )
}

async fn send_json<T: for<'de> Deserialize<'de>>(client: &Client, request: Request) -> Result<T> {
    let url = request.url().clone();
    let response = client.execute(request).await.map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(TelemetryError::network(
            format!("HTTP {} for {}", status, url),
            Some(status.as_u16()),
        ));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| TelemetryError::network(format!("Parse error: {}", e), None))
}

// ============================================================================
// Nominatim
// ============================================================================

/// Reverse response as sent by Nominatim. `error` is set when nothing matched.
#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    address: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    error: Option<String>,
}

/// Keep string components; stringify numbers (some mirrors send numeric postcodes).
fn address_components(raw: serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    raw.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            Value::Number(n) => Some((k, n.to_string())),
            _ => None,
        })
        .collect()
}

/// Geocoding provider talking to a Nominatim-compatible service.
pub struct NominatimClient {
    client: Client,
    reverse_url: String,
    search_url: String,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: build_client(config)?,
            reverse_url: config.reverse_url.clone(),
            search_url: config.search_url.clone(),
        })
    }

    fn reverse_request(&self, lat: f64, lng: f64) -> Result<Request> {
        self.client
            .get(&self.reverse_url)
            .header(header::ACCEPT, "application/json")
            .query(&[
                ("format", "json".to_string()),
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("zoom", REVERSE_ZOOM.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .build()
            .map_err(request_error)
    }

    fn search_request(&self, query: &str) -> Result<Request> {
        self.client
            .get(&self.search_url)
            .header(header::ACCEPT, "application/json")
            .query(&[("format", "json"), ("q", query)])
            .build()
            .map_err(request_error)
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<ReverseGeocodeResponse> {
        let request = self.reverse_request(lat, lng)?;
        let body: NominatimReverse = send_json(&self.client, request).await?;

        if let Some(reason) = &body.error {
            debug!("[NominatimClient] No reverse match for ({}, {}): {}", lat, lng, reason);
        }

        Ok(ReverseGeocodeResponse {
            address: body.address.map(address_components),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let request = self.search_request(query)?;
        send_json(&self.client, request).await
    }
}

// ============================================================================
// Memoized JSON fetching
// ============================================================================

/// GET-and-parse client that memoizes responses by request URL.
pub struct JsonFetcher {
    client: Client,
    cache: SharedCache<String, Value>,
}

impl JsonFetcher {
    /// Create a fetcher with its own memo cache using `request_cache_ttl_ms`.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let cache = SharedCache::with_ttl(Ttl::After(config.request_cache_ttl()));
        Self::with_cache(&config.geocoder, cache)
    }

    /// Create a fetcher around an existing memo cache.
    pub fn with_cache(config: &GeocoderConfig, cache: SharedCache<String, Value>) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            cache,
        })
    }

    pub fn cache(&self) -> &SharedCache<String, Value> {
        &self.cache
    }

    /// Canonical request identity: `endpoint` with `params` sorted by name.
    pub fn request_key(endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(endpoint).map_err(|e| {
            TelemetryError::invalid_input(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;

        let mut sorted = params.to_vec();
        sorted.sort();
        if !sorted.is_empty() {
            url.query_pairs_mut().extend_pairs(sorted);
        }
        Ok(url.to_string())
    }

    /// Fetch `url` as JSON, serving a fresh memoized copy when one exists.
    ///
    /// `ttl` defaults to the cache's TTL. Failures are returned and not cached.
    pub async fn cached_fetch(&self, url: &str, ttl: Option<Duration>) -> Result<Value> {
        if let Some(hit) = self.cache.get(&url.to_string()) {
            debug!("[JsonFetcher] Using cached data for {}", url);
            return Ok(hit);
        }

        let request = self.client.get(url).build().map_err(request_error)?;
        let value: Value = match send_json(&self.client, request).await {
            Ok(value) => value,
            Err(e) => {
                warn!("[JsonFetcher] Fetch failed for {}: {}", url, e);
                return Err(e);
            }
        };

        let ttl = ttl.map(Ttl::After).unwrap_or_else(|| self.cache.lock().default_ttl());
        self.cache.put(url.to_string(), value.clone(), ttl);
        Ok(value)
    }

    /// Drop every memoized response.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("[JsonFetcher] Cache cleared");
    }
}
