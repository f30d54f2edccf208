//! METAR cache manager
//!
//! Serves weather observations from the `metar_cache.json` document while they
//! are fresh and falls back to the weather fetcher once they are not.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::data::weather::{is_unauthorized, parse_checkwx_response, Observation, WeatherError, WeatherFetcher};
use crate::settings::{SettingsError, SettingsStore};
use crate::store::{DocumentStore, StoreError};

/// File name of the METAR cache document
pub const METAR_CACHE_DOCUMENT: &str = "metar_cache.json";

/// How long a cached observation is served before it is refetched
pub const FRESHNESS_WINDOW_MINUTES: i64 = 30;

/// Airport used to check that an API key works
pub const REFERENCE_AIRPORT: &str = "EGLL";

/// Prefix of every cache key
const KEY_PREFIX: &str = "metar_";

/// Errors that can occur while serving METAR data
#[derive(Debug, Error)]
pub enum MetarError {
    /// Reading or writing the cache document failed
    #[error("METAR cache operation '{operation}' failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Reading the API key failed
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The weather request itself failed
    #[error("Failed to fetch METAR for {icao}: {source}")]
    Fetch {
        icao: String,
        #[source]
        source: WeatherError,
    },

    /// The response did not contain a decoded report
    #[error("Malformed METAR response for {icao}: {source}")]
    MalformedResponse {
        icao: String,
        #[source]
        source: WeatherError,
    },
}

/// Cache entry as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Epoch milliseconds at which the observation was fetched
    #[serde(rename = "timestamp")]
    fetched_at_ms: i64,
    #[serde(rename = "data")]
    observation: Observation,
}

/// Outcome of checking the stored CheckWX key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyStatus {
    /// No key is configured; lookups are disabled
    Missing,
    /// CheckWX returned a report for the reference airport
    Valid,
    /// CheckWX rejected the key or returned nothing
    Rejected,
}

/// A cached observation together with its freshness
#[derive(Debug, Clone)]
pub struct CachedObservation {
    pub observation: Observation,
    /// When the observation was fetched
    pub fetched_at: DateTime<Utc>,
    /// Whether the entry is older than the freshness window
    pub is_expired: bool,
}

/// Serves METAR observations, preferring fresh cached copies over the network
///
/// The cache document is opened once and owned for the manager's lifetime.
/// The API key is read from settings on every fetch so a newly saved key takes
/// effect immediately.
#[derive(Debug)]
pub struct MetarManager<F, C = SystemClock> {
    cache: DocumentStore,
    settings: SettingsStore,
    fetcher: F,
    clock: C,
    freshness_window: Duration,
}

impl<F: WeatherFetcher> MetarManager<F, SystemClock> {
    /// Opens the cache document in `data_dir` and uses the system clock
    pub fn open(data_dir: &Path, settings: SettingsStore, fetcher: F) -> Result<Self, MetarError> {
        let cache = DocumentStore::load(data_dir, METAR_CACHE_DOCUMENT)
            .map_err(|source| MetarError::Store {
                operation: "open cache",
                source,
            })?;
        Ok(Self::new(cache, settings, fetcher, SystemClock))
    }
}

impl<F: WeatherFetcher, C: Clock> MetarManager<F, C> {
    /// Creates a manager over an already loaded cache document
    pub fn new(cache: DocumentStore, settings: SettingsStore, fetcher: F, clock: C) -> Self {
        Self {
            cache,
            settings,
            fetcher,
            clock,
            freshness_window: Duration::minutes(FRESHNESS_WINDOW_MINUTES),
        }
    }

    /// Overrides the freshness window
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Cache key for an airport code
    pub fn cache_key(icao: &str) -> String {
        format!("{}{}", KEY_PREFIX, normalize_code(icao))
    }

    /// Number of cached observations
    pub fn len(&self) -> usize {
        self.cache
            .entries()
            .filter(|(key, _)| key.starts_with(KEY_PREFIX))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks at the cached observation for `icao` without fetching anything
    pub fn cached(&self, icao: &str) -> Option<CachedObservation> {
        let key = Self::cache_key(icao);
        let entry = self.read_entry(&key)?;
        let fetched_at = DateTime::<Utc>::from_timestamp_millis(entry.fetched_at_ms)?;

        Some(CachedObservation {
            is_expired: !self.is_fresh(&entry),
            observation: entry.observation,
            fetched_at,
        })
    }

    /// Returns the observation for `icao`
    ///
    /// # Arguments
    /// * `icao` - ICAO code of the airport
    /// * `force_refresh` - skip the cache and always fetch
    ///
    /// # Returns
    /// * `Ok(Some(Observation))` - a fresh cached or newly fetched observation
    /// * `Ok(None)` - no API key is configured, the key was rejected, or the
    ///   station has no current report
    /// * `Err(MetarError)` - the request failed or the response was malformed
    pub async fn get(&mut self, icao: &str, force_refresh: bool) -> Result<Option<Observation>, MetarError> {
        let code = normalize_code(icao);
        let key = Self::cache_key(&code);

        if !force_refresh {
            if let Some(entry) = self.read_entry(&key) {
                if self.is_fresh(&entry) {
                    info!(icao = %code, "using cached METAR data");
                    return Ok(Some(entry.observation));
                }
            }
        }

        let api_settings = self.settings.metar_api_settings()?;
        let Some(api_key) = api_settings.api_key() else {
            debug!(icao = %code, "no METAR API key configured");
            return Ok(None);
        };

        info!(icao = %code, "fetching new METAR data");
        let body = self
            .fetcher
            .fetch_weather(&code, api_key)
            .await
            .map_err(|source| MetarError::Fetch {
                icao: code.clone(),
                source,
            })?;

        if is_unauthorized(&body) {
            warn!(icao = %code, "METAR API key was rejected");
            return Ok(None);
        }

        let Some(mut observation) =
            parse_checkwx_response(&body).map_err(|source| MetarError::MalformedResponse {
                icao: code.clone(),
                source,
            })?
        else {
            info!(icao = %code, "no METAR report available");
            return Ok(None);
        };

        observation.mark_observed_utc();

        let entry = CacheEntry {
            fetched_at_ms: self.clock.now().timestamp_millis(),
            observation,
        };
        self.cache
            .set(&key, &entry)
            .and_then(|()| self.cache.save())
            .map_err(|source| MetarError::Store {
                operation: "write entry",
                source,
            })?;

        Ok(Some(entry.observation))
    }

    /// Removes every entry older than the freshness window
    ///
    /// # Returns
    /// The number of entries removed
    pub fn cleanup_expired(&mut self) -> Result<usize, MetarError> {
        let expired: Vec<String> = self
            .cache
            .entries()
            .filter(|(key, _)| key.starts_with(KEY_PREFIX))
            .filter_map(|(key, value)| match CacheEntry::deserialize(value) {
                Ok(entry) => (!self.is_fresh(&entry)).then(|| key.to_string()),
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable METAR cache entry");
                    None
                }
            })
            .collect();

        for key in &expired {
            self.cache.delete(key);
        }

        self.cache.save().map_err(|source| MetarError::Store {
            operation: "cleanup",
            source,
        })?;

        debug!(removed = expired.len(), "cleaned up METAR cache");
        Ok(expired.len())
    }

    /// Discards the whole cache regardless of age
    pub fn clear_all(&mut self) -> Result<(), MetarError> {
        self.cache.clear();
        self.cache.save().map_err(|source| MetarError::Store {
            operation: "clear",
            source,
        })?;
        info!("cleared METAR cache");
        Ok(())
    }

    /// Checks the configured API key against the reference airport
    ///
    /// Having no key is a valid choice, so that case reports `true` without
    /// touching the network.
    pub async fn validate_api_key(&mut self) -> Result<bool, MetarError> {
        Ok(self.api_key_status().await? != ApiKeyStatus::Rejected)
    }

    /// Like [`Self::validate_api_key`], but tells a missing key apart from a
    /// working one
    pub async fn api_key_status(&mut self) -> Result<ApiKeyStatus, MetarError> {
        if self.settings.metar_api_settings()?.api_key().is_none() {
            return Ok(ApiKeyStatus::Missing);
        }

        match self.get(REFERENCE_AIRPORT, true).await? {
            Some(_) => Ok(ApiKeyStatus::Valid),
            None => Ok(ApiKeyStatus::Rejected),
        }
    }

    fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get::<CacheEntry>(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "ignoring unreadable METAR cache entry");
                None
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age_ms = self.clock.now().timestamp_millis() - entry.fetched_at_ms;
        age_ms < self.freshness_window.num_milliseconds()
    }
}

/// Airport codes are matched case-insensitively
fn normalize_code(icao: &str) -> String {
    icao.trim().to_uppercase()
}
