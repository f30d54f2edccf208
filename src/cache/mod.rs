//! Cache module for METAR weather observations
//!
//! This module provides the METAR manager, which keeps decoded CheckWX reports in
//! the `metar_cache.json` document for a fixed freshness window. Freshness is
//! checked lazily when an entry is read; `cleanup_expired` prunes stale entries
//! on demand (for example at start-up).

mod manager;

pub use manager::{
    ApiKeyStatus, CachedObservation, MetarError, MetarManager, FRESHNESS_WINDOW_MINUTES, METAR_CACHE_DOCUMENT,
    REFERENCE_AIRPORT,
};
