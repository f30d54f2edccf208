//! FlyList Library
//!
//! Data and service layer for the FlyList flight log: a METAR cache in front
//! of the CheckWX API, typed settings, a toast notification queue and a SQLite
//! store for flights, aircraft, airports and airlines. The modules are exposed
//! for the `flylist` binary and for integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod data;
pub mod db;
pub mod format;
pub mod links;
pub mod settings;
pub mod store;
pub mod toast;
