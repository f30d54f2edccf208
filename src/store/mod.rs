//! Named JSON documents persisted to disk
//!
//! Settings and the METAR cache are both flat key/value documents. A
//! `DocumentStore` is loaded once by name, mutated in memory and written back
//! with an explicit `save()`.

mod document;

pub use document::{default_data_dir, DocumentStore, StoreError};
