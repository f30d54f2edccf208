//! File-backed key/value document
//!
//! Provides a `DocumentStore` that keeps a JSON object in memory and writes it
//! back to `<dir>/<name>` on `save()`.

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when loading, reading or saving a document
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or creating the document's directory failed
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file on disk is not a JSON object
    #[error("Document {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be converted to JSON
    #[error("Failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored value does not have the requested shape
    #[error("Stored value for '{key}' has an unexpected shape: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Returns the platform data directory for FlyList
///
/// Uses `~/.local/share/flylist/` on Linux, or the equivalent on other platforms.
/// Returns `None` if no home directory can be determined.
pub fn default_data_dir() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "flylist")?;
    Some(project_dirs.data_dir().to_path_buf())
}

/// A named JSON document holding flat key/value entries
///
/// Mutations only touch the in-memory copy; nothing reaches the disk until
/// `save()` is called.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    /// Location of the document on disk
    path: PathBuf,
    /// Current entries
    entries: Map<String, Value>,
}

impl DocumentStore {
    /// Loads the document `name` from `dir`
    ///
    /// A missing or empty file yields an empty document.
    pub fn load(dir: &Path, name: &str) -> Result<Self, StoreError> {
        let path = dir.join(name);

        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        debug!(path = %path.display(), entries = entries.len(), "loaded document");
        Ok(Self { path, entries })
    }

    /// Creates an empty document for `name` in `dir`, ignoring anything on disk
    ///
    /// The existing file is only replaced once `save()` is called.
    pub fn create_new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(name),
            entries: Map::new(),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the value stored under `key`
    ///
    /// Returns `Ok(None)` when the key is missing or holds `null`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Stores `value` under `key`, replacing any previous value
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Removes `key`, returning whether it was present
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Iterates over all entries as raw JSON
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Writes the document to disk, creating the directory if needed
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            StoreError::Encode {
                key: String::new(),
                source,
            }
        })?;

        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn create_test_store() -> (DocumentStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = DocumentStore::load(temp_dir.path(), "test.json").expect("Load should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.is_empty());
        assert!(!store.path().exists(), "Loading must not create the file");
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (store, _temp_dir) = create_test_store();

        let result: Option<TestData> = store.get("nonexistent_key").unwrap();

        assert!(result.is_none(), "Should return None for missing key");
    }

    #[test]
    fn test_save_writes_file_in_directory() {
        let (mut store, temp_dir) = create_test_store();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        store.set("test_key", &data).unwrap();
        store.save().expect("Save should succeed");

        let content = fs::read_to_string(temp_dir.path().join("test.json")).expect("Should read file");
        assert!(content.contains("\"test_key\""));
        assert!(content.contains("\"name\""));
        assert!(content.contains("42"));
    }

    #[test]
    fn test_values_survive_reload() {
        let (mut store, temp_dir) = create_test_store();
        let data = TestData {
            name: "reload".to_string(),
            value: 12345,
        };

        store.set("reload_key", &data).unwrap();
        store.save().unwrap();

        let reloaded = DocumentStore::load(temp_dir.path(), "test.json").unwrap();
        let result: TestData = reloaded.get("reload_key").unwrap().expect("Value should exist");

        assert_eq!(result, data);
    }

    #[test]
    fn test_unsaved_changes_are_not_persisted() {
        let (mut store, temp_dir) = create_test_store();
        store.set("draft", &1).unwrap();

        let reloaded = DocumentStore::load(temp_dir.path(), "test.json").unwrap();

        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_set_overwrites_existing_value() {
        let (mut store, _temp_dir) = create_test_store();

        store.set("key", &TestData { name: "first".into(), value: 1 }).unwrap();
        store.set("key", &TestData { name: "second".into(), value: 2 }).unwrap();

        let result: TestData = store.get("key").unwrap().unwrap();
        assert_eq!(result.name, "second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_reports_presence() {
        let (mut store, _temp_dir) = create_test_store();
        store.set("present", &true).unwrap();

        assert!(store.delete("present"));
        assert!(!store.delete("present"));
    }

    #[test]
    fn test_get_with_wrong_shape_is_decode_error() {
        let (mut store, _temp_dir) = create_test_store();
        store.set("number", &7).unwrap();

        let result: Result<Option<TestData>, _> = store.get("number");

        assert!(matches!(result, Err(StoreError::Decode { .. })));
    }

    #[test]
    fn test_null_value_reads_as_none() {
        let (mut store, _temp_dir) = create_test_store();
        store.set("nothing", &Value::Null).unwrap();

        let result: Option<String> = store.get("nothing").unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bad.json"), "[1, 2, 3]").unwrap();

        let result = DocumentStore::load(temp_dir.path(), "bad.json");

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_save_creates_directory_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");
        let mut store = DocumentStore::load(&nested, "doc.json").unwrap();
        store.set("k", &"v").unwrap();

        store.save().expect("Save should succeed");

        assert!(nested.join("doc.json").exists(), "Document should exist");
    }

    #[test]
    fn test_create_new_discards_existing_entries_on_save() {
        let (mut store, temp_dir) = create_test_store();
        store.set("old", &1).unwrap();
        store.save().unwrap();

        let fresh = DocumentStore::create_new(temp_dir.path(), "test.json");
        assert!(fresh.is_empty());
        fresh.save().unwrap();

        let reloaded = DocumentStore::load(temp_dir.path(), "test.json").unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_default_data_dir_contains_app_name() {
        if let Some(dir) = default_data_dir() {
            assert!(dir.to_string_lossy().contains("flylist"));
        }
        // Passes when no home directory exists (e.g. CI)
    }
}
