//! Persisted user settings
//!
//! Settings live in the `settings.json` document as a handful of top-level keys:
//! `preferences`, `metar_api` and `setup_complete`. Every save replaces the
//! whole value of its key; there is no field-level merging.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::{DocumentStore, StoreError};

/// File name of the settings document
pub const SETTINGS_DOCUMENT: &str = "settings.json";

const PREFERENCES_KEY: &str = "preferences";
const METAR_API_KEY: &str = "metar_api";
const SETUP_COMPLETE_KEY: &str = "setup_complete";

/// A settings operation failed in the underlying store
#[derive(Debug, Error)]
#[error("Settings operation '{operation}' failed: {source}")]
pub struct SettingsError {
    /// Name of the operation that failed
    pub operation: &'static str,
    #[source]
    pub source: StoreError,
}

/// How long toasts stay on screen, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastDurations {
    /// Display time for info and success toasts
    pub info_success_duration: u64,
    /// Display time for error toasts
    pub error_duration: u64,
}

impl Default for ToastDurations {
    fn default() -> Self {
        Self {
            info_success_duration: 1500,
            error_duration: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    #[default]
    Feet,
    Meters,
}

/// Inches of mercury, hectopascals, kilopascals or millibars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarometerUnit {
    Hg,
    #[default]
    Hpa,
    Kpa,
    Mb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSystem {
    Imperial,
    #[default]
    Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    Kph,
    #[default]
    Kts,
    Mph,
    Mps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Units used when presenting weather and distances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitPreferences {
    pub altitude: AltitudeUnit,
    pub barometer: BarometerUnit,
    pub general_distance: MeasurementSystem,
    pub wind_speed: WindSpeedUnit,
    pub precipitation_measurement: MeasurementSystem,
    pub temperature: TemperatureUnit,
}

/// User preferences
///
/// Missing fields in a stored document fall back to their defaults, so older
/// settings files keep loading as new preferences are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Rows shown per page in the flights table
    pub table_row_count: u32,
    /// Minutes added per click on the duration filter buttons
    pub duration_filter_button_interval: u32,
    /// Minutes added per scroll step on the duration filter
    pub duration_filter_scroll_interval: u32,
    pub toasts: ToastDurations,
    pub units: UnitPreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            table_row_count: 10,
            duration_filter_button_interval: 15,
            duration_filter_scroll_interval: 5,
            toasts: ToastDurations::default(),
            units: UnitPreferences::default(),
        }
    }
}

/// CheckWX API credentials
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetarApiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MetarApiSettings {
    /// Creates settings holding the given API key
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    /// The configured key, treating an empty string as no key
    pub fn api_key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Every known setting, with defaults filled in
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Settings {
    pub preferences: Preferences,
    pub metar_api: MetarApiSettings,
    pub setup_complete: bool,
}

/// Typed access to the settings document
///
/// The document is reloaded for every operation so that several handles
/// (the METAR manager, the toast queue, the CLI) always see each other's saves.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    /// Directory holding `settings.json`
    dir: PathBuf,
}

impl SettingsStore {
    /// Creates a store for the settings document in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the settings document
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the document, runs `operation` against it and tags any failure
    fn with_document<T>(
        &self,
        name: &'static str,
        operation: impl FnOnce(&mut DocumentStore) -> Result<T, StoreError>,
    ) -> Result<T, SettingsError> {
        DocumentStore::load(&self.dir, SETTINGS_DOCUMENT)
            .and_then(|mut document| operation(&mut document))
            .map_err(|source| SettingsError {
                operation: name,
                source,
            })
    }

    /// Returns the stored preferences, or the defaults if none were saved
    pub fn preferences(&self) -> Result<Preferences, SettingsError> {
        self.with_document("get preferences", |doc| {
            Ok(doc.get(PREFERENCES_KEY)?.unwrap_or_default())
        })
    }

    /// Replaces the stored preferences
    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), SettingsError> {
        self.with_document("save preferences", |doc| {
            doc.set(PREFERENCES_KEY, preferences)?;
            doc.save()
        })
    }

    /// Returns the stored METAR API settings, or empty settings if none were saved
    pub fn metar_api_settings(&self) -> Result<MetarApiSettings, SettingsError> {
        self.with_document("get METAR API settings", |doc| {
            Ok(doc.get(METAR_API_KEY)?.unwrap_or_default())
        })
    }

    /// Replaces the stored METAR API settings
    pub fn save_metar_api_settings(&self, settings: &MetarApiSettings) -> Result<(), SettingsError> {
        self.with_document("save METAR API settings", |doc| {
            doc.set(METAR_API_KEY, settings)?;
            doc.save()
        })
    }

    /// Whether first-run setup has been completed
    pub fn is_setup_complete(&self) -> Result<bool, SettingsError> {
        self.with_document("check setup complete", |doc| {
            Ok(doc.get::<bool>(SETUP_COMPLETE_KEY)? == Some(true))
        })
    }

    /// Records that first-run setup has been completed
    pub fn mark_setup_complete(&self) -> Result<(), SettingsError> {
        self.with_document("mark setup complete", |doc| {
            doc.set(SETUP_COMPLETE_KEY, &true)?;
            doc.save()
        })
    }

    /// Reads any setting by key, falling back to `default` when it is unset
    pub fn setting<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, SettingsError> {
        self.with_document("get setting", |doc| Ok(doc.get(key)?.unwrap_or(default)))
    }

    /// Stores any setting by key
    pub fn save_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        self.with_document("save setting", |doc| {
            doc.set(key, value)?;
            doc.save()
        })
    }

    /// Reads every known setting in one pass
    pub fn all_settings(&self) -> Result<Settings, SettingsError> {
        self.with_document("get all settings", |doc| {
            Ok(Settings {
                preferences: doc.get(PREFERENCES_KEY)?.unwrap_or_default(),
                metar_api: doc.get(METAR_API_KEY)?.unwrap_or_default(),
                setup_complete: doc.get::<bool>(SETUP_COMPLETE_KEY)?.unwrap_or(false),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_settings() -> (SettingsStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings = SettingsStore::new(temp_dir.path());
        (settings, temp_dir)
    }

    #[test]
    fn test_preferences_default_when_unset() {
        let (settings, _temp_dir) = create_test_settings();

        let prefs = settings.preferences().unwrap();

        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.table_row_count, 10);
        assert_eq!(prefs.toasts.info_success_duration, 1500);
        assert_eq!(prefs.toasts.error_duration, 5000);
        assert_eq!(prefs.units.wind_speed, WindSpeedUnit::Kts);
    }

    #[test]
    fn test_save_preferences_replaces_value() {
        let (settings, _temp_dir) = create_test_settings();
        let mut prefs = Preferences::default();
        prefs.toasts.error_duration = 9000;
        prefs.units.temperature = TemperatureUnit::Fahrenheit;

        settings.save_preferences(&prefs).unwrap();

        assert_eq!(settings.preferences().unwrap(), prefs);
    }

    #[test]
    fn test_partial_preferences_fill_defaults() {
        let (settings, temp_dir) = create_test_settings();
        fs::write(
            temp_dir.path().join(SETTINGS_DOCUMENT),
            r#"{"preferences": {"table_row_count": 25, "toasts": {"error_duration": 7000}}}"#,
        )
        .unwrap();

        let prefs = settings.preferences().unwrap();

        assert_eq!(prefs.table_row_count, 25);
        assert_eq!(prefs.toasts.error_duration, 7000);
        assert_eq!(prefs.toasts.info_success_duration, 1500);
        assert_eq!(prefs.units, UnitPreferences::default());
    }

    #[test]
    fn test_units_serialize_lowercase() {
        let json = serde_json::to_value(UnitPreferences::default()).unwrap();

        assert_eq!(json["altitude"], "feet");
        assert_eq!(json["barometer"], "hpa");
        assert_eq!(json["wind_speed"], "kts");
    }

    #[test]
    fn test_metar_api_key_roundtrip() {
        let (settings, _temp_dir) = create_test_settings();
        assert_eq!(settings.metar_api_settings().unwrap().api_key(), None);

        settings
            .save_metar_api_settings(&MetarApiSettings::with_key("abc123"))
            .unwrap();

        assert_eq!(
            settings.metar_api_settings().unwrap().api_key(),
            Some("abc123")
        );
    }

    #[test]
    fn test_blank_api_key_counts_as_absent() {
        let api = MetarApiSettings::with_key("   ");
        assert_eq!(api.api_key(), None);
    }

    #[test]
    fn test_setup_complete_is_one_way_flag() {
        let (settings, _temp_dir) = create_test_settings();
        assert!(!settings.is_setup_complete().unwrap());

        settings.mark_setup_complete().unwrap();
        settings.mark_setup_complete().unwrap();

        assert!(settings.is_setup_complete().unwrap());
    }

    #[test]
    fn test_generic_setting_with_default() {
        let (settings, _temp_dir) = create_test_settings();

        assert_eq!(settings.setting("theme", "light".to_string()).unwrap(), "light");

        settings.save_setting("theme", "dark").unwrap();

        assert_eq!(settings.setting("theme", "light".to_string()).unwrap(), "dark");
    }

    #[test]
    fn test_saves_do_not_clobber_other_keys() {
        let (settings, _temp_dir) = create_test_settings();
        settings.mark_setup_complete().unwrap();
        settings
            .save_metar_api_settings(&MetarApiSettings::with_key("k"))
            .unwrap();
        settings.save_preferences(&Preferences::default()).unwrap();

        let all = settings.all_settings().unwrap();

        assert!(all.setup_complete);
        assert_eq!(all.metar_api.api_key(), Some("k"));
    }

    #[test]
    fn test_all_settings_defaults() {
        let (settings, _temp_dir) = create_test_settings();

        assert_eq!(settings.all_settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_error_names_operation() {
        let (settings, temp_dir) = create_test_settings();
        fs::write(temp_dir.path().join(SETTINGS_DOCUMENT), "not json").unwrap();

        let err = settings.preferences().unwrap_err();

        assert_eq!(err.operation, "get preferences");
        assert!(err.to_string().contains("get preferences"));
    }
}
