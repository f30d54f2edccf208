//! Command execution for the FlyList CLI
//!
//! [`App`] owns the data directory and turns parsed [`Command`]s into calls on
//! the settings store, the METAR manager and the flight database. Output goes
//! to any writer so commands can be exercised in tests without a terminal.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::cache::{ApiKeyStatus, MetarError, MetarManager};
use crate::cli::{AirlineImportArgs, CacheCommand, Command, ImportCommand, SettingsCommand};
use crate::data::{
    parse_airlines, parse_airports, AirlineRequirements, CheckWxClient, ImportError, Metar,
    Observation, WeatherFetcher,
};
use crate::db::{DbError, FlightLog};
use crate::format::{format_date, format_duration};
use crate::settings::{
    AltitudeUnit, BarometerUnit, MeasurementSystem, MetarApiSettings, SettingsError, SettingsStore,
    TemperatureUnit, UnitPreferences, WindSpeedUnit,
};

/// Errors surfaced to the user by a command
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Metar(#[from] MetarError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Import(#[from] ImportError),

    /// An input file could not be opened
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing command output failed
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    /// CheckWX did not accept the stored key
    #[error("The stored CheckWX API key was rejected")]
    KeyRejected,
}

/// Runs commands against one data directory
pub struct App<F = CheckWxClient> {
    data_dir: PathBuf,
    settings: SettingsStore,
    fetcher: F,
}

impl App<CheckWxClient> {
    /// Creates an app that talks to CheckWX
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_fetcher(data_dir, CheckWxClient::new())
    }
}

impl<F: WeatherFetcher + Clone> App<F> {
    /// Creates an app with a custom weather fetcher (used in tests)
    pub fn with_fetcher(data_dir: impl Into<PathBuf>, fetcher: F) -> Self {
        let data_dir = data_dir.into();
        Self {
            settings: SettingsStore::new(&data_dir),
            data_dir,
            fetcher,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Runs a single command, writing its output to `out`
    pub async fn run(&self, command: Command, out: &mut impl Write) -> Result<(), AppError> {
        match command {
            Command::Metar { icao, refresh } => self.show_metar(&icao, refresh, out).await,
            Command::Cache(cache) => self.manage_cache(cache, out),
            Command::ValidateKey => self.validate_key(out).await,
            Command::Settings(settings) => self.manage_settings(settings, out),
            Command::Import(import) => self.import(import, out),
            Command::Flights => self.list_flights(out),
        }
    }

    fn metar_manager(&self) -> Result<MetarManager<F>, AppError> {
        Ok(MetarManager::open(
            &self.data_dir,
            self.settings.clone(),
            self.fetcher.clone(),
        )?)
    }

    async fn show_metar(&self, icao: &str, refresh: bool, out: &mut impl Write) -> Result<(), AppError> {
        let mut manager = self.metar_manager()?;

        let Some(observation) = manager.get(icao, refresh).await? else {
            writeln!(
                out,
                "No METAR available for {} (check the API key with `flylist validate-key`)",
                icao.trim().to_uppercase()
            )?;
            return Ok(());
        };

        let units = self.settings.preferences()?.units;
        for line in describe_observation(&observation, &units) {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }

    fn manage_cache(&self, command: CacheCommand, out: &mut impl Write) -> Result<(), AppError> {
        let mut manager = self.metar_manager()?;

        match command {
            CacheCommand::Cleanup => {
                let removed = manager.cleanup_expired()?;
                writeln!(out, "Removed {} expired METAR report(s)", removed)?;
            }
            CacheCommand::Clear => {
                let count = manager.len();
                manager.clear_all()?;
                writeln!(out, "Cleared {} cached METAR report(s)", count)?;
            }
        }
        Ok(())
    }

    async fn validate_key(&self, out: &mut impl Write) -> Result<(), AppError> {
        let mut manager = self.metar_manager()?;

        match manager.api_key_status().await? {
            ApiKeyStatus::Valid => writeln!(out, "API key is valid")?,
            ApiKeyStatus::Missing => {
                writeln!(out, "No API key configured, METAR lookups are disabled")?
            }
            ApiKeyStatus::Rejected => return Err(AppError::KeyRejected),
        }
        Ok(())
    }

    fn manage_settings(&self, command: SettingsCommand, out: &mut impl Write) -> Result<(), AppError> {
        match command {
            SettingsCommand::Show => {
                let settings = self.settings.all_settings()?;
                let json = serde_json::to_string_pretty(&settings).map_err(io::Error::from)?;
                writeln!(out, "{}", json)?;
            }
            SettingsCommand::SetKey { key } => {
                self.settings
                    .save_metar_api_settings(&MetarApiSettings::with_key(key))?;
                writeln!(out, "API key saved")?;
            }
            SettingsCommand::ClearKey => {
                self.settings
                    .save_metar_api_settings(&MetarApiSettings::default())?;
                writeln!(out, "API key removed")?;
            }
            SettingsCommand::CompleteSetup => {
                self.settings.mark_setup_complete()?;
                writeln!(out, "Setup marked as complete")?;
            }
        }
        Ok(())
    }

    fn import(&self, command: ImportCommand, out: &mut impl Write) -> Result<(), AppError> {
        let log = FlightLog::in_dir(&self.data_dir)?;

        match command {
            ImportCommand::Airlines(AirlineImportArgs {
                csv,
                headers,
                require_callsign,
            }) => {
                let requirements = AirlineRequirements {
                    callsign: require_callsign,
                };
                let report = parse_airlines(open_csv(&csv)?, headers, &requirements)?;
                let inserted = log.create_airlines(&report.records)?;
                info!(inserted, skipped = report.skipped, "imported airlines");
                writeln!(out, "Imported {} airline(s), skipped {} row(s)", inserted, report.skipped)?;
            }
            ImportCommand::Airports { csv } => {
                let report = parse_airports(open_csv(&csv)?)?;
                let inserted = log.create_airports(&report.records)?;
                info!(inserted, skipped = report.skipped, "imported airports");
                writeln!(out, "Imported {} airport(s), skipped {} row(s)", inserted, report.skipped)?;
            }
        }
        Ok(())
    }

    fn list_flights(&self, out: &mut impl Write) -> Result<(), AppError> {
        let flights = FlightLog::in_dir(&self.data_dir)?.flights()?;

        if flights.is_empty() {
            writeln!(out, "No flights logged")?;
            return Ok(());
        }

        for flight in flights {
            let airline = flight
                .company
                .airline
                .as_ref()
                .map(|a| a.name.as_str())
                .unwrap_or(flight.company.airline_icao.as_str());
            writeln!(
                out,
                "#{:<4} {} -> {}  {:<8} {:<24} {:<5} {:<9} {}{}",
                flight.id,
                flight.route.dep_airport,
                flight.route.arr_airport,
                flight.company.callsign,
                airline,
                flight.aircraft.icao_code,
                format_duration(flight.duration),
                format_date(&flight.created_at),
                if flight.archived { "  [archived]" } else { "" }
            )?;
        }
        Ok(())
    }
}

fn open_csv(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|source| AppError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Human readable lines for an observation, in the user's units
///
/// Falls back to the raw JSON when the report does not match the decoded
/// METAR layout.
pub fn describe_observation(observation: &Observation, units: &UnitPreferences) -> Vec<String> {
    match observation.decode() {
        Ok(metar) => describe_metar(&metar, units),
        Err(_) => vec![serde_json::to_string_pretty(observation.as_json())
            .unwrap_or_else(|_| observation.as_json().to_string())],
    }
}

fn describe_metar(metar: &Metar, units: &UnitPreferences) -> Vec<String> {
    let mut lines = vec![
        format!("{}  observed {}", metar.icao, metar.observed),
        metar.raw_text.clone(),
    ];

    if let Some(category) = &metar.flight_category {
        lines.push(format!("Category:    {}", category));
    }

    if let Some(wind) = &metar.wind {
        let (speed, gust, unit) = match units.wind_speed {
            WindSpeedUnit::Kph => (wind.speed_kph, wind.gust_kph, "km/h"),
            WindSpeedUnit::Kts => (wind.speed_kts, wind.gust_kts, "kts"),
            WindSpeedUnit::Mph => (wind.speed_mph, wind.gust_mph, "mph"),
            WindSpeedUnit::Mps => (wind.speed_mps, wind.gust_mps, "m/s"),
        };
        let direction = wind
            .degrees
            .map(|d| format!("{:03.0}°", d))
            .unwrap_or_else(|| "VRB".to_string());
        let gust = gust.map(|g| format!(" gusting {:.0}", g)).unwrap_or_default();
        lines.push(format!("Wind:        {} at {:.0}{} {}", direction, speed, gust, unit));
    }

    if let Some(visibility) = &metar.visibility {
        let text = match units.general_distance {
            MeasurementSystem::Metric => visibility.meters_float.map(|m| format!("{:.0} m", m)),
            MeasurementSystem::Imperial => visibility.miles_float.map(|mi| format!("{} mi", mi)),
        };
        if let Some(text) = text {
            lines.push(format!("Visibility:  {}", text));
        }
    }

    if let Some(temperature) = &metar.temperature {
        let dewpoint = metar.dewpoint.as_ref();
        let line = match units.temperature {
            TemperatureUnit::Celsius => format!(
                "Temperature: {:.0} °C{}",
                temperature.celsius,
                dewpoint.map(|d| format!(", dewpoint {:.0} °C", d.celsius)).unwrap_or_default()
            ),
            TemperatureUnit::Fahrenheit => format!(
                "Temperature: {:.0} °F{}",
                temperature.fahrenheit,
                dewpoint.map(|d| format!(", dewpoint {:.0} °F", d.fahrenheit)).unwrap_or_default()
            ),
        };
        lines.push(line);
    }

    if let Some(barometer) = &metar.barometer {
        let line = match units.barometer {
            BarometerUnit::Hg => format!("{:.2} inHg", barometer.hg),
            BarometerUnit::Hpa => format!("{:.0} hPa", barometer.hpa),
            BarometerUnit::Kpa => format!("{:.1} kPa", barometer.kpa),
            BarometerUnit::Mb => format!("{:.0} mb", barometer.mb),
        };
        lines.push(format!("Pressure:    {}", line));
    }

    if !metar.clouds.is_empty() {
        let layers: Vec<String> = metar
            .clouds
            .iter()
            .map(|layer| {
                let base = match units.altitude {
                    AltitudeUnit::Feet => layer.base_feet_agl.or(layer.feet).map(|f| format!(" {:.0} ft", f)),
                    AltitudeUnit::Meters => layer.base_meters_agl.or(layer.meters).map(|m| format!(" {:.0} m", m)),
                };
                format!("{}{}", layer.code, base.unwrap_or_default())
            })
            .collect();
        lines.push(format!("Clouds:      {}", layers.join(", ")));
    }

    lines
}
