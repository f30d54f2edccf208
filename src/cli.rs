//! Command-line interface parsing for FlyList
//!
//! This module defines the `flylist` command tree with clap. Running the
//! parsed commands is handled by [`crate::app`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// FlyList - flight log, reference data and METAR cache
#[derive(Parser, Debug)]
#[command(name = "flylist")]
#[command(about = "Flight log, airport and airline data, and cached METAR reports")]
#[command(version)]
pub struct Cli {
    /// Directory holding settings, the METAR cache and the flight database
    ///
    /// Defaults to the platform data directory for flylist.
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Log level for the `flylist` target
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the METAR report for an airport
    ///
    /// Examples:
    ///   flylist metar EGLL            # cached if fetched in the last 30 minutes
    ///   flylist metar egll --refresh  # always ask CheckWX
    Metar {
        /// ICAO code of the airport
        icao: String,
        /// Ignore the cache and fetch a new report
        #[arg(long)]
        refresh: bool,
    },

    /// Manage the METAR cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Check the stored CheckWX API key
    ValidateKey,

    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Load reference data from a CSV file
    #[command(subcommand)]
    Import(ImportCommand),

    /// List logged flights
    Flights,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    /// Remove reports older than the freshness window
    Cleanup,
    /// Remove every cached report
    Clear,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsCommand {
    /// Print all settings as JSON
    Show,
    /// Store a CheckWX API key
    SetKey {
        key: String,
    },
    /// Remove the stored CheckWX API key
    ClearKey,
    /// Mark first-run setup as done
    CompleteSetup,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ImportCommand {
    /// Import airlines from an OpenFlights style CSV
    Airlines(AirlineImportArgs),
    /// Import airports from an OurAirports style CSV
    Airports {
        /// Path of the CSV file
        csv: PathBuf,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AirlineImportArgs {
    /// Path of the CSV file
    pub csv: PathBuf,

    /// The file starts with a header row
    #[arg(long)]
    pub headers: bool,

    /// Skip airlines without a callsign
    #[arg(long)]
    pub require_callsign: bool,
}
