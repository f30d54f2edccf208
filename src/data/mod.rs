//! Core data models for FlyList
//!
//! This module contains the record types stored in the flight database
//! (flights, aircraft, airports, airlines) along with the weather client and
//! the reference data row parsers.

pub mod reference;
pub mod weather;

pub use reference::{
    parse_airlines, parse_airports, AirlineRequirements, ImportError, ImportReport, RowError,
};
pub use weather::{CheckWxClient, Metar, Observation, WeatherError, WeatherFetcher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An aircraft the user flies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    pub id: i64,
    /// User-facing name, e.g. "Fenix A320"
    pub name: String,
    pub model: String,
    pub manufacturer: String,
    /// ICAO type designator, e.g. "A20N"
    pub icao_code: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Data needed to create an aircraft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAircraft {
    pub name: String,
    pub model: String,
    pub manufacturer: String,
    pub icao_code: String,
}

impl NewAircraft {
    /// Whether every field has a non-blank value
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.model, &self.manufacturer, &self.icao_code]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Category of an airport, as used by OurAirports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirportType {
    LargeAirport,
    MediumAirport,
    SmallAirport,
    Heliport,
    SeaplaneBase,
    #[serde(rename = "balloonport")]
    BalloonPort,
    Closed,
}

impl AirportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AirportType::LargeAirport => "large_airport",
            AirportType::MediumAirport => "medium_airport",
            AirportType::SmallAirport => "small_airport",
            AirportType::Heliport => "heliport",
            AirportType::SeaplaneBase => "seaplane_base",
            AirportType::BalloonPort => "balloonport",
            AirportType::Closed => "closed",
        }
    }
}

impl fmt::Display for AirportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AirportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "large_airport" => Ok(AirportType::LargeAirport),
            "medium_airport" => Ok(AirportType::MediumAirport),
            "small_airport" => Ok(AirportType::SmallAirport),
            "heliport" => Ok(AirportType::Heliport),
            "seaplane_base" => Ok(AirportType::SeaplaneBase),
            "balloonport" => Ok(AirportType::BalloonPort),
            "closed" => Ok(AirportType::Closed),
            other => Err(format!("unknown airport type '{}'", other)),
        }
    }
}

/// An airport from the reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: AirportType,
    pub name: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_ft: Option<i64>,
    /// Two letter continent code, see [`crate::format::continent_name`]
    pub continent: String,
    pub iso_country: String,
    pub iso_region: String,
    pub icao_code: Option<String>,
    pub iata_code: Option<String>,
    pub home_link: Option<String>,
}

/// An airline from the reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    pub id: i64,
    pub name: String,
    pub alias: Option<String>,
    pub iata: Option<String>,
    pub icao: String,
    pub callsign: Option<String>,
    pub country: String,
    pub active: bool,
}

/// Departure and arrival airports by ICAO code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRoute {
    pub dep_airport: String,
    pub arr_airport: String,
}

/// Operator details of a flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightCompany {
    pub flight_number: String,
    pub callsign: String,
    pub airline_icao: String,
    /// Airline record, when the ICAO code is known to the database
    pub airline: Option<Airline>,
}

/// A logged flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: i64,
    pub route: FlightRoute,
    pub company: FlightCompany,
    pub aircraft: Aircraft,
    /// Block time in minutes
    pub duration: u32,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub last_edited: DateTime<Utc>,
}

/// Data needed to log a flight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFlight {
    pub route: FlightRoute,
    pub flight_number: String,
    pub callsign: String,
    pub airline_icao: String,
    pub aircraft_id: i64,
    /// Block time in minutes
    pub duration: u32,
}
