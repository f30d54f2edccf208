//! Reference data row parsers
//!
//! Turns CSV rows of airline data (OpenFlights `airlines.dat`, with or without a
//! header row) and airport data (OurAirports `airports.csv`) into records.
//!
//! Each field is read from an ordered list of [`Candidate`] accessors and the
//! first one holding a value wins. Empty cells and the `\N` marker used by
//! OpenFlights count as no value.

use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Airline, Airport, AirportType};

/// Marker OpenFlights uses for a missing value
const NULL_MARKER: &str = "\\N";

/// Errors that abort a whole import
#[derive(Debug, Error)]
pub enum ImportError {
    /// The CSV source or its header row could not be read
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Reasons a single row is skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: &'static str, value: String },
}

/// Where a field's value may be found in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Column with this header name; only used when the file has headers
    Header(&'static str),
    /// Column at this position; only used when the file has no headers
    Position(usize),
}

use Candidate::{Header, Position};

const AIRLINE_ID: &[Candidate] = &[Header("id"), Header("airline_id"), Position(0)];
const AIRLINE_NAME: &[Candidate] = &[Header("name"), Position(1)];
const AIRLINE_ALIAS: &[Candidate] = &[Header("alias"), Position(2)];
const AIRLINE_IATA: &[Candidate] = &[Header("iata"), Header("iata_code"), Position(3)];
const AIRLINE_ICAO: &[Candidate] = &[Header("icao"), Header("icao_code"), Position(4)];
const AIRLINE_CALLSIGN: &[Candidate] = &[Header("callsign"), Position(5)];
const AIRLINE_COUNTRY: &[Candidate] = &[Header("country"), Position(6)];
const AIRLINE_ACTIVE: &[Candidate] = &[Header("active"), Position(7)];

/// Which optional airline fields must be present for a row to be kept
///
/// ICAO code and country are always required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AirlineRequirements {
    /// Skip airlines without a callsign
    pub callsign: bool,
}

/// Records parsed from a file, plus how many rows were skipped
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

/// One CSV row, optionally with the file's header row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    headers: Option<&'a StringRecord>,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    pub fn new(headers: Option<&'a StringRecord>, record: &'a StringRecord) -> Self {
        Self { headers, record }
    }

    /// Value behind a single accessor, if it holds one
    pub fn get(&self, candidate: Candidate) -> Option<&'a str> {
        let raw = match (candidate, self.headers) {
            (Header(name), Some(headers)) => {
                let index = headers.iter().position(|h| h.trim() == name)?;
                self.record.get(index)?
            }
            (Position(index), None) => self.record.get(index)?,
            _ => return None,
        };
        non_null(raw)
    }

    /// First value found among `candidates`, in order
    pub fn first(&self, candidates: &[Candidate]) -> Option<&'a str> {
        candidates.iter().find_map(|c| self.get(*c))
    }

    fn required(&self, field: &'static str, candidates: &[Candidate]) -> Result<&'a str, RowError> {
        self.first(candidates).ok_or(RowError::MissingField(field))
    }
}

fn non_null(raw: &str) -> Option<&str> {
    let value = raw.trim();
    (!value.is_empty() && value != NULL_MARKER).then_some(value)
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, RowError> {
    value.parse().map_err(|_| RowError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

/// OpenFlights uses Y/N; other exports use 1/0 or true/false
fn parse_active(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_lowercase).as_deref(),
        Some("y" | "yes" | "1" | "true")
    )
}

/// Builds an airline from a row
pub fn airline_from_row(row: &Row<'_>, requirements: &AirlineRequirements) -> Result<Airline, RowError> {
    let icao = row.required("icao", AIRLINE_ICAO)?;
    let country = row.required("country", AIRLINE_COUNTRY)?;
    let callsign = row.first(AIRLINE_CALLSIGN);
    if requirements.callsign && callsign.is_none() {
        return Err(RowError::MissingField("callsign"));
    }

    Ok(Airline {
        id: parse_number("id", row.required("id", AIRLINE_ID)?)?,
        name: row.first(AIRLINE_NAME).unwrap_or("Unknown").to_string(),
        alias: row.first(AIRLINE_ALIAS).map(str::to_string),
        iata: row.first(AIRLINE_IATA).map(str::to_string),
        icao: icao.to_string(),
        callsign: callsign.map(str::to_string),
        country: country.to_string(),
        active: parse_active(row.first(AIRLINE_ACTIVE)),
    })
}

/// Builds an airport from an OurAirports row
pub fn airport_from_row(row: &Row<'_>) -> Result<Airport, RowError> {
    let kind = row.required("type", &[Header("type")])?;

    Ok(Airport {
        id: parse_number("id", row.required("id", &[Header("id")])?)?,
        kind: kind.parse::<AirportType>().map_err(|_| RowError::InvalidValue {
            field: "type",
            value: kind.to_string(),
        })?,
        name: row.required("name", &[Header("name")])?.to_string(),
        latitude_deg: parse_number("latitude_deg", row.required("latitude_deg", &[Header("latitude_deg")])?)?,
        longitude_deg: parse_number(
            "longitude_deg",
            row.required("longitude_deg", &[Header("longitude_deg")])?,
        )?,
        elevation_ft: row
            .get(Header("elevation_ft"))
            .map(|v| parse_number("elevation_ft", v))
            .transpose()?,
        continent: row.required("continent", &[Header("continent")])?.to_string(),
        iso_country: row.required("iso_country", &[Header("iso_country")])?.to_string(),
        iso_region: row.required("iso_region", &[Header("iso_region")])?.to_string(),
        icao_code: row.get(Header("icao_code")).map(str::to_string),
        iata_code: row.get(Header("iata_code")).map(str::to_string),
        home_link: row.get(Header("home_link")).map(str::to_string),
    })
}

fn parse_rows<R: Read, T>(
    reader: R,
    has_headers: bool,
    convert: impl Fn(&Row<'_>) -> Result<T, RowError>,
) -> Result<ImportReport<T>, ImportError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);

    let headers = if has_headers {
        Some(csv_reader.headers()?.clone())
    } else {
        None
    };

    let mut records = Vec::new();
    let mut skipped = 0;

    for (index, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                warn!(row = index + 1, error = %e, "skipping undecodable row");
                skipped += 1;
                continue;
            }
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        match convert(&Row::new(headers.as_ref(), &record)) {
            Ok(item) => records.push(item),
            Err(e) => {
                warn!(row = index + 1, error = %e, "skipping invalid row");
                skipped += 1;
            }
        }
    }

    debug!(parsed = records.len(), skipped, "parsed reference data");
    Ok(ImportReport { records, skipped })
}

/// Parses airline rows
///
/// # Arguments
/// * `reader` - CSV source
/// * `has_headers` - whether the first line names the columns; OpenFlights
///   `airlines.dat` has no header row
/// * `requirements` - optional fields that must be present
pub fn parse_airlines<R: Read>(
    reader: R,
    has_headers: bool,
    requirements: &AirlineRequirements,
) -> Result<ImportReport<Airline>, ImportError> {
    parse_rows(reader, has_headers, |row| airline_from_row(row, requirements))
}

/// Parses OurAirports `airports.csv` rows
pub fn parse_airports<R: Read>(reader: R) -> Result<ImportReport<Airport>, ImportError> {
    parse_rows(reader, true, airport_from_row)
}
