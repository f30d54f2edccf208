//! External links for a logged flight
//!
//! Builds the SimBrief dispatch and Flightradar24 URLs. Opening them is left
//! to the caller.

use crate::data::{Airline, Flight};

const SIMBRIEF_DISPATCH_URL: &str = "https://dispatch.simbrief.com/options/custom";
const FLIGHTRADAR_FLIGHTS_URL: &str = "https://www.flightradar24.com/data/flights";

/// SimBrief dispatch URL prefilled with the flight's route, operator and type
///
/// Operator fields are only included when the flight has an airline code.
pub fn simbrief_url(flight: &Flight) -> String {
    let mut params: Vec<(&str, &str)> = Vec::new();

    if !flight.company.airline_icao.is_empty() {
        params.push(("airline", &flight.company.airline_icao));
        params.push(("fltnum", &flight.company.flight_number));
        params.push(("callsign", &flight.company.callsign));
    }
    params.push(("orig", &flight.route.dep_airport));
    params.push(("dest", &flight.route.arr_airport));
    params.push(("type", &flight.aircraft.icao_code));

    let query: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();

    format!("{}?{}", SIMBRIEF_DISPATCH_URL, query.join("&"))
}

/// Flightradar24 page for a flight number, or `None` when the airline has
/// no IATA code
pub fn flightradar_url(airline: &Airline, flight_number: &str) -> Option<String> {
    let iata = airline.iata.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

    Some(format!(
        "{}/{}{}",
        FLIGHTRADAR_FLIGHTS_URL,
        urlencoding::encode(iata),
        urlencoding::encode(flight_number.trim())
    ))
}
