//! Display formatting for durations, timestamps and continent codes

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Formats a block time in minutes as hours and minutes
///
/// `90` becomes `"1hr 30m"`, `120` becomes `"2hrs"`, `45` becomes `"45m"`
/// and `0` becomes an empty string.
pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;

    let mut parts = Vec::with_capacity(2);
    match hours {
        0 => {}
        1 => parts.push("1hr".to_string()),
        h => parts.push(format!("{}hrs", h)),
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    parts.join(" ")
}

/// Formats a timestamp in the short US style with a 24 hour clock,
/// e.g. `"Jan 5, 2025, 14:05"`
pub fn format_date<Tz>(date: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    date.format("%b %-d, %Y, %H:%M").to_string()
}

/// Full name of a two letter continent code as used by OurAirports
pub fn continent_name(code: &str) -> Option<&'static str> {
    match code {
        "AF" => Some("Africa"),
        "AN" => Some("Antarctica"),
        "AS" => Some("Asia"),
        "EU" => Some("Europe"),
        "NA" => Some("North America"),
        "OC" => Some("Oceania"),
        "SA" => Some("South America"),
        _ => None,
    }
}
