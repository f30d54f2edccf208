//! Flight database
//!
//! Records live in a local SQLite file with four tables: `flights`,
//! `aircraft`, `airports` and `airlines`. Every call opens its own connection
//! and closes it before returning. Booleans are stored as 0/1.

use chrono::NaiveDateTime;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{Aircraft, Airline, Airport, AirportType, Flight, FlightCompany, FlightRoute, NewAircraft, NewFlight};

/// File name of the flight database
pub const DATABASE_FILE: &str = "flylist.db";

/// Rows per multi-row INSERT when importing reference data
const BATCH_SIZE: usize = 100;

/// Schema migrations, applied in order and tracked with `PRAGMA user_version`
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "create flights table",
        "CREATE TABLE IF NOT EXISTS flights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dep_airport TEXT NOT NULL,
            arr_airport TEXT NOT NULL,
            flight_num TEXT NOT NULL,
            callsign TEXT NOT NULL,
            airline_icao TEXT NOT NULL,
            aircraft_id INTEGER NOT NULL,
            duration INTEGER NOT NULL,
            archived BOOLEAN DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            last_edited DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        2,
        "create aircraft table",
        "CREATE TABLE IF NOT EXISTS aircraft (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            model TEXT NOT NULL,
            manufacturer TEXT NOT NULL,
            icao_code TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        3,
        "create airports table",
        "CREATE TABLE IF NOT EXISTS airports (
            id INTEGER PRIMARY KEY NOT NULL,
            type TEXT NOT NULL,
            name TEXT NOT NULL,
            latitude_deg REAL NOT NULL,
            longitude_deg REAL NOT NULL,
            elevation_ft INTEGER,
            continent TEXT NOT NULL,
            iso_country TEXT NOT NULL,
            iso_region TEXT NOT NULL,
            icao_code TEXT,
            iata_code TEXT,
            home_link TEXT
        )",
    ),
    (
        4,
        "create airlines table",
        "CREATE TABLE IF NOT EXISTS airlines (
            id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            alias TEXT,
            iata TEXT,
            icao TEXT NOT NULL,
            callsign TEXT,
            country TEXT NOT NULL,
            active BOOLEAN NOT NULL
        )",
    ),
    (
        5,
        "index reference lookups",
        "CREATE INDEX IF NOT EXISTS idx_airports_icao ON airports (icao_code);
         CREATE INDEX IF NOT EXISTS idx_airports_iata ON airports (iata_code);
         CREATE INDEX IF NOT EXISTS idx_airlines_icao ON airlines (icao);",
    ),
];

const FLIGHT_SELECT: &str = "SELECT
        f.id, f.dep_airport, f.arr_airport, f.flight_num, f.callsign, f.airline_icao,
        f.duration, f.archived, f.created_at, f.last_edited,
        a.id, a.name, a.model, a.manufacturer, a.icao_code, a.created_at,
        l.id, l.name, l.alias, l.iata, l.icao, l.callsign, l.country, l.active
    FROM flights f
    JOIN aircraft a ON a.id = f.aircraft_id
    LEFT JOIN airlines l ON l.id = (SELECT id FROM airlines WHERE icao = f.airline_icao LIMIT 1)";

const AIRPORT_COLUMNS: &str = "id, type, name, latitude_deg, longitude_deg, elevation_ft, continent, iso_country, iso_region, icao_code, iata_code, home_link";

const AIRLINE_COLUMNS: &str = "id, name, alias, iata, icao, callsign, country, active";

/// Errors from the flight database
#[derive(Debug, Error)]
pub enum DbError {
    /// The database directory could not be created
    #[error("Failed to create database directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite reported an error
    #[error("Database operation '{operation}' failed: {source}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A lookup that should be unique matched several rows
    #[error("Found more than one {kind} with code '{code}'")]
    Ambiguous { kind: &'static str, code: String },

    /// An edit tried to turn one flight into another
    #[error("Flight ids do not match: {original} vs {updated}")]
    IdMismatch { original: i64, updated: i64 },

    /// A flight referenced an aircraft that is not in the database
    #[error("No aircraft with id {0}")]
    UnknownAircraft(i64),
}

/// How to look up an airport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirportCode<'a> {
    Icao(&'a str),
    Iata(&'a str),
}

/// Access to the flight database
#[derive(Debug, Clone)]
pub struct FlightLog {
    path: PathBuf,
}

impl FlightLog {
    /// Opens the database at `path`, creating and migrating it as needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let log = Self { path: path.into() };
        log.with_connection("migrate", migrate)?;
        Ok(log)
    }

    /// Opens `flylist.db` inside `dir`, creating the directory if needed
    pub fn in_dir(dir: &Path) -> Result<Self, DbError> {
        fs::create_dir_all(dir).map_err(|source| DbError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Self::open(dir.join(DATABASE_FILE))
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a connection, runs `operation` and closes it again
    fn with_connection<T>(
        &self,
        name: &'static str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DbError> {
        let wrap = |source| DbError::Sqlite {
            operation: name,
            source,
        };
        let mut conn = Connection::open(&self.path).map_err(wrap)?;
        let result = operation(&mut conn).map_err(wrap)?;
        conn.close().map_err(|(_, source)| wrap(source))?;
        Ok(result)
    }

    // Flights

    /// Logs a new flight, returning its id
    ///
    /// Fails with `DbError::UnknownAircraft` when `aircraft_id` does not exist.
    pub fn create_flight(&self, flight: &NewFlight) -> Result<i64, DbError> {
        let created = self.with_connection("create flight", |conn| {
            let tx = conn.transaction()?;
            if !aircraft_exists(&tx, flight.aircraft_id)? {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO flights (dep_airport, arr_airport, flight_num, callsign, aircraft_id, duration, airline_icao)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    flight.route.dep_airport,
                    flight.route.arr_airport,
                    flight.flight_number,
                    flight.callsign,
                    flight.aircraft_id,
                    flight.duration,
                    flight.airline_icao,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(Some(id))
        })?;

        created.ok_or(DbError::UnknownAircraft(flight.aircraft_id))
    }

    /// All flights with their aircraft and, when known, airline
    pub fn flights(&self) -> Result<Vec<Flight>, DbError> {
        self.with_connection("read flights", |conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY f.id", FLIGHT_SELECT))?;
            let flights = stmt.query_map([], flight_from_row)?.collect();
            flights
        })
    }

    /// A single flight by id
    pub fn flight(&self, id: i64) -> Result<Option<Flight>, DbError> {
        self.with_connection("read flight", |conn| {
            conn.query_row(&format!("{} WHERE f.id = ?1", FLIGHT_SELECT), [id], flight_from_row)
                .optional()
        })
    }

    /// Deletes a flight, returning whether it existed
    pub fn delete_flight(&self, id: i64) -> Result<bool, DbError> {
        self.with_connection("delete flight", |conn| {
            Ok(conn.execute("DELETE FROM flights WHERE id = ?1", [id])? > 0)
        })
    }

    /// Flips a flight between archived and active, returning whether it existed
    pub fn toggle_archive_flight(&self, id: i64) -> Result<bool, DbError> {
        self.with_connection("toggle archive", |conn| {
            Ok(conn.execute(
                "UPDATE flights SET archived = CASE archived WHEN 1 THEN 0 ELSE 1 END WHERE id = ?1",
                [id],
            )? > 0)
        })
    }

    /// Writes the columns that differ between `original` and `updated`
    ///
    /// # Returns
    /// * `Ok(true)` - at least one column changed
    /// * `Ok(false)` - nothing differed, no write happened
    /// * `Err(DbError::IdMismatch)` - the two flights are not the same record
    /// * `Err(DbError::UnknownAircraft)` - `updated` moves the flight to a missing aircraft
    pub fn edit_flight(&self, original: &Flight, updated: &Flight) -> Result<bool, DbError> {
        if original.id != updated.id {
            return Err(DbError::IdMismatch {
                original: original.id,
                updated: updated.id,
            });
        }

        let changes = changed_columns(original, updated);
        if changes.is_empty() {
            return Ok(false);
        }

        let assignments: Vec<String> = changes
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE flights SET {}, last_edited = CURRENT_TIMESTAMP WHERE id = ?{}",
            assignments.join(", "),
            changes.len() + 1
        );
        let values: Vec<Value> = changes
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Integer(original.id)))
            .collect();

        let aircraft_id = updated.aircraft.id;
        let check_aircraft = original.aircraft.id != aircraft_id;

        let edited = self.with_connection("edit flight", |conn| {
            let tx = conn.transaction()?;
            if check_aircraft && !aircraft_exists(&tx, aircraft_id)? {
                return Ok(false);
            }
            tx.execute(&sql, params_from_iter(values))?;
            tx.commit()?;
            Ok(true)
        })?;

        if !edited {
            return Err(DbError::UnknownAircraft(aircraft_id));
        }
        Ok(true)
    }

    // Aircraft

    /// Adds an aircraft, returning its id
    ///
    /// Returns `Ok(None)` without writing when any field is blank.
    pub fn create_aircraft(&self, aircraft: &NewAircraft) -> Result<Option<i64>, DbError> {
        if !aircraft.is_complete() {
            return Ok(None);
        }

        self.with_connection("create aircraft", |conn| {
            conn.execute(
                "INSERT INTO aircraft (name, model, manufacturer, icao_code) VALUES (?1, ?2, ?3, ?4)",
                params![aircraft.name, aircraft.model, aircraft.manufacturer, aircraft.icao_code],
            )?;
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    /// All aircraft
    pub fn aircraft(&self) -> Result<Vec<Aircraft>, DbError> {
        self.with_connection("read aircraft", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, model, manufacturer, icao_code, created_at FROM aircraft ORDER BY id",
            )?;
            let aircraft = stmt.query_map([], |row| aircraft_from_row(row, 0))?.collect();
            aircraft
        })
    }

    /// Deletes an aircraft together with every flight flown on it
    pub fn delete_aircraft(&self, id: i64) -> Result<bool, DbError> {
        self.with_connection("delete aircraft", |conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM aircraft WHERE id = ?1", [id])?;
            let flights = tx.execute("DELETE FROM flights WHERE aircraft_id = ?1", [id])?;
            tx.commit()?;
            debug!(aircraft = id, flights, "deleted aircraft");
            Ok(deleted > 0)
        })
    }

    // Airports

    /// Inserts a batch of airports
    pub fn create_airports(&self, airports: &[Airport]) -> Result<usize, DbError> {
        self.with_connection("insert airports", |conn| {
            let tx = conn.transaction()?;
            let rows = airports.iter().map(|a| {
                vec![
                    Value::Integer(a.id),
                    Value::Text(a.kind.as_str().to_string()),
                    Value::Text(a.name.clone()),
                    Value::Real(a.latitude_deg),
                    Value::Real(a.longitude_deg),
                    a.elevation_ft.map_or(Value::Null, Value::Integer),
                    Value::Text(a.continent.clone()),
                    Value::Text(a.iso_country.clone()),
                    Value::Text(a.iso_region.clone()),
                    optional_text(&a.icao_code),
                    optional_text(&a.iata_code),
                    optional_text(&a.home_link),
                ]
            });
            let inserted = insert_batches(&tx, "airports", AIRPORT_COLUMNS, rows)?;
            tx.commit()?;
            Ok(inserted)
        })
        .inspect(|count| info!(count, "inserted airports"))
    }

    /// Looks up an airport by ICAO or IATA code
    pub fn airport(&self, code: AirportCode<'_>) -> Result<Option<Airport>, DbError> {
        let (column, value) = match code {
            AirportCode::Icao(icao) => ("icao_code", icao),
            AirportCode::Iata(iata) => ("iata_code", iata),
        };

        let mut found = self.with_connection("read airport", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM airports WHERE {} = ?1",
                AIRPORT_COLUMNS, column
            ))?;
            let airports = stmt.query_map([value], airport_from_row)?.collect::<rusqlite::Result<Vec<_>>>();
            airports
        })?;

        unique(&mut found, "airport", value)
    }

    /// Number of airports stored
    pub fn airport_count(&self) -> Result<usize, DbError> {
        self.with_connection("count airports", |conn| {
            conn.query_row("SELECT COUNT(*) FROM airports", [], |row| row.get(0))
        })
    }

    // Airlines

    /// Inserts a batch of airlines
    pub fn create_airlines(&self, airlines: &[Airline]) -> Result<usize, DbError> {
        self.with_connection("insert airlines", |conn| {
            let tx = conn.transaction()?;
            let rows = airlines.iter().map(|a| {
                vec![
                    Value::Integer(a.id),
                    Value::Text(a.name.clone()),
                    optional_text(&a.alias),
                    optional_text(&a.iata),
                    Value::Text(a.icao.clone()),
                    optional_text(&a.callsign),
                    Value::Text(a.country.clone()),
                    Value::Integer(i64::from(a.active)),
                ]
            });
            let inserted = insert_batches(&tx, "airlines", AIRLINE_COLUMNS, rows)?;
            tx.commit()?;
            Ok(inserted)
        })
        .inspect(|count| info!(count, "inserted airlines"))
    }

    /// Looks up an airline by ICAO code
    pub fn airline(&self, icao: &str) -> Result<Option<Airline>, DbError> {
        let mut found = self.with_connection("read airline", |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM airlines WHERE icao = ?1", AIRLINE_COLUMNS))?;
            let airlines = stmt
                .query_map([icao], |row| airline_from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>();
            airlines
        })?;

        unique(&mut found, "airline", icao)
    }

    /// Number of airlines stored
    pub fn airline_count(&self) -> Result<usize, DbError> {
        self.with_connection("count airlines", |conn| {
            conn.query_row("SELECT COUNT(*) FROM airlines", [], |row| row.get(0))
        })
    }
}

fn migrate(conn: &mut Connection) -> rusqlite::Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (version, description, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        debug!(version, description, "applied migration");
    }

    Ok(())
}

/// Inserts `rows` in multi-row statements of up to `BATCH_SIZE` rows
fn insert_batches(
    tx: &Transaction<'_>,
    table: &str,
    columns: &str,
    rows: impl Iterator<Item = Vec<Value>>,
) -> rusqlite::Result<usize> {
    let rows: Vec<Vec<Value>> = rows.collect();
    let mut inserted = 0;

    for chunk in rows.chunks(BATCH_SIZE) {
        let width = chunk[0].len();
        let placeholders: Vec<String> = (0..chunk.len())
            .map(|r| {
                let cells: Vec<String> = (1..=width).map(|c| format!("?{}", r * width + c)).collect();
                format!("({})", cells.join(", "))
            })
            .collect();
        let sql = format!("INSERT INTO {} ({}) VALUES {}", table, columns, placeholders.join(", "));

        inserted += tx.execute(&sql, params_from_iter(chunk.iter().flatten()))?;
    }

    Ok(inserted)
}

fn aircraft_exists(tx: &Transaction<'_>, id: i64) -> rusqlite::Result<bool> {
    tx.query_row("SELECT 1 FROM aircraft WHERE id = ?1", [id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

fn unique<T>(found: &mut Vec<T>, kind: &'static str, code: &str) -> Result<Option<T>, DbError> {
    if found.len() > 1 {
        return Err(DbError::Ambiguous {
            kind,
            code: code.to_string(),
        });
    }
    Ok(found.pop())
}

fn optional_text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

fn changed_columns(original: &Flight, updated: &Flight) -> Vec<(&'static str, Value)> {
    let mut changes = Vec::new();
    let mut text = |column: &'static str, old: &String, new: &String| {
        if old != new {
            changes.push((column, Value::Text(new.clone())));
        }
    };

    text("dep_airport", &original.route.dep_airport, &updated.route.dep_airport);
    text("arr_airport", &original.route.arr_airport, &updated.route.arr_airport);
    text("flight_num", &original.company.flight_number, &updated.company.flight_number);
    text("callsign", &original.company.callsign, &updated.company.callsign);
    text("airline_icao", &original.company.airline_icao, &updated.company.airline_icao);

    if original.aircraft.id != updated.aircraft.id {
        changes.push(("aircraft_id", Value::Integer(updated.aircraft.id)));
    }
    if original.duration != updated.duration {
        changes.push(("duration", Value::Integer(i64::from(updated.duration))));
    }
    if original.archived != updated.archived {
        changes.push(("archived", Value::Integer(i64::from(updated.archived))));
    }

    changes
}

fn aircraft_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Aircraft> {
    Ok(Aircraft {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        model: row.get(offset + 2)?,
        manufacturer: row.get(offset + 3)?,
        icao_code: row.get(offset + 4)?,
        created_at: row
            .get::<_, Option<NaiveDateTime>>(offset + 5)?
            .map(|dt| dt.and_utc()),
    })
}

fn airline_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Airline> {
    Ok(Airline {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        alias: row.get(offset + 2)?,
        iata: row.get(offset + 3)?,
        icao: row.get(offset + 4)?,
        callsign: row.get(offset + 5)?,
        country: row.get(offset + 6)?,
        active: row.get::<_, i64>(offset + 7)? != 0,
    })
}

fn airport_from_row(row: &Row<'_>) -> rusqlite::Result<Airport> {
    let kind: String = row.get(1)?;
    Ok(Airport {
        id: row.get(0)?,
        kind: kind
            .parse::<AirportType>()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?,
        name: row.get(2)?,
        latitude_deg: row.get(3)?,
        longitude_deg: row.get(4)?,
        elevation_ft: row.get(5)?,
        continent: row.get(6)?,
        iso_country: row.get(7)?,
        iso_region: row.get(8)?,
        icao_code: row.get(9)?,
        iata_code: row.get(10)?,
        home_link: row.get(11)?,
    })
}

fn flight_from_row(row: &Row<'_>) -> rusqlite::Result<Flight> {
    let airline = match row.get::<_, Option<i64>>(16)? {
        Some(_) => Some(airline_from_row(row, 16)?),
        None => None,
    };

    Ok(Flight {
        id: row.get(0)?,
        route: FlightRoute {
            dep_airport: row.get(1)?,
            arr_airport: row.get(2)?,
        },
        company: FlightCompany {
            flight_number: row.get(3)?,
            callsign: row.get(4)?,
            airline_icao: row.get(5)?,
            airline,
        },
        duration: row.get(6)?,
        archived: row.get::<_, i64>(7)? != 0,
        created_at: row.get::<_, NaiveDateTime>(8)?.and_utc(),
        last_edited: row.get::<_, NaiveDateTime>(9)?.and_utc(),
        aircraft: aircraft_from_row(row, 10)?,
    })
}
