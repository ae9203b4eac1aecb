//! SQLite booking store

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::booking::{NewReservation, Reservation, ReservationStatus};
use crate::occurrence::{CandidateOccurrence, TimeInterval};
use crate::recurrence::RecurrenceSpec;
use crate::series::RecurringReservationSeries;
use crate::{Error, FieldError, Result};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const RESERVATION_COLUMNS: &str = "id, scenario_id, start_at, end_at, status, series_id, created_at";
const SERIES_COLUMNS: &str = "id, spec, active, occurrences_generated, preview_id, created_at";

/// Outcome of materialising one series occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceOutcome {
    /// A reservation was inserted and the series counter incremented
    Created(i64),
    /// The date was materialised by an earlier commit
    AlreadyMaterialized,
    /// The series has already generated `max_occurrences` reservations
    CapReached,
}

/// Outcome of inserting a one-off reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationInsert {
    Created(i64),
    /// Blocking reservations that already hold the interval
    Conflict(Vec<Reservation>),
}

/// SQLite-based storage for reservations and recurring series
pub struct BookingStore {
    conn: Connection,
}

impl BookingStore {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening booking database at: {}", db_path);
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        info!("BookingStore initialized successfully");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS recurring_series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scenario_id INTEGER NOT NULL,
                pattern TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                max_occurrences INTEGER NOT NULL,
                spec TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                occurrences_generated INTEGER NOT NULL DEFAULT 0,
                preview_id TEXT UNIQUE,
                created_at TEXT NOT NULL,
                CHECK (occurrences_generated <= max_occurrences)
            );

            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scenario_id INTEGER NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                status TEXT NOT NULL,
                series_id INTEGER REFERENCES recurring_series(id),
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reservations_scenario_time
                ON reservations(scenario_id, start_at, end_at);

            CREATE TABLE IF NOT EXISTS series_occurrences (
                series_id INTEGER NOT NULL REFERENCES recurring_series(id),
                occurrence_date TEXT NOT NULL,
                reservation_id INTEGER NOT NULL REFERENCES reservations(id),
                PRIMARY KEY (series_id, occurrence_date)
            );

            CREATE INDEX IF NOT EXISTS idx_series_scenario ON recurring_series(scenario_id);",
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------

    /// Insert a single reservation and return its id
    pub fn insert_reservation(&self, reservation: &NewReservation) -> Result<i64> {
        if reservation.end_at <= reservation.start_at {
            return Err(Error::Validation(vec![FieldError::new("endAt", "must be after startAt")]));
        }
        self.conn.execute(
            "INSERT INTO reservations (scenario_id, start_at, end_at, status, series_id, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                reservation.scenario_id,
                format_datetime(&reservation.start_at),
                format_datetime(&reservation.end_at),
                reservation.status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(reservation_id = id, scenario_id = reservation.scenario_id, "Inserted reservation");
        Ok(id)
    }

    /// Insert `reservation` unless a blocking reservation already overlaps it.
    ///
    /// The overlap query and the insert share one transaction, so two
    /// overlapping blocking requests can never both be stored. Non-blocking
    /// statuses are always inserted.
    pub fn insert_reservation_if_free(&self, reservation: &NewReservation) -> Result<ReservationInsert> {
        let tx = self.conn.unchecked_transaction()?;

        if reservation.status.is_blocking() && reservation.end_at > reservation.start_at {
            let interval = TimeInterval::new(reservation.start_at, reservation.end_at);
            let blocking: Vec<Reservation> = self
                .find_overlapping(reservation.scenario_id, &interval)?
                .into_iter()
                .filter(|r| r.status.is_blocking())
                .collect();
            if !blocking.is_empty() {
                debug!(
                    scenario_id = reservation.scenario_id,
                    conflicts = blocking.len(),
                    "Reservation refused, interval taken"
                );
                return Ok(ReservationInsert::Conflict(blocking));
            }
        }

        let id = self.insert_reservation(reservation)?;
        tx.commit()?;
        Ok(ReservationInsert::Created(id))
    }

    /// Change the status of a reservation. Returns false if it does not exist.
    pub fn set_reservation_status(&self, id: i64, status: ReservationStatus) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE reservations SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(affected > 0)
    }

    pub fn get_reservation(&self, id: i64) -> Result<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations WHERE id = ?1", RESERVATION_COLUMNS);
        let reservation = self
            .conn
            .query_row(&sql, params![id], reservation_from_row)
            .optional()?;
        Ok(reservation)
    }

    /// Reservations of `scenario_id` whose interval intersects `interval`,
    /// whatever their status, ordered by start time
    pub fn find_overlapping(&self, scenario_id: i64, interval: &TimeInterval) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations
             WHERE scenario_id = ?1 AND start_at < ?2 AND end_at > ?3
             ORDER BY start_at, id",
            RESERVATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                scenario_id,
                format_datetime(&interval.end),
                format_datetime(&interval.start)
            ],
            reservation_from_row,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Reservations generated by a series, in date order
    pub fn series_reservations(&self, series_id: i64) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE series_id = ?1 ORDER BY start_at, id",
            RESERVATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![series_id], reservation_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Series
    // ------------------------------------------------------------------

    /// Persist a new, active series with a zero counter.
    ///
    /// `preview_id` is unique: when a series was already recorded for it, that
    /// series' id is returned and nothing is inserted.
    pub fn create_series(&self, spec: &RecurrenceSpec, preview_id: Option<&str>) -> Result<i64> {
        let spec_json = serde_json::to_string(spec)?;
        let inserted = self.conn.execute(
            "INSERT INTO recurring_series
                (scenario_id, pattern, start_date, end_date, max_occurrences, spec,
                 active, occurrences_generated, preview_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, ?7, ?8)
             ON CONFLICT(preview_id) DO NOTHING",
            params![
                spec.scenario_id,
                spec.pattern.as_str(),
                spec.start_date.format(DATE_FORMAT).to_string(),
                spec.end_date.format(DATE_FORMAT).to_string(),
                spec.max_occurrences,
                spec_json,
                preview_id,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            let id: i64 = self.conn.query_row(
                "SELECT id FROM recurring_series WHERE preview_id = ?1",
                params![preview_id],
                |row| row.get(0),
            )?;
            debug!(series_id = id, ?preview_id, "Series already recorded for preview");
            return Ok(id);
        }

        let id = self.conn.last_insert_rowid();
        info!(series_id = id, scenario_id = spec.scenario_id, pattern = %spec.pattern, "Created recurring series");
        Ok(id)
    }

    pub fn get_series(&self, id: i64) -> Result<Option<RecurringReservationSeries>> {
        let sql = format!("SELECT {} FROM recurring_series WHERE id = ?1", SERIES_COLUMNS);
        let series = self.conn.query_row(&sql, params![id], series_from_row).optional()?;
        Ok(series)
    }

    /// Series previously committed from the given preview
    pub fn find_series_by_preview(&self, preview_id: &str) -> Result<Option<RecurringReservationSeries>> {
        let sql = format!("SELECT {} FROM recurring_series WHERE preview_id = ?1", SERIES_COLUMNS);
        let series = self
            .conn
            .query_row(&sql, params![preview_id], series_from_row)
            .optional()?;
        Ok(series)
    }

    pub fn list_series_for_scenario(&self, scenario_id: i64) -> Result<Vec<RecurringReservationSeries>> {
        let sql = format!(
            "SELECT {} FROM recurring_series WHERE scenario_id = ?1 ORDER BY id",
            SERIES_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![scenario_id], series_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn set_series_active(&self, id: i64, active: bool) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE recurring_series SET active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if affected == 0 {
            return Err(Error::SeriesNotFound(id));
        }
        debug!(series_id = id, active, "Updated series active flag");
        Ok(())
    }

    /// Create the reservation for one occurrence of a series.
    ///
    /// The cap check, the reservation insert, the materialisation record and
    /// the counter increment happen in one transaction, so the counter can
    /// never exceed `max_occurrences` and a date is never materialised twice.
    pub fn materialize_occurrence(
        &self,
        series_id: i64,
        occurrence: &CandidateOccurrence,
        status: ReservationStatus,
    ) -> Result<OccurrenceOutcome> {
        let tx = self.conn.unchecked_transaction()?;

        let counters: Option<(i64, u32, u32)> = tx
            .query_row(
                "SELECT scenario_id, occurrences_generated, max_occurrences
                 FROM recurring_series WHERE id = ?1",
                params![series_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((scenario_id, generated, max)) = counters else {
            return Err(Error::SeriesNotFound(series_id));
        };

        let date = occurrence.date.format(DATE_FORMAT).to_string();
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM series_occurrences WHERE series_id = ?1 AND occurrence_date = ?2)",
            params![series_id, date],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(OccurrenceOutcome::AlreadyMaterialized);
        }
        if generated >= max {
            return Ok(OccurrenceOutcome::CapReached);
        }

        tx.execute(
            "INSERT INTO reservations (scenario_id, start_at, end_at, status, series_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                scenario_id,
                format_datetime(&occurrence.start_at),
                format_datetime(&occurrence.end_at),
                status.as_str(),
                series_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let reservation_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO series_occurrences (series_id, occurrence_date, reservation_id) VALUES (?1, ?2, ?3)",
            params![series_id, date, reservation_id],
        )?;
        tx.execute(
            "UPDATE recurring_series SET occurrences_generated = occurrences_generated + 1 WHERE id = ?1",
            params![series_id],
        )?;
        tx.commit()?;

        debug!(series_id, reservation_id, date = %occurrence.date, "Materialized occurrence");
        Ok(OccurrenceOutcome::Created(reservation_id))
    }
}

fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(Error::Corrupt(message)))
}

fn parse_datetime(value: &str, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|e| conversion_error(idx, format!("bad datetime '{}': {}", value, e)))
}

fn parse_timestamp(value: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", value, e)))
}

fn reservation_from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    let start_at: String = row.get(2)?;
    let end_at: String = row.get(3)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(Reservation {
        id: row.get(0)?,
        scenario_id: row.get(1)?,
        start_at: parse_datetime(&start_at, 2)?,
        end_at: parse_datetime(&end_at, 3)?,
        status: status
            .parse()
            .map_err(|_| conversion_error(4, format!("bad status '{}'", status)))?,
        series_id: row.get(5)?,
        created_at: parse_timestamp(&created_at, 6)?,
    })
}

fn series_from_row(row: &Row<'_>) -> rusqlite::Result<RecurringReservationSeries> {
    let spec_json: String = row.get(1)?;
    let spec: RecurrenceSpec = serde_json::from_str(&spec_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let created_at: String = row.get(5)?;

    Ok(RecurringReservationSeries {
        id: row.get(0)?,
        spec,
        active: row.get(2)?,
        occurrences_generated: row.get(3)?,
        preview_id: row.get(4)?,
        created_at: parse_timestamp(&created_at, 5)?,
    })
}
