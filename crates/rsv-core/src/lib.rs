//! rsv-core: recurring reservation core library
//!
//! 定期予約のドメイン型、カレンダー展開、予約ストア、設定を提供します。
//!
//! - [`recurrence`]: recurrence requests, validation and the calendar enumerator
//! - [`occurrence`]: candidate occurrences and interval overlap
//! - [`series`]: persisted series and their lifecycle state
//! - [`booking`]: SQLite reservation / series store

pub mod booking;
pub mod config;
pub mod error;
pub mod occurrence;
pub mod recurrence;
pub mod series;

pub use booking::{
    BookingStore, NewReservation, OccurrenceOutcome, Reservation, ReservationInsert, ReservationStatus,
};
pub use config::{
    ApiConfig, AvailabilityBackend, AvailabilityConfig, CommitConfig, Config, DatabaseConfig, PreviewConfig,
};
pub use error::{Error, FieldError, Result};
pub use occurrence::{CandidateOccurrence, TimeInterval};
pub use recurrence::{enumerate, enumerate_bounded, Enumeration, RecurrencePattern, RecurrenceSpec};
pub use series::{RecurringReservationSeries, SeriesState, SeriesView};
