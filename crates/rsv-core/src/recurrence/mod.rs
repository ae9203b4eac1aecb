//! Recurrence patterns
//!
//! Request types, validation and the calendar enumerator that expands a
//! pattern into concrete dates.

mod enumerator;
mod types;

pub use enumerator::{enumerate, enumerate_bounded, Enumeration, RecurrenceDates};
pub use types::{
    iso_weekday, weekday_from_iso, RecurrencePattern, RecurrenceSpec, DEFAULT_MAX_OCCURRENCES,
    MAX_OCCURRENCES_LIMIT, MAX_REPEAT_INTERVAL,
};
