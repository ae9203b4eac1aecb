//! Reservation persistence
//!
//! SQLite-backed storage for single reservations, recurring series and the
//! record of which series dates have already been materialised.

mod store;
mod types;

pub use store::{BookingStore, OccurrenceOutcome, ReservationInsert};
pub use types::{NewReservation, Reservation, ReservationStatus};
