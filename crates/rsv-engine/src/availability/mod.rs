//! Availability checking
//!
//! An [`AvailabilitySource`] answers "is this scenario free in this
//! interval?" for one candidate; the [`AvailabilityChecker`] wraps a source
//! with a timeout and the blocking-status rules.

mod checker;
mod http;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rsv_core::{Reservation, ReservationStatus, TimeInterval};
use serde::{Deserialize, Serialize};

use crate::Result;

pub use checker::{Availability, AvailabilityChecker};
pub use http::HttpAvailabilitySource;

/// An existing reservation reported by an availability source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingReservation {
    pub id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: ReservationStatus,
}

impl ConflictingReservation {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_at, self.end_at)
    }
}

impl From<&Reservation> for ConflictingReservation {
    fn from(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id,
            start_at: reservation.start_at,
            end_at: reservation.end_at,
            status: reservation.status,
        }
    }
}

/// Answer of an availability source for one interval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub available: bool,
    #[serde(default)]
    pub conflicting_reservations: Vec<ConflictingReservation>,
}

/// Source of existing bookings for a scenario
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Report whether `scenario_id` is free during `interval`
    async fn check_availability(&self, scenario_id: i64, interval: &TimeInterval) -> Result<AvailabilityReport>;
}
