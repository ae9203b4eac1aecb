//! Reservation type definitions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::occurrence::TimeInterval;
use crate::{Error, Result};

/// Reservation workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ReservationStatus {
    /// Whether a reservation in this status occupies its scenario
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(Error::Config(format!("unknown reservation status '{}'", other))),
        }
    }
}

/// A stored reservation of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i64,
    pub scenario_id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: ReservationStatus,
    /// Series that generated this reservation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_at, self.end_at)
    }
}

/// Insert payload for a single reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub scenario_id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    #[serde(default)]
    pub status: ReservationStatus,
}

impl NewReservation {
    pub fn new(scenario_id: i64, interval: TimeInterval, status: ReservationStatus) -> Self {
        Self {
            scenario_id,
            start_at: interval.start,
            end_at: interval.end,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_statuses() {
        assert!(ReservationStatus::Pending.is_blocking());
        assert!(ReservationStatus::Approved.is_blocking());
        assert!(!ReservationStatus::Rejected.is_blocking());
        assert!(!ReservationStatus::Cancelled.is_blocking());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Approved".parse::<ReservationStatus>().unwrap(), ReservationStatus::Approved);
        assert_eq!("canceled".parse::<ReservationStatus>().unwrap(), ReservationStatus::Cancelled);
        assert!("done".parse::<ReservationStatus>().is_err());
    }
}
