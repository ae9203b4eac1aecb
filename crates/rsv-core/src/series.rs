//! Recurring reservation series and their lifecycle state

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceSpec;

/// Lifecycle state of a series.
///
/// `Active` and `Inactive` are switched by the caller; `Exhausted` is
/// terminal and reached automatically once the cap or the end date is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesState {
    Active,
    Inactive,
    Exhausted,
}

/// Persisted configuration plus running state of a recurring reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringReservationSeries {
    pub id: i64,
    #[serde(flatten)]
    pub spec: RecurrenceSpec,
    pub active: bool,
    /// Never decreases and never exceeds `spec.max_occurrences`
    pub occurrences_generated: u32,
    /// Preview this series was committed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RecurringReservationSeries {
    pub fn is_exhausted(&self, today: NaiveDate) -> bool {
        self.occurrences_generated >= self.spec.max_occurrences || today > self.spec.end_date
    }

    pub fn state(&self, today: NaiveDate) -> SeriesState {
        if self.is_exhausted(today) {
            SeriesState::Exhausted
        } else if self.active {
            SeriesState::Active
        } else {
            SeriesState::Inactive
        }
    }

    pub fn can_generate_more(&self, today: NaiveDate) -> bool {
        self.state(today) == SeriesState::Active
    }

    /// Slots left before the cap is reached
    pub fn remaining(&self) -> u32 {
        self.spec.max_occurrences.saturating_sub(self.occurrences_generated)
    }
}

/// A series together with its derived state, as returned to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesView {
    #[serde(flatten)]
    pub series: RecurringReservationSeries,
    pub state: SeriesState,
    pub can_generate_more: bool,
}

impl SeriesView {
    pub fn new(series: RecurringReservationSeries, today: NaiveDate) -> Self {
        let state = series.state(today);
        Self {
            can_generate_more: state == SeriesState::Active,
            state,
            series,
        }
    }
}
