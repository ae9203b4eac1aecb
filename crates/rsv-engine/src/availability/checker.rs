//! Availability checker

use std::sync::Arc;
use std::time::Duration;

use rsv_core::TimeInterval;
use serde::Serialize;
use tracing::debug;

use super::{AvailabilitySource, ConflictingReservation};
use crate::{EngineError, Result};

/// Default per-check timeout
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a single availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_detail: Option<String>,
    /// Blocking reservations that overlap the checked interval
    pub conflicts: Vec<ConflictingReservation>,
}

impl Availability {
    fn free() -> Self {
        Self {
            available: true,
            conflict_detail: None,
            conflicts: Vec::new(),
        }
    }
}

/// Checks one interval against a source, with a bounded timeout.
///
/// Only reservations in a blocking status (pending or approved) that really
/// intersect the interval count as conflicts, whatever the source returns.
#[derive(Clone)]
pub struct AvailabilityChecker {
    source: Arc<dyn AvailabilitySource>,
    timeout: Duration,
}

impl AvailabilityChecker {
    pub fn new(source: Arc<dyn AvailabilitySource>) -> Self {
        Self {
            source,
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Check `scenario_id` during `interval`.
    ///
    /// Source failures and timeouts come back as
    /// [`EngineError::AvailabilityCheck`] / [`EngineError::Timeout`].
    pub async fn check(&self, scenario_id: i64, interval: TimeInterval) -> Result<Availability> {
        let date = interval.start.date();

        let report = match tokio::time::timeout(
            self.timeout,
            self.source.check_availability(scenario_id, &interval),
        )
        .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                return Err(EngineError::AvailabilityCheck {
                    date,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(EngineError::Timeout {
                    date,
                    after: self.timeout,
                });
            }
        };

        let reported = report.conflicting_reservations.len();
        let conflicts: Vec<ConflictingReservation> = report
            .conflicting_reservations
            .into_iter()
            .filter(|r| r.status.is_blocking() && r.interval().overlaps(&interval))
            .collect();

        debug!(
            scenario_id,
            interval = %interval,
            source = self.source.name(),
            reported,
            blocking = conflicts.len(),
            "Availability checked"
        );

        if !conflicts.is_empty() {
            let detail = conflicts
                .iter()
                .map(|r| format!("reservation #{} ({}, {})", r.id, r.status, r.interval()))
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(Availability {
                available: false,
                conflict_detail: Some(format!("overlaps {}", detail)),
                conflicts,
            });
        }

        // unavailable for a reason other than a listed reservation
        if !report.available && reported == 0 {
            return Ok(Availability {
                available: false,
                conflict_detail: Some("scenario reported unavailable".to_string()),
                conflicts,
            });
        }

        Ok(Availability::free())
    }
}
