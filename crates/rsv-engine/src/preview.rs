//! Preview assembler
//!
//! Runs the enumerator, checks every candidate against the availability
//! source in fixed-size windows and reports conflicts and warnings without
//! writing anything.
//!
//! Each call owns its result buffer: overlapping previews (a user editing
//! the form while an older request is still in flight) never share state,
//! and a superseded preview can simply be dropped.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use rsv_core::recurrence::enumerate_bounded;
use rsv_core::{CandidateOccurrence, Enumeration, PreviewConfig, RecurrencePattern, RecurrenceSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::availability::AvailabilityChecker;
use crate::Result;

/// Checks in flight at once, one week of daily slots
pub const DEFAULT_WINDOW_SIZE: usize = 7;
/// Pause between two windows
pub const DEFAULT_WINDOW_PAUSE: Duration = Duration::from_millis(200);

/// Dry-run result of a recurring reservation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    /// Idempotency key for the commit step
    pub preview_id: String,
    pub pattern: RecurrencePattern,
    pub pattern_description: String,
    /// The request this preview was computed from
    pub spec: RecurrenceSpec,
    /// Occurrences that would be created (those without conflict)
    pub total_to_generate: usize,
    /// In enumeration order
    pub occurrences: Vec<CandidateOccurrence>,
    pub conflicts: Vec<String>,
    pub warnings: Vec<String>,
    /// The `maxOccurrences` cap cut the series short
    pub truncated: bool,
    /// Checks that failed or timed out (counted as conflicts)
    pub check_failures: usize,
    pub generated_at: DateTime<Utc>,
}

impl PreviewResult {
    /// Occurrences that a commit would turn into reservations
    pub fn committable(&self) -> impl Iterator<Item = &CandidateOccurrence> {
        self.occurrences.iter().filter(|o| !o.has_conflict)
    }
}

/// Orchestrates enumeration and windowed availability checks
pub struct PreviewAssembler {
    checker: AvailabilityChecker,
    window_size: usize,
    window_pause: Duration,
}

impl PreviewAssembler {
    pub fn new(checker: AvailabilityChecker) -> Self {
        Self {
            checker,
            window_size: DEFAULT_WINDOW_SIZE,
            window_pause: DEFAULT_WINDOW_PAUSE,
        }
    }

    /// Build from configuration; the checker gets the configured timeout
    pub fn from_config(checker: AvailabilityChecker, config: &PreviewConfig) -> Self {
        Self::new(checker.with_timeout(config.check_timeout())).with_window(config.window_size, config.window_pause())
    }

    pub fn with_window(mut self, size: usize, pause: Duration) -> Self {
        self.window_size = size.max(1);
        self.window_pause = pause;
        self
    }

    pub fn checker(&self) -> &AvailabilityChecker {
        &self.checker
    }

    /// Validate `spec` against `today`, enumerate it and check every candidate.
    ///
    /// Validation errors abort before any check runs. A failed or timed-out
    /// check never aborts the preview: the occurrence is marked conflicting
    /// and the next window proceeds.
    pub async fn preview(&self, spec: &RecurrenceSpec, today: NaiveDate) -> Result<PreviewResult> {
        spec.validate(today)?;

        let Enumeration {
            mut occurrences,
            truncated,
        } = enumerate_bounded(spec);

        let windows = occurrences.len().div_ceil(self.window_size);
        info!(
            scenario_id = spec.scenario_id,
            pattern = %spec.pattern,
            candidates = occurrences.len(),
            windows,
            "Building preview"
        );

        let mut check_failures = 0;
        for (index, window) in occurrences.chunks_mut(self.window_size).enumerate() {
            if index > 0 && !self.window_pause.is_zero() {
                tokio::time::sleep(self.window_pause).await;
            }

            let checks = window
                .iter()
                .map(|occ| self.checker.check(spec.scenario_id, occ.interval()));
            let results = join_all(checks).await;

            // join_all keeps input order, so results line up with the window
            for (occ, result) in window.iter_mut().zip(results) {
                match result {
                    Ok(availability) if availability.available => {}
                    Ok(availability) => {
                        occ.mark_conflict(
                            availability
                                .conflict_detail
                                .unwrap_or_else(|| "not available".to_string()),
                        );
                    }
                    Err(e) => {
                        warn!(scenario_id = spec.scenario_id, date = %occ.date, "Availability check failed: {}", e);
                        check_failures += 1;
                        occ.mark_conflict(format!("availability unknown ({})", e));
                    }
                }
            }

            debug!(window = index + 1, of = windows, "Window checked");
        }

        let conflicts: Vec<String> = occurrences
            .iter()
            .filter(|o| o.has_conflict)
            .map(|o| {
                format!(
                    "{}: {}",
                    o.interval(),
                    o.conflict_detail.as_deref().unwrap_or("conflict")
                )
            })
            .collect();
        let total_to_generate = occurrences.len() - conflicts.len();

        let mut warnings = Vec::new();
        if truncated {
            warnings.push(format!(
                "Occurrence count truncated to {} by the maxOccurrences cap",
                spec.max_occurrences
            ));
        }
        if check_failures > 0 {
            warnings.push(format!(
                "{} availability check(s) failed or timed out; those dates are treated as unavailable",
                check_failures
            ));
        }
        if occurrences.is_empty() {
            warnings.push(format!(
                "The pattern produces no occurrences between {} and {}",
                spec.start_date, spec.end_date
            ));
        } else if total_to_generate == 0 {
            warnings.push("Every occurrence conflicts with an existing reservation".to_string());
        }

        info!(
            scenario_id = spec.scenario_id,
            total_to_generate,
            conflicts = conflicts.len(),
            check_failures,
            "Preview ready"
        );

        Ok(PreviewResult {
            preview_id: uuid::Uuid::new_v4().to_string(),
            pattern: spec.pattern,
            pattern_description: spec.describe(),
            spec: spec.clone(),
            total_to_generate,
            occurrences,
            conflicts,
            warnings,
            truncated,
            check_failures,
            generated_at: Utc::now(),
        })
    }
}
