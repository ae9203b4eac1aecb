//! Commit executor
//!
//! Turns an approved preview into a persisted series plus one reservation
//! per non-conflicting occurrence.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rsv_core::recurrence::enumerate;
use rsv_core::{
    CandidateOccurrence, CommitConfig, OccurrenceOutcome, PreviewConfig, RecurrenceSpec, RecurringReservationSeries, ReservationStatus,
    SeriesState,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::availability::AvailabilityChecker;
use crate::preview::PreviewResult;
use crate::{EngineError, Result};

/// Default maximum age of a preview that can still be committed
pub const DEFAULT_PREVIEW_TTL: Duration = Duration::from_secs(15 * 60);

/// Persistence contract needed by the commit executor
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// Store a new active series and return its id. A series already stored
    /// for `preview_id` is returned as is.
    async fn persist_series(&self, spec: &RecurrenceSpec, preview_id: &str) -> Result<i64>;

    async fn find_series(&self, series_id: i64) -> Result<Option<RecurringReservationSeries>>;

    async fn find_series_by_preview(&self, preview_id: &str) -> Result<Option<RecurringReservationSeries>>;

    /// Atomically insert the reservation for `occurrence` and increment the
    /// series counter, refusing once the cap is reached
    async fn persist_occurrence(
        &self,
        series_id: i64,
        occurrence: &CandidateOccurrence,
        status: ReservationStatus,
    ) -> Result<OccurrenceOutcome>;
}

/// Outcome of a commit. Partial results are not errors: compare
/// `occurrences_created` with the preview's `total_to_generate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub series_id: i64,
    pub occurrences_created: usize,
    /// Dates already materialised by an earlier commit of this series
    pub already_materialized: usize,
    /// Occurrences the preview marked as conflicting
    pub skipped_conflicts: usize,
    /// Occurrences found conflicting by the optional final re-check
    pub conflicts_at_commit: usize,
    /// The series hit `maxOccurrences` before every occurrence was created
    pub cap_reached: bool,
}

/// Persists approved previews
pub struct CommitExecutor {
    repository: Arc<dyn SeriesRepository>,
    recheck: Option<AvailabilityChecker>,
    initial_status: ReservationStatus,
    preview_ttl: Duration,
}

impl CommitExecutor {
    pub fn new(repository: Arc<dyn SeriesRepository>) -> Self {
        Self {
            repository,
            recheck: None,
            initial_status: ReservationStatus::Pending,
            preview_ttl: DEFAULT_PREVIEW_TTL,
        }
    }

    /// Build from configuration. `checker` is only kept when the final
    /// re-check is enabled.
    pub fn from_config(
        repository: Arc<dyn SeriesRepository>,
        checker: AvailabilityChecker,
        commit: &CommitConfig,
        preview: &PreviewConfig,
    ) -> Self {
        let executor = Self::new(repository)
            .with_initial_status(commit.initial_status)
            .with_preview_ttl(preview.preview_ttl());
        if commit.recheck_availability {
            executor.with_recheck(checker)
        } else {
            executor
        }
    }

    /// Re-check every occurrence right before inserting it.
    ///
    /// Off by default: without it the commit trusts the preview, which
    /// leaves a window for concurrent bookings between preview and commit.
    pub fn with_recheck(mut self, checker: AvailabilityChecker) -> Self {
        self.recheck = Some(checker);
        self
    }

    pub fn with_initial_status(mut self, status: ReservationStatus) -> Self {
        self.initial_status = status;
        self
    }

    pub fn with_preview_ttl(mut self, ttl: Duration) -> Self {
        self.preview_ttl = ttl;
        self
    }

    /// Reject previews that no longer describe `spec`
    fn ensure_fresh(&self, spec: &RecurrenceSpec, preview: &PreviewResult) -> Result<()> {
        if !spec.materially_eq(&preview.spec) {
            return Err(EngineError::StalePreview(
                "the request changed after the preview was generated".to_string(),
            ));
        }

        let age = Utc::now().signed_duration_since(preview.generated_at);
        let Ok(age) = age.to_std() else {
            return Err(EngineError::StalePreview(
                "preview claims to be generated in the future".to_string(),
            ));
        };
        if age > self.preview_ttl {
            return Err(EngineError::StalePreview(format!(
                "preview is older than {}s",
                self.preview_ttl.as_secs()
            )));
        }

        // the stored reservations take their times from the preview
        let expected = enumerate(spec);
        let matches = expected.len() == preview.occurrences.len()
            && expected.iter().zip(&preview.occurrences).all(|(e, p)| {
                e.date == p.date && e.start_at == p.start_at && e.end_at == p.end_at
            });
        if !matches {
            return Err(EngineError::StalePreview(
                "previewed occurrences do not match the request".to_string(),
            ));
        }

        Ok(())
    }

    /// Find the series to commit into, creating it on first commit
    async fn resolve_series(
        &self,
        spec: &RecurrenceSpec,
        preview: &PreviewResult,
        series_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<RecurringReservationSeries> {
        if let Some(id) = series_id {
            let series = self
                .repository
                .find_series(id)
                .await?
                .ok_or(rsv_core::Error::SeriesNotFound(id))?;
            if !series.spec.materially_eq(spec) {
                return Err(EngineError::StalePreview(format!(
                    "series {} was created from a different request",
                    id
                )));
            }
            return Ok(series);
        }

        if let Some(series) = self.repository.find_series_by_preview(&preview.preview_id).await? {
            debug!(series_id = series.id, preview_id = %preview.preview_id, "Reusing series for preview");
            return Ok(series);
        }

        spec.validate(today)?;
        let id = self.repository.persist_series(spec, &preview.preview_id).await?;
        self.repository
            .find_series(id)
            .await?
            .ok_or_else(|| rsv_core::Error::SeriesNotFound(id).into())
    }

    /// Persist the non-conflicting occurrences of `preview`.
    ///
    /// Passing the `series_id` of an earlier commit (or committing the same
    /// preview again) only creates the dates that are still missing.
    pub async fn commit(
        &self,
        spec: &RecurrenceSpec,
        preview: &PreviewResult,
        series_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<CommitResult> {
        self.ensure_fresh(spec, preview)?;

        let series = self.resolve_series(spec, preview, series_id, today).await?;
        let mut result = CommitResult {
            series_id: series.id,
            ..Default::default()
        };

        match series.state(today) {
            SeriesState::Inactive => return Err(EngineError::SeriesInactive(series.id)),
            SeriesState::Exhausted => {
                result.cap_reached = series.remaining() == 0;
                info!(series_id = series.id, "Series exhausted, nothing to commit");
                return Ok(result);
            }
            SeriesState::Active => {}
        }

        let mut seen = BTreeSet::new();
        for occurrence in &preview.occurrences {
            if !seen.insert(occurrence.date) {
                continue;
            }
            if occurrence.has_conflict {
                result.skipped_conflicts += 1;
                continue;
            }

            if let Some(checker) = &self.recheck {
                match checker.check(spec.scenario_id, occurrence.interval()).await {
                    Ok(availability) if availability.available => {}
                    Ok(_) => {
                        result.conflicts_at_commit += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(series_id = series.id, date = %occurrence.date, "Re-check failed: {}", e);
                        result.conflicts_at_commit += 1;
                        continue;
                    }
                }
            }

            match self
                .repository
                .persist_occurrence(series.id, occurrence, self.initial_status)
                .await?
            {
                OccurrenceOutcome::Created(_) => result.occurrences_created += 1,
                OccurrenceOutcome::AlreadyMaterialized => result.already_materialized += 1,
                OccurrenceOutcome::CapReached => {
                    warn!(series_id = series.id, "maxOccurrences reached, stopping early");
                    result.cap_reached = true;
                    break;
                }
            }
        }

        info!(
            series_id = series.id,
            created = result.occurrences_created,
            already = result.already_materialized,
            skipped = result.skipped_conflicts,
            rechecked_conflicts = result.conflicts_at_commit,
            cap_reached = result.cap_reached,
            "Commit finished"
        );
        Ok(result)
    }
}
