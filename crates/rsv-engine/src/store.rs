//! Shared handle to the SQLite booking store

use std::sync::Arc;

use async_trait::async_trait;
use rsv_core::{
    BookingStore, CandidateOccurrence, OccurrenceOutcome, RecurrenceSpec, RecurringReservationSeries,
    ReservationStatus, TimeInterval,
};
use tokio::sync::{Mutex, MutexGuard};

use crate::availability::{AvailabilityReport, AvailabilitySource, ConflictingReservation};
use crate::commit::SeriesRepository;
use crate::Result;

/// Cloneable, async-safe wrapper around [`BookingStore`].
///
/// Serves both as the local availability source and as the series
/// repository used by the commit executor.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<BookingStore>>,
}

impl SharedStore {
    pub fn new(store: BookingStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Open the database file at `db_path`
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::new(BookingStore::new(db_path)?))
    }

    /// In-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(BookingStore::in_memory()?))
    }

    pub async fn lock(&self) -> MutexGuard<'_, BookingStore> {
        self.inner.lock().await
    }
}

#[async_trait]
impl AvailabilitySource for SharedStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn check_availability(&self, scenario_id: i64, interval: &TimeInterval) -> Result<AvailabilityReport> {
        let overlapping = self.lock().await.find_overlapping(scenario_id, interval)?;
        let conflicting: Vec<ConflictingReservation> = overlapping
            .iter()
            .filter(|r| r.status.is_blocking())
            .map(ConflictingReservation::from)
            .collect();

        Ok(AvailabilityReport {
            available: conflicting.is_empty(),
            conflicting_reservations: conflicting,
        })
    }
}

#[async_trait]
impl SeriesRepository for SharedStore {
    async fn persist_series(&self, spec: &RecurrenceSpec, preview_id: &str) -> Result<i64> {
        Ok(self.lock().await.create_series(spec, Some(preview_id))?)
    }

    async fn find_series(&self, series_id: i64) -> Result<Option<RecurringReservationSeries>> {
        Ok(self.lock().await.get_series(series_id)?)
    }

    async fn find_series_by_preview(&self, preview_id: &str) -> Result<Option<RecurringReservationSeries>> {
        Ok(self.lock().await.find_series_by_preview(preview_id)?)
    }

    async fn persist_occurrence(
        &self,
        series_id: i64,
        occurrence: &CandidateOccurrence,
        status: ReservationStatus,
    ) -> Result<OccurrenceOutcome> {
        Ok(self
            .lock()
            .await
            .materialize_occurrence(series_id, occurrence, status)?)
    }
}
