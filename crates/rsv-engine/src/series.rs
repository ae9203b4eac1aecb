//! Series lifecycle operations

use chrono::NaiveDate;
use rsv_core::{Reservation, SeriesState, SeriesView};
use tracing::info;

use crate::store::SharedStore;
use crate::Result;

/// Read and toggle persisted series
#[derive(Clone)]
pub struct SeriesService {
    store: SharedStore,
}

impl SeriesService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, series_id: i64, today: NaiveDate) -> Result<SeriesView> {
        let series = self
            .store
            .lock()
            .await
            .get_series(series_id)?
            .ok_or(rsv_core::Error::SeriesNotFound(series_id))?;
        Ok(SeriesView::new(series, today))
    }

    pub async fn list_for_scenario(&self, scenario_id: i64, today: NaiveDate) -> Result<Vec<SeriesView>> {
        let series = self.store.lock().await.list_series_for_scenario(scenario_id)?;
        Ok(series.into_iter().map(|s| SeriesView::new(s, today)).collect())
    }

    /// Re-enable generation. Exhausted series cannot be reactivated.
    pub async fn activate(&self, series_id: i64, today: NaiveDate) -> Result<SeriesView> {
        let view = self.get(series_id, today).await?;
        if view.state == SeriesState::Exhausted {
            return Err(rsv_core::Error::SeriesExhausted(series_id).into());
        }
        self.store.lock().await.set_series_active(series_id, true)?;
        info!(series_id, "Series activated");
        self.get(series_id, today).await
    }

    /// Stop generation. Reservations already created are kept.
    pub async fn deactivate(&self, series_id: i64, today: NaiveDate) -> Result<SeriesView> {
        self.store.lock().await.set_series_active(series_id, false)?;
        info!(series_id, "Series deactivated");
        self.get(series_id, today).await
    }

    /// Reservations created for a series, oldest first
    pub async fn occurrences(&self, series_id: i64) -> Result<Vec<Reservation>> {
        let store = self.store.lock().await;
        if store.get_series(series_id)?.is_none() {
            return Err(rsv_core::Error::SeriesNotFound(series_id).into());
        }
        Ok(store.series_reservations(series_id)?)
    }
}
