//! エラー型定義 (rsv-engine)

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

/// rsv-engine のエラー型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Core error: {0}")]
    Core(#[from] rsv_core::Error),

    #[error("Availability check for {date} failed: {reason}")]
    AvailabilityCheck { date: NaiveDate, reason: String },

    #[error("Availability check for {date} timed out after {after:?}")]
    Timeout { date: NaiveDate, after: Duration },

    #[error("Stale preview: {0}. Request a new preview")]
    StalePreview(String),

    #[error("Series {0} is inactive")]
    SeriesInactive(i64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Booking backend error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Per-occurrence failures that a preview recovers from
    pub fn is_check_failure(&self) -> bool {
        matches!(self, Self::AvailabilityCheck { .. } | Self::Timeout { .. })
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, EngineError>;
