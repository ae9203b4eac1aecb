//! rsv-engine: 繰り返し予約エンジン
//!
//! プレビュー (空き状況チェック付き) とコミット (シリーズ作成 + 予約登録)
//! を提供します。

pub mod availability;
pub mod commit;
pub mod error;
pub mod preview;
pub mod series;
pub mod store;

pub use availability::{
    Availability, AvailabilityChecker, AvailabilityReport, AvailabilitySource, ConflictingReservation,
    HttpAvailabilitySource,
};
pub use commit::{CommitExecutor, CommitResult, SeriesRepository};
pub use error::{EngineError, Result};
pub use preview::{PreviewAssembler, PreviewResult};
pub use series::SeriesService;
pub use store::SharedStore;
