//! Candidate occurrences and interval arithmetic

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)` in scenario-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Build the interval for `date` between two times of day
    pub fn on(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start: date.and_time(start),
            end: date.and_time(end),
        }
    }

    /// Two intervals conflict unless one ends before (or exactly when) the other starts
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.date() == self.end.date() {
            write!(
                f,
                "{} {}-{}",
                self.start.date(),
                self.start.format("%H:%M"),
                self.end.format("%H:%M")
            )
        } else {
            write!(
                f,
                "{} - {}",
                self.start.format("%Y-%m-%d %H:%M"),
                self.end.format("%Y-%m-%d %H:%M")
            )
        }
    }
}

/// One concrete date/time instance generated from a recurrence pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateOccurrence {
    pub date: NaiveDate,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// Set by the availability check
    #[serde(default)]
    pub has_conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_detail: Option<String>,
}

impl CandidateOccurrence {
    pub fn new(date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        let interval = TimeInterval::on(date, start_time, end_time);
        Self {
            date,
            start_at: interval.start,
            end_at: interval.end,
            has_conflict: false,
            conflict_detail: None,
        }
    }

    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_at, self.end_at)
    }

    pub fn mark_conflict(&mut self, detail: impl Into<String>) {
        self.has_conflict = true;
        self.conflict_detail = Some(detail.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_overlap_cases() {
        let base = TimeInterval::new(at(1, 8, 0), at(1, 10, 0));

        // partial overlap on either side
        assert!(base.overlaps(&TimeInterval::new(at(1, 9, 0), at(1, 11, 0))));
        assert!(base.overlaps(&TimeInterval::new(at(1, 7, 0), at(1, 8, 30))));
        // containment
        assert!(base.overlaps(&TimeInterval::new(at(1, 8, 30), at(1, 9, 0))));
        assert!(base.overlaps(&TimeInterval::new(at(1, 6, 0), at(1, 12, 0))));
        // touching edges do not conflict
        assert!(!base.overlaps(&TimeInterval::new(at(1, 10, 0), at(1, 11, 0))));
        assert!(!base.overlaps(&TimeInterval::new(at(1, 6, 0), at(1, 8, 0))));
        // different day
        assert!(!base.overlaps(&TimeInterval::new(at(2, 8, 0), at(2, 10, 0))));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let intervals = [
            TimeInterval::new(at(1, 8, 0), at(1, 10, 0)),
            TimeInterval::new(at(1, 9, 0), at(1, 9, 30)),
            TimeInterval::new(at(1, 10, 0), at(1, 12, 0)),
            TimeInterval::new(at(1, 6, 0), at(2, 6, 0)),
            TimeInterval::new(at(2, 0, 0), at(2, 1, 0)),
        ];
        for a in &intervals {
            for b in &intervals {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_candidate_combines_date_and_window() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let mut occ = CandidateOccurrence::new(
            date,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        );
        assert_eq!(occ.start_at, at(3, 8, 0));
        assert_eq!(occ.end_at, at(3, 10, 0));
        assert_eq!(occ.interval().to_string(), "2024-01-03 08:00-10:00");

        occ.mark_conflict("busy");
        assert!(occ.has_conflict);
        assert_eq!(occ.conflict_detail.as_deref(), Some("busy"));
    }
}
