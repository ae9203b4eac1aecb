//! Recurrence request types and validation

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, FieldError, Result};

/// Upper bound for `repeatInterval`
pub const MAX_REPEAT_INTERVAL: u32 = 52;
/// Upper bound for `maxOccurrences`
pub const MAX_OCCURRENCES_LIMIT: u32 = 365;
/// Default for `maxOccurrences` (one year of weekly bookings)
pub const DEFAULT_MAX_OCCURRENCES: u32 = 52;

/// Recurrence pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecurrencePattern {
    /// Every N days
    Daily,
    /// Selected weekdays of every N weeks
    Weekly,
    /// A fixed day of every N months
    Monthly,
    /// An explicit list of dates
    Custom,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrencePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "CUSTOM" => Ok(Self::Custom),
            other => Err(Error::Corrupt(format!("unknown recurrence pattern '{}'", other))),
        }
    }
}

/// A recurring reservation request for one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceSpec {
    /// Scenario (room, lab, court...) being booked
    pub scenario_id: i64,

    pub pattern: RecurrencePattern,

    /// First day of the range (inclusive)
    pub start_date: NaiveDate,

    /// Last day of the range (inclusive)
    pub end_date: NaiveDate,

    /// Daily time window, local to the scenario
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,

    /// ISO weekdays, 1 = Monday ... 7 = Sunday (WEEKLY only)
    #[serde(default)]
    pub days_of_week: Vec<u8>,

    /// Day of month, 1-31 (MONTHLY only)
    #[serde(default)]
    pub day_of_month: Option<u32>,

    /// Explicit dates (CUSTOM only)
    #[serde(default)]
    pub custom_dates: Vec<NaiveDate>,

    /// "Every N units" of the pattern
    #[serde(default = "default_repeat_interval")]
    pub repeat_interval: u32,

    /// Hard cap on generated occurrences
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_repeat_interval() -> u32 {
    1
}

fn default_max_occurrences() -> u32 {
    DEFAULT_MAX_OCCURRENCES
}

impl RecurrenceSpec {
    /// Create a spec with default interval and cap
    pub fn new(
        scenario_id: i64,
        pattern: RecurrencePattern,
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            scenario_id,
            pattern,
            start_date,
            end_date,
            start_time,
            end_time,
            days_of_week: Vec::new(),
            day_of_month: None,
            custom_dates: Vec::new(),
            repeat_interval: default_repeat_interval(),
            max_occurrences: default_max_occurrences(),
            notes: None,
        }
    }

    pub fn with_days_of_week(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_custom_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.custom_dates = dates.into_iter().collect();
        self
    }

    pub fn with_repeat_interval(mut self, interval: u32) -> Self {
        self.repeat_interval = interval;
        self
    }

    pub fn with_max_occurrences(mut self, max: u32) -> Self {
        self.max_occurrences = max;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check every field rule and report all failures at once.
    ///
    /// `today` is the earliest allowed `startDate`.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let mut errors = Vec::new();

        if self.scenario_id < 1 {
            errors.push(FieldError::new("scenarioId", "must reference an existing scenario"));
        }
        if self.start_date < today {
            errors.push(FieldError::new(
                "startDate",
                format!("must not be before today ({})", today),
            ));
        }
        if self.end_date <= self.start_date {
            errors.push(FieldError::new("endDate", "must be after startDate"));
        }
        if self.end_time <= self.start_time {
            errors.push(FieldError::new("endTime", "must be after startTime"));
        }
        if !(1..=MAX_REPEAT_INTERVAL).contains(&self.repeat_interval) {
            errors.push(FieldError::new(
                "repeatInterval",
                format!("must be between 1 and {}", MAX_REPEAT_INTERVAL),
            ));
        }
        if !(1..=MAX_OCCURRENCES_LIMIT).contains(&self.max_occurrences) {
            errors.push(FieldError::new(
                "maxOccurrences",
                format!("must be between 1 and {}", MAX_OCCURRENCES_LIMIT),
            ));
        }

        match self.pattern {
            RecurrencePattern::Weekly => {
                if self.days_of_week.is_empty() {
                    errors.push(FieldError::new("daysOfWeek", "required for WEEKLY pattern"));
                } else if self.days_of_week.iter().any(|d| !(1..=7).contains(d)) {
                    errors.push(FieldError::new("daysOfWeek", "entries must be between 1 (Mon) and 7 (Sun)"));
                }
            }
            RecurrencePattern::Monthly => match self.day_of_month {
                None => errors.push(FieldError::new("dayOfMonth", "required for MONTHLY pattern")),
                Some(day) if !(1..=31).contains(&day) => {
                    errors.push(FieldError::new("dayOfMonth", "must be between 1 and 31"));
                }
                Some(_) => {}
            },
            RecurrencePattern::Custom => {
                if self.custom_dates.is_empty() {
                    errors.push(FieldError::new("customDates", "required for CUSTOM pattern"));
                }
            }
            RecurrencePattern::Daily => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Copy with set-like fields sorted and `notes` dropped
    fn normalized(&self) -> Self {
        let mut spec = self.clone();
        spec.days_of_week.sort_unstable();
        spec.days_of_week.dedup();
        spec.custom_dates.sort_unstable();
        spec.custom_dates.dedup();
        spec.notes = None;
        spec
    }

    /// True when both specs would schedule the same occurrences.
    /// `notes` and the ordering of weekday/date lists are ignored.
    pub fn materially_eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }

    /// Human readable summary, e.g. "Every 2 weeks on Mon, Wed from ... to ..., 08:00-10:00"
    pub fn describe(&self) -> String {
        let n = self.repeat_interval.max(1);
        let head = match self.pattern {
            RecurrencePattern::Daily if n == 1 => "Every day".to_string(),
            RecurrencePattern::Daily => format!("Every {} days", n),
            RecurrencePattern::Weekly => {
                let mut days = self.days_of_week.clone();
                days.sort_unstable();
                days.dedup();
                let names = days
                    .iter()
                    .filter_map(|d| weekday_from_iso(*d))
                    .map(|w| w.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                if n == 1 {
                    format!("Weekly on {}", names)
                } else {
                    format!("Every {} weeks on {}", n, names)
                }
            }
            RecurrencePattern::Monthly => {
                let day = self.day_of_month.unwrap_or_default();
                if n == 1 {
                    format!("Monthly on day {}", day)
                } else {
                    format!("Every {} months on day {}", n, day)
                }
            }
            RecurrencePattern::Custom => {
                let mut dates = self.custom_dates.clone();
                dates.sort_unstable();
                dates.dedup();
                format!("{} selected dates", dates.len())
            }
        };

        format!(
            "{} from {} to {}, {}-{}",
            head,
            self.start_date,
            self.end_date,
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M"),
        )
    }
}

/// Map an ISO weekday number (1 = Monday) to `chrono::Weekday`
pub fn weekday_from_iso(day: u8) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// ISO weekday number (1 = Monday) of a date
pub fn iso_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn weekly() -> RecurrenceSpec {
        RecurrenceSpec::new(
            3,
            RecurrencePattern::Weekly,
            date(2024, 1, 1),
            date(2024, 1, 15),
            time(8, 0),
            time(10, 0),
        )
        .with_days_of_week([1, 3, 5])
    }

    #[test]
    fn test_valid_weekly_spec() {
        assert!(weekly().validate(date(2024, 1, 1)).is_ok());
    }

    #[test]
    fn test_collects_all_field_errors() {
        let spec = RecurrenceSpec::new(
            0,
            RecurrencePattern::Weekly,
            date(2024, 1, 10),
            date(2024, 1, 5),
            time(10, 0),
            time(9, 0),
        )
        .with_repeat_interval(0)
        .with_max_occurrences(400);

        let err = spec.validate(date(2024, 1, 1)).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["scenarioId", "endDate", "endTime", "repeatInterval", "maxOccurrences", "daysOfWeek"]
        );
    }

    #[test]
    fn test_start_date_in_past_rejected() {
        let err = weekly().validate(date(2024, 1, 2)).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "startDate");
    }

    #[test]
    fn test_weekday_out_of_range_rejected() {
        let spec = weekly().with_days_of_week([1, 8]);
        let err = spec.validate(date(2024, 1, 1)).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "daysOfWeek");
    }

    #[test]
    fn test_monthly_requires_day_of_month() {
        let mut spec = weekly();
        spec.pattern = RecurrencePattern::Monthly;
        let err = spec.validate(date(2024, 1, 1)).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "dayOfMonth");

        let spec = spec.with_day_of_month(32);
        let err = spec.validate(date(2024, 1, 1)).unwrap_err();
        assert_eq!(err.field_errors()[0].message, "must be between 1 and 31");
    }

    #[test]
    fn test_custom_requires_dates() {
        let mut spec = weekly();
        spec.pattern = RecurrencePattern::Custom;
        let err = spec.validate(date(2024, 1, 1)).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "customDates");
    }

    #[test]
    fn test_materially_eq_ignores_notes_and_order() {
        let a = weekly().with_notes("lab group A");
        let b = weekly().with_days_of_week([5, 1, 3, 3]);
        assert!(a.materially_eq(&b));

        let c = weekly().with_max_occurrences(10);
        assert!(!a.materially_eq(&c));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let json = r#"{
            "scenarioId": 7,
            "pattern": "DAILY",
            "startDate": "2024-01-01",
            "endDate": "2024-01-10",
            "startTime": "08:00:00",
            "endTime": "09:30:00"
        }"#;
        let spec: RecurrenceSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.repeat_interval, 1);
        assert_eq!(spec.max_occurrences, DEFAULT_MAX_OCCURRENCES);
        assert!(spec.days_of_week.is_empty());
        assert_eq!(spec.end_time, time(9, 30));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            weekly().with_repeat_interval(2).describe(),
            "Every 2 weeks on Mon, Wed, Fri from 2024-01-01 to 2024-01-15, 08:00-10:00"
        );
    }

    #[test]
    fn test_pattern_from_str() {
        assert_eq!("weekly".parse::<RecurrencePattern>().unwrap(), RecurrencePattern::Weekly);
        assert!("yearly".parse::<RecurrencePattern>().is_err());
    }
}
