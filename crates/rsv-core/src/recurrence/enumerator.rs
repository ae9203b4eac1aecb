//! Calendar enumerator
//!
//! Turns a [`RecurrenceSpec`] into the ordered list of candidate dates.
//! Enumeration is a pure function of the spec: it never looks at the clock
//! and never fails. A spec whose day filter never matches inside the range
//! simply yields nothing.

use chrono::{Datelike, Days, NaiveDate};

use super::types::{iso_weekday, RecurrencePattern, RecurrenceSpec};
use crate::occurrence::CandidateOccurrence;

/// Result of a capped enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub occurrences: Vec<CandidateOccurrence>,
    /// More dates matched the pattern than `maxOccurrences` allowed
    pub truncated: bool,
}

/// Enumerate the candidate occurrences of `spec`, capped at `maxOccurrences`
pub fn enumerate(spec: &RecurrenceSpec) -> Vec<CandidateOccurrence> {
    enumerate_bounded(spec).occurrences
}

/// Like [`enumerate`] but also reports whether the cap cut the series short
pub fn enumerate_bounded(spec: &RecurrenceSpec) -> Enumeration {
    let cap = spec.max_occurrences as usize;
    let mut dates = RecurrenceDates::new(spec);

    let occurrences: Vec<CandidateOccurrence> = dates
        .by_ref()
        .take(cap)
        .map(|date| CandidateOccurrence::new(date, spec.start_time, spec.end_time))
        .collect();

    let truncated = occurrences.len() == cap && dates.next().is_some();

    Enumeration {
        occurrences,
        truncated,
    }
}

/// Uncapped iterator over the dates matched by a recurrence pattern,
/// restricted to `[startDate, endDate]`.
#[derive(Debug, Clone)]
pub struct RecurrenceDates {
    start: NaiveDate,
    end: NaiveDate,
    interval: u32,
    state: State,
}

#[derive(Debug, Clone)]
enum State {
    Daily { next: NaiveDate },
    Weekly { next: NaiveDate, days: [bool; 8], anchor: NaiveDate },
    Monthly { offset: u32, day: u32 },
    Custom { dates: std::vec::IntoIter<NaiveDate> },
    Done,
}

impl RecurrenceDates {
    pub fn new(spec: &RecurrenceSpec) -> Self {
        let start = spec.start_date;
        let end = spec.end_date;
        // a zero interval would never advance
        let interval = spec.repeat_interval.max(1);

        let state = if end < start {
            State::Done
        } else {
            match spec.pattern {
                RecurrencePattern::Daily => State::Daily { next: start },
                RecurrencePattern::Weekly => {
                    let mut days = [false; 8];
                    for d in spec.days_of_week.iter().filter(|d| (1..=7).contains(*d)) {
                        days[*d as usize] = true;
                    }
                    State::Weekly {
                        next: start,
                        days,
                        anchor: week_start(start),
                    }
                }
                RecurrencePattern::Monthly => match spec.day_of_month {
                    Some(day) if (1..=31).contains(&day) => State::Monthly { offset: 0, day },
                    _ => State::Done,
                },
                RecurrencePattern::Custom => {
                    let mut dates: Vec<NaiveDate> = spec
                        .custom_dates
                        .iter()
                        .copied()
                        .filter(|d| *d >= start && *d <= end)
                        .collect();
                    dates.sort_unstable();
                    dates.dedup();
                    State::Custom {
                        dates: dates.into_iter(),
                    }
                }
            }
        };

        Self {
            start,
            end,
            interval,
            state,
        }
    }
}

impl Iterator for RecurrenceDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let end = self.end;
        let interval = self.interval;

        match &mut self.state {
            State::Daily { next } => {
                let date = *next;
                if date > end {
                    self.state = State::Done;
                    return None;
                }
                match date.checked_add_days(Days::new(u64::from(interval))) {
                    Some(following) => *next = following,
                    None => self.state = State::Done,
                }
                Some(date)
            }
            State::Weekly { next, days, anchor } => {
                let anchor = *anchor;
                loop {
                    let date = *next;
                    if date > end {
                        self.state = State::Done;
                        return None;
                    }
                    match date.succ_opt() {
                        Some(following) => *next = following,
                        None => {
                            self.state = State::Done;
                            return None;
                        }
                    }

                    let weeks = (week_start(date) - anchor).num_days() / 7;
                    if weeks % i64::from(interval) == 0 && days[iso_weekday(date) as usize] {
                        return Some(date);
                    }
                }
            }
            State::Monthly { offset, day } => loop {
                let Some(first) = add_months(self.start, *offset) else {
                    self.state = State::Done;
                    return None;
                };
                if first > end {
                    self.state = State::Done;
                    return None;
                }
                let candidate = NaiveDate::from_ymd_opt(first.year(), first.month(), *day);
                *offset += interval;

                // months without that day are skipped, never clamped
                if let Some(date) = candidate {
                    if date >= self.start && date <= end {
                        return Some(date);
                    }
                }
            },
            State::Custom { dates } => dates.next(),
            State::Done => None,
        }
    }
}

/// Monday of the week containing `date`
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// First day of the month `months` after the month containing `date`
fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 + i32::try_from(months).ok()?;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}
