//! Due-date arithmetic.

use chrono::{Days, Months, NaiveDate};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    /// interval_type values are case-sensitive: only "monthly" and
    /// "weekly" are recognized.
    #[error("unknown interval_type '{0}' (expected 'monthly' or 'weekly')")]
    UnknownType(String),

    #[error("due date out of range adding {count} {interval_type} intervals to {from}")]
    OutOfRange {
        interval_type: &'static str,
        count: u32,
        from: NaiveDate,
    },
}

/// Compute the due date `interval_value` intervals after `from`.
///
/// Monthly intervals use calendar-month arithmetic: the day of month is
/// preserved where valid and clamped to the target month's last day
/// otherwise (Jan 31 + 1 month = Feb 29 in a leap year, Feb 28 in a
/// common year). Weekly intervals add exactly `interval_value * 7` days.
pub fn next_due_date(
    from: NaiveDate,
    interval_type: &str,
    interval_value: u32,
) -> Result<NaiveDate, IntervalError> {
    match interval_type {
        "monthly" => from
            .checked_add_months(Months::new(interval_value))
            .ok_or(IntervalError::OutOfRange {
                interval_type: "monthly",
                count: interval_value,
                from,
            }),
        "weekly" => from
            .checked_add_days(Days::new(u64::from(interval_value) * 7))
            .ok_or(IntervalError::OutOfRange {
                interval_type: "weekly",
                count: interval_value,
                from,
            }),
        other => Err(IntervalError::UnknownType(other.to_string())),
    }
}
