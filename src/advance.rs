//! Due-date advancement.
//!
//! Pure functions of a reference instant and a period; nothing here reads
//! the wall clock.

use crate::types::{CalendarUnit, Period};
use chrono::{DateTime, Datelike, Days, Duration, Months, Utc, Weekday};

/// Compute the next due date after `reference` for `period`.
///
/// Returns `None` only when the result falls outside chrono's representable range.
pub fn advance(reference: DateTime<Utc>, period: &Period) -> Option<DateTime<Utc>> {
    match *period {
        Period::Exact { seconds } => reference.checked_add_signed(Duration::try_seconds(seconds)?),
        Period::Calendar {
            unit,
            step,
            skip_weekends,
        } => {
            let next = add_calendar(reference, unit, step)?;
            if skip_weekends {
                skip_weekend(next)
            } else {
                Some(next)
            }
        }
    }
}

/// Add `step` calendar units. Month and year arithmetic clamps to the last
/// valid day of the target month (Jan 31 + 1 month = Feb 28/29).
pub fn add_calendar(
    reference: DateTime<Utc>,
    unit: CalendarUnit,
    step: u32,
) -> Option<DateTime<Utc>> {
    match unit {
        CalendarUnit::Day => reference.checked_add_days(Days::new(u64::from(step))),
        CalendarUnit::Week => reference.checked_add_days(Days::new(7 * u64::from(step))),
        CalendarUnit::Month => reference.checked_add_months(Months::new(step)),
        CalendarUnit::Year => reference.checked_add_months(Months::new(step.checked_mul(12)?)),
    }
}

/// Subtract `step` calendar units, with the same clamping as [`add_calendar`].
pub fn sub_calendar(
    reference: DateTime<Utc>,
    unit: CalendarUnit,
    step: u32,
) -> Option<DateTime<Utc>> {
    match unit {
        CalendarUnit::Day => reference.checked_sub_days(Days::new(u64::from(step))),
        CalendarUnit::Week => reference.checked_sub_days(Days::new(7 * u64::from(step))),
        CalendarUnit::Month => reference.checked_sub_months(Months::new(step)),
        CalendarUnit::Year => reference.checked_sub_months(Months::new(step.checked_mul(12)?)),
    }
}

fn is_weekend(date: &DateTime<Utc>) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn skip_weekend(mut date: DateTime<Utc>) -> Option<DateTime<Utc>> {
    while is_weekend(&date) {
        date = date.checked_add_days(Days::new(1))?;
    }
    Some(date)
}
