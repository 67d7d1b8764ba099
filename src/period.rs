//! Recurrence token parsing.
//!
//! Three lexical classes are recognised:
//! - named calendar periods (`daily`, `weekly`, `monthly`, `yearly`, `weekdays`, ...)
//! - magnitude + unit durations (`3d`, `1.5h`, `2mo`) and ISO-8601 literals (`PT1H`, `P3D`)
//! - anything else is rejected; a bare number is never guessed into a unit.

use crate::types::{CalendarUnit, Period};
use regex_lite::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3_600.0;
const DAY: f64 = 86_400.0;

/// Longest exact period accepted: one thousand 365-day years.
pub const MAX_PERIOD_SECONDS: i64 = 1_000 * 365 * 86_400;

const MAGNITUDE_PATTERN: &str = r"^(\d+(?:\.\d+)?)\s*([a-z]+)$";

const ISO_PATTERN: &str =
    r"^p(?:(\d+)y)?(?:(\d+)m)?(?:(\d+)w)?(?:(\d+)d)?(?:t(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?)?$";

static MAGNITUDE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(MAGNITUDE_PATTERN).ok());

static ISO_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(ISO_PATTERN).ok());

/// Errors from [`parse`]. Messages are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A number without a unit, e.g. `2`.
    #[error("the duration value '{0}' is not supported")]
    Unsupported(String),

    #[error("the duration value '{0}' is zero; a recurrence must move forward")]
    ZeroDuration(String),

    #[error("'{0}' is not a valid recurrence period")]
    Unrecognized(String),
}

/// Parse a recurrence token into a [`Period`].
pub fn parse(token: &str) -> Result<Period, ParseError> {
    let raw = token.trim();
    let lower = raw.to_ascii_lowercase();

    if lower.is_empty() {
        return Err(ParseError::Unrecognized(raw.to_string()));
    }

    if let Some(period) = named(&lower) {
        return Ok(period);
    }

    if is_bare_number(&lower) {
        return Err(ParseError::Unsupported(raw.to_string()));
    }

    let seconds = if lower.starts_with('p') {
        iso_seconds(&lower).ok_or_else(|| ParseError::Unrecognized(raw.to_string()))?
    } else {
        magnitude_seconds(&lower).ok_or_else(|| ParseError::Unrecognized(raw.to_string()))?
    };

    if seconds <= 0 {
        return Err(ParseError::ZeroDuration(raw.to_string()));
    }
    Ok(Period::exact(seconds))
}

fn named(lower: &str) -> Option<Period> {
    let calendar = |unit, step| Period::Calendar {
        unit,
        step,
        skip_weekends: false,
    };
    let period = match lower {
        "daily" | "day" => calendar(CalendarUnit::Day, 1),
        "weekdays" => Period::weekdays(),
        "weekly" | "week" => calendar(CalendarUnit::Week, 1),
        "biweekly" | "fortnight" => calendar(CalendarUnit::Week, 2),
        "monthly" | "month" => calendar(CalendarUnit::Month, 1),
        "bimonthly" => calendar(CalendarUnit::Month, 2),
        "quarterly" => calendar(CalendarUnit::Month, 3),
        "semiannual" => calendar(CalendarUnit::Month, 6),
        "yearly" | "year" | "annual" => calendar(CalendarUnit::Year, 1),
        "biyearly" | "biannual" => calendar(CalendarUnit::Year, 2),
        "hourly" => Period::exact(HOUR as i64),
        _ => return None,
    };
    Some(period)
}

/// Digits with an optional fractional part and nothing else.
fn is_bare_number(lower: &str) -> bool {
    let mut parts = lower.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next();
    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

fn unit_seconds(unit: &str) -> Option<f64> {
    let seconds = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "wk" | "wks" | "week" | "weeks" => 7.0 * DAY,
        "mo" | "mth" | "mths" | "month" | "months" => 30.0 * DAY,
        "q" | "qtr" | "qtrs" | "quarter" | "quarters" => 91.0 * DAY,
        "y" | "yr" | "yrs" | "year" | "years" => 365.0 * DAY,
        _ => return None,
    };
    Some(seconds)
}

fn magnitude_seconds(lower: &str) -> Option<i64> {
    let caps = MAGNITUDE_RE.as_ref()?.captures(lower)?;
    let magnitude: f64 = caps.get(1)?.as_str().parse().ok()?;
    let factor = unit_seconds(caps.get(2)?.as_str())?;
    let seconds = (magnitude * factor).round();
    if !seconds.is_finite() || seconds > MAX_PERIOD_SECONDS as f64 {
        return None;
    }
    Some(seconds as i64)
}

fn iso_seconds(lower: &str) -> Option<i64> {
    // "p" and "pt" alone match the pattern but carry no component.
    if lower == "p" || lower == "pt" || lower.ends_with('t') {
        return None;
    }
    let caps = ISO_RE.as_ref()?.captures(lower)?;
    let factors = [365.0 * DAY, 30.0 * DAY, 7.0 * DAY, DAY, HOUR, MINUTE, 1.0];
    let mut total = 0i64;
    for (i, factor) in factors.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            let n: i64 = m.as_str().parse().ok()?;
            total = total.checked_add(n.checked_mul(*factor as i64)?)?;
        }
    }
    (total <= MAX_PERIOD_SECONDS).then_some(total)
}
