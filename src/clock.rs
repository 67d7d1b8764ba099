//! Clock capability and date-expression resolution.
//!
//! All "now" reads go through a [`Clock`] so generation and expiry can be
//! driven deterministically. Calendar arithmetic is done in UTC.

use crate::advance::{advance, sub_calendar};
use crate::error::{RecurError, RecurResult};
use crate::period;
use crate::types::Period;
use chrono::{
    DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use regex_lite::Regex;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::LazyLock;

static RELATIVE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.+)([+-])([0-9a-zA-Z. ]+)$").ok());

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock. Clones share the same instant, so a test can keep a
/// handle while the engine owns another.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance_by(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    /// Move the clock by a relative offset such as `+3h`, `-1d` or `+125minutes`.
    pub fn advance(&self, offset: &str) -> RecurResult<()> {
        let offset = offset.trim();
        let (forward, token) = match offset.as_bytes().first() {
            Some(b'-') => (false, &offset[1..]),
            Some(b'+') => (true, &offset[1..]),
            _ => (true, offset),
        };
        let moved = shift(self.now.get(), forward, &period::parse(token)?)
            .ok_or_else(|| RecurError::InvalidDate(offset.to_string()))?;
        self.now.set(moved);
        Ok(())
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

fn shift(base: DateTime<Utc>, forward: bool, offset: &Period) -> Option<DateTime<Utc>> {
    match (forward, *offset) {
        (true, p) => advance(base, &p),
        (false, Period::Exact { seconds }) => {
            base.checked_sub_signed(Duration::try_seconds(seconds)?)
        }
        (false, Period::Calendar { unit, step, .. }) => sub_calendar(base, unit, step),
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn weekday_named(word: &str) -> Option<Weekday> {
    let day = match word {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Resolve an absolute base expression (no offset).
fn resolve_base(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = expr.trim().to_ascii_lowercase();
    let today = now.date_naive();

    match lower.as_str() {
        "now" => return Some(now),
        "today" | "sod" => return Some(start_of_day(today)),
        "tomorrow" => return today.checked_add_days(Days::new(1)).map(start_of_day),
        "yesterday" => return today.checked_sub_days(Days::new(1)).map(start_of_day),
        _ => {}
    }

    if let Some(target) = weekday_named(&lower) {
        // Strictly after today: "friday" on a Friday means next week.
        let ahead = (7 + target.num_days_from_monday() - today.weekday().num_days_from_monday())
            % 7;
        let ahead = if ahead == 0 { 7 } else { ahead };
        return today
            .checked_add_days(Days::new(u64::from(ahead)))
            .map(start_of_day);
    }

    let trimmed = expr.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(start_of_day)
}

/// Resolve a user date expression against `now`.
///
/// Accepts `now`, `today`, `tomorrow`, `yesterday`, weekday names, ISO
/// dates and date-times, and any of those followed by `+<duration>` or
/// `-<duration>` (`now+125minutes`, `friday+2h`, `2026-03-01-1d`).
pub fn resolve_date(expr: &str, now: DateTime<Utc>) -> RecurResult<DateTime<Utc>> {
    let expr = expr.trim();
    if let Some(dt) = resolve_base(expr, now) {
        return Ok(dt);
    }

    let caps = RELATIVE_RE
        .as_ref()
        .and_then(|re| re.captures(expr))
        .ok_or_else(|| RecurError::InvalidDate(expr.to_string()))?;
    let (base, sign, offset) = (&caps[1], &caps[2], &caps[3]);

    let base = resolve_base(base, now).ok_or_else(|| RecurError::InvalidDate(expr.to_string()))?;
    let offset = period::parse(offset)?;
    shift(base, sign == "+", &offset).ok_or_else(|| RecurError::InvalidDate(expr.to_string()))
}
