//! Schedule expression parsing and fire-time computation.
//!
//! Three expression forms are supported:
//!
//! ```text
//! "every " <int> " " ("minute"|"minutes"|"hour"|"hours"|"day"|"days"|"week"|"weeks")
//! "daily at " HH":"MM
//! "weekly on " <weekday-name> " at " HH":"MM
//! ```
//!
//! The parsed `Schedule` is pure and stateless; callers re-derive it from
//! the expression string whenever a next fire time is needed.
//! `next_fire_time` always returns an instant strictly after `from`.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use thiserror::Error;

/// Unit of an `"every N ..."` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl IntervalUnit {
    fn span(self, n: u32) -> Duration {
        match self {
            IntervalUnit::Minutes => Duration::minutes(n as i64),
            IntervalUnit::Hours => Duration::hours(n as i64),
            IntervalUnit::Days => Duration::days(n as i64),
            IntervalUnit::Weeks => Duration::weeks(n as i64),
        }
    }
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// `"every N minutes|hours|days|weeks"`
    Interval { every: u32, unit: IntervalUnit },
    /// `"daily at HH:MM"`
    DailyAt { hour: u32, minute: u32 },
    /// `"weekly on <weekday> at HH:MM"`
    WeeklyOn {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
}

/// Why an expression failed to parse. A parse failure makes the owning job
/// inert, never the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleParseError {
    #[error("unrecognized schedule expression: {0:?}")]
    Unrecognized(String),

    #[error("invalid interval count in {0:?}")]
    InvalidInterval(String),

    #[error("invalid interval unit in {0:?}")]
    InvalidUnit(String),

    #[error("invalid time of day in {0:?}")]
    InvalidTime(String),

    #[error("invalid weekday in {0:?}")]
    InvalidWeekday(String),
}

fn parse_time(expr: &str, token: &str) -> Result<(u32, u32), ScheduleParseError> {
    let time = NaiveTime::parse_from_str(token, "%H:%M")
        .map_err(|_| ScheduleParseError::InvalidTime(expr.to_string()))?;
    Ok((time.hour(), time.minute()))
}

fn parse_weekday(expr: &str, token: &str) -> Result<Weekday, ScheduleParseError> {
    match token.to_ascii_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        _ => Err(ScheduleParseError::InvalidWeekday(expr.to_string())),
    }
}

impl FromStr for Schedule {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            ["every", count, unit] => {
                let every: u32 = count
                    .parse()
                    .map_err(|_| ScheduleParseError::InvalidInterval(s.to_string()))?;
                if every == 0 {
                    return Err(ScheduleParseError::InvalidInterval(s.to_string()));
                }
                let unit = match unit.to_ascii_lowercase().as_str() {
                    "minute" | "minutes" => IntervalUnit::Minutes,
                    "hour" | "hours" => IntervalUnit::Hours,
                    "day" | "days" => IntervalUnit::Days,
                    "week" | "weeks" => IntervalUnit::Weeks,
                    _ => return Err(ScheduleParseError::InvalidUnit(s.to_string())),
                };
                Ok(Schedule::Interval { every, unit })
            }
            ["daily", "at", time] => {
                let (hour, minute) = parse_time(s, time)?;
                Ok(Schedule::DailyAt { hour, minute })
            }
            ["weekly", "on", day, "at", time] => {
                let weekday = parse_weekday(s, day)?;
                let (hour, minute) = parse_time(s, time)?;
                Ok(Schedule::WeeklyOn {
                    weekday,
                    hour,
                    minute,
                })
            }
            _ => Err(ScheduleParseError::Unrecognized(s.to_string())),
        }
    }
}

impl Schedule {
    /// Parse an expression string.
    pub fn parse(expr: &str) -> Result<Self, ScheduleParseError> {
        expr.parse()
    }

    /// The next fire time strictly after `from`.
    ///
    /// `DailyAt` and `WeeklyOn` roll forward to the next matching day when
    /// the time of day has already passed.
    pub fn next_fire_time(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Interval { every, unit } => from + unit.span(every),
            Schedule::DailyAt { hour, minute } => {
                let candidate = at_time(from, hour, minute);
                if candidate > from {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            Schedule::WeeklyOn {
                weekday,
                hour,
                minute,
            } => {
                let days_ahead = (weekday.num_days_from_monday() as i64
                    - from.weekday().num_days_from_monday() as i64)
                    .rem_euclid(7);
                let candidate = at_time(from + Duration::days(days_ahead), hour, minute);
                if candidate > from {
                    candidate
                } else {
                    candidate + Duration::weeks(1)
                }
            }
        }
    }
}

fn at_time(day: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    // hour/minute come from a parsed NaiveTime, so this cannot fail.
    day.date_naive()
        .and_hms_opt(hour, minute, 0)
        .expect("validated time of day")
        .and_utc()
}
