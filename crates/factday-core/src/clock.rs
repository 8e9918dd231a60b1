//! Canonical challenge-day calendar.
//!
//! A [`ChallengeDay`] is the local calendar date in one fixed reference
//! timezone, regardless of where the player is. Conversion goes through the
//! tz database so daylight-saving transitions move the day boundary with the
//! wall clock instead of a fixed UTC offset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default reference timezone for the daily rollover.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Date identifier (`YYYY-MM-DD`) of one day's puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeDay(NaiveDate);

impl ChallengeDay {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The previous calendar day. Saturates at the earliest representable date.
    pub fn day_before(&self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// Day-of-week slot, Sunday = 0 .. Saturday = 6.
    pub fn weekday_index(&self) -> usize {
        self.0.weekday().num_days_from_sunday() as usize
    }

    /// Sunday that opens the week containing this day.
    pub fn week_start(&self) -> Self {
        Self(self.0 - Duration::days(self.weekday_index() as i64))
    }
}

impl fmt::Display for ChallengeDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for ChallengeDay {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Self)
    }
}

/// Source of the current instant.
///
/// The engine never reads the system clock directly so tests can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. A skewed system clock is taken as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant (tests, replays).
#[derive(Debug)]
pub struct FixedClock {
    at: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at: std::sync::Mutex::new(at),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut guard) = self.at.lock() {
            *guard = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.at.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at.lock().map(|g| *g).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Maps instants to challenge days in the reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeCalendar {
    tz: Tz,
}

impl ChallengeCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build from an IANA name such as `America/New_York`.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| ConfigError::UnknownTimezone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn day_at(&self, at: DateTime<Utc>) -> ChallengeDay {
        ChallengeDay(at.with_timezone(&self.tz).date_naive())
    }

    /// Recomputed on every call; never cached.
    pub fn current_day(&self, clock: &dyn Clock) -> ChallengeDay {
        self.day_at(clock.now())
    }
}

impl Default for ChallengeCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York)
    }
}
