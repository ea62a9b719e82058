//! Reset period specifications
//!
//! A reset period is a calendar-like recurrence written as
//! `years:months:weeks:days:hours:minutes`. Months and years follow the
//! calendar, so the concrete length of one period depends on when it
//! starts; weeks and smaller units are fixed-length.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::DefinitionError;

/// A calendar-like recurrence parsed from `Y:M:W:D:H:M`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetPeriod {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl ResetPeriod {
    /// True if every component is zero
    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.weeks == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
    }

    /// Concrete length of one period starting at `now`
    ///
    /// Computed as the distance to the naive next boundary: `now` plus
    /// the calendar months/years plus the fixed smaller units, minus
    /// `now`. A period of one month is 28-31 days depending on `now`.
    pub fn length_from(&self, now: DateTime<Utc>) -> Duration {
        let months = self.years * 12 + self.months;
        let mut next = now;
        if months > 0 {
            next = next + Months::new(months);
        }
        next = next
            + Duration::weeks(self.weeks as i64)
            + Duration::days(self.days as i64)
            + Duration::hours(self.hours as i64)
            + Duration::minutes(self.minutes as i64);
        next - now
    }
}

impl FromStr for ResetPeriod {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DefinitionError::InvalidPeriod {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() != 6 {
            return Err(invalid("expected 6 colon-separated fields"));
        }

        let mut parsed = [0u32; 6];
        for (slot, field) in parsed.iter_mut().zip(&fields) {
            *slot = field
                .trim()
                .parse::<u32>()
                .map_err(|_| invalid("fields must be non-negative integers"))?;
        }

        Ok(ResetPeriod {
            years: parsed[0],
            months: parsed[1],
            weeks: parsed[2],
            days: parsed[3],
            hours: parsed[4],
            minutes: parsed[5],
        })
    }
}

impl fmt::Display for ResetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.years, self.months, self.weeks, self.days, self.hours, self.minutes
        )
    }
}

// Reset periods round-trip through their string form in definition
// documents: `"reset": "0:0:1:0:0:0"`.
impl Serialize for ResetPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResetPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
