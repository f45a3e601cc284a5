//! Availability Gate — time-of-day window for notification delivery
//!
//! The gate only suppresses *delivery*. Chains are created and cancelled at
//! any hour; what happens to a stage that fires off-hours is decided by
//! [`OffHoursPolicy`].

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Longest local-time gap a DST transition can open
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// What to do with a stage that fires outside the allowed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffHoursPolicy {
    /// Drop the stage and park the chain until a responder clears it
    #[default]
    Drop,
    /// Re-arm the same stage for the next window opening
    Defer,
}

impl FromStr for OffHoursPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "defer" => Ok(Self::Defer),
            _ => Err(ConfigError::InvalidValue {
                field: "off_hours",
                value: s.to_string(),
            }),
        }
    }
}

/// Local time-of-day window `[start, end)` in a fixed named timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    start: NaiveTime,
    end: NaiveTime,
    timezone: Tz,
}

impl AvailabilityWindow {
    /// Create a window. `start > end` wraps past midnight; `start == end`
    /// is always open.
    pub fn new(start: NaiveTime, end: NaiveTime, timezone: Tz) -> Self {
        Self {
            start,
            end,
            timezone,
        }
    }

    /// Parse `HH:MM` bounds and an IANA timezone name
    pub fn parse(start: &str, end: &str, timezone: &str) -> ConfigResult<Self> {
        let tz: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone {
                value: timezone.to_string(),
            })?;
        Ok(Self::new(parse_time(start)?, parse_time(end)?, tz))
    }

    /// 09:00–17:00 America/New_York
    pub fn new_york_business_hours() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            chrono_tz::America::New_York,
        )
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn is_within_allowed_window(&self, now: DateTime<Utc>) -> bool {
        self.contains_local(now.with_timezone(&self.timezone).time())
    }

    fn contains_local(&self, t: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    /// Earliest instant at or after `now` inside the window
    pub fn next_opening(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.is_within_allowed_window(now) {
            return now;
        }

        let today = now.with_timezone(&self.timezone).date_naive();
        for offset in 0..=2 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            let resolved = self.first_valid_instant(date.and_time(self.start));
            if let Some(opening) = resolved.map(|t| t.with_timezone(&Utc)) {
                if opening > now {
                    return opening;
                }
            }
        }
        now
    }

    /// `local` itself, or the first wall-clock minute after it that exists
    /// when a DST jump skips it
    fn first_valid_instant(&self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        if let Some(t) = self.timezone.from_local_datetime(&local).earliest() {
            return Some(t);
        }
        let minute = local.with_second(0)?.with_nanosecond(0)?;
        (1..=MAX_GAP_MINUTES).find_map(|n| {
            self.timezone
                .from_local_datetime(&(minute + chrono::Duration::minutes(n)))
                .earliest()
        })
    }
}

fn parse_time(value: &str) -> ConfigResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ConfigError::InvalidTime {
        value: value.to_string(),
    })
}
