use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};

/// Errors produced while parsing an `HH:MM` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeOfDayError {
    #[error("cannot parse time '{raw}': expected HH:MM")]
    Malformed { raw: String },

    #[error("invalid time values '{raw}': hour must be 0-23 and minute 0-59")]
    OutOfRange { raw: String },
}

/// A wall-clock time of day with minute resolution and no date component.
///
/// Ordering follows the clock face (00:00 is the smallest value); windows
/// that cross midnight are handled by the caller, not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from hour/minute, rejecting out-of-range values.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(TimeOfDay)
    }

    /// Strict `HH:MM` parse. One or two digits per field are accepted
    /// (`9:05` and `09:05` are equivalent); anything else is an error.
    pub fn parse(raw: &str) -> Result<Self, TimeOfDayError> {
        let malformed = || TimeOfDayError::Malformed {
            raw: raw.to_string(),
        };

        let (h, m) = raw.trim().split_once(':').ok_or_else(malformed)?;
        let field = |s: &str| -> Option<u32> {
            let s = s.trim();
            if s.is_empty() || s.len() > 2 || !s.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        };

        let hour = field(h).ok_or_else(malformed)?;
        let minute = field(m).ok_or_else(malformed)?;

        Self::from_hm(hour, minute).ok_or_else(|| TimeOfDayError::OutOfRange {
            raw: raw.to_string(),
        })
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeOfDay::parse(s)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
