use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, macros::format_description};

use crate::error::{Error, Result};
use crate::utils::{local_now, local_offset, start_of_day};

/// A deadline: absent, or a unix-seconds timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(Option<i64>);

impl Deadline {
    pub const NONE: Deadline = Deadline(None);

    pub fn at(unix_seconds: i64) -> Self {
        Self(Some(unix_seconds))
    }

    pub fn timestamp(self) -> Option<i64> {
        self.0
    }

    pub fn is_set(self) -> bool {
        self.0.is_some()
    }

    /// Strictly before the start of `now`'s local day. An absent deadline is never past.
    pub fn is_past_at(self, now: OffsetDateTime) -> bool {
        self.0.is_some_and(|ts| ts < start_of_day(now))
    }

    /// Evaluated against the clock on every call, never cached.
    pub fn is_past(self) -> bool {
        self.is_past_at(local_now())
    }

    /// Parse the date picker's `YYYY-MM-DD` plus hour, interpreted in `offset`.
    pub fn from_date_in(date: &str, hour: i64, offset: UtcOffset) -> Result<Self> {
        let date = Date::parse(date.trim(), format_description!("[year]-[month]-[day]"))
            .map_err(|e| Error::validation(format!("invalid date {date:?}: {e}")))?;
        let hour = hour.clamp(0, 23) as u8;
        let time = Time::from_hms(hour, 0, 0).map_err(|e| Error::validation(e.to_string()))?;
        let local = PrimitiveDateTime::new(date, time).assume_offset(offset);
        Ok(Self::at(local.unix_timestamp()))
    }

    pub fn from_local_date(date: &str, hour: i64) -> Result<Self> {
        Self::from_date_in(date, hour, local_offset())
    }

    /// `Oct 18, 2026` in `offset`, or "No deadline".
    pub fn label_in(self, offset: UtcOffset) -> String {
        let Some(ts) = self.0 else {
            return "No deadline".to_string();
        };
        match OffsetDateTime::from_unix_timestamp(ts) {
            Ok(t) => t
                .to_offset(offset)
                .format(format_description!("[month repr:short] [day], [year]"))
                .unwrap_or_else(|_| ts.to_string()),
            Err(_) => ts.to_string(),
        }
    }

    pub fn label(self) -> String {
        self.label_in(local_offset())
    }
}

impl From<Option<i64>> for Deadline {
    fn from(value: Option<i64>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
