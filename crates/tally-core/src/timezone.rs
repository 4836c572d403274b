//! Borrower timezone resolution.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Outcome of resolving a profile's timezone name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimezoneResolution {
    /// The name is a known IANA zone.
    Resolved(Tz),
    /// The profile carries no timezone.
    Unspecified,
    /// The name is not a known zone.
    Invalid(String),
}

impl TimezoneResolution {
    /// The resolved zone, if any.
    pub fn zone(&self) -> Option<Tz> {
        match self {
            TimezoneResolution::Resolved(tz) => Some(*tz),
            _ => None,
        }
    }
}

/// Resolve an optional IANA timezone name.
pub fn resolve_timezone(name: Option<&str>) -> TimezoneResolution {
    match name.map(str::trim) {
        None | Some("") => TimezoneResolution::Unspecified,
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => TimezoneResolution::Resolved(tz),
            Err(_) => TimezoneResolution::Invalid(name.to_string()),
        },
    }
}

/// Hour of day (0-23) of `now` in `tz`.
pub fn local_hour(now: DateTime<Utc>, tz: Tz) -> u32 {
    now.with_timezone(&tz).hour()
}
