//! Departure time handling.
//!
//! The timetable page lists departures as "HH:MM" strings. The store keeps
//! them as "HH:MM:00" and the read API hands them back as "HH:MM".

use chrono::{NaiveTime, Timelike};
use std::fmt;

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time {input:?}: {reason}")]
pub struct TimeError {
    input: String,
    reason: &'static str,
}

impl TimeError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A time of day at which a train departs.
///
/// # Examples
///
/// ```
/// use timetable_server::domain::DepartureTime;
///
/// let t = DepartureTime::parse_hhmm("07:15").unwrap();
/// assert_eq!(t.to_stored(), "07:15:00");
/// assert_eq!(t.to_string(), "07:15");
///
/// assert!(DepartureTime::parse_hhmm("7:1").is_err());
/// assert!(DepartureTime::parse_hhmm("25:99").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepartureTime(NaiveTime);

impl DepartureTime {
    /// Parse a strict 24-hour "HH:MM" string.
    ///
    /// Both fields must be exactly two digits; seconds are not accepted.
    pub fn parse_hhmm(s: &str) -> Result<Self, TimeError> {
        if s.len() != 5 {
            return Err(TimeError::new(s, "expected HH:MM format"));
        }

        let bytes = s.as_bytes();
        if bytes[2] != b':' {
            return Err(TimeError::new(s, "expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new(s, "invalid hour digits"))?;
        if hour > 23 {
            return Err(TimeError::new(s, "hour must be 0-23"));
        }

        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new(s, "invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new(s, "minute must be 0-59"));
        }

        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| TimeError::new(s, "invalid time"))
    }

    /// Parse the stored "HH:MM:SS" representation.
    ///
    /// Only the hour and minute are significant; the seconds field is
    /// validated and discarded.
    pub fn parse_stored(s: &str) -> Result<Self, TimeError> {
        if s.len() != 8 || s.as_bytes()[5] != b':' {
            return Err(TimeError::new(s, "expected HH:MM:SS format"));
        }
        parse_two_digits(&s.as_bytes()[6..8])
            .filter(|secs| *secs <= 59)
            .ok_or_else(|| TimeError::new(s, "invalid second digits"))?;
        Self::parse_hhmm(&s[..5])
    }

    /// The representation written to the store: "HH:MM:00".
    pub fn to_stored(&self) -> String {
        format!("{:02}:{:02}:00", self.hour(), self.minute())
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl fmt::Display for DepartureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Parse exactly two ASCII digits.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}
