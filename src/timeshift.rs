//! Wall-clock and instant conversion between platform storage and the UI.
//!
//! The platform stores branch opening hours and offer windows shifted by a
//! fixed two-hour offset (the server assumes a specific timezone instead of
//! storing explicit UTC offsets). Every time value crossing the UI/platform
//! boundary goes through this module: add the offset when displaying a stored
//! value, subtract it when writing an edited value back.
//!
//! Two textual encodings are supported for times of day: 24-hour `"HH:MM"`
//! and 12-hour `"hh:MM ص"` / `"hh:MM م"` as shown to the user. Latin AM/PM
//! markers are accepted on input for robustness.

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;
use tracing::warn;

/// Fixed offset between platform-stored times and locally displayed times.
pub const BACKEND_UTC_OFFSET_HOURS: i64 = 2;

/// Arabic before-noon marker.
pub const PERIOD_MORNING: &str = "ص";
/// Arabic after-noon marker.
pub const PERIOD_EVENING: &str = "م";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("time string is empty")]
    Empty,
    #[error("malformed time string: {0:?}")]
    Malformed(String),
    #[error("time out of range: hour {hour}, minute {minute}")]
    OutOfRange { hour: u32, minute: u32 },
}

/// A wall-clock time with no date or timezone component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeParseError> {
        if hour > 23 || minute > 59 {
            return Err(TimeParseError::OutOfRange { hour, minute });
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayPeriod {
    Morning,
    Evening,
}

fn parse_period(token: &str) -> Option<DayPeriod> {
    match token {
        PERIOD_MORNING => Some(DayPeriod::Morning),
        PERIOD_EVENING => Some(DayPeriod::Evening),
        _ => match token.to_ascii_lowercase().as_str() {
            "am" => Some(DayPeriod::Morning),
            "pm" => Some(DayPeriod::Evening),
            _ => None,
        },
    }
}

/// Parse a time string in either encoding into a [`TimeOfDay`].
///
/// Accepts `"HH:MM"`, `"hh:MM ص|م"`, and `"hh:MM AM|PM"` (case-insensitive).
/// An evening period with hour < 12 adds 12; a morning period with hour 12
/// maps to 0 (midnight).
pub fn parse_flexible(input: &str) -> Result<TimeOfDay, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let clock = parts
        .next()
        .ok_or_else(|| TimeParseError::Malformed(input.to_string()))?;
    let period = match parts.next() {
        Some(token) => {
            Some(parse_period(token).ok_or_else(|| TimeParseError::Malformed(input.to_string()))?)
        }
        None => None,
    };
    if parts.next().is_some() {
        return Err(TimeParseError::Malformed(input.to_string()));
    }

    let (hour_str, minute_str) = clock
        .split_once(':')
        .ok_or_else(|| TimeParseError::Malformed(input.to_string()))?;
    let hour: u32 = hour_str
        .parse()
        .map_err(|_| TimeParseError::Malformed(input.to_string()))?;
    let minute: u32 = minute_str
        .parse()
        .map_err(|_| TimeParseError::Malformed(input.to_string()))?;

    let hour = match period {
        Some(DayPeriod::Evening) if hour < 12 => hour + 12,
        Some(DayPeriod::Morning) if hour == 12 => 0,
        _ => hour,
    };

    TimeOfDay::new(hour, minute)
}

/// Convert any accepted time encoding to zero-padded 24-hour `"HH:MM"`.
pub fn to_24_hour(input: &str) -> Result<String, TimeParseError> {
    parse_flexible(input).map(|t| t.to_string())
}

/// Convert a time to the 12-hour display encoding `"hh:MM ص|م"`.
pub fn to_12_hour(input: &str) -> Result<String, TimeParseError> {
    let time = parse_flexible(input)?;
    let period = if time.hour >= 12 {
        PERIOD_EVENING
    } else {
        PERIOD_MORNING
    };
    let mut hour = time.hour % 12;
    if hour == 0 {
        hour = 12;
    }
    Ok(format!("{:02}:{:02} {}", hour, time.minute, period))
}

/// Shift a wall-clock time by whole hours, wrapping modulo 24.
///
/// Opening/closing times carry no date, so a shift across midnight cannot
/// borrow a day. The wrap keeps the value a valid time of day but loses the
/// day boundary; it is logged because stored values this close to midnight
/// are unexpected.
fn shift_hours(input: &str, delta_hours: i64) -> Result<String, TimeParseError> {
    let time = parse_flexible(input)?;
    let shifted = (i64::from(time.hour) + delta_hours).rem_euclid(24);
    if i64::from(time.hour) + delta_hours != shifted {
        warn!(
            input,
            delta_hours, "time-of-day shift wrapped across midnight, day information lost"
        );
    }
    Ok(format!("{:02}:{:02}", shifted, time.minute))
}

/// Convert a displayed opening/closing time to the platform-stored value.
pub fn shift_for_backend(input: &str) -> Result<String, TimeParseError> {
    shift_hours(input, -BACKEND_UTC_OFFSET_HOURS)
}

/// Convert a platform-stored opening/closing time to the displayed value.
pub fn shift_from_backend(input: &str) -> Result<String, TimeParseError> {
    shift_hours(input, BACKEND_UTC_OFFSET_HOURS)
}

fn parse_instant(input: &str) -> Result<NaiveDateTime, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Empty);
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .map_err(|_| TimeParseError::Malformed(input.to_string()))
}

/// Convert a locally edited offer start/end instant to the platform value.
///
/// Date-aware, so shifting rolls correctly across midnight. The result is
/// formatted `"YYYY-MM-DDTHH:MM:SS"` with no timezone suffix, matching what
/// the platform stores.
pub fn shift_instant_for_api(input: &str) -> Result<String, TimeParseError> {
    let instant = parse_instant(input)? - Duration::hours(BACKEND_UTC_OFFSET_HOURS);
    Ok(instant.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Convert a platform-stored offer instant to the locally displayed value.
pub fn shift_instant_from_api(input: &str) -> Result<NaiveDateTime, TimeParseError> {
    Ok(parse_instant(input)? + Duration::hours(BACKEND_UTC_OFFSET_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_24_hour_strings() {
        assert_eq!(to_24_hour("09:30").expect("parse"), "09:30");
        assert_eq!(to_24_hour("23:59").expect("parse"), "23:59");
        assert_eq!(to_24_hour(" 7:05 ").expect("parse"), "07:05");
    }

    #[test]
    fn converts_arabic_periods_to_24_hour() {
        assert_eq!(to_24_hour("02:30 م").expect("parse"), "14:30");
        assert_eq!(to_24_hour("12:00 ص").expect("parse"), "00:00");
        assert_eq!(to_24_hour("12:00 م").expect("parse"), "12:00");
        assert_eq!(to_24_hour("09:15 ص").expect("parse"), "09:15");
    }

    #[test]
    fn converts_latin_periods_case_insensitively() {
        assert_eq!(to_24_hour("02:30 pm").expect("parse"), "14:30");
        assert_eq!(to_24_hour("12:00 AM").expect("parse"), "00:00");
        assert_eq!(to_24_hour("11:45 Pm").expect("parse"), "23:45");
    }

    #[test]
    fn converts_to_12_hour_display() {
        assert_eq!(to_12_hour("00:00").expect("parse"), "12:00 ص");
        assert_eq!(to_12_hour("13:15").expect("parse"), "01:15 م");
        assert_eq!(to_12_hour("12:00").expect("parse"), "12:00 م");
        assert_eq!(to_12_hour("11:59").expect("parse"), "11:59 ص");
    }

    #[test]
    fn round_trips_between_encodings() {
        for hour in 0..24 {
            for minute in [0, 1, 30, 59] {
                let original = format!("{hour:02}:{minute:02}");
                let twelve = to_12_hour(&original).expect("to 12h");
                assert_eq!(to_24_hour(&twelve).expect("back to 24h"), original);
                assert_eq!(
                    to_12_hour(&to_24_hour(&twelve).expect("24h")).expect("12h again"),
                    twelve
                );
            }
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_flexible(""), Err(TimeParseError::Empty));
        assert_eq!(parse_flexible("   "), Err(TimeParseError::Empty));
        assert!(matches!(
            parse_flexible("noon"),
            Err(TimeParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_flexible("12:xx"),
            Err(TimeParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_flexible("09:30 xx"),
            Err(TimeParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_flexible("25:00"),
            Err(TimeParseError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_flexible("10:75"),
            Err(TimeParseError::OutOfRange { .. })
        ));
    }

    #[test]
    fn backend_shift_round_trips_away_from_midnight() {
        for hour in 2..22 {
            let original = format!("{hour:02}:00");
            let stored = shift_for_backend(&original).expect("to backend");
            assert_eq!(shift_from_backend(&stored).expect("from backend"), original);
        }
        assert_eq!(shift_for_backend("09:00").expect("shift"), "07:00");
        assert_eq!(shift_from_backend("07:00").expect("shift"), "09:00");
    }

    #[test]
    fn backend_shift_wraps_at_midnight() {
        // 00:30 has no previous day to borrow from; the hour wraps instead.
        assert_eq!(shift_for_backend("00:30").expect("shift"), "22:30");
        assert_eq!(shift_from_backend("23:00").expect("shift"), "01:00");
    }

    #[test]
    fn instant_shift_rolls_across_midnight() {
        assert_eq!(
            shift_instant_for_api("2025-03-01T01:30").expect("shift"),
            "2025-02-28T23:30:00"
        );
        let displayed = shift_instant_from_api("2025-02-28T23:30:00").expect("shift");
        assert_eq!(displayed.format("%Y-%m-%dT%H:%M:%S").to_string(), "2025-03-01T01:30:00");
    }

    #[test]
    fn instant_accepts_seconds_and_fractions() {
        assert_eq!(
            shift_instant_for_api("2025-06-10T14:00:30").expect("shift"),
            "2025-06-10T12:00:30"
        );
        assert_eq!(
            shift_instant_for_api("2025-06-10T14:00:30.500").expect("shift"),
            "2025-06-10T12:00:30"
        );
    }

    #[test]
    fn instant_rejects_garbage() {
        assert!(matches!(
            shift_instant_for_api("yesterday"),
            Err(TimeParseError::Malformed(_))
        ));
        assert_eq!(shift_instant_from_api(""), Err(TimeParseError::Empty));
    }
}
