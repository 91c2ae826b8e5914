//! Date/time values and RFC 3339 conversion.
//!
//! A [`DateTime`] is stored as microseconds since the Unix epoch (UTC) plus
//! the UTC offset, in minutes, that the instant was originally written with.
//! Two datetimes are equal only when both the instant and the offset match.

use std::fmt;
use std::str::FromStr;

const MICROSECONDS_PER_SECOND: i64 = 1_000_000;
const MICROSECONDS_PER_MINUTE: i64 = 60 * MICROSECONDS_PER_SECOND;
const MICROSECONDS_PER_HOUR: i64 = 60 * MICROSECONDS_PER_MINUTE;
const MICROSECONDS_PER_DAY: i64 = 24 * MICROSECONDS_PER_HOUR;

/// Maximum absolute UTC offset in minutes (±24:00).
pub const MAX_OFFSET_MINUTES: i16 = 1440;

/// Error type for RFC 3339 parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeParseError {
    pub message: String,
}

impl DateTimeParseError {
    fn new(what: &str, input: &str) -> Self {
        Self {
            message: format!("{what}: {input}"),
        }
    }
}

impl fmt::Display for DateTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DateTimeParseError {}

/// An instant with the UTC offset it was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    /// Microseconds since 1970-01-01T00:00:00Z.
    pub epoch_us: i64,
    /// Signed UTC offset in minutes (e.g. +330 for +05:30).
    pub offset_min: i16,
}

impl DateTime {
    /// The Unix epoch in UTC. This is the zero value of the `dateTime` model.
    pub const UNIX_EPOCH: DateTime = DateTime {
        epoch_us: 0,
        offset_min: 0,
    };

    /// Creates a UTC datetime from microseconds since the Unix epoch.
    pub fn from_epoch_us(epoch_us: i64) -> Self {
        Self {
            epoch_us,
            offset_min: 0,
        }
    }

    /// Parses an RFC 3339 datetime (`YYYY-MM-DDTHH:MM:SS[.ffffff](Z|±HH:MM)`).
    ///
    /// A space is accepted in place of `T`. A missing offset means UTC.
    pub fn parse_rfc3339(s: &str) -> Result<Self, DateTimeParseError> {
        if s.len() < 19 || !s.is_ascii() {
            return Err(DateTimeParseError::new("invalid RFC 3339 datetime", s));
        }
        let bytes = s.as_bytes();
        if bytes[4] != b'-' || bytes[7] != b'-' || bytes[13] != b':' || bytes[16] != b':' {
            return Err(DateTimeParseError::new("invalid RFC 3339 datetime", s));
        }
        if bytes[10] != b'T' && bytes[10] != b't' && bytes[10] != b' ' {
            return Err(DateTimeParseError::new("invalid date/time separator", s));
        }

        let year: i32 = parse_field(&s[..4], "invalid year", s)?;
        let month: u32 = parse_field(&s[5..7], "invalid month", s)?;
        let day: u32 = parse_field(&s[8..10], "invalid day", s)?;
        let hours: i64 = parse_field(&s[11..13], "invalid hours", s)?;
        let minutes: i64 = parse_field(&s[14..16], "invalid minutes", s)?;
        let seconds: i64 = parse_field(&s[17..19], "invalid seconds", s)?;

        if !(1..=12).contains(&month) {
            return Err(DateTimeParseError::new("invalid month", s));
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(DateTimeParseError::new("invalid day", s));
        }
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(DateTimeParseError::new("time of day out of range", s));
        }

        let rest = &s[19..];
        let (fraction, offset) = match rest.strip_prefix('.') {
            Some(after_dot) => {
                let end = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                if end == 0 {
                    return Err(DateTimeParseError::new("empty fractional seconds", s));
                }
                (&after_dot[..end], &after_dot[end..])
            }
            None => ("", rest),
        };

        let offset_min = if offset.is_empty() {
            0
        } else {
            parse_offset(offset, s)?
        };

        let local_us = date_to_days(year, month, day) * MICROSECONDS_PER_DAY
            + hours * MICROSECONDS_PER_HOUR
            + minutes * MICROSECONDS_PER_MINUTE
            + seconds * MICROSECONDS_PER_SECOND
            + parse_fraction(fraction);

        Ok(Self {
            epoch_us: local_us - offset_min as i64 * MICROSECONDS_PER_MINUTE,
            offset_min,
        })
    }

    /// Formats this datetime as RFC 3339 in its recorded offset.
    pub fn to_rfc3339(&self) -> String {
        let local_us = self.epoch_us + self.offset_min as i64 * MICROSECONDS_PER_MINUTE;
        let days = local_us.div_euclid(MICROSECONDS_PER_DAY);
        let time_us = local_us.rem_euclid(MICROSECONDS_PER_DAY);
        let (year, month, day) = days_to_date(days);

        let hours = time_us / MICROSECONDS_PER_HOUR;
        let minutes = (time_us % MICROSECONDS_PER_HOUR) / MICROSECONDS_PER_MINUTE;
        let seconds = (time_us % MICROSECONDS_PER_MINUTE) / MICROSECONDS_PER_SECOND;
        let micros = time_us % MICROSECONDS_PER_SECOND;

        let mut out = format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}");
        if micros != 0 {
            let digits = format!("{micros:06}");
            out.push('.');
            out.push_str(digits.trim_end_matches('0'));
        }
        out.push_str(&format_offset(self.offset_min));
        out
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl FromStr for DateTime {
    type Err = DateTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_rfc3339(s)
    }
}

fn parse_field<T: FromStr>(field: &str, what: &str, input: &str) -> Result<T, DateTimeParseError> {
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateTimeParseError::new(what, input));
    }
    field.parse().map_err(|_| DateTimeParseError::new(what, input))
}

/// Pads or truncates fractional seconds to microsecond precision.
fn parse_fraction(digits: &str) -> i64 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(6)
        .fold(0, |acc, b| acc * 10 + (b - b'0') as i64)
}

fn parse_offset(offset: &str, input: &str) -> Result<i16, DateTimeParseError> {
    if offset == "Z" || offset == "z" {
        return Ok(0);
    }
    let bytes = offset.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return Err(DateTimeParseError::new("invalid UTC offset", input));
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(DateTimeParseError::new("invalid UTC offset", input)),
    };
    let hours: i16 = parse_field(&offset[1..3], "invalid UTC offset", input)?;
    let minutes: i16 = parse_field(&offset[4..6], "invalid UTC offset", input)?;
    if minutes > 59 {
        return Err(DateTimeParseError::new("invalid UTC offset", input));
    }
    let total = hours * 60 + minutes;
    if total > MAX_OFFSET_MINUTES {
        return Err(DateTimeParseError::new("UTC offset out of range", input));
    }
    Ok(sign * total)
}

fn format_offset(offset_min: i16) -> String {
    if offset_min == 0 {
        return "Z".to_string();
    }
    let sign = if offset_min > 0 { '+' } else { '-' };
    let abs = offset_min.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date (Howard Hinnant).
fn date_to_days(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year as i64 - 1 } else { year as i64 };
    let m = month as i64;
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn days_to_date(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
