//! Expiration parsing for human-readable durations like "48h", "90d", "1y".
//!
//! Headscale expects an absolute RFC 3339 expiration; the dashboard accepts a
//! relative duration and converts it here.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::DurationError;

const SECS_PER_HOUR: i64 = 60 * 60;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Parse a duration string like "48h", "7d", "6m", "1y".
///
/// Supported units:
/// - `s` - seconds
/// - `h` - hours
/// - `d` - days (24 hours)
/// - `m` - months (30 days)
/// - `y` - years (365 days)
///
/// The amount must be one or more ASCII digits. Nothing else is accepted.
///
/// # Errors
///
/// Returns [`DurationError::Invalid`] for anything that is not
/// `<digits><unit>`, and [`DurationError::Overflow`] for amounts too large to
/// represent.
pub fn parse_expiration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid {
        input: input.to_owned(),
    };
    let overflow = || DurationError::Overflow {
        input: input.to_owned(),
    };

    let unit = input.chars().last().ok_or_else(invalid)?;
    let digits = &input[..input.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let unit_secs = match unit {
        's' => 1,
        'h' => SECS_PER_HOUR,
        'd' => SECS_PER_DAY,
        'm' => 30 * SECS_PER_DAY,
        'y' => 365 * SECS_PER_DAY,
        _ => return Err(invalid()),
    };
    let amount: i64 = digits.parse().map_err(|_| overflow())?;

    let secs = amount.checked_mul(unit_secs).ok_or_else(overflow)?;
    Duration::try_seconds(secs).ok_or_else(overflow)
}

/// Whether `input` is an acceptable duration string.
#[must_use]
pub fn is_valid_duration(input: &str) -> bool {
    parse_expiration(input).is_ok()
}

/// The instant `input` from `now`.
///
/// # Errors
///
/// Returns the errors of [`parse_expiration`], or [`DurationError::Overflow`]
/// if the resulting instant is out of range.
pub fn expiration_from(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DurationError> {
    let duration = parse_expiration(input)?;
    now.checked_add_signed(duration)
        .ok_or_else(|| DurationError::Overflow {
            input: input.to_owned(),
        })
}

/// Convert a duration string into an RFC 3339 timestamp relative to now,
/// e.g. `"48h"` into `"2026-10-20T09:12:44.123Z"`.
///
/// # Errors
///
/// See [`expiration_from`].
pub fn duration_to_timestamp(input: &str) -> Result<String, DurationError> {
    let at = expiration_from(input, Utc::now())?;
    Ok(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
