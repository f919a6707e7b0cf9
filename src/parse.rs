//! Best-effort conversions of untyped request values.

use time::OffsetDateTime;

use crate::errors::BackendError;

/// Earliest accepted instant, 0001-01-01T00:00:00Z, in seconds.
const MIN_TIMESTAMP: i64 = -62_135_596_800;

/// Latest accepted instant, 9999-12-31T23:59:59Z, in seconds.
const MAX_TIMESTAMP: i64 = 253_402_300_799;

const INVALID_TIMESTAMP: &str = "invalid timestamp";

/// Parses an integer, ignoring surrounding whitespace.
///
/// ```
/// use eatup::parse::parse_integer;
/// assert_eq!(parse_integer(" 42 "), Some(42));
/// assert_eq!(parse_integer("forty-two"), None);
/// ```
pub fn parse_integer(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// Parses a 64-bit integer, ignoring surrounding whitespace.
pub fn parse_wide_integer(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Parses a float. NaN is rejected; infinities are left for range
/// validation to catch.
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| !f.is_nan())
}

/// Parses a millisecond Unix timestamp into a UTC instant, truncating to
/// whole seconds.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, BackendError> {
    let milliseconds =
        parse_wide_integer(text).ok_or_else(|| BackendError::parse(INVALID_TIMESTAMP))?;

    let seconds = milliseconds.div_euclid(1000);

    if !(MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&seconds) {
        return Err(BackendError::parse(INVALID_TIMESTAMP));
    }

    Ok(OffsetDateTime::from_unix_timestamp(seconds))
}
