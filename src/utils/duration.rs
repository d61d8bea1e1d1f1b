//! Parsing of relative time windows such as `15m`, `1h30m` or `1.5h`.

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration '{0}'")]
pub struct InvalidDuration(pub String);

const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("μs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
    ("h", 3600e9),
];

/// Parses a duration made of one or more `<number><unit>` segments.
///
/// Accepts an optional leading sign, fractional numbers and the units
/// `ns`, `us` (`µs`), `ms`, `s`, `m` and `h`. A bare `0` is also accepted.
///
/// ```ignore
/// assert_eq!(parse_duration("1h30m")?, TimeDelta::minutes(90));
/// ```
pub fn parse_duration(input: &str) -> Result<TimeDelta, InvalidDuration> {
    let invalid = || InvalidDuration(input.to_string());

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(TimeDelta::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(invalid)?;
        rest = &rest[unit_len..];

        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > i64::MAX as f64 {
        return Err(invalid());
    }

    let nanos = total_nanos.round() as i64;
    Ok(TimeDelta::nanoseconds(if negative { -nanos } else { nanos }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_duration("15m").unwrap(), TimeDelta::minutes(15));
        assert_eq!(parse_duration("24h").unwrap(), TimeDelta::hours(24));
        assert_eq!(parse_duration("30s").unwrap(), TimeDelta::seconds(30));
        assert_eq!(parse_duration("250ms").unwrap(), TimeDelta::milliseconds(250));
        assert_eq!(parse_duration("5us").unwrap(), TimeDelta::microseconds(5));
        assert_eq!(parse_duration("5µs").unwrap(), TimeDelta::microseconds(5));
        assert_eq!(parse_duration("7ns").unwrap(), TimeDelta::nanoseconds(7));
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(parse_duration("1h30m").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("1.5h").unwrap(), TimeDelta::minutes(90));
        assert_eq!(
            parse_duration("2h45m10s").unwrap(),
            TimeDelta::seconds(2 * 3600 + 45 * 60 + 10)
        );
    }

    #[test]
    fn test_sign_and_zero() {
        assert_eq!(parse_duration("0").unwrap(), TimeDelta::zero());
        assert_eq!(parse_duration("-1h").unwrap(), TimeDelta::hours(-1));
        assert_eq!(parse_duration("+10m").unwrap(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_rejects_malformed_input() {
        for input in ["", "-", "h", "10", "10x", "1h30", ".h", "1d", "abc", "1 h"] {
            assert!(parse_duration(input).is_err(), "accepted {input:?}");
        }
    }
}
