//! Shared helpers for decoding venue wire strings into validated values.
//!
//! All validation of inbound data happens here or in the venue decoders; the
//! order book assumes it only ever sees well-formed levels.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::DecodeError;

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal, DecodeError> {
    s.parse().map_err(|_| DecodeError::Number(s.to_string()))
}

/// Prediction-market price: a probability in `[0, 1]`.
pub(crate) fn parse_unit_price(s: &str) -> Result<Decimal, DecodeError> {
    let price = parse_decimal(s)?;
    if price < Decimal::ZERO || price > Decimal::ONE {
        return Err(DecodeError::PriceOutOfRange(s.to_string()));
    }
    Ok(price)
}

/// Spot-venue price: strictly positive, otherwise unbounded.
pub(crate) fn parse_spot_price(s: &str) -> Result<Decimal, DecodeError> {
    let price = parse_decimal(s)?;
    if price <= Decimal::ZERO {
        return Err(DecodeError::PriceOutOfRange(s.to_string()));
    }
    Ok(price)
}

/// Sizes may be zero (removal instruction) but never negative.
pub(crate) fn parse_size(s: &str) -> Result<Decimal, DecodeError> {
    let size = parse_decimal(s)?;
    if size < Decimal::ZERO {
        return Err(DecodeError::NegativeSize(s.to_string()));
    }
    Ok(size)
}

pub(crate) fn parse_millis(ms: i64) -> Result<DateTime<Utc>, DecodeError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DecodeError::Timestamp(ms.to_string()))
}

/// Venue timestamps arrive as millisecond-epoch strings.
pub(crate) fn parse_millis_str(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    let ms: i64 = s
        .parse()
        .map_err(|_| DecodeError::Timestamp(s.to_string()))?;
    parse_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_price_bounds() {
        assert_eq!(parse_unit_price("0.55").unwrap(), "0.55".parse().unwrap());
        assert_eq!(parse_unit_price("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_unit_price("1").unwrap(), Decimal::ONE);
        assert!(matches!(
            parse_unit_price("1.5"),
            Err(DecodeError::PriceOutOfRange(_))
        ));
        assert!(matches!(
            parse_unit_price("-0.1"),
            Err(DecodeError::PriceOutOfRange(_))
        ));
    }

    #[test]
    fn spot_price_must_be_positive() {
        assert!(parse_spot_price("42000.5").is_ok());
        assert!(matches!(
            parse_spot_price("0"),
            Err(DecodeError::PriceOutOfRange(_))
        ));
    }

    #[test]
    fn size_may_be_zero_but_not_negative() {
        assert_eq!(parse_size("0").unwrap(), Decimal::ZERO);
        assert!(matches!(
            parse_size("-3"),
            Err(DecodeError::NegativeSize(_))
        ));
        assert!(matches!(parse_size("abc"), Err(DecodeError::Number(_))));
    }

    #[test]
    fn millis_string_timestamps() {
        let ts = parse_millis_str("1706000000000").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_706_000_000_000);
        assert!(matches!(
            parse_millis_str("not-a-number"),
            Err(DecodeError::Timestamp(_))
        ));
    }
}
