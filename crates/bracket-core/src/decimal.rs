//! Precision-safe decimal price type.
//!
//! Uses `rust_decimal` so threshold comparisons and order prices are exact;
//! the venue sends prices as decimal strings and we never round-trip them
//! through `f64`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round down to a multiple of the tick size.
    #[inline]
    pub fn round_to_tick(&self, tick_size: Price) -> Self {
        if tick_size.is_zero() {
            return *self;
        }
        Self((self.0 / tick_size.0).floor() * tick_size.0)
    }

    /// True if the price sits exactly on the tick grid.
    ///
    /// A zero tick size means "unknown" and accepts every price.
    #[inline]
    pub fn is_on_tick(&self, tick_size: Price) -> bool {
        self.round_to_tick(tick_size) == *self
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_round_to_tick() {
        let price = Price::new(dec!(4321.37));
        let tick = Price::new(dec!(0.25));

        let rounded = price.round_to_tick(tick);
        assert_eq!(rounded.0, dec!(4321.25));
    }

    #[test]
    fn test_price_is_on_tick() {
        let tick = Price::new(dec!(0.25));
        assert!(Price::new(dec!(4321.75)).is_on_tick(tick));
        assert!(!Price::new(dec!(4321.10)).is_on_tick(tick));
        // Unknown tick size accepts everything
        assert!(Price::new(dec!(4321.10)).is_on_tick(Price::ZERO));
    }

    #[test]
    fn test_price_parse_and_order() {
        let low: Price = "95.0".parse().unwrap();
        let high: Price = " 110 ".parse().unwrap();
        assert!(high > low);
        assert!(low.is_positive());
        assert!("abc".parse::<Price>().is_err());
    }

    #[test]
    fn test_price_serde_accepts_string_and_number() {
        let from_str: Price = serde_json::from_str("\"101.25\"").unwrap();
        let from_num: Price = serde_json::from_str("101.25").unwrap();
        assert_eq!(from_str, Price::new(dec!(101.25)));
        assert_eq!(from_num, Price::new(dec!(101.25)));
    }
}
