//! Price gate evaluated against last-trade ticks.

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use std::fmt;

/// Upper and/or lower price threshold.
///
/// At least one bound is always set. With both set, either crossing
/// satisfies the trigger. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTrigger {
    above: Option<Price>,
    below: Option<Price>,
}

impl PriceTrigger {
    pub fn new(above: Option<Price>, below: Option<Price>) -> Result<Self> {
        if above.is_none() && below.is_none() {
            return Err(CoreError::InvalidTrigger(
                "at least one of above/below must be set".to_string(),
            ));
        }
        Ok(Self { above, below })
    }

    /// Returns `None` when neither bound is given (no gate requested).
    pub fn optional(above: Option<Price>, below: Option<Price>) -> Option<Self> {
        Self::new(above, below).ok()
    }

    pub fn above(&self) -> Option<Price> {
        self.above
    }

    pub fn below(&self) -> Option<Price> {
        self.below
    }

    pub fn is_satisfied(&self, observed: Price) -> bool {
        self.above.is_some_and(|above| observed >= above)
            || self.below.is_some_and(|below| observed <= below)
    }
}

impl fmt::Display for PriceTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.above, self.below) {
            (Some(above), Some(below)) => write!(f, "above {above} or below {below}"),
            (Some(above), None) => write!(f, "above {above}"),
            (None, Some(below)) => write!(f, "below {below}"),
            (None, None) => write!(f, "unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn px(v: rust_decimal::Decimal) -> Price {
        Price::new(v)
    }

    #[test]
    fn test_requires_a_bound() {
        assert!(matches!(
            PriceTrigger::new(None, None),
            Err(CoreError::InvalidTrigger(_))
        ));
        assert!(PriceTrigger::optional(None, None).is_none());
    }

    #[test]
    fn test_above_only_is_inclusive() {
        let trigger = PriceTrigger::new(Some(px(dec!(110))), None).unwrap();
        assert!(!trigger.is_satisfied(px(dec!(109.99))));
        assert!(trigger.is_satisfied(px(dec!(110))));
        assert!(trigger.is_satisfied(px(dec!(125))));
    }

    #[test]
    fn test_below_only_is_inclusive() {
        let trigger = PriceTrigger::new(None, Some(px(dec!(90)))).unwrap();
        assert!(trigger.is_satisfied(px(dec!(90))));
        assert!(!trigger.is_satisfied(px(dec!(90.25))));
    }

    #[test]
    fn test_both_bounds_are_or() {
        let trigger = PriceTrigger::new(Some(px(dec!(110))), Some(px(dec!(90)))).unwrap();
        assert!(trigger.is_satisfied(px(dec!(111))));
        assert!(trigger.is_satisfied(px(dec!(89))));
        assert!(!trigger.is_satisfied(px(dec!(100))));
        assert_eq!(trigger.to_string(), "above 110 or below 90");
    }
}
