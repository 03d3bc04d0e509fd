//! Variant and amount pairs.

use crate::variant::TransferVariant;
use std::fmt;

/// An amount of one resource variant.
///
/// The pair is kept normalized: the amount is zero exactly when the variant
/// is blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceAmount<V> {
    variant: V,
    amount: u64,
}

impl<V: TransferVariant> ResourceAmount<V> {
    /// Creates a pair, collapsing a zero amount or blank variant to blank.
    pub fn new(variant: V, amount: u64) -> Self {
        if amount == 0 || variant.is_blank() {
            Self::blank()
        } else {
            Self { variant, amount }
        }
    }

    /// Returns the empty pair.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            variant: V::blank(),
            amount: 0,
        }
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.amount == 0
    }

    /// Returns the variant.
    #[must_use]
    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Returns the amount.
    #[must_use]
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Returns `true` if this pair could receive more of `variant`.
    #[must_use]
    pub fn accepts(&self, variant: &V) -> bool {
        self.is_blank() || &self.variant == variant
    }

    /// Returns the pair after adding `amount` of `variant`.
    ///
    /// Callers check [`accepts`](Self::accepts) first.
    pub(crate) fn grown(&self, variant: &V, amount: u64) -> Self {
        Self::new(variant.clone(), self.amount.saturating_add(amount))
    }

    /// Returns the pair after removing up to `amount`.
    pub(crate) fn shrunk(&self, amount: u64) -> Self {
        Self::new(self.variant.clone(), self.amount.saturating_sub(amount))
    }
}

impl<V: TransferVariant> Default for ResourceAmount<V> {
    fn default() -> Self {
        Self::blank()
    }
}

impl<V: TransferVariant + fmt::Display> fmt::Display for ResourceAmount<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.variant, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::ResourceVariant;

    #[test]
    fn zero_amount_is_blank() {
        let pair = ResourceAmount::new(ResourceVariant::of("water"), 0);
        assert!(pair.is_blank());
        assert!(pair.variant().is_blank());
    }

    #[test]
    fn blank_variant_drops_amount() {
        let pair = ResourceAmount::new(ResourceVariant::blank(), 7);
        assert_eq!(pair, ResourceAmount::blank());
    }

    #[test]
    fn shrinking_to_zero_resets_variant() {
        let water = ResourceVariant::of("water");
        let pair = ResourceAmount::new(water.clone(), 5);

        assert_eq!(pair.shrunk(2).amount(), 3);
        assert_eq!(pair.shrunk(9), ResourceAmount::blank());
        assert!(pair.accepts(&water));
        assert!(!pair.accepts(&ResourceVariant::of("lava")));
        assert!(ResourceAmount::<ResourceVariant>::blank().accepts(&water));
    }

    #[test]
    fn display() {
        let pair = ResourceAmount::new(ResourceVariant::of("lava"), 250);
        assert_eq!(pair.to_string(), "lava x250");
    }
}
