//! BitField type for 32-bit masks carried on the wire

use serde::{Deserialize, Serialize};

/// A 32-bit mask such as a signal selection set or property flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitField(pub u32);

impl BitField {
    /// Create a new BitField from a u32 value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set. Bits past 31 are never set.
    pub fn is_set(&self, bit: u32) -> bool {
        bit < 32 && (self.0 & (1 << bit)) != 0
    }

    /// Check if a specific flag is set using a bitmask.
    pub fn has_flag(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }

    /// Number of set bits.
    pub fn count_set(&self) -> u32 {
        self.0.count_ones()
    }

    /// Get the raw u32 value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Compare sample-clock timestamps in u32 space with wraparound using half-range rule.
/// Returns true if `a` is considered newer than `b`.
pub fn time_after_u32(a: u32, b: u32) -> bool {
    if a == b {
        return false;
    }
    a.wrapping_sub(b) < 0x8000_0000
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bits_and_flags() {
        let bits = BitField::new(0b1010);
        assert!(bits.is_set(1));
        assert!(!bits.is_set(0));
        assert!(!bits.is_set(40));
        assert!(bits.has_flag(0b1000));
        assert_eq!(bits.count_set(), 2);
    }

    proptest! {
        #[test]
        fn time_after_handles_wraparound(base in any::<u32>(), delta in 1u32..0x8000_0000) {
            let later = base.wrapping_add(delta);
            prop_assert!(time_after_u32(later, base));
            prop_assert!(!time_after_u32(base, later));
            prop_assert!(!time_after_u32(base, base));
        }
    }
}
