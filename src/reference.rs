use std::fmt::{Display, Formatter};
use std::ops::Neg;

use crate::table::MyHash;

/// Handle to a BDD node, possibly complemented.
///
/// The sign carries the complement edge: `-r` denotes the negation of `r`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Ref(i32);

impl Ref {
    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    /// Index of the referenced node in the storage.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// Literal encoding: the index shifted left, with the sign in the low bit.
    pub const fn lit(self) -> u64 {
        ((self.0.unsigned_abs() as u64) << 1) | self.is_negated() as u64
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl MyHash for Ref {
    fn hash(&self) -> u64 {
        self.lit()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation() {
        let r = Ref::positive(5);
        assert!(!r.is_negated());
        assert!((-r).is_negated());
        assert_eq!(-(-r), r);
        assert_eq!((-r).index(), 5);
        assert_eq!(r.lit(), 10);
        assert_eq!((-r).lit(), 11);
        assert_eq!((-r).to_string(), "~@5");
    }
}
