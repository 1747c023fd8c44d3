use std::fmt::{Display, Formatter};

use strum::{Display as StrumDisplay, EnumIter, IntoStaticStr};

/// Operation tag of an expression node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, StrumDisplay, IntoStaticStr, EnumIter)]
pub enum Op {
    // Leaves
    BVS,
    BVV,
    BoolS,
    BoolV,
    SI,

    // Arithmetic
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SMod,
    Neg,

    // Bitwise
    BvAnd,
    BvOr,
    BvXor,
    BvNot,
    Shl,
    LShR,
    AShR,

    // Structural
    Concat,
    Extract,
    ZeroExt,
    SignExt,
    Reverse,

    // Comparisons
    Eq,
    Ne,
    ULT,
    ULE,
    UGT,
    UGE,
    SLT,
    SLE,
    SGT,
    SGE,

    // Boolean
    And,
    Or,
    Not,
    If,

    // Value-set analysis
    Union,
    Intersection,
}

impl Op {
    pub fn is_leaf(self) -> bool {
        matches!(self, Op::BVS | Op::BVV | Op::BoolS | Op::BoolV | Op::SI)
    }

    pub fn is_literal(self) -> bool {
        matches!(self, Op::BVV | Op::BoolV)
    }

    /// Associative-commutative operations whose nested chains are flattened.
    pub fn is_flattenable(self) -> bool {
        matches!(self, Op::Add | Op::Mul | Op::BvAnd | Op::BvOr | Op::BvXor)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Op::Eq
                | Op::Ne
                | Op::ULT
                | Op::ULE
                | Op::UGT
                | Op::UGE
                | Op::SLT
                | Op::SLE
                | Op::SGT
                | Op::SGE
        )
    }

    /// The comparison that holds exactly when `self` does not.
    pub fn negated(self) -> Option<Op> {
        let res = match self {
            Op::Eq => Op::Ne,
            Op::Ne => Op::Eq,
            Op::ULT => Op::UGE,
            Op::UGE => Op::ULT,
            Op::ULE => Op::UGT,
            Op::UGT => Op::ULE,
            Op::SLT => Op::SGE,
            Op::SGE => Op::SLT,
            Op::SLE => Op::SGT,
            Op::SGT => Op::SLE,
            _ => return None,
        };
        Some(res)
    }

    /// Conditions that `If` rewrites into their positive form by swapping arms.
    pub fn is_negative_condition(self) -> bool {
        matches!(self, Op::Not | Op::Ne | Op::ULE | Op::ULT | Op::SLE | Op::SLT)
    }
}

/// Sort of an expression: a boolean, or a bitvector of fixed width.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Sort {
    Bool,
    Bv(u32),
}

impl Sort {
    /// Maximum supported bitvector width.
    pub const MAX_BITS: u32 = 64;

    pub fn is_bool(self) -> bool {
        matches!(self, Sort::Bool)
    }

    /// Bit-length of the sort. Booleans count as a single bit.
    pub fn bits(self) -> u32 {
        match self {
            Sort::Bool => 1,
            Sort::Bv(bits) => bits,
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Bv(bits) => write!(f, "BV{}", bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use test_log::test;

    use super::*;

    #[test]
    fn test_negated_is_involution() {
        for op in Op::iter().filter(|op| op.is_comparison()) {
            let neg = op.negated().unwrap();
            assert_eq!(neg.negated(), Some(op), "op = {}", op);
        }
        assert_eq!(Op::Add.negated(), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Op::LShR.to_string(), "LShR");
        let name: &'static str = Op::If.into();
        assert_eq!(name, "If");
        assert_eq!(Sort::Bv(32).to_string(), "BV32");
        assert_eq!(Sort::Bool.to_string(), "Bool");
    }
}
