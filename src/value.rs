//! Concrete bitvector values and their exact semantics.
//!
//! All arithmetic wraps modulo `2^bits`. Division by zero follows SMT-LIB:
//! `x / 0` is all ones, `x % 0` is `x`, and the signed variants agree with
//! that on the magnitude.

use std::fmt::{Display, Formatter};

use crate::op::Op;

/// Bitmask with the lowest `bits` bits set.
pub fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Interpret the low `bits` bits of `value` as a two's complement number.
pub fn to_signed(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// A fixed-width unsigned bitvector value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BitVec {
    value: u64,
    bits: u32,
}

impl BitVec {
    pub fn new(value: u64, bits: u32) -> Self {
        assert!(bits > 0 && bits <= 64, "Bit width should be in the range 1..=64");
        Self {
            value: value & mask(bits),
            bits,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }
    pub fn bits(&self) -> u32 {
        self.bits
    }
    pub fn signed(&self) -> i64 {
        to_signed(self.value, self.bits)
    }
    pub fn is_negative(&self) -> bool {
        self.signed() < 0
    }

    fn with(&self, value: u64) -> Self {
        Self::new(value, self.bits)
    }

    pub fn add(&self, rhs: &Self) -> Self {
        self.with(self.value.wrapping_add(rhs.value))
    }
    pub fn sub(&self, rhs: &Self) -> Self {
        self.with(self.value.wrapping_sub(rhs.value))
    }
    pub fn mul(&self, rhs: &Self) -> Self {
        self.with(self.value.wrapping_mul(rhs.value))
    }
    pub fn neg(&self) -> Self {
        self.with(self.value.wrapping_neg())
    }
    pub fn not(&self) -> Self {
        self.with(!self.value)
    }
    pub fn and(&self, rhs: &Self) -> Self {
        self.with(self.value & rhs.value)
    }
    pub fn or(&self, rhs: &Self) -> Self {
        self.with(self.value | rhs.value)
    }
    pub fn xor(&self, rhs: &Self) -> Self {
        self.with(self.value ^ rhs.value)
    }

    pub fn udiv(&self, rhs: &Self) -> Self {
        if rhs.value == 0 {
            self.with(u64::MAX)
        } else {
            self.with(self.value / rhs.value)
        }
    }

    pub fn urem(&self, rhs: &Self) -> Self {
        if rhs.value == 0 {
            *self
        } else {
            self.with(self.value % rhs.value)
        }
    }

    /// Signed division, truncating toward zero.
    pub fn sdiv(&self, rhs: &Self) -> Self {
        let (a, b) = (self.signed(), rhs.signed());
        if b == 0 {
            return if a < 0 { self.with(1) } else { self.with(u64::MAX) };
        }
        self.with(a.wrapping_div(b) as u64)
    }

    /// Signed remainder; the result takes the sign of the dividend.
    pub fn srem(&self, rhs: &Self) -> Self {
        let (a, b) = (self.signed(), rhs.signed());
        if b == 0 {
            return *self;
        }
        self.with(a.wrapping_rem(b) as u64)
    }

    pub fn shl(&self, rhs: &Self) -> Self {
        if rhs.value >= self.bits as u64 {
            self.with(0)
        } else {
            self.with(self.value << rhs.value)
        }
    }

    pub fn lshr(&self, rhs: &Self) -> Self {
        if rhs.value >= self.bits as u64 {
            self.with(0)
        } else {
            self.with(self.value >> rhs.value)
        }
    }

    pub fn ashr(&self, rhs: &Self) -> Self {
        let shift = rhs.value.min(63);
        self.with((self.signed() >> shift) as u64)
    }

    /// Concatenate with `low` occupying the least significant bits.
    pub fn concat(&self, low: &Self) -> Self {
        let bits = self.bits + low.bits;
        assert!(bits <= 64);
        let high = if low.bits >= 64 { 0 } else { self.value << low.bits };
        Self::new(high | low.value, bits)
    }

    pub fn extract(&self, hi: u32, lo: u32) -> Self {
        assert!(lo <= hi && hi < self.bits);
        Self::new(self.value >> lo, hi - lo + 1)
    }

    pub fn zero_extend(&self, n: u32) -> Self {
        Self::new(self.value, self.bits + n)
    }

    pub fn sign_extend(&self, n: u32) -> Self {
        Self::new(self.signed() as u64, self.bits + n)
    }

    /// Byte order reversal. Requires a whole number of bytes.
    pub fn reversed(&self) -> Self {
        let bytes = self.bits / 8;
        let mut res = 0u64;
        for i in 0..bytes {
            let byte = (self.value >> (8 * i)) & 0xff;
            res |= byte << (8 * (bytes - 1 - i));
        }
        self.with(res)
    }

    pub fn compare(&self, op: Op, rhs: &Self) -> Option<bool> {
        let (ua, ub) = (self.value, rhs.value);
        let (sa, sb) = (self.signed(), rhs.signed());
        let res = match op {
            Op::Eq => ua == ub,
            Op::Ne => ua != ub,
            Op::ULT => ua < ub,
            Op::ULE => ua <= ub,
            Op::UGT => ua > ub,
            Op::UGE => ua >= ub,
            Op::SLT => sa < sb,
            Op::SLE => sa <= sb,
            Op::SGT => sa > sb,
            Op::SGE => sa >= sb,
            _ => return None,
        };
        Some(res)
    }
}

impl Display for BitVec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

/// A concrete value: either a boolean or a bitvector.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Value {
    Bool(bool),
    Bv(BitVec),
}

impl Value {
    /// The value as an unsigned integer; booleans become 0 or 1.
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::Bool(b) => *b as u64,
            Value::Bv(bv) => bv.value(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Bv(_) => None,
        }
    }

    pub fn as_bv(&self) -> Option<BitVec> {
        match self {
            Value::Bool(_) => None,
            Value::Bv(bv) => Some(*bv),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Bv(bv) => write!(f, "{}", bv),
        }
    }
}

fn fold_bv(values: &[Value], f: impl Fn(&BitVec, &BitVec) -> BitVec) -> Option<Value> {
    let mut iter = values.iter().map(Value::as_bv);
    let mut acc = iter.next()??;
    for v in iter {
        acc = f(&acc, &v?);
    }
    Some(Value::Bv(acc))
}

fn binary_bv(values: &[Value]) -> Option<(BitVec, BitVec)> {
    match values {
        [Value::Bv(a), Value::Bv(b)] if a.bits() == b.bits() => Some((*a, *b)),
        _ => None,
    }
}

/// Evaluate `op` over concrete operands.
///
/// `params` carries the integer parameters of the operation (extract bounds,
/// extension widths). Returns `None` for operations that have no concrete
/// meaning (leaves, value-set operations) or for ill-shaped operands.
pub fn apply(op: Op, params: &[u64], values: &[Value]) -> Option<Value> {
    let res = match op {
        Op::Add => fold_bv(values, BitVec::add)?,
        Op::Mul => fold_bv(values, BitVec::mul)?,
        Op::BvAnd => fold_bv(values, BitVec::and)?,
        Op::BvOr => fold_bv(values, BitVec::or)?,
        Op::BvXor => fold_bv(values, BitVec::xor)?,
        Op::Concat => fold_bv(values, BitVec::concat)?,
        Op::Sub | Op::UDiv | Op::SDiv | Op::URem | Op::SMod | Op::Shl | Op::LShR | Op::AShR => {
            let (a, b) = binary_bv(values)?;
            let res = match op {
                Op::Sub => a.sub(&b),
                Op::UDiv => a.udiv(&b),
                Op::SDiv => a.sdiv(&b),
                Op::URem => a.urem(&b),
                Op::SMod => a.srem(&b),
                Op::Shl => a.shl(&b),
                Op::LShR => a.lshr(&b),
                _ => a.ashr(&b),
            };
            Value::Bv(res)
        }
        Op::Neg | Op::BvNot | Op::Reverse => {
            let a = match values {
                [Value::Bv(a)] => *a,
                _ => return None,
            };
            let res = match op {
                Op::Neg => a.neg(),
                Op::BvNot => a.not(),
                _ => a.reversed(),
            };
            Value::Bv(res)
        }
        Op::Extract => {
            let (hi, lo) = match params {
                [hi, lo] => (*hi as u32, *lo as u32),
                _ => return None,
            };
            Value::Bv(values.first()?.as_bv()?.extract(hi, lo))
        }
        Op::ZeroExt | Op::SignExt => {
            let n = *params.first()? as u32;
            let a = values.first()?.as_bv()?;
            if op == Op::ZeroExt {
                Value::Bv(a.zero_extend(n))
            } else {
                Value::Bv(a.sign_extend(n))
            }
        }
        Op::Eq | Op::Ne => match values {
            [Value::Bool(a), Value::Bool(b)] => Value::Bool((a == b) == (op == Op::Eq)),
            _ => {
                let (a, b) = binary_bv(values)?;
                Value::Bool(a.compare(op, &b)?)
            }
        },
        _ if op.is_comparison() => {
            let (a, b) = binary_bv(values)?;
            Value::Bool(a.compare(op, &b)?)
        }
        Op::And => {
            let mut res = true;
            for v in values {
                res &= v.as_bool()?;
            }
            Value::Bool(res)
        }
        Op::Or => {
            let mut res = false;
            for v in values {
                res |= v.as_bool()?;
            }
            Value::Bool(res)
        }
        Op::Not => Value::Bool(!values.first()?.as_bool()?),
        Op::If => match values {
            [Value::Bool(c), a, b] => {
                if *c {
                    *a
                } else {
                    *b
                }
            }
            _ => return None,
        },
        _ => return None,
    };
    Some(res)
}
