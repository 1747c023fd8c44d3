//! Strided interval abstract domain.
//!
//! A strided interval over `bits`-wide bitvectors is the set
//! `{lower + k*stride : k >= 0}` walked upward (modulo `2^bits`) until `upper`.
//! Intervals may wrap around zero. Every operation returns a sound
//! over-approximation of the pointwise result; `intersection` may be empty.

use std::cmp::{max, min};
use std::fmt;

use num_bigint::BigUint;

use crate::value::{mask, to_signed, BitVec};

/// Three-valued truth used by the abstract domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolResult {
    True,
    False,
    Maybe,
}

impl BoolResult {
    pub fn from_bool(value: bool) -> Self {
        if value {
            BoolResult::True
        } else {
            BoolResult::False
        }
    }

    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (BoolResult::False, _) | (_, BoolResult::False) => BoolResult::False,
            (BoolResult::True, BoolResult::True) => BoolResult::True,
            _ => BoolResult::Maybe,
        }
    }

    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (BoolResult::True, _) | (_, BoolResult::True) => BoolResult::True,
            (BoolResult::False, BoolResult::False) => BoolResult::False,
            _ => BoolResult::Maybe,
        }
    }

    pub fn not(self) -> Self {
        match self {
            BoolResult::True => BoolResult::False,
            BoolResult::False => BoolResult::True,
            BoolResult::Maybe => BoolResult::Maybe,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            BoolResult::True => Some(true),
            BoolResult::False => Some(false),
            BoolResult::Maybe => None,
        }
    }

    pub fn cardinality(self) -> u64 {
        match self {
            BoolResult::Maybe => 2,
            _ => 1,
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn extended_gcd(a: i128, b: i128) -> (i128, i128, i128) {
    if b == 0 {
        (a, 1, 0)
    } else {
        let (g, x, y) = extended_gcd(b, a % b);
        (g, y, x - (a / b) * y)
    }
}

/// All ones up to and including the highest set bit of `x`.
fn fill_ones(x: u64) -> u64 {
    if x == 0 {
        0
    } else {
        u64::MAX >> x.leading_zeros()
    }
}

fn modulus(bits: u32) -> u128 {
    1u128 << bits
}

/// A strided interval of fixed bit-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StridedInterval {
    bits: u32,
    stride: u64,
    lower: u64,
    upper: u64,
    empty: bool,
}

impl StridedInterval {
    /// Create a normalized interval.
    ///
    /// Bounds are taken modulo `2^bits`, and `upper` is moved down onto the
    /// last point reachable from `lower` with the given stride.
    pub fn new(bits: u32, stride: u64, lower: u64, upper: u64) -> Self {
        assert!(bits > 0 && bits <= 64, "Bit width should be in the range 1..=64");
        let m = mask(bits);
        let (lower, upper) = (lower & m, upper & m);
        if lower == upper {
            return Self::singleton(bits, lower);
        }
        let stride = if stride == 0 { 1 } else { stride };
        let span = upper.wrapping_sub(lower) & m;
        let steps = span / stride;
        if steps == 0 {
            return Self::singleton(bits, lower);
        }
        let upper = lower.wrapping_add(steps.wrapping_mul(stride)) & m;
        Self {
            bits,
            stride,
            lower,
            upper,
            empty: false,
        }
    }

    pub fn singleton(bits: u32, value: u64) -> Self {
        Self {
            bits,
            stride: 0,
            lower: value & mask(bits),
            upper: value & mask(bits),
            empty: false,
        }
    }

    pub fn top(bits: u32) -> Self {
        Self::new(bits, 1, 0, mask(bits))
    }

    pub fn empty(bits: u32) -> Self {
        Self {
            bits,
            stride: 0,
            lower: 0,
            upper: 0,
            empty: true,
        }
    }

    /// Interval holding every value in `lo..=hi`, read as signed numbers.
    fn from_signed(bits: u32, lo: i128, hi: i128) -> Self {
        if lo > hi {
            return Self::empty(bits);
        }
        if (hi - lo) as u128 >= modulus(bits) - 1 {
            return Self::top(bits);
        }
        Self::new(bits, 1, lo as u64, hi as u64)
    }

    /// Interval holding `lo..=hi` with the given stride, read as unsigned numbers.
    fn from_unsigned(bits: u32, stride: u64, lo: u128, hi: u128) -> Self {
        if lo > hi {
            return Self::empty(bits);
        }
        if hi - lo >= modulus(bits) - 1 {
            return Self::top(bits);
        }
        Self::new(bits, stride, lo as u64, hi as u64)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }
    pub fn stride(&self) -> u64 {
        self.stride
    }
    pub fn lower(&self) -> u64 {
        self.lower
    }
    pub fn upper(&self) -> u64 {
        self.upper
    }
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    fn span(&self) -> u64 {
        self.upper.wrapping_sub(self.lower) & mask(self.bits)
    }

    fn count(&self) -> u128 {
        if self.empty {
            0
        } else if self.stride == 0 {
            1
        } else {
            (self.span() / self.stride) as u128 + 1
        }
    }

    /// Number of concrete values in the set.
    pub fn cardinality(&self) -> BigUint {
        BigUint::from(self.count())
    }

    pub fn singlevalued(&self) -> bool {
        self.count() == 1
    }

    pub fn multivalued(&self) -> bool {
        self.count() > 1
    }

    pub fn is_top(&self) -> bool {
        self.count() == modulus(self.bits)
    }

    /// The single value of the set, if it has exactly one.
    pub fn as_singleton(&self) -> Option<u64> {
        if self.singlevalued() {
            Some(self.lower)
        } else {
            None
        }
    }

    /// Whether the arc passes from the maximum value back to zero.
    pub fn is_wrapping(&self) -> bool {
        !self.empty && self.lower > self.upper
    }

    /// Whether the arc passes from the largest to the smallest signed value.
    fn crosses_signed_boundary(&self) -> bool {
        if self.empty || self.stride == 0 {
            return false;
        }
        let smax = mask(self.bits) >> 1;
        let to_boundary = smax.wrapping_sub(self.lower) & mask(self.bits);
        to_boundary < self.span()
    }

    pub fn contains(&self, value: u64) -> bool {
        if self.empty {
            return false;
        }
        let offset = value.wrapping_sub(self.lower) & mask(self.bits);
        if self.stride == 0 {
            return offset == 0;
        }
        offset <= self.span() && offset % self.stride == 0
    }

    /// Smallest and largest member, read as unsigned numbers.
    pub fn unsigned_bounds(&self) -> (u64, u64) {
        if self.is_wrapping() {
            (0, mask(self.bits))
        } else {
            (self.lower, self.upper)
        }
    }

    /// Smallest and largest member, read as signed numbers.
    pub fn signed_bounds(&self) -> (i64, i64) {
        if self.crosses_signed_boundary() {
            let smax = (mask(self.bits) >> 1) as i64;
            (-smax - 1, smax)
        } else {
            (to_signed(self.lower, self.bits), to_signed(self.upper, self.bits))
        }
    }

    /// Iterate over all members in arc order.
    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        let m = mask(self.bits);
        (0..self.count()).map(move |k| self.lower.wrapping_add((k as u64).wrapping_mul(self.stride)) & m)
    }

    /// Structural equality of the represented sets.
    pub fn identical(&self, other: &Self) -> bool {
        self == other
    }

    /// Non-wrapping pieces `(lo, hi, stride)` covering the set.
    fn pieces(&self) -> Vec<(u64, u64, u64)> {
        if self.empty {
            return vec![];
        }
        if !self.is_wrapping() {
            return vec![(self.lower, self.upper, self.stride)];
        }
        let m = mask(self.bits);
        let steps = (m - self.lower) / self.stride;
        let first_hi = self.lower + steps * self.stride;
        let second_lo = ((first_hi as u128 + self.stride as u128) - modulus(self.bits)) as u64;
        vec![(self.lower, first_hi, self.stride), (second_lo, self.upper, self.stride)]
    }

    /// Smallest strided interval containing both sets.
    pub fn union(&self, other: &Self) -> Self {
        assert_eq!(self.bits, other.bits);
        if self.empty {
            return *other;
        }
        if other.empty {
            return *self;
        }
        let bits = self.bits;
        let m = mask(bits);
        let dist = |a: u64, b: u64| b.wrapping_sub(a) & m;

        // An arc starting at `start` covers `b` only if `b` does not straddle `start`.
        let candidate = |a: &Self, b: &Self| -> Option<(u64, u64, u128)> {
            let start = a.lower;
            if b.stride != 0 && dist(start, b.lower) > dist(start, b.upper) {
                return None;
            }
            let stride = gcd(gcd(a.stride, b.stride), dist(start, b.lower));
            let len = max(dist(start, a.upper), dist(start, b.upper));
            let count = if stride == 0 { 1 } else { (len / stride) as u128 + 1 };
            Some((stride, len, count))
        };
        let first = candidate(self, other).map(|c| (self.lower, c));
        let second = candidate(other, self).map(|c| (other.lower, c));
        let best = match (first, second) {
            (Some(a), Some(b)) => Some(if b.1 .2 < a.1 .2 { b } else { a }),
            (a, b) => a.or(b),
        };
        match best {
            Some((start, (stride, len, _))) => Self::new(bits, stride, start, start.wrapping_add(len)),
            None => Self::top(bits),
        }
    }

    /// The set of values present in both intervals.
    pub fn intersection(&self, other: &Self) -> Self {
        assert_eq!(self.bits, other.bits);
        let mut res = Self::empty(self.bits);
        for &(l1, u1, s1) in &self.pieces() {
            for &(l2, u2, s2) in &other.pieces() {
                if let Some((lo, hi, stride)) = intersect_linear(l1, u1, s1, l2, u2, s2) {
                    res = res.union(&Self::new(self.bits, stride, lo, hi));
                }
            }
        }
        res
    }

    pub fn add(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        let span = self.span() as u128 + other.span() as u128;
        if span >= modulus(self.bits) {
            return Self::top(self.bits);
        }
        Self::new(
            self.bits,
            gcd(self.stride, other.stride),
            self.lower.wrapping_add(other.lower),
            self.upper.wrapping_add(other.upper),
        )
    }

    pub fn neg(&self) -> Self {
        if self.empty {
            return *self;
        }
        Self::new(self.bits, self.stride, self.upper.wrapping_neg(), self.lower.wrapping_neg())
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn not(&self) -> Self {
        if self.empty {
            return *self;
        }
        Self::new(self.bits, self.stride, !self.upper, !self.lower)
    }

    fn both_singletons(&self, other: &Self) -> Option<(BitVec, BitVec)> {
        match (self.as_singleton(), other.as_singleton()) {
            (Some(a), Some(b)) => Some((BitVec::new(a, self.bits), BitVec::new(b, other.bits))),
            _ => None,
        }
    }

    fn exact(bv: BitVec) -> Self {
        Self::singleton(bv.bits(), bv.value())
    }

    pub fn mul(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.mul(&b));
        }
        let bits = self.bits;
        let scale = |x: &Self, c: u64| -> Self {
            if c == 0 {
                return Self::singleton(bits, 0);
            }
            if x.span() as u128 * c as u128 >= modulus(bits) {
                return Self::top(bits);
            }
            Self::new(bits, x.stride * c, x.lower.wrapping_mul(c), x.upper.wrapping_mul(c))
        };
        if let Some(c) = other.as_singleton() {
            return scale(self, c);
        }
        if let Some(c) = self.as_singleton() {
            return scale(other, c);
        }
        let (a0, a1) = self.unsigned_bounds();
        let (b0, b1) = other.unsigned_bounds();
        let hi = a1 as u128 * b1 as u128;
        if hi >= modulus(bits) {
            return Self::top(bits);
        }
        Self::from_unsigned(bits, 1, a0 as u128 * b0 as u128, hi)
    }

    pub fn udiv(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.udiv(&b));
        }
        let (a0, a1) = self.unsigned_bounds();
        let (b0, b1) = other.unsigned_bounds();
        if b0 == 0 {
            return Self::top(self.bits);
        }
        Self::from_unsigned(self.bits, 1, (a0 / b1) as u128, (a1 / b0) as u128)
    }

    pub fn urem(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.urem(&b));
        }
        let (_, a1) = self.unsigned_bounds();
        let (b0, b1) = other.unsigned_bounds();
        let hi = if b0 == 0 { a1 } else { min(a1, b1 - 1) };
        Self::from_unsigned(self.bits, 1, 0, hi as u128)
    }

    /// Signed division, truncating toward zero.
    pub fn sdiv(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.sdiv(&b));
        }
        let (a0, a1) = self.signed_bounds();
        let (b0, b1) = other.signed_bounds();
        if b0 <= 0 && 0 <= b1 {
            return Self::top(self.bits);
        }
        let corners = [
            a0 as i128 / b0 as i128,
            a0 as i128 / b1 as i128,
            a1 as i128 / b0 as i128,
            a1 as i128 / b1 as i128,
        ];
        let lo = corners.iter().copied().min().unwrap_or(0);
        let hi = corners.iter().copied().max().unwrap_or(0);
        Self::from_signed(self.bits, lo, hi)
    }

    /// Signed remainder with the sign of the dividend.
    pub fn srem(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.srem(&b));
        }
        let (a0, a1) = self.signed_bounds();
        let (b0, b1) = other.signed_bounds();
        let (a0, a1, b0, b1) = (a0 as i128, a1 as i128, b0 as i128, b1 as i128);
        let mut limit = max(b0.abs(), b1.abs()) - 1;
        if b0 <= 0 && 0 <= b1 {
            limit = max(limit, max(a0.abs(), a1.abs()));
        }
        let lo = if a0 < 0 { max(a0, -limit) } else { 0 };
        let hi = if a1 > 0 { min(a1, limit) } else { 0 };
        Self::from_signed(self.bits, lo, hi)
    }

    pub fn and(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.and(&b));
        }
        let (_, a1) = self.unsigned_bounds();
        let (_, b1) = other.unsigned_bounds();
        Self::from_unsigned(self.bits, 1, 0, min(a1, b1) as u128)
    }

    pub fn or(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.or(&b));
        }
        let (a0, a1) = self.unsigned_bounds();
        let (b0, b1) = other.unsigned_bounds();
        Self::from_unsigned(self.bits, 1, max(a0, b0) as u128, fill_ones(a1 | b1) as u128)
    }

    pub fn xor(&self, other: &Self) -> Self {
        if self.empty || other.empty {
            return Self::empty(self.bits);
        }
        if let Some((a, b)) = self.both_singletons(other) {
            return Self::exact(a.xor(&b));
        }
        let (_, a1) = self.unsigned_bounds();
        let (_, b1) = other.unsigned_bounds();
        Self::from_unsigned(self.bits, 1, 0, fill_ones(a1 | b1) as u128)
    }

    pub fn shl(&self, amount: &Self) -> Self {
        if self.empty || amount.empty {
            return Self::empty(self.bits);
        }
        match amount.as_singleton() {
            Some(k) if k >= self.bits as u64 => Self::singleton(self.bits, 0),
            Some(k) => self.mul(&Self::singleton(self.bits, 1u64 << k)),
            None => Self::top(self.bits),
        }
    }

    pub fn lshr(&self, amount: &Self) -> Self {
        if self.empty || amount.empty {
            return Self::empty(self.bits);
        }
        let (a0, a1) = self.unsigned_bounds();
        match amount.as_singleton() {
            Some(k) if k >= self.bits as u64 => Self::singleton(self.bits, 0),
            Some(k) => Self::from_unsigned(self.bits, 1, (a0 >> k) as u128, (a1 >> k) as u128),
            None => Self::from_unsigned(self.bits, 1, 0, a1 as u128),
        }
    }

    pub fn ashr(&self, amount: &Self) -> Self {
        if self.empty || amount.empty {
            return Self::empty(self.bits);
        }
        let (a0, a1) = self.signed_bounds();
        match amount.as_singleton() {
            Some(k) => {
                let k = min(k, self.bits as u64 - 1);
                Self::from_signed(self.bits, (a0 >> k) as i128, (a1 >> k) as i128)
            }
            None => {
                let lo = if a0 < 0 { a0 } else { 0 };
                let hi = if a1 < 0 { -1 } else { a1 };
                Self::from_signed(self.bits, lo as i128, hi as i128)
            }
        }
    }

    /// Concatenate with `low` in the least significant bits.
    pub fn concat(&self, low: &Self) -> Self {
        let bits = self.bits + low.bits;
        assert!(bits <= 64);
        if self.empty || low.empty {
            return Self::empty(bits);
        }
        let (a0, a1) = self.unsigned_bounds();
        let (b0, b1) = low.unsigned_bounds();
        let stride = if self.is_wrapping() || low.is_wrapping() {
            1
        } else {
            gcd(self.stride << low.bits, low.stride)
        };
        Self::new(bits, stride, (a0 << low.bits) | b0, (a1 << low.bits) | b1)
    }

    pub fn extract(&self, hi: u32, lo: u32) -> Self {
        assert!(lo <= hi && hi < self.bits);
        let bits = hi - lo + 1;
        if self.empty {
            return Self::empty(bits);
        }
        if let Some(v) = self.as_singleton() {
            return Self::exact(BitVec::new(v, self.bits).extract(hi, lo));
        }
        let (shifted, stride) = if lo == 0 {
            (*self, self.stride)
        } else {
            (self.lshr(&Self::singleton(self.bits, lo as u64)), 1)
        };
        if shifted.span() as u128 >= modulus(bits) - 1 {
            return Self::top(bits);
        }
        Self::new(bits, stride, shifted.lower, shifted.upper)
    }

    pub fn zero_extend(&self, n: u32) -> Self {
        let bits = self.bits + n;
        if self.empty {
            return Self::empty(bits);
        }
        if self.is_wrapping() {
            return Self::from_unsigned(bits, 1, 0, mask(self.bits) as u128);
        }
        Self::new(bits, self.stride, self.lower, self.upper)
    }

    pub fn sign_extend(&self, n: u32) -> Self {
        let bits = self.bits + n;
        if self.empty {
            return Self::empty(bits);
        }
        if self.crosses_signed_boundary() {
            let (lo, hi) = self.signed_bounds();
            return Self::from_signed(bits, lo as i128, hi as i128);
        }
        Self::new(
            bits,
            self.stride,
            to_signed(self.lower, self.bits) as u64,
            to_signed(self.upper, self.bits) as u64,
        )
    }

    pub fn reversed(&self) -> Self {
        match self.as_singleton() {
            Some(v) => Self::exact(BitVec::new(v, self.bits).reversed()),
            None if self.empty => *self,
            None => Self::top(self.bits),
        }
    }

    pub fn eq(&self, other: &Self) -> BoolResult {
        if let Some((a, b)) = self.both_singletons(other) {
            return BoolResult::from_bool(a == b);
        }
        if self.intersection(other).is_empty() {
            BoolResult::False
        } else {
            BoolResult::Maybe
        }
    }

    pub fn ult(&self, other: &Self) -> BoolResult {
        let (a0, a1) = self.unsigned_bounds();
        let (b0, b1) = other.unsigned_bounds();
        compare_bounds(a1 < b0, a0 >= b1)
    }

    pub fn ule(&self, other: &Self) -> BoolResult {
        let (a0, a1) = self.unsigned_bounds();
        let (b0, b1) = other.unsigned_bounds();
        compare_bounds(a1 <= b0, a0 > b1)
    }

    pub fn slt(&self, other: &Self) -> BoolResult {
        let (a0, a1) = self.signed_bounds();
        let (b0, b1) = other.signed_bounds();
        compare_bounds(a1 < b0, a0 >= b1)
    }

    pub fn sle(&self, other: &Self) -> BoolResult {
        let (a0, a1) = self.signed_bounds();
        let (b0, b1) = other.signed_bounds();
        compare_bounds(a1 <= b0, a0 > b1)
    }
}

fn compare_bounds(always: bool, never: bool) -> BoolResult {
    if always {
        BoolResult::True
    } else if never {
        BoolResult::False
    } else {
        BoolResult::Maybe
    }
}

/// Intersect two non-wrapping progressions.
fn intersect_linear(l1: u64, u1: u64, s1: u64, l2: u64, u2: u64, s2: u64) -> Option<(u64, u64, u64)> {
    let lo = max(l1, l2);
    let hi = min(u1, u2);
    if lo > hi {
        return None;
    }
    let member = |x: u64, l: u64, s: u64| if s == 0 { x == l } else { (x - l) % s == 0 };
    if s1 == 0 {
        return member(l1, l2, s2).then_some((l1, l1, 0));
    }
    if s2 == 0 {
        return member(l2, l1, s1).then_some((l2, l2, 0));
    }

    // Fall back to the hull when the residue arithmetic does not fit.
    solve_congruence(l1, s1, l2, s2, lo, hi).unwrap_or(Some((lo, hi, 1)))
}

/// Solve `x = l1 (mod s1)`, `x = l2 (mod s2)` for `x` in `lo..=hi`.
///
/// The outer `None` means the residue arithmetic overflowed.
fn solve_congruence(l1: u64, s1: u64, l2: u64, s2: u64, lo: u64, hi: u64) -> Option<Option<(u64, u64, u64)>> {
    let (a, b) = (s1 as i128, s2 as i128);
    let (g, p, _) = extended_gcd(a, b);
    let diff = l2 as i128 - l1 as i128;
    if diff % g != 0 {
        return Some(None);
    }
    let m = b / g;
    let lcm = (a / g).checked_mul(b)?;
    let k = ((diff / g) % m).checked_mul(p % m)? % m;
    let k = (k + m) % m;
    let x0 = (l1 as i128).checked_add(a.checked_mul(k)?)?;

    // Smallest solution not below `lo`.
    let (lo, hi) = (lo as i128, hi as i128);
    let first = if x0 >= lo {
        x0 - ((x0 - lo) / lcm) * lcm
    } else {
        x0 + ((lo - x0 + lcm - 1) / lcm) * lcm
    };
    if first > hi {
        return Some(None);
    }
    let last = first + ((hi - first) / lcm) * lcm;
    let stride = if last == first { 0 } else { lcm as u64 };
    Some(Some((first as u64, last as u64, stride)))
}

impl fmt::Display for StridedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            write!(f, "<{}>[EmptySI]", self.bits)
        } else {
            write!(f, "<{}>{}[{:#x}, {:#x}]", self.bits, self.stride, self.lower, self.upper)
        }
    }
}
