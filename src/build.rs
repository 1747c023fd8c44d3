//! Public constructors and operators.
//!
//! Everything here checks operand shapes, coerces plain Rust values into
//! literals of the matching width, and hands the node to the simplifier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use num_bigint::BigUint;

use crate::ast::{Arg, Ast, Symbol};
use crate::backend::vsa::{Abstract, VsaBackend};
use crate::error::{Error, Result};
use crate::intern::{intern, next_id};
use crate::interval::StridedInterval;
use crate::op::{Op, Sort};
use crate::simplify::{bool_literal, build, bv_literal};
use crate::value::mask;

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

fn check_bits(bits: u32) -> Result<()> {
    if bits == 0 || bits > Sort::MAX_BITS {
        return Err(value_error!("bit-length {} is outside 1..={}", bits, Sort::MAX_BITS));
    }
    Ok(())
}

fn auto_name(name: &str, bits: u32) -> String {
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", name, n, bits)
}

/// An operand that has not been given a sort yet.
///
/// Plain integers, byte strings and booleans are turned into literals of the
/// sort expected by the operation they are used in.
#[derive(Debug, Clone)]
pub enum Operand {
    Ast(Ast),
    Int(i128),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl Operand {
    /// The sort the operand carries on its own, if any.
    pub fn sort(&self) -> Option<Sort> {
        match self {
            Operand::Ast(ast) => Some(ast.sort()),
            Operand::Bytes(bytes) => Some(Sort::Bv(8 * bytes.len() as u32)),
            Operand::Bool(_) => Some(Sort::Bool),
            Operand::Int(_) => None,
        }
    }

    /// Coerce into an expression of the given sort.
    pub fn into_sort(self, sort: Sort) -> Result<Ast> {
        let ast = match (self, sort) {
            (Operand::Ast(ast), _) => ast,
            (Operand::Int(v), Sort::Bv(bits)) => bv_literal(v as u64, bits),
            (Operand::Bytes(bytes), Sort::Bv(bits)) => bvv_bytes(&bytes, Some(bits)).map_err(|_| {
                shape_error!("{}-byte string cannot be used as a {}-bit operand", bytes.len(), bits)
            })?,
            (Operand::Bool(b), Sort::Bool) => bool_literal(b),
            (operand, sort) => return Err(shape_error!("cannot use {:?} as {}", operand, sort)),
        };
        if ast.sort() != sort {
            return Err(shape_error!("expected {}, got {}", sort, ast.sort()));
        }
        Ok(ast)
    }

    /// Coerce into an expression without a sort hint.
    pub fn into_ast(self) -> Result<Ast> {
        match self.sort() {
            Some(sort) => self.into_sort(sort),
            None => Err(shape_error!("cannot infer the bit-length of {:?}", self)),
        }
    }
}

impl From<Ast> for Operand {
    fn from(ast: Ast) -> Self {
        Operand::Ast(ast)
    }
}

impl From<&Ast> for Operand {
    fn from(ast: &Ast) -> Self {
        Operand::Ast(ast.clone())
    }
}

macro_rules! operand_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Int(v as i128)
                }
            }
        )*
    };
}

operand_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Bool(b)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Bytes(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Operand {
    fn from(bytes: &[u8]) -> Self {
        Operand::Bytes(bytes.to_vec())
    }
}

/// Builder for bitvector symbols.
///
/// ```
/// use symbv_rs::Bvs;
///
/// let y = Bvs::new("y", 32).min(100).max(120).build().unwrap();
/// assert_eq!(y.length(), 32);
/// ```
#[derive(Debug, Clone)]
pub struct Bvs {
    name: String,
    bits: u32,
    min: Option<u64>,
    max: Option<u64>,
    explicit_name: bool,
}

impl Bvs {
    pub fn new(name: impl Into<String>, bits: u32) -> Self {
        Self {
            name: name.into(),
            bits,
            min: None,
            max: None,
            explicit_name: false,
        }
    }

    /// Smallest value the symbol may take.
    pub fn min(mut self, min: u64) -> Self {
        self.min = Some(min);
        self
    }

    /// Largest value the symbol may take.
    pub fn max(mut self, max: u64) -> Self {
        self.max = Some(max);
        self
    }

    /// Use the name verbatim instead of making it unique.
    pub fn explicit_name(mut self) -> Self {
        self.explicit_name = true;
        self
    }

    pub fn build(self) -> Result<Ast> {
        check_bits(self.bits)?;
        let min = self.min.unwrap_or(0);
        let max = self.max.unwrap_or(mask(self.bits));
        if min > max || max > mask(self.bits) {
            return Err(value_error!(
                "bounds [{}, {}] do not fit a {}-bit symbol",
                min,
                max,
                self.bits
            ));
        }
        let name = if self.explicit_name {
            self.name
        } else {
            auto_name(&self.name, self.bits)
        };
        Ok(symbol_leaf(Symbol::new(name, min, max), Sort::Bv(self.bits)))
    }
}

pub(crate) fn symbol_leaf(symbol: Symbol, sort: Sort) -> Ast {
    let op = if sort.is_bool() { Op::BoolS } else { Op::BVS };
    intern(op, sort, vec![Arg::Symbol(Arc::new(symbol))])
}

/// A fresh bitvector symbol named `{name}_{counter}_{bits}`.
pub fn bvs(name: &str, bits: u32) -> Result<Ast> {
    Bvs::new(name, bits).build()
}

/// A bitvector symbol named exactly `name`.
pub fn bvs_explicit(name: &str, bits: u32) -> Result<Ast> {
    Bvs::new(name, bits).explicit_name().build()
}

/// A fresh bitvector symbol restricted to `min..=max`.
pub fn bvs_bounded(name: &str, bits: u32, min: u64, max: u64) -> Result<Ast> {
    Bvs::new(name, bits).min(min).max(max).build()
}

/// A bitvector literal. Values are taken modulo `2^bits`, so negative numbers
/// become their two's complement.
pub fn bvv(value: impl Into<i128>, bits: u32) -> Result<Ast> {
    check_bits(bits)?;
    Ok(bv_literal(value.into() as u64, bits))
}

/// A bitvector literal from a big-endian byte string.
///
/// The first byte ends up in the most significant position. When `bits` is
/// given it must equal eight times the byte count.
pub fn bvv_bytes(bytes: &[u8], bits: Option<u32>) -> Result<Ast> {
    let width = 8 * bytes.len() as u32;
    if let Some(bits) = bits {
        if bits != width {
            return Err(value_error!("{} bytes do not make a {}-bit value", bytes.len(), bits));
        }
    }
    check_bits(width)?;
    let value = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    Ok(bv_literal(value, width))
}

pub fn bool_val(value: bool) -> Ast {
    bool_literal(value)
}

/// A fresh boolean symbol named `{name}_{counter}`.
pub fn bool_sym(name: &str) -> Ast {
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    symbol_leaf(Symbol::new(format!("{}_{}", name, n), 0, 1), Sort::Bool)
}

/// A boolean symbol named exactly `name`.
pub fn bool_sym_explicit(name: &str) -> Ast {
    symbol_leaf(Symbol::new(name, 0, 1), Sort::Bool)
}

/// A strided-interval leaf.
///
/// Every call creates a distinct node, even for equal intervals.
pub fn si(bits: u32, stride: u64, lower: u64, upper: u64) -> Result<Ast> {
    check_bits(bits)?;
    let interval = StridedInterval::new(bits, stride, lower, upper);
    let args = vec![Arg::Interval(interval), Arg::Int(next_id())];
    Ok(intern(Op::SI, Sort::Bv(bits), args))
}

/// If-then-else. Plain values in the arms take the sort of the other arm.
pub fn ite(cond: impl Into<Operand>, then: impl Into<Operand>, orelse: impl Into<Operand>) -> Result<Ast> {
    let cond = cond.into().into_sort(Sort::Bool)?;
    let (then, orelse) = (then.into(), orelse.into());
    let sort = then
        .sort()
        .or_else(|| orelse.sort())
        .ok_or_else(|| shape_error!("cannot infer the sort of an if-then-else"))?;
    let then = then.into_sort(sort)?;
    let orelse = orelse.into_sort(sort)?;
    Ok(build(Op::If, sort, vec![cond.into(), then.into(), orelse.into()]))
}

fn connective(op: Op, terms: impl IntoIterator<Item = impl Into<Operand>>) -> Result<Ast> {
    let args = terms
        .into_iter()
        .map(|t| t.into().into_sort(Sort::Bool).map(Arg::Ast))
        .collect::<Result<Vec<_>>>()?;
    Ok(build(op, Sort::Bool, args))
}

/// Conjunction; the empty conjunction is true.
pub fn and(terms: impl IntoIterator<Item = impl Into<Operand>>) -> Result<Ast> {
    connective(Op::And, terms)
}

/// Disjunction; the empty disjunction is false.
pub fn or(terms: impl IntoIterator<Item = impl Into<Operand>>) -> Result<Ast> {
    connective(Op::Or, terms)
}

pub fn not(term: impl Into<Operand>) -> Result<Ast> {
    let term = term.into().into_sort(Sort::Bool)?;
    Ok(build(Op::Not, Sort::Bool, vec![term.into()]))
}

/// Concatenate bitvectors; the first one ends up most significant.
pub fn concat(parts: impl IntoIterator<Item = Ast>) -> Result<Ast> {
    let parts: Vec<Ast> = parts.into_iter().collect();
    if parts.is_empty() {
        return Err(shape_error!("cannot concatenate zero bitvectors"));
    }
    let mut bits = 0;
    for part in &parts {
        bits += expect_bv(part)?;
    }
    if bits > Sort::MAX_BITS {
        return Err(shape_error!("concatenation is {} bits wide", bits));
    }
    Ok(build(Op::Concat, Sort::Bv(bits), parts.into_iter().map(Arg::Ast).collect()))
}

fn expect_bv(ast: &Ast) -> Result<u32> {
    match ast.sort() {
        Sort::Bv(bits) => Ok(bits),
        Sort::Bool => Err(shape_error!("expected a bitvector, got {}", ast)),
    }
}

fn expect_bool(ast: &Ast) -> Result<()> {
    match ast.sort() {
        Sort::Bool => Ok(()),
        _ => Err(shape_error!("expected a boolean, got {}", ast)),
    }
}

/// Resolve a Python-style slice bound against a bit-length.
fn slice_bound(bound: Option<i64>, default: u32, bits: u32) -> Result<u32> {
    let bound = match bound {
        None => return Ok(default),
        Some(b) if b < 0 => b + bits as i64,
        Some(b) => b,
    };
    if bound < 0 || bound >= bits as i64 {
        return Err(shape_error!("bit index {} out of range for {} bits", bound, bits));
    }
    Ok(bound as u32)
}

#[allow(clippy::should_implement_trait)]
impl Ast {
    fn bv_binary(&self, op: Op, rhs: impl Into<Operand>) -> Result<Ast> {
        expect_bv(self)?;
        let rhs = rhs.into().into_sort(self.sort())?;
        Ok(build(op, self.sort(), vec![self.into(), rhs.into()]))
    }

    fn bv_unary(&self, op: Op) -> Result<Ast> {
        expect_bv(self)?;
        Ok(build(op, self.sort(), vec![self.into()]))
    }

    fn comparison(&self, op: Op, rhs: impl Into<Operand>) -> Result<Ast> {
        if !matches!(op, Op::Eq | Op::Ne) {
            expect_bv(self)?;
        }
        let rhs = rhs.into().into_sort(self.sort())?;
        Ok(build(op, Sort::Bool, vec![self.into(), rhs.into()]))
    }

    pub fn add(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::Add, rhs)
    }
    pub fn sub(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::Sub, rhs)
    }
    pub fn mul(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::Mul, rhs)
    }
    /// Unsigned division; division by zero yields all ones.
    pub fn udiv(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::UDiv, rhs)
    }
    pub fn sdiv(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::SDiv, rhs)
    }
    /// Unsigned remainder; the remainder of division by zero is the dividend.
    pub fn urem(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::URem, rhs)
    }
    /// Signed remainder, taking the sign of the dividend.
    pub fn smod(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::SMod, rhs)
    }
    pub fn bvand(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::BvAnd, rhs)
    }
    pub fn bvor(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::BvOr, rhs)
    }
    pub fn bvxor(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::BvXor, rhs)
    }
    pub fn shl(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::Shl, rhs)
    }
    pub fn lshr(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::LShR, rhs)
    }
    pub fn ashr(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::AShR, rhs)
    }
    pub fn neg(&self) -> Result<Ast> {
        self.bv_unary(Op::Neg)
    }
    pub fn bvnot(&self) -> Result<Ast> {
        self.bv_unary(Op::BvNot)
    }

    pub fn eq_(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::Eq, rhs)
    }
    pub fn ne_(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::Ne, rhs)
    }
    pub fn ult(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::ULT, rhs)
    }
    pub fn ule(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::ULE, rhs)
    }
    pub fn ugt(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::UGT, rhs)
    }
    pub fn uge(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::UGE, rhs)
    }
    pub fn slt(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::SLT, rhs)
    }
    pub fn sle(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::SLE, rhs)
    }
    pub fn sgt(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::SGT, rhs)
    }
    pub fn sge(&self, rhs: impl Into<Operand>) -> Result<Ast> {
        self.comparison(Op::SGE, rhs)
    }

    /// `self` in the high bits, `low` in the low bits.
    pub fn concat(&self, low: impl Into<Operand>) -> Result<Ast> {
        let low = low.into().into_ast()?;
        concat([self.clone(), low])
    }

    /// Bits `hi..=lo`, counted from the least significant bit.
    pub fn extract(&self, hi: u32, lo: u32) -> Result<Ast> {
        let bits = expect_bv(self)?;
        if lo > hi || hi >= bits {
            return Err(shape_error!("cannot extract [{}:{}] from {} bits", hi, lo, bits));
        }
        let args = vec![Arg::Int(hi as u64), Arg::Int(lo as u64), self.into()];
        Ok(build(Op::Extract, Sort::Bv(hi - lo + 1), args))
    }

    /// Extract with slice bounds: `None` means the top (`hi`) or bottom (`lo`)
    /// bit, and negative bounds count down from the bit-length.
    pub fn slice(&self, hi: Option<i64>, lo: Option<i64>) -> Result<Ast> {
        let bits = expect_bv(self)?;
        let hi = slice_bound(hi, bits - 1, bits)?;
        let lo = slice_bound(lo, 0, bits)?;
        self.extract(hi, lo)
    }

    /// A single bit.
    pub fn bit(&self, index: u32) -> Result<Ast> {
        self.extract(index, index)
    }

    pub fn zero_extend(&self, n: u32) -> Result<Ast> {
        self.extend(Op::ZeroExt, n)
    }

    pub fn sign_extend(&self, n: u32) -> Result<Ast> {
        self.extend(Op::SignExt, n)
    }

    fn extend(&self, op: Op, n: u32) -> Result<Ast> {
        let bits = expect_bv(self)? + n;
        if bits > Sort::MAX_BITS {
            return Err(shape_error!("extension to {} bits", bits));
        }
        Ok(build(op, Sort::Bv(bits), vec![Arg::Int(n as u64), self.into()]))
    }

    /// Byte-order reversal. One-byte values are returned unchanged.
    pub fn reversed(&self) -> Result<Ast> {
        let bits = expect_bv(self)?;
        if bits % 8 != 0 {
            return Err(op_error!("cannot byte-reverse a {}-bit value", bits));
        }
        self.bv_unary(Op::Reverse)
    }

    /// Split into `bits`-wide pieces, most significant piece first.
    pub fn chop(&self, bits: u32) -> Result<Vec<Ast>> {
        let length = expect_bv(self)?;
        if bits == 0 || length % bits != 0 {
            return Err(shape_error!("cannot chop {} bits into {}-bit pieces", length, bits));
        }
        (0..length / bits)
            .rev()
            .map(|i| self.extract((i + 1) * bits - 1, i * bits))
            .collect()
    }

    /// Byte `index`, counting from the most significant byte.
    pub fn get_byte(&self, index: u32) -> Result<Ast> {
        let bits = expect_bv(self)?;
        if bits % 8 != 0 || 8 * (index + 1) > bits {
            return Err(shape_error!("no byte {} in a {}-bit value", index, bits));
        }
        let hi = bits - 1 - 8 * index;
        self.extract(hi, hi - 7)
    }

    /// Value-set union; only abstract backends give it a meaning.
    pub fn union(&self, other: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::Union, other)
    }

    /// Value-set intersection; only abstract backends give it a meaning.
    pub fn intersection(&self, other: impl Into<Operand>) -> Result<Ast> {
        self.bv_binary(Op::Intersection, other)
    }

    /// Number of values the expression may take, according to value-set analysis.
    pub fn cardinality(&self) -> BigUint {
        match VsaBackend.convert(self) {
            Abstract::Bv { si, .. } => si.cardinality(),
            Abstract::Bool(res) => BigUint::from(res.cardinality()),
        }
    }

    pub fn singlevalued(&self) -> bool {
        self.cardinality() == BigUint::from(1u32)
    }

    pub fn multivalued(&self) -> bool {
        self.cardinality() > BigUint::from(1u32)
    }

    /// Logical negation of a boolean expression.
    pub fn not(&self) -> Result<Ast> {
        expect_bool(self)?;
        not(self)
    }
}

/// Expressions have no native truth value; ask a solver or backend instead.
impl TryFrom<&Ast> for bool {
    type Error = Error;

    fn try_from(ast: &Ast) -> Result<Self> {
        Err(op_error!(
            "cannot use {} as a native boolean; query a backend with is_true or is_false",
            ast
        ))
    }
}

impl TryFrom<Ast> for bool {
    type Error = Error;

    fn try_from(ast: Ast) -> Result<Self> {
        bool::try_from(&ast)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_auto_names_are_unique() {
        let a = bvs("x", 32).unwrap();
        let b = bvs("x", 32).unwrap();
        assert_ne!(a, b);
        let name = a.symbol().unwrap().name().to_string();
        assert!(name.starts_with("x_") && name.ends_with("_32"), "name = {}", name);
        assert_eq!(bvs_explicit("x", 32).unwrap(), bvs_explicit("x", 32).unwrap());
    }

    #[test]
    fn test_literals() {
        assert_eq!(bvv(-1, 8).unwrap().literal(), Some(0xff));
        assert_eq!(bvv(0x1ff, 8).unwrap().literal(), Some(0xff));
        assert!(matches!(bvv(1, 0), Err(Error::Value(_))));
        assert!(matches!(bvv(1, 65), Err(Error::Value(_))));
        assert_eq!(bvv_bytes(b"AAAA", None).unwrap(), bvv(0x41414141, 32).unwrap());
        assert_eq!(bvv_bytes(b"AB", Some(16)).unwrap(), bvv(0x4142, 16).unwrap());
        assert!(matches!(bvv_bytes(b"AB", Some(8)), Err(Error::Value(_))));
    }

    #[test]
    fn test_bounds_validated() {
        assert!(Bvs::new("y", 8).min(10).max(5).build().is_err());
        assert!(Bvs::new("y", 8).max(256).build().is_err());
        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        let symbol = y.symbol().unwrap();
        assert_eq!((symbol.min(), symbol.max()), (100, 120));
    }

    #[test]
    fn test_shape_errors() {
        let x = bvs("x", 32).unwrap();
        let y = bvs("y", 16).unwrap();
        assert!(matches!(x.add(&y), Err(Error::Shape(_))));
        assert!(matches!(x.eq_(true), Err(Error::Shape(_))));
        assert!(matches!(x.extract(32, 0), Err(Error::Shape(_))));
        assert!(matches!(x.zero_extend(40), Err(Error::Shape(_))));
        assert!(matches!(bvs("z", 12).unwrap().reversed(), Err(Error::Operation(_))));
        assert!(matches!(ite(x.eq_(1).unwrap(), 1, 2), Err(Error::Shape(_))));
    }

    #[test]
    fn test_string_operand() {
        let x = bvs("x", 32).unwrap();
        let y = x.add("AAAA").unwrap();
        assert_eq!(y.children().nth(1).unwrap().literal(), Some(0x41414141));
        assert!(x.add("AB").is_err());
    }

    #[test]
    fn test_slices() {
        let a = bvs("a", 32).unwrap();
        assert_eq!(a.slice(Some(7), None).unwrap(), a.extract(7, 0).unwrap());
        assert_eq!(a.slice(Some(31), None).unwrap(), a);
        assert_eq!(a.slice(None, None).unwrap(), a);
        assert_eq!(a.slice(None, Some(0)).unwrap(), a);
        assert_eq!(a.slice(None, Some(-8)).unwrap(), a.extract(31, 24).unwrap());
        assert_eq!(a.slice(Some(-1), None).unwrap(), a);
        assert_eq!(a.slice(Some(-1), Some(-8)).unwrap(), a.extract(31, 24).unwrap());
    }

    #[test]
    fn test_chop_and_bytes() {
        let e = bvv(0x01020304, 32).unwrap();
        let r = e.reversed().unwrap();
        assert_eq!(r.literal(), Some(0x04030201));
        let bytes: Vec<u64> = r.chop(8).unwrap().iter().filter_map(|b| b.literal()).collect();
        assert_eq!(bytes, vec![4, 3, 2, 1]);

        let e1 = r.extract(31, 24).unwrap();
        let bits: Vec<u64> = e1.chop(1).unwrap().iter().filter_map(|b| b.literal()).collect();
        assert_eq!(bits, vec![0, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(e1.bit(2).unwrap().literal(), Some(1));

        let abcd = bvv_bytes(b"ABCD", None).unwrap();
        assert_eq!(abcd.get_byte(1).unwrap(), bvv_bytes(b"B", None).unwrap());
        assert!(abcd.get_byte(4).is_err());
    }

    #[test]
    fn test_extensions() {
        let e1 = bvv(4, 8).unwrap();
        let ee1 = e1.zero_extend(8).unwrap();
        assert_eq!((ee1.literal(), ee1.length()), (Some(4), 16));
        let se = bvv(0xfe, 8).unwrap().sign_extend(8).unwrap();
        assert_eq!(se.literal(), Some(0xfffe));
    }

    #[test]
    fn test_truth_testing_is_an_error() {
        let a = bvv(42, 32).unwrap();
        let c = a.eq_(42).unwrap();
        assert!(matches!(bool::try_from(&c), Err(Error::Operation(_))));
        assert!(matches!(bool::try_from(bool_val(true)), Err(Error::Operation(_))));
    }

    #[test]
    fn test_cardinality() {
        let x = bvs("x", 32).unwrap();
        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        let n = bvv(10, 32).unwrap();
        let m = bvv(20, 32).unwrap();

        assert_eq!(y.cardinality(), BigUint::from(21u32));
        assert_eq!(x.cardinality(), BigUint::from(1u64 << 32));
        assert_eq!(n.cardinality(), BigUint::from(1u32));
        assert_eq!(n.union(&m).unwrap().cardinality(), BigUint::from(2u32));
        assert_eq!(n.union(&y).unwrap().cardinality(), BigUint::from(111u32));
        assert_eq!(y.intersection(&x).unwrap().cardinality(), BigUint::from(21u32));
        assert_eq!(n.intersection(&m).unwrap().cardinality(), BigUint::from(0u32));
        assert_eq!(y.intersection(&m).unwrap().cardinality(), BigUint::from(0u32));

        assert!(n.singlevalued() && !n.multivalued());
        assert!(y.multivalued() && !y.singlevalued());
        assert!(x.multivalued() && !x.singlevalued());
        assert!(y.union(&m).unwrap().multivalued());
        let empty = y.intersection(&m).unwrap();
        assert!(!empty.singlevalued() && !empty.multivalued());
    }
}
