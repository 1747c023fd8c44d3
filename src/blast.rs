//! Bit-blasting expressions into BDDs.
//!
//! Each bitvector becomes a vector of BDD functions, least significant bit
//! first. Leaf variables are interleaved bit by bit: bit `i` of leaf `l` is
//! BDD variable `i * K + l + 1`, where `K` is the number of leaves. Keeping
//! equal-significance bits adjacent keeps adders and comparators small.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::trace;

use crate::ast::Ast;
use crate::bdd::Bdd;
use crate::error::{Error, Result};
use crate::op::Op;
use crate::reference::Ref;

pub(crate) const BACKEND: &str = "smt";

/// Wall-clock budget of a query.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Deadline {
    start: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.timeout {
            Some(timeout) if self.start.elapsed() >= timeout => Err(Error::Timeout(timeout)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
enum Bits {
    Bool(Ref),
    Bv(Vec<Ref>),
}

pub(crate) struct Blaster<'a> {
    bdd: &'a Bdd,
    leaves: HashMap<u64, u32>,
    stride: u32,
    memo: HashMap<u64, Bits>,
    node_limit: usize,
    deadline: Deadline,
}

impl<'a> Blaster<'a> {
    /// Prepare to blast formulas over the given symbolic leaves.
    pub(crate) fn new(bdd: &'a Bdd, leaves: &[Ast], node_limit: usize, deadline: Deadline) -> Self {
        let leaves: HashMap<u64, u32> = leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| (leaf.id(), i as u32))
            .collect();
        Self {
            bdd,
            stride: leaves.len().max(1) as u32,
            leaves,
            memo: HashMap::new(),
            node_limit,
            deadline,
        }
    }

    /// The BDD of a boolean expression.
    pub(crate) fn formula(&mut self, ast: &Ast) -> Result<Ref> {
        match self.blast(ast)? {
            Bits::Bool(r) => Ok(r),
            Bits::Bv(_) => Err(shape_error!("expected a boolean, got {}", ast)),
        }
    }

    /// The bits of an expression; booleans are a single bit.
    pub(crate) fn bits(&mut self, ast: &Ast) -> Result<Vec<Ref>> {
        match self.blast(ast)? {
            Bits::Bool(r) => Ok(vec![r]),
            Bits::Bv(bits) => Ok(bits),
        }
    }

    /// Function that holds exactly when `bits` equals `value`.
    pub(crate) fn equals(&self, bits: &[Ref], value: u64) -> Ref {
        let constant = self.constant(value, bits.len());
        self.eq(bits, &constant)
    }

    fn check(&self) -> Result<()> {
        self.deadline.check()?;
        let nodes = self.bdd.num_nodes();
        if nodes > self.node_limit {
            return Err(unsupported!(BACKEND, "BDD grew to {} nodes", nodes));
        }
        Ok(())
    }

    fn var(&self, leaf: u32, bit: u32) -> Ref {
        self.bdd.mk_var(bit * self.stride + leaf + 1)
    }

    fn constant(&self, value: u64, width: usize) -> Vec<Ref> {
        (0..width).map(|i| self.bdd.constant((value >> i) & 1 == 1)).collect()
    }

    fn bv_child(&mut self, ast: &Ast, i: usize) -> Result<Vec<Ref>> {
        let child = ast
            .children()
            .nth(i)
            .ok_or_else(|| shape_error!("{} has no operand {}", ast.op(), i))?
            .clone();
        self.bits(&child)
    }

    fn bool_child(&mut self, ast: &Ast, i: usize) -> Result<Ref> {
        let child = ast
            .children()
            .nth(i)
            .ok_or_else(|| shape_error!("{} has no operand {}", ast.op(), i))?
            .clone();
        self.formula(&child)
    }

    fn blast(&mut self, ast: &Ast) -> Result<Bits> {
        if let Some(bits) = self.memo.get(&ast.id()) {
            return Ok(bits.clone());
        }
        let res = self.blast_node(ast)?;
        self.check()?;
        trace!("blast: {} -> {} nodes", ast.op(), self.bdd.num_nodes());
        self.memo.insert(ast.id(), res.clone());
        Ok(res)
    }

    fn blast_node(&mut self, ast: &Ast) -> Result<Bits> {
        let bdd = self.bdd;
        let width = ast.length() as usize;
        let params: Vec<u64> = ast.params().collect();
        let bv = |bits: Vec<Ref>| Ok(Bits::Bv(bits));
        let boolean = |r: Ref| Ok(Bits::Bool(r));

        match ast.op() {
            Op::BVV => bv(self.constant(ast.literal().unwrap_or(0), width)),
            Op::BoolV => boolean(bdd.constant(ast.is_true())),
            Op::BVS | Op::BoolS => {
                let leaf = *self
                    .leaves
                    .get(&ast.id())
                    .ok_or_else(|| unsupported!(BACKEND, "unknown leaf {}", ast))?;
                let bits: Vec<Ref> = (0..width as u32).map(|i| self.var(leaf, i)).collect();
                if ast.sort().is_bool() {
                    boolean(bits[0])
                } else {
                    bv(bits)
                }
            }
            Op::SI | Op::Union | Op::Intersection => {
                Err(unsupported!(BACKEND, "value-set operation {}", ast.op()))
            }

            Op::Add | Op::Mul | Op::BvAnd | Op::BvOr | Op::BvXor => {
                let n = ast.children().count();
                let mut acc = self.bv_child(ast, 0)?;
                for i in 1..n {
                    let rhs = self.bv_child(ast, i)?;
                    acc = match ast.op() {
                        Op::Add => self.add(&acc, &rhs, bdd.zero),
                        Op::Mul => self.mul(&acc, &rhs)?,
                        Op::BvAnd => self.zip(&acc, &rhs, |x, y| bdd.apply_and(x, y)),
                        Op::BvOr => self.zip(&acc, &rhs, |x, y| bdd.apply_or(x, y)),
                        _ => self.zip(&acc, &rhs, |x, y| bdd.apply_xor(x, y)),
                    };
                    self.check()?;
                }
                bv(acc)
            }
            Op::Sub => {
                let a = self.bv_child(ast, 0)?;
                let b = self.bv_child(ast, 1)?;
                bv(self.sub(&a, &b))
            }
            Op::Neg => {
                let a = self.bv_child(ast, 0)?;
                bv(self.negate(&a))
            }
            Op::BvNot => {
                let a = self.bv_child(ast, 0)?;
                bv(a.iter().map(|&x| -x).collect())
            }
            Op::UDiv | Op::URem => {
                let a = self.bv_child(ast, 0)?;
                let b = self.bv_child(ast, 1)?;
                let (q, r) = self.udivrem(&a, &b)?;
                bv(if ast.op() == Op::UDiv { q } else { r })
            }
            Op::SDiv | Op::SMod => {
                let a = self.bv_child(ast, 0)?;
                let b = self.bv_child(ast, 1)?;
                let (sa, sb) = (a[width - 1], b[width - 1]);
                let abs_a = self.mux(sa, &self.negate(&a), &a);
                let abs_b = self.mux(sb, &self.negate(&b), &b);
                let (q, r) = self.udivrem(&abs_a, &abs_b)?;
                if ast.op() == Op::SDiv {
                    bv(self.mux(bdd.apply_xor(sa, sb), &self.negate(&q), &q))
                } else {
                    bv(self.mux(sa, &self.negate(&r), &r))
                }
            }
            Op::Shl | Op::LShR | Op::AShR => {
                let a = self.bv_child(ast, 0)?;
                let s = self.bv_child(ast, 1)?;
                bv(self.shift(ast.op(), &a, &s))
            }

            Op::Concat => {
                let n = ast.children().count();
                let mut bits = Vec::with_capacity(width);
                for i in (0..n).rev() {
                    bits.extend(self.bv_child(ast, i)?);
                }
                bv(bits)
            }
            Op::Extract => {
                let (hi, lo) = match params.as_slice() {
                    [hi, lo] => (*hi as usize, *lo as usize),
                    _ => return Err(shape_error!("malformed extract {}", ast)),
                };
                let a = self.bv_child(ast, 0)?;
                bv(a[lo..=hi].to_vec())
            }
            Op::ZeroExt | Op::SignExt => {
                let mut a = self.bv_child(ast, 0)?;
                let fill = match (ast.op(), a.last()) {
                    (Op::SignExt, Some(&msb)) => msb,
                    _ => bdd.zero,
                };
                a.resize(width, fill);
                bv(a)
            }
            Op::Reverse => {
                let a = self.bv_child(ast, 0)?;
                bv(a.chunks(8).rev().flatten().copied().collect())
            }

            Op::Eq | Op::Ne => {
                let a = self.bv_child(ast, 0)?;
                let b = self.bv_child(ast, 1)?;
                let eq = self.eq(&a, &b);
                boolean(if ast.op() == Op::Eq { eq } else { -eq })
            }
            Op::ULT | Op::ULE | Op::UGT | Op::UGE | Op::SLT | Op::SLE | Op::SGT | Op::SGE => {
                let mut a = self.bv_child(ast, 0)?;
                let mut b = self.bv_child(ast, 1)?;
                if matches!(ast.op(), Op::SLT | Op::SLE | Op::SGT | Op::SGE) {
                    // Flipping the sign bits turns a signed order into an unsigned one.
                    let msb = a.len() - 1;
                    a[msb] = -a[msb];
                    b[msb] = -b[msb];
                }
                let res = match ast.op() {
                    Op::ULT | Op::SLT => self.ult(&a, &b),
                    Op::UGT | Op::SGT => self.ult(&b, &a),
                    Op::ULE | Op::SLE => -self.ult(&b, &a),
                    _ => -self.ult(&a, &b),
                };
                boolean(res)
            }

            Op::And | Op::Or => {
                let n = ast.children().count();
                let mut terms = Vec::with_capacity(n);
                for i in 0..n {
                    terms.push(self.bool_child(ast, i)?);
                }
                if ast.op() == Op::And {
                    boolean(bdd.apply_and_many(terms))
                } else {
                    boolean(bdd.apply_or_many(terms))
                }
            }
            Op::Not => {
                let a = self.bool_child(ast, 0)?;
                boolean(-a)
            }
            Op::If => {
                let c = self.bool_child(ast, 0)?;
                if ast.sort().is_bool() {
                    let t = self.bool_child(ast, 1)?;
                    let e = self.bool_child(ast, 2)?;
                    boolean(bdd.apply_ite(c, t, e))
                } else {
                    let t = self.bv_child(ast, 1)?;
                    let e = self.bv_child(ast, 2)?;
                    bv(self.mux(c, &t, &e))
                }
            }
        }
    }

    fn zip(&self, a: &[Ref], b: &[Ref], f: impl Fn(Ref, Ref) -> Ref) -> Vec<Ref> {
        a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
    }

    fn mux(&self, c: Ref, t: &[Ref], e: &[Ref]) -> Vec<Ref> {
        self.zip(t, e, |x, y| self.bdd.apply_ite(c, x, y))
    }

    fn eq(&self, a: &[Ref], b: &[Ref]) -> Ref {
        let bdd = self.bdd;
        bdd.apply_and_many(a.iter().zip(b).map(|(&x, &y)| bdd.apply_eq(x, y)))
    }

    /// Unsigned `a < b`, decided by the most significant differing bit.
    fn ult(&self, a: &[Ref], b: &[Ref]) -> Ref {
        let bdd = self.bdd;
        a.iter().zip(b).fold(bdd.zero, |lt, (&x, &y)| bdd.apply_ite(bdd.apply_xor(x, y), y, lt))
    }

    /// Ripple-carry addition.
    fn add(&self, a: &[Ref], b: &[Ref], carry: Ref) -> Vec<Ref> {
        let bdd = self.bdd;
        let mut carry = carry;
        a.iter()
            .zip(b)
            .map(|(&x, &y)| {
                let sum = bdd.apply_xor(bdd.apply_xor(x, y), carry);
                carry = bdd.apply_ite(x, bdd.apply_or(y, carry), bdd.apply_and(y, carry));
                sum
            })
            .collect()
    }

    fn sub(&self, a: &[Ref], b: &[Ref]) -> Vec<Ref> {
        let not_b: Vec<Ref> = b.iter().map(|&x| -x).collect();
        self.add(a, &not_b, self.bdd.one)
    }

    fn negate(&self, a: &[Ref]) -> Vec<Ref> {
        let zero = vec![self.bdd.zero; a.len()];
        self.sub(&zero, a)
    }

    /// Shift-and-add multiplication, skipping partial products of constant-zero bits.
    fn mul(&self, a: &[Ref], b: &[Ref]) -> Result<Vec<Ref>> {
        let bdd = self.bdd;
        let w = a.len();
        let mut acc = vec![bdd.zero; w];
        for (i, &bit) in a.iter().enumerate() {
            if bdd.is_zero(bit) {
                continue;
            }
            let partial: Vec<Ref> = (0..w)
                .map(|j| if j < i { bdd.zero } else { bdd.apply_and(bit, b[j - i]) })
                .collect();
            acc = self.add(&acc, &partial, bdd.zero);
            self.check()?;
        }
        Ok(acc)
    }

    /// Restoring division. Division by zero gives an all-ones quotient and
    /// leaves the dividend as the remainder.
    fn udivrem(&self, a: &[Ref], b: &[Ref]) -> Result<(Vec<Ref>, Vec<Ref>)> {
        let bdd = self.bdd;
        let w = a.len();
        let mut divisor = b.to_vec();
        divisor.push(bdd.zero);
        let mut rem = vec![bdd.zero; w + 1];
        let mut quotient = vec![bdd.zero; w];
        for i in (0..w).rev() {
            // The remainder stays below the divisor, so its top bit is always clear here.
            rem.pop();
            rem.insert(0, a[i]);
            let ge = -self.ult(&rem, &divisor);
            let diff = self.sub(&rem, &divisor);
            rem = self.mux(ge, &diff, &rem);
            quotient[i] = ge;
            self.check()?;
        }
        rem.truncate(w);
        Ok((quotient, rem))
    }

    /// Barrel shifter. Amounts of at least the width shift everything out.
    fn shift(&self, op: Op, a: &[Ref], amount: &[Ref]) -> Vec<Ref> {
        let bdd = self.bdd;
        let w = a.len();
        let fill = if op == Op::AShR { a[w - 1] } else { bdd.zero };
        let mut res = a.to_vec();
        let mut overflow = bdd.zero;
        for (k, &bit) in amount.iter().enumerate() {
            match 1usize.checked_shl(k as u32).filter(|&n| n < w) {
                Some(n) => {
                    let shifted: Vec<Ref> = (0..w)
                        .map(|j| match op {
                            Op::Shl if j >= n => res[j - n],
                            Op::Shl => bdd.zero,
                            _ if j + n < w => res[j + n],
                            _ => fill,
                        })
                        .collect();
                    res = self.mux(bit, &shifted, &res);
                }
                None => overflow = bdd.apply_or(overflow, bit),
            }
        }
        self.mux(overflow, &vec![fill; w], &res)
    }
}

/// Read the unsigned value of `bits` under a model.
pub(crate) fn value_of(bdd: &Bdd, bits: &[Ref], model: &HashMap<u32, bool>) -> u64 {
    bits.iter()
        .enumerate()
        .fold(0, |acc, (i, &bit)| acc | ((bdd.evaluate(bit, model) as u64) << i))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build::{bvs, bvv};
    use crate::sat::assignment;

    fn blaster<'a>(bdd: &'a Bdd, leaves: &[Ast]) -> Blaster<'a> {
        Blaster::new(bdd, leaves, 1 << 20, Deadline::new(None))
    }

    fn models(bdd: &Bdd, f: Ref, bits: &[Ref], blaster: &Blaster<'_>) -> Vec<u64> {
        let mut f = f;
        let mut values = Vec::new();
        while let Some(path) = bdd.one_sat(f) {
            let v = value_of(bdd, bits, &assignment(&path));
            values.push(v);
            f = bdd.apply_and(f, -blaster.equals(bits, v));
        }
        values.sort();
        values
    }

    #[test]
    fn test_add_is_not_identity() {
        let bdd = Bdd::default();
        let a = bvs("a", 32).unwrap();
        let mut b = blaster(&bdd, &[a.clone()]);
        let f = b.formula(&a.eq_(a.add(1).unwrap()).unwrap()).unwrap();
        assert!(bdd.is_zero(f));
    }

    #[test]
    fn test_linear_equation() {
        let bdd = Bdd::default();
        let x = bvs("x", 8).unwrap();
        let mut b = blaster(&bdd, &[x.clone()]);
        let f = b.formula(&x.mul(3).unwrap().add(2).unwrap().eq_(17).unwrap()).unwrap();
        let bits = b.bits(&x).unwrap();
        assert_eq!(models(&bdd, f, &bits, &b), vec![5]);
    }

    #[test]
    fn test_division_matches_concrete() {
        let bdd = Bdd::default();
        let x = bvs("x", 8).unwrap();
        let y = bvs("y", 8).unwrap();
        let cases = [(0x05u64, 0x03u64), (0xfb, 0x03), (0x05, 0xfd), (0xfb, 0xfd), (0x07, 0x00), (0xf9, 0x00)];
        for (a, c) in cases {
            let mut b = blaster(&bdd, &[x.clone(), y.clone()]);
            let assume = crate::build::and([x.eq_(a).unwrap(), y.eq_(c).unwrap()]).unwrap();
            let f = b.formula(&assume).unwrap();
            for e in [
                x.udiv(&y).unwrap(),
                x.urem(&y).unwrap(),
                x.sdiv(&y).unwrap(),
                x.smod(&y).unwrap(),
            ] {
                let expected = e
                    .replace(&x, &bvv(a, 8).unwrap())
                    .unwrap()
                    .replace(&y, &bvv(c, 8).unwrap())
                    .unwrap();
                let bits = b.bits(&e).unwrap();
                assert_eq!(models(&bdd, f, &bits, &b), vec![expected.literal().unwrap()], "{}", e);
            }
        }
    }

    #[test]
    fn test_shifts_match_concrete() {
        let bdd = Bdd::default();
        let x = bvs("x", 8).unwrap();
        let s = bvs("s", 8).unwrap();
        for (a, n) in [(0x81u64, 1u64), (0x81, 7), (0x81, 8), (0x81, 200)] {
            let mut b = blaster(&bdd, &[x.clone(), s.clone()]);
            let assume = crate::build::and([x.eq_(a).unwrap(), s.eq_(n).unwrap()]).unwrap();
            let f = b.formula(&assume).unwrap();
            for e in [x.shl(&s).unwrap(), x.lshr(&s).unwrap(), x.ashr(&s).unwrap()] {
                let expected = e
                    .replace(&x, &bvv(a, 8).unwrap())
                    .unwrap()
                    .replace(&s, &bvv(n, 8).unwrap())
                    .unwrap();
                let bits = b.bits(&e).unwrap();
                assert_eq!(models(&bdd, f, &bits, &b), vec![expected.literal().unwrap()], "{}", e);
            }
        }
    }

    #[test]
    fn test_signed_comparison() {
        let bdd = Bdd::default();
        let x = bvs("x", 4).unwrap();
        let mut b = blaster(&bdd, &[x.clone()]);
        let f = b.formula(&x.slt(0).unwrap()).unwrap();
        let bits = b.bits(&x).unwrap();
        assert_eq!(models(&bdd, f, &bits, &b), (8..16).collect::<Vec<u64>>());
    }

    #[test]
    fn test_node_limit() {
        let bdd = Bdd::default();
        let x = bvs("x", 32).unwrap();
        let y = bvs("y", 32).unwrap();
        let mut b = Blaster::new(&bdd, &[x.clone(), y.clone()], 64, Deadline::new(None));
        let res = b.formula(&x.mul(&y).unwrap().eq_(12345).unwrap());
        assert!(matches!(res, Err(Error::Unsupported { .. })));
    }

    #[test]
    fn test_value_sets_are_unsupported() {
        let bdd = Bdd::default();
        let s = crate::build::si(32, 2, 0, 10).unwrap();
        let mut b = blaster(&bdd, &[]);
        assert!(matches!(b.bits(&s), Err(Error::Unsupported { .. })));
    }
}
