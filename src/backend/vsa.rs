//! Value-set analysis over strided intervals.

use std::collections::HashMap;
use std::time::Duration;

use log::trace;

use crate::ast::Ast;
use crate::backend::Backend;
use crate::error::Result;
use crate::interval::{BoolResult, StridedInterval};
use crate::op::Op;
use crate::value::mask;

/// Abstract value of an expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Abstract {
    /// Bitvector over-approximation. When `exact` is set, every member of
    /// `si` is a value the expression can really take.
    Bv { si: StridedInterval, exact: bool },
    Bool(BoolResult),
}

impl Abstract {
    fn bv(si: StridedInterval, exact: bool) -> Self {
        Abstract::Bv {
            si,
            exact: exact || si.singlevalued(),
        }
    }

    fn interval(self) -> (StridedInterval, bool) {
        match self {
            Abstract::Bv { si, exact } => (si, exact),
            Abstract::Bool(res) => {
                let si = match res.as_bool() {
                    Some(b) => StridedInterval::singleton(1, b as u64),
                    None => StridedInterval::top(1),
                };
                (si, res.as_bool().is_some())
            }
        }
    }

    fn truth(self) -> BoolResult {
        match self {
            Abstract::Bool(res) => res,
            Abstract::Bv { .. } => BoolResult::Maybe,
        }
    }
}

/// Abstract interpretation into the strided-interval domain.
///
/// Every expression converts; symbolic leaves start from their declared
/// bounds, or from the full range when they have none.
#[derive(Debug, Default, Copy, Clone)]
pub struct VsaBackend;

impl VsaBackend {
    pub fn convert(&self, ast: &Ast) -> Abstract {
        let mut memo = HashMap::new();
        convert_rec(ast, &mut memo)
    }

    /// Whether both expressions denote the same value set.
    pub fn identical(&self, a: &Ast, b: &Ast) -> bool {
        match (self.convert(a), self.convert(b)) {
            (Abstract::Bv { si: x, .. }, Abstract::Bv { si: y, .. }) => x.identical(&y),
            (Abstract::Bool(x), Abstract::Bool(y)) => x == y,
            _ => false,
        }
    }

    /// Truth of the constraint set, unless some constraint is undecided.
    fn holds(&self, constraints: &[Ast]) -> Result<bool> {
        let mut res = BoolResult::True;
        for constraint in constraints {
            res = res.and(self.convert(constraint).truth());
        }
        res.as_bool()
            .ok_or_else(|| unsupported!("vsa", "cannot decide {} constraints", constraints.len()))
    }
}

fn convert_rec(ast: &Ast, memo: &mut HashMap<u64, Abstract>) -> Abstract {
    if let Some(res) = memo.get(&ast.id()) {
        return *res;
    }
    let res = convert_node(ast, memo);
    trace!("vsa: {} -> {:?}", ast.op(), res);
    memo.insert(ast.id(), res);
    res
}

fn convert_node(ast: &Ast, memo: &mut HashMap<u64, Abstract>) -> Abstract {
    let bits = ast.length();
    let children: Vec<Abstract> = ast.children().map(|c| convert_rec(c, memo)).collect();
    let params: Vec<u64> = ast.params().collect();
    let si = |i: usize| children[i].interval();

    match ast.op() {
        Op::BVV => Abstract::bv(StridedInterval::singleton(bits, ast.literal().unwrap_or(0)), true),
        Op::BoolV => Abstract::Bool(BoolResult::from_bool(ast.is_true())),
        Op::BoolS => Abstract::Bool(BoolResult::Maybe),
        Op::BVS => match ast.symbol() {
            Some(symbol) if symbol.min() > 0 || symbol.max() < mask(bits) => {
                Abstract::bv(StridedInterval::new(bits, 1, symbol.min(), symbol.max()), true)
            }
            _ => Abstract::bv(StridedInterval::top(bits), false),
        },
        Op::SI => match ast.interval() {
            Some(si) => Abstract::bv(si, true),
            None => Abstract::bv(StridedInterval::top(bits), false),
        },

        Op::Add | Op::Mul | Op::BvAnd | Op::BvOr | Op::BvXor => {
            let (mut acc, mut exact) = si(0);
            let mut varying = !acc.singlevalued();
            for i in 1..children.len() {
                let (rhs, rhs_exact) = si(i);
                exact &= rhs_exact;
                if !rhs.singlevalued() {
                    // Two varying operands may be correlated.
                    exact &= !varying && ast.op() == Op::Add;
                    varying = true;
                }
                acc = match ast.op() {
                    Op::Add => acc.add(&rhs),
                    Op::Mul => acc.mul(&rhs),
                    Op::BvAnd => acc.and(&rhs),
                    Op::BvOr => acc.or(&rhs),
                    _ => acc.xor(&rhs),
                };
            }
            // Only a shifted arc stays exact; the bitwise transfers over-approximate.
            let exact = exact && (ast.op() == Op::Add || !varying);
            Abstract::bv(acc, exact)
        }
        Op::Sub => {
            let ((a, ea), (b, eb)) = (si(0), si(1));
            let exact = ea && eb && (a.singlevalued() || b.singlevalued());
            Abstract::bv(a.sub(&b), exact)
        }
        Op::Neg => {
            let (a, exact) = si(0);
            Abstract::bv(a.neg(), exact)
        }
        Op::BvNot => {
            let (a, exact) = si(0);
            Abstract::bv(a.not(), exact)
        }
        Op::UDiv | Op::SDiv | Op::URem | Op::SMod | Op::Shl | Op::LShR | Op::AShR => {
            let ((a, _), (b, _)) = (si(0), si(1));
            let res = match ast.op() {
                Op::UDiv => a.udiv(&b),
                Op::SDiv => a.sdiv(&b),
                Op::URem => a.urem(&b),
                Op::SMod => a.srem(&b),
                Op::Shl => a.shl(&b),
                Op::LShR => a.lshr(&b),
                _ => a.ashr(&b),
            };
            Abstract::bv(res, false)
        }

        Op::Concat => {
            let mut acc = si(0).0;
            for i in 1..children.len() {
                acc = acc.concat(&si(i).0);
            }
            Abstract::bv(acc, false)
        }
        Op::Extract => {
            let (a, exact) = si(0);
            match params.as_slice() {
                [hi, lo] if *lo == 0 && *hi as u32 + 1 == a.bits() => Abstract::bv(a, exact),
                [hi, lo] => Abstract::bv(a.extract(*hi as u32, *lo as u32), false),
                _ => Abstract::bv(StridedInterval::top(bits), false),
            }
        }
        Op::ZeroExt => {
            let (a, exact) = si(0);
            // A wrapping arc widens to the whole source range.
            Abstract::bv(a.zero_extend(bits - a.bits()), exact && !a.is_wrapping())
        }
        Op::SignExt => {
            let (a, _) = si(0);
            Abstract::bv(a.sign_extend(bits - a.bits()), false)
        }
        Op::Reverse => Abstract::bv(si(0).0.reversed(), false),

        Op::Union => {
            let ((a, ea), (b, eb)) = (si(0), si(1));
            let u = a.union(&b);
            // The hull is exact when it adds nothing to either side.
            let tight = u == a
                || u == b
                || (a.intersection(&b).is_empty() && u.cardinality() == a.cardinality() + b.cardinality());
            Abstract::bv(u, ea && eb && tight)
        }
        Op::Intersection => {
            let ((a, ea), (b, eb)) = (si(0), si(1));
            let linear = !a.is_wrapping() && !b.is_wrapping() && (a.stride() <= 1 || b.stride() <= 1);
            Abstract::bv(a.intersection(&b), ea && eb && linear)
        }

        Op::Eq | Op::Ne => {
            let res = match (children[0], children[1]) {
                (Abstract::Bool(a), Abstract::Bool(b)) => match (a.as_bool(), b.as_bool()) {
                    (Some(x), Some(y)) => BoolResult::from_bool(x == y),
                    _ => BoolResult::Maybe,
                },
                _ => si(0).0.eq(&si(1).0),
            };
            Abstract::Bool(if ast.op() == Op::Eq { res } else { res.not() })
        }
        Op::ULT | Op::ULE | Op::UGT | Op::UGE | Op::SLT | Op::SLE | Op::SGT | Op::SGE => {
            let (a, b) = (si(0).0, si(1).0);
            let res = match ast.op() {
                Op::ULT => a.ult(&b),
                Op::ULE => a.ule(&b),
                Op::UGT => b.ult(&a),
                Op::UGE => b.ule(&a),
                Op::SLT => a.slt(&b),
                Op::SLE => a.sle(&b),
                Op::SGT => b.slt(&a),
                _ => b.sle(&a),
            };
            Abstract::Bool(res)
        }

        Op::And => Abstract::Bool(children.iter().fold(BoolResult::True, |acc, c| acc.and(c.truth()))),
        Op::Or => Abstract::Bool(children.iter().fold(BoolResult::False, |acc, c| acc.or(c.truth()))),
        Op::Not => Abstract::Bool(children[0].truth().not()),
        Op::If => match children[0].truth().as_bool() {
            Some(true) => children[1],
            Some(false) => children[2],
            None => match (children[1], children[2]) {
                (Abstract::Bool(t), Abstract::Bool(e)) if t == e => Abstract::Bool(t),
                (Abstract::Bool(_), Abstract::Bool(_)) => Abstract::Bool(BoolResult::Maybe),
                _ => Abstract::bv(si(1).0.union(&si(2).0), false),
            },
        },
    }
}

impl Backend for VsaBackend {
    fn name(&self) -> &'static str {
        "vsa"
    }

    fn satisfiable(&self, constraints: &[Ast], _timeout: Option<Duration>) -> Result<bool> {
        self.holds(constraints)
    }

    fn eval(&self, expr: &Ast, constraints: &[Ast], n: usize, _timeout: Option<Duration>) -> Result<Vec<u64>> {
        if !self.holds(constraints)? {
            return Ok(Vec::new());
        }
        match self.convert(expr) {
            Abstract::Bv { si, exact: true } => {
                let mut values: Vec<u64> = si.values().take(n).collect();
                values.sort_unstable();
                Ok(values)
            }
            Abstract::Bool(res) => match res.as_bool() {
                Some(b) if n > 0 => Ok(vec![b as u64]),
                Some(_) => Ok(Vec::new()),
                None => Err(unsupported!("vsa", "truth of {} is undecided", expr.shallow_repr(2))),
            },
            Abstract::Bv { si, .. } => Err(unsupported!("vsa", "{} over-approximates {}", si, expr.shallow_repr(2))),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build::{bvs, bvs_bounded, bvv, si};
    use crate::error::Error;

    #[test]
    fn test_identical() {
        let a = si(32, 2, 20, 100).unwrap();
        let b = si(32, 2, 10, 10).unwrap();
        let c = si(32, 2, 20, 100).unwrap();
        assert!(VsaBackend.identical(&a, &a));
        assert!(!VsaBackend.identical(&a, &b));
        assert!(VsaBackend.identical(&a, &c));
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_bounded_leaf_arithmetic() {
        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        let e = y.add(5).unwrap();
        match VsaBackend.convert(&e) {
            Abstract::Bv { si, exact } => {
                assert!(exact);
                assert_eq!(si.unsigned_bounds(), (105, 125));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(VsaBackend.eval(&e, &[], 3, None).unwrap(), vec![105, 106, 107]);
    }

    #[test]
    fn test_correlated_operands_are_not_exact() {
        let y = bvs_bounded("y", 8, 0, 3).unwrap();
        let e = y.sub(&y).unwrap();
        assert!(matches!(VsaBackend.convert(&e), Abstract::Bv { exact: false, .. }));
        assert!(VsaBackend.eval(&e, &[], 10, None).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_comparisons() {
        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        assert_eq!(VsaBackend.convert(&y.ugt(50).unwrap()), Abstract::Bool(BoolResult::True));
        assert_eq!(VsaBackend.convert(&y.ult(50).unwrap()), Abstract::Bool(BoolResult::False));
        assert_eq!(VsaBackend.convert(&y.eq_(110).unwrap()), Abstract::Bool(BoolResult::Maybe));
        assert!(VsaBackend.satisfiable(&[y.ugt(50).unwrap()], None).unwrap());
        assert!(!VsaBackend.satisfiable(&[y.ult(50).unwrap()], None).unwrap());
        assert!(matches!(
            VsaBackend.satisfiable(&[y.eq_(110).unwrap()], None),
            Err(Error::Unsupported { backend: "vsa", .. })
        ));
    }

    #[test]
    fn test_bitwise_with_constant_is_not_exact() {
        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        let e = y.bvxor(1).unwrap();
        assert!(matches!(VsaBackend.convert(&e), Abstract::Bv { exact: false, .. }));
        assert!(VsaBackend.eval(&e, &[], 200, None).unwrap_err().is_recoverable());
        assert!(matches!(VsaBackend.convert(&y.bvand(0xf0).unwrap()), Abstract::Bv { exact: false, .. }));
    }

    #[test]
    fn test_wrapping_zero_extend_is_not_exact() {
        let y = bvs_bounded("y", 8, 0, 200).unwrap();
        let wrapped = y.add(100).unwrap();
        assert!(matches!(VsaBackend.convert(&wrapped), Abstract::Bv { exact: true, .. }));
        assert_eq!(VsaBackend.eval(&wrapped, &[], 300, None).unwrap().len(), 201);

        let e = wrapped.zero_extend(8).unwrap();
        assert!(matches!(VsaBackend.convert(&e), Abstract::Bv { exact: false, .. }));
        assert!(VsaBackend.eval(&e, &[], 300, None).unwrap_err().is_recoverable());

        let plain = y.zero_extend(8).unwrap();
        assert_eq!(VsaBackend.eval(&plain, &[], 300, None).unwrap(), (0..=200).collect::<Vec<u64>>());
    }

    #[test]
    fn test_union_values() {
        let s = bvv(10, 32).unwrap().union(bvv(20, 32).unwrap()).unwrap();
        assert_eq!(VsaBackend.eval(&s, &[], 10, None).unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_loose_union_is_not_exact() {
        let a = si(32, 1, 1, 2).unwrap();
        let b = bvv(10, 32).unwrap();
        let u = a.union(&b).unwrap();
        assert!(matches!(VsaBackend.convert(&u), Abstract::Bv { exact: false, .. }));
        assert!(VsaBackend.eval(&u, &[], 20, None).unwrap_err().is_recoverable());

        let nested = si(32, 1, 0, 20).unwrap().union(&a).unwrap();
        assert_eq!(VsaBackend.eval(&nested, &[], 30, None).unwrap(), (0..=20).collect::<Vec<u64>>());
    }

    #[test]
    fn test_unbounded_leaf_is_unsupported() {
        let x = bvs("x", 32).unwrap();
        assert!(VsaBackend.eval(&x, &[], 1, None).unwrap_err().is_recoverable());
    }
}
