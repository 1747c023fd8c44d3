use std::time::Duration;

use crate::ast::Ast;
use crate::backend::Backend;
use crate::error::Result;
use crate::value::Value;

/// Exact evaluation of fully concrete expressions.
///
/// Construction already folds every operation whose operands are literals, so
/// a concrete expression is a literal by the time it reaches this backend.
/// Anything else is reported as unsupported.
#[derive(Debug, Default, Copy, Clone)]
pub struct ConcreteBackend;

impl ConcreteBackend {
    pub fn convert(&self, ast: &Ast) -> Result<Value> {
        ast.literal_value()
            .ok_or_else(|| unsupported!("concrete", "{} is not concrete", ast.shallow_repr(2)))
    }

    /// Truth of every constraint; the conjunction is false as soon as one is.
    fn holds(&self, constraints: &[Ast]) -> Result<bool> {
        for constraint in constraints {
            match self.convert(constraint)? {
                Value::Bool(true) => {}
                Value::Bool(false) => return Ok(false),
                Value::Bv(_) => return Err(shape_error!("constraint {} is not boolean", constraint)),
            }
        }
        Ok(true)
    }
}

impl Backend for ConcreteBackend {
    fn name(&self) -> &'static str {
        "concrete"
    }

    fn satisfiable(&self, constraints: &[Ast], _timeout: Option<Duration>) -> Result<bool> {
        self.holds(constraints)
    }

    fn eval(&self, expr: &Ast, constraints: &[Ast], n: usize, _timeout: Option<Duration>) -> Result<Vec<u64>> {
        let value = self.convert(expr)?;
        if n == 0 || !self.holds(constraints)? {
            return Ok(Vec::new());
        }
        Ok(vec![value.as_u64()])
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build::{and, bool_val, bvs, bvv, or};
    use crate::error::Error;

    fn convert(ast: &Ast) -> u64 {
        ConcreteBackend.convert(ast).unwrap().as_u64()
    }

    #[test]
    fn test_signed_concrete() {
        let a = bvv(5, 32).unwrap();
        let b = bvv(-5, 32).unwrap();
        let c = bvv(3, 32).unwrap();
        let d = bvv(-3, 32).unwrap();

        assert_eq!(convert(&a.udiv(&c).unwrap()), 1);
        assert_eq!(convert(&a.udiv(&d).unwrap()), 0);
        assert_eq!(convert(&b.udiv(&c).unwrap()), 0x55555553);
        assert_eq!(convert(&b.udiv(&d).unwrap()), 0);
        assert_eq!(convert(&a.urem(&c).unwrap()), 2);
        assert_eq!(convert(&a.urem(&d).unwrap()), 5);
        assert_eq!(convert(&b.urem(&c).unwrap()), 2);
        assert_eq!(convert(&b.urem(&d).unwrap()), (-5i64 as u64) & 0xffff_ffff);

        assert_eq!(convert(&a.sdiv(&c).unwrap()), 1);
        assert_eq!(convert(&a.sdiv(&d).unwrap()), 0xffff_ffff);
        assert_eq!(convert(&b.sdiv(&c).unwrap()), 0xffff_ffff);
        assert_eq!(convert(&b.sdiv(&d).unwrap()), 1);
        assert_eq!(convert(&a.smod(&c).unwrap()), 2);
        assert_eq!(convert(&a.smod(&d).unwrap()), 2);
        assert_eq!(convert(&b.smod(&c).unwrap()), 0xffff_fffe);
        assert_eq!(convert(&b.smod(&d).unwrap()), 0xffff_fffe);
    }

    #[test]
    fn test_arith_shift() {
        let a = bvv(-4, 32).unwrap();
        assert_eq!(convert(&a.ashr(1).unwrap()), 0xffff_fffe);
        assert_eq!(convert(&a.lshr(1).unwrap()), 0x7fff_fffe);
    }

    #[test]
    fn test_bool() {
        assert_eq!(ConcreteBackend.convert(&and([false, false, true]).unwrap()).unwrap(), Value::Bool(false));
        assert_eq!(ConcreteBackend.convert(&and([true, true, true]).unwrap()).unwrap(), Value::Bool(true));
        assert_eq!(ConcreteBackend.convert(&or([false, false, true]).unwrap()).unwrap(), Value::Bool(true));
        assert_eq!(ConcreteBackend.convert(&or([false, false, false]).unwrap()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_reversed_sum() {
        let r = bvv(0x01020304, 32).unwrap();
        let rr = r.reversed().unwrap();
        assert_eq!(convert(&rr), 0x04030201);
        assert_eq!(convert(&r.add(&rr).unwrap()), 0x05050505);
    }

    #[test]
    fn test_symbolic_is_unsupported() {
        let x = bvs("x", 32).unwrap();
        assert!(matches!(ConcreteBackend.convert(&x), Err(Error::Unsupported { backend: "concrete", .. })));
        assert!(ConcreteBackend.eval(&x, &[], 1, None).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_eval_under_constraints() {
        let seven = bvv(7, 8).unwrap();
        assert_eq!(ConcreteBackend.eval(&seven, &[bool_val(true)], 3, None).unwrap(), vec![7]);
        assert_eq!(ConcreteBackend.eval(&seven, &[bool_val(false)], 3, None).unwrap(), Vec::<u64>::new());
        assert!(!ConcreteBackend.satisfiable(&[bool_val(true), bool_val(false)], None).unwrap());
    }
}
