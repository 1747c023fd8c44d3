//! In-process model queries over bit-blasted BDDs.
//!
//! A query first simplifies the constraint set: conjunctions are split,
//! equalities between a leaf and a literal are substituted everywhere, and
//! the conditions of `If` nodes are case-split so that each branch sees a
//! smaller formula. What remains is bit-blasted into one BDD whose satisfying
//! paths are enumerated, blocking each found value of the target.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use log::{debug, trace};

use crate::ast::{Ast, CacheKey};
use crate::backend::smt::ModelQuery;
use crate::bdd::Bdd;
use crate::blast::{value_of, Blaster, Deadline};
use crate::config::Config;
use crate::error::Result;
use crate::op::Op;
use crate::sat::assignment;
use crate::simplify::bool_literal;
use crate::value::mask;

/// [`ModelQuery`] implementation backed by the crate's own BDD manager.
#[derive(Debug, Clone)]
pub struct BlastQuery {
    assertions: Vec<Ast>,
    frames: Vec<usize>,
    node_limit: usize,
    storage_bits: usize,
    cache_bits: usize,
}

impl BlastQuery {
    /// Queries give up as unsupported once the BDD grows past `node_limit` nodes.
    pub fn new(node_limit: usize) -> Self {
        Self {
            assertions: Vec::new(),
            frames: Vec::new(),
            node_limit,
            storage_bits: 16,
            cache_bits: 14,
        }
    }

    /// Initial sizes of the BDD unique table and computed table.
    pub fn with_table_bits(mut self, storage_bits: usize, cache_bits: usize) -> Self {
        self.storage_bits = storage_bits;
        self.cache_bits = cache_bits;
        self
    }

    pub fn from_config(config: &Config, node_limit: usize) -> Self {
        Self::new(node_limit).with_table_bits(config.storage_bits, config.cache_bits)
    }

    pub fn assertions(&self) -> &[Ast] {
        &self.assertions
    }
}

impl ModelQuery for BlastQuery {
    fn push(&mut self) {
        self.frames.push(self.assertions.len());
    }

    fn pop(&mut self) -> Result<()> {
        let len = self.frames.pop().ok_or_else(|| op_error!("pop without a matching push"))?;
        self.assertions.truncate(len);
        Ok(())
    }

    fn assert(&mut self, constraint: &Ast) -> Result<()> {
        if !constraint.sort().is_bool() {
            return Err(shape_error!("cannot assert non-boolean {}", constraint));
        }
        self.assertions.push(constraint.clone());
        Ok(())
    }

    fn check(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let values = self.values(&bool_literal(true), 1, timeout)?;
        Ok(!values.is_empty())
    }

    fn values(&mut self, target: &Ast, n: usize, timeout: Option<Duration>) -> Result<Vec<u64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut constraints = self.assertions.clone();
        let leaves = symbolic_leaves(&constraints, target);
        constraints.extend(bound_constraints(&leaves)?);

        let bdd = Bdd::new(self.storage_bits, self.cache_bits);
        let mut search = Search {
            bdd: &bdd,
            leaves: &leaves,
            node_limit: self.node_limit,
            deadline: Deadline::new(timeout),
            n,
            found: BTreeSet::new(),
        };
        search.run(constraints, target.clone())?;
        debug!("query: {} values for {} over {} leaves, {:?}", search.found.len(), target.op(), leaves.len(), bdd);
        Ok(search.found.into_iter().collect())
    }
}

struct Search<'a> {
    bdd: &'a Bdd,
    leaves: &'a [Ast],
    node_limit: usize,
    deadline: Deadline,
    n: usize,
    found: BTreeSet<u64>,
}

impl Search<'_> {
    fn run(&mut self, constraints: Vec<Ast>, target: Ast) -> Result<()> {
        self.deadline.check()?;
        if self.found.len() >= self.n {
            return Ok(());
        }
        let Some((constraints, target)) = propagate(constraints, target)? else {
            return Ok(());
        };

        if let Some(cond) = split_condition(&constraints, &target) {
            trace!("search: splitting on {}", cond);
            for branch in [true, false] {
                let map = HashMap::from([(cond.cache_key().clone(), bool_literal(branch))]);
                let mut cs = constraints
                    .iter()
                    .map(|c| c.replace_dict(&map))
                    .collect::<Result<Vec<_>>>()?;
                cs.push(if branch { cond.clone() } else { cond.not()? });
                self.run(cs, target.replace_dict(&map)?)?;
            }
            return Ok(());
        }

        self.enumerate(&constraints, &target)
    }

    fn enumerate(&mut self, constraints: &[Ast], target: &Ast) -> Result<()> {
        let bdd = self.bdd;
        let mut blaster = Blaster::new(bdd, self.leaves, self.node_limit, self.deadline);
        let mut f = bdd.one;
        for constraint in constraints {
            f = bdd.apply_and(f, blaster.formula(constraint)?);
            if bdd.is_zero(f) {
                return Ok(());
            }
        }
        let bits = blaster.bits(target)?;
        while self.found.len() < self.n {
            self.deadline.check()?;
            let Some(path) = bdd.one_sat(f) else {
                break;
            };
            let value = value_of(bdd, &bits, &assignment(&path));
            self.found.insert(value);
            f = bdd.apply_and(f, -blaster.equals(&bits, value));
        }
        Ok(())
    }
}

/// Distinct `BVS` and `BoolS` leaves, in first-occurrence order.
fn symbolic_leaves(constraints: &[Ast], target: &Ast) -> Vec<Ast> {
    let mut seen = HashSet::new();
    constraints
        .iter()
        .chain(std::iter::once(target))
        .flat_map(Ast::leaves)
        .filter(|leaf| matches!(leaf.op(), Op::BVS | Op::BoolS))
        .filter(|leaf| seen.insert(leaf.id()))
        .collect()
}

/// Range constraints for leaves declared with bounds.
fn bound_constraints(leaves: &[Ast]) -> Result<Vec<Ast>> {
    let mut res = Vec::new();
    for leaf in leaves {
        let Some(symbol) = leaf.symbol() else {
            continue;
        };
        if leaf.sort().is_bool() {
            continue;
        }
        if symbol.min() > 0 {
            res.push(leaf.uge(symbol.min())?);
        }
        if symbol.max() < mask(leaf.length()) {
            res.push(leaf.ule(symbol.max())?);
        }
    }
    Ok(res)
}

/// Split conjunctions and substitute leaf bindings until nothing changes.
///
/// Returns `None` when some constraint folds to false.
fn propagate(constraints: Vec<Ast>, target: Ast) -> Result<Option<(Vec<Ast>, Ast)>> {
    let mut constraints = constraints;
    let mut target = target;
    loop {
        let mut flat = Vec::with_capacity(constraints.len());
        for constraint in &constraints {
            conjuncts(constraint, &mut flat);
        }
        if flat.iter().any(|c| c.is_false()) {
            return Ok(None);
        }
        flat.retain(|c| !c.is_true());

        let mut bindings: HashMap<CacheKey, Ast> = HashMap::new();
        for constraint in &flat {
            if let Some((leaf, value)) = binding(constraint) {
                bindings.entry(leaf.cache_key().clone()).or_insert(value);
            }
        }
        if bindings.is_empty() {
            return Ok(Some((flat, target)));
        }
        trace!("propagate: substituting {} leaves", bindings.len());
        constraints = flat
            .iter()
            .map(|c| c.replace_dict(&bindings))
            .collect::<Result<Vec<_>>>()?;
        target = target.replace_dict(&bindings)?;
    }
}

fn conjuncts(constraint: &Ast, out: &mut Vec<Ast>) {
    if constraint.op() == Op::And {
        for child in constraint.children() {
            conjuncts(child, out);
        }
    } else {
        out.push(constraint.clone());
    }
}

/// A leaf fixed to a literal by the constraint.
fn binding(constraint: &Ast) -> Option<(Ast, Ast)> {
    match constraint.op() {
        Op::BoolS => Some((constraint.clone(), bool_literal(true))),
        Op::Not => {
            let inner = constraint.children().next()?;
            (inner.op() == Op::BoolS).then(|| (inner.clone(), bool_literal(false)))
        }
        Op::Eq => {
            let mut children = constraint.children();
            let (a, b) = (children.next()?, children.next()?);
            match (a.op(), b.op()) {
                (Op::BVS | Op::BoolS, _) if b.is_literal() => Some((a.clone(), b.clone())),
                (_, Op::BVS | Op::BoolS) if a.is_literal() => Some((b.clone(), a.clone())),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Condition of the first `If` met in depth-first order.
fn split_condition(constraints: &[Ast], target: &Ast) -> Option<Ast> {
    let mut visited = HashSet::new();
    let mut stack: Vec<Ast> = std::iter::once(target).chain(constraints.iter().rev()).cloned().collect();
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        if node.op() == Op::If {
            return node.children().next().cloned();
        }
        stack.extend(node.children().cloned().collect::<Vec<_>>().into_iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build::{bool_sym, bvs, bvs_bounded, bvv, ite};
    use crate::error::Error;

    fn query() -> BlastQuery {
        BlastQuery::new(1 << 20)
    }

    #[test]
    fn test_frames() {
        let x = bvs("x", 8).unwrap();
        let mut q = query();
        q.assert(&x.ugt(250).unwrap()).unwrap();
        q.push();
        q.assert(&x.ult(10).unwrap()).unwrap();
        assert!(!q.check(None).unwrap());
        q.pop().unwrap();
        assert!(q.check(None).unwrap());
        assert_eq!(q.values(&x, 10, None).unwrap(), vec![251, 252, 253, 254, 255]);
        assert!(q.pop().is_err());
    }

    #[test]
    fn test_values_are_capped() {
        let x = bvs("x", 16).unwrap();
        let mut q = query();
        assert_eq!(q.values(&x, 3, None).unwrap().len(), 3);
        assert_eq!(q.values(&x, 0, None).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn test_bindings_propagate() {
        let x = bvs("x", 32).unwrap();
        let y = bvs("y", 32).unwrap();
        let mut q = query();
        q.assert(&crate::build::and([x.eq_(7).unwrap(), y.eq_(x.add(1).unwrap()).unwrap()]).unwrap())
            .unwrap();
        assert_eq!(q.values(&y.mul(&x).unwrap(), 5, None).unwrap(), vec![56]);
    }

    #[test]
    fn test_case_split() {
        let x = bvs("x", 32).unwrap();
        let c = bool_sym("c");
        let e = ite(&c, x.add(1).unwrap(), 5).unwrap();
        let mut q = query();
        q.assert(&x.eq_(9).unwrap()).unwrap();
        assert_eq!(q.values(&e, 10, None).unwrap(), vec![5, 10]);
        assert_eq!(q.values(&c, 10, None).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_bounds_are_asserted() {
        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        let mut q = query();
        let values = q.values(&y, 100, None).unwrap();
        assert_eq!(values, (100..=120).collect::<Vec<u64>>());
        q.assert(&y.eq_(5).unwrap()).unwrap();
        assert!(!q.check(None).unwrap());
    }

    #[test]
    fn test_timeout_is_not_unsat() {
        let x = bvs("x", 32).unwrap();
        let mut q = query();
        let res = q.values(&x, 1_000_000, Some(Duration::ZERO));
        assert!(matches!(res, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_split_condition() {
        let x = bvs("x", 32).unwrap();
        let cond = x.ugt(10).unwrap();
        let e = ite(&cond, bvv(1, 32).unwrap(), 2).unwrap();
        assert_eq!(split_condition(&[], &e), Some(cond));
        assert_eq!(split_condition(&[], &x), None);
    }
}
