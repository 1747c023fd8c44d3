//! Whole-tree rewrites: substitution, renaming, canonical naming and
//! moving `If` nodes up or down an expression.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use log::debug;

use crate::ast::{Arg, Ast, CacheKey, Symbol};
use crate::build::{ite, symbol_leaf, Operand};
use crate::error::Result;
use crate::op::{Op, Sort};
use crate::simplify::{bool_literal, build};

fn child(ast: &Ast, i: usize) -> Ast {
    ast.children().nth(i).cloned().unwrap_or_else(|| ast.clone())
}

/// Rebuild `node` from new operands, reusing it when nothing changed.
fn rebuild(node: &Ast, args: Vec<Arg>) -> Ast {
    let unchanged =
        args.len() == node.args().len() && args.iter().zip(node.args()).all(|(a, b)| a.same(b));
    if unchanged {
        node.clone()
    } else {
        build(node.op(), node.sort(), args)
    }
}

/// Apply `f` to every nested operand of `node`, bottom-up, sharing results
/// between repeated sub-expressions.
fn map_children(
    node: &Ast,
    memo: &mut HashMap<u64, Ast>,
    f: &mut impl FnMut(&Ast, &mut HashMap<u64, Ast>) -> Ast,
) -> Vec<Arg> {
    node.args()
        .iter()
        .map(|arg| match arg {
            Arg::Ast(ast) => {
                if let Some(done) = memo.get(&ast.id()) {
                    return Arg::Ast(done.clone());
                }
                let res = f(ast, memo);
                memo.insert(ast.id(), res.clone());
                Arg::Ast(res)
            }
            other => other.clone(),
        })
        .collect()
}

fn replace_rec(node: &Ast, replacements: &HashMap<CacheKey, Ast>, memo: &mut HashMap<u64, Ast>) -> Ast {
    if let Some(new) = replacements.get(node.cache_key()) {
        return new.clone();
    }
    if node.is_leaf() {
        return node.clone();
    }
    let args = map_children(node, memo, &mut |child: &Ast, memo: &mut HashMap<u64, Ast>| {
        replace_rec(child, replacements, memo)
    });
    rebuild(node, args)
}

fn excavate_rec(node: &Ast, memo: &mut HashMap<u64, Ast>) -> Ast {
    if node.is_leaf() {
        return node.clone();
    }
    let args = map_children(node, memo, &mut excavate_rec);
    if node.op() == Op::If {
        rebuild(node, args)
    } else {
        lift(node.op(), node.sort(), args)
    }
}

/// Build `op(args)` with every `If` operand hoisted above it.
///
/// Operands that branch on the same condition are split together.
fn lift(op: Op, sort: Sort, args: Vec<Arg>) -> Ast {
    let cond = args
        .iter()
        .filter_map(Arg::as_ast)
        .find(|a| a.op() == Op::If)
        .map(|a| child(a, 0));
    let Some(cond) = cond else {
        return build(op, sort, args);
    };
    let pick = |branch: usize| -> Vec<Arg> {
        args.iter()
            .map(|arg| match arg {
                Arg::Ast(a) if a.op() == Op::If && child(a, 0) == cond => Arg::Ast(child(a, branch)),
                other => other.clone(),
            })
            .collect()
    };
    let then = lift(op, sort, pick(1));
    let orelse = lift(op, sort, pick(2));
    build(Op::If, sort, vec![cond.into(), then.into(), orelse.into()])
}

fn burrow_rec(node: &Ast, memo: &mut HashMap<u64, Ast>) -> Ast {
    if node.is_leaf() {
        return node.clone();
    }
    let args = map_children(node, memo, &mut burrow_rec);
    let node = rebuild(node, args);
    if node.op() == Op::If {
        push_down(&node)
    } else {
        node
    }
}

/// Turn `If(c, f(.., a, ..), f(.., b, ..))` into `f(.., If(c, a, b), ..)`
/// when the arms differ in exactly one operand.
fn push_down(node: &Ast) -> Ast {
    let cond = child(node, 0);
    let (then, orelse) = (child(node, 1), child(node, 2));
    if then.op() != orelse.op() || then.is_leaf() || then.args().len() != orelse.args().len() {
        return node.clone();
    }
    let mut differing = then
        .args()
        .iter()
        .zip(orelse.args())
        .enumerate()
        .filter(|(_, (a, b))| !a.same(b));
    let (index, (a, b)) = match (differing.next(), differing.next()) {
        (Some(only), None) => only,
        _ => return node.clone(),
    };
    let (Arg::Ast(a), Arg::Ast(b)) = (a, b) else {
        return node.clone();
    };
    let inner = build(Op::If, a.sort(), vec![cond.into(), a.into(), b.into()]);
    let inner = if inner.op() == Op::If { push_down(&inner) } else { inner };
    let mut args = then.args().to_vec();
    args[index] = Arg::Ast(inner);
    build(then.op(), then.sort(), args)
}

impl Ast {
    /// Substitute nodes by cache key, bottom-up.
    ///
    /// Every replacement must have the sort of the node it replaces.
    pub fn replace_dict(&self, replacements: &HashMap<CacheKey, Ast>) -> Result<Ast> {
        for (key, new) in replacements {
            if key.sort() != new.sort() {
                return Err(shape_error!("cannot replace a {} with {}", key.sort(), new));
            }
        }
        Ok(replace_rec(self, replacements, &mut HashMap::new()))
    }

    /// Substitute every occurrence of `old` with `new`.
    pub fn replace(&self, old: &Ast, new: &Ast) -> Result<Ast> {
        let replacements = HashMap::from([(old.cache_key().clone(), new.clone())]);
        self.replace_dict(&replacements)
    }

    /// Rename the single free variable of the expression. Declared bounds are kept.
    pub fn renamed(&self, name: &str) -> Result<Ast> {
        if self.variables().len() != 1 {
            return Err(op_error!(
                "cannot rename an expression with {} variables",
                self.variables().len()
            ));
        }
        let replacements = self
            .leaves()
            .into_iter()
            .filter_map(|leaf| {
                let symbol = leaf.symbol()?.renamed(name);
                Some((leaf.cache_key().clone(), symbol_leaf(symbol, leaf.sort())))
            })
            .collect();
        self.replace_dict(&replacements)
    }

    /// Rename every symbolic leaf to `canonical_{i}`, numbered in depth-first
    /// order of first occurrence.
    ///
    /// Two expressions that differ only in variable names canonicalize to the
    /// same node. Returns the old-to-new name mapping with the new expression.
    pub fn canonicalize(&self) -> (BTreeMap<Arc<str>, Arc<str>>, Ast) {
        let mut names = BTreeMap::new();
        let mut replacements = HashMap::new();
        for leaf in self.leaves() {
            let Some(symbol) = leaf.symbol() else {
                continue;
            };
            let name: Arc<str> = format!("canonical_{}", replacements.len()).into();
            names.insert(symbol.name().clone(), name.clone());
            let renamed = Symbol::new(name, symbol.min(), symbol.max());
            replacements.insert(leaf.cache_key().clone(), symbol_leaf(renamed, leaf.sort()));
        }
        debug!("canonicalize: {} symbols", names.len());
        let canonical = replace_rec(self, &replacements, &mut HashMap::new());
        (names, canonical)
    }

    /// Hoist every `If` to the top of the expression.
    pub fn ite_excavated(&self) -> Ast {
        excavate_rec(self, &mut HashMap::new())
    }

    /// Push every `If` as deep as it will go.
    pub fn ite_burrowed(&self) -> Ast {
        burrow_rec(self, &mut HashMap::new())
    }
}

/// Chain of `If(i == key, value, ...)` ending in `default`, in iteration order.
pub fn ite_dict<K, V>(i: &Ast, cases: impl IntoIterator<Item = (K, V)>, default: impl Into<Operand>) -> Result<Ast>
where
    K: Into<Operand>,
    V: Into<Operand>,
{
    let cases = cases
        .into_iter()
        .map(|(k, v)| Ok((i.eq_(k)?, v)))
        .collect::<Result<Vec<_>>>()?;
    ite_cases(cases, default)
}

/// Chain of `If(cond, value, ...)` ending in `default`; the first matching case wins.
///
/// Plain integers take the width of the first expression among the values.
pub fn ite_cases<V>(cases: impl IntoIterator<Item = (Ast, V)>, default: impl Into<Operand>) -> Result<Ast>
where
    V: Into<Operand>,
{
    let cases: Vec<(Ast, Operand)> = cases.into_iter().map(|(c, v)| (c, v.into())).collect();
    let default = default.into();
    let sort = cases
        .iter()
        .find_map(|(_, v)| v.sort())
        .or_else(|| default.sort())
        .ok_or_else(|| shape_error!("cannot infer the sort of the cases"))?;
    let mut acc = default.into_sort(sort)?;
    for (cond, value) in cases.into_iter().rev() {
        acc = ite(cond, value.into_sort(sort)?, acc)?;
    }
    Ok(acc)
}

/// Flatten a tree of `If` nodes into `(path condition, leaf value)` pairs,
/// shallowest first. Cases are produced lazily.
pub fn reverse_ite_cases(ast: &Ast) -> ReverseIteCases {
    ReverseIteCases {
        queue: VecDeque::from([(bool_literal(true), ast.clone())]),
    }
}

/// Breadth-first walk over the leaves of an `If` tree.
#[derive(Debug, Clone)]
pub struct ReverseIteCases {
    queue: VecDeque<(Ast, Ast)>,
}

impl Iterator for ReverseIteCases {
    type Item = Result<(Ast, Ast)>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((cond, node)) = self.queue.pop_front() {
            if node.op() != Op::If {
                return Some(Ok((cond, node)));
            }
            let test = child(&node, 0);
            let branches = crate::build::and([&cond, &test])
                .and_then(|then| Ok((then, crate::build::and([cond, test.not()?])?)));
            match branches {
                Ok((then, otherwise)) => {
                    self.queue.push_back((then, child(&node, 1)));
                    self.queue.push_back((otherwise, child(&node, 2)));
                }
                Err(e) => {
                    self.queue.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build::{and, bool_sym, bvs, bvs_bounded, bvs_explicit, bvv, si};

    #[test]
    fn test_replace() {
        let old = bvs_explicit("old", 32).unwrap();
        let new = bvs_explicit("new", 32).unwrap();
        let ooo = bvv(0, 32).unwrap();

        let cond = old.add(1).unwrap().urem(256).unwrap().eq_(0).unwrap();
        let old_formula = ite(cond, old.add(10).unwrap(), old.add(20).unwrap()).unwrap();
        let new_formula = old_formula.replace(&old, &new).unwrap();
        let ooo_formula = new_formula.replace(&new, &ooo).unwrap();

        assert_ne!(old_formula, new_formula);
        assert_ne!(new_formula, ooo_formula);
        assert_eq!(old_formula.variables().iter().map(|v| v.as_ref()).collect::<Vec<_>>(), ["old"]);
        assert_eq!(new_formula.variables().iter().map(|v| v.as_ref()).collect::<Vec<_>>(), ["new"]);
        assert!(ooo_formula.variables().is_empty());
        assert!(new_formula.symbolic());
        assert_eq!(old_formula.to_string().replace("old", "new"), new_formula.to_string());
        assert_eq!(ooo_formula.literal(), Some(20));
    }

    #[test]
    fn test_replace_dict() {
        let old = bvs_explicit("old", 32).unwrap();
        let c = old.add(10).unwrap().sub(old.add(20).unwrap()).unwrap();
        let d = old.add(1).unwrap().sub(old.add(2).unwrap()).unwrap();
        let replacements = HashMap::from([
            (old.add(10).unwrap().cache_key().clone(), old.add(1).unwrap()),
            (old.add(20).unwrap().cache_key().clone(), old.add(2).unwrap()),
        ]);
        assert_eq!(c.replace_dict(&replacements).unwrap(), d);
    }

    #[test]
    fn test_replace_checks_sorts() {
        let x = bvs("x", 32).unwrap();
        let y = bvs("y", 16).unwrap();
        assert!(x.add(1).unwrap().replace(&x, &y).is_err());
    }

    #[test]
    fn test_replace_unchanged_is_same_node() {
        let x = bvs("x", 32).unwrap();
        let y = bvs("y", 32).unwrap();
        let e = x.mul(3).unwrap().add(1).unwrap();
        assert_eq!(e.replace(&y, &x).unwrap(), e);
    }

    #[test]
    fn test_multiarg_replace() {
        let x = bvs("x", 32).unwrap();
        let o = bvv(2, 32).unwrap();
        let x1 = x.add(1).unwrap();
        let x2 = x.add(2).unwrap();
        let x3 = x.add(3).unwrap();

        let x_add = x.add(&x).unwrap().add(&x).unwrap().add(&x).unwrap();
        let x_mul = x.mul(&x).unwrap().mul(&x).unwrap().mul(&x).unwrap();
        let x_sub = x.sub(&x1).unwrap().sub(&x2).unwrap().sub(&x3).unwrap();
        let x_or = x.bvor(&x1).unwrap().bvor(&x2).unwrap().bvor(&x3).unwrap();
        let x_xor = x.bvxor(&x1).unwrap().bvxor(&x2).unwrap().bvxor(&x3).unwrap();
        let x_and = x.bvand(&x1).unwrap().bvand(&x2).unwrap().bvand(&x3).unwrap();

        for e in [&x_add, &x_mul, &x_sub, &x_or, &x_xor, &x_and] {
            assert_eq!(e.variables(), x.variables());
        }
        assert_eq!(bvv(1, 32).unwrap().add(x.add(&x).unwrap()).unwrap().variables(), x.variables());
        for e in [&x_add, &x_mul, &x_or, &x_xor, &x_and] {
            assert_eq!(e.args().len(), 4, "{}", e);
        }

        assert_eq!(x_add.replace(&x, &o).unwrap().literal(), Some(8));
        assert_eq!(x_mul.replace(&x, &o).unwrap().literal(), Some(16));
        assert_eq!(x_or.replace(&x, &o).unwrap().literal(), Some(7));
        assert_eq!(x_xor.replace(&x, &o).unwrap().literal(), Some(0));
        assert_eq!(x_and.replace(&x, &o).unwrap().literal(), Some(0));
        let sub = x_sub.replace(&x, &o).unwrap();
        assert_eq!(bvv(100, 32).unwrap().add(sub).unwrap().literal(), Some(90));
    }

    #[test]
    fn test_if_stuff() {
        let x = bvs("x", 32).unwrap();
        let gt = x.ugt(10).unwrap();
        let x3 = x.mul(3).unwrap();
        let x4 = x.mul(4).unwrap();

        let nested = ite(&gt, ite(&gt, &x3, x.mul(2).unwrap()).unwrap(), &x4).unwrap();
        let c = nested.add(2).unwrap();
        let cc = ite(&gt, &x3, &x4).unwrap().add(2).unwrap();
        let ccc = ite(&gt, x3.add(2).unwrap(), x4.add(2).unwrap()).unwrap();
        let cccc = x.mul(ite(&gt, bvv(3, 32).unwrap(), bvv(4, 32).unwrap()).unwrap()).unwrap().add(2).unwrap();

        assert_eq!(c, cc);
        assert_eq!(c.ite_excavated(), ccc);
        assert_eq!(ccc.ite_burrowed(), cccc);

        let x3p = x3.add(2).unwrap();
        let x4p = x4.add(2).unwrap();
        let i = c.add(&c).unwrap();
        let ii = ite(&gt, x3p.add(&x3p).unwrap(), x4p.add(&x4p).unwrap()).unwrap();
        assert_eq!(i.ite_excavated(), ii);

        let cn = ite(x.ule(10).unwrap(), bvv(0x10, 32).unwrap(), 0x20).unwrap();
        let iii = c.add(&cn).unwrap();
        let iiii = ite(&gt, x3p.add(0x20).unwrap(), x4p.add(0x10).unwrap()).unwrap();
        assert_eq!(iii.ite_excavated(), iiii);
    }

    #[test]
    fn test_ite_reverse_is_lazy() {
        let a = bvs("a", 32).unwrap();
        let ast = ite_cases((0..30).map(|i| (a.eq_(i).unwrap(), bvv(i, 32).unwrap())), -1).unwrap();

        let mut it = reverse_ite_cases(&ast);
        let (cond, value) = it.next().unwrap().unwrap();
        assert_eq!(cond, a.eq_(0).unwrap());
        assert_eq!(value.literal(), Some(0));
        // Only the unexplored else-branch is pending.
        assert_eq!(it.queue.len(), 1);

        let leaf = bvv(7, 32).unwrap();
        let single: Vec<_> = reverse_ite_cases(&leaf).collect::<Result<_>>().unwrap();
        assert_eq!(single, vec![(bool_literal(true), leaf)]);
    }

    #[test]
    fn test_ite_reverse() {
        let a = bvs("a", 32).unwrap();
        let cases: Vec<(Ast, Ast)> = (0..30)
            .map(|i| (a.eq_(i).unwrap(), bvv(i, 32).unwrap()))
            .collect();
        let ast = ite_cases(cases.clone(), -1).unwrap();
        let ext_cases: Vec<(Ast, Ast)> = reverse_ite_cases(&ast).collect::<Result<_>>().unwrap();

        assert_eq!(ext_cases.len(), 31);
        assert_eq!(ext_cases.iter().filter(|(case, _)| case.op() == Op::And).count(), 1);
        for (case, val) in &ext_cases {
            if case.op() == Op::And {
                assert_eq!(val.literal(), Some(0xffff_ffff));
            } else {
                assert!(cases.iter().any(|(c, v)| c == case && v == val), "{} -> {}", case, val);
            }
        }
    }

    #[test]
    fn test_ite_dict_shape() {
        let x = bvs("x", 32).unwrap();
        let e = ite_dict(&x, [(1, 11), (2, 22)], bvv(0, 32).unwrap()).unwrap();
        assert_eq!(e.op(), Op::If);
        assert_eq!(child(&e, 0), x.eq_(1).unwrap());
        assert_eq!(child(&e, 1).literal(), Some(11));
        assert_eq!(child(&child(&e, 2), 2).literal(), Some(0));
        assert!(ite_cases(Vec::<(Ast, i32)>::new(), 5).is_err());
    }

    #[test]
    fn test_rename() {
        let x1 = bvs("x", 32).unwrap();
        let x2 = x1.renamed("y").unwrap();
        assert_eq!(x2.variables().iter().map(|v| v.as_ref()).collect::<Vec<_>>(), ["y"]);

        let y = bvs_bounded("y", 32, 100, 120).unwrap();
        let renamed = y.renamed("z").unwrap();
        let symbol = renamed.symbol().unwrap();
        assert_eq!((symbol.min(), symbol.max()), (100, 120));

        let both = x1.add(bvs("w", 32).unwrap()).unwrap();
        assert!(both.renamed("q").is_err());
    }

    #[test]
    fn test_canonical() {
        let x1 = bvs("x", 32).unwrap();
        let b1 = bool_sym("b");
        let c1 = bool_sym("c");
        let x2 = bvs("x", 32).unwrap();
        let b2 = bool_sym("b");
        let c2 = bool_sym("c");

        assert_eq!(x1.canonicalize().1, x2.canonicalize().1);

        let make = |x: &Ast, b: &Ast, c: &Ast| {
            let other = x.add(x).unwrap().mul(x).unwrap().add(1).unwrap();
            ite(and([b, c]).unwrap(), x, other).unwrap()
        };
        let y1 = make(&x1, &b1, &c1);
        let y2 = make(&x2, &b2, &c2);
        assert_ne!(y1, y2);

        let (names, canonical) = y1.canonicalize();
        assert_eq!(canonical, y2.canonicalize().1);
        assert_eq!(names.len(), 3);
        assert_eq!(names[b1.symbol().unwrap().name()].as_ref(), "canonical_0");
        assert_eq!(names[x1.symbol().unwrap().name()].as_ref(), "canonical_2");
    }

    #[test]
    fn test_si_leaves_are_distinct() {
        let a = si(32, 2, 20, 100).unwrap();
        let b = si(32, 2, 20, 100).unwrap();
        assert_ne!(a, b);
        assert!(!a.symbolic());
        let sb = a.add(bvv(20, 32).unwrap()).unwrap();
        assert_eq!(sb.children().next(), Some(&a));
    }
}
