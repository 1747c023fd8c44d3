//! Construction-time rewrites.
//!
//! Every node passes through [`build`] before it is interned. The rewrites are
//! local and cheap: they look at the operation and its direct operands only,
//! and never consult a backend.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::ast::{Arg, Ast};
use crate::intern::intern;
use crate::op::{Op, Sort};
use crate::value::{self, mask, Value};

/// Build the node `op(args)` of the given sort, applying construction rewrites.
///
/// Operands are assumed to be well-shaped; the public constructors check them.
pub(crate) fn build(op: Op, sort: Sort, args: Vec<Arg>) -> Ast {
    match op {
        _ if op.is_leaf() => intern(op, sort, args),
        _ if op.is_flattenable() => flatten(op, sort, args),
        Op::Extract => extract(sort, args),
        Op::Concat => concat(sort, args),
        Op::Reverse => reverse(sort, args),
        Op::ZeroExt | Op::SignExt => extend(op, sort, args),
        Op::Not => not(args),
        Op::And | Op::Or => connective(op, args),
        Op::If => ite(sort, args),
        _ if op.is_comparison() => compare(op, args),
        _ => fold(op, &args).unwrap_or_else(|| intern(op, sort, args)),
    }
}

pub(crate) fn bv_literal(value: u64, bits: u32) -> Ast {
    intern(Op::BVV, Sort::Bv(bits), vec![Arg::Int(value & mask(bits))])
}

pub(crate) fn bool_literal(value: bool) -> Ast {
    intern(Op::BoolV, Sort::Bool, vec![Arg::Bool(value)])
}

pub(crate) fn literal(value: Value) -> Ast {
    match value {
        Value::Bool(b) => bool_literal(b),
        Value::Bv(bv) => bv_literal(bv.value(), bv.bits()),
    }
}

/// Evaluate `op` when every nested operand is a literal.
fn fold(op: Op, args: &[Arg]) -> Option<Ast> {
    let mut params = Vec::new();
    let mut values = Vec::new();
    for arg in args {
        match arg {
            Arg::Ast(ast) => values.push(ast.literal_value()?),
            Arg::Int(v) => params.push(*v),
            _ => return None,
        }
    }
    if values.is_empty() {
        return None;
    }
    let res = value::apply(op, &params, &values)?;
    trace!("fold: {} -> {}", op, res);
    Some(literal(res))
}

fn asts(args: Vec<Arg>) -> Vec<Ast> {
    args.into_iter()
        .filter_map(|arg| match arg {
            Arg::Ast(ast) => Some(ast),
            _ => None,
        })
        .collect()
}

fn to_args(asts: Vec<Ast>) -> Vec<Arg> {
    asts.into_iter().map(Arg::Ast).collect()
}

/// The `i`-th nested operand; callers only ask for positions the op is known to have.
fn child(ast: &Ast, i: usize) -> &Ast {
    ast.children().nth(i).unwrap_or(ast)
}

/// Splice nested same-op chains and merge every literal into one trailing constant.
fn flatten(op: Op, sort: Sort, args: Vec<Arg>) -> Ast {
    let mut terms = Vec::new();
    let mut literals = Vec::new();
    for ast in asts(args) {
        let parts: Vec<Ast> = if ast.op() == op {
            ast.children().cloned().collect()
        } else {
            vec![ast]
        };
        for part in parts {
            match part.literal_value() {
                Some(v) => literals.push(v),
                None => terms.push(part),
            }
        }
    }
    if !literals.is_empty() {
        if let Some(merged) = value::apply(op, &[], &literals) {
            terms.push(literal(merged));
        }
    }
    if terms.len() == 1 {
        return terms.remove(0);
    }
    intern(op, sort, to_args(terms))
}

fn extract_parts(ast: &Ast) -> Option<(u32, u32, &Ast)> {
    if ast.op() != Op::Extract {
        return None;
    }
    let mut params = ast.params();
    let hi = params.next()? as u32;
    let lo = params.next()? as u32;
    Some((hi, lo, ast.children().next()?))
}

fn extract(sort: Sort, args: Vec<Arg>) -> Ast {
    if let Some(folded) = fold(Op::Extract, &args) {
        return folded;
    }
    let (hi, lo, inner) = match args.as_slice() {
        [Arg::Int(hi), Arg::Int(lo), Arg::Ast(inner)] => (*hi as u32, *lo as u32, inner.clone()),
        _ => return intern(Op::Extract, sort, args),
    };
    if lo == 0 && hi + 1 == inner.length() {
        return inner;
    }
    if let Some((_, inner_lo, source)) = extract_parts(&inner) {
        let args = vec![
            Arg::Int((hi + inner_lo) as u64),
            Arg::Int((lo + inner_lo) as u64),
            Arg::Ast(source.clone()),
        ];
        return build(Op::Extract, sort, args);
    }
    if inner.op() == Op::Concat {
        let mut top = inner.length();
        for piece in inner.children() {
            let bottom = top - piece.length();
            if lo >= bottom && hi < top {
                let args = vec![
                    Arg::Int((hi - bottom) as u64),
                    Arg::Int((lo - bottom) as u64),
                    Arg::Ast(piece.clone()),
                ];
                return build(Op::Extract, sort, args);
            }
            top = bottom;
        }
    }
    intern(Op::Extract, sort, args)
}

fn concat(sort: Sort, args: Vec<Arg>) -> Ast {
    let mut pieces: Vec<Ast> = Vec::new();
    for ast in asts(args) {
        let parts: Vec<Ast> = if ast.op() == Op::Concat {
            ast.children().cloned().collect()
        } else {
            vec![ast]
        };
        for part in parts {
            let merged = match (pieces.last().and_then(extract_parts), extract_parts(&part)) {
                (Some((hi, lo, a)), Some((next_hi, next_lo, b))) if a == b && lo == next_hi + 1 => {
                    let width = hi - next_lo + 1;
                    let args = vec![
                        Arg::Int(hi as u64),
                        Arg::Int(next_lo as u64),
                        Arg::Ast(a.clone()),
                    ];
                    Some(build(Op::Extract, Sort::Bv(width), args))
                }
                _ => None,
            };
            match merged {
                Some(merged) => {
                    pieces.pop();
                    pieces.push(merged);
                }
                None => pieces.push(part),
            }
        }
    }
    if pieces.len() == 1 {
        return pieces.remove(0);
    }
    let args = to_args(pieces);
    fold(Op::Concat, &args).unwrap_or_else(|| intern(Op::Concat, sort, args))
}

fn reverse(sort: Sort, args: Vec<Arg>) -> Ast {
    if let Some(folded) = fold(Op::Reverse, &args) {
        return folded;
    }
    if let [Arg::Ast(inner)] = args.as_slice() {
        if inner.op() == Op::Reverse {
            return child(inner, 0).clone();
        }
        if inner.length() == 8 {
            return inner.clone();
        }
    }
    intern(Op::Reverse, sort, args)
}

fn extend(op: Op, sort: Sort, args: Vec<Arg>) -> Ast {
    if let [Arg::Int(0), Arg::Ast(inner)] = args.as_slice() {
        return inner.clone();
    }
    fold(op, &args).unwrap_or_else(|| intern(op, sort, args))
}

fn not(args: Vec<Arg>) -> Ast {
    if let Some(folded) = fold(Op::Not, &args) {
        return folded;
    }
    if let [Arg::Ast(inner)] = args.as_slice() {
        if inner.op() == Op::Not {
            return child(inner, 0).clone();
        }
        if let Some(negated) = inner.op().negated() {
            return build(negated, Sort::Bool, inner.args().to_vec());
        }
    }
    intern(Op::Not, Sort::Bool, args)
}

fn compare(op: Op, args: Vec<Arg>) -> Ast {
    if let Some(folded) = fold(op, &args) {
        return folded;
    }
    if let [Arg::Ast(a), Arg::Ast(b)] = args.as_slice() {
        if a == b {
            let reflexive = matches!(op, Op::Eq | Op::ULE | Op::UGE | Op::SLE | Op::SGE);
            return bool_literal(reflexive);
        }
    }
    intern(op, Sort::Bool, args)
}

/// Split `x == c` (or `c == x`) into the symbolic side and the constant.
fn literal_comparison(ast: &Ast, op: Op) -> Option<(&Ast, u64)> {
    if ast.op() != op {
        return None;
    }
    let a = child(ast, 0);
    let b = child(ast, 1);
    match (a.is_literal(), b.is_literal()) {
        (false, true) => Some((a, b.literal()?)),
        (true, false) => Some((b, a.literal()?)),
        _ => None,
    }
}

/// Resolve `x == c1` against other equalities and disequalities on `x`.
///
/// Returns `false` when the conjunction is contradictory; otherwise drops the
/// disequalities that the equalities already imply.
fn merge_equalities(terms: &mut Vec<Ast>) -> bool {
    let mut equalities: HashMap<u64, u64> = HashMap::new();
    for term in terms.iter() {
        if let Some((x, c)) = literal_comparison(term, Op::Eq) {
            if let Some(previous) = equalities.insert(x.id(), c) {
                if previous != c {
                    return false;
                }
            }
        }
    }
    if equalities.is_empty() {
        return true;
    }
    let mut consistent = true;
    terms.retain(|term| match literal_comparison(term, Op::Ne) {
        Some((x, c)) => match equalities.get(&x.id()) {
            Some(&value) if value == c => {
                consistent = false;
                true
            }
            Some(_) => false,
            None => true,
        },
        None => true,
    });
    consistent
}

fn connective(op: Op, args: Vec<Arg>) -> Ast {
    let identity = op == Op::And;
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for ast in asts(args) {
        let parts: Vec<Ast> = if ast.op() == op {
            ast.children().cloned().collect()
        } else {
            vec![ast]
        };
        for part in parts {
            match part.literal_value() {
                Some(Value::Bool(b)) if b == identity => {}
                Some(Value::Bool(_)) => return bool_literal(!identity),
                _ => {
                    if seen.insert(part.id()) {
                        terms.push(part);
                    }
                }
            }
        }
    }
    if op == Op::And && !merge_equalities(&mut terms) {
        return bool_literal(false);
    }
    match terms.len() {
        0 => bool_literal(identity),
        1 => terms.remove(0),
        _ => intern(op, Sort::Bool, to_args(terms)),
    }
}

fn ite(sort: Sort, args: Vec<Arg>) -> Ast {
    let (cond, then, orelse) = match args.as_slice() {
        [Arg::Ast(c), Arg::Ast(t), Arg::Ast(e)] => (c.clone(), t.clone(), e.clone()),
        _ => return intern(Op::If, sort, args),
    };

    if let Some(Value::Bool(b)) = cond.literal_value() {
        return if b { then } else { orelse };
    }
    if then == orelse {
        return then;
    }
    if cond.op().is_negative_condition() {
        let positive = if cond.op() == Op::Not {
            child(&cond, 0).clone()
        } else {
            build(Op::Not, Sort::Bool, vec![Arg::Ast(cond.clone())])
        };
        return build(Op::If, sort, vec![positive.into(), orelse.into(), then.into()]);
    }

    let same_cond = |branch: &Ast| branch.op() == Op::If && *child(branch, 0) == cond;
    let then_inner = same_cond(&then).then(|| child(&then, 1).clone());
    let orelse_inner = same_cond(&orelse).then(|| child(&orelse, 2).clone());
    if then_inner.is_some() || orelse_inner.is_some() {
        let then = then_inner.unwrap_or(then);
        let orelse = orelse_inner.unwrap_or(orelse);
        return build(Op::If, sort, vec![cond.into(), then.into(), orelse.into()]);
    }

    if sort.is_bool() {
        match (then.literal_value(), orelse.literal_value()) {
            (Some(Value::Bool(true)), Some(Value::Bool(false))) => return cond,
            (Some(Value::Bool(false)), Some(Value::Bool(true))) => {
                return build(Op::Not, Sort::Bool, vec![cond.into()]);
            }
            _ => {}
        }
    }
    intern(Op::If, sort, vec![cond.into(), then.into(), orelse.into()])
}
