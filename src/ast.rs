//! Immutable, hash-consed expression nodes.
//!
//! Every [`Ast`] is a shared handle to a [`Node`] registered in the process-wide
//! operand cache (see [`crate::intern`]). Two constructions with the same
//! operation, operands and sort yield the *same* node, so equality of handles
//! is pointer identity and never needs a deep comparison.

use std::collections::{BTreeSet, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::interval::StridedInterval;
use crate::intern;
use crate::op::{Op, Sort};
use crate::value::{BitVec, Value};

/// Descriptor of a symbolic leaf: its name and declared value bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: Arc<str>,
    min: u64,
    max: u64,
}

impl Symbol {
    pub fn new(name: impl Into<Arc<str>>, min: u64, max: u64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }
    pub fn min(&self) -> u64 {
        self.min
    }
    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn renamed(&self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            min: self.min,
            max: self.max,
        }
    }
}

/// One operand of a node.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A nested expression.
    Ast(Ast),
    /// A raw integer: literal payload, extract bound, extension width or leaf id.
    Int(u64),
    /// A raw boolean literal payload.
    Bool(bool),
    /// A symbolic leaf descriptor.
    Symbol(Arc<Symbol>),
    /// An abstract value carried by a strided-interval leaf.
    Interval(StridedInterval),
}

impl Arg {
    pub fn as_ast(&self) -> Option<&Ast> {
        match self {
            Arg::Ast(ast) => Some(ast),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Identity comparison: nested nodes by pointer, raw values by value.
    pub fn same(&self, other: &Arg) -> bool {
        match (self, other) {
            (Arg::Ast(a), Arg::Ast(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            (Arg::Symbol(a), Arg::Symbol(b)) => a == b,
            (Arg::Interval(a), Arg::Interval(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Ast> for Arg {
    fn from(ast: Ast) -> Self {
        Arg::Ast(ast)
    }
}

impl From<&Ast> for Arg {
    fn from(ast: &Ast) -> Self {
        Arg::Ast(ast.clone())
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum KeyArg {
    Node(u64),
    Int(u64),
    Bool(bool),
    Symbol(Arc<Symbol>),
    Interval(StridedInterval),
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct KeyData {
    op: Op,
    sort: Sort,
    args: Vec<KeyArg>,
}

/// Structural fingerprint of a node.
///
/// Nested operands contribute their node identity rather than their subtree,
/// so building a key is linear in the arity. Equal keys of live nodes imply
/// the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<KeyData>);

impl CacheKey {
    pub(crate) fn new(op: Op, sort: Sort, args: &[Arg]) -> Self {
        let args = args
            .iter()
            .map(|arg| match arg {
                Arg::Ast(ast) => KeyArg::Node(ast.id()),
                Arg::Int(v) => KeyArg::Int(*v),
                Arg::Bool(b) => KeyArg::Bool(*b),
                Arg::Symbol(s) => KeyArg::Symbol(s.clone()),
                Arg::Interval(si) => KeyArg::Interval(*si),
            })
            .collect();
        Self(Arc::new(KeyData { op, sort, args }))
    }

    pub fn op(&self) -> Op {
        self.0.op
    }

    pub fn sort(&self) -> Sort {
        self.0.sort
    }
}

/// An immutable expression node.
pub struct Node {
    id: u64,
    op: Op,
    sort: Sort,
    args: Vec<Arg>,
    variables: BTreeSet<Arc<str>>,
    depth: u32,
    key: CacheKey,
}

impl Node {
    pub(crate) fn new(id: u64, op: Op, sort: Sort, args: Vec<Arg>, key: CacheKey) -> Self {
        let mut variables = BTreeSet::new();
        let mut depth = 0;
        for arg in &args {
            match arg {
                Arg::Ast(ast) => {
                    variables.extend(ast.variables.iter().cloned());
                    depth = depth.max(ast.depth);
                }
                Arg::Symbol(s) => {
                    variables.insert(s.name.clone());
                }
                _ => {}
            }
        }
        Self {
            id,
            op,
            sort,
            args,
            variables,
            depth: depth + 1,
            key,
        }
    }

    /// Process-unique identity of the node.
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn op(&self) -> Op {
        self.op
    }
    pub fn sort(&self) -> Sort {
        self.sort
    }
    /// Bit-length of the node; booleans have length 1.
    pub fn length(&self) -> u32 {
        self.sort.bits()
    }
    pub fn args(&self) -> &[Arg] {
        &self.args
    }
    /// Free symbolic names reachable from this node.
    pub fn variables(&self) -> &BTreeSet<Arc<str>> {
        &self.variables
    }
    pub fn symbolic(&self) -> bool {
        !self.variables.is_empty()
    }
    /// 1 for leaves, one more than the deepest operand otherwise.
    pub fn depth(&self) -> u32 {
        self.depth
    }
    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_leaf(&self) -> bool {
        self.op.is_leaf()
    }

    /// Whether the node is a bitvector or boolean literal.
    pub fn is_literal(&self) -> bool {
        self.op.is_literal()
    }

    /// The integer value of a literal; booleans become 0 or 1.
    pub fn literal(&self) -> Option<u64> {
        match (self.op, self.args.first()) {
            (Op::BVV, Some(Arg::Int(v))) => Some(*v),
            (Op::BoolV, Some(Arg::Bool(b))) => Some(*b as u64),
            _ => None,
        }
    }

    /// The concrete value of a literal node.
    pub fn literal_value(&self) -> Option<Value> {
        match (self.op, self.sort, self.args.first()) {
            (Op::BVV, Sort::Bv(bits), Some(Arg::Int(v))) => Some(Value::Bv(BitVec::new(*v, bits))),
            (Op::BoolV, _, Some(Arg::Bool(b))) => Some(Value::Bool(*b)),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.literal_value() == Some(Value::Bool(true))
    }

    pub fn is_false(&self) -> bool {
        self.literal_value() == Some(Value::Bool(false))
    }

    /// The leaf descriptor of a `BVS` or `BoolS` node.
    pub fn symbol(&self) -> Option<&Arc<Symbol>> {
        match (self.op, self.args.first()) {
            (Op::BVS | Op::BoolS, Some(Arg::Symbol(s))) => Some(s),
            _ => None,
        }
    }

    /// The interval carried by an `SI` leaf.
    pub fn interval(&self) -> Option<StridedInterval> {
        match (self.op, self.args.first()) {
            (Op::SI, Some(Arg::Interval(si))) => Some(*si),
            _ => None,
        }
    }

    /// Nested expression operands, in order.
    pub fn children(&self) -> impl Iterator<Item = &Ast> {
        self.args.iter().filter_map(Arg::as_ast)
    }

    /// Integer operands, in order.
    pub fn params(&self) -> impl Iterator<Item = u64> + '_ {
        self.args.iter().filter_map(Arg::as_int)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        intern::release(&self.key);
    }
}

/// Shared handle to an interned [`Node`].
#[derive(Clone)]
pub struct Ast(Arc<Node>);

impl Ast {
    pub(crate) fn from_node(node: Arc<Node>) -> Self {
        Self(node)
    }

    /// Distinct leaf nodes reachable from this node, in depth-first order.
    pub fn leaves(&self) -> Vec<Ast> {
        let mut visited = HashSet::new();
        let mut leaves = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            if node.is_leaf() {
                leaves.push(node);
                continue;
            }
            let children: Vec<Ast> = node.children().cloned().collect();
            stack.extend(children.into_iter().rev());
        }
        leaves
    }

    /// Render the node, eliding operands deeper than `max_depth` as `<...>`.
    pub fn shallow_repr(&self, max_depth: u32) -> String {
        let mut out = String::new();
        let _ = write_node(&mut out, self, Some(max_depth));
        format!("<{} {}>", self.sort, out)
    }
}

impl Deref for Ast {
    type Target = Node;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Ast {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Ast {}

impl Hash for Ast {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

fn write_leaf(out: &mut impl fmt::Write, node: &Node) -> fmt::Result {
    if let Some(value) = node.literal_value() {
        return write!(out, "{}", value);
    }
    if let Some(symbol) = node.symbol() {
        return write!(out, "{}", symbol.name);
    }
    if let Some(si) = node.interval() {
        return write!(out, "SI{}", si);
    }
    write!(out, "{}", node.op)
}

fn write_node(out: &mut impl fmt::Write, node: &Ast, depth: Option<u32>) -> fmt::Result {
    if node.is_leaf() {
        return write_leaf(out, node);
    }
    let child_depth = depth.map(|d| d.saturating_sub(1));
    write!(out, "{}(", node.op)?;
    for (i, arg) in node.args.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        match arg {
            Arg::Ast(_) if child_depth == Some(0) => write!(out, "<...>")?,
            Arg::Ast(child) => write_node(out, child, child_depth)?,
            Arg::Int(v) => write!(out, "{}", v)?,
            Arg::Bool(b) => write!(out, "{}", if *b { "True" } else { "False" })?,
            Arg::Symbol(s) => write!(out, "{}", s.name)?,
            Arg::Interval(si) => write!(out, "SI{}", si)?,
        }
    }
    write!(out, ")")
}

impl Display for Ast {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} ", self.sort)?;
        write_node(f, self, None)?;
        write!(f, ">")
    }
}

impl Debug for Ast {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
