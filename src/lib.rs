//! # symbv-rs: hash-consed symbolic bitvectors
//!
//! **`symbv-rs`** builds bitvector and boolean formulas as immutable,
//! hash-consed expression trees, simplifies them as they are built, and
//! answers questions about them through interchangeable backends.
//!
//! ## Key Features
//!
//! - **Hash-Consing**: Structurally equal expressions are the *same* node. Equality of [`Ast`] handles is pointer equality, so `(x + 1) + 1` and `x + 2` compare equal without a deep walk.
//! - **Construction-Time Rewriting**: Constant chains are folded, extracts and concatenations collapse back to their source, double reversal cancels, and `If` conditions are normalized.
//! - **ITE Transforms**: Conditionals can be lifted out of arithmetic ([`Ast::ite_excavated`]) or pushed back in ([`Ast::ite_burrowed`]).
//! - **Three Backends**: exact [`concrete`][crate::backend::concrete] evaluation, strided-interval [`vsa`][crate::backend::vsa] analysis, and an [`smt`][crate::backend::smt] backend speaking an incremental model-query protocol. The bundled [`BlastQuery`] bit-blasts formulas into a reduced ordered BDD.
//! - **Solver Strategies**: [`Solver`] stores constraints persistently, so [`Solver::branch`] is cheap, and queries run [`Direct`][Strategy::Direct], [`Hybrid`][Strategy::Hybrid] or [`Composite`][Strategy::Composite].
//!
//! ## Basic Usage
//!
//! ```rust
//! use symbv_rs::{bvs, Solver, Strategy};
//!
//! // 1. Declare a symbol
//! let x = bvs("x", 32).unwrap();
//!
//! // 2. Build expressions; constants fold as the tree is built
//! let y = x.add(1).unwrap().add(1).unwrap();
//! assert_eq!(y, x.add(2).unwrap());
//!
//! // 3. Constrain and solve
//! let mut s = Solver::new(Strategy::Hybrid);
//! s.add(y.eq_(10).unwrap()).unwrap();
//! assert_eq!(s.eval(&x, 5).unwrap(), vec![8]);
//! ```
//!
//! ## Core Components
//!
//! - **[`ast`]**: Expression nodes, operands and cache keys.
//! - **[`build`]**: Constructors and operators.
//! - **[`backend`]**: The backend contract, the three backends and the registry.
//! - **[`solver`]**: Constraint stores and solving strategies.
//! - **[`bdd`]**: The BDD manager behind bit-blasting.

#[macro_use]
mod error;

pub mod ast;
pub mod backend;
pub mod bdd;
mod blast;
pub mod build;
pub mod cache;
pub mod config;
mod intern;
pub mod interval;
pub mod op;
pub mod reference;
mod rewrite;
pub mod sat;
pub mod search;
mod simplify;
pub mod solver;
pub mod table;
pub mod value;

pub use ast::{Arg, Ast, CacheKey, Node, Symbol};
pub use backend::{Backend, Category, CheckMode, ConcreteBackend, ModelQuery, Registry, SmtBackend, VsaBackend};
pub use build::{
    and, bool_sym, bool_sym_explicit, bool_val, bvs, bvs_bounded, bvs_explicit, bvv, bvv_bytes, concat, ite, not, or,
    si, Bvs, Operand,
};
pub use config::Config;
pub use error::{Error, Result};
pub use intern::cached_nodes;
pub use interval::{BoolResult, StridedInterval};
pub use op::{Op, Sort};
pub use rewrite::{ite_cases, ite_dict, reverse_ite_cases, ReverseIteCases};
pub use search::BlastQuery;
pub use solver::{Solver, Strategy};
pub use value::{BitVec, Value};
