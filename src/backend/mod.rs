//! Backends and the registry the solver walks.
//!
//! A backend either answers a query or reports [`Error::Unsupported`], in
//! which case the caller moves on to the next registered backend. Backends
//! come in two categories: quick ones ([`ConcreteBackend`], [`VsaBackend`])
//! are consulted first, full ones (an [`SmtBackend`]) answer everything they
//! can bit-blast.

pub mod concrete;
pub mod smt;
pub mod vsa;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, warn};

use crate::ast::Ast;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::search::BlastQuery;

pub use concrete::ConcreteBackend;
pub use smt::{CheckMode, ModelQuery, SmtBackend};
pub use vsa::{Abstract, VsaBackend};

/// Uniform contract implemented by every backend.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the constraints have a model.
    fn satisfiable(&self, constraints: &[Ast], timeout: Option<Duration>) -> Result<bool>;

    /// Up to `n` distinct values of `expr` consistent with the constraints, sorted.
    ///
    /// Booleans evaluate to 0 and 1.
    fn eval(&self, expr: &Ast, constraints: &[Ast], n: usize, timeout: Option<Duration>) -> Result<Vec<u64>>;

    /// Whether `expr` holds in every model of the constraints.
    fn is_true(&self, expr: &Ast, constraints: &[Ast], timeout: Option<Duration>) -> Result<bool> {
        Ok(self.eval(expr, constraints, 2, timeout)? == [1])
    }

    /// Whether `expr` fails in every model of the constraints.
    fn is_false(&self, expr: &Ast, constraints: &[Ast], timeout: Option<Duration>) -> Result<bool> {
        Ok(self.eval(expr, constraints, 2, timeout)? == [0])
    }
}

/// Which list of a [`Registry`] a backend belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Category {
    Quick,
    Full,
}

/// Ordered lists of active backends, per category.
pub struct Registry {
    quick: RwLock<Vec<Arc<dyn Backend>>>,
    full: RwLock<Vec<Arc<dyn Backend>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults(&Config::default())
    }
}

impl Registry {
    /// A registry with no backends.
    pub fn empty() -> Self {
        Self {
            quick: RwLock::new(Vec::new()),
            full: RwLock::new(Vec::new()),
        }
    }

    /// Concrete and VSA as quick backends, the bit-blasting SMT backend as the full one.
    pub fn with_defaults(config: &Config) -> Self {
        let quick: Vec<Arc<dyn Backend>> = vec![Arc::new(ConcreteBackend), Arc::new(VsaBackend)];
        let full: Vec<Arc<dyn Backend>> = vec![Arc::new(smt(config, CheckMode::Full))];
        Self {
            quick: RwLock::new(quick),
            full: RwLock::new(full),
        }
    }

    fn list(&self, category: Category) -> &RwLock<Vec<Arc<dyn Backend>>> {
        match category {
            Category::Quick => &self.quick,
            Category::Full => &self.full,
        }
    }

    /// Append a backend to the end of a list.
    pub fn register(&self, category: Category, backend: Arc<dyn Backend>) -> Result<()> {
        debug!("registry: adding {} to {:?}", backend.name(), category);
        self.list(category).write().map_err(|_| Error::Lock("backend registry"))?.push(backend);
        Ok(())
    }

    /// Remove the last backend with the given name from a list.
    pub fn deregister(&self, category: Category, name: &str) -> Result<Option<Arc<dyn Backend>>> {
        let mut list = self.list(category).write().map_err(|_| Error::Lock("backend registry"))?;
        let removed = list.iter().rposition(|b| b.name() == name).map(|i| list.remove(i));
        if removed.is_some() {
            debug!("registry: removed {} from {:?}", name, category);
        }
        Ok(removed)
    }

    /// Snapshot of a list, in priority order.
    pub fn backends(&self, category: Category) -> Result<Vec<Arc<dyn Backend>>> {
        Ok(self.list(category).read().map_err(|_| Error::Lock("backend registry"))?.clone())
    }

    pub fn names(&self, category: Category) -> Result<Vec<&'static str>> {
        Ok(self.backends(category)?.iter().map(|b| b.name()).collect())
    }

    /// Whether the quick backends prove `expr` true. Undecided expressions are not true.
    pub fn is_true(&self, expr: &Ast) -> Result<bool> {
        let backends = self.backends(Category::Quick)?;
        undecided_as(false, walk(&backends, |b| b.is_true(expr, &[], None)))
    }

    /// Whether the quick backends prove `expr` false. Undecided expressions are not false.
    pub fn is_false(&self, expr: &Ast) -> Result<bool> {
        let backends = self.backends(Category::Quick)?;
        undecided_as(false, walk(&backends, |b| b.is_false(expr, &[], None)))
    }
}

fn undecided_as(default: bool, res: Result<bool>) -> Result<bool> {
    match res {
        Err(Error::Unsupported { .. }) => Ok(default),
        res => res,
    }
}

/// Ask each backend in turn until one answers.
///
/// [`Error::Unsupported`] moves on to the next backend; every other error,
/// including a timeout, ends the walk.
pub(crate) fn walk<T>(backends: &[Arc<dyn Backend>], mut query: impl FnMut(&dyn Backend) -> Result<T>) -> Result<T> {
    let mut last = unsupported!("registry", "no backend registered");
    for backend in backends {
        match query(backend.as_ref()) {
            Ok(res) => {
                debug!("{} answered", backend.name());
                return Ok(res);
            }
            Err(e) if e.is_recoverable() => {
                debug!("{} gave up: {}", backend.name(), e);
                last = e;
            }
            Err(Error::Timeout(t)) => {
                warn!("{} timed out after {:?}", backend.name(), t);
                return Err(Error::Timeout(t));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last)
}

/// The bit-blasting SMT backend, with the node budget of the given mode.
pub fn smt(config: &Config, mode: CheckMode) -> SmtBackend<BlastQuery> {
    let limit = match mode {
        CheckMode::Quick => config.quick_node_limit,
        CheckMode::Full => config.node_limit,
    };
    SmtBackend::new(BlastQuery::from_config(config, limit), mode)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_default_lists() {
        let registry = Registry::default();
        assert_eq!(registry.names(Category::Quick).unwrap(), vec!["concrete", "vsa"]);
        assert_eq!(registry.names(Category::Full).unwrap(), vec!["smt"]);
    }

    #[test]
    fn test_register_and_deregister() {
        let registry = Registry::empty();
        registry
            .register(Category::Quick, Arc::new(smt(&Config::default(), CheckMode::Quick)))
            .unwrap();
        assert_eq!(registry.names(Category::Quick).unwrap(), vec!["smt-quick"]);
        assert!(registry.deregister(Category::Quick, "smt-quick").unwrap().is_some());
        assert!(registry.deregister(Category::Quick, "smt-quick").unwrap().is_none());
        assert!(registry.backends(Category::Quick).unwrap().is_empty());
    }

    #[test]
    fn test_quick_truth() {
        use crate::build::{bool_val, bvs};

        let registry = Registry::default();
        let a = bvs("a", 32).unwrap();
        let c = a.eq_(a.add(1).unwrap()).unwrap();
        assert!(registry.is_true(&bool_val(true)).unwrap());
        assert!(registry.is_false(&bool_val(false)).unwrap());
        assert!(!registry.is_false(&c).unwrap());
        assert!(!registry.is_true(&c).unwrap());

        registry
            .register(Category::Quick, Arc::new(smt(&Config::default(), CheckMode::Quick)))
            .unwrap();
        assert!(registry.is_false(&c).unwrap());
        assert!(!registry.is_true(&c).unwrap());
        assert!(!registry.is_false(&a.eq_(&a).unwrap()).unwrap());
    }

    #[test]
    fn test_walk_without_backends() {
        let res: Result<bool> = walk(&[], |_| Ok(true));
        assert!(matches!(res, Err(Error::Unsupported { backend: "registry", .. })));
    }
}
