//! Constraint stores that answer queries through the backend registry.
//!
//! A [`Solver`] keeps its constraints in a persistent list: [`Solver::branch`]
//! copies a pointer, and constraints added afterwards extend only the store
//! they were added to. Nothing is checked when a constraint is added; the
//! backends see the whole list on the next query.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use strum::{Display, EnumIter, EnumString};

use crate::ast::Ast;
use crate::backend::{walk, Backend, Category, Registry};
use crate::build::Operand;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::op::Sort;

/// How a solver picks and feeds backends.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Strategy {
    /// Full backends only.
    Direct,
    /// Quick backends first, full backends when they cannot answer.
    Hybrid,
    /// Independent constraint clusters are solved separately, with the full backends.
    Composite,
}

struct Link {
    constraint: Ast,
    prev: Option<Arc<Link>>,
}

/// A stateful constraint store.
#[derive(Clone)]
pub struct Solver {
    head: Option<Arc<Link>>,
    len: usize,
    strategy: Strategy,
    registry: Arc<Registry>,
    config: Config,
}

impl Solver {
    pub fn new(strategy: Strategy) -> Self {
        Self::with_config(strategy, Config::default())
    }

    /// A solver with its own registry built from `config`.
    pub fn with_config(strategy: Strategy, config: Config) -> Self {
        Self {
            head: None,
            len: 0,
            strategy,
            registry: Arc::new(Registry::with_defaults(&config)),
            config,
        }
    }

    /// Use a shared registry instead of the solver's own.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config.timeout = timeout;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a boolean constraint.
    pub fn add(&mut self, constraint: impl Into<Operand>) -> Result<()> {
        let constraint = constraint.into().into_sort(Sort::Bool)?;
        self.head = Some(Arc::new(Link {
            constraint,
            prev: self.head.take(),
        }));
        self.len += 1;
        Ok(())
    }

    /// The constraints, oldest first.
    pub fn constraints(&self) -> Vec<Ast> {
        let mut res = Vec::with_capacity(self.len);
        let mut link = self.head.as_deref();
        while let Some(l) = link {
            res.push(l.constraint.clone());
            link = l.prev.as_deref();
        }
        res.reverse();
        res
    }

    /// An independent store sharing every constraint added so far.
    pub fn branch(&self) -> Self {
        self.clone()
    }

    fn backends(&self) -> Result<Vec<Arc<dyn Backend>>> {
        let mut res = Vec::new();
        if self.strategy == Strategy::Hybrid {
            res.extend(self.registry.backends(Category::Quick)?);
        }
        res.extend(self.registry.backends(Category::Full)?);
        Ok(res)
    }

    pub fn satisfiable(&self) -> Result<bool> {
        let backends = self.backends()?;
        let timeout = self.config.timeout;
        let constraints = self.constraints();
        if self.strategy != Strategy::Composite {
            return walk(&backends, |b| b.satisfiable(&constraints, timeout));
        }
        for cluster in clusters(&constraints) {
            if !walk(&backends, |b| b.satisfiable(&cluster, timeout))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Up to `n` distinct values of `expr` under the constraints, sorted.
    ///
    /// Booleans evaluate to 0 and 1. An empty result means the constraints
    /// are unsatisfiable.
    pub fn eval(&self, expr: &Ast, n: usize) -> Result<Vec<u64>> {
        let backends = self.backends()?;
        let timeout = self.config.timeout;
        let mut constraints = self.constraints();

        if self.strategy == Strategy::Composite {
            let (touching, rest): (Vec<_>, Vec<_>) = clusters(&constraints)
                .into_iter()
                .partition(|cluster| cluster.iter().any(|c| !c.variables().is_disjoint(expr.variables())));
            for cluster in &rest {
                if !walk(&backends, |b| b.satisfiable(cluster, timeout))? {
                    debug!("composite: independent cluster of {} is unsatisfiable", cluster.len());
                    return Ok(Vec::new());
                }
            }
            debug!("composite: {} clusters touch the target, {} do not", touching.len(), rest.len());
            constraints = touching.into_iter().flatten().collect();
        }

        let mut values = walk(&backends, |b| b.eval(expr, &constraints, n, timeout))?;
        values.sort_unstable();
        values.dedup();
        values.truncate(n);
        Ok(values)
    }

    /// The smallest value of `expr` found among `default_n` candidates.
    pub fn eval_one(&self, expr: &Ast) -> Result<u64> {
        self.eval(expr, self.config.default_n.max(1))?
            .first()
            .copied()
            .ok_or(Error::Unsat)
    }

    /// Whether `expr` holds in every model of the constraints.
    pub fn is_true(&self, expr: &Ast) -> Result<bool> {
        Ok(self.eval(expr, 2)? == [1])
    }

    /// Whether `expr` fails in every model of the constraints.
    pub fn is_false(&self, expr: &Ast) -> Result<bool> {
        Ok(self.eval(expr, 2)? == [0])
    }
}

/// Partition constraints into groups that share no variables, keeping their order.
fn clusters(constraints: &[Ast]) -> Vec<Vec<Ast>> {
    let mut parent: Vec<usize> = (0..constraints.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (i, constraint) in constraints.iter().enumerate() {
        for name in constraint.variables() {
            match owner.get(name.as_ref()) {
                Some(&j) => {
                    let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                    parent[a] = b;
                }
                None => {
                    owner.insert(name.as_ref(), i);
                }
            }
        }
    }

    let mut groups: Vec<Vec<Ast>> = Vec::new();
    let mut slot: HashMap<usize, usize> = HashMap::new();
    for (i, constraint) in constraints.iter().enumerate() {
        let root = find(&mut parent, i);
        let index = *slot.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(constraint.clone());
    }
    groups
}
