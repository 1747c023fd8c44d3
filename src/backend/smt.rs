//! Backend that answers through an incremental model-query collaborator.

use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::ast::Ast;
use crate::backend::Backend;
use crate::error::{Error, Result};

/// Incremental model-query protocol spoken by SMT-style solvers.
///
/// Assertions live in frames: [`push`](ModelQuery::push) opens a frame and
/// [`pop`](ModelQuery::pop) discards every assertion made since the matching push.
pub trait ModelQuery: Send {
    fn push(&mut self);
    fn pop(&mut self) -> Result<()>;
    fn assert(&mut self, constraint: &Ast) -> Result<()>;

    /// Whether the asserted constraints have a model.
    fn check(&mut self, timeout: Option<Duration>) -> Result<bool>;

    /// Up to `n` distinct values `target` takes in models of the asserted constraints.
    ///
    /// An empty result means the constraints are unsatisfiable.
    fn values(&mut self, target: &Ast, n: usize, timeout: Option<Duration>) -> Result<Vec<u64>>;
}

/// How much effort a query may spend before giving up as unsupported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CheckMode {
    /// Cheap pre-filter, registered among the quick backends.
    Quick,
    /// Exhaustive query.
    Full,
}

struct Session<Q> {
    query: Q,
    asserted: Vec<Ast>,
}

impl<Q: ModelQuery> Session<Q> {
    /// Bring the asserted frames in line with `constraints`, keeping the shared prefix.
    fn sync(&mut self, constraints: &[Ast]) -> Result<()> {
        let common = self
            .asserted
            .iter()
            .zip(constraints)
            .take_while(|(a, b)| a == b)
            .count();
        let dropped = self.asserted.len() - common;
        for _ in 0..dropped {
            self.query.pop()?;
        }
        self.asserted.truncate(common);
        for constraint in &constraints[common..] {
            self.query.push();
            if let Err(e) = self.query.assert(constraint) {
                self.query.pop()?;
                return Err(e);
            }
            self.asserted.push(constraint.clone());
        }
        debug!(
            "smt: reused {} frames, popped {}, pushed {}",
            common,
            dropped,
            constraints.len() - common
        );
        Ok(())
    }
}

/// Backend delegating to a [`ModelQuery`] implementation.
///
/// Each constraint is asserted in its own frame, so consecutive queries
/// against stores that share a prefix (as branches of one solver do) only
/// pop and push the suffix that differs.
pub struct SmtBackend<Q> {
    session: Mutex<Session<Q>>,
    mode: CheckMode,
}

impl<Q: ModelQuery> SmtBackend<Q> {
    pub fn new(query: Q, mode: CheckMode) -> Self {
        Self {
            session: Mutex::new(Session {
                query,
                asserted: Vec::new(),
            }),
            mode,
        }
    }

    pub fn mode(&self) -> CheckMode {
        self.mode
    }
}

impl<Q: ModelQuery> Backend for SmtBackend<Q> {
    fn name(&self) -> &'static str {
        match self.mode {
            CheckMode::Quick => "smt-quick",
            CheckMode::Full => "smt",
        }
    }

    fn satisfiable(&self, constraints: &[Ast], timeout: Option<Duration>) -> Result<bool> {
        let mut session = self.session.lock().map_err(|_| Error::Lock("smt session"))?;
        session.sync(constraints)?;
        session.query.check(timeout)
    }

    fn eval(&self, expr: &Ast, constraints: &[Ast], n: usize, timeout: Option<Duration>) -> Result<Vec<u64>> {
        let mut session = self.session.lock().map_err(|_| Error::Lock("smt session"))?;
        session.sync(constraints)?;
        session.query.values(expr, n, timeout)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::build::bvs;

    /// Records the protocol traffic instead of solving.
    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        depth: usize,
        reject: Option<Ast>,
    }

    impl ModelQuery for Recorder {
        fn push(&mut self) {
            self.depth += 1;
            self.log.push("push".to_string());
        }

        fn pop(&mut self) -> Result<()> {
            if self.depth == 0 {
                return Err(op_error!("pop without push"));
            }
            self.depth -= 1;
            self.log.push("pop".to_string());
            Ok(())
        }

        fn assert(&mut self, constraint: &Ast) -> Result<()> {
            if self.reject.as_ref() == Some(constraint) {
                return Err(op_error!("cannot assert {}", constraint));
            }
            self.log.push(format!("assert {}", constraint));
            Ok(())
        }

        fn check(&mut self, _timeout: Option<Duration>) -> Result<bool> {
            Ok(true)
        }

        fn values(&mut self, _target: &Ast, _n: usize, _timeout: Option<Duration>) -> Result<Vec<u64>> {
            Ok(vec![self.depth as u64])
        }
    }

    #[test]
    fn test_shared_prefix_is_reused() {
        let x = bvs("x", 8).unwrap();
        let a = x.ugt(1).unwrap();
        let b = x.ult(9).unwrap();
        let c = x.ne_(5).unwrap();

        let backend = SmtBackend::new(Recorder::default(), CheckMode::Full);
        assert_eq!(backend.eval(&x, &[a.clone(), b.clone()], 1, None).unwrap(), vec![2]);
        assert_eq!(backend.eval(&x, &[a.clone(), c.clone()], 1, None).unwrap(), vec![2]);
        assert_eq!(backend.eval(&x, &[a.clone()], 1, None).unwrap(), vec![1]);

        let session = backend.session.lock().unwrap();
        let pushes = session.query.log.iter().filter(|s| *s == "push").count();
        let pops = session.query.log.iter().filter(|s| *s == "pop").count();
        assert_eq!(pushes, 3);
        assert_eq!(pops, 2);
    }

    #[test]
    fn test_failed_assert_leaves_no_frame() {
        let x = bvs("x", 8).unwrap();
        let a = x.ugt(1).unwrap();
        let bad = x.ult(9).unwrap();
        let c = x.ne_(5).unwrap();

        let recorder = Recorder {
            reject: Some(bad.clone()),
            ..Recorder::default()
        };
        let backend = SmtBackend::new(recorder, CheckMode::Full);
        assert!(backend.eval(&x, &[a.clone(), bad.clone(), c.clone()], 1, None).is_err());
        {
            let session = backend.session.lock().unwrap();
            assert_eq!(session.asserted, vec![a.clone()]);
            assert_eq!(session.query.depth, 1);
        }

        // The next query resumes from the surviving prefix.
        assert_eq!(backend.eval(&x, &[a.clone(), c.clone()], 1, None).unwrap(), vec![2]);
        let session = backend.session.lock().unwrap();
        assert_eq!(session.asserted, vec![a, c]);
        assert_eq!(session.query.depth, 2);
    }

    #[test]
    fn test_names() {
        assert_eq!(SmtBackend::new(Recorder::default(), CheckMode::Quick).name(), "smt-quick");
        assert_eq!(SmtBackend::new(Recorder::default(), CheckMode::Full).name(), "smt");
    }
}
