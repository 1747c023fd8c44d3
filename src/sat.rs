use std::collections::HashMap;

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Returns one satisfying assignment for the BDD, if any exists.
    ///
    /// The assignment is a path from the root to the `1` terminal, given as
    /// signed variable indices (negative means false). Variables not on the
    /// path are unconstrained.
    ///
    /// Returns `None` if the BDD represents the constant false function.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<i32>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;

        // Walk down the BDD, always picking a satisfying branch
        while !self.is_one(current) {
            let var = self.variable(current.index()) as i32;
            let high = self.high_node(current);
            if !self.is_zero(high) {
                path.push(var);
                current = high;
            } else {
                path.push(-var);
                current = self.low_node(current);
            }
        }

        Some(path)
    }

    /// Evaluate the function under an assignment; unassigned variables are false.
    pub fn evaluate(&self, node: Ref, assignment: &HashMap<u32, bool>) -> bool {
        let mut current = node;
        while !self.is_terminal(current) {
            let var = self.variable(current.index());
            current = if assignment.get(&var).copied().unwrap_or(false) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        self.is_one(current)
    }
}

/// Turn a path of signed literals into a variable assignment.
pub fn assignment(path: &[i32]) -> HashMap<u32, bool> {
    path.iter().map(|&lit| (lit.unsigned_abs(), lit > 0)).collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_one_sat() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);
        let f = bdd.apply_and_many([x1, -x2, -x3]);
        let model = bdd.one_sat(f);
        assert_eq!(model, Some(vec![1, -2, -3]));

        let g = bdd.apply_and(f, -f);
        assert_eq!(bdd.one_sat(g), None);
    }

    #[test]
    fn test_one_sat_satisfies() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);
        let f = bdd.apply_or(bdd.apply_xor(x1, x2), bdd.apply_and(-x1, x3));

        let mut remaining = f;
        let mut count = 0;
        while let Some(path) = bdd.one_sat(remaining) {
            let model = assignment(&path);
            assert!(bdd.evaluate(f, &model));
            let cube = bdd.apply_and_many(path.iter().map(|&lit| {
                let v = bdd.mk_var(lit.unsigned_abs());
                if lit > 0 {
                    v
                } else {
                    -v
                }
            }));
            remaining = bdd.apply_and(remaining, -cube);
            count += 1;
        }
        assert!(count > 0);
        assert!(bdd.is_zero(remaining));
    }

    #[test]
    fn test_evaluate() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let f = bdd.apply_and(x1, -x2);
        assert!(bdd.evaluate(f, &HashMap::from([(1, true)])));
        assert!(!bdd.evaluate(f, &HashMap::from([(1, true), (2, true)])));
        assert!(!bdd.evaluate(f, &HashMap::new()));
    }
}
