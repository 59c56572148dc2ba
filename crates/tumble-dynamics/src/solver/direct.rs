//! Direct solve of equality-only systems.

use tracing::warn;
use tumble_math::Cholesky;

use super::{Solution, SolverPath, Solver};
use crate::config::SolverConfig;
use crate::row::ConstraintRow;

impl Solver {
    /// Cholesky on the assembled system. A failed factorization is retried
    /// with a diagonal term proportional to the largest pivot; if that also
    /// fails the system goes to projected Gauss-Seidel.
    pub(super) fn solve_equality(
        &mut self,
        rows: &[ConstraintRow],
        body_count: usize,
        config: &SolverConfig,
    ) -> Solution {
        self.assemble(rows);
        match Cholesky::factor(&self.a) {
            Ok(chol) => {
                if self.back_substitute(&chol) {
                    return Solution {
                        path: Some(SolverPath::Direct),
                        iterations: 0,
                    };
                }
            }
            Err(e) => warn!(rows = rows.len(), error = %e, "singular constraint system, regularizing"),
        }

        let largest = self.diag.iter().fold(1.0_f64, |m, d| m.max(d.abs()));
        let eps = config.regularization * largest;
        for i in 0..rows.len() {
            self.a[(i, i)] += eps;
        }
        match Cholesky::factor(&self.a) {
            Ok(chol) if self.back_substitute(&chol) => Solution {
                path: Some(SolverPath::Regularized),
                iterations: 0,
            },
            _ => {
                warn!(rows = rows.len(), "regularized factorization failed, using iterative solver");
                self.lambda.iter_mut().for_each(|l| *l = 0.0);
                let iterations = self.pgs(rows, body_count, config);
                Solution {
                    path: Some(SolverPath::Iterative),
                    iterations,
                }
            }
        }
    }

    /// Solve into `lambda`; false if the result is not finite.
    fn back_substitute(&mut self, chol: &Cholesky) -> bool {
        self.lambda.copy_from_slice(&self.b);
        chol.solve(&mut self.lambda).is_ok() && self.lambda.iter().all(|l| l.is_finite())
    }
}
