//! Constraint solvers.
//!
//! All rows are solved together for impulses `lambda`:
//!
//! ```text
//! (J M^-1 J^T + cfm) lambda = rhs - J v     with lo <= lambda <= hi
//! ```
//!
//! Pure equality systems go to a Cholesky factorization, with a
//! regularized retry and an iterative fallback. Systems with bounds use
//! projected Gauss-Seidel, or the pivoting active-set method when
//! [`SolverMethod::Direct`] is selected.

mod active_set;
mod direct;
mod pgs;

use serde::{Deserialize, Serialize};
use tracing::warn;
use tumble_math::{Ldlt, Mat3, Matrix, Vec3};

use crate::config::{SolverConfig, SolverMethod};
use crate::row::{ConstraintRow, Velocity};
use active_set::PivotScratch;

/// Inverse mass properties of a simulated body, world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Inverse mass.
    pub inv_mass: f64,
    /// Inverse inertia in the world frame.
    pub inv_inertia: Mat3,
}

/// Which solve produced the impulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverPath {
    /// Cholesky on the assembled system.
    Direct,
    /// Cholesky after adding a diagonal term.
    Regularized,
    /// Pivoting active-set method with incremental `LDL^T` updates.
    ActiveSet,
    /// Projected Gauss-Seidel.
    Iterative,
}

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Solution {
    /// Path taken; `None` when there were no rows.
    pub path: Option<SolverPath>,
    /// Sweeps (iterative) or pivots (active set).
    pub iterations: usize,
}

/// Solver with scratch buffers reused across steps.
#[derive(Debug, Clone)]
pub struct Solver {
    /// `M^-1 J^T` per row: body-1 linear, body-1 angular, body-2 linear,
    /// body-2 angular.
    imj: Vec<[Vec3; 4]>,
    b: Vec<f64>,
    diag: Vec<f64>,
    lambda: Vec<f64>,
    dv: Vec<Velocity>,
    order: Vec<usize>,
    a: Matrix,
    ldlt: Ldlt,
    pivot: PivotScratch,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Empty solver.
    pub fn new() -> Self {
        Self {
            imj: Vec::new(),
            b: Vec::new(),
            diag: Vec::new(),
            lambda: Vec::new(),
            dv: Vec::new(),
            order: Vec::new(),
            a: Matrix::zeros(0, 0),
            ldlt: Ldlt::with_capacity(0),
            pivot: PivotScratch::default(),
        }
    }

    /// Impulses from the last solve, one per row.
    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    /// Solve for the impulses of `rows`. `vel` holds the unconstrained
    /// velocities of `bodies` at the end of the step.
    pub fn solve(
        &mut self,
        rows: &[ConstraintRow],
        bodies: &[SolverBody],
        vel: &[Velocity],
        config: &SolverConfig,
    ) -> Solution {
        let n = rows.len();
        self.lambda.clear();
        self.lambda.resize(n, 0.0);
        if n == 0 {
            return Solution::default();
        }
        self.prepare(rows, bodies, vel);

        let bounded = rows.iter().any(ConstraintRow::is_bounded);
        match (config.method, bounded) {
            (SolverMethod::Iterative, _) | (SolverMethod::Auto, true) => {
                let iterations = self.pgs(rows, bodies.len(), config);
                Solution {
                    path: Some(SolverPath::Iterative),
                    iterations,
                }
            }
            (_, false) => self.solve_equality(rows, bodies.len(), config),
            (SolverMethod::Direct, true) => {
                let max_pivots = config.max_pivots.unwrap_or(4 * n);
                match self.active_set(rows, max_pivots) {
                    Ok(pivots) => Solution {
                        path: Some(SolverPath::ActiveSet),
                        iterations: pivots,
                    },
                    Err(reason) => {
                        warn!(rows = n, reason, "active-set solve failed, using iterative solver");
                        self.lambda.fill(0.0);
                        let iterations = self.pgs(rows, bodies.len(), config);
                        Solution {
                            path: Some(SolverPath::Iterative),
                            iterations,
                        }
                    }
                }
            }
        }
    }

    /// Add `M^-1 J^T lambda` to `vel`.
    pub fn apply(&self, rows: &[ConstraintRow], vel: &mut [Velocity]) {
        for ((row, m), &l) in rows.iter().zip(&self.imj).zip(&self.lambda) {
            if l == 0.0 {
                continue;
            }
            let (v1, w1) = &mut vel[row.body1];
            *v1 += m[0] * l;
            *w1 += m[1] * l;
            if let Some(b2) = row.body2 {
                let (v2, w2) = &mut vel[b2];
                *v2 += m[2] * l;
                *w2 += m[3] * l;
            }
        }
    }

    fn prepare(&mut self, rows: &[ConstraintRow], bodies: &[SolverBody], vel: &[Velocity]) {
        self.imj.clear();
        self.b.clear();
        self.diag.clear();
        for row in rows {
            let b1 = &bodies[row.body1];
            let mut m = [
                row.j1_lin * b1.inv_mass,
                b1.inv_inertia * row.j1_ang,
                Vec3::zeros(),
                Vec3::zeros(),
            ];
            if let Some(i2) = row.body2 {
                let b2 = &bodies[i2];
                m[2] = row.j2_lin * b2.inv_mass;
                m[3] = b2.inv_inertia * row.j2_ang;
            }
            let d = row.j1_lin.dot(&m[0])
                + row.j1_ang.dot(&m[1])
                + row.j2_lin.dot(&m[2])
                + row.j2_ang.dot(&m[3]);
            self.imj.push(m);
            self.diag.push(d + row.cfm);
            self.b.push(row.rhs - row.jv(vel));
        }
    }

    /// Entry `(i, j)` of `J M^-1 J^T`, without softness.
    fn coupling(&self, rows: &[ConstraintRow], i: usize, j: usize) -> f64 {
        let ri = &rows[i];
        let rj = &rows[j];
        let mj = &self.imj[j];
        let mut s = 0.0;
        // Body blocks of row i against the matching blocks of row j.
        let blocks_i = [(Some(ri.body1), ri.j1_lin, ri.j1_ang), (ri.body2, ri.j2_lin, ri.j2_ang)];
        let blocks_j = [(Some(rj.body1), 0), (rj.body2, 2)];
        for (bi, lin, ang) in blocks_i {
            let Some(bi) = bi else { continue };
            for (bj, k) in blocks_j {
                if bj == Some(bi) {
                    s += lin.dot(&mj[k]) + ang.dot(&mj[k + 1]);
                }
            }
        }
        s
    }

    /// Fill `self.a` with the full symmetric system matrix.
    fn assemble(&mut self, rows: &[ConstraintRow]) {
        let n = rows.len();
        self.a.resize(n, n);
        for i in 0..n {
            for j in 0..i {
                let v = self.coupling(rows, i, j);
                self.a[(i, j)] = v;
                self.a[(j, i)] = v;
            }
            self.a[(i, i)] = self.diag[i];
        }
    }
}
