//! Pivoting active-set solve of bounded systems.
//!
//! Rows are either free (solved exactly through an `LDL^T` factorization of
//! the free block) or clamped at a bound. Each pivot moves one row between
//! the two sets, and the factorization is updated with a single row append
//! or removal instead of being rebuilt.

use tumble_math::matrix::dot;
use tumble_math::Ldlt;

use super::Solver;
use crate::row::ConstraintRow;

/// Slack allowed on bounds and complementarity before a pivot is made.
const TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum RowState {
    Free,
    Lo,
    Hi,
    /// Dependent on the free rows; impulse pinned at the bound closest to
    /// zero and never re-admitted.
    Held,
}

/// Buffers reused by every active-set solve.
#[derive(Debug, Clone, Default)]
pub(super) struct PivotScratch {
    state: Vec<RowState>,
    free: Vec<usize>,
    is_free: Vec<bool>,
    a_row: Vec<f64>,
    rhs: Vec<f64>,
}

/// Impulse of a row whose bound cannot be used: zero, clamped into range.
fn held(lo: f64, hi: f64) -> f64 {
    let l = 0.0_f64.clamp(lo, hi.max(lo));
    if l.is_finite() {
        l
    } else {
        0.0
    }
}

impl Solver {
    /// Solve into `lambda`, returning the number of pivots. Fails when the
    /// pivot budget runs out, a free block is singular or an impulse is not
    /// finite.
    pub(super) fn active_set(
        &mut self,
        rows: &[ConstraintRow],
        max_pivots: usize,
    ) -> Result<usize, &'static str> {
        let mut scratch = std::mem::take(&mut self.pivot);
        let result = self.pivot_loop(rows, max_pivots, &mut scratch);
        self.pivot = scratch;
        let pivots = result?;
        if self.lambda.iter().all(|l| l.is_finite()) {
            Ok(pivots)
        } else {
            Err("non-finite impulse")
        }
    }

    fn pivot_loop(
        &mut self,
        rows: &[ConstraintRow],
        max_pivots: usize,
        scratch: &mut PivotScratch,
    ) -> Result<usize, &'static str> {
        let n = rows.len();
        self.assemble(rows);
        if self.ldlt.capacity() < n {
            self.ldlt = Ldlt::with_capacity(n);
        }
        self.ldlt.clear();

        let PivotScratch {
            state,
            free,
            is_free,
            a_row,
            rhs,
        } = scratch;
        state.clear();
        state.resize(n, RowState::Free);
        free.clear();
        for i in 0..n {
            self.gather_row(i, free, a_row);
            if self.ldlt.push(a_row).is_ok() {
                free.push(i);
            } else {
                let (lo, hi) = rows[i].bounds(&self.lambda);
                state[i] = RowState::Held;
                self.lambda[i] = held(lo, hi);
            }
        }

        let mut pivots = 0;
        loop {
            self.solve_free(free, is_free, rhs)?;

            // Release the free row furthest outside its bounds.
            let mut worst: Option<(usize, f64, RowState)> = None;
            for (k, &i) in free.iter().enumerate() {
                let (lo, hi) = rows[i].bounds(&self.lambda);
                let l = self.lambda[i];
                let (excess, side) = if l < lo - TOLERANCE {
                    (lo - l, RowState::Lo)
                } else if l > hi + TOLERANCE {
                    (l - hi, RowState::Hi)
                } else {
                    continue;
                };
                if worst.map_or(true, |(_, e, _)| excess > e) {
                    worst = Some((k, excess, side));
                }
            }
            if let Some((k, _, side)) = worst {
                if pivots == max_pivots {
                    return Err("pivot budget exhausted");
                }
                pivots += 1;
                let i = free.remove(k);
                self.ldlt.remove(k).map_err(|_| "factorization update failed")?;
                let (lo, hi) = rows[i].bounds(&self.lambda);
                state[i] = side;
                self.lambda[i] = if side == RowState::Lo { lo } else { hi };
                continue;
            }

            // Bounds of friction rows move with their normal impulse.
            for i in 0..n {
                let (lo, hi) = rows[i].bounds(&self.lambda);
                match state[i] {
                    RowState::Lo if lo.is_finite() => self.lambda[i] = lo,
                    RowState::Hi if hi.is_finite() => self.lambda[i] = hi,
                    RowState::Free => {}
                    _ => {
                        state[i] = RowState::Held;
                        self.lambda[i] = held(lo, hi);
                    }
                }
            }

            // Re-admit the clamped row whose bound pushes hardest the wrong way.
            let mut entering: Option<(usize, f64)> = None;
            for i in 0..n {
                let (lo, hi) = rows[i].bounds(&self.lambda);
                let violation = match state[i] {
                    RowState::Free | RowState::Held => continue,
                    _ if hi - lo <= TOLERANCE => continue,
                    RowState::Lo => self.b[i] - dot(self.a.row(i), &self.lambda),
                    RowState::Hi => dot(self.a.row(i), &self.lambda) - self.b[i],
                };
                if violation > TOLERANCE && entering.map_or(true, |(_, v)| violation > v) {
                    entering = Some((i, violation));
                }
            }
            let Some((i, _)) = entering else {
                return Ok(pivots);
            };
            if pivots == max_pivots {
                return Err("pivot budget exhausted");
            }
            pivots += 1;
            self.gather_row(i, free, a_row);
            self.ldlt.push(a_row).map_err(|_| "singular free block")?;
            free.push(i);
            state[i] = RowState::Free;
        }
    }

    /// `A[i][free...]` followed by `A[i][i]`.
    fn gather_row(&self, i: usize, free: &[usize], out: &mut Vec<f64>) {
        out.clear();
        out.extend(free.iter().map(|&j| self.a[(i, j)]));
        out.push(self.a[(i, i)]);
    }

    /// Solve the free block with the clamped impulses held fixed.
    fn solve_free(
        &mut self,
        free: &[usize],
        is_free: &mut Vec<bool>,
        rhs: &mut Vec<f64>,
    ) -> Result<(), &'static str> {
        let n = self.lambda.len();
        is_free.clear();
        is_free.resize(n, false);
        for &i in free {
            is_free[i] = true;
        }
        rhs.clear();
        for &i in free {
            let row = self.a.row(i);
            let mut s = self.b[i];
            for j in 0..n {
                if !is_free[j] {
                    s -= row[j] * self.lambda[j];
                }
            }
            rhs.push(s);
        }
        self.ldlt.solve(rhs).map_err(|_| "free block solve failed")?;
        for (&i, &x) in free.iter().zip(rhs.iter()) {
            if !x.is_finite() {
                return Err("non-finite impulse");
            }
            self.lambda[i] = x;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{row, unit_body};
    use super::super::{SolverBody, SolverPath};
    use super::*;
    use crate::config::{SolverConfig, SolverMethod};
    use tumble_math::{Mat3, Vec3};

    fn direct() -> SolverConfig {
        SolverConfig {
            method: SolverMethod::Direct,
            ..Default::default()
        }
    }

    fn iterative() -> SolverConfig {
        SolverConfig {
            method: SolverMethod::Iterative,
            iterations: 2000,
            sor_w: 1.0,
            ..Default::default()
        }
    }

    /// Two contacts under a bar pivoting about its centre: one pushes,
    /// the other would have to pull and must clamp at zero.
    fn lever() -> ([SolverBody; 1], [ConstraintRow; 2], Vec<(Vec3, Vec3)>) {
        let bodies = [SolverBody {
            inv_mass: 1.0,
            inv_inertia: Mat3::identity() * 3.0,
        }];
        let mut left = row(0, None, Vec3::z(), 0.0);
        left.j1_ang = Vec3::new(-1.0, 0.0, 0.0).cross(&Vec3::z());
        left.lo = 0.0;
        let mut right = row(0, None, Vec3::z(), 0.0);
        right.j1_ang = Vec3::new(1.0, 0.0, 0.0).cross(&Vec3::z());
        right.lo = 0.0;
        let vel = vec![(Vec3::new(0.0, 0.0, -0.1), Vec3::new(0.0, 2.0, 0.0))];
        (bodies, [left, right], vel)
    }

    #[test]
    fn test_active_set_clamps_pulling_contact() {
        let (bodies, rows, vel) = lever();
        let mut s = Solver::new();
        let sol = s.solve(&rows, &bodies, &vel, &direct());
        assert_eq!(sol.path, Some(SolverPath::ActiveSet));
        assert!(sol.iterations >= 1);
        assert!(s.lambda().iter().all(|&l| l >= 0.0));
        assert_eq!(s.lambda()[0], 0.0);
        assert!(s.lambda()[1] > 0.0);
    }

    #[test]
    fn test_active_set_agrees_with_pgs() {
        let (bodies, rows, vel) = lever();
        let mut a = Solver::new();
        a.solve(&rows, &bodies, &vel, &direct());
        let mut b = Solver::new();
        b.solve(&rows, &bodies, &vel, &iterative());
        for (x, y) in a.lambda().iter().zip(b.lambda()) {
            assert!((x - y).abs() < 1e-6, "{x} vs {y}");
        }
    }

    #[test]
    fn test_pivot_budget_falls_back() {
        let (bodies, rows, vel) = lever();
        let cfg = SolverConfig {
            max_pivots: Some(0),
            ..direct()
        };
        let mut s = Solver::new();
        let sol = s.solve(&rows, &bodies, &vel, &cfg);
        assert_eq!(sol.path, Some(SolverPath::Iterative));
        assert!(s.lambda().iter().all(|&l| l >= -1e-12));
    }

    #[test]
    fn test_redundant_equality_row_is_held_at_zero() {
        let bodies = [unit_body()];
        let mut contact = row(0, None, Vec3::z(), 1.0);
        contact.lo = 0.0;
        let rows = [row(0, None, Vec3::x(), 2.0), row(0, None, Vec3::x(), 2.0), contact];
        let mut s = Solver::new();
        let sol = s.solve(&rows, &bodies, &[(Vec3::zeros(), Vec3::zeros())], &direct());
        assert_eq!(sol.path, Some(SolverPath::ActiveSet));
        assert!(s.lambda().iter().all(|l| l.is_finite()));
        assert!((s.lambda()[0] - 2.0).abs() < 1e-12);
        assert_eq!(s.lambda()[1], 0.0);
        assert!((s.lambda()[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_starts_from_zero_impulses() {
        let (bodies, [left, right], vel) = lever();
        let rows = [left, right, right];
        let cfg = SolverConfig {
            method: SolverMethod::Direct,
            max_pivots: Some(0),
            ..iterative()
        };
        let mut fell_back = Solver::new();
        let sol = fell_back.solve(&rows, &bodies, &vel, &cfg);
        assert_eq!(sol.path, Some(SolverPath::Iterative));
        let mut plain = Solver::new();
        plain.solve(&rows, &bodies, &vel, &iterative());
        // Same sweeps from the same zero start.
        assert_eq!(fell_back.lambda(), plain.lambda());
        assert!(fell_back.lambda().iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_scratch_reused_across_sizes() {
        let (bodies, rows, vel) = lever();
        let mut s = Solver::new();
        s.solve(&rows, &bodies, &vel, &direct());
        let mut r = row(0, None, Vec3::z(), 1.0);
        r.lo = 0.0;
        let sol = s.solve(&[r], &bodies, &vel, &direct());
        assert_eq!(sol.path, Some(SolverPath::ActiveSet));
        assert_eq!(s.lambda().len(), 1);
        assert!(s.lambda()[0] > 0.0);
    }

    #[test]
    fn test_unit_rows_solved_exactly() {
        let bodies = [unit_body()];
        let mut r = row(0, None, Vec3::z(), 1.0);
        r.lo = 0.0;
        let mut s = Solver::new();
        let sol = s.solve(&[r], &bodies, &[(Vec3::zeros(), Vec3::zeros())], &direct());
        assert_eq!(sol.iterations, 0);
        assert!((s.lambda()[0] - 1.0).abs() < 1e-12);
    }
}
