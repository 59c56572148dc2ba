//! Projected Gauss-Seidel with successive over-relaxation.
//!
//! Works on the velocity change `dv = M^-1 J^T lambda` instead of the
//! assembled matrix, so one sweep is linear in the number of rows.

use tumble_math::Vec3;

use super::Solver;
use crate::config::SolverConfig;
use crate::row::ConstraintRow;

/// Sweeps stop early once no impulse moves more than this.
const CONVERGED: f64 = 1e-12;

impl Solver {
    /// Run PGS starting from the current `lambda`. Returns sweeps used.
    pub(super) fn pgs(&mut self, rows: &[ConstraintRow], body_count: usize, config: &SolverConfig) -> usize {
        self.dv.clear();
        self.dv.resize(body_count, (Vec3::zeros(), Vec3::zeros()));
        for (i, row) in rows.iter().enumerate() {
            let l = self.lambda[i];
            if l != 0.0 {
                add_impulse(&mut self.dv, row, &self.imj[i], l);
            }
        }

        // Rows whose bounds depend on another row go last in each sweep.
        self.order.clear();
        self.order.extend((0..rows.len()).filter(|&i| rows[i].findex.is_none()));
        self.order.extend((0..rows.len()).filter(|&i| rows[i].findex.is_some()));

        let mut sweeps = 0;
        for _ in 0..config.iterations {
            sweeps += 1;
            let mut largest = 0.0_f64;
            for &i in &self.order {
                let row = &rows[i];
                if self.diag[i] <= 0.0 {
                    continue;
                }
                let residual = self.b[i] - row.cfm * self.lambda[i] - row.jv(&self.dv);
                let old = self.lambda[i];
                let (lo, hi) = row.bounds(&self.lambda);
                let new = (old + config.sor_w * residual / self.diag[i]).clamp(lo, hi);
                let delta = new - old;
                if delta != 0.0 {
                    self.lambda[i] = new;
                    add_impulse(&mut self.dv, row, &self.imj[i], delta);
                }
                largest = largest.max(delta.abs());
            }
            if largest < CONVERGED {
                break;
            }
        }
        sweeps
    }
}

fn add_impulse(dv: &mut [(Vec3, Vec3)], row: &ConstraintRow, m: &[Vec3; 4], l: f64) {
    let (v1, w1) = &mut dv[row.body1];
    *v1 += m[0] * l;
    *w1 += m[1] * l;
    if let Some(b2) = row.body2 {
        let (v2, w2) = &mut dv[b2];
        *v2 += m[2] * l;
        *w2 += m[3] * l;
    }
}
