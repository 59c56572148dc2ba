//! `L D L^T` factorization with incremental row append and removal.
//!
//! Used by the active-set solver: when a constraint row enters or leaves the
//! unclamped set, the factorization is updated in `O(n^2)` instead of being
//! recomputed in `O(n^3)`. [`Ldlt::factor`] is the plain full factorization
//! and serves as the reference the incremental path is tested against.

use crate::error::{LinalgError, Result};
use crate::matrix::{dot, Matrix};

/// Pivots at or below this magnitude are rejected.
const MIN_PIVOT: f64 = 1e-14;

/// Unit lower-triangular `L` and diagonal `D` with `A = L D L^T`.
///
/// Storage is allocated once for `capacity` rows.
#[derive(Debug, Clone)]
pub struct Ldlt {
    n: usize,
    l: Matrix,
    d: Vec<f64>,
    scratch: Vec<f64>,
}

impl Ldlt {
    /// Empty factorization able to hold up to `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            n: 0,
            l: Matrix::zeros(capacity, capacity),
            d: vec![0.0; capacity],
            scratch: vec![0.0; capacity],
        }
    }

    /// Full factorization of a symmetric matrix (lower triangle read).
    pub fn factor(a: &Matrix) -> Result<Self> {
        let mut f = Self::with_capacity(a.rows());
        f.refactor(a)?;
        Ok(f)
    }

    /// Discard the current factorization and factor `a` from scratch.
    pub fn refactor(&mut self, a: &Matrix) -> Result<()> {
        if !a.is_square() {
            return Err(LinalgError::DimensionMismatch {
                op: "ldlt",
                lhs: a.shape(),
                rhs: (a.cols(), a.rows()),
            });
        }
        if a.rows() > self.capacity() {
            return Err(LinalgError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        self.clear();
        let mut row = Vec::with_capacity(a.rows());
        for i in 0..a.rows() {
            row.clear();
            row.extend_from_slice(&a.row(i)[..=i]);
            self.push(&row)?;
        }
        Ok(())
    }

    /// Maximum number of rows.
    pub fn capacity(&self) -> usize {
        self.d.len()
    }

    /// Current number of rows.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether no rows are factored.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Drop all rows, keeping the allocation.
    pub fn clear(&mut self) {
        for i in 0..self.n {
            self.l.row_mut(i).iter_mut().for_each(|x| *x = 0.0);
        }
        self.n = 0;
    }

    /// Diagonal `D`.
    pub fn diagonal(&self) -> &[f64] {
        &self.d[..self.n]
    }

    /// Entry `L[i][j]` of the unit lower factor.
    pub fn l(&self, i: usize, j: usize) -> f64 {
        match i.cmp(&j) {
            std::cmp::Ordering::Greater => self.l[(i, j)],
            std::cmp::Ordering::Equal => 1.0,
            std::cmp::Ordering::Less => 0.0,
        }
    }

    /// Append one row/column. `a_row` holds `A[n][0..=n]`, the last entry
    /// being the new diagonal element.
    pub fn push(&mut self, a_row: &[f64]) -> Result<()> {
        let n = self.n;
        if a_row.len() != n + 1 {
            return Err(LinalgError::DimensionMismatch {
                op: "ldlt_push",
                lhs: (n + 1, n + 1),
                rhs: (1, a_row.len()),
            });
        }
        if n == self.capacity() {
            return Err(LinalgError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        // Solve L y = a, then l_j = y_j / d_j.
        let y = &mut self.scratch[..n];
        y.copy_from_slice(&a_row[..n]);
        for i in 0..n {
            let s = dot(&self.l.row(i)[..i], &y[..i]);
            y[i] -= s;
        }
        let mut dn = a_row[n];
        for j in 0..n {
            let lj = y[j] / self.d[j];
            dn -= y[j] * lj;
            self.l[(n, j)] = lj;
        }
        if !(dn > MIN_PIVOT) {
            self.l.row_mut(n).iter_mut().for_each(|x| *x = 0.0);
            return Err(LinalgError::NotPositiveDefinite { pivot: n, value: dn });
        }
        self.d[n] = dn;
        self.n += 1;
        Ok(())
    }

    /// Remove row/column `index`, updating the trailing block with a rank-one
    /// modification.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let n = self.n;
        if index >= n {
            return Err(LinalgError::IndexOutOfRange { index, len: n });
        }
        let alpha = self.d[index];
        let m = n - index - 1;
        for k in 0..m {
            self.scratch[k] = self.l[(index + 1 + k, index)];
        }

        for i in index..n - 1 {
            for j in 0..index {
                self.l[(i, j)] = self.l[(i + 1, j)];
            }
            for j in index..i {
                self.l[(i, j)] = self.l[(i + 1, j + 1)];
            }
            self.l[(i, i)] = 0.0;
            self.d[i] = self.d[i + 1];
        }
        self.l.row_mut(n - 1).iter_mut().for_each(|x| *x = 0.0);
        self.n -= 1;

        self.rank_one_update(index, alpha, m);
        Ok(())
    }

    /// `L' D' L'^T = L D L^T + alpha z z^T` on the block starting at `offset`,
    /// with `z` in `scratch[..m]`.
    fn rank_one_update(&mut self, offset: usize, mut alpha: f64, m: usize) {
        for j in 0..m {
            let p = self.scratch[j];
            let dj = self.d[offset + j];
            let dj_new = dj + alpha * p * p;
            let beta = p * alpha / dj_new;
            alpha = dj * alpha / dj_new;
            self.d[offset + j] = dj_new;
            for i in j + 1..m {
                self.scratch[i] -= p * self.l[(offset + i, offset + j)];
                self.l[(offset + i, offset + j)] += beta * self.scratch[i];
            }
        }
    }

    /// Solve `A x = b` in place.
    pub fn solve(&self, b: &mut [f64]) -> Result<()> {
        let n = self.n;
        if b.len() != n {
            return Err(LinalgError::DimensionMismatch {
                op: "ldlt_solve",
                lhs: (n, n),
                rhs: (b.len(), 1),
            });
        }
        for i in 0..n {
            let s = dot(&self.l.row(i)[..i], &b[..i]);
            b[i] -= s;
        }
        for i in 0..n {
            b[i] /= self.d[i];
        }
        for i in (0..n).rev() {
            let mut s = b[i];
            for k in i + 1..n {
                s -= self.l[(k, i)] * b[k];
            }
            b[i] = s;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd(n: usize) -> Matrix {
        // Diagonally dominant symmetric matrix with distinct off-diagonals.
        let mut a = Matrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                a[(i, j)] = if i == j {
                    n as f64 + 2.0 + i as f64
                } else {
                    1.0 / (1.0 + (i + j) as f64)
                };
            }
        }
        a
    }

    fn submatrix(a: &Matrix, keep: &[usize]) -> Matrix {
        let mut s = Matrix::zeros(keep.len(), keep.len());
        for (i, &ri) in keep.iter().enumerate() {
            for (j, &cj) in keep.iter().enumerate() {
                s[(i, j)] = a[(ri, cj)];
            }
        }
        s
    }

    fn assert_same(a: &Ldlt, b: &Ldlt) {
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert!((a.diagonal()[i] - b.diagonal()[i]).abs() < 1e-10);
            for j in 0..i {
                assert!((a.l(i, j) - b.l(i, j)).abs() < 1e-10, "L[{i}][{j}]");
            }
        }
    }

    #[test]
    fn test_solve_matches_rhs() {
        let a = spd(5);
        let f = Ldlt::factor(&a).unwrap();
        let b = [1.0, -2.0, 0.5, 3.0, 4.0];
        let mut x = b;
        f.solve(&mut x).unwrap();
        let mut ax = [0.0; 5];
        a.mul_vec_into(&x, &mut ax).unwrap();
        for i in 0..5 {
            assert!((ax[i] - b[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_push_matches_full_factor() {
        let a = spd(6);
        let mut inc = Ldlt::with_capacity(6);
        for i in 0..6 {
            inc.push(&a.row(i)[..=i]).unwrap();
        }
        assert_same(&inc, &Ldlt::factor(&a).unwrap());
    }

    #[test]
    fn test_remove_matches_refactor() {
        let a = spd(6);
        for removed in 0..6 {
            let mut inc = Ldlt::factor(&a).unwrap();
            inc.remove(removed).unwrap();
            let keep: Vec<usize> = (0..6).filter(|&k| k != removed).collect();
            let reference = Ldlt::factor(&submatrix(&a, &keep)).unwrap();
            assert_same(&inc, &reference);
        }
    }

    #[test]
    fn test_remove_then_push() {
        let a = spd(5);
        let mut inc = Ldlt::factor(&submatrix(&a, &[0, 1, 2, 3])).unwrap();
        inc.remove(1).unwrap();
        // Active set is now [0, 2, 3]; bring row 4 in.
        let order = [0, 2, 3, 4];
        let row: Vec<f64> = order.iter().map(|&c| a[(4, c)]).collect();
        inc.push(&row).unwrap();
        let reference = Ldlt::factor(&submatrix(&a, &order)).unwrap();
        assert_same(&inc, &reference);
    }

    #[test]
    fn test_capacity_and_range_errors() {
        let mut f = Ldlt::with_capacity(1);
        f.push(&[2.0]).unwrap();
        assert!(matches!(
            f.push(&[0.0, 2.0]),
            Err(LinalgError::CapacityExceeded { capacity: 1 })
        ));
        assert!(matches!(
            f.remove(3),
            Err(LinalgError::IndexOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_singular_push_rejected_and_state_kept() {
        let mut f = Ldlt::with_capacity(2);
        f.push(&[1.0]).unwrap();
        assert!(f.push(&[1.0, 1.0]).is_err());
        assert_eq!(f.len(), 1);
    }
}
