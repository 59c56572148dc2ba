//! Cholesky factorization and triangular solves.

use crate::error::{LinalgError, Result};
use crate::matrix::{dot, Matrix};

/// Lower-triangular Cholesky factor `L` with `A = L * L^T`.
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Matrix,
}

impl Cholesky {
    /// Factor a symmetric positive-definite matrix.
    ///
    /// Only the lower triangle of `a` is read. Fails with
    /// [`LinalgError::NotPositiveDefinite`] when a pivot is not strictly positive.
    pub fn factor(a: &Matrix) -> Result<Self> {
        let mut l = a.clone();
        factor_in_place(&mut l)?;
        Ok(Self { l })
    }

    /// Refactor into the existing buffer, reusing its allocation.
    pub fn refactor(&mut self, a: &Matrix) -> Result<()> {
        if !a.is_square() {
            return Err(square_mismatch("cholesky", a));
        }
        self.l.resize(a.rows(), a.cols());
        for i in 0..a.rows() {
            self.l.row_mut(i).copy_from_slice(a.row(i));
        }
        factor_in_place(&mut self.l)
    }

    /// Dimension of the factored matrix.
    pub fn len(&self) -> usize {
        self.l.rows()
    }

    /// Whether the factorization is empty.
    pub fn is_empty(&self) -> bool {
        self.l.rows() == 0
    }

    /// The lower-triangular factor.
    pub fn l(&self) -> &Matrix {
        &self.l
    }

    /// Solve `A x = b` in place.
    pub fn solve(&self, b: &mut [f64]) -> Result<()> {
        solve_lower(&self.l, b, false)?;
        solve_lower_transpose(&self.l, b, false)
    }
}

/// Overwrite the lower triangle of `a` with its Cholesky factor and zero the
/// strict upper triangle.
pub fn factor_in_place(a: &mut Matrix) -> Result<()> {
    if !a.is_square() {
        return Err(square_mismatch("cholesky", a));
    }
    let n = a.rows();
    for i in 0..n {
        for j in 0..=i {
            let s = dot(&a.row(i)[..j], &a.row(j)[..j]);
            let v = a[(i, j)] - s;
            if i == j {
                if !(v > 0.0) {
                    return Err(LinalgError::NotPositiveDefinite { pivot: i, value: v });
                }
                a[(i, i)] = v.sqrt();
            } else {
                a[(i, j)] = v / a[(j, j)];
            }
        }
        for j in i + 1..n {
            a[(i, j)] = 0.0;
        }
    }
    Ok(())
}

/// Solve `L x = b` in place for lower-triangular `L`.
///
/// With `unit_diagonal` the diagonal is taken as 1 and not read.
pub fn solve_lower(l: &Matrix, b: &mut [f64], unit_diagonal: bool) -> Result<()> {
    check_rhs("solve_lower", l, b)?;
    for i in 0..l.rows() {
        let s = dot(&l.row(i)[..i], &b[..i]);
        b[i] -= s;
        if !unit_diagonal {
            b[i] /= l[(i, i)];
        }
    }
    Ok(())
}

/// Solve `L^T x = b` in place for lower-triangular `L`.
pub fn solve_lower_transpose(l: &Matrix, b: &mut [f64], unit_diagonal: bool) -> Result<()> {
    check_rhs("solve_lower_transpose", l, b)?;
    for i in (0..l.rows()).rev() {
        let mut s = b[i];
        for k in i + 1..l.rows() {
            s -= l[(k, i)] * b[k];
        }
        b[i] = if unit_diagonal { s } else { s / l[(i, i)] };
    }
    Ok(())
}

fn check_rhs(op: &'static str, l: &Matrix, b: &[f64]) -> Result<()> {
    if !l.is_square() || l.rows() != b.len() {
        return Err(LinalgError::DimensionMismatch {
            op,
            lhs: l.shape(),
            rhs: (b.len(), 1),
        });
    }
    Ok(())
}

fn square_mismatch(op: &'static str, a: &Matrix) -> LinalgError {
    LinalgError::DimensionMismatch {
        op,
        lhs: a.shape(),
        rhs: (a.cols(), a.rows()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd() -> Matrix {
        Matrix::from_rows(&[&[4.0, 12.0, -16.0], &[12.0, 37.0, -43.0], &[-16.0, -43.0, 98.0]])
            .unwrap()
    }

    #[test]
    fn test_factor_known_matrix() {
        let c = Cholesky::factor(&spd()).unwrap();
        let l = c.l();
        assert!((l[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((l[(1, 0)] - 6.0).abs() < 1e-12);
        assert!((l[(1, 1)] - 1.0).abs() < 1e-12);
        assert!((l[(2, 0)] + 8.0).abs() < 1e-12);
        assert!((l[(2, 1)] - 5.0).abs() < 1e-12);
        assert!((l[(2, 2)] - 3.0).abs() < 1e-12);
        assert_eq!(l[(0, 2)], 0.0);
    }

    #[test]
    fn test_solve_reproduces_rhs() {
        let a = spd();
        let c = Cholesky::factor(&a).unwrap();
        let b = [1.0, 2.0, 3.0];
        let mut x = b;
        c.solve(&mut x).unwrap();
        let mut ax = [0.0; 3];
        a.mul_vec_into(&x, &mut ax).unwrap();
        for i in 0..3 {
            assert!((ax[i] - b[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_pd_fails() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 1.0]]).unwrap();
        match Cholesky::factor(&a) {
            Err(LinalgError::NotPositiveDefinite { pivot, .. }) => assert_eq!(pivot, 1),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_singular_fails() {
        let a = Matrix::from_rows(&[&[1.0, 1.0], &[1.0, 1.0]]).unwrap();
        assert!(Cholesky::factor(&a).is_err());
    }

    #[test]
    fn test_refactor_reuses_buffer() {
        let mut c = Cholesky::factor(&Matrix::identity(5)).unwrap();
        c.refactor(&spd()).unwrap();
        assert_eq!(c.len(), 3);
        assert!((c.l()[(2, 2)] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rhs_length_checked() {
        let c = Cholesky::factor(&spd()).unwrap();
        let mut b = [1.0, 2.0];
        assert!(c.solve(&mut b).is_err());
    }
}
