//! Row-major dense matrices with padded row stride.
//!
//! Rows are stored contiguously with a stride rounded up to a multiple of
//! [`PAD`] so that each row starts on a vector-width boundary. Padding
//! columns are kept at zero and never read by the public API.

use std::ops::{Index, IndexMut};

use crate::error::{LinalgError, Result};

/// Row stride granularity, in elements.
pub const PAD: usize = 4;

/// Padded row stride for a matrix with `cols` columns.
///
/// Single-column matrices (vectors) are left unpadded.
pub fn padded_stride(cols: usize) -> usize {
    if cols > 1 {
        cols.div_ceil(PAD) * PAD
    } else {
        cols
    }
}

/// A dense `rows x cols` matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    stride: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Zero matrix of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        let stride = padded_stride(cols);
        Self {
            rows,
            cols,
            stride,
            data: vec![0.0; rows * stride],
        }
    }

    /// `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Build a matrix from row slices. All rows must have the same length.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut m = Self::zeros(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(LinalgError::DimensionMismatch {
                    op: "from_rows",
                    lhs: (i, cols),
                    rhs: (i, row.len()),
                });
            }
            m.row_mut(i).copy_from_slice(row);
        }
        Ok(m)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row stride in elements (>= `cols`).
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Reshape in place, reusing the allocation where possible. Contents are zeroed.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.stride = padded_stride(cols);
        self.data.clear();
        self.data.resize(rows * self.stride, 0.0);
    }

    /// Set every element to zero.
    pub fn fill_zero(&mut self) {
        self.data.iter_mut().for_each(|x| *x = 0.0);
    }

    /// The first `cols` elements of row `r`.
    pub fn row(&self, r: usize) -> &[f64] {
        let start = r * self.stride;
        &self.data[start..start + self.cols]
    }

    /// Mutable view of the first `cols` elements of row `r`.
    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        let start = r * self.stride;
        &mut self.data[start..start + self.cols]
    }

    /// Raw padded storage.
    pub fn as_padded_slice(&self) -> &[f64] {
        &self.data
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t[(j, i)] = self[(i, j)];
            }
        }
        t
    }

    /// Whether `self == self^T` within `tol`.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        (0..self.rows).all(|i| (0..i).all(|j| (self[(i, j)] - self[(j, i)]).abs() <= tol))
    }

    /// `out = self * b`.
    pub fn mul_into(&self, b: &Matrix, out: &mut Matrix) -> Result<()> {
        if self.cols != b.rows {
            return Err(mismatch("mul", self, b));
        }
        out.resize(self.rows, b.cols);
        for i in 0..self.rows {
            let a_row = self.row(i);
            for (k, &a_ik) in a_row.iter().enumerate() {
                if a_ik == 0.0 {
                    continue;
                }
                let b_row = b.row(k);
                let o_row = out.row_mut(i);
                for (o, &b_kj) in o_row.iter_mut().zip(b_row) {
                    *o += a_ik * b_kj;
                }
            }
        }
        Ok(())
    }

    /// `self * b`.
    pub fn mul(&self, b: &Matrix) -> Result<Matrix> {
        let mut out = Matrix::zeros(0, 0);
        self.mul_into(b, &mut out)?;
        Ok(out)
    }

    /// `out = self^T * b`.
    pub fn tr_mul_into(&self, b: &Matrix, out: &mut Matrix) -> Result<()> {
        if self.rows != b.rows {
            return Err(mismatch("tr_mul", self, b));
        }
        out.resize(self.cols, b.cols);
        for k in 0..self.rows {
            let a_row = self.row(k);
            let b_row = b.row(k);
            for (i, &a_ki) in a_row.iter().enumerate() {
                if a_ki == 0.0 {
                    continue;
                }
                let o_row = out.row_mut(i);
                for (o, &b_kj) in o_row.iter_mut().zip(b_row) {
                    *o += a_ki * b_kj;
                }
            }
        }
        Ok(())
    }

    /// `self^T * b`.
    pub fn tr_mul(&self, b: &Matrix) -> Result<Matrix> {
        let mut out = Matrix::zeros(0, 0);
        self.tr_mul_into(b, &mut out)?;
        Ok(out)
    }

    /// `out = self * b^T`.
    pub fn mul_tr_into(&self, b: &Matrix, out: &mut Matrix) -> Result<()> {
        if self.cols != b.cols {
            return Err(mismatch("mul_tr", self, b));
        }
        out.resize(self.rows, b.rows);
        for i in 0..self.rows {
            let a_row = self.row(i);
            for j in 0..b.rows {
                out[(i, j)] = dot(a_row, b.row(j));
            }
        }
        Ok(())
    }

    /// `self * b^T`.
    pub fn mul_tr(&self, b: &Matrix) -> Result<Matrix> {
        let mut out = Matrix::zeros(0, 0);
        self.mul_tr_into(b, &mut out)?;
        Ok(out)
    }

    /// Matrix-vector product `out = self * x`.
    pub fn mul_vec_into(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        if self.cols != x.len() || self.rows != out.len() {
            return Err(LinalgError::DimensionMismatch {
                op: "mul_vec",
                lhs: self.shape(),
                rhs: (x.len(), out.len()),
            });
        }
        for (i, o) in out.iter_mut().enumerate() {
            *o = dot(self.row(i), x);
        }
        Ok(())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        debug_assert!(r < self.rows && c < self.cols);
        &self.data[r * self.stride + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        debug_assert!(r < self.rows && c < self.cols);
        &mut self.data[r * self.stride + c]
    }
}

/// Dot product of two equal-length slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn mismatch(op: &'static str, a: &Matrix, b: &Matrix) -> LinalgError {
    LinalgError::DimensionMismatch {
        op,
        lhs: a.shape(),
        rhs: b.shape(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_a() -> Matrix {
        Matrix::from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]).unwrap()
    }

    fn sample_b() -> Matrix {
        Matrix::from_rows(&[&[7.0, 8.0], &[9.0, 10.0], &[11.0, 12.0]]).unwrap()
    }

    #[test]
    fn test_padded_stride() {
        assert_eq!(padded_stride(1), 1);
        assert_eq!(padded_stride(2), 4);
        assert_eq!(padded_stride(4), 4);
        assert_eq!(padded_stride(5), 8);
        assert_eq!(Matrix::zeros(3, 6).stride(), 8);
    }

    #[test]
    fn test_mul() {
        let c = sample_a().mul(&sample_b()).unwrap();
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c[(0, 0)], 58.0);
        assert_eq!(c[(0, 1)], 64.0);
        assert_eq!(c[(1, 0)], 139.0);
        assert_eq!(c[(1, 1)], 154.0);
    }

    #[test]
    fn test_transposed_orderings_agree() {
        let a = sample_a();
        let b = sample_b();
        let direct = a.mul(&b).unwrap();
        let via_tr_mul = a.transpose().tr_mul(&b).unwrap();
        let via_mul_tr = a.mul_tr(&b.transpose()).unwrap();
        assert_eq!(direct, via_tr_mul);
        assert_eq!(direct, via_mul_tr);
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let a = sample_a();
        let err = a.mul(&a).unwrap_err();
        assert!(matches!(
            err,
            LinalgError::DimensionMismatch { op: "mul", lhs: (2, 3), rhs: (2, 3) }
        ));
        assert!(a.tr_mul(&sample_b()).is_err());
        assert!(a.mul_tr(&sample_b()).is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(Matrix::from_rows(&[&[1.0, 2.0], &[3.0]]).is_err());
    }

    #[test]
    fn test_resize_reuses_and_zeroes() {
        let mut m = sample_a();
        m.resize(2, 2);
        assert_eq!(m.shape(), (2, 2));
        assert!(m.as_padded_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_symmetry_check() {
        let s = Matrix::from_rows(&[&[2.0, 1.0], &[1.0, 3.0]]).unwrap();
        assert!(s.is_symmetric(0.0));
        assert!(!sample_a().is_symmetric(1e-9));
    }
}
