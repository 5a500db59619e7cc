use crate::error::{invalid, Result, SCError};
use nalgebra::DMatrix;
use num_complex::Complex64;
use std::ops::{Index, IndexMut, Mul};

/// Square complex matrix stored row-major in a single buffer.
///
/// The dimension changes only through [`DenseMatrix::grow`] and
/// [`DenseMatrix::shrink`], so a bus impedance matrix can follow
/// topology edits without ad-hoc reallocation at every call site.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<Complex64>,
}

impl DenseMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![Complex64::default(); n * n],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m[(i, i)] = Complex64::new(1.0, 0.0);
        }
        m
    }

    pub fn from_rows(rows: &[Vec<Complex64>]) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return invalid(format!("row {} has {} entries, expected {}", i, row.len(), n));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn row(&self, i: usize) -> &[Complex64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Appends `by` zero rows and columns. Existing entries keep their
    /// positions.
    pub fn grow(&mut self, by: usize) {
        if by == 0 {
            return;
        }
        let m = self.n + by;
        let mut data = vec![Complex64::default(); m * m];
        for i in 0..self.n {
            data[i * m..i * m + self.n].copy_from_slice(self.row(i));
        }
        self.n = m;
        self.data = data;
    }

    /// Removes row and column `k` (0-based).
    pub fn shrink(&mut self, k: usize) -> Result<()> {
        if k >= self.n {
            return invalid(format!("index {} outside {}x{} matrix", k, self.n, self.n));
        }
        let n = self.n;
        self.data = self
            .data
            .iter()
            .enumerate()
            .filter(|(ix, _)| ix / n != k && ix % n != k)
            .map(|(_, v)| *v)
            .collect();
        self.n = n - 1;
        Ok(())
    }

    /// Moore-Penrose generalized inverse computed from an SVD.
    ///
    /// Singular values at or below `rcond` times the largest singular value
    /// are treated as zero, so singular inputs (e.g. an admittance matrix
    /// with no path to reference) still produce a well-defined result.
    pub fn pinv(&self, rcond: f64) -> Result<DenseMatrix> {
        if self.n == 0 {
            return Ok(DenseMatrix::zeros(0));
        }
        let m = DMatrix::from_row_slice(self.n, self.n, &self.data);
        let svd = m.try_svd(true, true, f64::EPSILON, 0).ok_or_else(|| {
            SCError::Decomposition(format!("SVD of {}x{} matrix did not converge", self.n, self.n))
        })?;
        let cutoff = rcond * svd.singular_values.max();
        let inv = svd
            .pseudo_inverse(cutoff)
            .map_err(|e| SCError::Decomposition(e.to_string()))?;

        let mut out = DenseMatrix::zeros(self.n);
        for i in 0..self.n {
            for j in 0..self.n {
                out[(i, j)] = inv[(i, j)];
            }
        }
        Ok(out)
    }

    /// Largest entry-wise distance to `other`, or infinity on a dimension
    /// mismatch.
    pub fn max_abs_diff(&self, other: &DenseMatrix) -> f64 {
        if self.n != other.n {
            return f64::INFINITY;
        }
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max)
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = Complex64;

    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        &mut self.data[i * self.n + j]
    }
}

/// Matrix product.
///
/// # Panics
///
/// Panics if the operands differ in dimension.
impl Mul for &DenseMatrix {
    type Output = DenseMatrix;

    fn mul(self, rhs: Self) -> DenseMatrix {
        assert_eq!(self.n, rhs.n, "dimension mismatch");
        let n = self.n;
        let mut out = DenseMatrix::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let a = self[(i, k)];
                for j in 0..n {
                    out[(i, j)] += a * rhs[(k, j)];
                }
            }
        }
        out
    }
}
