//! Dense row-major matrices with partial-pivoting LU decomposition.
//!
//! The simulator factors the MNA matrix once per Newton–Raphson iteration
//! and solves once per factorisation, so the hot path here is
//! [`Matrix::lu_pair_into`] followed by [`LuPair::left_divide`]. Both work
//! entirely in caller-provided buffers; nothing on that path allocates.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Neg, Sub, SubAssign};

use num_complex::Complex;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Scalar types the dense matrix can hold.
///
/// Pivot selection compares [`Scalar::pivot_mag`], which is `|x|` for reals
/// and the modulus for complex values. The policy is a named function on
/// purpose: complex numbers have no natural ordering, and hiding the choice
/// behind a comparison operator would obscure it.
pub trait Scalar:
    Copy
    + PartialEq
    + fmt::Debug
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
{
    /// Magnitude used when selecting a pivot row.
    fn pivot_mag(self) -> f64;
}

impl Scalar for f64 {
    fn pivot_mag(self) -> f64 {
        self.abs()
    }
}

impl Scalar for Complex<f64> {
    fn pivot_mag(self) -> f64 {
        self.norm()
    }
}

/// A dense M×N matrix in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Scalar> Matrix<T> {
    /// Create a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::zero(); rows * cols],
            rows,
            cols,
        }
    }

    /// Create a matrix from row-major data.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn from_rows(rows: usize, cols: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), rows * cols, "row-major data length mismatch");
        Self { data, rows, cols }
    }

    /// Create an identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = T::one();
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Overwrite every entry with `value`.
    pub fn fill(&mut self, value: T) {
        for entry in &mut self.data {
            *entry = value;
        }
    }

    /// Copy all entries from `other`, which must have identical dimensions.
    pub fn copy_from(&mut self, other: &Matrix<T>) {
        debug_assert_eq!(self.rows, other.rows);
        debug_assert_eq!(self.cols, other.cols);
        self.data.copy_from_slice(&other.data);
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, row_a: usize, row_b: usize) {
        debug_assert!(row_a < self.rows && row_b < self.rows);
        if row_a == row_b {
            return;
        }
        let (a, b) = (row_a.min(row_b), row_a.max(row_b));
        let (head, tail) = self.data.split_at_mut(b * self.cols);
        head[a * self.cols..(a + 1) * self.cols].swap_with_slice(&mut tail[..self.cols]);
    }

    /// `row[dst] += factor * row[src]`.
    pub fn row_addition(&mut self, dst: usize, src: usize, factor: T) {
        debug_assert!(dst < self.rows && src < self.rows);
        for n in 0..self.cols {
            let v = self.data[src * self.cols + n];
            self.data[dst * self.cols + n] += factor * v;
        }
    }

    /// Dense matrix product. Quadratic storage, cubic time; used by tests
    /// and diagnostics, never on the solve path.
    pub fn matmul(&self, rhs: &Matrix<T>) -> Matrix<T> {
        assert_eq!(self.cols, rhs.rows, "inner dimension mismatch");
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for m in 0..self.rows {
            for k in 0..self.cols {
                let lhs = self.data[m * self.cols + k];
                for n in 0..rhs.cols {
                    out.data[m * rhs.cols + n] += lhs * rhs.data[k * rhs.cols + n];
                }
            }
        }
        out
    }

    /// Factor into a preallocated [`LuPair`] using partial pivoting.
    ///
    /// Doolittle scheme: U starts as a copy of `self`, L as identity. For
    /// each pivot column the largest-magnitude entry on or below the
    /// diagonal is swapped up (recorded in `p`), then the rows below are
    /// eliminated and the multipliers stored in L. The result satisfies
    /// `P·A = L·U` with `P` the permutation sending row `i` to `p[i]`.
    pub fn lu_pair_into(&self, dest: &mut LuPair<T>) -> Result<()> {
        assert_eq!(self.rows, self.cols, "LU requires a square matrix");
        debug_assert_eq!(dest.dim(), self.rows);
        let n = self.rows;

        dest.u.copy_from(self);
        dest.l.fill(T::zero());
        for i in 0..n {
            dest.l[(i, i)] = T::one();
            dest.p[i] = i;
        }

        for r in 0..n.saturating_sub(1) {
            // find the largest-magnitude entry in this pivot column
            let mut largest_row = r;
            let mut max_mag = dest.u[(r, r)].pivot_mag();
            for r2 in r + 1..n {
                let mag = dest.u[(r2, r)].pivot_mag();
                if mag > max_mag {
                    max_mag = mag;
                    largest_row = r2;
                }
            }

            if max_mag < f64::MIN_POSITIVE {
                return Err(Error::SingularMatrix);
            }

            dest.u.swap_rows(r, largest_row);
            dest.p.swap(r, largest_row);
            // the filled sub-diagonal part of L tracks the row order of U
            for col in 0..r {
                let tmp = dest.l[(r, col)];
                dest.l[(r, col)] = dest.l[(largest_row, col)];
                dest.l[(largest_row, col)] = tmp;
            }

            for m in r + 1..n {
                let multiplier = dest.u[(m, r)] / dest.u[(r, r)];
                dest.u.row_addition(m, r, -multiplier);
                dest.l[(m, r)] = multiplier;
            }
        }

        if n > 0 && dest.u[(n - 1, n - 1)].pivot_mag() < f64::MIN_POSITIVE {
            return Err(Error::SingularMatrix);
        }

        Ok(())
    }

    /// Factor into a freshly allocated [`LuPair`].
    pub fn lu_pair(&self) -> Result<LuPair<T>> {
        let mut dest = LuPair::new(self.rows);
        self.lu_pair_into(&mut dest)?;
        Ok(dest)
    }

    /// Solve `self · x = rhs`, allocating the factorisation and buffers.
    pub fn left_divide(&self, rhs: &Matrix<T>) -> Result<Matrix<T>> {
        let lu = self.lu_pair()?;
        let mut scratch = Matrix::zeros(self.rows, 1);
        let mut dest = Matrix::zeros(self.rows, 1);
        lu.left_divide(rhs, &mut scratch, &mut dest)?;
        Ok(dest)
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (m, n): (usize, usize)) -> &T {
        debug_assert!(m < self.rows && n < self.cols, "index ({m}, {n}) out of range");
        &self.data[m * self.cols + n]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (m, n): (usize, usize)) -> &mut T {
        debug_assert!(m < self.rows && n < self.cols, "index ({m}, {n}) out of range");
        &mut self.data[m * self.cols + n]
    }
}

/// The result of a partial-pivoting LU factorisation: `P·A = L·U`.
///
/// `l` is unit-lower-triangular, `u` upper-triangular and `p` the row
/// permutation. Consumed read-only by [`LuPair::left_divide`], so one
/// factorisation can serve several right-hand sides.
#[derive(Debug, Clone)]
pub struct LuPair<T> {
    pub l: Matrix<T>,
    pub u: Matrix<T>,
    pub p: Vec<usize>,
}

impl<T: Scalar> LuPair<T> {
    /// Allocate an LU pair for an `n × n` system.
    pub fn new(n: usize) -> Self {
        Self {
            l: Matrix::zeros(n, n),
            u: Matrix::zeros(n, n),
            p: (0..n).collect(),
        }
    }

    /// Side length of the factored system.
    pub fn dim(&self) -> usize {
        self.p.len()
    }

    /// Solve `L·U·x = P·rhs` by forward then back substitution.
    ///
    /// `rhs`, `scratch` and `dest` are column vectors of the factored
    /// dimension; `scratch` receives the intermediate `y` of `L·y = P·rhs`.
    pub fn left_divide(
        &self,
        rhs: &Matrix<T>,
        scratch: &mut Matrix<T>,
        dest: &mut Matrix<T>,
    ) -> Result<()> {
        let n = self.dim();
        if rhs.rows() != n || scratch.rows() != n || dest.rows() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: rhs.rows(),
            });
        }

        // apply the permutation
        for m in 0..n {
            dest[(m, 0)] = rhs[(self.p[m], 0)];
        }

        // forward: L y = P b
        for m in 0..n {
            let mut val = dest[(m, 0)];
            for k in 0..m {
                val -= scratch[(k, 0)] * self.l[(m, k)];
            }
            scratch[(m, 0)] = val / self.l[(m, m)];
        }

        // back: U x = y
        for m in (0..n).rev() {
            let mut val = scratch[(m, 0)];
            for k in m + 1..n {
                val -= dest[(k, 0)] * self.u[(m, k)];
            }
            dest[(m, 0)] = val / self.u[(m, m)];
        }

        Ok(())
    }
}
