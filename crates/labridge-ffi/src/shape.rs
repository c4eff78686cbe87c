//! Shape and parameter translation.
//!
//! Native routines take positional integers: row and column counts, leading
//! dimensions, transpose flags and job characters. This module derives
//! those from logical matrix shapes and computes how many elements each
//! operand buffer must hold, so undersized buffers are rejected before a
//! routine can write past them.

use crate::blas::Transpose;
use crate::pinned::ManagedArray;
use crate::{fortran_int, FfiError, FfiResult};

/// Logical shape of a column-major matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Stride between columns, `>= max(1, rows)`.
    pub ld: usize,
}

impl Shape {
    /// A densely packed matrix: `ld = max(1, rows)`.
    #[must_use]
    pub const fn packed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ld: if rows > 1 { rows } else { 1 },
        }
    }

    /// A matrix with an explicit leading dimension.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::InvalidLeadingDimension`] if `ld < max(1, rows)`.
    pub fn strided(rows: usize, cols: usize, ld: usize) -> FfiResult<Self> {
        if ld < rows.max(1) {
            return Err(FfiError::InvalidLeadingDimension { ld, rows });
        }
        Ok(Self { rows, cols, ld })
    }

    /// Elements the storage must hold: `ld * cols`, or none when the
    /// matrix is empty.
    #[must_use]
    pub const fn storage_len(&self) -> usize {
        if self.rows == 0 || self.cols == 0 {
            return 0;
        }
        self.ld.saturating_mul(self.cols)
    }
}

/// Check that an operand buffer holds at least `expected` elements.
///
/// # Errors
///
/// Returns [`FfiError::SizeMismatch`] if it does not.
pub fn require_len(operand: &'static str, expected: usize, actual: usize) -> FfiResult<()> {
    if actual < expected {
        return Err(FfiError::SizeMismatch {
            operand,
            expected,
            actual,
        });
    }
    Ok(())
}

/// A managed array viewed as a column-major matrix.
///
/// The caller keeps ownership of the array; the view only borrows it for
/// one dispatcher call.
pub struct MatrixView<'a> {
    array: &'a mut dyn ManagedArray<f64>,
    shape: Shape,
}

impl<'a> MatrixView<'a> {
    /// View `array` as a packed `rows x cols` matrix.
    pub fn new(array: &'a mut dyn ManagedArray<f64>, rows: usize, cols: usize) -> Self {
        Self {
            array,
            shape: Shape::packed(rows, cols),
        }
    }

    /// View `array` as a `rows x cols` matrix with column stride `ld`.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::InvalidLeadingDimension`] if `ld < max(1, rows)`.
    pub fn with_leading_dimension(
        array: &'a mut dyn ManagedArray<f64>,
        rows: usize,
        cols: usize,
        ld: usize,
    ) -> FfiResult<Self> {
        Ok(Self {
            array,
            shape: Shape::strided(rows, cols, ld)?,
        })
    }

    /// The logical shape.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.shape.rows
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.shape.cols
    }

    /// Leading dimension.
    #[inline]
    #[must_use]
    pub const fn ld(&self) -> usize {
        self.shape.ld
    }

    /// Number of elements in the underlying array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Whether the underlying array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Split into the borrowed array and its shape.
    pub fn into_parts(self) -> (&'a mut dyn ManagedArray<f64>, Shape) {
        (self.array, self.shape)
    }
}

impl std::fmt::Debug for MatrixView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixView")
            .field("shape", &self.shape)
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Multiply
// ============================================================================

/// Positional `dgemm` parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GemmParams {
    /// op(A).
    pub trans_a: Transpose,
    /// op(B).
    pub trans_b: Transpose,
    /// Rows of op(A) and C.
    pub m: i32,
    /// Columns of op(B) and C.
    pub n: i32,
    /// Columns of op(A).
    pub k: i32,
    /// Leading dimension of A.
    pub lda: i32,
    /// Leading dimension of B.
    pub ldb: i32,
    /// Leading dimension of C.
    pub ldc: i32,
    /// Rows of op(B), which must equal `k`.
    pub b_inner: i32,
}

impl GemmParams {
    /// Derive parameters for `C := alpha * op(A) * op(B) + beta * C`.
    ///
    /// `M` and `K` come from A (swapped when A is transposed), `N` from B.
    /// Leading dimensions are taken from the views; for packed storage
    /// they equal the untransposed row counts.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::DimensionOverflow`] if any value does not fit a
    /// Fortran integer.
    pub fn derive(a: Shape, trans_a: Transpose, b: Shape, trans_b: Transpose, c: Shape) -> FfiResult<Self> {
        let (m, k) = match trans_a {
            Transpose::NoTrans => (a.rows, a.cols),
            Transpose::Trans => (a.cols, a.rows),
        };
        let (b_inner, n) = match trans_b {
            Transpose::NoTrans => (b.rows, b.cols),
            Transpose::Trans => (b.cols, b.rows),
        };

        Ok(Self {
            trans_a,
            trans_b,
            m: fortran_int(m)?,
            n: fortran_int(n)?,
            k: fortran_int(k)?,
            lda: fortran_int(a.ld)?,
            ldb: fortran_int(b.ld)?,
            ldc: fortran_int(c.ld)?,
            b_inner: fortran_int(b_inner)?,
        })
    }

    /// Whether the inner dimensions of op(A) and op(B) disagree.
    #[must_use]
    pub const fn has_inner_mismatch(&self) -> bool {
        self.k != self.b_inner
    }

    /// Elements of A the routine reads: `lda * ka`, where `ka` is `K`, or
    /// `M` when A is transposed.
    #[must_use]
    pub fn a_len(&self) -> usize {
        if self.m == 0 || self.k == 0 {
            return 0;
        }
        let ka = if self.trans_a.is_transposed() { self.m } else { self.k };
        dim(self.lda) * dim(ka)
    }

    /// Elements of B the routine reads: `ldb * kb`, where `kb` is `N`, or
    /// `K` when B is transposed.
    #[must_use]
    pub fn b_len(&self) -> usize {
        if self.n == 0 || self.k == 0 {
            return 0;
        }
        let kb = if self.trans_b.is_transposed() { self.k } else { self.n };
        dim(self.ldb) * dim(kb)
    }

    /// Elements C must hold: `ldc * N`, or none when C is empty.
    #[must_use]
    pub fn c_len(&self) -> usize {
        if self.m == 0 {
            return 0;
        }
        dim(self.ldc) * dim(self.n)
    }
}

// ============================================================================
// Least squares
// ============================================================================

/// Positional parameters shared by `dgelsd` and `dgelsy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeastSquaresParams {
    /// Rows of A.
    pub m: i32,
    /// Columns of A.
    pub n: i32,
    /// Number of right-hand sides.
    pub nrhs: i32,
    /// Leading dimension of A.
    pub lda: i32,
    /// Leading dimension of B, which must be `>= max(1, m, n)`.
    pub ldb: i32,
}

impl LeastSquaresParams {
    /// Derive parameters for solving `A X ~= B`.
    ///
    /// B holds the right-hand sides on entry and the `n`-row solution on
    /// exit, so its column stride must cover `max(m, n)` rows.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::DimensionOverflow`] if any value does not fit a
    /// Fortran integer.
    pub fn derive(a: Shape, b: Shape) -> FfiResult<Self> {
        Ok(Self {
            m: fortran_int(a.rows)?,
            n: fortran_int(a.cols)?,
            nrhs: fortran_int(b.cols)?,
            lda: fortran_int(a.ld)?,
            ldb: fortran_int(b.ld)?,
        })
    }

    /// `min(m, n)`.
    #[must_use]
    pub fn min_dim(&self) -> usize {
        dim(self.m).min(dim(self.n))
    }

    /// Elements of the singular value scratch for `dgelsd`: one per
    /// element of A, which covers the `min(m, n)` values written.
    #[must_use]
    pub fn s_len(&self) -> usize {
        dim(self.m).saturating_mul(dim(self.n))
    }

    /// Elements B must hold: `ldb * nrhs`.
    #[must_use]
    pub fn b_len(&self) -> usize {
        dim(self.ldb) * dim(self.nrhs)
    }
}

// ============================================================================
// Singular value decomposition
// ============================================================================

/// Which singular vectors an SVD routine computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SvdJob {
    /// All columns of U (or rows of V^T): `'A'`.
    All,
    /// The leading `min(m, n)` columns or rows: `'S'`.
    Thin,
    /// Vectors overwrite A: `'O'`.
    Overwrite,
    /// No vectors: `'N'`.
    None,
}

impl SvdJob {
    /// The Fortran job character.
    #[must_use]
    pub const fn to_char(self) -> u8 {
        match self {
            Self::All => b'A',
            Self::Thin => b'S',
            Self::Overwrite => b'O',
            Self::None => b'N',
        }
    }

    /// Parse a Fortran job character (case-insensitive).
    #[must_use]
    pub const fn from_char(c: u8) -> Option<Self> {
        match c.to_ascii_uppercase() {
            b'A' => Some(Self::All),
            b'S' => Some(Self::Thin),
            b'O' => Some(Self::Overwrite),
            b'N' => Some(Self::None),
            _ => None,
        }
    }
}

/// Positional parameters for `dgesdd` and `dgesvd`, with the buffer sizes
/// implied by the job modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SvdParams {
    /// Rows of A.
    pub m: i32,
    /// Columns of A.
    pub n: i32,
    /// Leading dimension of A.
    pub lda: i32,
    /// Leading dimension of U.
    pub ldu: i32,
    /// Leading dimension of V^T.
    pub ldvt: i32,
    /// Columns of U the routine writes (0 when U is not referenced).
    pub u_cols: usize,
    /// Whether V^T is referenced.
    pub vt_referenced: bool,
}

impl SvdParams {
    /// Parameters for the divide-and-conquer driver, one job for both
    /// factors.
    ///
    /// With [`SvdJob::Overwrite`], U goes into A when `m >= n` and V^T goes
    /// into A otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::DimensionOverflow`] if any value does not fit a
    /// Fortran integer.
    pub fn divide_and_conquer(job: SvdJob, a: Shape, u: Shape, vt: Shape) -> FfiResult<Self> {
        let (m, n) = (a.rows, a.cols);
        let (u_cols, vt_referenced) = match job {
            SvdJob::All => (m, true),
            SvdJob::Thin => (m.min(n), true),
            SvdJob::Overwrite if m >= n => (0, true),
            SvdJob::Overwrite => (m, false),
            SvdJob::None => (0, false),
        };
        Self::build(a, u, vt, u_cols, vt_referenced)
    }

    /// Parameters for the general driver, separate jobs for U and V^T.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::DimensionOverflow`] if any value does not fit a
    /// Fortran integer.
    pub fn general(jobu: SvdJob, jobvt: SvdJob, a: Shape, u: Shape, vt: Shape) -> FfiResult<Self> {
        let (m, n) = (a.rows, a.cols);
        let u_cols = match jobu {
            SvdJob::All => m,
            SvdJob::Thin => m.min(n),
            SvdJob::Overwrite | SvdJob::None => 0,
        };
        let vt_referenced = matches!(jobvt, SvdJob::All | SvdJob::Thin);
        Self::build(a, u, vt, u_cols, vt_referenced)
    }

    fn build(a: Shape, u: Shape, vt: Shape, u_cols: usize, vt_referenced: bool) -> FfiResult<Self> {
        Ok(Self {
            m: fortran_int(a.rows)?,
            n: fortran_int(a.cols)?,
            lda: fortran_int(a.ld)?,
            ldu: fortran_int(u.ld)?,
            ldvt: fortran_int(vt.ld)?,
            u_cols,
            vt_referenced,
        })
    }

    /// Number of singular values: `min(m, n)`.
    #[must_use]
    pub fn s_len(&self) -> usize {
        dim(self.m).min(dim(self.n))
    }

    /// Elements U must hold. An empty A makes the routine return before
    /// touching U or V^T.
    #[must_use]
    pub fn u_len(&self) -> usize {
        if self.s_len() == 0 {
            return 0;
        }
        dim(self.ldu) * self.u_cols
    }

    /// Elements V^T must hold.
    #[must_use]
    pub fn vt_len(&self) -> usize {
        if self.vt_referenced && self.s_len() > 0 {
            dim(self.ldvt) * dim(self.n)
        } else {
            0
        }
    }
}

// ============================================================================
// Symmetric eigendecomposition
// ============================================================================

/// Positional `dsyevr` parameters for all eigenpairs of an upper-stored
/// symmetric matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EigenParams {
    /// Order of A.
    pub n: i32,
    /// Leading dimension of A.
    pub lda: i32,
    /// Leading dimension of Z.
    pub ldz: i32,
}

impl EigenParams {
    /// Job: eigenvalues and eigenvectors.
    pub const JOBZ: u8 = b'V';
    /// Range: all eigenvalues.
    pub const RANGE: u8 = b'A';
    /// Storage: upper triangle.
    pub const UPLO: u8 = b'U';

    /// Derive parameters from the order of A and the eigenvector output.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::DimensionOverflow`] if any value does not fit a
    /// Fortran integer.
    pub fn derive(a: Shape, z: Shape) -> FfiResult<Self> {
        Ok(Self {
            n: fortran_int(a.rows)?,
            lda: fortran_int(a.ld)?,
            ldz: fortran_int(z.ld)?,
        })
    }

    /// Order as `usize`.
    #[must_use]
    pub fn order(&self) -> usize {
        dim(self.n)
    }

    /// Elements A must hold: `lda * n`.
    #[must_use]
    pub fn a_len(&self) -> usize {
        dim(self.lda) * self.order()
    }

    /// Elements Z must hold: `ldz * n`.
    #[must_use]
    pub fn z_len(&self) -> usize {
        dim(self.ldz) * self.order()
    }
}

/// A non-negative Fortran integer as `usize`; negative values count as 0.
#[inline]
pub(crate) fn dim(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}
