//! Operation dispatchers.
//!
//! Each operation follows the same sequence:
//!
//! ```text
//! derive parameters ─> check sizes ─> acquire views ─> (query ─>) allocate
//!     ─> compute ─> release views ─> return status
//! ```
//!
//! Views are released by their destructors, so a native error status, a
//! failed allocation and a successful call all leave the caller's arrays
//! in the same released state. The native status is returned unchanged as
//! the `Ok` value; `Err` is reserved for failures of the bridge itself.

use crate::blas::{NativeBlas, ReferenceBlas, Transpose};
use crate::config::{BackendKind, BridgeConfig, ValidationPolicy};
use crate::lapack::{GelsdCall, GelsyCall, GesddCall, GesvdCall, NativeLapack, ReferenceLapack, SyevrCall};
use crate::layout;
use crate::pinned::{ManagedArray, NativeView, ReleaseMode};
use crate::shape::{
    require_len, EigenParams, GemmParams, LeastSquaresParams, MatrixView, SvdJob, SvdParams,
};
use crate::status::LapackStatus;
use crate::workspace::{self, gelsd_iwork_len, gesdd_iwork_len};
use crate::{FfiError, FfiResult};
use labridge_rts_alloc::{MemoryRegion, ScratchBlock};

/// `rcond` used by [`Bridge::generalized_inverse`] when none is given.
pub const DEFAULT_PINV_RCOND: f64 = 1e-10;

/// Entry point for all bridged operations.
///
/// Holds the native backends and the configuration; no state is kept
/// between calls.
pub struct Bridge {
    blas: Box<dyn NativeBlas>,
    lapack: Box<dyn NativeLapack>,
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::BackendUnavailable`] if the system backend is
    /// requested but no native library was compiled in.
    pub fn new(config: BridgeConfig) -> FfiResult<Self> {
        let (blas, lapack) = backends(config.backend)?;
        tracing::debug!(
            blas = blas.name(),
            lapack = lapack.name(),
            validation = config.validation.as_str(),
            "created bridge"
        );
        Ok(Self::with_backends(blas, lapack, config))
    }

    /// A bridge over the pure Rust reference routines with default
    /// settings.
    #[must_use]
    pub fn reference() -> Self {
        Self::with_backends(
            Box::new(ReferenceBlas::new()),
            Box::new(ReferenceLapack::new()),
            BridgeConfig::default(),
        )
    }

    /// Create a bridge from `LABRIDGE_BACKEND` and `LABRIDGE_VALIDATION`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unknown value or names an
    /// unavailable backend.
    pub fn from_env() -> FfiResult<Self> {
        Self::new(BridgeConfig::from_env()?)
    }

    /// Create a bridge over explicit backends.
    ///
    /// `config.backend` is kept for reporting only.
    #[must_use]
    pub fn with_backends(blas: Box<dyn NativeBlas>, lapack: Box<dyn NativeLapack>, config: BridgeConfig) -> Self {
        Self { blas, lapack, config }
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Names of the BLAS and LAPACK backends.
    #[must_use]
    pub fn backend_names(&self) -> (&'static str, &'static str) {
        (self.blas.name(), self.lapack.name())
    }

    fn strict(&self) -> bool {
        self.config.validation == ValidationPolicy::Strict
    }

    // ========================================================================
    // Multiply
    // ========================================================================

    /// `C := alpha * op(A) * op(B) + beta * C` via `dgemm`.
    ///
    /// A and B are read only; C is written back.
    ///
    /// With [`ValidationPolicy::Strict`], an inner-dimension mismatch
    /// between op(A) and op(B) is reported as status `-5` (the `K`
    /// argument) without calling the routine.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension overflows a Fortran integer, an
    /// operand is smaller than its shape or the region `dgemm` reads from
    /// it, or a pinned copy cannot be allocated. The read check applies
    /// under both validation policies.
    #[allow(clippy::too_many_arguments)]
    pub fn multiply(
        &self,
        trans_a: bool,
        trans_b: bool,
        alpha: f64,
        a: MatrixView<'_>,
        b: MatrixView<'_>,
        beta: f64,
        c: MatrixView<'_>,
    ) -> FfiResult<LapackStatus> {
        let (a, a_shape) = a.into_parts();
        let (b, b_shape) = b.into_parts();
        let (c, c_shape) = c.into_parts();

        let params = GemmParams::derive(
            a_shape,
            Transpose::from_flag(trans_a),
            b_shape,
            Transpose::from_flag(trans_b),
            c_shape,
        )?;
        tracing::debug!(
            m = params.m,
            n = params.n,
            k = params.k,
            lda = params.lda,
            ldb = params.ldb,
            ldc = params.ldc,
            trans_a,
            trans_b,
            "dgemm"
        );

        if self.strict() && params.has_inner_mismatch() {
            tracing::debug!(k = params.k, b_inner = params.b_inner, "inner dimension mismatch");
            return Ok(LapackStatus::illegal_argument(5));
        }

        require_len("A", a_shape.storage_len().max(params.a_len()), a.len())?;
        require_len("B", b_shape.storage_len().max(params.b_len()), b.len())?;
        require_len("C", params.c_len(), c.len())?;

        let a = NativeView::acquire(a, ReleaseMode::Discard)?;
        let b = NativeView::acquire(b, ReleaseMode::Discard)?;
        let mut c = NativeView::acquire(c, ReleaseMode::Commit)?;

        // Safety: each operand holds at least the `ld * cols` region dgemm
        // reads for the derived M, N, K and transpose flags
        let status = unsafe {
            self.blas.dgemm(
                params.trans_a,
                params.trans_b,
                params.m,
                params.n,
                params.k,
                alpha,
                a.as_slice(),
                params.lda,
                b.as_slice(),
                params.ldb,
                beta,
                c.as_mut_slice(),
                params.ldc,
            )
        };
        Ok(status)
    }

    // ========================================================================
    // Least squares
    // ========================================================================

    /// Minimum-norm least squares `A X ~= B` by SVD (`dgelsd`).
    ///
    /// A is destroyed. B holds the right-hand sides on entry and the
    /// `cols(A) x nrhs` solution on exit, so its leading dimension must be
    /// at least `max(1, rows(A), cols(A))`; for a wide A pass B through
    /// [`MatrixView::with_leading_dimension`]. Singular values below
    /// `rcond * s_max` are treated as zero (`rcond < 0` means machine
    /// precision). The effective rank is written to `rank`.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension overflows, an operand is too small,
    /// or scratch memory cannot be allocated.
    pub fn solve_least_squares_svd(
        &self,
        a: MatrixView<'_>,
        b: MatrixView<'_>,
        rcond: f64,
        rank: &mut i32,
    ) -> FfiResult<LapackStatus> {
        let (a, a_shape) = a.into_parts();
        let (b, b_shape) = b.into_parts();
        let params = LeastSquaresParams::derive(a_shape, b_shape)?;
        tracing::debug!(
            m = params.m,
            n = params.n,
            nrhs = params.nrhs,
            lda = params.lda,
            ldb = params.ldb,
            rcond,
            "dgelsd"
        );

        if let Some(status) = self.check_least_squares(&params) {
            return Ok(status);
        }
        require_len("A", a_shape.storage_len(), a.len())?;
        require_len("B", params.b_len(), b.len())?;

        let mut a = NativeView::acquire(a, ReleaseMode::Commit)?;
        let mut b = NativeView::acquire(b, ReleaseMode::Commit)?;
        let mut s = ScratchBlock::<f64>::zeroed(params.s_len(), MemoryRegion::Scratch)?;

        let mut call = GelsdCall {
            lapack: self.lapack.as_ref(),
            m: params.m,
            n: params.n,
            nrhs: params.nrhs,
            a: a.as_mut_slice(),
            lda: params.lda,
            b: b.as_mut_slice(),
            ldb: params.ldb,
            s: s.as_mut_slice(),
            rcond,
            rank,
            iwork_len: gelsd_iwork_len(a_shape.rows, a_shape.cols),
        };
        workspace::run(&mut call)
    }

    /// Minimum-norm least squares `A X ~= B` by complete orthogonal
    /// factorization (`dgelsy`).
    ///
    /// Same operand contract as [`Bridge::solve_least_squares_svd`]. On
    /// exit A holds the triangular factor. `rcond` bounds the condition
    /// number of the leading triangular block used to determine the rank.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension overflows, an operand is too small,
    /// or scratch memory cannot be allocated.
    pub fn solve_least_squares_qr(
        &self,
        a: MatrixView<'_>,
        b: MatrixView<'_>,
        rcond: f64,
        rank: &mut i32,
    ) -> FfiResult<LapackStatus> {
        let (a, a_shape) = a.into_parts();
        let (b, b_shape) = b.into_parts();
        let params = LeastSquaresParams::derive(a_shape, b_shape)?;
        tracing::debug!(
            m = params.m,
            n = params.n,
            nrhs = params.nrhs,
            lda = params.lda,
            ldb = params.ldb,
            rcond,
            "dgelsy"
        );

        if let Some(status) = self.check_least_squares(&params) {
            return Ok(status);
        }
        require_len("A", a_shape.storage_len(), a.len())?;
        require_len("B", params.b_len(), b.len())?;

        let mut a = NativeView::acquire(a, ReleaseMode::Commit)?;
        let mut b = NativeView::acquire(b, ReleaseMode::Commit)?;
        // all columns free
        let mut jpvt = ScratchBlock::<i32>::zeroed(a_shape.cols, MemoryRegion::Scratch)?;

        let mut call = GelsyCall {
            lapack: self.lapack.as_ref(),
            m: params.m,
            n: params.n,
            nrhs: params.nrhs,
            a: a.as_mut_slice(),
            lda: params.lda,
            b: b.as_mut_slice(),
            ldb: params.ldb,
            jpvt: jpvt.as_mut_slice(),
            rcond,
            rank,
        };
        workspace::run(&mut call)
    }

    /// Strict-mode check that B can hold the solution: `LDB` is argument 7
    /// of both least squares drivers.
    fn check_least_squares(&self, params: &LeastSquaresParams) -> Option<LapackStatus> {
        let required = params.m.max(params.n).max(1);
        if self.strict() && params.ldb < required {
            tracing::debug!(ldb = params.ldb, required, "right-hand side too short for solution");
            return Some(LapackStatus::illegal_argument(7));
        }
        None
    }

    // ========================================================================
    // Singular value decomposition
    // ========================================================================

    /// Singular value decomposition `A = U * diag(S) * V^T` by divide and
    /// conquer (`dgesdd`).
    ///
    /// `job` selects which singular vectors are computed; views that the
    /// job does not reference may be empty. A is destroyed, or receives U
    /// or V^T with [`SvdJob::Overwrite`]. Singular values are descending.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension overflows, an operand is too small
    /// for the job, or scratch memory cannot be allocated.
    pub fn svd_divide_and_conquer(
        &self,
        job: SvdJob,
        a: MatrixView<'_>,
        s: &mut dyn ManagedArray<f64>,
        u: MatrixView<'_>,
        vt: MatrixView<'_>,
    ) -> FfiResult<LapackStatus> {
        let (a, a_shape) = a.into_parts();
        let (u, u_shape) = u.into_parts();
        let (vt, vt_shape) = vt.into_parts();
        let params = SvdParams::divide_and_conquer(job, a_shape, u_shape, vt_shape)?;
        tracing::debug!(
            job = ?job,
            m = params.m,
            n = params.n,
            lda = params.lda,
            ldu = params.ldu,
            ldvt = params.ldvt,
            "dgesdd"
        );

        require_len("A", a_shape.storage_len(), a.len())?;
        require_len("S", params.s_len(), s.len())?;
        require_len("U", params.u_len(), u.len())?;
        require_len("VT", params.vt_len(), vt.len())?;

        let mut a = NativeView::acquire(a, ReleaseMode::Commit)?;
        let mut s = NativeView::acquire(s, ReleaseMode::Commit)?;
        let mut u = NativeView::acquire(u, ReleaseMode::Commit)?;
        let mut vt = NativeView::acquire(vt, ReleaseMode::Commit)?;

        let mut call = GesddCall {
            lapack: self.lapack.as_ref(),
            jobz: job.to_char(),
            m: params.m,
            n: params.n,
            a: a.as_mut_slice(),
            lda: params.lda,
            s: s.as_mut_slice(),
            u: u.as_mut_slice(),
            ldu: params.ldu,
            vt: vt.as_mut_slice(),
            ldvt: params.ldvt,
            iwork_len: gesdd_iwork_len(a_shape.rows, a_shape.cols),
        };
        workspace::run(&mut call)
    }

    /// Singular value decomposition by QR iteration (`dgesvd`), with
    /// separate jobs for U and V^T.
    ///
    /// `jobu` and `jobvt` cannot both be [`SvdJob::Overwrite`]; the routine
    /// reports that combination as an illegal second argument.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension overflows, an operand is too small
    /// for the jobs, or scratch memory cannot be allocated.
    pub fn svd_general(
        &self,
        jobu: SvdJob,
        jobvt: SvdJob,
        a: MatrixView<'_>,
        s: &mut dyn ManagedArray<f64>,
        u: MatrixView<'_>,
        vt: MatrixView<'_>,
    ) -> FfiResult<LapackStatus> {
        let (a, a_shape) = a.into_parts();
        let (u, u_shape) = u.into_parts();
        let (vt, vt_shape) = vt.into_parts();
        let params = SvdParams::general(jobu, jobvt, a_shape, u_shape, vt_shape)?;
        tracing::debug!(
            jobu = ?jobu,
            jobvt = ?jobvt,
            m = params.m,
            n = params.n,
            lda = params.lda,
            ldu = params.ldu,
            ldvt = params.ldvt,
            "dgesvd"
        );

        require_len("A", a_shape.storage_len(), a.len())?;
        require_len("S", params.s_len(), s.len())?;
        require_len("U", params.u_len(), u.len())?;
        require_len("VT", params.vt_len(), vt.len())?;

        let mut a = NativeView::acquire(a, ReleaseMode::Commit)?;
        let mut s = NativeView::acquire(s, ReleaseMode::Commit)?;
        let mut u = NativeView::acquire(u, ReleaseMode::Commit)?;
        let mut vt = NativeView::acquire(vt, ReleaseMode::Commit)?;

        let mut call = GesvdCall {
            lapack: self.lapack.as_ref(),
            jobu: jobu.to_char(),
            jobvt: jobvt.to_char(),
            m: params.m,
            n: params.n,
            a: a.as_mut_slice(),
            lda: params.lda,
            s: s.as_mut_slice(),
            u: u.as_mut_slice(),
            ldu: params.ldu,
            vt: vt.as_mut_slice(),
            ldvt: params.ldvt,
        };
        workspace::run(&mut call)
    }

    // ========================================================================
    // Symmetric eigendecomposition
    // ========================================================================

    /// All eigenvalues and eigenvectors of a symmetric matrix (`dsyevr`).
    ///
    /// Only the upper triangle of A is read; A is destroyed. Eigenvalues
    /// are written to `w` in ascending order and the matching orthonormal
    /// eigenvectors to the columns of `z`.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension overflows, an operand is too small,
    /// or scratch memory cannot be allocated.
    pub fn symmetric_eigen(
        &self,
        a: MatrixView<'_>,
        w: &mut dyn ManagedArray<f64>,
        z: MatrixView<'_>,
    ) -> FfiResult<LapackStatus> {
        let (a, a_shape) = a.into_parts();
        let (z, z_shape) = z.into_parts();
        let params = EigenParams::derive(a_shape, z_shape)?;
        tracing::debug!(n = params.n, lda = params.lda, ldz = params.ldz, "dsyevr");

        require_len("A", params.a_len(), a.len())?;
        require_len("W", params.order(), w.len())?;
        require_len("Z", params.z_len(), z.len())?;

        let mut a = NativeView::acquire(a, ReleaseMode::Commit)?;
        let mut w = NativeView::acquire(w, ReleaseMode::Commit)?;
        let mut z = NativeView::acquire(z, ReleaseMode::Commit)?;
        let mut isuppz = ScratchBlock::<i32>::zeroed(2 * params.order(), MemoryRegion::Scratch)?;

        let mut call = SyevrCall {
            lapack: self.lapack.as_ref(),
            n: params.n,
            a: a.as_mut_slice(),
            lda: params.lda,
            w: w.as_mut_slice(),
            z: z.as_mut_slice(),
            ldz: params.ldz,
            isuppz: isuppz.as_mut_slice(),
            found: 0,
        };
        workspace::run(&mut call)
    }

    // ========================================================================
    // Generalized inverse
    // ========================================================================

    /// Moore-Penrose pseudo-inverse of the packed `rows x cols` matrix `a`.
    ///
    /// Solves `A X = I` with [`Bridge::solve_least_squares_svd`] on a copy
    /// of A; `a` itself is not modified. `rcond` defaults to
    /// [`DEFAULT_PINV_RCOND`].
    ///
    /// # Errors
    ///
    /// Returns an error if `a` is shorter than `rows * cols` or the solve
    /// fails at the bridge level. A non-zero native status is reported in
    /// [`PseudoInverse::status`].
    pub fn generalized_inverse(
        &self,
        a: &[f64],
        rows: usize,
        cols: usize,
        rcond: Option<f64>,
    ) -> FfiResult<PseudoInverse> {
        let len = rows.checked_mul(cols).ok_or(FfiError::DimensionOverflow { value: usize::MAX })?;
        require_len("A", len, a.len())?;

        let ld = rows.max(cols).max(1);
        let mut a_copy = a[..len].to_vec();
        let mut rhs = layout::identity(rows, ld);
        let mut rank = 0;

        let status = self.solve_least_squares_svd(
            MatrixView::new(&mut a_copy, rows, cols),
            MatrixView::with_leading_dimension(&mut rhs, rows, rows, ld)?,
            rcond.unwrap_or(DEFAULT_PINV_RCOND),
            &mut rank,
        )?;

        let mut data = vec![0.0; cols * rows];
        for j in 0..rows {
            data[j * cols..(j + 1) * cols].copy_from_slice(&rhs[j * ld..j * ld + cols]);
        }

        Ok(PseudoInverse {
            data,
            rows: cols,
            cols: rows,
            rank,
            status,
        })
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::reference()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("blas", &self.blas.name())
            .field("lapack", &self.lapack.name())
            .field("config", &self.config)
            .finish()
    }
}

fn backends(kind: BackendKind) -> FfiResult<(Box<dyn NativeBlas>, Box<dyn NativeLapack>)> {
    match kind {
        BackendKind::Reference => Ok((Box::new(ReferenceBlas::new()), Box::new(ReferenceLapack::new()))),
        BackendKind::System => system_backends(),
    }
}

#[cfg(any(feature = "openblas", feature = "accelerate"))]
fn system_backends() -> FfiResult<(Box<dyn NativeBlas>, Box<dyn NativeLapack>)> {
    Ok((
        Box::new(crate::blas::system::SystemBlas::new()),
        Box::new(crate::lapack::system::SystemLapack::new()),
    ))
}

#[cfg(not(any(feature = "openblas", feature = "accelerate")))]
fn system_backends() -> FfiResult<(Box<dyn NativeBlas>, Box<dyn NativeLapack>)> {
    Err(FfiError::BackendUnavailable(
        "built without the `openblas` or `accelerate` feature".to_string(),
    ))
}

/// Result of [`Bridge::generalized_inverse`].
#[derive(Clone, Debug, PartialEq)]
pub struct PseudoInverse {
    /// The `rows x cols` pseudo-inverse, column-major.
    pub data: Vec<f64>,
    /// Rows, equal to the columns of the input.
    pub rows: usize,
    /// Columns, equal to the rows of the input.
    pub cols: usize,
    /// Effective rank of the input.
    pub rank: i32,
    /// Status of the underlying `dgelsd` call.
    pub status: LapackStatus,
}

impl PseudoInverse {
    /// The pseudo-inverse as a vector of rows.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        layout::rows_from_column_major(&self.data, self.rows, self.cols)
    }
}
