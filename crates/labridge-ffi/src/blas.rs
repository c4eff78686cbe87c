//! BLAS adapter.
//!
//! The bridge needs exactly one BLAS routine, `dgemm`. It is reached
//! through the [`NativeBlas`] trait so the binding to a concrete library
//! stays in one place.
//!
//! ## Backends
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     NativeBlas Trait                        │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲                              ▲
//!            │                              │
//! ┌──────────┴─────────┐        ┌───────────┴──────────────┐
//! │   ReferenceBlas    │        │       SystemBlas         │
//! │  (pure Rust,       │        │  dgemm_ from OpenBLAS or │
//! │   always built)    │        │  Accelerate (features)   │
//! └────────────────────┘        └──────────────────────────┘
//! ```
//!
//! Fortran BLAS reports bad arguments through `XERBLA`, which prints and
//! may abort rather than returning a code. Both backends therefore run the
//! same argument check first and return its position as a negative status,
//! exactly as LAPACK routines report `INFO`.

use crate::status::LapackStatus;

/// Matrix transpose option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Transpose {
    /// No transpose (use matrix as-is).
    NoTrans = b'N',
    /// Transpose the matrix.
    Trans = b'T',
}

impl Transpose {
    /// Map a caller's boolean transpose flag.
    #[must_use]
    pub const fn from_flag(transpose: bool) -> Self {
        if transpose {
            Self::Trans
        } else {
            Self::NoTrans
        }
    }

    /// Convert to BLAS character.
    #[must_use]
    pub const fn to_char(self) -> u8 {
        self as u8
    }

    /// Parse a BLAS character (case-insensitive). The bridge is real
    /// valued, so conjugate transpose `'C'` is not accepted.
    #[must_use]
    pub const fn from_char(c: u8) -> Option<Self> {
        match c.to_ascii_uppercase() {
            b'N' => Some(Self::NoTrans),
            b'T' => Some(Self::Trans),
            _ => None,
        }
    }

    /// Whether the operand is used transposed.
    #[must_use]
    pub const fn is_transposed(self) -> bool {
        !matches!(self, Self::NoTrans)
    }
}

/// Native BLAS routines used by the bridge.
///
/// All matrices are column-major.
pub trait NativeBlas: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &'static str;

    /// General matrix multiplication: C = alpha * op(A) * op(B) + beta * C
    ///
    /// # Arguments
    ///
    /// * `trans_a` - Transpose option for A
    /// * `trans_b` - Transpose option for B
    /// * `m` - Number of rows in op(A) and C
    /// * `n` - Number of columns in op(B) and C
    /// * `k` - Number of columns in op(A) and rows in op(B)
    /// * `alpha` - Scalar multiplier for A*B
    /// * `a` - Matrix A
    /// * `lda` - Leading dimension of A
    /// * `b` - Matrix B
    /// * `ldb` - Leading dimension of B
    /// * `beta` - Scalar multiplier for C
    /// * `c` - Matrix C (output)
    /// * `ldc` - Leading dimension of C
    ///
    /// Returns `-i` if argument `i` is illegal, otherwise success.
    ///
    /// # Safety
    ///
    /// When the arguments are legal, `a`, `b` and `c` must hold at least
    /// `lda * ka`, `ldb * kb` and `ldc * n` elements, where `ka` is `k`
    /// (`m` when transposed) and `kb` is `n` (`k` when transposed).
    #[allow(clippy::too_many_arguments)]
    unsafe fn dgemm(
        &self,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
        n: i32,
        k: i32,
        alpha: f64,
        a: &[f64],
        lda: i32,
        b: &[f64],
        ldb: i32,
        beta: f64,
        c: &mut [f64],
        ldc: i32,
    ) -> LapackStatus;
}

/// `dgemm` argument check, reporting the first bad argument position.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn gemm_argument_check(
    trans_a: Transpose,
    trans_b: Transpose,
    m: i32,
    n: i32,
    k: i32,
    lda: i32,
    ldb: i32,
    ldc: i32,
) -> LapackStatus {
    let nrowa = if trans_a.is_transposed() { k } else { m };
    let nrowb = if trans_b.is_transposed() { n } else { k };

    let position = if m < 0 {
        3
    } else if n < 0 {
        4
    } else if k < 0 {
        5
    } else if lda < nrowa.max(1) {
        8
    } else if ldb < nrowb.max(1) {
        10
    } else if ldc < m.max(1) {
        13
    } else {
        return LapackStatus::SUCCESS;
    };
    LapackStatus::illegal_argument(position)
}

/// Pure Rust reference BLAS.
///
/// Used when no native library is compiled in. It honours the same
/// argument and storage contract as `dgemm_`, with a naive triple loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceBlas;

impl ReferenceBlas {
    /// Create a new reference backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[allow(clippy::cast_sign_loss)]
impl NativeBlas for ReferenceBlas {
    fn name(&self) -> &'static str {
        "Reference (Pure Rust)"
    }

    unsafe fn dgemm(
        &self,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
        n: i32,
        k: i32,
        alpha: f64,
        a: &[f64],
        lda: i32,
        b: &[f64],
        ldb: i32,
        beta: f64,
        c: &mut [f64],
        ldc: i32,
    ) -> LapackStatus {
        let status = gemm_argument_check(trans_a, trans_b, m, n, k, lda, ldb, ldc);
        if !status.is_success() {
            return status;
        }

        let (m, n, k) = (m as usize, n as usize, k as usize);
        let (lda, ldb, ldc) = (lda as usize, ldb as usize, ldc as usize);

        if m == 0 || n == 0 || ((alpha == 0.0 || k == 0) && beta == 1.0) {
            return LapackStatus::SUCCESS;
        }

        for j in 0..n {
            for i in 0..m {
                let mut sum = 0.0;
                if alpha != 0.0 {
                    for l in 0..k {
                        let a_val = if trans_a.is_transposed() {
                            a[i * lda + l]
                        } else {
                            a[l * lda + i]
                        };
                        let b_val = if trans_b.is_transposed() {
                            b[l * ldb + j]
                        } else {
                            b[j * ldb + l]
                        };
                        sum += a_val * b_val;
                    }
                }
                let slot = &mut c[j * ldc + i];
                // beta == 0 must not propagate NaN from an uninitialised C
                *slot = if beta == 0.0 {
                    alpha * sum
                } else {
                    alpha * sum + beta * *slot
                };
            }
        }

        LapackStatus::SUCCESS
    }
}

/// System BLAS bound through the Fortran ABI.
#[cfg(any(feature = "openblas", feature = "accelerate"))]
pub mod system {
    use super::{gemm_argument_check, NativeBlas, Transpose};
    use crate::status::LapackStatus;

    #[cfg_attr(feature = "openblas", link(name = "openblas"))]
    #[cfg_attr(
        all(feature = "accelerate", not(feature = "openblas")),
        link(name = "Accelerate", kind = "framework")
    )]
    extern "C" {
        fn dgemm_(
            transa: *const u8,
            transb: *const u8,
            m: *const i32,
            n: *const i32,
            k: *const i32,
            alpha: *const f64,
            a: *const f64,
            lda: *const i32,
            b: *const f64,
            ldb: *const i32,
            beta: *const f64,
            c: *mut f64,
            ldc: *const i32,
        );
    }

    /// `dgemm_` from the linked system library.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SystemBlas;

    impl SystemBlas {
        /// Create a new system backend.
        #[must_use]
        pub const fn new() -> Self {
            Self
        }
    }

    impl NativeBlas for SystemBlas {
        fn name(&self) -> &'static str {
            if cfg!(feature = "openblas") {
                "OpenBLAS"
            } else {
                "Accelerate"
            }
        }

        unsafe fn dgemm(
            &self,
            trans_a: Transpose,
            trans_b: Transpose,
            m: i32,
            n: i32,
            k: i32,
            alpha: f64,
            a: &[f64],
            lda: i32,
            b: &[f64],
            ldb: i32,
            beta: f64,
            c: &mut [f64],
            ldc: i32,
        ) -> LapackStatus {
            let status = gemm_argument_check(trans_a, trans_b, m, n, k, lda, ldb, ldc);
            if !status.is_success() {
                return status;
            }

            let transa = trans_a.to_char();
            let transb = trans_b.to_char();
            // Safety: arguments are legal and the caller guarantees buffer sizes
            unsafe {
                dgemm_(
                    &transa,
                    &transb,
                    &m,
                    &n,
                    &k,
                    &alpha,
                    a.as_ptr(),
                    &lda,
                    b.as_ptr(),
                    &ldb,
                    &beta,
                    c.as_mut_ptr(),
                    &ldc,
                );
            }
            LapackStatus::SUCCESS
        }
    }
}
