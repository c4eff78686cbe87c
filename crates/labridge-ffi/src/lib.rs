//! # labridge FFI bridge
//!
//! This crate marshals managed array buffers into calls against native
//! routines that follow the BLAS/LAPACK calling convention: Fortran
//! column-major storage, scalars passed by pointer, and the two-call
//! workspace-query protocol.
//!
//! ## Overview
//!
//! Key components:
//!
//! - **Buffer bridge** ([`pinned`]): acquires a native view of a managed
//!   array for the duration of one call, either aliasing its storage or
//!   copying it into a pinned buffer, and synchronises back on release.
//! - **Workspace planner** ([`workspace`]): the "query, allocate, compute"
//!   protocol and the closed-form integer workspace sizes.
//! - **Shape translator** ([`shape`]): logical matrix shapes to positional
//!   native parameters and buffer sizing contracts.
//! - **Native adapters** ([`blas`], [`lapack`]): one trait per library,
//!   one method per routine, with a pure Rust reference backend and an
//!   optional system backend bound to `libopenblas` or Accelerate.
//! - **Dispatchers** ([`dispatch`]): the operations exposed to callers.
//!
//! ## Call Lifecycle
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       Managed caller                           │
//! │  ┌──────────────┐                                              │
//! │  │ ManagedArray │  ──(acquire)──>  ┌──────────────────┐       │
//! │  │  (may move)  │                  │   NativeView      │       │
//! │  └──────────────┘                  │ (alias or pinned) │       │
//! │                                    └────────┬─────────┘       │
//! ├─────────────────────────────────────────────┼──────────────────┤
//! │   shape translation ─> workspace query ─> scratch allocation   │
//! ├─────────────────────────────────────────────┼──────────────────┤
//! │  ┌──────────────────────────────────────────▼───────────────┐ │
//! │  │          NativeBlas / NativeLapack routine               │ │
//! │  │  - receives raw column-major storage                      │ │
//! │  │  - reports an integer status                              │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//!          release: write back (copies), unpin, free scratch
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labridge_ffi::{Bridge, MatrixView};
//!
//! let bridge = Bridge::reference();
//! let mut a = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]; // 2x3, column-major
//! let mut b = vec![7.0, 9.0, 11.0, 8.0, 10.0, 12.0]; // 3x2
//! let mut c = vec![0.0; 4];
//! let status = bridge.multiply(
//!     false,
//!     false,
//!     1.0,
//!     MatrixView::new(&mut a, 2, 3),
//!     MatrixView::new(&mut b, 3, 2),
//!     0.0,
//!     MatrixView::new(&mut c, 2, 2),
//! )?;
//! assert!(status.is_success());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod blas;
pub mod config;
pub mod dispatch;
pub mod lapack;
pub mod layout;
pub mod pinned;
pub mod shape;
pub mod status;
pub mod workspace;

pub use blas::{NativeBlas, ReferenceBlas, Transpose};
pub use config::{BackendKind, BridgeConfig, ValidationPolicy};
pub use dispatch::{Bridge, PseudoInverse};
pub use lapack::{NativeLapack, ReferenceLapack};
pub use pinned::{ManagedArray, MovableArray, NativeView, PinPolicy, PinnedBuffer, ReleaseMode};
pub use shape::{MatrixView, Shape, SvdJob};
pub use status::{LapackError, LapackStatus, StatusKind};
pub use workspace::{Workspace, WorkspaceSize};

use labridge_rts_alloc::{AllocError, ZeroInit};
use thiserror::Error;

/// Errors raised by the bridge itself, as opposed to statuses reported by
/// a native routine.
#[derive(Clone, Debug, Error)]
pub enum FfiError {
    /// Scratch or pinned memory could not be allocated.
    #[error("FFI allocation failed: {0}")]
    AllocationFailed(#[from] AllocError),

    /// A caller buffer is smaller than the routine will touch.
    #[error("size mismatch for {operand}: expected at least {expected} elements, got {actual}")]
    SizeMismatch {
        /// Which operand was too small.
        operand: &'static str,
        /// Required number of elements.
        expected: usize,
        /// Actual number of elements.
        actual: usize,
    },

    /// A dimension does not fit in a Fortran `INTEGER`.
    #[error("dimension {value} does not fit in a 32-bit Fortran integer")]
    DimensionOverflow {
        /// The offending value.
        value: usize,
    },

    /// A leading dimension smaller than the row count.
    #[error("invalid leading dimension: {ld} for matrix with {rows} rows")]
    InvalidLeadingDimension {
        /// Leading dimension provided.
        ld: usize,
        /// Number of rows.
        rows: usize,
    },

    /// The configured backend is not compiled into this build.
    #[error("native backend not available: {0}")]
    BackendUnavailable(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration for {key}: {value:?}")]
    InvalidConfig {
        /// Configuration key.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Result type for FFI operations.
pub type FfiResult<T> = Result<T, FfiError>;

/// Convert a dimension to a Fortran `INTEGER`.
///
/// # Errors
///
/// Returns [`FfiError::DimensionOverflow`] if `value` exceeds `i32::MAX`.
#[inline]
pub fn fortran_int(value: usize) -> FfiResult<i32> {
    i32::try_from(value).map_err(|_| FfiError::DimensionOverflow { value })
}

/// Element types that can cross into a native routine: `DOUBLE PRECISION`
/// for matrix data and `INTEGER` for pivots and integer workspace.
///
/// # Safety
///
/// The type must be `Copy`, share the layout of the named C type, and be
/// valid when all bytes are zero.
pub unsafe trait FfiSafe: ZeroInit {
    /// The C type name.
    const C_TYPE_NAME: &'static str;
}

unsafe impl FfiSafe for f64 {
    const C_TYPE_NAME: &'static str = "double";
}

unsafe impl FfiSafe for i32 {
    const C_TYPE_NAME: &'static str = "int32_t";
}
