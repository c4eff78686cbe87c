//! Native status codes.
//!
//! LAPACK reports through a single `INFO` integer: zero on success, `-i`
//! when argument `i` had an illegal value, and a positive routine-specific
//! code for numerical failures such as non-convergence. The bridge returns
//! that integer verbatim as a [`LapackStatus`]; [`StatusKind`] and
//! [`LapackError`] classify it without changing it.

use std::fmt;
use thiserror::Error;

/// Integer status reported by a native routine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LapackStatus(i32);

impl LapackStatus {
    /// The success status.
    pub const SUCCESS: Self = Self(0);

    /// Wrap a raw `INFO` value.
    #[inline]
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// Status for an illegal value in 1-based argument `position`.
    #[inline]
    #[must_use]
    pub const fn illegal_argument(position: i32) -> Self {
        Self(-position)
    }

    /// The raw code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Whether the routine succeeded.
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Classify the code.
    #[must_use]
    pub const fn kind(self) -> StatusKind {
        match self.0 {
            0 => StatusKind::Success,
            code if code < 0 => StatusKind::IllegalArgument {
                position: code.unsigned_abs(),
            },
            code => StatusKind::RoutineSpecific(code),
        }
    }

    /// Convert into a `Result`, for callers that prefer `?`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure for any non-zero code.
    pub const fn into_result(self) -> Result<(), LapackError> {
        match self.kind() {
            StatusKind::Success => Ok(()),
            StatusKind::IllegalArgument { position } => {
                Err(LapackError::IllegalArgument { position })
            }
            StatusKind::RoutineSpecific(code) => Err(LapackError::RoutineSpecific(code)),
        }
    }
}

impl From<i32> for LapackStatus {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<LapackStatus> for i32 {
    fn from(status: LapackStatus) -> Self {
        status.0
    }
}

impl fmt::Display for LapackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INFO = {}", self.0)
    }
}

/// Classification of a [`LapackStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    /// The routine completed.
    Success,
    /// An argument had an illegal value.
    IllegalArgument {
        /// 1-based argument position.
        position: u32,
    },
    /// Non-convergence, rank deficiency or another routine-defined failure.
    RoutineSpecific(i32),
}

/// A non-zero status as an error value.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LapackError {
    /// An argument had an illegal value.
    #[error("argument {position} had an illegal value")]
    IllegalArgument {
        /// 1-based argument position.
        position: u32,
    },

    /// The routine reported a numerical failure.
    #[error("routine reported failure code {0}")]
    RoutineSpecific(i32),
}
