//! Workspace planning.
//!
//! LAPACK drivers size their scratch memory through a two-call protocol:
//! the first call only reports the optimal workspace length, the second
//! does the work with a buffer of that length. [`plan`] issues the query,
//! [`execute`] allocates and computes, [`run`] does both.
//!
//! The query sentinel never leaves the adapter layer; routines implement
//! [`WorkspaceRoutine`] and report what they learned as a
//! [`WorkspaceQuery`]. Sizes are recomputed on every call and never cached.

use crate::status::LapackStatus;
use crate::FfiResult;
use labridge_rts_alloc::{Alignment, MemoryRegion, ScratchBlock};

/// Size of the divide-and-conquer base case used by `dgelsd`.
pub const SMLSIZ: usize = 25;

/// Scratch sizes for one routine call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkspaceSize {
    /// `f64` elements of `WORK`.
    pub real: usize,
    /// `i32` elements of `IWORK`.
    pub int: usize,
}

/// How a routine sizes its integer workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntWorkspace {
    /// The routine takes no integer workspace.
    None,
    /// Closed-form length computed by the bridge.
    Fixed(usize),
    /// Length reported by the query call.
    Reported(i32),
}

/// Result of a workspace-size query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkspaceQuery {
    /// Status of the query call.
    pub status: LapackStatus,
    /// Reported optimal `WORK` length.
    pub real: f64,
    /// Integer workspace sizing.
    pub int: IntWorkspace,
}

/// A routine that follows the query-then-compute protocol.
pub trait WorkspaceRoutine {
    /// Routine name, for logging.
    fn name(&self) -> &'static str;

    /// Issue the workspace-size query.
    fn query(&mut self) -> WorkspaceQuery;

    /// Issue the compute call with the allocated workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if a workspace length does not fit a Fortran
    /// integer.
    fn compute(&mut self, workspace: &mut Workspace) -> FfiResult<LapackStatus>;
}

/// Scratch memory for one routine call, freed on drop.
#[derive(Debug)]
pub struct Workspace {
    real: ScratchBlock<f64>,
    int: ScratchBlock<i32>,
}

impl Workspace {
    /// Allocate zero-initialised scratch of exactly `size`. `WORK` starts
    /// on a cache line.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FfiError::AllocationFailed`] if either block cannot
    /// be allocated.
    pub fn allocate(size: WorkspaceSize) -> FfiResult<Self> {
        Ok(Self {
            real: ScratchBlock::zeroed_aligned(size.real, MemoryRegion::Scratch, Alignment::CacheLine)?,
            int: ScratchBlock::zeroed(size.int, MemoryRegion::Scratch)?,
        })
    }

    /// The allocated sizes.
    #[must_use]
    pub const fn size(&self) -> WorkspaceSize {
        WorkspaceSize {
            real: self.real.len(),
            int: self.int.len(),
        }
    }

    /// `WORK`.
    #[must_use]
    pub fn real_mut(&mut self) -> &mut [f64] {
        self.real.as_mut_slice()
    }

    /// `IWORK`.
    #[must_use]
    pub fn int_mut(&mut self) -> &mut [i32] {
        self.int.as_mut_slice()
    }

    /// `WORK` and `IWORK` together.
    #[must_use]
    pub fn parts_mut(&mut self) -> (&mut [f64], &mut [i32]) {
        (self.real.as_mut_slice(), self.int.as_mut_slice())
    }
}

/// Convert a reported floating-point workspace length to an element count.
///
/// The value is truncated; anything below one (including NaN) becomes one.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn workspace_len(reported: f64) -> usize {
    if reported.is_nan() || reported < 1.0 {
        1
    } else {
        reported as usize
    }
}

/// Query a routine for its workspace sizes.
///
/// # Errors
///
/// Returns the query's status if it is non-zero; the compute call must
/// not be issued in that case.
pub fn plan<R: WorkspaceRoutine + ?Sized>(routine: &mut R) -> Result<WorkspaceSize, LapackStatus> {
    let query = routine.query();
    if !query.status.is_success() {
        tracing::debug!(routine = routine.name(), status = query.status.code(), "workspace query failed");
        return Err(query.status);
    }

    let size = WorkspaceSize {
        real: workspace_len(query.real),
        int: match query.int {
            IntWorkspace::None => 0,
            IntWorkspace::Fixed(len) => len,
            IntWorkspace::Reported(len) => usize::try_from(len).unwrap_or(0).max(1),
        },
    };

    tracing::debug!(
        routine = routine.name(),
        real = size.real,
        int = size.int,
        "planned workspace"
    );
    Ok(size)
}

/// Allocate scratch of `size` and issue the compute call.
///
/// # Errors
///
/// Returns [`crate::FfiError::AllocationFailed`] if the scratch cannot be
/// allocated.
pub fn execute<R: WorkspaceRoutine + ?Sized>(routine: &mut R, size: WorkspaceSize) -> FfiResult<LapackStatus> {
    let mut workspace = Workspace::allocate(size)?;
    routine.compute(&mut workspace)
}

/// [`plan`] followed by [`execute`].
///
/// # Errors
///
/// Returns an error if the scratch cannot be allocated. A failed query is
/// not an error: its status is returned as `Ok`.
pub fn run<R: WorkspaceRoutine + ?Sized>(routine: &mut R) -> FfiResult<LapackStatus> {
    match plan(routine) {
        Ok(size) => execute(routine, size),
        Err(status) => Ok(status),
    }
}

/// Number of levels in the `dgelsd` divide-and-conquer tree:
/// `max(0, int(log2(minmn / (SMLSIZ + 1))) + 1)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn gelsd_nlvl(minmn: usize) -> usize {
    if minmn == 0 {
        return 0;
    }
    let levels = (minmn as f64 / (SMLSIZ + 1) as f64).log2() as i64 + 1;
    levels.max(0) as usize
}

/// `IWORK` length for `dgelsd`: `3 * minmn * nlvl + 11 * minmn + 1000`.
#[must_use]
pub fn gelsd_iwork_len(m: usize, n: usize) -> usize {
    let minmn = m.min(n);
    3 * minmn * gelsd_nlvl(minmn) + 11 * minmn + 1000
}

/// `IWORK` length for `dgesdd`: `8 * min(m, n)`.
#[must_use]
pub const fn gesdd_iwork_len(m: usize, n: usize) -> usize {
    8 * if m < n { m } else { n }
}
