//! LAPACK adapter.
//!
//! [`NativeLapack`] has one method per driver the bridge calls. Signatures
//! mirror the Fortran routines argument for argument: scalars by value,
//! arrays as slices, `INFO` as an output slot. A method issues exactly one
//! native call; the workspace query is just that call with
//! `lwork = -1`.
//!
//! The query sentinel is only ever written by the call adapters in this
//! module, which implement [`WorkspaceRoutine`] on top of the trait.

pub mod reference;
#[cfg(any(feature = "openblas", feature = "accelerate"))]
pub mod system;

pub use reference::ReferenceLapack;

use crate::shape::EigenParams;
use crate::status::LapackStatus;
use crate::workspace::{IntWorkspace, Workspace, WorkspaceQuery, WorkspaceRoutine};
use crate::{fortran_int, FfiResult};

/// `LWORK` value that turns a driver call into a workspace query.
const WORKSPACE_QUERY: i32 = -1;

/// Native LAPACK drivers used by the bridge.
///
/// All matrices are column-major.
///
/// # Safety
///
/// Every method is `unsafe` because a native implementation trusts the
/// dimensions it is given: for legal arguments, each array must hold at
/// least the number of elements LAPACK documents for it.
#[allow(clippy::too_many_arguments)]
pub trait NativeLapack: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &'static str;

    /// Minimum-norm least squares by divide-and-conquer SVD.
    ///
    /// # Safety
    ///
    /// `a`: `lda * n`; `b`: `ldb * nrhs`; `s`: `min(m, n)`; `work`: `lwork`
    /// (at least one); `iwork`: the documented `LIWORK`.
    unsafe fn dgelsd(
        &self,
        m: i32,
        n: i32,
        nrhs: i32,
        a: &mut [f64],
        lda: i32,
        b: &mut [f64],
        ldb: i32,
        s: &mut [f64],
        rcond: f64,
        rank: &mut i32,
        work: &mut [f64],
        lwork: i32,
        iwork: &mut [i32],
        info: &mut i32,
    );

    /// Minimum-norm least squares by complete orthogonal factorization.
    ///
    /// # Safety
    ///
    /// `a`: `lda * n`; `b`: `ldb * nrhs`; `jpvt`: `n`; `work`: `lwork` (at
    /// least one).
    unsafe fn dgelsy(
        &self,
        m: i32,
        n: i32,
        nrhs: i32,
        a: &mut [f64],
        lda: i32,
        b: &mut [f64],
        ldb: i32,
        jpvt: &mut [i32],
        rcond: f64,
        rank: &mut i32,
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    );

    /// Singular value decomposition by divide and conquer.
    ///
    /// # Safety
    ///
    /// `a`: `lda * n`; `s`: `min(m, n)`; `u` and `vt` as required by
    /// `jobz`; `work`: `lwork` (at least one); `iwork`: `8 * min(m, n)`.
    unsafe fn dgesdd(
        &self,
        jobz: u8,
        m: i32,
        n: i32,
        a: &mut [f64],
        lda: i32,
        s: &mut [f64],
        u: &mut [f64],
        ldu: i32,
        vt: &mut [f64],
        ldvt: i32,
        work: &mut [f64],
        lwork: i32,
        iwork: &mut [i32],
        info: &mut i32,
    );

    /// Singular value decomposition by QR iteration.
    ///
    /// # Safety
    ///
    /// `a`: `lda * n`; `s`: `min(m, n)`; `u` and `vt` as required by `jobu`
    /// and `jobvt`; `work`: `lwork` (at least one).
    unsafe fn dgesvd(
        &self,
        jobu: u8,
        jobvt: u8,
        m: i32,
        n: i32,
        a: &mut [f64],
        lda: i32,
        s: &mut [f64],
        u: &mut [f64],
        ldu: i32,
        vt: &mut [f64],
        ldvt: i32,
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    );

    /// Selected eigenpairs of a symmetric matrix by relatively robust
    /// representations.
    ///
    /// # Safety
    ///
    /// `a`: `lda * n`; `w`: `n`; `z`: `ldz * n` when `jobz = 'V'`;
    /// `isuppz`: `2 * n`; `work`: `lwork`; `iwork`: `liwork` (each at
    /// least one).
    unsafe fn dsyevr(
        &self,
        jobz: u8,
        range: u8,
        uplo: u8,
        n: i32,
        a: &mut [f64],
        lda: i32,
        vl: f64,
        vu: f64,
        il: i32,
        iu: i32,
        abstol: f64,
        m: &mut i32,
        w: &mut [f64],
        z: &mut [f64],
        ldz: i32,
        isuppz: &mut [i32],
        work: &mut [f64],
        lwork: i32,
        iwork: &mut [i32],
        liwork: i32,
        info: &mut i32,
    );
}

// ============================================================================
// Call adapters
// ============================================================================
//
// Each adapter owns the already validated operands of one driver call and
// issues the query and compute calls for the workspace planner. Operand
// sizes are checked by the dispatcher before an adapter is built, which is
// what makes the `unsafe` calls below sound.

/// `dgelsd` with its singular-value scratch and fixed `IWORK`.
pub(crate) struct GelsdCall<'a> {
    pub lapack: &'a dyn NativeLapack,
    pub m: i32,
    pub n: i32,
    pub nrhs: i32,
    pub a: &'a mut [f64],
    pub lda: i32,
    pub b: &'a mut [f64],
    pub ldb: i32,
    pub s: &'a mut [f64],
    pub rcond: f64,
    pub rank: &'a mut i32,
    pub iwork_len: usize,
}

impl WorkspaceRoutine for GelsdCall<'_> {
    fn name(&self) -> &'static str {
        "dgelsd"
    }

    fn query(&mut self) -> WorkspaceQuery {
        let mut work = [0.0];
        let mut iwork = [0];
        let mut info = 0;
        // Safety: operand sizes were validated by the dispatcher
        unsafe {
            self.lapack.dgelsd(
                self.m,
                self.n,
                self.nrhs,
                self.a,
                self.lda,
                self.b,
                self.ldb,
                self.s,
                self.rcond,
                self.rank,
                &mut work,
                WORKSPACE_QUERY,
                &mut iwork,
                &mut info,
            );
        }
        WorkspaceQuery {
            status: info.into(),
            real: work[0],
            int: IntWorkspace::Fixed(self.iwork_len),
        }
    }

    fn compute(&mut self, workspace: &mut Workspace) -> FfiResult<LapackStatus> {
        let (work, iwork) = workspace.parts_mut();
        let lwork = fortran_int(work.len())?;
        let mut info = 0;
        // Safety: operand sizes were validated, workspace has the planned size
        unsafe {
            self.lapack.dgelsd(
                self.m, self.n, self.nrhs, self.a, self.lda, self.b, self.ldb, self.s, self.rcond,
                self.rank, work, lwork, iwork, &mut info,
            );
        }
        Ok(info.into())
    }
}

/// `dgelsy` with its column pivot array.
pub(crate) struct GelsyCall<'a> {
    pub lapack: &'a dyn NativeLapack,
    pub m: i32,
    pub n: i32,
    pub nrhs: i32,
    pub a: &'a mut [f64],
    pub lda: i32,
    pub b: &'a mut [f64],
    pub ldb: i32,
    pub jpvt: &'a mut [i32],
    pub rcond: f64,
    pub rank: &'a mut i32,
}

impl WorkspaceRoutine for GelsyCall<'_> {
    fn name(&self) -> &'static str {
        "dgelsy"
    }

    fn query(&mut self) -> WorkspaceQuery {
        let mut work = [0.0];
        let mut info = 0;
        // Safety: operand sizes were validated by the dispatcher
        unsafe {
            self.lapack.dgelsy(
                self.m,
                self.n,
                self.nrhs,
                self.a,
                self.lda,
                self.b,
                self.ldb,
                self.jpvt,
                self.rcond,
                self.rank,
                &mut work,
                WORKSPACE_QUERY,
                &mut info,
            );
        }
        WorkspaceQuery {
            status: info.into(),
            real: work[0],
            int: IntWorkspace::None,
        }
    }

    fn compute(&mut self, workspace: &mut Workspace) -> FfiResult<LapackStatus> {
        let work = workspace.real_mut();
        let lwork = fortran_int(work.len())?;
        let mut info = 0;
        // Safety: operand sizes were validated, workspace has the planned size
        unsafe {
            self.lapack.dgelsy(
                self.m, self.n, self.nrhs, self.a, self.lda, self.b, self.ldb, self.jpvt, self.rcond,
                self.rank, work, lwork, &mut info,
            );
        }
        Ok(info.into())
    }
}

/// `dgesdd`; only `WORK` is queried, `IWORK` is `8 * min(m, n)`.
pub(crate) struct GesddCall<'a> {
    pub lapack: &'a dyn NativeLapack,
    pub jobz: u8,
    pub m: i32,
    pub n: i32,
    pub a: &'a mut [f64],
    pub lda: i32,
    pub s: &'a mut [f64],
    pub u: &'a mut [f64],
    pub ldu: i32,
    pub vt: &'a mut [f64],
    pub ldvt: i32,
    pub iwork_len: usize,
}

impl WorkspaceRoutine for GesddCall<'_> {
    fn name(&self) -> &'static str {
        "dgesdd"
    }

    fn query(&mut self) -> WorkspaceQuery {
        let mut work = [0.0];
        let mut iwork = [0];
        let mut info = 0;
        // Safety: operand sizes were validated by the dispatcher
        unsafe {
            self.lapack.dgesdd(
                self.jobz,
                self.m,
                self.n,
                self.a,
                self.lda,
                self.s,
                self.u,
                self.ldu,
                self.vt,
                self.ldvt,
                &mut work,
                WORKSPACE_QUERY,
                &mut iwork,
                &mut info,
            );
        }
        WorkspaceQuery {
            status: info.into(),
            real: work[0],
            int: IntWorkspace::Fixed(self.iwork_len),
        }
    }

    fn compute(&mut self, workspace: &mut Workspace) -> FfiResult<LapackStatus> {
        let (work, iwork) = workspace.parts_mut();
        let lwork = fortran_int(work.len())?;
        let mut info = 0;
        // Safety: operand sizes were validated, workspace has the planned size
        unsafe {
            self.lapack.dgesdd(
                self.jobz, self.m, self.n, self.a, self.lda, self.s, self.u, self.ldu, self.vt,
                self.ldvt, work, lwork, iwork, &mut info,
            );
        }
        Ok(info.into())
    }
}

/// `dgesvd`; no integer workspace.
pub(crate) struct GesvdCall<'a> {
    pub lapack: &'a dyn NativeLapack,
    pub jobu: u8,
    pub jobvt: u8,
    pub m: i32,
    pub n: i32,
    pub a: &'a mut [f64],
    pub lda: i32,
    pub s: &'a mut [f64],
    pub u: &'a mut [f64],
    pub ldu: i32,
    pub vt: &'a mut [f64],
    pub ldvt: i32,
}

impl WorkspaceRoutine for GesvdCall<'_> {
    fn name(&self) -> &'static str {
        "dgesvd"
    }

    fn query(&mut self) -> WorkspaceQuery {
        let mut work = [0.0];
        let mut info = 0;
        // Safety: operand sizes were validated by the dispatcher
        unsafe {
            self.lapack.dgesvd(
                self.jobu,
                self.jobvt,
                self.m,
                self.n,
                self.a,
                self.lda,
                self.s,
                self.u,
                self.ldu,
                self.vt,
                self.ldvt,
                &mut work,
                WORKSPACE_QUERY,
                &mut info,
            );
        }
        WorkspaceQuery {
            status: info.into(),
            real: work[0],
            int: IntWorkspace::None,
        }
    }

    fn compute(&mut self, workspace: &mut Workspace) -> FfiResult<LapackStatus> {
        let work = workspace.real_mut();
        let lwork = fortran_int(work.len())?;
        let mut info = 0;
        // Safety: operand sizes were validated, workspace has the planned size
        unsafe {
            self.lapack.dgesvd(
                self.jobu, self.jobvt, self.m, self.n, self.a, self.lda, self.s, self.u, self.ldu,
                self.vt, self.ldvt, work, lwork, &mut info,
            );
        }
        Ok(info.into())
    }
}

/// `dsyevr` for all eigenpairs; both `WORK` and `IWORK` are queried.
pub(crate) struct SyevrCall<'a> {
    pub lapack: &'a dyn NativeLapack,
    pub n: i32,
    pub a: &'a mut [f64],
    pub lda: i32,
    pub w: &'a mut [f64],
    pub z: &'a mut [f64],
    pub ldz: i32,
    pub isuppz: &'a mut [i32],
    pub found: i32,
}

impl WorkspaceRoutine for SyevrCall<'_> {
    fn name(&self) -> &'static str {
        "dsyevr"
    }

    fn query(&mut self) -> WorkspaceQuery {
        let mut work = [0.0];
        let mut iwork = [0];
        let mut info = 0;
        // Safety: operand sizes were validated by the dispatcher
        unsafe {
            self.lapack.dsyevr(
                EigenParams::JOBZ,
                EigenParams::RANGE,
                EigenParams::UPLO,
                self.n,
                self.a,
                self.lda,
                0.0,
                0.0,
                0,
                0,
                0.0,
                &mut self.found,
                self.w,
                self.z,
                self.ldz,
                self.isuppz,
                &mut work,
                WORKSPACE_QUERY,
                &mut iwork,
                WORKSPACE_QUERY,
                &mut info,
            );
        }
        WorkspaceQuery {
            status: info.into(),
            real: work[0],
            int: IntWorkspace::Reported(iwork[0]),
        }
    }

    fn compute(&mut self, workspace: &mut Workspace) -> FfiResult<LapackStatus> {
        let (work, iwork) = workspace.parts_mut();
        let lwork = fortran_int(work.len())?;
        let liwork = fortran_int(iwork.len())?;
        let mut info = 0;
        // Safety: operand sizes were validated, workspace has the planned size
        unsafe {
            self.lapack.dsyevr(
                EigenParams::JOBZ,
                EigenParams::RANGE,
                EigenParams::UPLO,
                self.n,
                self.a,
                self.lda,
                0.0,
                0.0,
                0,
                0,
                0.0,
                &mut self.found,
                self.w,
                self.z,
                self.ldz,
                self.isuppz,
                work,
                lwork,
                iwork,
                liwork,
                &mut info,
            );
        }
        Ok(info.into())
    }
}
