//! System LAPACK bound through the Fortran ABI.
//!
//! Every argument is passed by pointer and character arguments are single
//! bytes; hidden string-length arguments are omitted, as the C callers of
//! these libraries conventionally do.

use super::NativeLapack;

#[cfg_attr(feature = "openblas", link(name = "openblas"))]
#[cfg_attr(
    all(feature = "accelerate", not(feature = "openblas")),
    link(name = "Accelerate", kind = "framework")
)]
extern "C" {
    fn dgelsd_(
        m: *const i32,
        n: *const i32,
        nrhs: *const i32,
        a: *mut f64,
        lda: *const i32,
        b: *mut f64,
        ldb: *const i32,
        s: *mut f64,
        rcond: *const f64,
        rank: *mut i32,
        work: *mut f64,
        lwork: *const i32,
        iwork: *mut i32,
        info: *mut i32,
    );

    fn dgelsy_(
        m: *const i32,
        n: *const i32,
        nrhs: *const i32,
        a: *mut f64,
        lda: *const i32,
        b: *mut f64,
        ldb: *const i32,
        jpvt: *mut i32,
        rcond: *const f64,
        rank: *mut i32,
        work: *mut f64,
        lwork: *const i32,
        info: *mut i32,
    );

    fn dgesdd_(
        jobz: *const u8,
        m: *const i32,
        n: *const i32,
        a: *mut f64,
        lda: *const i32,
        s: *mut f64,
        u: *mut f64,
        ldu: *const i32,
        vt: *mut f64,
        ldvt: *const i32,
        work: *mut f64,
        lwork: *const i32,
        iwork: *mut i32,
        info: *mut i32,
    );

    fn dgesvd_(
        jobu: *const u8,
        jobvt: *const u8,
        m: *const i32,
        n: *const i32,
        a: *mut f64,
        lda: *const i32,
        s: *mut f64,
        u: *mut f64,
        ldu: *const i32,
        vt: *mut f64,
        ldvt: *const i32,
        work: *mut f64,
        lwork: *const i32,
        info: *mut i32,
    );

    fn dsyevr_(
        jobz: *const u8,
        range: *const u8,
        uplo: *const u8,
        n: *const i32,
        a: *mut f64,
        lda: *const i32,
        vl: *const f64,
        vu: *const f64,
        il: *const i32,
        iu: *const i32,
        abstol: *const f64,
        m: *mut i32,
        w: *mut f64,
        z: *mut f64,
        ldz: *const i32,
        isuppz: *mut i32,
        work: *mut f64,
        lwork: *const i32,
        iwork: *mut i32,
        liwork: *const i32,
        info: *mut i32,
    );
}

/// LAPACK drivers from the linked system library.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLapack;

impl SystemLapack {
    /// Create a new system backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NativeLapack for SystemLapack {
    fn name(&self) -> &'static str {
        if cfg!(feature = "openblas") {
            "OpenBLAS"
        } else {
            "Accelerate"
        }
    }

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
    ) {
        unsafe {
            dgelsd_(
                &m,
                &n,
                &nrhs,
                a.as_mut_ptr(),
                &lda,
                b.as_mut_ptr(),
                &ldb,
                s.as_mut_ptr(),
                &rcond,
                rank,
                work.as_mut_ptr(),
                &lwork,
                iwork.as_mut_ptr(),
                info,
            );
        }
    }

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
    ) {
        unsafe {
            dgelsy_(
                &m,
                &n,
                &nrhs,
                a.as_mut_ptr(),
                &lda,
                b.as_mut_ptr(),
                &ldb,
                jpvt.as_mut_ptr(),
                &rcond,
                rank,
                work.as_mut_ptr(),
                &lwork,
                info,
            );
        }
    }

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
    ) {
        unsafe {
            dgesdd_(
                &jobz,
                &m,
                &n,
                a.as_mut_ptr(),
                &lda,
                s.as_mut_ptr(),
                u.as_mut_ptr(),
                &ldu,
                vt.as_mut_ptr(),
                &ldvt,
                work.as_mut_ptr(),
                &lwork,
                iwork.as_mut_ptr(),
                info,
            );
        }
    }

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
    ) {
        unsafe {
            dgesvd_(
                &jobu,
                &jobvt,
                &m,
                &n,
                a.as_mut_ptr(),
                &lda,
                s.as_mut_ptr(),
                u.as_mut_ptr(),
                &ldu,
                vt.as_mut_ptr(),
                &ldvt,
                work.as_mut_ptr(),
                &lwork,
                info,
            );
        }
    }

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
    ) {
        unsafe {
            dsyevr_(
                &jobz,
                &range,
                &uplo,
                &n,
                a.as_mut_ptr(),
                &lda,
                &vl,
                &vu,
                &il,
                &iu,
                &abstol,
                m,
                w.as_mut_ptr(),
                z.as_mut_ptr(),
                &ldz,
                isuppz.as_mut_ptr(),
                work.as_mut_ptr(),
                &lwork,
                iwork.as_mut_ptr(),
                &liwork,
                info,
            );
        }
    }
}
