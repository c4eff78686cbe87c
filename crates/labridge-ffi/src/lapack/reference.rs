//! Pure Rust reference LAPACK.
//!
//! Honours the calling contract of the drivers the bridge uses: argument
//! checks report the same `INFO` positions, `lwork = -1` answers a
//! workspace query, outputs land in the documented buffers with the given
//! leading dimensions. The factorizations themselves are delegated to
//! `nalgebra`.
//!
//! Reported workspace sizes are the documented minimums, so a query for
//! fixed dimensions always answers the same.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_precision_loss, clippy::cast_sign_loss)]

use super::NativeLapack;
use crate::shape::{dim, SvdJob};
use crate::workspace::{gelsd_nlvl, SMLSIZ};
use nalgebra::linalg::ColPivQR;
use nalgebra::{DMatrix, Dyn, SymmetricEigen, SVD};

const QUERY: i32 = -1;

/// Pure Rust implementation of the LAPACK drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceLapack;

impl ReferenceLapack {
    /// Create a new reference backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

// ============================================================================
// Documented minimum workspace sizes
// ============================================================================

/// Minimum `LWORK` for `dgelsd`.
#[must_use]
pub fn gelsd_min_work(m: usize, n: usize, nrhs: usize) -> usize {
    let mn = m.min(n);
    if mn == 0 {
        return 1;
    }
    let nlvl = gelsd_nlvl(mn);
    12 * mn + 2 * mn * SMLSIZ + 8 * mn * nlvl + mn * nrhs + (SMLSIZ + 1) * (SMLSIZ + 1)
}

/// Minimum `LWORK` for `dgelsy`.
#[must_use]
pub fn gelsy_min_work(m: usize, n: usize, nrhs: usize) -> usize {
    let mn = m.min(n);
    if mn == 0 || nrhs == 0 {
        return 1;
    }
    mn + (2 * mn).max(n + 1).max(mn + nrhs)
}

/// Minimum `LWORK` for `dgesdd`.
#[must_use]
pub fn gesdd_min_work(job: SvdJob, m: usize, n: usize) -> usize {
    let (mn, mx) = (m.min(n), m.max(n));
    if mn == 0 {
        return 1;
    }
    match job {
        SvdJob::None => 3 * mn + mx.max(7 * mn),
        SvdJob::Overwrite => 3 * mn + mx.max(5 * mn * mn + 4 * mn),
        SvdJob::Thin => 4 * mn * mn + 7 * mn,
        SvdJob::All => 4 * mn * mn + 6 * mn + mx,
    }
}

/// Minimum `LWORK` for `dgesvd`.
#[must_use]
pub fn gesvd_min_work(m: usize, n: usize) -> usize {
    let (mn, mx) = (m.min(n), m.max(n));
    (3 * mn + mx).max(5 * mn).max(1)
}

/// Minimum `LWORK` and `LIWORK` for `dsyevr`.
#[must_use]
pub fn syevr_min_work(n: usize) -> (usize, usize) {
    ((26 * n).max(1), (10 * n).max(1))
}

// ============================================================================
// Dense helpers
// ============================================================================

fn load(src: &[f64], ld: usize, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |i, j| src[i + j * ld])
}

fn store(dst: &mut [f64], ld: usize, src: &DMatrix<f64>) {
    for j in 0..src.ncols() {
        for i in 0..src.nrows() {
            dst[i + j * ld] = src[(i, j)];
        }
    }
}

fn int_of(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Thin SVD with singular values in descending order.
struct ThinSvd {
    /// `m x min(m, n)`.
    u: DMatrix<f64>,
    s: Vec<f64>,
    /// `min(m, n) x n`.
    vt: DMatrix<f64>,
}

fn thin_svd(a: DMatrix<f64>) -> Option<ThinSvd> {
    let max_niter = 1000.max(50 * a.nrows().max(a.ncols()));
    let svd = SVD::try_new(a, true, true, f64::EPSILON, max_niter)?;
    let (Some(u), Some(vt)) = (svd.u, svd.v_t) else {
        return None;
    };

    let values = svd.singular_values;
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].abs().total_cmp(&values[i].abs()));

    let mut sorted_u = DMatrix::<f64>::zeros(u.nrows(), order.len());
    let mut sorted_vt = DMatrix::<f64>::zeros(order.len(), vt.ncols());
    let mut s = Vec::with_capacity(order.len());
    for (dst, &src) in order.iter().enumerate() {
        let sign = if values[src] < 0.0 { -1.0 } else { 1.0 };
        s.push(values[src].abs());
        sorted_u.set_column(dst, &(u.column(src) * sign));
        sorted_vt.set_row(dst, &vt.row(src));
    }

    Some(ThinSvd {
        u: sorted_u,
        s,
        vt: sorted_vt,
    })
}

/// Extend orthonormal columns to an orthonormal basis of `dim` dimensions.
///
/// The leading columns of the result are `q` itself; the rest come from
/// the QR factorization of `[q | I]`.
fn complete_basis(q: &DMatrix<f64>, dim: usize) -> DMatrix<f64> {
    let k = q.ncols();
    if k >= dim {
        return q.clone();
    }
    let mut stacked = DMatrix::<f64>::zeros(dim, k + dim);
    stacked.view_mut((0, 0), (dim, k)).copy_from(q);
    stacked.view_mut((0, k), (dim, dim)).fill_with_identity();

    let mut basis = stacked.qr().q();
    basis.view_mut((0, 0), (dim, k)).copy_from(q);
    basis
}

/// Column order of a pivoted factorization: column `k` of `A P` is column
/// `perm[k]` of `A`.
fn column_order(qr: &ColPivQR<f64, Dyn, Dyn>, n: usize) -> Vec<usize> {
    let mut index = DMatrix::from_fn(1, n, |_, j| j as f64);
    qr.p().permute_columns(&mut index);
    index.iter().map(|&j| j as usize).collect()
}

/// First and last non-zero entry of an eigenvector, 1-based.
fn support(v: &[f64]) -> (i32, i32) {
    let first = v.iter().position(|&x| x != 0.0).unwrap_or(0);
    let last = v.iter().rposition(|&x| x != 0.0).unwrap_or(v.len().saturating_sub(1));
    (int_of(first + 1), int_of(last + 1))
}

// ============================================================================
// Drivers
// ============================================================================

impl NativeLapack for ReferenceLapack {
    fn name(&self) -> &'static str {
        "Reference (nalgebra)"
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
        _iwork: &mut [i32],
        info: &mut i32,
    ) {
        *info = if m < 0 {
            -1
        } else if n < 0 {
            -2
        } else if nrhs < 0 {
            -3
        } else if lda < m.max(1) {
            -5
        } else if ldb < m.max(n).max(1) {
            -7
        } else {
            0
        };

        if *info == 0 {
            let min_work = gelsd_min_work(dim(m), dim(n), dim(nrhs));
            work[0] = min_work as f64;
            if lwork != QUERY && dim(lwork) < min_work {
                *info = -12;
            }
        }
        if *info != 0 || lwork == QUERY {
            return;
        }

        let (m, n, nrhs) = (dim(m), dim(n), dim(nrhs));
        let (lda, ldb) = (dim(lda), dim(ldb));

        if m == 0 || n == 0 {
            for j in 0..nrhs {
                b[j * ldb..j * ldb + m.max(n)].fill(0.0);
            }
            *rank = 0;
            return;
        }

        let rhs = load(b, ldb, m, nrhs);
        let Some(svd) = thin_svd(load(a, lda, m, n)) else {
            *info = 1;
            return;
        };
        s[..svd.s.len()].copy_from_slice(&svd.s);

        let rcond = if rcond < 0.0 { f64::EPSILON } else { rcond };
        let threshold = rcond * svd.s[0];
        let kept = svd.s.iter().take_while(|&&sv| sv > threshold).count();
        *rank = int_of(kept);

        let mut projected = svd.u.transpose() * rhs;
        for (i, &sv) in svd.s.iter().enumerate() {
            let scale = if i < kept { 1.0 / sv } else { 0.0 };
            projected.row_mut(i).scale_mut(scale);
        }
        let solution = svd.vt.transpose() * projected;
        store(b, ldb, &solution);
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
        *info = if m < 0 {
            -1
        } else if n < 0 {
            -2
        } else if nrhs < 0 {
            -3
        } else if lda < m.max(1) {
            -5
        } else if ldb < m.max(n).max(1) {
            -7
        } else {
            0
        };

        if *info == 0 {
            let min_work = gelsy_min_work(dim(m), dim(n), dim(nrhs));
            work[0] = min_work as f64;
            if lwork != QUERY && dim(lwork) < min_work {
                *info = -12;
            }
        }
        if *info != 0 || lwork == QUERY {
            return;
        }

        let (m, n, nrhs) = (dim(m), dim(n), dim(nrhs));
        let (lda, ldb) = (dim(lda), dim(ldb));

        if m.min(n).min(nrhs) == 0 {
            *rank = 0;
            return;
        }

        let qr = ColPivQR::new(load(a, lda, m, n));
        let mut qtb = load(b, ldb, m, nrhs);
        qr.q_tr_mul(&mut qtb);
        let r = qr.r();
        let perm = column_order(&qr, n);
        for (slot, &col) in jpvt.iter_mut().zip(&perm) {
            *slot = int_of(col + 1);
        }

        let lead = r[(0, 0)].abs();
        let kept = if lead == 0.0 {
            0
        } else {
            (0..m.min(n))
                .take_while(|&i| r[(i, i)].abs() > rcond * lead)
                .count()
        };
        *rank = int_of(kept);

        let mut solution = DMatrix::<f64>::zeros(n, nrhs);
        if kept > 0 {
            // minimum-norm solution of [R11 R12] z = (Q^T b)[..kept]
            let w = r.view((0, 0), (kept, n)).upper_triangle();
            let y = qtb.rows(0, kept).into_owned();
            let gram = &w * w.transpose();
            let t = match gram.clone().cholesky() {
                Some(chol) => chol.solve(&y),
                None => gram.lu().solve(&y).unwrap_or_else(|| DMatrix::<f64>::zeros(kept, nrhs)),
            };
            let z = w.transpose() * t;
            for (k, &col) in perm.iter().enumerate() {
                solution.set_row(col, &z.row(k));
            }
        }
        store(b, ldb, &solution);
        store(a, lda, &r.upper_triangle());
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
        _iwork: &mut [i32],
        info: &mut i32,
    ) {
        let job = SvdJob::from_char(jobz);
        let minmn = m.min(n);
        let wants_u = matches!(job, Some(SvdJob::All | SvdJob::Thin))
            || (job == Some(SvdJob::Overwrite) && m < n);

        *info = if job.is_none() {
            -1
        } else if m < 0 {
            -2
        } else if n < 0 {
            -3
        } else if lda < m.max(1) {
            -5
        } else if ldu < 1 || (wants_u && ldu < m) {
            -8
        } else if ldvt < 1
            || (job == Some(SvdJob::All) && ldvt < n)
            || (job == Some(SvdJob::Thin) && ldvt < minmn)
            || (job == Some(SvdJob::Overwrite) && m >= n && ldvt < n)
        {
            -10
        } else {
            0
        };

        let Some(job) = job.filter(|_| *info == 0) else {
            return;
        };
        let min_work = gesdd_min_work(job, dim(m), dim(n));
        work[0] = min_work as f64;
        if lwork != QUERY && dim(lwork) < min_work {
            *info = -12;
        }
        if *info != 0 || lwork == QUERY {
            return;
        }

        let (m, n) = (dim(m), dim(n));
        let (lda, ldu, ldvt) = (dim(lda), dim(ldu), dim(ldvt));
        if m == 0 || n == 0 {
            return;
        }

        let Some(svd) = thin_svd(load(a, lda, m, n)) else {
            *info = 1;
            return;
        };
        s[..svd.s.len()].copy_from_slice(&svd.s);

        match job {
            SvdJob::None => {}
            SvdJob::Thin => {
                store(u, ldu, &svd.u);
                store(vt, ldvt, &svd.vt);
            }
            SvdJob::All => {
                store(u, ldu, &complete_basis(&svd.u, m));
                store(vt, ldvt, &complete_basis(&svd.vt.transpose(), n).transpose());
            }
            SvdJob::Overwrite if m >= n => {
                store(a, lda, &svd.u);
                store(vt, ldvt, &svd.vt);
            }
            SvdJob::Overwrite => {
                store(u, ldu, &svd.u);
                store(a, lda, &svd.vt);
            }
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
        let job_u = SvdJob::from_char(jobu);
        let job_vt = SvdJob::from_char(jobvt);
        let minmn = m.min(n);

        *info = if job_u.is_none() {
            -1
        } else if job_vt.is_none() || (job_u == Some(SvdJob::Overwrite) && job_vt == Some(SvdJob::Overwrite)) {
            -2
        } else if m < 0 {
            -3
        } else if n < 0 {
            -4
        } else if lda < m.max(1) {
            -6
        } else if ldu < 1 || (matches!(job_u, Some(SvdJob::All | SvdJob::Thin)) && ldu < m) {
            -9
        } else if ldvt < 1
            || (job_vt == Some(SvdJob::All) && ldvt < n)
            || (job_vt == Some(SvdJob::Thin) && ldvt < minmn)
        {
            -11
        } else {
            0
        };

        let (Some(job_u), Some(job_vt)) = (job_u, job_vt) else {
            return;
        };
        if *info != 0 {
            return;
        }
        let min_work = gesvd_min_work(dim(m), dim(n));
        work[0] = min_work as f64;
        if lwork != QUERY && dim(lwork) < min_work {
            *info = -13;
        }
        if *info != 0 || lwork == QUERY {
            return;
        }

        let (m, n) = (dim(m), dim(n));
        let (lda, ldu, ldvt) = (dim(lda), dim(ldu), dim(ldvt));
        if m == 0 || n == 0 {
            return;
        }

        let Some(svd) = thin_svd(load(a, lda, m, n)) else {
            *info = 1;
            return;
        };
        s[..svd.s.len()].copy_from_slice(&svd.s);

        match job_u {
            SvdJob::All => store(u, ldu, &complete_basis(&svd.u, m)),
            SvdJob::Thin => store(u, ldu, &svd.u),
            SvdJob::Overwrite => store(a, lda, &svd.u),
            SvdJob::None => {}
        }
        match job_vt {
            SvdJob::All => store(vt, ldvt, &complete_basis(&svd.vt.transpose(), n).transpose()),
            SvdJob::Thin => store(vt, ldvt, &svd.vt),
            SvdJob::Overwrite => store(a, lda, &svd.vt),
            SvdJob::None => {}
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
        _abstol: f64,
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
        let wantz = jobz.eq_ignore_ascii_case(&b'V');
        let range = range.to_ascii_uppercase();
        let upper = uplo.eq_ignore_ascii_case(&b'U');

        *info = if !wantz && !jobz.eq_ignore_ascii_case(&b'N') {
            -1
        } else if !matches!(range, b'A' | b'V' | b'I') {
            -2
        } else if !upper && !uplo.eq_ignore_ascii_case(&b'L') {
            -3
        } else if n < 0 {
            -4
        } else if lda < n.max(1) {
            -6
        } else if range == b'V' && n > 0 && vu <= vl {
            -8
        } else if range == b'I' && (il < 1 || il > n.max(1)) {
            -9
        } else if range == b'I' && (iu < n.min(il) || iu > n) {
            -10
        } else if ldz < 1 || (wantz && ldz < n) {
            -15
        } else {
            0
        };

        let query = lwork == QUERY || liwork == QUERY;
        if *info == 0 {
            let (min_work, min_iwork) = syevr_min_work(dim(n));
            work[0] = min_work as f64;
            iwork[0] = int_of(min_iwork);
            if !query && dim(lwork) < min_work {
                *info = -18;
            } else if !query && dim(liwork) < min_iwork {
                *info = -20;
            }
        }
        if *info != 0 || query {
            return;
        }

        *m = 0;
        let (n, lda, ldz) = (dim(n), dim(lda), dim(ldz));
        if n == 0 {
            return;
        }

        let matrix = DMatrix::from_fn(n, n, |i, j| {
            let (r, c) = if (i <= j) == upper { (i, j) } else { (j, i) };
            a[r + c * lda]
        });
        let max_niter = 1000.max(50 * n);
        let Some(eigen) = SymmetricEigen::try_new(matrix, f64::EPSILON, max_niter) else {
            *info = 1;
            return;
        };

        let values = &eigen.eigenvalues;
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        let selected: Vec<usize> = match range {
            b'V' => order.into_iter().filter(|&i| values[i] > vl && values[i] <= vu).collect(),
            b'I' => order
                .into_iter()
                .skip(dim(il) - 1)
                .take(dim(iu) + 1 - dim(il))
                .collect(),
            _ => order,
        };

        for (k, &src) in selected.iter().enumerate() {
            w[k] = values[src];
            if wantz {
                let vector: Vec<f64> = eigen.eigenvectors.column(src).iter().copied().collect();
                z[k * ldz..k * ldz + n].copy_from_slice(&vector);
                let (first, last) = support(&vector);
                isuppz[2 * k] = first;
                isuppz[2 * k + 1] = last;
            }
        }
        *m = int_of(selected.len());
    }
}
