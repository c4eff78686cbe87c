//! Numerical behaviour of the bridged operations
//!
//! Every operation runs against the reference backend through the public
//! `Bridge` API, with results checked against direct computation.

use labridge_ffi::{
    layout::{column_major_from_rows, rows_from_column_major},
    Bridge, BridgeConfig, FfiError, LapackStatus, MatrixView, MovableArray, NativeLapack, ReferenceLapack, StatusKind, SvdJob,
    ValidationPolicy,
};

// ============================================================================
// Helpers
// ============================================================================

/// Column-major product of packed `m x k` and `k x n` matrices.
fn product(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut c = vec![0.0; m * n];
    for j in 0..n {
        for i in 0..m {
            c[j * m + i] = (0..k).map(|l| a[l * m + i] * b[j * k + l]).sum();
        }
    }
    c
}

fn transpose(a: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut t = vec![0.0; rows * cols];
    for j in 0..cols {
        for i in 0..rows {
            t[i * cols + j] = a[j * rows + i];
        }
    }
    t
}

fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    let scale = expected.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol * scale,
            "element {}: expected {}, got {}",
            i,
            e,
            a
        );
    }
}

/// A deterministic, well-conditioned test matrix.
fn sample(rows: usize, cols: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..rows * cols)
        .map(|_| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) * 2.0 - 1.0
        })
        .collect()
}

fn diagonally_dominant(order: usize, seed: u64) -> Vec<f64> {
    let mut a = sample(order, order, seed);
    for i in 0..order {
        a[i * order + i] += order as f64 + 1.0;
    }
    a
}

// ============================================================================
// Multiply
// ============================================================================

#[test]
fn test_multiply_concrete_scenario() {
    let bridge = Bridge::reference();
    let mut a = column_major_from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
    let mut b = column_major_from_rows(&[&[7.0, 8.0], &[9.0, 10.0], &[11.0, 12.0]]);
    let mut c = vec![0.0; 4];

    let status = bridge
        .multiply(
            false,
            false,
            1.0,
            MatrixView::new(&mut a, 2, 3),
            MatrixView::new(&mut b, 3, 2),
            0.0,
            MatrixView::new(&mut c, 2, 2),
        )
        .unwrap();

    assert_eq!(status, LapackStatus::SUCCESS);
    assert_eq!(
        rows_from_column_major(&c, 2, 2),
        vec![vec![58.0, 64.0], vec![139.0, 154.0]]
    );
}

#[test]
fn test_multiply_square_matches_product() {
    let bridge = Bridge::reference();
    for n in [1, 4, 17] {
        let mut a = sample(n, n, 1);
        let mut b = sample(n, n, 2);
        let expected = product(&a, &b, n, n, n);
        let mut c = vec![0.0; n * n];

        let status = bridge
            .multiply(
                false,
                false,
                1.0,
                MatrixView::new(&mut a, n, n),
                MatrixView::new(&mut b, n, n),
                0.0,
                MatrixView::new(&mut c, n, n),
            )
            .unwrap();
        assert!(status.is_success());
        assert_close(&c, &expected, 1e-10);
    }
}

#[test]
fn test_multiply_alpha_beta_accumulate() {
    let bridge = Bridge::reference();
    let (m, k, n) = (3, 4, 2);
    let mut a = sample(m, k, 3);
    let mut b = sample(k, n, 4);
    let c0 = sample(m, n, 5);
    let mut c = c0.clone();
    let (alpha, beta) = (2.5, -0.75);

    let ab = product(&a, &b, m, k, n);
    let expected: Vec<f64> = ab.iter().zip(&c0).map(|(p, c)| alpha * p + beta * c).collect();

    let status = bridge
        .multiply(
            false,
            false,
            alpha,
            MatrixView::new(&mut a, m, k),
            MatrixView::new(&mut b, k, n),
            beta,
            MatrixView::new(&mut c, m, n),
        )
        .unwrap();
    assert!(status.is_success());
    assert_close(&c, &expected, 1e-12);
}

#[test]
fn test_multiply_transposed_operands() {
    let bridge = Bridge::reference();
    let (m, k, n) = (3, 5, 2);
    let a = sample(m, k, 6);
    let b = sample(k, n, 7);
    let expected = product(&a, &b, m, k, n);

    // A stored as its k x m transpose, B as its n x k transpose
    let mut at = transpose(&a, m, k);
    let mut bt = transpose(&b, k, n);
    let mut c = vec![0.0; m * n];

    let status = bridge
        .multiply(
            true,
            true,
            1.0,
            MatrixView::new(&mut at, k, m),
            MatrixView::new(&mut bt, n, k),
            0.0,
            MatrixView::new(&mut c, m, n),
        )
        .unwrap();
    assert!(status.is_success());
    assert_close(&c, &expected, 1e-12);
}

#[test]
fn test_multiply_strided_output() {
    let bridge = Bridge::reference();
    let mut a = column_major_from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
    let mut b = column_major_from_rows(&[&[1.0, 0.0], &[0.0, 1.0]]);
    // 2x2 result inside a 3-row buffer; the padding row is untouched
    let mut c = vec![-1.0; 6];

    let status = bridge
        .multiply(
            false,
            false,
            1.0,
            MatrixView::new(&mut a, 2, 2),
            MatrixView::new(&mut b, 2, 2),
            0.0,
            MatrixView::with_leading_dimension(&mut c, 2, 2, 3).unwrap(),
        )
        .unwrap();
    assert!(status.is_success());
    assert_eq!(c, vec![1.0, 3.0, -1.0, 2.0, 4.0, -1.0]);
}

#[test]
fn test_multiply_inner_mismatch_is_status() {
    for validation in [ValidationPolicy::Strict, ValidationPolicy::Native] {
        let bridge = Bridge::new(BridgeConfig::default().with_validation(validation)).unwrap();
        let mut a = sample(2, 3, 8);
        let mut b = sample(2, 2, 9);
        let mut c = vec![0.0; 4];

        let status = bridge
            .multiply(
                false,
                false,
                1.0,
                MatrixView::new(&mut a, 2, 3),
                MatrixView::new(&mut b, 2, 2),
                0.0,
                MatrixView::new(&mut c, 2, 2),
            )
            .unwrap();
        assert!(!status.is_success());
        assert!(matches!(status.kind(), StatusKind::IllegalArgument { .. }));
    }
}

#[test]
fn test_multiply_transposed_mismatch_never_reads_past_b() {
    // op(B) = B^T is 2x2 against K = 3: dgemm would read 3 columns of B^T
    let native = Bridge::new(BridgeConfig::default().with_validation(ValidationPolicy::Native)).unwrap();
    let mut a = sample(2, 3, 10);
    let mut b = MovableArray::new(sample(2, 2, 11));
    let mut c = vec![0.0; 4];

    let err = native
        .multiply(
            false,
            true,
            1.0,
            MatrixView::new(&mut a, 2, 3),
            MatrixView::new(&mut b, 2, 2),
            0.0,
            MatrixView::new(&mut c, 2, 2),
        )
        .unwrap_err();
    assert!(matches!(err, FfiError::SizeMismatch { operand: "B", expected: 6, actual: 4 }));
    assert_eq!(b.pins(), 0);
    assert_eq!(c, vec![0.0; 4]);

    let strict = Bridge::reference();
    let status = strict
        .multiply(
            false,
            true,
            1.0,
            MatrixView::new(&mut a, 2, 3),
            MatrixView::new(&mut b, 2, 2),
            0.0,
            MatrixView::new(&mut c, 2, 2),
        )
        .unwrap();
    assert_eq!(status.code(), -5);
}

#[test]
fn test_multiply_empty_operands_reach_quick_return() {
    let bridge = Bridge::reference();
    let mut a = Vec::<f64>::new();
    let mut b = sample(3, 2, 12);
    let mut c = Vec::<f64>::new();

    let status = bridge
        .multiply(
            false,
            false,
            1.0,
            MatrixView::new(&mut a, 0, 3),
            MatrixView::new(&mut b, 3, 2),
            0.0,
            MatrixView::new(&mut c, 0, 2),
        )
        .unwrap();
    assert!(status.is_success());

    // K = 0 leaves beta * C
    let mut a = Vec::<f64>::new();
    let mut b = Vec::<f64>::new();
    let mut c = vec![1.0, 2.0, 3.0, 4.0];
    let status = bridge
        .multiply(
            false,
            false,
            1.0,
            MatrixView::new(&mut a, 2, 0),
            MatrixView::new(&mut b, 0, 2),
            2.0,
            MatrixView::new(&mut c, 2, 2),
        )
        .unwrap();
    assert!(status.is_success());
    assert_eq!(c, vec![2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn test_svd_of_empty_matrix_accepts_empty_buffers() {
    let bridge = Bridge::reference();
    let mut a = Vec::<f64>::new();
    let mut s = Vec::<f64>::new();
    let mut u = Vec::<f64>::new();
    let mut vt = Vec::<f64>::new();

    let status = bridge
        .svd_divide_and_conquer(
            SvdJob::All,
            MatrixView::new(&mut a, 0, 3),
            &mut s,
            MatrixView::new(&mut u, 0, 0),
            MatrixView::new(&mut vt, 3, 3),
        )
        .unwrap();
    assert!(status.is_success());
}

// ============================================================================
// Least squares
// ============================================================================

#[test]
fn test_least_squares_square_system_is_exact() {
    let bridge = Bridge::reference();
    let (n, nrhs) = (5, 2);
    let a0 = diagonally_dominant(n, 10);
    let b0 = sample(n, nrhs, 11);

    for solver in ["svd", "qr"] {
        let mut a = a0.clone();
        let mut b = b0.clone();
        let mut rank = 0;
        let status = match solver {
            "svd" => bridge.solve_least_squares_svd(
                MatrixView::new(&mut a, n, n),
                MatrixView::new(&mut b, n, nrhs),
                -1.0,
                &mut rank,
            ),
            _ => bridge.solve_least_squares_qr(
                MatrixView::new(&mut a, n, n),
                MatrixView::new(&mut b, n, nrhs),
                1e-10,
                &mut rank,
            ),
        }
        .unwrap();

        assert!(status.is_success(), "{solver}: {status}");
        assert_eq!(rank, n as i32, "{solver}");
        assert_close(&product(&a0, &b, n, n, nrhs), &b0, 1e-9);
    }
}

#[test]
fn test_least_squares_zero_row_is_rank_deficient() {
    let bridge = Bridge::reference();
    let a0 = column_major_from_rows(&[&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0], &[4.0, 0.0, 6.0]]);

    for solver in ["svd", "qr"] {
        let mut a = a0.clone();
        let mut b = vec![1.0, 2.0, 3.0];
        let mut rank = -1;
        let status = match solver {
            "svd" => bridge.solve_least_squares_svd(
                MatrixView::new(&mut a, 3, 3),
                MatrixView::new(&mut b, 3, 1),
                1e-10,
                &mut rank,
            ),
            _ => bridge.solve_least_squares_qr(
                MatrixView::new(&mut a, 3, 3),
                MatrixView::new(&mut b, 3, 1),
                1e-10,
                &mut rank,
            ),
        }
        .unwrap();
        assert!(status.is_success(), "{solver}");
        assert_eq!(rank, 2, "{solver}");
    }

    // a tall matrix with a zero row keeps full column rank
    let tall = column_major_from_rows(&[&[1.0, 2.0], &[0.0, 0.0], &[4.0, 0.0]]);
    let mut a = tall;
    let mut b = vec![1.0; 3];
    let mut rank = 0;
    bridge
        .solve_least_squares_svd(MatrixView::new(&mut a, 3, 2), MatrixView::new(&mut b, 3, 1), 1e-10, &mut rank)
        .unwrap();
    assert_eq!(rank, 2);
}

#[test]
fn test_least_squares_square_zero_row() {
    let bridge = Bridge::reference();
    let mut a = column_major_from_rows(&[&[2.0, 1.0], &[0.0, 0.0]]);
    let mut b = vec![4.0, 0.0];
    let mut rank = -1;

    let status = bridge
        .solve_least_squares_svd(MatrixView::new(&mut a, 2, 2), MatrixView::new(&mut b, 2, 1), 1e-10, &mut rank)
        .unwrap();
    assert!(status.is_success());
    assert_eq!(rank, 1);
    // minimum-norm solution of 2x + y = 4
    assert_close(&b, &[1.6, 0.8], 1e-12);
}

#[test]
fn test_least_squares_wide_system_minimum_norm() {
    let bridge = Bridge::reference();
    for solver in ["svd", "qr"] {
        let mut a = vec![1.0, 1.0]; // 1x2
        let mut b = vec![2.0, 0.0]; // 1x1 with room for the 2-row solution
        let mut rank = 0;
        let b_view = MatrixView::with_leading_dimension(&mut b, 1, 1, 2).unwrap();
        let status = match solver {
            "svd" => bridge.solve_least_squares_svd(MatrixView::new(&mut a, 1, 2), b_view, -1.0, &mut rank),
            _ => bridge.solve_least_squares_qr(MatrixView::new(&mut a, 1, 2), b_view, 1e-10, &mut rank),
        }
        .unwrap();
        assert!(status.is_success(), "{solver}");
        assert_eq!(rank, 1);
        assert_close(&b, &[1.0, 1.0], 1e-12);
    }
}

#[test]
fn test_least_squares_tall_system_fits() {
    let bridge = Bridge::reference();
    // y = 1 + 2t sampled without noise
    let t = [0.0, 1.0, 2.0, 3.0];
    let mut a: Vec<f64> = t.iter().map(|_| 1.0).chain(t.iter().copied()).collect();
    let mut b: Vec<f64> = t.iter().map(|t| 1.0 + 2.0 * t).collect();
    let mut rank = 0;

    let status = bridge
        .solve_least_squares_qr(MatrixView::new(&mut a, 4, 2), MatrixView::new(&mut b, 4, 1), 1e-10, &mut rank)
        .unwrap();
    assert!(status.is_success());
    assert_eq!(rank, 2);
    assert_close(&b[..2], &[1.0, 2.0], 1e-12);
}

// ============================================================================
// Singular value decomposition
// ============================================================================

/// `U[:, :k] * diag(S) * VT[:k, :]` for packed factors.
fn reconstruct(u: &[f64], ldu: usize, s: &[f64], vt: &[f64], ldvt: usize, m: usize, n: usize) -> Vec<f64> {
    let mut a = vec![0.0; m * n];
    for j in 0..n {
        for i in 0..m {
            a[j * m + i] = s
                .iter()
                .enumerate()
                .map(|(l, sv)| u[l * ldu + i] * sv * vt[j * ldvt + l])
                .sum();
        }
    }
    a
}

fn assert_descending_non_negative(s: &[f64]) {
    assert!(s.iter().all(|&v| v >= 0.0), "{s:?}");
    assert!(s.windows(2).all(|w| w[0] >= w[1]), "{s:?}");
}

#[test]
fn test_svd_divide_and_conquer_round_trip() {
    let bridge = Bridge::reference();
    for (m, n) in [(4, 3), (3, 5), (4, 4)] {
        let a0 = sample(m, n, 20);
        let k = m.min(n);

        for job in [SvdJob::All, SvdJob::Thin] {
            let vt_rows = if job == SvdJob::All { n } else { k };
            let u_cols = if job == SvdJob::All { m } else { k };
            let mut a = a0.clone();
            let mut s = vec![0.0; k];
            let mut u = vec![0.0; m * u_cols];
            let mut vt = vec![0.0; vt_rows * n];

            let status = bridge
                .svd_divide_and_conquer(
                    job,
                    MatrixView::new(&mut a, m, n),
                    &mut s,
                    MatrixView::new(&mut u, m, u_cols),
                    MatrixView::new(&mut vt, vt_rows, n),
                )
                .unwrap();
            assert!(status.is_success(), "{job:?} {m}x{n}: {status}");
            assert_descending_non_negative(&s);
            assert_close(&reconstruct(&u, m, &s, &vt, vt_rows, m, n), &a0, 1e-10);
        }
    }
}

#[test]
fn test_svd_overwrite_places_factor_in_a() {
    let bridge = Bridge::reference();
    let (m, n) = (5, 3);
    let a0 = sample(m, n, 21);
    let mut a = a0.clone();
    let mut s = vec![0.0; n];
    let mut u: Vec<f64> = Vec::new();
    let mut vt = vec![0.0; n * n];

    let status = bridge
        .svd_divide_and_conquer(
            SvdJob::Overwrite,
            MatrixView::new(&mut a, m, n),
            &mut s,
            MatrixView::new(&mut u, 0, 0),
            MatrixView::new(&mut vt, n, n),
        )
        .unwrap();
    assert!(status.is_success());
    // A now holds the leading n columns of U
    assert_close(&reconstruct(&a, m, &s, &vt, n, m, n), &a0, 1e-10);
}

#[test]
fn test_svd_values_only() {
    let bridge = Bridge::reference();
    let mut a = column_major_from_rows(&[&[3.0, 0.0], &[0.0, -5.0], &[0.0, 0.0]]);
    let mut s = vec![0.0; 2];
    let mut empty_u: Vec<f64> = Vec::new();
    let mut empty_vt: Vec<f64> = Vec::new();

    let status = bridge
        .svd_divide_and_conquer(
            SvdJob::None,
            MatrixView::new(&mut a, 3, 2),
            &mut s,
            MatrixView::new(&mut empty_u, 0, 0),
            MatrixView::new(&mut empty_vt, 0, 0),
        )
        .unwrap();
    assert!(status.is_success());
    assert_close(&s, &[5.0, 3.0], 1e-12);
}

#[test]
fn test_svd_general_round_trip() {
    let bridge = Bridge::reference();
    let (m, n) = (3, 6);
    let a0 = sample(m, n, 22);
    let mut a = a0.clone();
    let mut s = MovableArray::new(vec![0.0; m]);
    let mut u = vec![0.0; m * m];
    let mut vt = vec![0.0; n * n];

    let status = bridge
        .svd_general(
            SvdJob::All,
            SvdJob::All,
            MatrixView::new(&mut a, m, n),
            &mut s,
            MatrixView::new(&mut u, m, m),
            MatrixView::new(&mut vt, n, n),
        )
        .unwrap();
    assert!(status.is_success());
    assert_descending_non_negative(s.as_slice());
    assert_close(&reconstruct(&u, m, s.as_slice(), &vt, n, m, n), &a0, 1e-10);

    // full V^T is orthogonal
    let vvt = product(&transpose(&vt, n, n), &vt, n, n, n);
    let identity = labridge_ffi::layout::identity(n, n);
    assert_close(&vvt, &identity, 1e-10);
}

#[test]
fn test_svd_general_rejects_double_overwrite() {
    let bridge = Bridge::reference();
    let mut a = sample(3, 3, 23);
    let mut s = vec![0.0; 3];
    let mut u: Vec<f64> = Vec::new();
    let mut vt: Vec<f64> = Vec::new();

    let status = bridge
        .svd_general(
            SvdJob::Overwrite,
            SvdJob::Overwrite,
            MatrixView::new(&mut a, 3, 3),
            &mut s,
            MatrixView::new(&mut u, 0, 0),
            MatrixView::new(&mut vt, 0, 0),
        )
        .unwrap();
    assert_eq!(status.kind(), StatusKind::IllegalArgument { position: 2 });
}

// ============================================================================
// Symmetric eigendecomposition
// ============================================================================

#[test]
fn test_symmetric_eigen_pairs() {
    let bridge = Bridge::reference();
    let n = 4;
    let r = sample(n, n, 30);
    // symmetric: R + R^T
    let a0: Vec<f64> = (0..n * n).map(|idx| r[idx] + r[(idx % n) * n + idx / n]).collect();
    let mut a = a0.clone();
    let mut w = vec![0.0; n];
    let mut z = vec![0.0; n * n];

    let status = bridge
        .symmetric_eigen(MatrixView::new(&mut a, n, n), &mut w, MatrixView::new(&mut z, n, n))
        .unwrap();
    assert!(status.is_success());
    assert!(w.windows(2).all(|p| p[0] <= p[1]), "{w:?}");

    let az = product(&a0, &z, n, n, n);
    for (i, lambda) in w.iter().enumerate() {
        let v = &z[i * n..(i + 1) * n];
        let expected: Vec<f64> = v.iter().map(|x| lambda * x).collect();
        assert_close(&az[i * n..(i + 1) * n], &expected, 1e-10);
    }
}

#[test]
fn test_symmetric_eigen_reads_upper_triangle() {
    let bridge = Bridge::reference();
    // lower triangle holds garbage
    let mut a = vec![2.0, 99.0, 1.0, 2.0];
    let mut w = vec![0.0; 2];
    let mut z = vec![0.0; 4];

    let status = bridge
        .symmetric_eigen(MatrixView::new(&mut a, 2, 2), &mut w, MatrixView::new(&mut z, 2, 2))
        .unwrap();
    assert!(status.is_success());
    assert_close(&w, &[1.0, 3.0], 1e-12);
}

// ============================================================================
// Generalized inverse
// ============================================================================

#[test]
fn test_generalized_inverse_penrose_identity() {
    let bridge = Bridge::reference();
    let (m, n) = (4, 3);
    // rank 2: third column = first + second
    let mut a = sample(m, 2, 40);
    let third: Vec<f64> = (0..m).map(|i| a[i] + a[m + i]).collect();
    a.extend(third);

    let pinv = bridge.generalized_inverse(&a, m, n, None).unwrap();
    assert!(pinv.status.is_success());
    assert_eq!(pinv.rank, 2);
    assert_eq!((pinv.rows, pinv.cols), (n, m));

    let a_pinv = product(&a, &pinv.data, m, n, m);
    let a_pinv_a = product(&a_pinv, &a, m, m, n);
    assert_close(&a_pinv_a, &a, 1e-9);
}

#[test]
fn test_generalized_inverse_of_invertible_matrix() {
    let bridge = Bridge::reference();
    let a = diagonally_dominant(3, 41);
    let pinv = bridge.generalized_inverse(&a, 3, 3, Some(1e-12)).unwrap();
    assert_eq!(pinv.rank, 3);
    assert_close(&product(&a, &pinv.data, 3, 3, 3), &labridge_ffi::layout::identity(3, 3), 1e-10);
}

// ============================================================================
// Workspace queries
// ============================================================================

#[test]
fn test_workspace_query_is_deterministic() {
    let lapack = ReferenceLapack::new();
    let (m, n, nrhs) = (30, 20, 3);
    let mut a = vec![0.0; m * n];
    let mut b = vec![0.0; m * nrhs];
    let mut s = vec![0.0; n];
    let mut rank = 0;
    let mut iwork = vec![0; 1];

    let mut query = || {
        let mut work = [0.0];
        let mut info = 0;
        unsafe {
            lapack.dgelsd(
                m as i32, n as i32, nrhs as i32, &mut a, m as i32, &mut b, m as i32, &mut s, -1.0, &mut rank,
                &mut work, -1, &mut iwork, &mut info,
            );
        }
        assert_eq!(info, 0);
        work[0]
    };

    let first = query();
    assert!(first >= 1.0);
    for _ in 0..3 {
        assert_eq!(query(), first);
    }
}

#[test]
fn test_eigen_workspace_query_reports_both_sizes() {
    let lapack = ReferenceLapack::new();
    let n = 6;
    let mut a = vec![0.0; n * n];
    let mut w = vec![0.0; n];
    let mut z = vec![0.0; n * n];
    let mut isuppz = vec![0; 2 * n];
    let mut work = [0.0];
    let mut iwork = [0];
    let (mut found, mut info) = (0, 0);

    unsafe {
        lapack.dsyevr(
            b'V', b'A', b'U', n as i32, &mut a, n as i32, 0.0, 0.0, 0, 0, 0.0, &mut found, &mut w, &mut z, n as i32,
            &mut isuppz, &mut work, -1, &mut iwork, -1, &mut info,
        );
    }
    assert_eq!(info, 0);
    assert!(work[0] >= 26.0 * n as f64);
    assert!(iwork[0] >= 10 * n as i32);
}
