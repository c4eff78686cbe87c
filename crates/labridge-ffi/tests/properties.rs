//! Property tests for multiply, SVD and eigendecomposition.

use labridge_ffi::{Bridge, MatrixView, NativeLapack, ReferenceLapack, SvdJob};
use proptest::prelude::*;

fn matrix(rows: usize, cols: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-10.0f64..10.0, rows * cols)
}

fn dims() -> impl Strategy<Value = (usize, usize, usize)> {
    (1usize..7, 1usize..7, 1usize..7)
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(1.0, |acc: f64, v| acc.max(v.abs()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_multiply_matches_definition(
        ((m, k, n), a, b, c0, alpha, beta) in dims().prop_flat_map(|(m, k, n)| {
            (Just((m, k, n)), matrix(m, k), matrix(k, n), matrix(m, n), -2.0f64..2.0, -2.0f64..2.0)
        })
    ) {
        let bridge = Bridge::reference();
        let (mut a_buf, mut b_buf, mut c) = (a.clone(), b.clone(), c0.clone());

        let status = bridge.multiply(
            false,
            false,
            alpha,
            MatrixView::new(&mut a_buf, m, k),
            MatrixView::new(&mut b_buf, k, n),
            beta,
            MatrixView::new(&mut c, m, n),
        ).unwrap();
        prop_assert!(status.is_success());

        for j in 0..n {
            for i in 0..m {
                let dot: f64 = (0..k).map(|l| a[l * m + i] * b[j * k + l]).sum();
                let expected = alpha * dot + beta * c0[j * m + i];
                prop_assert!((c[j * m + i] - expected).abs() < 1e-9 * (1.0 + expected.abs()));
            }
        }
        // read-only operands are untouched
        prop_assert_eq!(a_buf, a);
        prop_assert_eq!(b_buf, b);
    }

    #[test]
    fn prop_transpose_flag_matches_explicit_transpose(
        ((m, k, n), a, b) in dims().prop_flat_map(|(m, k, n)| {
            (Just((m, k, n)), matrix(m, k), matrix(k, n))
        })
    ) {
        let bridge = Bridge::reference();

        // A stored transposed as k x m
        let mut at: Vec<f64> = (0..m).flat_map(|i| (0..k).map(move |l| (i, l))).map(|(i, l)| a[l * m + i]).collect();
        let mut b_buf = b.clone();
        let mut via_flag = vec![0.0; m * n];
        bridge.multiply(
            true,
            false,
            1.0,
            MatrixView::new(&mut at, k, m),
            MatrixView::new(&mut b_buf, k, n),
            0.0,
            MatrixView::new(&mut via_flag, m, n),
        ).unwrap();

        let mut a_buf = a.clone();
        let mut direct = vec![0.0; m * n];
        bridge.multiply(
            false,
            false,
            1.0,
            MatrixView::new(&mut a_buf, m, k),
            MatrixView::new(&mut b_buf, k, n),
            0.0,
            MatrixView::new(&mut direct, m, n),
        ).unwrap();

        for (x, y) in via_flag.iter().zip(&direct) {
            prop_assert!((x - y).abs() < 1e-9 * (1.0 + y.abs()));
        }
    }

    #[test]
    fn prop_svd_reconstructs_input(
        ((m, n), a) in (1usize..7, 1usize..7).prop_flat_map(|(m, n)| (Just((m, n)), matrix(m, n)))
    ) {
        let bridge = Bridge::reference();
        let kmin = m.min(n);
        let mut work = a.clone();
        let mut s = vec![0.0; kmin];
        let mut u = vec![0.0; m * kmin];
        let mut vt = vec![0.0; kmin * n];

        let status = bridge.svd_divide_and_conquer(
            SvdJob::Thin,
            MatrixView::new(&mut work, m, n),
            &mut s,
            MatrixView::new(&mut u, m, kmin),
            MatrixView::new(&mut vt, kmin, n),
        ).unwrap();
        prop_assert!(status.is_success());
        prop_assert!(s.iter().all(|&v| v >= 0.0));
        prop_assert!(s.windows(2).all(|w| w[0] >= w[1]));

        let scale = max_abs(&a);
        for j in 0..n {
            for i in 0..m {
                let value: f64 = (0..kmin).map(|l| u[l * m + i] * s[l] * vt[j * kmin + l]).sum();
                prop_assert!((value - a[j * m + i]).abs() < 1e-9 * scale);
            }
        }
    }

    #[test]
    fn prop_eigenpairs_satisfy_definition(
        (n, r) in (1usize..7).prop_flat_map(|n| (Just(n), matrix(n, n)))
    ) {
        let bridge = Bridge::reference();
        let a: Vec<f64> = (0..n * n).map(|idx| r[idx] + r[(idx % n) * n + idx / n]).collect();
        let mut work = a.clone();
        let mut w = vec![0.0; n];
        let mut z = vec![0.0; n * n];

        let status = bridge.symmetric_eigen(
            MatrixView::new(&mut work, n, n),
            &mut w,
            MatrixView::new(&mut z, n, n),
        ).unwrap();
        prop_assert!(status.is_success());
        prop_assert!(w.windows(2).all(|p| p[0] <= p[1]));

        let scale = max_abs(&a);
        for (col, lambda) in w.iter().enumerate() {
            for i in 0..n {
                let av: f64 = (0..n).map(|l| a[l * n + i] * z[col * n + l]).sum();
                prop_assert!((av - lambda * z[col * n + i]).abs() < 1e-8 * scale);
            }
        }
    }

    #[test]
    fn prop_svd_workspace_query_is_stable(m in 0usize..40, n in 0usize..40) {
        let lapack = ReferenceLapack::new();
        let kmin = m.min(n);
        let mut a = vec![0.0; m.max(1) * n];
        let mut s = vec![0.0; kmin];
        let mut u = vec![0.0; m.max(1) * m];
        let mut vt = vec![0.0; n.max(1) * n];
        let mut iwork = vec![0; 1];

        let mut query = || {
            let mut work = [0.0];
            let mut info = 0;
            unsafe {
                lapack.dgesdd(
                    b'A', m as i32, n as i32, &mut a, m.max(1) as i32, &mut s, &mut u, m.max(1) as i32,
                    &mut vt, n.max(1) as i32, &mut work, -1, &mut iwork, &mut info,
                );
            }
            (info, work[0])
        };
        let first = query();
        prop_assert_eq!(first.0, 0);
        prop_assert!(first.1 >= 1.0);
        prop_assert_eq!(query(), first);
    }
}
