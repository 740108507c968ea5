use super::*;
use mdarray::DTensor;
use twofloat::TwoFloat;

fn hilbert<T: CustomNumeric>(n: usize) -> DTensor<T, 2> {
    DTensor::<T, 2>::from_fn([n, n], |idx| T::one() / T::from_f64((idx[0] + idx[1] + 1) as f64))
}

fn max_reconstruction_error<T: CustomNumeric>(a: &DTensor<T, 2>, svd: &SVDResult<T>) -> f64 {
    let (m, n) = *a.shape();
    let mut err = 0.0_f64;
    for i in 0..m {
        for j in 0..n {
            let mut acc = T::zero();
            for l in 0..svd.rank {
                acc = acc + svd.u[[i, l]] * svd.s[l] * svd.v[[j, l]];
            }
            err = err.max((a[[i, j]] - acc).abs().to_f64());
        }
    }
    err
}

fn max_orthogonality_error<T: CustomNumeric>(q: &DTensor<T, 2>) -> f64 {
    let (m, k) = *q.shape();
    let mut err = 0.0_f64;
    for a in 0..k {
        for b in 0..k {
            let mut acc = T::zero();
            for i in 0..m {
                acc = acc + q[[i, a]] * q[[i, b]];
            }
            let target = if a == b { 1.0 } else { 0.0 };
            err = err.max((acc.to_f64() - target).abs());
        }
    }
    err
}

#[test]
fn test_identity() {
    let a = DTensor::<f64, 2>::from_fn([3, 3], |idx| if idx[0] == idx[1] { 1.0 } else { 0.0 });
    let svd = tsvd(&a, 1e-10).unwrap();
    assert_eq!(svd.rank, 3);
    for &s in &svd.s {
        assert!((s - 1.0).abs() < 1e-15);
    }
}

#[test]
fn test_rank_one() {
    let a = DTensor::<f64, 2>::from_elem([3, 4], 1.0);
    let svd = tsvd(&a, 1e-10).unwrap();
    assert_eq!(svd.rank, 1);
    assert!((svd.s[0] - 12.0_f64.sqrt()).abs() < 1e-14);
    assert!(max_reconstruction_error(&a, &svd) < 1e-14);
}

#[test]
fn test_permuted_diagonal() {
    let diag = [3.0, 1.0, 2.0];
    let a = DTensor::<f64, 2>::from_fn([3, 3], |idx| if idx[0] == idx[1] { diag[idx[0]] } else { 0.0 });
    let svd = tsvd(&a, 1e-12).unwrap();
    assert_eq!(svd.s, vec![3.0, 2.0, 1.0]);
    // Second singular vector sits on index 2
    assert!((svd.v[[2, 1]].abs() - 1.0).abs() < 1e-15);
    assert!((svd.u[[2, 1]].abs() - 1.0).abs() < 1e-15);
}

#[test]
fn test_hilbert_f64() {
    let a = hilbert::<f64>(10);
    let svd = tsvd(&a, 1e-15).unwrap();
    assert!(svd.s.windows(2).all(|w| w[0] >= w[1]));
    assert!((svd.s[0] - 1.7519196702651775).abs() < 1e-13);
    assert!(max_reconstruction_error(&a, &svd) < 1e-13);
    assert!(max_orthogonality_error(&svd.u) < 1e-13);
    assert!(max_orthogonality_error(&svd.v) < 1e-13);
}

#[test]
fn test_hilbert_twofloat() {
    let a = hilbert::<TwoFloat>(12);
    let svd = tsvd(&a, TwoFloat::from(1e-28)).unwrap();
    assert_eq!(svd.rank, 12);
    assert!(max_reconstruction_error(&a, &svd) < 1e-26);
    assert!(max_orthogonality_error(&svd.v) < 1e-26);
    // Smallest singular value of the 12x12 Hilbert matrix is ~1.05e-16,
    // below what f64 can resolve
    let smallest = svd.s[11].to_f64();
    assert!((smallest - 1.0479463979622267e-16).abs() < 1e-20);
}

#[test]
fn test_truncation_by_rtol() {
    let a = hilbert::<f64>(12);
    let svd = tsvd(&a, 1e-6).unwrap();
    assert!(svd.rank < 12);
    assert!(svd.rank >= 4);
    assert!(max_reconstruction_error(&a, &svd) < 1e-4);
}

#[test]
fn test_two_pass_matches_direct_for_dominant_values() {
    let a = DTensor::<f64, 2>::from_fn([40, 30], |idx| {
        let x = idx[0] as f64 / 39.0;
        let y = idx[1] as f64 / 29.0;
        (-8.0 * x * y).exp() + 0.1 * (x - y)
    });
    let direct = tsvd(&a, 1e-14).unwrap();
    let two_pass = tsvd_two_pass(&a, 1e-14).unwrap();
    assert!(two_pass.rank >= direct.rank.min(8));
    for l in 0..6 {
        let rel = (direct.s[l] - two_pass.s[l]).abs() / direct.s[0];
        assert!(rel < 1e-13, "l = {l}, rel = {rel}");
    }
    assert!(max_reconstruction_error(&a, &two_pass) < 1e-12);
    assert!(max_orthogonality_error(&two_pass.u) < 1e-12);
}

#[test]
fn test_two_pass_exact_low_rank() {
    // Rank 2: the deflated matrix vanishes and the first pass is kept
    let a = DTensor::<f64, 2>::from_fn([5, 4], |idx| (idx[0] + 1) as f64 * (idx[1] as f64 - 1.5) + 2.0);
    let svd = tsvd_two_pass(&a, 1e-12).unwrap();
    assert!(svd.rank <= 3);
    assert!(max_reconstruction_error(&a, &svd) < 1e-12);
}

/// `exp(-λ x y)` on a uniform grid: numerically low rank
fn exp_kernel<T: CustomNumeric>(m: usize, n: usize, lambda: f64) -> DTensor<T, 2> {
    DTensor::<T, 2>::from_fn([m, n], |idx| {
        let x = T::from_f64(idx[0] as f64 / (m - 1) as f64);
        let y = T::from_f64(idx[1] as f64 / (n - 1) as f64);
        (-(T::from_f64(lambda) * x * y)).exp()
    })
}

#[test]
fn test_truncated_rank_tracks_rtol() {
    let a = exp_kernel::<TwoFloat>(120, 100, 10.0);
    let svd = tsvd(&a, TwoFloat::from(1e-20)).unwrap();
    assert!(svd.rank > 10);
    assert!(svd.rank < 60, "rank {} should stop well short of 100", svd.rank);
    assert!(svd.s.windows(2).all(|w| w[0] >= w[1]));
    assert!(max_reconstruction_error(&a, &svd) < 1e-16);
    assert!(max_orthogonality_error(&svd.u) < 1e-25);
    assert!(max_orthogonality_error(&svd.v) < 1e-25);

    let coarse = tsvd(&a, TwoFloat::from(1e-10)).unwrap();
    assert!(coarse.rank < svd.rank);
    for l in 0..coarse.rank {
        let diff = (coarse.s[l] - svd.s[l]).abs().to_f64();
        assert!(diff < 1e-8 * svd.s[0].to_f64(), "l = {l}");
    }
}

#[test]
fn test_faer_path_matches_jacobi() {
    let a = exp_kernel::<f64>(60, 50, 8.0);
    let jacobi = tsvd(&a, 1e-13).unwrap();
    let faer = tsvd_f64(&a, 1e-13).unwrap();
    let s0 = faer.s[0];
    for l in (0..faer.rank.min(jacobi.rank)).take_while(|&l| faer.s[l] > 1e-8 * s0) {
        assert!((faer.s[l] - jacobi.s[l]).abs() < 1e-12 * s0, "l = {l}");
    }
    assert!(max_reconstruction_error(&a, &faer) < 1e-11);
    assert!(max_orthogonality_error(&faer.u) < 1e-13);

    // f64 input is routed through faer
    let native = tsvd_native(&a, 1e-13).unwrap();
    assert_eq!(native.s, faer.s);
}

#[test]
fn test_native_keeps_double_double() {
    let a = hilbert::<TwoFloat>(12);
    let native = tsvd_native(&a, TwoFloat::from(1e-28)).unwrap();
    let smallest = native.s[11].to_f64();
    assert!((smallest - 1.0479463979622267e-16).abs() < 1e-20);
}

#[test]
fn test_two_pass_in_double_double() {
    let a = exp_kernel::<TwoFloat>(80, 70, 20.0);
    let rtol = TwoFloat::from(1e-22);
    let direct = tsvd(&a, rtol).unwrap();
    let two_pass = tsvd_two_pass(&a, rtol).unwrap();
    let n = direct.rank.min(two_pass.rank);
    assert!(n > 15);
    for l in 0..n {
        let diff = (direct.s[l] - two_pass.s[l]).abs().to_f64();
        assert!(diff < 1e-20 * direct.s[0].to_f64(), "l = {l}");
    }
    assert!(max_reconstruction_error(&a, &two_pass) < 1e-18);
    assert!(max_orthogonality_error(&two_pass.v) < 1e-25);
}

#[test]
fn test_invalid_input() {
    let empty = DTensor::<f64, 2>::from_elem([0, 3], 0.0);
    assert!(matches!(tsvd(&empty, 1e-10), Err(TsvdError::EmptyMatrix { .. })));

    let a = hilbert::<f64>(3);
    assert!(matches!(tsvd(&a, 1.5), Err(TsvdError::InvalidTolerance { .. })));
}

#[test]
fn test_zero_matrix_has_rank_zero() {
    let a = DTensor::<f64, 2>::from_elem([4, 3], 0.0);
    let svd = tsvd(&a, 1e-10).unwrap();
    assert_eq!(svd.rank, 0);
    assert_eq!(*svd.u.shape(), (4, 0));
}
