use super::*;
use crate::kernel::{KernelProperties, LogisticKernel, RegularizedBoseKernel};
use crate::poly::PiecewiseLegendrePolyVector;

fn check_invariants(sve: &SVEResult, epsilon: f64) {
    assert!(!sve.s.is_empty());
    assert_eq!(sve.u.size(), sve.s.len());
    assert_eq!(sve.v.size(), sve.s.len());
    for w in sve.s.windows(2) {
        assert!(w[0] >= w[1], "singular values not descending: {:?}", sve.s);
    }
    let s0 = sve.s[0];
    for &s in &sve.s {
        assert!(s > 0.0);
        assert!(s / s0 > epsilon, "kept s/s0 = {} below {epsilon}", s / s0);
    }
    for (l, u) in sve.u.iter().enumerate() {
        assert!(u.evaluate(1.0).unwrap() > 0.0, "u_{l}(1) is not positive");
    }
}

fn check_orthonormal(funcs: &PiecewiseLegendrePolyVector, tol: f64) {
    for i in 0..funcs.size() {
        for j in 0..=i {
            let overlap = funcs[i].overlap(|x| funcs[j].evaluate(x).unwrap());
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((overlap - expected).abs() < tol, "<{i}|{j}> = {overlap}");
        }
    }
}

#[test]
fn test_logistic_sve_properties() {
    let eps = 1e-6;
    let sve = compute_sve(LogisticKernel::new(10.0), &SveOptions::default().epsilon(eps)).unwrap();
    check_invariants(&sve, eps);
    assert_eq!(sve.epsilon, eps);
    check_orthonormal(&sve.u, 1e-10);
    check_orthonormal(&sve.v, 1e-10);

    // Singular functions alternate in parity
    for (l, u) in sve.u.iter().enumerate() {
        let expected = if l % 2 == 0 { 1 } else { -1 };
        assert_eq!(u.symm(), expected, "u_{l}");
        for &x in &[0.1, 0.45, 0.8, 1.0] {
            let plus = u.evaluate(x).unwrap();
            let minus = u.evaluate(-x).unwrap();
            assert!((minus - expected as f64 * plus).abs() < 1e-12);
        }
    }
}

#[test]
fn test_logistic_sve_reconstructs_kernel() {
    let kernel = LogisticKernel::new(10.0);
    let sve = compute_sve(kernel, &SveOptions::default().epsilon(1e-8).twork(TworkType::Float64)).unwrap();
    for &x in &[-0.9, -0.3, 0.0, 0.6, 0.95] {
        for &y in &[-0.8, -0.1, 0.2, 0.7] {
            let approx: f64 = (0..sve.len())
                .map(|l| sve.u[l].evaluate(x).unwrap() * sve.s[l] * sve.v[l].evaluate(y).unwrap())
                .sum();
            let exact: f64 = kernel.compute(x, y);
            assert!((approx - exact).abs() < 1e-6, "x={x} y={y}: {approx} vs {exact}");
        }
    }
}

#[test]
fn test_two_pass_agrees_with_direct() {
    let kernel = LogisticKernel::new(10.0);
    let opts = SveOptions::default().epsilon(1e-6).twork(TworkType::Float64);
    let direct = compute_sve(kernel, &opts.clone().svd_strategy(SvdStrategy::Direct)).unwrap();
    let two_pass = compute_sve(kernel, &opts.svd_strategy(SvdStrategy::TwoPass)).unwrap();
    let n = direct.len().min(two_pass.len());
    assert!(n > 5);
    for l in 0..n {
        assert!((direct.s[l] - two_pass.s[l]).abs() < 1e-10 * direct.s[0], "l = {l}");
    }
}

#[test]
fn test_max_num_svals() {
    let kernel = LogisticKernel::new(10.0);
    let full = compute_sve(kernel, &SveOptions::default().epsilon(1e-6)).unwrap();
    let capped = compute_sve(kernel, &SveOptions::default().epsilon(1e-6).max_num_svals(5)).unwrap();
    assert!(full.len() > 5);
    assert_eq!(capped.len(), 5);
    for l in 0..5 {
        assert!((full.s[l] - capped.s[l]).abs() < 1e-14 * full.s[0]);
    }
}

#[test]
fn test_double_double_precision() {
    let kernel = LogisticKernel::new(10.0);
    let coarse = compute_sve(kernel, &SveOptions::default().epsilon(1e-6).twork(TworkType::Float64)).unwrap();
    let fine = compute_sve(kernel, &SveOptions::default().epsilon(1e-12)).unwrap();
    check_invariants(&fine, 1e-12);
    assert!(fine.len() > coarse.len());
    for l in 0..coarse.len() {
        assert!((fine.s[l] - coarse.s[l]).abs() < 1e-8 * fine.s[0], "l = {l}");
    }
    check_orthonormal(&fine.u, 1e-10);
}

#[test]
fn test_regularized_bose_sve() {
    let eps = 1e-6;
    let sve = compute_sve(RegularizedBoseKernel::new(10.0), &SveOptions::default().epsilon(eps)).unwrap();
    check_invariants(&sve, eps);
    check_orthonormal(&sve.v, 1e-10);
}

#[test]
fn test_segments_override_with_own_hints() {
    let kernel = LogisticKernel::new(10.0);
    let opts = SveOptions::default().epsilon(1e-6);
    let own = compute_sve(kernel, &opts).unwrap();
    let overridden = compute_sve(kernel, &opts.clone().segments_override(kernel.sve_hints(1e-6))).unwrap();
    assert_eq!(own.s, overridden.s);
}

#[test]
fn test_epsilon_saturates_at_working_precision() {
    let sve = compute_sve(
        LogisticKernel::new(4.0),
        &SveOptions::default().epsilon(1e-12).twork(TworkType::Float64),
    )
    .unwrap();
    assert_eq!(sve.epsilon, 1e-8);
    check_invariants(&sve, 1e-8);
}

#[test]
fn test_invalid_arguments() {
    assert!(compute_sve(LogisticKernel::new(-1.0), &SveOptions::default()).is_err());
    assert!(compute_sve(LogisticKernel::new(f64::NAN), &SveOptions::default()).is_err());
    assert!(compute_sve(LogisticKernel::new(10.0), &SveOptions::default().epsilon(-1e-6)).is_err());
}
