//! Tests for FiniteTempBasis functionality

use super::*;
use crate::greens::gtau_single_pole;
use crate::kernel::RegularizedBoseKernel;
use approx::assert_relative_eq;

#[test]
fn test_basis_construction() {
    let (beta, wmax, epsilon) = (10.0, 1.0, 1e-6);
    let basis = FermionicBasis::new(beta, wmax, Some(epsilon), None).unwrap();

    assert_eq!(basis.beta(), beta);
    assert_relative_eq!(basis.wmax(), wmax, max_relative = 1e-14);
    assert_relative_eq!(basis.lambda(), 10.0, max_relative = 1e-14);
    assert_eq!(basis.statistics(), Statistics::Fermionic);
    assert!(basis.size() > 0);
    assert_eq!(basis.u().size(), basis.size());
    assert_eq!(basis.v().size(), basis.size());
    assert_eq!(basis.uhat().size(), basis.size());
    assert!(basis.accuracy() > 0.0 && basis.accuracy() < 1e-4);
}

#[test]
fn test_singular_values_descending_and_above_epsilon() {
    let epsilon = 1e-6;
    let basis = BosonicBasis::new(5.0, 4.0, Some(epsilon), None).unwrap();
    let s = basis.s();
    assert!(s.windows(2).all(|w| w[0] >= w[1]));
    assert!(s.iter().all(|&x| x > 0.0));

    let significance = basis.significance();
    assert_eq!(significance.len(), basis.size());
    assert!((significance[0] - 1.0).abs() < 1e-15);
    assert!(significance[basis.size() - 1] >= epsilon);
}

#[test]
fn test_max_size() {
    let basis = FermionicBasis::new(10.0, 1.0, Some(1e-6), Some(5)).unwrap();
    assert_eq!(basis.size(), 5);
    assert!(basis.accuracy() > 1e-6);
}

#[test]
fn test_invalid_parameters() {
    assert!(matches!(
        FermionicBasis::new(-1.0, 1.0, None, None),
        Err(IrError::InvalidParameter { name: "beta", .. })
    ));
    assert!(FermionicBasis::new(0.0, 1.0, None, None).is_err());
    assert!(matches!(
        FermionicBasis::new(1.0, -1.0, None, None),
        Err(IrError::InvalidParameter { name: "wmax", .. })
    ));
    assert!(FermionicBasis::new(1.0, f64::NAN, None, None).is_err());
    assert!(FermionicBasis::new(1.0, 1.0, Some(-1e-6), None).is_err());
    assert!(FermionicBasis::new(1.0, 1.0, Some(1e-6), Some(0)).is_err());
}

#[test]
fn test_shared_sve() {
    let kernel = LogisticKernel::new(20.0);
    let options = SveOptions {
        epsilon: Some(1e-6),
        ..SveOptions::default()
    };
    let sve = Arc::new(compute_sve(kernel.clone(), &options).unwrap());

    let fermionic = FermionicBasis::with_sve(kernel.clone(), 2.0, Arc::clone(&sve), Some(1e-6), None).unwrap();
    let bosonic = BosonicBasis::with_sve(kernel, 2.0, Arc::clone(&sve), Some(1e-6), None).unwrap();
    assert_eq!(Arc::strong_count(&sve), 3);
    assert_eq!(fermionic.s(), bosonic.s());
    assert_relative_eq!(fermionic.wmax(), 10.0, max_relative = 1e-14);
}

#[test]
fn test_tau_points_shared_by_statistics() {
    let (beta, wmax) = (2.0, 5.0);
    let fermionic = FermionicBasis::new(beta, wmax, Some(1e-5), None).unwrap();
    let bosonic = BosonicBasis::new(beta, wmax, Some(1e-5), None).unwrap();
    let tau_f = fermionic.default_tau_sampling_points().unwrap();
    let tau_b = bosonic.default_tau_sampling_points().unwrap();
    assert_eq!(tau_f, tau_b);

    assert!(tau_f.windows(2).all(|w| w[0] < w[1]));
    assert!(tau_f.iter().all(|&t| (0.0..=beta).contains(&t)));

    // Points are symmetric about β/2
    for (a, b) in tau_f.iter().zip(tau_f.iter().rev()) {
        assert!((a + b - beta).abs() < 1e-10);
    }
}

#[test]
fn test_omega_sampling_points() {
    let basis = FermionicBasis::new(2.0, 5.0, Some(1e-5), None).unwrap();
    let omega = basis.default_omega_sampling_points().unwrap();
    assert!(!omega.is_empty());
    assert!(omega.iter().all(|&w| w.abs() <= 5.0));

    let matrix = basis.evaluate_omega(&omega).unwrap();
    assert_eq!(*matrix.shape(), (omega.len(), basis.size()));
    assert_eq!(matrix[[0, 1]], basis.v()[1].evaluate(omega[0]).unwrap());
}

#[test]
fn test_matsubara_points_parity_and_symmetry() {
    let fermionic = FermionicBasis::new(10.0, 4.0, Some(1e-6), None).unwrap();
    let freqs = fermionic.default_matsubara_sampling_points(false, false).unwrap();
    assert!(freqs.iter().all(|f| f.n().rem_euclid(2) == 1));
    let ns: Vec<i64> = freqs.iter().map(|f| f.n()).collect();
    let mirrored: Vec<i64> = ns.iter().rev().map(|n| -n).collect();
    assert_eq!(ns, mirrored);

    let positive = fermionic.default_matsubara_sampling_points(true, false).unwrap();
    assert!(positive.iter().all(|f| f.n() > 0));
    let expected: Vec<i64> = ns.iter().copied().filter(|&n| n > 0).collect();
    assert_eq!(positive.iter().map(|f| f.n()).collect::<Vec<_>>(), expected);

    let bosonic = BosonicBasis::new(10.0, 4.0, Some(1e-6), None).unwrap();
    let freqs = bosonic.default_matsubara_sampling_points(false, false).unwrap();
    assert!(freqs.iter().all(|f| f.n() % 2 == 0));
    assert!(freqs.iter().any(|f| f.n() == 0));
    assert!(freqs.windows(2).all(|w| w[0].n() < w[1].n()));
}

#[test]
fn test_matsubara_mitigation() {
    let basis = FermionicBasis::new(100.0, 10.0, Some(1e-6), None).unwrap();
    assert!(basis.size() >= MITIGATION_MIN_SIZE_INNER);

    let plain: Vec<i64> = basis
        .default_matsubara_sampling_points(false, false)
        .unwrap()
        .iter()
        .map(|f| f.n())
        .collect();
    let mitigated: Vec<i64> = basis
        .default_matsubara_sampling_points(false, true)
        .unwrap()
        .iter()
        .map(|f| f.n())
        .collect();
    assert!(mitigated.len() > plain.len());
    assert!(plain.iter().all(|n| mitigated.contains(n)));
    assert!(mitigated.iter().all(|n| n.rem_euclid(2) == 1));
    assert!(mitigated.windows(2).all(|w| w[0] < w[1]));

    // Extra points stay symmetric
    let mirrored: Vec<i64> = mitigated.iter().rev().map(|n| -n).collect();
    assert_eq!(mitigated, mirrored);
}

#[test]
fn test_mitigation_offsets_mirror_for_negative_frequencies() {
    // 50 odd frequencies ±(6k + 1), far enough apart that no extra point
    // coincides with an existing one
    let mut ns: Vec<i64> = (0..25).map(|k| 6 * k + 1).collect();
    ns.extend(ns.clone().iter().map(|n| -n));
    ns.sort_unstable();
    let freqs: Vec<MatsubaraFreq<Fermionic>> = ns.iter().map(|&n| MatsubaraFreq::new(n).unwrap()).collect();

    // 2 round(0.025 * 145) = 8
    let mitigated: Vec<i64> = mitigate_matsubara_points(freqs.clone(), false)
        .unwrap()
        .iter()
        .map(|f| f.n())
        .collect();
    assert_eq!(mitigated.len(), ns.len() + 4);
    for n in [-153, -137, 137, 153] {
        assert!(mitigated.contains(&n), "missing {n}");
    }
    let mirrored: Vec<i64> = mitigated.iter().rev().map(|n| -n).collect();
    assert_eq!(mitigated, mirrored);

    // Positive half only: 25 points get the inner point but not the outer one
    let positive: Vec<MatsubaraFreq<Fermionic>> = freqs.into_iter().filter(|f| f.n() > 0).collect();
    let mitigated: Vec<i64> = mitigate_matsubara_points(positive, true)
        .unwrap()
        .iter()
        .map(|f| f.n())
        .collect();
    assert_eq!(mitigated.len(), 26);
    assert!(mitigated.contains(&137));
    assert!(!mitigated.contains(&153));
}

#[test]
fn test_single_pole_coefficients() {
    let (beta, wmax, omega) = (10.0, 2.0, 1.0);
    let fermionic = FermionicBasis::new(beta, wmax, Some(1e-8), None).unwrap();
    let bosonic = BosonicBasis::new(beta, wmax, Some(1e-8), None).unwrap();
    let tau: Vec<f64> = (0..=20).map(|i| beta * i as f64 / 20.0).collect();

    let gl = fermionic.single_pole_coefficients(omega).unwrap();
    let u = fermionic.evaluate_tau(&tau).unwrap();
    for (i, &t) in tau.iter().enumerate() {
        let g: f64 = (0..gl.len()).map(|l| u[[i, l]] * gl[l]).sum();
        let exact = gtau_single_pole(t, omega, beta, Statistics::Fermionic).unwrap();
        assert!((g - exact).abs() < 1e-6, "τ = {t}: {g} vs {exact}");
    }

    let gl = bosonic.single_pole_coefficients(omega).unwrap();
    let u = bosonic.evaluate_tau(&tau).unwrap();
    for (i, &t) in tau.iter().enumerate() {
        let g: f64 = (0..gl.len()).map(|l| u[[i, l]] * gl[l]).sum();
        let exact = gtau_single_pole(t, omega, beta, Statistics::Bosonic).unwrap();
        assert!((g - exact).abs() < 1e-6, "τ = {t}: {g} vs {exact}");
    }
}

#[test]
fn test_truncate() {
    let basis = FermionicBasis::new(10.0, 2.0, Some(1e-6), None).unwrap();

    let head = basis.truncate(0..5).unwrap();
    assert_eq!(head.size(), 5);
    assert_eq!(head.s(), &basis.s()[..5]);
    assert!(Arc::ptr_eq(head.sve_result(), basis.sve_result()));
    assert_eq!(head.u()[3].evaluate(1.5).unwrap(), basis.u()[3].evaluate(1.5).unwrap());

    let middle = basis.truncate(2..6).unwrap();
    assert_eq!(middle.size(), 4);
    assert_eq!(middle.s(), &basis.s()[2..6]);
    assert!(!Arc::ptr_eq(middle.sve_result(), basis.sve_result()));

    assert!(basis.truncate(3..3).is_err());
    assert!(basis.truncate(0..basis.size() + 1).is_err());
}

#[test]
fn test_regularized_bose_kernel() {
    let kernel = RegularizedBoseKernel::new(10.0);
    assert!(FiniteTempBasis::<Fermionic, _>::with_kernel(kernel.clone(), 1.0, Some(1e-6), None).is_err());

    let basis = FiniteTempBasis::<Bosonic, _>::with_kernel(kernel, 1.0, Some(1e-6), None).unwrap();
    assert!((basis.wmax() - 10.0).abs() < 1e-14);
    assert!(basis.s().windows(2).all(|w| w[0] >= w[1]));
    let freqs = basis.default_matsubara_sampling_points(false, true).unwrap();
    assert!(freqs.iter().all(|f| f.n() % 2 == 0));
}
