//! Analytic single-pole Green's functions fitted in both domains

use irbasis::{
    giwn_single_pole, gtau_single_pole, BosonicBasis, FermionicBasis, FiniteTempBasis, MatsubaraSampling,
    MatsubaraSamplingOptions, Statistics, StatisticsType, TauSampling,
};

mod common;
use common::{max_abs, max_abs_diff};

struct Fits {
    exact: Vec<f64>,
    from_tau: Vec<f64>,
    from_matsubara: Vec<f64>,
}

fn fit_single_pole<S: StatisticsType>(
    basis: &FiniteTempBasis<S>,
    omega: f64,
    options: MatsubaraSamplingOptions,
) -> Fits {
    let beta = basis.beta();

    let tau = TauSampling::new(basis).unwrap();
    let gtau: Vec<f64> = tau
        .sampling_points()
        .iter()
        .map(|&t| gtau_single_pole(t, omega, beta, S::STATISTICS).unwrap())
        .collect();
    let from_tau = tau.fit(&gtau).unwrap();

    let matsubara = MatsubaraSampling::new(basis, options).unwrap();
    let giwn: Vec<_> = matsubara
        .sampling_points()
        .iter()
        .map(|freq| giwn_single_pole(freq, omega, beta))
        .collect();
    let fitted = matsubara.fit(&giwn).unwrap();
    let scale = max_abs(&from_tau);
    assert!(fitted.iter().all(|z| z.im.abs() < 1e-10 * scale));
    let from_matsubara = fitted.iter().map(|z| z.re).collect();

    Fits {
        exact: basis.single_pole_coefficients(omega).unwrap(),
        from_tau,
        from_matsubara,
    }
}

fn check(fits: &Fits) {
    let scale = max_abs(&fits.exact);
    let cross = max_abs_diff(&fits.from_tau, &fits.from_matsubara);
    assert!(cross < 1e-10 * scale, "τ vs iν: {cross:e} (scale {scale:e})");
    let tau_err = max_abs_diff(&fits.from_tau, &fits.exact);
    assert!(tau_err < 1e-10 * scale, "τ vs exact: {tau_err:e}");
}

#[test]
fn test_fermionic_pole_cross_domain() {
    let basis = FermionicBasis::new(10.0, 2.0, None, None).unwrap();
    check(&fit_single_pole(&basis, 1.0, MatsubaraSamplingOptions::default()));
}

#[test]
fn test_bosonic_pole_cross_domain() {
    let basis = BosonicBasis::new(10.0, 2.0, None, None).unwrap();
    check(&fit_single_pole(&basis, 0.7, MatsubaraSamplingOptions::default()));
}

#[test]
fn test_positive_only_matsubara_fit() {
    let basis = FermionicBasis::new(10.0, 2.0, None, None).unwrap();
    let options = MatsubaraSamplingOptions::default().positive_only(true);
    check(&fit_single_pole(&basis, -0.5, options));
}

#[test]
fn test_statistics_of_sampling() {
    let basis = BosonicBasis::new(1.0, 10.0, Some(1e-6), None).unwrap();
    let matsubara = MatsubaraSampling::new(&basis, MatsubaraSamplingOptions::default()).unwrap();
    assert!(matsubara
        .sampling_points()
        .iter()
        .all(|f| f.statistics() == Statistics::Bosonic && f.n() % 2 == 0));
}
