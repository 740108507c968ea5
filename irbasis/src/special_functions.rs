//! Spherical Bessel functions of the first kind
//!
//! Only integer orders and non-negative arguments are needed: they are the
//! Legendre moments `∫ P_l(x) e^{iwx} dx = 2 i^l j_l(w)` used by the exact
//! Fourier transform of piecewise Legendre polynomials.

/// Below this argument the power series is used
const SERIES_CUTOFF: f64 = 1.0;

/// Extra orders above `max(l, x)` at which the downward recurrence starts
const MILLER_EXTRA_ORDERS: usize = 30;

/// Power series `x^l / (2l+1)!! Σ_k (-x²/2)^k / (k! (2l+3)(2l+5)…(2l+2k+1))`
fn series(l: usize, x: f64) -> f64 {
    let mut prefactor = 1.0;
    for k in 0..l {
        prefactor *= x / (2 * k + 3) as f64;
    }
    let half_x2 = 0.5 * x * x;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..40 {
        term *= -half_x2 / (k as f64 * (2 * l + 2 * k + 1) as f64);
        sum += term;
        if term.abs() < f64::EPSILON * sum.abs() {
            break;
        }
    }
    prefactor * sum
}

fn j0(x: f64) -> f64 {
    x.sin() / x
}

fn j1(x: f64) -> f64 {
    (x.sin() / x - x.cos()) / x
}

/// Upward recurrence, stable for `l <= x`
fn upward(l: usize, x: f64) -> f64 {
    let mut prev = j0(x);
    if l == 0 {
        return prev;
    }
    let mut curr = j1(x);
    for k in 1..l {
        let next = (2 * k + 1) as f64 / x * curr - prev;
        prev = curr;
        curr = next;
    }
    curr
}

/// Miller's downward recurrence, normalized against `j_0` or `j_1`
fn downward(l: usize, x: f64) -> f64 {
    let start = l.max(x.ceil() as usize) + MILLER_EXTRA_ORDERS;
    let mut upper = 0.0;
    let mut curr = 1e-250;
    let mut at_l = 0.0;
    let mut at_1 = 0.0;
    for k in (1..=start).rev() {
        if k == l {
            at_l = curr;
        }
        if k == 1 {
            at_1 = curr;
        }
        let lower = (2 * k + 1) as f64 / x * curr - upper;
        upper = curr;
        curr = lower;
    }
    let at_0 = curr;
    if l == 0 {
        at_l = at_0;
    }

    let (exact0, exact1) = (j0(x), j1(x));
    if exact0.abs() >= exact1.abs() {
        at_l * (exact0 / at_0)
    } else {
        at_l * (exact1 / at_1)
    }
}

/// `j_l(x)` for `x >= 0`
pub fn spherical_bessel_j(l: usize, x: f64) -> f64 {
    debug_assert!(x >= 0.0, "spherical_bessel_j: negative argument {x}");
    if x < SERIES_CUTOFF {
        series(l, x)
    } else if (l as f64) <= x {
        upward(l, x)
    } else {
        downward(l, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j2(x: f64) -> f64 {
        (3.0 / (x * x) - 1.0) * x.sin() / x - 3.0 * x.cos() / (x * x)
    }

    #[test]
    fn test_zero_argument() {
        assert_eq!(spherical_bessel_j(0, 0.0), 1.0);
        for l in 1..10 {
            assert_eq!(spherical_bessel_j(l, 0.0), 0.0);
        }
    }

    #[test]
    fn test_low_orders_against_closed_form() {
        for &x in &[0.3, 0.99, 1.0, 2.5, 7.0, 31.4, 250.0] {
            assert!((spherical_bessel_j(0, x) - j0(x)).abs() < 1e-15, "x = {x}");
            assert!((spherical_bessel_j(1, x) - j1(x)).abs() < 1e-15, "x = {x}");
            // The closed form for j_2 cancels badly below x ~ 1
            if x >= 1.0 {
                assert!((spherical_bessel_j(2, x) - j2(x)).abs() < 1e-14, "x = {x}");
            }
        }
    }

    #[test]
    fn test_reference_values() {
        // j_5(2.0) and j_10(5.0)
        assert!((spherical_bessel_j(5, 2.0) - 2.6351697702441173e-3).abs() < 1e-16);
        assert!((spherical_bessel_j(10, 5.0) - 4.0734424424946043e-4).abs() < 1e-16);
        // j_15(0.5) from the leading series term
        let leading = (0..15).fold(1.0, |acc, k| acc * 0.5 / (2 * k + 3) as f64);
        let value = spherical_bessel_j(15, 0.5);
        assert!((value / leading - 1.0).abs() < 0.005);
    }

    #[test]
    fn test_regimes_join_continuously() {
        // Series/downward boundary and downward/upward boundary
        for l in [3, 8, 15] {
            let below = spherical_bessel_j(l, 1.0 - 1e-12);
            let above = spherical_bessel_j(l, 1.0 + 1e-12);
            assert!((below - above).abs() < 1e-12 * below.abs().max(1e-300) + 1e-25);

            let x = l as f64;
            let below = spherical_bessel_j(l, x - 1e-12);
            let above = spherical_bessel_j(l, x + 1e-12);
            assert!((below - above).abs() < 1e-12, "l = {l}");
        }
    }

    #[test]
    fn test_recurrence_identity() {
        // j_{l-1} + j_{l+1} = (2l+1)/x j_l
        for &x in &[1.5, 4.0, 12.0, 60.0] {
            for l in 1..14 {
                let lhs = spherical_bessel_j(l - 1, x) + spherical_bessel_j(l + 1, x);
                let rhs = (2 * l + 1) as f64 / x * spherical_bessel_j(l, x);
                assert!((lhs - rhs).abs() < 1e-13, "l = {l}, x = {x}");
            }
        }
    }
}
