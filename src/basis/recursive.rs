//! Recursive prefilter from samples to B-spline coefficients.
use num_traits::{Float, NumCast};

use super::Degree;
use crate::cast;

/// Replace a 1-D sequence of samples, in place, by the B-spline coefficients
/// that interpolate them under half-sample mirror boundary conditions.
///
/// For each pole `z` of the basis, the sequence is multiplied by the gain
/// `(1 - z)(1 - 1/z)` and then run through one causal and one anticausal
/// first-order recursion. A `tolerance` of zero uses the exact (full-length)
/// causal initialization; a positive tolerance truncates the initialization
/// sum once `|z|^k` falls below it.
///
/// Sequences of length 0 or 1 are left unchanged.
pub fn samples_to_coefficients<T: Float>(c: &mut [T], degree: Degree, tolerance: T) {
    let n = c.len();
    if n <= 1 {
        return;
    }

    let poles = degree.poles();

    let mut lambda = T::one();
    for &z in poles {
        let z: T = cast(z);
        lambda = lambda * (T::one() - z) * (T::one() - z.recip());
    }
    c.iter_mut().for_each(|v| *v = *v * lambda);

    for &z in poles {
        let z: T = cast(z);

        // Causal
        c[0] = initial_causal(c, z, tolerance);
        for k in 1..n {
            c[k] = c[k] + z * c[k - 1];
        }

        // Anticausal
        c[n - 1] = initial_anticausal(c, z);
        for k in (0..n - 1).rev() {
            c[k] = z * (c[k + 1] - c[k]);
        }
    }
}

/// Initial value of the causal recursion for a mirror-extended sequence.
///
/// Sums the first `horizon` terms of the period-`2n` symmetric extension
/// and divides by the geometric correction `1 - z^(2n)`.
fn initial_causal<T: Float>(c: &[T], z: T, tolerance: T) -> T {
    let n = c.len();
    let len = n as i32;

    let mut z1 = z;
    let mut zn = z.powi(len);
    let mut sum = (T::one() + z) * (c[0] + zn * c[n - 1]);

    let mut horizon = n;
    if tolerance > T::zero() {
        let terms = (tolerance.ln() / z.abs().ln()).trunc();
        horizon = <usize as NumCast>::from(terms)
            .map_or(n, |k| k.saturating_add(2))
            .min(n);
    }

    zn = zn * zn;
    for k in 1..horizon.saturating_sub(1) {
        z1 = z1 * z;
        zn = zn / z;
        sum = sum + (z1 + zn) * c[k];
    }

    sum / (T::one() - z.powi(2 * len))
}

/// Initial value of the anticausal recursion for a mirror-extended sequence.
#[inline]
fn initial_anticausal<T: Float>(c: &[T], z: T) -> T {
    z * c[c.len() - 1] / (z - T::one())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::basis::coefficients_to_samples;
    use crate::testing::{randn, rng_fixed_seed};

    #[test]
    fn test_cubic_round_trip() {
        let mut rng = rng_fixed_seed();
        for n in [2, 3, 4, 5, 7, 16, 33] {
            let samples: Vec<f64> = randn(&mut rng, n);
            let mut c = samples.clone();
            samples_to_coefficients(&mut c, Degree::Cubic, 0.0);
            coefficients_to_samples(&mut c, Degree::Cubic);
            for (a, b) in samples.iter().zip(&c) {
                assert!((a - b).abs() < 1e-10, "n={n}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_septic_round_trip() {
        let mut rng = rng_fixed_seed();
        for n in [6, 9, 20] {
            let samples: Vec<f64> = randn(&mut rng, n);
            let mut c = samples.clone();
            samples_to_coefficients(&mut c, Degree::Septic, 0.0);
            coefficients_to_samples(&mut c, Degree::Septic);
            for (a, b) in samples.iter().zip(&c) {
                assert!((a - b).abs() < 1e-9, "n={n}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_constant_is_preserved() {
        // The cubic kernel sums to one, so a constant is its own coefficient
        let mut c = vec![3.5_f64; 12];
        samples_to_coefficients(&mut c, Degree::Cubic, 0.0);
        for v in c {
            assert!((v - 3.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_truncated_initialization() {
        let mut rng = rng_fixed_seed();
        let samples: Vec<f64> = randn(&mut rng, 64);

        let mut exact = samples.clone();
        samples_to_coefficients(&mut exact, Degree::Cubic, 0.0);
        let mut truncated = samples.clone();
        samples_to_coefficients(&mut truncated, Degree::Cubic, 1e-12);

        for (a, b) in exact.iter().zip(&truncated) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_sequences_untouched() {
        let mut empty: Vec<f64> = vec![];
        samples_to_coefficients(&mut empty, Degree::Cubic, 0.0);
        assert!(empty.is_empty());

        let mut single = vec![4.0_f64];
        samples_to_coefficients(&mut single, Degree::Septic, 0.0);
        assert_eq!(single, vec![4.0]);
    }
}
