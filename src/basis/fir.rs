//! Short FIR filters with half-sample mirror boundaries.
use num_traits::Float;

use super::Degree;
use crate::cast;
use crate::error::ModelError;
use crate::utils::fold_mirror;

/// Convolve `c` with the symmetric kernel whose taps at offsets
/// `0, ±1, ±2, ...` are `h[0], h[1], h[2], ...`, writing into `s`.
///
/// Samples beyond either end are mirrored (`c[-1] = c[0]`,
/// `c[n] = c[n - 1]`), repeatedly if the sequence is shorter than the kernel.
pub fn symmetric_fir<T: Float>(h: &[T], c: &[T], s: &mut [T]) -> Result<(), ModelError> {
    check_filter(h, c, s)?;
    convolve(h, c, s, T::one());
    Ok(())
}

/// Convolve `c` with the antisymmetric kernel whose taps at offsets
/// `+k` and `-k` are `h[k]` and `-h[k]`, writing into `s`.
///
/// The center tap `h[0]` is ignored. Boundaries are mirrored as in
/// [`symmetric_fir`], so a length-1 sequence always filters to zero.
pub fn antisymmetric_fir<T: Float>(h: &[T], c: &[T], s: &mut [T]) -> Result<(), ModelError> {
    check_filter(h, c, s)?;
    convolve(h, c, s, -T::one());
    Ok(())
}

/// Sample a 1-D B-spline, in place, at the integer knots.
pub fn coefficients_to_samples<T: Float>(c: &mut [T], degree: Degree) {
    let (h, taps) = degree.kernel::<T>();
    let coefficients = c.to_vec();
    convolve(&h[..taps], &coefficients, c, T::one());
}

/// Replace 1-D cubic B-spline coefficients, in place, by the derivative of
/// the spline at the integer knots.
pub fn coefficients_to_gradient<T: Float>(c: &mut [T]) {
    let h = [T::zero(), cast(0.5)];
    let coefficients = c.to_vec();
    convolve(&h, &coefficients, c, -T::one());
}

fn check_filter<T>(h: &[T], c: &[T], s: &[T]) -> Result<(), ModelError> {
    if h.is_empty() {
        return Err(ModelError::InvalidArgument("Filter kernel must not be empty"));
    }
    if c.len() != s.len() {
        return Err(ModelError::DimensionMismatch {
            expected: c.len(),
            found: s.len(),
        });
    }
    Ok(())
}

/// Mirror-boundary convolution.
///
/// `sign` is the weight of the trailing taps: `+1` for a symmetric kernel,
/// `-1` for an antisymmetric one. The center tap only applies when symmetric.
#[inline]
fn convolve<T: Float>(h: &[T], c: &[T], s: &mut [T], sign: T) {
    let n = c.len();
    let taps = h.len();
    let symmetric = sign > T::zero();

    for i in 0..n {
        let mut acc = if symmetric { h[0] * c[i] } else { T::zero() };

        if i + 1 >= taps && i + taps <= n {
            // Interior: the whole kernel fits
            for k in 1..taps {
                acc = acc + h[k] * (c[i + k] + sign * c[i - k]);
            }
        } else {
            let center = i as isize;
            for k in 1..taps {
                let ahead = c[fold_mirror(center + k as isize, n)];
                let behind = c[fold_mirror(center - k as isize, n)];
                acc = acc + h[k] * (ahead + sign * behind);
            }
        }

        s[i] = acc;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_two_tap_boundaries() {
        let h = [2.0 / 3.0, 1.0 / 6.0];
        let c = [1.0, 2.0, 4.0, 8.0];
        let mut s = [0.0; 4];
        symmetric_fir(&h, &c, &mut s).unwrap();

        assert!((s[0] - (h[0] * c[0] + h[1] * (c[0] + c[1]))).abs() < 1e-12);
        assert!((s[1] - (h[0] * c[1] + h[1] * (c[0] + c[2]))).abs() < 1e-12);
        assert!((s[3] - (h[0] * c[3] + h[1] * (c[2] + c[3]))).abs() < 1e-12);

        let mut s = [0.0; 1];
        symmetric_fir(&h, &c[..1], &mut s).unwrap();
        assert!((s[0] - (h[0] + 2.0 * h[1]) * c[0]).abs() < 1e-12);
    }

    #[test]
    fn test_four_tap_short_sequences() {
        let h = [0.4, 0.2, 0.07, 0.03];

        // Length 2: both neighbors fold back onto the sequence
        let c = [1.0, 3.0];
        let mut s = [0.0; 2];
        symmetric_fir(&h, &c, &mut s).unwrap();
        let a = h[0] + h[1] + h[3];
        let b = h[1] + 2.0 * h[2] + h[3];
        assert!((s[0] - (a * c[0] + b * c[1])).abs() < 1e-12);
        assert!((s[1] - (a * c[1] + b * c[0])).abs() < 1e-12);

        // Length 3, center sample
        let c = [1.0, 3.0, 7.0];
        let mut s = [0.0; 3];
        symmetric_fir(&h, &c, &mut s).unwrap();
        let expected = h[0] * c[1] + (h[1] + h[2]) * (c[0] + c[2]) + 2.0 * h[3] * c[1];
        assert!((s[1] - expected).abs() < 1e-12);

        // Length 1
        let mut s = [0.0; 1];
        symmetric_fir(&h, &c[..1], &mut s).unwrap();
        assert!((s[0] - (h[0] + 2.0 * (h[1] + h[2] + h[3]))).abs() < 1e-12);
    }

    #[test]
    fn test_four_tap_tail() {
        let h = [0.4, 0.2, 0.07, 0.03];
        let c: Vec<f64> = (0..8).map(|i| (i * i) as f64).collect();
        let mut s = vec![0.0; 8];
        symmetric_fir(&h, &c, &mut s).unwrap();

        let n = c.len();
        let last = h[0] * c[n - 1]
            + h[1] * (c[n - 2] + c[n - 1])
            + h[2] * (c[n - 3] + c[n - 2])
            + h[3] * (c[n - 4] + c[n - 3]);
        assert!((s[n - 1] - last).abs() < 1e-12);

        let mid = h[0] * c[4] + h[1] * (c[3] + c[5]) + h[2] * (c[2] + c[6]) + h[3] * (c[1] + c[7]);
        assert!((s[4] - mid).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_of_ramp() {
        let mut c: Vec<f64> = (0..6).map(|i| i as f64).collect();
        coefficients_to_gradient(&mut c);

        // Mirrored ends see half the slope
        assert_eq!(c, vec![0.5, 1.0, 1.0, 1.0, 1.0, 0.5]);

        let mut single = [5.0_f64];
        coefficients_to_gradient(&mut single);
        assert_eq!(single[0], 0.0);
    }

    #[test]
    fn test_antisymmetric_ignores_center() {
        let h = [100.0, 0.5];
        let c = [1.0, 2.0, 4.0];
        let mut s = [0.0; 3];
        antisymmetric_fir(&h, &c, &mut s).unwrap();
        assert_eq!(s, [0.5, 1.5, 1.0]);
    }

    #[test]
    fn test_bad_arguments() {
        let mut s = [0.0; 2];
        assert!(symmetric_fir::<f64>(&[], &[1.0, 2.0], &mut s).is_err());
        assert_eq!(
            symmetric_fir(&[1.0], &[1.0, 2.0, 3.0], &mut s),
            Err(ModelError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
    }
}
