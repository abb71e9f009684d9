//! Conversions between samples and B-spline coefficients.
//!
//! The forward direction (samples to coefficients) is an exact recursive
//! (IIR) prefilter, one causal and one anticausal first-order pass per pole,
//! initialized for half-sample mirror boundaries. The inverse direction is a
//! short symmetric FIR filter, which is much cheaper than re-evaluating the
//! spline at every grid node.
//!
//! Only the cubic and the septic bases are supported. The septic basis is the
//! "dual" of the cubic one and is used when halving resolution.
use num_traits::Float;

use crate::cast;

pub mod fir;
pub mod recursive;
pub mod separable;

pub use fir::{antisymmetric_fir, coefficients_to_gradient, coefficients_to_samples, symmetric_fir};
pub use recursive::samples_to_coefficients;
pub use separable::{
    cardinal_to_dual_2d, coefficients_to_samples_2d, coefficients_to_xy_gradient_2d,
    dual_to_cardinal_2d, samples_to_coefficients_2d,
};

/// Poles of the cubic B-spline prefilter (sqrt(3) - 2)
const CUBIC_POLES: [f64; 1] = [-0.267_949_192_431_122_7];

/// Poles of the septic B-spline prefilter
const SEPTIC_POLES: [f64; 3] = [
    -0.535_280_430_796_438_165_542_403_781_681_646_071_833_923_152_342_692_414_881_2,
    -0.122_554_615_192_326_690_515_272_264_359_357_343_605_486_549_427_295_558_490_763,
    -0.009_148_694_809_608_276_928_593_021_651_647_853_415_692_563_954_599_448_264_800_3,
];

/// Samples of the cubic B-spline at 0 and 1
const CUBIC_KERNEL: [f64; 2] = [2.0 / 3.0, 1.0 / 6.0];

/// Samples of the septic B-spline at 0, 1, 2 and 3
const SEPTIC_KERNEL: [f64; 4] = [151.0 / 315.0, 397.0 / 1680.0, 1.0 / 42.0, 1.0 / 5040.0];

/// Polynomial degree of a B-spline basis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Degree {
    Cubic,
    Septic,
}

impl Degree {
    /// Polynomial order of the basis.
    pub fn order(self) -> usize {
        match self {
            Degree::Cubic => 3,
            Degree::Septic => 7,
        }
    }

    /// Basis of degree `2 * order + 1`, used as the intermediate
    /// representation while reducing resolution.
    ///
    /// Returns `None` for bases whose dual is not supported.
    pub fn dual(self) -> Option<Degree> {
        match self {
            Degree::Cubic => Some(Degree::Septic),
            Degree::Septic => None,
        }
    }

    /// Poles of the recursive prefilter for this degree.
    pub(crate) fn poles(self) -> &'static [f64] {
        match self {
            Degree::Cubic => &CUBIC_POLES,
            Degree::Septic => &SEPTIC_POLES,
        }
    }

    /// Half of the symmetric sampled-basis kernel (center tap first).
    pub(crate) fn kernel<T: Float>(self) -> ([T; 4], usize) {
        let mut h = [T::zero(); 4];
        let taps: &[f64] = match self {
            Degree::Cubic => &CUBIC_KERNEL,
            Degree::Septic => &SEPTIC_KERNEL,
        };
        for (dst, &src) in h.iter_mut().zip(taps) {
            *dst = cast(src);
        }
        (h, taps.len())
    }
}

/// Linear (degree 1) B-spline.
#[inline]
pub fn bspline01<T: Float>(x: T) -> T {
    let x = x.abs();
    if x < T::one() {
        T::one() - x
    } else {
        T::zero()
    }
}

/// Quadratic (degree 2) B-spline.
#[inline]
pub fn bspline02<T: Float>(x: T) -> T {
    let x = x.abs();
    let half: T = cast(0.5);
    let three_halves: T = cast(1.5);
    if x < half {
        cast::<T>(0.75) - x * x
    } else if x < three_halves {
        let x = x - three_halves;
        half * x * x
    } else {
        T::zero()
    }
}

/// Cubic (degree 3) B-spline.
#[inline]
pub fn bspline03<T: Float>(x: T) -> T {
    let x = x.abs();
    let two: T = cast(2.0);
    if x < T::one() {
        cast::<T>(0.5) * x * x * (x - two) + cast(2.0 / 3.0)
    } else if x < two {
        let x = x - two;
        x * x * x / cast(-6.0)
    } else {
        T::zero()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cubic_partition_of_unity() {
        for k in 0..=20 {
            let t = k as f64 / 20.0;
            let sum: f64 = (-2..=2).map(|i| bspline03(t - i as f64)).sum();
            assert!((sum - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_lower_degree_splines() {
        assert_eq!(bspline01(0.25_f64), 0.75);
        assert_eq!(bspline01(-1.5_f64), 0.0);
        assert!((bspline02(0.0_f64) - 0.75).abs() < 1e-15);
        assert!((bspline02(1.0_f64) - 0.125).abs() < 1e-15);
        assert_eq!(bspline02(2.0_f64), 0.0);
    }

    #[test]
    fn test_kernel_matches_basis() {
        let (h, n) = Degree::Cubic.kernel::<f64>();
        assert_eq!(n, 2);
        assert!((h[0] - bspline03(0.0)).abs() < 1e-15);
        assert!((h[1] - bspline03(1.0)).abs() < 1e-15);

        // Septic kernel integrates to one over the integers
        let (h, n) = Degree::Septic.kernel::<f64>();
        assert_eq!(n, 4);
        let total = h[0] + 2.0 * (h[1] + h[2] + h[3]);
        assert!((total - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_dual_degree() {
        assert_eq!(Degree::Cubic.dual(), Some(Degree::Septic));
        assert_eq!(Degree::Septic.dual(), None);
        assert_eq!(Degree::Cubic.dual().map(|d| d.order()), Some(7));
    }
}
