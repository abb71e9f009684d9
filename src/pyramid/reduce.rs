//! Halving of resolution in the dual (septic) representation.
//!
//! A cubic spline is reduced by expressing it in the septic dual basis,
//! applying the 5-tap binomial-like filter `[1, 4, 6, 4, 1] / 16` with
//! decimation by two, and converting back. The filter is the least-squares
//! optimal projection onto the coarser cubic spline space.
use num_traits::Float;

use crate::basis::{coefficients_to_samples_2d, samples_to_coefficients_2d, Degree};
use crate::cast;
use crate::error::{check_len, ModelError};

/// Reduce the dual samples `c` by a factor of two into `s`.
///
/// `s` must hold `c.len() / 2` values. Samples beyond either end of `c`
/// are mirrored.
pub fn reduce_dual_1d<T: Float>(c: &[T], s: &mut [T]) -> Result<(), ModelError> {
    if s.len() != c.len() / 2 {
        return Err(ModelError::DimensionMismatch {
            expected: c.len() / 2,
            found: s.len(),
        });
    }

    let h0: T = cast(6.0 / 16.0);
    let h1: T = cast(4.0 / 16.0);
    let h2: T = cast(1.0 / 16.0);

    let n = c.len();
    let m = s.len();

    if m >= 2 {
        s[0] = h0 * c[0] + h1 * (c[0] + c[1]) + h2 * (c[1] + c[2]);
        for j in 1..m - 1 {
            let i = 2 * j;
            s[j] = h0 * c[i] + h1 * (c[i - 1] + c[i + 1]) + h2 * (c[i - 2] + c[i + 2]);
        }
        s[m - 1] = if n == 2 * m {
            h0 * c[n - 2] + h1 * (c[n - 3] + c[n - 1]) + h2 * (c[n - 4] + c[n - 1])
        } else {
            h0 * c[n - 3] + h1 * (c[n - 4] + c[n - 2]) + h2 * (c[n - 5] + c[n - 1])
        };
    } else {
        match n {
            3 => s[0] = h0 * c[0] + h1 * (c[0] + c[1]) + h2 * (c[1] + c[2]),
            2 => s[0] = h0 * c[0] + h1 * (c[0] + c[1]) + (h2 + h2) * c[1],
            _ => {}
        }
    }

    Ok(())
}

/// Reduce a `width x height` array of dual samples to
/// `width / 2 x height / 2`, rows first.
pub fn reduce_dual_2d<T: Float>(
    dual: &[T],
    width: usize,
    height: usize,
) -> Result<Vec<T>, ModelError> {
    check_len(dual, width, height)?;
    let (half_width, half_height) = (width / 2, height / 2);

    let mut rows = vec![T::zero(); half_width * height];
    if half_width > 0 {
        for (src, dst) in dual
            .chunks_exact(width)
            .zip(rows.chunks_exact_mut(half_width))
        {
            reduce_dual_1d(src, dst)?;
        }
    }

    let mut out = vec![T::zero(); half_width * half_height];
    let mut column = Vec::with_capacity(height);
    let mut half = vec![T::zero(); half_height];
    for x in 0..half_width {
        column.clear();
        column.extend(rows.iter().skip(x).step_by(half_width).copied());
        reduce_dual_1d(&column, &mut half)?;
        for (y, &v) in half.iter().enumerate() {
            out[y * half_width + x] = v;
        }
    }

    Ok(out)
}

/// Cubic B-spline coefficients of the half-resolution approximation of the
/// spline with coefficients `c`.
pub fn reduce_coefficients_by_half<T: Float>(
    c: &[T],
    width: usize,
    height: usize,
) -> Result<Vec<T>, ModelError> {
    let full_dual = coefficients_to_samples_2d(c, width, height, Degree::Septic)?;
    let half_dual = reduce_dual_2d(&full_dual, width, height)?;
    samples_to_coefficients_2d(&half_dual, width / 2, height / 2, Degree::Septic)
}
