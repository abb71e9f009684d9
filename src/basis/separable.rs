//! Separable 2-D versions of the basis conversions.
//!
//! Each conversion filters every row of a row-major `width x height` buffer
//! and then every column of the result.
use num_traits::Float;

use super::{coefficients_to_gradient, coefficients_to_samples, samples_to_coefficients, Degree};
use crate::error::{check_len, ModelError};

/// Run `rows` over each row, then `columns` over each column, in place.
pub(crate) fn filter_rows_then_columns<T: Float>(
    data: &mut [T],
    width: usize,
    height: usize,
    mut rows: impl FnMut(&mut [T]),
    mut columns: impl FnMut(&mut [T]),
) {
    if width == 0 || height == 0 {
        return;
    }

    data.chunks_exact_mut(width).for_each(&mut rows);

    let mut column = Vec::with_capacity(height);
    for x in 0..width {
        column.clear();
        column.extend(data.iter().skip(x).step_by(width).copied());
        columns(&mut column);
        data.iter_mut()
            .skip(x)
            .step_by(width)
            .zip(&column)
            .for_each(|(dst, &v)| *dst = v);
    }
}

/// B-spline coefficients of a 2-D sampled field.
pub fn samples_to_coefficients_2d<T: Float>(
    samples: &[T],
    width: usize,
    height: usize,
    degree: Degree,
) -> Result<Vec<T>, ModelError> {
    check_len(samples, width, height)?;
    let mut c = samples.to_vec();
    filter_rows_then_columns(
        &mut c,
        width,
        height,
        |line| samples_to_coefficients(line, degree, T::zero()),
        |line| samples_to_coefficients(line, degree, T::zero()),
    );
    Ok(c)
}

/// Samples at the integer knots of a 2-D B-spline, from its coefficients.
pub fn coefficients_to_samples_2d<T: Float>(
    coefficients: &[T],
    width: usize,
    height: usize,
    degree: Degree,
) -> Result<Vec<T>, ModelError> {
    check_len(coefficients, width, height)?;
    let mut s = coefficients.to_vec();
    filter_rows_then_columns(
        &mut s,
        width,
        height,
        |line| coefficients_to_samples(line, degree),
        |line| coefficients_to_samples(line, degree),
    );
    Ok(s)
}

/// Express a sampled field in the dual basis of `degree`.
///
/// The field is interpolated with splines of `degree` and the result is
/// resampled with splines of the dual degree.
pub fn cardinal_to_dual_2d<T: Float>(
    samples: &[T],
    width: usize,
    height: usize,
    degree: Degree,
) -> Result<Vec<T>, ModelError> {
    let dual = dual_of(degree)?;
    let c = samples_to_coefficients_2d(samples, width, height, degree)?;
    coefficients_to_samples_2d(&c, width, height, dual)
}

/// Return from the dual basis of `degree` to plain samples.
pub fn dual_to_cardinal_2d<T: Float>(
    dual_samples: &[T],
    width: usize,
    height: usize,
    degree: Degree,
) -> Result<Vec<T>, ModelError> {
    let dual = dual_of(degree)?;
    let c = samples_to_coefficients_2d(dual_samples, width, height, dual)?;
    coefficients_to_samples_2d(&c, width, height, degree)
}

/// Horizontal and vertical derivatives of a cubic 2-D B-spline at the
/// integer knots, as `(d/dx, d/dy)`.
pub fn coefficients_to_xy_gradient_2d<T: Float>(
    coefficients: &[T],
    width: usize,
    height: usize,
) -> Result<(Vec<T>, Vec<T>), ModelError> {
    check_len(coefficients, width, height)?;

    let mut dx = coefficients.to_vec();
    filter_rows_then_columns(
        &mut dx,
        width,
        height,
        coefficients_to_gradient::<T>,
        |line| coefficients_to_samples(line, Degree::Cubic),
    );

    let mut dy = coefficients.to_vec();
    filter_rows_then_columns(
        &mut dy,
        width,
        height,
        |line| coefficients_to_samples(line, Degree::Cubic),
        coefficients_to_gradient::<T>,
    );

    Ok((dx, dy))
}

fn dual_of(degree: Degree) -> Result<Degree, ModelError> {
    degree
        .dual()
        .ok_or(ModelError::InvalidArgument("No dual basis for this degree"))
}
