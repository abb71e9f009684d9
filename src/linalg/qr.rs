//! QR decomposition by classical Gram-Schmidt, and least squares on top of it.
use ndarray::{Array1, Array2};
use num_traits::Float;

use crate::error::ModelError;

/// Factor the `lines x columns` matrix `a` as `Q * R`.
///
/// `Q` (same shape as `a`, computed in its buffer) has orthonormal columns,
/// except that columns which vanish during orthogonalization are left as
/// zero. `R` is `columns x columns` upper triangular.
pub fn qr<T: Float>(a: Array2<T>) -> (Array2<T>, Array2<T>) {
    let original = a.clone();
    let mut q = a;
    let (lines, columns) = q.dim();

    for j in 0..columns {
        for k in 0..j {
            let mut s = T::zero();
            for i in 0..lines {
                s = s + original[[i, j]] * q[[i, k]];
            }
            for i in 0..lines {
                q[[i, j]] = q[[i, j]] - s * q[[i, k]];
            }
        }

        let mut s = T::zero();
        for i in 0..lines {
            s = s + q[[i, j]] * q[[i, j]];
        }
        let s = if s * s == T::zero() {
            T::zero()
        } else {
            s.sqrt().recip()
        };
        for i in 0..lines {
            q[[i, j]] = q[[i, j]] * s;
        }
    }

    let mut r = Array2::<T>::zeros((columns, columns));
    for i in 0..columns {
        for j in i..columns {
            let mut acc = T::zero();
            for k in 0..lines {
                acc = acc + q[[k, i]] * original[[k, j]];
            }
            r[[i, j]] = acc;
        }
    }

    (q, r)
}

/// Least-squares solution of `a * x = b`.
///
/// Unknowns whose diagonal entry of `R` vanishes are set to zero. Unlike the
/// SVD route, this does not pick the minimum-norm solution of a rank-deficient
/// system.
pub fn linear_least_squares<T: Float>(a: Array2<T>, b: Array1<T>) -> Result<Array1<T>, ModelError> {
    let (lines, columns) = a.dim();
    if lines == 0 || columns == 0 {
        return Err(ModelError::InvalidArgument("Empty system matrix"));
    }
    if b.len() != lines {
        return Err(ModelError::DimensionMismatch {
            expected: lines,
            found: b.len(),
        });
    }

    let (q, r) = qr(a);

    // x = Q^T b
    let mut x = Array1::<T>::zeros(columns);
    for i in 0..columns {
        let mut s = T::zero();
        for j in 0..lines {
            s = s + q[[j, i]] * b[j];
        }
        x[i] = s;
    }

    // Back substitution through R
    for i in (0..columns).rev() {
        let d = r[[i, i]];
        x[i] = if d * d == T::zero() { T::zero() } else { x[i] / d };
        for j in 0..i {
            x[j] = x[j] - r[[j, i]] * x[i];
        }
    }

    Ok(x)
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_qr_factors() {
        let a = array![[2.0, -1.0, 0.5], [1.0, 3.0, 1.0], [0.0, 1.0, 4.0], [1.0, 0.0, -2.0]];
        let (q, r) = qr(a.clone());

        assert!(max_abs_diff(&q.dot(&r), &a) < 1e-12);
        assert!(max_abs_diff(&q.t().dot(&q), &Array2::eye(3)) < 1e-12);
        for i in 0..3 {
            for j in 0..i {
                assert_eq!(r[[i, j]], 0.0);
            }
        }
    }

    #[test]
    fn test_qr_zero_column() {
        let a = array![[1.0, 0.0, 2.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let (q, r) = qr(a.clone());
        assert!(q.column(1).iter().all(|&v| v == 0.0));
        assert_eq!(r[[1, 1]], 0.0);
        assert!(max_abs_diff(&q.dot(&r), &a) < 1e-12);

        // The matching unknown is pinned to zero
        let x = linear_least_squares(a, array![3.0, 1.0, 1.0]).unwrap();
        assert_eq!(x[1], 0.0);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_least_squares_line_fit() {
        // y = 2 - 3x, sampled without noise
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let a = Array2::from_shape_fn((5, 2), |(i, j)| if j == 0 { 1.0 } else { xs[i] });
        let b = Array1::from_iter(xs.iter().map(|x| 2.0 - 3.0 * x));

        let x = linear_least_squares(a, b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_least_squares_overdetermined() {
        // Mean of inconsistent observations of a single unknown
        let a = array![[1.0], [1.0], [1.0], [1.0]];
        let b = array![1.0, 2.0, 4.0, 5.0];
        let x = linear_least_squares(a, b).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_least_squares_errors() {
        let a = Array2::<f64>::zeros((0, 3));
        assert!(linear_least_squares(a, Array1::zeros(0)).is_err());

        let a = Array2::<f64>::eye(3);
        assert_eq!(
            linear_least_squares(a, Array1::zeros(2)),
            Err(ModelError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
    }
}
