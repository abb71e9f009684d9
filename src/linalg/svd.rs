//! Singular value decomposition by Householder bidiagonalization followed by
//! implicitly shifted QR sweeps (Golub-Reinsch).
use log::warn;
use ndarray::{Array1, Array2};
use num_traits::Float;

use super::{flt_epsilon, MAX_SVD_ITERATIONS};
use crate::cast;
use crate::error::ModelError;

/// Factors `A = U * diag(w) * V^T` of a `lines x columns` matrix.
///
/// `u` is `lines x columns`, `w` holds `columns` non-negative singular values
/// (unsorted) and `v` is the untransposed `columns x columns` orthogonal factor.
#[derive(Clone, Debug, PartialEq)]
pub struct Svd<T> {
    pub u: Array2<T>,
    pub w: Array1<T>,
    pub v: Array2<T>,
    /// False if some singular value did not converge within
    /// [`MAX_SVD_ITERATIONS`] sweeps; the factors are then incomplete.
    pub converged: bool,
}

/// Pseudo-inverse of a matrix together with its conditioning flags.
#[derive(Clone, Debug, PartialEq)]
pub struct PseudoInverse<T> {
    /// `columns x lines` inverse
    pub inverse: Array2<T>,
    /// Fewer independent rows than unknowns
    pub underconstrained: bool,
    pub converged: bool,
}

/// Singular value decomposition of `a`, computed in the buffer of `a`.
pub fn svd<T: Float>(a: Array2<T>) -> Svd<T> {
    let mut u = a;
    let (lines, columns) = u.dim();
    let mut w = Array1::<T>::zeros(columns);
    let mut v = Array2::<T>::zeros((columns, columns));
    let mut rv1 = vec![T::zero(); columns];

    let zero = T::zero();
    let one = T::one();
    let two: T = cast(2.0);

    // Householder reduction to bidiagonal form
    let (mut g, mut scale, mut norm) = (zero, zero, zero);
    let mut l = 0;
    for i in 0..columns {
        l = i + 1;
        rv1[i] = scale * g;
        g = zero;
        scale = zero;
        let mut s = zero;
        if i < lines {
            for k in i..lines {
                scale = scale + u[[k, i]].abs();
            }
            if scale != zero {
                for k in i..lines {
                    u[[k, i]] = u[[k, i]] / scale;
                    s = s + u[[k, i]] * u[[k, i]];
                }
                let f = u[[i, i]];
                g = if f >= zero { -s.sqrt() } else { s.sqrt() };
                let h = f * g - s;
                u[[i, i]] = f - g;
                for j in l..columns {
                    let mut s = zero;
                    for k in i..lines {
                        s = s + u[[k, i]] * u[[k, j]];
                    }
                    let f = s / h;
                    for k in i..lines {
                        u[[k, j]] = u[[k, j]] + f * u[[k, i]];
                    }
                }
                for k in i..lines {
                    u[[k, i]] = u[[k, i]] * scale;
                }
            }
        }
        w[i] = scale * g;

        g = zero;
        scale = zero;
        let mut s = zero;
        if i < lines && i != columns - 1 {
            for k in l..columns {
                scale = scale + u[[i, k]].abs();
            }
            if scale != zero {
                for k in l..columns {
                    u[[i, k]] = u[[i, k]] / scale;
                    s = s + u[[i, k]] * u[[i, k]];
                }
                let f = u[[i, l]];
                g = if f >= zero { -s.sqrt() } else { s.sqrt() };
                let h = f * g - s;
                u[[i, l]] = f - g;
                for k in l..columns {
                    rv1[k] = u[[i, k]] / h;
                }
                for j in l..lines {
                    let mut s = zero;
                    for k in l..columns {
                        s = s + u[[j, k]] * u[[i, k]];
                    }
                    for k in l..columns {
                        u[[j, k]] = u[[j, k]] + s * rv1[k];
                    }
                }
                for k in l..columns {
                    u[[i, k]] = u[[i, k]] * scale;
                }
            }
        }
        norm = norm.max(w[i].abs() + rv1[i].abs());
    }

    // Accumulation of right-hand transformations
    for i in (0..columns).rev() {
        if i < columns - 1 {
            if g != zero {
                for j in l..columns {
                    v[[j, i]] = u[[i, j]] / (u[[i, l]] * g);
                }
                for j in l..columns {
                    let mut s = zero;
                    for k in l..columns {
                        s = s + u[[i, k]] * v[[k, j]];
                    }
                    if s != zero {
                        for k in l..columns {
                            v[[k, j]] = v[[k, j]] + s * v[[k, i]];
                        }
                    }
                }
            }
            for j in l..columns {
                v[[i, j]] = zero;
                v[[j, i]] = zero;
            }
        }
        v[[i, i]] = one;
        g = rv1[i];
        l = i;
    }

    // Accumulation of left-hand transformations
    for i in (0..lines.min(columns)).rev() {
        let l = i + 1;
        let mut g = w[i];
        for j in l..columns {
            u[[i, j]] = zero;
        }
        if g != zero {
            g = one / g;
            for j in l..columns {
                let mut s = zero;
                for k in l..lines {
                    s = s + u[[k, i]] * u[[k, j]];
                }
                let f = s * g / u[[i, i]];
                if f != zero {
                    for k in i..lines {
                        u[[k, j]] = u[[k, j]] + f * u[[k, i]];
                    }
                }
            }
            for j in i..lines {
                u[[j, i]] = u[[j, i]] * g;
            }
        } else {
            for j in i..lines {
                u[[j, i]] = zero;
            }
        }
        u[[i, i]] = u[[i, i]] + one;
    }

    // Diagonalization of the bidiagonal form
    for k in (0..columns).rev() {
        for its in 1..=MAX_SVD_ITERATIONS {
            // Test for splitting; rv1[0] is always zero
            let mut cancellation = true;
            let mut l = k;
            loop {
                if l == 0 || rv1[l].abs() + norm == norm {
                    cancellation = false;
                    break;
                }
                if w[l - 1].abs() + norm == norm {
                    break;
                }
                l -= 1;
            }

            if cancellation {
                // Cancellation of rv1[l] when w[l - 1] is negligible
                let nm = l - 1;
                let mut c = zero;
                let mut s = one;
                for i in l..=k {
                    let f = s * rv1[i];
                    rv1[i] = rv1[i] * c;
                    if f.abs() + norm == norm {
                        break;
                    }
                    let g = w[i];
                    let h = f.hypot(g);
                    w[i] = h;
                    let h = one / h;
                    c = g * h;
                    s = -f * h;
                    for j in 0..lines {
                        let y = u[[j, nm]];
                        let z = u[[j, i]];
                        u[[j, nm]] = y * c + z * s;
                        u[[j, i]] = z * c - y * s;
                    }
                }
            }

            let z = w[k];
            if l == k {
                // Convergence; make the singular value non-negative
                if z < zero {
                    w[k] = -z;
                    for j in 0..columns {
                        v[[j, k]] = -v[[j, k]];
                    }
                }
                break;
            }
            if its == MAX_SVD_ITERATIONS {
                warn!("No convergence of singular value {k} in {MAX_SVD_ITERATIONS} iterations");
                return Svd {
                    u,
                    w,
                    v,
                    converged: false,
                };
            }

            // Shift from the bottom 2x2 minor
            let mut x = w[l];
            let nm = k - 1;
            let mut y = w[nm];
            let mut g = rv1[nm];
            let mut h = rv1[k];
            let mut f = ((y - z) * (y + z) + (g - h) * (g + h)) / (two * h * y);
            g = f.hypot(one);
            let signed = if f >= zero { g.abs() } else { -g.abs() };
            f = ((x - z) * (x + z) + h * ((y / (f + signed)) - h)) / x;

            // Next QR transformation
            let mut c = one;
            let mut s = one;
            for j in l..=nm {
                let i = j + 1;
                g = rv1[i];
                y = w[i];
                h = s * g;
                g = c * g;
                let mut z = f.hypot(h);
                rv1[j] = z;
                c = f / z;
                s = h / z;
                f = x * c + g * s;
                g = g * c - x * s;
                h = y * s;
                y = y * c;
                for jj in 0..columns {
                    let x = v[[jj, j]];
                    let z = v[[jj, i]];
                    v[[jj, j]] = x * c + z * s;
                    v[[jj, i]] = z * c - x * s;
                }
                z = f.hypot(h);
                w[j] = z;
                if z != zero {
                    z = one / z;
                    c = f * z;
                    s = h * z;
                }
                f = c * g + s * y;
                x = c * y - s * g;
                for jj in 0..lines {
                    let y = u[[jj, j]];
                    let z = u[[jj, i]];
                    u[[jj, j]] = y * c + z * s;
                    u[[jj, i]] = z * c - y * s;
                }
            }
            rv1[l] = zero;
            rv1[k] = f;
            w[k] = x;
        }
    }

    Svd {
        u,
        w,
        v,
        converged: true,
    }
}

/// Solve `U * diag(w) * V^T * x = b` for `x`, dropping the components along
/// singular values below [`FLT_EPSILON`](super::FLT_EPSILON).
pub fn svd_back_substitution<T: Float>(svd: &Svd<T>, b: Array1<T>) -> Result<Array1<T>, ModelError> {
    let (lines, columns) = svd.u.dim();
    if b.len() != lines {
        return Err(ModelError::DimensionMismatch {
            expected: lines,
            found: b.len(),
        });
    }

    let eps = flt_epsilon::<T>();
    let mut aux = Array1::<T>::zeros(columns);
    for i in 0..columns {
        if svd.w[i].abs() > eps {
            let mut s = T::zero();
            for j in 0..lines {
                s = s + svd.u[[j, i]] * b[j];
            }
            aux[i] = s / svd.w[i];
        }
    }

    let mut x = Array1::<T>::zeros(columns);
    for i in 0..columns {
        for j in 0..columns {
            x[i] = x[i] + svd.v[[i, j]] * aux[j];
        }
    }
    Ok(x)
}

/// Pseudo-inverse `V * diag(1/w) * U^T` of a `lines x columns` matrix,
/// with reciprocals of singular values below [`FLT_EPSILON`](super::FLT_EPSILON)
/// replaced by zero.
pub fn invert_svd<T: Float>(b: Array2<T>) -> PseudoInverse<T> {
    let lines = b.nrows();
    let Svd { u, w, mut v, converged } = svd(b);
    let columns = w.len();

    let eps = flt_epsilon::<T>();
    let mut zeros = 0;
    let w_inv = w.mapv(|wk| {
        if wk.abs() < eps {
            zeros += 1;
            T::zero()
        } else {
            wk.recip()
        }
    });
    let underconstrained = lines < zeros + columns;

    for i in 0..columns {
        for j in 0..columns {
            v[[i, j]] = v[[i, j]] * w_inv[j];
        }
    }

    let mut inverse = Array2::<T>::zeros((columns, lines));
    for i in 0..columns {
        for j in 0..lines {
            let mut acc = T::zero();
            for k in 0..columns {
                acc = acc + v[[i, k]] * u[[j, k]];
            }
            inverse[[i, j]] = acc;
        }
    }

    PseudoInverse {
        inverse,
        underconstrained,
        converged,
    }
}
