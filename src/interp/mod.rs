//! Cubic B-spline evaluation at arbitrary real coordinates.
//!
//! Evaluation is split into two steps. [`CoefficientGrid::prepare`] computes,
//! for each axis, the four contributing coefficient indices (folded into range)
//! and the value, first-derivative and second-derivative weights of the cubic
//! basis. The resulting [`Neighborhood`] is then consumed by the 16-term gathers
//! [`CoefficientGrid::value`], [`CoefficientGrid::gradient`] and
//! [`CoefficientGrid::hessian`].
//!
//! Neighborhoods are plain values, so the same one can be reused for several
//! queries, or built once per lattice node by
//! [`PrecomputedWeights`](precomputed::PrecomputedWeights).
use num_traits::{Float, NumCast};

use crate::basis::bspline03;
use crate::cast;
use crate::error::{check_len, ModelError};
use crate::utils::fold_mirror;

pub mod precomputed;

/// Treatment of coefficient indices outside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Boundary {
    /// Half-sample mirror reflection with period `2 * dim`
    #[default]
    Mirror,
    /// Coefficients outside the grid are zero
    Zero,
}

/// Fold an integer index into `0..dim` by half-sample mirror reflection.
///
/// Returns `None` only when `dim` is zero.
///
/// ```rust
/// use elastic_spline::interp::mirror_index;
///
/// assert_eq!(mirror_index(-1, 4), Some(0));
/// assert_eq!(mirror_index(4, 4), Some(3));
/// assert_eq!(mirror_index(9, 4), Some(1));
/// ```
#[inline]
pub fn mirror_index(p: isize, dim: usize) -> Option<usize> {
    (dim > 0).then(|| fold_mirror(p, dim))
}

/// Contributing indices and cubic basis weights along one axis.
///
/// Entries are ordered rightmost first: slot `k` refers to the coefficient at
/// unfolded position `floor(t) + 2 - k`. An index of `None` marks a position
/// outside a zero-boundary grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisWeights<T> {
    pub index: [Option<usize>; 4],
    pub w: [T; 4],
    pub dw: [T; 4],
    pub d2w: [T; 4],
}

impl<T: Float> AxisWeights<T> {
    /// Indices and weights for coordinate `t` on an axis of `dim` coefficients.
    pub fn new(t: T, dim: usize, boundary: Boundary) -> Result<Self, ModelError> {
        let floor = t.floor();
        let i = <isize as NumCast>::from(floor)
            .ok_or(ModelError::InvalidArgument("Unrepresentable coordinate value"))?;

        let mut index = [None; 4];
        for (k, slot) in index.iter_mut().enumerate() {
            let p = i + 2 - k as isize;
            *slot = match boundary {
                Boundary::Mirror => mirror_index(p, dim),
                Boundary::Zero => (p >= 0 && (p as usize) < dim).then_some(p as usize),
            };
        }

        let e = t - floor;
        let s = T::one() - e;
        let half: T = cast(0.5);
        let third: T = cast(1.0 / 3.0);

        let dw0 = half * e * e;
        let dw3 = -half * s * s;
        let dw = [
            dw0,
            T::one() - dw0 - dw0 + dw3,
            cast::<T>(1.5) * e * (e - cast(4.0 / 3.0)),
            dw3,
        ];

        let w = [
            e * dw0 * third,
            bspline03(e - T::one()),
            cast::<T>(2.0 / 3.0) - (cast::<T>(2.0) - e) * dw0,
            -s * dw3 * third,
        ];

        let d2w = [e, s - e - e, e - s - s, s];

        Ok(Self { index, w, dw, d2w })
    }
}

/// Prepared evaluation state for one coordinate pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighborhood<T> {
    pub x: AxisWeights<T>,
    pub y: AxisWeights<T>,
}

/// Second derivatives of the spline at one point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hessian<T> {
    pub xx: T,
    pub xy: T,
    pub yy: T,
}

/// Borrowed view of a row-major `width x height` array of cubic B-spline
/// coefficients, ready for evaluation.
///
/// A grid with no coefficient data (dimensions only) evaluates to zero
/// everywhere.
#[derive(Clone, Copy, Debug)]
pub struct CoefficientGrid<'a, T> {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) data: &'a [T],
    pub(crate) boundary: Boundary,
}

impl<'a, T: Float> CoefficientGrid<'a, T> {
    pub fn new(
        data: &'a [T],
        width: usize,
        height: usize,
        boundary: Boundary,
    ) -> Result<Self, ModelError> {
        if !data.is_empty() {
            check_len(data, width, height)?;
        }
        Ok(Self {
            width,
            height,
            data,
            boundary,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn coefficients(&self) -> &'a [T] {
        self.data
    }

    /// Indices and weights for evaluation at `(x, y)`.
    #[inline]
    pub fn prepare(&self, x: T, y: T) -> Result<Neighborhood<T>, ModelError> {
        Ok(Neighborhood {
            x: AxisWeights::new(x, self.width, self.boundary)?,
            y: AxisWeights::new(y, self.height, self.boundary)?,
        })
    }

    /// Weighted 4x4 sum of coefficients.
    #[inline]
    fn gather(&self, n: &Neighborhood<T>, wx: &[T; 4], wy: &[T; 4]) -> T {
        let mut acc = T::zero();
        if self.data.is_empty() {
            return acc;
        }
        for j in 0..4 {
            let Some(row) = n.y.index[j] else { continue };
            let offset = row * self.width;
            let mut line = T::zero();
            for i in 0..4 {
                if let Some(col) = n.x.index[i] {
                    line = line + wx[i] * self.data[offset + col];
                }
            }
            acc = acc + wy[j] * line;
        }
        acc
    }

    /// Interpolated value.
    #[inline]
    pub fn value(&self, n: &Neighborhood<T>) -> T {
        self.gather(n, &n.x.w, &n.y.w)
    }

    /// Gradient as `[d/dx, d/dy]`.
    #[inline]
    pub fn gradient(&self, n: &Neighborhood<T>) -> [T; 2] {
        [
            self.gather(n, &n.x.dw, &n.y.w),
            self.gather(n, &n.x.w, &n.y.dw),
        ]
    }

    /// Value and gradient in one call.
    #[inline]
    pub fn value_and_gradient(&self, n: &Neighborhood<T>) -> (T, [T; 2]) {
        (self.value(n), self.gradient(n))
    }

    #[inline]
    pub fn hessian(&self, n: &Neighborhood<T>) -> Hessian<T> {
        Hessian {
            xx: self.gather(n, &n.x.d2w, &n.y.w),
            xy: self.gather(n, &n.x.dw, &n.y.dw),
            yy: self.gather(n, &n.x.w, &n.y.d2w),
        }
    }

    /// Prepare and evaluate the value at `(x, y)`.
    pub fn value_at(&self, x: T, y: T) -> Result<T, ModelError> {
        Ok(self.value(&self.prepare(x, y)?))
    }

    /// Prepare and evaluate the gradient at `(x, y)`.
    pub fn gradient_at(&self, x: T, y: T) -> Result<[T; 2], ModelError> {
        Ok(self.gradient(&self.prepare(x, y)?))
    }

    /// Prepare and evaluate the Hessian at `(x, y)`.
    pub fn hessian_at(&self, x: T, y: T) -> Result<Hessian<T>, ModelError> {
        Ok(self.hessian(&self.prepare(x, y)?))
    }
}
