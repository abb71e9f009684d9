//! Cubic B-spline multiresolution image model for elastic registration.
//!
//! A sampled 2-D field is converted into cubic B-spline coefficients under
//! mirror boundary conditions, reduced into a coarse-to-fine pyramid, and
//! evaluated (value, gradient, Hessian) at arbitrary real coordinates.
//! A small dense linear algebra kernel (SVD, pseudo-inverse, QR, least squares)
//! covers the transformation-fitting systems built from the model's outputs.
//!
//! ```rust
//! use elastic_spline::{BSplineModel, Source};
//!
//! // 16x16 ramp along x
//! let (w, h) = (16, 16);
//! let samples: Vec<f64> = (0..w * h).map(|k| (k % w) as f64).collect();
//!
//! let mut model = BSplineModel::from_samples(samples, w, h).unwrap();
//! model.set_pyramid_depth(2).unwrap();
//! model.build().unwrap();
//!
//! let grid = model.grid(Source::Original).unwrap();
//! let at = grid.prepare(7.5, 3.0).unwrap();
//! assert!((grid.value(&at) - 7.5).abs() < 1e-9);
//!
//! // Walk the pyramid from the coarsest level to full resolution
//! let pyramid = model.pyramid().unwrap();
//! let mut cursor = pyramid.cursor();
//! while !cursor.is_finest() {
//!     let level = cursor.pop();
//!     assert!(level.width() >= 4 && level.height() >= 4);
//! }
//! ```
#![allow(clippy::needless_range_loop)]

use core::fmt::Debug;
use num_traits::{Float, NumCast};

pub mod basis;
pub mod config;
pub mod error;
pub mod interp;
pub mod linalg;
pub mod model;
pub mod pyramid;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use basis::Degree;
pub use config::ModelConfig;
pub use error::ModelError;
pub use interp::precomputed::PrecomputedWeights;
pub use interp::{AxisWeights, Boundary, CoefficientGrid, Hessian, Neighborhood};
pub use model::{BSplineModel, BuildState, Source};
pub use pyramid::builder::{PyramidBuild, PyramidBuilder};
pub use pyramid::{BuildOutcome, CancelToken, Level, LevelCursor, Pyramid, SubsampledOutput};

/// Floating-point element type accepted by the model.
///
/// Pyramids are built on a worker thread, so the element type must be
/// shareable across threads in addition to being a `Float`.
pub trait Real: Float + Send + Sync + Debug + 'static {}

impl<T> Real for T where T: Float + Send + Sync + Debug + 'static {}

/// Convert an `f64` constant into the working float type.
#[inline(always)]
pub(crate) fn cast<T: Float>(v: f64) -> T {
    <T as NumCast>::from(v).unwrap_or_else(T::nan)
}
