//! Dense linear algebra for the small systems met when fitting
//! transformations: singular value decomposition, pseudo-inversion,
//! QR decomposition and linear least squares.
//!
//! Every routine takes its input matrix by value and returns its results,
//! reusing the input buffer where the algorithm works in place.
use num_traits::Float;

use crate::cast;

pub mod qr;
pub mod svd;

pub use qr::{linear_least_squares, qr};
pub use svd::{invert_svd, svd, svd_back_substitution, PseudoInverse, Svd};

/// Singular values below this magnitude are treated as zero
/// (the largest `f32` strictly below `f32::EPSILON`).
pub const FLT_EPSILON: f64 = 1.192_092_824_453_538_9e-7;

/// Upper bound on QR sweeps per singular value
pub const MAX_SVD_ITERATIONS: usize = 1000;

#[inline(always)]
pub(crate) fn flt_epsilon<T: Float>() -> T {
    cast(FLT_EPSILON)
}
