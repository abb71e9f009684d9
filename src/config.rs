//! Build parameters of a [`BSplineModel`](crate::BSplineModel).
use serde::Deserialize;

use crate::pyramid::MAX_OUTPUT_SIZE;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Requested number of reduced levels; clamped to what the field allows.
    pub pyramid_depth: usize,
    /// Also build the image pyramid (the model is a registration target).
    pub is_target: bool,
    /// Power-of-two factor by which a sampled field is shrunk before modelling.
    ///
    /// - `0` or `1` (default): no subsampling.
    /// - `2^k`: halve both dimensions `k` times.
    pub max_subsampling_factor: usize,
    /// Largest width or height of the subsampled output companion.
    pub max_output_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pyramid_depth: 0,
            is_target: false,
            max_subsampling_factor: 1,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }
}
