//! Multiresolution pyramid of cubic B-spline coefficients.
//!
//! A built [`Pyramid`] is immutable: level 0 is the full-resolution
//! representation and each following level halves both dimensions.
//! Registration walks the pyramid from the coarsest level back to full
//! resolution with a caller-owned [`LevelCursor`].
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_traits::Float;

use crate::cast;
use crate::interp::{Boundary, CoefficientGrid};

pub mod builder;
pub mod reduce;

pub use reduce::{reduce_coefficients_by_half, reduce_dual_1d, reduce_dual_2d};

/// Smallest width or height of a reduced level
pub const MIN_LEVEL_SIZE: usize = 4;

/// Default largest width or height of the subsampled output
pub const MAX_OUTPUT_SIZE: usize = 1024;

/// Largest usable pyramid depth for a `width x height` field.
///
/// Counts the halvings performed while both dimensions are at least
/// [`MIN_LEVEL_SIZE`], minus one.
pub fn max_depth(width: usize, height: usize) -> usize {
    let (mut w, mut h) = (width, height);
    let mut scale = 0_usize;
    while w >= MIN_LEVEL_SIZE && h >= MIN_LEVEL_SIZE {
        w /= 2;
        h /= 2;
        scale += 1;
    }
    scale.saturating_sub(1)
}

/// One resolution of the pyramid.
#[derive(Clone, Debug, PartialEq)]
pub struct Level<T> {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) coefficients: Vec<T>,
    pub(crate) image: Option<Vec<T>>,
    pub(crate) boundary: Boundary,
}

impl<T: Float> Level<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Cubic B-spline coefficients, empty for landmark-only models.
    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    /// Field samples at this resolution, when an image pyramid was built.
    pub fn image(&self) -> Option<&[T]> {
        self.image.as_deref()
    }

    /// Sample of the level image at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.image
            .as_ref()
            .and_then(|image| image.get(y * self.width + x).copied())
    }

    /// Evaluation view over this level's coefficients.
    pub fn grid(&self) -> CoefficientGrid<'_, T> {
        CoefficientGrid {
            width: self.width,
            height: self.height,
            data: &self.coefficients,
            boundary: self.boundary,
        }
    }
}

/// Companion representation for display at a bounded size.
#[derive(Clone, Debug, PartialEq)]
pub struct SubsampledOutput<T> {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) coefficients: Vec<T>,
    pub(crate) image: Option<Vec<T>>,
}

impl<T: Float> SubsampledOutput<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    pub fn image(&self) -> Option<&[T]> {
        self.image.as_deref()
    }
}

/// Built multiresolution representation.
#[derive(Clone, Debug, PartialEq)]
pub struct Pyramid<T> {
    pub(crate) levels: Vec<Level<T>>,
    pub(crate) subsampled: Option<SubsampledOutput<T>>,
}

impl<T: Float> Pyramid<T> {
    /// Number of reduced levels below full resolution.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Level by index, 0 being full resolution.
    pub fn level(&self, index: usize) -> Option<&Level<T>> {
        self.levels.get(index)
    }

    pub fn levels(&self) -> &[Level<T>] {
        &self.levels
    }

    pub fn full_resolution(&self) -> &Level<T> {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &Level<T> {
        &self.levels[self.levels.len() - 1]
    }

    pub fn smallest_width(&self) -> usize {
        self.coarsest().width
    }

    pub fn smallest_height(&self) -> usize {
        self.coarsest().height
    }

    /// Ratio of a level's width to the full-resolution width.
    pub fn factor_width(&self, level: &Level<T>) -> T {
        ratio(level.width, self.full_resolution().width)
    }

    /// Ratio of a level's height to the full-resolution height.
    pub fn factor_height(&self, level: &Level<T>) -> T {
        ratio(level.height, self.full_resolution().height)
    }

    pub fn subsampled(&self) -> Option<&SubsampledOutput<T>> {
        self.subsampled.as_ref()
    }

    /// Levels ordered from the coarsest to full resolution.
    pub fn coarse_to_fine(&self) -> impl DoubleEndedIterator<Item = &Level<T>> {
        self.levels.iter().rev()
    }

    /// Fresh cursor positioned above the coarsest level.
    pub fn cursor(&self) -> LevelCursor<'_, T> {
        LevelCursor {
            pyramid: self,
            next: self.levels.len(),
        }
    }
}

fn ratio<T: Float>(part: usize, whole: usize) -> T {
    if whole == 0 {
        return T::zero();
    }
    cast::<T>(part as f64) / cast(whole as f64)
}

/// Coarse-to-fine position within a [`Pyramid`].
///
/// Each [`pop`](LevelCursor::pop) yields the next finer level. Once full
/// resolution is reached, further pops keep yielding it.
#[derive(Clone, Copy, Debug)]
pub struct LevelCursor<'a, T> {
    pyramid: &'a Pyramid<T>,
    next: usize,
}

impl<'a, T: Float> LevelCursor<'a, T> {
    pub fn pop(&mut self) -> &'a Level<T> {
        self.next = self.next.saturating_sub(1);
        &self.pyramid.levels[self.next]
    }

    /// Level most recently popped, if any.
    pub fn current(&self) -> Option<&'a Level<T>> {
        self.pyramid.levels.get(self.next)
    }

    /// Index of the current level; `depth + 1` before the first pop.
    pub fn current_depth(&self) -> usize {
        self.next
    }

    /// Whether full resolution has been reached.
    pub fn is_finest(&self) -> bool {
        self.next == 0
    }
}

/// Result of a build that ran to its end.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildOutcome<T> {
    Complete(Pyramid<T>),
    Interrupted,
}

/// Shared flag for cooperative cancellation of a build.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
