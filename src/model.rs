//! Cubic B-spline model of a 2-D field, with its multiresolution pyramid.
//!
//! A model is created from samples, from a coefficient buffer, or from
//! dimensions only (for landmark-only registration). Its pyramid is built once,
//! either synchronously with [`BSplineModel::build`] or on a worker thread with
//! [`BSplineModel::start_build`], after which it is shared read-only.
use std::sync::Arc;

use log::debug;

use crate::config::ModelConfig;
use crate::error::{check_len, ModelError};
use crate::interp::precomputed::PrecomputedWeights;
use crate::interp::{Boundary, CoefficientGrid};
use crate::pyramid::builder::{Content, PyramidBuild, PyramidBuilder};
use crate::pyramid::{max_depth, BuildOutcome, CancelToken, Pyramid, MAX_OUTPUT_SIZE};
use crate::Real;

/// Coefficients used for model-level evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Source {
    /// Full-resolution coefficients
    #[default]
    Original,
    /// Subsampled output coefficients when present, full resolution otherwise
    Subsampled,
}

/// Lifecycle of the pyramid build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Running,
    Ready,
    Interrupted,
}

#[derive(Debug)]
enum Stage<T> {
    Idle,
    Running(PyramidBuild<T>),
    Ready(Arc<Pyramid<T>>),
    Interrupted,
}

#[derive(Debug)]
pub struct BSplineModel<T> {
    content: Content<T>,
    original_width: usize,
    original_height: usize,
    boundary: Boundary,
    requested_depth: usize,
    is_target: bool,
    halvings: u32,
    max_output_size: usize,
    stage: Stage<T>,
}

impl<T: Real> BSplineModel<T> {
    fn with_content(content: Content<T>, width: usize, height: usize, boundary: Boundary) -> Self {
        Self {
            content,
            original_width: width,
            original_height: height,
            boundary,
            requested_depth: 0,
            is_target: false,
            halvings: 0,
            max_output_size: MAX_OUTPUT_SIZE,
            stage: Stage::Idle,
        }
    }

    /// Model of a row-major `width x height` sampled field.
    pub fn from_samples(samples: Vec<T>, width: usize, height: usize) -> Result<Self, ModelError> {
        check_len(&samples, width, height)?;
        Ok(Self::with_content(
            Content::Samples(samples.into()),
            width,
            height,
            Boundary::Mirror,
        ))
    }

    /// Model of a field given as rows of equal length.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, ModelError> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                found: row.len(),
            });
        }
        Self::from_samples(rows.concat(), width, rows.len())
    }

    /// Model of a cubic B-spline whose `width x height` coefficients start at
    /// `offset` in `buffer`. Coefficients outside the grid are taken as zero.
    pub fn from_coefficients(
        buffer: &[T],
        width: usize,
        height: usize,
        offset: usize,
    ) -> Result<Self, ModelError> {
        let coefficients = coefficient_window(buffer, width, height, offset)?;
        Ok(Self::with_content(
            Content::Coefficients(coefficients.into()),
            width,
            height,
            Boundary::Zero,
        ))
    }

    /// Model of dimensions only, whose pyramid carries no coefficients.
    pub fn with_dimensions(width: usize, height: usize) -> Self {
        Self::with_content(Content::Empty, width, height, Boundary::Mirror)
    }

    /// Apply build parameters.
    pub fn with_config(mut self, config: &ModelConfig) -> Result<Self, ModelError> {
        self.set_subsampling_factor(config.max_subsampling_factor)?;
        self.set_target(config.is_target)?;
        self.set_pyramid_depth(config.pyramid_depth)?;
        self.max_output_size = config.max_output_size.max(1);
        Ok(self)
    }

    fn ensure_idle(&self) -> Result<(), ModelError> {
        match self.stage {
            Stage::Idle => Ok(()),
            Stage::Running(_) => Err(ModelError::BuildInProgress),
            Stage::Ready(_) | Stage::Interrupted => Err(ModelError::AlreadyBuilt),
        }
    }

    /// Shrink a sampled field by a power-of-two `factor` before modelling.
    ///
    /// `0` and `1` disable subsampling. Models built from coefficients or
    /// dimensions only ignore the factor.
    pub fn set_subsampling_factor(&mut self, factor: usize) -> Result<(), ModelError> {
        self.ensure_idle()?;
        let factor = factor.max(1);
        if !factor.is_power_of_two() {
            return Err(ModelError::InvalidArgument(
                "Subsampling factor must be a power of two",
            ));
        }
        let halvings = factor.trailing_zeros();
        if matches!(self.content, Content::Samples(_))
            && (self.original_width >> halvings == 0 || self.original_height >> halvings == 0)
        {
            return Err(ModelError::InvalidArgument(
                "Subsampling factor exceeds the field size",
            ));
        }
        self.halvings = halvings;
        Ok(())
    }

    pub fn subsampling_factor(&self) -> usize {
        1 << self.halvings
    }

    /// Build the image pyramid alongside the coefficient pyramid.
    pub fn set_target(&mut self, is_target: bool) -> Result<(), ModelError> {
        self.ensure_idle()?;
        self.is_target = is_target;
        Ok(())
    }

    pub fn is_target(&self) -> bool {
        self.is_target
    }

    /// Request a pyramid depth; returns the depth that will actually be used.
    pub fn set_pyramid_depth(&mut self, depth: usize) -> Result<usize, ModelError> {
        self.ensure_idle()?;
        self.requested_depth = depth;
        Ok(self.pyramid_depth())
    }

    /// Requested depth, clamped so that no level falls below the minimum size.
    pub fn pyramid_depth(&self) -> usize {
        self.requested_depth.min(max_depth(self.width(), self.height()))
    }

    /// Width of the modelled field (after subsampling).
    pub fn width(&self) -> usize {
        match self.content {
            Content::Samples(_) => self.original_width >> self.halvings,
            _ => self.original_width,
        }
    }

    /// Height of the modelled field (after subsampling).
    pub fn height(&self) -> usize {
        match self.content {
            Content::Samples(_) => self.original_height >> self.halvings,
            _ => self.original_height,
        }
    }

    pub fn original_width(&self) -> usize {
        self.original_width
    }

    pub fn original_height(&self) -> usize {
        self.original_height
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Samples as given, before any subsampling.
    pub fn original_image(&self) -> Option<&[T]> {
        match &self.content {
            Content::Samples(samples) => Some(samples.as_ref()),
            _ => None,
        }
    }

    /// Samples of the modelled field (after subsampling).
    pub fn image(&self) -> Option<&[T]> {
        match &self.stage {
            Stage::Ready(pyramid) => pyramid.full_resolution().image(),
            _ if self.halvings == 0 => self.original_image(),
            _ => None,
        }
    }

    /// Full-resolution coefficients, once known.
    pub fn coefficients(&self) -> Option<&[T]> {
        match (&self.stage, &self.content) {
            (_, Content::Empty) => None,
            (Stage::Ready(pyramid), _) => Some(pyramid.full_resolution().coefficients()),
            (_, Content::Coefficients(c)) => Some(c.as_ref()),
            _ => None,
        }
    }

    /// Replace the coefficients of a coefficient model before its build.
    pub fn set_coefficients(&mut self, buffer: &[T], offset: usize) -> Result<(), ModelError> {
        self.ensure_idle()?;
        if !matches!(self.content, Content::Coefficients(_)) {
            return Err(ModelError::InvalidArgument(
                "Only coefficient models accept new coefficients",
            ));
        }
        let coefficients =
            coefficient_window(buffer, self.original_width, self.original_height, offset)?;
        self.content = Content::Coefficients(coefficients.into());
        Ok(())
    }

    fn builder(&self) -> PyramidBuilder<T> {
        PyramidBuilder::from_content(
            self.content.clone(),
            self.original_width,
            self.original_height,
            self.boundary,
        )
        .depth(self.pyramid_depth())
        .image_pyramid(self.is_target)
        .halvings(self.halvings)
        .max_output_size(self.max_output_size)
    }

    fn finish(&mut self, outcome: BuildOutcome<T>) -> BuildState {
        match outcome {
            BuildOutcome::Complete(pyramid) => {
                debug!("Pyramid ready with {} levels", pyramid.levels().len());
                self.stage = Stage::Ready(Arc::new(pyramid));
                BuildState::Ready
            }
            BuildOutcome::Interrupted => {
                self.stage = Stage::Interrupted;
                BuildState::Interrupted
            }
        }
    }

    /// Build the pyramid on the calling thread.
    pub fn build(&mut self) -> Result<BuildState, ModelError> {
        self.ensure_idle()?;
        debug!(
            "Building pyramid of depth {} for a {}x{} field",
            self.pyramid_depth(),
            self.width(),
            self.height()
        );
        let outcome = self.builder().build(&CancelToken::new())?;
        Ok(self.finish(outcome))
    }

    /// Build the pyramid on a worker thread.
    pub fn start_build(&mut self) -> Result<(), ModelError> {
        self.ensure_idle()?;
        debug!(
            "Starting background build of depth {} for a {}x{} field",
            self.pyramid_depth(),
            self.width(),
            self.height()
        );
        self.stage = Stage::Running(self.builder().spawn()?);
        Ok(())
    }

    /// Whether no build is still running.
    pub fn is_build_finished(&self) -> bool {
        match &self.stage {
            Stage::Running(build) => build.is_finished(),
            _ => true,
        }
    }

    /// Ask a running build to stop before its next level.
    pub fn cancel_build(&self) {
        if let Stage::Running(build) = &self.stage {
            debug!("Cancelling pyramid build");
            build.cancel();
        }
    }

    /// Block until a running build is done.
    pub fn wait_build(&mut self) -> Result<BuildState, ModelError> {
        match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Running(build) => match build.join() {
                Ok(outcome) => Ok(self.finish(outcome)),
                Err(e) => {
                    self.stage = Stage::Interrupted;
                    Err(e)
                }
            },
            stage => {
                self.stage = stage;
                Ok(self.state())
            }
        }
    }

    pub fn state(&self) -> BuildState {
        match self.stage {
            Stage::Idle => BuildState::Idle,
            Stage::Running(_) => BuildState::Running,
            Stage::Ready(_) => BuildState::Ready,
            Stage::Interrupted => BuildState::Interrupted,
        }
    }

    /// Built pyramid, shareable across threads.
    pub fn pyramid(&self) -> Result<Arc<Pyramid<T>>, ModelError> {
        match &self.stage {
            Stage::Ready(pyramid) => Ok(Arc::clone(pyramid)),
            Stage::Running(_) => Err(ModelError::BuildInProgress),
            _ => Err(ModelError::NotBuilt),
        }
    }

    /// Evaluation view over the model's coefficients.
    ///
    /// Coefficient and dimension-only models can be evaluated before their
    /// pyramid is built; sampled models need a build first.
    pub fn grid(&self, source: Source) -> Result<CoefficientGrid<'_, T>, ModelError> {
        match (&self.stage, &self.content) {
            (Stage::Ready(pyramid), _) => match (source, pyramid.subsampled()) {
                (Source::Subsampled, Some(sub)) => Ok(CoefficientGrid {
                    width: sub.width(),
                    height: sub.height(),
                    data: sub.coefficients(),
                    boundary: self.boundary,
                }),
                _ => Ok(pyramid.full_resolution().grid()),
            },
            (_, Content::Coefficients(c)) => {
                CoefficientGrid::new(c, self.original_width, self.original_height, self.boundary)
            }
            (_, Content::Empty) => {
                CoefficientGrid::new(&[], self.original_width, self.original_height, self.boundary)
            }
            (Stage::Running(_), _) => Err(ModelError::BuildInProgress),
            _ => Err(ModelError::NotBuilt),
        }
    }

    /// Weight tables for an `xdim x ydim` lattice over `intervals` spline
    /// units, on the full-resolution coefficients.
    pub fn precompute(
        &self,
        ydim: usize,
        xdim: usize,
        intervals: usize,
    ) -> Result<PrecomputedWeights<T>, ModelError> {
        PrecomputedWeights::new(
            ydim,
            xdim,
            intervals,
            self.width(),
            self.height(),
            self.boundary,
        )
    }
}

fn coefficient_window<T: Copy>(
    buffer: &[T],
    width: usize,
    height: usize,
    offset: usize,
) -> Result<Vec<T>, ModelError> {
    let mismatch = |expected| ModelError::DimensionMismatch {
        expected,
        found: buffer.len(),
    };
    let end = width
        .checked_mul(height)
        .and_then(|len| len.checked_add(offset))
        .ok_or(mismatch(usize::MAX))?;
    buffer
        .get(offset..end)
        .map(<[T]>::to_vec)
        .ok_or(mismatch(end))
}
