//! Construction of a [`Pyramid`], synchronously or on a worker thread.
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use super::reduce::reduce_dual_2d;
use super::{BuildOutcome, CancelToken, Level, Pyramid, SubsampledOutput};
use super::{MAX_OUTPUT_SIZE, MIN_LEVEL_SIZE};
use crate::basis::{
    cardinal_to_dual_2d, coefficients_to_samples_2d, dual_to_cardinal_2d,
    samples_to_coefficients_2d, Degree,
};
use crate::error::{check_len, ModelError};
use crate::interp::Boundary;
use crate::Real;

/// Field the pyramid is built from.
#[derive(Clone, Debug)]
pub(crate) enum Content<T> {
    /// Sampled field
    Samples(Arc<[T]>),
    /// Cubic B-spline coefficients
    Coefficients(Arc<[T]>),
    /// Dimensions only
    Empty,
}

/// Parameters of one pyramid build.
///
/// ```rust
/// use elastic_spline::{BuildOutcome, CancelToken, PyramidBuilder};
///
/// let samples = vec![1.0_f64; 32 * 32];
/// let builder = PyramidBuilder::from_samples(samples, 32, 32)
///     .unwrap()
///     .depth(3)
///     .image_pyramid(true);
///
/// match builder.build(&CancelToken::new()).unwrap() {
///     BuildOutcome::Complete(pyramid) => assert_eq!(pyramid.smallest_width(), 4),
///     BuildOutcome::Interrupted => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub struct PyramidBuilder<T> {
    content: Content<T>,
    width: usize,
    height: usize,
    depth: usize,
    boundary: Boundary,
    image_pyramid: bool,
    halvings: u32,
    max_output_size: usize,
}

impl<T: Real> PyramidBuilder<T> {
    pub(crate) fn from_content(
        content: Content<T>,
        width: usize,
        height: usize,
        boundary: Boundary,
    ) -> Self {
        Self {
            content,
            width,
            height,
            depth: 0,
            boundary,
            image_pyramid: false,
            halvings: 0,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }

    /// Pyramid of a row-major sampled field, with mirror boundaries.
    pub fn from_samples(
        samples: impl Into<Arc<[T]>>,
        width: usize,
        height: usize,
    ) -> Result<Self, ModelError> {
        let samples = samples.into();
        check_len(&samples, width, height)?;
        Ok(Self::from_content(
            Content::Samples(samples),
            width,
            height,
            Boundary::Mirror,
        ))
    }

    /// Pyramid of a cubic B-spline given by its coefficients, with zero
    /// boundaries.
    pub fn from_coefficients(
        coefficients: impl Into<Arc<[T]>>,
        width: usize,
        height: usize,
    ) -> Result<Self, ModelError> {
        let coefficients = coefficients.into();
        check_len(&coefficients, width, height)?;
        Ok(Self::from_content(
            Content::Coefficients(coefficients),
            width,
            height,
            Boundary::Zero,
        ))
    }

    /// Pyramid of dimensions only, for landmark-only registration.
    pub fn empty(width: usize, height: usize) -> Self {
        Self::from_content(Content::Empty, width, height, Boundary::Mirror)
    }

    /// Number of reduced levels.
    ///
    /// Levels that would fall below the minimum size repeat the previous one.
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Also reduce the field samples alongside the coefficients.
    pub fn image_pyramid(mut self, enabled: bool) -> Self {
        self.image_pyramid = enabled;
        self
    }

    /// Halve a sampled field `halvings` times before modelling it.
    pub fn halvings(mut self, halvings: u32) -> Self {
        self.halvings = halvings;
        self
    }

    /// Largest width or height of the subsampled output.
    pub fn max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size.max(1);
        self
    }

    /// Dimensions of the field after the initial halvings.
    pub fn working_size(&self) -> (usize, usize) {
        match self.content {
            Content::Samples(_) => (self.width >> self.halvings, self.height >> self.halvings),
            _ => (self.width, self.height),
        }
    }

    /// Dimensions of the subsampled output, if the working field is too large
    /// and can be halved at least once.
    pub fn subsampled_size(&self) -> Option<(usize, usize)> {
        let working = self.working_size();
        let (mut w, mut h) = working;
        while (w > self.max_output_size || h > self.max_output_size) && w >= 2 && h >= 2 {
            w /= 2;
            h /= 2;
        }
        ((w, h) != working).then_some((w, h))
    }

    /// Run the build on the calling thread.
    ///
    /// `cancel` is checked before each level; a cancelled build yields
    /// [`BuildOutcome::Interrupted`] and discards partial results.
    pub fn build(&self, cancel: &CancelToken) -> Result<BuildOutcome<T>, ModelError> {
        // Working field
        let mut image = match &self.content {
            Content::Samples(samples) => Some(samples.to_vec()),
            _ => None,
        };
        let (mut width, mut height) = (self.width, self.height);
        if let Some(samples) = image.as_mut() {
            for _ in 0..self.halvings {
                if cancel.is_cancelled() {
                    return Ok(interrupted());
                }
                *samples = halve_image(samples, width, height)?;
                width /= 2;
                height /= 2;
            }
            if self.halvings > 0 {
                debug!("Subsampled working field to {width}x{height}");
            }
        }

        let coefficients = match (&self.content, &image) {
            (Content::Samples(_), Some(samples)) => {
                samples_to_coefficients_2d(samples, width, height, Degree::Cubic)?
            }
            (Content::Coefficients(c), _) => c.to_vec(),
            _ => Vec::new(),
        };

        let sub = self.subsampled_size();

        // Coefficient pyramid
        let Some(coefficient_chain) = reduce_chain(
            (width, height, coefficients),
            self.depth,
            sub,
            cancel,
            |c, w, h| coefficients_to_samples_2d(c, w, h, Degree::Septic),
            |dual, w, h| samples_to_coefficients_2d(dual, w, h, Degree::Septic),
        )?
        else {
            return Ok(interrupted());
        };

        // Image pyramid
        let image_chain = match image {
            Some(samples) if self.image_pyramid || sub.is_some() => {
                let depth = if self.image_pyramid { self.depth } else { 0 };
                let Some(chain) = reduce_chain(
                    (width, height, samples),
                    depth,
                    sub,
                    cancel,
                    |s, w, h| cardinal_to_dual_2d(s, w, h, Degree::Cubic),
                    |dual, w, h| dual_to_cardinal_2d(dual, w, h, Degree::Cubic),
                )?
                else {
                    return Ok(interrupted());
                };
                Some(chain)
            }
            Some(samples) => Some(Chain {
                levels: vec![(width, height, samples)],
                sub: None,
            }),
            None => None,
        };

        let (mut images, sub_image) = match image_chain {
            Some(chain) => (chain.levels.into_iter().map(|(_, _, v)| v).collect(), chain.sub),
            None => (Vec::new(), None),
        };
        images.resize(self.depth + 1, Vec::new());

        let levels: Vec<Level<T>> = coefficient_chain
            .levels
            .into_iter()
            .zip(images)
            .map(|((width, height, coefficients), image)| Level {
                width,
                height,
                coefficients,
                image: (!image.is_empty()).then_some(image),
                boundary: self.boundary,
            })
            .collect();

        // Without reduced coefficients, evaluation falls back to full resolution
        let subsampled = match (sub, coefficient_chain.sub) {
            (Some((width, height)), Some(coefficients)) => Some(SubsampledOutput {
                width,
                height,
                coefficients,
                image: sub_image,
            }),
            _ => None,
        };

        debug!(
            "Built pyramid of depth {} down to {}x{}",
            levels.len() - 1,
            levels[levels.len() - 1].width,
            levels[levels.len() - 1].height
        );

        Ok(BuildOutcome::Complete(Pyramid { levels, subsampled }))
    }

    /// Run the build on a dedicated worker thread.
    pub fn spawn(self) -> Result<PyramidBuild<T>, ModelError> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("spline-pyramid".into())
            .spawn(move || self.build(&token))
            .map_err(|_| ModelError::WorkerUnavailable)?;
        Ok(PyramidBuild { handle, cancel })
    }
}

/// Handle to a pyramid build running on a worker thread.
#[derive(Debug)]
pub struct PyramidBuild<T> {
    handle: JoinHandle<Result<BuildOutcome<T>, ModelError>>,
    cancel: CancelToken,
}

impl<T> PyramidBuild<T> {
    /// Request cooperative cancellation; takes effect before the next level.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker is done.
    pub fn join(self) -> Result<BuildOutcome<T>, ModelError> {
        self.handle
            .join()
            .map_err(|_| ModelError::WorkerPanicked)?
    }
}

fn interrupted<T>() -> BuildOutcome<T> {
    warn!("Pyramid build interrupted");
    BuildOutcome::Interrupted
}

/// Halve a sampled field through the dual basis.
fn halve_image<T: Real>(samples: &[T], width: usize, height: usize) -> Result<Vec<T>, ModelError> {
    let dual = cardinal_to_dual_2d(samples, width, height, Degree::Cubic)?;
    let half = reduce_dual_2d(&dual, width, height)?;
    dual_to_cardinal_2d(&half, width / 2, height / 2, Degree::Cubic)
}

/// Sequence of representations at decreasing resolution.
struct Chain<T> {
    /// `(width, height, data)`, full resolution first
    levels: Vec<(usize, usize, Vec<T>)>,
    /// Representation at the subsampled output size
    sub: Option<Vec<T>>,
}

/// Reduce `first` `depth` times, and further down to `sub` if requested.
///
/// `to_dual` maps a stored representation to dual samples; `from_dual` maps
/// reduced dual samples back. Empty representations are carried through
/// by dimensions only. Returns `None` when cancelled.
fn reduce_chain<T: Real>(
    first: (usize, usize, Vec<T>),
    depth: usize,
    sub: Option<(usize, usize)>,
    cancel: &CancelToken,
    to_dual: impl Fn(&[T], usize, usize) -> Result<Vec<T>, ModelError>,
    from_dual: impl Fn(&[T], usize, usize) -> Result<Vec<T>, ModelError>,
) -> Result<Option<Chain<T>>, ModelError> {
    let (mut width, mut height) = (first.0, first.1);
    let empty = first.2.is_empty();
    let mut dual = if empty {
        Vec::new()
    } else {
        to_dual(&first.2, width, height)?
    };

    let halve = |dual: &mut Vec<T>, width: usize, height: usize| -> Result<Vec<T>, ModelError> {
        if empty {
            return Ok(Vec::new());
        }
        *dual = reduce_dual_2d(&dual[..], width, height)?;
        from_dual(&dual[..], width / 2, height / 2)
    };

    let mut sub_data = None;
    let mut levels = Vec::with_capacity(depth + 1);
    levels.push(first);

    for level in 1..=depth {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if width / 2 < MIN_LEVEL_SIZE || height / 2 < MIN_LEVEL_SIZE {
            debug!(
                "Level {level} would fall below {MIN_LEVEL_SIZE} pixels, repeating level {}",
                level - 1
            );
            let previous = levels[levels.len() - 1].clone();
            levels.push(previous);
            continue;
        }

        let data = halve(&mut dual, width, height)?;
        width /= 2;
        height /= 2;
        debug!("Reduced level {level} to {width}x{height}");

        if sub == Some((width, height)) && sub_data.is_none() {
            sub_data = Some(data.clone());
        }
        levels.push((width, height, data));
    }

    if let Some(target) = sub {
        while sub_data.is_none() && (width, height) != target && width >= 2 && height >= 2 {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let data = halve(&mut dual, width, height)?;
            width /= 2;
            height /= 2;
            if (width, height) == target {
                debug!("Reduced subsampled output to {width}x{height}");
                sub_data = Some(data);
            }
        }
    }

    Ok(Some(Chain {
        levels,
        sub: sub_data,
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{ramp_x, randn, rng_fixed_seed};

    fn complete(outcome: BuildOutcome<f64>) -> Pyramid<f64> {
        match outcome {
            BuildOutcome::Complete(p) => p,
            BuildOutcome::Interrupted => panic!("build was interrupted"),
        }
    }

    #[test]
    fn test_constant_pyramid() {
        let builder = PyramidBuilder::from_samples(vec![100.0_f64; 16 * 16], 16, 16)
            .unwrap()
            .depth(2)
            .image_pyramid(true);
        let p = complete(builder.build(&CancelToken::new()).unwrap());

        assert_eq!(p.depth(), 2);
        let sizes: Vec<(usize, usize)> = p.levels().iter().map(|l| (l.width(), l.height())).collect();
        assert_eq!(sizes, vec![(16, 16), (8, 8), (4, 4)]);

        for level in p.levels() {
            assert!(level.coefficients().iter().all(|c| (c - 100.0).abs() < 1e-9));
            let image = level.image().unwrap();
            assert!(image.iter().all(|v| (v - 100.0).abs() < 1e-9));
        }
        assert!(p.subsampled().is_none());
    }

    #[test]
    fn test_level_zero_reproduces_samples() {
        let mut rng = rng_fixed_seed();
        let (w, h) = (12, 9);
        let samples: Vec<f64> = randn(&mut rng, w * h);
        let builder = PyramidBuilder::from_samples(samples.clone(), w, h).unwrap().depth(1);
        let p = complete(builder.build(&CancelToken::new()).unwrap());

        let grid = p.full_resolution().grid();
        for y in 0..h {
            for x in 0..w {
                let v = grid.value_at(x as f64, y as f64).unwrap();
                assert!((v - samples[y * w + x]).abs() < 1e-9);
            }
        }

        // Image pyramid not requested: only full resolution carries samples
        assert_eq!(p.full_resolution().image(), Some(samples.as_slice()));
        assert!(p.levels()[1].image().is_none());
    }

    #[test]
    fn test_small_levels_repeat() {
        let builder = PyramidBuilder::from_samples(ramp_x(16, 16), 16, 16)
            .unwrap()
            .depth(4);
        let p = complete(builder.build(&CancelToken::new()).unwrap());

        assert_eq!(p.levels().len(), 5);
        assert_eq!(p.smallest_width(), 4);
        assert_eq!(p.levels()[3], p.levels()[2]);
        assert_eq!(p.levels()[4], p.levels()[2]);
    }

    #[test]
    fn test_coarse_level_tracks_ramp() {
        // Coarse node x' sits on fine node 2x', so the ramp becomes f(x') = 2x'
        let builder = PyramidBuilder::from_samples(ramp_x(32, 32), 32, 32)
            .unwrap()
            .depth(1)
            .image_pyramid(true);
        let p = complete(builder.build(&CancelToken::new()).unwrap());
        let coarse = &p.levels()[1];
        assert_eq!(coarse.width(), 16);

        let v = coarse.grid().value_at(8.0, 8.0).unwrap();
        assert!((v - 16.0).abs() < 0.01, "{v}");
        let pixel = coarse.pixel(8, 8).unwrap();
        assert!((pixel - 16.0).abs() < 0.01, "{pixel}");
    }

    #[test]
    fn test_landmark_pyramid() {
        let builder = PyramidBuilder::<f64>::empty(64, 32).depth(2);
        let p = complete(builder.build(&CancelToken::new()).unwrap());

        assert_eq!(p.levels().len(), 3);
        assert_eq!(p.smallest_width(), 16);
        assert_eq!(p.smallest_height(), 8);
        for level in p.levels() {
            assert!(level.coefficients().is_empty());
            assert!(level.image().is_none());
            assert_eq!(level.grid().value_at(3.0, 3.0).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_coefficient_pyramid() {
        let (w, h) = (8, 8);
        let builder = PyramidBuilder::from_coefficients(vec![1.0_f64; w * h], w, h)
            .unwrap()
            .depth(1);
        let p = complete(builder.build(&CancelToken::new()).unwrap());

        assert_eq!(p.full_resolution().coefficients(), vec![1.0; w * h].as_slice());
        assert_eq!(p.full_resolution().grid().boundary(), Boundary::Zero);
        assert_eq!(p.levels()[1].width(), 4);
        assert!(p.full_resolution().image().is_none());
    }

    #[test]
    fn test_halvings() {
        let builder = PyramidBuilder::from_samples(vec![7.0_f64; 40 * 24], 40, 24)
            .unwrap()
            .halvings(2)
            .depth(1);
        assert_eq!(builder.working_size(), (10, 6));

        let p = complete(builder.build(&CancelToken::new()).unwrap());
        let full = p.full_resolution();
        assert_eq!((full.width(), full.height()), (10, 6));
        assert!(full.image().unwrap().iter().all(|v| (v - 7.0).abs() < 1e-9));
        // 6 / 2 falls below the minimum level size
        assert_eq!((p.levels()[1].width(), p.levels()[1].height()), (10, 6));
        assert_eq!(p.levels()[1].coefficients(), full.coefficients());
    }

    #[test]
    fn test_subsampled_output() {
        let builder = PyramidBuilder::from_samples(vec![3.0_f64; 40 * 12], 40, 12)
            .unwrap()
            .max_output_size(16)
            .depth(1);
        assert_eq!(builder.subsampled_size(), Some((10, 3)));

        let p = complete(builder.build(&CancelToken::new()).unwrap());
        let sub = p.subsampled().unwrap();
        assert_eq!((sub.width(), sub.height()), (10, 3));
        assert_eq!(sub.coefficients().len(), 30);
        assert!(sub.coefficients().iter().all(|c| (c - 3.0).abs() < 1e-9));
        let image = sub.image().unwrap();
        assert!(image.iter().all(|v| (v - 3.0).abs() < 1e-9));

        // The image pyramid itself was not requested
        assert!(p.levels()[1].image().is_none());
    }

    #[test]
    fn test_thin_field_has_no_subsampled_output() {
        // A single row cannot be halved, whatever its width
        let builder = PyramidBuilder::from_samples(vec![5.0_f64; 40], 40, 1)
            .unwrap()
            .max_output_size(16);
        assert_eq!(builder.subsampled_size(), None);

        let p = complete(builder.build(&CancelToken::new()).unwrap());
        assert!(p.subsampled().is_none());
        let v = p.full_resolution().grid().value_at(3.0, 0.0).unwrap();
        assert!((v - 5.0).abs() < 1e-9);

        // Halving stops once a side reaches one pixel
        let builder = PyramidBuilder::from_samples(vec![5.0_f64; 64 * 2], 64, 2)
            .unwrap()
            .max_output_size(16);
        assert_eq!(builder.subsampled_size(), Some((32, 1)));
        let p = complete(builder.build(&CancelToken::new()).unwrap());
        let sub = p.subsampled().unwrap();
        assert_eq!(sub.coefficients().len(), 32);
        assert!(sub.coefficients().iter().all(|c| (c - 5.0).abs() < 1e-9));
    }

    #[test]
    fn test_cancelled_build() {
        let token = CancelToken::new();
        token.cancel();
        let builder = PyramidBuilder::from_samples(ramp_x(16, 16), 16, 16).unwrap().depth(2);
        assert_eq!(builder.build(&token).unwrap(), BuildOutcome::Interrupted);

        // Nothing to cancel without reduced levels
        let builder = PyramidBuilder::from_samples(ramp_x(16, 16), 16, 16).unwrap();
        assert!(matches!(builder.build(&token).unwrap(), BuildOutcome::Complete(_)));
    }

    #[test]
    fn test_spawned_build() {
        let builder = PyramidBuilder::from_samples(ramp_x(64, 64), 64, 64)
            .unwrap()
            .depth(3)
            .image_pyramid(true);
        let build = builder.spawn().unwrap();
        let p = complete(build.join().unwrap());
        assert_eq!(p.smallest_width(), 8);
    }

    #[test]
    fn test_bad_dimensions() {
        assert_eq!(
            PyramidBuilder::from_samples(vec![0.0_f64; 10], 4, 4).err(),
            Some(ModelError::DimensionMismatch {
                expected: 16,
                found: 10
            })
        );
    }
}
