//! Error type shared by the model, the pyramid builder and the linear algebra kernel.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Dimension mismatch: expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("A pyramid build is already running for this model")]
    BuildInProgress,

    #[error("The pyramid of this model has already been built")]
    AlreadyBuilt,

    #[error("The pyramid of this model has not been built")]
    NotBuilt,

    #[error("The pyramid worker thread panicked")]
    WorkerPanicked,

    #[error("The pyramid worker thread could not be started")]
    WorkerUnavailable,

    #[error(
        "Precomputed weights were prepared for a {expected_x}x{expected_y} lattice, \
         not for the requested one"
    )]
    LatticeMismatch { expected_x: usize, expected_y: usize },
}

/// Check that a row-major buffer holds exactly `width * height` values.
#[inline]
pub(crate) fn check_len<T>(data: &[T], width: usize, height: usize) -> Result<(), ModelError> {
    let expected = width * height;
    if data.len() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            found: data.len(),
        });
    }
    Ok(())
}
