//! Per-axis weight tables for repeated evaluation on a fixed lattice.
//!
//! Evaluation lattices used during registration place `xdim x ydim` nodes
//! uniformly over `intervals` spline units, offset by one unit:
//! node `u` sits at `u * intervals / (xdim - 1) + 1`. Since every node of a
//! column shares its x weights (and every node of a row its y weights), the
//! table only stores `xdim + ydim` entries.
use log::trace;
use num_traits::Float;

use super::{AxisWeights, Boundary, CoefficientGrid, Hessian, Neighborhood};
use crate::cast;
use crate::error::ModelError;

/// Precomputed indices and weights for a `xdim x ydim` evaluation lattice.
#[derive(Clone, Debug)]
pub struct PrecomputedWeights<T> {
    xdim: usize,
    ydim: usize,
    intervals: usize,
    width: usize,
    height: usize,
    x: Vec<AxisWeights<T>>,
    y: Vec<AxisWeights<T>>,
}

impl<T: Float> PrecomputedWeights<T> {
    /// Build tables for the lattice `(xdim, ydim, intervals)` on a coefficient
    /// grid of `width x height` with the given boundary treatment.
    pub fn new(
        ydim: usize,
        xdim: usize,
        intervals: usize,
        width: usize,
        height: usize,
        boundary: Boundary,
    ) -> Result<Self, ModelError> {
        if xdim == 0 || ydim == 0 {
            return Err(ModelError::InvalidArgument(
                "Evaluation lattice must have at least one node per axis",
            ));
        }

        let y = (0..ydim)
            .map(|v| AxisWeights::new(lattice_coordinate(v, ydim, intervals), height, boundary))
            .collect::<Result<Vec<_>, _>>()?;
        let x = (0..xdim)
            .map(|u| AxisWeights::new(lattice_coordinate(u, xdim, intervals), width, boundary))
            .collect::<Result<Vec<_>, _>>()?;

        trace!("Precomputed {xdim}x{ydim} lattice weights over {intervals} intervals");

        Ok(Self {
            xdim,
            ydim,
            intervals,
            width,
            height,
            x,
            y,
        })
    }

    pub fn xdim(&self) -> usize {
        self.xdim
    }

    pub fn ydim(&self) -> usize {
        self.ydim
    }

    pub fn intervals(&self) -> usize {
        self.intervals
    }

    /// Whether the tables were built for exactly this lattice.
    pub fn is_valid_for(&self, xdim: usize, ydim: usize, intervals: usize) -> bool {
        self.xdim == xdim && self.ydim == ydim && self.intervals == intervals
    }

    /// Error unless the tables were built for exactly this lattice.
    pub fn ensure_lattice(
        &self,
        xdim: usize,
        ydim: usize,
        intervals: usize,
    ) -> Result<(), ModelError> {
        if self.is_valid_for(xdim, ydim, intervals) {
            Ok(())
        } else {
            Err(ModelError::LatticeMismatch {
                expected_x: self.xdim,
                expected_y: self.ydim,
            })
        }
    }

    /// Stored neighborhood of lattice node `(u, v)`.
    #[inline]
    pub fn neighborhood(&self, u: usize, v: usize) -> Result<Neighborhood<T>, ModelError> {
        match (self.x.get(u), self.y.get(v)) {
            (Some(&x), Some(&y)) => Ok(Neighborhood { x, y }),
            _ => Err(ModelError::InvalidArgument("Lattice node out of range")),
        }
    }

    fn check_grid(&self, grid: &CoefficientGrid<'_, T>) -> Result<(), ModelError> {
        if grid.width() != self.width || grid.height() != self.height {
            return Err(ModelError::DimensionMismatch {
                expected: self.width * self.height,
                found: grid.width() * grid.height(),
            });
        }
        Ok(())
    }

    /// Interpolated value at lattice node `(u, v)`.
    pub fn value(&self, grid: &CoefficientGrid<'_, T>, u: usize, v: usize) -> Result<T, ModelError> {
        self.check_grid(grid)?;
        Ok(grid.value(&self.neighborhood(u, v)?))
    }

    /// Gradient `[d/dx, d/dy]` at lattice node `(u, v)`.
    pub fn gradient(
        &self,
        grid: &CoefficientGrid<'_, T>,
        u: usize,
        v: usize,
    ) -> Result<[T; 2], ModelError> {
        self.check_grid(grid)?;
        Ok(grid.gradient(&self.neighborhood(u, v)?))
    }

    pub fn value_and_gradient(
        &self,
        grid: &CoefficientGrid<'_, T>,
        u: usize,
        v: usize,
    ) -> Result<(T, [T; 2]), ModelError> {
        self.check_grid(grid)?;
        Ok(grid.value_and_gradient(&self.neighborhood(u, v)?))
    }

    pub fn hessian(
        &self,
        grid: &CoefficientGrid<'_, T>,
        u: usize,
        v: usize,
    ) -> Result<Hessian<T>, ModelError> {
        self.check_grid(grid)?;
        Ok(grid.hessian(&self.neighborhood(u, v)?))
    }
}

/// Spline coordinate of node `k` on an axis of `dim` lattice nodes.
#[inline]
fn lattice_coordinate<T: Float>(k: usize, dim: usize, intervals: usize) -> T {
    if dim == 1 {
        return T::one();
    }
    cast::<T>(k as f64) * cast(intervals as f64) / cast((dim - 1) as f64) + T::one()
}
