//! Index folding and grid construction helpers.
use itertools::Itertools;
use num_traits::Float;

use crate::cast;

/// Fold an integer index into `0..len` under half-sample mirror symmetry
/// (`-1 -> 0`, `len -> len - 1`), for any distance outside the range.
///
/// `len` must be nonzero.
#[inline]
pub(crate) fn fold_mirror(p: isize, len: usize) -> usize {
    let n = len as isize;
    let period = 2 * n;
    let q = if p < 0 { -1 - p } else { p } % period;
    (if q >= n { period - 1 - q } else { q }) as usize
}

/// Generates evenly spaced values from start to stop,
/// including the endpoint.
pub fn linspace<T>(start: T, stop: T, n: usize) -> Vec<T>
where
    T: Float,
{
    let dx: T = (stop - start) / cast(n.saturating_sub(1).max(1) as f64);
    (0..n).map(|i| start + cast::<T>(i as f64) * dx).collect()
}

/// Generates a meshgrid in C ordering (x0, y0, x0, y1, ..., xn, yn)
pub fn meshgrid<T>(x: Vec<&Vec<T>>) -> Vec<Vec<T>>
where
    T: Float,
{
    x.into_iter()
        .multi_cartesian_product()
        .map(|xx| xx.iter().map(|y| **y).collect())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fold_mirror() {
        let len = 5;
        for p in 0..5 {
            assert_eq!(fold_mirror(p, len), p as usize);
        }
        assert_eq!(fold_mirror(-1, len), 0);
        assert_eq!(fold_mirror(-2, len), 1);
        assert_eq!(fold_mirror(5, len), 4);
        assert_eq!(fold_mirror(6, len), 3);

        // Symmetric about the half-sample boundary, periodic with 2 * len
        for p in -30..30 {
            let mirrored = 2 * len as isize - 1 - p;
            assert_eq!(fold_mirror(p, len), fold_mirror(mirrored, len));
            assert_eq!(fold_mirror(p, len), fold_mirror(p + 10, len));
        }

        assert_eq!(fold_mirror(-7, 1), 0);
    }

    #[test]
    fn test_linspace() {
        let x = linspace(-1.0_f64, 1.0, 5);
        assert_eq!(x, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(2.0_f64, 3.0, 1), vec![2.0]);
    }

    #[test]
    fn test_meshgrid() {
        let x = vec![0.0_f64, 1.0];
        let y = vec![5.0_f64, 6.0, 7.0];
        let grid = meshgrid(vec![&x, &y]);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0], vec![0.0, 5.0]);
        assert_eq!(grid[5], vec![1.0, 7.0]);
    }
}
