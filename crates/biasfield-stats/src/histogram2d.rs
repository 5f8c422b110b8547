//! Joint histograms of paired values.

use std::ops::Range;

use serde::Serialize;

use crate::histogram::finite_bounds;

/// Counts of `(x, y)` pairs over a grid of equal-width bins.
///
/// Each axis spans the minimum to the maximum of its values, widened by
/// `±0.5` when all values are equal. As in [`Histogram`](crate::histogram::Histogram)
/// the last bin of an axis also holds its upper bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram2d {
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub x_bins: usize,
    pub y_bins: usize,
    /// Row-major counts, `counts[i * y_bins + j]` for x bin `i` and y bin `j`.
    pub counts: Vec<u64>,
}

impl Histogram2d {
    /// Bins the pairs `(xs[k], ys[k])` into `x_bins × y_bins` bins.
    ///
    /// Returns `None` when the slices differ in length, hold no pairs or a
    /// non-finite value, or when either bin count is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::histogram2d::Histogram2d;
    ///
    /// let hist = Histogram2d::new(&[0.0, 0.0, 1.0, 2.0], &[0.0, 1.0, 1.0, 3.0], 2, 2).unwrap();
    /// assert_eq!(hist.counts, [2, 0, 1, 1]);
    /// assert_eq!(hist.center_of_mass(), Some((1.0, 1.125)));
    /// ```
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(xs: &[f64], ys: &[f64], x_bins: usize, y_bins: usize) -> Option<Self> {
        if xs.len() != ys.len() || x_bins == 0 || y_bins == 0 {
            return None;
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite()) {
            return None;
        }
        let x_range = finite_bounds(xs)?;
        let y_range = finite_bounds(ys)?;

        let bin_of = |value: f64, range: &Range<f64>, bins: usize| {
            let width = (range.end - range.start) / bins as f64;
            (((value - range.start) / width) as usize).min(bins - 1)
        };
        let mut counts = vec![0; x_bins * y_bins];
        for (&x, &y) in xs.iter().zip(ys) {
            let i = bin_of(x, &x_range, x_bins);
            let j = bin_of(y, &y_range, y_bins);
            counts[i * y_bins + j] += 1;
        }

        Some(Self {
            x_range,
            y_range,
            x_bins,
            y_bins,
            counts,
        })
    }

    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[must_use]
    pub fn count(&self, i: usize, j: usize) -> u64 {
        self.counts[i * self.y_bins + j]
    }

    /// Count-weighted mean of the bin centers, `(x, y)`.
    ///
    /// Returns `None` for an empty histogram.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn center_of_mass(&self) -> Option<(f64, f64)> {
        let total = self.total_count();
        if total == 0 {
            return None;
        }
        let x_centers = bin_centers(&self.x_range, self.x_bins);
        let y_centers = bin_centers(&self.y_range, self.y_bins);
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        for (i, &cx) in x_centers.iter().enumerate() {
            for (j, &cy) in y_centers.iter().enumerate() {
                let count = self.count(i, j) as f64;
                sum_x += cx * count;
                sum_y += cy * count;
            }
        }
        Some((sum_x / total as f64, sum_y / total as f64))
    }
}

#[expect(clippy::cast_precision_loss)]
fn bin_centers(range: &Range<f64>, bins: usize) -> Vec<f64> {
    let width = (range.end - range.start) / bins as f64;
    let edge = |i: usize| {
        if i == bins {
            range.end
        } else {
            range.start + i as f64 * width
        }
    };
    (0..bins).map(|i| f64::midpoint(edge(i), edge(i + 1))).collect()
}
