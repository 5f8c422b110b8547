//! Equal-width histograms.

use std::ops::Range;

use serde::Serialize;

/// Counts of values falling into equal-width bins over a fixed range.
///
/// Every bin is half-open except the last, which also holds the upper bound
/// of the range. Values outside the range, and non-finite values, are not
/// binned; they are counted in `out_of_range`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    pub out_of_range: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub range: Range<f64>,
    pub count: u64,
}

impl Histogram {
    /// Bins `values` into `num_bins` equal-width bins over `range`.
    ///
    /// Without an explicit range the bins span the minimum to the maximum of
    /// the finite values; a single distinct value `v` spans
    /// `[v - 0.5, v + 0.5]`. Zero bins, an empty or non-finite range, or no
    /// finite values without an explicit range yield a histogram without
    /// bins.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::histogram::Histogram;
    ///
    /// let histogram = Histogram::new([0.0, 1.0, 1.5, 3.0, 4.0], 4, None);
    /// let counts = histogram.bins.iter().map(|b| b.count).collect::<Vec<_>>();
    /// assert_eq!(counts, [1, 2, 0, 2]);
    /// assert_eq!(histogram.bins[3].range, 3.0..4.0);
    /// ```
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new<I>(values: I, num_bins: usize, range: Option<Range<f64>>) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        let bounds = range
            .or_else(|| finite_bounds(&values))
            .filter(|r| num_bins > 0 && r.start.is_finite() && r.end.is_finite())
            .filter(|r| r.start < r.end);
        let Some(Range { start, end }) = bounds else {
            return Self {
                bins: vec![],
                out_of_range: values.len() as u64,
            };
        };

        let width = (end - start) / num_bins as f64;
        let edge = |i: usize| {
            if i == num_bins {
                end
            } else {
                start + i as f64 * width
            }
        };
        let mut bins = (0..num_bins)
            .map(|i| HistogramBin {
                range: edge(i)..edge(i + 1),
                count: 0,
            })
            .collect::<Vec<_>>();

        let mut out_of_range = 0;
        for value in values {
            if !(start..=end).contains(&value) {
                out_of_range += 1;
                continue;
            }
            let idx = (((value - start) / width) as usize).min(num_bins - 1);
            bins[idx].count += 1;
        }

        Self { bins, out_of_range }
    }

    /// Number of values that landed in a bin.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.bins.iter().map(|bin| bin.count).sum()
    }

    /// Largest single-bin count, used to scale text renderings.
    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.bins.iter().map(|bin| bin.count).max().unwrap_or(0)
    }
}

pub(crate) fn finite_bounds(values: &[f64]) -> Option<Range<f64>> {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let first = finite.next()?;
    let (min, max) = finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(if min < max {
        min..max
    } else {
        min - 0.5..max + 0.5
    })
}
