use serde::Serialize;

use crate::{
    descriptive::DescriptiveStats, histogram::Histogram, outliers::OutlierRule,
    percentiles::Percentiles,
};

/// Comprehensive statistical analysis combining multiple measures.
///
/// Combines descriptive statistics, percentile values, an outlier count and a
/// histogram for one sample. Used to summarize a single correction variant of
/// one modality.
///
/// # Examples
///
/// ```
/// use biasfield_stats::{comprehensive::ComprehensiveStats, outliers::OutlierRule};
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
/// let stats = ComprehensiveStats::new(
///     values,
///     &[25.0, 50.0, 75.0],  // Percentiles to compute
///     5,                     // Number of histogram bins
///     OutlierRule::default(),
/// ).unwrap();
///
/// assert_eq!(stats.stats.mean, 5.5);
/// assert_eq!(stats.percentiles.get(50.0), Some(5.5));
/// assert_eq!(stats.outlier_count, 0);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveStats {
    /// Basic descriptive statistics for the dataset.
    pub stats: DescriptiveStats,
    /// Precomputed percentile values for quick lookup.
    pub percentiles: Percentiles,
    /// Number of values flagged by the outlier rule.
    pub outlier_count: usize,
    /// Histogram showing the distribution of values across bins.
    pub histogram: Histogram,
}

impl ComprehensiveStats {
    /// Computes comprehensive statistics from unsorted values.
    ///
    /// Returns `None` if the dataset is empty.
    #[must_use]
    pub fn new<I>(
        values: I,
        percentile_points: &[f64],
        hist_num_bins: usize,
        outlier_rule: OutlierRule,
    ) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted = values.into_iter().collect::<Vec<_>>();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, percentile_points, hist_num_bins, outlier_rule)
    }

    /// Computes comprehensive statistics from pre-sorted values.
    ///
    /// Returns `None` if the dataset is empty.
    #[must_use]
    pub fn from_sorted(
        sorted_values: &[f64],
        percentile_points: &[f64],
        hist_num_bins: usize,
        outlier_rule: OutlierRule,
    ) -> Option<Self> {
        debug_assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let stats = DescriptiveStats::from_sorted(sorted_values)?;
        let percentiles = Percentiles::from_sorted(sorted_values, percentile_points);
        let outlier_count = outlier_rule.count(sorted_values);
        let histogram = Histogram::new(sorted_values.iter().copied(), hist_num_bins, None);

        Some(Self {
            stats,
            percentiles,
            outlier_count,
            histogram,
        })
    }
}
