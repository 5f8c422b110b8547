//! Outlier flagging for per-group samples.

use serde::{Deserialize, Serialize};

use crate::{descriptive::DescriptiveStats, percentiles};

/// Rule deciding whether a value is an outlier relative to its sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum OutlierRule {
    /// Tukey fences: outside `[Q1 - k·IQR, Q3 + k·IQR]`.
    Iqr { multiplier: f64 },
    /// `|x - mean| / std_dev` above the threshold (sample standard deviation).
    ZScore { threshold: f64 },
}

impl Default for OutlierRule {
    fn default() -> Self {
        Self::Iqr { multiplier: 1.5 }
    }
}

impl OutlierRule {
    /// Flags each value of `values` (any order) as outlier or not.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::outliers::OutlierRule;
    ///
    /// let values = [10.0, 11.0, 12.0, 11.0, 10.0, 95.0];
    /// let flags = OutlierRule::default().flags(&values);
    /// assert_eq!(flags, [false, false, false, false, false, true]);
    /// ```
    #[must_use]
    pub fn flags(&self, values: &[f64]) -> Vec<bool> {
        match *self {
            Self::Iqr { multiplier } => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let (lower, upper) = iqr_fences(&sorted, multiplier);
                values.iter().map(|&v| v < lower || v > upper).collect()
            }
            Self::ZScore { threshold } => {
                let Some(stats) = DescriptiveStats::new(values.iter().copied()) else {
                    return vec![];
                };
                if stats.std_dev <= 0.0 {
                    return vec![false; values.len()];
                }
                values
                    .iter()
                    .map(|&v| ((v - stats.mean) / stats.std_dev).abs() > threshold)
                    .collect()
            }
        }
    }

    /// Number of outliers among `values`.
    #[must_use]
    pub fn count(&self, values: &[f64]) -> usize {
        self.flags(values).into_iter().filter(|&f| f).count()
    }
}

fn iqr_fences(sorted_values: &[f64], multiplier: f64) -> (f64, f64) {
    let q1 = percentiles::compute_percentile(sorted_values, 25.0);
    let q3 = percentiles::compute_percentile(sorted_values, 75.0);
    let iqr = q3 - q1;
    (q1 - multiplier * iqr, q3 + multiplier * iqr)
}
