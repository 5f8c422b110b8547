use serde::Serialize;

/// Precomputed percentile values for a dataset.
///
/// This structure stores percentile-value pairs for efficient lookup
/// of commonly used percentile points.
///
/// # Examples
///
/// ```
/// use biasfield_stats::percentiles::Percentiles;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
///
/// assert_eq!(percentiles.get(50.0), Some(3.0));
/// assert_eq!(percentiles.get(25.0), Some(2.0));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Percentiles {
    /// Percentile-value pairs, in the order they were requested.
    /// Each tuple contains (percentile, value) where percentile is 0.0-100.0.
    values: Vec<(f64, f64)>,
}

impl Percentiles {
    /// Computes percentiles from sorted values.
    ///
    /// # Arguments
    ///
    /// * `sorted_values` - Values sorted in ascending order
    /// * `percentile_points` - The percentile points to compute (e.g., [25.0, 50.0, 75.0])
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], percentile_points: &[f64]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let values = percentile_points
            .iter()
            .map(|&p| (p, compute_percentile(sorted_values, p)))
            .collect();
        Self { values }
    }

    /// Computes percentiles from unsorted values.
    ///
    /// This method will sort the values internally before computing percentiles.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::percentiles::Percentiles;
    ///
    /// let values = vec![5.0, 2.0, 8.0, 1.0, 9.0];
    /// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
    ///
    /// assert_eq!(percentiles.get(50.0), Some(5.0));
    /// ```
    #[must_use]
    pub fn new(values: &[f64], percentile_points: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, percentile_points)
    }

    /// Gets the value at a specific percentile.
    ///
    /// Returns `None` if the percentile was not precomputed.
    #[must_use]
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.values.iter().find_map(|(p, value)| {
            if (*p - percentile).abs() < f64::EPSILON {
                Some(*value)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over all (percentile, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().copied()
    }

    /// Returns all percentile-value pairs as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[(f64, f64)] {
        &self.values
    }
}

/// Computes a single percentile value from sorted data.
///
/// Uses linear interpolation between the two closest ranks, the same
/// convention as numpy's default `percentile` and pandas' `quantile`:
/// the k-th percentile sits at fractional position `(n - 1) * k / 100`.
///
/// Returns `f64::NAN` if the input is empty.
///
/// # Examples
///
/// ```
/// use biasfield_stats::percentiles::compute_percentile;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0];
///
/// assert_eq!(compute_percentile(&values, 50.0), 2.5);
/// assert_eq!(compute_percentile(&values, 0.0), 1.0);
/// assert_eq!(compute_percentile(&values, 100.0), 4.0);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }
    let last = sorted_values.len() - 1;
    let position = (last as f64 * percentile.clamp(0.0, 100.0)) / 100.0;
    let lo = (position.floor() as usize).min(last);
    let hi = (position.ceil() as usize).min(last);
    let frac = position - lo as f64;
    sorted_values[lo] + (sorted_values[hi] - sorted_values[lo]) * frac
}

/// Computes the median of `values`, reordering the slice in place.
///
/// An even number of values yields the mean of the two middle values.
/// Runs in linear time using selection rather than a full sort, which matters
/// for whole-volume medians over millions of voxels.
///
/// Returns `None` if `values` is empty or contains a NaN.
///
/// # Examples
///
/// ```
/// use biasfield_stats::percentiles::median_in_place;
///
/// let mut odd = vec![10.0, 5.0, 7.0];
/// assert_eq!(median_in_place(&mut odd), Some(7.0));
///
/// let mut even = vec![10.0, 5.0];
/// assert_eq!(median_in_place(&mut even), Some(7.5));
///
/// assert_eq!(median_in_place(&mut []), None);
/// assert_eq!(median_in_place(&mut [1.0, f64::NAN, 3.0]), None);
/// ```
#[must_use]
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 || values.iter().any(|v| v.is_nan()) {
        return None;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(f64::midpoint(lower_max, upper))
}

/// Computes the median of an iterator of values.
///
/// Convenience wrapper around [`median_in_place`] that collects the values first.
#[must_use]
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut values = values.into_iter().collect::<Vec<_>>();
    median_in_place(&mut values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_averages_middle_pair() {
        assert_eq!(median([5.0, 10.0]), Some(7.5));
        assert_eq!(median([4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_median_odd_and_duplicates() {
        assert_eq!(median([5.0]), Some(5.0));
        assert_eq!(median([2.0, 2.0, 2.0, 9.0, 1.0]), Some(2.0));
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(std::iter::empty()), None);
    }

    #[test]
    fn test_median_with_nan_is_missing() {
        assert_eq!(median([1.0, f64::NAN, 3.0]), None);
        assert_eq!(median([f64::NAN]), None);
        assert_eq!(median([1.0, f64::INFINITY, 3.0]), Some(3.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert!((compute_percentile(&values, 25.0) - 10.0).abs() < 1e-12);
        assert!((compute_percentile(&values, 10.0) - 4.0).abs() < 1e-12);
        assert!((compute_percentile(&values, 95.0) - 38.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_empty_is_nan() {
        assert!(compute_percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_percentiles_lookup() {
        let p = Percentiles::new(&[3.0, 1.0, 2.0], &[50.0, 90.0]);
        assert_eq!(p.get(50.0), Some(2.0));
        assert_eq!(p.get(75.0), None);
        assert_eq!(p.as_slice().len(), 2);
    }
}
