//! Dunn's post-hoc test for pairwise comparison after Kruskal–Wallis.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF as _, Normal};

use crate::{RankTestError, adjust::PAdjust, rank::Ranking, validate_groups};

/// Pairwise comparison matrices for `k` groups.
///
/// Both matrices are `k × k` and symmetric. The diagonal of `p_values` is 1.0
/// and the diagonal of `z_scores` is 0.0.
#[derive(Debug, Clone, Serialize)]
pub struct PairwiseComparisons {
    /// Absolute z statistic of each pair.
    pub z_scores: Vec<Vec<f64>>,
    /// Adjusted two-sided p-value of each pair.
    pub p_values: Vec<Vec<f64>>,
    /// Adjustment applied to `p_values`.
    pub adjust: PAdjust,
}

impl PairwiseComparisons {
    /// Number of groups compared.
    #[must_use]
    pub fn len(&self) -> usize {
        self.p_values.len()
    }

    /// Returns `true` if no groups were compared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.p_values.is_empty()
    }

    /// Adjusted p-value for the pair `(i, j)`.
    #[must_use]
    pub fn p_value(&self, i: usize, j: usize) -> f64 {
        self.p_values[i][j]
    }
}

/// Runs Dunn's test on every pair of `groups`.
///
/// Ranks are taken over the pooled sample with average ranks for ties, and the
/// variance includes the tie correction. Raw two-sided p-values of the
/// `k(k-1)/2` distinct pairs are adjusted together with `adjust`.
///
/// # Examples
///
/// ```
/// use biasfield_stats::{adjust::PAdjust, dunn};
///
/// let a = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let b = [6.0, 7.0, 8.0, 9.0, 10.0];
/// let c = [11.0, 12.0, 13.0, 14.0, 15.0];
/// let result = dunn::test(&[a, b, c], PAdjust::None).unwrap();
///
/// assert_eq!(result.p_value(0, 0), 1.0);
/// assert_eq!(result.p_value(0, 2), result.p_value(2, 0));
/// assert!((result.z_scores[0][1] - 1.767_767).abs() < 1e-6);
/// assert!(result.p_value(0, 2) < 0.001);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn test<G>(groups: &[G], adjust: PAdjust) -> Result<PairwiseComparisons, RankTestError>
where
    G: AsRef<[f64]>,
{
    validate_groups(groups)?;

    let pooled = groups
        .iter()
        .flat_map(|g| g.as_ref().iter().copied())
        .collect::<Vec<_>>();
    let ranking = Ranking::new(&pooled);
    let n = pooled.len() as f64;

    let variance = n * (n + 1.0) / 12.0 - ranking.tie_term() / (12.0 * (n - 1.0));
    if variance <= 0.0 {
        return Err(RankTestError::AllIdentical);
    }

    let mut offset = 0;
    let mut mean_ranks = Vec::with_capacity(groups.len());
    for group in groups {
        let len = group.as_ref().len();
        let rank_sum = ranking.ranks[offset..offset + len].iter().sum::<f64>();
        mean_ranks.push((rank_sum / len as f64, len as f64));
        offset += len;
    }

    let normal = Normal::new(0.0, 1.0).map_err(|_| RankTestError::InvalidDistribution)?;
    let k = groups.len();
    let mut z_scores = vec![vec![0.0; k]; k];
    let mut pairs = vec![];
    let mut raw_p = vec![];
    for i in 0..k {
        for j in (i + 1)..k {
            let (mean_i, n_i) = mean_ranks[i];
            let (mean_j, n_j) = mean_ranks[j];
            let z = (mean_i - mean_j).abs() / (variance * (1.0 / n_i + 1.0 / n_j)).sqrt();
            z_scores[i][j] = z;
            z_scores[j][i] = z;
            pairs.push((i, j));
            raw_p.push((2.0 * normal.sf(z)).min(1.0));
        }
    }

    let mut p_values = vec![vec![1.0; k]; k];
    for (&(i, j), p) in pairs.iter().zip(adjust.apply(&raw_p)) {
        p_values[i][j] = p;
        p_values[j][i] = p;
    }

    Ok(PairwiseComparisons {
        z_scores,
        p_values,
        adjust,
    })
}
