//! Kruskal–Wallis H test.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF as _};

use crate::{RankTestError, rank::Ranking, validate_groups};

/// Result of a Kruskal–Wallis H test over `k` independent groups.
///
/// The test asks whether the groups come from the same distribution without
/// assuming normality. The statistic is corrected for ties and the p-value
/// uses the χ² approximation with `k - 1` degrees of freedom.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KruskalWallis {
    /// Tie-corrected H statistic.
    pub statistic: f64,
    /// Degrees of freedom (`k - 1`).
    pub df: usize,
    /// Upper-tail χ² probability of `statistic`.
    pub p_value: f64,
}

impl KruskalWallis {
    /// Runs the test on `groups`.
    ///
    /// Every group must be non-empty and contain only finite values, and at
    /// least two groups are required.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::kruskal::KruskalWallis;
    ///
    /// let a = [2.9, 3.0, 2.5, 2.6, 3.2];
    /// let b = [3.8, 2.7, 4.0, 2.4];
    /// let c = [2.8, 3.4, 3.7, 2.2, 2.0];
    /// let result = KruskalWallis::test(&[&a[..], &b[..], &c[..]]).unwrap();
    /// assert_eq!(result.df, 2);
    /// assert!((result.statistic - 0.771_428_571).abs() < 1e-6);
    /// assert!((result.p_value - 0.679_965).abs() < 1e-5);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    pub fn test<G>(groups: &[G]) -> Result<Self, RankTestError>
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

        let correction = 1.0 - ranking.tie_term() / (n * n * n - n);
        if correction <= 0.0 {
            return Err(RankTestError::AllIdentical);
        }

        let mut offset = 0;
        let mut sum_term = 0.0;
        for group in groups {
            let len = group.as_ref().len();
            let rank_sum = ranking.ranks[offset..offset + len].iter().sum::<f64>();
            sum_term += rank_sum * rank_sum / len as f64;
            offset += len;
        }

        let h = (12.0 / (n * (n + 1.0)) * sum_term - 3.0 * (n + 1.0)) / correction;
        let df = groups.len() - 1;
        let chi2 = ChiSquared::new(df as f64).map_err(|_| RankTestError::InvalidDistribution)?;
        let p_value = chi2.sf(h);

        Ok(Self {
            statistic: h,
            df,
            p_value,
        })
    }
}
