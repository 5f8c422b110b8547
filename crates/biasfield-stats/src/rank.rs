//! Average ranks with tie bookkeeping, shared by the rank-based tests.

/// Ranks of a pooled sample.
///
/// Tied values receive the average of the ranks they span (1-based), the
/// convention used by Kruskal–Wallis and Dunn's test.
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Rank of each input value, in input order.
    pub ranks: Vec<f64>,
    /// Size of every tie group (groups of size 1 included).
    pub tie_sizes: Vec<usize>,
}

impl Ranking {
    /// Ranks `values`.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::rank::Ranking;
    ///
    /// let ranking = Ranking::new(&[10.0, 20.0, 10.0, 30.0]);
    /// assert_eq!(ranking.ranks, [1.5, 3.0, 1.5, 4.0]);
    /// assert_eq!(ranking.tie_term(), 6.0);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(values: &[f64]) -> Self {
        let mut order = (0..values.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

        let mut ranks = vec![0.0; values.len()];
        let mut tie_sizes = vec![];
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && values[order[end]] == values[order[start]] {
                end += 1;
            }
            // Ranks start..end (0-based) average to (start + end + 1) / 2 in 1-based terms
            let rank = (start + end + 1) as f64 / 2.0;
            for &idx in &order[start..end] {
                ranks[idx] = rank;
            }
            tie_sizes.push(end - start);
            start = end;
        }

        Self { ranks, tie_sizes }
    }

    /// `Σ (t³ - t)` over tie groups; zero when all values are distinct.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn tie_term(&self) -> f64 {
        self.tie_sizes
            .iter()
            .map(|&t| {
                let t = t as f64;
                t * t * t - t
            })
            .sum()
    }
}
