//! Multiple-comparison p-value adjustment.

use serde::{Deserialize, Serialize};

/// Family-wise error correction applied to a set of p-values.
///
/// Parsed case-insensitively from its name (`bonferroni`, `holm`, `none`).
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum PAdjust {
    /// Multiply every p-value by the number of comparisons.
    #[default]
    #[display("bonferroni")]
    Bonferroni,
    /// Holm's step-down procedure.
    #[display("holm")]
    Holm,
    /// Leave p-values untouched.
    #[display("none")]
    None,
}

impl PAdjust {
    /// Returns the adjusted p-values, in input order, capped at 1.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_stats::adjust::PAdjust;
    ///
    /// let p = [0.01, 0.04, 0.03];
    /// assert_eq!(PAdjust::Bonferroni.apply(&p), [0.03, 0.12, 0.09]);
    /// assert_eq!(PAdjust::Holm.apply(&p), [0.03, 0.06, 0.06]);
    /// assert_eq!(PAdjust::None.apply(&p), p);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn apply(self, p_values: &[f64]) -> Vec<f64> {
        let m = p_values.len() as f64;
        match self {
            Self::None => p_values.to_vec(),
            Self::Bonferroni => p_values.iter().map(|&p| (p * m).min(1.0)).collect(),
            Self::Holm => {
                let mut order = (0..p_values.len()).collect::<Vec<_>>();
                order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

                let mut adjusted = vec![0.0; p_values.len()];
                let mut running_max = 0.0_f64;
                for (rank, &idx) in order.iter().enumerate() {
                    let scaled = ((m - rank as f64) * p_values[idx]).min(1.0);
                    running_max = running_max.max(scaled);
                    adjusted[idx] = running_max;
                }
                adjusted
            }
        }
    }
}
