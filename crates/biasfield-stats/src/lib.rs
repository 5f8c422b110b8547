//! Statistical tools for comparing intensity distributions across
//! bias-field correction variants.
//!
//! This crate provides:
//!
//! - **Descriptive statistics**: mean, median, variance, standard deviation, etc.
//! - **Percentiles**: linear-interpolation percentiles and a selection-based median
//! - **Histograms**: equal-width frequency distributions
//! - **Joint histograms**: 2D frequency grids of paired values and their center of mass
//! - **Outliers**: IQR (Tukey fence) and z-score outlier flagging
//! - **Comprehensive statistics**: descriptive statistics, percentiles, outliers and
//!   a histogram in one pass
//! - **Rank tests**: the Kruskal–Wallis H test and Dunn's post-hoc test with
//!   multiple-comparison adjustment
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and storage
//! - [`histogram`]: Histogram construction for visualizing data distributions
//! - [`histogram2d`]: Joint histograms of paired values
//! - [`outliers`]: Outlier rules
//! - [`comprehensive`]: Comprehensive statistical analysis combining multiple measures
//! - [`rank`]: Average ranks with tie bookkeeping
//! - [`kruskal`]: Kruskal–Wallis H test
//! - [`dunn`]: Dunn's pairwise test
//! - [`adjust`]: Bonferroni and Holm p-value adjustment
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use biasfield_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Comparing groups
//!
//! ```
//! use biasfield_stats::{adjust::PAdjust, dunn, kruskal::KruskalWallis};
//!
//! let groups = [
//!     vec![1.0, 2.0, 3.0, 4.0, 5.0],
//!     vec![1.5, 2.5, 3.5, 4.5, 5.5],
//!     vec![20.0, 21.0, 22.0, 23.0, 24.0],
//! ];
//! let kw = KruskalWallis::test(&groups).unwrap();
//! assert!(kw.p_value < 0.05);
//!
//! let pairwise = dunn::test(&groups, PAdjust::Bonferroni).unwrap();
//! assert!(pairwise.p_value(0, 1) > 0.05);
//! ```

pub mod adjust;
pub mod comprehensive;
pub mod descriptive;
pub mod dunn;
pub mod histogram;
pub mod histogram2d;
pub mod kruskal;
pub mod outliers;
pub mod percentiles;
pub mod rank;

/// Reasons a rank-based test cannot be computed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum RankTestError {
    #[display("at least two groups are required, got {groups}")]
    InsufficientGroups { groups: usize },
    #[display("group {index} is empty")]
    EmptyGroup { index: usize },
    #[display("group {index} contains a non-finite value")]
    NonFinite { index: usize },
    #[display("all values are identical")]
    AllIdentical,
    #[display("reference distribution could not be constructed")]
    InvalidDistribution,
}

pub(crate) fn validate_groups<G>(groups: &[G]) -> Result<(), RankTestError>
where
    G: AsRef<[f64]>,
{
    if groups.len() < 2 {
        return Err(RankTestError::InsufficientGroups {
            groups: groups.len(),
        });
    }
    for (index, group) in groups.iter().enumerate() {
        let group = group.as_ref();
        if group.is_empty() {
            return Err(RankTestError::EmptyGroup { index });
        }
        if group.iter().any(|v| !v.is_finite()) {
            return Err(RankTestError::NonFinite { index });
        }
    }
    Ok(())
}
