//! Comparison of correction variants within one table slice.

use biasfield_stats::{
    RankTestError,
    adjust::PAdjust,
    dunn::{self, PairwiseComparisons},
    kruskal::KruskalWallis,
};
use serde::{Deserialize, Serialize};

use crate::{
    key::{CorrectionVariant, Modality},
    table::CohortTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Significance level gating the post-hoc test.
    pub alpha: f64,
    pub adjust: PAdjust,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            adjust: PAdjust::Bonferroni,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSize {
    pub variant: CorrectionVariant,
    pub count: usize,
}

/// Pairwise adjusted p-values indexed by variant label.
#[derive(Debug, Clone, Serialize)]
pub struct PairwiseMatrix {
    pub labels: Vec<CorrectionVariant>,
    #[serde(flatten)]
    pub comparisons: PairwiseComparisons,
}

impl PairwiseMatrix {
    /// Adjusted p-value between two variants, `None` if either is absent.
    #[must_use]
    pub fn p_value(&self, a: &CorrectionVariant, b: &CorrectionVariant) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.comparisons.p_value(i, j))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub group_sizes: Vec<GroupSize>,
    pub kruskal: KruskalWallis,
    pub alpha: f64,
    /// Present only when the omnibus p-value is below `alpha`.
    pub pairwise: Option<PairwiseMatrix>,
}

impl Comparison {
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.kruskal.p_value < self.alpha
    }
}

#[derive(Debug, Clone, Serialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ComparisonResult {
    NotComputable {
        reason: String,
        group_sizes: Vec<GroupSize>,
    },
    Computed(Comparison),
}

/// Comparison of one (modality, statistic) slice.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub modality: Modality,
    pub statistic_name: String,
    pub result: ComparisonResult,
}

/// Compares the correction variants of one (modality, statistic) slice.
///
/// Missing and non-finite values are dropped; variants left without values
/// are excluded. Fewer than two remaining groups, or a slice whose values are
/// all identical, is reported as [`ComparisonResult::NotComputable`].
#[must_use]
pub fn compare(
    table: &CohortTable,
    modality: &Modality,
    statistic_name: &str,
    options: &CompareOptions,
) -> ComparisonResult {
    let mut labels = vec![];
    let mut groups = vec![];
    for (variant, records) in table.slice_by_variant(modality, statistic_name) {
        let values = records
            .iter()
            .filter_map(|r| r.value)
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        if !values.is_empty() {
            labels.push(variant.clone());
            groups.push(values);
        }
    }
    let group_sizes = labels
        .iter()
        .zip(&groups)
        .map(|(variant, values)| GroupSize {
            variant: variant.clone(),
            count: values.len(),
        })
        .collect::<Vec<_>>();

    let not_computable = |err: RankTestError, group_sizes| ComparisonResult::NotComputable {
        reason: err.to_string(),
        group_sizes,
    };

    let kruskal = match KruskalWallis::test(&groups) {
        Ok(kruskal) => kruskal,
        Err(err) => return not_computable(err, group_sizes),
    };

    let pairwise = if kruskal.p_value < options.alpha {
        match dunn::test(&groups, options.adjust) {
            Ok(comparisons) => Some(PairwiseMatrix {
                labels,
                comparisons,
            }),
            Err(err) => return not_computable(err, group_sizes),
        }
    } else {
        None
    };

    ComparisonResult::Computed(Comparison {
        group_sizes,
        kruskal,
        alpha: options.alpha,
        pairwise,
    })
}

/// Runs [`compare`] on every (modality, statistic) slice of `table`, or only
/// on the given statistic names when `statistic_names` is non-empty.
#[must_use]
pub fn compare_all(
    table: &CohortTable,
    statistic_names: &[String],
    options: &CompareOptions,
) -> Vec<ComparisonReport> {
    let names = if statistic_names.is_empty() {
        table
            .statistic_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    } else {
        statistic_names.to_vec()
    };
    let mut reports = vec![];
    for modality in table.modalities() {
        for statistic_name in &names {
            reports.push(ComparisonReport {
                modality: modality.clone(),
                statistic_name: statistic_name.clone(),
                result: compare(table, modality, statistic_name, options),
            });
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use crate::{synthetic::SyntheticCohort, table::ReductionRecord};

    use super::*;

    const STAT: &str = "median_nonzero_distance";

    fn table(groups: &[(&str, &[Option<f64>])]) -> CohortTable {
        groups
            .iter()
            .flat_map(|(variant, values)| {
                values
                    .iter()
                    .enumerate()
                    .map(move |(i, &value)| ReductionRecord {
                        patient_id: format!("{i:04}"),
                        modality: "T1".into(),
                        correction_variant: (*variant).into(),
                        statistic_name: STAT.to_owned(),
                        value,
                    })
            })
            .collect()
    }

    #[test]
    fn test_single_group_is_not_computable() {
        let table = table(&[
            ("native", &[Some(1.0), Some(2.0)]),
            ("N4_Brain", &[None, None]),
        ]);
        let result = compare(&table, &"T1".into(), STAT, &CompareOptions::default());
        let ComparisonResult::NotComputable { group_sizes, .. } = result else {
            panic!("expected NotComputable, got {result:?}");
        };
        assert_eq!(
            group_sizes,
            [GroupSize {
                variant: "native".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_identical_values_are_not_computable() {
        let table = table(&[
            ("native", &[Some(3.0), Some(3.0)]),
            ("N4_Brain", &[Some(3.0)]),
        ]);
        let result = compare(&table, &"T1".into(), STAT, &CompareOptions::default());
        assert!(result.is_not_computable());
    }

    #[test]
    fn test_separated_groups_get_pairwise_matrix() {
        let a = (0..8).map(|i| Some(f64::from(i))).collect::<Vec<_>>();
        let b = (0..8).map(|i| Some(f64::from(i) + 0.5)).collect::<Vec<_>>();
        let c = (0..8).map(|i| Some(f64::from(i) + 100.0)).collect::<Vec<_>>();
        let table = table(&[("native", &a), ("N4_Brain", &b), ("N4_Healthy", &c)]);

        let result = compare(&table, &"T1".into(), STAT, &CompareOptions::default());
        let ComparisonResult::Computed(comparison) = result else {
            panic!("expected Computed, got {result:?}");
        };
        assert!(comparison.is_significant());
        assert_eq!(comparison.kruskal.df, 2);

        let matrix = comparison.pairwise.unwrap();
        // Labels follow sorted variant order
        let labels = matrix
            .labels
            .iter()
            .map(CorrectionVariant::as_str)
            .collect::<Vec<_>>();
        assert_eq!(labels, ["N4_Brain", "N4_Healthy", "native"]);

        let native = CorrectionVariant::from("native");
        let brain = CorrectionVariant::from("N4_Brain");
        let healthy = CorrectionVariant::from("N4_Healthy");
        assert_eq!(matrix.p_value(&native, &native), Some(1.0));
        assert_eq!(
            matrix.p_value(&native, &healthy),
            matrix.p_value(&healthy, &native)
        );
        assert!(matrix.p_value(&native, &healthy).unwrap() < 0.05);
        assert!(matrix.p_value(&native, &brain).unwrap() > 0.05);
        assert_eq!(matrix.p_value(&native, &"N3".into()), None);
    }

    #[test]
    fn test_no_pairwise_matrix_above_alpha() {
        let table = table(&[
            ("native", &[Some(1.0), Some(4.0), Some(5.0)]),
            ("N4_Brain", &[Some(2.0), Some(3.0), Some(6.0)]),
        ]);
        let result = compare(&table, &"T1".into(), STAT, &CompareOptions::default());
        let ComparisonResult::Computed(comparison) = result else {
            panic!("expected Computed, got {result:?}");
        };
        assert!(!comparison.is_significant());
        assert!(comparison.pairwise.is_none());
    }

    #[test]
    fn test_synthetic_identical_variants_rarely_differ() {
        let trials = 100_u64;
        let mut not_rejected = 0;
        for seed in 0..trials {
            let cohort = SyntheticCohort {
                patients: 10,
                seed,
                ..SyntheticCohort::default()
            };
            let table = cohort.generate();
            let result = compare(
                &table,
                &"T1".into(),
                &cohort.statistic_name,
                &CompareOptions::default(),
            );
            let ComparisonResult::Computed(comparison) = result else {
                panic!("expected Computed, got {result:?}");
            };
            if !comparison.is_significant() {
                not_rejected += 1;
            }
        }
        assert!(not_rejected * 10 > trials * 9, "{not_rejected}/{trials}");
    }

    #[test]
    fn test_compare_all_covers_every_slice() {
        let table = SyntheticCohort::default().generate();
        let reports = compare_all(&table, &[], &CompareOptions::default());
        assert_eq!(reports.len(), table.modalities().len());
        let reports = compare_all(&table, &["unknown".to_owned()], &CompareOptions::default());
        assert!(reports.iter().all(|r| r.result.is_not_computable()));
    }
}
