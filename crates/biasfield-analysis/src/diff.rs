//! Paired differences between two correction variants.
//!
//! Used to check whether two variants produced (near-)identical statistics,
//! e.g. when a correction run silently reused another variant's output.

use std::collections::BTreeMap;

use biasfield_stats::descriptive::DescriptiveStats;
use serde::Serialize;

use crate::{
    key::{CorrectionVariant, Modality},
    table::CohortTable,
};

/// Default tolerance below which two values count as identical.
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairDiff {
    pub patient_id: String,
    pub modality: Modality,
    pub a: f64,
    pub b: f64,
    /// `|b - a|`
    pub abs_diff: f64,
    /// `abs_diff / mean(a, b)`; `None` when the mean is zero.
    pub rel_diff: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantDiff {
    pub statistic_name: String,
    pub variant_a: CorrectionVariant,
    pub variant_b: CorrectionVariant,
    pub tolerance: f64,
    pub pairs: Vec<PairDiff>,
    /// Pairs dropped because one side was missing or absent.
    pub dropped: usize,
    pub abs_diff_stats: Option<DescriptiveStats>,
    pub rel_diff_stats: Option<DescriptiveStats>,
}

impl VariantDiff {
    /// Pairs whose absolute difference is below the tolerance.
    pub fn near_identical(&self) -> impl Iterator<Item = &PairDiff> {
        self.pairs.iter().filter(|p| p.abs_diff < self.tolerance)
    }
}

/// Pairs rows of `variant_a` and `variant_b` by (patient, modality) and
/// summarizes their differences.
///
/// Diffing a variant against itself pairs every row with itself.
#[must_use]
pub fn diff_variants(
    table: &CohortTable,
    statistic_name: &str,
    variant_a: &CorrectionVariant,
    variant_b: &CorrectionVariant,
    tolerance: f64,
) -> VariantDiff {
    let mut sides = BTreeMap::<(&str, &Modality), (Option<f64>, Option<f64>)>::new();
    for record in table.iter() {
        if record.statistic_name != statistic_name {
            continue;
        }
        let entry = sides
            .entry((record.patient_id.as_str(), &record.modality))
            .or_default();
        if record.correction_variant == *variant_a {
            entry.0 = record.value;
        }
        if record.correction_variant == *variant_b {
            entry.1 = record.value;
        }
    }

    let mut pairs = vec![];
    let mut dropped = 0;
    for ((patient_id, modality), values) in sides {
        let (Some(a), Some(b)) = values else {
            dropped += 1;
            continue;
        };
        let abs_diff = (b - a).abs();
        let mean = f64::midpoint(a, b);
        pairs.push(PairDiff {
            patient_id: patient_id.to_owned(),
            modality: modality.clone(),
            a,
            b,
            abs_diff,
            rel_diff: (mean != 0.0).then(|| abs_diff / mean),
        });
    }

    let abs_diff_stats = DescriptiveStats::new(pairs.iter().map(|p| p.abs_diff));
    let rel_diff_stats = DescriptiveStats::new(pairs.iter().filter_map(|p| p.rel_diff));
    VariantDiff {
        statistic_name: statistic_name.to_owned(),
        variant_a: variant_a.clone(),
        variant_b: variant_b.clone(),
        tolerance,
        pairs,
        dropped,
        abs_diff_stats,
        rel_diff_stats,
    }
}

#[cfg(test)]
mod tests {
    use crate::table::ReductionRecord;

    use super::*;

    fn row(patient_id: &str, variant: &str, value: Option<f64>) -> ReductionRecord {
        ReductionRecord {
            patient_id: patient_id.to_owned(),
            modality: "T2".into(),
            correction_variant: variant.into(),
            statistic_name: "median_nonzero_distance".to_owned(),
            value,
        }
    }

    #[test]
    fn test_pairs_by_patient_and_modality() {
        let table = CohortTable::from_iter([
            row("0001", "N4_Brain_Healthy", Some(10.0)),
            row("0001", "N4_Healthy_Brain", Some(12.0)),
            row("0002", "N4_Brain_Healthy", Some(5.0)),
            row("0002", "N4_Healthy_Brain", Some(5.0)),
            row("0003", "N4_Brain_Healthy", None),
            row("0003", "N4_Healthy_Brain", Some(1.0)),
            row("0004", "N4_Brain_Healthy", Some(1.0)),
            row("0004", "native", Some(1.0)),
        ]);
        let diff = diff_variants(
            &table,
            "median_nonzero_distance",
            &"N4_Brain_Healthy".into(),
            &"N4_Healthy_Brain".into(),
            DEFAULT_TOLERANCE,
        );
        assert_eq!(diff.pairs.len(), 2);
        assert_eq!(diff.dropped, 2);

        let first = &diff.pairs[0];
        assert_eq!(first.abs_diff, 2.0);
        assert_eq!(first.rel_diff, Some(2.0 / 11.0));

        let identical = diff.near_identical().collect::<Vec<_>>();
        assert_eq!(identical.len(), 1);
        assert_eq!(identical[0].patient_id, "0002");
        assert_eq!(diff.abs_diff_stats.unwrap().max, 2.0);
    }

    #[test]
    fn test_variant_against_itself() {
        let table = CohortTable::from_iter([
            row("0001", "native", Some(3.0)),
            row("0002", "native", Some(4.0)),
            row("0003", "native", None),
        ]);
        let diff = diff_variants(
            &table,
            "median_nonzero_distance",
            &"native".into(),
            &"native".into(),
            DEFAULT_TOLERANCE,
        );
        assert_eq!(diff.pairs.len(), 2);
        assert_eq!(diff.dropped, 1);
        assert!(diff.pairs.iter().all(|p| p.abs_diff == 0.0));
        assert_eq!(diff.near_identical().count(), 2);
    }

    #[test]
    fn test_zero_mean_has_no_relative_difference() {
        let table =
            CohortTable::from_iter([row("0001", "a", Some(-1.0)), row("0001", "b", Some(1.0))]);
        let diff = diff_variants(
            &table,
            "median_nonzero_distance",
            &"a".into(),
            &"b".into(),
            DEFAULT_TOLERANCE,
        );
        assert_eq!(diff.pairs[0].rel_diff, None);
        assert!(diff.rel_diff_stats.is_none());
    }
}
