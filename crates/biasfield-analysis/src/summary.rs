//! Per-variant descriptive summaries of one statistic.

use biasfield_stats::{comprehensive::ComprehensiveStats, outliers::OutlierRule};
use serde::{Deserialize, Serialize};

use crate::{
    key::{CorrectionVariant, Modality},
    table::CohortTable,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    pub percentiles: Vec<f64>,
    pub histogram_bins: usize,
    pub outlier_rule: OutlierRule,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            percentiles: vec![25.0, 50.0, 75.0],
            histogram_bins: 10,
            outlier_rule: OutlierRule::default(),
        }
    }
}

/// Distribution of one statistic for one (modality, variant) group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub modality: Modality,
    pub variant: CorrectionVariant,
    pub missing: usize,
    /// `None` when every value of the group is missing.
    pub stats: Option<ComprehensiveStats>,
}

impl GroupSummary {
    #[must_use]
    pub fn count(&self) -> usize {
        self.stats.as_ref().map_or(0, |s| s.stats.count)
    }
}

/// Summarizes `statistic_name` for every (modality, variant) group.
#[must_use]
pub fn summarize(
    table: &CohortTable,
    statistic_name: &str,
    options: &SummaryOptions,
) -> Vec<GroupSummary> {
    let mut summaries = vec![];
    for modality in table.modalities() {
        for (variant, records) in table.slice_by_variant(modality, statistic_name) {
            let values = records
                .iter()
                .filter_map(|r| r.value)
                .filter(|v| v.is_finite())
                .collect::<Vec<_>>();
            summaries.push(GroupSummary {
                modality: modality.clone(),
                variant: variant.clone(),
                missing: records.len() - values.len(),
                stats: ComprehensiveStats::new(
                    values,
                    &options.percentiles,
                    options.histogram_bins,
                    options.outlier_rule,
                ),
            });
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use crate::table::ReductionRecord;

    use super::*;

    #[test]
    fn test_counts_missing_values() {
        let table = [Some(1.0), Some(2.0), None, Some(30.0), Some(2.5)]
            .into_iter()
            .enumerate()
            .map(|(i, value)| ReductionRecord {
                patient_id: format!("{i:04}"),
                modality: "FLAIR".into(),
                correction_variant: "native".into(),
                statistic_name: "mean_distance".to_owned(),
                value,
            })
            .collect::<CohortTable>();

        let summaries = summarize(&table, "mean_distance", &SummaryOptions::default());
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.count(), 4);
        let stats = summary.stats.as_ref().unwrap();
        assert_eq!(stats.percentiles.get(50.0), Some(2.25));
        assert_eq!(stats.outlier_count, 1);
    }

    #[test]
    fn test_all_missing_group_has_no_stats() {
        let table = CohortTable::from_iter([ReductionRecord {
            patient_id: "0001".to_owned(),
            modality: "T1".into(),
            correction_variant: "native".into(),
            statistic_name: "mean_subregion".to_owned(),
            value: None,
        }]);
        let summaries = summarize(&table, "mean_subregion", &SummaryOptions::default());
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].stats.is_none());
        assert_eq!(summaries[0].count(), 0);
    }
}
