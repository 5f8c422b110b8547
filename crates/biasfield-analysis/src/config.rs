//! Study configuration shared by every pipeline stage.

use std::{collections::BTreeSet, path::PathBuf};

use biasfield_stats::adjust::PAdjust;
use serde::{Deserialize, Serialize};

use crate::{
    compare::CompareOptions,
    key::{CorrectionVariant, Modality, RecordKey},
    loader::ArrayLayout,
    patient::ReduceOptions,
    reduce::{Statistic, WholeRegionRule},
};

/// Everything needed to run a study, loadable from JSON.
///
/// Missing fields take the defaults of the original cohort layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub cohort_root: PathBuf,
    pub layout: ArrayLayout,
    pub modalities: Vec<Modality>,
    pub variants: Vec<CorrectionVariant>,
    pub statistic: Statistic,
    pub whole_region: WholeRegionRule,
    /// Worker threads for the cohort collector; `None` uses every core.
    pub workers: Option<usize>,
    pub alpha: f64,
    pub p_adjust: PAdjust,
}

impl Default for StudyConfig {
    fn default() -> Self {
        let layout = ArrayLayout::default();
        let variants = ["native", "N4_Brain", "N4_Healthy", "N4_Brain_Healthy", "N4_Healthy_Brain"]
            .into_iter()
            .map(CorrectionVariant::from)
            .collect();
        Self {
            cohort_root: PathBuf::from("."),
            layout,
            modalities: ["T1", "T1c", "T2", "FLAIR"]
                .into_iter()
                .map(Modality::from)
                .collect(),
            variants,
            statistic: Statistic::default(),
            whole_region: WholeRegionRule::default(),
            workers: None,
            alpha: 0.05,
            p_adjust: PAdjust::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("at least one {what} must be configured")]
    Empty { what: &'static str },
    #[display("{what} '{name}' is listed more than once")]
    Duplicate { what: &'static str, name: String },
    #[display("no file suffix configured for correction variant '{variant}'")]
    MissingVariantSuffix { variant: String },
    #[display("alpha must be strictly between 0 and 1, got {alpha}")]
    InvalidAlpha { alpha: f64 },
    #[display("workers must be greater than 0")]
    ZeroWorkers,
}

impl StudyConfig {
    /// Checks the configuration before any work is dispatched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unique("modality", self.modalities.iter().map(Modality::as_str))?;
        check_unique("variant", self.variants.iter().map(CorrectionVariant::as_str))?;
        if let Some(variant) = self
            .variants
            .iter()
            .find(|v| !self.layout.variant_file_suffixes.contains_key(*v))
        {
            return Err(ConfigError::MissingVariantSuffix {
                variant: variant.to_string(),
            });
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha { alpha: self.alpha });
        }
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Every (modality, variant) key, modality-major.
    #[must_use]
    pub fn keys(&self) -> Vec<RecordKey> {
        RecordKey::product(&self.modalities, &self.variants)
    }

    #[must_use]
    pub fn reduce_options(&self) -> ReduceOptions {
        ReduceOptions {
            statistic: self.statistic,
            whole_region: self.whole_region,
        }
    }

    #[must_use]
    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions {
            alpha: self.alpha,
            adjust: self.p_adjust,
        }
    }
}

fn check_unique<'a, I>(what: &'static str, names: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::Duplicate {
                what,
                name: name.to_owned(),
            });
        }
    }
    if seen.is_empty() {
        return Err(ConfigError::Empty { what });
    }
    Ok(())
}
