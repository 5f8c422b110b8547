//! Cohort collection command
//!
//! Reduces every patient of a cohort on disk into the long-form table and
//! optionally records what was skipped on the way.

use std::path::PathBuf;

use biasfield_analysis::{
    cohort::{self, CohortCollector, RunSummary},
    config::StudyConfig,
    loader::NpyArrayLoader,
    patient::SkipRecord,
};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::util::{Output, StudyArg};

#[derive(Debug, Clone, Args)]
pub(crate) struct CollectArg {
    #[clap(flatten)]
    pub study: StudyArg,

    /// Patient ids to process (comma-separated); defaults to every patient directory
    #[arg(long, value_delimiter = ',')]
    pub patients: Vec<String>,

    /// Output CSV path (stdout if omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write a JSON run report with the skip log to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    generated_at: DateTime<Utc>,
    config: &'a StudyConfig,
    patient_ids: &'a [String],
    summary: RunSummary,
    skips: &'a [SkipRecord],
}

pub(crate) fn run(arg: &CollectArg) -> anyhow::Result<()> {
    let config = arg.study.resolve()?;

    let discovered = cohort::discover_patients(&config)?;
    let patient_ids = if arg.patients.is_empty() {
        discovered
    } else {
        arg.patients.clone()
    };
    info!(
        cohort_root = %config.cohort_root.display(),
        patients = patient_ids.len(),
        keys = config.keys().len(),
        statistic = %config.statistic,
        whole_region = %config.whole_region,
        "collecting cohort"
    );

    let loader = NpyArrayLoader::new(&config.cohort_root, config.layout.clone());
    let run = CohortCollector::from_config(&config).collect(&patient_ids, &loader)?;

    let summary = run.report();
    info!(
        "{}/{} patients processed, {} failed, {} keys skipped, {} rows",
        summary.patients_succeeded,
        summary.patients_total,
        summary.patients_failed,
        summary.keys_skipped,
        summary.rows
    );

    let mut output = Output::from_output_path(arg.output.clone())?;
    output.write_table(&run.table)?;
    info!("table written to {}", output.display_path());

    if let Some(path) = &arg.report {
        let report = RunReport {
            generated_at: Utc::now(),
            config: &config,
            patient_ids: &patient_ids,
            summary,
            skips: &run.skips,
        };
        Output::save_json(&report, Some(path.clone()))?;
        info!("run report written to {}", path.display());
    }

    Ok(())
}
