use std::path::PathBuf;

use biasfield_analysis::{
    key::{CorrectionVariant, Modality},
    synthetic::SyntheticCohort,
};
use clap::Args;
use tracing::info;

use crate::util::Output;

#[derive(Debug, Clone, Args)]
pub(crate) struct SynthTableArg {
    /// Number of patients
    #[arg(long, default_value_t = 30)]
    pub patients: usize,

    /// Modalities (comma-separated); defaults to the study modalities
    #[arg(long, value_delimiter = ',')]
    pub modalities: Vec<String>,

    /// Correction variants (comma-separated); defaults to the study variants
    #[arg(long, value_delimiter = ',')]
    pub variants: Vec<String>,

    /// Statistic name written to every row
    #[arg(long, default_value = "median_nonzero_distance")]
    pub statistic_name: String,

    /// Standard deviation of the per-variant noise
    #[arg(long, default_value_t = 1.0)]
    pub noise_sd: f64,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Output CSV path (stdout if omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub(crate) fn run(arg: &SynthTableArg) -> anyhow::Result<()> {
    let mut cohort = SyntheticCohort {
        patients: arg.patients,
        statistic_name: arg.statistic_name.clone(),
        noise_sd: arg.noise_sd,
        seed: arg.seed,
        ..SyntheticCohort::default()
    };
    if !arg.modalities.is_empty() {
        cohort.modalities = arg.modalities.iter().map(Modality::new).collect();
    }
    if !arg.variants.is_empty() {
        cohort.variants = arg.variants.iter().map(CorrectionVariant::new).collect();
    }

    let table = cohort.generate();
    let mut output = Output::from_output_path(arg.output.clone())?;
    output.write_table(&table)?;
    info!(
        rows = table.len(),
        seed = arg.seed,
        "synthetic table written to {}",
        output.display_path()
    );
    Ok(())
}
