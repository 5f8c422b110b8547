use std::path::PathBuf;

use biasfield_analysis::synthetic::PhantomCohort;
use clap::Args;
use tracing::info;

use crate::util::StudyArg;

#[derive(Debug, Clone, Args)]
pub(crate) struct SynthPhantomArg {
    /// Directory to write the cohort into; defaults to the configured cohort root
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[clap(flatten)]
    pub study: StudyArg,

    /// Number of patients
    #[arg(long, default_value_t = 3)]
    pub patients: usize,

    /// Patient ids to leave without a directory (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub omit: Vec<String>,

    /// Array shape as Z,Y,X
    #[arg(long, value_delimiter = ',', default_values_t = [16, 16, 16])]
    pub shape: Vec<usize>,

    /// Standard deviation of the Gaussian noise
    #[arg(long, default_value_t = 2.0)]
    pub noise_sd: f64,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub(crate) fn run(arg: &SynthPhantomArg) -> anyhow::Result<()> {
    let config = arg.study.resolve()?;
    let &[z, y, x] = arg.shape.as_slice() else {
        anyhow::bail!("shape must have exactly three dimensions");
    };
    anyhow::ensure!(z > 0 && y > 0 && x > 0, "shape dimensions must be positive");

    let root = arg.output_dir.as_ref().unwrap_or(&config.cohort_root);
    let phantom = PhantomCohort {
        patients: arg.patients,
        omit: arg.omit.clone(),
        shape: (z, y, x),
        modalities: config.modalities.clone(),
        variants: config.variants.clone(),
        noise_sd: arg.noise_sd,
        seed: arg.seed,
    };
    let summary = phantom.write(root, &config.layout)?;
    info!(
        written = summary.written.len(),
        omitted = summary.omitted.len(),
        "phantom cohort written to {}",
        root.display()
    );
    for patient_id in &summary.omitted {
        info!("{patient_id}: left without a directory");
    }
    Ok(())
}
