use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use biasfield_analysis::{
    config::StudyConfig,
    key::{CorrectionVariant, Modality},
    reduce::{Statistic, WholeRegionRule},
    table::CohortTable,
};
use biasfield_stats::adjust::PAdjust;
use clap::Args;
use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }

    pub fn write_table(&mut self, table: &CohortTable) -> anyhow::Result<()> {
        table
            .write_csv(&mut *self)
            .with_context(|| format!("Failed to write CSV to {}", self.display_path()))?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Read a long-form reduction table from a CSV file
pub fn read_table_file(path: &Path) -> anyhow::Result<CohortTable> {
    let table = CohortTable::read_csv_file(path)
        .with_context(|| format!("Failed to read table CSV file: {}", path.display()))?;
    if table.is_empty() {
        tracing::warn!("table {} has no rows", path.display());
    }
    Ok(table)
}

/// Study configuration: an optional JSON file overridden by flags.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct StudyArg {
    /// Path to a study configuration JSON file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding one subdirectory per patient
    #[arg(long)]
    pub cohort_root: Option<PathBuf>,

    /// Modalities to process (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub modalities: Vec<String>,

    /// Correction variants to process (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub variants: Vec<String>,

    /// Statistic reduced over each region
    /// (median, median_nonzero, mean, weighted_centroid_intensity, histogram2d_center)
    #[arg(long)]
    pub statistic: Option<Statistic>,

    /// Voxels forming the whole region (entire_volume, brain_mask)
    #[arg(long)]
    pub whole_region: Option<WholeRegionRule>,

    /// Worker threads for cohort collection (defaults to every core)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Significance level of the omnibus test
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Multiple-comparison adjustment of pairwise p-values (bonferroni, holm, none)
    #[arg(long)]
    pub p_adjust: Option<PAdjust>,
}

impl StudyArg {
    /// Loads the configuration file, applies flag overrides and validates the result.
    pub fn resolve(&self) -> anyhow::Result<StudyConfig> {
        let mut config = match &self.config {
            Some(path) => read_json_file("study config", path)?,
            None => StudyConfig::default(),
        };
        if let Some(cohort_root) = &self.cohort_root {
            config.cohort_root.clone_from(cohort_root);
        }
        if !self.modalities.is_empty() {
            config.modalities = self.modalities.iter().map(Modality::new).collect();
        }
        if !self.variants.is_empty() {
            config.variants = self.variants.iter().map(CorrectionVariant::new).collect();
        }
        if let Some(statistic) = self.statistic {
            config.statistic = statistic;
        }
        if let Some(whole_region) = self.whole_region {
            config.whole_region = whole_region;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(p_adjust) = self.p_adjust {
            config.p_adjust = p_adjust;
        }
        config.validate().context("Invalid study configuration")?;
        Ok(config)
    }
}
