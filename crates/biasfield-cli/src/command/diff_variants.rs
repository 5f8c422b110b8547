use std::path::PathBuf;

use biasfield_analysis::{
    diff::{self, DEFAULT_TOLERANCE},
    key::CorrectionVariant,
};
use biasfield_stats::descriptive::DescriptiveStats;
use clap::Args;
use tracing::{info, warn};

use crate::util::{self, Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct DiffVariantsArg {
    /// Path to the table CSV file
    pub table: PathBuf,

    /// First correction variant
    pub variant_a: String,

    /// Second correction variant
    pub variant_b: String,

    /// Statistic name whose values are paired
    #[arg(long, default_value = "median_nonzero_distance")]
    pub statistic_name: String,

    /// Absolute difference below which two values count as identical
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Also write the paired differences as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,
}

pub(crate) fn run(arg: &DiffVariantsArg) -> anyhow::Result<()> {
    anyhow::ensure!(
        arg.variant_a != arg.variant_b,
        "the two variants must differ"
    );
    let table = util::read_table_file(&arg.table)?;
    let variant_a = CorrectionVariant::new(&arg.variant_a);
    let variant_b = CorrectionVariant::new(&arg.variant_b);
    let diff = diff::diff_variants(
        &table,
        &arg.statistic_name,
        &variant_a,
        &variant_b,
        arg.tolerance,
    );
    if diff.pairs.is_empty() {
        warn!(
            "no (patient, modality) pairs have values for both {variant_a} and {variant_b} \
             in {}",
            arg.statistic_name
        );
    }

    println!(
        "{variant_a} vs {variant_b} ({}, tolerance {})",
        arg.statistic_name, arg.tolerance
    );
    println!("==========================================\n");
    println!("  Paired values : {}", diff.pairs.len());
    println!("  Dropped pairs : {}", diff.dropped);
    print_stats("|b - a|", diff.abs_diff_stats.as_ref());
    print_stats("relative", diff.rel_diff_stats.as_ref());

    let identical = diff.near_identical().collect::<Vec<_>>();
    println!(
        "\n  Near-identical pairs: {}/{}",
        identical.len(),
        diff.pairs.len()
    );
    for pair in &identical {
        println!(
            "    {} {:<8} a = {:.4}, b = {:.4}",
            pair.patient_id,
            pair.modality.as_str(),
            pair.a,
            pair.b
        );
    }

    if let Some(path) = &arg.json {
        Output::save_json(&diff, Some(path.clone()))?;
        info!("differences written to {}", path.display());
    }
    Ok(())
}

fn print_stats(label: &str, stats: Option<&DescriptiveStats>) {
    match stats {
        Some(s) => println!(
            "  {label:<14}: mean {:.4}, median {:.4}, max {:.4}",
            s.mean, s.median, s.max
        ),
        None => println!("  {label:<14}: (no values)"),
    }
}
