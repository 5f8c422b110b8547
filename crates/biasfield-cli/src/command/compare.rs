//! Variant comparison command
//!
//! Runs Kruskal-Wallis across correction variants for every
//! (modality, statistic) slice of a table, followed by Dunn's test on
//! significant slices.

use std::path::PathBuf;

use biasfield_analysis::compare::{
    self, Comparison, ComparisonReport, ComparisonResult, GroupSize, PairwiseMatrix,
};
use clap::Args;
use tracing::info;

use crate::util::{self, Output, StudyArg};

#[derive(Debug, Clone, Args)]
pub(crate) struct CompareArg {
    /// Path to the table CSV file
    pub table: PathBuf,

    /// Statistic names to compare (comma-separated); defaults to every name in the table
    #[arg(long = "statistic-name", value_delimiter = ',')]
    pub statistic_names: Vec<String>,

    #[clap(flatten)]
    pub study: StudyArg,

    /// Also write the comparison reports as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,
}

pub(crate) fn run(arg: &CompareArg) -> anyhow::Result<()> {
    let options = arg.study.resolve()?.compare_options();
    let table = util::read_table_file(&arg.table)?;
    info!(rows = table.len(), "loaded {}", arg.table.display());

    let reports = compare::compare_all(&table, &arg.statistic_names, &options);

    println!(
        "Variant Comparison Report (alpha={}, p-adjust={})",
        options.alpha, options.adjust
    );
    println!("==========================================\n");
    for report in &reports {
        print_report(report);
        println!();
    }

    let significant = reports
        .iter()
        .filter(|r| matches!(&r.result, ComparisonResult::Computed(c) if c.is_significant()))
        .count();
    let not_computable = reports
        .iter()
        .filter(|r| r.result.is_not_computable())
        .count();
    println!(
        "{} slices compared: {significant} significant, {not_computable} not computable",
        reports.len()
    );

    if let Some(path) = &arg.json {
        Output::save_json(&reports, Some(path.clone()))?;
        info!("comparison reports written to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &ComparisonReport) {
    println!("{} / {}", report.modality, report.statistic_name);
    match &report.result {
        ComparisonResult::NotComputable {
            reason,
            group_sizes,
        } => {
            print_group_sizes(group_sizes);
            println!("  Not computable: {reason}");
        }
        ComparisonResult::Computed(comparison) => print_comparison(comparison),
    }
}

fn print_group_sizes(group_sizes: &[GroupSize]) {
    if group_sizes.is_empty() {
        println!("  Groups: (none)");
        return;
    }
    let groups = group_sizes
        .iter()
        .map(|g| format!("{} (n={})", g.variant, g.count))
        .collect::<Vec<_>>();
    println!("  Groups: {}", groups.join(", "));
}

fn print_comparison(comparison: &Comparison) {
    let kruskal = &comparison.kruskal;
    print_group_sizes(&comparison.group_sizes);
    println!(
        "  Kruskal-Wallis: H = {:.4}, df = {}, p = {:.4e} ({})",
        kruskal.statistic,
        kruskal.df,
        kruskal.p_value,
        if comparison.is_significant() {
            "significant"
        } else {
            "not significant"
        }
    );
    if let Some(matrix) = &comparison.pairwise {
        print_matrix(matrix, comparison.alpha);
    }
}

fn print_matrix(matrix: &PairwiseMatrix, alpha: f64) {
    let width = matrix
        .labels
        .iter()
        .map(|l| l.as_str().len())
        .max()
        .unwrap_or(0)
        .max(10);

    println!(
        "  Dunn's test ({}-adjusted p-values, * below {alpha}):",
        matrix.comparisons.adjust
    );
    print!("    {:width$}", "");
    for label in &matrix.labels {
        print!("  {:>width$}", label.as_str());
    }
    println!();
    for (i, row_label) in matrix.labels.iter().enumerate() {
        print!("    {:width$}", row_label.as_str());
        for j in 0..matrix.labels.len() {
            let p = matrix.comparisons.p_value(i, j);
            let marker = if i != j && p < alpha { "*" } else { " " };
            print!("  {:>w$.4}{marker}", p, w = width - 1);
        }
        println!();
    }
}
