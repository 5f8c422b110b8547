//! Descriptive summary command

use std::path::PathBuf;

use biasfield_analysis::summary::{self, GroupSummary, SummaryOptions};
use biasfield_stats::{histogram::Histogram, outliers::OutlierRule};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::util::{self, Output};

#[derive(Debug, Clone, Args)]
pub(crate) struct SummarizeArg {
    /// Path to the table CSV file
    pub table: PathBuf,

    /// Statistic names to summarize (comma-separated); defaults to every name in the table
    #[arg(long = "statistic-name", value_delimiter = ',')]
    pub statistic_names: Vec<String>,

    /// Percentiles to report (comma-separated, 0-100)
    #[arg(long, value_delimiter = ',', default_values_t = [25.0, 50.0, 75.0])]
    pub percentiles: Vec<f64>,

    /// Number of histogram bins
    #[arg(long, default_value_t = 10)]
    pub bins: usize,

    /// IQR multiplier of the outlier fences
    #[arg(long, default_value_t = 1.5)]
    pub iqr_multiplier: f64,

    /// Print a histogram of every group
    #[arg(long)]
    pub histogram: bool,

    /// Also write the summaries as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct StatisticSummary {
    statistic_name: String,
    groups: Vec<GroupSummary>,
}

pub(crate) fn run(arg: &SummarizeArg) -> anyhow::Result<()> {
    anyhow::ensure!(
        arg.percentiles.iter().all(|p| (0.0..=100.0).contains(p)),
        "percentiles must be within 0-100"
    );
    anyhow::ensure!(arg.bins > 0, "at least one histogram bin is required");

    let table = util::read_table_file(&arg.table)?;
    info!(rows = table.len(), "loaded {}", arg.table.display());

    let options = SummaryOptions {
        percentiles: arg.percentiles.clone(),
        histogram_bins: arg.bins,
        outlier_rule: OutlierRule::Iqr {
            multiplier: arg.iqr_multiplier,
        },
    };
    let names = if arg.statistic_names.is_empty() {
        table
            .statistic_names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    } else {
        arg.statistic_names.clone()
    };

    let summaries = names
        .into_iter()
        .map(|statistic_name| StatisticSummary {
            groups: summary::summarize(&table, &statistic_name, &options),
            statistic_name,
        })
        .collect::<Vec<_>>();

    for summary in &summaries {
        print_summary(summary, &options, arg.histogram);
        println!();
    }

    if let Some(path) = &arg.json {
        Output::save_json(&summaries, Some(path.clone()))?;
        info!("summaries written to {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &StatisticSummary, options: &SummaryOptions, show_histogram: bool) {
    println!("{}", summary.statistic_name);
    println!("{}", "=".repeat(summary.statistic_name.len()));

    let percentile_headers = options
        .percentiles
        .iter()
        .map(|p| format!("{:>9}", format!("P{p}")))
        .collect::<String>();
    println!(
        "  {:<8} {:<20} {:>5} {:>7} {:>9} {:>9}{percentile_headers} {:>9} {:>9} {:>8}",
        "Modality", "Variant", "N", "Missing", "Mean", "Std", "Min", "Max", "Outliers"
    );
    for group in &summary.groups {
        let Some(stats) = &group.stats else {
            println!(
                "  {:<8} {:<20} {:>5} {:>7}   (no values)",
                group.modality.as_str(),
                group.variant.as_str(),
                0,
                group.missing
            );
            continue;
        };
        let percentiles = stats
            .percentiles
            .iter()
            .map(|(_, value)| format!("{value:>9.3}"))
            .collect::<String>();
        println!(
            "  {:<8} {:<20} {:>5} {:>7} {:>9.3} {:>9.3}{percentiles} {:>9.3} {:>9.3} {:>8}",
            group.modality.as_str(),
            group.variant.as_str(),
            group.count(),
            group.missing,
            stats.stats.mean,
            stats.stats.std_dev,
            stats.stats.min,
            stats.stats.max,
            stats.outlier_count,
        );
        if show_histogram {
            print_histogram(&stats.histogram);
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn print_histogram(histogram: &Histogram) {
    const BAR_WIDTH: f64 = 40.0;
    let max_count = histogram.max_count().max(1) as f64;
    for bin in &histogram.bins {
        let bar = ((bin.count as f64 / max_count) * BAR_WIDTH).round() as usize;
        println!(
            "      [{:>9.3}, {:>9.3}) {:>5} {}",
            bin.range.start,
            bin.range.end,
            bin.count,
            "#".repeat(bar)
        );
    }
}
