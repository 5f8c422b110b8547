use clap::{Parser, Subcommand};

use self::{
    collect::CollectArg, compare::CompareArg, diff_variants::DiffVariantsArg,
    summarize::SummarizeArg, synth_phantom::SynthPhantomArg, synth_table::SynthTableArg,
};

mod collect;
mod compare;
mod diff_variants;
mod summarize;
mod synth_phantom;
mod synth_table;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Reduce every patient of a cohort into a long-form CSV table
    Collect(#[clap(flatten)] CollectArg),
    /// Compare correction variants with Kruskal-Wallis and Dunn's test
    Compare(#[clap(flatten)] CompareArg),
    /// Print per-variant descriptive statistics of a table
    Summarize(#[clap(flatten)] SummarizeArg),
    /// Check two correction variants for (near-)identical values
    DiffVariants(#[clap(flatten)] DiffVariantsArg),
    /// Generate a seeded synthetic table
    SynthTable(#[clap(flatten)] SynthTableArg),
    /// Write a seeded phantom cohort of .npy arrays
    SynthPhantom(#[clap(flatten)] SynthPhantomArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Collect(arg) => collect::run(&arg)?,
        Mode::Compare(arg) => compare::run(&arg)?,
        Mode::Summarize(arg) => summarize::run(&arg)?,
        Mode::DiffVariants(arg) => diff_variants::run(&arg)?,
        Mode::SynthTable(arg) => synth_table::run(&arg)?,
        Mode::SynthPhantom(arg) => synth_phantom::run(&arg)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_compare_flags() {
        let args = CommandArgs::try_parse_from([
            "biasfield",
            "compare",
            "table.csv",
            "--statistic-name",
            "median_nonzero_distance,mean_distance",
            "--p-adjust",
            "holm",
            "--alpha",
            "0.01",
        ])
        .unwrap();
        let Mode::Compare(arg) = args.mode else {
            panic!("expected compare");
        };
        assert_eq!(
            arg.statistic_names,
            ["median_nonzero_distance", "mean_distance"]
        );
        assert_eq!(arg.study.alpha, Some(0.01));
    }

    #[test]
    fn test_unknown_statistic_is_rejected() {
        let result =
            CommandArgs::try_parse_from(["biasfield", "collect", "--statistic", "mode"]);
        assert!(result.is_err());
    }
}
