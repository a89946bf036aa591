use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "packmc - a simulated annealing optimizer for pairwise-decomposable discrete assignment problems.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimize a packing problem with simulated annealing.
    Run(RunArgs),
    /// Validate a problem file and print a summary.
    Check(CheckArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the problem description (TOML).
    #[arg(value_name = "PROBLEM")]
    pub problem: PathBuf,

    /// Seed for every random stream of the run.
    #[arg(short, long, default_value_t = 0)]
    pub seed: u64,

    /// Number of outer temperature steps.
    #[arg(long, value_name = "N")]
    pub outer_iterations: Option<usize>,

    /// Proposals per temperature step (derived from the problem size when
    /// omitted).
    #[arg(long, value_name = "N")]
    pub inner_iterations: Option<usize>,

    /// Starting temperature of the cooling schedule.
    #[arg(long, value_name = "T")]
    pub high_temperature: Option<f64>,

    /// Final temperature of the cooling schedule.
    #[arg(long, value_name = "T")]
    pub low_temperature: Option<f64>,

    /// Run every step as a quench (deterministic descent).
    #[arg(long)]
    pub quench_only: bool,

    /// Record every attempted substitution to a trajectory file.
    #[arg(long, value_name = "PATH")]
    pub trajectory: Option<PathBuf>,

    /// Track and report per-state visitation frequencies.
    #[arg(long)]
    pub frequencies: bool,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the problem description (TOML).
    #[arg(value_name = "PROBLEM")]
    pub problem: PathBuf,
}
