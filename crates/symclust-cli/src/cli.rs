use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "symclust CLI - Symmetry-aware clustering of conformational ensembles of macromolecular assemblies.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE).
    /// Directives in SYMCLUST_LOG take precedence, e.g. `symclust::engine=debug`.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster an ensemble of frames, or a precomputed distance matrix.
    Cluster(ClusterArgs),
    /// Summarize the molecules, copies and frames of an ensemble file.
    Inspect(InspectArgs),
}

/// Where the items to cluster come from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ClusterInput {
    /// Path to an ensemble file in JSON format (topology and frames).
    #[arg(short, long, value_name = "PATH")]
    pub ensemble: Option<PathBuf>,

    /// Path to a precomputed, headerless CSV distance matrix.
    #[arg(short, long, value_name = "PATH")]
    pub matrix: Option<PathBuf>,
}

/// Arguments for the `cluster` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    // --- Core Arguments ---
    #[command(flatten)]
    pub input: ClusterInput,

    /// Path to the clustering configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path for the JSON report. The report is printed to stdout when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Save the full pairwise distance matrix of the ensemble as CSV.
    #[arg(long, value_name = "PATH")]
    pub save_matrix: Option<PathBuf>,

    // --- Clustering Overrides ---
    /// Override the clustering distance cutoff.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Merge clusters whose centers lie within this distance after clustering.
    #[arg(long = "refine", value_name = "FLOAT")]
    pub refinement_cutoff: Option<f64>,

    /// Superpose frames before comparing them.
    #[arg(long)]
    pub align: bool,

    /// Keep only this many best-scoring frames.
    #[arg(short = 'n', long = "best", value_name = "INT")]
    pub best_scoring_models: Option<usize>,

    /// Compute the average distance between every pair of clusters.
    #[arg(long)]
    pub bipartite: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S clustering.cutoff=7.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Path to an ensemble file in JSON format.
    #[arg(required = true, value_name = "PATH")]
    pub ensemble: PathBuf,
}
