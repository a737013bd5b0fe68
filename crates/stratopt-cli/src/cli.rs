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
    version,
    about = "stratopt - Black-box sizing optimization of Nastran models: scales property thicknesses and section dimensions to minimize, maximize, or hit a target response.",
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
    /// Run a sizing optimization against an external solver.
    Optimize(OptimizeArgs),
    /// Print the properties and mass of a model, optionally resolving a selection.
    Inspect(InspectArgs),
}

/// Arguments for the `optimize` subcommand.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    // --- Core Arguments ---
    /// Path to the input bulk-data file (e.g., wing.bdf).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to the optimization configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving summary.toml, best_solution.csv and history.csv.
    /// Defaults to the work directory.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory receiving per-trial model and result files.
    /// Defaults to the directory of the input model.
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    // --- Variable Overrides ---
    /// Property selection, e.g. "all" or "1-10, 15, 20-25".
    #[arg(short, long, value_name = "EXPR")]
    pub properties: Option<String>,

    /// Search method: gaussian-process, boosted-trees or differential-evolution.
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<String>,

    /// Number of objective evaluations to aim for.
    #[arg(short = 'n', long, value_name = "INT")]
    pub budget: Option<usize>,

    /// Lower bound of every property multiplier.
    #[arg(long, value_name = "FLOAT")]
    pub min_multiplier: Option<f64>,

    /// Upper bound of every property multiplier.
    #[arg(long, value_name = "FLOAT")]
    pub max_multiplier: Option<f64>,

    /// Random seed of the search.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Response Overrides ---
    /// Result type: displacement or cbush-force.
    #[arg(long, value_name = "KIND")]
    pub result_kind: Option<String>,

    /// Result component: X, Y, Z, XY, XZ, YZ or XYZ.
    #[arg(long, value_name = "AXES")]
    pub component: Option<String>,

    /// Grid or CBUSH ids whose responses become w1, w2, ...
    #[arg(short, long, value_name = "IDS", value_delimiter = ',')]
    pub entities: Option<Vec<u32>>,

    /// Objective expression over w1..wN, e.g. "abs(w1) + 0.5*w2".
    #[arg(long, value_name = "EXPR")]
    pub objective: Option<String>,

    /// Optimization mode: minimize, maximize or target.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Target value; implies `--mode target`.
    #[arg(long, value_name = "FLOAT")]
    pub target: Option<f64>,

    // --- Mass Penalty Overrides ---
    /// Override `mass-penalty.enabled` from the config file.
    #[command(flatten)]
    pub mass_penalty: MassPenaltyToggle,

    /// Weight of the mass-change term.
    #[arg(long, value_name = "FLOAT")]
    pub penalty_factor: Option<f64>,

    // --- Solver Overrides ---
    /// Path to the solver executable.
    #[arg(long, value_name = "PATH")]
    pub solver: Option<PathBuf>,

    /// Argument passed to the solver after the model path.
    #[arg(long, value_name = "ARG")]
    pub solver_flag: Option<String>,

    /// Name of the compute worker process to wait for after the solver returns.
    #[arg(long, value_name = "NAME", conflicts_with = "no_worker_poll")]
    pub worker_process: Option<String>,

    /// Wait for the launched solver process only.
    #[arg(long)]
    pub no_worker_poll: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S search.budget=80
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive flags for the mass penalty.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct MassPenaltyToggle {
    /// Add the relative mass change to the objective.
    #[arg(long)]
    pub mass_penalty: bool,
    /// Optimize the response alone.
    #[arg(long)]
    pub no_mass_penalty: bool,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the bulk-data file to inspect.
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Resolve a property selection against the model.
    #[arg(short, long, value_name = "EXPR")]
    pub properties: Option<String>,
}
