//! Command-line surface of the planner.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pmt",
    version,
    about = "Predictive maintenance planning for high-voltage bushings",
    long_about = "Optimizes maintenance dates per work order with an absorbing \
Markov degradation model and NSGA-II search, and flags anomalous sensor \
windows with a sliding-window auto-encoder."
)]
pub struct Cli {
    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Optimize a batch of maintenance orders into a schedule
    Optimize(OptimizeArgs),
    /// Train an auto-encoder and flag anomalous sensor windows
    Detect(DetectArgs),
    /// Check an order table without running the optimizer
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct OptimizeArgs {
    /// Order table (CSV with DGA/FQ column families, or JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for schedule and frontier files
    #[arg(short, long, default_value = "out")]
    pub output: PathBuf,

    /// Selection criterion: knee_point, min_cost, min_unavailability, balanced
    #[arg(short = 's', long, default_value = "knee_point")]
    pub selection_criterion: String,

    /// Cost weight for the balanced criterion
    #[arg(long, default_value_t = 0.5)]
    pub cost_weight: f64,

    /// Unavailability weight for the balanced criterion
    #[arg(long, default_value_t = 0.5)]
    pub unavailability_weight: f64,

    /// Planner configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Column mapping file for site-specific order tables
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// Master RNG seed; per-order seeds derive from it
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Worker threads (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Per-order solver time budget in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Number of schedule rows to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Args)]
pub struct DetectArgs {
    /// Training series CSV (timestamp column + one column per feature)
    #[arg(long)]
    pub train: Option<PathBuf>,

    /// Load a previously saved model instead of training
    #[arg(long, conflicts_with = "train")]
    pub model: Option<PathBuf>,

    /// Series to run detection on; defaults to the training series
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where to save the trained model
    #[arg(long)]
    pub model_out: Option<PathBuf>,

    /// Detections CSV output
    #[arg(short, long, default_value = "detections.csv")]
    pub output: PathBuf,

    /// Planner configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Auto-encoder architecture override: dense or conv
    #[arg(long)]
    pub arch: Option<String>,

    /// Training epoch override
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Window length override (samples)
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Threshold percentile override
    #[arg(long)]
    pub percentile: Option<f64>,

    /// RNG seed for weight initialization
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Order table to check
    #[arg(short, long)]
    pub input: PathBuf,

    /// Planner configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Column mapping file for site-specific order tables
    #[arg(long)]
    pub mapping: Option<PathBuf>,
}
