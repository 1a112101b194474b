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
    author = "InterStab Developers",
    version,
    about = "InterStab CLI - Chemical and electrochemical stability of interfaces between two phases, analysed as pseudo-binary mixtures in closed and open systems.",
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

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Phase equilibria of a pseudo-binary in a closed system (chemical stability).
    Pd(PdArgs),
    /// Phase equilibria of a pseudo-binary with one element open to a reservoir
    /// (electrochemical stability).
    Gppd(GppdArgs),
    /// Screen a chemical potential range for windows of constant mixing behaviour.
    Scan(ScanArgs),
    /// Phase equilibria and decomposition reaction of a single composition.
    Decompose(DecomposeArgs),
    /// Phase equilibria of a single composition as it takes up or gives off an element,
    /// and its stability window against that element.
    Evolution(EvolutionArgs),
    /// Manage the local entry cache directory.
    Data(DataArgs),
}

/// Options shared by every analysis command.
#[derive(Args, Debug, Clone, Default)]
pub struct SystemArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the cached `<El1>_<El2>_..._Entries.csv` files.
    /// Overrides the configured data directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Add an element to the chemical system of the phase diagram. Can be used multiple times.
    #[arg(short = 'e', long = "extra-element", value_name = "ELEMENT")]
    pub extra_elements: Vec<String>,

    /// Leave an entry (by name or material id) out of the phase diagram. Can be used
    /// multiple times.
    #[arg(short = 'x', long = "exclude", value_name = "NAME")]
    pub exclusions: Vec<String>,

    /// Abort the analysis after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S search.max-depth=40
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

/// The two phases of a pseudo-binary.
#[derive(Args, Debug, Clone)]
pub struct PairArgs {
    /// First phase. A composition (e.g. 'LiCoO2'), placed on the convex hull of its chemical
    /// system, or 'FORMULA@ENERGY' with an explicit total energy in eV per formula unit.
    #[arg(value_name = "PHASE1")]
    pub reactant1: String,

    /// Second phase, in the same format as the first.
    #[arg(value_name = "PHASE2")]
    pub reactant2: String,

    /// Energy offset of the first phase above the hull, eV/atom.
    #[arg(long = "e1", value_name = "EV", default_value_t = 0.0, allow_negative_numbers = true)]
    pub energy_correction1: f64,

    /// Energy offset of the second phase above the hull, eV/atom.
    #[arg(long = "e2", value_name = "EV", default_value_t = 0.0, allow_negative_numbers = true)]
    pub energy_correction2: f64,
}

/// Arguments for the `pd` subcommand.
#[derive(Args, Debug, Clone)]
pub struct PdArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    #[command(flatten)]
    pub system: SystemArgs,

    /// Also write the profile table as CSV to this path.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `gppd` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GppdArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// The element exchanged with the reservoir.
    #[arg(short = 'E', long = "element", value_name = "ELEMENT")]
    pub open_element: String,

    /// Chemical potential of the open element in eV/atom, relative to its elemental phase.
    #[arg(short, long, value_name = "EV", allow_negative_numbers = true)]
    pub mu: f64,

    #[command(flatten)]
    pub system: SystemArgs,

    /// Also write the profile table as CSV to this path.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `scan` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// The element exchanged with the reservoir.
    #[arg(short = 'E', long = "element", value_name = "ELEMENT")]
    pub open_element: String,

    /// Lower bound of the chemical potential range, eV/atom relative to the elemental phase.
    #[arg(long, value_name = "EV", allow_negative_numbers = true)]
    pub mu_low: f64,

    /// Upper bound of the chemical potential range.
    #[arg(long, value_name = "EV", allow_negative_numbers = true)]
    pub mu_high: f64,

    /// Report every window separately, even when neighbours share the same phase equilibria.
    #[arg(long)]
    pub no_merge: bool,

    /// Override the ratio tolerance used when comparing neighbouring profiles.
    #[arg(long, value_name = "FLOAT")]
    pub ratio_tolerance: Option<f64>,

    #[command(flatten)]
    pub system: SystemArgs,
}

/// Arguments for the `decompose` subcommand.
#[derive(Args, Debug, Clone)]
pub struct DecomposeArgs {
    /// The phase to analyse, in the same format as the pseudo-binary phases.
    #[arg(value_name = "PHASE")]
    pub reactant: String,

    /// Energy offset above the hull, eV/atom.
    #[arg(long = "e1", value_name = "EV", default_value_t = 0.0, allow_negative_numbers = true)]
    pub energy_correction: f64,

    /// Open this element to a reservoir. Requires --mu.
    #[arg(short = 'E', long = "element", value_name = "ELEMENT", requires = "mu")]
    pub open_element: Option<String>,

    /// Chemical potential of the open element in eV/atom, relative to its elemental phase.
    #[arg(short, long, value_name = "EV", allow_negative_numbers = true, requires = "open_element")]
    pub mu: Option<f64>,

    #[command(flatten)]
    pub system: SystemArgs,
}

/// Arguments for the `evolution` subcommand.
#[derive(Args, Debug, Clone)]
pub struct EvolutionArgs {
    /// The phase to analyse, in the same format as the pseudo-binary phases.
    #[arg(value_name = "PHASE")]
    pub reactant: String,

    /// Energy offset above the hull, eV/atom.
    #[arg(long = "e1", value_name = "EV", default_value_t = 0.0, allow_negative_numbers = true)]
    pub energy_correction: f64,

    /// The element exchanged with the reservoir.
    #[arg(short = 'E', long = "element", value_name = "ELEMENT")]
    pub open_element: String,

    /// Also follow the composition to chemical potentials above the elemental phase.
    #[arg(long = "allow-positive-mu")]
    pub allow_positive_mu: bool,

    #[command(flatten)]
    pub system: SystemArgs,
}

/// Arguments for the `data` subcommand.
#[derive(Args, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

/// Available commands for data management.
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Show the absolute path to the local entry cache directory.
    Path,
    /// List the chemical systems with a cache file in the data directory.
    List,
    /// Set a custom absolute path for the local entry cache directory.
    SetPath {
        /// The new directory holding the cached entry files.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Reset the data path to its default, OS-specific location.
    ResetPath,
}
