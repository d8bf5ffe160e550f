//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};
use clap_complete::Shell;

/// Build computational grids from INI parameter files and compare output trees
#[derive(Parser, Debug)]
#[command(name = "inigrid")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level: -d info, -dd debug, -ddd trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Construct a grid and record its properties in an output tree
    Construct {
        /// Parameter file
        #[arg(value_hint = ValueHint::FilePath)]
        ini: PathBuf,

        /// Backend tag, e.g. yasp:2 or ug:3 (default: `backend` key, then config)
        #[arg(short, long)]
        backend: Option<String>,

        /// Output tree destination (default: from __output_name / __name)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Also write a snapshot of a structured grid for later restore
        #[arg(long, value_hint = ValueHint::FilePath)]
        snapshot: Option<PathBuf>,
    },

    /// Compare an output tree against a reference
    Compare {
        #[arg(value_hint = ValueHint::FilePath)]
        actual: PathBuf,

        #[arg(value_hint = ValueHint::FilePath)]
        reference: PathBuf,

        /// Compare numeric values with tolerances
        #[arg(long)]
        fuzzy: bool,

        /// Relative tolerance (default: from config)
        #[arg(long, requires = "fuzzy")]
        relative: Option<f64>,

        /// Absolute tolerance (default: from config)
        #[arg(long, requires = "fuzzy")]
        absolute: Option<f64>,

        /// Key prefix to skip; repeatable
        #[arg(short = 'x', long = "exclude", value_name = "KEY")]
        exclude: Vec<String>,
    },

    /// Show a parameter file as a tree
    Show {
        #[arg(value_hint = ValueHint::FilePath)]
        ini: PathBuf,
    },

    /// List registered backend tags
    Backends,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,

    /// Print a config template
    Template,
}
