//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "guard", version, about = "Force-guarded motion runner")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sensor trace CSV (height,fx,fy,fz) replayed instead of the simulated arm
    #[arg(long, value_name = "FILE")]
    pub trace: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align over the hole and descend, retrying on failure
    Insert {
        /// Override insertion.max_retries
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
        /// Run against the wall clock with background samplers
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Move along one axis until contact or the time budget runs out
    Approach {
        /// Override approach.distance (m, signed)
        #[arg(long, value_name = "M", allow_negative_numbers = true)]
        distance: Option<f64>,
        /// Override approach.time_s
        #[arg(long, value_name = "S")]
        time: Option<f64>,
        /// Do not back off after contact
        #[arg(long, action = ArgAction::SetTrue)]
        no_retract: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Run one guarded descent without alignment or retries
    Descend {
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
    },
    /// Validate config (and trace, if given) and build every controller
    SelfCheck,
}
