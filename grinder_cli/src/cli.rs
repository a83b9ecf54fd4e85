//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "grinder", version, about = "Grind-by-weight controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/grinder_config.toml")]
    pub config: PathBuf,

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
    /// Run the controller on the attached scale, relay and encoder
    Run,
    /// Run the controller against a simulated bench
    Simulate {
        /// Stop after this many seconds
        #[arg(long, value_name = "SECS", default_value_t = 30.0)]
        seconds: f64,
        /// Put a cup of this many grams on the scale; omit for an idle run
        #[arg(long, value_name = "GRAMS")]
        cup: Option<f64>,
        /// Delay before the cup is placed
        #[arg(long = "place-after-ms", value_name = "MS", default_value_t = 2000)]
        place_after_ms: u64,
        /// Delay between the end of the shot and lifting the cup
        #[arg(long = "lift-after-ms", value_name = "MS", default_value_t = 3000)]
        lift_after_ms: u64,
        /// Grounds delivered per second while the motor runs
        #[arg(long = "grind-rate", value_name = "G_PER_S", default_value_t = 1.5)]
        grind_rate: f64,
        /// Settings file to use instead of an in-memory store
        #[arg(long, value_name = "FILE")]
        store: Option<PathBuf>,
    },
    /// Inspect or reset the stored settings
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ProfileAction {
    /// Print the settings the controller would start with
    Show,
    /// Restore factory settings, keeping the scale factor and shot count
    Reset,
}
