//! CLI parse: clap types for stepwise. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stepwise CLI - drive demand-driven asynchronous sequences
#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Drive demand-driven asynchronous sequences from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Emit a range of integers from a producer routine and drain it
    Count {
        /// First value emitted
        #[arg(long, default_value = "1")]
        from: i64,
        /// Last value emitted (inclusive)
        #[arg(long, default_value = "5")]
        to: i64,
        /// Simulated async work before each emission (milliseconds)
        #[arg(long, default_value = "0")]
        delay_ms: u64,
        /// Dispose the enumerator after this many values
        #[arg(long)]
        take: Option<usize>,
        /// Make the producer fail after emitting this many values
        #[arg(long)]
        fail_after: Option<usize>,
        /// Mark the sequence single-use and show that a second run is refused
        #[arg(long)]
        single_use: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Replay literal items through a sequence
    Replay {
        /// Items to replay, in order
        items: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
