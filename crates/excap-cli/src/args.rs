//! Argument parsing: namespaced subcommands over an `excap_sdk::Client`.

use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Parser)]
#[command(name = "excap")]
#[command(about = "Inspect an execution capture workspace from a terminal", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace root. Falls back to EXCAP_PATH, then the platform data
    /// directory, then $HOME/.excap.
    #[arg(long, global = true)]
    pub path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create (or confirm) a workspace at --path.
    Init,

    #[command(subcommand)]
    Trace(TraceCommand),

    #[command(subcommand)]
    Checkpoint(CheckpointCommand),

    #[command(subcommand)]
    Phase(PhaseCommand),
}

#[derive(Subcommand)]
pub enum TraceCommand {
    /// Start a new trace and print its id.
    Start {
        #[arg(long)]
        trace_id: Option<String>,
    },
    /// Show a trace's session overview.
    Show {
        trace_id: String,
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// List a trace's reconstructed spans.
    Spans { trace_id: String },
    /// Close any span left open by an ungraceful shutdown.
    Recover { trace_id: String },
}

#[derive(Subcommand)]
pub enum CheckpointCommand {
    /// Create a checkpoint snapshotting the current phase/attempt state.
    Create {
        trace_id: String,
        #[arg(long)]
        step: u64,
        #[arg(long)]
        description: String,
    },
    /// List a trace's checkpoints.
    List { trace_id: String },
    /// Fork a new trace from a checkpoint's state.
    Fork { checkpoint_id: String },
}

#[derive(Subcommand)]
pub enum PhaseCommand {
    /// Show a trace's current phase, budget, and collected outputs.
    Status { trace_id: String },
}
