mod args;
mod commands;
mod output;

pub use args::{Cli, CheckpointCommand, Commands, OutputFormat, PhaseCommand, TraceCommand};
pub use commands::run;
