//! Subcommand dispatch over `excap_sdk::Client`: resolve the workspace
//! once, then match on the parsed command.

use anyhow::{Context, Result};
use excap_sdk::{resolve_workspace_path, Client, TraceId};
use excap_types::SpanStatus;

use crate::args::{Cli, CheckpointCommand, Commands, OutputFormat, PhaseCommand, TraceCommand};
use crate::output;

pub fn run(cli: Cli) -> Result<()> {
    let base_path = resolve_workspace_path(cli.path.as_deref())?;

    match cli.command {
        Commands::Init => {
            let client = Client::connect(&base_path)?;
            output::success(&format!("workspace ready at {}", client.base_path().display()));
            Ok(())
        }
        Commands::Trace(cmd) => run_trace(&base_path, cmd),
        Commands::Checkpoint(cmd) => run_checkpoint(&base_path, cmd),
        Commands::Phase(cmd) => run_phase(&base_path, cmd),
    }
}

fn run_trace(base_path: &std::path::Path, cmd: TraceCommand) -> Result<()> {
    let client = Client::connect(base_path)?;

    match cmd {
        TraceCommand::Start { trace_id } => {
            let trace_id = trace_id.map(TraceId::from_raw);
            let handle = client.trace(trace_id);
            println!("{}", handle.trace_id());
            Ok(())
        }
        TraceCommand::Show { trace_id, format } => {
            let trace_id = TraceId::from_raw(trace_id);
            let overview = client.get_session_overview(&trace_id)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&overview)?);
                }
                OutputFormat::Text => {
                    output::heading(&format!("trace {}", overview.trace_id));
                    println!("status:          {:?}", overview.status);
                    println!("current step:    {}", overview.current_step);
                    println!("steps:           {}", overview.total_steps);
                    println!("llm calls:       {}", overview.total_llm_calls);
                    println!("tool calls:      {}", overview.total_tool_calls);
                    println!("total tokens:    {}", overview.total_tokens);
                    println!("checkpoints:     {}", overview.checkpoints_available);
                    if !overview.errors.is_empty() {
                        output::warn(&format!("{} span(s) ended in error", overview.errors.len()));
                    }
                }
            }
            Ok(())
        }
        TraceCommand::Spans { trace_id } => {
            let trace_id = TraceId::from_raw(trace_id);
            let spans = client.store().get_trace_spans(&trace_id)?;
            if spans.is_empty() {
                println!("no spans recorded for {}", trace_id);
                return Ok(());
            }
            for span in spans {
                let status = match span.status {
                    SpanStatus::Ok => "ok",
                    SpanStatus::Error => "error",
                    SpanStatus::Started => "started",
                    SpanStatus::Timeout => "timeout",
                    SpanStatus::Cancelled => "cancelled",
                };
                println!(
                    "{}  {:<16?}  {:<8}  {}",
                    span.span_id, span.kind, status, span.name
                );
            }
            Ok(())
        }
        TraceCommand::Recover { trace_id } => {
            let trace_id = TraceId::from_raw(trace_id);
            let recovered = client.recover_dangling_spans(&trace_id)?;
            if recovered.is_empty() {
                println!("no dangling spans for {}", trace_id);
            } else {
                output::success(&format!("recovered {} dangling span(s)", recovered.len()));
            }
            Ok(())
        }
    }
}

fn run_checkpoint(base_path: &std::path::Path, cmd: CheckpointCommand) -> Result<()> {
    let client = Client::connect(base_path)?;

    match cmd {
        CheckpointCommand::Create {
            trace_id,
            step,
            description,
        } => {
            let trace_id = TraceId::from_raw(trace_id);
            let handle = client.trace(Some(trace_id));
            let (phase_state, attempt_state) = latest_phase_and_attempt(&client, &handle)?;
            let checkpoint =
                handle.create_phase_checkpoint(step, description, &phase_state, &attempt_state, None)?;
            output::success(&format!("created checkpoint {}", checkpoint.checkpoint_id));
            Ok(())
        }
        CheckpointCommand::List { trace_id } => {
            let trace_id = TraceId::from_raw(trace_id);
            let checkpoints = client.list_checkpoints(&trace_id, None)?;
            if checkpoints.is_empty() {
                println!("no checkpoints recorded for {}", trace_id);
                return Ok(());
            }
            for checkpoint in checkpoints {
                println!(
                    "{}  step={:<4}  {:?}  {}",
                    checkpoint.checkpoint_id, checkpoint.step_number, checkpoint.status, checkpoint.description
                );
            }
            Ok(())
        }
        CheckpointCommand::Fork { checkpoint_id } => {
            let checkpoint_id = excap_types::CheckpointId::from_raw(checkpoint_id);
            let (new_trace_id, _checkpoint) = client.fork_from_checkpoint(&checkpoint_id, None)?;
            output::success(&format!("forked into new trace {}", new_trace_id));
            Ok(())
        }
    }
}

fn run_phase(base_path: &std::path::Path, cmd: PhaseCommand) -> Result<()> {
    let client = Client::connect(base_path)?;

    match cmd {
        PhaseCommand::Status { trace_id } => {
            let trace_id = TraceId::from_raw(trace_id);
            let handle = client.trace(Some(trace_id.clone()));
            let checkpoints = client.list_checkpoints(&trace_id, None)?;
            let Some(latest) = checkpoints.last() else {
                println!("no phase checkpoint recorded for {} yet", trace_id);
                return Ok(());
            };
            let (phase_state, _attempt_state) = handle.peek_phase_checkpoint(&latest.checkpoint_id)?;

            output::heading(&format!("trace {}", trace_id));
            println!("phase:            {:?}", phase_state.current_phase);
            println!("remaining budget: {}", phase_state.remaining_budget());
            let (valid, missing) = phase_state.validate_phase_outputs();
            if valid {
                println!("required outputs: complete");
            } else {
                println!("required outputs: missing {}", missing.join(", "));
            }
            Ok(())
        }
    }
}

fn latest_phase_and_attempt(
    client: &Client,
    handle: &excap_sdk::TraceHandle,
) -> Result<(excap_sdk::SwePhaseState, excap_sdk::AttemptState)> {
    let checkpoints = client.list_checkpoints(handle.trace_id(), None)?;
    match checkpoints.last() {
        Some(checkpoint) => handle
            .peek_phase_checkpoint(&checkpoint.checkpoint_id)
            .context("reading phase state from latest checkpoint"),
        None => Ok((excap_sdk::SwePhaseState::new(), excap_sdk::AttemptState::default())),
    }
}
