//! `excap-sdk`: the public facade over `excap-store`, `excap-runtime`, and
//! `excap-phases` for an embedder building an agent harness on top of the
//! execution capture substrate.
//!
//! # Quickstart
//!
//! ```no_run
//! use excap_sdk::Client;
//! use excap_types::{SpanKind, SpanStatus};
//!
//! # fn main() -> excap_sdk::Result<()> {
//! let client = Client::connect("/tmp/excap-quickstart")?;
//! let trace = client.trace(None);
//!
//! let span = trace.start_span(SpanKind::AgentTurn, "turn 1", "main")?;
//! trace.end_span(SpanStatus::Ok)?;
//! # let _ = span;
//!
//! let overview = client.get_session_overview(trace.trace_id())?;
//! println!("{} tool calls so far", overview.total_tool_calls);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `excap-types`: the data model (spans, artifacts, provenance,
//!   checkpoints).
//! - `excap-store`: durable persistence (C1, C2, C9).
//! - `excap-runtime`: trace contexts and the conflict-aware parallel
//!   executor (C3-C6, C10).
//! - `excap-phases`: the SWE phase state machine and cross-attempt learning
//!   (C7, C8).
//!
//! This crate wires them together behind [`Client`]/[`TraceHandle`] and adds
//! [`PhasedHarness`], which enforces C7's budget/allowlist in front of C6's
//! parallel dispatch.

pub mod client;
pub mod error;
pub mod phased;
pub mod workspace;

pub use client::{Client, TraceHandle};
pub use error::{Error, Result};
pub use phased::PhasedHarness;
pub use workspace::{expand_tilde, resolve_workspace_path, Config};

// Re-exported so embedders rarely need a direct dependency on the sibling
// crates for everyday use.
pub use excap_phases::{AttemptState, FailureContext, SwePhase, SwePhaseState};
pub use excap_runtime::{ConflictClass, ConflictModel, JoinSpan, ParallelExecutor, ToolHarness};
pub use excap_store::{SessionOverview, SessionStatus, SummaryEventLog};
pub use excap_types::{
    Artifact, ArtifactHash, Checkpoint, CheckpointId, CheckpointStatus, ProvenanceRelationKind,
    Span, SpanKind, SpanStatus, ToolCall, ToolResult, TraceId,
};
