//! Per-actor trace contexts, the conflict-aware parallel executor, and
//! checkpoint pause/resume/fork orchestration built on `excap-store`.
//!
//! This crate has no phase awareness of its own — the `PolicyViolation`
//! arm of its `Error` type exists for phase-aware dispatch helpers built on
//! top of it (see `excap-phases`/`excap-sdk`), not for the Parallel
//! Executor, which dispatches any tool call it is handed.

pub mod active_context;
pub mod checkpoint_orchestrator;
pub mod conflict;
pub mod context;
pub mod error;
pub mod executor;
pub mod forked_context;

pub use active_context::{clear_thread_local_context, set_thread_local_context, with_active_context, ActiveContextGuard};
pub use conflict::{ConflictClass, ConflictModel};
pub use context::TraceContext;
pub use error::{Error, Result};
pub use executor::{CancellationToken, JoinSpan, ParallelExecutor, ToolHarness};
pub use forked_context::{fork_trace_context, ForkedTraceContext};
