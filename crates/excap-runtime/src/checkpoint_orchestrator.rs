//! C10 — Checkpoint & Fork Orchestrator: the pause/resume/fork lifecycle
//! built on top of `excap_store`'s checkpoint rows (SPEC_FULL.md §4.10,
//! §4.10.1). Generic over the caller's own phase-state/attempt-state types
//! so this crate stays independent of `excap-phases`.

use excap_store::TraceStore;
use excap_types::{Checkpoint, CheckpointId, CheckpointStatus, TraceId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Deserialize)]
struct PausedState<P, A> {
    phase_state: P,
    attempt_state: A,
}

/// Snapshot `state_bytes` as an artifact and record a checkpoint row. Thin
/// pass-through kept here (rather than calling `TraceStore` directly) so
/// callers import one orchestration surface for all of C10.
pub fn create_checkpoint(
    store: &TraceStore,
    trace_id: &TraceId,
    step: u64,
    description: impl Into<String>,
    state_bytes: &[u8],
    parent_checkpoint_id: Option<CheckpointId>,
    metadata: Option<Value>,
) -> Result<Checkpoint> {
    store
        .create_checkpoint(trace_id, step, description, state_bytes, parent_checkpoint_id, metadata)
        .map_err(Into::into)
}

/// Load the parent's state blob, mark it FORKED, and mint a new checkpoint
/// in a new trace referencing the same state artifact.
pub fn fork_from_checkpoint(
    store: &TraceStore,
    checkpoint_id: &CheckpointId,
    new_trace_id: Option<TraceId>,
) -> Result<(TraceId, Checkpoint)> {
    store
        .fork_from_checkpoint(checkpoint_id, new_trace_id)
        .map_err(Into::into)
}

/// Serialize `{phase_state, attempt_state}` as JSON, store it as a
/// `checkpoint_state` artifact, and create an ACTIVE checkpoint.
pub fn pause<P: Serialize, A: Serialize>(
    store: &TraceStore,
    trace_id: &TraceId,
    step: u64,
    description: impl Into<String>,
    phase_state: &P,
    attempt_state: &A,
    metadata: Option<Value>,
) -> Result<Checkpoint> {
    let bytes = serde_json::to_vec(&PausedStateRef {
        phase_state,
        attempt_state,
    })?;
    create_checkpoint(store, trace_id, step, description, &bytes, None, metadata)
}

#[derive(Serialize)]
struct PausedStateRef<'a, P, A> {
    phase_state: &'a P,
    attempt_state: &'a A,
}

/// Load a checkpoint's state artifact and deserialize it back into the
/// `(phase_state, attempt_state)` pair. A FORKED checkpoint is terminal for
/// resumption and refused: it resumes only via its fork.
pub fn resume<P: DeserializeOwned, A: DeserializeOwned>(
    store: &TraceStore,
    checkpoint_id: &CheckpointId,
) -> Result<(P, A)> {
    let checkpoint = store
        .get_checkpoint(checkpoint_id)?
        .ok_or_else(|| Error::Store(excap_store::Error::NotFound(format!("checkpoint {}", checkpoint_id))))?;

    if checkpoint.status == CheckpointStatus::Forked {
        return Err(Error::PolicyViolation(format!(
            "checkpoint {} was forked; resume via its fork, not directly",
            checkpoint_id
        )));
    }

    let bytes = store
        .get_checkpoint_state(checkpoint_id)?
        .ok_or_else(|| Error::Store(excap_store::Error::NotFound(format!("checkpoint state {}", checkpoint_id))))?;
    let parsed: PausedState<P, A> = serde_json::from_slice(&bytes)?;

    store.update_checkpoint_status(checkpoint_id, CheckpointStatus::Resumed)?;

    Ok((parsed.phase_state, parsed.attempt_state))
}

/// Load a checkpoint's state artifact and deserialize it, without mutating
/// the checkpoint's status. Unlike `resume`, this never transitions the
/// checkpoint to RESUMED and never refuses a FORKED checkpoint — it is
/// safe to call repeatedly for read-only inspection (e.g. `phase status`,
/// or peeking at the latest checkpoint before writing the next one).
pub fn peek<P: DeserializeOwned, A: DeserializeOwned>(
    store: &TraceStore,
    checkpoint_id: &CheckpointId,
) -> Result<(P, A)> {
    let bytes = store
        .get_checkpoint_state(checkpoint_id)?
        .ok_or_else(|| Error::Store(excap_store::Error::NotFound(format!("checkpoint state {}", checkpoint_id))))?;
    let parsed: PausedState<P, A> = serde_json::from_slice(&bytes)?;
    Ok((parsed.phase_state, parsed.attempt_state))
}

/// Compose `fork_from_checkpoint` with `resume`'s deserialization so callers
/// get a ready-to-run state pair in the new trace without a second round
/// trip.
pub fn fork<P: DeserializeOwned, A: DeserializeOwned>(
    store: &TraceStore,
    checkpoint_id: &CheckpointId,
    new_trace_id: Option<TraceId>,
) -> Result<(TraceId, P, A)> {
    let bytes = store
        .get_checkpoint_state(checkpoint_id)?
        .ok_or_else(|| Error::Store(excap_store::Error::NotFound(format!("checkpoint state {}", checkpoint_id))))?;
    let parsed: PausedState<P, A> = serde_json::from_slice(&bytes)?;

    let (new_trace_id, _new_checkpoint) = fork_from_checkpoint(store, checkpoint_id, new_trace_id)?;

    Ok((new_trace_id, parsed.phase_state, parsed.attempt_state))
}
