//! Checkpoint rows: named, full-snapshot points in a trace that enable
//! pause/resume and forking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ArtifactHash, CheckpointId, TraceId};

/// Lifecycle status of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Active,
    Resumed,
    Forked,
    Archived,
}

/// One row of the `checkpoints` table.
///
/// `state_artifact_hash` always points at a *full* snapshot, never a delta
/// — this is what makes `fork_from_checkpoint` cheap (no copy, just a new
/// row referencing the same hash) and repeated no-op snapshots free (same
/// bytes hash to the same artifact).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: CheckpointId,
    pub trace_id: TraceId,
    pub created_ts: DateTime<Utc>,
    pub status: CheckpointStatus,
    pub step_number: u64,
    pub description: String,
    pub state_artifact_hash: ArtifactHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_checkpoint_id: Option<CheckpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
