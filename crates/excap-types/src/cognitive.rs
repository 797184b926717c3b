//! Cognitive events: a coarse-grained timeline of agent reasoning markers,
//! queried separately from the span hierarchy (SPEC_FULL.md §3.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::TraceId;

/// One row of the `cognitive_events` table.
///
/// `timestamp` is stored as float seconds since the epoch rather than as an
/// ISO-8601 string, unlike every other timestamped entity in this crate —
/// preserved deliberately, see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveEvent {
    pub id: i64,
    pub trace_id: TraceId,
    /// Free-form tag, e.g. `decision`, `reflection`, `self_correction`.
    pub event_type: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
