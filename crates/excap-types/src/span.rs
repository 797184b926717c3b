//! The derived `Span` view and the vocabulary it is built from.
//!
//! A `Span` is never itself persisted; it is folded from `TraceEvent`s by
//! `reconstruct_span` (see `excap-store`). This module only defines the
//! shape of that fold's result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ArtifactHash, SpanId};

/// What kind of unit of work a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    AgentTurn,
    LlmCall,
    ToolCall,
    Reasoning,
    StateChange,
    ArtifactCapture,
    BrowserSession,
    MemoryOperation,
    ContextAssembly,
}

/// Terminal (or non-terminal) status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Started,
    Ok,
    Error,
    Timeout,
    Cancelled,
}

/// Stable fingerprint of a tool's declared behavior, embedded in span
/// attributes so drift in the same tool name across runs is detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolProvenance {
    pub tool_name: String,
    pub schema_hash: String,
    pub impl_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_fingerprint: BTreeMap<String, String>,
}

/// A reconstructed span: the read-side view folded from events sharing one
/// `span_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub span_id: SpanId,
    pub kind: SpanKind,
    pub name: String,
    pub actor_id: String,
    pub actor_seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub start_ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<DateTime<Utc>>,
    pub status: SpanStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SpanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_provenance: Option<ToolProvenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_artifact_hash: Option<ArtifactHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact_hash: Option<ArtifactHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Span {
    /// Milliseconds between start and end, absent while the span is open.
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_ts
            .map(|end| (end - self.start_ts).num_milliseconds())
    }

    pub fn is_open(&self) -> bool {
        self.end_ts.is_none()
    }
}
