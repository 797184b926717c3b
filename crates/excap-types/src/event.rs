//! The append-only primitive: `TraceEvent`.
//!
//! `TraceEvent` is the only row type ever written to the durable event log.
//! Once written it is never modified or deleted; every other entity in this
//! crate (`Span`, `Checkpoint`, ...) is a read-side projection over a
//! sequence of these.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ArtifactHash, SpanId, TraceId};
use crate::span::{SpanKind, SpanStatus, ToolProvenance};

/// Discriminant for `TraceEvent::data`.
///
/// `ProvenanceRelation` is part of the vocabulary for completeness but is
/// never actually constructed: provenance relations are persisted in the
/// dedicated `provenance` table instead (see SPEC_FULL.md §9.1 item 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventType {
    SpanStart,
    SpanEnd,
    SpanAttribute,
    SpanLink,
    ArtifactCreated,
    ProvenanceRelation,
}

/// Payload carried by a SPAN_START event: the seed of a span reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanStartData {
    pub kind: SpanKind,
    pub name: String,
    pub actor_id: String,
    pub actor_seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_provenance: Option<ToolProvenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_artifact_hash: Option<ArtifactHash>,
}

/// Payload carried by the (at most one) SPAN_END event for a span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEndData {
    pub status: SpanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact_hash: Option<ArtifactHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_attributes: BTreeMap<String, Value>,
}

/// Payload carried by a SPAN_ATTRIBUTE event: a partial attribute merge,
/// later events winning per key during reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanAttributeData {
    pub attributes: BTreeMap<String, Value>,
}

/// Payload carried by a SPAN_LINK event: fan-in edges added during joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanLinkData {
    pub linked_span_id: SpanId,
}

/// Payload carried by an ARTIFACT_CREATED event, mirroring the artifact row
/// written alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactCreatedData {
    pub artifact_hash: ArtifactHash,
    pub artifact_type: String,
    pub content_type: String,
    pub byte_len: u64,
}

/// Variant-typed payload of a `TraceEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    SpanStart(SpanStartData),
    SpanEnd(SpanEndData),
    SpanAttribute(SpanAttributeData),
    SpanLink(SpanLinkData),
    ArtifactCreated(ArtifactCreatedData),
}

impl EventPayload {
    pub fn event_type(&self) -> TraceEventType {
        match self {
            EventPayload::SpanStart(_) => TraceEventType::SpanStart,
            EventPayload::SpanEnd(_) => TraceEventType::SpanEnd,
            EventPayload::SpanAttribute(_) => TraceEventType::SpanAttribute,
            EventPayload::SpanLink(_) => TraceEventType::SpanLink,
            EventPayload::ArtifactCreated(_) => TraceEventType::ArtifactCreated,
        }
    }
}

/// One immutable row of the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_id: i64,
    pub timestamp: DateTime<Utc>,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(flatten)]
    pub payload: EventPayload,
}
