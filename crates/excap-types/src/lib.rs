//! Core data model for the execution capture substrate: identifiers,
//! events, spans, artifacts, provenance, checkpoints, and the minimal
//! tool-call contract the runtime layers operate over.
//!
//! This crate defines shapes only — no storage, no threading. See
//! `excap-store` for persistence and `excap-runtime` for the context and
//! parallel-execution machinery built on top of these types.

pub mod artifact;
pub mod checkpoint;
pub mod cognitive;
pub mod error;
pub mod event;
pub mod ids;
pub mod provenance;
pub mod span;
pub mod tool;

pub use artifact::Artifact;
pub use checkpoint::{Checkpoint, CheckpointStatus};
pub use cognitive::CognitiveEvent;
pub use error::{Error, Result};
pub use event::{
    ArtifactCreatedData, EventPayload, SpanAttributeData, SpanEndData, SpanLinkData,
    SpanStartData, TraceEvent, TraceEventType,
};
pub use ids::{ArtifactHash, CheckpointId, SpanId, TraceId};
pub use provenance::{ProvenanceObject, ProvenanceRelation, ProvenanceRelationKind};
pub use span::{Span, SpanKind, SpanStatus, ToolProvenance};
pub use tool::{ToolCall, ToolError, ToolResult};
