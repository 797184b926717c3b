//! W3C-PROV-inspired lineage edges between spans and/or artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ArtifactHash, SpanId, TraceId};

/// The relation a provenance edge asserts between its subject and object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceRelationKind {
    Used,
    WasGeneratedBy,
    WasDerivedFrom,
    WasAttributedTo,
    WasInformedBy,
}

/// The object of a provenance edge: either another span or an artifact,
/// never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceObject {
    Span(SpanId),
    Artifact(ArtifactHash),
}

/// One row of the `provenance` table.
///
/// Append-only; dangling references (a subject outliving its referent's
/// scope) are permitted and MUST NOT be silently resolved to the wrong
/// object — callers that fail to find the referent should surface absence,
/// not a stale substitute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRelation {
    pub id: i64,
    pub trace_id: TraceId,
    pub relation: ProvenanceRelationKind,
    pub subject_span_id: SpanId,
    pub object: ProvenanceObject,
    pub timestamp: DateTime<Utc>,
}
