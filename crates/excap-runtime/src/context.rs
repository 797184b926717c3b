//! C3 — Trace Context: a per-logical-actor helper that maintains a stack of
//! currently-open spans so callers don't thread `parent_span_id` by hand.
//!
//! Not thread-safe by design (`RefCell`, not `Mutex`): one logical thread of
//! agent control owns a `TraceContext`. Parallel workers use
//! `ForkedTraceContext` (see `forked_context`) instead.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use excap_types::{
    Artifact, ArtifactHash, ProvenanceObject, ProvenanceRelationKind, SpanId, SpanKind,
    SpanStatus, ToolProvenance, TraceId,
};
use excap_store::TraceStore;
use serde_json::Value;

use crate::error::Result;

pub struct TraceContext {
    store: Arc<TraceStore>,
    trace_id: TraceId,
    span_stack: RefCell<Vec<SpanId>>,
}

impl TraceContext {
    pub fn new(store: Arc<TraceStore>, trace_id: Option<TraceId>) -> Self {
        Self {
            store,
            trace_id: trace_id.unwrap_or_else(TraceId::new),
            span_stack: RefCell::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<TraceStore> {
        &self.store
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn current_span_id(&self) -> Option<SpanId> {
        self.span_stack.borrow().last().cloned()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn start_span(
        &self,
        kind: SpanKind,
        name: impl Into<String>,
        actor_id: impl Into<String>,
        attributes: Option<BTreeMap<String, Value>>,
        tool_provenance: Option<ToolProvenance>,
        input_artifact_hash: Option<ArtifactHash>,
    ) -> Result<SpanId> {
        let span_id = self.store.start_span(
            &self.trace_id,
            kind,
            name,
            actor_id,
            self.current_span_id(),
            attributes,
            tool_provenance,
            input_artifact_hash,
        )?;
        self.span_stack.borrow_mut().push(span_id.clone());
        Ok(span_id)
    }

    pub fn end_span(
        &self,
        status: SpanStatus,
        output_artifact_hash: Option<ArtifactHash>,
        error_class: Option<String>,
        error_message: Option<String>,
    ) -> Result<()> {
        let span_id = match self.span_stack.borrow_mut().pop() {
            Some(id) => id,
            None => return Ok(()),
        };
        self.store
            .end_span(
                &self.trace_id,
                &span_id,
                status,
                output_artifact_hash,
                error_class,
                error_message,
                None,
            )
            .map_err(Into::into)
    }

    pub fn store_artifact(
        &self,
        data: &[u8],
        artifact_type: impl Into<String>,
        content_type: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Artifact> {
        self.store
            .store_artifact(data, artifact_type, content_type, metadata)
            .map_err(Into::into)
    }

    /// Record provenance with the current span as subject. A no-op if no
    /// span is open.
    pub fn add_provenance(
        &self,
        relation: ProvenanceRelationKind,
        object: ProvenanceObject,
    ) -> Result<()> {
        let Some(subject) = self.current_span_id() else {
            return Ok(());
        };
        self.store
            .add_provenance(&self.trace_id, relation, &subject, object)
            .map_err(Into::into)
    }
}
