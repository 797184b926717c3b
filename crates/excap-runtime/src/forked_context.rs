//! C4 — Forked Trace Context: used exclusively by parallel workers. Shares
//! `trace_store`/`trace_id` with the parent context but owns a private span
//! stack, so concurrent workers never observe or mutate each other's stack
//! (SPEC_FULL.md §4.4's invariant).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use excap_types::{Artifact, ArtifactHash, SpanId, SpanKind, SpanStatus, ToolProvenance, TraceId};
use excap_store::TraceStore;
use serde_json::Value;

use crate::context::TraceContext;
use crate::error::Result;

pub struct ForkedTraceContext {
    store: Arc<TraceStore>,
    trace_id: TraceId,
    seeded_parent_span_id: Option<SpanId>,
    span_stack: RefCell<Vec<SpanId>>,
}

impl ForkedTraceContext {
    pub fn new(store: Arc<TraceStore>, trace_id: TraceId, seeded_parent_span_id: Option<SpanId>) -> Self {
        Self {
            store,
            trace_id,
            seeded_parent_span_id,
            span_stack: RefCell::new(Vec::new()),
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Top of this fork's own stack, or the seeded parent when the stack is
    /// empty — never the parent context's current span.
    pub fn current_span_id(&self) -> Option<SpanId> {
        self.span_stack
            .borrow()
            .last()
            .cloned()
            .or_else(|| self.seeded_parent_span_id.clone())
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
        let parent = self.current_span_id();
        let span_id = self.store.start_span(
            &self.trace_id,
            kind,
            name,
            actor_id,
            parent,
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
}

/// Fork `parent`'s trace (store + trace_id only — the main context's own
/// stack is never consulted) into an independent context seeded at
/// `parent_span_id`.
pub fn fork_trace_context(parent: &TraceContext, parent_span_id: Option<SpanId>) -> ForkedTraceContext {
    ForkedTraceContext::new(parent.store().clone(), parent.trace_id().clone(), parent_span_id)
}
