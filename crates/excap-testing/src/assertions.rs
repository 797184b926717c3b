//! Thin assertion helpers over `TraceStore::reconstruct_span`, so test
//! bodies read as intent ("this span is parented at that one") instead of
//! repeating the `Option`-unwrapping boilerplate at every call site.

use excap_store::TraceStore;
use excap_types::{SpanId, SpanStatus, TraceId};

/// Panics unless `span_id` exists in `trace_id` and its `parent_span_id`
/// equals `expected_parent`.
pub fn assert_parented_at(
    store: &TraceStore,
    trace_id: &TraceId,
    span_id: &SpanId,
    expected_parent: &SpanId,
) {
    let span = store
        .reconstruct_span(trace_id, span_id)
        .expect("reconstruct_span failed")
        .unwrap_or_else(|| panic!("span {:?} not found in trace {:?}", span_id, trace_id));
    assert_eq!(
        span.parent_span_id.as_ref(),
        Some(expected_parent),
        "expected span {:?} to be parented at {:?}, got {:?}",
        span_id,
        expected_parent,
        span.parent_span_id
    );
}

/// Panics unless `span_id` exists in `trace_id` and its status equals
/// `expected`.
pub fn assert_span_status(
    store: &TraceStore,
    trace_id: &TraceId,
    span_id: &SpanId,
    expected: SpanStatus,
) {
    let span = store
        .reconstruct_span(trace_id, span_id)
        .expect("reconstruct_span failed")
        .unwrap_or_else(|| panic!("span {:?} not found in trace {:?}", span_id, trace_id));
    assert_eq!(
        span.status, expected,
        "expected span {:?} to have status {:?}, got {:?}",
        span_id, expected, span.status
    );
}
