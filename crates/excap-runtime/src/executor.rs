//! C6 — Parallel Executor: partitions a batch of tool calls into
//! conflict-free groups (via the Conflict Model) and runs each group
//! either inline (size 1) or on a bounded worker pool (size > 1), using
//! named `std::thread`s and `mpsc` per SPEC_FULL.md §5.1 rather than an
//! async runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use excap_store::TraceStore;
use excap_types::{SpanId, ToolCall, ToolResult, TraceId};

use crate::active_context::ActiveContextGuard;
use crate::conflict::ConflictModel;
use crate::forked_context::ForkedTraceContext;

/// A soft, cooperative cancellation signal shared between the caller that
/// requests cancellation and the `ParallelExecutor` dispatching groups on
/// its behalf (SPEC_FULL.md §5's "cancellation propagates through the
/// worker pool as a soft signal").
///
/// `execute_parallel` checks this between groups: a group already
/// dispatched runs to completion (best effort — there is no way to
/// forcibly interrupt a tool handler already in progress), but once set,
/// every *pending* group's calls are skipped and returned as failed
/// `ToolResult`s carrying the `Cancelled` error class, without ever
/// invoking the harness or opening a span for them.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The external tool dispatcher this executor drives. Implementations MUST
/// be callable from any thread and MUST NOT retain references to the trace
/// context after `execute` returns (SPEC_FULL.md §6).
pub trait ToolHarness: Send + Sync {
    fn execute(&self, call: &ToolCall) -> ToolResult;
}

struct Inner<H: ToolHarness> {
    harness: H,
    trace_handle: Option<(Arc<TraceStore>, TraceId)>,
    max_workers: usize,
    conflict_model: ConflictModel,
}

/// Cheaply cloneable (an `Arc` around its state) so a group's worker
/// threads can each hold their own handle.
pub struct ParallelExecutor<H: ToolHarness> {
    inner: Arc<Inner<H>>,
}

impl<H: ToolHarness> Clone for ParallelExecutor<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: ToolHarness + 'static> ParallelExecutor<H> {
    pub fn new(
        harness: H,
        trace_handle: Option<(Arc<TraceStore>, TraceId)>,
        max_workers: usize,
        conflict_model: ConflictModel,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                harness,
                trace_handle,
                max_workers: max_workers.max(1),
                conflict_model,
            }),
        }
    }

    pub fn conflict_model(&self) -> &ConflictModel {
        &self.inner.conflict_model
    }

    /// Execute `tool_calls`, returning results in the same order as the
    /// input. Conflict-free calls run concurrently; conflicting ones run
    /// strictly in order. Never cancellable once started.
    pub fn execute_parallel(
        &self,
        tool_calls: Vec<ToolCall>,
        parent_span_id: Option<SpanId>,
    ) -> Vec<ToolResult> {
        self.execute_parallel_cancellable(tool_calls, parent_span_id, &CancellationToken::new())
    }

    /// Same as `execute_parallel`, but checks `cancel` before dispatching
    /// each group. A group already dispatched always runs to completion;
    /// once `cancel` is observed set, every subsequent group's calls are
    /// skipped and returned as `Cancelled` failures with no span opened
    /// (SPEC_FULL.md §4.6 "Cancellation").
    pub fn execute_parallel_cancellable(
        &self,
        tool_calls: Vec<ToolCall>,
        parent_span_id: Option<SpanId>,
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        if tool_calls.is_empty() {
            return Vec::new();
        }

        let groups = self.inner.conflict_model.partition_by_conflicts(&tool_calls);
        let mut results_by_id: HashMap<String, ToolResult> = HashMap::new();
        let mut skipping = false;

        for group in groups {
            if cancel.is_cancelled() {
                skipping = true;
            }
            if skipping {
                for call in &group {
                    results_by_id.insert(
                        call.id.clone(),
                        ToolResult::failed(call.id.clone(), "Cancelled", "batch cancelled before this group was dispatched"),
                    );
                }
                continue;
            }

            if group.len() == 1 {
                let result = self.execute_single(&group[0], parent_span_id.clone());
                results_by_id.insert(group[0].id.clone(), result);
            } else {
                for (call, result) in group.iter().cloned().zip(
                    self.execute_group_parallel(group.clone(), parent_span_id.clone()),
                ) {
                    results_by_id.insert(call.id, result);
                }
            }
        }

        tool_calls
            .into_iter()
            .map(|call| {
                results_by_id
                    .remove(&call.id)
                    .unwrap_or_else(|| ToolResult::failed(call.id, "MissingResult", "no result recorded for call"))
            })
            .collect()
    }

    fn execute_single(&self, call: &ToolCall, parent_span_id: Option<SpanId>) -> ToolResult {
        match self.inner.conflict_model.get_resource_key(call) {
            Some(key) => {
                let lock = self.inner.conflict_model.get_lock(&key);
                let _guard = lock.lock().expect("resource lock poisoned");
                self.execute_with_context(call, parent_span_id)
            }
            None => self.execute_with_context(call, parent_span_id),
        }
    }

    fn execute_with_context(&self, call: &ToolCall, parent_span_id: Option<SpanId>) -> ToolResult {
        let Some((store, trace_id)) = &self.inner.trace_handle else {
            return self.inner.harness.execute(call);
        };

        let forked = ForkedTraceContext::new(store.clone(), trace_id.clone(), parent_span_id);
        let _context_guard = ActiveContextGuard::install(forked);
        self.inner.harness.execute(call)
    }

    fn execute_group_parallel(
        &self,
        calls: Vec<ToolCall>,
        parent_span_id: Option<SpanId>,
    ) -> Vec<ToolResult> {
        let n_workers = self.inner.max_workers.min(calls.len()).max(1);

        let (task_tx, task_rx) = mpsc::channel::<(usize, ToolCall)>();
        for (index, call) in calls.iter().cloned().enumerate() {
            task_tx.send((index, call)).expect("task receiver alive");
        }
        drop(task_tx);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let (result_tx, result_rx) = mpsc::channel::<(usize, ToolResult)>();

        let handles: Vec<_> = (0..n_workers)
            .map(|worker_index| {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let parent_span_id = parent_span_id.clone();
                let executor = self.clone();
                thread::Builder::new()
                    .name(format!("excap-parallel-worker-{}", worker_index))
                    .spawn(move || loop {
                        let next = {
                            let rx = task_rx.lock().expect("task queue mutex poisoned");
                            rx.recv()
                        };
                        let Ok((index, call)) = next else { break };
                        let result = executor.execute_single(&call, parent_span_id.clone());
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    })
                    .expect("spawn parallel worker thread")
            })
            .collect();
        drop(result_tx);

        let mut results: Vec<Option<ToolResult>> = (0..calls.len()).map(|_| None).collect();
        for (index, result) in result_rx {
            results[index] = Some(result);
        }

        for handle in handles {
            let _ = handle.join();
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.unwrap_or_else(|| {
                    ToolResult::failed(
                        calls[index].id.clone(),
                        "WorkerPanicked",
                        "worker thread terminated without producing a result",
                    )
                })
            })
            .collect()
    }
}

/// Fan-in helper: links a JOIN span to every child span produced by a
/// parallel group so lineage queries can traverse backward from the merge
/// point (SPEC_FULL.md §4.6).
pub struct JoinSpan<'a> {
    context: &'a crate::context::TraceContext,
    name: String,
    actor_id: String,
    merge_policy: String,
    child_span_ids: Vec<SpanId>,
}

impl<'a> JoinSpan<'a> {
    pub fn new(
        context: &'a crate::context::TraceContext,
        name: impl Into<String>,
        actor_id: impl Into<String>,
        merge_policy: impl Into<String>,
    ) -> Self {
        Self {
            context,
            name: name.into(),
            actor_id: actor_id.into(),
            merge_policy: merge_policy.into(),
            child_span_ids: Vec::new(),
        }
    }

    pub fn add_child(&mut self, span_id: SpanId) {
        self.child_span_ids.push(span_id);
    }

    /// Open the JOIN span and link every registered child.
    pub fn start(&self) -> crate::error::Result<SpanId> {
        let mut attributes = std::collections::BTreeMap::new();
        attributes.insert("join_type".to_string(), serde_json::json!("fan_in"));
        attributes.insert("merge_policy".to_string(), serde_json::json!(self.merge_policy));
        attributes.insert(
            "child_count".to_string(),
            serde_json::json!(self.child_span_ids.len()),
        );

        let span_id = self.context.start_span(
            excap_types::SpanKind::Reasoning,
            self.name.clone(),
            self.actor_id.clone(),
            Some(attributes),
            None,
            None,
        )?;

        for child in &self.child_span_ids {
            self.context
                .store()
                .add_span_link(self.context.trace_id(), &span_id, child.clone())?;
        }

        Ok(span_id)
    }

    /// Close the JOIN span. Call after `start` once every child result is
    /// in hand.
    pub fn finish(
        &self,
        status: excap_types::SpanStatus,
        error_class: Option<String>,
        error_message: Option<String>,
    ) -> crate::error::Result<()> {
        self.context.end_span(status, None, error_class, error_message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    use excap_store::ArtifactStore;
    use excap_types::{SpanKind, SpanStatus};
    use serde_json::json;

    use super::*;
    use crate::active_context::with_active_context;
    use crate::context::TraceContext;

    fn trace_store() -> (Arc<TraceStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("artifacts")).unwrap());
        let store = Arc::new(TraceStore::open_in_memory(artifacts).unwrap());
        (store, dir)
    }

    /// A harness that sleeps briefly and records, under the active thread's
    /// forked context, a TOOL_CALL span named after the call, then reports
    /// the (start, end) instants observed so tests can assert on ordering
    /// and concurrency.
    struct RecordingHarness {
        delay: Duration,
        observed: StdMutex<Vec<(String, Instant, Instant)>>,
        call_count: AtomicUsize,
    }

    impl RecordingHarness {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                observed: StdMutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }
    }

    impl ToolHarness for RecordingHarness {
        fn execute(&self, call: &ToolCall) -> ToolResult {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let start = Instant::now();

            let span_id = with_active_context(|ctx| {
                ctx.start_span(SpanKind::ToolCall, call.name.clone(), "worker", None, None, None)
                    .unwrap()
            });
            std::thread::sleep(self.delay);
            if let Some(span_id) = &span_id {
                with_active_context(|ctx| {
                    ctx.end_span(SpanStatus::Ok, None, None, None).unwrap();
                });
                let _ = span_id;
            }

            let end = Instant::now();
            self.observed
                .lock()
                .unwrap()
                .push((call.name.clone(), start, end));

            ToolResult::ok(call.id.clone(), "done")
        }
    }

    #[test]
    fn scenario_b_parallel_non_conflicting_reads_share_one_parent() {
        let (store, _dir) = trace_store();
        let trace_id = TraceId::new();
        let harness = RecordingHarness::new(Duration::from_millis(20));
        let executor = ParallelExecutor::new(harness, Some((store.clone(), trace_id.clone())), 3, ConflictModel::new());

        let parent_id = store
            .start_span(&trace_id, SpanKind::AgentTurn, "batch", "main", None, None, None, None)
            .unwrap();

        let calls = vec![
            ToolCall::new("1", "Read", json!({"file_path": "/a"})),
            ToolCall::new("2", "Read", json!({"file_path": "/b"})),
            ToolCall::new("3", "Read", json!({"file_path": "/c"})),
        ];

        let start = Instant::now();
        let results = executor.execute_parallel(calls, Some(parent_id.clone()));
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert!(elapsed < Duration::from_millis(40), "expected overlap, took {:?}", elapsed);

        let spans = store.get_trace_spans(&trace_id).unwrap();
        let tool_spans: Vec<_> = spans.iter().filter(|s| s.kind == SpanKind::ToolCall).collect();
        assert_eq!(tool_spans.len(), 3);
        for span in tool_spans {
            assert_eq!(span.parent_span_id, Some(parent_id.clone()));
        }
    }

    #[test]
    fn cancelling_before_dispatch_skips_every_group_with_no_spans_opened() {
        let (store, _dir) = trace_store();
        let trace_id = TraceId::new();
        let harness = RecordingHarness::new(Duration::from_millis(5));
        let executor = ParallelExecutor::new(harness, Some((store.clone(), trace_id.clone())), 2, ConflictModel::new());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let calls = vec![
            ToolCall::new("1", "Read", json!({"file_path": "/a"})),
            ToolCall::new("2", "Edit", json!({"file_path": "/x"})),
        ];
        let results = executor.execute_parallel_cancellable(calls, None, &cancel);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results.iter().all(|r| r.error.as_ref().unwrap().class == "Cancelled"));
        assert_eq!(executor.inner.harness.call_count.load(Ordering::SeqCst), 0);
        assert!(store.get_trace_spans(&trace_id).unwrap().is_empty());
    }

    #[test]
    fn cancelling_mid_batch_lets_in_flight_group_finish_but_skips_the_rest() {
        let (store, _dir) = trace_store();
        let trace_id = TraceId::new();
        let harness = RecordingHarness::new(Duration::from_millis(10));
        let executor = ParallelExecutor::new(harness, Some((store.clone(), trace_id.clone())), 2, ConflictModel::new());

        let cancel = CancellationToken::new();
        let cancel_canceller = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(3));
            cancel_canceller.cancel();
        });

        // Two non-conflicting reads (one group, dispatched before the
        // cancellation lands) followed by a write that should be skipped.
        let calls = vec![
            ToolCall::new("1", "Read", json!({"file_path": "/a"})),
            ToolCall::new("2", "Read", json!({"file_path": "/b"})),
            ToolCall::new("3", "Edit", json!({"file_path": "/x"})),
        ];
        let results = executor.execute_parallel_cancellable(calls, None, &cancel);

        assert_eq!(results.len(), 3);
        assert!(results[0].success && results[1].success, "in-flight group runs to completion");
        assert!(!results[2].success);
        assert_eq!(results[2].error.as_ref().unwrap().class, "Cancelled");
    }

    #[test]
    fn scenario_c_conflicting_writes_run_strictly_in_order() {
        let (store, _dir) = trace_store();
        let trace_id = TraceId::new();
        let harness = RecordingHarness::new(Duration::from_millis(5));
        let executor = ParallelExecutor::new(harness, Some((store.clone(), trace_id.clone())), 4, ConflictModel::new());

        let calls = vec![
            ToolCall::new("1", "Edit", json!({"file_path": "/x"})),
            ToolCall::new("2", "Edit", json!({"file_path": "/x"})),
        ];

        let results = executor.execute_parallel(calls, None);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));

        let observed = executor.inner.harness.observed.lock().unwrap();
        assert_eq!(observed.len(), 2);
        let (_, _start_a, end_a) = &observed[0];
        let (_, start_b, _) = &observed[1];
        assert!(end_a <= start_b, "conflicting writes must not interleave");
    }

    #[test]
    fn results_are_returned_in_input_order_regardless_of_group_completion_order() {
        let (store, _dir) = trace_store();
        let trace_id = TraceId::new();
        let harness = RecordingHarness::new(Duration::from_millis(1));
        let executor = ParallelExecutor::new(harness, Some((store, trace_id)), 4, ConflictModel::new());

        let calls = vec![
            ToolCall::new("a", "Read", json!({"file_path": "/1"})),
            ToolCall::new("b", "Read", json!({"file_path": "/2"})),
            ToolCall::new("c", "Read", json!({"file_path": "/3"})),
        ];
        let results = executor.execute_parallel(calls, None);
        let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn join_span_links_every_child() {
        let (store, _dir) = trace_store();
        let trace_id = TraceId::new();
        let context = TraceContext::new(store.clone(), Some(trace_id.clone()));

        let child_a = store
            .start_span(&trace_id, SpanKind::ToolCall, "Read", "w1", None, None, None, None)
            .unwrap();
        let child_b = store
            .start_span(&trace_id, SpanKind::ToolCall, "Read", "w2", None, None, None, None)
            .unwrap();

        let mut join = JoinSpan::new(&context, "join", "main", "aggregate_all");
        join.add_child(child_a.clone());
        join.add_child(child_b.clone());
        let join_span_id = join.start().unwrap();
        join.finish(SpanStatus::Ok, None, None).unwrap();

        let span = store.reconstruct_span(&trace_id, &join_span_id).unwrap().unwrap();
        assert_eq!(span.links, vec![child_a, child_b]);
        assert_eq!(span.status, SpanStatus::Ok);
    }
}
