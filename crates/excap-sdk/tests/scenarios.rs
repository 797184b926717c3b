//! End-to-end scenarios exercising the full stack (store + runtime +
//! phases) through the `excap-sdk` facade: one test per lettered
//! walkthrough of the system.

use excap_sdk::{Client, ConflictModel, ProvenanceRelationKind, SpanKind, SpanStatus, SwePhaseState, ToolCall, ToolResult};
use excap_testing::{conflicting_write_batch, non_conflicting_read_batch};

struct EchoHarness;
impl excap_sdk::ToolHarness for EchoHarness {
    fn execute(&self, call: &ToolCall) -> ToolResult {
        ToolResult::ok(call.id.clone(), format!("ran {}", call.name))
    }
}

/// Scenario A: sequential happy path. A single agent turn spans an LLM
/// call and a tool call, with an artifact captured and linked by
/// provenance, and the session overview reflects it.
#[test]
fn scenario_a_sequential_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::connect(dir.path()).unwrap();
    let trace = client.trace(None);

    trace.start_span(SpanKind::AgentTurn, "turn 1", "main").unwrap();
    let llm_span = trace.start_span(SpanKind::LlmCall, "respond", "main").unwrap();
    let artifact = trace
        .store_artifact(b"model output", "llm_response", "text/plain", None)
        .unwrap();
    trace
        .add_provenance_to_artifact(ProvenanceRelationKind::WasGeneratedBy, artifact.artifact_hash.clone())
        .unwrap();
    trace.end_span(SpanStatus::Ok).unwrap();
    trace.end_span(SpanStatus::Ok).unwrap();

    let overview = client.get_session_overview(trace.trace_id()).unwrap();
    assert_eq!(overview.total_steps, 1);
    assert_eq!(overview.total_llm_calls, 1);
    assert_eq!(
        client.artifacts().retrieve(&artifact.artifact_hash).unwrap().unwrap(),
        b"model output"
    );
    let _ = llm_span;
}

/// Scenario B: parallel non-conflicting reads share one JOIN parent and
/// all succeed.
#[test]
fn scenario_b_parallel_non_conflicting_reads() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::connect(dir.path()).unwrap();
    let trace = client.trace(None);

    let executor = trace.parallel_executor(EchoHarness, Some(3), None);
    let results = executor.execute_parallel(non_conflicting_read_batch(), None);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));
}

/// Scenario C: parallel conflicting writes on the same file run strictly
/// in submission order rather than concurrently.
#[test]
fn scenario_c_parallel_conflicting_writes_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::connect(dir.path()).unwrap();
    let trace = client.trace(None);

    let executor = trace.parallel_executor(EchoHarness, Some(4), Some(ConflictModel::new()));
    let calls = conflicting_write_batch();
    let ids: Vec<String> = calls.iter().map(|c| c.id.clone()).collect();
    let results = executor.execute_parallel(calls, None);
    let result_ids: Vec<String> = results.iter().map(|r| r.tool_call_id.clone()).collect();
    assert_eq!(result_ids, ids);
    assert!(results.iter().all(|r| r.success));
}

/// Scenario D: a regression detected in REGRESSION_CHECK sends the phase
/// machine back to FIX with a fresh budget, and the resulting attempt
/// state renders a non-empty cross-attempt prompt injection.
#[test]
fn scenario_d_regression_aware_phase_cycle() {
    use excap_sdk::{AttemptState, FailureContext, SwePhase};
    use std::collections::BTreeMap;

    let mut state = SwePhaseState::new();
    state.suspect_files.push("src/parser.rs".to_string());
    state.hypothesis = "off-by-one in token boundary".to_string();
    assert_eq!(state.advance_to_next_phase().unwrap(), "Advanced to Understanding phase. Budget: 20 tool calls.".to_string());

    state.root_cause = "boundary check used <= instead of <".to_string();
    state.advance_to_next_phase().unwrap();

    state.modified_files.push("src/parser.rs".to_string());
    state.advance_to_next_phase().unwrap();
    assert_eq!(state.current_phase, SwePhase::RegressionCheck);

    let mut pass_to_pass = BTreeMap::new();
    pass_to_pass.insert("test_tokenize_empty".to_string(), false);

    state.return_to_fix_phase("broke test_tokenize_empty").unwrap();
    assert_eq!(state.current_phase, SwePhase::Fix);
    assert_eq!(state.remaining_budget(), 15);

    let attempt = AttemptState::from_phase_state(
        &state,
        0,
        FailureContext {
            pass_to_pass_results: pass_to_pass,
            regression_summary: "boundary fix broke empty-input tokenization".to_string(),
            ..Default::default()
        },
    );
    let rendered = attempt.to_prompt_injection();
    assert!(rendered.contains("REGRESSIONS DETECTED"));
    assert!(rendered.contains("test_tokenize_empty"));
}

/// Scenario E: checkpoint, fork into a new trace, and resume both the
/// original and the fork independently.
#[test]
fn scenario_e_checkpoint_fork_and_resume() {
    use excap_sdk::AttemptState;
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let client = Client::connect(dir.path()).unwrap();
    let trace = client.trace(None);

    let mut phase_state = SwePhaseState::new();
    phase_state.suspect_files.push("src/lib.rs".to_string());
    let attempt_state = AttemptState::default();

    let checkpoint = trace
        .create_phase_checkpoint(1, "post-localization", &phase_state, &attempt_state, None)
        .unwrap();

    let (resumed_phase, _) = trace.resume_phase_checkpoint(&checkpoint.checkpoint_id).unwrap();
    assert_eq!(resumed_phase.suspect_files, vec!["src/lib.rs".to_string()]);

    let store: Arc<_> = client.store().clone();
    let (forked_handle, forked_phase, _) =
        excap_sdk::TraceHandle::fork_phase_checkpoint(&store, &checkpoint.checkpoint_id, None, 4).unwrap();

    assert_ne!(forked_handle.trace_id(), trace.trace_id());
    assert_eq!(forked_phase.suspect_files, vec!["src/lib.rs".to_string()]);

    let checkpoints = client.list_checkpoints(trace.trace_id(), None).unwrap();
    assert_eq!(checkpoints.len(), 1);
}

/// Scenario F: crash recovery. A process reconnecting to an existing
/// workspace can still read back everything written before the "crash"
/// (simulated by simply dropping and reopening the client against the
/// same on-disk path), and a recovery pass deterministically closes
/// whatever span was left open by the ungraceful shutdown.
#[test]
fn scenario_f_reconnect_after_simulated_crash() {
    let dir = tempfile::tempdir().unwrap();
    let trace_id;
    {
        let client = Client::connect(dir.path()).unwrap();
        let trace = client.trace(None);
        trace.start_span(SpanKind::AgentTurn, "turn 1", "main").unwrap();
        let _tool_span = trace.start_span(SpanKind::ToolCall, "bash", "main").unwrap();
        trace_id = trace.trace_id().clone();
        // process "crashes" here: neither span's end_span is ever called.
    }

    let client = Client::connect(dir.path()).unwrap();
    let spans = client.store().get_trace_spans(&trace_id).unwrap();
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| s.status == SpanStatus::Started));

    let recovered = client.recover_dangling_spans(&trace_id).unwrap();
    assert_eq!(recovered.len(), 2);

    let spans = client.store().get_trace_spans(&trace_id).unwrap();
    assert!(spans.iter().all(|s| s.status == SpanStatus::Cancelled));
    assert!(spans.iter().all(|s| s.error_message.as_deref() == Some("recovered")));

    let recovered_again = client.recover_dangling_spans(&trace_id).unwrap();
    assert!(recovered_again.is_empty(), "recovery pass is idempotent");
}
