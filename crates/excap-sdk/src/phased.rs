//! Glue between C6 (Parallel Executor) and C7 (Phase State Machine):
//! `PhasedHarness` checks budget/allowlist *before* a call ever reaches the
//! wrapped harness, so a disallowed or over-budget call is refused without
//! dispatching and without opening a span (SPEC_FULL.md §4.7, §7).

use std::sync::Mutex;

use excap_phases::{SwePhaseState, BUDGET_NEUTRAL_TOOLS};
use excap_runtime::ToolHarness;
use excap_types::{ToolCall, ToolResult};

/// Wraps a `ToolHarness` with a shared, mutex-guarded `SwePhaseState`.
/// Safe to hand to a `ParallelExecutor`: every worker thread checks and
/// increments the same phase state before dispatching.
pub struct PhasedHarness<H: ToolHarness> {
    inner: H,
    phase_state: Mutex<SwePhaseState>,
}

impl<H: ToolHarness> PhasedHarness<H> {
    pub fn new(inner: H, phase_state: SwePhaseState) -> Self {
        Self {
            inner,
            phase_state: Mutex::new(phase_state),
        }
    }

    /// Snapshot the current phase state (e.g. to checkpoint it after a
    /// batch completes).
    pub fn phase_state(&self) -> SwePhaseState {
        self.phase_state.lock().expect("phase state mutex poisoned").clone()
    }
}

impl<H: ToolHarness> ToolHarness for PhasedHarness<H> {
    fn execute(&self, call: &ToolCall) -> ToolResult {
        let mut state = self.phase_state.lock().expect("phase state mutex poisoned");

        if !state.is_tool_allowed(&call.name) {
            return ToolResult::failed(
                call.id.clone(),
                "PolicyViolation",
                format!(
                    "tool '{}' is not allowed in phase {:?}",
                    call.name, state.current_phase
                ),
            );
        }

        if state.is_budget_exhausted() && !BUDGET_NEUTRAL_TOOLS.contains(&call.name.as_str()) {
            return ToolResult::failed(
                call.id.clone(),
                "BudgetExhausted",
                format!("phase {:?} has no remaining tool-call budget", state.current_phase),
            );
        }

        state.increment_tool_call(&call.name);
        drop(state);

        self.inner.execute(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct CountingHarness(std::sync::atomic::AtomicUsize);

    impl ToolHarness for CountingHarness {
        fn execute(&self, call: &ToolCall) -> ToolResult {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ToolResult::ok(call.id.clone(), "ok")
        }
    }

    #[test]
    fn disallowed_tool_is_refused_without_reaching_inner_harness() {
        let harness = PhasedHarness::new(
            CountingHarness(std::sync::atomic::AtomicUsize::new(0)),
            SwePhaseState::new(),
        );
        let call = ToolCall::new("1", "bash", json!({}));
        let result = harness.execute(&call);
        assert!(!result.success);
        assert_eq!(result.error.unwrap().class, "PolicyViolation");
        assert_eq!(harness.inner.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_budget_refuses_non_neutral_tool() {
        let mut state = SwePhaseState::new();
        for _ in 0..15 {
            state.increment_tool_call("grep");
        }
        let harness = PhasedHarness::new(CountingHarness(std::sync::atomic::AtomicUsize::new(0)), state);
        let result = harness.execute(&ToolCall::new("1", "grep", json!({})));
        assert!(!result.success);
        assert_eq!(result.error.unwrap().class, "BudgetExhausted");
    }

    #[test]
    fn budget_neutral_tool_runs_even_when_exhausted() {
        let mut state = SwePhaseState::new();
        for _ in 0..15 {
            state.increment_tool_call("grep");
        }
        let harness = PhasedHarness::new(CountingHarness(std::sync::atomic::AtomicUsize::new(0)), state);
        let result = harness.execute(&ToolCall::new("1", "think", json!({})));
        assert!(result.success);
    }

    #[test]
    fn allowed_call_increments_shared_phase_state() {
        let harness = PhasedHarness::new(
            CountingHarness(std::sync::atomic::AtomicUsize::new(0)),
            SwePhaseState::new(),
        );
        harness.execute(&ToolCall::new("1", "grep", json!({})));
        assert_eq!(harness.phase_state().remaining_budget(), 14);
    }
}
