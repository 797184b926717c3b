//! C7 — Phase State Machine: a fixed phase order for bug-fix workflows with
//! per-phase tool-call budgets and allowlists, enforced before dispatch
//! rather than advised in a prompt.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwePhase {
    Localization,
    Understanding,
    Fix,
    RegressionCheck,
    TargetFixVerification,
    Complete,
}

impl SwePhase {
    const ORDER: [SwePhase; 6] = [
        SwePhase::Localization,
        SwePhase::Understanding,
        SwePhase::Fix,
        SwePhase::RegressionCheck,
        SwePhase::TargetFixVerification,
        SwePhase::Complete,
    ];

    fn next(self) -> Option<SwePhase> {
        let idx = Self::ORDER.iter().position(|p| *p == self)?;
        Self::ORDER.get(idx + 1).copied()
    }
}

struct PhaseBudget {
    max_tool_calls: u32,
    required_outputs: &'static [&'static str],
    allowed_tools: &'static [&'static str],
}

static PHASE_BUDGETS: Lazy<HashMap<SwePhase, PhaseBudget>> = Lazy::new(|| {
    HashMap::from([
        (
            SwePhase::Localization,
            PhaseBudget {
                max_tool_calls: 15,
                required_outputs: &["suspect_files", "hypothesis"],
                allowed_tools: &["grep", "glob", "web_search", "Read", "lsp_tool"],
            },
        ),
        (
            SwePhase::Understanding,
            PhaseBudget {
                max_tool_calls: 20,
                required_outputs: &["root_cause"],
                allowed_tools: &["Read", "lsp_tool", "web_get_contents", "grep", "glob"],
            },
        ),
        (
            SwePhase::Fix,
            PhaseBudget {
                max_tool_calls: 15,
                required_outputs: &["modified_files"],
                allowed_tools: &["Edit", "Read"],
            },
        ),
        (
            SwePhase::RegressionCheck,
            PhaseBudget {
                max_tool_calls: 10,
                required_outputs: &["pass_to_pass_status"],
                allowed_tools: &["bash", "Read", "analyze_test_failure"],
            },
        ),
        (
            SwePhase::TargetFixVerification,
            PhaseBudget {
                max_tool_calls: 5,
                required_outputs: &["fail_to_pass_status"],
                allowed_tools: &["bash"],
            },
        ),
        (
            SwePhase::Complete,
            PhaseBudget {
                max_tool_calls: 0,
                required_outputs: &[],
                allowed_tools: &["complete"],
            },
        ),
    ])
});

/// Tools that do not count against a phase's budget. Distinct from
/// `PHASE_NEUTRAL_TOOLS`: budget-neutrality and allowlist-bypass are
/// separate concerns.
pub const BUDGET_NEUTRAL_TOOLS: &[&str] =
    &["think", "advance_phase", "get_phase_status", "return_to_fix_phase"];

/// Tools callable from any phase, bypassing the allowlist entirely.
pub const PHASE_NEUTRAL_TOOLS: &[&str] = &["think", "advance_phase", "get_phase_status", "complete"];

/// Tracks the current phase, per-phase tool call counters, and the outputs
/// collected so far within one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwePhaseState {
    pub current_phase: SwePhase,
    pub phase_tool_calls: HashMap<SwePhase, u32>,

    pub suspect_files: Vec<String>,
    pub hypothesis: String,
    pub root_cause: String,
    pub modified_files: Vec<String>,

    pub pass_to_pass_status: String,
    pub fail_to_pass_status: String,
    pub broke_pass_to_pass: Vec<String>,
}

impl Default for SwePhaseState {
    fn default() -> Self {
        Self {
            current_phase: SwePhase::Localization,
            phase_tool_calls: SwePhase::ORDER.iter().map(|p| (*p, 0)).collect(),
            suspect_files: Vec::new(),
            hypothesis: String::new(),
            root_cause: String::new(),
            modified_files: Vec::new(),
            pass_to_pass_status: String::new(),
            fail_to_pass_status: String::new(),
            broke_pass_to_pass: Vec::new(),
        }
    }
}

impl SwePhaseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `current_phase`, unless `tool_name` is
    /// budget-neutral.
    pub fn increment_tool_call(&mut self, tool_name: &str) {
        if !BUDGET_NEUTRAL_TOOLS.contains(&tool_name) {
            *self.phase_tool_calls.entry(self.current_phase).or_insert(0) += 1;
        }
    }

    pub fn remaining_budget(&self) -> u32 {
        let budget = PHASE_BUDGETS[&self.current_phase].max_tool_calls;
        let used = self.phase_tool_calls.get(&self.current_phase).copied().unwrap_or(0);
        budget.saturating_sub(used)
    }

    pub fn is_budget_exhausted(&self) -> bool {
        self.remaining_budget() == 0
    }

    /// True if phase-neutral, or listed in the current phase's allowlist.
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        if PHASE_NEUTRAL_TOOLS.contains(&tool_name) {
            return true;
        }
        PHASE_BUDGETS[&self.current_phase].allowed_tools.contains(&tool_name)
    }

    pub fn required_outputs(&self) -> &'static [&'static str] {
        PHASE_BUDGETS[&self.current_phase].required_outputs
    }

    /// `(is_valid, missing)`. `missing` is empty iff every required output
    /// for `current_phase` is non-empty.
    pub fn validate_phase_outputs(&self) -> (bool, Vec<String>) {
        let missing: Vec<String> = self
            .required_outputs()
            .iter()
            .filter(|output| !self.has_output(output))
            .map(|output| output.to_string())
            .collect();
        (missing.is_empty(), missing)
    }

    fn has_output(&self, output: &str) -> bool {
        match output {
            "suspect_files" => !self.suspect_files.is_empty(),
            "hypothesis" => !self.hypothesis.is_empty(),
            "root_cause" => !self.root_cause.is_empty(),
            "modified_files" => !self.modified_files.is_empty(),
            "pass_to_pass_status" => !self.pass_to_pass_status.is_empty(),
            "fail_to_pass_status" => !self.fail_to_pass_status.is_empty(),
            _ => true,
        }
    }

    /// Advance to the next phase if required outputs are present. Returns a
    /// human-readable confirmation message on success.
    pub fn advance_to_next_phase(&mut self) -> Result<String> {
        let (is_valid, missing) = self.validate_phase_outputs();
        if !is_valid {
            return Err(Error::MissingOutputs(missing));
        }

        let Some(next_phase) = self.current_phase.next() else {
            return Err(Error::InvalidTransition("already at final phase (complete)".to_string()));
        };

        self.current_phase = next_phase;
        let budget = PHASE_BUDGETS[&next_phase].max_tool_calls;
        Ok(format!(
            "Advanced to {:?} phase. Budget: {} tool calls.",
            next_phase, budget
        ))
    }

    /// Return to FIX from REGRESSION_CHECK when regressions are detected,
    /// resetting FIX's counter to its full budget.
    pub fn return_to_fix_phase(&mut self, reason: &str) -> Result<String> {
        if self.current_phase != SwePhase::RegressionCheck {
            return Err(Error::InvalidTransition(
                "can only return to FIX from REGRESSION_CHECK phase".to_string(),
            ));
        }

        self.current_phase = SwePhase::Fix;
        self.phase_tool_calls.insert(SwePhase::Fix, 0);
        let budget = PHASE_BUDGETS[&SwePhase::Fix].max_tool_calls;
        Ok(format!(
            "Returned to FIX phase to address regression: {}. Budget: {} tool calls.",
            reason, budget
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_starts_in_localization_with_full_budget() {
        let state = SwePhaseState::new();
        assert_eq!(state.current_phase, SwePhase::Localization);
        assert_eq!(state.remaining_budget(), 15);
        assert!(!state.is_budget_exhausted());
    }

    #[test]
    fn budget_neutral_tools_do_not_consume_budget() {
        let mut state = SwePhaseState::new();
        state.increment_tool_call("think");
        state.increment_tool_call("advance_phase");
        assert_eq!(state.remaining_budget(), 15);
    }

    #[test]
    fn non_neutral_tool_consumes_budget() {
        let mut state = SwePhaseState::new();
        state.increment_tool_call("grep");
        assert_eq!(state.remaining_budget(), 14);
    }

    #[test]
    fn budget_exhausts_at_zero_remaining() {
        let mut state = SwePhaseState::new();
        for _ in 0..15 {
            state.increment_tool_call("grep");
        }
        assert!(state.is_budget_exhausted());
    }

    #[test]
    fn phase_neutral_tool_bypasses_allowlist_in_any_phase() {
        let state = SwePhaseState::new();
        assert!(state.is_tool_allowed("complete"));
        assert!(!SwePhaseState {
            current_phase: SwePhase::Fix,
            ..SwePhaseState::new()
        }
        .is_tool_allowed("grep"));
    }

    #[test]
    fn return_to_fix_phase_is_not_phase_neutral_and_checks_current_phase() {
        let mut localization = SwePhaseState::new();
        let err = localization.return_to_fix_phase("testing").unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
        assert!(!localization.is_tool_allowed("return_to_fix_phase"));
    }

    #[test]
    fn advance_refuses_with_missing_outputs_when_required_fields_empty() {
        let mut state = SwePhaseState::new();
        let err = state.advance_to_next_phase().unwrap_err();
        match err {
            Error::MissingOutputs(missing) => {
                assert_eq!(missing, vec!["suspect_files", "hypothesis"]);
            }
            other => panic!("expected MissingOutputs, got {:?}", other),
        }
    }

    #[test]
    fn advance_succeeds_once_outputs_are_present() {
        let mut state = SwePhaseState::new();
        state.suspect_files.push("src/lib.rs".to_string());
        state.hypothesis = "off-by-one in the parser".to_string();
        state.advance_to_next_phase().unwrap();
        assert_eq!(state.current_phase, SwePhase::Understanding);
        assert_eq!(state.remaining_budget(), 20);
    }

    #[test]
    fn regression_check_to_fix_back_edge_resets_fix_budget() {
        let mut state = SwePhaseState {
            current_phase: SwePhase::RegressionCheck,
            ..SwePhaseState::new()
        };
        state.phase_tool_calls.insert(SwePhase::Fix, 10);

        state.return_to_fix_phase("broke test_foo").unwrap();
        assert_eq!(state.current_phase, SwePhase::Fix);
        assert_eq!(state.remaining_budget(), 15);
    }

    #[test]
    fn complete_is_terminal() {
        let mut state = SwePhaseState {
            current_phase: SwePhase::Complete,
            ..SwePhaseState::new()
        };
        let err = state.advance_to_next_phase().unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }
}
