//! C8 — Attempt State & Cross-Attempt Learning: what a failed attempt
//! learned, serialized into the checkpoint at attempt-end and rendered as a
//! prompt injection for the next attempt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::swe_phase::SwePhaseState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptState {
    pub attempt_number: u32,

    pub localization_findings: Vec<String>,
    pub hypothesis: String,
    pub suspect_files: Vec<String>,

    pub what_failed: String,
    pub failing_test_output: String,

    pub next_approach: String,

    pub modified_files: Vec<String>,
    pub git_diff_summary: String,

    pub fail_to_pass_results: BTreeMap<String, bool>,
    pub pass_to_pass_results: BTreeMap<String, bool>,

    pub broke_pass_to_pass: Vec<String>,
    pub regression_summary: String,
    pub changes_that_caused_regression: String,
}

/// Parameters describing why an attempt failed, threaded through
/// [`AttemptState::from_phase_state`]. The regression-aware fields default
/// to empty when a phase never produced them.
#[derive(Debug, Clone, Default)]
pub struct FailureContext {
    pub what_failed: String,
    pub failing_test_output: String,
    pub next_approach: String,
    pub modified_files: Vec<String>,
    pub git_diff_summary: String,
    pub fail_to_pass_results: BTreeMap<String, bool>,
    pub pass_to_pass_results: BTreeMap<String, bool>,
    pub regression_summary: String,
    pub changes_that_caused_regression: String,
}

impl AttemptState {
    /// Build the next attempt's state from the phase state a failed attempt
    /// ended in, plus diagnostics about why it failed.
    pub fn from_phase_state(phase_state: &SwePhaseState, attempt_number: u32, context: FailureContext) -> Self {
        let localization_findings = if phase_state.suspect_files.is_empty() {
            Vec::new()
        } else {
            vec![
                format!("Suspect files: {}", phase_state.suspect_files.join(", ")),
                format!("Hypothesis: {}", phase_state.hypothesis),
            ]
        };

        let broke_pass_to_pass = context
            .pass_to_pass_results
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(test, _)| test.clone())
            .collect();

        Self {
            attempt_number: attempt_number + 1,
            localization_findings,
            hypothesis: phase_state.hypothesis.clone(),
            suspect_files: phase_state.suspect_files.clone(),
            what_failed: context.what_failed,
            failing_test_output: context.failing_test_output,
            next_approach: context.next_approach,
            modified_files: context.modified_files,
            git_diff_summary: context.git_diff_summary,
            fail_to_pass_results: context.fail_to_pass_results,
            pass_to_pass_results: context.pass_to_pass_results,
            broke_pass_to_pass,
            regression_summary: context.regression_summary,
            changes_that_caused_regression: context.changes_that_caused_regression,
        }
    }

    /// Render as a prompt injection: only sections whose backing data is
    /// non-empty are included.
    pub fn to_prompt_injection(&self) -> String {
        let mut lines = vec![
            format!("## Previous Attempt Summary (Attempt {})", self.attempt_number.saturating_sub(1)),
            String::new(),
        ];

        if !self.localization_findings.is_empty() {
            lines.push("### Localization Findings".to_string());
            for finding in &self.localization_findings {
                lines.push(format!("- {}", finding));
            }
            lines.push(String::new());
        }

        if !self.hypothesis.is_empty() {
            lines.push(format!("### Hypothesis: {}", self.hypothesis));
            lines.push(String::new());
        }

        if !self.suspect_files.is_empty() {
            lines.push(format!("### Suspect Files: {}", self.suspect_files.join(", ")));
            lines.push(String::new());
        }

        if !self.what_failed.is_empty() {
            lines.push(format!("### What Failed: {}", self.what_failed));
            lines.push(String::new());
        }

        if !self.fail_to_pass_results.is_empty() || !self.pass_to_pass_results.is_empty() {
            lines.push("### Test Results from Previous Attempt".to_string());
            if !self.fail_to_pass_results.is_empty() {
                let passed = self.fail_to_pass_results.values().filter(|v| **v).count();
                let total = self.fail_to_pass_results.len();
                let status = if passed == total { "PASSED" } else { "FAILED" };
                lines.push(format!("- fail_to_pass: {}/{} {}", passed, total, status));
            }
            if !self.pass_to_pass_results.is_empty() {
                let passed = self.pass_to_pass_results.values().filter(|v| **v).count();
                let total = self.pass_to_pass_results.len();
                let status = if passed == total { "PASSED" } else { "REGRESSION" };
                lines.push(format!("- pass_to_pass: {}/{} {}", passed, total, status));
            }
            lines.push(String::new());
        }

        if !self.broke_pass_to_pass.is_empty() {
            lines.push("### REGRESSIONS DETECTED - Tests That Broke".to_string());
            for test in self.broke_pass_to_pass.iter().take(10) {
                lines.push(format!("- {}", test));
            }
            if self.broke_pass_to_pass.len() > 10 {
                lines.push(format!("- ... and {} more", self.broke_pass_to_pass.len() - 10));
            }
            lines.push(String::new());
        }

        if !self.regression_summary.is_empty() {
            lines.push(format!("### Regression Summary: {}", self.regression_summary));
            lines.push(String::new());
        }

        if !self.changes_that_caused_regression.is_empty() {
            lines.push("### AVOID THESE CHANGES (caused regressions)".to_string());
            lines.push(self.changes_that_caused_regression.clone());
            lines.push(String::new());
        }

        if !self.next_approach.is_empty() {
            lines.push(format!("### Suggested Next Approach: {}", self.next_approach));
            lines.push(String::new());
        }

        if !self.modified_files.is_empty() {
            lines.push(format!("### Currently Modified Files: {}", self.modified_files.join(", ")));
            lines.push("(These changes persist from previous attempt)".to_string());
            lines.push(String::new());
        }

        lines.push("DO NOT repeat the same approach that failed. Try something different.".to_string());
        if !self.broke_pass_to_pass.is_empty() {
            lines.push("CRITICAL: Your fix must NOT break any pass_to_pass tests.".to_string());
        }

        lines.join("\n")
    }
}
