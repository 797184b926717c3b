//! C9 — Session Overview: a pure derivation over the trace store. Nothing
//! here writes; `get_session_overview` and `SummaryEventLog` only fold
//! already-reconstructed spans into a smaller read model.

use chrono::{DateTime, Utc};
use excap_types::{Span, SpanId, SpanKind, SpanStatus, TraceId};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::trace_store::TraceStore;

/// Default tool names treated as noteworthy checkpoints in a run's
/// narrative, per SPEC_FULL.md 4.9.1. Callers may override this set (e.g.
/// from `config.toml`'s `milestone_tools`).
pub const DEFAULT_MILESTONE_TOOLS: &[&str] = &["git_create_pr", "git_pr_checks", "bash"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Empty,
    InProgress,
    CompletedWithErrors,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub status: SpanStatus,
    pub span_id: SpanId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
    pub span_id: SpanId,
}

/// High-level summary of a session, cheap enough to render as a dashboard
/// row without walking the full event log again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOverview {
    pub trace_id: TraceId,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub total_steps: usize,
    pub total_llm_calls: usize,
    pub total_tool_calls: usize,
    pub total_tokens: u64,
    pub checkpoints_available: usize,
    pub current_step: String,
    pub key_milestones: Vec<Milestone>,
    pub errors: Vec<ErrorDetail>,
}

impl TraceStore {
    /// Derive a `SessionOverview` using the default milestone tool set.
    pub fn get_session_overview(&self, trace_id: &TraceId) -> Result<SessionOverview> {
        self.get_session_overview_with_milestones(trace_id, DEFAULT_MILESTONE_TOOLS)
    }

    /// Derive a `SessionOverview`, treating `milestone_tools` as the set of
    /// tool names worth surfacing as key milestones.
    pub fn get_session_overview_with_milestones(
        &self,
        trace_id: &TraceId,
        milestone_tools: &[&str],
    ) -> Result<SessionOverview> {
        let spans = self.get_trace_spans(trace_id)?;
        let checkpoints = self.list_checkpoints(trace_id, None)?;

        let total_llm_calls = spans.iter().filter(|s| s.kind == SpanKind::LlmCall).count();
        let total_tool_calls = spans.iter().filter(|s| s.kind == SpanKind::ToolCall).count();
        let total_steps = spans.iter().filter(|s| s.kind == SpanKind::AgentTurn).count();
        let error_spans: Vec<&Span> = spans
            .iter()
            .filter(|s| s.status == SpanStatus::Error)
            .collect();

        let mut total_tokens: u64 = 0;
        for span in spans.iter().filter(|s| s.kind == SpanKind::LlmCall) {
            let Some(hash) = &span.output_artifact_hash else {
                continue;
            };
            let Ok(Some(bytes)) = self.artifacts().retrieve(hash) else {
                continue;
            };
            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
                continue;
            };
            if let Some(tokens) = value
                .get("usage")
                .and_then(|u| u.get("total_tokens"))
                .and_then(|t| t.as_u64())
            {
                total_tokens += tokens;
            }
        }

        let status = if spans.is_empty() {
            SessionStatus::Empty
        } else if spans.iter().any(|s| s.end_ts.is_none()) {
            SessionStatus::InProgress
        } else if !error_spans.is_empty() {
            SessionStatus::CompletedWithErrors
        } else {
            SessionStatus::Completed
        };

        let start_ts = spans.first().map(|s| s.start_ts);
        let end_ts = spans.iter().rev().find_map(|s| s.end_ts);

        let current_step = match spans.last() {
            None => "idle".to_string(),
            Some(span) if span.end_ts.is_none() => {
                format!("{}: {}", span_kind_str(span.kind), span.name)
            }
            Some(span) => format!("completed: {}", span.name),
        };

        let key_milestones = spans
            .iter()
            .filter(|s| s.kind == SpanKind::ToolCall)
            .filter_map(|s| {
                let tool_name = s
                    .tool_provenance
                    .as_ref()
                    .map(|p| p.tool_name.as_str())
                    .unwrap_or(s.name.as_str());
                milestone_tools
                    .contains(&tool_name)
                    .then(|| Milestone {
                        timestamp: s.start_ts,
                        tool: tool_name.to_string(),
                        status: s.status,
                        span_id: s.span_id.clone(),
                    })
            })
            .collect();

        let errors = error_spans
            .into_iter()
            .map(|s| ErrorDetail {
                timestamp: s.start_ts,
                name: s.name.clone(),
                error_class: s.error_class.clone(),
                error_message: s.error_message.clone(),
                span_id: s.span_id.clone(),
            })
            .collect();

        Ok(SessionOverview {
            trace_id: trace_id.clone(),
            start_ts,
            end_ts,
            status,
            total_steps,
            total_llm_calls,
            total_tool_calls,
            total_tokens,
            checkpoints_available: checkpoints.len(),
            current_step,
            key_milestones,
            errors,
        })
    }
}

/// Renders a `SpanKind` the way `current_step` wants it: lowercase,
/// matching the wire name rather than the Rust variant spelling.
fn span_kind_str(kind: SpanKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Thin read-only wrapper over a `TraceStore`, exposing narrower summary
/// views without holding any state of its own beyond the reference.
pub struct SummaryEventLog<'a> {
    store: &'a TraceStore,
}

impl<'a> SummaryEventLog<'a> {
    pub fn new(store: &'a TraceStore) -> Self {
        Self { store }
    }

    pub fn get_summary(&self, trace_id: &TraceId) -> Result<SessionOverview> {
        self.store.get_session_overview(trace_id)
    }

    /// TOOL_CALL-kind spans only, in start order.
    pub fn get_tool_calls(&self, trace_id: &TraceId) -> Result<Vec<Span>> {
        Ok(self
            .store
            .get_trace_spans(trace_id)?
            .into_iter()
            .filter(|s| s.kind == SpanKind::ToolCall)
            .collect())
    }

    /// Status-ERROR spans only, in start order.
    pub fn get_errors(&self, trace_id: &TraceId) -> Result<Vec<Span>> {
        Ok(self
            .store
            .get_trace_spans(trace_id)?
            .into_iter()
            .filter(|s| s.status == SpanStatus::Error)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use excap_types::TraceId;

    use super::*;
    use crate::artifact_store::ArtifactStore;

    fn store() -> (TraceStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("artifacts")).unwrap());
        let store = TraceStore::open_in_memory(artifacts).unwrap();
        (store, dir)
    }

    #[test]
    fn empty_trace_has_empty_status_and_idle_step() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.status, SessionStatus::Empty);
        assert_eq!(overview.current_step, "idle");
        assert_eq!(overview.total_tokens, 0);
    }

    #[test]
    fn open_span_yields_in_progress_status_and_kind_prefixed_step() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        store
            .start_span(&trace_id, SpanKind::AgentTurn, "plan fix", "main", None, None, None, None)
            .unwrap();

        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.status, SessionStatus::InProgress);
        assert_eq!(overview.current_step, "agent_turn: plan fix");
    }

    #[test]
    fn closed_span_yields_completed_prefixed_step() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let span = store
            .start_span(&trace_id, SpanKind::ToolCall, "Read", "main", None, None, None, None)
            .unwrap();
        store
            .end_span(&trace_id, &span, SpanStatus::Ok, None, None, None, None)
            .unwrap();

        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.status, SessionStatus::Completed);
        assert_eq!(overview.current_step, "completed: Read");
    }

    #[test]
    fn error_span_yields_completed_with_errors_and_populates_error_details() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let span = store
            .start_span(&trace_id, SpanKind::ToolCall, "bash", "main", None, None, None, None)
            .unwrap();
        store
            .end_span(
                &trace_id,
                &span,
                SpanStatus::Error,
                None,
                Some("ExitError".into()),
                Some("exit code 1".into()),
                None,
            )
            .unwrap();

        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.status, SessionStatus::CompletedWithErrors);
        assert_eq!(overview.errors.len(), 1);
        assert_eq!(overview.errors[0].error_message.as_deref(), Some("exit code 1"));
    }

    #[test]
    fn llm_call_output_usage_is_summed_into_total_tokens() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let output = store
            .artifacts()
            .store(br#"{"usage":{"total_tokens":42}}"#, "llm_output", "application/json", None)
            .unwrap();
        let span = store
            .start_span(&trace_id, SpanKind::LlmCall, "chat", "main", None, None, None, None)
            .unwrap();
        store
            .end_span(
                &trace_id,
                &span,
                SpanStatus::Ok,
                Some(output.artifact_hash),
                None,
                None,
                None,
            )
            .unwrap();

        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.total_tokens, 42);
        assert_eq!(overview.total_llm_calls, 1);
    }

    #[test]
    fn unparseable_output_artifact_is_silently_skipped() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let output = store
            .artifacts()
            .store(b"not json", "llm_output", "text/plain", None)
            .unwrap();
        let span = store
            .start_span(&trace_id, SpanKind::LlmCall, "chat", "main", None, None, None, None)
            .unwrap();
        store
            .end_span(&trace_id, &span, SpanStatus::Ok, Some(output.artifact_hash), None, None, None)
            .unwrap();

        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.total_tokens, 0);
    }

    #[test]
    fn default_milestone_tools_are_captured_from_tool_provenance() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let provenance = excap_types::ToolProvenance {
            tool_name: "bash".into(),
            schema_hash: "h".into(),
            impl_version: "1".into(),
            external_fingerprint: Default::default(),
        };
        let span = store
            .start_span(
                &trace_id,
                SpanKind::ToolCall,
                "bash",
                "main",
                None,
                None,
                Some(provenance),
                None,
            )
            .unwrap();
        store
            .end_span(&trace_id, &span, SpanStatus::Ok, None, None, None, None)
            .unwrap();

        let overview = store.get_session_overview(&trace_id).unwrap();
        assert_eq!(overview.key_milestones.len(), 1);
        assert_eq!(overview.key_milestones[0].tool, "bash");
    }

    #[test]
    fn summary_event_log_filters_tool_calls_and_errors() {
        let (store, _dir) = store();
        let trace_id = TraceId::new();
        let turn = store
            .start_span(&trace_id, SpanKind::AgentTurn, "t1", "main", None, None, None, None)
            .unwrap();
        let tool = store
            .start_span(
                &trace_id,
                SpanKind::ToolCall,
                "Read",
                "main",
                Some(turn.clone()),
                None,
                None,
                None,
            )
            .unwrap();
        store
            .end_span(&trace_id, &tool, SpanStatus::Error, None, Some("IoError".into()), None, None)
            .unwrap();
        store.end_span(&trace_id, &turn, SpanStatus::Ok, None, None, None, None).unwrap();

        let summary = SummaryEventLog::new(&store);
        let tool_calls = summary.get_tool_calls(&trace_id).unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].span_id, tool);

        let errors = summary.get_errors(&trace_id).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span_id, tool);
    }
}
