//! `Client`/`TraceHandle`: the top-level facade composing `excap-store`,
//! `excap-runtime`, and `excap-phases` for an embedder.

use std::path::PathBuf;
use std::sync::Arc;

use excap_phases::{AttemptState, SwePhaseState};
use excap_runtime::checkpoint_orchestrator;
use excap_runtime::{ConflictModel, ParallelExecutor, TraceContext};
use excap_store::{
    create_trace_store, ArtifactStore, SessionOverview, SummaryEventLog, TraceStore,
};
use excap_types::{
    Artifact, ArtifactHash, Checkpoint, CheckpointId, CheckpointStatus, ProvenanceObject,
    ProvenanceRelationKind, SpanId, SpanKind, SpanStatus, ToolCall, ToolResult, TraceId,
};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::phased::PhasedHarness;
use crate::workspace::{resolve_workspace_path, Config};

/// Entry point: a connected workspace (event log + artifact tree + ambient
/// config) an embedder drives runs through.
pub struct Client {
    base_path: PathBuf,
    store: Arc<TraceStore>,
    artifacts: Arc<ArtifactStore>,
    config: Config,
}

impl Client {
    /// Connect to the workspace rooted at `base_path`, creating it (and its
    /// `traces.db`/`artifacts/` tree) if absent.
    pub fn connect(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| Error::Config(e.into()))?;
        let (store, artifacts) = create_trace_store(&base_path)?;
        let config = Config::load(&base_path).map_err(Error::Config)?;
        Ok(Self {
            base_path,
            store: Arc::new(store),
            artifacts,
            config,
        })
    }

    /// Connect using SPEC_FULL.md §6.1's resolution order: explicit path,
    /// `EXCAP_PATH`, `dirs::data_dir()/excap`, `$HOME/.excap`.
    pub fn connect_default() -> Result<Self> {
        let path = resolve_workspace_path(None).map_err(Error::Config)?;
        Self::connect(path)
    }

    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    pub fn store(&self) -> &Arc<TraceStore> {
        &self.store
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a handle on `trace_id`, minting a fresh one if absent.
    pub fn trace(&self, trace_id: Option<TraceId>) -> TraceHandle {
        TraceHandle {
            store: self.store.clone(),
            context: TraceContext::new(self.store.clone(), trace_id),
            max_workers: self.config.max_workers,
            conflict_model: self.conflict_model_from_config(),
        }
    }

    /// Build a `ConflictModel` seeded with `config.toml`'s
    /// `conflict_overrides` (tool name -> `"parallel_safe"` |
    /// `"exclusive"`), per SPEC_FULL.md §4.5's "tools may register
    /// alternative classifications at boot time".
    fn conflict_model_from_config(&self) -> ConflictModel {
        let model = ConflictModel::new();
        for (tool_name, class) in &self.config.conflict_overrides {
            let class = match class.as_str() {
                "parallel_safe" => excap_runtime::ConflictClass::ParallelSafe,
                "exclusive" => excap_runtime::ConflictClass::Exclusive,
                other => {
                    eprintln!(
                        "excap-sdk: ignoring conflict_overrides entry for '{}': unknown class '{}' \
                         (expected 'parallel_safe' or 'exclusive')",
                        tool_name, other
                    );
                    continue;
                }
            };
            model.register_tool(tool_name.clone(), class);
        }
        model
    }

    pub fn get_session_overview(&self, trace_id: &TraceId) -> Result<SessionOverview> {
        let milestones: Vec<&str> = match &self.config.milestone_tools {
            Some(tools) => tools.iter().map(String::as_str).collect(),
            None => excap_store::overview::DEFAULT_MILESTONE_TOOLS.to_vec(),
        };
        self.store
            .get_session_overview_with_milestones(trace_id, &milestones)
            .map_err(Into::into)
    }

    pub fn summary(&self) -> SummaryEventLog<'_> {
        SummaryEventLog::new(&self.store)
    }

    /// Closes any span left open by an ungraceful shutdown (SPEC_FULL.md §8
    /// Scenario F). Safe to call on a healthy trace: already-closed spans
    /// are left untouched.
    pub fn recover_dangling_spans(&self, trace_id: &TraceId) -> Result<Vec<SpanId>> {
        self.store.recover_dangling_spans(trace_id).map_err(Into::into)
    }

    pub fn list_checkpoints(
        &self,
        trace_id: &TraceId,
        status: Option<CheckpointStatus>,
    ) -> Result<Vec<Checkpoint>> {
        self.store.list_checkpoints(trace_id, status).map_err(Into::into)
    }

    pub fn get_checkpoint(&self, checkpoint_id: &CheckpointId) -> Result<Checkpoint> {
        self.store
            .get_checkpoint(checkpoint_id)?
            .ok_or_else(|| Error::NotFound(format!("checkpoint {}", checkpoint_id)))
    }

    /// Fork a new trace from an existing checkpoint's raw state bytes,
    /// without assuming any particular phase/attempt-state shape. See
    /// [`TraceHandle::fork_phase_checkpoint`] for the typed equivalent.
    pub fn fork_from_checkpoint(
        &self,
        checkpoint_id: &CheckpointId,
        new_trace_id: Option<TraceId>,
    ) -> Result<(TraceId, Checkpoint)> {
        checkpoint_orchestrator::fork_from_checkpoint(&self.store, checkpoint_id, new_trace_id)
            .map_err(Into::into)
    }
}

/// A handle on one trace: a `TraceContext` plus the conveniences an
/// embedder needs to drive a run — parallel tool dispatch, phase-aware
/// dispatch, and checkpoint pause/resume/fork for the concrete
/// `(SwePhaseState, AttemptState)` pair.
pub struct TraceHandle {
    store: Arc<TraceStore>,
    context: TraceContext,
    max_workers: usize,
    conflict_model: ConflictModel,
}

impl TraceHandle {
    pub fn trace_id(&self) -> &TraceId {
        self.context.trace_id()
    }

    pub fn current_span_id(&self) -> Option<SpanId> {
        self.context.current_span_id()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn start_span(
        &self,
        kind: SpanKind,
        name: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Result<SpanId> {
        self.context
            .start_span(kind, name, actor_id, None, None, None)
            .map_err(Into::into)
    }

    pub fn end_span(&self, status: SpanStatus) -> Result<()> {
        self.context.end_span(status, None, None, None).map_err(Into::into)
    }

    pub fn end_span_with_error(&self, status: SpanStatus, class: &str, message: &str) -> Result<()> {
        self.context
            .end_span(status, None, Some(class.to_string()), Some(message.to_string()))
            .map_err(Into::into)
    }

    pub fn store_artifact(
        &self,
        bytes: &[u8],
        artifact_type: impl Into<String>,
        content_type: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Artifact> {
        self.context
            .store_artifact(bytes, artifact_type, content_type, metadata)
            .map_err(Into::into)
    }

    pub fn add_provenance_to_span(
        &self,
        relation: ProvenanceRelationKind,
        object_span_id: SpanId,
    ) -> Result<()> {
        self.context
            .add_provenance(relation, ProvenanceObject::Span(object_span_id))
            .map_err(Into::into)
    }

    pub fn add_provenance_to_artifact(
        &self,
        relation: ProvenanceRelationKind,
        object_artifact_hash: ArtifactHash,
    ) -> Result<()> {
        self.context
            .add_provenance(relation, ProvenanceObject::Artifact(object_artifact_hash))
            .map_err(Into::into)
    }

    /// Build a `ParallelExecutor` over `harness` for this trace, seeded
    /// with the workspace's configured `max_workers` (overridable).
    pub fn parallel_executor<H: excap_runtime::ToolHarness + 'static>(
        &self,
        harness: H,
        max_workers: Option<usize>,
        conflict_model: Option<ConflictModel>,
    ) -> ParallelExecutor<H> {
        ParallelExecutor::new(
            harness,
            Some((self.store.clone(), self.context.trace_id().clone())),
            max_workers.unwrap_or(self.max_workers),
            conflict_model.unwrap_or_else(|| self.conflict_model.clone()),
        )
    }

    /// Wrap `harness` so every dispatch is checked against `phase_state`'s
    /// budget/allowlist *before* the call reaches the harness or opens a
    /// span, per SPEC_FULL.md §4.7/§7's "no span for a blocked call"
    /// invariant.
    pub fn phased_executor<H: excap_runtime::ToolHarness + 'static>(
        &self,
        harness: H,
        phase_state: SwePhaseState,
        max_workers: Option<usize>,
        conflict_model: Option<ConflictModel>,
    ) -> ParallelExecutor<PhasedHarness<H>> {
        self.parallel_executor(PhasedHarness::new(harness, phase_state), max_workers, conflict_model)
    }

    /// Snapshot `(phase_state, attempt_state)` into a checkpoint (C10).
    pub fn create_phase_checkpoint(
        &self,
        step: u64,
        description: impl Into<String>,
        phase_state: &SwePhaseState,
        attempt_state: &AttemptState,
        metadata: Option<Value>,
    ) -> Result<Checkpoint> {
        checkpoint_orchestrator::pause(
            &self.store,
            self.context.trace_id(),
            step,
            description,
            phase_state,
            attempt_state,
            metadata,
        )
        .map_err(Into::into)
    }

    /// Resume `(phase_state, attempt_state)` from a checkpoint in this
    /// same trace.
    pub fn resume_phase_checkpoint(
        &self,
        checkpoint_id: &CheckpointId,
    ) -> Result<(SwePhaseState, AttemptState)> {
        checkpoint_orchestrator::resume(&self.store, checkpoint_id).map_err(Into::into)
    }

    /// Read `(phase_state, attempt_state)` off a checkpoint without
    /// transitioning its status. Use this for inspection (e.g. reporting
    /// phase status, or reading the prior checkpoint forward before writing
    /// the next one) — `resume_phase_checkpoint` is reserved for actually
    /// resuming a paused run.
    pub fn peek_phase_checkpoint(
        &self,
        checkpoint_id: &CheckpointId,
    ) -> Result<(SwePhaseState, AttemptState)> {
        checkpoint_orchestrator::peek(&self.store, checkpoint_id).map_err(Into::into)
    }

    /// Fork a checkpoint into a brand-new trace, returning a ready-to-run
    /// `(TraceHandle, SwePhaseState, AttemptState)` for it.
    pub fn fork_phase_checkpoint(
        store: &Arc<TraceStore>,
        checkpoint_id: &CheckpointId,
        new_trace_id: Option<TraceId>,
        max_workers: usize,
    ) -> Result<(TraceHandle, SwePhaseState, AttemptState)> {
        let (new_trace_id, phase_state, attempt_state) =
            checkpoint_orchestrator::fork(store, checkpoint_id, new_trace_id)?;
        let handle = TraceHandle {
            store: store.clone(),
            context: TraceContext::new(store.clone(), Some(new_trace_id)),
            max_workers,
            conflict_model: ConflictModel::default(),
        };
        Ok((handle, phase_state, attempt_state))
    }
}
