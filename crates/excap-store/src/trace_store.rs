//! C2 — Trace Store: the only component that writes to the durable event
//! log. Also owns checkpoint/fork operations (C10's storage half) and
//! cognitive events (SPEC_FULL.md §3.1).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use excap_types::{
    Artifact, ArtifactCreatedData, ArtifactHash, Checkpoint, CheckpointId, CheckpointStatus,
    CognitiveEvent, EventPayload, ProvenanceObject, ProvenanceRelationKind, Span, SpanAttributeData,
    SpanEndData, SpanId, SpanKind, SpanLinkData, SpanStartData, SpanStatus, TraceEvent,
    TraceEventType, TraceId, ToolProvenance,
};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde_json::Value;

use crate::artifact_store::ArtifactStore;
use crate::error::{Error, Result};
use crate::schema;

/// Filters accepted by `get_events`. All fields are optional; absent
/// fields are not constrained.
#[derive(Debug, Default, Clone)]
pub struct EventFilters {
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub event_type: Option<TraceEventType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Construct a linked `TraceStore` + `ArtifactStore` pair rooted at one
/// base directory, per SPEC_FULL.md §6's contract
/// `create_trace_store(base_path) -> (TraceStore, ArtifactStore)`.
pub fn create_trace_store(base_path: impl AsRef<Path>) -> Result<(TraceStore, Arc<ArtifactStore>)> {
    let base = base_path.as_ref();
    let artifacts = Arc::new(ArtifactStore::open(base.join("artifacts"))?);
    let store = TraceStore::open(base.join("traces.db"), artifacts.clone())?;
    Ok((store, artifacts))
}

/// The append-only event log plus the checkpoint/provenance/cognitive
/// tables that share its database file.
pub struct TraceStore {
    conn: Mutex<Connection>,
    artifacts: Arc<ArtifactStore>,
    actor_seq: Mutex<HashMap<String, u64>>,
}

impl TraceStore {
    pub fn open(db_path: impl AsRef<Path>, artifacts: Arc<ArtifactStore>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            artifacts,
            actor_seq: Mutex::new(HashMap::new()),
        })
    }

    pub fn open_in_memory(artifacts: Arc<ArtifactStore>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            artifacts,
            actor_seq: Mutex::new(HashMap::new()),
        })
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    // -- span lifecycle --------------------------------------------------

    /// Open a span: generates a fresh `span_id`, assigns the next
    /// `actor_seq` for `actor_id`, and writes exactly one SPAN_START event.
    #[allow(clippy::too_many_arguments)]
    pub fn start_span(
        &self,
        trace_id: &TraceId,
        kind: SpanKind,
        name: impl Into<String>,
        actor_id: impl Into<String>,
        parent_span_id: Option<SpanId>,
        attributes: Option<BTreeMap<String, Value>>,
        tool_provenance: Option<ToolProvenance>,
        input_artifact_hash: Option<ArtifactHash>,
    ) -> Result<SpanId> {
        let span_id = SpanId::new();
        let actor_id = actor_id.into();
        let actor_seq = self.next_actor_seq(&actor_id);

        let payload = EventPayload::SpanStart(SpanStartData {
            kind,
            name: name.into(),
            actor_id,
            actor_seq,
            parent_span_id,
            attributes: attributes.unwrap_or_default(),
            tool_provenance,
            input_artifact_hash,
        });

        self.append_event(trace_id, &span_id, Utc::now(), payload)?;
        Ok(span_id)
    }

    fn next_actor_seq(&self, actor_id: &str) -> u64 {
        let mut seqs = self.actor_seq.lock().expect("actor_seq mutex poisoned");
        let entry = seqs.entry(actor_id.to_string()).or_insert(0);
        let seq = *entry;
        *entry += 1;
        seq
    }

    /// Close a span. Writes exactly one SPAN_END event; a second call for
    /// the same span is detected and ignored with a warning rather than
    /// appending a duplicate (SPEC_FULL.md §9.1 item 7).
    #[allow(clippy::too_many_arguments)]
    pub fn end_span(
        &self,
        trace_id: &TraceId,
        span_id: &SpanId,
        status: SpanStatus,
        output_artifact_hash: Option<ArtifactHash>,
        error_class: Option<String>,
        error_message: Option<String>,
        additional_attributes: Option<BTreeMap<String, Value>>,
    ) -> Result<()> {
        if self.has_span_end(trace_id, span_id)? {
            eprintln!(
                "excap-store: end_span called twice for span {} in trace {}, ignoring",
                span_id, trace_id
            );
            return Ok(());
        }

        let payload = EventPayload::SpanEnd(SpanEndData {
            status,
            output_artifact_hash,
            error_class,
            error_message,
            additional_attributes: additional_attributes.unwrap_or_default(),
        });
        self.append_event(trace_id, span_id, Utc::now(), payload)
    }

    fn has_span_end(&self, trace_id: &TraceId, span_id: &SpanId) -> Result<bool> {
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trace_events WHERE trace_id = ?1 AND span_id = ?2 AND event_type = 'span_end'",
            params![trace_id.as_str(), span_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Append a SPAN_LINK event, used for fan-in joins (§4.6).
    pub fn add_span_link(
        &self,
        trace_id: &TraceId,
        span_id: &SpanId,
        linked_span_id: SpanId,
    ) -> Result<()> {
        let payload = EventPayload::SpanLink(SpanLinkData { linked_span_id });
        self.append_event(trace_id, span_id, Utc::now(), payload)
    }

    /// Merge additional attributes onto a span outside of start/end.
    pub fn add_span_attribute(
        &self,
        trace_id: &TraceId,
        span_id: &SpanId,
        attributes: BTreeMap<String, Value>,
    ) -> Result<()> {
        let payload = EventPayload::SpanAttribute(SpanAttributeData { attributes });
        self.append_event(trace_id, span_id, Utc::now(), payload)
    }

    fn append_event(
        &self,
        trace_id: &TraceId,
        span_id: &SpanId,
        timestamp: DateTime<Utc>,
        payload: EventPayload,
    ) -> Result<()> {
        let event_type = event_type_str(payload.event_type());
        let data = payload_data_json(&payload)?;

        let conn = self.conn.lock().expect("trace store mutex poisoned");
        conn.execute(
            "INSERT INTO trace_events (timestamp, event_type, trace_id, span_id, data) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                timestamp.to_rfc3339(),
                event_type,
                trace_id.as_str(),
                span_id.as_str(),
                data
            ],
        )?;
        Ok(())
    }

    // -- provenance --------------------------------------------------------

    /// Append a provenance edge. Stored in the dedicated `provenance`
    /// table, never as a `trace_events` row (SPEC_FULL.md §9.1 item 4).
    pub fn add_provenance(
        &self,
        trace_id: &TraceId,
        relation: ProvenanceRelationKind,
        subject_span_id: &SpanId,
        object: ProvenanceObject,
    ) -> Result<()> {
        let (object_span_id, object_artifact_hash) = match &object {
            ProvenanceObject::Span(id) => (Some(id.as_str().to_string()), None),
            ProvenanceObject::Artifact(hash) => (None, Some(hash.as_str().to_string())),
        };

        let conn = self.conn.lock().expect("trace store mutex poisoned");
        conn.execute(
            "INSERT INTO provenance (trace_id, relation, subject_span_id, object_span_id, object_artifact_hash, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trace_id.as_str(),
                relation_str(relation),
                subject_span_id.as_str(),
                object_span_id,
                object_artifact_hash,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // -- artifacts -----------------------------------------------------------

    /// Store bytes through the Artifact Store, then record an `artifacts`
    /// row keyed by hash. Idempotent: a second call with identical bytes
    /// resolves to the same row via `INSERT OR IGNORE`.
    pub fn store_artifact(
        &self,
        bytes: &[u8],
        artifact_type: impl Into<String>,
        content_type: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Artifact> {
        let artifact = self
            .artifacts
            .store(bytes, artifact_type, content_type, metadata)?;

        let metadata_json = match &artifact.metadata {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        let conn = self.conn.lock().expect("trace store mutex poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO artifacts \
             (artifact_hash, artifact_type, content_type, byte_len, storage_path, created_ts, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                artifact.artifact_hash.as_str(),
                artifact.artifact_type,
                artifact.content_type,
                artifact.byte_len as i64,
                artifact.storage_path,
                artifact.created_ts.to_rfc3339(),
                metadata_json,
            ],
        )?;

        Ok(artifact)
    }

    // -- reconstruction ----------------------------------------------------

    /// Fold every event for `span_id` into a `Span`, per the algorithm in
    /// SPEC_FULL.md §4.2. Returns `None` if no SPAN_START exists.
    pub fn reconstruct_span(&self, trace_id: &TraceId, span_id: &SpanId) -> Result<Option<Span>> {
        let events = self.events_for_span(trace_id, span_id)?;
        Ok(fold_span(span_id.clone(), &events))
    }

    fn events_for_span(&self, trace_id: &TraceId, span_id: &SpanId) -> Result<Vec<TraceEvent>> {
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT event_id, timestamp, event_type, trace_id, span_id, data \
             FROM trace_events WHERE trace_id = ?1 AND span_id = ?2 ORDER BY event_id ASC",
        )?;
        let rows = stmt
            .query_map(params![trace_id.as_str(), span_id.as_str()], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|r| r.map_err(Error::from)).collect()
    }

    /// Enumerate every span_id observed in a trace's SPAN_START events,
    /// reconstruct each, and sort by `start_ts`.
    pub fn get_trace_spans(&self, trace_id: &TraceId) -> Result<Vec<Span>> {
        let span_ids = {
            let conn = self.conn.lock().expect("trace store mutex poisoned");
            let mut stmt = conn.prepare(
                "SELECT DISTINCT span_id FROM trace_events \
                 WHERE trace_id = ?1 AND event_type = 'span_start' ORDER BY event_id ASC",
            )?;
            stmt.query_map(params![trace_id.as_str()], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut spans = Vec::with_capacity(span_ids.len());
        for raw in span_ids {
            let span_id = SpanId::from_raw(raw);
            if let Some(span) = self.reconstruct_span(trace_id, &span_id)? {
                spans.push(span);
            }
        }
        spans.sort_by_key(|s| s.start_ts);
        Ok(spans)
    }

    /// Closes every span in `trace_id` that has a SPAN_START but no
    /// SPAN_END with status CANCELLED and error_message "recovered"
    /// (SPEC_FULL.md §8 Scenario F). Idempotent: a span already closed by
    /// an earlier recovery pass has a SPAN_END on record and is skipped by
    /// `end_span`'s own duplicate guard. Returns the span_ids it closed.
    pub fn recover_dangling_spans(&self, trace_id: &TraceId) -> Result<Vec<SpanId>> {
        let spans = self.get_trace_spans(trace_id)?;
        let mut recovered = Vec::new();
        for span in spans {
            if span.is_open() {
                self.end_span(
                    trace_id,
                    &span.span_id,
                    SpanStatus::Cancelled,
                    None,
                    None,
                    Some("recovered".to_string()),
                    None,
                )?;
                recovered.push(span.span_id);
            }
        }
        Ok(recovered)
    }

    /// Ad-hoc query over the raw event log.
    pub fn get_events(&self, filters: &EventFilters) -> Result<Vec<TraceEvent>> {
        let mut sql = String::from(
            "SELECT event_id, timestamp, event_type, trace_id, span_id, data FROM trace_events WHERE 1=1",
        );
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(trace_id) = &filters.trace_id {
            sql.push_str(" AND trace_id = ?");
            params.push(Box::new(trace_id.as_str().to_string()));
        }
        if let Some(span_id) = &filters.span_id {
            sql.push_str(" AND span_id = ?");
            params.push(Box::new(span_id.as_str().to_string()));
        }
        if let Some(event_type) = filters.event_type {
            sql.push_str(" AND event_type = ?");
            params.push(Box::new(event_type_str(event_type).to_string()));
        }
        if let Some(since) = filters.since {
            sql.push_str(" AND timestamp >= ?");
            params.push(Box::new(since.to_rfc3339()));
        }
        if let Some(until) = filters.until {
            sql.push_str(" AND timestamp <= ?");
            params.push(Box::new(until.to_rfc3339()));
        }
        sql.push_str(" ORDER BY event_id ASC");
        if let Some(limit) = filters.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let conn = self.conn.lock().expect("trace store mutex poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|r| r.map_err(Error::from)).collect()
    }

    // -- checkpoints --------------------------------------------------------

    pub fn create_checkpoint(
        &self,
        trace_id: &TraceId,
        step_number: u64,
        description: impl Into<String>,
        state_bytes: &[u8],
        parent_checkpoint_id: Option<CheckpointId>,
        metadata: Option<Value>,
    ) -> Result<Checkpoint> {
        let artifact = self.store_artifact(state_bytes, "checkpoint_state", "application/json", None)?;
        let checkpoint = Checkpoint {
            checkpoint_id: CheckpointId::new(),
            trace_id: trace_id.clone(),
            created_ts: Utc::now(),
            status: CheckpointStatus::Active,
            step_number,
            description: description.into(),
            state_artifact_hash: artifact.artifact_hash,
            parent_checkpoint_id,
            metadata,
        };
        self.insert_checkpoint(&checkpoint)?;
        Ok(checkpoint)
    }

    fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let metadata_json = match &checkpoint.metadata {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        conn.execute(
            "INSERT INTO checkpoints \
             (checkpoint_id, trace_id, created_ts, status, step_number, description, state_artifact_hash, parent_checkpoint_id, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                checkpoint.checkpoint_id.as_str(),
                checkpoint.trace_id.as_str(),
                checkpoint.created_ts.to_rfc3339(),
                checkpoint_status_str(checkpoint.status),
                checkpoint.step_number as i64,
                checkpoint.description,
                checkpoint.state_artifact_hash.as_str(),
                checkpoint.parent_checkpoint_id.as_ref().map(|c| c.as_str()),
                metadata_json,
            ],
        )?;
        Ok(())
    }

    pub fn list_checkpoints(
        &self,
        trace_id: &TraceId,
        status: Option<CheckpointStatus>,
    ) -> Result<Vec<Checkpoint>> {
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        let rows: Vec<Checkpoint> = if let Some(status) = status {
            let mut stmt = conn.prepare(
                "SELECT checkpoint_id, trace_id, created_ts, status, step_number, description, \
                 state_artifact_hash, parent_checkpoint_id, metadata FROM checkpoints \
                 WHERE trace_id = ?1 AND status = ?2 ORDER BY step_number ASC",
            )?;
            stmt.query_map(
                params![trace_id.as_str(), checkpoint_status_str(status)],
                row_to_checkpoint,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = conn.prepare(
                "SELECT checkpoint_id, trace_id, created_ts, status, step_number, description, \
                 state_artifact_hash, parent_checkpoint_id, metadata FROM checkpoints \
                 WHERE trace_id = ?1 ORDER BY step_number ASC",
            )?;
            stmt.query_map(params![trace_id.as_str()], row_to_checkpoint)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(Ok).collect()
    }

    pub fn get_checkpoint(&self, checkpoint_id: &CheckpointId) -> Result<Option<Checkpoint>> {
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        conn.query_row(
            "SELECT checkpoint_id, trace_id, created_ts, status, step_number, description, \
             state_artifact_hash, parent_checkpoint_id, metadata FROM checkpoints WHERE checkpoint_id = ?1",
            params![checkpoint_id.as_str()],
            row_to_checkpoint,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn get_checkpoint_state(&self, checkpoint_id: &CheckpointId) -> Result<Option<Vec<u8>>> {
        let checkpoint = match self.get_checkpoint(checkpoint_id)? {
            Some(c) => c,
            None => return Ok(None),
        };
        self.artifacts
            .retrieve(&checkpoint.state_artifact_hash)
            .map_err(Error::from)
    }

    pub fn update_checkpoint_status(
        &self,
        checkpoint_id: &CheckpointId,
        status: CheckpointStatus,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        let changed = conn.execute(
            "UPDATE checkpoints SET status = ?1 WHERE checkpoint_id = ?2",
            params![checkpoint_status_str(status), checkpoint_id.as_str()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("checkpoint {}", checkpoint_id)));
        }
        Ok(())
    }

    /// Fork a new trace from `checkpoint_id`'s state. The parent checkpoint
    /// is marked FORKED; the new checkpoint references the same state
    /// artifact hash (no copy) and the parent's checkpoint id.
    pub fn fork_from_checkpoint(
        &self,
        checkpoint_id: &CheckpointId,
        new_trace_id: Option<TraceId>,
    ) -> Result<(TraceId, Checkpoint)> {
        let parent = self
            .get_checkpoint(checkpoint_id)?
            .ok_or_else(|| Error::NotFound(format!("checkpoint {}", checkpoint_id)))?;

        self.update_checkpoint_status(checkpoint_id, CheckpointStatus::Forked)?;

        let new_trace_id = new_trace_id.unwrap_or_else(TraceId::new);
        let new_checkpoint = Checkpoint {
            checkpoint_id: CheckpointId::new(),
            trace_id: new_trace_id.clone(),
            created_ts: Utc::now(),
            status: CheckpointStatus::Active,
            step_number: parent.step_number,
            description: format!("forked from {}", parent.checkpoint_id),
            state_artifact_hash: parent.state_artifact_hash,
            parent_checkpoint_id: Some(parent.checkpoint_id),
            metadata: parent.metadata,
        };
        self.insert_checkpoint(&new_checkpoint)?;

        Ok((new_trace_id, new_checkpoint))
    }

    // -- cognitive events ----------------------------------------------------

    pub fn record_cognitive_event(
        &self,
        trace_id: &TraceId,
        event_type: impl Into<String>,
        content: impl Into<String>,
        phase: Option<String>,
        metadata: Option<Value>,
    ) -> Result<i64> {
        let metadata_json = match &metadata {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        let timestamp = Utc::now().timestamp() as f64
            + (Utc::now().timestamp_subsec_millis() as f64 / 1000.0);

        let conn = self.conn.lock().expect("trace store mutex poisoned");
        conn.execute(
            "INSERT INTO cognitive_events (trace_id, event_type, timestamp, phase, content, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trace_id.as_str(),
                event_type.into(),
                timestamp,
                phase,
                content.into(),
                metadata_json,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_cognitive_events(
        &self,
        trace_id: &TraceId,
        event_type: Option<&str>,
    ) -> Result<Vec<CognitiveEvent>> {
        let conn = self.conn.lock().expect("trace store mutex poisoned");
        let rows: Vec<CognitiveEvent> = if let Some(event_type) = event_type {
            let mut stmt = conn.prepare(
                "SELECT id, trace_id, event_type, timestamp, phase, content, metadata \
                 FROM cognitive_events WHERE trace_id = ?1 AND event_type = ?2 ORDER BY id ASC",
            )?;
            stmt.query_map(params![trace_id.as_str(), event_type], row_to_cognitive)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, trace_id, event_type, timestamp, phase, content, metadata \
                 FROM cognitive_events WHERE trace_id = ?1 ORDER BY id ASC",
            )?;
            stmt.query_map(params![trace_id.as_str()], row_to_cognitive)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(Ok).collect()
    }
}

fn event_type_str(t: TraceEventType) -> &'static str {
    match t {
        TraceEventType::SpanStart => "span_start",
        TraceEventType::SpanEnd => "span_end",
        TraceEventType::SpanAttribute => "span_attribute",
        TraceEventType::SpanLink => "span_link",
        TraceEventType::ArtifactCreated => "artifact_created",
        TraceEventType::ProvenanceRelation => "provenance_relation",
    }
}

fn relation_str(r: ProvenanceRelationKind) -> &'static str {
    match r {
        ProvenanceRelationKind::Used => "used",
        ProvenanceRelationKind::WasGeneratedBy => "was_generated_by",
        ProvenanceRelationKind::WasDerivedFrom => "was_derived_from",
        ProvenanceRelationKind::WasAttributedTo => "was_attributed_to",
        ProvenanceRelationKind::WasInformedBy => "was_informed_by",
    }
}

fn checkpoint_status_str(s: CheckpointStatus) -> &'static str {
    match s {
        CheckpointStatus::Active => "active",
        CheckpointStatus::Resumed => "resumed",
        CheckpointStatus::Forked => "forked",
        CheckpointStatus::Archived => "archived",
    }
}

fn payload_data_json(payload: &EventPayload) -> Result<String> {
    let data = match payload {
        EventPayload::SpanStart(d) => serde_json::to_value(d)?,
        EventPayload::SpanEnd(d) => serde_json::to_value(d)?,
        EventPayload::SpanAttribute(d) => serde_json::to_value(d)?,
        EventPayload::SpanLink(d) => serde_json::to_value(d)?,
        EventPayload::ArtifactCreated(d) => serde_json::to_value(d)?,
    };
    Ok(serde_json::to_string(&data)?)
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<rusqlite::Result<TraceEvent>> {
    let event_id: i64 = row.get(0)?;
    let timestamp_raw: String = row.get(1)?;
    let event_type: String = row.get(2)?;
    let trace_id: String = row.get(3)?;
    let span_id: String = row.get(4)?;
    let data_raw: String = row.get(5)?;

    Ok((|| -> std::result::Result<TraceEvent, Box<dyn std::error::Error + Send + Sync>> {
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_raw)?.with_timezone(&Utc);
        let data: Value = serde_json::from_str(&data_raw)?;
        let payload = match event_type.as_str() {
            "span_start" => EventPayload::SpanStart(serde_json::from_value(data)?),
            "span_end" => EventPayload::SpanEnd(serde_json::from_value(data)?),
            "span_attribute" => EventPayload::SpanAttribute(serde_json::from_value(data)?),
            "span_link" => EventPayload::SpanLink(serde_json::from_value(data)?),
            "artifact_created" => EventPayload::ArtifactCreated(serde_json::from_value(data)?),
            other => return Err(format!("unknown event_type in event log: {other}").into()),
        };
        Ok(TraceEvent {
            event_id,
            timestamp,
            trace_id: TraceId::from_raw(trace_id),
            span_id: SpanId::from_raw(span_id),
            payload,
        })
    })()
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e)))
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Checkpoint> {
    let status_raw: String = row.get(3)?;
    let status = match status_raw.as_str() {
        "active" => CheckpointStatus::Active,
        "resumed" => CheckpointStatus::Resumed,
        "forked" => CheckpointStatus::Forked,
        "archived" => CheckpointStatus::Archived,
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown checkpoint status: {other}").into(),
            ))
        }
    };

    let created_ts_raw: String = row.get(2)?;
    let created_ts = DateTime::parse_from_rfc3339(&created_ts_raw)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    let metadata_raw: Option<String> = row.get(8)?;
    let metadata = metadata_raw
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Checkpoint {
        checkpoint_id: CheckpointId::from_raw(row.get::<_, String>(0)?),
        trace_id: TraceId::from_raw(row.get::<_, String>(1)?),
        created_ts,
        status,
        step_number: row.get::<_, i64>(4)? as u64,
        description: row.get(5)?,
        state_artifact_hash: ArtifactHash::from_raw(row.get::<_, String>(6)?),
        parent_checkpoint_id: row.get::<_, Option<String>>(7)?.map(CheckpointId::from_raw),
        metadata,
    })
}

fn row_to_cognitive(row: &rusqlite::Row<'_>) -> rusqlite::Result<CognitiveEvent> {
    let metadata_raw: Option<String> = row.get(6)?;
    let metadata = metadata_raw
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(CognitiveEvent {
        id: row.get(0)?,
        trace_id: TraceId::from_raw(row.get::<_, String>(1)?),
        event_type: row.get(2)?,
        timestamp: row.get(3)?,
        phase: row.get(4)?,
        content: row.get(5)?,
        metadata,
    })
}

/// Fold a span's ordered events into the derived view (SPEC_FULL.md §4.2's
/// key algorithm).
fn fold_span(span_id: SpanId, events: &[TraceEvent]) -> Option<Span> {
    let start = events.iter().find_map(|e| match &e.payload {
        EventPayload::SpanStart(d) => Some((e.timestamp, d.clone())),
        _ => None,
    })?;

    let (start_ts, start_data) = start;
    let mut span = Span {
        span_id,
        kind: start_data.kind,
        name: start_data.name,
        actor_id: start_data.actor_id,
        actor_seq: start_data.actor_seq,
        parent_span_id: start_data.parent_span_id,
        start_ts,
        end_ts: None,
        status: SpanStatus::Started,
        attributes: start_data.attributes,
        links: Vec::new(),
        tool_provenance: start_data.tool_provenance,
        input_artifact_hash: start_data.input_artifact_hash,
        output_artifact_hash: None,
        error_class: None,
        error_message: None,
    };

    for event in events {
        match &event.payload {
            EventPayload::SpanStart(_) => {}
            EventPayload::SpanAttribute(d) => {
                for (k, v) in &d.attributes {
                    span.attributes.insert(k.clone(), v.clone());
                }
            }
            EventPayload::SpanLink(d) => {
                span.links.push(d.linked_span_id.clone());
            }
            EventPayload::SpanEnd(d) => {
                span.end_ts = Some(event.timestamp);
                span.status = d.status;
                span.output_artifact_hash = d.output_artifact_hash.clone();
                span.error_class = d.error_class.clone();
                span.error_message = d.error_message.clone();
                for (k, v) in &d.additional_attributes {
                    span.attributes.insert(k.clone(), v.clone());
                }
            }
            EventPayload::ArtifactCreated(_) => {}
        }
    }

    Some(span)
}
