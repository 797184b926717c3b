//! The content-addressed blob descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ArtifactHash;

/// Descriptor for one immutable, content-addressed blob.
///
/// The blob's bytes themselves live on disk at `storage_path`; this struct
/// is the row persisted in the `artifacts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_hash: ArtifactHash,
    /// Free-form tag: `tool_input`, `tool_output`, `llm_response`,
    /// `checkpoint_state`, `video`, `playwright_trace`, ...
    pub artifact_type: String,
    /// MIME type of the stored bytes.
    pub content_type: String,
    pub byte_len: u64,
    pub storage_path: String,
    pub created_ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
