//! `TempStore`: a `TraceStore` + `ArtifactStore` pair rooted at a
//! `tempfile::TempDir`.

use std::sync::Arc;

use excap_store::{ArtifactStore, TraceStore};
use excap_types::TraceId;
use tempfile::TempDir;

/// Owns the `TempDir` for its lifetime so the artifact tree and
/// `traces.db` aren't cleaned up while a test still holds the store.
pub struct TempStore {
    pub store: Arc<TraceStore>,
    pub artifacts: Arc<ArtifactStore>,
    _dir: TempDir,
}

impl TempStore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for TempStore");
        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("artifacts")).expect("open artifact store"));
        let store = Arc::new(
            TraceStore::open(dir.path().join("traces.db"), artifacts.clone()).expect("open trace store"),
        );
        Self {
            store,
            artifacts,
            _dir: dir,
        }
    }

    pub fn base_path(&self) -> &std::path::Path {
        self._dir.path()
    }

    /// Mint a fresh trace id, convenient for tests that don't care about a
    /// specific value.
    pub fn new_trace(&self) -> TraceId {
        TraceId::new()
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}
