//! C1 — Artifact Store: content-addressed blob storage, sharded by the
//! first two hex characters of the SHA-256 hash, write-once with atomic
//! (temp file + rename) writes so a partial write is never observable.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use excap_types::{Artifact, ArtifactHash};
use serde_json::Value;

use crate::error::{Error, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Content-addressed blob storage rooted at `<base>/artifacts/`.
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if absent) the artifact tree rooted at `base`.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Path a hash's blob would live at, whether or not it exists yet.
    pub fn path_for(&self, hash: &ArtifactHash) -> PathBuf {
        self.base.join(hash.shard()).join(hash.as_str())
    }

    pub fn exists(&self, hash: &ArtifactHash) -> bool {
        self.path_for(hash).is_file()
    }

    /// Store `bytes`, deduping by hash. If the hash-derived path already
    /// exists, this is a no-op that still returns a fresh `Artifact`
    /// descriptor with the caller's metadata — only one physical write ever
    /// occurs for a given hash, matching invariant 3 in SPEC_FULL.md §8.
    pub fn store(
        &self,
        bytes: &[u8],
        artifact_type: impl Into<String>,
        content_type: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Artifact> {
        let hash = ArtifactHash::of(bytes);
        let path = self.path_for(&hash);

        if !path.is_file() {
            self.write_atomic(&path, bytes)?;
        }

        Ok(Artifact {
            artifact_hash: hash,
            artifact_type: artifact_type.into(),
            content_type: content_type.into(),
            byte_len: bytes.len() as u64,
            storage_path: path.to_string_lossy().into_owned(),
            created_ts: Utc::now(),
            metadata,
        })
    }

    /// Convenience wrapper: read `path` from disk and store its bytes.
    pub fn store_file(
        &self,
        path: &Path,
        artifact_type: impl Into<String>,
        content_type: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Artifact> {
        let bytes = fs::read(path)?;
        self.store(&bytes, artifact_type, content_type, metadata)
    }

    pub fn retrieve(&self, hash: &ArtifactHash) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(hash);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write `bytes` to a temp file in the shard directory, then rename
    /// into place. If the rename fails, the temp file is removed so no
    /// partial artifact is ever left addressable.
    fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> Result<()> {
        let shard_dir = final_path
            .parent()
            .expect("artifact path always has a shard parent");
        fs::create_dir_all(shard_dir)?;

        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = shard_dir.join(format!(
            ".tmp-{}-{}",
            std::process::id(),
            counter
        ));

        let write_result = fs::write(&temp_path, bytes);
        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Io(e));
        }

        if let Err(e) = fs::rename(&temp_path, final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Io(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (ArtifactStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn store_then_retrieve_round_trips() {
        let (store, _dir) = store();
        let artifact = store
            .store(b"hello", "tool_output", "text/plain", None)
            .unwrap();
        let bytes = store.retrieve(&artifact.artifact_hash).unwrap().unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(
            ArtifactHash::of(&bytes).as_str(),
            artifact.artifact_hash.as_str()
        );
    }

    #[test]
    fn repeated_store_of_identical_bytes_is_a_dedup_noop() {
        let (store, _dir) = store();
        let a1 = store.store(b"same bytes", "x", "text/plain", None).unwrap();
        let a2 = store.store(b"same bytes", "x", "text/plain", None).unwrap();
        assert_eq!(a1.artifact_hash, a2.artifact_hash);

        let shard_dir = store.base.join(a1.artifact_hash.shard());
        let entries: Vec<_> = fs::read_dir(&shard_dir).unwrap().collect();
        assert_eq!(entries.len(), 1, "exactly one file for the shared hash");
    }

    #[test]
    fn retrieve_of_missing_hash_is_none() {
        let (store, _dir) = store();
        let missing = ArtifactHash::of(b"never stored");
        assert!(store.retrieve(&missing).unwrap().is_none());
        assert!(!store.exists(&missing));
    }

    #[test]
    fn no_temp_file_survives_a_successful_write() {
        let (store, _dir) = store();
        let artifact = store.store(b"clean", "x", "text/plain", None).unwrap();
        let shard_dir = store.base.join(artifact.artifact_hash.shard());
        let leftovers: Vec<_> = fs::read_dir(&shard_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
