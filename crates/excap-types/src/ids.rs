//! Identifier newtypes and their exact on-disk string formats.
//!
//! Formats are fixed by the external interface (SPEC_FULL.md §6) and must
//! not drift: `trace-<16 hex>`, `span-<12 hex>`, `cp-<16 hex>`, and a bare
//! 64-hex-char SHA-256 digest for artifact hashes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal, $hex_len:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh, random identifier.
            pub fn new() -> Self {
                let hex = Uuid::new_v4().simple().to_string();
                Self(format!("{}{}", $prefix, &hex[..$hex_len]))
            }

            /// Wrap an existing string without validating its shape.
            ///
            /// Used when round-tripping identifiers already persisted to
            /// the event log.
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

prefixed_id!(TraceId, "trace-", 16);
prefixed_id!(SpanId, "span-", 12);
prefixed_id!(CheckpointId, "cp-", 16);

/// A SHA-256 digest rendered as 64 lowercase hex characters.
///
/// Doubles as the primary key of the Artifact Store and as an integrity
/// check: `retrieve(hash)`'s bytes must hash back to `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHash(String);

impl ArtifactHash {
    /// Compute the hash of a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an already-computed 64-char hex digest.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two hex characters, used as the artifact-tree shard directory.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for ArtifactHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArtifactHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_has_expected_shape() {
        let id = TraceId::new();
        assert!(id.as_str().starts_with("trace-"));
        assert_eq!(id.as_str().len(), "trace-".len() + 16);
    }

    #[test]
    fn span_id_has_expected_shape() {
        let id = SpanId::new();
        assert!(id.as_str().starts_with("span-"));
        assert_eq!(id.as_str().len(), "span-".len() + 12);
    }

    #[test]
    fn checkpoint_id_has_expected_shape() {
        let id = CheckpointId::new();
        assert!(id.as_str().starts_with("cp-"));
        assert_eq!(id.as_str().len(), "cp-".len() + 16);
    }

    #[test]
    fn artifact_hash_is_stable_and_64_hex_chars() {
        let h1 = ArtifactHash::of(b"hello");
        let h2 = ArtifactHash::of(b"hello");
        assert_eq!(h1, h2);
        assert_eq!(h1.as_str().len(), 64);
        assert!(h1.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn artifact_hash_shard_is_first_two_chars() {
        let h = ArtifactHash::of(b"hello");
        assert_eq!(h.shard(), &h.as_str()[..2]);
        assert_eq!(h.shard().len(), 2);
    }
}
