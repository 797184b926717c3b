//! Persistence layer: content-addressed artifacts, the append-only event
//! log spans are folded from, and the derived session-overview view over
//! both.
//!
//! This crate owns every byte this substrate ever writes to disk. Nothing
//! above it (`excap-runtime`, `excap-phases`, `excap-sdk`) touches SQLite or
//! the artifact tree directly.

pub mod artifact_store;
pub mod error;
pub mod overview;
pub mod schema;
pub mod trace_store;

pub use artifact_store::ArtifactStore;
pub use error::{Error, Result};
pub use overview::{ErrorDetail, Milestone, SessionOverview, SessionStatus, SummaryEventLog};
pub use trace_store::{create_trace_store, EventFilters, TraceStore};
