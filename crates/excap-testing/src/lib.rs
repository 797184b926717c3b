//! Shared test fixtures and assertion helpers for this workspace's
//! cross-crate integration suites (SPEC_FULL.md §13).
//!
//! Not published; `excap-sdk`'s `tests/` directory is this crate's only
//! consumer outside of `#[cfg(test)]` unit modules that want a ready-made
//! temp-dir-backed store instead of hand-rolling one.

pub mod assertions;
pub mod fixtures;
pub mod world;

pub use assertions::{assert_parented_at, assert_span_status};
pub use fixtures::{conflicting_write_batch, mixed_conflict_batch, non_conflicting_read_batch};
pub use world::TempStore;
