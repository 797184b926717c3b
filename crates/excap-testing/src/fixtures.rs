//! Ready-made `ToolCall` batches for conflict-model and parallel-executor
//! tests, matching the inline fixtures already duplicated in
//! `excap-runtime`'s own unit tests.

use excap_types::ToolCall;
use serde_json::json;

/// Three reads of distinct files. All `ParallelSafe`, so a `ConflictModel`
/// should partition this into a single group.
pub fn non_conflicting_read_batch() -> Vec<ToolCall> {
    vec![
        ToolCall::new("1", "Read", json!({"file_path": "/a"})),
        ToolCall::new("2", "Read", json!({"file_path": "/b"})),
        ToolCall::new("3", "Read", json!({"file_path": "/c"})),
    ]
}

/// Two `Edit`s on the same file. Both `Exclusive` and sharing a resource
/// key, so a `ConflictModel` must place them in separate groups, in order.
pub fn conflicting_write_batch() -> Vec<ToolCall> {
    vec![
        ToolCall::new("1", "Edit", json!({"file_path": "/x"})),
        ToolCall::new("2", "Edit", json!({"file_path": "/x"})),
    ]
}

/// A mix: two reads of distinct files (parallel-safe, no shared resource),
/// one edit of a third file (exclusive, its own resource), and a second
/// edit of that same third file (exclusive, contends with the third call).
/// Expect group 1 = {reads, first edit}, group 2 = {second edit}.
pub fn mixed_conflict_batch() -> Vec<ToolCall> {
    vec![
        ToolCall::new("1", "Read", json!({"file_path": "/a"})),
        ToolCall::new("2", "Read", json!({"file_path": "/b"})),
        ToolCall::new("3", "Edit", json!({"file_path": "/x"})),
        ToolCall::new("4", "Edit", json!({"file_path": "/x"})),
    ]
}
