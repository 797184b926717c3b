//! C5 — Conflict Model: classifies tool calls as parallel-safe or
//! exclusive, and derives the resource key exclusive calls contend on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use excap_types::ToolCall;
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictClass {
    ParallelSafe,
    Exclusive,
}

/// Default classification of well-known tool names, per SPEC_FULL.md §4.5's
/// table. Unknown tools default to `Exclusive` (conservative).
static DEFAULT_CLASSES: Lazy<HashMap<&'static str, ConflictClass>> = Lazy::new(|| {
    HashMap::from([
        ("Read", ConflictClass::ParallelSafe),
        ("grep", ConflictClass::ParallelSafe),
        ("glob", ConflictClass::ParallelSafe),
        ("web_search", ConflictClass::ParallelSafe),
        ("web_get_contents", ConflictClass::ParallelSafe),
        ("lsp_tool", ConflictClass::ParallelSafe),
        ("Write", ConflictClass::Exclusive),
        ("Edit", ConflictClass::Exclusive),
        ("bash", ConflictClass::Exclusive),
        ("Bash", ConflictClass::Exclusive),
        ("browser.navigate", ConflictClass::Exclusive),
        ("browser.click", ConflictClass::Exclusive),
        ("browser.type", ConflictClass::Exclusive),
        ("browser.extract", ConflictClass::Exclusive),
    ])
});

/// Classifies tool calls and hands out per-resource locks, so exclusive
/// calls on distinct resources (e.g. two `Edit`s on different files) can
/// still run concurrently.
pub struct ConflictModel {
    overrides: Mutex<HashMap<String, ConflictClass>>,
    resource_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for ConflictModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ConflictModel {
    /// Clones the registered overrides; resource locks are always fresh
    /// (they are only ever held for the duration of one dispatch, never
    /// shared across `ParallelExecutor` instances).
    fn clone(&self) -> Self {
        let overrides = self
            .overrides
            .lock()
            .expect("conflict overrides mutex poisoned")
            .clone();
        Self {
            overrides: Mutex::new(overrides),
            resource_locks: Mutex::new(HashMap::new()),
        }
    }
}

impl ConflictModel {
    pub fn new() -> Self {
        Self {
            overrides: Mutex::new(HashMap::new()),
            resource_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_conflict_class(&self, tool_name: &str) -> ConflictClass {
        if let Some(class) = self
            .overrides
            .lock()
            .expect("conflict overrides mutex poisoned")
            .get(tool_name)
        {
            return *class;
        }
        DEFAULT_CLASSES
            .get(tool_name)
            .copied()
            .unwrap_or(ConflictClass::Exclusive)
    }

    /// Register (or override) a tool's conflict class, e.g. from
    /// `config.toml`'s `conflict_overrides`.
    pub fn register_tool(&self, tool_name: impl Into<String>, class: ConflictClass) {
        self.overrides
            .lock()
            .expect("conflict overrides mutex poisoned")
            .insert(tool_name.into(), class);
    }

    /// `None` for parallel-safe tools; a resource identifier for exclusive
    /// ones.
    pub fn get_resource_key(&self, call: &ToolCall) -> Option<String> {
        match self.get_conflict_class(&call.name) {
            ConflictClass::ParallelSafe => None,
            ConflictClass::Exclusive => Some(self.derive_resource_key(call)),
        }
    }

    fn derive_resource_key(&self, call: &ToolCall) -> String {
        match call.name.as_str() {
            "Write" | "Edit" => format!(
                "file:{}",
                call.argument_str("file_path").unwrap_or("unknown")
            ),
            "bash" | "Bash" => format!(
                "bash:{}",
                call.argument_str("bash_id").unwrap_or("default")
            ),
            name if name.starts_with("browser.") => format!(
                "browser:{}",
                call.argument_str("session_id").unwrap_or("default")
            ),
            name => format!("tool:{}", name),
        }
    }

    pub fn get_lock(&self, resource_key: &str) -> Arc<Mutex<()>> {
        self.resource_locks
            .lock()
            .expect("resource lock map poisoned")
            .entry(resource_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// True if every exclusive call in `calls` targets a distinct resource
    /// key (parallel-safe calls never conflict with anything).
    pub fn can_run_parallel(&self, calls: &[ToolCall]) -> bool {
        let mut seen = std::collections::HashSet::new();
        for call in calls {
            if let Some(key) = self.get_resource_key(call) {
                if !seen.insert(key) {
                    return false;
                }
            }
        }
        true
    }

    /// Partition `calls` into conflict-free groups, preserving input order
    /// both within and across groups (SPEC_FULL.md §4.5's algorithm).
    pub fn partition_by_conflicts(&self, calls: &[ToolCall]) -> Vec<Vec<ToolCall>> {
        if calls.is_empty() {
            return Vec::new();
        }

        let mut groups = Vec::new();
        let mut current_group: Vec<ToolCall> = Vec::new();
        let mut current_resources = std::collections::HashSet::new();

        for call in calls {
            match self.get_resource_key(call) {
                None => current_group.push(call.clone()),
                Some(key) if current_resources.contains(&key) => {
                    if !current_group.is_empty() {
                        groups.push(std::mem::take(&mut current_group));
                        current_resources.clear();
                    }
                    current_group.push(call.clone());
                    current_resources.insert(key);
                }
                Some(key) => {
                    current_group.push(call.clone());
                    current_resources.insert(key);
                }
            }
        }

        if !current_group.is_empty() {
            groups.push(current_group);
        }

        groups
    }
}
