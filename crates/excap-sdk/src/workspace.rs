//! Workspace root resolution and the ambient `config.toml` (SPEC_FULL.md
//! §6.1/§6.2). Neither durable data nor part of the event/artifact schema —
//! purely how an embedder locates and tunes a store on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Resolve the workspace data directory: an explicit path wins; otherwise
/// `EXCAP_PATH`; otherwise `dirs::data_dir()/excap`; otherwise
/// `$HOME/.excap`; otherwise a configuration error.
pub fn resolve_workspace_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("EXCAP_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("excap"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".excap"));
    }

    anyhow::bail!("could not determine workspace path: no HOME directory or system data directory found")
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Ambient settings read from `<base>/config.toml`. Absence of the file is
/// not an error — defaults apply.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_workers: usize,
    pub milestone_tools: Option<Vec<String>>,
    pub conflict_overrides: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: 4,
            milestone_tools: None,
            conflict_overrides: HashMap::new(),
        }
    }
}

impl Config {
    pub fn load(base_path: &Path) -> Result<Self> {
        let config_path = base_path.join("config.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_against_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(expand_tilde("~/data"), PathBuf::from("/home/tester/data"));
    }

    #[test]
    fn absolute_path_is_unchanged() {
        assert_eq!(expand_tilde("/var/lib/excap"), PathBuf::from("/var/lib/excap"));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_workers, 4);
        assert!(config.milestone_tools.is_none());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "max_workers = 8\nmilestone_tools = [\"git_create_pr\"]\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.milestone_tools, Some(vec!["git_create_pr".to_string()]));
    }
}
