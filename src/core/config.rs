/// Engine configuration, loadable from RON. Every field has a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::selector::DEFAULT_RECENT_WINDOW;

/// Characters per page when nothing narrower is configured.
pub const DEFAULT_PAGE_WIDTH: usize = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for banter selection.
    pub seed: u64,
    /// How many recent speakers the selector down-weights.
    pub recent_window: usize,
    /// Maximum characters per dialogue page for the target surface.
    pub page_width: usize,
    /// Catalog file or directory of catalog files.
    pub content_path: Option<PathBuf>,
    /// Save directory for the ledger and metrics.
    pub save_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            recent_window: DEFAULT_RECENT_WINDOW,
            page_width: DEFAULT_PAGE_WIDTH,
            content_path: None,
            save_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.recent_window, 3);
        assert_eq!(config.page_width, DEFAULT_PAGE_WIDTH);
        assert!(config.content_path.is_none());
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config =
            EngineConfig::parse_ron(r#"(page_width: 48, content_path: Some("content/"))"#).unwrap();
        assert_eq!(config.page_width, 48);
        assert_eq!(config.recent_window, 3);
        assert_eq!(config.content_path, Some(PathBuf::from("content/")));
    }

    #[test]
    fn bad_ron_is_an_error() {
        assert!(EngineConfig::parse_ron("(page_width: \"wide\")").is_err());
    }
}
