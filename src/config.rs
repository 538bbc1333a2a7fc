//! Engine configuration
//!
//! Tunables for XP rewards and storage location, loadable from a TOML
//! file (`~/.learntrack/engine.toml` by default). A missing file yields
//! the built-in defaults; a malformed file is an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// XP amounts granted by progression milestones. Section and course
/// bonuses stack on top of the lesson award in a single completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XpRewards {
    pub lesson_completed: u32,
    pub section_completed: u32,
    pub course_completed: u32,
}

impl Default for XpRewards {
    fn default() -> Self {
        Self {
            lesson_completed: 10,
            section_completed: 25,
            course_completed: 100,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database file path; None means `~/.learntrack/engine.db`
    pub db_path: Option<PathBuf>,
    /// Upper bound on leaderboard page size
    pub leaderboard_max_limit: u32,
    pub xp: XpRewards,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            leaderboard_max_limit: 100,
            xp: XpRewards::default(),
        }
    }
}

impl EngineConfig {
    /// Get the global config directory path (~/.learntrack/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".learntrack")
    }

    /// Get the global config file path (~/.learntrack/engine.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("engine.toml")
    }

    /// Effective database path.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("engine.db"))
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from the given path, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.xp.lesson_completed, 10);
        assert!(config.xp.section_completed > config.xp.lesson_completed);
        assert!(config.xp.course_completed > config.xp.section_completed);
        assert_eq!(config.leaderboard_max_limit, 100);
    }

    #[test]
    fn test_partial_file_merges_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[xp]\nlesson_completed = 7\n").unwrap();

        let config = EngineConfig::load_or_default(&path).unwrap();
        assert_eq!(config.xp.lesson_completed, 7);
        assert_eq!(config.xp.course_completed, 100);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.leaderboard_max_limit, 100);
    }
}
