//! Workspace configuration (`.sylva/config.json`).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use sylva_core::SourceLanguage;

/// Directory holding the config file and the default store.
pub const SYLVA_DIR: &str = ".sylva";

/// Config file name inside [`SYLVA_DIR`].
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub include_extensions: Vec<String>,
    /// Path components that exclude a file wherever they appear.
    pub ignore: Vec<String>,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
    /// Concurrent per-file workers; 0 means available parallelism.
    pub workers: usize,
    pub plugins: PluginsConfig,
    pub enrichment: EnrichmentConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Soft per-resolver budget. Exceeding it is logged, not enforced.
    pub time_budget_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { time_budget_ms: 5000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory, relative to the workspace root.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: format!("{}/graph", SYLVA_DIR),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            include_extensions: ["js", "jsx", "mjs", "cjs", "ts", "tsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore: ["node_modules", "dist", "build", "coverage"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 2_000_000,
            workers: 0,
            plugins: PluginsConfig::default(),
            enrichment: EnrichmentConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn path(root: &Path) -> PathBuf {
        root.join(SYLVA_DIR).join(CONFIG_FILE)
    }

    /// Loads the config of a workspace. A missing file gives the defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Writes the config, creating `.sylva/` if needed.
    pub fn save(&self, root: &Path) -> Result<(), ConfigError> {
        let path = Self::path(root);
        let io = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(io)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        root.join(&self.store.path)
    }

    /// Language of a path if its extension is included.
    pub fn language_of(&self, path: &Path) -> Option<SourceLanguage> {
        let ext = path.extension()?.to_str()?;
        if !self.include_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return None;
        }
        SourceLanguage::from_extension(ext)
    }

    pub fn is_disabled(&self, plugin: &str) -> bool {
        self.plugins.disabled.iter().any(|d| d == plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.enrichment.time_budget_ms, 5000);
        assert_eq!(config.store_path(dir.path()), dir.path().join(".sylva/graph"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(SYLVA_DIR)).unwrap();
        fs::write(
            Config::path(dir.path()),
            r#"{ "workers": 3, "plugins": { "disabled": ["SuppressionIndexer"] } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.worker_count(), 3);
        assert!(config.is_disabled("SuppressionIndexer"));
        assert_eq!(config.max_file_size, 2_000_000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.ignore.push("vendor".to_string());
        config.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(SYLVA_DIR)).unwrap();
        fs::write(Config::path(dir.path()), "{ not json").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_language_respects_included_extensions() {
        let mut config = Config::default();
        assert_eq!(config.language_of(Path::new("a.ts")), Some(SourceLanguage::TypeScript));
        assert_eq!(config.language_of(Path::new("a.mts")), None);
        config.include_extensions = vec!["js".to_string()];
        assert_eq!(config.language_of(Path::new("a.ts")), None);
    }
}
