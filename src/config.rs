//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::PipelineOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,

    /// How long a write waits on a locked database before the file fails
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Where source files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub catalog_dir: Option<String>,

    #[serde(default)]
    pub log_dir: Option<String>,

    /// File name glob applied during the directory walk
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

/// Song id resolution for log events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub strategy: ResolverStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolverStrategy {
    /// Build an in-memory index of the catalog once per run
    #[default]
    Index,
    /// Query the songs table for every playback event
    Query,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/playlog/playlog.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pattern() -> String {
    crate::source::DEFAULT_PATTERN.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog_dir: None,
            log_dir: None,
            pattern: default_pattern(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./playlog.yaml (current directory)
    /// 3. ~/.config/playlog/playlog.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "playlog.yaml".to_string(),
            shellexpand::tilde("~/.config/playlog/playlog.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("Failed to read {}", search_path))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("Invalid config in {}", search_path))?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        expand(&self.database.path)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    pub fn catalog_dir(&self) -> Option<PathBuf> {
        self.sources.catalog_dir.as_deref().map(expand)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.sources.log_dir.as_deref().map(expand)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            pattern: self.sources.pattern.clone(),
            resolver: self.resolver.strategy,
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sources.pattern, "*.json");
        assert_eq!(config.resolver.strategy, ResolverStrategy::Index);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.catalog_dir().is_none());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: /var/lib/playlog/test.db

sources:
  catalog_dir: data/song_data
  log_dir: data/log_data

resolver:
  strategy: query
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/playlog/test.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.catalog_dir(), Some(PathBuf::from("data/song_data")));
        assert_eq!(config.log_dir(), Some(PathBuf::from("data/log_data")));
        assert_eq!(config.sources.pattern, "*.json");
        assert_eq!(config.pipeline_options().resolver, ResolverStrategy::Query);
    }
}
