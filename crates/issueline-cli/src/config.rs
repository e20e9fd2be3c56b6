//! Configuration loading from TOML files.
//!
//! File settings provide the defaults; CLI flags override per field. The
//! result is one explicit [`issueline_jira::Config`] handed to the
//! pipeline — no process-wide mutable state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use issueline_core::UnclassifiedPolicy;

/// File-level configuration for issueline.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub api: ApiConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: issueline_jira::config::DEFAULT_BASE_URL.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub projects: Vec<String>,
    pub page_size: u64,
    pub retry_count: u32,
    pub base_delay_ms: u64,
    pub on_unclassified: UnclassifiedPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            page_size: 50,
            retry_count: 5,
            base_delay_ms: 2000,
            on_unclassified: UnclassifiedPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub raw_dir: PathBuf,
    pub final_dir: PathBuf,
    pub checkpoint_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("./data/raw"),
            final_dir: PathBuf::from("./data/final"),
            checkpoint_file: PathBuf::from("./progress.json"),
        }
    }
}

/// Deserialize a string that may contain an environment variable
/// reference like `${VAR}`.
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand `${VAR}` to the environment variable's value.
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl FileConfig {
    /// Load configuration from default locations.
    ///
    /// Search order:
    /// 1. `./issueline.toml` (current directory)
    /// 2. `~/.config/issueline/config.toml`
    ///
    /// If no config file is found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("issueline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "issueline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Assemble the runtime pipeline config, applying CLI overrides.
    pub fn into_runtime(self, overrides: &crate::cmd::PipelineArgs) -> issueline_jira::Config {
        issueline_jira::Config {
            projects: overrides
                .projects
                .clone()
                .unwrap_or(self.fetch.projects),
            base_url: overrides
                .base_url
                .clone()
                .unwrap_or(self.api.base_url),
            api_token: self.api.token,
            page_size: overrides.page_size.unwrap_or(self.fetch.page_size).max(1),
            retry_count: overrides.retry_count.unwrap_or(self.fetch.retry_count),
            base_delay: Duration::from_millis(
                overrides.base_delay_ms.unwrap_or(self.fetch.base_delay_ms),
            ),
            raw_dir: overrides.raw_dir.clone().unwrap_or(self.storage.raw_dir),
            final_dir: overrides.final_dir.clone().unwrap_or(self.storage.final_dir),
            checkpoint_path: self.storage.checkpoint_file,
            on_unclassified: overrides
                .on_unclassified
                .map(Into::into)
                .unwrap_or(self.fetch.on_unclassified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::PipelineArgs;

    #[test]
    fn default_config() {
        let config = FileConfig::default();
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(config.fetch.retry_count, 5);
        assert_eq!(config.fetch.base_delay_ms, 2000);
        assert_eq!(config.storage.raw_dir, PathBuf::from("./data/raw"));
        assert!(config.api.base_url.contains("issues.apache.org"));
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[api]
base_url = "https://jira.example.com/rest/api/2"

[fetch]
projects = ["SPARK", "KAFKA"]
page_size = 25
on_unclassified = "abort"

[storage]
raw_dir = "/tmp/raw"
"#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.fetch.projects, vec!["SPARK", "KAFKA"]);
        assert_eq!(config.fetch.page_size, 25);
        assert_eq!(config.fetch.on_unclassified, UnclassifiedPolicy::Abort);
        assert_eq!(config.storage.raw_dir, PathBuf::from("/tmp/raw"));
        // Unspecified sections keep their defaults
        assert_eq!(config.fetch.retry_count, 5);
        assert_eq!(config.storage.final_dir, PathBuf::from("./data/final"));
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn overrides_take_precedence() {
        let file = FileConfig::default();
        let overrides = PipelineArgs {
            projects: Some(vec!["HADOOP".to_string()]),
            page_size: Some(10),
            base_delay_ms: Some(0),
            ..PipelineArgs::default()
        };
        let runtime = file.into_runtime(&overrides);
        assert_eq!(runtime.projects, vec!["HADOOP"]);
        assert_eq!(runtime.page_size, 10);
        assert_eq!(runtime.base_delay, Duration::ZERO);
        // Untouched fields fall back to the file values
        assert_eq!(runtime.retry_count, 5);
    }

    #[test]
    fn page_size_is_clamped_to_at_least_one() {
        let runtime = FileConfig::default().into_runtime(&PipelineArgs {
            page_size: Some(0),
            ..PipelineArgs::default()
        });
        assert_eq!(runtime.page_size, 1);
    }
}
