//! Runtime configuration for the ingestion pipeline.
//!
//! Built by the CLI from file config plus flag overrides and passed in
//! explicitly; the pipeline holds no process-wide settings.

use std::path::PathBuf;
use std::time::Duration;

use issueline_core::UnclassifiedPolicy;

/// Default Apache JIRA REST endpoint (v2 search API).
pub const DEFAULT_BASE_URL: &str = "https://issues.apache.org/jira/rest/api/2";

/// Runtime configuration for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project keys to ingest, in order
    pub projects: Vec<String>,
    /// REST API base URL
    pub base_url: String,
    /// Optional bearer token for authenticated instances
    pub api_token: Option<String>,
    /// Records per page (`maxResults`)
    pub page_size: u64,
    /// Low-level retry attempts per fetch, and the paced-retry cap per page
    pub retry_count: u32,
    /// Base delay: inter-page pacing and the unit for backoff multiples
    pub base_delay: Duration,
    /// Directory for raw page files
    pub raw_dir: PathBuf,
    /// Directory for normalized JSONL output
    pub final_dir: PathBuf,
    /// Checkpoint document path
    pub checkpoint_path: PathBuf,
    /// What to do with unclassified fetch failures
    pub on_unclassified: UnclassifiedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            page_size: 50,
            retry_count: 5,
            base_delay: Duration::from_secs(2),
            raw_dir: PathBuf::from("./data/raw"),
            final_dir: PathBuf::from("./data/final"),
            checkpoint_path: PathBuf::from("./progress.json"),
            on_unclassified: UnclassifiedPolicy::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.retry_count, 5);
        assert_eq!(config.base_delay, Duration::from_secs(2));
        assert_eq!(config.raw_dir, PathBuf::from("./data/raw"));
        assert_eq!(config.checkpoint_path, PathBuf::from("./progress.json"));
        assert_eq!(config.on_unclassified, UnclassifiedPolicy::Skip);
        assert!(config.api_token.is_none());
    }
}
