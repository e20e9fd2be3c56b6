//! Durable per-project ingestion checkpoints.
//!
//! One JSON document maps project key → last completed page. The whole
//! map is read, modified, and rewritten atomically on every save, so
//! entries for different projects never clobber each other.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Checkpoint entry for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_page: u64,
    pub saved_at: String,
}

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Last completed page for `project`, or `None` for a fresh start.
    ///
    /// A missing or unreadable checkpoint file is not fatal — ingestion
    /// starts over, which only costs re-fetching already stored pages.
    pub fn load(&self, project: &str) -> Option<u64> {
        let map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                if self.path.exists() {
                    log::error!("Failed to load checkpoints: {e:#}");
                }
                return None;
            }
        };
        let last_page = map.get(project).map(|c| c.last_page);
        if let Some(page) = last_page {
            log::info!("{project}: resuming after completed page {page}");
        }
        last_page
    }

    /// Record `page` as the last completed page for `project`.
    pub fn save(&self, project: &str, page: u64) -> anyhow::Result<()> {
        let mut map = self.read_map().unwrap_or_default();
        map.insert(
            project.to_string(),
            Checkpoint {
                last_page: page,
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        self.write_map(&map)?;
        log::debug!("Checkpoint saved: {project} page {page}");
        Ok(())
    }

    /// All checkpoints, keyed by project (for the status display).
    pub fn all(&self) -> anyhow::Result<BTreeMap<String, Checkpoint>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        self.read_map()
    }

    fn read_map(&self) -> anyhow::Result<BTreeMap<String, Checkpoint>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid checkpoint JSON in {}", self.path.display()))
    }

    fn write_map(&self, map: &BTreeMap<String, Checkpoint>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(map).context("Cannot encode checkpoints")?;
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, content).with_context(|| format!("Cannot write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Cannot rename into {}", self.path.display()))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
