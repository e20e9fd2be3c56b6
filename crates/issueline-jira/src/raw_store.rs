//! Durable raw page files — the boundary between the two pipeline stages.
//!
//! One JSON file per (project, page), written via tmp → rename so a
//! partial page is never visible and a re-fetch overwrites idempotently.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

/// On-disk shape of one raw page (current format).
#[derive(Debug, Serialize)]
struct RawPage<'a> {
    project: &'a str,
    page: u64,
    fetched_at: String,
    total: u64,
    count: usize,
    issues: &'a [Value],
}

/// Directory-backed store of raw page files.
#[derive(Debug, Clone)]
pub struct RawStore {
    dir: PathBuf,
}

impl RawStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for one (project, page) file. Zero-padded so lexical and
    /// numeric order agree.
    pub fn page_path(&self, project: &str, page: u64) -> PathBuf {
        self.dir.join(format!("{project}_page_{page:05}.json"))
    }

    /// Persist one fetched page, replacing any prior file for the same
    /// (project, page). Failure here is fatal to the ingestion run.
    pub fn store_page(
        &self,
        project: &str,
        page: u64,
        total: u64,
        records: &[Value],
    ) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create {}", self.dir.display()))?;
        let raw = RawPage {
            project,
            page,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            total,
            count: records.len(),
            issues: records,
        };
        let content = serde_json::to_string_pretty(&raw).context("Cannot encode raw page")?;
        let final_path = self.page_path(project, page);
        let tmp_path = final_path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Cannot write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Cannot rename into {}", final_path.display()))?;
        Ok(())
    }

    /// All stored pages for `project`, ascending by page index.
    ///
    /// The index is parsed from the file name, so legacy unpadded names
    /// still sort numerically. A missing directory yields no pages.
    pub fn list_pages(&self, project: &str) -> anyhow::Result<Vec<(u64, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", self.dir.display()));
            }
        };
        let prefix = format!("{project}_page_");
        let mut pages: Vec<(u64, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let index: u64 = name.strip_prefix(&prefix)?.strip_suffix(".json")?.parse().ok()?;
                Some((index, path))
            })
            .collect();
        pages.sort_by_key(|(index, _)| *index);
        Ok(pages)
    }

    /// Read the records out of one page file.
    ///
    /// Accepts both the current wrapped shape and the legacy shape where
    /// the file is literally a list of records.
    pub fn load_records(&self, path: &Path) -> anyhow::Result<Vec<Value>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        let records = match value {
            Value::Array(records) => records,
            Value::Object(mut map) => match map.remove("issues") {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(key: &str) -> Value {
        json!({"key": key, "fields": {"summary": "s"}})
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        store
            .store_page("SPARK", 0, 3, &[record("SPARK-1"), record("SPARK-2")])
            .unwrap();

        let pages = store.list_pages("SPARK").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].0, 0);
        let records = store.load_records(&pages[0].1).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["key"], "SPARK-1");
    }

    #[test]
    fn restore_overwrites_idempotently() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        store.store_page("SPARK", 0, 5, &[record("SPARK-1")]).unwrap();
        store
            .store_page("SPARK", 0, 5, &[record("SPARK-1"), record("SPARK-2")])
            .unwrap();

        let pages = store.list_pages("SPARK").unwrap();
        assert_eq!(pages.len(), 1);
        let records = store.load_records(&pages[0].1).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn list_pages_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        for page in [10, 2, 0, 1] {
            store.store_page("SPARK", page, 0, &[]).unwrap();
        }
        let indices: Vec<u64> = store
            .list_pages("SPARK")
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 10]);
    }

    #[test]
    fn list_pages_accepts_legacy_unpadded_names() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        fs::write(dir.path().join("SPARK_page_10.json"), "[]").unwrap();
        fs::write(dir.path().join("SPARK_page_2.json"), "[]").unwrap();
        let indices: Vec<u64> = store
            .list_pages("SPARK")
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![2, 10]);
    }

    #[test]
    fn list_pages_filters_by_project() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        store.store_page("SPARK", 0, 0, &[]).unwrap();
        store.store_page("HADOOP", 0, 0, &[]).unwrap();
        assert_eq!(store.list_pages("SPARK").unwrap().len(), 1);
    }

    #[test]
    fn list_pages_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path().join("nope"));
        assert!(store.list_pages("SPARK").unwrap().is_empty());
    }

    #[test]
    fn load_records_legacy_bare_array() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        let path = dir.path().join("SPARK_page_0.json");
        fs::write(&path, r#"[{"key":"SPARK-1"},{"key":"SPARK-2"}]"#).unwrap();
        let records = store.load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn load_records_wrapped_without_issues_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        let path = dir.path().join("SPARK_page_0.json");
        fs::write(&path, r#"{"total": 0}"#).unwrap();
        assert!(store.load_records(&path).unwrap().is_empty());
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = RawStore::new(dir.path());
        store.store_page("SPARK", 0, 0, &[]).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
