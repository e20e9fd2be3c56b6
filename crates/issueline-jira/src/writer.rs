//! Transform stage: raw page files → one JSONL stream per project.
//!
//! Runs after (and decoupled from) ingestion; the raw files are the only
//! contract between the stages, so either side can be retried alone.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use anyhow::Context;

use crate::config::Config;
use crate::raw_store::RawStore;
use crate::transform::normalize;

/// Normalize all stored pages of one project into
/// `<final_dir>/<PROJECT>_issues.jsonl`, one record per line.
///
/// Returns the number of records written. Zero stored pages is a warning,
/// not an error; a page file that does not parse is skipped.
pub fn transform_project(config: &Config, project: &str) -> anyhow::Result<u64> {
    let raw = RawStore::new(&config.raw_dir);
    let pages = raw.list_pages(project)?;
    if pages.is_empty() {
        log::warn!("{project}: no raw pages found, nothing to transform");
        return Ok(0);
    }

    fs::create_dir_all(&config.final_dir)
        .with_context(|| format!("Cannot create {}", config.final_dir.display()))?;
    let final_path = config.final_dir.join(format!("{project}_issues.jsonl"));
    let tmp_path = final_path.with_extension("jsonl.tmp");
    let mut out = BufWriter::new(
        File::create(&tmp_path).with_context(|| format!("Cannot create {}", tmp_path.display()))?,
    );

    let mut written = 0u64;
    let mut dropped = 0u64;
    for (index, path) in &pages {
        let records = match raw.load_records(path) {
            Ok(records) => records,
            Err(e) => {
                log::error!("{project} page {index}: {e:#}, skipping file");
                continue;
            }
        };
        for record in &records {
            let Some(normalized) = normalize(record) else {
                dropped += 1;
                log::debug!(
                    "{project} page {index}: dropping invalid record {}",
                    record["key"].as_str().unwrap_or("<no key>")
                );
                continue;
            };
            let line = serde_json::to_string(&normalized).context("Cannot encode record")?;
            writeln!(out, "{line}").with_context(|| format!("Cannot write {}", tmp_path.display()))?;
            written += 1;
        }
    }

    let file = out
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Cannot flush {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Cannot sync {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("Cannot rename into {}", final_path.display()))?;

    if dropped > 0 {
        log::warn!("{project}: dropped {dropped} invalid records");
    }
    let size = fs::metadata(&final_path).map(|m| m.len()).unwrap_or(0);
    log::info!(
        "{project}: wrote {written} records to {} ({})",
        final_path.display(),
        format_size(size)
    );
    Ok(written)
}

/// Human-readable file size for the completion log line.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
