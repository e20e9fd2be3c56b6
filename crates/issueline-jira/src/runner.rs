//! Ingestion runner: the fetch → store → checkpoint loop per project.
//!
//! Pages are fetched in strictly increasing order on a single thread of
//! control. The remote total is unknown until the first response, so the
//! loop keeps going until a reported total is reached, a failure class
//! demands an abort, or shutdown is requested.

use std::time::Duration;

use issueline_core::progress::set_page_total;
use issueline_core::retry::{PageAction, page_action};
use issueline_core::{SharedProgress, is_shutdown_requested};

use crate::api::PageFetcher;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::raw_store::RawStore;

/// How one project's ingestion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Reached the reported total; `pages`/`records` count this run only
    Completed { pages: u64, records: u64 },
    /// Unrecoverable fetch or store failure; checkpoint stays valid
    Aborted,
    /// Shutdown requested between pages
    Interrupted,
}

/// Ingest every configured project in order.
///
/// One project's failure is logged and does not stop the next; only an
/// interrupt stops the whole run. Returns the number of aborted projects.
pub fn ingest_all<F: PageFetcher>(
    fetcher: &F,
    config: &Config,
    progress: &SharedProgress,
) -> usize {
    let mut aborted = 0;
    for project in &config.projects {
        match ingest_project(fetcher, config, project, progress) {
            IngestOutcome::Completed { pages, records } => {
                log::info!("{project}: ingestion complete, {pages} pages / {records} records");
            }
            IngestOutcome::Aborted => {
                log::error!("{project}: ingestion aborted, resumable on next run");
                aborted += 1;
            }
            IngestOutcome::Interrupted => {
                log::warn!("Shutdown requested, stopping after {project}");
                break;
            }
        }
    }
    aborted
}

/// Run the fetch-store-checkpoint loop for one project to completion.
pub fn ingest_project<F: PageFetcher>(
    fetcher: &F,
    config: &Config,
    project: &str,
    progress: &SharedProgress,
) -> IngestOutcome {
    let checkpoints = CheckpointStore::new(&config.checkpoint_path);
    let raw = RawStore::new(&config.raw_dir);

    let mut page = checkpoints.load(project).map_or(0, |last| last + 1);
    // None until the first successful fetch reports the real total
    let mut total: Option<u64> = None;
    let mut pages_done = 0u64;
    let mut records_done = 0u64;
    let mut retries_this_page = 0u32;

    log::info!("{project}: starting ingestion at page {page}");
    let pb = progress.page_bar(project);
    pb.set_message("fetching...");

    loop {
        if is_shutdown_requested() {
            pb.finish_and_clear();
            return IngestOutcome::Interrupted;
        }

        let offset = page * config.page_size;
        if let Some(total) = total {
            if offset >= total {
                break;
            }
        }

        let result = match fetcher.fetch_page(project, offset, config.page_size) {
            Ok(result) => result,
            Err(e) => {
                match page_action(e.class(), config.base_delay, config.on_unclassified) {
                    PageAction::Abort => {
                        log::error!("{project} page {page}: {e}, aborting project");
                        pb.finish_and_clear();
                        return IngestOutcome::Aborted;
                    }
                    PageAction::Retry(delay) => {
                        retries_this_page += 1;
                        if retries_this_page > config.retry_count {
                            log::error!(
                                "{project} page {page}: still failing after {} paced retries \
                                 ({e}), aborting project",
                                config.retry_count
                            );
                            pb.finish_and_clear();
                            return IngestOutcome::Aborted;
                        }
                        log::warn!(
                            "{project} page {page}: {e}, retrying same offset in {delay:?} \
                             ({retries_this_page}/{})",
                            config.retry_count
                        );
                        sleep(delay);
                        continue;
                    }
                    PageAction::Skip => {
                        // Skipping is only bounded once a successful page
                        // has reported the real total; before that the
                        // loop would advance offsets forever.
                        if total.is_none() {
                            log::error!(
                                "{project} page {page}: {e} with no successful page yet, \
                                 aborting project"
                            );
                            pb.finish_and_clear();
                            return IngestOutcome::Aborted;
                        }
                        log::error!("{project} page {page}: {e}, skipping page");
                        page += 1;
                        retries_this_page = 0;
                        sleep(config.base_delay);
                        continue;
                    }
                }
            }
        };

        if total.is_none() {
            set_page_total(&pb, result.total.div_ceil(config.page_size.max(1)));
            pb.set_position(page);
        }
        total = Some(result.total);

        if offset >= result.total {
            // Resume probe landed past the end; nothing left to store
            break;
        }

        if let Err(e) = raw.store_page(project, page, result.total, &result.records) {
            // Checkpoint must not advance past data that is not on disk
            log::error!("{project} page {page}: store failed: {e:#}, aborting project");
            pb.finish_and_clear();
            return IngestOutcome::Aborted;
        }

        // Re-fetch after an unsaved checkpoint is wasteful but safe
        if let Err(e) = checkpoints.save(project, page) {
            log::error!("{project} page {page}: checkpoint save failed: {e:#}");
        }

        records_done += result.records.len() as u64;
        pages_done += 1;
        pb.inc(1);
        log::info!(
            "{project}: page {page} stored ({} records, {records_done} so far)",
            result.records.len()
        );

        page += 1;
        retries_this_page = 0;

        let more_to_fetch = total.is_some_and(|t| page * config.page_size < t);
        if more_to_fetch {
            sleep(config.base_delay);
        }
    }

    pb.finish_and_clear();
    IngestOutcome::Completed {
        pages: pages_done,
        records: records_done,
    }
}

fn sleep(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use issueline_core::http::FetchError;
    use issueline_core::{ProgressContext, UnclassifiedPolicy};

    use crate::api::PageResult;

    /// Scripted fetcher: pops one canned response per call and records
    /// the offsets it was asked for.
    struct ScriptedFetcher {
        responses: RefCell<VecDeque<Result<PageResult, FetchError>>>,
        offsets: RefCell<Vec<u64>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<PageResult, FetchError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                offsets: RefCell::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u64> {
            self.offsets.borrow().clone()
        }
    }

    impl PageFetcher for ScriptedFetcher {
        fn fetch_page(
            &self,
            _project: &str,
            offset: u64,
            _page_size: u64,
        ) -> Result<PageResult, FetchError> {
            self.offsets.borrow_mut().push(offset);
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("fetcher called more times than scripted")
        }
    }

    fn page(keys: &[&str], total: u64) -> Result<PageResult, FetchError> {
        Ok(PageResult {
            records: keys
                .iter()
                .map(|k| json!({"key": k, "fields": {"summary": "s"}}))
                .collect(),
            total,
        })
    }

    fn http_err(status: u16) -> Result<PageResult, FetchError> {
        Err(FetchError::Http {
            status: Some(status),
            message: "scripted".to_string(),
        })
    }

    fn test_config(dir: &Path) -> Config {
        Config {
            projects: vec!["SPARK".to_string()],
            page_size: 2,
            retry_count: 3,
            base_delay: Duration::ZERO,
            raw_dir: dir.join("raw"),
            final_dir: dir.join("final"),
            checkpoint_path: dir.join("progress.json"),
            ..Config::default()
        }
    }

    fn progress() -> SharedProgress {
        Arc::new(ProgressContext::new())
    }

    #[test]
    fn terminates_after_ceil_total_over_page_size_pages() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher = ScriptedFetcher::new(vec![
            page(&["SPARK-1", "SPARK-2"], 3),
            page(&["SPARK-3"], 3),
        ]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Completed { pages: 2, records: 3 });
        assert_eq!(fetcher.offsets(), vec![0, 2]);
        let raw = RawStore::new(&config.raw_dir);
        assert_eq!(raw.list_pages("SPARK").unwrap().len(), 2);
        let checkpoints = CheckpointStore::new(&config.checkpoint_path);
        assert_eq!(checkpoints.load("SPARK"), Some(1));
    }

    #[test]
    fn resumes_at_offset_after_last_completed_page() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        CheckpointStore::new(&config.checkpoint_path)
            .save("SPARK", 1)
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![page(&["SPARK-5"], 5)]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        // last completed page 1, page_size 2 → resume at offset 4
        assert_eq!(fetcher.offsets(), vec![4]);
        assert_eq!(outcome, IngestOutcome::Completed { pages: 1, records: 1 });
        assert_eq!(
            CheckpointStore::new(&config.checkpoint_path).load("SPARK"),
            Some(2)
        );
    }

    #[test]
    fn connectivity_failure_aborts_project() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::Connect {
            message: "connection refused".to_string(),
        })]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Aborted);
        let raw = RawStore::new(&config.raw_dir);
        assert!(raw.list_pages("SPARK").unwrap().is_empty());
    }

    #[test]
    fn rate_limit_retries_same_offset() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher =
            ScriptedFetcher::new(vec![http_err(429), page(&["SPARK-1", "SPARK-2"], 2)]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Completed { pages: 1, records: 2 });
        assert_eq!(fetcher.offsets(), vec![0, 0]);
    }

    #[test]
    fn server_errors_abort_after_paced_retry_cap() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        // retry_count = 3 → initial attempt plus 3 paced retries
        let fetcher = ScriptedFetcher::new(vec![
            http_err(503),
            http_err(503),
            http_err(503),
            http_err(503),
        ]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Aborted);
        assert_eq!(fetcher.offsets(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn unclassified_failure_skips_page_by_default() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher = ScriptedFetcher::new(vec![
            page(&["SPARK-1", "SPARK-2"], 6),
            http_err(404),
            page(&["SPARK-5", "SPARK-6"], 6),
        ]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        // page 1 skipped: fetched offsets advance past it
        assert_eq!(fetcher.offsets(), vec![0, 2, 4]);
        assert_eq!(outcome, IngestOutcome::Completed { pages: 2, records: 4 });
        let raw = RawStore::new(&config.raw_dir);
        let indices: Vec<u64> = raw
            .list_pages("SPARK")
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn unclassified_failure_with_unknown_total_aborts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        // A remote that never answers successfully (bad path, bad auth,
        // unknown project key) must not be skipped past forever.
        let fetcher = ScriptedFetcher::new(vec![http_err(404)]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Aborted);
        assert_eq!(fetcher.offsets(), vec![0]);
        let raw = RawStore::new(&config.raw_dir);
        assert!(raw.list_pages("SPARK").unwrap().is_empty());
    }

    #[test]
    fn unclassified_failure_aborts_under_strict_policy() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            on_unclassified: UnclassifiedPolicy::Abort,
            ..test_config(dir.path())
        };
        let fetcher = ScriptedFetcher::new(vec![http_err(404)]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Aborted);
        assert_eq!(fetcher.offsets(), vec![0]);
    }

    #[test]
    fn empty_project_completes_with_zero_pages() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher = ScriptedFetcher::new(vec![page(&[], 0)]);

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());

        assert_eq!(outcome, IngestOutcome::Completed { pages: 0, records: 0 });
        let raw = RawStore::new(&config.raw_dir);
        assert!(raw.list_pages("SPARK").unwrap().is_empty());
    }

    /// Raises the shutdown flag after every fetch, like a signal landing
    /// while a page is being stored.
    struct SignalingFetcher {
        inner: ScriptedFetcher,
    }

    impl PageFetcher for SignalingFetcher {
        fn fetch_page(
            &self,
            project: &str,
            offset: u64,
            page_size: u64,
        ) -> Result<PageResult, FetchError> {
            let result = self.inner.fetch_page(project, offset, page_size);
            issueline_core::request_shutdown();
            result
        }
    }

    #[test]
    fn shutdown_between_pages_interrupts_with_valid_checkpoint() {
        use std::sync::atomic::Ordering;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher = SignalingFetcher {
            inner: ScriptedFetcher::new(vec![page(&["SPARK-1", "SPARK-2"], 6)]),
        };

        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());
        // Clear the process-global flag before asserting so a failure
        // here cannot bleed into other tests.
        issueline_core::shutdown_flag().store(false, Ordering::Relaxed);

        assert_eq!(outcome, IngestOutcome::Interrupted);
        assert_eq!(fetcher.inner.offsets(), vec![0]);

        // The in-flight page was stored whole and checkpointed.
        let raw = RawStore::new(&config.raw_dir);
        let pages = raw.list_pages("SPARK").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(raw.load_records(&pages[0].1).unwrap().len(), 2);
        let checkpoints = CheckpointStore::new(&config.checkpoint_path);
        assert_eq!(checkpoints.load("SPARK"), Some(0));

        // A fresh run resumes from the checkpoint and finishes.
        let fetcher = ScriptedFetcher::new(vec![
            page(&["SPARK-3", "SPARK-4"], 6),
            page(&["SPARK-5", "SPARK-6"], 6),
        ]);
        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());
        assert_eq!(fetcher.offsets(), vec![2, 4]);
        assert_eq!(outcome, IngestOutcome::Completed { pages: 2, records: 4 });
    }

    #[test]
    fn rerun_after_completion_refetches_nothing_extra() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let fetcher = ScriptedFetcher::new(vec![page(&["SPARK-1"], 1)]);
        ingest_project(&fetcher, &config, "SPARK", &progress());

        // Fresh run resumes past the completed page; offset 2 ≥ total 1,
        // so one probe fetch reports an empty tail and the run completes
        // without writing anything new.
        let fetcher = ScriptedFetcher::new(vec![page(&[], 1)]);
        let outcome = ingest_project(&fetcher, &config, "SPARK", &progress());
        assert_eq!(fetcher.offsets(), vec![2]);
        assert_eq!(outcome, IngestOutcome::Completed { pages: 0, records: 0 });
        let raw = RawStore::new(&config.raw_dir);
        assert_eq!(raw.list_pages("SPARK").unwrap().len(), 1);
    }
}
