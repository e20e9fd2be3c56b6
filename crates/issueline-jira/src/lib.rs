//! JIRA ingestion pipeline: checkpointed paged fetching plus a JSONL
//! transform stage, separated by durable raw page files.
//!
//! Stage one ([`runner`]) drives fetch → store → checkpoint per project
//! and survives interruption by resuming from the checkpoint. Stage two
//! ([`writer`]) reads whatever stage one persisted and streams one
//! normalized record per line.

pub mod api;
pub mod checkpoint;
pub mod config;
pub mod raw_store;
pub mod runner;
pub mod transform;
pub mod writer;

pub use api::{JiraClient, PageFetcher, PageResult};
pub use checkpoint::CheckpointStore;
pub use config::Config;
pub use raw_store::RawStore;
pub use runner::{IngestOutcome, ingest_all, ingest_project};
pub use transform::{NormalizedRecord, normalize};
pub use writer::transform_project;
