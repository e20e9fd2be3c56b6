//! Subcommand implementations.

pub mod fetch;
pub mod run;
pub mod status;
pub mod transform;

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use issueline_core::UnclassifiedPolicy;

/// Flags shared by every pipeline subcommand; each one overrides the
/// matching config-file field.
#[derive(Args, Debug, Default, Clone)]
pub struct PipelineArgs {
    /// Project keys to process (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub projects: Option<Vec<String>>,

    /// REST API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Records per page
    #[arg(long)]
    pub page_size: Option<u64>,

    /// Retry attempts for transient failures
    #[arg(long)]
    pub retry_count: Option<u32>,

    /// Base delay in milliseconds (inter-page pacing and backoff unit)
    #[arg(long)]
    pub base_delay_ms: Option<u64>,

    /// Directory for raw page files
    #[arg(long)]
    pub raw_dir: Option<PathBuf>,

    /// Directory for normalized JSONL output
    #[arg(long)]
    pub final_dir: Option<PathBuf>,

    /// Reaction to unclassified fetch failures
    #[arg(long, value_enum)]
    pub on_unclassified: Option<PolicyArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Log the failure and advance past the page
    Skip,
    /// Stop the project so nothing is silently lost
    Abort,
}

impl From<PolicyArg> for UnclassifiedPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Skip => UnclassifiedPolicy::Skip,
            PolicyArg::Abort => UnclassifiedPolicy::Abort,
        }
    }
}
