//! Fetch subcommand — ingest raw pages for the configured projects.

use anyhow::Result;
use clap::Args;

use issueline_core::{SharedProgress, is_shutdown_requested};
use issueline_jira::{Config, JiraClient, ingest_all};

use super::PipelineArgs;
use crate::config::FileConfig;

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn run(args: FetchArgs, file: FileConfig, progress: &SharedProgress) -> Result<u8> {
    let config = file.into_runtime(&args.pipeline);
    ingest(&config, progress)
}

/// Run the ingestion stage for every configured project.
///
/// Returns the process exit code: 0 on success or graceful interrupt,
/// 1 when any project aborted.
pub fn ingest(config: &Config, progress: &SharedProgress) -> Result<u8> {
    anyhow::ensure!(
        !config.projects.is_empty(),
        "No projects configured; set [fetch] projects in issueline.toml or pass --projects"
    );
    log::info!(
        "Ingesting {} project(s): {} (page size {})",
        config.projects.len(),
        config.projects.join(", "),
        config.page_size
    );

    let client = JiraClient::new(config);
    let aborted = ingest_all(&client, config, progress);

    let interrupted = is_shutdown_requested();
    if interrupted {
        log::warn!("Interrupted by signal; progress is checkpointed for the next run");
    } else if aborted > 0 {
        log::error!("{aborted} project(s) aborted");
    }
    Ok(exit_code(interrupted, aborted))
}

/// A signal interrupt is a graceful stop: everything fetched so far is
/// checkpointed, so the process exits clean. Aborted projects exit 1.
fn exit_code(interrupted: bool, aborted: usize) -> u8 {
    if interrupted {
        0
    } else if aborted > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::exit_code;

    #[test]
    fn graceful_interrupt_exits_clean() {
        assert_eq!(exit_code(true, 0), 0);
        assert_eq!(exit_code(true, 2), 0);
    }

    #[test]
    fn aborted_projects_exit_nonzero() {
        assert_eq!(exit_code(false, 1), 1);
        assert_eq!(exit_code(false, 0), 0);
    }
}
