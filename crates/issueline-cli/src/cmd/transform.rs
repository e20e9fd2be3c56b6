//! Transform subcommand — raw pages to normalized JSONL.

use anyhow::Result;
use clap::Args;

use issueline_core::SharedProgress;
use issueline_jira::{Config, transform_project};

use super::PipelineArgs;
use crate::config::FileConfig;

#[derive(Args, Debug)]
pub struct TransformArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn run(args: TransformArgs, file: FileConfig, progress: &SharedProgress) -> Result<u8> {
    let config = file.into_runtime(&args.pipeline);
    transform(&config, progress)
}

/// Run the transform stage for every configured project.
///
/// Returns the process exit code: 0 on success, 1 when any project
/// failed to transform.
pub fn transform(config: &Config, progress: &SharedProgress) -> Result<u8> {
    anyhow::ensure!(
        !config.projects.is_empty(),
        "No projects configured; set [fetch] projects in issueline.toml or pass --projects"
    );

    let mut failed = 0usize;
    let mut written = 0u64;
    for project in &config.projects {
        let pb = progress.stage_line(project);
        pb.set_message("transforming...");
        match transform_project(config, project) {
            Ok(count) => written += count,
            Err(e) => {
                log::error!("{project}: transform failed: {e:#}");
                failed += 1;
            }
        }
        pb.finish_and_clear();
    }

    log::info!("Transform complete: {written} records written");
    if failed > 0 {
        log::error!("{failed} project(s) failed to transform");
        return Ok(1);
    }
    Ok(0)
}
