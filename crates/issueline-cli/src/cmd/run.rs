//! Run subcommand — full pipeline: ingest, then transform.

use std::time::Instant;

use anyhow::Result;
use clap::Args;

use issueline_core::{SharedProgress, is_shutdown_requested};

use super::PipelineArgs;
use crate::config::FileConfig;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn run(args: RunArgs, file: FileConfig, progress: &SharedProgress) -> Result<u8> {
    let config = file.into_runtime(&args.pipeline);
    let started = Instant::now();

    let fetch_code = super::fetch::ingest(&config, progress)?;
    if is_shutdown_requested() {
        log::warn!("Interrupted by signal; skipping transform");
        return Ok(0);
    }

    // Transform whatever was persisted, even after a partial fetch —
    // the stages are decoupled by the raw files.
    let transform_code = super::transform::transform(&config, progress)?;

    let minutes = started.elapsed().as_secs_f64() / 60.0;
    log::info!("Pipeline finished in {minutes:.2} minutes");

    Ok(fetch_code.max(transform_code))
}
