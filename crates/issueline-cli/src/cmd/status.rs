//! Status subcommand — per-project ingestion progress at a glance.

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use issueline_jira::{CheckpointStore, RawStore};

use super::PipelineArgs;
use crate::config::FileConfig;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn run(args: StatusArgs, file: FileConfig) -> Result<u8> {
    let config = file.into_runtime(&args.pipeline);
    let checkpoints = CheckpointStore::new(&config.checkpoint_path).all()?;
    let raw = RawStore::new(&config.raw_dir);

    // Configured projects first, then any leftover checkpoint entries
    let mut projects = config.projects.clone();
    for key in checkpoints.keys() {
        if !projects.contains(key) {
            projects.push(key.clone());
        }
    }
    if projects.is_empty() {
        eprintln!("No projects configured and no checkpoints found.");
        return Ok(0);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Project").fg(Color::Cyan),
            Cell::new("Last page").fg(Color::Cyan),
            Cell::new("Saved at").fg(Color::Cyan),
            Cell::new("Raw pages").fg(Color::Cyan),
            Cell::new("Output").fg(Color::Cyan),
        ]);

    for project in &projects {
        let (last_page, saved_at) = match checkpoints.get(project) {
            Some(c) => (c.last_page.to_string(), c.saved_at.clone()),
            None => ("-".to_string(), "-".to_string()),
        };
        let raw_pages = raw.list_pages(project)?.len().to_string();
        let output = config.final_dir.join(format!("{project}_issues.jsonl"));
        let output_state = if output.exists() { "written" } else { "-" };
        table.add_row(vec![
            Cell::new(project),
            Cell::new(last_page),
            Cell::new(saved_at),
            Cell::new(raw_pages),
            Cell::new(output_state),
        ]);
    }

    eprintln!("\n{table}");
    Ok(0)
}
