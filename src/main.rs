// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Boxwise replay runner.
//!
//! Replays a scripted annotation session against an in-memory list store
//! and prints the resulting report as JSON, or writes it with `--out`.

use anyhow::{Context, Result};
use boxwise::io::serialization;
use boxwise::replay::{self, ReplayScript};
use boxwise::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "boxwise", version, about = "Replay a scripted bounding-box annotation session")]
struct Cli {
    /// Replay script (.yaml, .yml or .json)
    script: PathBuf,

    /// Session config (.yaml, .yml or .json)
    config: Option<PathBuf>,

    /// Write the report here instead of stdout; format follows the extension
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging; RUST_LOG wins over the config file.
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let script: ReplayScript = serialization::import_any(&cli.script)
        .with_context(|| format!("Failed to read script {}", cli.script.display()))?;
    log::info!(
        "Replaying {} action(s) on list '{}'",
        script.actions.len(),
        script.list.name
    );

    let report = match replay::run(script, config).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("{:#}", e);
            return Err(e);
        }
    };

    match &cli.out {
        Some(path) => {
            serialization::export_any(&report, path)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
