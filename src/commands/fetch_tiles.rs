use anyhow::Result;
use chrono::Local;
use tracing::info;

use crate::config::RunConfig;
use crate::progress::ConsoleObserver;
use crate::run::{execute, Run};
use crate::tile_server::HttpTransport;

pub async fn fetch_tiles(config: &RunConfig) -> Result<()> {
    config.fetch.validate()?;
    let transport = HttpTransport::new()?;
    let run = Run::new(&config.output_root, Local::now());
    info!(bounds = %config.bounds, url_template = %config.fetch.url_template, "fetching tiles");

    let summary = execute(&transport, &run, config, &mut ConsoleObserver).await?;
    println!(
        "Run {} finished: {} saved, {} not found, {} gave up; {} files indexed from {}",
        summary.timestamp,
        summary.saved,
        summary.not_found,
        summary.gave_up,
        summary.indexed.len(),
        summary.output_dir.display()
    );
    Ok(())
}
