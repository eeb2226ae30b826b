use anyhow::Result;
use argh::FromArgs;
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod fetcher;
mod index;
mod progress;
mod run;
mod tile_server;
mod tiles;

use commands::{fetch_tiles, list_runs, reindex};
use config::{
    default_index_path, seconds, FetchConfig, RunConfig, DEFAULT_BOUNDS,
    DEFAULT_INTER_TILE_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT_ROOT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_DELAY, DEFAULT_URL_TEMPLATE,
};
use tiles::TileBounds;

#[derive(FromArgs)]
/// Snapshots a rectangle of map tiles into timestamped directories and keeps an index of every run.
struct Args {
    /// directory for the rolling log files (default: logs)
    #[argh(option, default = "String::from(\"logs\")")]
    log_dir: String,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Fetch(FetchArgs),
    Reindex(ReindexArgs),
    Runs(RunsArgs),
}

#[derive(FromArgs)]
/// download every tile in the rectangle into a new run directory and index it
#[argh(subcommand, name = "fetch")]
struct FetchArgs {
    /// first tile column (inclusive)
    #[argh(option, default = "DEFAULT_BOUNDS.x_min")]
    x_min: u32,

    /// last tile column (inclusive)
    #[argh(option, default = "DEFAULT_BOUNDS.x_max")]
    x_max: u32,

    /// first tile row (inclusive)
    #[argh(option, default = "DEFAULT_BOUNDS.y_min")]
    y_min: u32,

    /// last tile row (inclusive)
    #[argh(option, default = "DEFAULT_BOUNDS.y_max")]
    y_max: u32,

    /// tile url template with x and y placeholders (env: TILE_URL_TEMPLATE)
    #[argh(option)]
    url_template: Option<String>,

    /// directory holding the run directories and index.json (env: TILE_OUTPUT_ROOT, default: tiles)
    #[argh(option)]
    output_root: Option<String>,

    /// index file (default: <output-root>/index.json)
    #[argh(option)]
    index: Option<String>,

    /// attempts per tile before giving up on rate limits or network errors
    #[argh(option, default = "DEFAULT_MAX_RETRIES")]
    max_retries: u32,

    /// seconds to wait before retrying a tile
    #[argh(option, default = "DEFAULT_RETRY_DELAY.as_secs_f64()")]
    retry_delay: f64,

    /// seconds before a tile request times out
    #[argh(option, default = "DEFAULT_REQUEST_TIMEOUT.as_secs_f64()")]
    request_timeout: f64,

    /// seconds to wait between tiles
    #[argh(option, default = "DEFAULT_INTER_TILE_DELAY.as_secs_f64()")]
    inter_tile_delay: f64,
}

#[derive(FromArgs)]
/// rebuild the index entry of an existing run from the files in its directory
#[argh(subcommand, name = "reindex")]
struct ReindexArgs {
    /// run timestamp, e.g. 2025-08-02_09-05-07
    #[argh(positional)]
    timestamp: String,

    /// directory holding the run directories (env: TILE_OUTPUT_ROOT, default: tiles)
    #[argh(option)]
    output_root: Option<String>,

    /// index file (default: <output-root>/index.json)
    #[argh(option)]
    index: Option<String>,
}

#[derive(FromArgs)]
/// list the runs recorded in the index, or the tiles of one run
#[argh(subcommand, name = "runs")]
struct RunsArgs {
    /// run timestamp whose tile files to list
    #[argh(positional)]
    timestamp: Option<String>,

    /// directory holding index.json (env: TILE_OUTPUT_ROOT, default: tiles)
    #[argh(option)]
    output_root: Option<String>,

    /// index file (default: <output-root>/index.json)
    #[argh(option)]
    index: Option<String>,
}

fn resolve_paths(output_root: Option<String>, index: Option<String>) -> (PathBuf, PathBuf) {
    let output_root = PathBuf::from(
        output_root
            .or_else(|| env::var("TILE_OUTPUT_ROOT").ok())
            .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.to_string()),
    );
    let index_path = index
        .map(PathBuf::from)
        .unwrap_or_else(|| default_index_path(&output_root));
    (output_root, index_path)
}

impl FetchArgs {
    fn into_run_config(self) -> Result<RunConfig> {
        let fetch = FetchConfig {
            url_template: self
                .url_template
                .or_else(|| env::var("TILE_URL_TEMPLATE").ok())
                .unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string()),
            max_retries: self.max_retries,
            retry_delay: seconds("retry delay", self.retry_delay)?,
            request_timeout: seconds("request timeout", self.request_timeout)?,
            inter_tile_delay: seconds("inter-tile delay", self.inter_tile_delay)?,
        };
        let bounds = TileBounds::new(self.x_min, self.x_max, self.y_min, self.y_max);
        let (output_root, index_path) = resolve_paths(self.output_root, self.index);
        Ok(RunConfig {
            index_path,
            ..RunConfig::new(bounds, output_root, fetch)
        })
    }
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result<()> {
    dotenv().ok();
    let args: Args = argh::from_env();

    let file_appender = tracing_appender::rolling::daily(&args.log_dir, "tile-archiver.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    match args.command {
        Command::Fetch(fetch_args) => {
            let config = fetch_args.into_run_config()?;
            fetch_tiles(&config).await?;
        }
        Command::Reindex(reindex_args) => {
            let (output_root, index_path) =
                resolve_paths(reindex_args.output_root, reindex_args.index);
            reindex(&output_root, &index_path, &reindex_args.timestamp)?;
        }
        Command::Runs(runs_args) => {
            let (_, index_path) = resolve_paths(runs_args.output_root, runs_args.index);
            list_runs(&index_path, runs_args.timestamp.as_deref(), &mut std::io::stdout())?;
        }
    }

    Ok(())
}
