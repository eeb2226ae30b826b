use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::tile_server::TransportError;
use crate::tiles::TileCoordinate;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    RunStarted {
        output_dir: PathBuf,
        tiles: u64,
    },
    AttemptStarted {
        coord: TileCoordinate,
        attempt: u32,
        url: String,
    },
    TileSaved {
        coord: TileCoordinate,
        path: PathBuf,
        bytes: usize,
    },
    TileMissed {
        coord: TileCoordinate,
        status: u16,
    },
    RateLimitedRetry {
        coord: TileCoordinate,
        attempt: u32,
        max_retries: u32,
    },
    TransportFailed {
        coord: TileCoordinate,
        attempt: u32,
        max_retries: u32,
        error: TransportError,
    },
    WriteFailed {
        coord: TileCoordinate,
        path: PathBuf,
        error: String,
    },
    GaveUp {
        coord: TileCoordinate,
        attempts: u32,
    },
    IndexUpdated {
        index_path: PathBuf,
        run: String,
        files: usize,
    },
}

pub trait FetchObserver {
    fn on_event(&mut self, event: &FetchEvent);
}

/// Prints one progress line per event to stdout and mirrors it into the log.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl FetchObserver for ConsoleObserver {
    fn on_event(&mut self, event: &FetchEvent) {
        match event {
            FetchEvent::RunStarted { output_dir, tiles } => {
                info!(output_dir = %output_dir.display(), tiles, "starting run");
                println!("Saving tiles in: {}", output_dir.display());
            }
            FetchEvent::AttemptStarted { coord, attempt, url } => {
                debug!(%coord, attempt, %url, "requesting tile");
            }
            FetchEvent::TileSaved { coord, path, bytes } => {
                info!(%coord, path = %path.display(), bytes, "saved tile");
                println!("Downloaded tile {}", coord);
            }
            FetchEvent::TileMissed { coord, status } => {
                info!(%coord, status, "tile not found");
                println!("Tile {} not found (HTTP {})", coord, status);
            }
            FetchEvent::RateLimitedRetry {
                coord,
                attempt,
                max_retries,
            } => {
                warn!(%coord, attempt, max_retries, "rate limited");
                println!("Rate limited at {}, retry {}/{}", coord, attempt, max_retries);
            }
            FetchEvent::TransportFailed {
                coord,
                attempt,
                max_retries,
                error,
            } => {
                warn!(%coord, attempt, max_retries, error = %error, "error downloading tile");
                println!("Error downloading {}: {}", coord, error);
            }
            FetchEvent::WriteFailed { coord, path, error } => {
                warn!(%coord, path = %path.display(), error = %error, "failed to write tile");
                println!("Could not save tile {} to {}: {}", coord, path.display(), error);
            }
            FetchEvent::GaveUp { coord, attempts } => {
                warn!(%coord, attempts, "giving up on tile");
                println!("Giving up on tile {} after {} attempts", coord, attempts);
            }
            FetchEvent::IndexUpdated {
                index_path,
                run,
                files,
            } => {
                info!(index_path = %index_path.display(), %run, files, "updated index");
                println!("Updated {} with {} files for {}", index_path.display(), files, run);
            }
        }
    }
}

/// Keeps every event, in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<FetchEvent>,
}

#[cfg(test)]
impl FetchObserver for RecordingObserver {
    fn on_event(&mut self, event: &FetchEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
impl RecordingObserver {
    /// Rate-limit and transport-failure events, i.e. the attempts that were retried or gave up.
    pub fn failed_attempts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    FetchEvent::RateLimitedRetry { .. } | FetchEvent::TransportFailed { .. }
                )
            })
            .count()
    }
}
