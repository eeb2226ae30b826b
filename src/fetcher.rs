use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::config::FetchConfig;
use crate::progress::{FetchEvent, FetchObserver};
use crate::tile_server::{Transport, STATUS_OK, STATUS_TOO_MANY_REQUESTS};
use crate::tiles::TileCoordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Saved,
    NotFound,
    GaveUp,
}

/// Fetches one tile into `output_dir`, retrying rate limits and transport
/// failures with a fixed delay. Never fails: every problem ends up as a
/// [`FetchOutcome`] so the caller can keep walking the grid.
#[instrument(skip(transport, coord, output_dir, config, observer), fields(tile = %coord))]
pub async fn fetch<T, O>(
    transport: &T,
    coord: TileCoordinate,
    output_dir: &Path,
    config: &FetchConfig,
    observer: &mut O,
) -> FetchOutcome
where
    T: Transport,
    O: FetchObserver + ?Sized,
{
    let url = coord.url(&config.url_template);
    let path = output_dir.join(coord.file_name());
    let mut attempt = 0;

    while attempt < config.max_retries {
        observer.on_event(&FetchEvent::AttemptStarted {
            coord,
            attempt: attempt + 1,
            url: url.clone(),
        });
        match transport.get(&url, config.request_timeout).await {
            Ok(res) if res.status == STATUS_OK => {
                return match save_tile(&path, &res.body) {
                    Ok(()) => {
                        observer.on_event(&FetchEvent::TileSaved {
                            coord,
                            path,
                            bytes: res.body.len(),
                        });
                        FetchOutcome::Saved
                    }
                    Err(err) => {
                        observer.on_event(&FetchEvent::WriteFailed {
                            coord,
                            path,
                            error: err.to_string(),
                        });
                        observer.on_event(&FetchEvent::GaveUp {
                            coord,
                            attempts: attempt + 1,
                        });
                        FetchOutcome::GaveUp
                    }
                };
            }
            Ok(res) if res.status == STATUS_TOO_MANY_REQUESTS => {
                attempt += 1;
                observer.on_event(&FetchEvent::RateLimitedRetry {
                    coord,
                    attempt,
                    max_retries: config.max_retries,
                });
            }
            Ok(res) => {
                observer.on_event(&FetchEvent::TileMissed {
                    coord,
                    status: res.status,
                });
                return FetchOutcome::NotFound;
            }
            Err(error) => {
                attempt += 1;
                observer.on_event(&FetchEvent::TransportFailed {
                    coord,
                    attempt,
                    max_retries: config.max_retries,
                    error,
                });
            }
        }

        if attempt < config.max_retries {
            debug!(duration = ?config.retry_delay, "sleeping before retry");
            sleep(config.retry_delay).await;
        }
    }

    observer.on_event(&FetchEvent::GaveUp {
        coord,
        attempts: attempt,
    });
    FetchOutcome::GaveUp
}

fn save_tile(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let result = File::create(path).and_then(|mut out| {
        out.write_all(bytes)?;
        out.flush()
    });
    if result.is_err() && path.is_file() {
        // don't leave a truncated tile behind
        let _ = fs::remove_file(path);
    }
    result
}
