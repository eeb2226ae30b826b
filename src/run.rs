use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{create_dir, create_dir_all};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::{debug, info, info_span};

use crate::config::RunConfig;
use crate::fetcher::{fetch, FetchOutcome};
use crate::index::update_index;
use crate::progress::{FetchEvent, FetchObserver};
use crate::tile_server::Transport;

pub static TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One execution: a timestamp and the directory named after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub timestamp: String,
    pub output_dir: PathBuf,
}

impl Run {
    pub fn new(output_root: &Path, started_at: DateTime<Local>) -> Self {
        let timestamp = started_at.format(TIMESTAMP_FORMAT).to_string();
        let output_dir = output_root.join(&timestamp);
        Run {
            timestamp,
            output_dir,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub timestamp: String,
    pub output_dir: PathBuf,
    pub saved: usize,
    pub not_found: usize,
    pub gave_up: usize,
    pub indexed: Vec<String>,
}

impl RunSummary {
    fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Saved => self.saved += 1,
            FetchOutcome::NotFound => self.not_found += 1,
            FetchOutcome::GaveUp => self.gave_up += 1,
        }
    }
}

/// Walks every tile in `config.bounds`, then folds the run directory into the index.
///
/// Individual tile failures never abort the run. Errors are only returned when
/// the run directory cannot be created (including when it already exists) or
/// the index cannot be updated.
pub async fn execute<T, O>(
    transport: &T,
    run: &Run,
    config: &RunConfig,
    observer: &mut O,
) -> Result<RunSummary>
where
    T: Transport,
    O: FetchObserver + ?Sized,
{
    let run_span = info_span!("run", timestamp = %run.timestamp);
    let _run_span = run_span.enter();

    create_dir_all(&config.output_root).with_context(|| {
        format!(
            "failed to create output root {}",
            config.output_root.display()
        )
    })?;
    // two runs started within the same second must not share a directory
    create_dir(&run.output_dir).map_err(|err| match err.kind() {
        ErrorKind::AlreadyExists => anyhow::anyhow!(
            "run directory {} already exists",
            run.output_dir.display()
        ),
        _ => anyhow::Error::new(err).context(format!(
            "failed to create run directory {}",
            run.output_dir.display()
        )),
    })?;
    observer.on_event(&FetchEvent::RunStarted {
        output_dir: run.output_dir.clone(),
        tiles: config.bounds.len(),
    });

    let mut summary = RunSummary {
        timestamp: run.timestamp.clone(),
        output_dir: run.output_dir.clone(),
        ..RunSummary::default()
    };
    for (i, coord) in config.bounds.coordinates().enumerate() {
        if i > 0 {
            debug!(duration = ?config.fetch.inter_tile_delay, "sleeping between tiles");
            sleep(config.fetch.inter_tile_delay).await;
        }
        let outcome = fetch(transport, coord, &run.output_dir, &config.fetch, observer).await;
        summary.record(outcome);
    }

    let indexed = update_index(&config.index_path, &run.timestamp, &run.output_dir)
        .with_context(|| format!("failed to update {}", config.index_path.display()))?;
    observer.on_event(&FetchEvent::IndexUpdated {
        index_path: config.index_path.clone(),
        run: run.timestamp.clone(),
        files: indexed.len(),
    });
    summary.indexed = indexed;

    info!(
        saved = summary.saved,
        not_found = summary.not_found,
        gave_up = summary.gave_up,
        "finished run"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::index::{Index, IndexError};
    use crate::progress::RecordingObserver;
    use crate::tile_server::testing::MapTransport;
    use crate::tile_server::TileResponse;
    use crate::tiles::TileBounds;
    use chrono::TimeZone;
    use std::fs;
    use std::time::Duration;
    use tokio::time::Instant;

    static TEMPLATE: &str = "http://tiles.test/files/s0/tiles/{x}/{y}.png";

    fn config(root: &Path, bounds: TileBounds) -> RunConfig {
        RunConfig::new(
            bounds,
            root,
            FetchConfig {
                url_template: TEMPLATE.to_string(),
                ..FetchConfig::default()
            },
        )
    }

    fn started_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 8, 2, 9, 5, 7).unwrap()
    }

    #[test]
    fn names_run_after_its_start_time() {
        let run = Run::new(Path::new("tiles"), started_at());
        assert_eq!(run.timestamp, "2025-08-02_09-05-07");
        assert_eq!(run.output_dir, Path::new("tiles").join("2025-08-02_09-05-07"));
    }

    #[tokio::test(start_paused = true)]
    async fn saves_hits_skips_misses_and_indexes_the_run() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), TileBounds::new(0, 1, 0, 0));
        let run = Run::new(root.path(), started_at());
        let transport = MapTransport::default().route(
            "http://tiles.test/files/s0/tiles/0/0.png",
            TileResponse {
                status: 200,
                body: b"tile 0,0".to_vec(),
            },
        );
        let mut observer = RecordingObserver::default();

        let summary = execute(&transport, &run, &config, &mut observer)
            .await
            .unwrap();

        let files: Vec<_> = fs::read_dir(&run.output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["0_0.png"]);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.gave_up, 0);
        assert_eq!(summary.indexed, vec!["0_0.png"]);

        let index = Index::load(&config.index_path).unwrap();
        assert_eq!(
            index.files("2025-08-02_09-05-07"),
            Some(&["0_0.png".to_string()][..])
        );
        assert!(matches!(
            observer.events.first(),
            Some(FetchEvent::RunStarted { tiles: 2, .. })
        ));
        assert!(matches!(
            observer.events.last(),
            Some(FetchEvent::IndexUpdated { files: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_tiles_in_row_major_order_with_pauses_between() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), TileBounds::new(7, 8, 3, 4));
        let run = Run::new(root.path(), started_at());
        let transport = MapTransport::default();
        let mut observer = RecordingObserver::default();
        let started = Instant::now();

        let summary = execute(&transport, &run, &config, &mut observer)
            .await
            .unwrap();

        assert_eq!(
            *transport.requests.borrow(),
            vec![
                "http://tiles.test/files/s0/tiles/7/3.png",
                "http://tiles.test/files/s0/tiles/7/4.png",
                "http://tiles.test/files/s0/tiles/8/3.png",
                "http://tiles.test/files/s0/tiles/8/4.png",
            ]
        );
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        assert_eq!(summary.not_found, 4);
        assert!(summary.indexed.is_empty());
        // an empty run is still recorded
        assert_eq!(
            Index::load(&config.index_path)
                .unwrap()
                .files("2025-08-02_09-05-07"),
            Some(&[][..])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_index_fails_the_run_after_fetching() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), TileBounds::new(0, 0, 0, 0));
        fs::write(&config.index_path, "not json").unwrap();
        let run = Run::new(root.path(), started_at());
        let transport = MapTransport::default();
        let mut observer = RecordingObserver::default();

        let err = execute(&transport, &run, &config, &mut observer)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Corrupt { .. })
        ));
        assert_eq!(transport.requests.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_in_the_same_second_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), TileBounds::new(0, 0, 0, 0));
        let run = Run::new(root.path(), started_at());
        let first = MapTransport::default().route(
            "http://tiles.test/files/s0/tiles/0/0.png",
            TileResponse {
                status: 200,
                body: b"first".to_vec(),
            },
        );
        execute(&first, &run, &config, &mut RecordingObserver::default())
            .await
            .unwrap();

        let second = MapTransport::default();
        let err = execute(&second, &run, &config, &mut RecordingObserver::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert_eq!(second.requests.borrow().len(), 0);
        assert_eq!(fs::read(run.output_dir.join("0_0.png")).unwrap(), b"first");
        assert_eq!(
            Index::load(&config.index_path)
                .unwrap()
                .files("2025-08-02_09-05-07"),
            Some(&["0_0.png".to_string()][..])
        );
    }
}
