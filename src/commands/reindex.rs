use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use std::path::Path;

use crate::index::update_index;
use crate::progress::{ConsoleObserver, FetchEvent, FetchObserver};
use crate::run::TIMESTAMP_FORMAT;

/// Only names that `Run::new` could have produced are run directories.
fn is_run_timestamp(timestamp: &str) -> bool {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map(|parsed| parsed.format(TIMESTAMP_FORMAT).to_string() == timestamp)
        .unwrap_or(false)
}

/// Rebuilds the index entry of an existing run from what is on disk.
pub fn reindex(output_root: &Path, index_path: &Path, timestamp: &str) -> Result<()> {
    if !is_run_timestamp(timestamp) {
        return Err(anyhow!(
            "{:?} is not a run timestamp (expected YYYY-MM-DD_HH-MM-SS)",
            timestamp
        ));
    }
    let run_dir = output_root.join(timestamp);
    if !run_dir.is_dir() {
        return Err(anyhow!("no run directory at {}", run_dir.display()));
    }
    let files = update_index(index_path, timestamp, &run_dir)
        .with_context(|| format!("failed to update {}", index_path.display()))?;
    ConsoleObserver.on_event(&FetchEvent::IndexUpdated {
        index_path: index_path.to_path_buf(),
        run: timestamp.to_string(),
        files: files.len(),
    });
    Ok(())
}
