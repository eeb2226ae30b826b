use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, instrument};
use walkdir::WalkDir;

use crate::tiles::TILE_EXTENSION;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index at {path} is not valid JSON; fix or move it aside before indexing again")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize index")]
    Serialize(#[from] serde_json::Error),
}

/// Run timestamp → tile file names produced by that run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    runs: BTreeMap<String, Vec<String>>,
}

impl Index {
    /// Missing file is an empty index. Unparseable file is [`IndexError::Corrupt`].
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("no index yet, starting empty");
                return Ok(Index::default());
            }
            Err(source) => {
                return Err(IndexError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents).map_err(|source| IndexError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes pretty-printed JSON next to `path` and renames it into place.
    #[instrument(skip(self))]
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let io_err = |source: io::Error| IndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|err| io_err(err.error))?;
        info!(runs = self.runs.len(), "wrote index");
        Ok(())
    }

    pub fn insert(&mut self, run: impl Into<String>, files: Vec<String>) {
        self.runs.insert(run.into(), files);
    }

    pub fn files(&self, run: &str) -> Option<&[String]> {
        self.runs.get(run).map(Vec::as_slice)
    }

    /// Timestamps in ascending order, which is chronological for `YYYY-MM-DD_HH-MM-SS`.
    pub fn runs(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.runs
            .iter()
            .map(|(run, files)| (run.as_str(), files.as_slice()))
    }

    pub fn latest_run(&self) -> Option<&str> {
        self.runs.keys().next_back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Sorted names of the tile files directly inside `dir`.
pub fn list_tile_files(dir: &Path) -> Result<Vec<String>, IndexError> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| IndexError::Io {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(TILE_EXTENSION) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Replaces `run_timestamp`'s entry in the index at `index_path` with the tile
/// files currently in `run_output_dir`. Other runs are left as they were.
#[instrument]
pub fn update_index(
    index_path: &Path,
    run_timestamp: &str,
    run_output_dir: &Path,
) -> Result<Vec<String>, IndexError> {
    let mut index = Index::load(index_path)?;
    let files = list_tile_files(run_output_dir)?;
    info!(files = files.len(), "indexing run");
    index.insert(run_timestamp, files.clone());
    index.save(index_path)?;
    Ok(files)
}
