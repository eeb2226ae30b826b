use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::tiles::TileBounds;

pub static DEFAULT_URL_TEMPLATE: &str = "https://backend.wplace.live/files/s0/tiles/{x}/{y}.png";
pub static DEFAULT_OUTPUT_ROOT: &str = "tiles";
pub static INDEX_FILE_NAME: &str = "index.json";

pub const DEFAULT_BOUNDS: TileBounds = TileBounds {
    x_min: 1040,
    x_max: 1044,
    y_min: 728,
    y_max: 733,
};
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_INTER_TILE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite, non-negative number of seconds (got {value})")]
    InvalidSeconds { name: &'static str, value: f64 },
    #[error("url template {0:?} is missing the {{x}} or {{y}} placeholder")]
    UrlTemplate(String),
}

/// Knobs for a single tile fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub url_template: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    /// Paused by the run driver between tiles, never by the fetcher.
    pub inter_tile_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            inter_tile_delay: DEFAULT_INTER_TILE_DELAY,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url_template.contains("{x}") || !self.url_template.contains("{y}") {
            return Err(ConfigError::UrlTemplate(self.url_template.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub bounds: TileBounds,
    pub output_root: PathBuf,
    pub index_path: PathBuf,
    pub fetch: FetchConfig,
}

impl RunConfig {
    pub fn new(bounds: TileBounds, output_root: impl Into<PathBuf>, fetch: FetchConfig) -> Self {
        let output_root = output_root.into();
        let index_path = default_index_path(&output_root);
        RunConfig {
            bounds,
            output_root,
            index_path,
            fetch,
        }
    }
}

pub fn default_index_path(output_root: &Path) -> PathBuf {
    output_root.join(INDEX_FILE_NAME)
}

pub fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidSeconds { name, value });
    }
    Ok(Duration::from_secs_f64(value))
}
