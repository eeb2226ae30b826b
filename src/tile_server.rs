use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

pub const STATUS_OK: u16 = 200;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Failure to get any HTTP response at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// One GET against the tile server. Requests are issued one at a time so
/// implementations need not be `Sync`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TileResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<TileResponse, TransportError> {
        let res = self.client.get(url).timeout(timeout).send().await?;
        let status = res.status().as_u16();
        debug!(status, "tile server responded");
        // Only successful bodies are kept; a failed read counts as a transport error.
        let body = if status == STATUS_OK {
            res.bytes().await?.to_vec()
        } else {
            Vec::new()
        };
        Ok(TileResponse { status, body })
    }
}
