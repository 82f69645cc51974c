//! Where the raw sales table comes from.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A location the raw CSV bytes can be fetched from.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Human readable location, used in logs and error messages.
    fn location(&self) -> String;

    /// Fetch the complete, unfiltered table.
    async fn fetch(&self) -> Result<Vec<u8>>;
}

/// Remote table served over HTTP(S)
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl DataSource for HttpSource {
    fn location(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!("GET {}", self.url);
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(format!("{} returned {}", self.url, status)));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

/// Table stored on the local filesystem
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Fetch(format!("Failed to read {}: {}", self.path.display(), e)))
    }
}

/// Pick a source for a configured location.
///
/// `http`/`https` URLs are fetched over the network; `file://` URLs and
/// plain paths are read from disk.
pub fn source_from_location(location: &str, timeout: Duration) -> Result<Box<dyn DataSource>> {
    match Url::parse(location) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(Box::new(HttpSource::new(url, timeout)?)),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::Config(format!("Invalid file URL: {}", location)))?;
                Ok(Box::new(FileSource::new(path)))
            }
            scheme => Err(Error::Config(format!(
                "Unsupported source scheme '{}' in {}",
                scheme, location
            ))),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Box::new(FileSource::new(location))),
        Err(e) => Err(e.into()),
    }
}
