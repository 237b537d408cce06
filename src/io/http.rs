use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderName, RANGE};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use crate::config::Settings;
use crate::error::{Error, Result};

fn http_error(e: reqwest::Error) -> Error {
    Error::Http(e.to_string())
}

/// Inclusive byte range header value.
fn range_header(first: u64, last: u64) -> String {
    format!("bytes={first}-{last}")
}

/// A remote package read through HTTP Range requests.
///
/// Only the byte ranges a command asks for cross the network, which for
/// signature inspection is the archive tail plus the signature entry.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    len: u64,
    max_retries: u32,
    retry_delay: Duration,
    transferred_bytes: AtomicU64,
}

impl HttpRangeReader {
    /// Ask `url` with a HEAD request for its length and Range support.
    pub async fn new(url: String, settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(http_error)?;
        let len = content_length(&client, &url).await?;
        log::debug!("{url}: {len} bytes, Range requests supported");

        Ok(Self {
            client,
            url,
            len,
            max_retries: settings.http_max_retries,
            retry_delay: settings.http_retry_delay,
            transferred_bytes: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Payload bytes received so far, across all requests.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch `first..=last`, retrying timeouts and connection failures with
    /// a linearly growing delay. The server may return fewer bytes than
    /// asked for.
    async fn fetch_range(&self, first: u64, last: u64) -> Result<Vec<u8>> {
        let range = range_header(first, last);
        let mut attempt = 0;

        loop {
            let sent = self
                .client
                .get(&self.url)
                .header(RANGE, &range)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!("{range} of {}: retry {attempt}/{}: {e}", self.url, self.max_retries);
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    continue;
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    return Err(Error::Http(format!(
                        "giving up on {} after {} retries: {e}",
                        self.url, self.max_retries
                    )));
                }
                Err(e) => return Err(http_error(e)),
            };

            if response.status() != StatusCode::PARTIAL_CONTENT {
                return Err(Error::Http(format!(
                    "{range} of {} answered with {}",
                    self.url,
                    response.status()
                )));
            }

            let body = response.bytes().await.map_err(http_error)?;
            if body.is_empty() {
                return Err(Error::Http(format!("{range} of {} returned no data", self.url)));
            }
            return Ok(body.to_vec());
        }
    }
}

async fn content_length(client: &Client, url: &str) -> Result<u64> {
    let response = client.head(url).send().await.map_err(http_error)?;
    if !response.status().is_success() {
        return Err(Error::Http(format!(
            "HEAD {url} answered with {}",
            response.status()
        )));
    }

    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };

    if !header(ACCEPT_RANGES).is_some_and(|v| v.contains("bytes")) {
        return Err(Error::Http(format!("{url} does not support Range requests")));
    }

    header(CONTENT_LENGTH)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Http(format!("{url} did not return Content-Length")))
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.len {
            return Ok(0);
        }

        let last = (offset + buf.len() as u64 - 1).min(self.len - 1);
        let wanted = (last - offset + 1) as usize;
        let mut filled = 0;

        while filled < wanted {
            let chunk = self.fetch_range(offset + filled as u64, last).await?;
            let n = chunk.len().min(wanted - filled);
            buf[filled..filled + n].copy_from_slice(&chunk[..n]);
            filled += n;
            self.transferred_bytes.fetch_add(n as u64, Ordering::Relaxed);
        }

        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.len
    }
}
