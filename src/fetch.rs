//! Bounded remote-URL fetching.
//!
//! A request may name a remote image instead of uploading one. The fetch
//! is deliberately hostile to abuse: a short total timeout, a hard byte
//! ceiling on the body, and no redirect following at all - following
//! redirects would let the service be used as an open redirect or SSRF
//! relay, so a redirect answer is a hard failure.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tracing::debug;

use crate::error::FetchError;

/// Default total timeout for one remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Remote Fetcher
// =============================================================================

/// HTTP client wrapper enforcing the fetch policy.
pub struct RemoteFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl RemoteFetcher {
    /// Create a fetcher capping bodies at `max_bytes` with the given
    /// total timeout.
    pub fn new(max_bytes: usize, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| FetchError::Request(err.to_string()))?;
        Ok(Self { client, max_bytes })
    }

    /// Fetch `url` and return the body bytes.
    ///
    /// Fails on any redirect status, any non-success status, network or
    /// timeout errors, and bodies larger than the configured ceiling.
    /// The ceiling is enforced while streaming, so an oversized body is
    /// abandoned as soon as it crosses the limit.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;

        let status = response.status();
        if status.is_redirection() {
            return Err(FetchError::RedirectRefused);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| FetchError::Request(err.to_string()))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    max: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "remote fetch complete");
        Ok(Bytes::from(body))
    }
}

// =============================================================================
// Tests
// =============================================================================
