//! REST client for slide content

use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request for slide {slide} failed: {source}")]
    Request {
        slide: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Owned HTTP session that can be thrown away and rebuilt
#[derive(Debug)]
struct SessionHandle {
    client: Option<Client>,
    timeout: Option<Duration>,
    /// Number of clients built so far
    generation: u64,
}

impl SessionHandle {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            client: None,
            timeout,
            generation: 0,
        }
    }

    fn invalidate(&mut self) {
        if self.client.take().is_some() {
            debug!("HTTP session discarded");
        }
    }

    fn recreate(&mut self) -> Result<(), FetchError> {
        self.invalidate();
        self.client = Some(self.build()?);
        Ok(())
    }

    /// Current client, created on first use
    fn client(&mut self) -> Result<Client, FetchError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = self.build()?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn build(&mut self) -> Result<Client, FetchError> {
        // OpenSong lives on the local network, never go through a proxy
        let mut builder = Client::builder().no_proxy();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;
        self.generation += 1;
        debug!("HTTP session {} created", self.generation);
        Ok(client)
    }
}

/// Fetches slide documents from `{base}/presentation/slide/{id}`
#[derive(Debug)]
pub struct SlideFetcher {
    base_uri: String,
    session: SessionHandle,
}

impl SlideFetcher {
    /// Create a fetcher for the API at `base_uri` (e.g. `http://localhost:8082`)
    pub fn new(base_uri: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            session: SessionHandle::new(timeout),
        }
    }

    /// Fetch the raw XML for a slide.
    ///
    /// Any status other than 200 is logged and yields an empty string. The
    /// presentation may close while a request is in flight, so a rejected
    /// fetch is expected now and then. Transport failures are errors.
    pub async fn fetch_slide(&mut self, slide: u32) -> Result<String, FetchError> {
        let uri = format!("{}/presentation/slide/{}", self.base_uri, slide);
        let client = self.session.client()?;

        let response = client
            .get(&uri)
            .send()
            .await
            .map_err(|source| FetchError::Request { slide, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Request { slide, source })?;

        if status == StatusCode::OK {
            debug!("Fetched slide {} ({} bytes)", slide, body.len());
            return Ok(body);
        }

        info!("Received unexpected HTTP Status Code {}", status.as_u16());
        info!("{}", body);
        Ok(String::new())
    }

    /// Drop the current session and open a new one
    pub fn reset_connection(&mut self) -> Result<(), FetchError> {
        self.session.recreate()
    }

    /// Release the session; the next fetch opens a new one
    pub fn close(&mut self) {
        self.session.invalidate();
    }

    #[cfg(test)]
    pub(crate) fn has_session(&self) -> bool {
        self.session.client.is_some()
    }

    #[cfg(test)]
    pub(crate) fn session_generation(&self) -> u64 {
        self.session.generation
    }
}
