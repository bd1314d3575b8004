//! Page fetching
//!
//! This module defines the two collaborators the crawler depends on:
//! - [`Fetcher`]: turns a URL into a [`Document`] or fails
//! - [`Document`]: yields the outbound links of a fetched page
//!
//! plus [`HttpFetcher`], the reqwest-backed implementation used by the
//! command-line tool.

use crate::config::HttpConfig;
use crate::crawler::parser::HtmlDocument;
use crate::TaskError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::io;
use std::time::Duration;

/// Downloads pages
///
/// A recognized failure (network, HTTP status, unreadable body) is reported
/// as [`TaskError::Io`]; anything else as [`TaskError::Unexpected`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>, TaskError>;
}

/// A downloaded page
#[async_trait]
pub trait Document: Send + Sync {
    /// Returns the absolute URLs the page links to
    async fn extract_links(&self) -> Result<Vec<String>, TaskError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Sends a GET request and reads the body
    ///
    /// | Condition | Error kind |
    /// |-----------|------------|
    /// | Timeout | `TimedOut` |
    /// | Connection failure | `ConnectionRefused` |
    /// | Non-2xx status | `Other`, status in the message |
    /// | Body read failure | `InvalidData` |
    ///
    /// Links of the returned document resolve against the final URL, after
    /// redirects.
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>, TaskError> {
        let response = self.client.get(url).send().await.map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("HTTP {} for {}", status.as_u16(), url),
            )
            .into());
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        tracing::debug!("Fetched {} ({} bytes)", final_url, body.len());
        Ok(Box::new(HtmlDocument::new(final_url, body)))
    }
}

/// Classifies a transport error
fn network_error(e: reqwest::Error) -> io::Error {
    let kind = if e.is_timeout() {
        io::ErrorKind::TimedOut
    } else if e.is_connect() {
        io::ErrorKind::ConnectionRefused
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, e)
}
