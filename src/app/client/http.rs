//! Core HTTP operations against the update service
//!
//! The service exposes two endpoints that share the same query shape
//! (`key` and `os`), so URL construction lives here next to the request
//! helper. Requests are never retried: a failure is reported to the caller,
//! which decides whether the run stops.

use std::time::Duration;

use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::constants::service;

/// Service coordinates shared by every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base_url: Url,
    api_key: String,
    os_key: String,
}

impl ServiceEndpoint {
    /// Create an endpoint description
    ///
    /// A missing trailing slash on `base_url` is added so relative endpoint
    /// paths resolve underneath it rather than replacing its last segment.
    pub fn new(base_url: &str, api_key: &str, os_key: &str) -> Result<Self, url::ParseError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Ok(Self {
            base_url: Url::parse(&normalized)?,
            api_key: api_key.to_string(),
            os_key: os_key.to_string(),
        })
    }

    /// Base URL of the service
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Platform key sent with every request
    pub fn os_key(&self) -> &str {
        &self.os_key
    }

    /// `{base}api/list?key=…&os=…`
    pub fn list_url(&self) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join(service::LIST_PATH)?;
        url.query_pairs_mut()
            .append_pair(service::KEY_PARAM, &self.api_key)
            .append_pair(service::OS_PARAM, &self.os_key);
        Ok(url)
    }

    /// `{base}api/download?item=…&key=…&os=…`
    pub fn download_url(&self, item: &str) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join(service::DOWNLOAD_PATH)?;
        url.query_pairs_mut()
            .append_pair(service::ITEM_PARAM, item)
            .append_pair(service::KEY_PARAM, &self.api_key)
            .append_pair(service::OS_PARAM, &self.os_key);
        Ok(url)
    }
}

/// HTTP operations handler
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Issue a GET and return the response with its body still unread
    ///
    /// The status is not checked here; each caller maps statuses onto its own
    /// error type. `timeout` bounds the whole exchange when given.
    pub async fn get(&self, url: &Url, timeout: Option<Duration>) -> reqwest::Result<Response> {
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        debug!("GET {} -> {}", redact(url), response.status());
        Ok(response)
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Render a URL for logs without its API key
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == service::KEY_PARAM {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    if pairs.is_empty() {
        return shown.to_string();
    }

    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
