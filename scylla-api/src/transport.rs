//! HTTP transport used for discovery and invocation.
//!
//! The core only talks to the [`Transport`] trait. [`RestClient`] is the
//! production implementation on top of `reqwest::blocking`.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::Verb;

/// Failure reported by a transport. Opaque to the core: it is surfaced to
/// the user as is.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON response: {0}")]
    Decode(String),
}

/// A concrete request built by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub verb: Verb,
    pub host: String,
    pub port: u16,
    /// Path relative to the server root, without a leading slash.
    pub path: String,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network collaborator of the discovery loader and the dispatcher.
pub trait Transport {
    /// GET `path` and decode the body as JSON. Non-success statuses are
    /// errors.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`].
    fn fetch_json(&self, host: &str, port: u16, path: &str) -> Result<Value, TransportError>;

    /// Perform one request. A non-success status is still a response.
    ///
    /// # Errors
    ///
    /// [`TransportError::Request`] when no response could be obtained.
    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Connection settings for [`RestClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig<'a> {
    pub ssl: bool,
    pub conn_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub user_agent: &'a str,
}

impl<'a> ClientConfig<'a> {
    #[must_use]
    pub fn new(user_agent: &'a str) -> Self {
        Self {
            ssl: false,
            conn_timeout: None,
            request_timeout: None,
            user_agent,
        }
    }
}

/// Blocking REST client speaking to a single API server.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    scheme: &'static str,
}

impl RestClient {
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig<'_>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().user_agent(config.user_agent);
        if let Some(timeout) = config.conn_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            scheme: if config.ssl { "https" } else { "http" },
        })
    }

    #[must_use]
    pub fn build_url(&self, host: &str, port: u16, path: &str) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme,
            host,
            port,
            path.trim_start_matches('/')
        )
    }

    fn send(
        &self,
        verb: Verb,
        url: &str,
        query: &[(String, String)],
    ) -> Result<HttpResponse, TransportError> {
        let mut req = self.client.request(method_for(verb), url);
        if !query.is_empty() {
            req = req.query(query);
        }
        debug!("-> {} {} {:?}", verb, url, query);
        let started = Instant::now();
        let resp = req
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| TransportError::Request(format!("failed to read response body: {e}")))?;
        debug!(
            "<- {} {} ({} ms)",
            status,
            url,
            started.elapsed().as_millis()
        );
        Ok(HttpResponse { status, body })
    }
}

impl Transport for RestClient {
    fn fetch_json(&self, host: &str, port: u16, path: &str) -> Result<Value, TransportError> {
        let url = self.build_url(host, port, path);
        let resp = self.send(Verb::Get, &url, &[])?;
        if !resp.is_success() {
            return Err(TransportError::Status {
                status: resp.status,
                body: resp.body,
            });
        }
        serde_json::from_str(&resp.body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.build_url(&request.host, request.port, &request.path);
        self.send(request.verb, &url, &request.query)
    }
}

fn method_for(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Post => Method::POST,
        Verb::Delete => Method::DELETE,
    }
}
