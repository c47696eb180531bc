//! HTTP transport
//!
//! This module handles the network side of the crawler:
//! - Building the HTTP client with the configured user agent
//! - Issuing one request per URL without following redirects
//! - Classifying failures into status, timeout and connection errors
//!
//! The scheduler only talks to the [`Transport`] trait, so tests can swap in
//! an in-memory implementation.

use chrono::{DateTime, FixedOffset};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use reqwest::{redirect::Policy, Client, Method};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The URL that was requested
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns a header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw `Location` header
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Parses the `Last-Modified` header
    ///
    /// Returns `None` when the header is missing or not a valid HTTP date.
    pub fn last_modified(&self) -> Option<DateTime<FixedOffset>> {
        let value = self.headers.get(LAST_MODIFIED)?.to_str().ok()?;
        DateTime::parse_from_rfc2822(value.trim()).ok()
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors surfaced by a transport for a single request
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a 4xx or 5xx status
    #[error("HTTP status {status} for {}", .response.url)]
    Status {
        status: u16,
        response: Box<HttpResponse>,
    },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Request failed for {url}: {message}")]
    Other { url: String, message: String },
}

impl TransportError {
    /// Returns the response received before the request failed, if any
    pub fn partial_response(&self) -> Option<&HttpResponse> {
        match self {
            TransportError::Status { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Returns the HTTP status of a status error
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            TransportError::Other {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// A single request handed to the transport
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,

    /// Request-level timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    /// Creates a GET request without a timeout
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            timeout: None,
        }
    }
}

/// Issues HTTP requests for the scheduler
///
/// Implementations must not follow redirects; a 3xx answer is returned as a
/// successful response so the scheduler can classify it. Answers with a
/// status of 400 or above are returned as [`TransportError::Status`].
pub trait Transport: Send + Sync + 'static {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a transport with its own client
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }

    /// Wraps an existing client; the client must not follow redirects
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?
            .to_vec();

        let response = HttpResponse {
            url: request.url,
            status,
            headers,
            body,
        };

        if status >= 400 {
            return Err(TransportError::Status {
                status,
                response: Box::new(response),
            });
        }

        Ok(response)
    }
}

/// Builds an HTTP client for crawling
///
/// Redirects are never followed; the scheduler needs to see them.
///
/// # Example
///
/// ```no_run
/// use spinneret::crawler::build_http_client;
///
/// let client = build_http_client("spinneret/0.1").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}
