use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use tracing::debug;

use crate::errors::{TransportError, WagonError};
use super::config::WebDAVConfig;

/// HTTP verbs this crate issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    PropFind,
    MkCol,
    Put,
    Get,
    Head,
    Options,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DavMethod::PropFind => "PROPFIND",
            DavMethod::MkCol => "MKCOL",
            DavMethod::Put => "PUT",
            DavMethod::Get => "GET",
            DavMethod::Head => "HEAD",
            DavMethod::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for DavMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request handed to the transport
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: DavMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl DavRequest {
    pub fn new(method: DavMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status, reason phrase, headers and the fully read body of a response
#[derive(Debug, Clone, Default)]
pub struct DavResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl DavResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Whether the transport itself considers the exchange successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The HTTP method-execution primitive.
///
/// Implementations perform exactly one round trip per call and never retry;
/// a timeout must come back as `TransportError::Timeout`.
#[async_trait]
pub trait DavTransport: Send + Sync {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, TransportError>;
}

/// reqwest-backed transport with optional basic authentication
#[derive(Debug, Clone)]
pub struct WebDAVConnection {
    client: Client,
    config: WebDAVConfig,
}

impl WebDAVConnection {
    pub fn new(config: WebDAVConfig) -> Result<Self, WagonError> {
        // Validate configuration first
        config.validate()?;
        // 3xx must reach the caller's status handling, never be followed
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WagonError::ConfigurationInvalid {
                details: format!("Unable to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebDAVConfig {
        &self.config
    }

    fn map_error(url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if e.is_builder() {
            TransportError::InvalidRequest {
                url: url.to_string(),
                details: e.to_string(),
            }
        } else {
            TransportError::Connection {
                url: url.to_string(),
                details: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl DavTransport for WebDAVConnection {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|e| {
            TransportError::InvalidRequest {
                url: request.url.clone(),
                details: e.to_string(),
            }
        })?;

        let mut builder = self.client.request(method, &request.url);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.basic_auth(username, Some(password));
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&request.url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(&request.url, e))?;

        debug!("{} {} - Status code: {}", request.method, request.url, status.as_u16());

        Ok(DavResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            headers,
            body: body.to_vec(),
        })
    }
}
