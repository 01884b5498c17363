//! HTTP transport
//!
//! Sends one request and hands back the status code and raw body. No business
//! logic lives here: status interpretation belongs to the Resource Clients.

pub mod mock;

use crate::config::ClientConfig;
use crate::error::{ConfigError, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        })
    }
}

/// One request against the admin API, path relative to the base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Bearer token captured when the call started
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status code and undecoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Anything that can carry an [`ApiRequest`] to the server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport with connect/read timeouts
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, %url, authenticated = request.bearer.is_some(), "Sending request");

        let response = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(&url, e))?;

        debug!(method = %request.method, %url, status, bytes = body.len(), "Response received");
        Ok(RawResponse { status, body })
    }
}

fn classify(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joining() {
        let config = ClientConfig {
            base_url: "http://localhost:3000/api/".to_string(),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:3000/api");
        assert_eq!(
            transport.url("/admin/users"),
            "http://localhost:3000/api/admin/users"
        );
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::post("/admin/users/1/ban")
            .bearer("tok")
            .json(json!({"reason": "spam"}));
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.bearer.as_deref(), Some("tok"));
        assert!(request.body.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = ClientConfig {
            // Port 9 (discard) on loopback is closed on CI hosts
            base_url: "http://127.0.0.1:9/api".to_string(),
            connect_timeout_secs: 1,
            request_timeout_secs: 2,
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let result = transport.send(ApiRequest::get("/admin/stats")).await;
        assert!(result.is_err());
    }
}
