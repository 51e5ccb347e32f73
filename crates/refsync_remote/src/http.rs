//! HTTP client abstraction.
//!
//! The remote client talks to the network only through [`HttpClient`], so
//! tests can swap in [`crate::MockHttpClient`] and the production build uses
//! [`ReqwestClient`].

use crate::error::{RemoteError, RemoteResult};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// A transport-level failure: the request never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body.
    ///
    /// Returns `Err` only when no response was received. Any response,
    /// whatever its status, is returned as `Ok`.
    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with a per-request timeout.
    pub fn new(timeout: Duration) -> RemoteResult<Self> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::InvalidConfig(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let response = self
            .inner
            .post(url)
            .json(body)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_response_body() {
        let response = HttpResponse::json(200, &json!({"result": 1}));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"result":1}"#);
    }

    #[test]
    fn reqwest_client_builds() {
        assert!(ReqwestClient::new(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        let client = ReqwestClient::new(Duration::from_millis(200)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let result = client.post_json("http://127.0.0.1:9/user.get", &json!({}));
        assert!(result.is_err());
    }
}
