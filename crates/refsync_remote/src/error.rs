//! Error types for remote calls.

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Error code the remote side returns when a record with the same
/// idempotency token already exists.
pub const ALREADY_EXISTS_CODE: &str = "ERROR_ELEMENT_ALREADY_EXISTS";

/// Errors that can occur while talking to the remote API.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Connection failure or timeout, after all attempts were used.
    #[error("transport error calling {method} after {attempts} attempt(s): {message}")]
    Transport {
        /// Remote method.
        method: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the last attempt.
        message: String,
    },

    /// The remote side rejected the request with a 4xx status.
    #[error("{method} rejected with HTTP {status}: {body}")]
    RequestRejected {
        /// Remote method.
        method: String,
        /// Request parameters.
        params: Value,
        /// HTTP status.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response carried an `error` field.
    #[error("{method} returned {code}: {description}")]
    Remote {
        /// Remote method.
        method: String,
        /// Error code.
        code: String,
        /// Human readable description.
        description: String,
    },

    /// 5xx response without a structured error.
    #[error("{method} failed with HTTP {status}: {body}")]
    ServerFault {
        /// Remote method.
        method: String,
        /// HTTP status.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response could not be decoded.
    #[error("cannot decode response from {method}: {message}")]
    Decode {
        /// Remote method.
        method: String,
        /// What went wrong.
        message: String,
    },

    /// An attachment could not be uploaded.
    #[error("upload of {path:?} failed: {message}")]
    Upload {
        /// Local file path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl RemoteError {
    /// Returns true if the error is a transient transport fault.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }

    /// Returns true if the remote side reported that the record already
    /// exists.
    ///
    /// The signal may arrive either as a structured error or inside the
    /// body of a rejected request.
    pub fn is_already_exists(&self) -> bool {
        match self {
            RemoteError::Remote { code, .. } => code == ALREADY_EXISTS_CODE,
            RemoteError::RequestRejected { body, .. } => body.contains(ALREADY_EXISTS_CODE),
            _ => false,
        }
    }

    /// Returns the remote method the error relates to, if any.
    pub fn method(&self) -> Option<&str> {
        match self {
            RemoteError::Transport { method, .. }
            | RemoteError::RequestRejected { method, .. }
            | RemoteError::Remote { method, .. }
            | RemoteError::ServerFault { method, .. }
            | RemoteError::Decode { method, .. } => Some(method),
            RemoteError::Upload { .. } | RemoteError::InvalidConfig(_) => None,
        }
    }

    pub(crate) fn upload(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Upload {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn decode(method: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            method: method.to_string(),
            message: message.into(),
        }
    }
}
