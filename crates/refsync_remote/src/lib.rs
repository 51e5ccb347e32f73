//! # refsync remote client
//!
//! Gateway to the remote list API.
//!
//! This crate provides:
//! - Method calls against `{endpoint}/{method}` with a JSON body
//! - Retry of transport faults with linear backoff
//! - Classification of rejected requests, remote errors and server faults
//! - Lazy pagination over list methods
//! - Base64 attachment upload
//! - A scripted mock HTTP client for tests
//!
//! ## Retry policy
//!
//! Only transport faults (connection failures, timeouts) are retried.
//! Anything the remote side actually answered, including 4xx and 5xx
//! responses, is reported after a single attempt.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod http;
mod mock;

pub use client::{Envelope, Pages, RemoteClient};
pub use config::{RemoteConfig, RetryConfig};
pub use error::{RemoteError, RemoteResult, ALREADY_EXISTS_CODE};
pub use http::{HttpClient, HttpResponse, ReqwestClient, TransportError};
pub use mock::{MockHttpClient, RecordedRequest};
