//! The remote API client.

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::http::{HttpClient, HttpResponse, ReqwestClient};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Longest response body kept in an error.
const BODY_PREVIEW: usize = 500;

/// Parameter carrying the pagination offset.
const OFFSET_PARAM: &str = "start";

/// Parameter carrying the requested page size.
const LIMIT_PARAM: &str = "limit";

const UPLOAD_METHOD: &str = "disk.folder.uploadfile";

/// A decoded success envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The `result` field (null when absent).
    pub result: Value,
    /// Offset of the next page, if the remote reported one.
    pub next: Option<u64>,
    /// Size of the whole collection, if the remote reported it.
    pub total: Option<u64>,
}

impl Envelope {
    fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Self {
                    result: other,
                    next: None,
                    total: None,
                }
            }
        };

        let next = map.get("next").and_then(as_u64);
        let result = map.remove("result").unwrap_or(Value::Null);
        let total = map
            .get("total")
            .and_then(as_u64)
            .or_else(|| result.get("total").and_then(as_u64));

        Self {
            result,
            next,
            total,
        }
    }

    /// Returns the list items carried by this page.
    ///
    /// Items are `result` itself when it is an array, or `result.items`
    /// when it is an object.
    pub fn items(&self) -> Vec<Value> {
        match &self.result {
            Value::Array(items) => items.clone(),
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// Client for the remote list API.
///
/// Cloning is cheap; clones share the underlying HTTP client.
#[derive(Clone)]
pub struct RemoteClient {
    config: Arc<RemoteConfig>,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Creates a client over an arbitrary HTTP implementation.
    pub fn new(config: RemoteConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            config: Arc::new(config),
            http,
        }
    }

    /// Creates a client backed by `reqwest`.
    pub fn with_reqwest(config: RemoteConfig) -> RemoteResult<Self> {
        let http = ReqwestClient::new(config.timeout)?;
        Ok(Self::new(config, Arc::new(http)))
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Calls `method` and returns its `result` field.
    pub fn call(&self, method: &str, params: &Value) -> RemoteResult<Value> {
        Ok(self.call_envelope(method, params)?.result)
    }

    /// Calls `method` and returns the whole success envelope.
    pub fn call_envelope(&self, method: &str, params: &Value) -> RemoteResult<Envelope> {
        let response = self.send(method, params)?;
        let parsed = serde_json::from_str::<Value>(&response.body);

        if (400..500).contains(&response.status) {
            error!(method, status = response.status, "Remote rejected request");
            return Err(RemoteError::RequestRejected {
                method: method.to_string(),
                params: params.clone(),
                status: response.status,
                body: preview(&response.body),
            });
        }

        if let Ok(value) = &parsed {
            if let Some(code) = value.get("error").filter(|e| !e.is_null()) {
                let code = scalar_text(code);
                let description = value
                    .get("error_description")
                    .map(scalar_text)
                    .unwrap_or_else(|| code.clone());
                error!(method, %code, %description, "Remote returned an error");
                return Err(RemoteError::Remote {
                    method: method.to_string(),
                    code,
                    description,
                });
            }
        }

        if response.status >= 500 {
            error!(method, status = response.status, "Remote server fault");
            return Err(RemoteError::ServerFault {
                method: method.to_string(),
                status: response.status,
                body: preview(&response.body),
            });
        }

        let value = parsed.map_err(|e| RemoteError::decode(method, e.to_string()))?;
        Ok(Envelope::from_value(value))
    }

    /// Iterates over every item of a paginated list method.
    ///
    /// Pages are fetched lazily starting from the `start` parameter, or
    /// offset 0 when it is absent. Items before that offset count towards
    /// a reported `total`. A non-zero
    /// `page_size` is sent as the requested page length; zero leaves the
    /// page length to the remote side. The iterator yields at most one
    /// error and then ends.
    pub fn paginate(&self, method: &str, params: Value, page_size: u32) -> Pages<'_> {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let offset = params
            .get(OFFSET_PARAM)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Pages {
            client: self,
            method: method.to_string(),
            params,
            page_size,
            offset,
            fetched: offset,
            pages: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Uploads a file to the configured folder and returns its remote id.
    pub fn upload_file(&self, path: &Path) -> RemoteResult<i64> {
        let bytes = std::fs::read(path).map_err(|e| RemoteError::upload(path, e.to_string()))?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| ".jpg".to_string());

        let params = json!({
            "id": self.config.upload_folder_id,
            "data": { "NAME": format!("{stamp}{ext}") },
            "fileContent": STANDARD.encode(&bytes),
        });

        let result = self.call(UPLOAD_METHOD, &params)?;
        let id = match &result {
            Value::Object(map) => map.get("ID").or_else(|| map.get("id")).and_then(as_i64),
            other => as_i64(other),
        }
        .filter(|id| *id > 0);

        match id {
            Some(id) => {
                debug!(path = ?path, file_id = id, "Uploaded attachment");
                Ok(id)
            }
            None => Err(RemoteError::upload(
                path,
                format!("no file id in response: {}", preview(&result.to_string())),
            )),
        }
    }

    fn send(&self, method: &str, params: &Value) -> RemoteResult<HttpResponse> {
        let url = self.config.method_url(method);
        let retry = &self.config.retry;
        let max_attempts = retry.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(method, attempt, "Sending remote request");

            match self.http.post_json(&url, params) {
                Ok(response) => {
                    debug!(method, status = response.status, "Received remote response");
                    return Ok(response);
                }
                Err(e) if attempt < max_attempts => {
                    let backoff = retry.delay_for_attempt(attempt);
                    warn!(
                        method,
                        attempt,
                        error = %e,
                        wait_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    std::thread::sleep(backoff);
                }
                Err(e) => {
                    error!(method, attempts = attempt, error = %e, "Request failed");
                    return Err(RemoteError::Transport {
                        method: method.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Lazy iterator over the items of a paginated list method.
///
/// Created by [`RemoteClient::paginate`].
pub struct Pages<'a> {
    client: &'a RemoteClient,
    method: String,
    params: Map<String, Value>,
    page_size: u32,
    offset: u64,
    fetched: u64,
    pages: u32,
    buffer: VecDeque<Value>,
    done: bool,
}

impl Pages<'_> {
    fn fetch_page(&mut self) -> RemoteResult<()> {
        if self.pages > 0 && !self.client.config.page_delay.is_zero() {
            std::thread::sleep(self.client.config.page_delay);
        }
        self.pages += 1;

        let mut params = self.params.clone();
        params.insert(OFFSET_PARAM.to_string(), json!(self.offset));
        if self.page_size > 0 {
            params.insert(LIMIT_PARAM.to_string(), json!(self.page_size));
        }

        let envelope = self
            .client
            .call_envelope(&self.method, &Value::Object(params))?;
        let items = envelope.items();
        let count = items.len() as u64;
        debug!(
            method = %self.method,
            offset = self.offset,
            count,
            "Fetched page"
        );

        if count == 0 {
            self.done = true;
            return Ok(());
        }
        self.fetched += count;
        self.buffer.extend(items);

        match (envelope.next, envelope.total) {
            (Some(next), _) if next > self.offset => self.offset = next,
            (Some(next), _) => {
                warn!(
                    method = %self.method,
                    offset = self.offset,
                    next,
                    "Remote returned a non-advancing page token"
                );
                self.done = true;
            }
            (None, Some(total)) if self.fetched < total => self.offset += count,
            _ => self.done = true,
        }
        Ok(())
    }
}

impl Iterator for Pages<'_> {
    type Item = RemoteResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl std::iter::FusedIterator for Pages<'_> {}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn preview(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
