//! A scripted HTTP client for tests.

use crate::http::{HttpClient, HttpResponse, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;

type Responder = Box<dyn Fn(&Value) -> HttpResponse + Send + Sync>;

/// A request seen by [`MockHttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Remote method (last URL segment).
    pub method: String,
    /// JSON body.
    pub body: Value,
}

/// A mock HTTP client for testing.
///
/// Requests are routed by remote method name to scripted responders.
/// Unrouted methods answer with a 404. Every request is recorded, and
/// transport failures can be injected per method.
#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<HashMap<String, Responder>>,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpClient {
    /// Creates a mock with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `method` to a responder computed from the request body.
    pub fn respond_with<F>(&self, method: &str, responder: F)
    where
        F: Fn(&Value) -> HttpResponse + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .insert(method.to_string(), Box::new(responder));
    }

    /// Routes `method` to a fixed JSON response.
    pub fn respond_json(&self, method: &str, status: u16, body: Value) {
        self.respond_with(method, move |_| HttpResponse::json(status, &body));
    }

    /// Routes `method` to a `200 {"result": result}` response.
    pub fn respond_result(&self, method: &str, result: Value) {
        self.respond_json(method, 200, json!({ "result": result }));
    }

    /// Routes `method` to a structured remote error on HTTP 200.
    pub fn respond_error(&self, method: &str, code: &str, description: &str) {
        self.respond_json(
            method,
            200,
            json!({ "error": code, "error_description": description }),
        );
    }

    /// Serves `items` as a paginated collection.
    ///
    /// Honours the `start` and `limit` request parameters, using
    /// `default_page` when no limit is sent. Each page reports `total`
    /// and, except for the last one, `next`.
    pub fn serve_pages(&self, method: &str, items: Vec<Value>, default_page: usize) {
        let default_page = default_page.max(1);
        self.respond_with(method, move |body| {
            let start = body.get("start").and_then(Value::as_u64).unwrap_or(0) as usize;
            let limit = body
                .get("limit")
                .and_then(Value::as_u64)
                .map(|l| l as usize)
                .filter(|l| *l > 0)
                .unwrap_or(default_page);

            let end = (start + limit).min(items.len());
            let page: Vec<Value> = items.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();

            let mut envelope = json!({ "result": page, "total": items.len() });
            if end < items.len() {
                envelope["next"] = json!(end);
            }
            HttpResponse::json(200, &envelope)
        });
    }

    /// Makes the next `times` calls to `method` fail at the transport level.
    pub fn fail_next(&self, method: &str, times: u32) {
        self.failures.lock().insert(method.to_string(), times);
    }

    /// Returns every recorded request in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the bodies of every request made to `method`.
    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .map(|r| r.body.clone())
            .collect()
    }

    /// Returns the number of requests made to `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

impl HttpClient for MockHttpClient {
    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let method = url.rsplit('/').next().unwrap_or(url).to_string();
        self.requests.lock().push(RecordedRequest {
            method: method.clone(),
            body: body.clone(),
        });

        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(&method) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransportError(format!("injected failure for {method}")));
                }
            }
        }

        let routes = self.routes.lock();
        match routes.get(&method) {
            Some(responder) => Ok(responder(body)),
            None => Ok(HttpResponse::json(
                404,
                &json!({
                    "error": "ERROR_METHOD_NOT_FOUND",
                    "error_description": format!("Method not found: {method}")
                }),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrouted_method_is_404() {
        let mock = MockHttpClient::new();
        let response = mock.post_json("http://x/rest/1/t/user.get", &json!({})).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(mock.call_count("user.get"), 1);
    }

    #[test]
    fn injected_failures_run_out() {
        let mock = MockHttpClient::new();
        mock.respond_result("user.get", json!([]));
        mock.fail_next("user.get", 2);

        assert!(mock.post_json("http://x/user.get", &json!({})).is_err());
        assert!(mock.post_json("http://x/user.get", &json!({})).is_err());
        assert!(mock.post_json("http://x/user.get", &json!({})).is_ok());
    }

    #[test]
    fn pages_follow_start_and_limit() {
        let mock = MockHttpClient::new();
        let items: Vec<Value> = (0..5).map(|i| json!({ "ID": i })).collect();
        mock.serve_pages("lists.element.get", items, 2);

        let last = mock
            .post_json("http://x/lists.element.get", &json!({"start": 4}))
            .unwrap();
        let body: Value = serde_json::from_str(&last.body).unwrap();
        assert_eq!(body["result"], json!([{ "ID": 4 }]));
        assert!(body.get("next").is_none());

        let limited = mock
            .post_json("http://x/lists.element.get", &json!({"start": 0, "limit": 3}))
            .unwrap();
        let body: Value = serde_json::from_str(&limited.body).unwrap();
        assert_eq!(body["result"].as_array().unwrap().len(), 3);
        assert_eq!(body["next"], json!(3));
    }
}
