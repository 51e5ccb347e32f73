//! Integration tests for the remote client against the mock HTTP client.

use proptest::prelude::*;
use refsync_remote::{
    HttpResponse, MockHttpClient, RemoteClient, RemoteConfig, RemoteError, RetryConfig,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn client(mock: &Arc<MockHttpClient>) -> RemoteClient {
    let config = RemoteConfig::new("https://crm.example.com/rest/1/token")
        .with_retry(RetryConfig::new(3).with_base_delay(Duration::ZERO))
        .with_page_delay(Duration::ZERO);
    RemoteClient::new(config, mock.clone())
}

#[test]
fn call_posts_params_to_method_url() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_result("lists.field.get", json!({"PROPERTY_1": {}}));

    let result = client(&mock)
        .call("lists.field.get", &json!({"IBLOCK_ID": 77}))
        .unwrap();

    assert_eq!(result, json!({"PROPERTY_1": {}}));
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "lists.field.get");
    assert_eq!(requests[0].body, json!({"IBLOCK_ID": 77}));
}

#[test]
fn transport_failure_then_success_makes_two_calls() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_result("user.get", json!([]));
    mock.fail_next("user.get", 1);

    let result = client(&mock).call("user.get", &json!({})).unwrap();
    assert_eq!(result, json!([]));
    assert_eq!(mock.call_count("user.get"), 2);
}

#[test]
fn exhausted_retries_surface_transport_error() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_result("user.get", json!([]));
    mock.fail_next("user.get", 5);

    let err = client(&mock).call("user.get", &json!({})).unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, RemoteError::Transport { attempts: 3, .. }));
    assert_eq!(mock.call_count("user.get"), 3);
}

#[test]
fn client_error_is_attempted_once() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_json("lists.element.get", 400, json!({"error": "INVALID_ARG"}));

    let params = json!({"IBLOCK_ID": 77});
    let err = client(&mock).call("lists.element.get", &params).unwrap_err();

    match err {
        RemoteError::RequestRejected {
            method,
            params: sent,
            status,
            body,
        } => {
            assert_eq!(method, "lists.element.get");
            assert_eq!(sent, params);
            assert_eq!(status, 400);
            assert!(body.contains("INVALID_ARG"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.call_count("lists.element.get"), 1);
}

#[test]
fn error_field_on_success_status_is_remote_error() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_error("lists.element.add", "ACCESS_DENIED", "No rights");

    let err = client(&mock)
        .call("lists.element.add", &json!({}))
        .unwrap_err();
    match err {
        RemoteError::Remote {
            code, description, ..
        } => {
            assert_eq!(code, "ACCESS_DENIED");
            assert_eq!(description, "No rights");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn server_fault_is_not_retried() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_with("user.get", |_| HttpResponse::new(503, "maintenance"));

    let err = client(&mock).call("user.get", &json!({})).unwrap_err();
    assert!(matches!(err, RemoteError::ServerFault { status: 503, .. }));
    assert_eq!(mock.call_count("user.get"), 1);
}

#[test]
fn malformed_body_is_decode_error() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_with("user.get", |_| HttpResponse::new(200, "<html>"));

    let err = client(&mock).call("user.get", &json!({})).unwrap_err();
    assert!(matches!(err, RemoteError::Decode { .. }));
}

#[test]
fn pagination_follows_next_tokens() {
    let mock = Arc::new(MockHttpClient::new());
    let items: Vec<Value> = (1..=7).map(|i| json!({"ID": i})).collect();
    mock.serve_pages("lists.element.get", items, 3);

    let ids: Vec<i64> = client(&mock)
        .paginate("lists.element.get", json!({"IBLOCK_ID": 77}), 0)
        .map(|item| item.unwrap()["ID"].as_i64().unwrap())
        .collect();

    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    let starts: Vec<Value> = mock
        .requests_for("lists.element.get")
        .into_iter()
        .map(|body| body["start"].clone())
        .collect();
    assert_eq!(starts, vec![json!(0), json!(3), json!(6)]);
}

#[test]
fn pagination_starts_at_requested_offset() {
    let mock = Arc::new(MockHttpClient::new());
    let items: Vec<Value> = (0..7).map(|i| json!({"ID": i})).collect();
    mock.serve_pages("lists.element.get", items, 2);

    let ids: Vec<i64> = client(&mock)
        .paginate("lists.element.get", json!({"start": 4}), 0)
        .map(|item| item.unwrap()["ID"].as_i64().unwrap())
        .collect();

    assert_eq!(ids, vec![4, 5, 6]);
    assert_eq!(mock.requests_for("lists.element.get")[0]["start"], json!(4));
}

#[test]
fn pagination_uses_total_without_next() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_with("user.get", |body| {
        let start = body["start"].as_u64().unwrap_or(0);
        let page: Vec<Value> = (start..(start + 2).min(5)).map(|i| json!({"ID": i})).collect();
        HttpResponse::json(200, &json!({"result": page, "total": 5}))
    });

    let count = client(&mock)
        .paginate("user.get", json!({}), 0)
        .filter(Result::is_ok)
        .count();
    assert_eq!(count, 5);
    assert_eq!(mock.call_count("user.get"), 3);
}

#[test]
fn pagination_stops_on_non_advancing_token() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_json(
        "user.get",
        200,
        json!({"result": [{"ID": 1}], "next": 0}),
    );

    let items: Vec<_> = client(&mock).paginate("user.get", json!({}), 0).collect();
    assert_eq!(items.len(), 1);
    assert_eq!(mock.call_count("user.get"), 1);
}

#[test]
fn pagination_error_ends_iteration() {
    let mock = Arc::new(MockHttpClient::new());
    mock.respond_json("user.get", 403, json!({"error": "insufficient_scope"}));

    let c = client(&mock);
    let mut pages = c.paginate("user.get", json!({}), 0);
    assert!(matches!(
        pages.next(),
        Some(Err(RemoteError::RequestRejected { .. }))
    ));
    assert!(pages.next().is_none());
}

#[test]
fn upload_sends_base64_and_reads_id() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, b"hello").unwrap();

    let mock = Arc::new(MockHttpClient::new());
    mock.respond_result("disk.folder.uploadfile", json!({"ID": "5150"}));

    let id = client(&mock).upload_file(&path).unwrap();
    assert_eq!(id, 5150);

    let body = &mock.requests_for("disk.folder.uploadfile")[0];
    assert_eq!(body["id"], json!("200931"));
    assert_eq!(body["fileContent"], json!("aGVsbG8="));
    assert!(body["data"]["NAME"].as_str().unwrap().ends_with(".png"));
}

#[test]
fn upload_without_id_is_upload_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("photo.jpg");
    std::fs::write(&path, b"x").unwrap();

    let mock = Arc::new(MockHttpClient::new());
    mock.respond_result("disk.folder.uploadfile", json!({"NAME": "photo.jpg"}));

    let err = client(&mock).upload_file(&path).unwrap_err();
    assert!(matches!(err, RemoteError::Upload { .. }));
}

#[test]
fn upload_with_zero_id_is_upload_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("photo.jpg");
    std::fs::write(&path, b"x").unwrap();

    let mock = Arc::new(MockHttpClient::new());
    mock.respond_result("disk.folder.uploadfile", json!({"ID": 0}));
    let err = client(&mock).upload_file(&path).unwrap_err();
    assert!(matches!(err, RemoteError::Upload { .. }));

    mock.respond_result("disk.folder.uploadfile", json!("0"));
    let err = client(&mock).upload_file(&path).unwrap_err();
    assert!(matches!(err, RemoteError::Upload { .. }));
}

#[test]
fn upload_of_missing_file_makes_no_request() {
    let dir = tempfile::TempDir::new().unwrap();
    let mock = Arc::new(MockHttpClient::new());

    let err = client(&mock)
        .upload_file(&dir.path().join("absent.jpg"))
        .unwrap_err();
    assert!(matches!(err, RemoteError::Upload { .. }));
    assert!(mock.requests().is_empty());
}

proptest! {
    #[test]
    fn pagination_yields_every_item_once(len in 0usize..60, page in 1u32..12) {
        let mock = Arc::new(MockHttpClient::new());
        let items: Vec<Value> = (0..len).map(|i| json!({"ID": i})).collect();
        mock.serve_pages("lists.element.get", items, 50);

        let ids: Vec<u64> = client(&mock)
            .paginate("lists.element.get", json!({}), page)
            .map(|item| item.unwrap()["ID"].as_u64().unwrap())
            .collect();

        let unique: HashSet<u64> = ids.iter().copied().collect();
        prop_assert_eq!(ids.len(), len);
        prop_assert_eq!(unique.len(), len);

        let expected_calls = if len == 0 { 1 } else { len.div_ceil(page as usize) };
        prop_assert_eq!(mock.call_count("lists.element.get"), expected_calls);
    }
}
