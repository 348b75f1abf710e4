//! Integration tests using wiremock to simulate HTTP servers.

use http::StatusCode;
use netable::casing::{KeyDecodingStrategy, KeyEncodingStrategy};
use netable::interceptor::{HeaderInterceptor, MockInterceptor};
use netable::retry::RetryOn5xx;
use netable::{
    Client, Config, Empty, Error, Request, RetryConfiguration, RetryableErrors, TransportError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{
    any, body_json, body_string, body_string_contains, header, header_regex, method, path,
    query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Post {
    title: String,
    content: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct LegacyPost {
    headline: String,
}

#[derive(Debug, Serialize)]
struct Login {
    username: String,
    password: String,
}

fn client(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .build()
        .unwrap()
}

fn retrying(server: &MockServer, errors: RetryableErrors, count: usize) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_configuration(RetryConfiguration::new(
            errors,
            count,
            Duration::from_millis(10),
        ))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_smart_unwrap_lossy_array() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "posts": [
                { "title": "first", "content": "a" },
                { "title": "second" },
                { "title": "third", "content": "c" },
                "garbage",
                { "title": "fifth", "content": "e" }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .send(
            Request::<(), Vec<Post>>::get("/posts")
                .smart_unwrap("posts")
                .lossy_arrays(),
        )
        .await
        .unwrap();

    let titles: Vec<&str> = response.data.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "third", "fifth"]);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.attempts, 1);
    assert!(!response.mocked);
}

#[tokio::test]
async fn test_smart_unwrap_without_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "meta": { "page": 1 },
            "post": { "title": "only", "content": "one" }
        })))
        .mount(&mock_server)
        .await;

    let post = client(&mock_server)
        .execute(Request::<(), Post>::get("/post").smart_unwrap_any())
        .await
        .unwrap();

    assert_eq!(post.title, "only");
}

#[tokio::test]
async fn test_empty_response_for_empty_resource() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("password=hunter2&username=alice"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let login = Login {
        username: "alice".to_string(),
        password: "hunter2".to_string(),
    };

    let result: Empty = client(&mock_server)
        .execute(
            Request::<(), Empty>::post("/login")
                .parameters(login)
                .url_encoded(),
        )
        .await
        .unwrap();

    assert_eq!(result, Empty::default());
}

#[tokio::test]
async fn test_multipart_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header_regex(
            "content-type",
            "^multipart/form-data; boundary=[0-9a-f-]+$",
        ))
        .and(body_string_contains("Content-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .execute(
            Request::<(), serde_json::Value>::post("/upload")
                .parameters(serde_json::json!({ "title": "hello", "count": 3 }))
                .multipart(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_multipart_part_names_cannot_add_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name*=utf-8''a%22%0D%0AX-Injected:%201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .execute(
            Request::<(), serde_json::Value>::post("/upload")
                .parameters(serde_json::json!({ "a\"\r\nX-Injected: 1": "v" }))
                .multipart(),
        )
        .await
        .unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(!body.contains("\r\nX-Injected"));
}

#[tokio::test]
async fn test_json_body_with_snake_case_keys() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/profile"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({ "display_name": "Alice" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "display_name": "Alice" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .config(
            Config::builder()
                .key_encoding(KeyEncodingStrategy::ConvertToSnakeCase)
                .key_decoding(KeyDecodingStrategy::ConvertFromSnakeCase)
                .build(),
        )
        .build()
        .unwrap();

    let profile = client
        .execute(
            Request::<(), serde_json::Value>::put("/profile")
                .parameters(serde_json::json!({ "displayName": "Alice" })),
        )
        .await
        .unwrap();

    assert_eq!(profile, serde_json::json!({ "displayName": "Alice" }));
}

#[tokio::test]
async fn test_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let results = client(&mock_server)
        .execute(
            Request::<(), Vec<Post>>::get("/search")
                .parameters(serde_json::json!({ "q": "rust", "limit": 10, "cursor": null })),
        )
        .await
        .unwrap();

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_delete_parameters_use_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/posts/7"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .execute(
            Request::<(), Empty>::delete("/posts/7")
                .parameters(serde_json::json!({ "force": true })),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_default_headers_overridden_by_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/version"))
        .and(header("x-api-key", "per-request"))
        .and(header("x-client", "netable"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "v": 1 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("x-api-key", "default")
        .unwrap()
        .default_header("x-client", "netable")
        .unwrap()
        .interceptor(HeaderInterceptor::bearer("token-123").unwrap())
        .build()
        .unwrap();

    client
        .execute(
            Request::<(), serde_json::Value>::get("/version")
                .header("x-api-key", "per-request")
                .unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_http_error_keeps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .execute(Request::<(), Post>::get("/missing"))
        .await
        .unwrap_err();

    match err {
        Error::Http { status, raw } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(raw.as_deref(), Some(&b"not here"[..]));
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_decoding_error_keeps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"title\": 1}"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .execute(Request::<(), Post>::get("/post"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decoding { .. }));
    assert_eq!(err.raw_response().map(|b| &b[..]), Some(&b"{\"title\": 1}"[..]));
}

#[tokio::test]
async fn test_retry_all_exhausts_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(body_json(serde_json::json!({ "title": "A", "content": "B" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = retrying(&mock_server, RetryableErrors::All, 2)
        .execute(Request::<(), Post>::post("/posts").parameters(Post {
            title: "A".to_string(),
            content: "B".to_string(),
        }))
        .await
        .unwrap_err();

    match err {
        Error::Http { status, raw } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(raw.as_deref(), Some(&b"oops"[..]));
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_until_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 503, third succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503).set_body_string("busy")
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "title": "ok", "content": "!" }))
            }
        })
        .mount(&mock_server)
        .await;

    let response = retrying(&mock_server, RetryableErrors::custom(|e: &Error| e.status().is_some()), 3)
        .send(Request::<(), Post>::get("/flaky"))
        .await
        .unwrap();

    assert_eq!(response.data.title, "ok");
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transport_only_does_not_retry_http_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = retrying(&mock_server, RetryableErrors::TransportOnly, 3)
        .execute(Request::<(), Post>::get("/broken"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn test_custom_predicate_skips_client_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = retrying(&mock_server, RetryableErrors::Custom(Arc::new(RetryOn5xx)), 3)
        .execute(Request::<(), Post>::get("/forbidden"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
}

#[tokio::test]
async fn test_fallback_decode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "headline": "old" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Fallback outcomes are not failures of the exchange and are never retried.
    let err = retrying(&mock_server, RetryableErrors::All, 2)
        .execute(Request::<(), Post>::get("/post").with_fallback::<LegacyPost>())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FallbackDecode(_)));
    assert_eq!(
        err.fallback::<LegacyPost>(),
        Some(&LegacyPost {
            headline: "old".to_string()
        })
    );
}

#[tokio::test]
async fn test_fallback_prefers_primary_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "title": "new", "content": "shape" })),
        )
        .mount(&mock_server)
        .await;

    let post = client(&mock_server)
        .execute(Request::<(), Post>::get("/post").with_fallback::<LegacyPost>())
        .await
        .unwrap();

    assert_eq!(post.title, "new");
}

#[tokio::test]
async fn test_finalize_transforms_resource() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "title": "a", "content": "1" },
            { "title": "b", "content": "2" }
        ])))
        .mount(&mock_server)
        .await;

    let count: usize = client(&mock_server)
        .execute(Request::<(), Vec<Post>>::get("/posts").finalize_with(|posts| Ok(posts.len())))
        .await
        .unwrap();

    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_raw_bytes_resource() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/avatar.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&mock_server)
        .await;

    let bytes = client(&mock_server)
        .execute(Request::<(), bytes::Bytes>::get("/avatar.png"))
        .await
        .unwrap();

    assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_failures_reach_channel_and_delegate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unauthorized"))
        .respond_with(ResponseTemplate::new(401).set_body_string("login first"))
        .mount(&mock_server)
        .await;

    let delegated = Arc::new(AtomicUsize::new(0));
    let delegated_clone = delegated.clone();

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .failure_delegate(move |error: &Error| {
            assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
            delegated_clone.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let mut first = client.subscribe_failures();
    let mut second = client.subscribe_failures();

    let err = client
        .execute(Request::<(), Post>::get("/unauthorized"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

    assert_eq!(delegated.load(Ordering::SeqCst), 1);
    for subscription in [&mut first, &mut second] {
        let published = subscription.recv().await.unwrap();
        assert_eq!(published.status(), Some(StatusCode::UNAUTHORIZED));
    }

    client.clear_failure_delegate();
    second.unsubscribe();
    let _ = client.execute(Request::<(), Post>::get("/unauthorized")).await;
    assert_eq!(delegated.load(Ordering::SeqCst), 1);
    assert!(first.recv().await.is_some());
}

#[tokio::test]
async fn test_successful_requests_are_not_broadcast() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut failures = client.subscribe_failures();
    client
        .execute(Request::<(), serde_json::Value>::get("/anything"))
        .await
        .unwrap();

    assert!(failures.try_recv().is_none());
}

#[tokio::test]
async fn test_mock_interceptor_skips_network() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fixture = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/posts.json");
    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .interceptor(MockInterceptor::new().mock("/posts", fixture).unwrap())
        .build()
        .unwrap();

    let response = client
        .send(
            Request::<(), Vec<Post>>::get("/posts")
                .smart_unwrap("posts")
                .lossy_arrays(),
        )
        .await
        .unwrap();

    assert!(response.mocked);
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.is_empty());
    assert_eq!(response.data.len(), 2);
    assert_eq!(response.data[0].title, "Mocked first post");
}

#[tokio::test]
async fn test_wrong_server_fails_before_network() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let mut failures = client.subscribe_failures();

    let err = client
        .execute(Request::<(), Empty>::get("https://elsewhere.example.com/posts"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WrongServer { .. }));
    assert!(matches!(failures.recv().await.as_deref(), Some(Error::WrongServer { .. })));

    let err = client
        .execute(Request::<(), Empty>::get("/has space"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedUrl(_)));
}

#[tokio::test]
async fn test_fully_qualified_url_on_same_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/absolute"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .execute(Request::<(), Empty>::get(format!("{}/absolute", mock_server.uri())))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_encoding_failure_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = retrying(&mock_server, RetryableErrors::All, 3)
        .execute(
            Request::<(), Empty>::get("/nested")
                .parameters(serde_json::json!({ "filter": { "tag": "rust" } })),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Coding(_)));
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .retry_configuration(RetryConfiguration::new(
            RetryableErrors::All,
            3,
            Duration::from_millis(10),
        ))
        .build()
        .unwrap();

    let err = client
        .execute(Request::<(), Empty>::get("/slow"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RequestFailed(TransportError::TimedOut)));
}
