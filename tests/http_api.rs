//! Insert and query clients against a mock HTTP server.

use flate2::read::GzDecoder;
use insights_rs::config::Compression;
use insights_rs::query::QueryClient;
use insights_rs::{Error, InsertClient, InsertConfig};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;

const ACCOUNT: &str = "12345";

/// Mock server plus clients pointed at it.
struct MockServerFixture {
    server: ServerGuard,
}

impl MockServerFixture {
    async fn new() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    fn insert_client(&self, config: InsertConfig) -> InsertClient {
        InsertClient::builder("secret", ACCOUNT)
            .config(config)
            .base_url_override(self.server.url())
            .build()
            .expect("client builds")
    }

    fn query_client(&self) -> QueryClient {
        QueryClient::with_base_url("query-secret", ACCOUNT, &self.server.url(), Duration::from_secs(5))
            .expect("client builds")
    }

    fn events_path() -> String {
        format!("/{ACCOUNT}/events")
    }
}

fn quick_retries() -> InsertConfig {
    InsertConfig::new()
        .with_batch_size(10)
        .with_batch_time(Duration::from_secs(3600))
        .with_retry_count(2)
        .with_retry_wait(Duration::from_millis(10))
}

#[tokio::test]
async fn test_batch_posted_as_json_array_with_insert_key() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", MockServerFixture::events_path().as_str())
        .match_header("x-insert-key", "secret")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!([
            {"eventType": "Deploy", "n": 1},
            {"eventType": "Deploy", "n": 2}
        ])))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = fixture.insert_client(quick_retries());
    client.start().unwrap();
    client
        .enqueue_event(&json!({"eventType": "Deploy", "n": 1}))
        .await
        .unwrap();
    client
        .enqueue_event(&json!({"eventType": "Deploy", "n": 2}))
        .await
        .unwrap();
    client.flush().await.unwrap();
    client.shutdown().await.unwrap();

    mock.assert_async().await;
    let stats = client.statistics();
    assert_eq!(stats.processed_event_count, 2);
    assert_eq!(stats.partial_flush_count, 1);
    assert!(stats.byte_count > 0);
}

fn gunzip_json(body: &[u8]) -> Option<Value> {
    let mut raw = Vec::new();
    GzDecoder::new(body).read_to_end(&mut raw).ok()?;
    serde_json::from_slice(&raw).ok()
}

#[tokio::test]
async fn test_gzip_batch_sets_encoding_and_decodes() {
    let mut fixture = MockServerFixture::new().await;
    let expected = json!([
        {"eventType": "Deploy", "n": 1},
        {"eventType": "Deploy", "n": 2}
    ]);
    let mock = fixture
        .server
        .mock("POST", MockServerFixture::events_path().as_str())
        .match_header("content-encoding", "gzip")
        .match_header("content-type", "application/json")
        .match_request(move |req| {
            req.body()
                .ok()
                .and_then(|b| gunzip_json(b))
                .map_or(false, |v| v == expected)
        })
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = fixture.insert_client(quick_retries().with_compression(Compression::Gzip));
    client.start().unwrap();
    for n in 1..=2 {
        client
            .enqueue_event(&json!({"eventType": "Deploy", "n": n}))
            .await
            .unwrap();
    }
    client.shutdown().await.unwrap();

    mock.assert_async().await;
    let stats = client.statistics();
    assert_eq!(stats.processed_event_count, 2);
    assert_eq!(stats.abandoned_batch_count, 0);
}

#[tokio::test]
async fn test_uncompressed_by_default() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", MockServerFixture::events_path().as_str())
        .match_header("content-encoding", Matcher::Missing)
        .match_body(Matcher::Json(json!({"eventType": "Plain"})))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = fixture.insert_client(InsertConfig::new());
    client
        .post_event(&json!({"eventType": "Plain"}))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", MockServerFixture::events_path().as_str())
        .with_status(503)
        .with_body("unavailable")
        .expect(2)
        .create_async()
        .await;

    let client = fixture.insert_client(quick_retries());
    client.start().unwrap();
    client
        .enqueue_event(&json!({"eventType": "Deploy"}))
        .await
        .unwrap();
    client.shutdown().await.unwrap();

    mock.assert_async().await;
    let stats = client.statistics();
    assert_eq!(stats.processed_event_count, 0);
    assert_eq!(stats.send_error_count, 2);
    assert_eq!(stats.retry_count, 1);
    assert_eq!(stats.abandoned_batch_count, 1);
    assert_eq!(stats.abandoned_event_count, 1);
}

#[tokio::test]
async fn test_success_false_counts_as_failure() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("POST", MockServerFixture::events_path().as_str())
        .with_status(200)
        .with_body(r#"{"success":false,"error":"bad key"}"#)
        .create_async()
        .await;

    let client = fixture.insert_client(quick_retries());
    let err = client
        .post_event(&json!({"eventType": "Deploy"}))
        .await
        .unwrap_err();
    match err {
        Error::Remote { status, message } => {
            assert_eq!(status, 200);
            assert_eq!(message, "bad key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_post_event_sends_single_object() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", MockServerFixture::events_path().as_str())
        .match_header("x-insert-key", "secret")
        .match_body(Matcher::Json(json!({"eventType": "Login", "user": "ana"})))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;

    let client = fixture.insert_client(InsertConfig::new());
    client
        .post_event(&json!({"eventType": "Login", "user": "ana"}))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_event_without_event_type_never_sent() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = fixture.insert_client(InsertConfig::new());
    let err = client
        .post_event(&json!({"user": "ana"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_decodes_results() {
    let mut fixture = MockServerFixture::new().await;
    let nrql = "SELECT count(*) FROM Deploy SINCE 1 hour ago";
    let mock = fixture
        .server
        .mock("GET", Matcher::Regex(format!("^/{ACCOUNT}/query")))
        .match_query(Matcher::UrlEncoded("nrql".into(), nrql.into()))
        .match_header("x-query-key", "query-secret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "results": [{"count": 42}],
                "metadata": {"eventType": "Deploy", "openEnded": true, "beginTimeMillis": 1000}
            }"#,
        )
        .expect(1)
        .create_async()
        .await;

    let resp = fixture.query_client().query_events(nrql).await.unwrap();
    mock.assert_async().await;
    assert_eq!(resp.results[0]["count"], 42);
    assert_eq!(resp.metadata.event_type, "Deploy");
    assert!(resp.metadata.open_ended);
}

#[tokio::test]
async fn test_query_error_status_surfaces() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("GET", Matcher::Regex(format!("^/{ACCOUNT}/query")))
        .with_status(403)
        .with_body("forbidden")
        .create_async()
        .await;

    let err = fixture
        .query_client()
        .query_events("SELECT * FROM Deploy")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { status: 403, .. }));
}
