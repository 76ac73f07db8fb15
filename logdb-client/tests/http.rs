//! Wire protocol tests for the HTTP transport against a mock LogDB server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use logdb_client::{ClientConfig, ConflictPolicy, Error, EventRecord, LogDb};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri(), TOKEN)
        .with_poll_interval(Duration::from_millis(1))
        .with_conflict_policy(ConflictPolicy {
            max_retries: Some(3),
            backoff: Duration::ZERO,
        })
}

async fn request_body(server: &MockServer, index: usize) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests[index].body).unwrap()
}

#[tokio::test]
async fn emit_posts_record_with_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    assert!(client.emit("order.created", &json!({"id": 1})).await.unwrap());

    let body = request_body(&server, 0).await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["evt_type"], "order.created");
    assert_eq!(records[0]["payload"], "{\"id\":1}");
    assert!(records[0]["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn emit_bulk_sends_one_batch_with_shared_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    assert!(
        client
            .emit_bulk("metric", &[json!({"v": 1}), json!({"v": 2})])
            .await
            .unwrap()
    );

    let body = request_body(&server, 0).await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["timestamp"], records[1]["timestamp"]);
    assert_eq!(records[0]["payload"], "{\"v\":1}");
    assert_eq!(records[1]["payload"], "{\"v\":2}");
}

#[tokio::test]
async fn raw_emit_keeps_custom_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    let record = EventRecord::new("audit", 1234, "{}").with_field("source", "billing");
    assert!(client.raw_emit(record).await.unwrap());

    let body = request_body(&server, 0).await;
    assert_eq!(
        body,
        json!([{"evt_type": "audit", "timestamp": 1234, "payload": "{}", "source": "billing"}])
    );
}

#[tokio::test]
async fn write_is_only_accepted_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    assert!(!client.emit("t", &json!(1)).await.unwrap());
}

#[tokio::test]
async fn write_error_status_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    let err = client.emit("t", &json!(1)).await.unwrap_err();

    match err {
        Error::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "disk full");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_uses_limit_in_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "evt_type": "a", "payload": "{}", "timestamp": 10},
            {"id": 2, "evt_type": "b", "payload": "{}", "timestamp": 11}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    let events = client.fetch_events(25).await.unwrap();

    let ids: Vec<_> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(events[1].event_type, "b");
    assert_eq!(events[1].created_at, 11);
}

#[tokio::test]
async fn fetch_conflict_nacks_then_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/1000"))
        .respond_with(ResponseTemplate::new(409))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events/1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "evt_type": "order.created", "payload": "{\"id\":1}", "timestamp": 10}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/nack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ack/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = LogDb::connect(&config(&server)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_event(move |ctx| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().unwrap().push(ctx.id);
            Ok(())
        }
    });

    let report = client.poll_once().await;

    assert!(report.acknowledged);
    assert_eq!(*seen.lock().unwrap(), vec![7]);
}

#[tokio::test]
async fn fetch_conflict_gives_up_after_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/nack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    let err = client.fetch_events(10).await.unwrap_err();

    assert!(matches!(err, Error::ConflictRetriesExhausted { attempts: 4 }));
}

#[tokio::test]
async fn failed_nack_aborts_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/nack"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();
    let err = client.fetch_events(10).await.unwrap_err();

    assert!(matches!(err, Error::Status { status: 503, .. }));
}

#[tokio::test]
async fn fetch_failure_still_acks_unchanged_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ack/0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = LogDb::connect(&config(&server)).unwrap();
    let report = client.poll_once().await;

    assert!(report.fetch_failed);
    assert!(report.acknowledged);
    assert_eq!(report.cursor, 0);
}

#[tokio::test]
async fn empty_fetch_still_acks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ack/0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = LogDb::connect(&config(&server)).unwrap();
    client.poll_once().await;
    client.poll_once().await;
}

#[tokio::test]
async fn ack_and_nack_report_acceptance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ack/42"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/nack"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = LogDb::connect(&config(&server)).unwrap();

    assert!(client.ack(42).await.unwrap());
    assert!(!client.nack().await.unwrap());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let client = LogDb::connect(&ClientConfig::new("http://127.0.0.1:1", TOKEN)).unwrap();
    let err = client.ack(1).await.unwrap_err();

    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn failed_ack_keeps_polling_and_skips_redelivery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "evt_type": "order.created", "payload": "{}", "timestamp": 10}
        ])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ack/3"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ack/3"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = LogDb::connect(&config(&server)).unwrap();

    let first = client.poll_once().await;
    assert!(!first.fetch_failed);
    assert!(!first.acknowledged);
    assert_eq!(first.cursor, 3);
    assert_eq!(first.dispatch.accepted, 1);

    let second = client.poll_once().await;
    assert!(!second.acknowledged);
    assert_eq!(second.dispatch.skipped, 1);
    assert_eq!(second.dispatch.accepted, 0);
    assert_eq!(second.cursor, 3);
}

#[tokio::test]
async fn null_fetch_body_means_nothing_new() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/1000"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ack/0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = LogDb::connect(&config(&server)).unwrap();

    assert!(client.fetch_events(1000).await.unwrap().is_empty());

    let report = client.poll_once().await;
    assert!(!report.fetch_failed);
    assert!(report.acknowledged);
    assert_eq!(report.dispatch.received, 0);
}

#[tokio::test]
async fn slow_server_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = LogDb::connect(
        &config(&server).with_request_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let err = client.fetch_events(10).await.unwrap_err();

    match err {
        Error::Http(e) => assert!(e.is_timeout(), "expected timeout, got {e}"),
        other => panic!("expected transport error, got {other:?}"),
    }
}
