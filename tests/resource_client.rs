mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use futures_util::future::AbortHandle;
use realtor_client::client::RequestSpec;
use realtor_client::clock::MockClock;
use realtor_client::error::ClientError;
use realtor_client::session::{MemoryStorage, Role, UserProfile};
use serde_json::{Value, json};

use common::{FakeBackend, LIVE_TOKEN, RecordingHost, build_client, client_for, test_config};

fn agent() -> UserProfile {
    UserProfile {
        id: "1".into(),
        name: "A".into(),
        email: "a@b.com".into(),
        role: Role::User,
        subscription: None,
    }
}

#[tokio::test]
async fn cacheable_get_is_fetched_once_within_ttl() {
    let backend = FakeBackend::start().await;
    let host = RecordingHost::new();
    let (app, _clock) = client_for(&backend.base_url(), host.clone()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    let first: Value = app
        .client
        .request(RequestSpec::get("/leads").cacheable())
        .await
        .unwrap();
    let second: Value = app
        .client
        .request(RequestSpec::get("/leads").cacheable())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.hits("/leads"), 1);
    assert!(host.notices().is_empty());
}

#[tokio::test]
async fn cached_value_served_until_ttl_then_refetched() {
    let backend = FakeBackend::start().await;
    let (app, clock) = client_for(&backend.base_url(), RecordingHost::new()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();
    let spec = RequestSpec::get("/leads").cacheable();

    // t=0
    let initial: Value = app.client.request(spec.clone()).await.unwrap();
    assert_eq!(backend.hits("/leads"), 1);

    // t=300s
    clock.advance(ChronoDuration::seconds(300));
    let cached: Value = app.client.request(spec.clone()).await.unwrap();
    assert_eq!(cached, initial);
    assert_eq!(backend.hits("/leads"), 1);

    // t=700s
    clock.advance(ChronoDuration::seconds(400));
    let fresh: Value = app.client.request(spec).await.unwrap();
    assert_eq!(backend.hits("/leads"), 2);
    assert_eq!(fresh["served"], json!(2));
}

#[tokio::test]
async fn non_cacheable_requests_always_hit_network() {
    let backend = FakeBackend::start().await;
    let (app, _clock) = client_for(&backend.base_url(), RecordingHost::new()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    for _ in 0..3 {
        let _: Value = app.client.request(RequestSpec::get("/leads")).await.unwrap();
    }
    assert_eq!(backend.hits("/leads"), 3);
}

#[tokio::test]
async fn missing_token_fails_fast_with_one_notice_per_call() {
    let backend = FakeBackend::start().await;
    let host = RecordingHost::new();
    let (app, _clock) = client_for(&backend.base_url(), host.clone()).await;

    let result = app.client.request::<Value>(RequestSpec::get("/leads")).await;
    assert!(matches!(result, Err(ClientError::AuthRequired)));
    assert_eq!(backend.hits("/leads"), 0);
    assert_eq!(host.notices().len(), 1);

    let _ = app.client.request::<Value>(RequestSpec::get("/leads")).await;
    assert_eq!(host.notices().len(), 2);
}

#[tokio::test]
async fn unauthorized_response_destroys_session() {
    let backend = FakeBackend::start().await;
    let host = RecordingHost::new();
    let (app, _clock) = client_for(&backend.base_url(), host.clone()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();
    assert!(app.access.is_authenticated());

    let result = app.client.request::<Value>(RequestSpec::get("/expired")).await;

    assert!(matches!(result, Err(ClientError::Auth)));
    assert!(!app.access.is_authenticated());
    assert!(app.session.get().token().is_none());
    assert_eq!(host.notices().len(), 1);
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let backend = FakeBackend::start().await;
    let host = RecordingHost::new();
    let (app, _clock) = client_for(&backend.base_url(), host.clone()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    match app.client.request::<Value>(RequestSpec::get("/broken")).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Database unavailable");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(host.notices()[0].message, "Database unavailable");

    match app.client.request::<Value>(RequestSpec::get("/opaque")).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 503);
            assert!(message.contains("503"));
        }
        other => panic!("unexpected result {:?}", other),
    }
    // 非 401 的错误不影响会话
    assert!(app.access.is_authenticated());
}

#[tokio::test]
async fn transport_failure_is_network_error() {
    let host = RecordingHost::new();
    let (app, _clock) = client_for(&common::unreachable_base_url(), host.clone()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    let result = app.client.request::<Value>(RequestSpec::get("/leads")).await;

    assert!(matches!(result, Err(ClientError::Network(_))));
    assert!(app.access.is_authenticated());
    assert_eq!(host.notices().len(), 1);
}

#[tokio::test]
async fn bearer_token_headers_and_body_are_sent() {
    let backend = FakeBackend::start().await;
    let (app, _clock) = client_for(&backend.base_url(), RecordingHost::new()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    let echoed: Value = app
        .client
        .request(
            RequestSpec::post("/echo")
                .header("x-trace", "t-42")
                .json(json!({ "listing": 7 })),
        )
        .await
        .unwrap();

    assert_eq!(echoed["authorization"], json!(format!("Bearer {}", LIVE_TOKEN)));
    assert_eq!(echoed["x-trace"], json!("t-42"));
    let body: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(body, json!({ "listing": 7 }));
}

#[tokio::test]
async fn aborted_request_resolves_without_notice() {
    let backend = FakeBackend::start().await;
    let host = RecordingHost::new();
    let (app, _clock) = client_for(&backend.base_url(), host.clone()).await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    let (handle, registration) = AbortHandle::new_pair();
    let request = app
        .client
        .request_abortable::<Value>(RequestSpec::get("/slow"), registration);
    let abort = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    };

    let (result, _) = tokio::join!(request, abort);
    assert!(matches!(result, Err(ClientError::Aborted)));
    assert!(host.notices().is_empty());
}

#[tokio::test]
async fn configured_timeout_is_a_network_error() {
    let backend = FakeBackend::start().await;
    let mut config = test_config(&backend.base_url());
    config.request_timeout_secs = Some(1);
    let clock = MockClock::default();
    let app = build_client(
        config,
        Arc::new(MemoryStorage::new()),
        RecordingHost::new(),
        &clock,
    )
    .await;
    app.session.set(agent(), LIVE_TOKEN.into()).await.unwrap();

    let result = app.client.request::<Value>(RequestSpec::get("/slow")).await;
    assert!(matches!(result, Err(ClientError::Network(_))));
}
