//! Webhook sink against a local mockito relay

use mockito::Matcher;
use reply_coordination::{AlertLatch, DeliveryError, NotificationSink, UserId};
use reply_watch::sink::{LogSink, WebhookSink, RELAY_ALERT};
use serde_json::json;

/// Test: a notice is posted as `{target, content}` JSON
#[tokio::test]
async fn test_webhook_posts_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "target": "1100000000000000001",
            "content": "Hey <@1100000000000000001>, you haven't replied yet!"
        })))
        .with_status(204)
        .create_async()
        .await;

    let sink = WebhookSink::new(format!("{}/hook", server.url())).unwrap();
    sink.send(
        &UserId::from("1100000000000000001"),
        "Hey <@1100000000000000001>, you haven't replied yet!",
    )
    .await
    .unwrap();

    mock.assert_async().await;
    assert!(!sink.relay_down());
}

/// Test: a non-2xx answer is a rejected delivery carrying the status
#[tokio::test]
async fn test_webhook_rejected_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(403)
        .create_async()
        .await;

    let sink = WebhookSink::new(format!("{}/hook", server.url())).unwrap();
    let err = sink.send(&UserId::from("m1"), "text").await.unwrap_err();
    assert_eq!(
        err,
        DeliveryError::Rejected {
            target: UserId::from("m1"),
            status: 403
        }
    );
    // The relay answered; a refused target does not mean the relay is down
    assert!(!sink.relay_down());
}

/// Test: an unreachable relay is a transport error
#[tokio::test]
async fn test_webhook_transport_error() {
    let sink = WebhookSink::new("http://127.0.0.1:1/hook").unwrap();
    let err = sink.send(&UserId::from("m1"), "text").await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
    assert!(sink.relay_down());
}

/// Test: relay outage opens the latch once, recovery closes it, state persists
#[tokio::test]
async fn test_relay_alert_latch_transitions() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("alerts.json");

    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("POST", "/hook")
        .with_status(502)
        .expect(2)
        .create_async()
        .await;

    let sink = WebhookSink::new(format!("{}/hook", server.url()))
        .unwrap()
        .with_alert_latch(AlertLatch::load(&state_path));

    for _ in 0..2 {
        let err = sink.send(&UserId::from("o"), "text").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { status: 502, .. }));
    }
    failing.assert_async().await;
    assert!(sink.relay_down());
    assert!(AlertLatch::load(&state_path).is_open(RELAY_ALERT));

    failing.remove_async().await;
    let _ok = server
        .mock("POST", "/hook")
        .with_status(200)
        .create_async()
        .await;

    sink.send(&UserId::from("o"), "text").await.unwrap();
    assert!(!sink.relay_down());
    assert!(!AlertLatch::load(&state_path).is_open(RELAY_ALERT));
}

/// Test: the log sink always succeeds
#[tokio::test]
async fn test_log_sink_accepts_everything() {
    assert!(LogSink.send(&UserId::from("o"), "text").await.is_ok());
}
