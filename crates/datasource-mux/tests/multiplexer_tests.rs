//! Multiplexer behaviour over the in-memory gateway
//!
//! Core guarantees exercised here:
//! - A one-shot request receives exactly one result and is then forgotten.
//! - A poll receives every response until stopped, and nothing afterwards.
//! - Stopping a poll, explicitly or by dropping its sink, sends exactly one
//!   `poll-stop`.
//! - Messages for unknown ids have no effect.

use datasource_mux::{
    channel_transport, AuthExpiryDetector, Dispatch, ExchangeError, ExchangeId, ExchangeKind,
    InboundMessage, Multiplexer, MuxConfig, MuxError, OutboundMessage, ResourceSpec, RouterConfig,
};
use datasource_test_utils::{drain_poll_stops, next_sent, ok, settle, setup_mux, status, warning};
use futures::StreamExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn request_receives_single_success() {
    let (mux, mut gateway) = setup_mux();
    let sink = mux.request(ResourceSpec::url("/namespaces")).unwrap();
    let id = sink.id();

    let sent = next_sent(&mut gateway).await;
    assert!(matches!(sent, OutboundMessage::Request(_)));
    assert_eq!(sent.resource().url, "/namespaces");

    gateway.deliver(ok(id, json!(["default"])));
    assert_eq!(sink.await, Ok(json!(["default"])));
    assert!(!mux.is_live(id));
}

#[tokio::test]
async fn request_receives_single_error() {
    let (mux, mut gateway) = setup_mux();
    let sink = mux.request(ResourceSpec::url("/apps/missing")).unwrap();
    let id = next_sent(&mut gateway).await.id();

    gateway.deliver(status(id, 404, json!("not found")));
    gateway.deliver(ok(id, json!("late duplicate")));

    let err = sink.await.unwrap_err();
    assert_eq!(
        err,
        ExchangeError::Response {
            status_code: 404,
            response: json!("not found")
        }
    );
    settle().await;
    assert_eq!(mux.live_count(), 0);
}

#[tokio::test]
async fn taken_result_is_not_handed_out_again() {
    let (mux, mut gateway) = setup_mux();
    let mut sink = mux.request(ResourceSpec::url("/x")).unwrap();
    let id = next_sent(&mut gateway).await.id();

    gateway.deliver(ok(id, json!(1)));
    settle().await;

    assert_eq!(sink.try_take(), Some(Ok(json!(1))));
    assert_eq!(sink.try_take(), None);
    assert!(sink.is_taken());

    let waited = tokio::time::timeout(std::time::Duration::from_millis(20), sink).await;
    assert!(waited.is_err());
}

/// Tenet: three values arrive, the poll is stopped, the fourth is dropped.
#[tokio::test]
async fn poll_delivers_until_stopped() {
    let (mux, mut gateway) = setup_mux();
    let mut runs = mux
        .poll(ResourceSpec::url("/runs").with_interval(1000))
        .unwrap();
    let id = runs.id();

    let start = next_sent(&mut gateway).await;
    assert_eq!(start.action(), "poll-start");
    assert_eq!(start.resource().interval, Some(1000));

    for n in 1..=3 {
        gateway.deliver(ok(id, json!(n)));
        assert_eq!(runs.next().await, Some(Ok(json!(n))));
    }

    assert!(mux.stop_poll(&runs));
    let stop = next_sent(&mut gateway).await;
    assert_eq!(stop.action(), "poll-stop");
    assert_eq!(stop.id(), id);

    gateway.deliver(ok(id, json!(4)));
    assert_eq!(runs.next().await, None);
    assert!(!mux.is_live(id));

    drop(runs);
    settle().await;
    assert!(gateway.try_recv().is_none());
}

#[tokio::test]
async fn poll_survives_error_responses() {
    let (mux, mut gateway) = setup_mux();
    let mut status_poll = mux.poll(ResourceSpec::url("/status")).unwrap();
    let id = next_sent(&mut gateway).await.id();

    gateway.deliver(status(id, 503, json!("starting")));
    gateway.deliver(warning(id, json!("degraded")));
    gateway.deliver(ok(id, json!("RUNNING")));

    assert_eq!(
        status_poll.next().await.unwrap().unwrap_err().status_code(),
        Some(503)
    );
    assert!(status_poll.next().await.unwrap().is_err());
    assert_eq!(status_poll.next().await, Some(Ok(json!("RUNNING"))));
    assert!(mux.is_live(id));
}

#[tokio::test]
async fn orphaned_message_has_no_effect() {
    let (mux, mut gateway) = setup_mux();
    let mut live = mux.poll(ResourceSpec::url("/live")).unwrap();
    let live_id = next_sent(&mut gateway).await.id();

    gateway.deliver(ok(ExchangeId::new(), json!("stray")));
    gateway.deliver(ok(live_id, json!("mine")));

    assert_eq!(live.next().await, Some(Ok(json!("mine"))));
    assert_eq!(mux.live_count(), 1);
    assert!(live.try_next().is_none());
}

#[tokio::test]
async fn dropping_poll_sink_stops_poll_once() {
    let (mux, mut gateway) = setup_mux();
    let sink = mux.poll(ResourceSpec::url("/metrics")).unwrap();
    let id = sink.id();
    next_sent(&mut gateway).await;

    drop(sink);
    assert_eq!(drain_poll_stops(&mut gateway), vec![id]);
    assert!(!mux.is_live(id));
    assert!(!mux.stop_poll(id));
    assert!(gateway.try_recv().is_none());
}

#[tokio::test]
async fn cancel_matches_stop_poll() {
    let (mux, mut gateway) = setup_mux();
    let sink = mux.poll(ResourceSpec::url("/metrics")).unwrap();
    let id = sink.id();
    gateway.drain();

    sink.cancel();
    assert_eq!(drain_poll_stops(&mut gateway), vec![id]);
    assert_eq!(mux.live_count(), 0);
}

#[tokio::test]
async fn stop_poll_accepts_descriptor() {
    let (mux, mut gateway) = setup_mux();
    let _sink = mux.poll(ResourceSpec::url("/x")).unwrap();
    let start = next_sent(&mut gateway).await;

    assert!(mux.stop_poll(start.resource()));
    assert!(!mux.stop_poll(start.resource()));
    assert_eq!(drain_poll_stops(&mut gateway).len(), 1);
}

#[tokio::test]
async fn stop_unknown_id_is_noop() {
    let (mux, mut gateway) = setup_mux();
    assert!(!mux.stop_poll(ExchangeId::new()));
    assert!(gateway.try_recv().is_none());
}

/// Tenet: destroy stops each live poll exactly once and forgets everything.
#[tokio::test]
async fn destroy_stops_every_poll_once() {
    let (mux, mut gateway) = setup_mux();
    let polls: Vec<_> = (0..3)
        .map(|n| mux.poll(ResourceSpec::url(format!("/poll/{n}"))).unwrap())
        .collect();
    let pending = mux.request(ResourceSpec::url("/pending")).unwrap();
    gateway.drain();

    mux.destroy();
    mux.destroy();

    let mut stopped = drain_poll_stops(&mut gateway);
    let mut expected: Vec<_> = polls.iter().map(|p| p.id()).collect();
    stopped.sort();
    expected.sort();
    assert_eq!(stopped, expected);
    assert_eq!(mux.live_count(), 0);
    assert_eq!(pending.await, Err(ExchangeError::Abandoned));

    drop(polls);
    assert!(gateway.try_recv().is_none());
    assert!(matches!(
        mux.poll(ResourceSpec::url("/again")),
        Err(MuxError::Destroyed)
    ));
}

#[tokio::test]
async fn dropping_multiplexer_destroys_it() {
    let (mux, mut gateway) = setup_mux();
    let mut sink = mux.poll(ResourceSpec::url("/x")).unwrap();
    let id = sink.id();
    gateway.drain();

    drop(mux);
    assert_eq!(drain_poll_stops(&mut gateway), vec![id]);
    assert_eq!(sink.next().await, None);
}

/// Tenet: messages dispatched before a stop are still received.
#[tokio::test]
async fn values_dispatched_before_stop_are_kept() {
    let (mux, _gateway) = setup_mux();
    let mut sink = mux.poll(ResourceSpec::url("/x")).unwrap();
    let id = sink.id();

    assert_eq!(
        mux.dispatch(&ok(id, json!(1))),
        Dispatch::Delivered {
            kind: ExchangeKind::Poll,
            error: false
        }
    );
    mux.dispatch(&ok(id, json!(2)));
    mux.stop_poll(id);
    assert_eq!(mux.dispatch(&ok(id, json!(3))), Dispatch::Orphaned);

    let received: Vec<_> = sink.by_ref().collect().await;
    assert_eq!(received, vec![Ok(json!(1)), Ok(json!(2))]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stops_send_one_poll_stop() {
    let (mux, mut gateway) = setup_mux();
    let mux = Arc::new(mux);
    let sink = mux.poll(ResourceSpec::url("/x")).unwrap();
    let id = sink.id();
    gateway.drain();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let mux = Arc::clone(&mux);
            tokio::spawn(async move { mux.stop_poll(id) })
        })
        .collect();
    let mut wins = 0;
    for task in tasks {
        if task.await.unwrap() {
            wins += 1;
        }
    }
    drop(sink);

    assert_eq!(wins, 1);
    assert_eq!(drain_poll_stops(&mut gateway), vec![id]);
}

#[tokio::test]
async fn handlers_see_messages_in_order_before_delivery() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&seen);
    let second = Arc::clone(&seen);
    let detector = Arc::new(AuthExpiryDetector::new());

    let (transport, mut gateway) = channel_transport(16);
    let mux = Multiplexer::builder()
        .with_handler(move |m: &InboundMessage| first.lock().push(("first", m.status_code)))
        .with_handler(move |m: &InboundMessage| second.lock().push(("second", m.status_code)))
        .with_shared_handler(detector.clone())
        .build(Arc::new(transport));

    let sink = mux.request(ResourceSpec::url("/secure")).unwrap();
    let id = next_sent(&mut gateway).await.id();
    gateway.deliver(status(id, 401, json!("expired")));

    assert!(sink.await.unwrap_err().is_auth_expired());
    assert_eq!(
        *seen.lock(),
        vec![("first", Some(401)), ("second", Some(401))]
    );
    assert!(detector.is_expired());
}

#[tokio::test]
async fn handlers_skip_orphans() {
    let seen = Arc::new(Mutex::new(0_usize));
    let counter = Arc::clone(&seen);
    let (transport, _gateway) = channel_transport(16);
    let mux = Multiplexer::builder()
        .with_handler(move |_: &InboundMessage| *counter.lock() += 1)
        .build(Arc::new(transport));

    mux.dispatch(&ok(ExchangeId::new(), json!(1)));
    assert_eq!(*seen.lock(), 0);
}

#[tokio::test]
async fn multiplexers_share_one_transport() {
    let (transport, mut gateway) = channel_transport(16);
    let a = Multiplexer::new(Arc::new(transport.clone()), MuxConfig::default());
    let b = Multiplexer::new(Arc::new(transport), MuxConfig::default());
    assert_eq!(gateway.subscriber_count(), 2);

    let mut from_a = a.poll(ResourceSpec::url("/a")).unwrap();
    let mut from_b = b.poll(ResourceSpec::url("/b")).unwrap();
    gateway.drain();

    gateway.deliver(ok(from_b.id(), json!("b")));
    gateway.deliver(ok(from_a.id(), json!("a")));

    assert_eq!(from_a.next().await, Some(Ok(json!("a"))));
    assert_eq!(from_b.next().await, Some(Ok(json!("b"))));
    assert!(from_a.try_next().is_none());
}

#[tokio::test]
async fn symbolic_paths_use_router_config() {
    let config = MuxConfig::new()
        .with_router(RouterConfig::new("router.internal").with_ssl(true))
        .with_default_poll_interval_ms(2500);
    let (transport, mut gateway) = channel_transport(16);
    let mux = Multiplexer::new(Arc::new(transport), config);

    let _sink = mux
        .poll(
            ResourceSpec::path("/namespaces/default/apps")
                .with_param("artifactName", "cdap-data-pipeline"),
        )
        .unwrap();
    let sent = next_sent(&mut gateway).await;
    assert_eq!(
        sent.resource().url,
        "https://router.internal:10443/v3/namespaces/default/apps?artifactName=cdap-data-pipeline"
    );
    assert_eq!(sent.resource().interval, Some(2500));
}
