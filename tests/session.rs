//! End-to-end session scenarios over the mock transport: subscription
//! lifecycle, replay after reconnect, rejection handling, data dispatch, and
//! the idle/intent invariants.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use common::Harness;
use wirekrak::protocol::ReqId;
use wirekrak::protocol::channel::Depth;
use wirekrak::protocol::messages::DataKind;
use wirekrak::protocol::requests::{BookSubscribe, TradeSubscribe, TradeUnsubscribe};
use wirekrak::session::SessionSignal;

// ---------------------------------------------------------------------------
// Scenario 1: happy-path trade subscribe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_trade_subscribe() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade("BTC/USD").await;
    assert_eq!(req_id, ReqId(1));

    let sent = h.mock.take_sent();
    assert_eq!(
        sent,
        vec![
            r#"{"method":"subscribe","params":{"channel":"trade","symbol":["BTC/USD"]},"req_id":1}"#
        ]
    );

    assert_eq!(h.session.trade_subscriptions().pending_requests(), 1);
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 0);

    h.confirm_trade_subscription(req_id, "BTC/USD").await;

    assert_eq!(h.session.trade_subscriptions().active_symbols(), 1);
    assert_eq!(h.session.trade_subscriptions().pending_requests(), 0);
    assert!(h.session.replay_database().trade_table().contains_symbol("BTC/USD"));
    assert!(h.session.is_idle());
}

// ---------------------------------------------------------------------------
// Scenario 2: partial rejection across reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_rejection_across_reconnect() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade_multi(&["BTC/USD", "ETH/USD"]).await;
    h.mock.take_sent();

    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    h.reject_trade_subscription(req_id, "ETH/USD").await;

    assert_eq!(h.session.replay_database().trade_table().total_symbols(), 1);
    assert!(h.session.replay_database().trade_table().contains_symbol("BTC/USD"));

    let epoch = h.force_reconnect().await;
    assert_eq!(epoch, 2);

    // Exactly one replayed subscribe, carrying only the surviving symbol and
    // the original req_id.
    let sent = h.mock.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0],
        format!(
            r#"{{"method":"subscribe","params":{{"channel":"trade","symbol":["BTC/USD"]}},"req_id":{req_id}}}"#
        )
    );

    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 1);
    assert!(h.session.trade_subscriptions().is_active("BTC/USD"));
    assert!(!h.session.trade_subscriptions().is_active("ETH/USD"));
}

// ---------------------------------------------------------------------------
// Scenario 4: book snapshot parsing and dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn book_snapshot_reaches_callback_exactly_once() {
    let mut h = Harness::new();
    h.connect().await;

    let snapshots: Arc<Mutex<Vec<(usize, usize, u32, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = snapshots.clone();

    let req_id = h
        .session
        .subscribe_book(
            BookSubscribe::new(vec!["BTC/USD".into()]).with_depth(Depth::D10),
            move |event| {
                assert_eq!(event.kind, DataKind::Snapshot);
                sink.lock().unwrap().push((
                    event.book.asks.len(),
                    event.book.bids.len(),
                    event.book.checksum,
                    event.book.timestamp.is_some(),
                ));
            },
        )
        .await
        .unwrap();

    h.confirm_book_subscription(req_id, "BTC/USD", 10).await;

    h.mock.push_inbound(
        r#"{"channel":"book","type":"snapshot","data":[{"symbol":"BTC/USD",
            "asks":[{"price":50000.0,"qty":1.5}],"bids":[{"price":49900.0,"qty":2.0}],
            "checksum":123456}]}"#,
    );
    h.session.poll().await;

    let seen = snapshots.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (1, 1, 123456, false));
}

// ---------------------------------------------------------------------------
// Scenario 5: malformed message survives
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_book_update_is_discarded() {
    let mut h = Harness::new();
    h.connect().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let sink = calls.clone();

    let req_id = h
        .session
        .subscribe_book(BookSubscribe::new(vec!["BTC/USD".into()]), move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    h.confirm_book_subscription(req_id, "BTC/USD", 10).await;
    h.drain_signals();
    let was_idle = h.session.is_idle();

    // A book update with neither bids nor asks is schema-invalid.
    h.mock.push_inbound(
        r#"{"channel":"book","type":"update","data":[{"symbol":"BTC/USD",
            "checksum":1,"timestamp":"2024-05-01T10:00:00Z"}]}"#,
    );
    h.session.poll().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.session.is_idle(), was_idle);
    assert_eq!(h.session.book_subscriptions().active_symbols(), 1);
}

// ---------------------------------------------------------------------------
// Scenario 6: idempotent double subscribe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn idempotent_double_subscribe_sends_once() {
    let mut h = Harness::new();
    h.connect().await;

    let first = h.subscribe_trade("BTC/USD").await;
    let second = h.subscribe_trade("BTC/USD").await;

    assert!(first.is_valid());
    assert_eq!(second, ReqId::INVALID);
    assert_eq!(h.mock.take_sent().len(), 1);
    assert_eq!(h.session.trade_subscriptions().pending_requests(), 1);

    // The recycled id is handed out again.
    let third = h.subscribe_trade("ETH/USD").await;
    assert_eq!(third.0, first.0 + 1);
}

// ---------------------------------------------------------------------------
// Round-trip and idempotency laws
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribe_unsubscribe_roundtrip_leaves_nothing() {
    let mut h = Harness::new();
    h.connect().await;

    let sub_id = h.subscribe_trade("BTC/USD").await;
    h.confirm_trade_subscription(sub_id, "BTC/USD").await;

    let unsub_id = h
        .session
        .unsubscribe_trade(TradeUnsubscribe::new(vec!["BTC/USD".into()]))
        .await
        .unwrap();
    assert!(unsub_id.is_valid());

    h.confirm_trade_unsubscription(unsub_id, "BTC/USD").await;

    assert_eq!(h.session.trade_subscriptions().active_symbols(), 0);
    assert_eq!(h.session.trade_subscriptions().total_symbols(), 0);
    assert!(!h.session.replay_database().trade_table().contains_symbol("BTC/USD"));
    assert_eq!(h.session.replay_database().trade_table().total_symbols(), 0);
    assert!(h.session.is_idle());
}

#[tokio::test]
async fn unsubscribe_of_unknown_symbol_is_noop() {
    let mut h = Harness::new();
    h.connect().await;

    let id = h
        .session
        .unsubscribe_trade(TradeUnsubscribe::new(vec!["BTC/USD".into()]))
        .await
        .unwrap();
    assert_eq!(id, ReqId::INVALID);
    assert!(h.mock.take_sent().is_empty());
}

#[tokio::test]
async fn failed_unsubscribe_keeps_symbol_active() {
    let mut h = Harness::new();
    h.connect().await;

    let sub_id = h.subscribe_trade("BTC/USD").await;
    h.confirm_trade_subscription(sub_id, "BTC/USD").await;

    let unsub_id = h
        .session
        .unsubscribe_trade(TradeUnsubscribe::new(vec!["BTC/USD".into()]))
        .await
        .unwrap();
    h.reject_trade_unsubscription(unsub_id, "BTC/USD").await;

    assert!(h.session.trade_subscriptions().is_active("BTC/USD"));
    // The acknowledged intent survives too: manager and replay DB agree.
    assert_eq!(
        h.session.trade_subscriptions().total_symbols(),
        h.session.replay_database().trade_table().total_symbols()
    );
}

#[tokio::test]
async fn reconnect_restores_active_set() {
    let mut h = Harness::new();
    h.connect().await;

    let trade_id = h.subscribe_trade_multi(&["BTC/USD", "ETH/USD"]).await;
    h.confirm_trade_subscription(trade_id, "BTC/USD").await;
    h.confirm_trade_subscription(trade_id, "ETH/USD").await;

    let book_id = h
        .session
        .subscribe_book(
            BookSubscribe::new(vec!["SOL/USD".into()]).with_depth(Depth::D25),
            |_| {},
        )
        .await
        .unwrap();
    h.confirm_book_subscription(book_id, "SOL/USD", 25).await;

    let active_before = h.session.trade_subscriptions().active_symbols();
    h.mock.take_sent();

    h.force_reconnect().await;

    // One replayed request per stored req_id, across both channels.
    let sent = h.mock.take_sent();
    assert_eq!(sent.len(), 2);

    h.confirm_trade_subscription(trade_id, "BTC/USD").await;
    h.confirm_trade_subscription(trade_id, "ETH/USD").await;
    h.confirm_book_subscription(book_id, "SOL/USD", 25).await;

    assert_eq!(h.session.trade_subscriptions().active_symbols(), active_before);
    assert_eq!(h.session.book_subscriptions().active_symbols(), 1);
    assert!(h.session.is_idle());
}

#[tokio::test]
async fn replay_fires_only_once_per_epoch() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade("BTC/USD").await;
    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    h.mock.take_sent();

    h.force_reconnect().await;
    assert_eq!(h.mock.sent_count(), 1);

    // Poll storms between epochs must not amplify in-flight work.
    let pending = h.session.pending_protocol_requests();
    for _ in 0..1000 {
        h.session.poll().await;
    }
    assert_eq!(h.mock.sent_count(), 1);
    assert_eq!(h.session.pending_protocol_requests(), pending);
}

#[tokio::test]
async fn pending_subscriptions_are_dropped_on_reconnect() {
    let mut h = Harness::new();
    h.connect().await;

    // Subscribe but never ACK: only acknowledged intent is replayed.
    h.subscribe_trade("BTC/USD").await;
    assert_eq!(h.session.trade_subscriptions().pending_requests(), 1);
    h.mock.take_sent();

    h.force_reconnect().await;

    assert_eq!(h.session.trade_subscriptions().pending_requests(), 0);
    assert_eq!(h.session.trade_subscriptions().total_symbols(), 0);
    assert!(h.mock.take_sent().is_empty());
}

#[tokio::test]
async fn callbacks_survive_replay() {
    let mut h = Harness::new();
    h.connect().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let sink = calls.clone();

    let req_id = h
        .session
        .subscribe_trade(TradeSubscribe::new(vec!["BTC/USD".into()]), move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    h.confirm_trade_subscription(req_id, "BTC/USD").await;

    h.force_reconnect().await;
    h.confirm_trade_subscription(req_id, "BTC/USD").await;

    h.mock.push_inbound(
        r#"{"channel":"trade","type":"update","data":[
            {"symbol":"BTC/USD","side":"buy","price":50000.0,"qty":0.5,
             "timestamp":"2024-05-01T10:00:00.000000Z"}]}"#,
    );
    h.session.poll().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Boundary behaviors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ack_with_unknown_req_id_is_ignored() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade("BTC/USD").await;
    h.confirm_trade_subscription(ReqId(999), "BTC/USD").await;

    // State unchanged: still pending under the real id.
    assert_eq!(h.session.trade_subscriptions().pending_requests(), 1);
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 0);
    assert_eq!(h.session.replay_database().trade_table().total_symbols(), 0);

    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 1);
}

#[tokio::test]
async fn unmatched_rejection_is_only_a_fact() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade("BTC/USD").await;
    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    h.drain_signals();

    h.push_rejection_notice(9999, "SOL/USD").await;

    assert!(h.session.rejection().is_some());
    assert_eq!(h.session.poll_signal(), Some(SessionSignal::RejectionObserved));
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 1);
    assert_eq!(h.session.replay_database().trade_table().total_symbols(), 1);
}

#[tokio::test]
async fn rejection_of_pending_symbol_cancels_it() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade_multi(&["BTC/USD", "ETH/USD"]).await;
    h.push_rejection_notice(req_id.0, "ETH/USD").await;

    assert_eq!(h.session.trade_subscriptions().pending_subscribe_symbols(), 1);

    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    h.drain_signals();
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 1);
    assert!(h.session.is_idle());
}

#[tokio::test]
async fn rejection_of_active_symbol_trims_replay_and_active() {
    let mut h = Harness::new();
    h.connect().await;

    let req_id = h.subscribe_trade_multi(&["BTC/USD", "ETH/USD"]).await;
    h.confirm_trade_subscription(req_id, "BTC/USD").await;
    h.confirm_trade_subscription(req_id, "ETH/USD").await;

    h.push_rejection_notice(req_id.0, "ETH/USD").await;

    assert!(!h.session.trade_subscriptions().is_active("ETH/USD"));
    assert!(h.session.trade_subscriptions().is_active("BTC/USD"));
    assert!(!h.session.replay_database().trade_table().contains_symbol("ETH/USD"));
    assert_eq!(
        h.session.trade_subscriptions().total_symbols(),
        h.session.replay_database().trade_table().total_symbols()
    );
}

#[tokio::test]
async fn subscribe_with_empty_symbols_is_rejected() {
    let mut h = Harness::new();
    h.connect().await;

    let result = h
        .session
        .subscribe_trade(TradeSubscribe::new(vec![]), |_| {})
        .await;
    assert!(result.is_err());
    assert!(h.mock.take_sent().is_empty());
    assert_eq!(h.session.pending_protocol_requests(), 0);
}

#[tokio::test]
async fn subscribe_while_disconnected_fails_without_side_effects() {
    let mut h = Harness::new();

    let result = h
        .session
        .subscribe_trade(TradeSubscribe::new(vec!["BTC/USD".into()]), |_| {})
        .await;
    assert!(result.is_err());
    assert_eq!(h.session.pending_protocol_requests(), 0);
}

// ---------------------------------------------------------------------------
// Facts and signals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pong_updates_fact_and_signals() {
    let mut h = Harness::new();
    h.connect().await;

    assert_eq!(h.session.pong().count, 0);

    h.mock
        .push_inbound(r#"{"method":"pong","req_id":7,"time_in":"2024-05-01T10:00:00Z"}"#);
    h.session.poll().await;

    let fact = h.session.pong();
    assert_eq!(fact.count, 1);
    assert!(fact.last_rx_ns.is_some());
    assert_eq!(h.session.poll_signal(), Some(SessionSignal::PongObserved));
}

#[tokio::test]
async fn status_updates_fact_and_signals() {
    let mut h = Harness::new();
    h.connect().await;

    h.mock.push_inbound(
        r#"{"channel":"status","type":"update","data":[{"system":"online",
            "api_version":"v2","connection_id":12345,"version":"2.0.8"}]}"#,
    );
    h.session.poll().await;

    assert_eq!(h.session.poll_signal(), Some(SessionSignal::StatusChanged));
    let status = h.session.status().expect("status fact");
    assert_eq!(status.connection_id, 12345);
}

#[tokio::test]
async fn heartbeat_is_swallowed() {
    let mut h = Harness::new();
    h.connect().await;
    h.drain_signals();

    h.mock.push_inbound(r#"{"channel":"heartbeat"}"#);
    h.session.poll().await;

    assert!(h.session.poll_signal().is_none());
    assert!(h.session.is_idle());
}

// ---------------------------------------------------------------------------
// Intent reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manager_and_replay_database_stay_reconciled() {
    let mut h = Harness::new();
    h.connect().await;

    let a = h.subscribe_trade_multi(&["BTC/USD", "ETH/USD"]).await;
    h.confirm_trade_subscription(a, "BTC/USD").await;
    h.reject_trade_subscription(a, "ETH/USD").await;

    let b = h.subscribe_trade("SOL/USD").await;
    h.confirm_trade_subscription(b, "SOL/USD").await;

    let unsub = h
        .session
        .unsubscribe_trade(TradeUnsubscribe::new(vec!["BTC/USD".into()]))
        .await
        .unwrap();
    h.confirm_trade_unsubscription(unsub, "BTC/USD").await;

    assert_eq!(
        h.session.trade_subscriptions().total_symbols(),
        h.session.replay_database().trade_table().total_symbols()
    );
    assert_eq!(h.session.trade_subscriptions().active_symbols(), 1);
    assert!(h.session.is_idle());

    // And again across a reconnect.
    h.force_reconnect().await;
    h.confirm_trade_subscription(b, "SOL/USD").await;
    assert_eq!(
        h.session.trade_subscriptions().total_symbols(),
        h.session.replay_database().trade_table().total_symbols()
    );
}
