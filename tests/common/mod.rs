#![allow(dead_code)] // not every test binary uses every helper
//! Shared test support: an in-memory transport and a session harness.
//!
//! The mock transport records everything the session sends and lets tests
//! inject inbound messages, drop the connection, and control the liveness
//! clock. The harness wraps a session over the mock with helpers for the
//! common protocol exchanges (ACKs, rejections, forced reconnects).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use wirekrak::connection::{ConnectionConfig, RetryPolicy};
use wirekrak::error::{Result, WirekrakError};
use wirekrak::protocol::ReqId;
use wirekrak::protocol::requests::TradeSubscribe;
use wirekrak::session::{Session, SessionConfig, TradeEvent};
use wirekrak::transport::{MessageBlock, Transport, TransportTelemetry};

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MockState {
    open: bool,
    fail_next_open: bool,
    opens: u32,
    sent: Vec<String>,
    inbound: VecDeque<MessageBlock>,
    last_rx: Instant,
    bytes_rx: u64,
    messages_rx: u64,
}

/// Cloneable test-side handle onto the mock's state.
#[derive(Clone)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    /// Queue an inbound message (also refreshes the liveness clock, like
    /// real traffic would).
    pub fn push_inbound(&self, text: &str) {
        let mut state = self.0.lock().unwrap();
        state.bytes_rx += text.len() as u64;
        state.messages_rx += 1;
        state.last_rx = Instant::now();
        state.inbound.push_back(MessageBlock::from(text.to_string()));
    }

    /// Simulate a server-side close / socket error.
    pub fn drop_connection(&self) {
        self.0.lock().unwrap().open = false;
    }

    /// Make the next `open` attempt fail.
    pub fn fail_next_open(&self) {
        self.0.lock().unwrap().fail_next_open = true;
    }

    /// Refresh the liveness clock without delivering a message (control
    /// frame traffic).
    pub fn touch_rx(&self) {
        self.0.lock().unwrap().last_rx = Instant::now();
    }

    /// Take everything sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.0.lock().unwrap().sent)
    }

    /// Number of messages sent so far (without draining them).
    pub fn sent_count(&self) -> usize {
        self.0.lock().unwrap().sent.len()
    }

    /// How many times `open` succeeded.
    pub fn opens(&self) -> u32 {
        self.0.lock().unwrap().opens
    }
}

/// In-memory [`Transport`] for driving the session engine in tests.
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            open: false,
            fail_next_open: false,
            opens: 0,
            sent: Vec::new(),
            inbound: VecDeque::new(),
            last_rx: Instant::now(),
            bytes_rx: 0,
            messages_rx: 0,
        }));
        (
            Self {
                state: state.clone(),
            },
            MockHandle(state),
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self, _url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(WirekrakError::InvalidArgument("mock open failure".into()));
        }
        state.open = true;
        state.opens += 1;
        state.last_rx = Instant::now();
        Ok(())
    }

    async fn send(&mut self, payload: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return false;
        }
        state.sent.push(payload.to_owned());
        true
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().open = false;
    }

    fn try_recv(&mut self) -> Option<MessageBlock> {
        self.state.lock().unwrap().inbound.pop_front()
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn is_drained(&self) -> bool {
        self.state.lock().unwrap().inbound.is_empty()
    }

    fn idle_for(&self) -> Duration {
        self.state.lock().unwrap().last_rx.elapsed()
    }

    fn telemetry(&self) -> TransportTelemetry {
        let state = self.state.lock().unwrap();
        TransportTelemetry {
            bytes_rx: state.bytes_rx,
            messages_rx: state.messages_rx,
            dropped: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Session harness
// ---------------------------------------------------------------------------

/// A session over the mock transport, plus protocol-exchange helpers.
pub struct Harness {
    pub session: Session<MockTransport>,
    pub mock: MockHandle,
}

impl Harness {
    /// Immediate reconnects, liveness windows far out of the way.
    pub fn new() -> Self {
        Self::with_config(SessionConfig {
            connection: ConnectionConfig {
                warn_window: Duration::from_secs(3600),
                kill_window: Duration::from_secs(7200),
                retry: RetryPolicy::immediate(),
            },
            disable_auto_ping: false,
        })
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let (transport, mock) = MockTransport::new();
        Self {
            session: Session::with_transport(transport, config),
            mock,
        }
    }

    /// Connect and absorb the initial `Connected` epoch.
    pub async fn connect(&mut self) {
        self.session
            .connect("wss://mock.invalid/v2")
            .await
            .expect("mock connect");
        self.session.poll().await;
    }

    /// Subscribe one symbol on the trade channel, discarding events.
    pub async fn subscribe_trade(&mut self, symbol: &str) -> ReqId {
        self.subscribe_trade_multi(&[symbol]).await
    }

    /// Subscribe several symbols on the trade channel in one request.
    pub async fn subscribe_trade_multi(&mut self, symbols: &[&str]) -> ReqId {
        self.session
            .subscribe_trade(
                TradeSubscribe::new(symbols.iter().map(|s| s.to_string()).collect()),
                |_event: &TradeEvent| {},
            )
            .await
            .expect("subscribe_trade")
    }

    /// Deliver a successful trade subscribe ACK.
    pub async fn confirm_trade_subscription(&mut self, req_id: ReqId, symbol: &str) {
        self.mock.push_inbound(&format!(
            r#"{{"method":"subscribe","success":true,"req_id":{req_id},
                "result":{{"channel":"trade","symbol":"{symbol}","snapshot":true,"warnings":[]}},
                "time_in":"2024-05-01T10:00:00.000000Z","time_out":"2024-05-01T10:00:00.000100Z"}}"#
        ));
        self.session.poll().await;
    }

    /// Deliver a failed trade subscribe ACK.
    pub async fn reject_trade_subscription(&mut self, req_id: ReqId, symbol: &str) {
        self.mock.push_inbound(&format!(
            r#"{{"method":"subscribe","success":false,"req_id":{req_id},
                "symbol":"{symbol}","error":"Currency pair not supported",
                "time_in":"2024-05-01T10:00:00.000000Z","time_out":"2024-05-01T10:00:00.000100Z"}}"#
        ));
        self.session.poll().await;
    }

    /// Deliver a successful trade unsubscribe ACK.
    pub async fn confirm_trade_unsubscription(&mut self, req_id: ReqId, symbol: &str) {
        self.mock.push_inbound(&format!(
            r#"{{"method":"unsubscribe","success":true,"req_id":{req_id},
                "result":{{"channel":"trade","symbol":"{symbol}"}},
                "time_in":"2024-05-01T10:00:00.000000Z","time_out":"2024-05-01T10:00:00.000100Z"}}"#
        ));
        self.session.poll().await;
    }

    /// Deliver a failed trade unsubscribe ACK.
    pub async fn reject_trade_unsubscription(&mut self, req_id: ReqId, symbol: &str) {
        self.mock.push_inbound(&format!(
            r#"{{"method":"unsubscribe","success":false,"req_id":{req_id},
                "symbol":"{symbol}","error":"Subscription not found",
                "time_in":"2024-05-01T10:00:00.000000Z","time_out":"2024-05-01T10:00:00.000100Z"}}"#
        ));
        self.session.poll().await;
    }

    /// Deliver a successful book subscribe ACK.
    pub async fn confirm_book_subscription(&mut self, req_id: ReqId, symbol: &str, depth: u16) {
        self.mock.push_inbound(&format!(
            r#"{{"method":"subscribe","success":true,"req_id":{req_id},
                "result":{{"channel":"book","symbol":"{symbol}","depth":{depth},"snapshot":true}},
                "time_in":"2024-05-01T10:00:00.000000Z","time_out":"2024-05-01T10:00:00.000100Z"}}"#
        ));
        self.session.poll().await;
    }

    /// Deliver a top-level rejection notice.
    pub async fn push_rejection_notice(&mut self, req_id: u64, symbol: &str) {
        self.mock.push_inbound(&format!(
            r#"{{"error":"Subscription depth not supported","req_id":{req_id},"symbol":"{symbol}"}}"#
        ));
        self.session.poll().await;
    }

    /// Drop the transport and poll until the session reconnects. Returns the
    /// new epoch.
    pub async fn force_reconnect(&mut self) -> u64 {
        self.mock.drop_connection();
        // First poll observes the close and schedules the (immediate) retry;
        // the second performs the reconnect and replays.
        self.session.poll().await;
        self.session.poll().await;
        self.session.transport_epoch()
    }

    /// Drain signals until none remain.
    pub fn drain_signals(&mut self) {
        while self.session.poll_signal().is_some() {}
    }
}
