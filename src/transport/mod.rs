//! Transport layer: ownership of one WebSocket connection and the
//! transport→session message hand-off.
//!
//! - [`Transport`] — the seam between the session engine and the wire. The
//!   production implementation is [`websocket::WebSocketTransport`];
//!   integration tests drive the engine through an in-memory implementation.
//! - [`MessageBlock`] — one complete, assembled WebSocket message.
//! - [`TransportTelemetry`] — receive-path counters.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub mod websocket;

pub use websocket::WebSocketTransport;

// ---------------------------------------------------------------------------
// Message block
// ---------------------------------------------------------------------------

/// One complete WebSocket message handed from the transport to the session.
///
/// The payload is a full logical message; fragment reassembly happens below
/// this type. Ownership transfers to the session on receive.
#[derive(Debug, Clone)]
pub struct MessageBlock {
    payload: Bytes,
}

impl MessageBlock {
    /// Wrap an assembled message payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// The raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// View the payload as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

impl From<String> for MessageBlock {
    fn from(text: String) -> Self {
        Self::new(Bytes::from(text))
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Snapshot of the transport's receive-path counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportTelemetry {
    /// Total payload bytes received.
    pub bytes_rx: u64,
    /// Total assembled messages received.
    pub messages_rx: u64,
    /// Messages dropped because the hand-off channel was full.
    pub dropped: u64,
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// One WebSocket connection's worth of I/O, as seen by the session engine.
///
/// Implementations own at most one live connection at a time. `open` makes
/// exactly one upgrade attempt with no retries — reconnection policy lives in
/// [`crate::connection::Connection`], not here.
#[async_trait]
pub trait Transport: Send {
    /// Attempt exactly one WebSocket upgrade to `url`.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Send a text payload. Fire-and-forget: returns `false` on any error.
    async fn send(&mut self, payload: &str) -> bool;

    /// Close the connection. Idempotent; the closed state is observable via
    /// [`Transport::is_open`] exactly once per connection.
    async fn close(&mut self);

    /// Non-blocking pull of the next assembled message, if any.
    fn try_recv(&mut self) -> Option<MessageBlock>;

    /// Whether the connection is currently open. Flips to `false` on user
    /// close, server close frame, or receive error — whichever comes first.
    fn is_open(&self) -> bool;

    /// Whether the hand-off channel holds no undelivered messages.
    fn is_drained(&self) -> bool;

    /// Time since the last server-originated frame (data or control) was
    /// observed on this connection.
    fn idle_for(&self) -> Duration;

    /// Current receive-path counters.
    fn telemetry(&self) -> TransportTelemetry;
}
