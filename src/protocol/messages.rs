//! Inbound message DTOs and the strict classification parser.
//!
//! [`parse`] turns one raw WebSocket text payload into exactly one
//! [`Inbound`] variant, or `None`. Parsing is strict: unknown enum values,
//! missing required fields, wrong JSON types, empty required strings, a book
//! update without levels, or a timestamp on a book snapshot all cause the
//! message to be discarded. A discard is logged at debug level and causes no
//! state change — malformed input is never fatal.
//!
//! The one deliberate leniency: Kraken's documentation marks `success` as
//! required on pong responses, but the live exchange omits it, so the pong
//! parser treats it as optional.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::protocol::ReqId;
use crate::protocol::channel::Channel;
use crate::symbol::Symbol;

// ---------------------------------------------------------------------------
// Classified inbound message
// ---------------------------------------------------------------------------

/// One parsed inbound message.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A subscribe/unsubscribe acknowledgment.
    Ack(MethodAck),
    /// A reply to an application-level ping.
    Pong(Pong),
    /// A top-level error notice with no method or channel.
    Rejection(RejectionNotice),
    /// A system status update.
    Status(StatusData),
    /// A batch of trades (snapshot or update).
    Trade(TradeMessage),
    /// An order-book snapshot or update.
    Book(BookMessage),
    /// A heartbeat. Carries no data; its liveness value is already captured
    /// at the transport.
    Heartbeat,
}

/// Whether a data message is an initial snapshot or an incremental update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Initial state of the feed after subscribing.
    Snapshot,
    /// Incremental change.
    Update,
}

// ---------------------------------------------------------------------------
// ACKs
// ---------------------------------------------------------------------------

/// The `result` object of a successful subscribe/unsubscribe ACK.
///
/// Kraken acknowledges one symbol per ACK message even when the request
/// carried several.
#[derive(Debug, Clone, Deserialize)]
pub struct AckResult {
    /// The channel the ACK applies to.
    pub channel: Channel,
    /// The single acknowledged symbol.
    pub symbol: Symbol,
    /// Echo of the request's snapshot flag.
    #[serde(default)]
    pub snapshot: Option<bool>,
    /// Echo of the request's book depth.
    #[serde(default)]
    pub depth: Option<u16>,
    /// Non-fatal warnings attached by the exchange.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A subscribe or unsubscribe acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodAck {
    /// `subscribe` or `unsubscribe` (guaranteed by classification).
    pub method: String,
    /// Whether the exchange accepted the request for this symbol.
    pub success: bool,
    /// The originating request identity.
    #[serde(default)]
    pub req_id: Option<ReqId>,
    /// Error message (present on failure).
    #[serde(default)]
    pub error: Option<String>,
    /// On failure the rejected symbol rides at the top level; there is no
    /// `result` object.
    #[serde(default)]
    pub symbol: Option<Symbol>,
    /// Present on success.
    #[serde(default)]
    pub result: Option<AckResult>,
    /// Exchange receive timestamp.
    #[serde(default)]
    pub time_in: Option<DateTime<Utc>>,
    /// Exchange transmit timestamp.
    #[serde(default)]
    pub time_out: Option<DateTime<Utc>>,
}

impl MethodAck {
    /// The symbol the ACK addresses, wherever it rides.
    pub fn ack_symbol(&self) -> Option<&Symbol> {
        self.result
            .as_ref()
            .map(|r| &r.symbol)
            .or(self.symbol.as_ref())
    }

    /// The channel the ACK addresses, when the message names one.
    pub fn ack_channel(&self) -> Option<Channel> {
        self.result.as_ref().map(|r| r.channel)
    }

    /// Whether this acknowledges a subscribe (vs. unsubscribe).
    pub fn is_subscribe(&self) -> bool {
        self.method == "subscribe"
    }
}

// ---------------------------------------------------------------------------
// Pong
// ---------------------------------------------------------------------------

/// The `result` object of a pong response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PongResult {
    /// Non-fatal warnings attached by the exchange.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A reply to an application-level ping.
#[derive(Debug, Clone, Deserialize)]
pub struct Pong {
    /// Echo of the ping's request identity.
    #[serde(default)]
    pub req_id: Option<ReqId>,
    /// Optional in practice, whatever the documentation says.
    #[serde(default)]
    pub success: Option<bool>,
    /// Error message (required when `success` is `false`).
    #[serde(default)]
    pub error: Option<String>,
    /// Present on explicit success.
    #[serde(default)]
    pub result: Option<PongResult>,
    /// Exchange receive timestamp.
    #[serde(default)]
    pub time_in: Option<DateTime<Utc>>,
    /// Exchange transmit timestamp.
    #[serde(default)]
    pub time_out: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Rejection notice
// ---------------------------------------------------------------------------

/// A top-level error notice: `{"error":"...","req_id":?,"symbol":?}` with no
/// `method` and no `channel`.
///
/// The exchange sends these for requests it refuses to acknowledge. The
/// notice may address a pending request, or trim an already-acknowledged
/// subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct RejectionNotice {
    /// The exchange's error message.
    pub error: String,
    /// The request the notice addresses, when known.
    #[serde(default)]
    pub req_id: Option<ReqId>,
    /// The symbol the notice addresses, when known.
    #[serde(default)]
    pub symbol: Option<Symbol>,
    /// Exchange receive timestamp.
    #[serde(default)]
    pub time_in: Option<DateTime<Utc>>,
    /// Exchange transmit timestamp.
    #[serde(default)]
    pub time_out: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Trading-engine state reported on the status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    /// Normal operation.
    Online,
    /// The exchange is down for maintenance.
    Maintenance,
    /// Only order cancellations are accepted.
    CancelOnly,
    /// Only post-only orders are accepted.
    PostOnly,
    /// Only reducing orders are accepted.
    ReduceOnly,
}

/// One system status update.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    /// Trading engine state.
    pub system: SystemState,
    /// WebSocket API version (e.g. `"v2"`).
    pub api_version: String,
    /// Unique identifier of this WebSocket connection.
    pub connection_id: u64,
    /// WebSocket service version.
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    data: Vec<StatusData>,
}

// ---------------------------------------------------------------------------
// Trade data
// ---------------------------------------------------------------------------

/// Taker side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buyer was the taker.
    Buy,
    /// Seller was the taker.
    Sell,
}

/// Order type behind a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
}

/// One executed trade.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeEntry {
    /// Instrument the trade executed on.
    pub symbol: Symbol,
    /// Taker side.
    pub side: Side,
    /// Execution price.
    pub price: f64,
    /// Executed quantity (base currency).
    pub qty: f64,
    /// Order type of the taker order.
    #[serde(default)]
    pub ord_type: Option<OrdType>,
    /// Exchange trade identifier.
    #[serde(default)]
    pub trade_id: Option<u64>,
    /// Execution time.
    pub timestamp: DateTime<Utc>,
}

/// A batch of trades from one `trade` channel message.
#[derive(Debug, Clone)]
pub struct TradeMessage {
    /// Snapshot of recent trades, or live update.
    pub kind: DataKind,
    /// The executed trades, in exchange order.
    pub trades: Vec<TradeEntry>,
}

#[derive(Debug, Deserialize)]
struct TradeEnvelope {
    #[serde(rename = "type")]
    kind: DataKind,
    data: Vec<TradeEntry>,
}

// ---------------------------------------------------------------------------
// Book data
// ---------------------------------------------------------------------------

/// One price level of an order book side.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BookLevel {
    /// Price of the level.
    pub price: f64,
    /// Quantity resting at the level (`0` removes the level on updates).
    pub qty: f64,
}

/// One order-book payload: full snapshot or incremental delta for a single
/// symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct BookData {
    /// Instrument the book belongs to.
    pub symbol: Symbol,
    /// Bid levels, best first.
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    /// Ask levels, best first.
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    /// CRC32 checksum of the top-10 book state after applying this payload.
    pub checksum: u32,
    /// Required on updates, forbidden on snapshots.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// An order-book message from the `book` channel.
#[derive(Debug, Clone)]
pub struct BookMessage {
    /// Snapshot or incremental update.
    pub kind: DataKind,
    /// One payload per symbol (in practice exactly one).
    pub books: Vec<BookData>,
}

#[derive(Debug, Deserialize)]
struct BookEnvelope {
    #[serde(rename = "type")]
    kind: DataKind,
    data: Vec<BookData>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Parse one raw payload into a classified inbound message.
///
/// Evaluation order follows the envelope shape: `method` messages first
/// (ACKs, pong), then `channel` messages (status, data, heartbeat), then
/// channel-less rejection notices. Returns `None` for anything malformed or
/// unrecognized.
pub fn parse(text: &str) -> Option<Inbound> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed JSON message");
            return None;
        }
    };

    let obj = value.as_object()?;

    if let Some(method) = obj.get("method").and_then(Value::as_str) {
        return match method {
            "subscribe" | "unsubscribe" => parse_ack(&value),
            "pong" => parse_pong(&value),
            other => {
                tracing::debug!(method = other, "discarding message with unknown method");
                None
            }
        };
    }

    if let Some(channel) = obj.get("channel").and_then(Value::as_str) {
        return match channel {
            "status" => parse_status(&value),
            "trade" => parse_trade(&value),
            "book" => parse_book(&value),
            "heartbeat" => Some(Inbound::Heartbeat),
            other => {
                tracing::debug!(channel = other, "discarding message for unknown channel");
                None
            }
        };
    }

    if obj.contains_key("error") {
        return parse_rejection(&value);
    }

    tracing::debug!("discarding unrecognized message");
    None
}

fn parse_ack(value: &Value) -> Option<Inbound> {
    let ack: MethodAck = match MethodAck::deserialize(value) {
        Ok(ack) => ack,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed ACK");
            return None;
        }
    };

    if ack.success && ack.result.is_none() {
        tracing::debug!("discarding success ACK without result");
        return None;
    }
    if !ack.success && ack.error.as_deref().unwrap_or("").is_empty() {
        tracing::debug!("discarding failure ACK without error message");
        return None;
    }
    if ack.ack_symbol().is_some_and(|s| s.is_empty()) {
        tracing::debug!("discarding ACK with empty symbol");
        return None;
    }

    Some(Inbound::Ack(ack))
}

fn parse_pong(value: &Value) -> Option<Inbound> {
    let pong: Pong = match Pong::deserialize(value) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed pong");
            return None;
        }
    };

    if pong.success == Some(false) && pong.error.as_deref().unwrap_or("").is_empty() {
        tracing::debug!("discarding failed pong without error message");
        return None;
    }

    Some(Inbound::Pong(pong))
}

fn parse_rejection(value: &Value) -> Option<Inbound> {
    let notice: RejectionNotice = match RejectionNotice::deserialize(value) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed rejection notice");
            return None;
        }
    };

    if notice.error.is_empty() {
        tracing::debug!("discarding rejection notice with empty error");
        return None;
    }
    if notice.symbol.as_deref().is_some_and(str::is_empty) {
        tracing::debug!("discarding rejection notice with empty symbol");
        return None;
    }

    Some(Inbound::Rejection(notice))
}

fn parse_status(value: &Value) -> Option<Inbound> {
    let envelope: StatusEnvelope = match StatusEnvelope::deserialize(value) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed status update");
            return None;
        }
    };

    // The status object is always the first and only element of `data`.
    let status = envelope.data.into_iter().next()?;
    if status.api_version.is_empty() || status.version.is_empty() {
        tracing::debug!("discarding status update with empty version field");
        return None;
    }

    Some(Inbound::Status(status))
}

fn parse_trade(value: &Value) -> Option<Inbound> {
    let envelope: TradeEnvelope = match TradeEnvelope::deserialize(value) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed trade message");
            return None;
        }
    };

    if envelope.data.is_empty() {
        tracing::debug!("discarding trade message with empty data");
        return None;
    }
    if envelope.data.iter().any(|t| t.symbol.is_empty()) {
        tracing::debug!("discarding trade message with empty symbol");
        return None;
    }

    Some(Inbound::Trade(TradeMessage {
        kind: envelope.kind,
        trades: envelope.data,
    }))
}

fn parse_book(value: &Value) -> Option<Inbound> {
    let envelope: BookEnvelope = match BookEnvelope::deserialize(value) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed book message");
            return None;
        }
    };

    if envelope.data.is_empty() {
        tracing::debug!("discarding book message with empty data");
        return None;
    }

    for book in &envelope.data {
        if book.symbol.is_empty() {
            tracing::debug!("discarding book message with empty symbol");
            return None;
        }
        match envelope.kind {
            DataKind::Snapshot => {
                if book.timestamp.is_some() {
                    tracing::debug!("discarding book snapshot carrying a timestamp");
                    return None;
                }
            }
            DataKind::Update => {
                if book.timestamp.is_none() {
                    tracing::debug!("discarding book update without timestamp");
                    return None;
                }
                if book.bids.is_empty() && book.asks.is_empty() {
                    tracing::debug!("discarding book update without levels");
                    return None;
                }
            }
        }
    }

    Some(Inbound::Book(BookMessage {
        kind: envelope.kind,
        books: envelope.data,
    }))
}
