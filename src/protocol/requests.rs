//! Outbound request DTOs and their canonical JSON envelopes.
//!
//! One struct per `(channel, method)` pair. Every request carries an ordered
//! symbol list, channel-specific parameters, and an optional [`ReqId`] that
//! the session fills in before sending — caller-supplied ids are overwritten.
//!
//! Serialization produces the canonical Kraken v2 envelope:
//!
//! ```json
//! {"method":"subscribe","params":{"channel":"trade","symbol":["BTC/USD"]},"req_id":42}
//! ```

use serde::Serialize;

use crate::constants::MAX_SYMBOLS_PER_REQUEST;
use crate::error::{Result, WirekrakError};
use crate::protocol::channel::{Channel, Depth, Method};
use crate::protocol::ReqId;
use crate::symbol::Symbol;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer Kraken v2 request envelope. Field order is the wire order.
#[derive(Debug, Serialize)]
struct Envelope<P: Serialize> {
    method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    req_id: Option<ReqId>,
}

// ---------------------------------------------------------------------------
// Request trait
// ---------------------------------------------------------------------------

/// Common surface of every subscribe/unsubscribe request, used by the
/// session and the replay database.
pub trait KrakenRequest: Clone + std::fmt::Debug + Send {
    /// The channel this request addresses.
    fn channel(&self) -> Channel;

    /// Subscribe or unsubscribe.
    fn method(&self) -> Method;

    /// The symbols carried by the request.
    fn symbols(&self) -> &[Symbol];

    /// Mutable access to the symbol list (replay trimming, filtering).
    fn symbols_mut(&mut self) -> &mut Vec<Symbol>;

    /// The request identity, if assigned.
    fn req_id(&self) -> Option<ReqId>;

    /// Assign the request identity.
    fn set_req_id(&mut self, id: ReqId);

    /// Serialize the canonical JSON envelope.
    fn to_wire(&self) -> Result<String>;
}

/// Validate a request's symbol list at the session boundary.
pub(crate) fn validate_symbols(symbols: &[Symbol]) -> Result<()> {
    if symbols.is_empty() {
        return Err(WirekrakError::InvalidArgument(
            "request carries no symbols".into(),
        ));
    }
    if symbols.len() > MAX_SYMBOLS_PER_REQUEST {
        return Err(WirekrakError::InvalidArgument(format!(
            "request carries {} symbols (max {MAX_SYMBOLS_PER_REQUEST})",
            symbols.len()
        )));
    }
    if symbols.iter().any(|s| s.is_empty()) {
        return Err(WirekrakError::InvalidArgument(
            "request carries an empty symbol".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TradeSubscribeParams<'a> {
    channel: Channel,
    symbol: &'a [Symbol],
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<bool>,
}

/// Subscribe to the trade feed for a set of symbols.
#[derive(Debug, Clone)]
pub struct TradeSubscribe {
    /// Symbols to subscribe (non-empty, at most 10).
    pub symbols: Vec<Symbol>,
    /// Whether the exchange should send an initial snapshot of recent
    /// trades.
    pub snapshot: Option<bool>,
    /// Filled by the session before sending.
    pub req_id: Option<ReqId>,
}

impl TradeSubscribe {
    /// A trade subscription with exchange-default options.
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            snapshot: None,
            req_id: None,
        }
    }

    /// Request (or suppress) the initial trade snapshot.
    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

impl KrakenRequest for TradeSubscribe {
    fn channel(&self) -> Channel {
        Channel::Trade
    }

    fn method(&self) -> Method {
        Method::Subscribe
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn symbols_mut(&mut self) -> &mut Vec<Symbol> {
        &mut self.symbols
    }

    fn req_id(&self) -> Option<ReqId> {
        self.req_id
    }

    fn set_req_id(&mut self, id: ReqId) {
        self.req_id = Some(id);
    }

    fn to_wire(&self) -> Result<String> {
        let envelope = Envelope {
            method: Method::Subscribe,
            params: Some(TradeSubscribeParams {
                channel: Channel::Trade,
                symbol: &self.symbols,
                snapshot: self.snapshot,
            }),
            req_id: self.req_id,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

#[derive(Debug, Serialize)]
struct TradeUnsubscribeParams<'a> {
    channel: Channel,
    symbol: &'a [Symbol],
}

/// Unsubscribe a set of symbols from the trade feed.
#[derive(Debug, Clone)]
pub struct TradeUnsubscribe {
    /// Symbols to unsubscribe.
    pub symbols: Vec<Symbol>,
    /// Filled by the session before sending.
    pub req_id: Option<ReqId>,
}

impl TradeUnsubscribe {
    /// A trade unsubscription for the given symbols.
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            req_id: None,
        }
    }
}

impl KrakenRequest for TradeUnsubscribe {
    fn channel(&self) -> Channel {
        Channel::Trade
    }

    fn method(&self) -> Method {
        Method::Unsubscribe
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn symbols_mut(&mut self) -> &mut Vec<Symbol> {
        &mut self.symbols
    }

    fn req_id(&self) -> Option<ReqId> {
        self.req_id
    }

    fn set_req_id(&mut self, id: ReqId) {
        self.req_id = Some(id);
    }

    fn to_wire(&self) -> Result<String> {
        let envelope = Envelope {
            method: Method::Unsubscribe,
            params: Some(TradeUnsubscribeParams {
                channel: Channel::Trade,
                symbol: &self.symbols,
            }),
            req_id: self.req_id,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct BookSubscribeParams<'a> {
    channel: Channel,
    symbol: &'a [Symbol],
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<Depth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<bool>,
}

/// Subscribe to the order-book feed for a set of symbols.
#[derive(Debug, Clone)]
pub struct BookSubscribe {
    /// Symbols to subscribe (non-empty, at most 10).
    pub symbols: Vec<Symbol>,
    /// Book depth; the exchange defaults to 10 levels per side.
    pub depth: Option<Depth>,
    /// Whether the exchange should send the initial book snapshot.
    pub snapshot: Option<bool>,
    /// Filled by the session before sending.
    pub req_id: Option<ReqId>,
}

impl BookSubscribe {
    /// A book subscription with exchange-default options.
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            depth: None,
            snapshot: None,
            req_id: None,
        }
    }

    /// Set the book depth.
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Request (or suppress) the initial book snapshot.
    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

impl KrakenRequest for BookSubscribe {
    fn channel(&self) -> Channel {
        Channel::Book
    }

    fn method(&self) -> Method {
        Method::Subscribe
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn symbols_mut(&mut self) -> &mut Vec<Symbol> {
        &mut self.symbols
    }

    fn req_id(&self) -> Option<ReqId> {
        self.req_id
    }

    fn set_req_id(&mut self, id: ReqId) {
        self.req_id = Some(id);
    }

    fn to_wire(&self) -> Result<String> {
        let envelope = Envelope {
            method: Method::Subscribe,
            params: Some(BookSubscribeParams {
                channel: Channel::Book,
                symbol: &self.symbols,
                depth: self.depth,
                snapshot: self.snapshot,
            }),
            req_id: self.req_id,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

#[derive(Debug, Serialize)]
struct BookUnsubscribeParams<'a> {
    channel: Channel,
    symbol: &'a [Symbol],
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<Depth>,
}

/// Unsubscribe a set of symbols from the order-book feed.
///
/// The depth must match the subscription being cancelled; the exchange keys
/// book subscriptions on `(symbol, depth)`.
#[derive(Debug, Clone)]
pub struct BookUnsubscribe {
    /// Symbols to unsubscribe.
    pub symbols: Vec<Symbol>,
    /// Depth of the subscription being cancelled.
    pub depth: Option<Depth>,
    /// Filled by the session before sending.
    pub req_id: Option<ReqId>,
}

impl BookUnsubscribe {
    /// A book unsubscription for the given symbols.
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            depth: None,
            req_id: None,
        }
    }

    /// Set the depth of the subscription being cancelled.
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }
}

impl KrakenRequest for BookUnsubscribe {
    fn channel(&self) -> Channel {
        Channel::Book
    }

    fn method(&self) -> Method {
        Method::Unsubscribe
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn symbols_mut(&mut self) -> &mut Vec<Symbol> {
        &mut self.symbols
    }

    fn req_id(&self) -> Option<ReqId> {
        self.req_id
    }

    fn set_req_id(&mut self, id: ReqId) {
        self.req_id = Some(id);
    }

    fn to_wire(&self) -> Result<String> {
        let envelope = Envelope {
            method: Method::Unsubscribe,
            params: Some(BookUnsubscribeParams {
                channel: Channel::Book,
                symbol: &self.symbols,
                depth: self.depth,
            }),
            req_id: self.req_id,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

// ---------------------------------------------------------------------------
// Ping
// ---------------------------------------------------------------------------

/// Application-level keep-alive probe.
#[derive(Debug, Clone, Default)]
pub struct Ping {
    /// Filled by the session before sending.
    pub req_id: Option<ReqId>,
}

impl Ping {
    /// Serialize the canonical ping envelope.
    pub fn to_wire(&self) -> Result<String> {
        let envelope = Envelope::<()> {
            method: Method::Ping,
            params: None,
            req_id: self.req_id,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}
