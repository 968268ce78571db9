//! Channel, method, and depth enums for the Kraken v2 schema.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A Kraken logical feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Public trade feed.
    Trade,
    /// Order-book feed.
    Book,
    /// Ticker feed (recognized on the wire; not subscribable through this
    /// crate yet).
    Ticker,
    /// System status feed (inbound only).
    Status,
    /// Heartbeat feed (inbound only).
    Heartbeat,
}

impl Channel {
    /// The wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Trade => "trade",
            Channel::Book => "book",
            Channel::Ticker => "ticker",
            Channel::Status => "status",
            Channel::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Request/response method of a Kraken v2 envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Subscribe to a channel.
    Subscribe,
    /// Unsubscribe from a channel.
    Unsubscribe,
    /// Application-level keep-alive probe.
    Ping,
    /// Reply to a ping.
    Pong,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Subscribe => "subscribe",
            Method::Unsubscribe => "unsubscribe",
            Method::Ping => "ping",
            Method::Pong => "pong",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Depth
// ---------------------------------------------------------------------------

/// Order-book depth. Kraken accepts exactly these five values; anything else
/// is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Depth {
    /// 10 price levels per side (the exchange default).
    #[default]
    D10,
    /// 25 price levels per side.
    D25,
    /// 100 price levels per side.
    D100,
    /// 500 price levels per side.
    D500,
    /// 1000 price levels per side.
    D1000,
}

impl Depth {
    /// Validate a raw depth value.
    pub fn new(levels: u16) -> Option<Depth> {
        match levels {
            10 => Some(Depth::D10),
            25 => Some(Depth::D25),
            100 => Some(Depth::D100),
            500 => Some(Depth::D500),
            1000 => Some(Depth::D1000),
            _ => None,
        }
    }

    /// The number of price levels per side.
    pub fn levels(self) -> u16 {
        match self {
            Depth::D10 => 10,
            Depth::D25 => 25,
            Depth::D100 => 100,
            Depth::D500 => 500,
            Depth::D1000 => 1000,
        }
    }
}

impl Serialize for Depth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.levels())
    }
}

impl<'de> Deserialize<'de> for Depth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let levels = u16::deserialize(deserializer)?;
        Depth::new(levels).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid book depth {levels} (expected 10, 25, 100, 500 or 1000)"
            ))
        })
    }
}
