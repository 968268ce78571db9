//! # wirekrak
//!
//! A Rust client library for [Kraken WebSocket API v2](https://docs.kraken.com/api/docs/websocket-v2/intro)
//! market-data feeds.
//!
//! Wirekrak gives applications a stable, symbol-level view of market data
//! (trades, order books) while absorbing the messy realities of WebSocket
//! transports: reconnection, protocol liveness, subscription rejection, and
//! replay after disconnect. Subscriptions are idempotent at symbol level and
//! every acknowledged subscription is replayed verbatim after a reconnect.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wirekrak::constants::WS_PUBLIC_URL;
//! use wirekrak::protocol::requests::TradeSubscribe;
//! use wirekrak::session::{KrakenSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> wirekrak::error::Result<()> {
//!     let mut session = KrakenSession::new(SessionConfig::default());
//!     session.connect(WS_PUBLIC_URL).await?;
//!
//!     session
//!         .subscribe_trade(
//!             TradeSubscribe::new(vec!["BTC/USD".into()]),
//!             |event| println!("{:?}", event.trade),
//!         )
//!         .await?;
//!
//!     loop {
//!         session.poll().await;
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!     }
//! }
//! ```

pub mod connection;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod session;
pub mod symbol;
pub mod transport;

/// Re-export the main session type at crate root for convenience.
pub use session::KrakenSession;
/// Re-export the error type and Result alias.
pub use error::{Result, WirekrakError};
