//! Error types for the `wirekrak` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, WirekrakError>`.
//!
//! [`WirekrakError`] covers:
//! - **WebSocket errors** — TLS upgrade, handshake, and I/O failures
//! - **JSON errors** — Request serialization failures
//! - **URL errors** — Malformed endpoint URLs
//! - **Invalid arguments** — Client-side request validation errors
//! - **Not connected** — Mutating calls made while the transport is down
//!
//! Nothing in the session engine panics or unwinds on protocol trouble:
//! liveness kills, exchange rejections, and malformed inbound messages are
//! surfaced as signals and facts (see [`crate::session`]), never as `Err`.

/// All possible errors produced by the `wirekrak` client.
#[derive(Debug, thiserror::Error)]
pub enum WirekrakError {
    /// A WebSocket-level error (upgrade, TLS, or I/O).
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Failed to serialize an outbound request envelope.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error building or parsing an endpoint URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation requires a live connection.
    #[error("Not connected")]
    NotConnected,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WirekrakError>;
