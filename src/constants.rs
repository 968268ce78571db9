//! Constants for the Kraken WebSocket API v2.
//!
//! Contains endpoint URLs, protocol limits, and default tuning values.
//! These are used internally by [`crate::session::KrakenSession`] and the
//! transport/connection layers, but are also exported for advanced usage.

use std::time::Duration;

// ---------------------------------------------------------------------------
// WebSocket URLs
// ---------------------------------------------------------------------------

/// Public market-data WebSocket endpoint (trades, books, tickers).
pub const WS_PUBLIC_URL: &str = "wss://ws.kraken.com/v2";

/// Authenticated WebSocket endpoint (not used by this crate, listed for
/// completeness).
pub const WS_AUTH_URL: &str = "wss://ws-auth.kraken.com/v2";

// ---------------------------------------------------------------------------
// Protocol limits
// ---------------------------------------------------------------------------

/// Maximum number of symbols Kraken accepts in a single subscribe or
/// unsubscribe request.
pub const MAX_SYMBOLS_PER_REQUEST: usize = 10;

// ---------------------------------------------------------------------------
// Transport defaults
// ---------------------------------------------------------------------------

/// Capacity of the transport→session message hand-off channel. When the
/// session falls behind, the newest messages are dropped (and counted).
pub const MESSAGE_RING_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Liveness defaults
// ---------------------------------------------------------------------------

/// Silence window after which the connection emits a liveness warning.
/// Kraken sends heartbeats roughly every second on an idle subscription, so
/// ten seconds of silence is already suspicious.
pub const LIVENESS_WARN_WINDOW: Duration = Duration::from_secs(10);

/// Silence window after which the connection force-closes the transport and
/// lets the retry policy take over.
pub const LIVENESS_KILL_WINDOW: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Retry defaults
// ---------------------------------------------------------------------------

/// Base delay of the exponential reconnect backoff.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Upper bound on the reconnect backoff delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Jitter factor applied to every computed backoff delay (±10 %).
pub const RETRY_JITTER: f64 = 0.1;
