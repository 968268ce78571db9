//! Level-triggered session facts and signals.
//!
//! A *fact* is the latest value of something the exchange told us, pulled by
//! the application whenever it likes (e.g. the most recent pong). A *signal*
//! is a one-shot notification that a fact changed, consumed via
//! [`crate::session::Session::poll_signal`]. Facts never invoke callbacks.

use std::time::Duration;

/// Liveness evidence from the most recent pong.
///
/// `count` increments on every pong observed this session; `last_rx_ns` is
/// the monotonic session clock (nanoseconds since session creation) at which
/// the most recent pong arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PongFact {
    /// How many pongs this session has observed.
    pub count: u64,
    /// Session-clock nanoseconds of the most recent pong, if any.
    pub last_rx_ns: Option<u64>,
}

/// Protocol-level notification, pulled via `poll_signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// A pong arrived; the [`PongFact`] was updated.
    PongObserved,
    /// A system status update arrived.
    StatusChanged,
    /// The exchange sent a rejection notice; the rejection fact was updated.
    RejectionObserved,
    /// The connection has been silent past the warn window.
    LivenessWarning {
        /// How long the connection had been silent when the warning fired.
        idle: Duration,
    },
}
