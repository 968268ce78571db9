//! Connection management: retry policy, liveness watchdog, and
//! level-triggered signals on top of a [`Transport`].
//!
//! A [`Connection`] wraps one transport with everything needed to keep a
//! logical connection alive across physical disconnects:
//!
//! - a bounded exponential [`RetryPolicy`] with jitter,
//! - a liveness watchdog (warn once per silence window, then force-close),
//! - a queue of [`ConnectionSignal`]s, each emitted exactly once per state
//!   transition and consumed via [`Connection::poll_signal`].
//!
//! The connection never synthesizes traffic; application-level pings are the
//! protocol layer's responsibility. Every successful connect increments the
//! transport epoch, which the session uses to gate subscription replay.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;
use crate::transport::{MessageBlock, Transport, TransportTelemetry};

pub mod retry;

pub use retry::RetryPolicy;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Connection lifecycle state.
///
/// ```text
/// Idle → Connecting → Connected → (Disconnected → RetryScheduled → Connecting)+ → Closed
/// ```
///
/// Terminal only by explicit [`Connection::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// An upgrade attempt is in progress.
    Connecting,
    /// The transport is open.
    Connected,
    /// The transport closed; a retry decision is pending.
    Disconnected,
    /// A reconnect attempt is scheduled.
    RetryScheduled,
    /// Explicitly closed; no further retries.
    Closed,
}

/// Level-triggered connection event, emitted exactly once per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Transport upgrade succeeded; the epoch was incremented.
    Connected {
        /// The new transport epoch.
        epoch: u64,
    },
    /// The transport closed, from any cause.
    Disconnected,
    /// A reconnect attempt is in progress with zero delay.
    RetryImmediate {
        /// 0-based attempt counter since the last successful connect.
        attempt: u32,
    },
    /// The next reconnect fires after `delay`.
    RetryScheduled {
        /// 0-based attempt counter since the last successful connect.
        attempt: u32,
        /// Backoff delay before the attempt.
        delay: Duration,
    },
    /// No observable traffic for the warn window. Emitted once per silence
    /// episode; resets when traffic resumes.
    LivenessThreatened {
        /// How long the connection has been silent.
        idle: Duration,
    },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Silence window after which [`ConnectionSignal::LivenessThreatened`]
    /// fires.
    pub warn_window: Duration,
    /// Silence window after which the transport is force-closed.
    pub kill_window: Duration,
    /// Reconnect backoff policy.
    pub retry: RetryPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            warn_window: crate::constants::LIVENESS_WARN_WINDOW,
            kill_window: crate::constants::LIVENESS_KILL_WINDOW,
            retry: RetryPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A transport wrapped with reconnection policy, liveness enforcement, and a
/// signal queue.
///
/// All methods are called from the owner's task; [`Connection::poll`] must be
/// called regularly to drive the retry timer, the liveness check, and signal
/// emission. `poll` never blocks except for the reconnect attempt itself,
/// which runs inline when the retry timer fires.
pub struct Connection<T: Transport> {
    transport: T,
    config: ConnectionConfig,
    url: Option<String>,
    state: ConnectionState,
    epoch: u64,
    attempt: u32,
    retry_at: Option<Instant>,
    liveness_warned: bool,
    signals: VecDeque<ConnectionSignal>,
}

impl<T: Transport> Connection<T> {
    /// Wrap a transport with the given configuration.
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport,
            config,
            url: None,
            state: ConnectionState::Idle,
            epoch: 0,
            attempt: 0,
            retry_at: None,
            liveness_warned: false,
            signals: VecDeque::new(),
        }
    }

    /// Open the connection.
    ///
    /// Fails to the caller only on this first attempt; once connected, any
    /// later transport failure is recovered internally and surfaces as
    /// signals.
    pub async fn open(&mut self, url: &str) -> Result<()> {
        self.url = Some(url.to_owned());
        self.state = ConnectionState::Connecting;

        match self.transport.open(url).await {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Idle;
                Err(e)
            }
        }
    }

    /// Send a text payload. Valid only in [`ConnectionState::Connected`];
    /// returns `false` otherwise or on any transport error.
    pub async fn send(&mut self, payload: &str) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        self.transport.send(payload).await
    }

    /// Drive the retry timer, the liveness watchdog, and close detection.
    /// Must be called regularly.
    pub async fn poll(&mut self) {
        match self.state {
            ConnectionState::Connected => {
                if !self.transport.is_open() {
                    self.on_disconnected("transport closed");
                    return;
                }

                let idle = self.transport.idle_for();
                if idle >= self.config.kill_window {
                    tracing::warn!(
                        idle_ms = idle.as_millis() as u64,
                        "liveness kill window exceeded, force-closing transport"
                    );
                    self.transport.close().await;
                    self.on_disconnected("liveness timeout");
                } else if idle >= self.config.warn_window {
                    if !self.liveness_warned {
                        self.liveness_warned = true;
                        self.signals
                            .push_back(ConnectionSignal::LivenessThreatened { idle });
                    }
                } else {
                    // Traffic resumed: arm the warning for the next episode.
                    self.liveness_warned = false;
                }
            }
            ConnectionState::RetryScheduled => {
                if self.retry_at.is_some_and(|at| Instant::now() >= at) {
                    self.retry_at = None;
                    self.reconnect().await;
                }
            }
            _ => {}
        }
    }

    /// Pull at most one queued signal.
    pub fn poll_signal(&mut self) -> Option<ConnectionSignal> {
        self.signals.pop_front()
    }

    /// Non-blocking pull of the next received message.
    pub fn try_recv(&mut self) -> Option<MessageBlock> {
        self.transport.try_recv()
    }

    /// Close the connection and cancel any pending retry. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        let was_connected = self.state == ConnectionState::Connected;
        self.retry_at = None;
        self.transport.close().await;

        if was_connected {
            self.signals.push_back(ConnectionSignal::Disconnected);
        }
        self.state = ConnectionState::Closed;
        tracing::info!("connection closed");
    }

    /// True when no signals are queued, no messages are buffered, and no
    /// retry is pending.
    pub fn is_idle(&self) -> bool {
        self.signals.is_empty() && self.transport.is_drained() && self.retry_at.is_none()
    }

    /// Whether the connection is currently in [`ConnectionState::Connected`].
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transport epoch: incremented on every successful connect.
    pub fn transport_epoch(&self) -> u64 {
        self.epoch
    }

    /// Receive-path counters of the underlying transport.
    pub fn telemetry(&self) -> TransportTelemetry {
        self.transport.telemetry()
    }

    // -----------------------------------------------------------------------
    // Internal transitions
    // -----------------------------------------------------------------------

    fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.epoch += 1;
        self.attempt = 0;
        self.retry_at = None;
        self.liveness_warned = false;
        self.signals
            .push_back(ConnectionSignal::Connected { epoch: self.epoch });
        tracing::info!(epoch = self.epoch, "connection established");
    }

    fn on_disconnected(&mut self, reason: &str) {
        tracing::info!(reason, "connection lost");
        self.state = ConnectionState::Disconnected;
        self.signals.push_back(ConnectionSignal::Disconnected);
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        let delay = self.config.retry.delay(self.attempt);
        if delay.is_zero() {
            self.signals.push_back(ConnectionSignal::RetryImmediate {
                attempt: self.attempt,
            });
        } else {
            self.signals.push_back(ConnectionSignal::RetryScheduled {
                attempt: self.attempt,
                delay,
            });
        }
        self.retry_at = Some(Instant::now() + delay);
        self.state = ConnectionState::RetryScheduled;
    }

    async fn reconnect(&mut self) {
        let Some(url) = self.url.clone() else {
            self.state = ConnectionState::Idle;
            return;
        };

        self.state = ConnectionState::Connecting;
        match self.transport.open(&url).await {
            Ok(()) => self.on_connected(),
            Err(e) => {
                tracing::debug!(error = %e, attempt = self.attempt, "reconnect attempt failed");
                self.attempt += 1;
                self.schedule_retry();
            }
        }
    }
}
