//! Kraken v2 protocol layer.
//!
//! - [`channel`] — channel, method, and depth enums shared by requests and
//!   inbound messages.
//! - [`requests`] — outbound request DTOs and their canonical JSON envelopes.
//! - [`messages`] — inbound message DTOs and the strict classification
//!   parser.
//! - [`channel_manager`] — the per-channel idempotent subscription state
//!   machine.
//! - [`replay`] — acknowledged-intent storage for replay after reconnect.

use serde::{Deserialize, Serialize};

pub mod channel;
pub mod channel_manager;
pub mod messages;
pub mod replay;
pub mod requests;

pub use channel::{Channel, Depth, Method};
pub use channel_manager::ChannelManager;
pub use replay::ReplayDatabase;

// ---------------------------------------------------------------------------
// Request identity
// ---------------------------------------------------------------------------

/// 64-bit monotonic request identifier minted by the session.
///
/// Correlates outbound subscribe/unsubscribe/ping requests with their ACKs
/// and rejection notices. `0` is reserved as [`ReqId::INVALID`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ReqId(pub u64);

impl ReqId {
    /// The reserved "invalid / unassigned" identifier.
    pub const INVALID: ReqId = ReqId(0);

    /// Whether this is a real, minted identifier.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ReqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
