//! Idempotent per-channel subscription state machine.
//!
//! Tracks the protocol subscription lifecycle for a single channel across
//! three disjoint symbol sets:
//!
//! - `active` — the exchange has acknowledged the subscription,
//! - `pending_subscribe` — a subscribe request is in flight,
//! - `pending_unsubscribe` — an unsubscribe is in flight (the symbol is
//!   logically still active).
//!
//! A symbol lives in at most one set at any time. `total_symbols()` is the
//! logical ownership view (`active + pending_subscribe`) and must equal the
//! replay database's symbol count after every poll — the session keeps both
//! in lockstep.

use std::collections::{HashMap, HashSet};

use crate::protocol::ReqId;
use crate::protocol::channel::Channel;
use crate::symbol::{self, Symbol, SymbolId};

// ---------------------------------------------------------------------------
// PendingRequests
// ---------------------------------------------------------------------------

/// Pending protocol requests at symbol granularity.
///
/// Each request maps `req_id → Vec<SymbolId>`; a global symbol set enforces
/// symbol uniqueness across all pending requests and gives O(1) membership.
/// An emptied request entry is erased eagerly.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    requests: HashMap<ReqId, Vec<SymbolId>>,
    symbols: HashSet<SymbolId>,
}

impl PendingRequests {
    /// Add a pending request. Symbols already pending elsewhere are skipped.
    fn add(&mut self, req_id: ReqId, symbols: &[Symbol]) {
        let entry = self.requests.entry(req_id).or_default();

        for sym in symbols {
            let sid = symbol::intern(sym);
            if !self.symbols.insert(sid) {
                tracing::trace!(%req_id, symbol = %sym, "ignoring duplicate pending symbol");
                continue;
            }
            entry.push(sid);
        }

        if entry.is_empty() {
            self.requests.remove(&req_id);
        }
    }

    /// Remove one symbol from one request. Returns whether it was present.
    fn remove(&mut self, req_id: ReqId, sym: &str) -> bool {
        let sid = symbol::intern(sym);

        let Some(entry) = self.requests.get_mut(&req_id) else {
            return false;
        };
        let Some(pos) = entry.iter().position(|&s| s == sid) else {
            return false;
        };

        entry.remove(pos);
        self.symbols.remove(&sid);
        if entry.is_empty() {
            self.requests.remove(&req_id);
        }
        true
    }

    /// Remove a symbol from whichever request holds it (owner lookup).
    fn remove_symbol(&mut self, sym: &str) -> bool {
        let sid = symbol::intern(sym);
        if !self.symbols.contains(&sid) {
            return false;
        }

        let owner = self
            .requests
            .iter()
            .find(|(_, syms)| syms.contains(&sid))
            .map(|(&req_id, _)| req_id);

        match owner {
            Some(req_id) => self.remove(req_id, sym),
            None => {
                debug_assert!(false, "pending symbol set inconsistent with requests");
                false
            }
        }
    }

    fn contains(&self, sid: SymbolId) -> bool {
        self.symbols.contains(&sid)
    }

    fn contains_symbol(&self, sym: &str) -> bool {
        self.contains(symbol::intern(sym))
    }

    /// Whether the exact `(req_id, symbol)` pair is pending.
    fn contains_pair(&self, req_id: ReqId, sym: &str) -> bool {
        let sid = symbol::intern(sym);
        self.requests
            .get(&req_id)
            .is_some_and(|syms| syms.contains(&sid))
    }

    fn contains_request(&self, req_id: ReqId) -> bool {
        self.requests.contains_key(&req_id)
    }

    fn count(&self) -> usize {
        self.requests.len()
    }

    fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn clear(&mut self) {
        self.requests.clear();
        self.symbols.clear();
    }

    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        let count: usize = self.requests.values().map(Vec::len).sum();
        debug_assert_eq!(count, self.symbols.len());
    }
}

// ---------------------------------------------------------------------------
// ChannelManager
// ---------------------------------------------------------------------------

/// Per-channel subscription lifecycle tracking.
///
/// Idempotent at symbol level: re-subscribing an active or already-pending
/// symbol is a no-op, unsubscribing a non-active symbol is a no-op, and a
/// subscribe for a symbol that is pending unsubscription cancels the
/// unsubscription in place. Safe under reconnect replay storms.
#[derive(Debug)]
pub struct ChannelManager {
    channel: Channel,
    active: HashSet<SymbolId>,
    pending_subscribe: PendingRequests,
    pending_unsubscribe: PendingRequests,
}

impl ChannelManager {
    /// A manager for one channel, with no subscriptions.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            active: HashSet::new(),
            pending_subscribe: PendingRequests::default(),
            pending_unsubscribe: PendingRequests::default(),
        }
    }

    /// The channel this manager tracks.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    // -----------------------------------------------------------------------
    // Outbound registration
    // -----------------------------------------------------------------------

    /// Register a subscribe request, returning the symbols actually worth
    /// sending.
    ///
    /// Already-active and already-pending symbols are dropped. A symbol that
    /// is pending unsubscription is moved back to active (the unsubscribe
    /// intent is cancelled) and dropped from the outgoing list. An empty
    /// return means the caller should not send anything and should recycle
    /// the `req_id`.
    pub fn register_subscription(&mut self, symbols: &[Symbol], req_id: ReqId) -> Vec<Symbol> {
        tracing::trace!(channel = %self.channel, %req_id, "registering subscription request");
        let mut filtered = Vec::with_capacity(symbols.len());

        for sym in symbols {
            let sid = symbol::intern(sym);

            if self.active.contains(&sid) {
                tracing::trace!(channel = %self.channel, symbol = %sym, "ignoring already active symbol");
                continue;
            }
            if self.pending_subscribe.contains(sid) {
                tracing::trace!(channel = %self.channel, symbol = %sym, "ignoring already pending symbol");
                continue;
            }
            if self.pending_unsubscribe.contains(sid) {
                tracing::trace!(channel = %self.channel, symbol = %sym, "cancelling pending unsubscription");
                self.pending_unsubscribe.remove_symbol(sym);
                self.active.insert(sid);
                continue;
            }

            filtered.push(sym.clone());
        }

        if !filtered.is_empty() {
            self.pending_subscribe.add(req_id, &filtered);
        }

        self.log_state();
        filtered
    }

    /// Register an unsubscribe request, returning the symbols actually worth
    /// sending.
    ///
    /// Non-active and already-pending-unsubscribe symbols are dropped.
    pub fn register_unsubscription(&mut self, symbols: &[Symbol], req_id: ReqId) -> Vec<Symbol> {
        tracing::trace!(channel = %self.channel, %req_id, "registering unsubscription request");
        let mut filtered = Vec::with_capacity(symbols.len());

        for sym in symbols {
            let sid = symbol::intern(sym);

            if !self.active.contains(&sid) {
                tracing::trace!(channel = %self.channel, symbol = %sym, "ignoring non-active symbol");
                continue;
            }
            if self.pending_unsubscribe.contains(sid) {
                tracing::trace!(channel = %self.channel, symbol = %sym, "ignoring already pending symbol");
                continue;
            }

            filtered.push(sym.clone());
        }

        if !filtered.is_empty() {
            for sym in &filtered {
                self.active.remove(&symbol::intern(sym));
            }
            self.pending_unsubscribe.add(req_id, &filtered);
        }

        self.log_state();
        filtered
    }

    // -----------------------------------------------------------------------
    // ACK processing
    // -----------------------------------------------------------------------

    /// Apply a subscribe ACK. Returns whether a pending entry was resolved.
    ///
    /// On success the symbol becomes active; on failure it is dropped
    /// permanently (the exchange refused it — no retry).
    pub fn process_subscribe_ack(&mut self, req_id: ReqId, sym: &str, success: bool) -> bool {
        if !self.pending_subscribe.contains_pair(req_id, sym) {
            tracing::warn!(
                channel = %self.channel, %req_id, symbol = %sym,
                "ignoring subscribe ACK for unknown pending symbol"
            );
            return false;
        }

        let removed = self.pending_subscribe.remove(req_id, sym);
        if removed && success {
            self.active.insert(symbol::intern(sym));
        }

        self.log_state();
        removed
    }

    /// Apply an unsubscribe ACK. Returns whether a pending entry was
    /// resolved.
    ///
    /// On success the symbol is fully removed; on failure it returns to the
    /// active set (the exchange kept the subscription alive).
    pub fn process_unsubscribe_ack(&mut self, req_id: ReqId, sym: &str, success: bool) -> bool {
        if !self.pending_unsubscribe.contains_pair(req_id, sym) {
            tracing::warn!(
                channel = %self.channel, %req_id, symbol = %sym,
                "ignoring unsubscribe ACK for unknown pending symbol"
            );
            return false;
        }

        let removed = self.pending_unsubscribe.remove(req_id, sym);
        if removed && !success {
            self.active.insert(symbol::intern(sym));
        }

        self.log_state();
        removed
    }

    /// Apply a rejection notice to whichever pending set holds the
    /// `(req_id, symbol)` pair. Returns whether anything was removed.
    ///
    /// A rejected subscribe drops the symbol permanently; a rejected
    /// unsubscribe means the exchange kept the subscription, so the symbol
    /// returns to the active set.
    pub fn try_process_rejection(&mut self, req_id: ReqId, sym: &str) -> bool {
        if self.pending_subscribe.remove(req_id, sym) {
            tracing::warn!(channel = %self.channel, %req_id, symbol = %sym, "subscription rejected");
            return true;
        }
        if self.pending_unsubscribe.remove(req_id, sym) {
            tracing::warn!(channel = %self.channel, %req_id, symbol = %sym, "unsubscription rejected");
            self.active.insert(symbol::intern(sym));
            return true;
        }
        false
    }

    /// Drop a symbol from the active set (rejection of an already-active
    /// subscription). Returns whether it was active.
    pub fn drop_active(&mut self, sym: &str) -> bool {
        self.active.remove(&symbol::intern(sym))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether any request is awaiting an ACK.
    pub fn has_pending_requests(&self) -> bool {
        !self.pending_subscribe.is_empty() || !self.pending_unsubscribe.is_empty()
    }

    /// Number of in-flight requests (subscribe + unsubscribe).
    pub fn pending_requests(&self) -> usize {
        self.pending_subscribe.count() + self.pending_unsubscribe.count()
    }

    /// Number of in-flight subscribe requests.
    pub fn pending_subscription_requests(&self) -> usize {
        self.pending_subscribe.count()
    }

    /// Number of in-flight unsubscribe requests.
    pub fn pending_unsubscription_requests(&self) -> usize {
        self.pending_unsubscribe.count()
    }

    /// Whether the given `req_id` still has unresolved symbols in either
    /// pending set.
    pub fn contains_pending_request(&self, req_id: ReqId) -> bool {
        self.pending_subscribe.contains_request(req_id)
            || self.pending_unsubscribe.contains_request(req_id)
    }

    /// Whether at least one symbol is fully subscribed.
    pub fn has_active_symbols(&self) -> bool {
        !self.active.is_empty()
    }

    /// Number of acknowledged, active symbols.
    pub fn active_symbols(&self) -> usize {
        self.active.len()
    }

    /// Whether the given symbol is active.
    pub fn is_active(&self, sym: &str) -> bool {
        self.active.contains(&symbol::intern(sym))
    }

    /// Whether the given symbol has a subscribe in flight.
    pub fn is_pending_subscribe(&self, sym: &str) -> bool {
        self.pending_subscribe.contains_symbol(sym)
    }

    /// Logical ownership view: active + pending subscribe.
    pub fn total_symbols(&self) -> usize {
        self.active.len() + self.pending_subscribe.symbol_count()
    }

    /// Symbols awaiting any ACK.
    pub fn pending_symbols(&self) -> usize {
        self.pending_subscribe.symbol_count() + self.pending_unsubscribe.symbol_count()
    }

    /// Symbols awaiting a subscribe ACK.
    pub fn pending_subscribe_symbols(&self) -> usize {
        self.pending_subscribe.symbol_count()
    }

    /// Symbols awaiting an unsubscribe ACK.
    pub fn pending_unsubscribe_symbols(&self) -> usize {
        self.pending_unsubscribe.symbol_count()
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Drop all state (reconnect or shutdown).
    pub fn clear_all(&mut self) {
        self.pending_subscribe.clear();
        self.pending_unsubscribe.clear();
        self.active.clear();
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistency(&self) {
        for &sid in &self.active {
            debug_assert!(!self.pending_subscribe.contains(sid));
            debug_assert!(!self.pending_unsubscribe.contains(sid));
        }
        self.pending_subscribe.assert_consistency();
        self.pending_unsubscribe.assert_consistency();
    }

    fn log_state(&self) {
        tracing::debug!(
            channel = %self.channel,
            active = self.active.len(),
            pending_subscribe = self.pending_subscribe.symbol_count(),
            pending_unsubscribe = self.pending_unsubscribe.symbol_count(),
            "subscription state"
        );
    }
}
