//! Acknowledged-intent storage for replay after reconnect.
//!
//! A [`ReplayTable`] stores **acknowledged subscription intent** for a single
//! channel at symbol granularity, so the session can replay it verbatim
//! after any reconnect. One [`ReplaySubscription`] per acknowledged
//! `req_id`; a flat `SymbolId → ReqId` owner map gives O(1) owner lookup.
//!
//! Lifecycle of an entry:
//!
//! - created when the first subscribe ACK for its `req_id` arrives,
//! - grows as further symbols of the same request are acknowledged,
//! - shrinks on explicit unsubscribe ACK or server-side rejection,
//! - is erased eagerly when its symbol set becomes empty,
//! - is moved out wholesale by [`ReplayTable::take_subscriptions`] when a new
//!   transport epoch triggers replay.
//!
//! The table stores protocol intent only: no callbacks, no dispatch, no I/O,
//! no retries. Owned exclusively by the session.

use std::collections::HashMap;

use crate::protocol::ReqId;
use crate::protocol::requests::{BookSubscribe, KrakenRequest, TradeSubscribe};
use crate::symbol::{self, Symbol, SymbolId};

// ---------------------------------------------------------------------------
// ReplaySubscription
// ---------------------------------------------------------------------------

/// One acknowledged protocol request together with its remaining symbols.
///
/// The smallest unit of replayable intent: one subscription == one `req_id`,
/// holding the full typed request (parameters included) exactly as
/// acknowledged. Symbols are removed individually; an empty subscription is
/// dead and must not be replayed.
#[derive(Debug, Clone)]
pub struct ReplaySubscription<R: KrakenRequest> {
    request: R,
}

impl<R: KrakenRequest> ReplaySubscription<R> {
    fn new(request: R) -> Self {
        Self { request }
    }

    /// The stored request.
    pub fn request(&self) -> &R {
        &self.request
    }

    /// Unwrap the stored request for replay.
    pub fn into_request(self) -> R {
        self.request
    }

    /// The owning request identity ([`ReqId::INVALID`] if unset).
    pub fn req_id(&self) -> ReqId {
        self.request.req_id().unwrap_or(ReqId::INVALID)
    }

    /// Whether no symbols remain.
    pub fn is_empty(&self) -> bool {
        self.request.symbols().is_empty()
    }

    fn erase_symbol(&mut self, sym: &str) -> bool {
        let symbols = self.request.symbols_mut();
        let before = symbols.len();
        symbols.retain(|s| s != sym);
        let erased = symbols.len() != before;
        if erased {
            tracing::trace!(req_id = %self.req_id(), symbol = %sym, "erased symbol from subscription");
        }
        erased
    }
}

// ---------------------------------------------------------------------------
// ReplayTable
// ---------------------------------------------------------------------------

/// Per-channel storage of acknowledged subscription requests.
#[derive(Debug)]
pub struct ReplayTable<R: KrakenRequest> {
    subscriptions: HashMap<ReqId, ReplaySubscription<R>>,
    symbol_owner: HashMap<SymbolId, ReqId>,
}

impl<R: KrakenRequest> Default for ReplayTable<R> {
    fn default() -> Self {
        Self {
            subscriptions: HashMap::new(),
            symbol_owner: HashMap::new(),
        }
    }
}

impl<R: KrakenRequest> ReplayTable<R> {
    /// Record acknowledged intent.
    ///
    /// Symbols already owned by any `req_id` are dropped from the incoming
    /// request (first-write-wins; existing subscriptions are never mutated
    /// by an add). If nothing survives the filter the add is rejected.
    /// Because the exchange acknowledges one symbol per ACK, an add whose
    /// `req_id` already has an entry merges the surviving symbols into it.
    pub fn add(&mut self, mut request: R) -> bool {
        let Some(req_id) = request.req_id().filter(|id| id.is_valid()) else {
            tracing::error!("refusing to store subscription without a valid req_id");
            return false;
        };

        request.symbols_mut().retain(|sym| {
            let sid = symbol::intern(sym);
            match self.symbol_owner.get(&sid) {
                Some(owner) => {
                    tracing::trace!(
                        symbol = %sym, %owner,
                        "ignoring duplicate symbol already owned"
                    );
                    false
                }
                None => true,
            }
        });

        if request.symbols().is_empty() {
            tracing::trace!(%req_id, "dropping subscription add (all symbols already owned)");
            return false;
        }

        for sym in request.symbols() {
            self.symbol_owner.insert(symbol::intern(sym), req_id);
        }

        match self.subscriptions.entry(req_id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let symbols = std::mem::take(request.symbols_mut());
                entry.get_mut().request.symbols_mut().extend(symbols);
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(ReplaySubscription::new(request));
            }
        }

        tracing::trace!(
            %req_id,
            total_requests = self.subscriptions.len(),
            "stored subscription intent"
        );
        true
    }

    /// Apply a server-side rejection to the subscription under `req_id`.
    /// Returns whether a symbol was removed.
    pub fn try_process_rejection(&mut self, req_id: ReqId, sym: &str) -> bool {
        let Some(sub) = self.subscriptions.get_mut(&req_id) else {
            return false;
        };
        if !sub.erase_symbol(sym) {
            return false;
        }

        self.symbol_owner.remove(&symbol::intern(sym));
        if sub.is_empty() {
            self.subscriptions.remove(&req_id);
            tracing::trace!(%req_id, "removed empty subscription after rejection");
        }
        true
    }

    /// Remove a symbol due to explicit unsubscribe: it is erased from
    /// whichever subscription owns it.
    pub fn erase_symbol(&mut self, sym: &str) {
        let sid = symbol::intern(sym);
        let Some(&req_id) = self.symbol_owner.get(&sid) else {
            tracing::warn!(symbol = %sym, "symbol not in ownership map, nothing to erase");
            return;
        };

        let Some(sub) = self.subscriptions.get_mut(&req_id) else {
            tracing::warn!(
                symbol = %sym, %req_id,
                "ownership map points at missing subscription, repairing"
            );
            self.symbol_owner.remove(&sid);
            return;
        };

        if sub.erase_symbol(sym) {
            self.symbol_owner.remove(&sid);
            if sub.is_empty() {
                self.subscriptions.remove(&req_id);
                tracing::trace!(%req_id, "removed empty subscription");
            }
        }
    }

    /// The `req_id` currently owning a symbol.
    pub fn owner_of(&self, sym: &str) -> Option<ReqId> {
        self.symbol_owner.get(&symbol::intern(sym)).copied()
    }

    /// Whether any subscription owns the symbol.
    pub fn contains_symbol(&self, sym: &str) -> bool {
        self.symbol_owner.contains_key(&symbol::intern(sym))
    }

    /// Whether the table holds no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of stored requests.
    pub fn total_requests(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of owned symbols across all requests.
    pub fn total_symbols(&self) -> usize {
        self.symbol_owner.len()
    }

    /// Drop all stored intent.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.symbol_owner.clear();
    }

    /// Move all stored intent out for replay, clearing the table.
    pub fn take_subscriptions(&mut self) -> Vec<ReplaySubscription<R>> {
        let out: Vec<_> = self.subscriptions.drain().map(|(_, sub)| sub).collect();
        self.symbol_owner.clear();
        out
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistency(&self) {
        let symbol_count: usize = self
            .subscriptions
            .values()
            .map(|sub| sub.request.symbols().len())
            .sum();
        debug_assert_eq!(symbol_count, self.symbol_owner.len());
    }
}

// ---------------------------------------------------------------------------
// ReplayDatabase
// ---------------------------------------------------------------------------

/// The per-channel replay tables, owned by the session.
#[derive(Debug, Default)]
pub struct ReplayDatabase {
    trade: ReplayTable<TradeSubscribe>,
    book: ReplayTable<BookSubscribe>,
}

impl ReplayDatabase {
    /// The trade-channel table.
    pub fn trade_table(&self) -> &ReplayTable<TradeSubscribe> {
        &self.trade
    }

    /// The book-channel table.
    pub fn book_table(&self) -> &ReplayTable<BookSubscribe> {
        &self.book
    }

    pub(crate) fn trade_table_mut(&mut self) -> &mut ReplayTable<TradeSubscribe> {
        &mut self.trade
    }

    pub(crate) fn book_table_mut(&mut self) -> &mut ReplayTable<BookSubscribe> {
        &mut self.book
    }

    /// Owned symbols across both channels.
    pub fn total_symbols(&self) -> usize {
        self.trade.total_symbols() + self.book.total_symbols()
    }

    /// Stored requests across both channels.
    pub fn total_requests(&self) -> usize {
        self.trade.total_requests() + self.book.total_requests()
    }

    /// Drop all stored intent.
    pub fn clear(&mut self) {
        self.trade.clear();
        self.book.clear();
    }
}
