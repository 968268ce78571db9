//! Symbol-keyed callback routing with `req_id` ownership.
//!
//! The dispatcher is split along its two access patterns: the hot path
//! (`dispatch`) is a single hash lookup by symbol followed by a tight scan
//! over a flat entry vector; the cold path (rejections, unsubscribes,
//! replay) works in terms of the authoritative `req_id` and touches only the
//! data belonging to that request.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::ReqId;
use crate::symbol::{self, Symbol, SymbolId};

/// A user callback for one message type.
pub(crate) type Callback<M> = Arc<dyn Fn(&M) + Send + Sync>;

struct Entry<M> {
    req_id: ReqId,
    callback: Callback<M>,
}

struct Record<M> {
    symbols: Vec<SymbolId>,
    callback: Callback<M>,
}

/// Per-channel callback router.
pub(crate) struct Dispatcher<M> {
    by_symbol: HashMap<SymbolId, Vec<Entry<M>>>,
    by_req_id: HashMap<ReqId, Record<M>>,
}

impl<M> Default for Dispatcher<M> {
    fn default() -> Self {
        Self {
            by_symbol: HashMap::new(),
            by_req_id: HashMap::new(),
        }
    }
}

impl<M> Dispatcher<M> {
    /// Register one callback under a `req_id`, for each of its symbols.
    ///
    /// The callback is invoked once per matching message; callbacks for the
    /// same symbol fire in registration order.
    pub fn add(&mut self, req_id: ReqId, symbols: &[Symbol], callback: Callback<M>) {
        let mut interned = Vec::with_capacity(symbols.len());

        for sym in symbols {
            let sid = symbol::intern(sym);
            interned.push(sid);
            self.by_symbol.entry(sid).or_default().push(Entry {
                req_id,
                callback: callback.clone(),
            });
        }

        self.by_req_id.insert(
            req_id,
            Record {
                symbols: interned,
                callback,
            },
        );
    }

    /// Invoke every callback registered for `sym` (hot path).
    pub fn dispatch(&self, sym: &str, msg: &M) {
        let sid = symbol::intern(sym);
        let Some(entries) = self.by_symbol.get(&sid) else {
            return;
        };
        for entry in entries {
            (entry.callback)(msg);
        }
    }

    /// Drop every callback entry belonging to a `req_id` (full rejection or
    /// explicit cancellation).
    pub fn remove_by_req_id(&mut self, req_id: ReqId) {
        let Some(record) = self.by_req_id.remove(&req_id) else {
            return;
        };

        for sid in record.symbols {
            if let Some(entries) = self.by_symbol.get_mut(&sid) {
                entries.retain(|e| e.req_id != req_id);
                if entries.is_empty() {
                    self.by_symbol.remove(&sid);
                }
            }
        }
    }

    /// Drop the single `(req_id, symbol)` entry (per-symbol rejection).
    pub fn remove_entry(&mut self, req_id: ReqId, sym: &str) {
        let sid = symbol::intern(sym);

        if let Some(entries) = self.by_symbol.get_mut(&sid) {
            entries.retain(|e| e.req_id != req_id);
            if entries.is_empty() {
                self.by_symbol.remove(&sid);
            }
        }

        if let Some(record) = self.by_req_id.get_mut(&req_id) {
            record.symbols.retain(|&s| s != sid);
            if record.symbols.is_empty() {
                self.by_req_id.remove(&req_id);
            }
        }
    }

    /// Drop every callback entry for a symbol, across all requests
    /// (explicit unsubscribe).
    pub fn remove_symbol(&mut self, sym: &str) {
        let sid = symbol::intern(sym);
        let Some(entries) = self.by_symbol.remove(&sid) else {
            return;
        };

        for entry in entries {
            if let Some(record) = self.by_req_id.get_mut(&entry.req_id) {
                record.symbols.retain(|&s| s != sid);
                if record.symbols.is_empty() {
                    self.by_req_id.remove(&entry.req_id);
                }
            }
        }
    }

    /// Move every callback out keyed by `req_id`, clearing all routing
    /// state. Used when replay re-registers surviving subscriptions under
    /// their original identities.
    pub fn take_callbacks(&mut self) -> HashMap<ReqId, Callback<M>> {
        self.by_symbol.clear();
        self.by_req_id
            .drain()
            .map(|(req_id, record)| (req_id, record.callback))
            .collect()
    }

    /// Whether no callbacks are registered at all.
    pub fn is_idle(&self) -> bool {
        self.by_req_id.is_empty()
    }

    /// Drop all routing state.
    pub fn clear(&mut self) {
        self.by_symbol.clear();
        self.by_req_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn counter() -> (Arc<Mutex<Vec<String>>>, Callback<String>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let cloned = seen.clone();
        let cb: Callback<String> = Arc::new(move |msg: &String| {
            cloned.lock().unwrap().push(msg.clone());
        });
        (seen, cb)
    }

    #[test]
    fn dispatches_by_symbol() {
        let mut d = Dispatcher::default();
        let (seen, cb) = counter();
        d.add(ReqId(1), &["BTC/USD".into(), "ETH/USD".into()], cb);

        d.dispatch("BTC/USD", &"a".to_string());
        d.dispatch("ETH/USD", &"b".to_string());
        d.dispatch("SOL/USD", &"c".to_string());

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_by_req_id_silences_all_symbols() {
        let mut d = Dispatcher::default();
        let (seen, cb) = counter();
        d.add(ReqId(1), &["BTC/USD".into(), "ETH/USD".into()], cb);

        d.remove_by_req_id(ReqId(1));
        d.dispatch("BTC/USD", &"a".to_string());
        assert!(seen.lock().unwrap().is_empty());
        assert!(d.is_idle());
    }

    #[test]
    fn remove_entry_is_per_symbol() {
        let mut d = Dispatcher::default();
        let (seen, cb) = counter();
        d.add(ReqId(1), &["BTC/USD".into(), "ETH/USD".into()], cb);

        d.remove_entry(ReqId(1), "ETH/USD");
        d.dispatch("ETH/USD", &"dropped".to_string());
        d.dispatch("BTC/USD", &"kept".to_string());

        assert_eq!(*seen.lock().unwrap(), vec!["kept".to_string()]);
        assert!(!d.is_idle());
    }

    #[test]
    fn take_callbacks_preserves_identity() {
        let mut d = Dispatcher::default();
        let (seen, cb) = counter();
        d.add(ReqId(7), &["BTC/USD".into()], cb);

        let callbacks = d.take_callbacks();
        assert!(d.is_idle());
        assert_eq!(callbacks.len(), 1);

        // Re-register under the same identity, as replay does.
        let cb = callbacks.get(&ReqId(7)).unwrap().clone();
        d.add(ReqId(7), &["BTC/USD".into()], cb);
        d.dispatch("BTC/USD", &"back".to_string());
        assert_eq!(*seen.lock().unwrap(), vec!["back".to_string()]);
    }
}
