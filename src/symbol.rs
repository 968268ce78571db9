//! Symbol interning.
//!
//! Exchange instrument names (`"BTC/USD"`) are opaque strings on the wire,
//! but the subscription state machines compare and hash them constantly. The
//! process-wide interner maps each distinct name to a [`SymbolId`] — a small
//! integer handle that is cheap to copy, hash, and store in sets.
//!
//! The mapping is monotonic: ids are handed out in first-sight order and are
//! never reused. Lookup of an already-interned symbol takes a read lock only.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// An exchange instrument name, e.g. `"BTC/USD"`.
pub type Symbol = String;

/// Process-wide interned handle for a [`Symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// The raw integer value of the handle.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Interner
// ---------------------------------------------------------------------------

struct Interner {
    ids: RwLock<HashMap<String, u32>>,
    names: RwLock<Vec<String>>,
}

fn interner() -> &'static Interner {
    static INTERNER: OnceLock<Interner> = OnceLock::new();
    INTERNER.get_or_init(|| Interner {
        ids: RwLock::new(HashMap::new()),
        names: RwLock::new(Vec::new()),
    })
}

/// Intern a symbol, returning its process-wide id.
///
/// Already-interned symbols take the read-lock fast path; a new symbol takes
/// the write lock once and is assigned the next id.
pub fn intern(symbol: &str) -> SymbolId {
    let it = interner();

    if let Some(&id) = it.ids.read().expect("interner lock poisoned").get(symbol) {
        return SymbolId(id);
    }

    let mut ids = it.ids.write().expect("interner lock poisoned");
    // Re-check under the write lock: another thread may have interned it
    // between our two lock acquisitions.
    if let Some(&id) = ids.get(symbol) {
        return SymbolId(id);
    }

    let mut names = it.names.write().expect("interner lock poisoned");
    let id = names.len() as u32;
    names.push(symbol.to_owned());
    ids.insert(symbol.to_owned(), id);
    SymbolId(id)
}

/// Resolve an id back to the symbol it was interned from.
///
/// Returns `None` only for handles that were never produced by [`intern`].
pub fn resolve(id: SymbolId) -> Option<Symbol> {
    interner()
        .names
        .read()
        .expect("interner lock poisoned")
        .get(id.0 as usize)
        .cloned()
}
