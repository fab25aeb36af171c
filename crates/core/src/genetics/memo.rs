use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Lifetime of memoized coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoScopeKind {
    /// Nothing is stored; every query recomputes from scratch.
    None,
    /// One map per computation unit, dropped with the unit.
    #[default]
    PerUnit,
    /// One map shared by every unit of a session. Only valid when an
    /// identifier denotes the same ancestry everywhere it appears.
    ProcessWide,
}

/// Key of a memoized coefficient. Keys use identifiers rather than graph
/// indices so a shared memo stays addressable across graphs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoKey {
    /// An individual's own inbreeding.
    Individual(String),
    /// Offspring inbreeding of a pair, stored with the smaller identifier
    /// first.
    Pair(String, String),
}

impl MemoKey {
    pub fn individual(id: &str) -> Self {
        MemoKey::Individual(id.to_string())
    }

    /// Pair key normalized by identifier order.
    pub fn pair(a: &str, b: &str) -> Self {
        if a <= b {
            MemoKey::Pair(a.to_string(), b.to_string())
        } else {
            MemoKey::Pair(b.to_string(), a.to_string())
        }
    }
}

/// A memoized coefficient together with whether a cycle guard fired while
/// it was computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoEntry {
    pub value: f64,
    pub cycle_detected: bool,
}

/// Storage strategy for coefficients computed by the relatedness engine.
pub trait MemoScope: Send + fmt::Debug {
    fn kind(&self) -> MemoScopeKind;

    fn get(&self, key: &MemoKey) -> Option<MemoEntry>;

    fn insert(&mut self, key: MemoKey, entry: MemoEntry);

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemo;

impl MemoScope for NoMemo {
    fn kind(&self) -> MemoScopeKind {
        MemoScopeKind::None
    }

    fn get(&self, _key: &MemoKey) -> Option<MemoEntry> {
        None
    }

    fn insert(&mut self, _key: MemoKey, _entry: MemoEntry) {}

    fn len(&self) -> usize {
        0
    }
}

/// Plain map owned by a single computation unit.
#[derive(Debug, Clone, Default)]
pub struct UnitMemo {
    entries: HashMap<MemoKey, MemoEntry>,
}

impl UnitMemo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoScope for UnitMemo {
    fn kind(&self) -> MemoScopeKind {
        MemoScopeKind::PerUnit
    }

    fn get(&self, key: &MemoKey) -> Option<MemoEntry> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: MemoKey, entry: MemoEntry) {
        self.entries.insert(key, entry);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Map shared between units behind a lock. Cloning yields another handle to
/// the same map.
#[derive(Debug, Clone, Default)]
pub struct SharedMemo {
    entries: Arc<RwLock<HashMap<MemoKey, MemoEntry>>>,
}

impl SharedMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored entry, e.g. after the underlying dataset changed.
    pub fn clear(&self) {
        match self.entries.write() {
            Ok(mut map) => map.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl MemoScope for SharedMemo {
    fn kind(&self) -> MemoScopeKind {
        MemoScopeKind::ProcessWide
    }

    fn get(&self, key: &MemoKey) -> Option<MemoEntry> {
        match self.entries.read() {
            Ok(map) => map.get(key).copied(),
            Err(poisoned) => poisoned.into_inner().get(key).copied(),
        }
    }

    fn insert(&mut self, key: MemoKey, entry: MemoEntry) {
        match self.entries.write() {
            Ok(mut map) => {
                map.insert(key, entry);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key, entry);
            }
        }
    }

    fn len(&self) -> usize {
        match self.entries.read() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
