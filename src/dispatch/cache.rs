//! Call-site cache: the frozen, ordered implementing-type lists.
//!
//! Branch indices recorded with the explorer point into these lists, so
//! the order must be identical on every replay of a path. The cache is
//! owned by the analysis session and cleared at the start of a new
//! analysis, never during one.

use std::collections::HashMap;
use std::fmt;

/// Identifies a dispatch point across replays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteKey {
    /// Fully qualified caller method, e.g. `com.foo.Zoo.feed(LIAnimal;)V`.
    pub caller: String,
    /// Bytecode position of the invoke instruction within the caller.
    pub position: u32,
    /// Target `Class.methodSignature` from the instruction's static
    /// class reference.
    pub target: String,
}

impl CallSiteKey {
    pub fn new(caller: impl Into<String>, position: u32, target: impl Into<String>) -> Self {
        CallSiteKey {
            caller: caller.into(),
            position,
            target: target.into(),
        }
    }
}

impl fmt::Display for CallSiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}->{}", self.caller, self.position, self.target)
    }
}

/// Per-session map from call site to its frozen type order.
#[derive(Debug, Default)]
pub struct CallSiteCache {
    sites: HashMap<CallSiteKey, Vec<String>>,
}

impl CallSiteCache {
    pub fn new() -> Self {
        CallSiteCache::default()
    }

    pub fn contains(&self, key: &CallSiteKey) -> bool {
        self.sites.contains_key(key)
    }

    pub fn lookup(&self, key: &CallSiteKey) -> Option<&[String]> {
        self.sites.get(key).map(Vec::as_slice)
    }

    /// Freeze (or re-freeze after an extension) the ordered type list for
    /// a site.
    pub fn store(&mut self, key: CallSiteKey, types: Vec<String>) {
        self.sites.insert(key, types);
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Drop every entry. Called at the start of a new analysis.
    pub fn clear(&mut self) {
        self.sites.clear();
    }
}
