//! Correlation table of captured entries.
//!
//! # Design Decisions
//! - One mutex guards the map and its arrival order together; `IndexMap`
//!   keeps insertion order, so no separate chain has to be maintained
//! - The lock is held for the map operation only, never across I/O
//! - Entries stay until [`EntryRegistry::reset`]

use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::har::Entry;

/// Entries keyed by correlation ID, in the order requests were first seen.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    entries: Mutex<IndexMap<String, Entry>>,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Entry>> {
        // Each critical section is a single map call; poisoning is ignored.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track an entry. A repeated ID replaces the entry but keeps its position.
    pub fn insert(&self, entry: Entry) {
        self.lock().insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<Entry> {
        self.lock().get(id).cloned()
    }

    /// Snapshot of all entries in arrival order.
    pub fn entries(&self) -> Vec<Entry> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry, returning how many were held.
    pub fn reset(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{Request, UNKNOWN_SIZE};

    fn entry(id: &str) -> Entry {
        Entry::new(
            id,
            "example.com",
            Request {
                method: "GET".into(),
                url: format!("http://example.com/{}", id),
                http_version: "HTTP/1.1".into(),
                cookies: vec![],
                headers: vec![],
                query_string: vec![],
                post_data: None,
                headers_size: UNKNOWN_SIZE,
                body_size: UNKNOWN_SIZE,
            },
        )
    }

    #[test]
    fn test_arrival_order() {
        let registry = EntryRegistry::new();
        for id in ["c", "a", "b"] {
            registry.insert(entry(id));
        }
        let ids: Vec<_> = registry.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(registry.get("a").unwrap().request.url, "http://example.com/a");
    }

    #[test]
    fn test_replace_keeps_position() {
        let registry = EntryRegistry::new();
        registry.insert(entry("a"));
        registry.insert(entry("b"));
        let mut again = entry("a");
        again.host = "other".into();
        registry.insert(again);

        let entries = registry.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].host, "other");
    }

    #[test]
    fn test_reset() {
        let registry = EntryRegistry::new();
        registry.insert(entry("a"));
        registry.insert(entry("b"));
        assert_eq!(registry.reset(), 2);
        assert!(registry.is_empty());
        assert!(registry.get("a").is_none());
    }
}
