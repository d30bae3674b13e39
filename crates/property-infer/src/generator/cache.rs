//! Insertion-ordered, bounded cache of generated strings, keyed per grammar
//! version (spec §4.2: "no generated string is seen twice within a run",
//! bounded at 10,000 entries with oldest-eviction).

use std::collections::VecDeque;

use indexmap::IndexSet;

const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct InputCache {
    capacity: usize,
    seen: IndexSet<(u64, String)>,
    order: VecDeque<(u64, String)>,
}

impl Default for InputCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InputCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: IndexSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, grammar_version: u64, input: &str) -> bool {
        self.seen.contains(&(grammar_version, input.to_owned()))
    }

    /// Records `input` for `grammar_version`, evicting the oldest entry
    /// first if at capacity. Returns `false` (no-op) if already present.
    pub fn insert(&mut self, grammar_version: u64, input: String) -> bool {
        let key = (grammar_version, input);
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.shift_remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_entry_past_capacity() {
        let mut cache = InputCache::new(2);
        assert!(cache.insert(0, "a".to_owned()));
        assert!(cache.insert(0, "b".to_owned()));
        assert!(cache.insert(0, "c".to_owned()));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(0, "a"));
        assert!(cache.contains(0, "b"));
        assert!(cache.contains(0, "c"));
    }

    #[test]
    fn keys_are_scoped_per_grammar_version() {
        let mut cache = InputCache::new(10);
        cache.insert(0, "x".to_owned());
        assert!(!cache.contains(1, "x"));
        cache.insert(1, "x".to_owned());
        assert!(cache.contains(1, "x"));
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let mut cache = InputCache::new(10);
        assert!(cache.insert(0, "a".to_owned()));
        assert!(!cache.insert(0, "a".to_owned()));
        assert_eq!(cache.len(), 1);
    }
}
