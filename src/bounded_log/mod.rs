//! BoundedLog - Fixed-capacity newest-first log
//!
//! ## Responsibilities
//!
//! - Keep the latest N items of one event category for the operator views
//! - Evict the oldest item on every insert once full
//! - Hand out copies, never references into the buffer
//!
//! Single writer: the router owns every log and is the only caller of `insert`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Stored item with its insertion time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry<T> {
    pub item: T,
    pub inserted_at: DateTime<Utc>,
}

/// Newest-first ring buffer
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    /// Front = newest
    entries: VecDeque<LogEntry<T>>,
    capacity: usize,
}

impl<T: Clone> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend an item, evicting the oldest when full. Returns the evicted item.
    pub fn insert(&mut self, item: T, now: DateTime<Utc>) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_back().map(|e| e.item)
        } else {
            None
        };

        self.entries.push_front(LogEntry {
            item,
            inserted_at: now,
        });

        tracing::trace!(len = self.entries.len(), capacity = self.capacity, "Log entry inserted");
        evicted
    }

    /// Insert at the front after removing any entry with the same key.
    ///
    /// The old entry is dropped, not edited, so entries stay write-once.
    pub fn insert_replacing<K, F>(&mut self, item: T, now: DateTime<Utc>, key_fn: F) -> Option<T>
    where
        K: PartialEq,
        F: Fn(&T) -> K,
    {
        let key = key_fn(&item);
        if let Some(pos) = self.entries.iter().position(|e| key_fn(&e.item) == key) {
            let replaced = self.entries.remove(pos).map(|e| e.item);
            self.insert(item, now);
            return replaced;
        }
        self.insert(item, now)
    }

    /// Newest-first copy of all items
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|e| e.item.clone()).collect()
    }

    /// Latest `count` items, newest first
    pub fn latest(&self, count: usize) -> Vec<T> {
        self.entries.iter().take(count).map(|e| e.item.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
