//! Bounded record of already dispatched commit hashes

use std::collections::{HashSet, VecDeque};

/// Number of hashes remembered by default
pub const PROCESSED_CAPACITY: usize = 100;

/// FIFO-bounded set of commit hashes
///
/// Membership is O(1); once more than `capacity` hashes have been inserted the
/// oldest one is forgotten.
#[derive(Debug, Clone)]
pub struct ProcessedHashes {
    set: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ProcessedHashes {
    /// Create an empty set remembering at most `capacity` hashes
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Whether the hash was recorded and not yet evicted
    pub fn contains(&self, hash: &str) -> bool {
        self.set.contains(hash)
    }

    /// Record a hash; returns `false` if it was already present
    pub fn insert(&mut self, hash: &str) -> bool {
        if self.set.contains(hash) {
            return false;
        }

        self.set.insert(hash.to_string());
        self.order.push_back(hash.to_string());

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }

        true
    }

    /// Number of remembered hashes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ProcessedHashes {
    fn default() -> Self {
        Self::new(PROCESSED_CAPACITY)
    }
}
