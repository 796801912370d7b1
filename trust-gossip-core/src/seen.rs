//! Bounded duplicate suppression
//!
//! Flooding stops when a node recognises a message identity it has already
//! forwarded. Two caches are kept per node:
//!
//! - **seen set**: message ids already re-flooded, gates forwarding
//! - **delivery cache**: `(sender, message id)` pairs already logged, drops
//!   exact re-deliveries before they reach the round log
//!
//! ## Design
//!
//! - **LRU cache**: bounded memory (default 4096 entries); the least
//!   recently touched identity is evicted first
//! - **Touch on hit**: a duplicate refreshes its entry, so an identity that
//!   is still circulating stays resident
//!
//! ## Known Limitations
//!
//! An identity evicted while copies are still in flight will be treated as
//! new and flooded once more. The capacity must comfortably exceed the
//! number of floods in flight at any moment.

use core::hash::Hash;
use core::num::NonZeroUsize;

use lru::LruCache;

use crate::identity::PeerIdentity;
use crate::{Error, Result};

/// Default number of identities retained per cache
pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

/// Key of the delivery cache: immediate sender plus message id
pub type DeliveryKey = (PeerIdentity, String);

/// LRU-bounded set of identities
pub struct SeenCache<K: Hash + Eq> {
    entries: LruCache<K, ()>,
}

impl<K: Hash + Eq> SeenCache<K> {
    /// Create with the default capacity
    pub fn new() -> Self {
        match NonZeroUsize::new(DEFAULT_SEEN_CAPACITY) {
            Some(capacity) => Self {
                entries: LruCache::new(capacity),
            },
            None => Self {
                entries: LruCache::new(NonZeroUsize::MIN),
            },
        }
    }

    /// Create with a custom capacity (fallible)
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(Error::ZeroCapacity)?;
        Ok(Self {
            entries: LruCache::new(capacity),
        })
    }

    /// Record `key`; returns `true` if it was not already present
    pub fn insert(&mut self, key: K) -> bool {
        if self.entries.get(&key).is_some() {
            return false;
        }
        self.entries.put(key, ());
        true
    }

    /// Check membership without refreshing the entry
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Current number of retained identities (for testing/monitoring)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl<K: Hash + Eq> Default for SeenCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq> core::fmt::Debug for SeenCache<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SeenCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new_second_is_duplicate() {
        let mut seen: SeenCache<String> = SeenCache::new();
        assert!(seen.insert("m1".to_string()));
        assert!(!seen.insert("m1".to_string()));
        assert!(seen.contains(&"m1".to_string()));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn with_capacity_rejects_zero() {
        assert!(matches!(
            SeenCache::<String>::with_capacity(0),
            Err(Error::ZeroCapacity)
        ));
        assert_eq!(SeenCache::<String>::with_capacity(8).unwrap().capacity(), 8);
    }

    #[test]
    fn lru_eviction_respects_capacity() {
        let mut seen = SeenCache::with_capacity(3).unwrap();
        for id in ["a", "b", "c"] {
            assert!(seen.insert(id));
        }

        // Touch "a" so "b" becomes least recently used
        assert!(!seen.insert("a"));
        assert!(seen.insert("d"));

        assert_eq!(seen.len(), 3);
        assert!(seen.contains(&"a"));
        assert!(!seen.contains(&"b"));
        assert!(seen.insert("b"));
    }

    #[test]
    fn delivery_keys_distinguish_senders() {
        let mut delivered: SeenCache<DeliveryKey> = SeenCache::new();
        let a = PeerIdentity::new("a", 1);
        let b = PeerIdentity::new("b", 1);

        assert!(delivered.insert((a.clone(), "m".into())));
        assert!(delivered.insert((b, "m".into())));
        assert!(!delivered.insert((a, "m".into())));
    }
}
