//! Bounded memory of broadcast messages this node already flooded.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::common::Id;

use super::config::MAX_SEEN_BROADCASTS;

#[derive(Debug)]
/// Recently seen broadcast message hashes.
///
/// Only the most recent `capacity` hashes are remembered, a broadcast that
/// keeps circulating after its hash was evicted is flooded again.
pub struct SeenBroadcasts {
    seen: LruCache<Id, ()>,
}

impl SeenBroadcasts {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(
            NonZeroUsize::new(MAX_SEEN_BROADCASTS).expect("MAX_SEEN_BROADCASTS is NonZeroUsize"),
        );

        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Mark a message hash as seen.
    ///
    /// Returns `true` only the first time a hash is observed.
    pub fn observe(&mut self, message_hash: Id) -> bool {
        if self.seen.get(&message_hash).is_some() {
            return false;
        }

        self.seen.put(message_hash, ());

        true
    }

    pub fn contains(&self, message_hash: &Id) -> bool {
        self.seen.contains(message_hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn observe_once() {
        let mut seen = SeenBroadcasts::new(10);
        let message_hash = Id::random();

        assert!(seen.observe(message_hash));
        assert!(!seen.observe(message_hash));
        assert!(!seen.observe(message_hash));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn bounded() {
        let mut seen = SeenBroadcasts::new(3);

        let first = Id::random();
        seen.observe(first);

        for _ in 0..3 {
            seen.observe(Id::random());
        }

        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&first));
        assert!(seen.observe(first), "evicted hash is new again");
    }

    #[test]
    fn repeated_sightings_keep_hash_fresh() {
        let mut seen = SeenBroadcasts::new(2);

        let hot = Id::random();
        seen.observe(hot);

        for _ in 0..5 {
            seen.observe(Id::random());
            assert!(!seen.observe(hot));
        }

        assert!(seen.contains(&hot));
    }
}
