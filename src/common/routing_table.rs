//! Simplified Kademlia routing table

use std::collections::BTreeMap;
use std::slice::Iter;
use std::time::{Duration, Instant};

use crate::common::{Contact, Id};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;
/// The age of a contact's last_seen time before it is considered stale and
/// can be replaced in a full bucket.
pub const STALE_TIME: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
/// Routing table entry, a contact with a known identity.
pub struct RoutingEntry {
    id: Id,
    contact: Contact,
    last_seen: Instant,
}

impl RoutingEntry {
    fn new(id: Id, contact: Contact) -> Self {
        RoutingEntry {
            id,
            contact,
            last_seen: Instant::now(),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn is_stale(&self) -> bool {
        self.last_seen.elapsed() > STALE_TIME
    }
}

#[derive(Debug, Clone)]
/// Simplified Kademlia routing table
pub struct RoutingTable {
    id: Id,
    buckets: BTreeMap<u8, KBucket>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id.
    pub fn new(id: Id) -> Self {
        RoutingTable {
            id,
            buckets: BTreeMap::new(),
        }
    }

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    // === Public Methods ===

    /// Add a contact, or refresh its address and last_seen if already known.
    ///
    /// Returns `true` if the contact is in the table afterwards.
    pub fn add_node(&mut self, contact: Contact) -> bool {
        let Some(id) = contact.id().copied() else {
            // Can't place a contact without identity in the key space.
            return false;
        };

        let distance = self.id.distance(&id);

        if distance == 0 {
            // Do not add self to the routing_table
            return false;
        }

        self.buckets
            .entry(distance)
            .or_default()
            .add(RoutingEntry::new(id, contact))
    }

    /// Remove a contact from this routing table, by id if known, otherwise by address.
    pub fn remove_node(&mut self, contact: &Contact) -> bool {
        match contact.id() {
            Some(id) => {
                let distance = self.id.distance(id);

                self.buckets
                    .get_mut(&distance)
                    .map(|bucket| bucket.remove(|entry| entry.id() == id))
                    .unwrap_or(false)
            }
            None => self.buckets.values_mut().any(|bucket| {
                bucket.remove(|entry| entry.contact().address() == contact.address())
            }),
        }
    }

    /// Return up to [MAX_BUCKET_SIZE_K] contacts, closest to the `key` first.
    pub fn find_node(&self, key: &Id) -> Vec<Contact> {
        let mut entries: Vec<&RoutingEntry> = self.entries().collect();

        entries.sort_by_key(|entry| key.xor(entry.id()));
        entries.truncate(MAX_BUCKET_SIZE_K);

        entries.into_iter().map(|entry| *entry.contact()).collect()
    }

    /// Returns the entry matching this contact, if any.
    pub fn get(&self, contact: &Contact) -> Option<&RoutingEntry> {
        match contact.id() {
            Some(id) => self
                .buckets
                .get(&self.id.distance(id))
                .and_then(|bucket| bucket.iter().find(|entry| entry.id() == id)),
            None => self
                .entries()
                .find(|entry| entry.contact().address() == contact.address()),
        }
    }

    /// Returns every known contact.
    pub fn contacts(&self) -> Vec<Contact> {
        self.entries().map(|entry| *entry.contact()).collect()
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.is_empty())
    }

    /// Return the number of contacts in this routing table.
    pub fn size(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.entries.len()).sum()
    }

    // === Private Methods ===

    fn entries(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }
}

/// Kbuckets are similar to LRU caches that evict stale contacts,
/// without dropping any fresh contacts in the process.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Entries in the k-bucket, sorted by the least recently seen.
    entries: Vec<RoutingEntry>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            entries: Vec::with_capacity(MAX_BUCKET_SIZE_K),
        }
    }

    // === Public Methods ===

    pub fn add(&mut self, incoming: RoutingEntry) -> bool {
        if let Some(index) = self.iter().position(|entry| entry.id() == incoming.id()) {
            // Refresh last_seen and address, moving it to the end of the bucket.
            self.entries.remove(index);
            self.entries.push(incoming);

            true
        } else if self.entries.len() < MAX_BUCKET_SIZE_K {
            self.entries.push(incoming);
            true
        } else if self.entries[0].is_stale() {
            // Remove the least recently seen entry and add the new one
            self.entries.remove(0);
            self.entries.push(incoming);

            true
        } else {
            false
        }
    }

    fn remove<F: Fn(&RoutingEntry) -> bool>(&mut self, predicate: F) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(entry));

        self.entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, RoutingEntry> {
        self.entries.iter()
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
