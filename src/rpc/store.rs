//! Local key/value store filled by incoming Store requests.

use std::collections::HashMap;

use bytes::Bytes;

use crate::common::Id;

#[derive(Debug, Default)]
/// Write-once values, a key is never overwritten.
pub struct ValueStore {
    values: HashMap<Id, Bytes>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Id) -> Option<&Bytes> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &Id) -> bool {
        self.values.contains_key(key)
    }

    /// Store `value` under `key` unless the key is already taken.
    ///
    /// Returns `true` if the value was stored.
    pub fn insert_new(&mut self, key: Id, value: Bytes) -> bool {
        if self.values.contains_key(&key) {
            return false;
        }

        self.values.insert(key, value);

        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn never_overwrite() {
        let mut store = ValueStore::new();
        let key = Id::hash(b"key");

        assert!(store.insert_new(key, Bytes::from_static(b"v1")));
        assert!(!store.insert_new(key, Bytes::from_static(b"v2")));

        assert_eq!(store.get(&key), Some(&Bytes::from_static(b"v1")));
        assert_eq!(store.len(), 1);
    }
}
