//! UserVarStore: the session's key/value store.
//!
//! Every stored key and value is a private copy of the caller's bytes.
//! Keys are fixed at insertion; a value is replaced wholesale on overwrite,
//! with the new buffer fully built before the old one is released. Reads
//! hand back fresh copies, never borrows into the store.
//!
//! The backing map is allocated on the first `set`. `get` and `delete`
//! against a store that was never written behave as against an empty one
//! and do not allocate it.

use crate::byte_hash_map::{ByteHashMap, InsertError, KeyHasher};
use crate::config::{MissingKeyPolicy, StoreConfig};
use crate::error::{Result, UserVarError};
use std::collections::hash_map::RandomState;
use tracing::{debug, trace};

pub struct UserVarStore<S = RandomState> {
    config: StoreConfig,
    hasher: S,
    // None until the first set.
    map: Option<ByteHashMap<Vec<u8>, S>>,
}

impl UserVarStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl Default for UserVarStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `src` into a buffer of its own, reporting allocation failure
/// instead of aborting.
fn copy_bytes(src: &[u8], what: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len())
        .map_err(|_| UserVarError::oom(what))?;
    buf.extend_from_slice(src);
    Ok(buf)
}

impl<S: KeyHasher + Clone> UserVarStore<S> {
    pub fn with_config_and_hasher(config: StoreConfig, hasher: S) -> Self {
        Self {
            config,
            hasher,
            map: None,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.map.is_some()
    }

    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.as_ref().is_some_and(|m| m.contains_key(key))
    }

    /// Stored keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.map
            .iter()
            .flat_map(|m| m.iter().map(|(_h, key, _v)| key))
    }

    /// Total bytes held in live key and value buffers.
    pub fn stored_bytes(&self) -> usize {
        self.map.as_ref().map_or(0, |m| {
            m.iter().map(|(_h, key, value)| key.len() + value.len()).sum()
        })
    }

    fn map_mut(&mut self) -> Result<&mut ByteHashMap<Vec<u8>, S>> {
        let map = match self.map.take() {
            Some(map) => map,
            None => {
                // Only commit the map once its index is allocated, so a
                // failed first set leaves the store uninitialized.
                let mut map = ByteHashMap::with_hasher(self.hasher.clone());
                map.try_reserve(self.config.initial_capacity)
                    .map_err(|_| UserVarError::oom("index"))?;
                debug!(
                    capacity = self.config.initial_capacity,
                    "user variable store initialized"
                );
                map
            }
        };
        Ok(self.map.insert(map))
    }

    /// Store a copy of `value` under a copy of `key`, replacing any value
    /// already there. Returns `Ok(true)`; on allocation failure nothing
    /// observable changes.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        let map = self.map_mut()?;

        if let Some(h) = map.find(key) {
            let fresh = copy_bytes(value, "value copy")?;
            if let Some(slot) = h.value_mut(map) {
                let old = std::mem::replace(slot, fresh);
                drop(old);
            }
            trace!(
                key_len = key.len(),
                value_len = value.len(),
                "set: replaced value"
            );
            return Ok(true);
        }

        map.try_reserve(1).map_err(|_| UserVarError::oom("index"))?;
        let owned_key = copy_bytes(key, "key copy")?.into_boxed_slice();
        let owned_value = copy_bytes(value, "value copy")?;
        match map.insert(owned_key, owned_value) {
            Ok(_) => {}
            Err(InsertError::DuplicateKey) => unreachable!("key was absent before insert"),
        }
        trace!(
            key_len = key.len(),
            value_len = value.len(),
            entries = map.len(),
            "set: inserted entry"
        );
        Ok(true)
    }

    /// A fresh copy of the value stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(map) = self.map.as_ref() else {
            trace!(key_len = key.len(), "get: store not initialized");
            return Ok(None);
        };
        match map.find(key).and_then(|h| h.value(map)) {
            Some(value) => {
                trace!(key_len = key.len(), value_len = value.len(), "get: hit");
                copy_bytes(value, "returned copy").map(Some)
            }
            None => {
                trace!(key_len = key.len(), "get: miss");
                Ok(None)
            }
        }
    }

    /// Remove `key` and release its buffers. A missing key is handled by the
    /// configured `MissingKeyPolicy`.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let removed = self
            .map
            .as_mut()
            .and_then(|map| map.find(key).and_then(|h| map.remove(h)));

        match removed {
            Some((owned_key, owned_value)) => {
                debug!(
                    key_len = owned_key.len(),
                    value_len = owned_value.len(),
                    "delete: released entry"
                );
                drop((owned_key, owned_value));
                Ok(true)
            }
            None => {
                trace!(key_len = key.len(), policy = ?self.config.missing_key_policy, "delete: miss");
                match self.config.missing_key_policy {
                    MissingKeyPolicy::Ignore => Ok(false),
                    MissingKeyPolicy::Error => Err(UserVarError::KeyNotFound),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::BuildHasher;

    #[test]
    fn starts_uninitialized_and_reads_do_not_initialize() {
        let mut s = UserVarStore::new();
        assert!(!s.is_initialized());
        assert_eq!(s.get(b"a").unwrap(), None);
        assert!(!s.delete(b"a").unwrap());
        assert!(!s.is_initialized());
        assert!(s.is_empty());

        assert!(s.set(b"a", b"1").unwrap());
        assert!(s.is_initialized());
    }

    #[test]
    fn overwrite_keeps_one_entry_and_releases_old_value() {
        let mut s = UserVarStore::new();
        s.set(b"k", b"a much longer first value").unwrap();
        s.set(b"k", b"v2").unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(b"k").unwrap().as_deref(), Some(&b"v2"[..]));
        assert_eq!(s.stored_bytes(), b"k".len() + b"v2".len());
    }

    #[test]
    fn returned_values_are_independent_copies() {
        let mut s = UserVarStore::new();
        s.set(b"k", b"orig").unwrap();
        let mut copy = s.get(b"k").unwrap().unwrap();
        copy.clear();
        copy.extend_from_slice(b"tampered");
        assert_eq!(s.get(b"k").unwrap().as_deref(), Some(&b"orig"[..]));
    }

    #[test]
    fn caller_buffers_are_copied_on_set() {
        let mut s = UserVarStore::new();
        let mut key = b"key".to_vec();
        let mut value = b"value".to_vec();
        s.set(&key, &value).unwrap();
        key[0] = b'X';
        value[0] = b'X';
        drop((key, value));
        assert_eq!(s.get(b"key").unwrap().as_deref(), Some(&b"value"[..]));
        assert!(!s.contains_key(b"Xey"));
    }

    #[test]
    fn strict_policy_reports_missing_keys_every_time() {
        let config = StoreConfig::builder()
            .missing_key_policy(MissingKeyPolicy::Error)
            .build();
        let mut s = UserVarStore::with_config(config);
        for _ in 0..2 {
            assert!(matches!(s.delete(b"nope"), Err(UserVarError::KeyNotFound)));
        }
        s.set(b"yes", b"1").unwrap();
        assert!(s.delete(b"yes").unwrap());
        assert!(matches!(s.delete(b"yes"), Err(UserVarError::KeyNotFound)));
    }

    #[test]
    fn failed_index_allocation_leaves_store_uninitialized() {
        let config = StoreConfig::builder().initial_capacity(usize::MAX).build();
        let mut s = UserVarStore::with_config(config);
        let err = s.set(b"k", b"v").unwrap_err();
        assert!(matches!(err, UserVarError::OutOfMemory { what: "index" }));
        assert!(!s.is_initialized());
        assert_eq!(s.get(b"k").unwrap(), None);
    }

    #[test]
    fn growth_past_initial_capacity() {
        let config = StoreConfig::builder().initial_capacity(1).build();
        let mut s = UserVarStore::with_config(config);
        for i in 0..500u32 {
            s.set(&i.to_le_bytes(), &i.to_be_bytes()).unwrap();
        }
        assert_eq!(s.len(), 500);
        for i in 0..500u32 {
            assert_eq!(s.get(&i.to_le_bytes()).unwrap(), Some(i.to_be_bytes().to_vec()));
        }
    }

    #[test]
    fn colliding_hasher_keeps_entries_apart() {
        #[derive(Clone)]
        struct Zero;
        struct ZeroHasher;
        impl BuildHasher for Zero {
            type Hasher = ZeroHasher;
            fn build_hasher(&self) -> ZeroHasher {
                ZeroHasher
            }
        }
        impl core::hash::Hasher for ZeroHasher {
            fn write(&mut self, _: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let mut s = UserVarStore::with_config_and_hasher(StoreConfig::default(), Zero);
        s.set(b"a\0b", b"1").unwrap();
        s.set(b"a", b"2").unwrap();
        s.set(b"", b"3").unwrap();
        assert_eq!(s.get(b"a\0b").unwrap(), Some(b"1".to_vec()));
        assert_eq!(s.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(s.get(b"").unwrap(), Some(b"3".to_vec()));
        assert!(s.delete(b"a").unwrap());
        assert_eq!(s.get(b"a\0b").unwrap(), Some(b"1".to_vec()));
    }
}
