//! ByteHashMap: structural map over owned byte-string keys with stable
//! handles and an injected hash/equality discipline.
//!
//! The map calls into its `KeyHasher` while probing the index. A hasher
//! that reaches back into the same map would observe the index mid-probe,
//! so in debug builds every hasher call site is fenced and a nested entry
//! panics, naming both key operations.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::hash::BuildHasher;
use core::marker::PhantomData;
use hashbrown::{HashTable, TryReserveError};
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Hash function and equality predicate over raw key bytes.
///
/// Implementations must be consistent: whenever `key_eq(a, b)` holds,
/// `hash_key(a) == hash_key(b)`. Neither may assume a terminating byte.
///
/// Every `BuildHasher` is a `KeyHasher`: it hashes the slice (length
/// prefix, then bytes) and compares with [`bytes_eq`].
pub trait KeyHasher {
    fn hash_key(&self, key: &[u8]) -> u64;

    fn key_eq(&self, stored: &[u8], probe: &[u8]) -> bool {
        bytes_eq(stored, probe)
    }
}

impl<S: BuildHasher> KeyHasher for S {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        self.hash_one(key)
    }
}

/// Length first, then every byte. Embedded zero bytes are ordinary content.
#[inline]
pub fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a == b
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, V, S: KeyHasher>(&self, map: &'a ByteHashMap<V, S>) -> Option<&'a [u8]> {
        map.handle_key(*self)
    }

    pub fn value<'a, V, S: KeyHasher>(&self, map: &'a ByteHashMap<V, S>) -> Option<&'a V> {
        map.handle_value(*self)
    }

    pub fn value_mut<'a, V, S: KeyHasher>(
        &self,
        map: &'a mut ByteHashMap<V, S>,
    ) -> Option<&'a mut V> {
        map.handle_value_mut(*self)
    }
}

/// Records which key operation is currently running the hasher.
#[derive(Debug)]
struct HasherFence {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // One execution context per map: keep it !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl HasherFence {
    const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Mark `op` as running the hasher until the guard drops.
    #[inline]
    fn enter(&self, op: &'static str) -> FenceGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.replace(Some(op)) {
                panic!("KeyHasher re-entered the byte map: `{op}` called during `{outer}`");
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = op;
        FenceGuard { fence: self }
    }
}

struct FenceGuard<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    fence: &'a HasherFence,
}

impl Drop for FenceGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.fence.active.set(None);
    }
}

#[derive(Debug)]
struct Entry<V> {
    // Fixed at insertion; there is no way to reach it mutably.
    key: Box<[u8]>,
    value: V,
    hash: u64,
}

pub struct ByteHashMap<V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<V>>,
    fence: HasherFence,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertError {
    DuplicateKey,
}

impl<V> ByteHashMap<V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<V> Default for ByteHashMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries in `ByteHashMap`, in unspecified order.
pub struct Iter<'a, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Handle, &'a [u8], &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, e)| (Handle::new(k), &*e.key, &e.value))
    }
}

impl<V, S: KeyHasher> ByteHashMap<V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            index: HashTable::new(),
            hasher,
            slots: SlotMap::with_key(),
            fence: HasherFence::new(),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            hasher,
            slots: SlotMap::with_capacity_and_key(capacity),
            fence: HasherFence::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find(&self, key: &[u8]) -> Option<Handle> {
        let _g = self.fence.enter("find");
        let hash = self.hasher.hash_key(key);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.hash == hash && self.hasher.key_eq(&e.key, key))
                    .unwrap_or(false)
            })
            .map(|&k| Handle::new(k))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Make room in the index for `additional` more entries without
    /// aborting on allocation failure. Growth reuses stored hashes.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let slots = &self.slots;
        self.index
            .try_reserve(additional, |&k| slots.get(k).map(|e| e.hash).unwrap_or(0))
    }

    /// Insert a new entry. The key buffer is taken as-is and never
    /// reallocated afterward. An existing equal key rejects the insert and
    /// leaves the map untouched.
    pub fn insert(&mut self, key: Box<[u8]>, value: V) -> Result<Handle, InsertError> {
        let _g = self.fence.enter("insert");
        let hash = self.hasher.hash_key(&key);
        let hasher = &self.hasher;
        let slots = &mut self.slots;
        match self.index.entry(
            hash,
            |&kk| {
                slots
                    .get(kk)
                    .map(|e| e.hash == hash && hasher.key_eq(&e.key, &key))
                    .unwrap_or(false)
            },
            |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = slots.insert(Entry { key, value, hash });
                let _ = v.insert(k);
                Ok(Handle::new(k))
            }
        }
    }

    /// Unlink an entry and hand back its owned key and value buffers.
    pub fn remove(&mut self, handle: Handle) -> Option<(Box<[u8]>, V)> {
        let k = handle.raw_handle();

        let entry = self.slots.remove(k)?;

        // A live slot is always indexed under its stored hash.
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&kk| kk == k) {
            let _ = occupied.remove();
        }

        Some((entry.key, entry.value))
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&[u8]> {
        self.slots.get(h.raw_handle()).map(|e| &*e.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.slots.get(h.raw_handle()).map(|e| &e.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.slots.get_mut(h.raw_handle()).map(|e| &mut e.value)
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            it: self.slots.iter(),
        }
    }
}
