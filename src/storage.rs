//! SetStorage: the one unordered unique-key container shared by every set
//! facade.
//!
//! Entries live in a generational slot arena and are indexed by a
//! `hashbrown::HashTable` of slot keys. Each entry remembers the hash it was
//! inserted with, so element `Hash` runs exactly once per insert and never
//! during table growth. Handles stay valid until their entry is removed,
//! which lets enumerators snapshot handles and resolve them lazily.

use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

/// Stable reference to one storage entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    fn raw(self) -> DefaultKey {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Returned by [`SetStorage::insert`] when an equal key is already stored.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Occupied(pub Handle);

pub struct SetStorage<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    reentrancy: DebugReentrancy,
}

impl<K, V> SetStorage<K, V>
where
    K: Eq + Hash,
{
    pub fn new(label: &'static str) -> Self {
        Self::with_hasher(label, RandomState::new())
    }
}

impl<K, V, S> SetStorage<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(label: &'static str, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            reentrancy: DebugReentrancy::new(label),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn locate<Q>(&self, hash: u64, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.hasher.hash_one(q);
        self.locate(hash, q).map(Handle)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    /// Insert a new key. An equal key already present is left untouched and
    /// its handle is reported through [`Occupied`]; the rejected key and
    /// value are dropped after the structure is consistent again.
    pub fn insert(&mut self, key: K, value: V) -> Result<Handle, Occupied> {
        let rejected;
        {
            let _g = self.reentrancy.enter();
            let hash = self.hasher.hash_one(&key);
            let slots = &self.slots;
            match self.index.entry(
                hash,
                |&kk| slots.get(kk).map(|e| e.key == key).unwrap_or(false),
                |&kk| slots.get(kk).map(|e| e.hash).unwrap_or(0),
            ) {
                hashbrown::hash_table::Entry::Occupied(o) => {
                    rejected = (Handle(*o.get()), key, value);
                }
                hashbrown::hash_table::Entry::Vacant(v) => {
                    let k = self.slots.insert(Entry { key, value, hash });
                    let _ = v.insert(k);
                    return Ok(Handle(k));
                }
            }
        }
        let (handle, key, value) = rejected;
        drop((key, value));
        Err(Occupied(handle))
    }

    /// Unlink and return the entry behind `handle`.
    pub fn remove(&mut self, handle: Handle) -> Option<(K, V)> {
        let _g = self.reentrancy.enter();
        let k = handle.raw();
        let entry = self.slots.remove(k)?;
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&kk| kk == k) {
            let _ = occupied.remove();
        }
        Some((entry.key, entry.value))
    }

    pub fn remove_key<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = self.find(q)?;
        self.remove(handle)
    }

    /// Drop every entry. Keys and values are released after the index is
    /// already empty.
    pub fn clear(&mut self) {
        let old = {
            let _g = self.reentrancy.enter();
            self.index.clear();
            core::mem::replace(&mut self.slots, SlotMap::with_key())
        };
        drop(old);
    }

    pub fn key(&self, h: Handle) -> Option<&K> {
        self.slots.get(h.raw()).map(|e| &e.key)
    }

    pub fn value(&self, h: Handle) -> Option<&V> {
        self.slots.get(h.raw()).map(|e| &e.value)
    }

    pub fn value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.slots.get_mut(h.raw()).map(|e| &mut e.value)
    }

    pub fn get(&self, h: Handle) -> Option<(&K, &V)> {
        self.slots.get(h.raw()).map(|e| (&e.key, &e.value))
    }

    /// Snapshot of every live handle, in arena order.
    pub fn handles(&self) -> Vec<Handle> {
        self.slots.keys().map(Handle).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &K, &V)> {
        self.slots
            .iter()
            .map(|(k, e)| (Handle(k), &e.key, &e.value))
    }

    pub fn label(&self) -> &'static str {
        self.reentrancy.label()
    }
}

impl<K, V, S> Clone for SetStorage<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            index: self.index.clone(),
            slots: self.slots.clone(),
            reentrancy: DebugReentrancy::new(self.reentrancy.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::hash::Hasher;

    #[test]
    fn duplicate_insert_reports_existing_handle() {
        let mut s: SetStorage<String, u32> = SetStorage::new("t");
        let h = s.insert("dup".to_string(), 1).unwrap();
        assert_eq!(s.insert("dup".to_string(), 2), Err(Occupied(h)));
        assert_eq!(s.value(h), Some(&1));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn handles_survive_unrelated_removals() {
        let mut s: SetStorage<u32, ()> = SetStorage::new("t");
        let hs: Vec<_> = (0..32).map(|i| s.insert(i, ()).unwrap()).collect();
        for (i, h) in hs.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(s.remove(*h).map(|(k, _)| k), Some(i as u32));
            }
        }
        for (i, h) in hs.iter().enumerate() {
            assert_eq!(s.key(*h).is_some(), i % 2 == 1);
            assert_eq!(s.contains(&(i as u32)), i % 2 == 1);
        }
        assert_eq!(s.len(), 16);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut s: SetStorage<&'static str, ()> = SetStorage::new("t");
        let h = s.insert("a", ()).unwrap();
        assert!(s.remove(h).is_some());
        assert!(s.remove(h).is_none());
        let h2 = s.insert("a", ()).unwrap();
        assert_ne!(h, h2);
        assert!(s.get(h).is_none());
    }

    #[test]
    fn clear_then_reuse() {
        let mut s: SetStorage<u8, u8> = SetStorage::new("t");
        for i in 0..10 {
            s.insert(i, i).unwrap();
        }
        s.clear();
        assert!(s.is_empty());
        assert!(!s.contains(&3));
        s.insert(3, 4).unwrap();
        assert_eq!(s.len(), 1);
    }

    // Keys whose Hash counts invocations; growth must not re-hash.
    #[derive(Eq, PartialEq)]
    struct Counting<'a>(u32, &'a Cell<usize>);

    impl Hash for Counting<'_> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.1.set(self.1.get() + 1);
            self.0.hash(state);
        }
    }

    #[test]
    fn growth_never_rehashes_keys() {
        let calls = Cell::new(0);
        let mut s = SetStorage::new("t");
        for i in 0..500u32 {
            s.insert(Counting(i, &calls), ()).unwrap();
        }
        assert_eq!(calls.get(), 500);
    }

    #[test]
    fn clone_is_independent() {
        let mut a: SetStorage<u32, ()> = SetStorage::new("t");
        a.insert(1, ()).unwrap();
        let mut b = a.clone();
        b.insert(2, ()).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert!(b.contains(&1));
    }
}
