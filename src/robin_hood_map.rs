//! RobinHoodMap: insertion-ordered map over a Robin Hood probe table.

use crate::error::MapError;
use crate::probe_table::{ProbeTable, Slot};
use crate::record_store::{self, RecordRef, RecordStore};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use hashbrown::hash_map::DefaultHashBuilder;

/// Retained reference to an entry, as returned by [`RobinHoodMap::find`].
///
/// Handles stay valid across unrelated inserts, removals and table rebuilds.
/// Once the entry is removed the handle resolves to `None`, even if a new
/// entry is later stored under the same key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(RecordRef);

impl Handle {
    pub fn key<'a, K, V, S>(&self, map: &'a RobinHoodMap<K, V, S>) -> Option<&'a K> {
        map.handle_key(*self)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a RobinHoodMap<K, V, S>) -> Option<&'a V> {
        map.handle_value(*self)
    }

    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut RobinHoodMap<K, V, S>) -> Option<&'a mut V> {
        map.handle_value_mut(*self)
    }
}

/// A hash map that iterates in insertion order.
///
/// Entries are owned by an ordered record store; an open-addressing probe
/// table indexes them by `hash(key) mod capacity`, resolving collisions by
/// linear probing with Robin Hood displacement and removing with backward
/// shifts. The table is rebuilt whenever `len + 1` would reach
/// `capacity * LOAD_FACTOR`.
///
/// Inserting a key that is already present is a no-op: the stored value and
/// the entry's position in iteration order are kept.
pub struct RobinHoodMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    table: ProbeTable,
    records: RecordStore<K, V>,
    reentrancy: DebugReentrancy,
}

impl<K, V> RobinHoodMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Create a map whose probe table starts with `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V, S: Default> Default for RobinHoodMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

// Growth is driven by the cached record hashes, so none of this needs `K: Hash`.
fn grow_for_one<K, V>(table: &mut ProbeTable, records: &RecordStore<K, V>) {
    if let Some(capacity) = table.grow_target(records.len()) {
        table.rebuild(capacity, records.iter().map(|(r, rec)| (r, rec.hash)));
    }
}

fn insert_new<K, V>(
    table: &mut ProbeTable,
    records: &mut RecordStore<K, V>,
    key: K,
    value: V,
    hash: u64,
) -> RecordRef {
    let r = records.push_back(key, value, hash);
    table.insert(hash, r);
    r
}

impl<K, V, S> RobinHoodMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            table: ProbeTable::with_capacity(capacity),
            records: RecordStore::new(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of slots in the probe table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// The hasher this map was built with.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Remove every entry and release the probe table.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        self.table.reset(0);
        self.records.clear();
    }

    /// Rebuild the probe table, if needed, so that `additional` new keys can
    /// be inserted without another rebuild.
    pub fn reserve(&mut self, additional: usize) {
        let _g = self.reentrancy.enter();
        if let Some(capacity) = self.table.reserve_target(self.records.len(), additional) {
            self.table
                .rebuild(capacity, self.records.iter().map(|(r, rec)| (r, rec.hash)));
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.records.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.records.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&K> {
        let _g = self.reentrancy.enter();
        self.records.get(h.0).map(|rec| &rec.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        let _g = self.reentrancy.enter();
        self.records.get(h.0).map(|rec| &rec.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        let _g = self.reentrancy.enter();
        self.records.get_mut(h.0).map(|rec| &mut rec.value)
    }
}

impl<K, V, S> RobinHoodMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Slot index and record for `q`. Callers hold the reentrancy guard.
    fn locate<Q>(&self, q: &Q) -> Option<(usize, RecordRef)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if self.records.is_empty() {
            return None;
        }
        let hash = self.make_hash(q);
        self.table
            .find(hash, |r| self.records.key(r).borrow() == q)
    }

    /// Insert `key` with `value` if the key is absent.
    ///
    /// Returns `false`, leaving the map's entries untouched, when the key is
    /// already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let _g = self.reentrancy.enter();
        grow_for_one(&mut self.table, &self.records);
        let hash = self.make_hash(&key);
        if self
            .table
            .find(hash, |r| *self.records.key(r) == key)
            .is_some()
        {
            return false;
        }
        insert_new(&mut self.table, &mut self.records, key, value, hash);
        true
    }

    /// Value for `key`, inserting `default()` first if the key is absent.
    /// `default` only runs when an insert happens.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        let record = match self.table.find(hash, |r| *self.records.key(r) == key) {
            Some((_, r)) => r,
            None => {
                grow_for_one(&mut self.table, &self.records);
                insert_new(&mut self.table, &mut self.records, key, default(), hash)
            }
        };
        self.records.value_mut(record)
    }

    /// Indexed access: the value for `key`, inserting `V::default()` if absent.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Handle to the entry for `q`, or `None` if absent.
    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.locate(q).map(|(_, r)| Handle(r))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.locate(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let (_, r) = self.locate(q)?;
        self.records.get(r).map(|rec| (&rec.key, &rec.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let (_, r) = self.locate(q)?;
        self.records.get_mut(r).map(|rec| &mut rec.value)
    }

    /// Checked lookup. Fails with [`MapError::KeyNotFound`] if `q` is absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(MapError::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(MapError::KeyNotFound)
    }

    /// Remove `q`, returning its value. Absent keys are a no-op.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let (pos, _) = self.locate(q)?;
        let r = self.table.remove_at(pos)?;
        // Table is consistent again before K/V drops can run user code.
        self.records.remove(r).map(|rec| (rec.key, rec.value))
    }

    /// Probe table slot currently holding `q`.
    pub fn slot_index<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.locate(q).map(|(pos, _)| pos)
    }

    /// How many slots past its home slot `q` currently sits.
    pub fn probe_distance<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let (pos, _) = self.locate(q)?;
        match self.table.slots()[pos] {
            Slot::Occupied { distance, .. } => Some(distance),
            Slot::Empty => None,
        }
    }
}

/// Deep copy: every entry is re-inserted, in order, into a fresh table.
impl<K, V, S> Clone for RobinHoodMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        let _g = self.reentrancy.enter();
        let mut map = Self::with_hasher(self.hasher.clone());
        for (_, rec) in self.records.iter() {
            grow_for_one(&mut map.table, &map.records);
            insert_new(
                &mut map.table,
                &mut map.records,
                rec.key.clone(),
                rec.value.clone(),
                rec.hash,
            );
        }
        map
    }
}

impl<K, V, S> fmt::Debug for RobinHoodMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Map equality: same keys with equal values. Iteration order is ignored.
impl<K, V, S> PartialEq for RobinHoodMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for RobinHoodMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Extend<(K, V)> for RobinHoodMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for RobinHoodMap<K, V, S>
where
    K: Eq + Hash + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        self.extend(iter.into_iter().map(|(k, v)| (*k, *v)));
    }
}

/// Sequential insertion; later duplicates of a key are ignored.
impl<K, V, S> FromIterator<(K, V)> for RobinHoodMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for RobinHoodMap<K, V>
where
    K: Eq + Hash,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Iterator over `(&K, &V)` in insertion order.
pub struct Iter<'a, K, V> {
    inner: record_store::Iter<'a, K, V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, rec)| (&rec.key, &rec.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, rec)| (&rec.key, &rec.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over `(&K, &mut V)` in insertion order.
pub struct IterMut<'a, K, V> {
    inner: record_store::IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, k, v)| (k, v))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for ValuesMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Owning iterator over `(K, V)` in insertion order.
pub struct IntoIter<K, V> {
    records: RecordStore<K, V>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.records.pop_front().map(|rec| (rec.key, rec.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.records.len(), Some(self.records.len()))
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.records.pop_back().map(|rec| (rec.key, rec.value))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<'a, K, V, S> IntoIterator for &'a RobinHoodMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut RobinHoodMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for RobinHoodMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            records: self.records,
        }
    }
}

#[cfg(test)]
impl<K, V, S> RobinHoodMap<K, V, S> {
    /// Walk the whole structure and panic on any broken invariant.
    pub(crate) fn check_invariants(&self) {
        use std::collections::HashSet;

        let cap = self.table.capacity();
        let len = self.records.len();
        assert_eq!(self.table.occupied(), len, "occupied slots != records");
        assert!(self.table.within_load_factor(len), "len {len} over load factor for cap {cap}");

        let mut referenced = HashSet::new();
        for (i, slot) in self.table.slots().iter().enumerate() {
            let Slot::Occupied { record, distance } = *slot else {
                continue;
            };
            assert!(referenced.insert(record), "record referenced by two slots");
            let rec = self.records.get(record).expect("slot points at a live record");
            let home = (rec.hash % cap as u64) as usize;
            assert_eq!(distance, (i + cap - home) % cap, "stored distance at slot {i}");
            let mut p = home;
            while p != i {
                assert!(!self.table.slots()[p].is_empty(), "gap at {p} in chain ending at {i}");
                p = (p + 1) % cap;
            }
        }

        assert_eq!(self.records.iter().count(), len, "forward links");
        assert_eq!(self.records.iter().rev().count(), len, "backward links");
        for (r, _) in self.records.iter() {
            assert!(referenced.contains(&r), "record missing from probe table");
        }
    }
}
