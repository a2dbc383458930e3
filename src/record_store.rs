//! RecordStore: insertion-ordered owner of every key/value pair.
//!
//! Records live in a `SlotMap` so a `RecordRef` survives unrelated inserts,
//! removals and probe table rebuilds. Order is kept by intrusive `prev`/`next`
//! links, giving O(1) append and O(1) unlink of any record.

use core::iter::FusedIterator;
use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Stable, generational reference to a record in the store.
    pub struct RecordRef;
}

#[derive(Clone, Debug)]
pub(crate) struct Record<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    // Computed once at insertion; rebuilds never call `K: Hash` again.
    pub(crate) hash: u64,
    prev: Option<RecordRef>,
    next: Option<RecordRef>,
}

#[derive(Clone, Debug)]
pub(crate) struct RecordStore<K, V> {
    records: SlotMap<RecordRef, Record<K, V>>,
    head: Option<RecordRef>,
    tail: Option<RecordRef>,
}

impl<K, V> RecordStore<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            records: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record at the end of the iteration order.
    pub(crate) fn push_back(&mut self, key: K, value: V, hash: u64) -> RecordRef {
        let prev = self.tail;
        let r = self.records.insert(Record {
            key,
            value,
            hash,
            prev,
            next: None,
        });
        match prev {
            Some(p) => self.records[p].next = Some(r),
            None => self.head = Some(r),
        }
        self.tail = Some(r);
        r
    }

    /// Unlink and return a record. Other records and their refs are untouched.
    pub(crate) fn remove(&mut self, r: RecordRef) -> Option<Record<K, V>> {
        let record = self.records.remove(r)?;
        match record.prev {
            Some(p) => self.records[p].next = record.next,
            None => self.head = record.next,
        }
        match record.next {
            Some(n) => self.records[n].prev = record.prev,
            None => self.tail = record.prev,
        }
        Some(record)
    }

    pub(crate) fn pop_front(&mut self) -> Option<Record<K, V>> {
        let r = self.head?;
        self.remove(r)
    }

    pub(crate) fn pop_back(&mut self) -> Option<Record<K, V>> {
        let r = self.tail?;
        self.remove(r)
    }

    pub(crate) fn get(&self, r: RecordRef) -> Option<&Record<K, V>> {
        self.records.get(r)
    }

    pub(crate) fn get_mut(&mut self, r: RecordRef) -> Option<&mut Record<K, V>> {
        self.records.get_mut(r)
    }

    /// Key of a record the probe table points at. Panics on a dangling ref,
    /// which would mean the table and the store disagree.
    pub(crate) fn key(&self, r: RecordRef) -> &K {
        &self.records[r].key
    }

    pub(crate) fn value_mut(&mut self, r: RecordRef) -> &mut V {
        &mut self.records[r].value
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.head = None;
        self.tail = None;
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            records: &self.records,
            front: self.head,
            back: self.tail,
            remaining: self.records.len(),
        }
    }

    /// Mutable iteration in list order. The slotmap only hands out disjoint
    /// `&mut` borrows in slot order, so each record is ranked by its list
    /// position first and then placed.
    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let len = self.records.len();
        let mut rank: SecondaryMap<RecordRef, usize> = SecondaryMap::with_capacity(len);
        for (i, (r, _)) in self.iter().enumerate() {
            rank.insert(r, i);
        }
        let mut ordered = Vec::with_capacity(len);
        ordered.resize_with(len, || None);
        for (r, record) in self.records.iter_mut() {
            if let Some(&i) = rank.get(r) {
                ordered[i] = Some((r, record));
            }
        }
        IterMut {
            inner: ordered.into_iter().flatten(),
            remaining: len,
        }
    }
}

impl<K, V> Default for RecordStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over records in insertion order.
pub(crate) struct Iter<'a, K, V> {
    records: &'a SlotMap<RecordRef, Record<K, V>>,
    front: Option<RecordRef>,
    back: Option<RecordRef>,
    remaining: usize,
}

impl<'a, K, V> Clone for Iter<'a, K, V> {
    fn clone(&self) -> Self {
        Self {
            records: self.records,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (RecordRef, &'a Record<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let r = self.front?;
        let record = self.records.get(r)?;
        self.front = record.next;
        self.remaining -= 1;
        Some((r, record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let r = self.back?;
        let record = self.records.get(r)?;
        self.back = record.prev;
        self.remaining -= 1;
        Some((r, record))
    }
}

impl<'a, K, V> ExactSizeIterator for Iter<'a, K, V> {}
impl<'a, K, V> FusedIterator for Iter<'a, K, V> {}

/// Mutable iterator over records in insertion order. Keys stay shared.
pub(crate) struct IterMut<'a, K, V> {
    inner: core::iter::Flatten<std::vec::IntoIter<Option<(RecordRef, &'a mut Record<K, V>)>>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (RecordRef, &'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (r, record) = self.inner.next()?;
        self.remaining -= 1;
        Some((r, &record.key, &mut record.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (r, record) = self.inner.next_back()?;
        self.remaining -= 1;
        Some((r, &record.key, &mut record.value))
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}
impl<'a, K, V> FusedIterator for IterMut<'a, K, V> {}
