//! ProbeTable: open-addressing index over the record store.
//!
//! Slots hold a `RecordRef` and the record's distance from its home slot.
//! Insertion uses Robin Hood displacement, removal uses backward shifting,
//! so probe chains never contain gaps and no tombstones are left behind.

use crate::record_store::RecordRef;
use core::mem;

/// Maximum ratio of records to slots, as `LOAD_FACTOR_NUM / LOAD_FACTOR_DEN`.
pub const LOAD_FACTOR: f64 = 0.65;
const LOAD_FACTOR_NUM: usize = 13;
const LOAD_FACTOR_DEN: usize = 20;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Slot {
    Empty,
    Occupied { record: RecordRef, distance: usize },
}

impl Slot {
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ProbeTable {
    slots: Vec<Slot>,
}

impl ProbeTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity],
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[inline]
    fn home(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    #[inline]
    fn next(&self, pos: usize) -> usize {
        let n = pos + 1;
        if n == self.slots.len() {
            0
        } else {
            n
        }
    }

    /// Scan the probe chain starting at the home slot of `hash`. Stops at the
    /// first record accepted by `eq` or the first empty slot.
    pub(crate) fn find(
        &self,
        hash: u64,
        mut eq: impl FnMut(RecordRef) -> bool,
    ) -> Option<(usize, RecordRef)> {
        if self.slots.is_empty() {
            return None;
        }
        let mut pos = self.home(hash);
        // A full table has no terminating empty slot; bound the walk anyway.
        for _ in 0..self.slots.len() {
            match self.slots[pos] {
                Slot::Empty => return None,
                Slot::Occupied { record, .. } => {
                    if eq(record) {
                        return Some((pos, record));
                    }
                }
            }
            pos = self.next(pos);
        }
        None
    }

    /// Robin Hood insertion of a record not yet present in the table.
    ///
    /// The carried entry takes over any slot whose occupant sits strictly
    /// closer to its own home, and the evicted occupant is carried onward.
    pub(crate) fn insert(&mut self, hash: u64, record: RecordRef) {
        debug_assert!(
            self.slots.iter().any(Slot::is_empty),
            "probe table has no empty slot for insertion"
        );
        let mut pos = self.home(hash);
        let mut carried = record;
        let mut carried_distance = 0usize;
        loop {
            let slot = &mut self.slots[pos];
            match *slot {
                Slot::Empty => {
                    *slot = Slot::Occupied {
                        record: carried,
                        distance: carried_distance,
                    };
                    return;
                }
                Slot::Occupied {
                    ref mut record,
                    ref mut distance,
                } => {
                    if *distance < carried_distance {
                        mem::swap(record, &mut carried);
                        mem::swap(distance, &mut carried_distance);
                    }
                }
            }
            pos = self.next(pos);
            carried_distance += 1;
        }
    }

    /// Empty the slot at `pos` with backward-shift deletion and return the
    /// record it referenced.
    pub(crate) fn remove_at(&mut self, pos: usize) -> Option<RecordRef> {
        let Slot::Occupied { record: removed, .. } = *self.slots.get(pos)? else {
            return None;
        };
        let mut hole = pos;
        let mut next = self.next(hole);
        // A record at distance 0 is at home and must stay put.
        while let Slot::Occupied { record, distance } = self.slots[next] {
            if distance == 0 {
                break;
            }
            self.slots[hole] = Slot::Occupied {
                record,
                distance: distance - 1,
            };
            hole = next;
            next = self.next(hole);
        }
        self.slots[hole] = Slot::Empty;
        Some(removed)
    }

    /// Drop every slot and start over with `capacity` empty slots.
    pub(crate) fn reset(&mut self, capacity: usize) {
        self.slots.clear();
        self.slots.resize(capacity, Slot::Empty);
    }

    /// Rebuild into `capacity` slots, re-inserting `(record, hash)` pairs in
    /// the given order. Distances are recomputed from scratch.
    pub(crate) fn rebuild<I>(&mut self, capacity: usize, records: I)
    where
        I: IntoIterator<Item = (RecordRef, u64)>,
    {
        self.reset(capacity);
        for (record, hash) in records {
            self.insert(hash, record);
        }
    }

    /// Capacity to rebuild into before `len + 1` records are stored, or
    /// `None` if the table can take one more record as is.
    pub(crate) fn grow_target(&self, len: usize) -> Option<usize> {
        let needed = len + 1;
        if !exceeds_load(needed, self.slots.len()) {
            return None;
        }
        Some((2 * self.slots.len()).max(min_capacity_for(needed)))
    }

    /// Capacity that lets `len + additional` records in without any rebuild
    /// along the way, or `None` if the current one already does.
    pub(crate) fn reserve_target(&self, len: usize, additional: usize) -> Option<usize> {
        if additional == 0 {
            return None;
        }
        let last_insert = len + additional;
        if !exceeds_load(last_insert, self.slots.len()) {
            return None;
        }
        // Smallest capacity with `last_insert < capacity * LOAD_FACTOR`.
        Some(last_insert * LOAD_FACTOR_DEN / LOAD_FACTOR_NUM + 1)
    }

    #[cfg(test)]
    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    #[cfg(test)]
    pub(crate) fn within_load_factor(&self, len: usize) -> bool {
        len * LOAD_FACTOR_DEN <= self.slots.len() * LOAD_FACTOR_NUM
    }
}

/// `count >= capacity * LOAD_FACTOR`, in exact integer arithmetic.
fn exceeds_load(count: usize, capacity: usize) -> bool {
    count * LOAD_FACTOR_DEN >= capacity * LOAD_FACTOR_NUM
}

/// `ceil(count / LOAD_FACTOR)`.
fn min_capacity_for(count: usize) -> usize {
    (count * LOAD_FACTOR_DEN).div_ceil(LOAD_FACTOR_NUM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn refs(n: usize) -> Vec<RecordRef> {
        let mut sm: SlotMap<RecordRef, ()> = SlotMap::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    fn distance_of(t: &ProbeTable, r: RecordRef) -> Option<(usize, usize)> {
        t.slots()
            .iter()
            .enumerate()
            .find_map(|(i, s)| match *s {
                Slot::Occupied { record, distance } if record == r => Some((i, distance)),
                _ => None,
            })
    }

    #[test]
    fn load_factor_ratio_matches_constant() {
        assert_eq!(LOAD_FACTOR_NUM as f64 / LOAD_FACTOR_DEN as f64, LOAD_FACTOR);
    }

    #[test]
    fn same_home_builds_contiguous_chain() {
        let r = refs(3);
        let mut t = ProbeTable::with_capacity(8);
        for &x in &r {
            t.insert(5, x);
        }
        assert_eq!(distance_of(&t, r[0]), Some((5, 0)));
        assert_eq!(distance_of(&t, r[1]), Some((6, 1)));
        assert_eq!(distance_of(&t, r[2]), Some((7, 2)));
    }

    #[test]
    fn chain_wraps_around_table_end() {
        let r = refs(3);
        let mut t = ProbeTable::with_capacity(8);
        for &x in &r {
            t.insert(7, x);
        }
        assert_eq!(distance_of(&t, r[0]), Some((7, 0)));
        assert_eq!(distance_of(&t, r[1]), Some((0, 1)));
        assert_eq!(distance_of(&t, r[2]), Some((1, 2)));
    }

    #[test]
    fn poorer_entry_displaces_richer_one() {
        let r = refs(3);
        let mut t = ProbeTable::with_capacity(8);
        // r0 and r1 share home 2; r2 has home 3 and arrives last.
        t.insert(2, r[0]);
        t.insert(3, r[2]);
        // r1 walks past slot 2 (distance 0 == 0, no swap) and evicts r2 at
        // slot 3 (distance 0 < 1), which moves on to slot 4.
        t.insert(2, r[1]);
        assert_eq!(distance_of(&t, r[0]), Some((2, 0)));
        assert_eq!(distance_of(&t, r[1]), Some((3, 1)));
        assert_eq!(distance_of(&t, r[2]), Some((4, 1)));
    }

    #[test]
    fn equal_distance_does_not_swap() {
        let r = refs(2);
        let mut t = ProbeTable::with_capacity(4);
        t.insert(0, r[0]);
        t.insert(0, r[1]);
        assert_eq!(distance_of(&t, r[0]), Some((0, 0)));
        assert_eq!(distance_of(&t, r[1]), Some((1, 1)));
    }

    #[test]
    fn find_stops_at_empty_slot() {
        let r = refs(2);
        let mut t = ProbeTable::with_capacity(8);
        t.insert(1, r[0]);
        assert_eq!(t.find(1, |x| x == r[0]), Some((1, r[0])));
        assert_eq!(t.find(1, |x| x == r[1]), None);
        let mut probed = 0;
        assert_eq!(
            t.find(4, |_| {
                probed += 1;
                true
            }),
            None
        );
        assert_eq!(probed, 0, "empty home slot must end the scan");
    }

    #[test]
    fn find_on_zero_capacity_is_none() {
        let t = ProbeTable::default();
        assert_eq!(t.find(0, |_| true), None);
    }

    #[test]
    fn remove_middle_of_chain_shifts_tail_back() {
        let r = refs(3);
        let mut t = ProbeTable::with_capacity(8);
        for &x in &r {
            t.insert(3, x);
        }
        let (pos, _) = t.find(3, |x| x == r[1]).unwrap();
        assert_eq!(t.remove_at(pos), Some(r[1]));
        assert_eq!(distance_of(&t, r[0]), Some((3, 0)));
        assert_eq!(distance_of(&t, r[2]), Some((4, 1)));
        assert!(t.slots()[5].is_empty());
        assert_eq!(t.occupied(), 2);
    }

    #[test]
    fn shift_stops_at_record_in_its_home_slot() {
        let r = refs(3);
        let mut t = ProbeTable::with_capacity(8);
        t.insert(2, r[0]);
        t.insert(2, r[1]);
        t.insert(4, r[2]);
        // slots: 2 -> r0 (0), 3 -> r1 (1), 4 -> r2 (0)
        let (pos, _) = t.find(2, |x| x == r[0]).unwrap();
        t.remove_at(pos);
        assert_eq!(distance_of(&t, r[1]), Some((2, 0)));
        assert_eq!(distance_of(&t, r[2]), Some((4, 0)));
        assert!(t.slots()[3].is_empty());
    }

    #[test]
    fn remove_at_empty_or_out_of_range_is_none() {
        let mut t = ProbeTable::with_capacity(4);
        assert_eq!(t.remove_at(1), None);
        assert_eq!(t.remove_at(9), None);
    }

    #[test]
    fn grow_target_doubles_or_meets_load_factor() {
        assert_eq!(ProbeTable::default().grow_target(0), Some(2));
        assert_eq!(ProbeTable::with_capacity(1).grow_target(0), Some(2));
        // 3 >= 4 * 0.65
        assert_eq!(ProbeTable::with_capacity(4).grow_target(2), Some(8));
        assert_eq!(ProbeTable::with_capacity(4).grow_target(1), None);
        // 2 * 4 = 8 is too small for 13 records: ceil(13 / 0.65) = 20.
        assert_eq!(ProbeTable::with_capacity(4).grow_target(12), Some(20));
    }

    #[test]
    fn reserve_target_leaves_room_for_every_insert() {
        let t = ProbeTable::default();
        let cap = t.reserve_target(0, 10).unwrap();
        let grown = ProbeTable::with_capacity(cap);
        for len in 0..10 {
            assert_eq!(grown.grow_target(len), None, "len {len} cap {cap}");
        }
        assert_eq!(grown.reserve_target(0, 10), None);
        assert_eq!(t.reserve_target(0, 0), None);
    }

    #[test]
    fn rebuild_recomputes_distances() {
        let r = refs(2);
        let mut t = ProbeTable::with_capacity(4);
        t.insert(1, r[0]);
        t.insert(5, r[1]);
        assert_eq!(distance_of(&t, r[1]), Some((2, 1)));
        t.rebuild(8, [(r[0], 1), (r[1], 5)]);
        assert_eq!(t.capacity(), 8);
        assert_eq!(distance_of(&t, r[0]), Some((1, 0)));
        assert_eq!(distance_of(&t, r[1]), Some((5, 0)));
    }
}
