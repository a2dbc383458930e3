//! robin-hood-map: an insertion-ordered hash map built on Robin Hood
//! open addressing with backward-shift deletion.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map whose iteration order is the order keys were first
//!   inserted, independent of where the hash table happens to put them.
//! - Layers:
//!   - RecordStore<K, V>: owns every key/value pair in a `SlotMap`,
//!     threaded by intrusive prev/next links. O(1) append, O(1) unlink,
//!     and stable generational `RecordRef`s.
//!   - ProbeTable: a `Vec` of slots that are either empty or hold a
//!     `RecordRef` plus its distance from its home slot. Linear probing,
//!     Robin Hood displacement on insert, backward shift on removal.
//!   - RobinHoodMap<K, V, S>: public API; orchestrates both layers and
//!     owns the resize policy.
//!
//! Constraints
//! - Unique keys. Inserting a present key is a no-op and keeps its
//!   position in iteration order; erase then re-insert appends.
//! - After every size-changing mutation `len <= capacity * LOAD_FACTOR`.
//! - Probe chains are contiguous: every slot between a record's home and
//!   its actual slot is occupied, and the stored distance is exact.
//! - The probe table never owns keys or values; records and slots are in
//!   bijection.
//!
//! Resize policy
//! - Before inserting, if `len + 1 >= capacity * LOAD_FACTOR`, the table is
//!   rebuilt with `max(2 * capacity, ceil((len + 1) / LOAD_FACTOR))` slots.
//!   Records are re-inserted in iteration order and distances recomputed;
//!   `RecordRef`s and iteration order are unaffected.
//!
//! Hasher and rehashing invariants
//! - Each record stores the `u64` hash computed at insertion. Rebuilds and
//!   clones use the stored hash; `K: Hash` is never invoked again for a
//!   stored key.
//!
//! Reentrancy policy
//! - Probing calls user code (`K: Eq`, `K: Hash`, `S: BuildHasher`). Every
//!   public method that touches the table holds a debug-only reentrancy
//!   guard, so nested entry through a raw pointer panics in debug builds.
//! - The map is `Send` when its parts are, but not `Sync`; share it across
//!   threads behind a lock.
//!
//! Errors
//! - `at`/`at_mut` return `MapError::KeyNotFound` for absent keys. All other
//!   lookups and removals report absence with `None`.

mod error;
mod probe_table;
mod record_store;
mod reentrancy;
mod robin_hood_map;
mod robin_hood_map_proptest;

// Public surface
pub use error::MapError;
pub use probe_table::LOAD_FACTOR;
pub use robin_hood_map::{
    Handle, IntoIter, Iter, IterMut, Keys, RobinHoodMap, Values, ValuesMut,
};
