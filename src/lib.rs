//! Concurrent in-memory key/value dictionaries.
//!
//! This crate implements three alternative concurrent hash maps that share a
//! common dictionary contract (`insert`, `delete`, `contains`, `get`) but
//! differ in their locking discipline:
//!
//! - [`CoarseHashMap`], a chained hash table guarded by a single
//!   reader-writer lock.
//! - [`FineHashMap`], a chained hash table where each bucket owns its own
//!   reader-writer lock, with a table-wide lock mediating growth only.
//! - [`LockFreeHashMap`], a fixed-size array of lock-free ordered lists with
//!   no table-wide synchronization on the hot path.
//!
//! All three are never mixed in a single data structure; pick the one whose
//! contention profile fits your workload. The reader-writer lock used by the
//! first two ([`rwlock::RwLock`]) and the lock-free ordered list used by the
//! third ([`list::List`]) are implemented from scratch rather than composed
//! from library primitives — they are the interesting part of this crate.

pub mod coarse;
pub mod fine;
pub mod list;
pub mod lockfree;
pub mod rwlock;

pub use coarse::CoarseHashMap;
pub use fine::FineHashMap;
pub use lockfree::LockFreeHashMap;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hash a key with the default (`SipHash`-based) hasher.
///
/// Hash function selection is treated as an external concern throughout this
/// crate; this is simply the one fixed choice all three variants share.
pub(crate) fn hash<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// The dictionary capability shared by all three table variants.
///
/// `insert` is add-if-absent everywhere: it returns `true` iff the key was
/// newly added, and never overwrites an existing entry's value. This is a
/// deliberate unification of the locked variants' original upsert behavior
/// and the lock-free variants' original add-if-absent behavior — see
/// `DESIGN.md` for the reasoning.
pub trait ConcurrentMap<K, V> {
    /// Create a table with the given initial bucket count and the load
    /// factor (entries per bucket) above which growth is triggered.
    ///
    /// `load_factor` is accepted but unused by [`LockFreeHashMap`], whose
    /// growth is a non-goal of this crate; it exists purely so callers can
    /// construct any of the three variants uniformly.
    fn new(capacity: usize, load_factor: f32) -> Self;

    /// Look up `key`, cloning out its value if present.
    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone;

    /// Does the table contain `key`?
    fn contains(&self, key: &K) -> bool;

    /// Insert `key` with `value` if `key` is not already present.
    ///
    /// Returns `true` iff the key was newly added.
    fn insert(&self, key: K, value: V) -> bool;

    /// Remove `key`, if present.
    ///
    /// Returns `true` iff the key was present and removed.
    fn delete(&self, key: &K) -> bool;

    /// The number of entries currently stored.
    fn len(&self) -> usize;

    /// Is the table empty?
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
