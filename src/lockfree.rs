//! A lock-free hash table: a fixed array of [`List`](crate::list::List)
//! buckets with no table-wide synchronization on the hot path.
//!
//! Growth is a non-goal here (see `SPEC_FULL.md` §9): the bucket array is
//! sized once at construction and never reallocated. `new`'s `load_factor`
//! parameter exists only so this type can be constructed uniformly alongside
//! [`CoarseHashMap`](crate::coarse::CoarseHashMap) and
//! [`FineHashMap`](crate::fine::FineHashMap) through [`ConcurrentMap`]; it is
//! otherwise unused.

use crate::hash;
use crate::list::List;
use crate::ConcurrentMap;
use crossbeam_epoch as epoch;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed-size array of lock-free ordered lists.
pub struct LockFreeHashMap<K, V> {
    buckets: Box<[List<K, V>]>,
    size: AtomicUsize,
}

impl<K: Ord + Hash, V> LockFreeHashMap<K, V> {
    fn bucket_index(&self, key: &K) -> usize {
        (hash(key) as usize) % self.buckets.len()
    }
}

impl<K: Ord + Hash, V> ConcurrentMap<K, V> for LockFreeHashMap<K, V> {
    fn new(capacity: usize, _load_factor: f32) -> Self {
        let capacity = capacity.max(1);
        LockFreeHashMap {
            buckets: (0..capacity).map(|_| List::new()).collect(),
            size: AtomicUsize::new(0),
        }
    }

    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let guard = &epoch::pin();
        let idx = self.bucket_index(key);
        self.buckets[idx].find(key, guard)
    }

    fn contains(&self, key: &K) -> bool {
        let guard = &epoch::pin();
        let idx = self.bucket_index(key);
        self.buckets[idx].contains(key, guard)
    }

    fn insert(&self, key: K, value: V) -> bool {
        let guard = &epoch::pin();
        let idx = self.bucket_index(&key);
        let inserted = self.buckets[idx].insert(key, value, guard);
        if inserted {
            self.size.fetch_add(1, Ordering::SeqCst);
        }
        inserted
    }

    fn delete(&self, key: &K) -> bool {
        let guard = &epoch::pin();
        let idx = self.bucket_index(key);
        let removed = self.buckets[idx].delete(key, guard);
        if removed {
            self.size.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::LockFreeHashMap;
    use crate::ConcurrentMap;
    use rand::Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn insert_rejects_duplicate() {
        let map: LockFreeHashMap<i32, i32> = ConcurrentMap::new(16, 0.75);
        assert!(map.insert(1, 100));
        assert!(!map.insert(1, 200));
        assert_eq!(map.get(&1), Some(100));
    }

    #[test]
    fn delete_then_contains() {
        let map: LockFreeHashMap<i32, i32> = ConcurrentMap::new(16, 0.75);
        assert!(map.insert(1, 1));
        assert!(map.delete(&1));
        assert!(!map.delete(&1));
        assert!(!map.contains(&1));
    }

    #[test]
    fn no_lost_insert_under_contention() {
        let map = Arc::new(LockFreeHashMap::<i32, i32>::new(64, 0.75));
        let mut joins = Vec::new();

        for t in 0..8 {
            let map = map.clone();
            joins.push(thread::spawn(move || {
                for i in t * 500..(t + 1) * 500 {
                    assert!(map.insert(i, i));
                }
            }));
        }

        for j in joins {
            j.join().unwrap();
        }

        assert_eq!(map.len(), 4000);
        for i in 0..4000 {
            assert_eq!(map.get(&i), Some(i));
        }
    }

    /// S4: pre-populate a key set, then run a mix of inserts and reads of
    /// existing keys from several threads concurrently.
    #[test]
    fn mixed_workload_scenario_s4() {
        // `RUST_LOG=trace cargo test mixed_workload -- --nocapture` surfaces
        // the help-unlink trace logging emitted by `list::List`.
        let _ = env_logger::try_init();

        let map = Arc::new(LockFreeHashMap::<i32, i32>::new(256, 0.75));
        for i in 0..1000 {
            assert!(map.insert(i, i));
        }

        let inserted = Arc::new(AtomicUsize::new(0));
        let mut joins = Vec::new();
        for t in 0..4 {
            let map = map.clone();
            let inserted = inserted.clone();
            joins.push(thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for op in 0..25_000 {
                    if op % 5 == 0 {
                        let key = 1000 + t * 25_000 + op;
                        if map.insert(key, key) {
                            inserted.fetch_add(1, Ordering::Relaxed);
                        }
                    } else {
                        let key = rng.gen_range(0..1000);
                        let _ = map.get(&key);
                    }
                }
            }));
        }

        for j in joins {
            j.join().unwrap();
        }

        for i in 0..1000 {
            assert!(map.contains(&i));
        }
        assert!(map.len() >= 1000);
    }
}
