//! A coarse-grained, single-lock chained hash table.
//!
//! The whole bucket array is guarded by one [`RwLock`](crate::rwlock::RwLock).
//! Reads take the shared mode; inserts, deletes and growth take the
//! exclusive mode. This is the simplest of the three variants and the one
//! most likely to bottleneck under write-heavy concurrent load — that
//! tradeoff is exactly what [`FineHashMap`](crate::fine::FineHashMap) and
//! [`LockFreeHashMap`](crate::lockfree::LockFreeHashMap) exist to avoid.

use crate::hash;
use crate::rwlock::RwLock;
use crate::ConcurrentMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The bucket array, unprotected by any lock of its own — the table-wide
/// `RwLock` in [`CoarseHashMap`] is what makes access to it safe.
struct Table<K, V> {
    buckets: Vec<Vec<(K, V)>>,
}

impl<K: Eq + Hash, V> Table<K, V> {
    fn new(capacity: usize) -> Table<K, V> {
        let capacity = capacity.max(1);
        Table {
            buckets: (0..capacity).map(|_| Vec::new()).collect(),
        }
    }

    fn index_of(&self, key: &K) -> usize {
        (hash(key) as usize) % self.buckets.len()
    }
}

/// A chained hash table protected by a single reader-writer lock.
pub struct CoarseHashMap<K, V> {
    table: RwLock<Table<K, V>>,
    size: AtomicUsize,
    load_factor: f32,
}

impl<K: Eq + Hash, V> CoarseHashMap<K, V> {
    /// Grow the table if the load factor has been exceeded.
    ///
    /// Re-checks under the write lock, since another thread may have already
    /// grown the table between this thread deciding to grow and acquiring
    /// the lock.
    fn maybe_grow(&self) {
        let size = self.size.load(Ordering::SeqCst);
        let capacity = self.table.read().buckets.len();
        if (size as f32) <= self.load_factor * capacity as f32 {
            return;
        }

        let mut table = self.table.write();
        let size = self.size.load(Ordering::SeqCst);
        let old_capacity = table.buckets.len();
        if (size as f32) <= self.load_factor * old_capacity as f32 {
            // Someone else already grew the table while we were waiting.
            return;
        }

        let new_capacity = old_capacity * 2;
        let mut new_buckets: Vec<Vec<(K, V)>> = (0..new_capacity).map(|_| Vec::new()).collect();
        for bucket in table.buckets.drain(..) {
            for (key, value) in bucket {
                let idx = (hash(&key) as usize) % new_capacity;
                new_buckets[idx].push((key, value));
            }
        }
        table.buckets = new_buckets;

        log::debug!(
            "coarse hash table grown from {} to {} buckets",
            old_capacity,
            new_capacity
        );
    }
}

impl<K: Eq + Hash, V> ConcurrentMap<K, V> for CoarseHashMap<K, V> {
    fn new(capacity: usize, load_factor: f32) -> Self {
        CoarseHashMap {
            table: RwLock::new(Table::new(capacity)),
            size: AtomicUsize::new(0),
            load_factor,
        }
    }

    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let table = self.table.read();
        let idx = table.index_of(key);
        table.buckets[idx]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn contains(&self, key: &K) -> bool {
        let table = self.table.read();
        let idx = table.index_of(key);
        table.buckets[idx].iter().any(|(k, _)| k == key)
    }

    fn insert(&self, key: K, value: V) -> bool {
        let is_new = {
            let mut table = self.table.write();
            let idx = table.index_of(&key);
            if table.buckets[idx].iter().any(|(k, _)| *k == key) {
                false
            } else {
                table.buckets[idx].push((key, value));
                true
            }
        };

        if is_new {
            self.size.fetch_add(1, Ordering::SeqCst);
            self.maybe_grow();
        }
        is_new
    }

    fn delete(&self, key: &K) -> bool {
        let mut table = self.table.write();
        let idx = table.index_of(key);
        let bucket = &mut table.buckets[idx];
        if let Some(pos) = bucket.iter().position(|(k, _)| k == key) {
            bucket.swap_remove(pos);
            drop(table);
            self.size.fetch_sub(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::CoarseHashMap;
    use crate::ConcurrentMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sequential_scenario_s1() {
        let map: CoarseHashMap<i32, i32> = ConcurrentMap::new(16, 0.75);
        for i in 1..=10 {
            assert!(map.insert(i, i));
        }
        assert!(map.delete(&2));
        assert!(map.delete(&6));
        assert!(map.delete(&4));

        assert_eq!(map.get(&1), Some(1));
        assert!(!map.contains(&2));
        assert!(map.contains(&5));
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn growth_scenario_s2() {
        let map: CoarseHashMap<i32, i32> = ConcurrentMap::new(4, 0.75);
        for i in 1..=10 {
            assert!(map.insert(i, i));
        }
        for i in 1..=10 {
            assert!(map.contains(&i));
        }
    }

    #[test]
    fn insert_is_add_if_absent() {
        let map: CoarseHashMap<&str, i32> = ConcurrentMap::new(8, 0.75);
        assert!(map.insert("k", 1));
        assert!(!map.insert("k", 2));
        assert_eq!(map.get(&"k"), Some(1));
    }

    #[test]
    fn delete_then_delete_again() {
        let map: CoarseHashMap<i32, i32> = ConcurrentMap::new(8, 0.75);
        assert!(map.insert(1, 1));
        assert!(map.delete(&1));
        assert!(!map.delete(&1));
        assert!(!map.contains(&1));
    }

    #[test]
    fn concurrent_partitioned_inserts() {
        let map = Arc::new(CoarseHashMap::<i32, i32>::new(8, 0.75));
        let mut joins = Vec::new();

        for t in 0..4 {
            let map = map.clone();
            joins.push(thread::spawn(move || {
                for i in t * 250..(t + 1) * 250 {
                    assert!(map.insert(i, i * 2));
                }
            }));
        }

        for j in joins {
            j.join().unwrap();
        }

        assert_eq!(map.len(), 1000);
        for i in 0..1000 {
            assert_eq!(map.get(&i), Some(i * 2));
        }
    }
}
