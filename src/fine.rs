//! A fine-grained, per-bucket-lock chained hash table.
//!
//! Each bucket owns its own [`RwLock`](crate::rwlock::RwLock) guarding its
//! chain; a table-wide `RwLock` mediates only the bucket array itself. Every
//! operation holds the table-wide lock in shared (read) mode — it is simply
//! asserting "the bucket array won't be swapped out from under me" — and
//! only growth ever takes it exclusively. This lets unrelated buckets be
//! written concurrently, unlike [`CoarseHashMap`](crate::coarse::CoarseHashMap).

use crate::hash;
use crate::rwlock::RwLock;
use crate::ConcurrentMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One bucket: a chain protected by its own lock.
struct Bucket<K, V> {
    chain: RwLock<Vec<(K, V)>>,
}

impl<K, V> Bucket<K, V> {
    fn new() -> Bucket<K, V> {
        Bucket {
            chain: RwLock::new(Vec::new()),
        }
    }
}

/// A chained hash table with one reader-writer lock per bucket.
pub struct FineHashMap<K, V> {
    /// The bucket array itself, held in read mode by every ordinary
    /// operation and in write mode only during growth.
    global: RwLock<Vec<Bucket<K, V>>>,
    size: AtomicUsize,
    load_factor: f32,
}

impl<K: Eq + Hash, V> FineHashMap<K, V> {
    fn index_of(buckets: &[Bucket<K, V>], key: &K) -> usize {
        (hash(key) as usize) % buckets.len()
    }

    fn maybe_grow(&self) {
        let size = self.size.load(Ordering::SeqCst);
        let capacity = self.global.read().len();
        if (size as f32) <= self.load_factor * capacity as f32 {
            return;
        }

        let mut global = self.global.write();
        let size = self.size.load(Ordering::SeqCst);
        let old_capacity = global.len();
        if (size as f32) <= self.load_factor * old_capacity as f32 {
            return;
        }

        let new_capacity = old_capacity * 2;
        let mut new_buckets: Vec<Bucket<K, V>> = (0..new_capacity).map(|_| Bucket::new()).collect();

        // No other thread can reach any bucket here: we hold `global`
        // exclusively, so per-bucket locks need not be taken.
        for bucket in global.drain(..) {
            for (key, value) in bucket.chain.into_inner() {
                let idx = (hash(&key) as usize) % new_capacity;
                new_buckets[idx].chain.get_mut().push((key, value));
            }
        }
        *global = new_buckets;

        log::debug!(
            "fine hash table grown from {} to {} buckets",
            old_capacity,
            new_capacity
        );
    }
}

impl<K: Eq + Hash, V> ConcurrentMap<K, V> for FineHashMap<K, V> {
    fn new(capacity: usize, load_factor: f32) -> Self {
        let capacity = capacity.max(1);
        FineHashMap {
            global: RwLock::new((0..capacity).map(|_| Bucket::new()).collect()),
            size: AtomicUsize::new(0),
            load_factor,
        }
    }

    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let global = self.global.read();
        let idx = Self::index_of(&global, key);
        let chain = global[idx].chain.read();
        chain.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn contains(&self, key: &K) -> bool {
        let global = self.global.read();
        let idx = Self::index_of(&global, key);
        let chain = global[idx].chain.read();
        chain.iter().any(|(k, _)| k == key)
    }

    fn insert(&self, key: K, value: V) -> bool {
        let is_new = {
            let global = self.global.read();
            let idx = Self::index_of(&global, &key);
            let mut chain = global[idx].chain.write();
            if chain.iter().any(|(k, _)| *k == key) {
                false
            } else {
                chain.push((key, value));
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
        let global = self.global.read();
        let idx = Self::index_of(&global, key);
        let mut chain = global[idx].chain.write();
        if let Some(pos) = chain.iter().position(|(k, _)| k == key) {
            chain.swap_remove(pos);
            drop(chain);
            drop(global);
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
    use super::FineHashMap;
    use crate::ConcurrentMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sequential_scenario_s1() {
        let map: FineHashMap<i32, i32> = ConcurrentMap::new(16, 0.75);
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
    fn growth_scenario() {
        let map: FineHashMap<i32, i32> = ConcurrentMap::new(4, 0.75);
        for i in 1..=10 {
            assert!(map.insert(i, i));
        }
        for i in 1..=10 {
            assert!(map.contains(&i));
        }
    }

    #[test]
    fn insert_is_add_if_absent() {
        let map: FineHashMap<&str, i32> = ConcurrentMap::new(8, 0.75);
        assert!(map.insert("k", 1));
        assert!(!map.insert("k", 2));
        assert_eq!(map.get(&"k"), Some(1));
    }

    /// S3: four threads each insert a disjoint quarter of the key space,
    /// then every thread reads its own quarter back.
    #[test]
    fn parallel_partition_scenario_s3() {
        const NUM: i32 = 4000;
        let map = Arc::new(FineHashMap::<i32, i32>::new(8, 0.75));
        let mut joins = Vec::new();

        for t in 0..4 {
            let map = map.clone();
            joins.push(thread::spawn(move || {
                let quarter = NUM / 4;
                for i in t * quarter..(t + 1) * quarter {
                    assert!(map.insert(i, i));
                }
                for i in t * quarter..(t + 1) * quarter {
                    assert_eq!(map.get(&i), Some(i));
                }
            }));
        }

        for j in joins {
            j.join().unwrap();
        }

        assert_eq!(map.len() as i32, NUM);
    }
}
