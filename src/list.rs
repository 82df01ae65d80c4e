//! A lock-free, key-ascending ordered singly-linked list.
//!
//! This is the Harris/Michael node-marking algorithm: deletion is split into
//! a logical phase (tag the node's `next` pointer) and a physical phase
//! (CAS the predecessor past the tagged node). Any thread that walks past a
//! tagged node helps finish the physical unlink before continuing, so no
//! deleter's progress is required for anyone else's.
//!
//! The combined (mark, pointer) word the specification calls for is
//! `crossbeam_epoch::Atomic<Node<K, V>>`: its tag bit *is* the mark, and its
//! `compare_exchange` *is* the single-word CAS. Reclamation of physically
//! unlinked nodes goes through the epoch collector (`Guard::defer_destroy`)
//! rather than an immediate, unsafe free.

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::Ordering;

struct Node<K, V> {
    key: K,
    value: V,
    next: Atomic<Node<K, V>>,
}

/// A lock-free ordered set of key/value pairs.
///
/// `insert` is add-if-absent: inserting an already-present key is a no-op
/// that returns `false`.
pub struct List<K, V> {
    head: Atomic<Node<K, V>>,
}

impl<K, V> Default for List<K, V> {
    fn default() -> Self {
        List::new()
    }
}

impl<K, V> List<K, V> {
    /// Create an empty list.
    pub fn new() -> List<K, V> {
        List {
            head: Atomic::null(),
        }
    }
}

impl<K: Ord, V> List<K, V> {
    /// Walk the chain looking for `key`.
    ///
    /// Returns `(found, prev, curr)` where `prev` is the link last followed
    /// (the head, or some live node's `next` field) and `curr` is its
    /// current target: the first node with key `>= key`, or null if the
    /// chain ran out. Tagged (logically deleted) nodes encountered along the
    /// way are helped along: physically unlinked and handed to the epoch
    /// collector.
    fn search<'g>(
        &self,
        key: &K,
        guard: &'g Guard,
    ) -> (bool, &'g Atomic<Node<K, V>>, Shared<'g, Node<K, V>>) {
        'retry: loop {
            let mut prev = &self.head;
            let mut curr = prev.load(Ordering::Acquire, guard);

            loop {
                let curr_ref = match unsafe { curr.as_ref() } {
                    None => return (false, prev, curr),
                    Some(node) => node,
                };

                let succ = curr_ref.next.load(Ordering::Acquire, guard);
                if succ.tag() == 1 {
                    // `curr` is logically deleted. Help physically unlink it
                    // before deciding anything about `key`.
                    let unmarked_succ = succ.with_tag(0);
                    match prev.compare_exchange(
                        curr,
                        unmarked_succ,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            log::trace!("list: help-unlinked a marked node");
                            unsafe { guard.defer_destroy(curr) };
                            curr = unmarked_succ;
                            continue;
                        }
                        Err(_) => continue 'retry,
                    }
                }

                match curr_ref.key.cmp(key) {
                    CmpOrdering::Less => {
                        prev = &curr_ref.next;
                        curr = succ;
                    }
                    CmpOrdering::Equal => return (true, prev, curr),
                    CmpOrdering::Greater => return (false, prev, curr),
                }
            }
        }
    }

    /// Insert `key`/`value` if `key` is not already present.
    ///
    /// Returns `true` iff the key was newly added.
    pub fn insert(&self, key: K, value: V, guard: &Guard) -> bool {
        let mut new_node = Owned::new(Node {
            key,
            value,
            next: Atomic::null(),
        });

        loop {
            let (found, prev, curr) = self.search(&new_node.key, guard);
            if found {
                // `new_node` is dropped here, freeing the not-yet-published
                // node directly (no concurrent reader can ever have observed
                // it).
                return false;
            }

            new_node.next.store(curr, Ordering::Relaxed);
            match prev.compare_exchange(curr, new_node, Ordering::AcqRel, Ordering::Acquire, guard)
            {
                Ok(_) => return true,
                Err(err) => new_node = err.new,
            }
        }
    }

    /// Remove `key`, if present.
    ///
    /// Returns `true` iff the key was present and removed.
    pub fn delete(&self, key: &K, guard: &Guard) -> bool {
        loop {
            let (found, prev, curr) = self.search(key, guard);
            if !found {
                return false;
            }

            let curr_ref = unsafe { curr.deref() };
            let succ = curr_ref.next.load(Ordering::Acquire, guard);
            if succ.tag() == 1 {
                // Someone else is concurrently deleting this node; retry.
                continue;
            }

            let marked_succ = succ.with_tag(1);
            if curr_ref
                .next
                .compare_exchange(succ, marked_succ, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_err()
            {
                continue;
            }

            // Logically deleted. Try to physically unlink immediately; if
            // that races with another thread, a subsequent `search` will
            // help finish the job.
            match prev.compare_exchange(curr, succ, Ordering::AcqRel, Ordering::Acquire, guard) {
                Ok(_) => unsafe { guard.defer_destroy(curr) },
                Err(_) => {
                    let _ = self.search(key, guard);
                }
            }

            return true;
        }
    }

    /// Look up `key`, cloning out its value if present.
    pub fn find(&self, key: &K, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        let (found, _, curr) = self.search(key, guard);
        if found {
            Some(unsafe { curr.deref() }.value.clone())
        } else {
            None
        }
    }

    /// Does the list contain `key`?
    pub fn contains(&self, key: &K, guard: &Guard) -> bool {
        self.search(key, guard).0
    }
}

impl<K, V> Drop for List<K, V> {
    fn drop(&mut self) {
        // No concurrent access is possible once we have `&mut self`, so we
        // can walk and free the chain directly without deferring.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while let Some(node) = curr.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                drop(curr.into_owned());
                curr = next.with_tag(0);
            }
        }
    }
}
