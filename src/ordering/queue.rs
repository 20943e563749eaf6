use std::time::Instant;

use super::{LruOrdering, OrderedKey};

const RING_BUFFER_DEFAULT_CAPACITY: usize = 4;
const RING_BUFFER_MINIMUM_GROW: usize = 4;

/// A power-of-two-growing ring buffer ordered by insertion, re-sorted by
/// timestamp on `fix`.
///
/// Grounded in the ring-buffer `LRUQueue` of the original source: `push`
/// appends at the tail and grows capacity by `max(len * 2, len + 4)` when
/// full; `pop` removes at the head; `fix` and `remove` both rebuild the live
/// slice (the former re-sorting it by timestamp, matching the contract that
/// `peek` always yields the minimum timestamp currently held). Intended for
/// workloads that mostly append/drain and rarely fix/remove, since both of
/// those are O(n) here versus `HeapOrdering`'s O(log n) push/pop.
pub struct QueueOrdering<K> {
    ring: Vec<Option<OrderedKey<K>>>,
    head: usize,
    tail: usize,
    size: usize,
}

impl<K> Default for QueueOrdering<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> QueueOrdering<K> {
    /// Creates a new, empty queue ordering.
    pub fn new() -> Self {
        Self {
            ring: (0..RING_BUFFER_DEFAULT_CAPACITY).map(|_| None).collect(),
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.ring.len()
    }

    fn grow(&mut self) {
        let current = self.capacity();
        let new_capacity = (current * 2).max(current + RING_BUFFER_MINIMUM_GROW);
        let mut new_ring: Vec<Option<OrderedKey<K>>> = (0..new_capacity).map(|_| None).collect();
        for (i, slot) in new_ring.iter_mut().enumerate().take(self.size) {
            let from = (self.head + i) % current;
            *slot = self.ring[from].take();
        }
        self.ring = new_ring;
        self.head = 0;
        self.tail = self.size;
    }

    /// Drains the live slice into a `Vec` in head-to-tail order, resetting
    /// the ring to an empty buffer of at least the default capacity.
    fn drain_live(&mut self) -> Vec<OrderedKey<K>> {
        let capacity = self.capacity();
        let mut live = Vec::with_capacity(self.size);
        for i in 0..self.size {
            let idx = (self.head + i) % capacity;
            if let Some(entry) = self.ring[idx].take() {
                live.push(entry);
            }
        }
        self.head = 0;
        self.tail = 0;
        self.size = 0;
        live
    }

    /// Replaces the ring's contents with `live`, in order.
    fn refill(&mut self, live: Vec<OrderedKey<K>>) {
        let new_capacity = live.len().max(RING_BUFFER_DEFAULT_CAPACITY);
        let mut new_ring: Vec<Option<OrderedKey<K>>> = (0..new_capacity).map(|_| None).collect();
        let new_size = live.len();
        for (slot, entry) in new_ring.iter_mut().zip(live) {
            *slot = Some(entry);
        }
        self.ring = new_ring;
        self.head = 0;
        self.tail = new_size % self.ring.len().max(1);
        self.size = new_size;
    }
}

impl<K: Eq + Clone> LruOrdering<K> for QueueOrdering<K> {
    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, key: K, timestamp: Instant) {
        if self.size == self.capacity() {
            self.grow();
        }
        let tail = self.tail;
        self.ring[tail] = Some(OrderedKey::new(key, timestamp));
        self.tail = (self.tail + 1) % self.capacity();
        self.size += 1;
    }

    fn pop(&mut self) -> Option<OrderedKey<K>> {
        if self.size == 0 {
            return None;
        }
        let head = self.head;
        let removed = self.ring[head].take();
        self.head = (self.head + 1) % self.capacity();
        self.size -= 1;
        removed
    }

    fn peek(&self) -> Option<&OrderedKey<K>> {
        if self.size == 0 {
            return None;
        }
        self.ring[self.head].as_ref()
    }

    fn fix(&mut self, key: K, timestamp: Instant) {
        if self.size == 0 {
            self.push(key, timestamp);
            return;
        }
        let mut live = self.drain_live();
        let mut replaced = false;
        for entry in live.iter_mut() {
            if entry.key == key {
                entry.timestamp = timestamp;
                replaced = true;
                break;
            }
        }
        if !replaced {
            live.push(OrderedKey::new(key, timestamp));
        }
        live.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        self.refill(live);
    }

    fn remove(&mut self, key: &K) {
        if self.size == 0 {
            return;
        }
        let live = self.drain_live();
        let remaining: Vec<_> = live.into_iter().filter(|entry| &entry.key != key).collect();
        self.refill(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ts(offset_secs: u64) -> Instant {
        Instant::now()
            .checked_sub(Duration::from_secs(3600))
            .unwrap()
            + Duration::from_secs(offset_secs)
    }

    #[test]
    fn push_pop_is_fifo_and_grows_past_initial_capacity() {
        let mut q: QueueOrdering<u32> = QueueOrdering::new();
        for i in 0..8 {
            q.push(i, ts(i as u64));
            assert_eq!(q.peek().unwrap().key, 0);
        }
        assert_eq!(q.len(), 8);
        for i in 0..8 {
            let popped = q.pop().unwrap();
            assert_eq!(popped.key, i);
        }
        assert!(q.pop().is_none());
    }

    #[test]
    fn fix_keeps_peek_as_minimum_timestamp() {
        let mut q: QueueOrdering<&str> = QueueOrdering::new();
        q.push("a", ts(1));
        q.push("b", ts(2));
        q.push("c", ts(3));
        // refreshing "c" to the oldest timestamp should surface it at peek.
        q.fix("c", ts(0));
        assert_eq!(q.peek().unwrap().key, "c");
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn fix_on_absent_key_inserts_it() {
        let mut q: QueueOrdering<&str> = QueueOrdering::new();
        q.push("a", ts(5));
        q.fix("b", ts(1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.peek().unwrap().key, "b");
    }

    #[test]
    fn remove_drops_only_the_matching_key() {
        let mut q: QueueOrdering<u32> = QueueOrdering::new();
        for i in 0..5 {
            q.push(i, ts(i as u64));
        }
        q.remove(&2);
        assert_eq!(q.len(), 4);
        let mut remaining = Vec::new();
        while let Some(entry) = q.pop() {
            remaining.push(entry.key);
        }
        assert_eq!(remaining, vec![0, 1, 3, 4]);
    }

    #[test]
    fn consume_until_pops_while_predicate_holds() {
        let mut q: QueueOrdering<u32> = QueueOrdering::new();
        for i in 1..17 {
            q.push(i, ts(i as u64));
        }
        let cutoff = ts(11);
        let popped = q.consume_until(|t| t < cutoff);
        assert_eq!(popped.len(), 10);
        assert_eq!(q.len(), 6);
    }
}
