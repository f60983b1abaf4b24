//! Access-recency index over row addresses.
//!
//! Two simultaneous views over the same set of keys: a doubly-linked
//! sequence in access order (head = least recently used, tail = most
//! recently used) and a hash index for O(1) position lookup. The links
//! live in an index-addressed arena with a free-list, so there are no raw
//! pointers to manage; a slot index plays the role the node pointer plays
//! in an intrusive list.
//!
//! The index is deliberately not synchronized: it is owned and mutated by
//! exactly one maintenance worker at a time.

use rustc_hash::FxHashMap;

use crate::entry::RowKey;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot {
    key: Option<RowKey>,
    prev: usize,
    next: usize,
}

/// Ordered set of row addresses with O(1) touch, lookup, and LRU pop.
///
/// Every key appears at most once.
#[derive(Debug)]
pub struct RecencyIndex {
    slots: Vec<Slot>,
    index: FxHashMap<RowKey, usize>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl Default for RecencyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: FxHashMap::default(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index tracks no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `key` is currently tracked.
    #[must_use]
    pub fn contains(&self, key: &RowKey) -> bool {
        self.index.contains_key(key)
    }

    /// Marks `key` as most recently used, inserting it if absent.
    pub fn touch(&mut self, key: RowKey) {
        if let Some(&slot) = self.index.get(&key) {
            if slot != self.tail {
                self.unlink(slot);
                self.link_tail(slot);
            }
            return;
        }

        let slot = self.alloc(key.clone());
        self.index.insert(key, slot);
        self.link_tail(slot);
    }

    /// Removes and returns the least recently used key.
    pub fn pop_lru(&mut self) -> Option<RowKey> {
        let slot = self.head;
        if slot == NIL {
            return None;
        }
        self.unlink(slot);
        let key = self.release(slot);
        self.index.remove(&key);
        Some(key)
    }

    /// The least recently used key, without removing it.
    #[must_use]
    pub fn peek_lru(&self) -> Option<&RowKey> {
        if self.head == NIL {
            return None;
        }
        self.slots[self.head].key.as_ref()
    }

    /// Removes `key` from the index, if tracked.
    pub fn remove(&mut self, key: &RowKey) -> bool {
        let Some(slot) = self.index.remove(key) else {
            return false;
        };
        self.unlink(slot);
        self.release(slot);
        true
    }

    fn alloc(&mut self, key: RowKey) -> usize {
        if let Some(slot) = self.free.pop() {
            self.slots[slot].key = Some(key);
            slot
        } else {
            self.slots.push(Slot {
                key: Some(key),
                prev: NIL,
                next: NIL,
            });
            self.slots.len() - 1
        }
    }

    fn release(&mut self, slot: usize) -> RowKey {
        self.free.push(slot);
        self.slots[slot]
            .key
            .take()
            .unwrap_or_else(|| RowKey::new("", ""))
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[slot].prev = NIL;
        self.slots[slot].next = NIL;
    }

    fn link_tail(&mut self, slot: usize) {
        self.slots[slot].prev = self.tail;
        self.slots[slot].next = NIL;
        if self.tail == NIL {
            self.head = slot;
        } else {
            self.slots[self.tail].next = slot;
        }
        self.tail = slot;
    }
}
