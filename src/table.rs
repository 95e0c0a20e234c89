//! Entry store and bucket table.
//!
//! Entries live in one `SlotMap` arena shared by both tables of a
//! dictionary. A bucket holds the key of its chain head and every entry
//! holds the key of its successor, so chains are singly linked through
//! generational indices instead of pointers. Unlinking walks the chain
//! once, tracking the predecessor.

use crate::config::INITIAL_SIZE;
use crate::dict_type::Value;
use crate::error::{DictError, Result};
use slotmap::{DefaultKey, SlotMap};

/// Stable reference to one live entry. Stale handles (entry deleted) never
/// resolve to another entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryHandle(DefaultKey);

impl EntryHandle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryHandle(k)
    }
    pub(crate) fn key(&self) -> DefaultKey {
        self.0
    }
}

#[derive(Debug)]
pub(crate) struct Entry<K, P> {
    pub(crate) key: K,
    pub(crate) value: Value<P>,
    // Cached so migration never calls back into the descriptor.
    pub(crate) hash: u64,
    pub(crate) next: Option<DefaultKey>,
}

pub(crate) type Entries<K, P> = SlotMap<DefaultKey, Entry<K, P>>;

/// Smallest power of two >= `size`, floored at `INITIAL_SIZE`.
pub(crate) fn next_power(size: usize) -> usize {
    const MAX_POWER: usize = 1 << (usize::BITS - 1);
    if size > MAX_POWER {
        return MAX_POWER;
    }
    size.next_power_of_two().max(INITIAL_SIZE)
}

/// One power-of-two array of chain heads plus its live entry count.
#[derive(Debug, Default)]
pub(crate) struct BucketTable {
    buckets: Vec<Option<DefaultKey>>,
    size: usize,
    sizemask: usize,
    used: usize,
}

impl BucketTable {
    pub(crate) const fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            size: 0,
            sizemask: 0,
            used: 0,
        }
    }

    /// Allocates `size` empty buckets. `size` must be a power of two.
    pub(crate) fn allocate(size: usize) -> Result<Self> {
        debug_assert!(size.is_power_of_two());
        let mut buckets = Vec::new();
        if buckets.try_reserve_exact(size).is_err() {
            let bytes = size.saturating_mul(core::mem::size_of::<Option<DefaultKey>>());
            return Err(DictError::OutOfMemory { bytes });
        }
        buckets.resize(size, None);
        Ok(Self {
            buckets,
            size,
            sizemask: size - 1,
            used: 0,
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }
    pub(crate) fn used(&self) -> usize {
        self.used
    }
    pub(crate) fn is_allocated(&self) -> bool {
        self.size != 0
    }

    #[inline]
    pub(crate) fn index(&self, hash: u64) -> usize {
        (hash as usize) & self.sizemask
    }

    pub(crate) fn head(&self, idx: usize) -> Option<DefaultKey> {
        self.buckets.get(idx).copied().flatten()
    }

    /// Links `k` at the front of the chain its cached hash selects.
    pub(crate) fn push_front<K, P>(&mut self, entries: &mut Entries<K, P>, k: DefaultKey) {
        let idx = self.index(entries[k].hash);
        entries[k].next = self.buckets[idx];
        self.buckets[idx] = Some(k);
        self.used += 1;
    }

    /// First entry in the chain for `hash` whose key satisfies `eq`.
    pub(crate) fn find<K, P, F>(&self, entries: &Entries<K, P>, hash: u64, mut eq: F) -> Option<DefaultKey>
    where
        F: FnMut(&K) -> bool,
    {
        if !self.is_allocated() {
            return None;
        }
        let mut cur = self.head(self.index(hash));
        while let Some(k) = cur {
            let e = &entries[k];
            if e.hash == hash && eq(&e.key) {
                return Some(k);
            }
            cur = e.next;
        }
        None
    }

    /// Unlinks the first entry matching `eq` from its chain and returns its
    /// arena key. The entry stays in the arena; the caller frees it.
    pub(crate) fn unlink_where<K, P, F>(
        &mut self,
        entries: &mut Entries<K, P>,
        hash: u64,
        mut eq: F,
    ) -> Option<DefaultKey>
    where
        F: FnMut(&K) -> bool,
    {
        if !self.is_allocated() {
            return None;
        }
        let idx = self.index(hash);
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.buckets[idx];
        while let Some(k) = cur {
            let (matches, next) = {
                let e = &entries[k];
                (e.hash == hash && eq(&e.key), e.next)
            };
            if matches {
                match prev {
                    None => self.buckets[idx] = next,
                    Some(p) => entries[p].next = next,
                }
                entries[k].next = None;
                self.used -= 1;
                return Some(k);
            }
            prev = Some(k);
            cur = next;
        }
        None
    }

    /// Moves every entry of bucket `idx` into `dst`, re-indexed under
    /// `dst`'s mask. Returns the number of entries moved.
    pub(crate) fn move_bucket<K, P>(
        &mut self,
        idx: usize,
        dst: &mut BucketTable,
        entries: &mut Entries<K, P>,
    ) -> usize {
        let mut moved = 0;
        let mut cur = self.buckets[idx].take();
        while let Some(k) = cur {
            cur = entries[k].next;
            dst.push_front(entries, k);
            self.used -= 1;
            moved += 1;
        }
        moved
    }

    pub(crate) fn chain_len<K, P>(&self, entries: &Entries<K, P>, idx: usize) -> usize {
        let mut len = 0;
        let mut cur = self.head(idx);
        while let Some(k) = cur {
            len += 1;
            cur = entries[k].next;
        }
        len
    }

    /// The `n`th entry of bucket `idx`, counting from the head.
    pub(crate) fn nth_in_chain<K, P>(&self, entries: &Entries<K, P>, idx: usize, n: usize) -> Option<DefaultKey> {
        let mut cur = self.head(idx);
        for _ in 0..n {
            cur = entries[cur?].next;
        }
        cur
    }
}
