//! Dict: two bucket tables, incremental migration between them, and the
//! growth policy that starts it.
//!
//! State machine: idle (`rehash_idx == None`, every entry in table 0,
//! table 1 unallocated) or rehashing (`rehash_idx == Some(i)`, table 0
//! buckets below `i` drained, new entries linked into table 1). A
//! migration ends inside the step that empties table 0: table 1 is
//! promoted into slot 0 and the cursor cleared.
//!
//! Every lookup, insert and delete first migrates one bucket unless a
//! safe iterator is open, so the cost of a resize is spread across the
//! operations that follow it.

use crate::config::{DictConfig, FORCE_RESIZE_RATIO, INITIAL_SIZE, REHASH_BATCH};
use crate::dict_type::{DictType, StdHash, Value};
use crate::error::{DictError, ResizeDenied, Result};
use crate::iter::{Iter, SafeIter};
use crate::pin::IterPins;
use crate::stats::{DictStats, TableStats};
use crate::table::{next_power, BucketTable, Entries, Entry, EntryHandle};
use core::hash::Hash;
use rand::Rng;
use slotmap::DefaultKey;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Outcome of [`Dict::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Added,
    Replaced,
}

pub struct Dict<K, P, T: DictType<K, P> = StdHash> {
    ty: T,
    ctx: T::Context,
    config: Rc<DictConfig>,
    pub(crate) ht: [BucketTable; 2],
    pub(crate) entries: Entries<K, P>,
    rehash_idx: Option<usize>,
    pub(crate) pins: IterPins,
}

impl<K, P> Dict<K, P>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_type(StdHash::default(), ())
    }
}

impl<K, P> Default for Dict<K, P>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P, T: DictType<K, P>> Dict<K, P, T> {
    /// Empty dictionary with its own default config. No buckets are
    /// allocated until the first insertion.
    pub fn with_type(ty: T, ctx: T::Context) -> Self {
        Self::with_config(ty, ctx, DictConfig::shared())
    }

    /// Empty dictionary governed by a (possibly shared) config.
    pub fn with_config(ty: T, ctx: T::Context, config: Rc<DictConfig>) -> Self {
        Self {
            ty,
            ctx,
            config,
            ht: [BucketTable::empty(), BucketTable::empty()],
            entries: Entries::new(),
            rehash_idx: None,
            pins: IterPins::new(),
        }
    }

    pub fn config(&self) -> &Rc<DictConfig> {
        &self.config
    }
    pub fn dict_type(&self) -> &T {
        &self.ty
    }
    pub fn context(&self) -> &T::Context {
        &self.ctx
    }
    pub fn context_mut(&mut self) -> &mut T::Context {
        &mut self.ctx
    }

    /// Live entries across both tables.
    pub fn len(&self) -> usize {
        self.ht[0].used() + self.ht[1].used()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buckets allocated across both tables.
    pub fn slots(&self) -> usize {
        self.ht[0].size() + self.ht[1].size()
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Bucket count of table 0 (current) or 1 (rehash target).
    pub fn table_size(&self, table: usize) -> usize {
        self.ht.get(table).map_or(0, BucketTable::size)
    }

    pub fn table_used(&self, table: usize) -> usize {
        self.ht.get(table).map_or(0, BucketTable::used)
    }

    /// Number of safe iterators currently open on this dictionary.
    pub fn safe_iterators(&self) -> usize {
        self.pins.count()
    }

    fn make_hash(&self, key: &K) -> u64 {
        self.ty.hash(key, self.config.hash_seed())
    }

    /// One bucket of migration, skipped while a safe iterator is open.
    fn rehash_step(&mut self) {
        if !self.pins.is_pinned() {
            self.rehash(1);
        }
    }

    /// Probe table 0, then table 1 only while rehashing.
    fn lookup(&self, key: &K, hash: u64) -> Option<DefaultKey> {
        let (ty, ctx) = (&self.ty, &self.ctx);
        for table in &self.ht {
            let found = table.find(&self.entries, hash, |stored| ty.compare_keys(ctx, key, stored));
            if found.is_some() {
                return found;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Step, grow if needed, then hash and probe for `key`.
    fn prepare_insert(&mut self, key: &K) -> Result<(u64, Option<DefaultKey>)> {
        self.rehash_step();
        self.expand_if_needed()?;
        let hash = self.make_hash(key);
        Ok((hash, self.lookup(key, hash)))
    }

    /// Links a new entry into the table currently receiving insertions.
    fn add_entry(&mut self, key: K, hash: u64) -> EntryHandle {
        let key = self.ty.dup_key(&self.ctx, key);
        let k = self.entries.insert(Entry {
            key,
            value: Value::ZERO,
            hash,
            next: None,
        });
        let target = usize::from(self.is_rehashing());
        self.ht[target].push_front(&mut self.entries, k);
        EntryHandle::new(k)
    }

    fn release_entry(ty: &T, ctx: &T::Context, entry: Entry<K, P>) {
        ty.destroy_key(ctx, entry.key);
        if let Value::Ptr(p) = entry.value {
            ty.destroy_value(ctx, p);
        }
    }

    /// Adds `key -> value`. Fails with `KeyAlreadyExists`, leaving the
    /// stored value untouched, when the key is present.
    pub fn insert(&mut self, key: K, value: P) -> Result<EntryHandle> {
        let h = self.insert_raw(key)?;
        let value = self.ty.dup_value(&self.ctx, value);
        self.entries[h.key()].value = Value::Ptr(value);
        Ok(h)
    }

    /// Adds `key` with a zero inline value and returns its handle so the
    /// caller can fill the value in place (e.g. with an inline integer).
    pub fn insert_raw(&mut self, key: K) -> Result<EntryHandle> {
        let (hash, existing) = self.prepare_insert(&key)?;
        if existing.is_some() {
            return Err(DictError::KeyAlreadyExists);
        }
        Ok(self.add_entry(key, hash))
    }

    /// Returns the entry for `key`, adding it with a zero value if absent.
    pub fn find_or_insert_raw(&mut self, key: K) -> Result<EntryHandle> {
        let (hash, existing) = self.prepare_insert(&key)?;
        match existing {
            Some(k) => Ok(EntryHandle::new(k)),
            None => Ok(self.add_entry(key, hash)),
        }
    }

    /// Insert-or-overwrite.
    ///
    /// On overwrite the new value is installed before the old one is
    /// destroyed, so a descriptor whose values share a reference-counted
    /// resource sees the increment before the decrement. The caller remains
    /// responsible for descriptors whose `destroy_value` would release a
    /// resource the new value still uses.
    pub fn set(&mut self, key: K, value: P) -> Result<SetOutcome> {
        let (hash, existing) = self.prepare_insert(&key)?;
        let value = self.ty.dup_value(&self.ctx, value);
        match existing {
            Some(k) => {
                let old = core::mem::replace(&mut self.entries[k].value, Value::Ptr(value));
                if let Value::Ptr(p) = old {
                    self.ty.destroy_value(&self.ctx, p);
                }
                Ok(SetOutcome::Replaced)
            }
            None => {
                let h = self.add_entry(key, hash);
                self.entries[h.key()].value = Value::Ptr(value);
                Ok(SetOutcome::Added)
            }
        }
    }

    fn generic_delete(&mut self, key: &K, release_payload: bool) -> Result<Option<(K, Value<P>)>> {
        if !self.ht[0].is_allocated() {
            return Err(DictError::KeyNotFound);
        }
        self.rehash_step();
        let hash = self.make_hash(key);
        let rehashing = self.is_rehashing();
        let (ty, ctx) = (&self.ty, &self.ctx);
        for table in self.ht.iter_mut() {
            let unlinked =
                table.unlink_where(&mut self.entries, hash, |stored| ty.compare_keys(ctx, key, stored));
            if let Some(k) = unlinked {
                let entry = self.entries.remove(k).ok_or(DictError::KeyNotFound)?;
                if release_payload {
                    Self::release_entry(ty, ctx, entry);
                    return Ok(None);
                }
                return Ok(Some((entry.key, entry.value)));
            }
            if !rehashing {
                break;
            }
        }
        Err(DictError::KeyNotFound)
    }

    /// Removes `key`, running the descriptor's key and value destructors.
    pub fn delete(&mut self, key: &K) -> Result<()> {
        self.generic_delete(key, true).map(|_| ())
    }

    /// Removes `key` without running destructors and hands the stored key
    /// and value back to the caller.
    pub fn take(&mut self, key: &K) -> Result<(K, Value<P>)> {
        self.generic_delete(key, false)?
            .ok_or(DictError::KeyNotFound)
    }

    pub fn find(&mut self, key: &K) -> Option<EntryHandle> {
        if !self.ht[0].is_allocated() {
            return None;
        }
        self.rehash_step();
        let hash = self.make_hash(key);
        self.lookup(key, hash).map(EntryHandle::new)
    }

    pub fn get(&mut self, key: &K) -> Option<&Value<P>> {
        let h = self.find(key)?;
        self.entries.get(h.key()).map(|e| &e.value)
    }

    pub fn contains_key(&mut self, key: &K) -> bool {
        self.find(key).is_some()
    }

    pub fn entry_key(&self, h: EntryHandle) -> Option<&K> {
        self.entries.get(h.key()).map(|e| &e.key)
    }

    pub fn entry_value(&self, h: EntryHandle) -> Option<&Value<P>> {
        self.entries.get(h.key()).map(|e| &e.value)
    }

    pub fn entry_value_mut(&mut self, h: EntryHandle) -> Option<&mut Value<P>> {
        self.entries.get_mut(h.key()).map(|e| &mut e.value)
    }

    /// Stores a pointer value (through `dup_value`) and returns the value it
    /// displaced, or `None` for a stale handle.
    pub fn set_entry_value(&mut self, h: EntryHandle, value: P) -> Option<Value<P>> {
        let value = self.ty.dup_value(&self.ctx, value);
        let e = self.entries.get_mut(h.key())?;
        Some(core::mem::replace(&mut e.value, Value::Ptr(value)))
    }

    pub fn set_signed(&mut self, h: EntryHandle, v: i64) -> Option<Value<P>> {
        let e = self.entries.get_mut(h.key())?;
        Some(core::mem::replace(&mut e.value, Value::I64(v)))
    }

    pub fn set_unsigned(&mut self, h: EntryHandle, v: u64) -> Option<Value<P>> {
        let e = self.entries.get_mut(h.key())?;
        Some(core::mem::replace(&mut e.value, Value::U64(v)))
    }

    // ---- rehashing engine ----

    fn allocate_table(&self, size: usize) -> Result<BucketTable> {
        BucketTable::allocate(size).map_err(|e| {
            if let DictError::OutOfMemory { bytes } = e {
                warn!(size, bytes, "bucket array allocation failed");
                self.config.report_oom(bytes);
            }
            e
        })
    }

    /// Allocates a table of at least `size` buckets. The first allocation
    /// becomes table 0 directly; later ones become the rehash target.
    pub fn expand(&mut self, size: usize) -> Result<()> {
        if self.is_rehashing() {
            return Err(DictError::InvalidResize(ResizeDenied::RehashingInProgress));
        }
        let used = self.ht[0].used();
        if used > size {
            return Err(DictError::InvalidResize(ResizeDenied::TooSmall { requested: size, used }));
        }
        let table = self.allocate_table(next_power(size))?;
        if !self.ht[0].is_allocated() {
            self.ht[0] = table;
            return Ok(());
        }
        debug!(from = self.ht[0].size(), to = table.size(), used, "starting incremental rehash");
        self.ht[1] = table;
        self.rehash_idx = Some(0);
        Ok(())
    }

    /// Shrinks (or grows) to the smallest table holding every entry at a
    /// load factor of at most one.
    pub fn resize(&mut self) -> Result<()> {
        if !self.config.resize_enabled() {
            return Err(DictError::InvalidResize(ResizeDenied::ResizeDisabled));
        }
        if self.is_rehashing() {
            return Err(DictError::InvalidResize(ResizeDenied::RehashingInProgress));
        }
        self.expand(self.ht[0].used().max(INITIAL_SIZE))
    }

    /// Migrates up to `n` non-empty buckets from table 0 to table 1.
    /// Returns whether entries remain to be moved.
    pub fn rehash(&mut self, n: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        let [old, new] = &mut self.ht;
        for _ in 0..n {
            if old.used() == 0 {
                break;
            }
            // Buckets below the cursor are drained and `used > 0`, so a
            // non-empty bucket exists at or after it.
            while old.head(idx).is_none() {
                idx += 1;
                debug_assert!(idx < old.size());
            }
            old.move_bucket(idx, new, &mut self.entries);
            idx += 1;
        }
        if old.used() == 0 {
            self.ht[0] = core::mem::take(&mut self.ht[1]);
            self.rehash_idx = None;
            debug!(size = self.ht[0].size(), used = self.ht[0].used(), "rehash complete");
            return false;
        }
        self.rehash_idx = Some(idx);
        true
    }

    /// Rehashes in batches of `REHASH_BATCH` buckets until done or `budget`
    /// has elapsed. Returns `REHASH_BATCH` times the number of batches that
    /// left work behind; the batch that completes the migration is not
    /// counted, so a migration finished in one batch reports 0.
    pub fn rehash_for(&mut self, budget: Duration) -> usize {
        let start = Instant::now();
        let mut rehashes = 0;
        while self.rehash(REHASH_BATCH) {
            rehashes += REHASH_BATCH;
            if start.elapsed() > budget {
                break;
            }
        }
        trace!(rehashes, elapsed_us = start.elapsed().as_micros() as u64, "timed rehash pass");
        rehashes
    }

    pub fn rehash_milliseconds(&mut self, ms: u64) -> usize {
        self.rehash_for(Duration::from_millis(ms))
    }

    // ---- resize policy ----

    /// Called from the insert path only.
    fn expand_if_needed(&mut self) -> Result<()> {
        if self.is_rehashing() {
            return Ok(());
        }
        if !self.ht[0].is_allocated() {
            return self.expand(INITIAL_SIZE);
        }
        let (used, size) = (self.ht[0].used(), self.ht[0].size());
        // The forced path compares the load factor the pending insertion
        // would produce against the ratio.
        let overloaded = used + 1 > size.saturating_mul(FORCE_RESIZE_RATIO);
        if used >= size && (self.config.resize_enabled() || overloaded) {
            return self.expand(size.max(used).saturating_mul(2));
        }
        Ok(())
    }

    // ---- random sampling ----

    /// A random entry, using the thread-local RNG.
    pub fn random_entry(&mut self) -> Option<EntryHandle> {
        self.random_entry_with(&mut rand::rng())
    }

    /// A random entry. Buckets are drawn uniformly across both tables
    /// (retrying empty ones), then a chain member uniformly.
    pub fn random_entry_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<EntryHandle> {
        if self.is_empty() {
            return None;
        }
        self.rehash_step();
        let (table, idx) = if self.is_rehashing() {
            let s0 = self.ht[0].size();
            let total = s0 + self.ht[1].size();
            loop {
                let h = rng.random_range(0..total);
                let (t, i) = if h >= s0 { (1, h - s0) } else { (0, h) };
                if self.ht[t].head(i).is_some() {
                    break (t, i);
                }
            }
        } else {
            let size = self.ht[0].size();
            loop {
                let i = rng.random_range(0..size);
                if self.ht[0].head(i).is_some() {
                    break (0, i);
                }
            }
        };
        let t = &self.ht[table];
        let len = t.chain_len(&self.entries, idx);
        let n = rng.random_range(0..len);
        t.nth_in_chain(&self.entries, idx, n).map(EntryHandle::new)
    }

    // ---- iteration ----

    /// Borrowing iterator. Holding it shares `&self`, so the dictionary
    /// cannot be mutated (or stepped) until it is dropped.
    pub fn iter(&self) -> Iter<'_, K, P, T> {
        Iter::new(self)
    }

    /// Cursor that tolerates mutation between calls. While it (or any other
    /// safe iterator) is open, operations do not migrate buckets. Explicit
    /// `rehash`/`rehash_for` calls are not paused and must not be issued
    /// while a safe iterator is in use.
    pub fn safe_iter(&self) -> SafeIter {
        SafeIter::new(self.pins.pin())
    }

    // ---- teardown ----

    /// Removes every entry, running destructors, and frees both tables.
    pub fn clear(&mut self) {
        self.ht = [BucketTable::empty(), BucketTable::empty()];
        self.rehash_idx = None;
        let (ty, ctx) = (&self.ty, &self.ctx);
        for (_, entry) in self.entries.drain() {
            Self::release_entry(ty, ctx, entry);
        }
    }

    /// Tears the dictionary down, running destructors for every entry.
    pub fn release(self) {
        drop(self);
    }

    pub fn stats(&self) -> DictStats {
        DictStats {
            main: TableStats::collect(&self.ht[0], &self.entries),
            rehash_target: self
                .is_rehashing()
                .then(|| TableStats::collect(&self.ht[1], &self.entries)),
        }
    }
}

impl<K, P, T: DictType<K, P>> Drop for Dict<K, P, T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'a, K, P, T: DictType<K, P>> IntoIterator for &'a Dict<K, P, T> {
    type Item = (EntryHandle, &'a K, &'a Value<P>);
    type IntoIter = Iter<'a, K, P, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl EntryHandle {
    pub fn key_ref<'a, K, P, T: DictType<K, P>>(&self, dict: &'a Dict<K, P, T>) -> Option<&'a K> {
        dict.entry_key(*self)
    }

    pub fn value_ref<'a, K, P, T: DictType<K, P>>(&self, dict: &'a Dict<K, P, T>) -> Option<&'a Value<P>> {
        dict.entry_value(*self)
    }

    pub fn value_mut<'a, K, P, T: DictType<K, P>>(
        &self,
        dict: &'a mut Dict<K, P, T>,
    ) -> Option<&'a mut Value<P>> {
        dict.entry_value_mut(*self)
    }
}
