//! Traversal of live entries: table 0 bucket by bucket, then table 1 when
//! a rehash is in flight; chain order within a bucket.
//!
//! Both iterator kinds share one cursor. The cursor pre-fetches the
//! successor of the entry it yields, so deleting the entry just yielded
//! does not derail the walk. Deleting the pre-fetched successor as well
//! ends that chain early; callers of [`SafeIter`] may delete at most the
//! entry just returned per call.

use crate::dict::Dict;
use crate::dict_type::{DictType, Value};
use crate::pin::IterPin;
use crate::table::EntryHandle;
use slotmap::DefaultKey;
use tracing::warn;

#[derive(Debug, Default)]
struct Cursor {
    table: usize,
    // Next bucket to load.
    bucket: usize,
    next: Option<DefaultKey>,
}

impl Cursor {
    fn advance<K, P, T: DictType<K, P>>(&mut self, dict: &Dict<K, P, T>) -> Option<DefaultKey> {
        loop {
            if let Some(k) = self.next.take() {
                // A stale key means the successor was deleted; the rest of
                // its chain is unreachable from here.
                if let Some(e) = dict.entries.get(k) {
                    self.next = e.next;
                    return Some(k);
                }
            }
            let table = &dict.ht[self.table];
            if self.bucket >= table.size() {
                if self.table == 0 && dict.is_rehashing() {
                    self.table = 1;
                    self.bucket = 0;
                    continue;
                }
                return None;
            }
            self.next = table.head(self.bucket);
            self.bucket += 1;
        }
    }
}

/// Borrowing iterator over `(handle, key, value)`.
///
/// The shared borrow of the dictionary rules out insert, delete and lookup
/// (all of which take `&mut`) for as long as the iterator lives.
pub struct Iter<'a, K, P, T: DictType<K, P>> {
    dict: &'a Dict<K, P, T>,
    cursor: Cursor,
}

impl<'a, K, P, T: DictType<K, P>> Iter<'a, K, P, T> {
    pub(crate) fn new(dict: &'a Dict<K, P, T>) -> Self {
        Self {
            dict,
            cursor: Cursor::default(),
        }
    }
}

impl<'a, K, P, T: DictType<K, P>> Iterator for Iter<'a, K, P, T> {
    type Item = (EntryHandle, &'a K, &'a Value<P>);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cursor.advance(self.dict)?;
        let e = self.dict.entries.get(k)?;
        Some((EntryHandle::new(k), &e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.dict.len()))
    }
}

/// Cursor-style iterator that does not borrow the dictionary.
///
/// Created by [`Dict::safe_iter`]. While open it pins the dictionary so
/// lookups and updates stop migrating buckets; insert, delete and find
/// between calls to [`next_entry`](Self::next_entry) stay correct. Closing
/// or dropping it releases the pin. A traversal is single pass; start a
/// new iterator to walk again.
#[derive(Debug)]
pub struct SafeIter {
    cursor: Cursor,
    pin: IterPin,
}

impl SafeIter {
    pub(crate) fn new(pin: IterPin) -> Self {
        Self {
            cursor: Cursor::default(),
            pin,
        }
    }

    /// Next live entry, or `None` once both tables are exhausted.
    ///
    /// Returns `None` without moving when `dict` is not the dictionary this
    /// iterator was opened on, since that dictionary is not pinned.
    pub fn next_entry<K, P, T: DictType<K, P>>(&mut self, dict: &Dict<K, P, T>) -> Option<EntryHandle> {
        if !dict.pins.owns(&self.pin) {
            warn!("safe iterator advanced over a dictionary it does not pin");
            return None;
        }
        self.cursor.advance(dict).map(EntryHandle::new)
    }

    /// Releases the pin; rehash steps resume with the next operation.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use crate::config::DictConfig;
    use crate::dict::Dict;
    use crate::dict_type::{IntKeys, Value};
    use std::collections::BTreeSet;

    fn filled(n: u32) -> Dict<u32, (), IntKeys> {
        let mut d = Dict::with_config(IntKeys, (), DictConfig::shared());
        for k in 0..n {
            let h = d.insert_raw(k).unwrap();
            d.set_unsigned(h, u64::from(k) * 10);
        }
        d
    }

    #[test]
    fn iter_yields_every_entry_once_mid_rehash() {
        let mut d = filled(40);
        while d.rehash(1) {}
        d.expand(512).unwrap();
        d.rehash(3);
        assert!(d.is_rehashing());
        let keys: Vec<u32> = d.iter().map(|(_, k, _)| *k).collect();
        let unique: BTreeSet<u32> = keys.iter().copied().collect();
        assert_eq!(keys.len(), 40);
        assert_eq!(unique, (0..40).collect::<BTreeSet<u32>>());
        for (_, k, v) in &d {
            assert_eq!(v.as_u64(), Some(u64::from(*k) * 10));
        }
    }

    #[test]
    fn empty_dict_iterates_nothing() {
        let d: Dict<u32, (), IntKeys> = Dict::with_type(IntKeys, ());
        assert_eq!(d.iter().count(), 0);
        let mut it = d.safe_iter();
        assert!(it.next_entry(&d).is_none());
    }

    #[test]
    fn safe_iter_tolerates_deleting_yielded_entry() {
        let mut d = filled(50);
        while d.rehash(1) {}
        d.expand(1024).unwrap();
        d.rehash(5);
        let mut it = d.safe_iter();
        let mut seen = BTreeSet::new();
        while let Some(h) = it.next_entry(&d) {
            let k = *h.key_ref(&d).unwrap();
            seen.insert(k);
            if k % 2 == 0 {
                d.delete(&k).unwrap();
            }
        }
        it.close();
        assert_eq!(seen, (0..50).collect::<BTreeSet<u32>>());
        assert_eq!(d.len(), 25);
        assert!(d.iter().all(|(_, k, _)| k % 2 == 1));
    }

    #[test]
    fn safe_iter_counts_and_releases_pin() {
        let d = filled(3);
        let a = d.safe_iter();
        let b = d.safe_iter();
        assert_eq!(d.safe_iterators(), 2);
        a.close();
        drop(b);
        assert_eq!(d.safe_iterators(), 0);
    }

    #[test]
    fn safe_iter_sees_values() {
        let d = filled(5);
        let mut it = d.safe_iter();
        let mut n = 0;
        while let Some(h) = it.next_entry(&d) {
            let k = *h.key_ref(&d).unwrap();
            assert_eq!(h.value_ref(&d), Some(&Value::U64(u64::from(k) * 10)));
            n += 1;
        }
        assert_eq!(n, 5);
    }

    #[test]
    fn safe_iter_refuses_a_dictionary_it_does_not_pin() {
        let a = filled(4);
        let mut b = filled(2000);
        while b.rehash(1) {}
        b.expand(1 << 14).unwrap();
        let mut it = a.safe_iter();
        assert!(it.next_entry(&b).is_none());
        assert_eq!(b.safe_iterators(), 0);
        // Lookups on b still migrate; a's iterator stays usable on a.
        let before = b.table_used(0);
        let _ = b.find(&0);
        assert!(b.table_used(0) < before);
        let mut n = 0;
        while it.next_entry(&a).is_some() {
            n += 1;
        }
        assert_eq!(n, 4);
    }
}
