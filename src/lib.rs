//! rehash-dict: a single-threaded chained hash dictionary that grows and
//! shrinks by incremental rehashing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a general-purpose associative container for an in-memory store
//!   that may never rewrite its whole table in one operation, because the
//!   host relies on copy-on-write snapshots.
//! - Layers:
//!   - `table`: entry arena (`slotmap`) plus power-of-two bucket arrays of
//!     singly linked chains threaded through generational keys.
//!   - `dict_type`: the behavior descriptor (`DictType`) that supplies
//!     hashing, key comparison, duplication and destruction.
//!   - `dict`: `Dict<K, P, T>` with two bucket tables, the rehashing
//!     engine and the resize policy.
//!   - `iter`: borrowing `Iter` and cursor-style `SafeIter`.
//!   - `pin`: RAII accounting of open safe iterators.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` through `Rc`-shared config and pins.
//! - Table sizes are powers of two, at least `INITIAL_SIZE`.
//! - A key is stored at most once across both tables.
//! - Each entry caches its hash; migration never calls the descriptor.
//!
//! Incremental rehashing
//! - `expand` allocates the target table and sets the cursor to bucket 0.
//! - Every insert, delete, find and random draw migrates one bucket first,
//!   unless a safe iterator is open. `rehash(n)` and `rehash_for(budget)`
//!   let callers drive migration explicitly.
//! - The step that drains table 0 promotes the target table in its place.
//!
//! Resize policy
//! - Inserts grow the table to `2 * max(size, used)` once `used >= size`
//!   and resizing is enabled on the shared `DictConfig`, or regardless of
//!   that switch once the load factor would pass `FORCE_RESIZE_RATIO`.
//! - `resize` compacts to the smallest power of two covering `used`.
//!
//! Iteration hazards
//! - `Iter` borrows the dictionary, so mutation while it is alive does not
//!   compile.
//! - `SafeIter` allows mutation between steps; callers may delete at most
//!   the entry just yielded per step, and must not drive `rehash` by hand
//!   while it is open.
//!
//! Notes and non-goals
//! - No persistence, no wire format, no concurrent access.
//! - Bucket arrays are allocated fallibly and report `OutOfMemory`; entry
//!   nodes use the arena's ordinary allocation.

pub mod config;
pub mod dict;
mod dict_proptest;
pub mod dict_type;
pub mod error;
pub mod hash;
pub mod iter;
mod pin;
pub mod stats;
mod table;

// Public surface
pub use config::{DictConfig, FORCE_RESIZE_RATIO, INITIAL_SIZE, REHASH_BATCH};
pub use dict::{Dict, SetOutcome};
pub use dict_type::{CaseInsensitiveKeys, DictType, IntKeys, StdHash, StringCopyKeys, Value};
pub use error::{DictError, ResizeDenied, Result};
pub use iter::{Iter, SafeIter};
pub use stats::{DictStats, TableStats};
pub use table::EntryHandle;
