//! Shared resize policy and hash seed.
//!
//! A `DictConfig` is the process-wide switchboard a host flips while it
//! runs copy-on-write snapshots: turning resizing off keeps dictionaries
//! from allocating and migrating large tables, except when a table becomes
//! overloaded past [`FORCE_RESIZE_RATIO`]. Dictionaries hold it through an
//! `Rc`, so one config can govern every dictionary of a process while tests
//! keep independent instances.

use crate::hash::DEFAULT_HASH_SEED;
use core::cell::Cell;
use std::rc::Rc;

/// Smallest bucket array ever allocated.
pub const INITIAL_SIZE: usize = 4;

/// Load factor past which a table grows even with resizing disabled.
pub const FORCE_RESIZE_RATIO: usize = 5;

/// Buckets migrated per batch by time-bounded rehashing.
pub const REHASH_BATCH: usize = 100;

/// Invoked with the requested byte count before `OutOfMemory` is returned.
pub type OomHandler = fn(usize);

#[derive(Debug)]
pub struct DictConfig {
    resize_enabled: Cell<bool>,
    hash_seed: Cell<u32>,
    oom_handler: Cell<Option<OomHandler>>,
}

impl DictConfig {
    pub const fn new() -> Self {
        Self {
            resize_enabled: Cell::new(true),
            hash_seed: Cell::new(DEFAULT_HASH_SEED),
            oom_handler: Cell::new(None),
        }
    }

    /// A fresh default config ready to hand to one or more dictionaries.
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    pub fn resize_enabled(&self) -> bool {
        self.resize_enabled.get()
    }

    pub fn set_resize_enabled(&self, enabled: bool) {
        self.resize_enabled.set(enabled);
    }

    pub fn hash_seed(&self) -> u32 {
        self.hash_seed.get()
    }

    /// Changes the seed for subsequent hashing. Entries already stored keep
    /// the hash computed at insertion time, so set this before populating.
    pub fn set_hash_seed(&self, seed: u32) {
        self.hash_seed.set(seed);
    }

    pub fn set_oom_handler(&self, handler: Option<OomHandler>) {
        self.oom_handler.set(handler);
    }

    pub(crate) fn report_oom(&self, bytes: usize) {
        if let Some(handler) = self.oom_handler.get() {
            handler(bytes);
        }
    }
}

impl Default for DictConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static REPORTED: Cell<usize> = const { Cell::new(0) };
    }

    fn record(bytes: usize) {
        REPORTED.with(|r| r.set(bytes));
    }

    #[test]
    fn defaults() {
        let cfg = DictConfig::new();
        assert!(cfg.resize_enabled());
        assert_eq!(cfg.hash_seed(), DEFAULT_HASH_SEED);
    }

    #[test]
    fn shared_handles_observe_updates() {
        let cfg = DictConfig::shared();
        let other = Rc::clone(&cfg);
        cfg.set_resize_enabled(false);
        cfg.set_hash_seed(7);
        assert!(!other.resize_enabled());
        assert_eq!(other.hash_seed(), 7);
    }

    #[test]
    fn oom_handler_runs_only_when_installed() {
        let cfg = DictConfig::new();
        cfg.report_oom(64);
        assert_eq!(REPORTED.with(Cell::get), 0);
        cfg.set_oom_handler(Some(record));
        cfg.report_oom(128);
        assert_eq!(REPORTED.with(Cell::get), 128);
    }
}
