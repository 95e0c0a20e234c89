//! Open safe-iterator accounting.
//!
//! A dictionary embeds one `IterPins`; every safe iterator holds an
//! `IterPin` guard. While any guard is alive the dictionary skips its
//! per-operation rehash step, so the split between the old and the new
//! table stays frozen for the traversal. Guards release themselves on
//! drop, so a forgotten `close` cannot freeze migration forever.

use core::cell::Cell;
use std::rc::Rc;

/// Per-dictionary count of live pins.
#[derive(Debug, Default)]
pub struct IterPins {
    count: Rc<Cell<usize>>,
}

impl IterPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a pin. The count stays raised until the guard is dropped.
    #[inline]
    pub fn pin(&self) -> IterPin {
        self.count.set(self.count.get() + 1);
        IterPin {
            count: Rc::clone(&self.count),
        }
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.count.get() > 0
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Whether `pin` was taken from this counter.
    pub(crate) fn owns(&self, pin: &IterPin) -> bool {
        Rc::ptr_eq(&self.count, &pin.count)
    }
}

/// RAII guard returned by `IterPins::pin`.
#[derive(Debug)]
pub struct IterPin {
    count: Rc<Cell<usize>>,
}

impl Drop for IterPin {
    fn drop(&mut self) {
        let c = self.count.get();
        debug_assert!(c > 0);
        self.count.set(c - 1);
    }
}
