//! Per-object GC header.
//!
//! The original allocator folds its mark bit into the low bit of each block's
//! `next` link, since the pointer is always at least 2-byte aligned and the bit
//! is never dereferenced. Rust's aliasing rules make stealing a bit from a live
//! `NonNull<T>` unsound without an extra unsafe layer the spec does not
//! otherwise require, so this header keeps the same two pieces of information
//! - the link to the next allocated block, and the current mark state - as two
//! plain `Cell` fields instead of one packed word. The allocation-list
//! structure and the mark-phase-toggling algorithm built on top are unchanged.

use std::cell::Cell;
use std::ptr::NonNull;

use crate::gc_box::GcBox;
use crate::trace::Trace;

/// A type-erased pointer to any heap-allocated, traceable object.
pub type ErasedPtr = NonNull<GcBox<dyn Trace>>;

pub struct GcHeader {
    next: Cell<Option<ErasedPtr>>,
    /// Set to the collector's current phase bit when this object is marked
    /// live during a collection; compared against the (possibly just-flipped)
    /// phase bit rather than cleared before every cycle. `None` means "never
    /// marked by any cycle yet", so a freshly allocated object is never
    /// mistaken for one that survived a collection that hasn't happened yet.
    mark: Cell<Option<bool>>,
    size: usize,
}

impl GcHeader {
    pub fn new(size: usize) -> Self {
        GcHeader {
            next: Cell::new(None),
            mark: Cell::new(None),
            size,
        }
    }

    #[inline]
    pub fn next(&self) -> Option<ErasedPtr> {
        self.next.get()
    }

    #[inline]
    pub fn set_next(&self, next: Option<ErasedPtr>) {
        self.next.set(next);
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this object was marked live during the cycle identified by
    /// `phase`.
    #[inline]
    pub fn marked_as(&self, phase: bool) -> bool {
        self.mark.get() == Some(phase)
    }

    #[inline]
    pub fn set_mark(&self, phase: bool) {
        self.mark.set(Some(phase));
    }
}
