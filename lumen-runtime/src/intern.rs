//! The per-runtime string intern pool.
//!
//! Property keys are interned so every comparison anywhere in the object
//! model - `getOwnProperty`, the indexmap's key hashing, `===` on a string
//! used as a key - can rely on pointer identity instead of a byte compare.
//! Two kinds of entry live here, exactly as spec.md distinguishes them:
//!
//! - **Permanent** entries (`typeof`, well-known property names like
//!   `"length"` and `"prototype"`, the empty string) are interned once at
//!   `Runtime` construction and never evicted; they are reachable for the
//!   runtime's whole lifetime because the pool itself roots them.
//! - **Regular** entries are interned on demand as scripts compute property
//!   keys at runtime, and are *not* rooted by the pool - if nothing else
//!   references one by the next collection, it is evicted from the pool in
//!   the same cycle that frees its storage.

use std::cell::RefCell;
use std::collections::HashMap;

use lumen_gc::{Gc, GarbageCollector, Pruner};

use crate::string::StringPrimitive;

pub struct InternPool {
    permanent: HashMap<Box<[u8]>, Gc<StringPrimitive>>,
    regular: HashMap<Box<[u8]>, Gc<StringPrimitive>>,
}

/// `Runtime` stores its pool behind a `RefCell` (every other field that
/// mutates after construction does too) and registers *that* with the
/// collector, so `Pruner::prune` needs interior mutability to reach the
/// pool through a shared reference - the same obligation
/// [`lumen_gc::GarbageCollector::register_pruner`]'s safety contract already
/// places on the registrant's address, not its mutability.
impl Pruner for RefCell<InternPool> {
    fn prune(&self, phase: bool) {
        self.borrow_mut().prune_unmarked(phase);
    }
}

impl InternPool {
    pub fn new() -> Self {
        InternPool {
            permanent: HashMap::new(),
            regular: HashMap::new(),
        }
    }

    /// Intern `bytes` permanently. Used only while bootstrapping a `Runtime`
    /// - every well-known property name and the result of `typeof` goes
    /// through here exactly once.
    pub fn intern_permanent(
        &mut self,
        gc: &GarbageCollector,
        bytes: &[u8],
    ) -> Gc<StringPrimitive> {
        if let Some(existing) = self.permanent.get(bytes) {
            return *existing;
        }
        let handle = gc
            .allocate(StringPrimitive::from_utf8(bytes.to_vec()))
            .expect("permanent string interning must not exhaust the heap at startup");
        self.permanent.insert(bytes.to_vec().into_boxed_slice(), handle);
        handle
    }

    /// Intern `bytes` as a regular (evictable) entry, reusing an existing
    /// permanent or regular entry with the same content if one exists.
    pub fn intern(&mut self, gc: &GarbageCollector, bytes: &[u8]) -> Gc<StringPrimitive> {
        if let Some(existing) = self.permanent.get(bytes) {
            return *existing;
        }
        if let Some(existing) = self.regular.get(bytes) {
            return *existing;
        }
        let handle = gc
            .allocate(StringPrimitive::from_utf8(bytes.to_vec()))
            .expect("string interning allocation failed");
        self.regular.insert(bytes.to_vec().into_boxed_slice(), handle);
        handle
    }

    pub fn lookup(&self, bytes: &[u8]) -> Option<Gc<StringPrimitive>> {
        self.permanent
            .get(bytes)
            .or_else(|| self.regular.get(bytes))
            .copied()
    }

    /// Drop every regular entry the mark phase that just finished (tagged
    /// `phase`) did not reach. Must run strictly between a collector's mark
    /// phase and its sweep phase - see
    /// [`lumen_gc::GarbageCollector::collect_with`] - since after sweep the
    /// underlying storage of an unmarked entry is already freed.
    pub fn prune_unmarked(&mut self, phase: bool) {
        let before = self.regular.len();
        self.regular.retain(|_, handle| handle.is_marked(phase));
        let evicted = before - self.regular.len();
        if evicted > 0 {
            log::trace!("lumen-runtime: intern pool evicted {} entries", evicted);
        }
    }

    pub fn permanent_count(&self) -> usize {
        self.permanent.len()
    }

    pub fn regular_count(&self) -> usize {
        self.regular.len()
    }
}

impl Default for InternPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gc::GcConfig;

    #[test]
    fn interning_same_bytes_twice_returns_same_handle() {
        let gc = GarbageCollector::new(GcConfig::default());
        let mut pool = InternPool::new();
        let a = pool.intern(&gc, b"length");
        let b = pool.intern(&gc, b"length");
        assert!(Gc::ptr_eq(a, b));
    }

    #[test]
    fn permanent_entries_shadow_regular_interning() {
        let gc = GarbageCollector::new(GcConfig::default());
        let mut pool = InternPool::new();
        let perm = pool.intern_permanent(&gc, b"prototype");
        let again = pool.intern(&gc, b"prototype");
        assert!(Gc::ptr_eq(perm, again));
        assert_eq!(pool.regular_count(), 0);
    }

    #[test]
    fn unreferenced_regular_entry_is_pruned_after_collection() {
        let gc = GarbageCollector::new(GcConfig::default());
        let mut pool = InternPool::new();
        pool.intern(&gc, b"transient");
        assert_eq!(pool.regular_count(), 1);

        gc.collect_with(|phase| pool.prune_unmarked(phase));
        assert_eq!(pool.regular_count(), 0);
    }
}
