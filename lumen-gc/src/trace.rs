//! The tracing contract every heap-resident type implements.
//!
//! This replaces the virtual `mark` method the ancestor runtime declares on
//! every heap kind (`Env::mark`, `Object::mark`, `StringPrim::mark`, ...):
//! instead of overriding a base-class method, each Rust type implements this
//! trait and pushes the erased handles of everything it directly references
//! onto the collector's work queue. The collector drains the queue exactly
//! the way the original `Marker` drains its `std::deque<Memory*>`.

use std::ptr::NonNull;

use crate::gc_box::GcBox;

pub type WorkQueue = Vec<NonNull<GcBox<dyn Trace>>>;

pub trait Trace {
    /// Push the erased handle of every heap object this value directly
    /// references onto `queue`. Leaf values (numbers, booleans, already-heap-
    /// allocated strings with no outgoing references) may leave this empty.
    fn trace(&self, queue: &mut WorkQueue);
}

/// A small helper so `Trace` impls can push a `Gc<T>` field without spelling
/// out the erasure call at every use site.
pub struct Tracer;

impl Tracer {
    pub fn push<T: Trace + 'static>(queue: &mut WorkQueue, handle: crate::gc_box::Gc<T>) {
        queue.push(handle.erase());
    }
}
