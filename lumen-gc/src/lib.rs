//! lumen-gc - a precise, non-moving, single-threaded mark-and-sweep collector.
//!
//! This crate provides exactly the allocation and collection behavior the
//! embedding runtime needs: every heap block is reachable only by pointer from
//! a known set of roots (the runtime's intrinsic table and the activation
//! chain), nothing ever moves once allocated, and a collection can only occur
//! at the top of `GarbageCollector::allocate`. There is no concurrency, no
//! generations, and no region/NUMA tuning - the collector this crate started
//! from did all of that; none of it applies to a single-threaded AOT-compiled
//! script runtime, so it has been left behind.

pub mod collector;
pub mod config;
pub mod gc_box;
pub mod header;
pub mod trace;

pub use collector::{GarbageCollector, Pruner};
pub use config::GcConfig;
pub use gc_box::{Gc, GcBox};
pub use lumen_util::{LumenError, Result};
pub use trace::{Trace, Tracer, WorkQueue};

/// Construct a collector with default tuning.
pub fn new_collector() -> GarbageCollector {
    GarbageCollector::new(GcConfig::default())
}
