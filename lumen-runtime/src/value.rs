//! The tagged value representation every operator, property and activation
//! slot in this crate traffics in.
//!
//! `Tag` is declared in exactly the order spec.md requires -
//! Undefined < Null < Boolean < Number < String < Memory < Object < Function
//! - and derives `Ord`, so range checks like "is this tag object-like"
//! (`tag >= Tag::Memory`) read the same way the original's `VT_*` integer
//! comparisons do. The payload itself is a safe Rust enum rather than a
//! literal union: the original C++ `RawValue` union requires the reader to
//! already know the tag before touching the payload, which is exactly what an
//! enum's discriminant gives for free without `unsafe`.

use lumen_gc::{Gc, WorkQueue};

use crate::environment::Environment;
use crate::function::Function;
use crate::object::Object;
use crate::string::StringPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tag {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    /// A GC-managed value that is neither a script-visible Object nor
    /// Function - used by the FFI layer to box opaque native handles inside
    /// a `TaggedValue` without inventing a whole object wrapper for them.
    Memory,
    Object,
    Function,
}

/// Whatever a `MemoryCell` boxes must still be reachable from the GC's trace
/// graph, not just downcastable - `Any` alone would let a payload's own
/// outgoing `Gc` edges go unmarked, which is exactly what made `Environment`
/// boxed through [`crate::runtime::Runtime::wrap_environment`] missable until
/// this was added.
pub trait MemoryPayload: std::any::Any {
    fn as_any(&self) -> &dyn std::any::Any;
    fn trace_payload(&self, queue: &mut WorkQueue);
}

impl MemoryPayload for Gc<Environment> {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn trace_payload(&self, queue: &mut WorkQueue) {
        queue.push(self.erase());
    }
}

/// An opaque GC-managed cell for the `Memory` tag. It carries no script-level
/// behavior of its own; it exists so native code across the FFI boundary can
/// stash an arbitrary `'static` payload inside a value that still
/// participates in tracing and collection like everything else on the heap.
pub struct MemoryCell {
    pub payload: Box<dyn MemoryPayload>,
}

impl lumen_gc::Trace for MemoryCell {
    fn trace(&self, queue: &mut WorkQueue) {
        self.payload.trace_payload(queue);
    }
}

#[derive(Clone, Copy)]
enum Repr {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Gc<StringPrimitive>),
    Memory(Gc<MemoryCell>),
    Object(Gc<Object>),
    Function(Gc<Function>),
    /// Marks a deleted or never-set indexed slot inside an `Array`'s backing
    /// vector (spec.md §3: "A distinguished tag value ARRAY_HOLE marks a
    /// deleted indexed slot; it is never observable to user code"). Reports
    /// as `Tag::Undefined` through every public accessor below, so no
    /// script-visible read can tell a hole apart from an explicit
    /// `undefined` - only [`crate::indexed::IndexedStorage`]'s `has_index`
    /// looks underneath that to decide `in`/`for-in`/`hasOwnProperty`
    /// presence.
    ArrayHole,
}

#[derive(Clone, Copy)]
pub struct TaggedValue(Repr);

impl TaggedValue {
    pub fn undefined() -> Self {
        TaggedValue(Repr::Undefined)
    }

    pub fn null() -> Self {
        TaggedValue(Repr::Null)
    }

    pub fn boolean(b: bool) -> Self {
        TaggedValue(Repr::Boolean(b))
    }

    pub fn number(n: f64) -> Self {
        TaggedValue(Repr::Number(n))
    }

    pub fn string(s: Gc<StringPrimitive>) -> Self {
        TaggedValue(Repr::String(s))
    }

    pub fn memory(m: Gc<MemoryCell>) -> Self {
        TaggedValue(Repr::Memory(m))
    }

    pub fn object(o: Gc<Object>) -> Self {
        TaggedValue(Repr::Object(o))
    }

    pub fn function(f: Gc<Function>) -> Self {
        TaggedValue(Repr::Function(f))
    }

    /// Construct the `ARRAY_HOLE` sentinel. Only `IndexedStorage`'s `Array`
    /// variant should ever store one of these in a slot; nothing outside
    /// this crate can observe it as anything other than `undefined`.
    pub(crate) fn array_hole() -> Self {
        TaggedValue(Repr::ArrayHole)
    }

    pub(crate) fn is_array_hole(&self) -> bool {
        matches!(self.0, Repr::ArrayHole)
    }

    pub fn tag(&self) -> Tag {
        match self.0 {
            Repr::Undefined | Repr::ArrayHole => Tag::Undefined,
            Repr::Null => Tag::Null,
            Repr::Boolean(_) => Tag::Boolean,
            Repr::Number(_) => Tag::Number,
            Repr::String(_) => Tag::String,
            Repr::Memory(_) => Tag::Memory,
            Repr::Object(_) => Tag::Object,
            Repr::Function(_) => Tag::Function,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.tag() == Tag::Undefined
    }

    pub fn is_null(&self) -> bool {
        self.tag() == Tag::Null
    }

    /// Object-like for property access purposes: plain objects, arrays,
    /// boxed primitives and functions all answer yes, matching `tag >=
    /// Tag::Object` the way the spec's ordering is meant to be used.
    pub fn is_object_like(&self) -> bool {
        self.tag() >= Tag::Object
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.0 {
            Repr::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.0 {
            Repr::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<Gc<StringPrimitive>> {
        match self.0 {
            Repr::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Gc<Object>> {
        match self.0 {
            Repr::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<Gc<Function>> {
        match self.0 {
            Repr::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<Gc<MemoryCell>> {
        match self.0 {
            Repr::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// Push whichever heap handle this value carries (if any) onto the GC's
    /// work queue. `TaggedValue` itself does not implement `lumen_gc::Trace`
    /// because it is never allocated behind a `Gc<T>` - it only ever lives
    /// inline in an activation local, a property slot, or an indexed
    /// element, each of which implements `Trace` and delegates to this.
    pub fn trace(&self, queue: &mut WorkQueue) {
        match self.0 {
            Repr::String(s) => queue.push(s.erase()),
            Repr::Memory(m) => queue.push(m.erase()),
            Repr::Object(o) => queue.push(o.erase()),
            Repr::Function(f) => queue.push(f.erase()),
            Repr::Undefined | Repr::Null | Repr::Boolean(_) | Repr::Number(_) | Repr::ArrayHole => {}
        }
    }
}

impl std::fmt::Debug for TaggedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Repr::Undefined => write!(f, "undefined"),
            Repr::Null => write!(f, "null"),
            Repr::Boolean(b) => write!(f, "{}", b),
            Repr::Number(n) => write!(f, "{}", n),
            Repr::String(_) => write!(f, "<string>"),
            Repr::Memory(_) => write!(f, "<memory>"),
            Repr::Object(_) => write!(f, "<object>"),
            Repr::Function(_) => write!(f, "<function>"),
            Repr::ArrayHole => write!(f, "<hole>"),
        }
    }
}
