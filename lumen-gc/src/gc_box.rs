//! The allocation unit and the handle scripts and the runtime hold to it.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::header::GcHeader;
use crate::trace::Trace;

/// A GC header paired with the value it guards. Always heap-allocated and
/// always reached through a [`Gc<T>`] handle or through the collector's own
/// intrusive allocation list - never on the stack, never by value.
pub struct GcBox<T: ?Sized + Trace> {
    pub(crate) header: GcHeader,
    pub(crate) value: T,
}

impl<T: Trace> GcBox<T> {
    pub(crate) fn new(value: T, size: usize) -> Box<Self> {
        Box::new(GcBox {
            header: GcHeader::new(size),
            value,
        })
    }
}

impl<T: ?Sized + Trace> GcBox<T> {
    pub(crate) fn header(&self) -> &GcHeader {
        &self.header
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }
}

/// A handle to a heap object owned by the collector.
///
/// `Gc<T>` is `Copy`: it carries no destructor and no ownership, mirroring the
/// spec's requirement that heap references inside a tagged value are raw
/// pointers managed exclusively by the allocator. Dereferencing one after the
/// object it points to has been swept is undefined behavior, exactly as
/// dereferencing a dangling pointer in the original runtime would be - the
/// caller's obligation is to keep the referent reachable from a root for as
/// long as the handle is in use, the same obligation spec.md places on every
/// heap reference.
pub struct Gc<T: ?Sized + Trace> {
    ptr: NonNull<GcBox<T>>,
    _marker: PhantomData<Cell<T>>,
}

impl<T: Trace> Gc<T> {
    pub(crate) fn from_raw(ptr: NonNull<GcBox<T>>) -> Self {
        Gc {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Type-erase this handle for the collector's tracing work queue.
    pub fn erase(self) -> NonNull<GcBox<dyn Trace>>
    where
        T: 'static,
    {
        let raw: *mut GcBox<T> = self.ptr.as_ptr();
        let erased: *mut GcBox<dyn Trace> = raw;
        unsafe { NonNull::new_unchecked(erased) }
    }

    pub fn ptr_eq(a: Gc<T>, b: Gc<T>) -> bool {
        std::ptr::eq(a.ptr.as_ptr(), b.ptr.as_ptr())
    }

    /// Whether this object was marked live during the cycle identified by
    /// `phase`. Only meaningful between a collector's mark phase and its
    /// sweep phase (see [`crate::GarbageCollector::collect_with`]); calling it
    /// outside that window still returns a value, it just reflects whichever
    /// cycle most recently ran.
    pub fn is_marked(self, phase: bool) -> bool {
        unsafe { self.ptr.as_ref().header().marked_as(phase) }
    }

    /// The handle's address, stable for the object's lifetime. Used for
    /// pointer-identity hashing (interned property keys, `===` on objects).
    pub fn addr(self) -> usize {
        self.ptr.as_ptr() as *const () as usize
    }
}

impl<T: ?Sized + Trace> Clone for Gc<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized + Trace> Copy for Gc<T> {}

impl<T: ?Sized + Trace> Deref for Gc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref().value() }
    }
}

impl<T: ?Sized + Trace> std::fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gc({:p})", self.ptr.as_ptr())
    }
}
