//! Non-local control transfer: the try/throw machinery that unwinds from
//! deeply nested native frames to the nearest installed handler.
//!
//! Ported from `throwValue`/`TryRecord` in `runtime.h`/`runtime.cxx`, which
//! stores the thrown value on the runtime and `longjmp`s to the topmost
//! `TryRecord`'s `jbuf`. Rust has no safe `setjmp`/`longjmp`; the idiomatic
//! replacement is `std::panic::catch_unwind` paired with a private
//! zero-sized payload type so that only this module's own throws are ever
//! caught here - a panic from anywhere else (a genuine bug) still propagates
//! and aborts/unwinds past `pushTry` the way an uncaught C++ exception would.

use std::cell::RefCell;
use std::panic::AssertUnwindSafe;

use crate::value::TaggedValue;

/// The payload carried through `panic_any` to identify "this panic is a
/// script-level throw, not a Rust-level bug". Carries no data itself - the
/// thrown value travels separately through [`Runtime::thrown_object`], the
/// same indirection `throwValue` uses when it stashes the value on
/// `Runtime` before the `longjmp`.
pub(crate) struct ThrowSignal;

/// One entry in the chain of installed handlers, mirroring `TryRecord`. The
/// original links these through the native stack via `jbuf`; here the chain
/// is explicit so `popTry` can restore exactly the activation depth and try
/// stack that existed when the matching `pushTry` ran, independent of
/// whatever unwound through `catch_unwind` in between.
pub struct TryRecord {
    /// Depth for diagnostics only - how many handlers are nested here.
    depth: usize,
}

/// Per-runtime stack of installed handlers. Lives on [`crate::runtime::Runtime`]
/// rather than as a global, so multiple runtimes (e.g. in tests) never share
/// try state.
#[derive(Default)]
pub struct TryStack {
    records: RefCell<Vec<TryRecord>>,
}

impl TryStack {
    pub fn new() -> Self {
        TryStack {
            records: RefCell::new(Vec::new()),
        }
    }

    /// `pushTry`: install a new handler, returning a token `popTry` consumes.
    pub fn push(&self) -> TryRecord {
        let depth = self.records.borrow().len();
        self.records.borrow_mut().push(TryRecord { depth });
        TryRecord { depth }
    }

    /// `popTry`: detach the handler `pushTry` installed. Safe to call after
    /// either a normal return or a caught throw - both paths must pop their
    /// own record exactly once.
    pub fn pop(&self, record: TryRecord) {
        let mut records = self.records.borrow_mut();
        records.retain(|r| r.depth != record.depth);
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn depth(&self) -> usize {
        self.records.borrow().len()
    }
}

/// Run `body` with a new handler installed; `body` may call [`throw`]
/// (directly or transitively) to unwind back here. Returns `Ok(value)` on a
/// normal return, or `Err(thrown)` with the thrown value if `body` (or
/// anything it called) threw before returning.
///
/// This is the Rust-idiomatic rendition of "install a try-record, call
/// through to deeply nested frames, and resume at the handler with
/// `thrownObject` already restored" - the panic/catch_unwind pair stands in
/// for `setjmp`/`longjmp`, and `thrown_object` is read back from the runtime
/// immediately on catch, mirroring the design note that the handler's
/// enclosing activation must capture the thrown value into one of its own
/// locals as soon as it resumes.
pub fn try_catch<T>(
    try_stack: &TryStack,
    thrown_slot: &RefCell<Option<TaggedValue>>,
    body: impl FnOnce() -> T,
) -> Result<T, TaggedValue> {
    let record = try_stack.push();
    let result = std::panic::catch_unwind(AssertUnwindSafe(body));
    try_stack.pop(record);

    match result {
        Ok(value) => Ok(value),
        Err(payload) => {
            if payload.downcast_ref::<ThrowSignal>().is_some() {
                Err(thrown_slot
                    .borrow_mut()
                    .take()
                    .expect("ThrowSignal panic without a thrown_object set"))
            } else {
                // Not one of ours - a genuine Rust panic (an invariant
                // violation per spec.md §7) must keep unwinding rather than
                // be mistaken for a script-level throw.
                std::panic::resume_unwind(payload);
            }
        }
    }
}

/// `throwValue`: store `value` where the nearest [`try_catch`] will find it
/// and unwind there. If no handler is installed, the caller is expected to
/// have already checked [`TryStack::is_empty`] and print the unhandled-throw
/// diagnostic per spec.md §7 before calling this - by the time this function
/// runs, a throw with an empty try stack simply propagates past the last
/// `catch_unwind` in the process, which is the same "print and terminate"
/// behavior the original achieves with `unhandledException`/`abort`.
pub fn throw(thrown_slot: &RefCell<Option<TaggedValue>>, value: TaggedValue) -> ! {
    *thrown_slot.borrow_mut() = Some(value);
    std::panic::panic_any(ThrowSignal)
}
