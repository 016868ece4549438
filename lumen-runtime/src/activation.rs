//! Stack-resident activation records.
//!
//! Ported from `StackFrame`/`StackFrameN<E,L,SkipInit>` in `runtime.h`: every
//! call pushes one of these as a native Rust stack value (never on the GC
//! heap), linked to its caller by a raw pointer the way the original links
//! `StackFrame`s, and its locals are zeroed at construction - before any
//! allocation can run inside the frame - so a collection triggered mid-call
//! never walks uninitialized memory. Only the topmost activation needs to be
//! registered with the collector as a root; its `Trace` implementation walks
//! the entire caller chain itself, mirroring the original's reliance on one
//! pointer (`Runtime::curThread`-equivalent) to reach every live frame.

use std::cell::{Cell, RefCell};

use lumen_gc::{Trace, WorkQueue};

use crate::environment::Environment;
use crate::value::TaggedValue;
use lumen_gc::Gc;

pub struct Activation {
    caller: Option<*const Activation>,
    /// `"file.rs:function_name"`-style label, used only for diagnostics and
    /// stack traces - never by the interpreter's control flow.
    label: &'static str,
    locals: RefCell<Vec<TaggedValue>>,
    /// Lazily allocated the first time a nested closure needs to capture
    /// this frame's locals; `None` for the (common) frame that creates none.
    escaped_env: Cell<Option<Gc<Environment>>>,
}

impl Trace for Activation {
    fn trace(&self, queue: &mut WorkQueue) {
        for local in self.locals.borrow().iter() {
            local.trace(queue);
        }
        if let Some(env) = self.escaped_env.get() {
            queue.push(env.erase());
        }
        if let Some(caller) = self.caller {
            // SAFETY: every live `Activation` is a caller-owned stack value
            // that outlives every frame it calls into, by construction of
            // the native call stack itself; `caller` can only dangle if a
            // frame were leaked past its caller's return, which Rust's
            // ownership rules on this type already prevent.
            unsafe { (*caller).trace(queue) };
        }
    }
}

impl Activation {
    /// Construct a new activation record with `local_count` slots, all
    /// zeroed (`undefined`) before the caller can run any code that might
    /// trigger a collection.
    pub fn new(caller: Option<&Activation>, label: &'static str, local_count: usize) -> Self {
        Activation {
            caller: caller.map(|c| c as *const Activation),
            label,
            locals: RefCell::new(vec![TaggedValue::undefined(); local_count]),
            escaped_env: Cell::new(None),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn get_local(&self, index: usize) -> TaggedValue {
        self.locals.borrow()[index]
    }

    pub fn set_local(&self, index: usize, value: TaggedValue) {
        self.locals.borrow_mut()[index] = value;
    }

    pub fn local_count(&self) -> usize {
        self.locals.borrow().len()
    }

    pub fn escaped_environment(&self) -> Option<Gc<Environment>> {
        self.escaped_env.get()
    }

    pub fn set_escaped_environment(&self, env: Gc<Environment>) {
        self.escaped_env.set(Some(env));
    }

    pub fn caller(&self) -> Option<&Activation> {
        self.caller.map(|c| unsafe { &*c })
    }

    /// The raw caller link, exposed so [`crate::runtime::Runtime`] can
    /// restore its "current activation" pointer to this frame's caller on
    /// exit without borrowing `self` past the point its `Box` is freed.
    pub(crate) fn caller_ptr(&self) -> Option<*const Activation> {
        self.caller
    }

    /// Render a `name (file:line)`-style backtrace, oldest frame last, the
    /// way an uncaught-throw diagnostic would print one.
    pub fn print_stack_trace(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&Activation> = Some(self);
        while let Some(frame) = current {
            out.push_str(frame.label);
            out.push('\n');
            current = frame.caller();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_start_undefined() {
        let frame = Activation::new(None, "test:root", 3);
        for i in 0..3 {
            assert!(frame.get_local(i).is_undefined());
        }
    }

    #[test]
    fn caller_chain_traces_transitively() {
        let root = Activation::new(None, "test:root", 1);
        root.set_local(0, TaggedValue::number(1.0));
        let child = Activation::new(Some(&root), "test:child", 1);
        child.set_local(0, TaggedValue::number(2.0));

        let mut queue = Vec::new();
        child.trace(&mut queue);
        // Neither local references the heap, so nothing is enqueued, but the
        // walk itself must not panic or miss the parent frame.
        assert!(queue.is_empty());
        assert_eq!(child.print_stack_trace(), "test:child\ntest:root\n");
    }
}
