//! Escaped lexical environments.
//!
//! An `Environment` is allocated on the heap (never on the stack) exactly
//! when a closure captures it: the common case of a function that creates no
//! closures never needs one, since its locals live directly in the
//! activation record instead (see [`crate::activation`]). Chained through
//! `parent`, an environment gives a nested closure access to every enclosing
//! scope's variables without copying them.

use std::cell::RefCell;

use lumen_gc::{Gc, Trace, WorkQueue};

use crate::value::TaggedValue;

pub struct Environment {
    pub parent: Option<Gc<Environment>>,
    slots: RefCell<Vec<TaggedValue>>,
}

impl Trace for Environment {
    fn trace(&self, queue: &mut WorkQueue) {
        if let Some(parent) = self.parent {
            queue.push(parent.erase());
        }
        for slot in self.slots.borrow().iter() {
            slot.trace(queue);
        }
    }
}

impl Environment {
    pub fn new(parent: Option<Gc<Environment>>, slot_count: usize) -> Self {
        Environment {
            parent,
            slots: RefCell::new(vec![TaggedValue::undefined(); slot_count]),
        }
    }

    pub fn get(&self, index: usize) -> TaggedValue {
        self.slots.borrow()[index]
    }

    pub fn set(&self, index: usize, value: TaggedValue) {
        self.slots.borrow_mut()[index] = value;
    }

    /// Walk `depth` parent links up from `this` and read `index` there -
    /// the access pattern a closure over a variable declared `depth` scopes
    /// outward compiles down to.
    pub fn get_at(this: Gc<Environment>, depth: usize, index: usize) -> TaggedValue {
        let mut env = this;
        for _ in 0..depth {
            env = env.parent.expect("environment chain shorter than compiled depth");
        }
        env.get(index)
    }

    pub fn set_at(this: Gc<Environment>, depth: usize, index: usize, value: TaggedValue) {
        let mut env = this;
        for _ in 0..depth {
            env = env.parent.expect("environment chain shorter than compiled depth");
        }
        env.set(index, value);
    }

    pub fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }
}
