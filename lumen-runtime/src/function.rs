//! Callable objects: native intrinsics, AOT-compiled script functions, and
//! bound functions.
//!
//! A `Function` is-an `Object` in the original runtime (it inherits the
//! property machinery so `fn.foo = 1` and `fn.prototype` both work) - here
//! that relationship is composition rather than inheritance: `Function`
//! embeds an `Object` for its own properties and adds the three fields every
//! callable needs beyond that: its closure environment, its declared arity,
//! and the code it runs when called.

use lumen_gc::{Gc, Trace, WorkQueue};

use crate::environment::Environment;
use crate::object::{Object, PropertyOwner};
use crate::string::StringPrimitive;
use crate::value::TaggedValue;

/// The address of AOT-compiled native code a backend emitted for a script
/// function. `closure_env` is this function's own captured lexical scope -
/// [`crate::runtime::Runtime::call_function`] re-wraps it from
/// [`Function::environment`] on every call, or passes `undefined` for a
/// function that captured nothing - mirroring `CodePtr`'s `Env *env`
/// parameter in `runtime.h`, except crossing as a `TaggedValue` like
/// everything else at this runtime's FFI boundary rather than a bare heap
/// pointer. A compiled body reads out of it with
/// [`crate::ffi::lumen_env_get`]/[`crate::ffi::lumen_env_get_at`] and is
/// expected to call [`crate::ffi::lumen_activation_new`] in its own prologue
/// for its own locals and any environment it escapes to its own closures.
pub type CompiledFn =
    unsafe extern "C" fn(closure_env: TaggedValue, args: *const TaggedValue, argc: usize) -> TaggedValue;

pub type NativeFn = fn(&[TaggedValue]) -> TaggedValue;

pub enum FunctionCode {
    Native(NativeFn),
    Compiled(CompiledFn),
    Bound {
        target: Gc<Function>,
        bound_this: TaggedValue,
        bound_args: Vec<TaggedValue>,
    },
}

pub struct Function {
    pub object: Object,
    pub environment: Option<Gc<Environment>>,
    /// Declared parameter count, what `Function.prototype.length` reports -
    /// for a bound function this is `max(target.length - bound_args.len(), 0)`
    /// per the Open Question resolved in SPEC_FULL.md.
    pub length: u32,
    pub name: Option<Gc<StringPrimitive>>,
    pub code: FunctionCode,
}

impl Trace for Function {
    fn trace(&self, queue: &mut WorkQueue) {
        self.object.trace(queue);
        if let Some(env) = self.environment {
            queue.push(env.erase());
        }
        if let Some(name) = self.name {
            queue.push(name.erase());
        }
        if let FunctionCode::Bound {
            target,
            bound_this,
            bound_args,
        } = &self.code
        {
            queue.push(target.erase());
            bound_this.trace(queue);
            for arg in bound_args {
                arg.trace(queue);
            }
        }
    }
}

impl Function {
    pub fn native(prototype: Option<Gc<Object>>, length: u32, f: NativeFn) -> Self {
        Function {
            object: Object::new(prototype),
            environment: None,
            length,
            name: None,
            code: FunctionCode::Native(f),
        }
    }

    pub fn compiled(
        prototype: Option<Gc<Object>>,
        environment: Gc<Environment>,
        length: u32,
        code: CompiledFn,
    ) -> Self {
        Function {
            object: Object::new(prototype),
            environment: Some(environment),
            length,
            name: None,
            code: FunctionCode::Compiled(code),
        }
    }

    pub fn bind(
        prototype: Option<Gc<Object>>,
        target: Gc<Function>,
        bound_this: TaggedValue,
        bound_args: Vec<TaggedValue>,
    ) -> Self {
        let remaining = target.length.saturating_sub(bound_args.len() as u32);
        Function {
            object: Object::new(prototype),
            environment: None,
            length: remaining,
            name: None,
            code: FunctionCode::Bound {
                target,
                bound_this,
                bound_args,
            },
        }
    }

    /// Resolve a bound function chain to the underlying callee, the `this`
    /// it should ultimately be invoked with, and the full argument list after
    /// splicing in every bound prefix in the chain.
    pub fn resolve_call(
        this_fn: Gc<Function>,
        call_this: TaggedValue,
        call_args: &[TaggedValue],
    ) -> (Gc<Function>, TaggedValue, Vec<TaggedValue>) {
        match &this_fn.code {
            FunctionCode::Bound {
                target,
                bound_this,
                bound_args,
            } => {
                let mut full_args = bound_args.clone();
                full_args.extend_from_slice(call_args);
                Function::resolve_call(*target, *bound_this, &full_args)
            }
            _ => (this_fn, call_this, call_args.to_vec()),
        }
    }
}

impl PropertyOwner for Function {
    fn own_object(&self) -> &Object {
        &self.object
    }
}

/// A native function body that unconditionally throws a type error - the
/// "poison pill" installed on `caller`/`callee`/`arguments` by a strict-mode
/// function, per spec.md §4.4. Both the getter and the setter of the single
/// accessor property share this one function, matching the original's
/// `strictThrowerAccessor`: it is constructed once per runtime and reused as
/// both halves of the accessor pair on every strict function.
pub fn strict_poison_thrower(_args: &[TaggedValue]) -> TaggedValue {
    // The actual throw happens in `Runtime::call_function`, which recognizes
    // this native fn pointer and raises a type error instead of invoking it
    // as an ordinary native body - `NativeFn` has no way to signal a throw on
    // its own, since raising one unwinds through `lumen_runtime::control`
    // rather than returning a `TaggedValue`.
    TaggedValue::undefined()
}
