//! The runtime singleton: intrinsic prototypes, the permanent interned
//! strings, the global environment, the collector, and the try/throw state
//! every entry point in this crate is built against.
//!
//! Ported from `Runtime` in `runtime.h`/`runtime.cxx`. The original keeps a
//! single process-wide `g_runtime` pointer and threads it through every call
//! via `JS_GET_RUNTIME(frame)`; an embedder here is free to hold more than
//! one `Runtime` (useful for tests that want isolation), so every entry
//! point takes `&Runtime` explicitly instead of reading a global.

use std::cell::{Cell, RefCell};

use lumen_gc::{GarbageCollector, GcConfig, Gc, Trace, WorkQueue};

use crate::activation::Activation;
use crate::control::{self, TryRecord, TryStack};
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeResult};
use crate::function::{Function, FunctionCode, NativeFn};
use crate::indexed::IndexedStorage;
use crate::intern::InternPool;
use crate::object::{find_property, Object, PropKey, Property, PropertyFlags};
use crate::string::StringPrimitive;
use crate::value::{MemoryCell, MemoryPayload, TaggedValue};

/// Diagnostics flags parsed from `LUMEN_TRACE`, matching spec.md §6's
/// comma-separated flag family one for one (renamed from the illustrative
/// `JSC_DIAG`/`HEAP_*` names in the original source to the names spec.md
/// fixes).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagFlags(u8);

impl DiagFlags {
    pub const HEAP_ALLOC: DiagFlags = DiagFlags(0x01);
    pub const HEAP_ALLOC_STACK: DiagFlags = DiagFlags(0x02);
    pub const HEAP_GC: DiagFlags = DiagFlags(0x04);
    pub const HEAP_GC_VERBOSE: DiagFlags = DiagFlags(0x08);
    pub const ALL: DiagFlags = DiagFlags(0x0F);
    pub const FORCE_GC: DiagFlags = DiagFlags(0x10);

    pub fn contains(self, other: DiagFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn insert(&mut self, other: DiagFlags) {
        self.0 |= other.0;
    }

    /// Parse `LUMEN_TRACE`'s comma/colon/semicolon/whitespace-separated flag
    /// list, matching `Runtime::parseDiagEnvironment`'s tokenizer. Unknown
    /// tokens are logged and otherwise ignored rather than treated as fatal.
    fn from_env() -> DiagFlags {
        let mut flags = DiagFlags::default();
        let Ok(raw) = std::env::var("LUMEN_TRACE") else {
            return flags;
        };
        for token in raw.split([',', ':', ';', ' ', '\t']) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token {
                "HEAP_ALLOC" => flags.insert(DiagFlags::HEAP_ALLOC),
                "HEAP_ALLOC_STACK" => flags.insert(DiagFlags::HEAP_ALLOC_STACK),
                "HEAP_GC" => flags.insert(DiagFlags::HEAP_GC),
                "HEAP_GC_VERBOSE" => flags.insert(DiagFlags::HEAP_GC_VERBOSE),
                "ALL" => flags.insert(DiagFlags::ALL),
                "FORCE_GC" => flags.insert(DiagFlags::FORCE_GC),
                other => log::warn!("lumen-runtime: unrecognized LUMEN_TRACE option '{other}'"),
            }
        }
        flags
    }
}

/// Interned well-known property-key strings, computed once at bootstrap so
/// every hot-path lookup (`toString`/`valueOf` dispatch, `Function.length`,
/// the poison accessor triple) compares by pointer rather than re-interning
/// its key text on every call.
struct WellKnownKeys {
    to_string: PropKey,
    value_of: PropKey,
    prototype: PropKey,
    constructor: PropKey,
    length: PropKey,
    name: PropKey,
    message: PropKey,
    caller: PropKey,
    callee: PropKey,
    arguments: PropKey,
}

pub struct Runtime {
    gc: GarbageCollector,
    strict_mode: bool,
    diag: Cell<DiagFlags>,
    intern: RefCell<InternPool>,
    keys: WellKnownKeys,

    pub object_proto: Gc<Object>,
    pub function_proto: Gc<Object>,
    pub array_proto: Gc<Object>,
    pub string_proto: Gc<Object>,

    /// The outermost lexical scope, holding the intrinsic prototypes so the
    /// collector reaches them by tracing this one environment - see
    /// spec.md §4.1 step 2's "intrinsic prototypes referenced through the
    /// global env".
    pub global_env: Gc<Environment>,

    /// The single native function shared by every strict-mode function's
    /// `caller`/`callee`/`arguments` poison accessor (spec.md §4.4).
    strict_thrower: Gc<Function>,

    try_stack: TryStack,
    thrown_object: RefCell<Option<TaggedValue>>,

    /// The innermost live activation, the root spec.md §4.1 step 2b calls
    /// "the current activation chain": [`Activation::trace`] walks its own
    /// `caller` links transitively, so tracing this one pointer reaches
    /// every frame on the native call stack. Updated by
    /// [`Runtime::enter_activation`]/[`Runtime::exit_activation`], which
    /// bracket every compiled-function call across the FFI boundary.
    current_activation: Cell<Option<*const Activation>>,
}

impl Trace for Runtime {
    fn trace(&self, queue: &mut WorkQueue) {
        queue.push(self.global_env.erase());
        if let Some(thrown) = *self.thrown_object.borrow() {
            thrown.trace(queue);
        }
        if let Some(top) = self.current_activation.get() {
            // SAFETY: every activation on this chain is a live `Box` owned by
            // whichever compiled frame called `enter_activation` and not yet
            // returned; `exit_activation` always runs (even across a throw,
            // via the FFI boundary's own unwind-then-rethrow discipline)
            // before that frame's `Box` is freed.
            unsafe { (*top).trace(queue) };
        }
    }
}

const GLOBAL_ENV_SLOTS: usize = 8;
const SLOT_OBJECT_PROTO: usize = 0;
const SLOT_FUNCTION_PROTO: usize = 1;
const SLOT_ARRAY_PROTO: usize = 2;
const SLOT_STRING_PROTO: usize = 3;

impl Runtime {
    pub fn new(strict_mode: bool) -> RuntimeResult<Runtime> {
        Self::with_config(strict_mode, GcConfig::default())
    }

    pub fn with_config(strict_mode: bool, config: GcConfig) -> RuntimeResult<Runtime> {
        config.validate()?;
        let gc = GarbageCollector::new(config);
        let mut intern = InternPool::new();

        // Bootstrap allocates a small, fixed number of objects; the default
        // threshold is large enough that no collection runs mid-bootstrap,
        // so it is safe to `expect` here the same way `InternPool::intern`
        // already does for its own startup interning.
        let object_proto = gc
            .allocate(Object::new(None))
            .expect("bootstrap allocation of Object.prototype failed");
        let function_proto = gc
            .allocate(Object::new(Some(object_proto)))
            .expect("bootstrap allocation of Function.prototype failed");
        let array_proto = gc
            .allocate(Object::with_indexed(Some(object_proto), IndexedStorage::new_array()))
            .expect("bootstrap allocation of Array.prototype failed");
        let string_proto = gc
            .allocate(Object::new(Some(object_proto)))
            .expect("bootstrap allocation of String.prototype failed");

        let global_env = gc
            .allocate(Environment::new(None, GLOBAL_ENV_SLOTS))
            .expect("bootstrap allocation of the global environment failed");
        global_env.set(SLOT_OBJECT_PROTO, TaggedValue::object(object_proto));
        global_env.set(SLOT_FUNCTION_PROTO, TaggedValue::object(function_proto));
        global_env.set(SLOT_ARRAY_PROTO, TaggedValue::object(array_proto));
        global_env.set(SLOT_STRING_PROTO, TaggedValue::object(string_proto));

        let strict_thrower = gc
            .allocate(Function::native(
                Some(function_proto),
                0,
                crate::function::strict_poison_thrower,
            ))
            .expect("bootstrap allocation of the strict poison thrower failed");

        let keys = WellKnownKeys {
            to_string: PropKey(intern.intern_permanent(&gc, b"toString")),
            value_of: PropKey(intern.intern_permanent(&gc, b"valueOf")),
            prototype: PropKey(intern.intern_permanent(&gc, b"prototype")),
            constructor: PropKey(intern.intern_permanent(&gc, b"constructor")),
            length: PropKey(intern.intern_permanent(&gc, b"length")),
            name: PropKey(intern.intern_permanent(&gc, b"name")),
            message: PropKey(intern.intern_permanent(&gc, b"message")),
            caller: PropKey(intern.intern_permanent(&gc, b"caller")),
            callee: PropKey(intern.intern_permanent(&gc, b"callee")),
            arguments: PropKey(intern.intern_permanent(&gc, b"arguments")),
        };
        for perm in ["undefined", "null", "true", "false", "NaN", ""] {
            intern.intern_permanent(&gc, perm.as_bytes());
        }

        Ok(Runtime {
            gc,
            strict_mode,
            diag: Cell::new(DiagFlags::from_env()),
            intern: RefCell::new(intern),
            keys,
            object_proto,
            function_proto,
            array_proto,
            string_proto,
            global_env,
            strict_thrower,
            try_stack: TryStack::new(),
            thrown_object: RefCell::new(None),
            current_activation: Cell::new(None),
        })
    }

    /// Register this runtime as a GC root, and its intern pool as the
    /// collector's pruner so every collection this runtime's collector ever
    /// runs - including the threshold-triggered ones `allocate` drives on
    /// its own - evicts the pool's entries for strings the mark phase just
    /// missed, before sweep frees their storage (spec.md §4.1 step 4). The
    /// caller must keep the `Runtime` alive and at a stable address for as
    /// long as the returned id stays registered - the same obligation
    /// [`lumen_gc::GarbageCollector::register_root`] already documents.
    pub unsafe fn register_as_root(&self) -> lumen_gc::collector::RootId {
        self.gc.register_pruner(&self.intern);
        self.gc.register_root(self)
    }

    pub fn gc(&self) -> &GarbageCollector {
        &self.gc
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    pub fn diag(&self) -> DiagFlags {
        self.diag.get()
    }

    /// Run a full collection regardless of the allocator's threshold. The
    /// intern pool's evictable entries are pruned between mark and sweep by
    /// the collector's registered pruner (see [`Runtime::register_as_root`])
    /// the same way they are for every other collection this runtime's
    /// collector ever runs, threshold-triggered or forced - the entry point
    /// `FORCE_GC` (and an embedder's explicit "collect now") both go through
    /// this.
    pub fn force_gc(&self) {
        self.gc.collect();
    }

    /// Allocate after checking `FORCE_GC`; every allocation helper below
    /// routes through this instead of `self.gc.allocate` directly so the
    /// diagnostics flag's "collect after every allocation" contract holds
    /// uniformly.
    fn alloc<T: Trace + 'static>(&self, value: T) -> RuntimeResult<Gc<T>> {
        if self.diag.get().contains(DiagFlags::FORCE_GC) {
            self.force_gc();
        }
        Ok(self.gc.allocate(value)?)
    }

    // ---- strings --------------------------------------------------------

    pub fn intern_key(&self, s: &str) -> PropKey {
        PropKey(self.intern.borrow_mut().intern(&self.gc, s.as_bytes()))
    }

    /// Interned string as a script-visible `TaggedValue`. Used for property
    /// keys and the small set of well-known constant strings (`"undefined"`,
    /// `typeof` results, ...); general string values go through
    /// [`Runtime::new_string`] instead, matching the original's distinction
    /// between `internString` and plain `StringPrim::make`.
    pub fn intern_str(&self, s: &str) -> TaggedValue {
        TaggedValue::string(self.intern.borrow_mut().intern(&self.gc, s.as_bytes()))
    }

    pub fn new_string(&self, s: &str) -> TaggedValue {
        TaggedValue::string(
            self.gc
                .allocate(StringPrimitive::from_utf8(s.as_bytes().to_vec()))
                .unwrap_or_else(|e| panic!("string allocation failed: {e}")),
        )
    }

    /// Box an already-built [`StringPrimitive`] (e.g. the result of
    /// [`StringPrimitive::concat`] or `substring`) as a script-visible value.
    pub fn new_string_from_primitive(&self, prim: StringPrimitive) -> TaggedValue {
        TaggedValue::string(
            self.gc
                .allocate(prim)
                .unwrap_or_else(|e| panic!("string allocation failed: {e}")),
        )
    }

    // ---- objects ----------------------------------------------------------

    pub fn new_object(&self, parent: Option<Gc<Object>>) -> RuntimeResult<Gc<Object>> {
        self.alloc(Object::new(parent.or(Some(self.object_proto))))
    }

    pub fn new_array(&self) -> RuntimeResult<Gc<Object>> {
        self.alloc(Object::with_indexed(
            Some(self.array_proto),
            IndexedStorage::new_array(),
        ))
    }

    pub fn new_arguments(&self, values: Vec<TaggedValue>) -> RuntimeResult<Gc<Object>> {
        self.alloc(Object::with_indexed(
            Some(self.object_proto),
            IndexedStorage::new_arguments(values),
        ))
    }

    /// `createDescendant`: see [`Object::create_descendant`]; exposed here
    /// because it is the allocation `construct` performs for a plain
    /// function's `new` expression.
    pub fn new_descendant(&self, parent: Gc<Object>) -> RuntimeResult<Gc<Object>> {
        self.alloc(Object::create_descendant(parent))
    }

    // ---- functions ----------------------------------------------------------

    pub fn new_native_function(&self, name: &str, length: u32, f: NativeFn) -> RuntimeResult<Gc<Function>> {
        let func = self.alloc(Function::native(Some(self.function_proto), length, f))?;
        self.init_function_properties(func, name, length)?;
        Ok(func)
    }

    pub fn new_compiled_function(
        &self,
        name: &str,
        env: Gc<Environment>,
        length: u32,
        code: crate::function::CompiledFn,
    ) -> RuntimeResult<Gc<Function>> {
        let func = self.alloc(Function::compiled(Some(self.function_proto), env, length, code))?;
        self.init_function_properties(func, name, length)?;
        Ok(func)
    }

    pub fn bind_function(
        &self,
        target: Gc<Function>,
        bound_this: TaggedValue,
        bound_args: Vec<TaggedValue>,
    ) -> RuntimeResult<Gc<Function>> {
        let bound = self.alloc(Function::bind(Some(self.function_proto), target, bound_this, bound_args))?;
        let length = bound.length;
        self.init_function_properties(bound, "bound", length)?;
        Ok(bound)
    }

    /// Installs `length`/`name`, a fresh `.prototype` object with a
    /// `constructor` back-reference, and - in strict mode - the poison
    /// accessor triple on `caller`/`callee`/`arguments`, matching
    /// `Function::init` in the original.
    fn init_function_properties(&self, func: Gc<Function>, name: &str, length: u32) -> RuntimeResult<()> {
        let obj = &func.object;
        obj.define_own_property(
            self.keys.length,
            Property::data(TaggedValue::number(length as f64), PropertyFlags::CONFIGURABLE),
        );
        obj.define_own_property(
            self.keys.name,
            Property::data(self.new_string(name), PropertyFlags::CONFIGURABLE),
        );

        let own_prototype = self.new_object(Some(self.object_proto))?;
        own_prototype.define_own_property(
            self.keys.constructor,
            Property::data(TaggedValue::function(func), PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE),
        );
        obj.define_own_property(
            self.keys.prototype,
            Property::data(
                TaggedValue::object(own_prototype),
                PropertyFlags::WRITABLE,
            ),
        );

        if self.strict_mode {
            let poison = Property::accessor(
                Some(self.strict_thrower),
                Some(self.strict_thrower),
                PropertyFlags::CONFIGURABLE,
            );
            obj.define_own_property(self.keys.caller, poison);
            obj.define_own_property(self.keys.callee, poison);
            obj.define_own_property(self.keys.arguments, poison);
        }
        Ok(())
    }

    /// `hasInstance`: walk `candidate`'s prototype chain looking for
    /// `func`'s `.prototype` property object.
    pub fn has_instance(&self, func: Gc<Function>, candidate: Gc<Object>) -> RuntimeResult<bool> {
        let prototype_prop = find_property(&*func, &self.keys.prototype);
        let Some(prop) = prototype_prop else {
            self.throw_type_error("Function has no valid 'prototype' property");
        };
        let Some(prototype_obj) = prop.value.as_object() else {
            self.throw_type_error("Function has no valid 'prototype' property");
        };
        let mut cur = candidate.prototype;
        while let Some(o) = cur {
            if Gc::ptr_eq(o, prototype_obj) {
                return Ok(true);
            }
            cur = o.prototype;
        }
        Ok(false)
    }

    // ---- activations & escaped environments --------------------------------

    /// Construct a new activation chained onto whichever frame is currently
    /// topmost (`None` for a top-level call), install it as the new top, and
    /// hand the caller a stable heap address - the FFI boundary's
    /// [`crate::ffi::lumen_activation_new`] is the only place this is called
    /// from outside tests. Pairs with [`Runtime::exit_activation`], which
    /// must run before the returned `Box` is freed.
    pub fn enter_activation(&self, label: &'static str, local_count: usize) -> Box<Activation> {
        let caller_ptr = self.current_activation.get();
        // SAFETY: see the comment on `current_activation` in `Trace for
        // Runtime` - the pointer, if present, is still a live `Box`.
        let caller = caller_ptr.map(|p| unsafe { &*p });
        let activation = Box::new(Activation::new(caller, label, local_count));
        self.current_activation.set(Some(activation.as_ref() as *const Activation));
        activation
    }

    /// Unlink `activation` from the current-activation chain, restoring its
    /// caller as the new top. Must be called exactly once, immediately
    /// before (or via) dropping the `Box` [`Runtime::enter_activation`]
    /// returned for this frame.
    pub fn exit_activation(&self, activation: &Activation) {
        self.current_activation.set(activation.caller_ptr());
    }

    pub fn new_environment(&self, parent: Option<Gc<Environment>>, slot_count: usize) -> RuntimeResult<Gc<Environment>> {
        self.alloc(Environment::new(parent, slot_count))
    }

    /// Box an environment handle as a script-visible `TaggedValue` so it can
    /// cross the FFI boundary and be stored back into a `Function`'s
    /// captured-environment slot - the `Memory` tag's "opaque native handle"
    /// role from spec.md §3, applied to the one GC-managed type that has no
    /// tag of its own.
    pub fn wrap_environment(&self, env: Gc<Environment>) -> RuntimeResult<TaggedValue> {
        Ok(TaggedValue::memory(self.alloc(MemoryCell { payload: Box::new(env) })?))
    }

    pub fn unwrap_environment(&self, value: TaggedValue) -> Option<Gc<Environment>> {
        value.as_memory()?.payload.as_any().downcast_ref::<Gc<Environment>>().copied()
    }

    // ---- calling ----------------------------------------------------------

    /// `call`: invoke `func` with `this_value`/`args`, splicing through any
    /// bound-function chain first. May unwind via [`control::throw`] rather
    /// than returning, exactly like every other script-visible operation
    /// that can invoke user code.
    pub fn call_function(&self, func: Gc<Function>, this_value: TaggedValue, args: &[TaggedValue]) -> TaggedValue {
        let (target, this_value, args) = Function::resolve_call(func, this_value, args);
        if Gc::ptr_eq(target, self.strict_thrower) {
            self.throw_type_error(
                "'caller', 'callee' and 'arguments' cannot be accessed in strict mode",
            );
        }
        match &target.code {
            FunctionCode::Native(f) => {
                let mut full_args = Vec::with_capacity(args.len() + 1);
                full_args.push(this_value);
                full_args.extend_from_slice(&args);
                (*f)(&full_args)
            }
            FunctionCode::Compiled(code) => {
                let closure_env = match target.environment {
                    Some(env) => self
                        .wrap_environment(env)
                        .unwrap_or_else(|e| self.throw_type_error(format!("allocation failed: {e}"))),
                    None => TaggedValue::undefined(),
                };
                unsafe { (*code)(closure_env, args.as_ptr(), args.len()) }
            }
            FunctionCode::Bound { .. } => unreachable!("resolve_call always splices bound functions away"),
        }
    }

    /// `construct`/`callCons`: allocate a fresh descendant of `func`'s
    /// `.prototype` object, invoke `func` with it as `this`, and return the
    /// constructor's result if it is itself an object, or the freshly
    /// allocated instance otherwise - the standard `[[Construct]]` fallback.
    pub fn construct(&self, func: Gc<Function>, args: &[TaggedValue]) -> RuntimeResult<TaggedValue> {
        let prototype = match find_property(&*func, &self.keys.prototype).and_then(|p| p.value.as_object()) {
            Some(p) => p,
            None => self.object_proto,
        };
        let instance = self.new_descendant(prototype)?;
        let result = self.call_function(func, TaggedValue::object(instance), args);
        Ok(if result.as_object().is_some() {
            result
        } else {
            TaggedValue::object(instance)
        })
    }

    // ---- toPrimitive --------------------------------------------------------

    /// `[[DefaultValue]]`: `toString`/`valueOf` (or the reverse when
    /// `prefer_string` is false, i.e. the `"number"` hint) in hint order,
    /// returning the first result that is not itself object-like. Neither
    /// plain objects nor functions define these by default in this runtime
    /// (no standard library is in scope per spec.md §1), so the common case
    /// falls through to the fixed `"[object Object]"`/function-source
    /// strings the way `Object.prototype.toString` would.
    pub fn to_primitive_call(&self, value: TaggedValue, prefer_string: bool) -> TaggedValue {
        let order: [&PropKey; 2] = if prefer_string {
            [&self.keys.to_string, &self.keys.value_of]
        } else {
            [&self.keys.value_of, &self.keys.to_string]
        };

        for key in order {
            let found = match value.as_object() {
                Some(o) => find_property(&*o, key),
                None => value.as_function().and_then(|f| find_property(&*f, key)),
            };
            if let Some(prop) = found {
                let method = if prop.is_accessor() {
                    prop.getter.map(|g| self.call_function(g, value, &[]))
                } else {
                    prop.value.as_function().map(|f| self.call_function(f, value, &[]))
                };
                if let Some(result) = method {
                    if !result.is_object_like() {
                        return result;
                    }
                }
            }
        }
        self.throw_type_error("cannot convert object to a primitive value")
    }

    // ---- errors / control transfer -----------------------------------------

    pub fn push_try(&self) -> TryRecord {
        self.try_stack.push()
    }

    pub fn pop_try(&self, record: TryRecord) {
        self.try_stack.pop(record)
    }

    /// Run `body`, catching any throw unwound up to this call - the
    /// `pushTry`/`popTry` pair plus the resumption point, bundled for
    /// callers (tests, the FFI boundary) that just want a `Result`.
    pub fn run_guarded<T>(&self, body: impl FnOnce() -> T) -> Result<T, TaggedValue> {
        control::try_catch(&self.try_stack, &self.thrown_object, body)
    }

    /// `throwValue`: unwind to the nearest [`Runtime::run_guarded`] call. If
    /// none is installed, this panic propagates out of the process the same
    /// way an uncaught C++ exception terminates the original - the caller is
    /// expected to be running under at least one `run_guarded` (the FFI
    /// entry point installs one around every top-level call) so this is
    /// always eventually observed rather than crashing silently.
    pub fn throw_value(&self, value: TaggedValue) -> ! {
        if self.try_stack.is_empty() {
            // Unwinding a Rust panic across the `extern "C"` boundary
            // compiled code calls through is undefined behavior - an
            // uncaught throw terminates the process outright here, the same
            // "print and abort" contract `fax_panic` gives native callers,
            // rather than letting `control::throw`'s panic propagate into
            // whatever native frame called in.
            log::error!(
                "lumen-runtime: unhandled exception: {}",
                self.stringify_for_diagnostics(value)
            );
            unsafe { libc::exit(1) };
        }
        control::throw(&self.thrown_object, value)
    }

    pub fn throw_type_error(&self, message: impl Into<String>) -> ! {
        let message = message.into();
        let error = self
            .new_object(Some(self.object_proto))
            .unwrap_or_else(|e| panic!("allocating a TypeError object failed: {e}"));
        let message_value = self.new_string(&message);
        error.define_own_property(
            self.keys.message,
            Property::data(message_value, PropertyFlags::default()),
        );
        self.throw_value(TaggedValue::object(error))
    }

    fn stringify_for_diagnostics(&self, value: TaggedValue) -> String {
        match value.as_object().and_then(|o| o.get_own_property(&self.keys.message)) {
            Some(prop) => match prop.value.as_string() {
                Some(s) => s.as_str_lossy().into_owned(),
                None => format!("{value:?}"),
            },
            None => format!("{value:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstraps_distinct_intrinsic_prototypes() {
        let rt = Runtime::new(true).unwrap();
        assert!(!Gc::ptr_eq(rt.object_proto, rt.array_proto));
        assert!(Gc::ptr_eq(rt.array_proto.prototype.unwrap(), rt.object_proto));
    }

    #[test]
    fn new_object_defaults_to_object_prototype() {
        let rt = Runtime::new(true).unwrap();
        let obj = rt.new_object(None).unwrap();
        assert!(Gc::ptr_eq(obj.prototype.unwrap(), rt.object_proto));
    }

    #[test]
    fn new_array_has_indexed_storage() {
        let rt = Runtime::new(true).unwrap();
        let arr = rt.new_array().unwrap();
        assert!(arr.indexed.is_some());
    }

    #[test]
    fn native_function_reports_configured_length_and_name() {
        let rt = Runtime::new(true).unwrap();
        let f = rt.new_native_function("identity", 1, |args| args.get(1).copied().unwrap_or(TaggedValue::undefined())).unwrap();
        let length_key = rt.intern_key("length");
        let prop = f.object.get_own_property(&length_key).unwrap();
        assert_eq!(prop.value.as_number(), Some(1.0));
    }

    #[test]
    fn calling_a_native_function_passes_receiver_and_args() {
        let rt = Runtime::new(false).unwrap();
        let f = rt
            .new_native_function("echo", 1, |args| args[1])
            .unwrap();
        let result = rt.call_function(f, TaggedValue::undefined(), &[TaggedValue::number(9.0)]);
        assert_eq!(result.as_number(), Some(9.0));
    }

    #[test]
    fn construct_creates_a_descendant_of_the_function_prototype_property() {
        let rt = Runtime::new(false).unwrap();
        let f = rt
            .new_native_function("Ctor", 0, |args| args[0])
            .unwrap();
        let instance = rt.construct(f, &[]).unwrap();
        let obj = instance.as_object().unwrap();
        let proto_key = rt.intern_key("prototype");
        let expected_proto = f.object.get_own_property(&proto_key).unwrap().value.as_object().unwrap();
        assert!(Gc::ptr_eq(obj.prototype.unwrap(), expected_proto));
    }

    #[test]
    fn has_instance_walks_prototype_chain() {
        let rt = Runtime::new(false).unwrap();
        let f = rt.new_native_function("Ctor", 0, |args| args[0]).unwrap();
        let instance = rt.construct(f, &[]).unwrap();
        assert!(rt.has_instance(f, instance.as_object().unwrap()).unwrap());
        assert!(!rt.has_instance(f, rt.object_proto).unwrap());
    }

    #[test]
    fn throw_type_error_is_caught_by_run_guarded() {
        let rt = Runtime::new(true).unwrap();
        let result = rt.run_guarded(|| {
            rt.throw_type_error("boom");
        });
        let thrown = result.unwrap_err();
        let message_key = rt.intern_key("message");
        let msg = thrown
            .as_object()
            .unwrap()
            .get_own_property(&message_key)
            .unwrap()
            .value
            .as_string()
            .unwrap();
        assert_eq!(msg.as_str_lossy(), "boom");
    }

    #[test]
    fn strict_mode_function_poisons_caller_callee_arguments() {
        let rt = Runtime::new(true).unwrap();
        let f = rt.new_native_function("f", 0, |args| args[0]).unwrap();
        let caller_key = rt.intern_key("caller");
        let prop = f.object.get_own_property(&caller_key).unwrap();
        assert!(prop.is_accessor());

        let result = rt.run_guarded(|| {
            let getter = prop.getter.unwrap();
            rt.call_function(getter, TaggedValue::undefined(), &[]);
        });
        assert!(result.is_err());
    }
}
