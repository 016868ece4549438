//! The `#[no_mangle] extern "C"` surface an AOT-compiled native caller links
//! against.
//!
//! Grounded on `faxc-runtime/src/gc.rs`: a process-wide `OnceLock<Runtime>`
//! initialized once by `lumen_init`, with every other entry point reading
//! through it, mirroring that module's `RUNTIME`/`INITIALIZED` pair. Compiled
//! code never touches a `Runtime` value directly - it only ever holds
//! `TaggedValue`s and passes them back through this boundary, the same
//! "opaque handle in, opaque handle out" shape `fax_gc_alloc`'s callers rely
//! on for heap addresses. As with every `fax_*` entry point in the original,
//! none of these functions are declared `unsafe fn` - raw pointer parameters
//! are dereferenced in an inner `unsafe` block instead, since an `extern "C"`
//! boundary is unsafe by its nature regardless of the keyword.
//!
//! String and argument-list parameters cross the boundary as raw pointer +
//! length pairs rather than `&str`/`&[TaggedValue]`, since a native caller on
//! the other side of this boundary has no `str`/slice of its own to hand in.

use std::sync::OnceLock;

use crate::activation::Activation;
use crate::function::{CompiledFn, NativeFn};
use crate::object::{Object, PropKey, Property, PropertyFlags};
use crate::runtime::Runtime;
use crate::string::StringPrimitive;
use crate::value::TaggedValue;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get().expect("lumen_init must run before any other lumen_* entry point")
}

fn bytes_from_raw<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len) }
    }
}

fn str_from_raw<'a>(ptr: *const u8, len: usize) -> &'a str {
    std::str::from_utf8(bytes_from_raw(ptr, len)).unwrap_or("")
}

/// Widens a raw pointer's borrow to `'static`, for the one FFI parameter
/// that needs it: an activation's diagnostic label. The AOT compiler backend
/// always passes a pointer into its own `.rodata` string literal, which is
/// already `'static` for the life of the process - exactly the guarantee
/// `Activation::label` requires, but one `extern "C"` cannot express in its
/// signature.
unsafe fn static_str_from_raw(ptr: *const u8, len: usize) -> &'static str {
    std::mem::transmute::<&str, &'static str>(str_from_raw(ptr, len))
}

fn args_from_raw<'a>(argv: *const TaggedValue, argc: usize) -> &'a [TaggedValue] {
    if argc == 0 || argv.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(argv, argc) }
    }
}

/// Bring up the process-wide runtime. Safe to call more than once; only the
/// first call takes effect, matching `fax_gc_init`'s idempotence.
#[no_mangle]
pub extern "C" fn lumen_init(strict_mode: bool) -> bool {
    if RUNTIME.get().is_some() {
        return true;
    }
    match Runtime::new(strict_mode) {
        Ok(rt) => {
            // SAFETY: `RUNTIME` is a static, so `rt` is already at a stable
            // address for the remainder of the process once `set` succeeds.
            unsafe {
                let _ = rt.register_as_root();
            }
            RUNTIME.set(rt).is_ok()
        }
        Err(e) => {
            log::error!("failed to initialize runtime: {e}");
            false
        }
    }
}

// --- Value constructors -----------------------------------------------

#[no_mangle]
pub extern "C" fn lumen_make_undefined() -> TaggedValue {
    TaggedValue::undefined()
}

#[no_mangle]
pub extern "C" fn lumen_make_null() -> TaggedValue {
    TaggedValue::null()
}

#[no_mangle]
pub extern "C" fn lumen_make_boolean(b: bool) -> TaggedValue {
    TaggedValue::boolean(b)
}

#[no_mangle]
pub extern "C" fn lumen_make_number(n: f64) -> TaggedValue {
    TaggedValue::number(n)
}

/// `makeString`: copies `len` bytes starting at `ptr` into a freshly
/// allocated `StringPrimitive` (not interned - callers that want interning
/// go through [`lumen_intern_string`]).
#[no_mangle]
pub extern "C" fn lumen_make_string(ptr: *const u8, len: usize) -> TaggedValue {
    runtime().new_string_from_primitive(StringPrimitive::from_utf8(bytes_from_raw(ptr, len).to_vec()))
}

#[no_mangle]
pub extern "C" fn lumen_intern_string(ptr: *const u8, len: usize) -> TaggedValue {
    runtime().intern_str(str_from_raw(ptr, len))
}

/// `isValidArrayIndex`: true iff `v` is a number, has no fractional part, and
/// falls in `[0, 2^32)`. Writes the index to `*out` only when it returns true.
#[no_mangle]
pub extern "C" fn lumen_is_valid_array_index(v: TaggedValue, out: *mut u32) -> bool {
    let Some(n) = v.as_number() else { return false };
    if n.is_sign_negative() || n.fract() != 0.0 || n >= 4294967296.0 {
        return false;
    }
    if !out.is_null() {
        unsafe { *out = n as u32 };
    }
    true
}

// --- Allocation helpers --------------------------------------------------

/// `newObject(parent)`: `parent` is `undefined` for "use the default object
/// prototype", or an object-tagged value for an explicit parent.
#[no_mangle]
pub extern "C" fn lumen_new_object(parent: TaggedValue) -> TaggedValue {
    match runtime().new_object(parent.as_object()) {
        Ok(obj) => TaggedValue::object(obj),
        Err(e) => runtime().throw_type_error(format!("allocation failed: {e}")),
    }
}

#[no_mangle]
pub extern "C" fn lumen_new_array() -> TaggedValue {
    match runtime().new_array() {
        Ok(obj) => TaggedValue::object(obj),
        Err(e) => runtime().throw_type_error(format!("allocation failed: {e}")),
    }
}

/// `newFunction(env, code, constructCode, name, arity)`: `constructCode` is
/// folded into `code` here - this runtime has no separate constructor entry
/// point per function, per the Open Question resolved in SPEC_FULL.md §3
/// (`construct` reuses the one compiled body, distinguishing itself only by
/// the freshly allocated descendant it passes as the receiver).
///
/// `env` is the closure's captured environment, as returned by
/// [`lumen_activation_escaped_env`] on the enclosing activation - pass
/// `lumen_make_undefined()` for a function that captures nothing, which
/// binds it to the global environment instead.
#[no_mangle]
pub extern "C" fn lumen_new_function(
    name_ptr: *const u8,
    name_len: usize,
    arity: u32,
    code: CompiledFn,
    env: TaggedValue,
) -> TaggedValue {
    let name = str_from_raw(name_ptr, name_len);
    let captured_env = runtime().unwrap_environment(env).unwrap_or(runtime().global_env);
    match runtime().new_compiled_function(name, captured_env, arity, code) {
        Ok(f) => TaggedValue::function(f),
        Err(e) => runtime().throw_type_error(format!("allocation failed: {e}")),
    }
}

#[no_mangle]
pub extern "C" fn lumen_new_native_function(name_ptr: *const u8, name_len: usize, arity: u32, f: NativeFn) -> TaggedValue {
    let name = str_from_raw(name_ptr, name_len);
    match runtime().new_native_function(name, arity, f) {
        Ok(f) => TaggedValue::function(f),
        Err(e) => runtime().throw_type_error(format!("allocation failed: {e}")),
    }
}

// --- Property operations --------------------------------------------------

fn key_from_raw(ptr: *const u8, len: usize) -> PropKey {
    runtime().intern_key(str_from_raw(ptr, len))
}

#[no_mangle]
pub extern "C" fn lumen_get(obj: TaggedValue, name_ptr: *const u8, name_len: usize) -> TaggedValue {
    let Some(target) = obj.as_object() else {
        return TaggedValue::undefined();
    };
    let key = key_from_raw(name_ptr, name_len);
    Object::get(target, &key, obj, |getter, receiver| runtime().call_function(getter, receiver, &[]))
}

#[no_mangle]
pub extern "C" fn lumen_put(obj: TaggedValue, name_ptr: *const u8, name_len: usize, value: TaggedValue) -> bool {
    let Some(target) = obj.as_object() else {
        return false;
    };
    let key = key_from_raw(name_ptr, name_len);
    Object::put(target, key, value, |setter, v| {
        runtime().call_function(setter, obj, &[v]);
    })
}

#[no_mangle]
pub extern "C" fn lumen_get_computed(obj: TaggedValue, key: TaggedValue) -> TaggedValue {
    let Some(target) = obj.as_object() else {
        return TaggedValue::undefined();
    };
    let key_str = crate::coercion::to_string(runtime(), key).as_string().unwrap();
    let prop_key = runtime().intern_key(&key_str.as_str_lossy());
    Object::get(target, &prop_key, obj, |getter, receiver| runtime().call_function(getter, receiver, &[]))
}

#[no_mangle]
pub extern "C" fn lumen_put_computed(obj: TaggedValue, key: TaggedValue, value: TaggedValue) -> bool {
    let Some(target) = obj.as_object() else {
        return false;
    };
    let key_str = crate::coercion::to_string(runtime(), key).as_string().unwrap();
    let prop_key = runtime().intern_key(&key_str.as_str_lossy());
    Object::put(target, prop_key, value, |setter, v| {
        runtime().call_function(setter, obj, &[v]);
    })
}

#[no_mangle]
pub extern "C" fn lumen_delete_property(obj: TaggedValue, name_ptr: *const u8, name_len: usize) -> bool {
    crate::operators::op_delete(runtime(), obj, lumen_intern_string(name_ptr, name_len))
}

#[no_mangle]
pub extern "C" fn lumen_delete_computed(obj: TaggedValue, key: TaggedValue) -> bool {
    crate::operators::op_delete(runtime(), obj, key)
}

#[no_mangle]
pub extern "C" fn lumen_has_property(obj: TaggedValue, name_ptr: *const u8, name_len: usize) -> bool {
    crate::operators::op_in(runtime(), lumen_intern_string(name_ptr, name_len), obj)
}

#[no_mangle]
pub extern "C" fn lumen_define_own_property(
    obj: TaggedValue,
    name_ptr: *const u8,
    name_len: usize,
    value: TaggedValue,
    enumerable: bool,
    writable: bool,
    configurable: bool,
) -> bool {
    let Some(target) = obj.as_object() else {
        return false;
    };
    let key = key_from_raw(name_ptr, name_len);
    let mut flags = PropertyFlags::NONE;
    if enumerable {
        flags = flags | PropertyFlags::ENUMERABLE;
    }
    if writable {
        flags = flags | PropertyFlags::WRITABLE;
    }
    if configurable {
        flags = flags | PropertyFlags::CONFIGURABLE;
    }
    target.define_own_property(key, Property::data(value, flags))
}

// --- Callable protocol -----------------------------------------------------

#[no_mangle]
pub extern "C" fn lumen_is_callable(v: TaggedValue) -> bool {
    v.as_function().is_some()
}

/// `call(v, argc, argv)`: `argv[0]` carries the receiver, matching spec.md
/// §6's convention.
#[no_mangle]
pub extern "C" fn lumen_call(func: TaggedValue, argv: *const TaggedValue, argc: usize) -> TaggedValue {
    let Some(f) = func.as_function() else {
        return runtime().throw_type_error("value is not callable");
    };
    let full = args_from_raw(argv, argc);
    let this_value = full.first().copied().unwrap_or(TaggedValue::undefined());
    let rest = if full.is_empty() { &[][..] } else { &full[1..] };
    runtime().call_function(f, this_value, rest)
}

#[no_mangle]
pub extern "C" fn lumen_construct(func: TaggedValue, argv: *const TaggedValue, argc: usize) -> TaggedValue {
    let Some(f) = func.as_function() else {
        return runtime().throw_type_error("value is not a constructor");
    };
    match runtime().construct(f, args_from_raw(argv, argc)) {
        Ok(v) => v,
        Err(e) => runtime().throw_type_error(format!("construct failed: {e}")),
    }
}

// --- Operators --------------------------------------------------------

#[no_mangle]
pub extern "C" fn lumen_op_add(a: TaggedValue, b: TaggedValue) -> TaggedValue {
    crate::operators::op_add(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_typeof(a: TaggedValue) -> TaggedValue {
    crate::operators::op_typeof(runtime(), a)
}

#[no_mangle]
pub extern "C" fn lumen_op_strict_eq(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_strict_eq(a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_loose_eq(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_loose_eq(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_lt(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_lt(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_le(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_le(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_gt(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_gt(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_ge(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_ge(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_instanceof(a: TaggedValue, b: TaggedValue) -> bool {
    crate::operators::op_instanceof(runtime(), a, b)
}

#[no_mangle]
pub extern "C" fn lumen_op_in(key: TaggedValue, obj: TaggedValue) -> bool {
    crate::operators::op_in(runtime(), key, obj)
}

#[no_mangle]
pub extern "C" fn lumen_op_delete(obj: TaggedValue, key: TaggedValue) -> bool {
    crate::operators::op_delete(runtime(), obj, key)
}

// --- Error entry points -----------------------------------------------

/// `throwValue`: unwind to the nearest installed try-record, or terminate the
/// process per spec.md §7 if none is installed.
#[no_mangle]
pub extern "C" fn lumen_throw_value(v: TaggedValue) -> ! {
    runtime().throw_value(v)
}

#[no_mangle]
pub extern "C" fn lumen_throw_type_error(msg_ptr: *const u8, msg_len: usize) -> ! {
    runtime().throw_type_error(str_from_raw(msg_ptr, msg_len))
}

/// Opaque token handed back to [`lumen_pop_try`]. Boxed so it can cross the
/// FFI boundary as a pointer without exposing `TryRecord`'s internals.
#[no_mangle]
pub extern "C" fn lumen_push_try() -> *mut crate::control::TryRecord {
    Box::into_raw(Box::new(runtime().push_try()))
}

#[no_mangle]
pub extern "C" fn lumen_pop_try(record: *mut crate::control::TryRecord) {
    if record.is_null() {
        return;
    }
    unsafe { runtime().pop_try(*Box::from_raw(record)) };
}

// --- Iteration --------------------------------------------------------

/// `makeForInIterator`: boxed so the opaque handle can cross the FFI
/// boundary; paired with [`lumen_for_in_next`] and [`lumen_for_in_free`].
#[no_mangle]
pub extern "C" fn lumen_make_for_in_iterator(obj: TaggedValue) -> *mut crate::iter::ForInIterator {
    match obj.as_object() {
        Some(o) => Box::into_raw(Box::new(crate::iter::ForInIterator::new(o))),
        None => std::ptr::null_mut(),
    }
}

/// Writes the next enumerated name to `*out` and returns `true`, or leaves
/// `*out` untouched and returns `false` once exhausted.
#[no_mangle]
pub extern "C" fn lumen_for_in_next(iter: *const crate::iter::ForInIterator, out: *mut TaggedValue) -> bool {
    let Some(iter) = (unsafe { iter.as_ref() }) else {
        return false;
    };
    match iter.next(runtime()) {
        Some(v) => {
            if !out.is_null() {
                unsafe { *out = v };
            }
            true
        }
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn lumen_for_in_free(iter: *mut crate::iter::ForInIterator) {
    if !iter.is_null() {
        drop(unsafe { Box::from_raw(iter) });
    }
}

// --- Activation records --------------------------------------------------

/// `activation construction` (spec.md §6): every compiled function's prologue
/// calls this first. Chains automatically onto whichever activation is
/// currently topmost (`None` for a top-level entry point) - compiled code
/// never threads a caller-frame pointer through its own calls, it only ever
/// holds the `Activation*` this returns until its matching
/// [`lumen_activation_exit`].
#[no_mangle]
pub extern "C" fn lumen_activation_new(
    label_ptr: *const u8,
    label_len: usize,
    local_count: usize,
) -> *mut Activation {
    let label = unsafe { static_str_from_raw(label_ptr, label_len) };
    Box::into_raw(runtime().enter_activation(label, local_count))
}

/// Unlinks `activation` and frees it. Must run exactly once, on every exit
/// path (including an unwinding throw) out of the frame that created it.
#[no_mangle]
pub extern "C" fn lumen_activation_exit(activation: *mut Activation) {
    if activation.is_null() {
        return;
    }
    let boxed = unsafe { Box::from_raw(activation) };
    runtime().exit_activation(&boxed);
}

#[no_mangle]
pub extern "C" fn lumen_activation_get_local(activation: *const Activation, index: usize) -> TaggedValue {
    match unsafe { activation.as_ref() } {
        Some(a) => a.get_local(index),
        None => TaggedValue::undefined(),
    }
}

#[no_mangle]
pub extern "C" fn lumen_activation_set_local(activation: *const Activation, index: usize, value: TaggedValue) {
    if let Some(a) = unsafe { activation.as_ref() } {
        a.set_local(index, value);
    }
}

/// Returns this activation's escaped environment, allocating it on first
/// call (per spec.md §4.2, the activation owns it for its lifetime).
/// `parent` is the enclosing activation's own escaped environment (or
/// `lumen_make_undefined()` at the outermost scope) - the new environment's
/// `[[parent]]` link, so a nested closure can walk outward to capture an
/// outer local.
#[no_mangle]
pub extern "C" fn lumen_activation_escaped_env(
    activation: *const Activation,
    parent: TaggedValue,
    slot_count: usize,
) -> TaggedValue {
    let Some(a) = (unsafe { activation.as_ref() }) else {
        return TaggedValue::undefined();
    };
    if let Some(existing) = a.escaped_environment() {
        return runtime()
            .wrap_environment(existing)
            .unwrap_or_else(|e| runtime().throw_type_error(format!("allocation failed: {e}")));
    }
    let parent_env = runtime().unwrap_environment(parent);
    let env = match runtime().new_environment(parent_env, slot_count) {
        Ok(env) => env,
        Err(e) => runtime().throw_type_error(format!("allocation failed: {e}")),
    };
    a.set_escaped_environment(env);
    runtime()
        .wrap_environment(env)
        .unwrap_or_else(|e| runtime().throw_type_error(format!("allocation failed: {e}")))
}

// --- Escaped environments --------------------------------------------------

#[no_mangle]
pub extern "C" fn lumen_env_get(env: TaggedValue, index: usize) -> TaggedValue {
    match runtime().unwrap_environment(env) {
        Some(e) => e.get(index),
        None => TaggedValue::undefined(),
    }
}

#[no_mangle]
pub extern "C" fn lumen_env_set(env: TaggedValue, index: usize, value: TaggedValue) {
    if let Some(e) = runtime().unwrap_environment(env) {
        e.set(index, value);
    }
}

/// Reads a variable captured `depth` lexical scopes outward from `env`.
#[no_mangle]
pub extern "C" fn lumen_env_get_at(env: TaggedValue, depth: usize, index: usize) -> TaggedValue {
    match runtime().unwrap_environment(env) {
        Some(e) => crate::environment::Environment::get_at(e, depth, index),
        None => TaggedValue::undefined(),
    }
}

#[no_mangle]
pub extern "C" fn lumen_env_set_at(env: TaggedValue, depth: usize, index: usize, value: TaggedValue) {
    if let Some(e) = runtime().unwrap_environment(env) {
        crate::environment::Environment::set_at(e, depth, index, value);
    }
}

// --- Diagnostics --------------------------------------------------------

#[no_mangle]
pub extern "C" fn lumen_force_gc() {
    runtime().force_gc();
}
