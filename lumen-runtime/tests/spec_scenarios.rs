//! Integration tests for spec.md §8's six named scenarios (S1-S6). Each
//! exercises the runtime through its ordinary Rust API - the same surface
//! the FFI module (`lumen_call`, `lumen_new_function`, `lumen_env_get`, ...)
//! is a thin, pointer-based wrapper over - rather than the raw `extern "C"`
//! entry points, since a compiled-code caller and this crate's own tests
//! exercise identical semantics either way and the FFI module guards a
//! single process-wide runtime singleton unsuited to running many
//! independent scenarios in one test binary.

use std::cell::Cell;

use lumen_gc::Gc;
use lumen_gc::GcBox;
use lumen_runtime::activation::Activation;
use lumen_runtime::function::Function;
use lumen_runtime::object::{Object, Property, PropertyFlags};
use lumen_runtime::operators::op_add;
use lumen_runtime::string::StringPrimitive;
use lumen_runtime::value::TaggedValue;
use lumen_runtime::Runtime;

// ---- S1: recursive factorial -----------------------------------------

thread_local! {
    static FACT_CTX: Cell<Option<(*const Runtime, Gc<Function>)>> = Cell::new(None);
}

/// A hand-written `CompiledFn` body standing in for what an AOT backend
/// would emit for `function fact(n) { return n <= 2 ? n : n * fact(n - 1); }`
/// - it recurses back through [`Runtime::call_function`] exactly as
/// generated code calling `lumen_call` on itself would.
unsafe extern "C" fn fact_body(_closure_env: TaggedValue, args: *const TaggedValue, argc: usize) -> TaggedValue {
    assert_eq!(argc, 1);
    let n = unsafe { (*args).as_number() }.expect("fact's argument is a number");
    if n <= 2.0 {
        return TaggedValue::number(n);
    }
    let (rt_ptr, fact_fn) = FACT_CTX.with(|c| c.get()).expect("fact context installed before calling");
    let rt = unsafe { &*rt_ptr };
    let sub = rt.call_function(fact_fn, TaggedValue::undefined(), &[TaggedValue::number(n - 1.0)]);
    TaggedValue::number(n * sub.as_number().expect("fact's recursive call returns a number"))
}

#[test]
fn s1_recursive_factorial() {
    let rt = Runtime::new(false).unwrap();
    let fact_fn = rt.new_compiled_function("fact", rt.global_env, 1, fact_body).unwrap();
    FACT_CTX.with(|c| c.set(Some((&rt as *const Runtime, fact_fn))));

    let call = |n: f64| {
        rt.call_function(fact_fn, TaggedValue::undefined(), &[TaggedValue::number(n)])
            .as_number()
            .unwrap()
    };

    assert_eq!(call(5.0), 120.0);
    assert_eq!(call(1.0), 1.0);
    assert_eq!(call(2.0), 2.0);
}

// ---- S2: closure capture ------------------------------------------------

thread_local! {
    static INC_RT: Cell<*const Runtime> = Cell::new(std::ptr::null());
}

/// `function(){ var x=1; var inc=function(){x=x+1;return x}; ... }`'s inner
/// `inc`: reads and writes slot 0 of whatever environment it is called with,
/// exactly as a compiled closure would through `lumen_env_get`/`lumen_env_set`.
unsafe extern "C" fn inc_body(closure_env: TaggedValue, _args: *const TaggedValue, _argc: usize) -> TaggedValue {
    let rt = INC_RT.with(|c| c.get());
    let rt = unsafe { &*rt };
    let env = rt.unwrap_environment(closure_env).expect("inc is always called with a captured environment");
    let x = env.get(0).as_number().expect("captured slot holds a number") + 1.0;
    env.set(0, TaggedValue::number(x));
    TaggedValue::number(x)
}

#[test]
fn s2_closure_capture_shares_one_escaped_environment() {
    let rt = Runtime::new(false).unwrap();
    INC_RT.with(|c| c.set(&rt as *const Runtime));

    let env = rt.new_environment(None, 1).unwrap();
    env.set(0, TaggedValue::number(1.0));
    let inc = rt.new_compiled_function("inc", env, 0, inc_body).unwrap();

    let first = rt.call_function(inc, TaggedValue::undefined(), &[]).as_number().unwrap();
    let second = rt.call_function(inc, TaggedValue::undefined(), &[]).as_number().unwrap();

    assert_eq!(first + second, 5.0);
    // Both calls mutated the one environment the closure shares - the final
    // value reflects two increments from the shared starting value of 1.
    assert_eq!(env.get(0).as_number(), Some(3.0));
}

// ---- S3: string + number ADD --------------------------------------------

#[test]
fn s3_string_and_number_add() {
    let rt = Runtime::new(false).unwrap();

    let result = op_add(&rt, TaggedValue::number(1.0), rt.new_string("2"));
    assert_eq!(result.as_string().unwrap().as_str_lossy(), "12");

    let result = op_add(&rt, TaggedValue::number(1.0), TaggedValue::number(2.0));
    assert_eq!(result.as_number(), Some(3.0));
}

// ---- S4: prototype shadowing ---------------------------------------------

#[test]
fn s4_prototype_shadowing_via_put_and_delete() {
    let rt = Runtime::new(false).unwrap();
    let a = rt.new_object(None).unwrap();
    let x = rt.intern_key("x");
    a.define_own_property(x, Property::data(TaggedValue::number(1.0), PropertyFlags::default()));

    let b = rt.new_object(Some(a)).unwrap();
    let wrote = Object::put(b, x, TaggedValue::number(2.0), |_, _| unreachable!("x has no accessor"));
    assert!(wrote);

    let get = |o: Gc<Object>| Object::get(o, &x, TaggedValue::undefined(), |_, _| unreachable!("x has no accessor")).as_number();
    assert_eq!(get(a), Some(1.0));
    assert_eq!(get(b), Some(2.0));

    assert!(b.delete_property(&x));
    assert_eq!(get(b), Some(1.0), "deleting B's own x must expose A's x again");
}

// ---- S5: GC liveness ------------------------------------------------------

#[test]
fn s5_gc_liveness_transients_collected_survivor_kept() {
    let rt = Runtime::new(false).unwrap();
    // SAFETY: `rt` stays alive and at a stable address for the rest of this
    // test, matching `register_as_root`'s contract.
    unsafe {
        rt.register_as_root();
    }

    let baseline = rt.gc().allocated_bytes();

    let frame = rt.enter_activation("s5", 1);
    frame.set_local(0, rt.new_string("i survive"));

    for i in 0..10_000 {
        // Transient: never stored into a local, a property, or anywhere else
        // reachable from a root, so none of these should survive the GC.
        rt.new_string(&format!("garbage-{i}"));
    }

    rt.force_gc();

    let per_string = std::mem::size_of::<GcBox<StringPrimitive>>();
    let after = rt.gc().allocated_bytes();
    assert!(
        after <= baseline + 8 * per_string,
        "allocated bytes did not drop back near baseline after GC: {after} vs baseline {baseline}"
    );

    let survivor = frame.get_local(0).as_string().unwrap();
    assert_eq!(survivor.as_str_lossy(), "i survive");

    rt.exit_activation(&frame);
}

// ---- S6: throw across frames ----------------------------------------------

struct Frame<'a> {
    rt: &'a Runtime,
    activation: Box<Activation>,
}

impl<'a> Frame<'a> {
    fn enter(rt: &'a Runtime, label: &'static str) -> Self {
        Frame {
            rt,
            activation: rt.enter_activation(label, 0),
        }
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.rt.exit_activation(&self.activation);
    }
}

fn call_f1(rt: &Runtime) -> TaggedValue {
    let _f1 = Frame::enter(rt, "F1");
    call_f2(rt)
}

fn call_f2(rt: &Runtime) -> TaggedValue {
    let _f2 = Frame::enter(rt, "F2");
    call_f3(rt)
}

fn call_f3(rt: &Runtime) -> TaggedValue {
    let _f3 = Frame::enter(rt, "F3");
    rt.throw_type_error("boom")
}

#[test]
fn s6_throw_unwinds_to_the_installed_handler_and_unlinks_every_frame() {
    let rt = Runtime::new(false).unwrap();

    let result: Result<TaggedValue, TaggedValue> = rt.run_guarded(|| call_f1(&rt));

    let thrown = result.expect_err("F3's throw must unwind past F2 and F1 to the installed handler");
    let message_key = rt.intern_key("message");
    let message = thrown
        .as_object()
        .and_then(|o| o.get_own_property(&message_key))
        .and_then(|p| p.value.as_string())
        .expect("thrown TypeError carries a message property");
    assert_eq!(message.as_str_lossy(), "boom");

    // Every intermediate activation unlinked itself (via `Frame`'s `Drop`)
    // as the throw unwound, so a fresh top-level activation has no caller.
    let top = rt.enter_activation("after", 0);
    assert!(top.caller().is_none());
    rt.exit_activation(&top);
}
