//! Integration tests for spec.md §8's nine numbered invariants. Each test
//! names the invariant it covers in its own doc comment rather than
//! repeating the enumeration; see `spec_scenarios.rs` for S1-S6.

use lumen_gc::GcBox;
use lumen_runtime::coercion::to_boolean;
use lumen_runtime::ffi::lumen_is_valid_array_index;
use lumen_runtime::object::{Property, PropertyFlags};
use lumen_runtime::operators::{op_loose_eq, op_strict_eq};
use lumen_runtime::string::StringPrimitive;
use lumen_runtime::value::TaggedValue;
use lumen_runtime::Runtime;

/// Invariant 2: `runtime.allocated = Σ B.size over B on the allocation
/// list`. Every allocation of a given type adds exactly
/// `size_of::<GcBox<T>>()` bytes, regardless of the value's own heap-backed
/// payload (a string's byte buffer is not itself a GC-managed block).
#[test]
fn allocated_bytes_grows_by_exactly_the_boxed_size_per_allocation() {
    let rt = Runtime::new(false).unwrap();
    let before = rt.gc().allocated_bytes();

    rt.new_string("a");
    rt.new_string("a much longer string than the first one, to show payload size is irrelevant");

    let after = rt.gc().allocated_bytes();
    let per_string = std::mem::size_of::<GcBox<StringPrimitive>>();
    assert_eq!(after - before, 2 * per_string);
}

/// Invariant 3: iterating an object's properties in insertion-list order
/// yields each property exactly once, even after one of them is
/// overwritten via `defineOwnProperty`.
#[test]
fn property_iteration_order_has_no_duplicates_after_redefinition() {
    let rt = Runtime::new(false).unwrap();
    let obj = rt.new_object(None).unwrap();
    let a = rt.intern_key("a");
    let b = rt.intern_key("b");
    let c = rt.intern_key("c");

    obj.define_own_property(a, Property::data(TaggedValue::number(1.0), PropertyFlags::default()));
    obj.define_own_property(b, Property::data(TaggedValue::number(2.0), PropertyFlags::default()));
    obj.define_own_property(c, Property::data(TaggedValue::number(3.0), PropertyFlags::default()));
    // Redefining an existing key must not duplicate or reorder it.
    obj.define_own_property(a, Property::data(TaggedValue::number(10.0), PropertyFlags::default()));

    let keys = obj.all_own_keys();
    assert_eq!(keys.len(), 3, "redefining an existing key must not insert a duplicate");
    assert_eq!(keys, vec![a, b, c], "insertion order is preserved across redefinition");
}

/// Invariant 4: a string's UTF-16 unit length is the sum, over its code
/// points, of 1 for every BMP code point and 2 for every code point that
/// requires a surrogate pair.
#[test]
fn utf16_unit_length_matches_the_surrogate_pair_formula() {
    let rt = Runtime::new(false).unwrap();

    let ascii = rt.new_string("hello").as_string().unwrap();
    assert_eq!(ascii.length_in_utf16_units(), 5);

    // U+1F600 (GRINNING FACE) requires a surrogate pair: 2 units.
    let with_astral = rt.new_string("a\u{1F600}b").as_string().unwrap();
    assert_eq!(with_astral.length_in_utf16_units(), 1 + 2 + 1);

    // U+00E9 (e with acute) is BMP: 1 unit, despite being 2 UTF-8 bytes.
    let with_bmp = rt.new_string("caf\u{00E9}").as_string().unwrap();
    assert_eq!(with_bmp.length_in_utf16_units(), 4);
}

/// Invariant 5: for every interned string, no other string with the same
/// bytes exists in the intern pool - two interning calls with identical
/// bytes always hand back the same heap object.
#[test]
fn interning_the_same_bytes_twice_yields_the_same_object() {
    let rt = Runtime::new(false).unwrap();
    let a = rt.intern_str("shared");
    let b = rt.intern_str("shared");
    assert!(lumen_gc::Gc::ptr_eq(a.as_string().unwrap(), b.as_string().unwrap()));

    // A plain (non-interned) string with the same bytes is a distinct object.
    let c = rt.new_string("shared");
    assert!(!lumen_gc::Gc::ptr_eq(a.as_string().unwrap(), c.as_string().unwrap()));
}

/// Invariant 6: `toBoolean(v) = false` iff
/// `v ∈ {undefined, null, false, NaN, +0, -0, ""}`.
#[test]
fn to_boolean_falsy_set_matches_the_spec_exactly() {
    let rt = Runtime::new(false).unwrap();

    let falsy = [
        TaggedValue::undefined(),
        TaggedValue::null(),
        TaggedValue::boolean(false),
        TaggedValue::number(f64::NAN),
        TaggedValue::number(0.0),
        TaggedValue::number(-0.0),
        rt.new_string(""),
    ];
    for v in falsy {
        assert!(!to_boolean(v), "expected falsy: {v:?}");
    }

    let truthy = [
        TaggedValue::boolean(true),
        TaggedValue::number(1.0),
        TaggedValue::number(-1.0),
        TaggedValue::number(f64::INFINITY),
        rt.new_string("0"),
        rt.new_string(" "),
        TaggedValue::object(rt.new_object(None).unwrap()),
    ];
    for v in truthy {
        assert!(to_boolean(v), "expected truthy: {v:?}");
    }
}

/// Invariant 7: `strictEq(a, b) = true` implies `looseEq(a, b) = true`.
#[test]
fn strict_equality_implies_loose_equality() {
    let rt = Runtime::new(false).unwrap();
    let obj = rt.new_object(None).unwrap();
    let s = rt.new_string("x");

    let pairs = [
        (TaggedValue::number(1.0), TaggedValue::number(1.0)),
        (TaggedValue::number(0.0), TaggedValue::number(-0.0)),
        (TaggedValue::boolean(true), TaggedValue::boolean(true)),
        (TaggedValue::null(), TaggedValue::null()),
        (TaggedValue::undefined(), TaggedValue::undefined()),
        (s, s),
        (TaggedValue::object(obj), TaggedValue::object(obj)),
    ];
    for (a, b) in pairs {
        if op_strict_eq(a, b) {
            assert!(op_loose_eq(&rt, a, b), "strictEq({a:?}, {b:?}) held but looseEq did not");
        }
    }
}

/// Invariant 8: `substring(0, unitLength) == S` for every string S.
#[test]
fn full_substring_round_trips_to_an_equal_string() {
    let rt = Runtime::new(false).unwrap();
    for text in ["", "x", "hello, world", "a\u{1F600}b\u{00E9}"] {
        let s = rt.new_string(text).as_string().unwrap();
        let whole = s.substring(0, s.length_in_utf16_units());
        assert!(StringPrimitive::equals(&s, &whole), "substring(0, unitLength) != S for {text:?}");
    }
}

/// Invariant 9: `isValidArrayIndex(makeNumber(n)) = true` iff
/// `0 <= n < 2^32` and `n` is an integer.
#[test]
fn valid_array_index_matches_the_range_and_integrality_rule() {
    let mut out: u32 = 0;
    let valid = [0.0, 1.0, 41.0, 4294967295.0];
    for n in valid {
        assert!(lumen_is_valid_array_index(TaggedValue::number(n), &mut out));
        assert_eq!(out, n as u32);
    }

    let invalid = [-1.0, -0.5, 0.5, 4294967296.0, f64::NAN, f64::INFINITY];
    for n in invalid {
        assert!(!lumen_is_valid_array_index(TaggedValue::number(n), std::ptr::null_mut()));
    }

    // Not a number at all.
    assert!(!lumen_is_valid_array_index(TaggedValue::undefined(), std::ptr::null_mut()));
}
