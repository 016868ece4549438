//! The binary/unary script operators: `+`, `typeof`, `===`/`==`, the four
//! relational operators, `delete`, `in` and `instanceof`.
//!
//! Ported from `operators.cpp`. The original's `operator_IF_LOOSE_EQ` is
//! written as a `goto tailcall` state machine over the coercion table from
//! the ECMA-262 Abstract Equality Comparison algorithm; here the same table
//! is a `loop` that re-assigns `a`/`b` and `continue`s, which is what the
//! `goto` compiles down to without needing the label.

use crate::coercion::{to_number, to_primitive, to_string};
use crate::object::Object;
use crate::runtime::Runtime;
use crate::string::StringPrimitive;
use crate::value::{Tag, TaggedValue};
use lumen_gc::Gc;

/// `operator_ADD`: string concatenation if either operand's primitive form is
/// a string, numeric addition otherwise.
pub fn op_add(rt: &Runtime, a: TaggedValue, b: TaggedValue) -> TaggedValue {
    let pa = to_primitive(rt, a, false);
    let pb = to_primitive(rt, b, false);

    if pa.tag() == Tag::String || pb.tag() == Tag::String {
        let sa = to_string(rt, pa);
        let sb = to_string(rt, pb);
        let concatenated = StringPrimitive::concat(&sa.as_string().unwrap(), &sb.as_string().unwrap());
        rt.new_string_from_primitive(concatenated)
    } else {
        TaggedValue::number(to_number(rt, pa) + to_number(rt, pb))
    }
}

/// `operator_TYPEOF`: one of the fixed `typeof` result strings, interned once
/// at bootstrap and returned here by handle, never allocated fresh.
pub fn op_typeof(rt: &Runtime, a: TaggedValue) -> TaggedValue {
    let name = match a.tag() {
        Tag::Undefined => "undefined",
        Tag::Null => "object",
        Tag::Boolean => "boolean",
        Tag::Number => "number",
        Tag::String => "string",
        Tag::Memory => "object",
        Tag::Object => "object",
        Tag::Function => "function",
    };
    rt.intern_str(name)
}

/// `operator_IF_STRICT_EQ`: tags must match, then per-tag comparison -
/// strings compare by content, everything heap-allocated compares by pointer
/// identity, primitives compare by value.
pub fn op_strict_eq(a: TaggedValue, b: TaggedValue) -> bool {
    if a.tag() != b.tag() {
        return false;
    }
    match a.tag() {
        Tag::Undefined | Tag::Null => true,
        Tag::Boolean => a.as_boolean() == b.as_boolean(),
        Tag::Number => a.as_number() == b.as_number(),
        Tag::String => StringPrimitive::equals(&a.as_string().unwrap(), &b.as_string().unwrap()),
        Tag::Memory => a.as_memory().unwrap().addr() == b.as_memory().unwrap().addr(),
        Tag::Object => Gc::ptr_eq(a.as_object().unwrap(), b.as_object().unwrap()),
        Tag::Function => Gc::ptr_eq(a.as_function().unwrap(), b.as_function().unwrap()),
    }
}

/// `operator_IF_LOOSE_EQ`: the Abstract Equality Comparison coercion table,
/// looping instead of `goto`ing back to the top until a case falls through to
/// a tag-matching (or definitively unequal) pair.
pub fn op_loose_eq(rt: &Runtime, mut a: TaggedValue, mut b: TaggedValue) -> bool {
    loop {
        if a.tag() == b.tag() {
            return op_strict_eq(a, b);
        }
        match (a.tag(), b.tag()) {
            (Tag::Null, Tag::Undefined) | (Tag::Undefined, Tag::Null) => return true,
            (Tag::Number, Tag::String) => return a.as_number().unwrap() == to_number(rt, b),
            (Tag::String, Tag::Number) => return to_number(rt, a) == b.as_number().unwrap(),
            (Tag::String, Tag::Object | Tag::Function) | (Tag::Number, Tag::Object | Tag::Function) => {
                b = to_primitive(rt, b, false);
            }
            (Tag::Object | Tag::Function, Tag::String) | (Tag::Object | Tag::Function, Tag::Number) => {
                a = to_primitive(rt, a, false);
            }
            _ if a.tag() == Tag::Boolean => {
                a = TaggedValue::number(if a.as_boolean().unwrap() { 1.0 } else { 0.0 });
            }
            _ if b.tag() == Tag::Boolean => {
                b = TaggedValue::number(if b.as_boolean().unwrap() { 1.0 } else { 0.0 });
            }
            _ => return false,
        }
    }
}

enum RelOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// Shared body for the four `MAKE_IF_REL`-generated operators: coerce both
/// sides to a primitive, compare lexicographically if both ended up strings,
/// numerically otherwise.
fn relational(rt: &Runtime, x: TaggedValue, y: TaggedValue, op: RelOp) -> bool {
    let px = to_primitive(rt, x, false);
    let py = to_primitive(rt, y, false);

    if px.tag() == Tag::String && py.tag() == Tag::String {
        let sx = px.as_string().unwrap();
        let sy = py.as_string().unwrap();
        match op {
            RelOp::Lt => StringPrimitive::less(&sx, &sy),
            RelOp::Le => !StringPrimitive::less(&sy, &sx),
            RelOp::Gt => StringPrimitive::less(&sy, &sx),
            RelOp::Ge => !StringPrimitive::less(&sx, &sy),
        }
    } else {
        let nx = to_number(rt, px);
        let ny = to_number(rt, py);
        match op {
            RelOp::Lt => nx < ny,
            RelOp::Le => nx <= ny,
            RelOp::Gt => nx > ny,
            RelOp::Ge => nx >= ny,
        }
    }
}

pub fn op_lt(rt: &Runtime, x: TaggedValue, y: TaggedValue) -> bool {
    relational(rt, x, y, RelOp::Lt)
}

pub fn op_le(rt: &Runtime, x: TaggedValue, y: TaggedValue) -> bool {
    relational(rt, x, y, RelOp::Le)
}

pub fn op_gt(rt: &Runtime, x: TaggedValue, y: TaggedValue) -> bool {
    relational(rt, x, y, RelOp::Gt)
}

pub fn op_ge(rt: &Runtime, x: TaggedValue, y: TaggedValue) -> bool {
    relational(rt, x, y, RelOp::Ge)
}

/// `operator_INSTANCEOF`: `b` must be a function, or this throws a type
/// error; otherwise delegates to [`Runtime::has_instance`].
pub fn op_instanceof(rt: &Runtime, a: TaggedValue, b: TaggedValue) -> bool {
    let Some(func) = b.as_function() else {
        rt.throw_type_error("right-hand side of 'instanceof' is not callable");
    };
    match a.as_object() {
        Some(obj) => rt.has_instance(func, obj).unwrap_or(false),
        None => false,
    }
}

/// `operator_IN`: does `key` name an own-or-inherited property of `obj`
/// (including an in-range indexed entry)? Throws if the right-hand side is
/// not an object, matching the ECMA-262 `in` operator's `HasProperty` check.
pub fn op_in(rt: &Runtime, key: TaggedValue, obj: TaggedValue) -> bool {
    let Some(target) = obj.as_object() else {
        rt.throw_type_error("'in' operator requires an object right-hand side");
    };
    let key_str = to_string(rt, key).as_string().unwrap();
    if let Some(index) = array_index(&key_str.as_str_lossy()) {
        if let Some(indexed) = &target.indexed {
            if indexed.borrow().has_index(index as usize) {
                return true;
            }
        }
    }
    let prop_key = rt.intern_key(&key_str.as_str_lossy());
    Object::has_property(target, &prop_key)
}

/// `operator_DELETE`: remove `key` from `obj`'s own properties (or indexed
/// entries), returning whether the delete succeeded. A sealed/frozen object
/// (`NOCONFIG`) rejects an indexed delete exactly like
/// `Object::delete_property` rejects a named one, matching
/// `ArrayBase::deleteAtIndex`'s `OF_NOCONFIG` check in the original runtime.
pub fn op_delete(rt: &Runtime, obj: TaggedValue, key: TaggedValue) -> bool {
    let Some(target) = obj.as_object() else {
        return true;
    };
    let key_str = to_string(rt, key).as_string().unwrap();
    if let Some(index) = array_index(&key_str.as_str_lossy()) {
        if let Some(indexed) = &target.indexed {
            if target.flags.borrow().no_config {
                return false;
            }
            return indexed.borrow_mut().delete_at_index(index as usize);
        }
    }
    let prop_key = rt.intern_key(&key_str.as_str_lossy());
    target.delete_property(&prop_key)
}

/// Parses `s` as a canonical array index (`"0"`, `"1"`, ... with no leading
/// zeroes other than `"0"` itself, and no sign), the same string shape
/// `isIndexString` in the original recognizes before treating a property
/// name as an indexed-storage access instead of a named one.
fn array_index(s: &str) -> Option<u32> {
    if s == "0" {
        return Some(0);
    }
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    #[test]
    fn add_concatenates_when_either_side_is_a_string() {
        let rt = Runtime::new(false).unwrap();
        let result = op_add(&rt, rt.new_string("foo"), TaggedValue::number(1.0));
        assert_eq!(result.as_string().unwrap().as_str_lossy(), "foo1");
    }

    #[test]
    fn add_is_numeric_when_neither_side_is_a_string() {
        let rt = Runtime::new(false).unwrap();
        let result = op_add(&rt, TaggedValue::number(1.0), TaggedValue::number(2.0));
        assert_eq!(result.as_number(), Some(3.0));
    }

    #[test]
    fn typeof_reports_the_fixed_names() {
        let rt = Runtime::new(false).unwrap();
        assert_eq!(op_typeof(&rt, TaggedValue::undefined()).as_string().unwrap().as_str_lossy(), "undefined");
        assert_eq!(op_typeof(&rt, TaggedValue::null()).as_string().unwrap().as_str_lossy(), "object");
        assert_eq!(op_typeof(&rt, TaggedValue::number(1.0)).as_string().unwrap().as_str_lossy(), "number");
    }

    #[test]
    fn strict_eq_requires_matching_tags() {
        assert!(!op_strict_eq(TaggedValue::number(0.0), TaggedValue::boolean(false)));
        assert!(op_strict_eq(TaggedValue::number(1.0), TaggedValue::number(1.0)));
    }

    #[test]
    fn loose_eq_treats_null_and_undefined_as_equal() {
        assert!(op_loose_eq(&Runtime::new(false).unwrap(), TaggedValue::null(), TaggedValue::undefined()));
    }

    #[test]
    fn loose_eq_coerces_string_to_number() {
        let rt = Runtime::new(false).unwrap();
        assert!(op_loose_eq(&rt, TaggedValue::number(1.0), rt.new_string("1")));
    }

    #[test]
    fn relational_compares_strings_lexicographically() {
        let rt = Runtime::new(false).unwrap();
        assert!(op_lt(&rt, rt.new_string("bar"), rt.new_string("foo")));
    }

    #[test]
    fn array_index_rejects_leading_zero_and_signs() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("012"), None);
        assert_eq!(array_index("-1"), None);
    }

    #[test]
    fn deleting_an_array_element_makes_in_report_absent() {
        let rt = Runtime::new(false).unwrap();
        let arr = rt.new_array().unwrap();
        arr.indexed.as_ref().unwrap().borrow_mut().set_at_index(0, TaggedValue::number(1.0));
        let arr_value = TaggedValue::object(arr);

        assert!(op_in(&rt, rt.new_string("0"), arr_value));
        assert!(op_delete(&rt, arr_value, rt.new_string("0")));
        assert!(!op_in(&rt, rt.new_string("0"), arr_value));
    }

    #[test]
    fn deleting_a_sealed_arrays_element_fails() {
        let rt = Runtime::new(false).unwrap();
        let arr = rt.new_array().unwrap();
        arr.indexed.as_ref().unwrap().borrow_mut().set_at_index(0, TaggedValue::number(1.0));
        arr.seal();
        let arr_value = TaggedValue::object(arr);

        assert!(!op_delete(&rt, arr_value, rt.new_string("0")));
        assert!(op_in(&rt, rt.new_string("0"), arr_value));
    }
}
