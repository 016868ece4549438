//! `for-in` enumeration.
//!
//! Ported from `ForInIterator`/`ForInIndexedIterator` in `runtime.cxx`: an
//! indexed object (array, arguments, typed array) yields its in-range indices
//! first, then falls through to the named-property walk every object gets.
//! The named-property walk visits `obj` then each prototype in turn, tracking
//! every name seen at any level - not just the enumerable ones - so that a
//! non-enumerable property further down the chain still hides an enumerable
//! property of the same name further up, exactly as `usedSet` does in the
//! original. Each queued name is re-resolved through [`Object::get_property`]
//! at yield time rather than cached by value, so a script that mutates or
//! deletes a property mid-loop sees the iterator react to it instead of
//! replaying stale results.

use std::cell::Cell;
use std::collections::HashSet;

use lumen_gc::Gc;

use crate::coercion::uint32_to_string;
use crate::object::{Object, PropKey, PropertyFlags};
use crate::runtime::Runtime;
use crate::value::TaggedValue;

pub struct ForInIterator {
    obj: Gc<Object>,
    names: Vec<PropKey>,
    name_cursor: Cell<usize>,
    /// `Some(length)` while the indexed prefix hasn't been exhausted yet;
    /// flips to `None` the first time `next` falls through to named
    /// properties, so later calls skip straight to the name cursor.
    indexed_length: Cell<Option<usize>>,
    index_cursor: Cell<usize>,
}

impl ForInIterator {
    /// `makeForInIterator`: snapshot the set of names this walk will ever
    /// consider. Indices are not snapshotted - the original re-checks
    /// `hasIndex` against the live indexed storage on every step, since an
    /// array's length can change mid-loop.
    pub fn new(obj: Gc<Object>) -> Self {
        let indexed_length = obj.indexed.as_ref().map(|i| i.borrow().get_indexed_length());
        ForInIterator {
            obj,
            names: collect_enumerable_names(obj),
            name_cursor: Cell::new(0),
            indexed_length: Cell::new(indexed_length),
            index_cursor: Cell::new(0),
        }
    }

    pub fn next(&self, rt: &Runtime) -> Option<TaggedValue> {
        if self.indexed_length.get().is_some() {
            if let Some(value) = self.next_index(rt) {
                return Some(value);
            }
            self.indexed_length.set(None);
        }
        self.next_name()
    }

    fn next_index(&self, rt: &Runtime) -> Option<TaggedValue> {
        let length = self.indexed_length.get()?;
        let indexed = self.obj.indexed.as_ref()?;
        while self.index_cursor.get() < length {
            let index = self.index_cursor.get();
            self.index_cursor.set(index + 1);
            if indexed.borrow().has_index(index) {
                return Some(rt.new_string(&uint32_to_string(index as u32, 10)));
            }
        }
        None
    }

    fn next_name(&self) -> Option<TaggedValue> {
        while self.name_cursor.get() < self.names.len() {
            let i = self.name_cursor.get();
            self.name_cursor.set(i + 1);
            let key = self.names[i];
            // Re-resolve: the name may since have been deleted, or shadowed
            // by a differently-flagged property, since the walk that built
            // `self.names` ran.
            if let Some((_, prop)) = Object::get_property(self.obj, &key) {
                if prop.flags.contains(PropertyFlags::ENUMERABLE) {
                    return Some(TaggedValue::string(key.0));
                }
            }
        }
        None
    }
}

fn collect_enumerable_names(obj: Gc<Object>) -> Vec<PropKey> {
    let mut used: HashSet<PropKey> = HashSet::new();
    let mut names = Vec::new();
    let mut cur = Some(obj);
    while let Some(o) = cur {
        for key in o.all_own_keys() {
            if used.insert(key) {
                if let Some(prop) = o.get_own_property(&key) {
                    if prop.flags.contains(PropertyFlags::ENUMERABLE) {
                        names.push(key);
                    }
                }
            }
        }
        cur = o.prototype;
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Property;
    use crate::runtime::Runtime;

    fn collect(rt: &Runtime, iter: &ForInIterator) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(v) = iter.next(rt) {
            out.push(v.as_string().unwrap().as_str_lossy().into_owned());
        }
        out
    }

    #[test]
    fn walks_own_properties_in_insertion_order() {
        let rt = Runtime::new(false).unwrap();
        let obj = rt.new_object(None).unwrap();
        let a = rt.intern_key("a");
        let b = rt.intern_key("b");
        obj.define_own_property(a, Property::data(TaggedValue::number(1.0), PropertyFlags::default()));
        obj.define_own_property(b, Property::data(TaggedValue::number(2.0), PropertyFlags::default()));

        let iter = ForInIterator::new(obj);
        assert_eq!(collect(&rt, &iter), vec!["a", "b"]);
    }

    #[test]
    fn skips_non_enumerable_own_properties() {
        let rt = Runtime::new(false).unwrap();
        let obj = rt.new_object(None).unwrap();
        let hidden = rt.intern_key("hidden");
        obj.define_own_property(hidden, Property::data(TaggedValue::number(1.0), PropertyFlags::WRITABLE));

        let iter = ForInIterator::new(obj);
        assert!(collect(&rt, &iter).is_empty());
    }

    #[test]
    fn non_enumerable_own_property_shadows_enumerable_ancestor() {
        let rt = Runtime::new(false).unwrap();
        let proto = rt.new_object(None).unwrap();
        let name = rt.intern_key("x");
        proto.define_own_property(name, Property::data(TaggedValue::number(1.0), PropertyFlags::default()));

        let child = rt.new_object(Some(proto)).unwrap();
        child.define_own_property(name, Property::data(TaggedValue::number(2.0), PropertyFlags::WRITABLE));

        let iter = ForInIterator::new(child);
        assert!(collect(&rt, &iter).is_empty());
    }

    #[test]
    fn indexed_entries_are_yielded_before_named_properties() {
        let rt = Runtime::new(false).unwrap();
        let arr = rt.new_array().unwrap();
        arr.indexed.as_ref().unwrap().borrow_mut().set_at_index(0, TaggedValue::number(10.0));
        arr.indexed.as_ref().unwrap().borrow_mut().set_at_index(1, TaggedValue::number(20.0));
        let name = rt.intern_key("tag");
        arr.define_own_property(name, Property::data(TaggedValue::number(1.0), PropertyFlags::default()));

        let iter = ForInIterator::new(arr);
        assert_eq!(collect(&rt, &iter), vec!["0", "1", "tag"]);
    }
}
