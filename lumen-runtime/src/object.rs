//! The prototype-based object model.
//!
//! Ported from `Object`/`Property`/`ListEntry` in `runtime.h`: properties are
//! stored in insertion order (so `for-in` enumerates them the way a script
//! author expects), each carries the ENUMERABLE/WRITABLE/CONFIGURABLE/GET_SET
//! attribute bits, and property lookups walk the prototype chain one link at
//! a time. `indexmap::IndexMap` gives us the ordered map for free instead of
//! the original's intrusive doubly linked list threaded through a
//! `std::map<const char*, Property>` - the workspace's compiler crates already
//! depend on `indexmap` for exactly this ordered-map need.

use std::cell::RefCell;

use indexmap::IndexMap;
use lumen_gc::{Gc, Trace, WorkQueue};

use crate::function::Function;
use crate::indexed::IndexedStorage;
use crate::string::StringPrimitive;
use crate::value::TaggedValue;

// A tiny hand-rolled bitflags macro: the workspace elsewhere pulls in the
// `bitflags` crate for exactly this pattern, but a single four-bit flag set
// does not warrant the dependency here.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($repr);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

bitflags_like! {
    /// Per-property attribute bits, mirroring `PropertyFlags` in the original
    /// runtime.
    pub struct PropertyFlags: u8 {
        const NONE = 0b0000;
        const ENUMERABLE = 0b0001;
        const WRITABLE = 0b0010;
        const CONFIGURABLE = 0b0100;
        /// This property is an accessor (`get`/`set` pair) rather than a
        /// plain data slot; `value` is unused and `getter`/`setter` hold the
        /// accessor functions instead.
        const GET_SET = 0b1000;
    }
}

impl Default for PropertyFlags {
    fn default() -> Self {
        PropertyFlags::ENUMERABLE | PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE
    }
}

#[derive(Clone, Copy)]
pub struct Property {
    pub flags: PropertyFlags,
    pub value: TaggedValue,
    pub getter: Option<Gc<Function>>,
    pub setter: Option<Gc<Function>>,
}

impl Property {
    pub fn data(value: TaggedValue, flags: PropertyFlags) -> Self {
        Property {
            flags,
            value,
            getter: None,
            setter: None,
        }
    }

    pub fn accessor(
        getter: Option<Gc<Function>>,
        setter: Option<Gc<Function>>,
        flags: PropertyFlags,
    ) -> Self {
        Property {
            flags: flags | PropertyFlags::GET_SET,
            value: TaggedValue::undefined(),
            getter,
            setter,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.flags.contains(PropertyFlags::GET_SET)
    }
}

/// An interned property key, compared and hashed by pointer identity rather
/// than by content - the pool guarantees two keys with equal bytes are
/// always the same handle.
#[derive(Clone, Copy)]
pub struct PropKey(pub Gc<StringPrimitive>);

impl PartialEq for PropKey {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(self.0, other.0)
    }
}
impl Eq for PropKey {}

impl std::hash::Hash for PropKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.addr().hash(state);
    }
}

/// Object-level extend/write/config lattice, orthogonal to individual
/// property flags: these gate whether new properties may be added, or
/// whether this object's configurability/writability can be bypassed by an
/// embedder operation, mirroring `ObjectFlags` in the original runtime.
///
/// Forms a one-way lattice per spec.md §4.3: `preventExtensions` sets
/// `no_extend`; `seal` adds `no_config` (and implies `no_extend`); `freeze`
/// adds `no_write` (and implies both). None of the three can be cleared once
/// set - there is no `allowExtensions`/`unseal`/`unfreeze`.
#[derive(Clone, Copy, Default)]
pub struct ObjectFlags {
    pub no_extend: bool,
    pub no_config: bool,
    pub no_write: bool,
}

pub struct Object {
    pub prototype: Option<Gc<Object>>,
    properties: RefCell<IndexMap<PropKey, Property>>,
    pub flags: RefCell<ObjectFlags>,
    /// Present for Array/Arguments/String-box/TypedArray instances; absent
    /// for plain objects. See [`crate::indexed`].
    pub indexed: Option<RefCell<IndexedStorage>>,
}

impl Trace for Object {
    fn trace(&self, queue: &mut WorkQueue) {
        if let Some(proto) = self.prototype {
            queue.push(proto.erase());
        }
        for (key, prop) in self.properties.borrow().iter() {
            queue.push(key.0.erase());
            prop.value.trace(queue);
            if let Some(getter) = prop.getter {
                queue.push(getter.erase());
            }
            if let Some(setter) = prop.setter {
                queue.push(setter.erase());
            }
        }
        if let Some(indexed) = &self.indexed {
            indexed.borrow().trace(queue);
        }
    }
}

impl Object {
    pub fn new(prototype: Option<Gc<Object>>) -> Self {
        Object {
            prototype,
            properties: RefCell::new(IndexMap::new()),
            flags: RefCell::new(ObjectFlags::default()),
            indexed: None,
        }
    }

    pub fn with_indexed(prototype: Option<Gc<Object>>, indexed: IndexedStorage) -> Self {
        Object {
            prototype,
            properties: RefCell::new(IndexMap::new()),
            flags: RefCell::new(ObjectFlags::default()),
            indexed: Some(RefCell::new(indexed)),
        }
    }

    /// `[[DefineOwnProperty]]`: insert or overwrite an own property, ignoring
    /// the prototype chain entirely. Returns `false` (and leaves the object
    /// unchanged) if the property already exists and is non-configurable, or
    /// if the object is sealed against extension and the property is new.
    pub fn define_own_property(&self, key: PropKey, prop: Property) -> bool {
        let mut props = self.properties.borrow_mut();
        let object_flags = *self.flags.borrow();
        if let Some(existing) = props.get(&key) {
            if object_flags.no_config || !existing.flags.contains(PropertyFlags::CONFIGURABLE) {
                return false;
            }
        } else if object_flags.no_extend {
            return false;
        }
        props.insert(key, prop);
        true
    }

    /// `preventExtensions`: blocks new own properties from being added. The
    /// bottom of the lattice - `seal`/`freeze` both imply it.
    pub fn prevent_extensions(&self) {
        self.flags.borrow_mut().no_extend = true;
    }

    /// `seal`: `preventExtensions` plus no own property may be reconfigured
    /// or deleted, regardless of that property's own `CONFIGURABLE` bit.
    pub fn seal(&self) {
        let mut flags = self.flags.borrow_mut();
        flags.no_extend = true;
        flags.no_config = true;
    }

    /// `freeze`: `seal` plus no own data property may be written, regardless
    /// of that property's own `WRITABLE` bit. Accessor properties are
    /// unaffected - a setter installed before freezing still runs.
    pub fn freeze(&self) {
        let mut flags = self.flags.borrow_mut();
        flags.no_extend = true;
        flags.no_config = true;
        flags.no_write = true;
    }

    pub fn is_extensible(&self) -> bool {
        !self.flags.borrow().no_extend
    }

    pub fn is_sealed(&self) -> bool {
        let flags = self.flags.borrow();
        flags.no_extend && flags.no_config
    }

    pub fn is_frozen(&self) -> bool {
        let flags = self.flags.borrow();
        flags.no_extend && flags.no_config && flags.no_write
    }

    /// Look up an own property without walking the prototype chain.
    pub fn get_own_property(&self, key: &PropKey) -> Option<Property> {
        self.properties.borrow().get(key).copied()
    }

    pub fn has_own_property(&self, key: &PropKey) -> bool {
        self.properties.borrow().contains_key(key)
    }

    /// Walk `self` then its prototype chain looking for `key`.
    pub fn get_property(this: Gc<Object>, key: &PropKey) -> Option<(Gc<Object>, Property)> {
        let mut current = Some(this);
        while let Some(obj) = current {
            if let Some(prop) = obj.get_own_property(key) {
                return Some((obj, prop));
            }
            current = obj.prototype;
        }
        None
    }

    pub fn has_property(this: Gc<Object>, key: &PropKey) -> bool {
        Object::get_property(this, key).is_some()
    }

    /// `[[Delete]]`: removes an own property. Returns `false` if the property
    /// exists and is non-configurable.
    pub fn delete_property(&self, key: &PropKey) -> bool {
        let mut props = self.properties.borrow_mut();
        let no_config = self.flags.borrow().no_config;
        match props.get(key) {
            Some(existing) if no_config || !existing.flags.contains(PropertyFlags::CONFIGURABLE) => false,
            Some(_) => {
                props.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Own property keys, in insertion order, filtered to the enumerable ones
    /// - the order `for-in` and `Object.keys` rely on.
    pub fn enumerable_own_keys(&self) -> Vec<PropKey> {
        self.properties
            .borrow()
            .iter()
            .filter(|(_, prop)| prop.flags.contains(PropertyFlags::ENUMERABLE))
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn own_key_count(&self) -> usize {
        self.properties.borrow().len()
    }

    /// Every own property key in insertion order, enumerable or not - used by
    /// `for-in` enumeration to track which names a non-enumerable descendant
    /// property shadows, even though it does not itself get yielded.
    pub fn all_own_keys(&self) -> Vec<PropKey> {
        self.properties.borrow().keys().copied().collect()
    }

    /// `Get`: read `key` off the prototype chain, invoking a getter if the
    /// resolved property is an accessor. `receiver` is the `this` value
    /// passed to the getter - distinct from the object the property was
    /// actually found on when `this` walked up the prototype chain.
    pub fn get(
        this: Gc<Object>,
        key: &PropKey,
        receiver: TaggedValue,
        call_getter: impl FnOnce(Gc<Function>, TaggedValue) -> TaggedValue,
    ) -> TaggedValue {
        match Object::get_property(this, key) {
            Some((_, prop)) if prop.is_accessor() => match prop.getter {
                Some(getter) => call_getter(getter, receiver),
                None => TaggedValue::undefined(),
            },
            Some((_, prop)) => prop.value,
            None => TaggedValue::undefined(),
        }
    }

    /// `Put`/`[[Set]]`: write `key` to its own slot if writable, or to the
    /// nearest accessor in the prototype chain. Returns `false` on a failed
    /// write (caller decides whether that throws, per strict mode).
    pub fn put(
        this: Gc<Object>,
        key: PropKey,
        value: TaggedValue,
        call_setter: impl FnOnce(Gc<Function>, TaggedValue),
    ) -> bool {
        let no_write = this.flags.borrow().no_write;
        if let Some((owner, prop)) = Object::get_property(this, &key) {
            if prop.is_accessor() {
                return match prop.setter {
                    Some(setter) => {
                        call_setter(setter, value);
                        true
                    }
                    None => false,
                };
            }
            if Gc::ptr_eq(owner, this) {
                if no_write || !prop.flags.contains(PropertyFlags::WRITABLE) {
                    return false;
                }
                return this.define_own_property(
                    key,
                    Property::data(value, prop.flags),
                );
            }
            if no_write || !prop.flags.contains(PropertyFlags::WRITABLE) {
                return false;
            }
        }
        this.define_own_property(key, Property::data(value, PropertyFlags::default()))
    }

    /// `createDescendant`: produce a new object whose parent is `this` and
    /// whose concrete indexed kind (if any) matches the most derived indexed
    /// kind found walking up `this`'s own prototype chain - so `new` on a
    /// user constructor whose `.prototype` is, say, an `Array` still
    /// produces an `Array`, not a plain `Object`, per spec.md §4.3.
    pub fn create_descendant(this: Gc<Object>) -> Object {
        let mut cur = Some(this);
        while let Some(obj) = cur {
            if let Some(indexed) = &obj.indexed {
                let template = match &*indexed.borrow() {
                    IndexedStorage::Array(_) => Some(IndexedStorage::new_array()),
                    IndexedStorage::Arguments(_) => Some(IndexedStorage::new_arguments(Vec::new())),
                    IndexedStorage::TypedArray { kind, .. } => {
                        Some(IndexedStorage::new_typed_array(*kind, 0))
                    }
                    // A boxed string's indexed storage can't be recreated
                    // without content to box; a descendant of a String
                    // instance falls back to a plain object, matching the
                    // original's treatment of `Object.create(new String(...))`.
                    IndexedStorage::StringBox(_) => None,
                };
                return match template {
                    Some(ind) => Object::with_indexed(Some(this), ind),
                    None => Object::new(Some(this)),
                };
            }
            cur = obj.prototype;
        }
        Object::new(Some(this))
    }
}

/// Anything that carries an own property map and an optional prototype
/// chain - both `Object` itself and `Function` (which embeds one) implement
/// this so [`find_property`] can walk either uniformly. `Function` cannot
/// hand out a `Gc<Object>` to its own embedded object, so this operates on
/// plain references for the "self" step and only needs `Gc<Object>` once the
/// walk reaches an ancestor.
pub trait PropertyOwner {
    fn own_object(&self) -> &Object;
}

impl PropertyOwner for Object {
    fn own_object(&self) -> &Object {
        self
    }
}

/// Walk `bearer`'s own properties, then its prototype chain, looking for
/// `key`. This is [`Object::get_property`] generalized to a non-`Gc`-rooted
/// receiver (namely a `Function`'s embedded `Object`), used by
/// `toPrimitive`'s `toString`/`valueOf` lookup in `runtime.rs`.
pub fn find_property<T: PropertyOwner>(bearer: &T, key: &PropKey) -> Option<Property> {
    let obj = bearer.own_object();
    if let Some(prop) = obj.get_own_property(key) {
        return Some(prop);
    }
    let mut cur = obj.prototype;
    while let Some(o) = cur {
        if let Some(prop) = o.get_own_property(key) {
            return Some(prop);
        }
        cur = o.prototype;
    }
    None
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum DefaultValueHint {
    Number,
    String,
}
