//! The object-core protocol: the generic entry points every consumer uses
//! instead of reaching into a type's operation table directly.
//!
//! Each entry point resolves the slot on the operand's type, applies the
//! documented fallbacks and turns a missing slot into the matching
//! `TypeError`. Arguments are borrowed; returned objects are new references.

pub mod attr;
pub mod compare;
pub mod number;

use crate::error::{ErrorKind, PyErr};
use crate::object::ObjectId;
use crate::objects::int::int_like;
use crate::runtime::Runtime;
use crate::PyResult;

impl Runtime {
    /// `repr(obj)`. Guarded against unbounded recursion through nested
    /// containers.
    pub fn repr(&mut self, obj: ObjectId) -> PyResult<String> {
        let repr = self.slots_of(obj)?.repr;
        self.with_recursion_guard(" while getting the repr of an object", |rt| match repr {
            Some(repr) => repr(rt, obj),
            None => Ok(format!("<{} object at {obj}>", rt.type_name_of(obj))),
        })
    }

    /// `str(obj)`, falling back to `repr`.
    pub fn str(&mut self, obj: ObjectId) -> PyResult<String> {
        match self.slots_of(obj)?.str {
            Some(str_) => self.with_recursion_guard(" while getting the str of an object", |rt| str_(rt, obj)),
            None => self.repr(obj),
        }
    }

    /// `repr` for diagnostics: never fails.
    pub fn safe_repr(&mut self, obj: ObjectId) -> String {
        match self.repr(obj) {
            Ok(text) => text,
            Err(_) => format!("<{} object at {obj}>", self.type_name_of(obj)),
        }
    }

    /// `hash(obj)`. Guarded like `repr`, since container hashes recurse into
    /// their items.
    pub fn hash(&mut self, obj: ObjectId) -> PyResult<u32> {
        match self.slots_of(obj)?.hash {
            Some(hash) => self.with_recursion_guard(" while hashing an object", |rt| hash(rt, obj)),
            None => Err(PyErr::type_error(format!(
                "unhashable type: '{}'",
                self.type_name_of(obj)
            ))),
        }
    }

    pub fn call(&mut self, callable: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
        match self.slots_of(callable)?.call {
            Some(call) => call(self, callable, args, kwargs),
            None => Err(PyErr::type_error(format!(
                "'{}' object is not callable",
                self.type_name_of(callable)
            ))),
        }
    }

    /// Copies a container through its `copy` slot.
    pub fn copy(&mut self, obj: ObjectId) -> PyResult<ObjectId> {
        match self.slots_of(obj)?.copy {
            Some(copy) => copy(self, obj),
            None => Err(PyErr::type_error(format!(
                "'{}' object cannot be copied",
                self.type_name_of(obj)
            ))),
        }
    }

    /// `obj[key]`: the mapping slot first, then the sequence slot with an
    /// integer key.
    pub fn get_item(&mut self, obj: ObjectId, key: ObjectId) -> PyResult<ObjectId> {
        let slots = *self.slots_of(obj)?;
        if let Some(subscript) = slots.mapping.subscript {
            return subscript(self, obj, key);
        }
        if let Some(item) = slots.sequence.item {
            let index = self.sequence_index(obj, key)?;
            return item(self, obj, index);
        }
        Err(PyErr::type_error(format!(
            "'{}' object is not subscriptable",
            self.type_name_of(obj)
        )))
    }

    /// `obj[key] = value`.
    pub fn set_item(&mut self, obj: ObjectId, key: ObjectId, value: ObjectId) -> PyResult<()> {
        self.assign_item(obj, key, Some(value), "does not support item assignment")
    }

    /// `del obj[key]`.
    pub fn del_item(&mut self, obj: ObjectId, key: ObjectId) -> PyResult<()> {
        self.assign_item(obj, key, None, "does not support item deletion")
    }

    fn assign_item(&mut self, obj: ObjectId, key: ObjectId, value: Option<ObjectId>, failure: &str) -> PyResult<()> {
        let slots = *self.slots_of(obj)?;
        if let Some(ass_subscript) = slots.mapping.ass_subscript {
            return ass_subscript(self, obj, key, value);
        }
        if let Some(ass_item) = slots.sequence.ass_item {
            let index = self.sequence_index(obj, key)?;
            return ass_item(self, obj, index, value);
        }
        Err(PyErr::type_error(format!(
            "'{}' object {failure}",
            self.type_name_of(obj)
        )))
    }

    fn sequence_index(&mut self, seq: ObjectId, key: ObjectId) -> PyResult<i64> {
        if self.slots_of(key)?.number.index.is_none() {
            return Err(PyErr::type_error(format!(
                "{} indices must be integers, not '{}'",
                self.type_name_of(seq),
                self.type_name_of(key)
            )));
        }
        self.index(key)
    }

    /// `iter(obj)`: the `iter` slot, or a sequence iterator over `item`.
    pub fn iterate(&mut self, obj: ObjectId) -> PyResult<ObjectId> {
        let slots = *self.slots_of(obj)?;
        if let Some(iter) = slots.iter {
            let it = iter(self, obj)?;
            if self.slots_of(it)?.iternext.is_none() {
                let name = self.type_name_of(it);
                self.release(it);
                return Err(PyErr::type_error(format!(
                    "iter() returned non-iterator of type '{name}'"
                )));
            }
            return Ok(it);
        }
        if slots.sequence.item.is_some() {
            return Ok(self.new_seq_iter(obj));
        }
        Err(PyErr::type_error(format!(
            "'{}' object is not iterable",
            self.type_name_of(obj)
        )))
    }

    /// Advances an iterator. `Ok(None)` on exhaustion.
    pub fn next(&mut self, it: ObjectId) -> PyResult<Option<ObjectId>> {
        match self.slots_of(it)?.iternext {
            Some(next) => next(self, it),
            None => Err(PyErr::type_error(format!(
                "'{}' object is not an iterator",
                self.type_name_of(it)
            ))),
        }
    }

    /// `value in container`: the `contains` slot, or a linear scan through
    /// the iteration protocol.
    pub fn contains(&mut self, container: ObjectId, value: ObjectId) -> PyResult<bool> {
        if let Some(contains) = self.slots_of(container)?.sequence.contains {
            return contains(self, container, value);
        }
        let it = self.iterate(container).map_err(|err| {
            if err.is(ErrorKind::TypeError) {
                PyErr::type_error(format!(
                    "argument of type '{}' is not iterable",
                    self.type_name_of(container)
                ))
            } else {
                err
            }
        })?;
        let found = self.scan_for(it, value);
        self.release(it);
        found
    }

    fn scan_for(&mut self, it: ObjectId, value: ObjectId) -> PyResult<bool> {
        while let Some(item) = self.next(it)? {
            let equal = self.equals(item, value);
            self.release(item);
            if equal? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `len(obj)`.
    pub fn measure(&mut self, obj: ObjectId) -> PyResult<usize> {
        let slots = *self.slots_of(obj)?;
        match slots.sequence.length.or(slots.mapping.length) {
            Some(length) => length(self, obj),
            None => Err(PyErr::type_error(format!(
                "object of type '{}' has no len()",
                self.type_name_of(obj)
            ))),
        }
    }

    /// Truth value: `bool`, then `len`, then true.
    pub fn is_true(&mut self, obj: ObjectId) -> PyResult<bool> {
        if obj == self.singletons.true_ {
            return Ok(true);
        }
        if obj == self.singletons.false_ || self.is_none(obj) {
            return Ok(false);
        }
        let slots = *self.slots_of(obj)?;
        if let Some(truth) = slots.number.bool {
            return truth(self, obj);
        }
        match slots.sequence.length.or(slots.mapping.length) {
            Some(length) => Ok(length(self, obj)? > 0),
            None => Ok(true),
        }
    }

    /// `operator.index(obj)` as a machine integer.
    pub fn index(&mut self, obj: ObjectId) -> PyResult<i64> {
        if let Some(value) = int_like(self, obj) {
            return Ok(value);
        }
        let Some(index) = self.slots_of(obj)?.number.index else {
            return Err(PyErr::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                self.type_name_of(obj)
            )));
        };
        let result = index(self, obj)?;
        let value = int_like(self, result);
        let name = self.type_name_of(result);
        self.release(result);
        value.ok_or_else(|| {
            PyErr::type_error(format!("__index__ returned non-int (type {name})"))
        })
    }

    /// `a == b` as a plain boolean, identity implying equality.
    pub fn equals(&mut self, a: ObjectId, b: ObjectId) -> PyResult<bool> {
        self.rich_compare_bool(a, b, crate::types::CompareOp::Eq)
    }

    /// Keys of a mapping as a new list.
    pub fn keys(&mut self, mapping: ObjectId) -> PyResult<ObjectId> {
        let keys = self.slots_of(mapping)?.mapping.keys;
        self.mapping_view(mapping, keys, "keys")
    }

    pub fn values(&mut self, mapping: ObjectId) -> PyResult<ObjectId> {
        let values = self.slots_of(mapping)?.mapping.values;
        self.mapping_view(mapping, values, "values")
    }

    pub fn items(&mut self, mapping: ObjectId) -> PyResult<ObjectId> {
        let items = self.slots_of(mapping)?.mapping.items;
        self.mapping_view(mapping, items, "items")
    }

    fn mapping_view(
        &mut self,
        mapping: ObjectId,
        view: Option<crate::types::slots::UnaryFn>,
        what: &str,
    ) -> PyResult<ObjectId> {
        match view {
            Some(view) => view(self, mapping),
            None => Err(PyErr::attribute_error(format!(
                "'{}' object has no attribute '{what}'",
                self.type_name_of(mapping)
            ))),
        }
    }
}
