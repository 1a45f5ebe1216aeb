//! Instances of `object` and of user-defined classes, plus the operation
//! table of `object` itself.

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::hash_identity;
use crate::runtime::Runtime;
use crate::traversal::Traverse;
use crate::types::slots::{InitFn, NewFn};
use crate::types::{CompareOp, Layout, TypeSlots};
use crate::PyResult;

#[derive(Debug, Default)]
pub struct Instance {
    /// Attribute dictionary, absent for types declaring `__slots__`.
    pub dict: Option<ObjectId>,
    /// Values of the `__slots__` members, in the type's member order.
    pub slots: Vec<Option<ObjectId>>,
}

impl Traverse for Instance {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        self.dict.is_none_or(|id| visit(id)) && self.slots.iter().flatten().all(|&id| visit(id))
    }
}

impl Instance {
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        out.extend(self.dict.take());
        out.extend(self.slots.iter_mut().filter_map(Option::take));
    }
}

impl Runtime {
    /// Attribute dictionary of an instance, borrowed.
    pub fn instance_dict(&self, obj: ObjectId) -> Option<ObjectId> {
        match &self.heap.try_get(obj)?.data {
            ObjectData::Instance(inst) => inst.dict,
            _ => None,
        }
    }

    /// Allocates a bare instance of `ty`, laid out for its members and dict.
    pub(crate) fn new_instance(&mut self, ty: ObjectId) -> PyResult<ObjectId> {
        let t = self.type_object(ty)?;
        let member_count = t.members.len();
        let has_dict = t.has_dict();
        let dict = has_dict.then(|| self.new_dict());
        let instance = Instance {
            dict,
            slots: vec![None; member_count],
        };
        Ok(self.alloc(ty, ObjectData::Instance(instance)))
    }
}

fn has_excess_args(args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> bool {
    !args.is_empty() || !kwargs.is_empty()
}

fn overrides_new(rt: &Runtime, ty: ObjectId) -> bool {
    rt.type_object(ty)
        .map(|t| !t.slots.new.is_some_and(|f| std::ptr::fn_addr_eq(f, object_new as NewFn)))
        .unwrap_or(false)
}

fn overrides_init(rt: &Runtime, ty: ObjectId) -> bool {
    rt.type_object(ty)
        .map(|t| !t.slots.init.is_some_and(|f| std::ptr::fn_addr_eq(f, object_init as InitFn)))
        .unwrap_or(false)
}

/// `object.__new__`. Excess arguments are an error unless the type
/// overrides `__init__` and leaves `__new__` alone.
pub(crate) fn object_new(rt: &mut Runtime, ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if has_excess_args(args, kwargs) {
        if overrides_new(rt, ty) {
            return Err(PyErr::type_error(
                "object.__new__() takes exactly one argument (the type to instantiate)",
            ));
        }
        if !overrides_init(rt, ty) {
            return Err(PyErr::type_error(format!(
                "{}() takes no arguments",
                rt.type_name(ty)
            )));
        }
    }
    if rt.type_object(ty)?.layout != Layout::Object {
        let name = rt.type_name(ty);
        return Err(PyErr::type_error(format!(
            "object.__new__({name}) is not safe, use {name}.__new__()"
        )));
    }
    rt.new_instance(ty)
}

pub(crate) fn object_init(rt: &mut Runtime, obj: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<()> {
    if !has_excess_args(args, kwargs) {
        return Ok(());
    }
    let ty = rt.type_of(obj)?;
    if overrides_init(rt, ty) {
        return Err(PyErr::type_error(
            "object.__init__() takes exactly one argument (the instance to initialize)",
        ));
    }
    if !overrides_new(rt, ty) {
        return Err(PyErr::type_error(format!(
            "{}() takes no arguments",
            rt.type_name(ty)
        )));
    }
    Ok(())
}

fn object_repr(rt: &mut Runtime, obj: ObjectId) -> PyResult<String> {
    Ok(format!("<{} object at {obj}>", rt.type_name_of(obj)))
}

pub(crate) fn object_hash(_rt: &mut Runtime, obj: ObjectId) -> PyResult<u32> {
    Ok(hash_identity(obj))
}

/// Identity equality; everything else is "not applicable". `!=` inverts
/// whatever the type's own `==` answers.
fn object_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    match op {
        CompareOp::Eq => Ok((a == b).then_some(true)),
        CompareOp::Ne => {
            let Some(eq) = rt.slots_of(a)?.richcompare else {
                return Ok(None);
            };
            Ok(eq(rt, a, b, CompareOp::Eq)?.map(|equal| !equal))
        }
        _ => Ok(None),
    }
}

pub(crate) fn object_slots() -> TypeSlots {
    TypeSlots {
        new: Some(object_new),
        init: Some(object_init),
        repr: Some(object_repr),
        hash: Some(object_hash),
        richcompare: Some(object_richcompare),
        getattro: Some(crate::protocol::attr::generic_getattr),
        setattro: Some(crate::protocol::attr::generic_setattr),
        ..TypeSlots::default()
    }
}

/// `obj.__class__`.
pub(crate) fn get_class(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    rt.get_type(obj)
}

/// `obj.__dict__`.
pub(crate) fn get_dict(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    match rt.instance_dict(obj) {
        Some(dict) => Ok(rt.retain(dict)),
        None => Err(PyErr::attribute_error(format!(
            "'{}' object has no attribute '__dict__'",
            rt.type_name_of(obj)
        ))),
    }
}

/// `obj.__dict__ = d` swaps the whole namespace; deleting it is refused.
pub(crate) fn set_dict(rt: &mut Runtime, obj: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    let Some(value) = value else {
        return Err(PyErr::type_error("cannot delete __dict__"));
    };
    if !matches!(rt.heap.get(value)?.data, ObjectData::Dict(_)) {
        return Err(PyErr::type_error(format!(
            "__dict__ must be set to a dictionary, not a '{}'",
            rt.type_name_of(value)
        )));
    }
    rt.retain(value);
    let old = match &mut rt.heap.get_mut(obj)?.data {
        ObjectData::Instance(inst) if inst.dict.is_some() => inst.dict.replace(value),
        _ => None,
    };
    match old {
        Some(old) => {
            rt.release(old);
            Ok(())
        }
        None => {
            rt.release(value);
            Err(PyErr::attribute_error(format!(
                "'{}' object has no attribute '__dict__'",
                rt.type_name_of(obj)
            )))
        }
    }
}
