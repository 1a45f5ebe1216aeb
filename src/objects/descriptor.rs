//! Attribute descriptors: properties, static and class methods, per-instance
//! member slots, native getsets and the wrappers that expose operation-table
//! slots under their dunder names.

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::runtime::Runtime;
use crate::traversal::Traverse;
use crate::types::wrappers::{self, WrapperKind};
use crate::types::{BuiltinType, TypeSlots};
use crate::PyResult;

pub type GetterFn = fn(&mut Runtime, ObjectId) -> PyResult<ObjectId>;
/// `None` as the value deletes.
pub type SetterFn = fn(&mut Runtime, ObjectId, Option<ObjectId>) -> PyResult<()>;

#[derive(Debug)]
pub enum Descriptor {
    Property {
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
        deleter: Option<ObjectId>,
    },
    StaticMethod(Option<ObjectId>),
    ClassMethod(Option<ObjectId>),
    /// One per-instance storage slot declared through `__slots__`.
    Member {
        name: String,
        owner: Option<ObjectId>,
        index: usize,
    },
    GetSet {
        name: String,
        owner: Option<ObjectId>,
        get: GetterFn,
        set: Option<SetterFn>,
    },
    /// Exposes `owner`'s native slot under a dunder name.
    SlotWrapper {
        name: String,
        owner: Option<ObjectId>,
        kind: WrapperKind,
    },
}

impl Traverse for Descriptor {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        match self {
            Descriptor::Property {
                getter,
                setter,
                deleter,
            } => [getter, setter, deleter]
                .into_iter()
                .flatten()
                .all(|&id| visit(id)),
            Descriptor::StaticMethod(func) | Descriptor::ClassMethod(func) => {
                func.is_none_or(|id| visit(id))
            }
            Descriptor::Member { owner, .. }
            | Descriptor::GetSet { owner, .. }
            | Descriptor::SlotWrapper { owner, .. } => owner.is_none_or(|id| visit(id)),
        }
    }
}

impl Descriptor {
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        match self {
            Descriptor::Property {
                getter,
                setter,
                deleter,
            } => {
                out.extend(getter.take());
                out.extend(setter.take());
                out.extend(deleter.take());
            }
            Descriptor::StaticMethod(func) | Descriptor::ClassMethod(func) => out.extend(func.take()),
            Descriptor::Member { owner, .. }
            | Descriptor::GetSet { owner, .. }
            | Descriptor::SlotWrapper { owner, .. } => out.extend(owner.take()),
        }
    }
}

impl Runtime {
    fn alloc_descriptor(&mut self, which: BuiltinType, descr: Descriptor) -> ObjectId {
        self.alloc_builtin(which, ObjectData::Descriptor(descr))
    }

    fn retain_opt(&mut self, id: Option<ObjectId>) -> Option<ObjectId> {
        let id = id.filter(|&id| !self.is_none(id));
        id.map(|id| self.retain(id))
    }

    /// `property(getter, setter, deleter)`; `None` entries (or the `None`
    /// object) leave that access unsupported.
    pub fn new_property(
        &mut self,
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
        deleter: Option<ObjectId>,
    ) -> ObjectId {
        let descr = Descriptor::Property {
            getter: self.retain_opt(getter),
            setter: self.retain_opt(setter),
            deleter: self.retain_opt(deleter),
        };
        self.alloc_descriptor(BuiltinType::Property, descr)
    }

    pub fn new_staticmethod(&mut self, func: ObjectId) -> ObjectId {
        self.retain(func);
        self.alloc_descriptor(BuiltinType::StaticMethod, Descriptor::StaticMethod(Some(func)))
    }

    pub fn new_classmethod(&mut self, func: ObjectId) -> ObjectId {
        self.retain(func);
        self.alloc_descriptor(BuiltinType::ClassMethod, Descriptor::ClassMethod(Some(func)))
    }

    pub(crate) fn new_member_descriptor(&mut self, owner: ObjectId, name: &str, index: usize) -> ObjectId {
        self.retain(owner);
        self.alloc_descriptor(
            BuiltinType::MemberDescriptor,
            Descriptor::Member {
                name: name.to_string(),
                owner: Some(owner),
                index,
            },
        )
    }

    pub(crate) fn new_getset_descriptor(
        &mut self,
        owner: ObjectId,
        name: &str,
        get: GetterFn,
        set: Option<SetterFn>,
    ) -> ObjectId {
        self.retain(owner);
        self.alloc_descriptor(
            BuiltinType::GetSetDescriptor,
            Descriptor::GetSet {
                name: name.to_string(),
                owner: Some(owner),
                get,
                set,
            },
        )
    }

    pub(crate) fn new_slot_wrapper(&mut self, owner: ObjectId, name: &str, kind: WrapperKind) -> ObjectId {
        self.retain(owner);
        self.alloc_descriptor(
            BuiltinType::WrapperDescriptor,
            Descriptor::SlotWrapper {
                name: name.to_string(),
                owner: Some(owner),
                kind,
            },
        )
    }

    pub(crate) fn descriptor(&self, descr: ObjectId) -> PyResult<&Descriptor> {
        match &self.heap.get(descr)?.data {
            ObjectData::Descriptor(d) => Ok(d),
            _ => Err(PyErr::system_error(format!(
                "expected a descriptor, got '{}'",
                self.type_name_of(descr)
            ))),
        }
    }
}

fn owner_name(rt: &Runtime, owner: Option<ObjectId>) -> String {
    owner.map(|ty| rt.type_name(ty)).unwrap_or_else(|| "?".to_string())
}

fn property_parts(rt: &Runtime, descr: ObjectId) -> PyResult<[Option<ObjectId>; 3]> {
    match rt.descriptor(descr)? {
        Descriptor::Property {
            getter,
            setter,
            deleter,
        } => Ok([*getter, *setter, *deleter]),
        _ => Err(PyErr::system_error("expected a property")),
    }
}

fn property_get(rt: &mut Runtime, descr: ObjectId, instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    let Some(instance) = instance.filter(|&i| !rt.is_none(i)) else {
        return Ok(rt.retain(descr));
    };
    let [getter, _, _] = property_parts(rt, descr)?;
    let Some(getter) = getter else {
        return Err(PyErr::attribute_error(format!(
            "property of '{}' object has no getter",
            rt.type_name_of(instance)
        )));
    };
    rt.call(getter, &[instance], &[])
}

fn property_set(rt: &mut Runtime, descr: ObjectId, instance: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    let [_, setter, deleter] = property_parts(rt, descr)?;
    let (func, args, missing) = match value {
        Some(value) => (setter, vec![instance, value], "setter"),
        None => (deleter, vec![instance], "deleter"),
    };
    let Some(func) = func else {
        return Err(PyErr::attribute_error(format!(
            "property of '{}' object has no {missing}",
            rt.type_name_of(instance)
        )));
    };
    let result = rt.call(func, &args, &[])?;
    rt.release(result);
    Ok(())
}

/// `property(fget=None, fset=None, fdel=None)`.
fn property_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if args.len() > 3 {
        return Err(PyErr::type_error(format!(
            "property() takes at most 3 arguments ({} given)",
            args.len()
        )));
    }
    let mut parts = [None; 3];
    for (slot, &arg) in parts.iter_mut().zip(args) {
        *slot = Some(arg);
    }
    for &(name, value) in kwargs {
        let index = match name {
            "fget" => 0,
            "fset" => 1,
            "fdel" => 2,
            _ => {
                return Err(PyErr::type_error(format!(
                    "property() got an unexpected keyword argument '{name}'"
                )));
            }
        };
        parts[index] = Some(value);
    }
    Ok(rt.new_property(parts[0], parts[1], parts[2]))
}

fn property_repr(_rt: &mut Runtime, descr: ObjectId) -> PyResult<String> {
    Ok(format!("<property object at {descr}>"))
}

pub(crate) fn property_slots() -> TypeSlots {
    TypeSlots {
        new: Some(property_new),
        repr: Some(property_repr),
        descr_get: Some(property_get),
        descr_set: Some(property_set),
        ..TypeSlots::default()
    }
}

fn wrapped_callable(rt: &Runtime, descr: ObjectId) -> PyResult<ObjectId> {
    match rt.descriptor(descr)? {
        Descriptor::StaticMethod(Some(func)) | Descriptor::ClassMethod(Some(func)) => Ok(*func),
        _ => Err(PyErr::runtime_error("uninitialized method wrapper")),
    }
}

fn single_callable_arg(name: &str, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    match (args, kwargs) {
        ([func], []) => Ok(*func),
        _ => Err(PyErr::type_error(format!(
            "{name} expected 1 argument, got {}",
            args.len() + kwargs.len()
        ))),
    }
}

fn staticmethod_get(rt: &mut Runtime, descr: ObjectId, _instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    let func = wrapped_callable(rt, descr)?;
    Ok(rt.retain(func))
}

fn staticmethod_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let func = single_callable_arg("staticmethod", args, kwargs)?;
    Ok(rt.new_staticmethod(func))
}

fn staticmethod_repr(_rt: &mut Runtime, descr: ObjectId) -> PyResult<String> {
    Ok(format!("<staticmethod object at {descr}>"))
}

pub(crate) fn staticmethod_slots() -> TypeSlots {
    TypeSlots {
        new: Some(staticmethod_new),
        repr: Some(staticmethod_repr),
        descr_get: Some(staticmethod_get),
        ..TypeSlots::default()
    }
}

fn classmethod_get(rt: &mut Runtime, descr: ObjectId, instance: Option<ObjectId>, owner: ObjectId) -> PyResult<ObjectId> {
    let func = wrapped_callable(rt, descr)?;
    let klass = match instance {
        Some(instance) if !rt.is_none(instance) => rt.type_of(instance)?,
        _ => owner,
    };
    Ok(rt.new_bound_method(func, klass))
}

fn classmethod_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let func = single_callable_arg("classmethod", args, kwargs)?;
    Ok(rt.new_classmethod(func))
}

fn classmethod_repr(_rt: &mut Runtime, descr: ObjectId) -> PyResult<String> {
    Ok(format!("<classmethod object at {descr}>"))
}

pub(crate) fn classmethod_slots() -> TypeSlots {
    TypeSlots {
        new: Some(classmethod_new),
        repr: Some(classmethod_repr),
        descr_get: Some(classmethod_get),
        ..TypeSlots::default()
    }
}

fn member_parts(rt: &Runtime, descr: ObjectId) -> PyResult<(String, Option<ObjectId>, usize)> {
    match rt.descriptor(descr)? {
        Descriptor::Member { name, owner, index } => Ok((name.clone(), *owner, *index)),
        _ => Err(PyErr::system_error("expected a member descriptor")),
    }
}

/// Checks that `instance` is laid out by a subtype of the member's owner.
fn check_member_target(rt: &Runtime, name: &str, owner: Option<ObjectId>, instance: ObjectId) -> PyResult<()> {
    let applies = owner.is_some_and(|owner| rt.is_instance(instance, owner));
    if applies {
        return Ok(());
    }
    Err(PyErr::type_error(format!(
        "descriptor '{name}' for '{}' objects doesn't apply to a '{}' object",
        owner_name(rt, owner),
        rt.type_name_of(instance)
    )))
}

fn member_get(rt: &mut Runtime, descr: ObjectId, instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    let Some(instance) = instance.filter(|&i| !rt.is_none(i)) else {
        return Ok(rt.retain(descr));
    };
    let (name, owner, index) = member_parts(rt, descr)?;
    check_member_target(rt, &name, owner, instance)?;
    let value = match &rt.heap.get(instance)?.data {
        ObjectData::Instance(inst) => inst.slots.get(index).copied().flatten(),
        _ => None,
    };
    match value {
        Some(value) => Ok(rt.retain(value)),
        None => Err(PyErr::attribute_error(format!(
            "'{}' object has no attribute '{name}'",
            rt.type_name_of(instance)
        ))),
    }
}

fn member_set(rt: &mut Runtime, descr: ObjectId, instance: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    let (name, owner, index) = member_parts(rt, descr)?;
    check_member_target(rt, &name, owner, instance)?;
    if let Some(value) = value {
        rt.retain(value);
    }
    let type_name = rt.type_name_of(instance);
    let old = match &mut rt.heap.get_mut(instance)?.data {
        ObjectData::Instance(inst) if index < inst.slots.len() => {
            Some(std::mem::replace(&mut inst.slots[index], value))
        }
        _ => None,
    };
    let Some(old) = old else {
        if let Some(value) = value {
            rt.release(value);
        }
        return Err(PyErr::system_error(format!(
            "member '{name}' is out of range for '{type_name}'"
        )));
    };
    match (old, value) {
        (Some(old), _) => {
            rt.release(old);
            Ok(())
        }
        (None, Some(_)) => Ok(()),
        (None, None) => Err(PyErr::attribute_error(format!(
            "'{type_name}' object has no attribute '{name}'"
        ))),
    }
}

fn member_repr(rt: &mut Runtime, descr: ObjectId) -> PyResult<String> {
    let (name, owner, _) = member_parts(rt, descr)?;
    Ok(format!("<member '{name}' of '{}' objects>", owner_name(rt, owner)))
}

pub(crate) fn member_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(member_repr),
        descr_get: Some(member_get),
        descr_set: Some(member_set),
        ..TypeSlots::default()
    }
}

fn getset_parts(rt: &Runtime, descr: ObjectId) -> PyResult<(String, Option<ObjectId>, GetterFn, Option<SetterFn>)> {
    match rt.descriptor(descr)? {
        Descriptor::GetSet {
            name,
            owner,
            get,
            set,
        } => Ok((name.clone(), *owner, *get, *set)),
        _ => Err(PyErr::system_error("expected a getset descriptor")),
    }
}

fn getset_get(rt: &mut Runtime, descr: ObjectId, instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    let Some(instance) = instance.filter(|&i| !rt.is_none(i)) else {
        return Ok(rt.retain(descr));
    };
    let (_, _, get, _) = getset_parts(rt, descr)?;
    get(rt, instance)
}

fn getset_set(rt: &mut Runtime, descr: ObjectId, instance: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    let (name, owner, _, set) = getset_parts(rt, descr)?;
    match set {
        Some(set) => set(rt, instance, value),
        None => Err(PyErr::attribute_error(format!(
            "attribute '{name}' of '{}' objects is not writable",
            owner_name(rt, owner)
        ))),
    }
}

fn getset_repr(rt: &mut Runtime, descr: ObjectId) -> PyResult<String> {
    let (name, owner, _, _) = getset_parts(rt, descr)?;
    Ok(format!("<attribute '{name}' of '{}' objects>", owner_name(rt, owner)))
}

pub(crate) fn getset_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(getset_repr),
        descr_get: Some(getset_get),
        descr_set: Some(getset_set),
        ..TypeSlots::default()
    }
}

fn wrapper_parts(rt: &Runtime, descr: ObjectId) -> PyResult<(String, ObjectId, WrapperKind)> {
    match rt.descriptor(descr)? {
        Descriptor::SlotWrapper {
            name,
            owner: Some(owner),
            kind,
        } => Ok((name.clone(), *owner, *kind)),
        _ => Err(PyErr::system_error("expected a slot wrapper")),
    }
}

fn wrapper_get(rt: &mut Runtime, descr: ObjectId, instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    Ok(match instance {
        Some(instance) if !rt.is_none(instance) => rt.new_bound_method(descr, instance),
        _ => rt.retain(descr),
    })
}

/// Calling a slot wrapper: the first positional argument is the receiver.
fn wrapper_call(rt: &mut Runtime, descr: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let (name, owner, kind) = wrapper_parts(rt, descr)?;
    let Some((&receiver, rest)) = args.split_first() else {
        return Err(PyErr::type_error(format!(
            "descriptor '{name}' of '{}' object needs an argument",
            rt.type_name(owner)
        )));
    };
    if !rt.is_instance(receiver, owner) {
        return Err(PyErr::type_error(format!(
            "descriptor '{name}' requires a '{}' object but received a '{}'",
            rt.type_name(owner),
            rt.type_name_of(receiver)
        )));
    }
    wrappers::call_slot(rt, owner, kind, &name, receiver, rest, kwargs)
}

fn wrapper_repr(rt: &mut Runtime, descr: ObjectId) -> PyResult<String> {
    let (name, owner, _) = wrapper_parts(rt, descr)?;
    Ok(format!("<slot wrapper '{name}' of '{}' objects>", rt.type_name(owner)))
}

pub(crate) fn wrapper_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(wrapper_repr),
        call: Some(wrapper_call),
        descr_get: Some(wrapper_get),
        ..TypeSlots::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use crate::testing::{make_class, make_method};

    #[test]
    fn test_property_get_set_delete() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let getter = make_method(&mut rt, "get", |rt, _args| Ok(rt.new_int(7)));
        let prop = rt.new_property(Some(getter), None, None);
        let class = make_class(&mut rt, "P", &[], &[("value", prop)]);
        let obj = rt.call(class, &[], &[]).unwrap();

        let value = rt.get_attr(obj, "value").unwrap();
        assert_eq!(rt.int_value(value).unwrap(), 7);
        let one = rt.new_int(1);
        let err = rt.set_attr(obj, "value", Some(one)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeError);
        assert_eq!(err.message, "property of 'P' object has no setter");
        let err = rt.set_attr(obj, "value", None).unwrap_err();
        assert_eq!(err.message, "property of 'P' object has no deleter");

        let through_class = rt.get_attr(class, "value").unwrap();
        assert_eq!(through_class, prop);
    }

    #[test]
    fn test_static_and_class_methods() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let body = make_method(&mut rt, "who", |rt, args| Ok(rt.new_int(args.len() as i64)));
        let sm = rt.new_staticmethod(body);
        let cm = rt.new_classmethod(body);
        let class = make_class(&mut rt, "C", &[], &[("s", sm), ("c", cm)]);
        let obj = rt.call(class, &[], &[]).unwrap();

        let s = rt.get_attr(obj, "s").unwrap();
        assert_eq!(s, body);
        let r = rt.call(s, &[], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 0);

        let c = rt.get_attr(obj, "c").unwrap();
        let r = rt.call(c, &[], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 1);
        assert_eq!(rt.repr(c).unwrap(), "<bound method type.who of <class 'C'>>");
    }

    #[test]
    fn test_slot_wrapper_exposes_native_slot() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let int = rt.builtin(BuiltinType::Int);
        let add = rt.lookup(int, "__add__").unwrap().unwrap();
        assert_eq!(rt.repr(add).unwrap(), "<slot wrapper '__add__' of 'int' objects>");

        let two = rt.new_int(2);
        let three = rt.new_int(3);
        let r = rt.call(add, &[two, three], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 5);

        let bound = rt.get_attr(two, "__add__").unwrap();
        let r = rt.call(bound, &[three], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 5);

        let text = rt.new_str("x");
        let err = rt.call(add, &[text, three], &[]).unwrap_err();
        assert_eq!(
            err.message,
            "descriptor '__add__' requires a 'int' object but received a 'str'"
        );
    }
}
