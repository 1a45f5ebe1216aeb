//! Attribute access.
//!
//! Resolution on an instance, in order: a data descriptor found along the
//! type's MRO; the instance dictionary; a non-data descriptor; a plain class
//! attribute. Resolution on a type object looks at the metatype's data
//! descriptors first and binds the type's own descriptors with no instance.

use crate::error::{ErrorKind, PyErr};
use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::PyResult;

/// What the MRO lookup found for a name.
struct ClassAttr {
    /// Owned reference.
    value: ObjectId,
    get: Option<crate::types::slots::DescrGetFn>,
    is_data: bool,
}

fn class_attr(rt: &mut Runtime, ty: ObjectId, name: &str) -> PyResult<Option<ClassAttr>> {
    let Some(value) = rt.lookup(ty, name)? else {
        return Ok(None);
    };
    let slots = rt.slots_of(value)?;
    Ok(Some(ClassAttr {
        value,
        get: slots.descr_get,
        is_data: slots.descr_set.is_some(),
    }))
}

fn no_attribute(rt: &Runtime, obj: ObjectId, name: &str) -> PyErr {
    PyErr::attribute_error(format!(
        "'{}' object has no attribute '{name}'",
        rt.type_name_of(obj)
    ))
}

/// Default `getattro` of instances.
pub(crate) fn generic_getattr(rt: &mut Runtime, obj: ObjectId, name: &str) -> PyResult<ObjectId> {
    let ty = rt.type_of(obj)?;
    let found = class_attr(rt, ty, name)?;

    if let Some(attr) = &found
        && attr.is_data
        && let Some(get) = attr.get
    {
        let result = get(rt, attr.value, Some(obj), ty);
        rt.release(attr.value);
        return result;
    }

    if let Some(dict) = rt.instance_dict(obj)
        && let Some(value) = rt.dict_get_str(dict, name)?
    {
        let value = rt.retain(value);
        if let Some(attr) = found {
            rt.release(attr.value);
        }
        return Ok(value);
    }

    match found {
        Some(ClassAttr {
            value,
            get: Some(get),
            ..
        }) => {
            let result = get(rt, value, Some(obj), ty);
            rt.release(value);
            result
        }
        Some(attr) => Ok(attr.value),
        None => Err(no_attribute(rt, obj, name)),
    }
}

/// Default `setattro` of instances. `None` deletes.
pub(crate) fn generic_setattr(rt: &mut Runtime, obj: ObjectId, name: &str, value: Option<ObjectId>) -> PyResult<()> {
    let ty = rt.type_of(obj)?;
    let found = rt.lookup(ty, name)?;

    if let Some(descr) = found {
        let set = rt.slots_of(descr)?.descr_set;
        if let Some(set) = set {
            let result = set(rt, descr, obj, value);
            rt.release(descr);
            return result;
        }
        rt.release(descr);
    }

    let Some(dict) = rt.instance_dict(obj) else {
        return Err(match found {
            Some(_) => PyErr::attribute_error(format!(
                "'{}' object attribute '{name}' is read-only",
                rt.type_name_of(obj)
            )),
            None => no_attribute(rt, obj, name),
        });
    };
    match value {
        Some(value) => rt.dict_set_str(dict, name, value),
        None => {
            if rt.dict_del_str(dict, name)? {
                Ok(())
            } else {
                Err(no_attribute(rt, obj, name))
            }
        }
    }
}

/// `getattro` of type objects.
pub(crate) fn type_getattr(rt: &mut Runtime, ty: ObjectId, name: &str) -> PyResult<ObjectId> {
    let meta = rt.type_of(ty)?;
    let meta_attr = class_attr(rt, meta, name)?;

    if let Some(attr) = &meta_attr
        && attr.is_data
        && let Some(get) = attr.get
    {
        let result = get(rt, attr.value, Some(ty), meta);
        rt.release(attr.value);
        return result;
    }

    if let Some(attr) = class_attr(rt, ty, name)? {
        if let Some(attr) = &meta_attr {
            rt.release(attr.value);
        }
        return match attr.get {
            Some(get) => {
                let result = get(rt, attr.value, None, ty);
                rt.release(attr.value);
                result
            }
            None => Ok(attr.value),
        };
    }

    match meta_attr {
        Some(ClassAttr {
            value,
            get: Some(get),
            ..
        }) => {
            let result = get(rt, value, Some(ty), meta);
            rt.release(value);
            result
        }
        Some(attr) => Ok(attr.value),
        None => Err(PyErr::attribute_error(format!(
            "type object '{}' has no attribute '{name}'",
            rt.type_name(ty)
        ))),
    }
}

impl Runtime {
    /// `obj.name`.
    pub fn get_attr(&mut self, obj: ObjectId, name: &str) -> PyResult<ObjectId> {
        match self.slots_of(obj)?.getattro {
            Some(getattro) => getattro(self, obj, name),
            None => Err(no_attribute(self, obj, name)),
        }
    }

    /// `obj.name = value`, or `del obj.name` when `value` is `None`.
    pub fn set_attr(&mut self, obj: ObjectId, name: &str, value: Option<ObjectId>) -> PyResult<()> {
        match self.slots_of(obj)?.setattro {
            Some(setattro) => setattro(self, obj, name, value),
            None => {
                let verb = if value.is_some() { "assign to" } else { "del" };
                Err(PyErr::type_error(format!(
                    "'{}' object has no attributes ({verb} .{name})",
                    self.type_name_of(obj)
                )))
            }
        }
    }

    pub fn del_attr(&mut self, obj: ObjectId, name: &str) -> PyResult<()> {
        self.set_attr(obj, name, None)
    }

    /// `hasattr(obj, name)`: only `AttributeError` means "no".
    pub fn has_attr(&mut self, obj: ObjectId, name: &str) -> PyResult<bool> {
        match self.get_attr(obj, name) {
            Ok(value) => {
                self.release(value);
                Ok(true)
            }
            Err(err) if err.is(ErrorKind::AttributeError) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
