//! Generic slots of heap types.
//!
//! A class statement that defines `__add__`, `__len__`, `__repr__` and so on
//! gets one of the functions below in the matching operation-table slot.
//! Each looks the dunder up on the receiver's type at call time, so later
//! assignments to the class namespace are seen without rebuilding anything.

use std::cmp::Ordering;

use log::trace;

use crate::error::{ErrorKind, PyErr};
use crate::object::ObjectId;
use crate::objects::int::int_like;
use crate::objects::{hash_i64, hash_not_implemented};
use crate::protocol::attr::{generic_getattr, type_getattr};
use crate::runtime::Runtime;
use crate::types::slots::{BinaryFn, TernaryFn};
use crate::types::{BinaryOp, CompareOp, TypeSlots, UnaryOp};
use crate::PyResult;

/// Calls `callable`, found on `ty`'s MRO, for the receiver `obj`. Descriptors
/// are bound first; anything else is called without the receiver.
fn call_found(
    rt: &mut Runtime,
    callable: ObjectId,
    obj: ObjectId,
    ty: ObjectId,
    args: &[ObjectId],
    kwargs: &[(&str, ObjectId)],
) -> PyResult<ObjectId> {
    match rt.slots_of(callable)?.descr_get {
        Some(get) => {
            let bound = get(rt, callable, Some(obj), ty)?;
            let result = rt.call(bound, args, kwargs);
            rt.release(bound);
            result
        }
        None => rt.call(callable, args, kwargs),
    }
}

/// `type(obj).name` called on `obj`. `Ok(None)` when the type has no such
/// attribute.
pub(crate) fn call_special(
    rt: &mut Runtime,
    obj: ObjectId,
    name: &str,
    args: &[ObjectId],
    kwargs: &[(&str, ObjectId)],
) -> PyResult<Option<ObjectId>> {
    let ty = rt.type_of(obj)?;
    let Some(callable) = rt.lookup(ty, name)? else {
        return Ok(None);
    };
    let result = call_found(rt, callable, obj, ty, args, kwargs);
    rt.release(callable);
    result.map(Some)
}

/// Like [`call_special`] but a missing method is an `AttributeError`.
fn call_required(rt: &mut Runtime, obj: ObjectId, name: &str, args: &[ObjectId]) -> PyResult<ObjectId> {
    call_special(rt, obj, name, args, &[])?.ok_or_else(|| {
        PyErr::attribute_error(format!(
            "'{}' object has no attribute '{name}'",
            rt.type_name_of(obj)
        ))
    })
}

/// A `NotImplemented` result, or a missing method, becomes `None`.
fn call_declinable(rt: &mut Runtime, obj: ObjectId, name: &str, args: &[ObjectId]) -> PyResult<Option<ObjectId>> {
    let Some(result) = call_special(rt, obj, name, args, &[])? else {
        return Ok(None);
    };
    if result == rt.not_implemented() {
        rt.release(result);
        return Ok(None);
    }
    Ok(Some(result))
}

fn discard(rt: &mut Runtime, result: ObjectId) {
    rt.release(result);
}

fn expect_str(rt: &mut Runtime, result: ObjectId, dunder: &str) -> PyResult<String> {
    let text = rt.str_value(result).map(str::to_string).map_err(|_| {
        PyErr::type_error(format!(
            "{dunder} returned non-string (type {})",
            rt.type_name_of(result)
        ))
    });
    rt.release(result);
    text
}

fn slot_repr(rt: &mut Runtime, obj: ObjectId) -> PyResult<String> {
    let result = call_required(rt, obj, "__repr__", &[])?;
    expect_str(rt, result, "__repr__")
}

fn slot_str(rt: &mut Runtime, obj: ObjectId) -> PyResult<String> {
    let result = call_required(rt, obj, "__str__", &[])?;
    expect_str(rt, result, "__str__")
}

fn slot_hash(rt: &mut Runtime, obj: ObjectId) -> PyResult<u32> {
    let ty = rt.type_of(obj)?;
    if let Some(found) = rt.lookup_borrowed(ty, "__hash__")?
        && rt.is_none(found)
    {
        return hash_not_implemented(rt, obj);
    }
    let result = call_required(rt, obj, "__hash__", &[])?;
    let value = int_like(rt, result);
    rt.release(result);
    value
        .map(hash_i64)
        .ok_or_else(|| PyErr::type_error("__hash__ method should return an integer"))
}

fn slot_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let Some(result) = call_declinable(rt, a, op.dunder(), &[b])? else {
        return Ok(None);
    };
    let truth = rt.is_true(result);
    rt.release(result);
    truth.map(Some)
}

/// Legacy `__cmp__`: a negative, zero or positive integer.
fn slot_compare(rt: &mut Runtime, a: ObjectId, b: ObjectId) -> PyResult<Option<Ordering>> {
    let Some(result) = call_declinable(rt, a, "__cmp__", &[b])? else {
        return Ok(None);
    };
    let value = int_like(rt, result);
    let type_name = rt.type_name_of(result);
    rt.release(result);
    match value {
        Some(v) => Ok(Some(v.cmp(&0))),
        None => Err(PyErr::type_error(format!(
            "__cmp__ should return an int, not '{type_name}'"
        ))),
    }
}

fn slot_call(rt: &mut Runtime, obj: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    call_special(rt, obj, "__call__", args, kwargs)?.ok_or_else(|| {
        PyErr::type_error(format!("'{}' object is not callable", rt.type_name_of(obj)))
    })
}

/// `__getattribute__` when a class overrides it, the default lookup
/// otherwise, then `__getattr__` if the lookup raised `AttributeError`.
fn slot_getattro(rt: &mut Runtime, obj: ObjectId, name: &str) -> PyResult<ObjectId> {
    let ty = rt.type_of(obj)?;
    let custom = rt
        .lookup_owner(ty, "__getattribute__")?
        .is_some_and(|owner| rt.is_heap_type(owner));
    let attempt = if custom {
        let key = rt.intern(name);
        let result = call_required(rt, obj, "__getattribute__", &[key]);
        rt.release(key);
        result
    } else if rt.is_type(obj) {
        type_getattr(rt, obj, name)
    } else {
        generic_getattr(rt, obj, name)
    };

    match attempt {
        Err(err) if err.is(ErrorKind::AttributeError) => {
            if rt.lookup_borrowed(ty, "__getattr__")?.is_none() {
                return Err(err);
            }
            let key = rt.intern(name);
            let result = call_required(rt, obj, "__getattr__", &[key]);
            rt.release(key);
            result
        }
        other => other,
    }
}

fn slot_setattro(rt: &mut Runtime, obj: ObjectId, name: &str, value: Option<ObjectId>) -> PyResult<()> {
    let key = rt.intern(name);
    let result = match value {
        Some(value) => call_required(rt, obj, "__setattr__", &[key, value]),
        None => call_required(rt, obj, "__delattr__", &[key]),
    };
    rt.release(key);
    discard(rt, result?);
    Ok(())
}

fn slot_iter(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    call_special(rt, obj, "__iter__", &[], &[])?.ok_or_else(|| {
        PyErr::type_error(format!("'{}' object is not iterable", rt.type_name_of(obj)))
    })
}

fn slot_iternext(rt: &mut Runtime, obj: ObjectId) -> PyResult<Option<ObjectId>> {
    match call_required(rt, obj, "__next__", &[]) {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is(ErrorKind::StopIteration) => Ok(None),
        Err(err) => Err(err),
    }
}

fn slot_descr_get(rt: &mut Runtime, descr: ObjectId, instance: Option<ObjectId>, owner: ObjectId) -> PyResult<ObjectId> {
    let instance = instance.unwrap_or_else(|| rt.none());
    call_required(rt, descr, "__get__", &[instance, owner])
}

fn slot_descr_set(rt: &mut Runtime, descr: ObjectId, instance: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    let result = match value {
        Some(value) => call_required(rt, descr, "__set__", &[instance, value])?,
        None => call_required(rt, descr, "__delete__", &[instance])?,
    };
    discard(rt, result);
    Ok(())
}

fn slot_init(rt: &mut Runtime, obj: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<()> {
    let Some(result) = call_special(rt, obj, "__init__", args, kwargs)? else {
        return Ok(());
    };
    let is_none = rt.is_none(result);
    let type_name = rt.type_name_of(result);
    rt.release(result);
    if !is_none {
        return Err(PyErr::type_error(format!(
            "__init__() should return None, not '{type_name}'"
        )));
    }
    Ok(())
}

/// `__new__` is an implicit static method: the type is passed explicitly.
fn slot_new(rt: &mut Runtime, ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let Some(found) = rt.lookup(ty, "__new__")? else {
        return Err(PyErr::type_error(format!(
            "cannot create '{}' instances",
            rt.type_name(ty)
        )));
    };
    let callable = match rt.slots_of(found)?.descr_get {
        Some(get) => get(rt, found, None, ty),
        None => Ok(rt.retain(found)),
    };
    rt.release(found);
    let callable = callable?;

    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(ty);
    full.extend_from_slice(args);
    let result = rt.call(callable, &full, kwargs);
    rt.release(callable);
    result
}

fn slot_finalize(rt: &mut Runtime, obj: ObjectId) -> PyResult<()> {
    if let Some(result) = call_special(rt, obj, "__del__", &[], &[])? {
        discard(rt, result);
    }
    Ok(())
}

/// Whether `tb` reaches a different `name` than `ta` does.
fn overrides(rt: &Runtime, ta: ObjectId, tb: ObjectId, name: &str) -> PyResult<bool> {
    Ok(rt.lookup_borrowed(tb, name)? != rt.lookup_borrowed(ta, name)?)
}

/// `a.__op__(b)` / `b.__rop__(a)` for the generic binary slot.
///
/// The slot is reached through either operand. It calls the left method when
/// the left type uses this slot, the reflected method when the right one
/// does, and lets an overriding subclass on the right go first.
fn reflected_dispatch(
    rt: &mut Runtime,
    a: ObjectId,
    b: ObjectId,
    dunder: &str,
    reflected: &str,
    generic_a: bool,
    generic_b: bool,
) -> PyResult<Option<ObjectId>> {
    let ta = rt.type_of(a)?;
    let tb = rt.type_of(b)?;
    let mut do_other = ta != tb && generic_b && rt.lookup_borrowed(tb, reflected)?.is_some();

    if generic_a {
        if do_other && rt.is_subtype(tb, ta) && overrides(rt, ta, tb, reflected)? {
            if let Some(result) = call_declinable(rt, b, reflected, &[a])? {
                return Ok(Some(result));
            }
            do_other = false;
        }
        if let Some(result) = call_declinable(rt, a, dunder, &[b])? {
            return Ok(Some(result));
        }
        if ta == tb {
            return Ok(None);
        }
    }
    if do_other {
        return call_declinable(rt, b, reflected, &[a]);
    }
    Ok(None)
}

fn uses_binary_slot(rt: &Runtime, obj: ObjectId, op: BinaryOp) -> PyResult<bool> {
    Ok(rt.slots_of(obj)?.number.binary[op.index()]
        .is_some_and(|f| std::ptr::fn_addr_eq(f, slot_binary as BinaryFn)))
}

fn uses_power_slot(rt: &Runtime, obj: ObjectId) -> PyResult<bool> {
    Ok(rt.slots_of(obj)?.number.power
        .is_some_and(|f| std::ptr::fn_addr_eq(f, slot_power as TernaryFn)))
}

fn slot_binary(rt: &mut Runtime, op: BinaryOp, a: ObjectId, b: ObjectId) -> PyResult<Option<ObjectId>> {
    let generic_a = uses_binary_slot(rt, a, op)?;
    let generic_b = uses_binary_slot(rt, b, op)?;
    reflected_dispatch(rt, a, b, op.dunder(), op.reflected_dunder(), generic_a, generic_b)
}

fn slot_inplace(rt: &mut Runtime, op: BinaryOp, a: ObjectId, b: ObjectId) -> PyResult<Option<ObjectId>> {
    call_declinable(rt, a, op.inplace_dunder(), &[b])
}

/// Two-argument `pow` dispatches like any binary operator; the
/// three-argument form only asks the left operand.
fn slot_power(rt: &mut Runtime, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<Option<ObjectId>> {
    if rt.is_none(c) {
        let generic_a = uses_power_slot(rt, a)?;
        let generic_b = uses_power_slot(rt, b)?;
        return reflected_dispatch(rt, a, b, "__pow__", "__rpow__", generic_a, generic_b);
    }
    if uses_power_slot(rt, a)? {
        return call_declinable(rt, a, "__pow__", &[b, c]);
    }
    Ok(None)
}

fn slot_inplace_power(rt: &mut Runtime, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<Option<ObjectId>> {
    if rt.is_none(c) {
        call_declinable(rt, a, "__ipow__", &[b])
    } else {
        call_declinable(rt, a, "__ipow__", &[b, c])
    }
}

fn slot_unary(rt: &mut Runtime, op: UnaryOp, a: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, a, op.dunder(), &[])
}

fn slot_bool(rt: &mut Runtime, obj: ObjectId) -> PyResult<bool> {
    let result = call_required(rt, obj, "__bool__", &[])?;
    let value = if result == rt.bool_obj(true) {
        Ok(true)
    } else if result == rt.bool_obj(false) {
        Ok(false)
    } else {
        Err(PyErr::type_error(format!(
            "__bool__ should return bool, returned {}",
            rt.type_name_of(result)
        )))
    };
    rt.release(result);
    value
}

fn slot_index(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, obj, "__index__", &[])
}

fn slot_length(rt: &mut Runtime, obj: ObjectId) -> PyResult<usize> {
    let result = call_required(rt, obj, "__len__", &[])?;
    let len = rt.index(result);
    rt.release(result);
    let len = len?;
    usize::try_from(len).map_err(|_| PyErr::value_error("__len__() should return >= 0"))
}

fn slot_item(rt: &mut Runtime, obj: ObjectId, index: i64) -> PyResult<ObjectId> {
    let key = rt.new_int(index);
    let result = call_required(rt, obj, "__getitem__", &[key]);
    rt.release(key);
    result
}

fn slot_ass_item(rt: &mut Runtime, obj: ObjectId, index: i64, value: Option<ObjectId>) -> PyResult<()> {
    let key = rt.new_int(index);
    let result = slot_ass_subscript(rt, obj, key, value);
    rt.release(key);
    result
}

fn slot_subscript(rt: &mut Runtime, obj: ObjectId, key: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, obj, "__getitem__", &[key])
}

fn slot_ass_subscript(rt: &mut Runtime, obj: ObjectId, key: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    let result = match value {
        Some(value) => call_required(rt, obj, "__setitem__", &[key, value])?,
        None => call_required(rt, obj, "__delitem__", &[key])?,
    };
    discard(rt, result);
    Ok(())
}

fn slot_contains(rt: &mut Runtime, obj: ObjectId, value: ObjectId) -> PyResult<bool> {
    let result = call_required(rt, obj, "__contains__", &[value])?;
    let truth = rt.is_true(result);
    rt.release(result);
    truth
}

fn slot_copy(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, obj, "__copy__", &[])
}

fn slot_keys(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, obj, "keys", &[])
}

fn slot_values(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, obj, "values", &[])
}

fn slot_items(rt: &mut Runtime, obj: ObjectId) -> PyResult<ObjectId> {
    call_required(rt, obj, "items", &[])
}

/// Points the slot that `name` feeds at its generic implementation.
/// Returns false for names that do not correspond to a slot.
fn install(slots: &mut TypeSlots, name: &str, value_is_none: bool) -> bool {
    match name {
        "__new__" => slots.new = Some(slot_new),
        "__init__" => slots.init = Some(slot_init),
        "__del__" => slots.finalize = Some(slot_finalize),
        "__repr__" => slots.repr = Some(slot_repr),
        "__str__" => slots.str = Some(slot_str),
        "__hash__" if value_is_none => slots.hash = Some(hash_not_implemented),
        "__hash__" => slots.hash = Some(slot_hash),
        "__cmp__" => slots.compare = Some(slot_compare),
        "__call__" => slots.call = Some(slot_call),
        "__getattribute__" | "__getattr__" => slots.getattro = Some(slot_getattro),
        "__setattr__" | "__delattr__" => slots.setattro = Some(slot_setattro),
        "__iter__" => slots.iter = Some(slot_iter),
        "__next__" => slots.iternext = Some(slot_iternext),
        "__get__" => slots.descr_get = Some(slot_descr_get),
        "__set__" | "__delete__" => slots.descr_set = Some(slot_descr_set),
        "__pow__" | "__rpow__" => slots.number.power = Some(slot_power),
        "__ipow__" => slots.number.inplace_power = Some(slot_inplace_power),
        "__bool__" => slots.number.bool = Some(slot_bool),
        "__index__" => slots.number.index = Some(slot_index),
        "__len__" => {
            slots.sequence.length = Some(slot_length);
            slots.mapping.length = Some(slot_length);
        }
        "__getitem__" => {
            slots.mapping.subscript = Some(slot_subscript);
            slots.sequence.item = Some(slot_item);
        }
        "__setitem__" | "__delitem__" => {
            slots.mapping.ass_subscript = Some(slot_ass_subscript);
            slots.sequence.ass_item = Some(slot_ass_item);
        }
        "__contains__" => slots.sequence.contains = Some(slot_contains),
        "__copy__" => slots.copy = Some(slot_copy),
        "keys" => slots.mapping.keys = Some(slot_keys),
        "values" => slots.mapping.values = Some(slot_values),
        "items" => slots.mapping.items = Some(slot_items),
        _ if CompareOp::ALL.iter().any(|op| op.dunder() == name) => {
            slots.richcompare = Some(slot_richcompare);
        }
        _ => {
            if let Some(op) = BinaryOp::ALL
                .into_iter()
                .find(|op| op.dunder() == name || op.reflected_dunder() == name)
            {
                slots.number.binary[op.index()] = Some(slot_binary);
            } else if let Some(op) = BinaryOp::ALL.into_iter().find(|op| op.inplace_dunder() == name) {
                slots.number.inplace[op.index()] = Some(slot_inplace);
            } else if let Some(op) = UnaryOp::ALL.into_iter().find(|op| op.dunder() == name) {
                slots.number.unary[op.index()] = Some(slot_unary);
            } else {
                return false;
            }
        }
    }
    true
}

/// Whether assigning `name` on a class can change its operation table.
pub(crate) fn is_slot_name(name: &str) -> bool {
    install(&mut TypeSlots::default(), name, false)
}

/// Rebuilds `ty`'s operation table: the layout base's table, overlaid with
/// the generic slot for every dunder defined by a heap class on the MRO.
/// Nearer classes are applied last so they win.
pub(crate) fn refresh_slots(rt: &mut Runtime, ty: ObjectId) -> PyResult<()> {
    let t = rt.type_object(ty)?;
    let mut slots = match t.base {
        Some(base) => rt.type_object(base)?.slots,
        None => t.slots,
    };
    let mro = t.mro.clone();

    for &klass in mro.iter().rev() {
        if !rt.is_heap_type(klass) {
            continue;
        }
        let dict = rt.type_object(klass)?.dict;
        for (key, value) in rt.dict_str_entries(dict)? {
            install(&mut slots, &key, rt.is_none(value));
        }
    }
    rt.type_object_mut(ty)?.slots = slots;
    Ok(())
}

/// Re-wires `ty` and every live subclass after `name` changed in `ty`'s
/// namespace.
pub(crate) fn update_slot(rt: &mut Runtime, ty: ObjectId, name: &str) -> PyResult<()> {
    if !is_slot_name(name) {
        return Ok(());
    }
    trace!("re-wiring slot {name} of {}", rt.type_name(ty));
    let mut pending = vec![rt.retain(ty)];
    let mut result = Ok(());
    while let Some(klass) = pending.pop() {
        if result.is_ok() {
            result = refresh_slots(rt, klass);
            if result.is_ok() {
                match rt.subclasses(klass) {
                    Ok(subs) => pending.extend(subs),
                    Err(err) => result = Err(err),
                }
            }
        }
        rt.release(klass);
    }
    result
}
