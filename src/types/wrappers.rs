//! Slot wrappers: the dunder-named descriptors that expose a native type's
//! operation-table slots as callable attributes (`int.__add__`,
//! `object.__repr__`, ...), and their installation into type namespaces.

use crate::error::PyErr;
use crate::object::ObjectId;
use crate::objects::hash_not_implemented;
use crate::runtime::Runtime;
use crate::types::slots::{HashFn, NewFn};
use crate::types::{BinaryOp, CompareOp, TypeSlots, UnaryOp};
use crate::PyResult;

/// Which slot a wrapper calls, and how its Python-level arguments map onto
/// the slot's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    Repr,
    Str,
    Hash,
    Call,
    Init,
    GetAttr,
    SetAttr,
    DelAttr,
    Iter,
    Next,
    DescrGet,
    DescrSet,
    DescrDelete,
    RichCompare(CompareOp),
    Binary(BinaryOp),
    BinaryReflected(BinaryOp),
    Inplace(BinaryOp),
    Power,
    PowerReflected,
    InplacePower,
    Unary(UnaryOp),
    Bool,
    Index,
    Length,
    GetItem,
    SetItem,
    DelItem,
    Contains,
    Concat,
    Repeat,
    InplaceConcat,
    InplaceRepeat,
    Copy,
    Keys,
    Values,
    Items,
}

fn missing_slot(rt: &Runtime, owner: ObjectId, name: &str) -> PyErr {
    PyErr::system_error(format!(
        "slot wrapper '{name}' of '{}' has no slot to call",
        rt.type_name(owner)
    ))
}

fn expect_args(name: &str, args: &[ObjectId], min: usize, max: usize) -> PyResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {min}")
        } else {
            format!("from {min} to {max}")
        };
        return Err(PyErr::type_error(format!(
            "{name}() takes {expected} argument{} ({} given)",
            if max == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn attr_name(rt: &Runtime, name: ObjectId) -> PyResult<String> {
    rt.str_value(name).map(str::to_string).map_err(|_| {
        PyErr::type_error(format!(
            "attribute name must be string, not '{}'",
            rt.type_name_of(name)
        ))
    })
}

/// `Some(result)` as the result object, `None` as `NotImplemented`.
fn or_not_implemented(rt: &mut Runtime, result: Option<ObjectId>) -> ObjectId {
    match result {
        Some(result) => result,
        None => {
            let sentinel = rt.not_implemented();
            rt.retain(sentinel)
        }
    }
}

/// Invokes `owner`'s native slot for `kind` on `receiver`.
///
/// The slot is taken from `owner`, never from the receiver's own type, so a
/// subclass reaching its base's implementation through the wrapper does not
/// loop back into its own generic slot.
pub(crate) fn call_slot(
    rt: &mut Runtime,
    owner: ObjectId,
    kind: WrapperKind,
    name: &str,
    receiver: ObjectId,
    args: &[ObjectId],
    kwargs: &[(&str, ObjectId)],
) -> PyResult<ObjectId> {
    let slots = rt.type_object(owner)?.slots;
    if !matches!(kind, WrapperKind::Call | WrapperKind::Init) && !kwargs.is_empty() {
        return Err(PyErr::type_error(format!(
            "{name}() takes no keyword arguments"
        )));
    }

    match kind {
        WrapperKind::Repr | WrapperKind::Str => {
            expect_args(name, args, 0, 0)?;
            let f = if kind == WrapperKind::Repr { slots.repr } else { slots.str };
            let f = f.ok_or_else(|| missing_slot(rt, owner, name))?;
            let text = f(rt, receiver)?;
            Ok(rt.new_str(&text))
        }
        WrapperKind::Hash => {
            expect_args(name, args, 0, 0)?;
            let f = slots.hash.ok_or_else(|| missing_slot(rt, owner, name))?;
            let hash = f(rt, receiver)?;
            Ok(rt.new_int(i64::from(hash)))
        }
        WrapperKind::Call => {
            let f = slots.call.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver, args, kwargs)
        }
        WrapperKind::Init => {
            let f = slots.init.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver, args, kwargs)?;
            Ok(rt.none())
        }
        WrapperKind::GetAttr => {
            expect_args(name, args, 1, 1)?;
            let f = slots.getattro.ok_or_else(|| missing_slot(rt, owner, name))?;
            let attr = attr_name(rt, args[0])?;
            f(rt, receiver, &attr)
        }
        WrapperKind::SetAttr | WrapperKind::DelAttr => {
            let set = kind == WrapperKind::SetAttr;
            expect_args(name, args, if set { 2 } else { 1 }, if set { 2 } else { 1 })?;
            let f = slots.setattro.ok_or_else(|| missing_slot(rt, owner, name))?;
            let attr = attr_name(rt, args[0])?;
            f(rt, receiver, &attr, set.then(|| args[1]))?;
            Ok(rt.none())
        }
        WrapperKind::Iter => {
            expect_args(name, args, 0, 0)?;
            let f = slots.iter.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver)
        }
        WrapperKind::Next => {
            expect_args(name, args, 0, 0)?;
            let f = slots.iternext.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver)?.ok_or_else(PyErr::stop_iteration)
        }
        WrapperKind::DescrGet => {
            expect_args(name, args, 1, 2)?;
            let f = slots.descr_get.ok_or_else(|| missing_slot(rt, owner, name))?;
            let instance = Some(args[0]).filter(|&i| !rt.is_none(i));
            let owner_type = match args.get(1).copied().filter(|&t| !rt.is_none(t)) {
                Some(ty) => ty,
                None => match instance {
                    Some(instance) => rt.type_of(instance)?,
                    None => {
                        return Err(PyErr::type_error("__get__(None, None) is invalid"));
                    }
                },
            };
            f(rt, receiver, instance, owner_type)
        }
        WrapperKind::DescrSet | WrapperKind::DescrDelete => {
            let set = kind == WrapperKind::DescrSet;
            expect_args(name, args, if set { 2 } else { 1 }, if set { 2 } else { 1 })?;
            let f = slots.descr_set.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver, args[0], set.then(|| args[1]))?;
            Ok(rt.none())
        }
        WrapperKind::RichCompare(op) => {
            expect_args(name, args, 1, 1)?;
            let f = slots.richcompare.ok_or_else(|| missing_slot(rt, owner, name))?;
            let result = f(rt, receiver, args[0], op)?.map(|b| rt.bool_obj(b));
            Ok(or_not_implemented(rt, result))
        }
        WrapperKind::Binary(op) | WrapperKind::BinaryReflected(op) | WrapperKind::Inplace(op) => {
            expect_args(name, args, 1, 1)?;
            let table = if matches!(kind, WrapperKind::Inplace(_)) {
                slots.number.inplace
            } else {
                slots.number.binary
            };
            let f = table[op.index()].ok_or_else(|| missing_slot(rt, owner, name))?;
            let result = if matches!(kind, WrapperKind::BinaryReflected(_)) {
                f(rt, op, args[0], receiver)?
            } else {
                f(rt, op, receiver, args[0])?
            };
            Ok(or_not_implemented(rt, result))
        }
        WrapperKind::Power | WrapperKind::PowerReflected | WrapperKind::InplacePower => {
            expect_args(name, args, 1, 2)?;
            let f = if kind == WrapperKind::InplacePower {
                slots.number.inplace_power
            } else {
                slots.number.power
            };
            let f = f.ok_or_else(|| missing_slot(rt, owner, name))?;
            let modulus = args.get(1).copied().unwrap_or_else(|| rt.none());
            let result = if kind == WrapperKind::PowerReflected {
                f(rt, args[0], receiver, modulus)?
            } else {
                f(rt, receiver, args[0], modulus)?
            };
            Ok(or_not_implemented(rt, result))
        }
        WrapperKind::Unary(op) => {
            expect_args(name, args, 0, 0)?;
            let f = slots.number.unary[op.index()].ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, op, receiver)
        }
        WrapperKind::Bool => {
            expect_args(name, args, 0, 0)?;
            let f = slots.number.bool.ok_or_else(|| missing_slot(rt, owner, name))?;
            let truth = f(rt, receiver)?;
            Ok(rt.bool_obj(truth))
        }
        WrapperKind::Index => {
            expect_args(name, args, 0, 0)?;
            let f = slots.number.index.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver)
        }
        WrapperKind::Length => {
            expect_args(name, args, 0, 0)?;
            let f = slots
                .sequence
                .length
                .or(slots.mapping.length)
                .ok_or_else(|| missing_slot(rt, owner, name))?;
            let len = f(rt, receiver)?;
            let len = i64::try_from(len).map_err(|_| PyErr::overflow_error("length too large"))?;
            Ok(rt.new_int(len))
        }
        WrapperKind::GetItem => {
            expect_args(name, args, 1, 1)?;
            if let Some(f) = slots.mapping.subscript {
                return f(rt, receiver, args[0]);
            }
            let f = slots.sequence.item.ok_or_else(|| missing_slot(rt, owner, name))?;
            let index = rt.index(args[0])?;
            f(rt, receiver, index)
        }
        WrapperKind::SetItem | WrapperKind::DelItem => {
            let set = kind == WrapperKind::SetItem;
            expect_args(name, args, if set { 2 } else { 1 }, if set { 2 } else { 1 })?;
            let value = set.then(|| args[1]);
            if let Some(f) = slots.mapping.ass_subscript {
                f(rt, receiver, args[0], value)?;
            } else {
                let f = slots.sequence.ass_item.ok_or_else(|| missing_slot(rt, owner, name))?;
                let index = rt.index(args[0])?;
                f(rt, receiver, index, value)?;
            }
            Ok(rt.none())
        }
        WrapperKind::Contains => {
            expect_args(name, args, 1, 1)?;
            let f = slots.sequence.contains.ok_or_else(|| missing_slot(rt, owner, name))?;
            let found = f(rt, receiver, args[0])?;
            Ok(rt.bool_obj(found))
        }
        WrapperKind::Concat | WrapperKind::InplaceConcat => {
            expect_args(name, args, 1, 1)?;
            let f = if kind == WrapperKind::Concat {
                slots.sequence.concat
            } else {
                slots.sequence.inplace_concat
            };
            let f = f.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver, args[0])
        }
        WrapperKind::Repeat | WrapperKind::InplaceRepeat => {
            expect_args(name, args, 1, 1)?;
            let f = if kind == WrapperKind::Repeat {
                slots.sequence.repeat
            } else {
                slots.sequence.inplace_repeat
            };
            let f = f.ok_or_else(|| missing_slot(rt, owner, name))?;
            let count = rt.index(args[0])?;
            f(rt, receiver, count)
        }
        WrapperKind::Copy | WrapperKind::Keys | WrapperKind::Values | WrapperKind::Items => {
            expect_args(name, args, 0, 0)?;
            let f = match kind {
                WrapperKind::Copy => slots.copy,
                WrapperKind::Keys => slots.mapping.keys,
                WrapperKind::Values => slots.mapping.values,
                _ => slots.mapping.items,
            };
            let f = f.ok_or_else(|| missing_slot(rt, owner, name))?;
            f(rt, receiver)
        }
    }
}

/// Whether `slot` is set and differs from the base's.
macro_rules! fresh {
    ($slots:expr, $base:expr, $($field:tt)+) => {
        match ($slots.$($field)+, $base.and_then(|b: &TypeSlots| b.$($field)+)) {
            (Some(f), Some(g)) => !std::ptr::fn_addr_eq(f, g),
            (Some(_), None) => true,
            _ => false,
        }
    };
}

/// The `(name, kind)` wrappers a type contributes: every slot it sets that
/// it does not inherit unchanged from `base`.
pub(crate) fn slot_wrappers(slots: &TypeSlots, base: Option<&TypeSlots>) -> Vec<(String, WrapperKind)> {
    let mut out: Vec<(String, WrapperKind)> = Vec::new();
    let mut add = |name: &str, kind: WrapperKind| out.push((name.to_string(), kind));

    if fresh!(slots, base, repr) {
        add("__repr__", WrapperKind::Repr);
    }
    if fresh!(slots, base, str) {
        add("__str__", WrapperKind::Str);
    }
    if fresh!(slots, base, hash) {
        add("__hash__", WrapperKind::Hash);
    }
    if fresh!(slots, base, call) {
        add("__call__", WrapperKind::Call);
    }
    if fresh!(slots, base, init) {
        add("__init__", WrapperKind::Init);
    }
    if fresh!(slots, base, getattro) {
        add("__getattribute__", WrapperKind::GetAttr);
    }
    if fresh!(slots, base, setattro) {
        add("__setattr__", WrapperKind::SetAttr);
        add("__delattr__", WrapperKind::DelAttr);
    }
    if fresh!(slots, base, iter) {
        add("__iter__", WrapperKind::Iter);
    }
    if fresh!(slots, base, iternext) {
        add("__next__", WrapperKind::Next);
    }
    if fresh!(slots, base, descr_get) {
        add("__get__", WrapperKind::DescrGet);
    }
    if fresh!(slots, base, descr_set) {
        add("__set__", WrapperKind::DescrSet);
        add("__delete__", WrapperKind::DescrDelete);
    }
    if fresh!(slots, base, richcompare) {
        for op in CompareOp::ALL {
            add(op.dunder(), WrapperKind::RichCompare(op));
        }
    }
    for op in BinaryOp::ALL {
        let i = op.index();
        if fresh!(slots, base, number.binary[i]) {
            add(op.dunder(), WrapperKind::Binary(op));
            add(op.reflected_dunder(), WrapperKind::BinaryReflected(op));
        }
        if fresh!(slots, base, number.inplace[i]) {
            add(op.inplace_dunder(), WrapperKind::Inplace(op));
        }
    }
    if fresh!(slots, base, number.power) {
        add("__pow__", WrapperKind::Power);
        add("__rpow__", WrapperKind::PowerReflected);
    }
    if fresh!(slots, base, number.inplace_power) {
        add("__ipow__", WrapperKind::InplacePower);
    }
    for op in UnaryOp::ALL {
        if fresh!(slots, base, number.unary[op.index()]) {
            add(op.dunder(), WrapperKind::Unary(op));
        }
    }
    if fresh!(slots, base, number.bool) {
        add("__bool__", WrapperKind::Bool);
    }
    if fresh!(slots, base, number.index) {
        add("__index__", WrapperKind::Index);
    }
    if fresh!(slots, base, sequence.length) || fresh!(slots, base, mapping.length) {
        add("__len__", WrapperKind::Length);
    }
    if fresh!(slots, base, mapping.subscript) || fresh!(slots, base, sequence.item) {
        add("__getitem__", WrapperKind::GetItem);
    }
    if fresh!(slots, base, mapping.ass_subscript) || fresh!(slots, base, sequence.ass_item) {
        add("__setitem__", WrapperKind::SetItem);
        add("__delitem__", WrapperKind::DelItem);
    }
    if fresh!(slots, base, sequence.contains) {
        add("__contains__", WrapperKind::Contains);
    }
    // Concatenation and repetition share their dunders with the number
    // table; a type with both keeps the numeric wrapper.
    if fresh!(slots, base, sequence.concat) && slots.number.binary[BinaryOp::Add.index()].is_none() {
        add("__add__", WrapperKind::Concat);
    }
    if fresh!(slots, base, sequence.repeat) && slots.number.binary[BinaryOp::Multiply.index()].is_none() {
        add("__mul__", WrapperKind::Repeat);
        add("__rmul__", WrapperKind::Repeat);
    }
    if fresh!(slots, base, sequence.inplace_concat) {
        add("__iadd__", WrapperKind::InplaceConcat);
    }
    if fresh!(slots, base, sequence.inplace_repeat) {
        add("__imul__", WrapperKind::InplaceRepeat);
    }
    if fresh!(slots, base, copy) {
        add("copy", WrapperKind::Copy);
    }
    if fresh!(slots, base, mapping.keys) {
        add("keys", WrapperKind::Keys);
    }
    if fresh!(slots, base, mapping.values) {
        add("values", WrapperKind::Values);
    }
    if fresh!(slots, base, mapping.items) {
        add("items", WrapperKind::Items);
    }
    out
}

/// Installs wrappers for `ty`'s own slots into its namespace. Names already
/// present win. An unhashable type gets `__hash__ = None`.
pub(crate) fn add_operators(rt: &mut Runtime, ty: ObjectId, base: Option<ObjectId>) -> PyResult<()> {
    let slots = rt.type_object(ty)?.slots;
    let base_slots = match base {
        Some(base) => Some(rt.type_object(base)?.slots),
        None => None,
    };
    let dict = rt.type_object(ty)?.dict;

    if let Some(hash) = slots.hash
        && std::ptr::fn_addr_eq(hash, hash_not_implemented as HashFn)
    {
        if rt.dict_get_str(dict, "__hash__")?.is_none() {
            let none = rt.none();
            rt.dict_set_str(dict, "__hash__", none)?;
        }
    }

    for (name, kind) in slot_wrappers(&slots, base_slots.as_ref()) {
        if rt.dict_get_str(dict, &name)?.is_some() {
            continue;
        }
        let wrapper = rt.new_slot_wrapper(ty, &name, kind);
        rt.dict_set_str(dict, &name, wrapper)?;
        rt.release(wrapper);
    }
    Ok(())
}

/// `T.__new__(S, ...)`: a native function running `T`'s constructor slot for
/// the subtype `S`.
pub(crate) fn new_wrapper(rt: &mut Runtime, owner: ObjectId, new: NewFn) -> ObjectId {
    let name = format!("{}.__new__", rt.type_name(owner));
    rt.new_native_function("__new__", move |rt, args, kwargs| {
        let Some((&subtype, rest)) = args.split_first() else {
            return Err(PyErr::type_error(format!("{name}(): not enough arguments")));
        };
        if !rt.is_type(subtype) {
            return Err(PyErr::type_error(format!(
                "{name}(X): X is not a type object ({})",
                rt.type_name_of(subtype)
            )));
        }
        if !rt.is_subtype(subtype, owner) {
            return Err(PyErr::type_error(format!(
                "{name}({sub}): {sub} is not a subtype of {}",
                rt.type_name(owner),
                sub = rt.type_name(subtype)
            )));
        }
        new(rt, subtype, rest, kwargs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use crate::types::BuiltinType;

    #[test]
    fn test_builtin_types_expose_their_slots() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let list = rt.builtin(BuiltinType::List);
        for name in ["__len__", "__getitem__", "__setitem__", "__contains__", "__iadd__", "__repr__"] {
            assert!(rt.lookup(list, name).unwrap().is_some(), "list.{name}");
        }
        let dict = rt.type_object(list).unwrap().dict;
        let hash = rt.dict_get_str(dict, "__hash__").unwrap();
        assert_eq!(hash, Some(rt.none()));

        // Inherited slots are not re-wrapped on the subtype.
        let bool_ = rt.builtin(BuiltinType::Bool);
        let bool_dict = rt.type_object(bool_).unwrap().dict;
        assert!(rt.dict_get_str(bool_dict, "__neg__").unwrap().is_none());
        assert!(rt.dict_get_str(bool_dict, "__and__").unwrap().is_some());
    }

    #[test]
    fn test_wrapper_calls_map_arguments() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let seven = rt.new_int(7);
        let two = rt.new_int(2);

        let rsub = rt.get_attr(seven, "__rsub__").unwrap();
        let r = rt.call(rsub, &[two], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), -5);

        let pow = rt.get_attr(seven, "__pow__").unwrap();
        let five = rt.new_int(5);
        let r = rt.call(pow, &[two, five], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 4);

        let text = rt.new_str("x");
        let add = rt.get_attr(seven, "__add__").unwrap();
        let r = rt.call(add, &[text], &[]).unwrap();
        assert_eq!(r, rt.not_implemented());

        let lt = rt.get_attr(seven, "__lt__").unwrap();
        let r = rt.call(lt, &[two], &[]).unwrap();
        assert_eq!(r, rt.bool_obj(false));

        let err = rt.call(add, &[], &[]).unwrap_err();
        assert_eq!(err.message, "__add__() takes exactly 1 argument (0 given)");
    }

    #[test]
    fn test_sequence_wrappers() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let one = rt.new_int(1);
        let list = rt.new_list(&[one]);
        let len = rt.get_attr(list, "__len__").unwrap();
        let r = rt.call(len, &[], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 1);

        let zero = rt.new_int(0);
        let getitem = rt.get_attr(list, "__getitem__").unwrap();
        let r = rt.call(getitem, &[zero], &[]).unwrap();
        assert_eq!(r, one);

        let text = rt.new_str("ab");
        let two = rt.new_int(2);
        let mul = rt.get_attr(text, "__mul__").unwrap();
        let r = rt.call(mul, &[two], &[]).unwrap();
        assert_eq!(rt.str_value(r).unwrap(), "abab");

        let next = rt.get_attr(list, "__iter__").unwrap();
        let it = rt.call(next, &[], &[]).unwrap();
        let next = rt.get_attr(it, "__next__").unwrap();
        assert_eq!(rt.call(next, &[], &[]).unwrap(), one);
        let err = rt.call(next, &[], &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StopIteration);
    }

    #[test]
    fn test_new_wrapper_checks_subtype() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let int = rt.builtin(BuiltinType::Int);
        let str_ = rt.builtin(BuiltinType::Str);
        let new = rt.get_attr(int, "__new__").unwrap();
        let text = rt.new_str("12");
        let r = rt.call(new, &[int, text], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 12);

        let err = rt.call(new, &[str_, text], &[]).unwrap_err();
        assert_eq!(err.message, "int.__new__(str): str is not a subtype of int");
    }
}
