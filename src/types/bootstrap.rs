//! Start-up of the built-in type table.
//!
//! Type objects are allocated before `type` itself exists, so they are
//! created with a dangling type and patched once every id is known. Slot
//! tables are then inherited field by field from the base and each native
//! slot is exposed in the type's namespace as a slot wrapper.

use log::debug;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::descriptor::{
    classmethod_slots, getset_slots, member_slots, property_slots, staticmethod_slots, wrapper_slots,
};
use crate::objects::dict::dict_slots;
use crate::objects::float::float_slots;
use crate::objects::function::{function_slots, method_slots, native_slots};
use crate::objects::instance::{get_class, object_slots};
use crate::objects::int::{bool_slots, int_slots};
use crate::objects::iter::iter_slots;
use crate::objects::list::list_slots;
use crate::objects::str::str_slots;
use crate::objects::tuple::tuple_slots;
use crate::objects::{cell_slots, none_slots, not_implemented_slots};
use crate::runtime::Runtime;
use crate::types::new_type::type_slots;
use crate::types::wrappers::{add_operators, new_wrapper};
use crate::types::{BuiltinType, BuiltinTypes, Layout, TypeFlags, TypeObject, TypeSlots};
use crate::weakref::weakref_slots;
use crate::PyResult;

fn own_slots(which: BuiltinType) -> TypeSlots {
    match which {
        BuiltinType::Object => object_slots(),
        BuiltinType::Type => type_slots(),
        BuiltinType::NoneType => none_slots(),
        BuiltinType::NotImplementedType => not_implemented_slots(),
        BuiltinType::Int => int_slots(),
        BuiltinType::Bool => bool_slots(),
        BuiltinType::Float => float_slots(),
        BuiltinType::Str => str_slots(),
        BuiltinType::Tuple => tuple_slots(),
        BuiltinType::List => list_slots(),
        BuiltinType::Dict => dict_slots(),
        BuiltinType::Function => function_slots(),
        BuiltinType::BuiltinFunction => native_slots(),
        BuiltinType::Method => method_slots(),
        BuiltinType::Property => property_slots(),
        BuiltinType::StaticMethod => staticmethod_slots(),
        BuiltinType::ClassMethod => classmethod_slots(),
        BuiltinType::MemberDescriptor => member_slots(),
        BuiltinType::GetSetDescriptor => getset_slots(),
        BuiltinType::WrapperDescriptor => wrapper_slots(),
        BuiltinType::WeakRef => weakref_slots(),
        BuiltinType::Iterator => iter_slots(),
        BuiltinType::Cell => cell_slots(),
    }
}

fn base_of(which: BuiltinType) -> Option<BuiltinType> {
    match which {
        BuiltinType::Object => None,
        BuiltinType::Bool => Some(BuiltinType::Int),
        _ => Some(BuiltinType::Object),
    }
}

fn layout_of(which: BuiltinType) -> Layout {
    match which {
        BuiltinType::Object => Layout::Object,
        BuiltinType::Type => Layout::Type,
        _ => Layout::Native,
    }
}

fn flags_of(which: BuiltinType) -> TypeFlags {
    match which {
        BuiltinType::Object | BuiltinType::Type => TypeFlags::BASETYPE | TypeFlags::IMMUTABLE,
        _ => TypeFlags::IMMUTABLE,
    }
}

macro_rules! inherit {
    ($slots:expr, $base:expr, $($field:ident).+) => {
        if $slots.$($field).+.is_none() {
            $slots.$($field).+ = $base.$($field).+;
        }
    };
}

/// Fills every empty slot of `slots` from `base`, except the constructor.
/// Hashing is inherited only together with comparison.
fn inherit_slots(slots: &mut TypeSlots, base: &TypeSlots) {
    if slots.hash.is_none() && slots.richcompare.is_none() {
        slots.hash = base.hash;
        slots.richcompare = base.richcompare;
    }
    inherit!(slots, base, init);
    inherit!(slots, base, finalize);
    inherit!(slots, base, repr);
    inherit!(slots, base, str);
    inherit!(slots, base, compare);
    inherit!(slots, base, call);
    inherit!(slots, base, getattro);
    inherit!(slots, base, setattro);
    inherit!(slots, base, iter);
    inherit!(slots, base, iternext);
    inherit!(slots, base, descr_get);
    inherit!(slots, base, descr_set);
    inherit!(slots, base, copy);

    for (own, inherited) in slots.number.binary.iter_mut().zip(base.number.binary) {
        if own.is_none() {
            *own = inherited;
        }
    }
    for (own, inherited) in slots.number.inplace.iter_mut().zip(base.number.inplace) {
        if own.is_none() {
            *own = inherited;
        }
    }
    for (own, inherited) in slots.number.unary.iter_mut().zip(base.number.unary) {
        if own.is_none() {
            *own = inherited;
        }
    }
    inherit!(slots, base, number.power);
    inherit!(slots, base, number.inplace_power);
    inherit!(slots, base, number.bool);
    inherit!(slots, base, number.index);

    inherit!(slots, base, sequence.length);
    inherit!(slots, base, sequence.concat);
    inherit!(slots, base, sequence.repeat);
    inherit!(slots, base, sequence.item);
    inherit!(slots, base, sequence.ass_item);
    inherit!(slots, base, sequence.contains);
    inherit!(slots, base, sequence.inplace_concat);
    inherit!(slots, base, sequence.inplace_repeat);

    inherit!(slots, base, mapping.length);
    inherit!(slots, base, mapping.subscript);
    inherit!(slots, base, mapping.ass_subscript);
    inherit!(slots, base, mapping.keys);
    inherit!(slots, base, mapping.values);
    inherit!(slots, base, mapping.items);
}

fn type_get_name(rt: &mut Runtime, ty: ObjectId) -> PyResult<ObjectId> {
    let name = rt.type_object(ty)?.name.clone();
    Ok(rt.new_str(&name))
}

fn type_get_bases(rt: &mut Runtime, ty: ObjectId) -> PyResult<ObjectId> {
    let bases = rt.type_object(ty)?.bases.clone();
    Ok(rt.new_tuple(&bases))
}

fn type_get_base(rt: &mut Runtime, ty: ObjectId) -> PyResult<ObjectId> {
    let base = rt.type_object(ty)?.base.unwrap_or_else(|| rt.none());
    Ok(rt.retain(base))
}

fn type_get_mro(rt: &mut Runtime, ty: ObjectId) -> PyResult<ObjectId> {
    let mro = rt.type_object(ty)?.mro.clone();
    Ok(rt.new_tuple(&mro))
}

/// `T.__dict__` is a snapshot; writes must go through attribute assignment
/// so the operation tables stay in sync.
fn type_get_dict(rt: &mut Runtime, ty: ObjectId) -> PyResult<ObjectId> {
    let dict = rt.type_object(ty)?.dict;
    rt.dict_copy(dict)
}

fn install_getsets(rt: &mut Runtime) -> PyResult<()> {
    let object = rt.builtin(BuiltinType::Object);
    let class = rt.new_getset_descriptor(object, "__class__", get_class, None);
    let dict = rt.type_object(object)?.dict;
    rt.dict_set_str(dict, "__class__", class)?;

    let type_ = rt.builtin(BuiltinType::Type);
    let dict = rt.type_object(type_)?.dict;
    let getters: [(&str, crate::objects::descriptor::GetterFn); 5] = [
        ("__name__", type_get_name),
        ("__bases__", type_get_bases),
        ("__base__", type_get_base),
        ("__mro__", type_get_mro),
        ("__dict__", type_get_dict),
    ];
    for (name, get) in getters {
        let descr = rt.new_getset_descriptor(type_, name, get, None);
        rt.dict_set_str(dict, name, descr)?;
    }

    let subclasses = rt.new_native_method("__subclasses__", |rt, args, kwargs| {
        let &[ty] = args else {
            return Err(PyErr::type_error(format!(
                "__subclasses__() takes no arguments ({} given)",
                args.len().saturating_sub(1) + kwargs.len()
            )));
        };
        if !kwargs.is_empty() {
            return Err(PyErr::type_error("__subclasses__() takes no keyword arguments"));
        }
        let live = rt.subclasses(ty)?;
        let list = rt.new_list(&live);
        rt.release_all(live);
        Ok(list)
    });
    rt.dict_set_str(dict, "__subclasses__", subclasses)
}

/// Builds every built-in type, the singletons and the slot wrappers.
pub(crate) fn install(rt: &mut Runtime) -> PyResult<()> {
    let mut ids = [ObjectId::DANGLING; BuiltinType::COUNT];
    for which in BuiltinType::ALL {
        ids[which as usize] = rt.alloc(
            ObjectId::DANGLING,
            ObjectData::Type(Box::new(TypeObject {
                name: which.name().to_string(),
                bases: Vec::new(),
                base: None,
                mro: Vec::new(),
                dict: ObjectId::DANGLING,
                slots: own_slots(which),
                flags: flags_of(which),
                layout: layout_of(which),
                members: Vec::new(),
                subclasses: Vec::new(),
            })),
        );
    }
    let type_ = ids[BuiltinType::Type as usize];
    for &id in &ids {
        rt.heap.get_mut(id)?.ob_type = type_;
    }
    rt.types = BuiltinTypes::new(ids);

    rt.singletons.none = rt.alloc_builtin(BuiltinType::NoneType, ObjectData::None);
    rt.singletons.not_implemented =
        rt.alloc_builtin(BuiltinType::NotImplementedType, ObjectData::NotImplemented);
    rt.singletons.true_ = rt.alloc_builtin(BuiltinType::Bool, ObjectData::Bool(true));
    rt.singletons.false_ = rt.alloc_builtin(BuiltinType::Bool, ObjectData::Bool(false));
    rt.singletons.empty_tuple = rt.alloc_builtin(BuiltinType::Tuple, ObjectData::Tuple(Vec::new()));
    let (low, high) = rt.config.small_int_range;
    rt.singletons.small_int_low = low;
    let small_ints = (low..=high)
        .map(|value| rt.alloc_builtin(BuiltinType::Int, ObjectData::Int(value)))
        .collect();
    rt.singletons.small_ints = small_ints;

    for which in BuiltinType::ALL {
        let ty = rt.builtin(which);
        let dict = rt.new_dict();
        let base = base_of(which).map(|b| rt.builtin(b));
        let mut mro = vec![ty];
        if let Some(base) = base {
            mro.extend(rt.type_object(base)?.mro.iter().copied());
        }
        let base_slots = match base {
            Some(base) => Some(rt.type_object(base)?.slots),
            None => None,
        };
        let t = rt.type_object_mut(ty)?;
        t.dict = dict;
        t.bases = base.into_iter().collect();
        t.base = base;
        t.mro = mro;
        if let Some(base_slots) = base_slots {
            inherit_slots(&mut t.slots, &base_slots);
        }
    }

    install_getsets(rt)?;
    for which in BuiltinType::ALL {
        let ty = rt.builtin(which);
        let base = base_of(which).map(|b| rt.builtin(b));
        let t = rt.type_object(ty)?;
        let (dict, new) = (t.dict, t.slots.new);
        if let Some(new) = new {
            let wrapper = new_wrapper(rt, ty, new);
            rt.dict_set_str(dict, "__new__", wrapper)?;
        }
        add_operators(rt, ty, base)?;
        if let Some(base) = base {
            rt.register_subclass(base, ty)?;
        }
    }

    debug!(
        "bootstrapped {} built-in types and {} small ints",
        BuiltinType::COUNT,
        rt.singletons.small_ints.len()
    );
    Ok(())
}
