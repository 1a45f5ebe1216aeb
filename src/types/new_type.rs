//! Runtime class creation (`type(name, bases, namespace)`) and the operation
//! table of `type` itself.

use log::debug;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::instance::{get_dict, set_dict};
use crate::objects::tuple::collect_iterable;
use crate::protocol::attr::type_getattr;
use crate::runtime::Runtime;
use crate::types::mro::linearize;
use crate::types::slot_dispatch::{refresh_slots, update_slot};
use crate::types::{BuiltinType, TypeFlags, TypeObject, TypeSlots};
use crate::PyResult;

/// What `__slots__` asked for.
struct SlotSpec {
    members: Vec<String>,
    wants_dict: bool,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

impl Runtime {
    /// `class name(*bases): namespace` with `type` as the metaclass.
    ///
    /// `bases` and `namespace` are borrowed; the namespace is copied. The
    /// new type is returned as a new reference.
    pub fn new_type(&mut self, name: &str, bases: &[ObjectId], namespace: ObjectId) -> PyResult<ObjectId> {
        let meta = self.builtin(BuiltinType::Type);
        self.new_type_with_meta(meta, name, bases, namespace)
    }

    pub fn new_type_with_meta(
        &mut self,
        meta: ObjectId,
        name: &str,
        bases: &[ObjectId],
        namespace: ObjectId,
    ) -> PyResult<ObjectId> {
        let object = self.builtin(BuiltinType::Object);
        let bases: Vec<ObjectId> = if bases.is_empty() { vec![object] } else { bases.to_vec() };
        self.check_bases(&bases)?;

        let meta = self.winning_metatype(meta, &bases)?;
        let base = self.best_base(&bases)?;
        let base_type = self.type_object(base)?;
        let base_has_dict = base_type.has_dict();
        let base_layout = base_type.layout;
        let mut members = base_type.members.clone();
        let inherited_members = members.len();

        let spec = self.slot_spec(namespace)?;
        let has_dict = match &spec {
            None => true,
            Some(spec) => {
                if spec.wants_dict && base_has_dict {
                    return Err(PyErr::type_error(
                        "__dict__ slot disallowed: we already got one",
                    ));
                }
                base_has_dict || spec.wants_dict
            }
        };
        if let Some(spec) = &spec {
            for member in &spec.members {
                if self.dict_get_str(namespace, member)?.is_some() {
                    return Err(PyErr::value_error(format!(
                        "'{member}' in __slots__ conflicts with class variable"
                    )));
                }
                if members.contains(member) {
                    return Err(PyErr::type_error(format!(
                        "duplicate member '{member}' in __slots__"
                    )));
                }
                members.push(member.clone());
            }
        }
        let mro_tail = linearize(self, &bases)?;

        let dict = self.prepare_namespace(namespace)?;
        let mut flags = TypeFlags::HEAPTYPE | TypeFlags::BASETYPE;
        if has_dict {
            flags.insert(TypeFlags::HAS_DICT);
        }

        for &b in bases.iter().chain(&mro_tail) {
            self.retain(b);
        }
        let ty = self.alloc(
            meta,
            ObjectData::Type(Box::new(TypeObject {
                name: name.to_string(),
                bases: bases.clone(),
                base: Some(base),
                mro: Vec::new(),
                dict,
                slots: TypeSlots::default(),
                flags,
                layout: base_layout,
                members: members.clone(),
                subclasses: Vec::new(),
            })),
        );
        match self.type_object_mut(ty) {
            Ok(t) => {
                t.mro.reserve(mro_tail.len() + 1);
                t.mro.push(ty);
                t.mro.extend(mro_tail);
            }
            Err(err) => {
                self.release(ty);
                return Err(err);
            }
        }

        if let Err(err) = self.finish_type(ty, dict, &members[inherited_members..], has_dict && !base_has_dict, &bases) {
            self.release(ty);
            return Err(err);
        }
        debug!("created type {name} with {} base(s)", bases.len());
        Ok(ty)
    }

    fn finish_type(
        &mut self,
        ty: ObjectId,
        dict: ObjectId,
        new_members: &[String],
        add_dict_descriptor: bool,
        bases: &[ObjectId],
    ) -> PyResult<()> {
        let inherited = self.type_object(ty)?.members.len() - new_members.len();
        for (offset, member) in new_members.iter().enumerate() {
            let descr = self.new_member_descriptor(ty, member, inherited + offset);
            let stored = self.dict_set_str(dict, member, descr);
            self.release(descr);
            stored?;
        }
        if add_dict_descriptor && self.dict_get_str(dict, "__dict__")?.is_none() {
            let descr = self.new_getset_descriptor(ty, "__dict__", get_dict, Some(set_dict));
            let stored = self.dict_set_str(dict, "__dict__", descr);
            self.release(descr);
            stored?;
        }
        refresh_slots(self, ty)?;
        for &base in bases {
            self.register_subclass(base, ty)?;
        }
        Ok(())
    }

    fn check_bases(&self, bases: &[ObjectId]) -> PyResult<()> {
        for (i, &base) in bases.iter().enumerate() {
            let Ok(t) = self.type_object(base) else {
                return Err(PyErr::type_error(format!(
                    "bases must be types, not '{}'",
                    self.type_name_of(base)
                )));
            };
            if !t.flags.contains(TypeFlags::BASETYPE) {
                return Err(PyErr::type_error(format!(
                    "type '{}' is not an acceptable base type",
                    t.name
                )));
            }
            if bases[..i].contains(&base) {
                return Err(PyErr::type_error(format!("duplicate base class {}", t.name)));
            }
        }
        Ok(())
    }

    /// The most derived metatype among `meta` and the bases' metatypes.
    fn winning_metatype(&self, meta: ObjectId, bases: &[ObjectId]) -> PyResult<ObjectId> {
        let mut winner = meta;
        for &base in bases {
            let candidate = self.type_of(base)?;
            if self.is_subtype(winner, candidate) {
                continue;
            }
            if self.is_subtype(candidate, winner) {
                winner = candidate;
                continue;
            }
            return Err(PyErr::type_error(
                "metaclass conflict: the metaclass of a derived class must be a \
                 (non-strict) subclass of the metaclasses of all its bases",
            ));
        }
        Ok(winner)
    }

    /// Nearest ancestor of `ty` that changes the instance layout: declares
    /// members or switches payload kind.
    fn solid_base(&self, ty: ObjectId) -> PyResult<ObjectId> {
        let t = self.type_object(ty)?;
        let Some(base) = t.base else {
            return Ok(ty);
        };
        let b = self.type_object(base)?;
        if t.members.len() != b.members.len() || t.layout != b.layout {
            Ok(ty)
        } else {
            self.solid_base(base)
        }
    }

    /// The base whose solid base descends from every other base's.
    fn best_base(&self, bases: &[ObjectId]) -> PyResult<ObjectId> {
        // (solid base, declared base)
        let mut winner: Option<(ObjectId, ObjectId)> = None;
        for &base in bases {
            let candidate = self.solid_base(base)?;
            match winner {
                None => winner = Some((candidate, base)),
                Some((solid, _)) if self.is_subtype(solid, candidate) => {}
                Some((solid, _)) if self.is_subtype(candidate, solid) => {
                    winner = Some((candidate, base));
                }
                Some(_) => {
                    return Err(PyErr::type_error(
                        "multiple bases have instance lay-out conflict",
                    ));
                }
            }
        }
        winner
            .map(|(_, base)| base)
            .ok_or_else(|| PyErr::system_error("best base of an empty base list"))
    }

    fn slot_spec(&mut self, namespace: ObjectId) -> PyResult<Option<SlotSpec>> {
        let Some(declared) = self.dict_get_str(namespace, "__slots__")? else {
            return Ok(None);
        };
        let names = if self.is_str(declared) {
            vec![self.retain(declared)]
        } else {
            collect_iterable(self, declared)?
        };

        let mut spec = SlotSpec {
            members: Vec::new(),
            wants_dict: false,
        };
        let mut result = Ok(());
        for &name in &names {
            let Ok(text) = self.str_value(name) else {
                result = Err(PyErr::type_error(format!(
                    "__slots__ items must be strings, not '{}'",
                    self.type_name_of(name)
                )));
                break;
            };
            if !is_identifier(text) {
                result = Err(PyErr::type_error("__slots__ must be identifiers"));
                break;
            }
            if text == "__dict__" {
                if spec.wants_dict {
                    result = Err(PyErr::type_error("__dict__ slot disallowed: we already got one"));
                    break;
                }
                spec.wants_dict = true;
            } else {
                spec.members.push(text.to_string());
            }
        }
        self.release_all(names);
        result.map(|()| Some(spec))
    }

    /// Copies the class body namespace and applies the implicit rules:
    /// `__eq__` without `__hash__` makes instances unhashable and a plain
    /// function `__new__` becomes a static method.
    fn prepare_namespace(&mut self, namespace: ObjectId) -> PyResult<ObjectId> {
        let dict = self.dict_copy(namespace)?;
        let prepared = (|| -> PyResult<()> {
            if self.dict_get_str(dict, "__eq__")?.is_some() && self.dict_get_str(dict, "__hash__")?.is_none() {
                let none = self.none();
                self.dict_set_str(dict, "__hash__", none)?;
            }
            if let Some(new) = self.dict_get_str(dict, "__new__")?
                && matches!(
                    self.heap.get(new)?.data,
                    ObjectData::Function(_) | ObjectData::Native(_)
                )
            {
                let wrapped = self.new_staticmethod(new);
                let stored = self.dict_set_str(dict, "__new__", wrapped);
                self.release(wrapped);
                stored?;
            }
            Ok(())
        })();
        match prepared {
            Ok(()) => Ok(dict),
            Err(err) => {
                self.release(dict);
                Err(err)
            }
        }
    }

    /// Records `sub` in `base`'s weak subclass list, reusing a dead entry.
    pub(crate) fn register_subclass(&mut self, base: ObjectId, sub: ObjectId) -> PyResult<()> {
        let weak = self.weak_new_unchecked(sub, None)?;
        let entries = self.type_object(base)?.subclasses.clone();
        let mut dead = None;
        for (i, &entry) in entries.iter().enumerate() {
            if self.weak_is_dead(entry)? {
                dead = Some(i);
                break;
            }
        }
        let subclasses = &mut self.type_object_mut(base)?.subclasses;
        let replaced = match dead {
            Some(i) => Some(std::mem::replace(&mut subclasses[i], weak)),
            None => {
                subclasses.push(weak);
                None
            }
        };
        if let Some(old) = replaced {
            self.release(old);
        }
        Ok(())
    }

    /// Drops dead entries from every built-in type's subclass list.
    pub(crate) fn prune_subclasses(&mut self) -> usize {
        let mut pruned = Vec::new();
        for which in BuiltinType::ALL {
            let ty = self.builtin(which);
            let Ok(entries) = self.type_object(ty).map(|t| t.subclasses.clone()) else {
                continue;
            };
            let (dead, live): (Vec<ObjectId>, Vec<ObjectId>) = entries
                .into_iter()
                .partition(|&weak| self.weak_is_dead(weak).unwrap_or(true));
            if let Ok(t) = self.type_object_mut(ty) {
                t.subclasses = live;
            }
            pruned.extend(dead);
        }
        let count = pruned.len();
        self.release_all(pruned);
        count
    }
}

/// `type(obj)` with one argument, otherwise construct an instance: the
/// type's `new` slot followed by the instance's `init` slot.
fn type_call(rt: &mut Runtime, ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if ty == rt.builtin(BuiltinType::Type) && args.len() == 1 && kwargs.is_empty() {
        return rt.get_type(args[0]);
    }
    let Some(new) = rt.type_object(ty)?.slots.new else {
        return Err(PyErr::type_error(format!(
            "cannot create '{}' instances",
            rt.type_name(ty)
        )));
    };
    let obj = new(rt, ty, args, kwargs)?;
    if !rt.is_instance(obj, ty) {
        return Ok(obj);
    }
    if let Some(init) = rt.slots_of(obj)?.init
        && let Err(err) = init(rt, obj, args, kwargs)
    {
        rt.release(obj);
        return Err(err);
    }
    Ok(obj)
}

/// `type(name, bases, namespace)`.
fn type_new(rt: &mut Runtime, meta: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let &[name, bases, namespace] = args else {
        return Err(PyErr::type_error("type() takes 1 or 3 arguments"));
    };
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("type() takes no keyword arguments"));
    }
    let name = rt
        .str_value(name)
        .map_err(|_| {
            PyErr::type_error(format!(
                "type.__new__() argument 1 must be str, not {}",
                rt.type_name_of(name)
            ))
        })?
        .to_string();
    let bases = rt.tuple_items(bases).map_err(|_| {
        PyErr::type_error(format!(
            "type.__new__() argument 2 must be tuple, not {}",
            rt.type_name_of(bases)
        ))
    })?;
    if !matches!(rt.heap.get(namespace)?.data, ObjectData::Dict(_)) {
        return Err(PyErr::type_error(format!(
            "type.__new__() argument 3 must be dict, not {}",
            rt.type_name_of(namespace)
        )));
    }
    rt.new_type_with_meta(meta, &name, &bases, namespace)
}

fn type_init(_rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], _kwargs: &[(&str, ObjectId)]) -> PyResult<()> {
    if args.len() != 1 && args.len() != 3 {
        return Err(PyErr::type_error("type.__init__() takes 1 or 3 arguments"));
    }
    Ok(())
}

fn type_repr(rt: &mut Runtime, ty: ObjectId) -> PyResult<String> {
    Ok(format!("<class '{}'>", rt.type_object(ty)?.name))
}

/// Assignment on a class. Built-in types refuse it; dunders re-wire the
/// operation tables of the class and its subclasses.
fn type_setattr(rt: &mut Runtime, ty: ObjectId, name: &str, value: Option<ObjectId>) -> PyResult<()> {
    let t = rt.type_object(ty)?;
    if t.flags.contains(TypeFlags::IMMUTABLE) {
        return Err(PyErr::type_error(format!(
            "cannot set '{name}' attribute of immutable type '{}'",
            t.name
        )));
    }
    let dict = t.dict;

    let meta = rt.type_of(ty)?;
    if let Some(descr) = rt.lookup(meta, name)? {
        let set = rt.slots_of(descr)?.descr_set;
        if let Some(set) = set {
            let result = set(rt, descr, ty, value);
            rt.release(descr);
            return result;
        }
        rt.release(descr);
    }

    match value {
        Some(value) => rt.dict_set_str(dict, name, value)?,
        None => {
            if !rt.dict_del_str(dict, name)? {
                return Err(PyErr::attribute_error(format!(
                    "type object '{}' has no attribute '{name}'",
                    rt.type_name(ty)
                )));
            }
        }
    }
    update_slot(rt, ty, name)
}

pub(crate) fn type_slots() -> TypeSlots {
    TypeSlots {
        new: Some(type_new),
        init: Some(type_init),
        repr: Some(type_repr),
        call: Some(type_call),
        getattro: Some(type_getattr),
        setattro: Some(type_setattr),
        ..TypeSlots::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use crate::testing::{make_class, make_method};

    fn namespace(rt: &mut Runtime, entries: &[(&str, ObjectId)]) -> ObjectId {
        let dict = rt.new_dict();
        for &(key, value) in entries {
            rt.dict_set_str(dict, key, value).unwrap();
        }
        dict
    }

    #[test]
    fn test_builtin_types_are_final() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let int = rt.builtin(BuiltinType::Int);
        let ns = namespace(&mut rt, &[]);
        let err = rt.new_type("MyInt", &[int], ns).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "type 'int' is not an acceptable base type");
    }

    #[test]
    fn test_duplicate_base() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let a = make_class(&mut rt, "A", &[], &[]);
        let ns = namespace(&mut rt, &[]);
        let err = rt.new_type("B", &[a, a], ns).unwrap_err();
        assert_eq!(err.message, "duplicate base class A");
    }

    #[test]
    fn test_inconsistent_mro_is_a_type_error() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let a = make_class(&mut rt, "A", &[], &[]);
        let b = make_class(&mut rt, "B", &[a], &[]);
        let ns = namespace(&mut rt, &[]);
        let err = rt.new_type("C", &[a, b], ns).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert!(err.message.starts_with("Cannot create a consistent method resolution order"));
    }

    #[test]
    fn test_slots_members_and_no_dict() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let x = rt.new_str("x");
        let y = rt.new_str("y");
        let slots = rt.new_tuple(&[x, y]);
        let point = make_class(&mut rt, "Point", &[], &[("__slots__", slots)]);
        let p = rt.call(point, &[], &[]).unwrap();
        assert!(rt.instance_dict(p).is_none());

        let one = rt.new_int(1);
        rt.set_attr(p, "x", Some(one)).unwrap();
        assert_eq!(rt.get_attr(p, "x").unwrap(), one);
        let err = rt.get_attr(p, "y").unwrap_err();
        assert_eq!(err.message, "'Point' object has no attribute 'y'");
        let err = rt.set_attr(p, "z", Some(one)).unwrap_err();
        assert_eq!(err.message, "'Point' object has no attribute 'z'");

        let member = rt.get_attr(point, "x").unwrap();
        assert_eq!(rt.repr(member).unwrap(), "<member 'x' of 'Point' objects>");

        // A subclass without __slots__ gets its dict back.
        let sub = make_class(&mut rt, "Point3", &[point], &[]);
        let q = rt.call(sub, &[], &[]).unwrap();
        assert!(rt.instance_dict(q).is_some());
        rt.set_attr(q, "x", Some(one)).unwrap();
        assert!(rt.dict_get_str(rt.instance_dict(q).unwrap(), "x").unwrap().is_none());
    }

    #[test]
    fn test_slots_conflicts() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let x = rt.new_str("x");
        let one = rt.new_int(1);
        let ns = namespace(&mut rt, &[("__slots__", x), ("x", one)]);
        let err = rt.new_type("Bad", &[], ns).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
        assert_eq!(err.message, "'x' in __slots__ conflicts with class variable");

        let bad_name = rt.new_str("1x");
        let ns = namespace(&mut rt, &[("__slots__", bad_name)]);
        let err = rt.new_type("Bad", &[], ns).unwrap_err();
        assert_eq!(err.message, "__slots__ must be identifiers");
    }

    #[test]
    fn test_layout_conflict() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let a_slot = rt.new_str("a");
        let b_slot = rt.new_str("b");
        let a = make_class(&mut rt, "A", &[], &[("__slots__", a_slot)]);
        let b = make_class(&mut rt, "B", &[], &[("__slots__", b_slot)]);
        let ns = namespace(&mut rt, &[]);
        let err = rt.new_type("AB", &[a, b], ns).unwrap_err();
        assert_eq!(err.message, "multiple bases have instance lay-out conflict");

        // One data-carrying base plus plain classes is fine.
        let plain = make_class(&mut rt, "Plain", &[], &[]);
        let ns = namespace(&mut rt, &[]);
        let mixed = rt.new_type("Mixed", &[plain, a], ns).unwrap();
        assert_eq!(rt.type_object(mixed).unwrap().base, Some(a));
    }

    #[test]
    fn test_metaclass_winner_and_conflict() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let type_ = rt.builtin(BuiltinType::Type);
        let meta = make_class(&mut rt, "Meta", &[type_], &[]);
        let ns = namespace(&mut rt, &[]);
        let with_meta = rt.new_type_with_meta(meta, "WithMeta", &[], ns).unwrap();
        assert_eq!(rt.type_of(with_meta).unwrap(), meta);

        // Deriving picks up the base's metaclass.
        let derived = make_class(&mut rt, "Derived", &[with_meta], &[]);
        assert_eq!(rt.type_of(derived).unwrap(), meta);

        let other_meta = make_class(&mut rt, "Other", &[type_], &[]);
        let ns = namespace(&mut rt, &[]);
        let other = rt.new_type_with_meta(other_meta, "O", &[], ns).unwrap();
        let ns = namespace(&mut rt, &[]);
        let err = rt.new_type("Both", &[with_meta, other], ns).unwrap_err();
        assert!(err.message.starts_with("metaclass conflict"));
    }

    #[test]
    fn test_type_builtin_call_forms() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let type_ = rt.builtin(BuiltinType::Type);
        let five = rt.new_int(5);
        let ty = rt.call(type_, &[five], &[]).unwrap();
        assert_eq!(ty, rt.builtin(BuiltinType::Int));

        let name = rt.new_str("Dyn");
        let bases = rt.new_tuple(&[]);
        let seven = rt.new_int(7);
        let ns = namespace(&mut rt, &[("answer", seven)]);
        let dynamic = rt.call(type_, &[name, bases, ns], &[]).unwrap();
        assert_eq!(rt.repr(dynamic).unwrap(), "<class 'Dyn'>");
        let obj = rt.call(dynamic, &[], &[]).unwrap();
        assert_eq!(rt.get_attr(obj, "answer").unwrap(), seven);

        let err = rt.call(type_, &[name, bases], &[]).unwrap_err();
        assert_eq!(err.message, "type() takes 1 or 3 arguments");
    }

    #[test]
    fn test_user_new_is_static() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let new = make_method(&mut rt, "__new__", |rt, args| {
            let object = rt.builtin(BuiltinType::Object);
            let object_new = rt.get_attr(object, "__new__")?;
            let obj = rt.call(object_new, &args[..1], &[]);
            rt.release(object_new);
            let obj = obj?;
            let tag = rt.new_str("made by __new__");
            rt.set_attr(obj, "tag", Some(tag))?;
            Ok(obj)
        });
        let class = make_class(&mut rt, "Made", &[], &[("__new__", new)]);
        let stored = rt.lookup(class, "__new__").unwrap().unwrap();
        assert_eq!(rt.type_name_of(stored), "staticmethod");

        let obj = rt.call(class, &[], &[]).unwrap();
        let tag = rt.get_attr(obj, "tag").unwrap();
        assert_eq!(rt.str_value(tag).unwrap(), "made by __new__");
    }

    #[test]
    fn test_immutable_builtin_type() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let int = rt.builtin(BuiltinType::Int);
        let one = rt.new_int(1);
        let err = rt.set_attr(int, "x", Some(one)).unwrap_err();
        assert_eq!(err.message, "cannot set 'x' attribute of immutable type 'int'");
    }

    #[test]
    fn test_class_attribute_assignment_and_deletion() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let class = make_class(&mut rt, "Box", &[], &[]);
        let one = rt.new_int(1);
        rt.set_attr(class, "size", Some(one)).unwrap();
        let obj = rt.call(class, &[], &[]).unwrap();
        assert_eq!(rt.get_attr(obj, "size").unwrap(), one);
        rt.del_attr(class, "size").unwrap();
        let err = rt.del_attr(class, "size").unwrap_err();
        assert_eq!(err.message, "type object 'Box' has no attribute 'size'");

        let err = rt.set_attr(class, "__name__", Some(one)).unwrap_err();
        assert_eq!(err.message, "attribute '__name__' of 'type' objects is not writable");
    }

    #[test]
    fn test_subclass_registry_reuses_dead_entries() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let base = make_class(&mut rt, "Base", &[], &[]);
        let first = make_class(&mut rt, "First", &[base], &[]);
        let subs = rt.subclasses(base).unwrap();
        assert_eq!(subs, vec![first]);
        rt.release_all(subs);

        rt.release(first);
        rt.gc_collect(None).unwrap();
        assert!(rt.subclasses(base).unwrap().is_empty());

        let second = make_class(&mut rt, "Second", &[base], &[]);
        assert_eq!(rt.type_object(base).unwrap().subclasses.len(), 1);
        let subs = rt.subclasses(base).unwrap();
        assert_eq!(subs, vec![second]);
    }
}
