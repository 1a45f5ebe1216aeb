//! Type objects and the static registry of built-in types.

pub mod bootstrap;
pub mod mro;
pub mod new_type;
pub mod slot_dispatch;
pub mod slots;
pub mod wrappers;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::runtime::Runtime;
use crate::traversal::Traverse;
use crate::PyResult;

pub use slots::{BinaryOp, CompareOp, TypeSlots, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeFlags(u8);

impl TypeFlags {
    /// The type may be used as a base of new types.
    pub const BASETYPE: TypeFlags = TypeFlags(0x1);
    /// Created at runtime by `new_type`.
    pub const HEAPTYPE: TypeFlags = TypeFlags(0x2);
    /// Instances carry their own attribute dictionary.
    pub const HAS_DICT: TypeFlags = TypeFlags(0x4);
    /// Attributes of the type itself cannot be reassigned.
    pub const IMMUTABLE: TypeFlags = TypeFlags(0x8);

    pub const fn empty() -> Self {
        TypeFlags(0)
    }

    pub fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: TypeFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for TypeFlags {
    type Output = TypeFlags;

    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}

/// Payload layout of a type's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Plain instances (`ObjectData::Instance`).
    Object,
    /// Instances are themselves types (metaclasses).
    Type,
    /// Fixed native payload, only creatable by the type's own constructor.
    Native,
}

#[derive(Debug)]
pub struct TypeObject {
    pub name: String,
    /// Declared bases, strong references.
    pub bases: Vec<ObjectId>,
    /// Best base chosen for the instance layout; one of `bases`.
    pub base: Option<ObjectId>,
    /// Linearised ancestors. `mro[0]` is the type itself and is not an owned
    /// reference; every other entry is.
    pub mro: Vec<ObjectId>,
    /// Namespace dictionary, strong reference.
    pub dict: ObjectId,
    pub slots: TypeSlots,
    pub flags: TypeFlags,
    pub layout: Layout,
    /// Names of the per-instance member slots, inherited ones first.
    pub members: Vec<String>,
    /// Weak references to known subclasses, strong references to the weakref objects.
    pub subclasses: Vec<ObjectId>,
}

impl TypeObject {
    pub fn is_heap_type(&self) -> bool {
        self.flags.contains(TypeFlags::HEAPTYPE)
    }

    pub fn has_dict(&self) -> bool {
        self.flags.contains(TypeFlags::HAS_DICT)
    }

    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        out.append(&mut self.bases);
        if !self.mro.is_empty() {
            out.extend(self.mro.drain(1..));
        }
        self.mro.clear();
        out.push(std::mem::replace(&mut self.dict, ObjectId::DANGLING));
        out.append(&mut self.subclasses);
    }
}

impl Traverse for TypeObject {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        self.bases.iter().all(|&id| visit(id))
            && self.mro.iter().skip(1).all(|&id| visit(id))
            && visit(self.dict)
            && self.subclasses.iter().all(|&id| visit(id))
    }
}

/// Every type created at start-up. The discriminant indexes the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Object,
    Type,
    NoneType,
    NotImplementedType,
    Int,
    Bool,
    Float,
    Str,
    Tuple,
    List,
    Dict,
    Function,
    BuiltinFunction,
    Method,
    Property,
    StaticMethod,
    ClassMethod,
    MemberDescriptor,
    GetSetDescriptor,
    WrapperDescriptor,
    WeakRef,
    Iterator,
    Cell,
}

impl BuiltinType {
    pub const COUNT: usize = 23;

    pub const ALL: [BuiltinType; BuiltinType::COUNT] = [
        BuiltinType::Object,
        BuiltinType::Type,
        BuiltinType::NoneType,
        BuiltinType::NotImplementedType,
        BuiltinType::Int,
        BuiltinType::Bool,
        BuiltinType::Float,
        BuiltinType::Str,
        BuiltinType::Tuple,
        BuiltinType::List,
        BuiltinType::Dict,
        BuiltinType::Function,
        BuiltinType::BuiltinFunction,
        BuiltinType::Method,
        BuiltinType::Property,
        BuiltinType::StaticMethod,
        BuiltinType::ClassMethod,
        BuiltinType::MemberDescriptor,
        BuiltinType::GetSetDescriptor,
        BuiltinType::WrapperDescriptor,
        BuiltinType::WeakRef,
        BuiltinType::Iterator,
        BuiltinType::Cell,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Object => "object",
            BuiltinType::Type => "type",
            BuiltinType::NoneType => "NoneType",
            BuiltinType::NotImplementedType => "NotImplementedType",
            BuiltinType::Int => "int",
            BuiltinType::Bool => "bool",
            BuiltinType::Float => "float",
            BuiltinType::Str => "str",
            BuiltinType::Tuple => "tuple",
            BuiltinType::List => "list",
            BuiltinType::Dict => "dict",
            BuiltinType::Function => "function",
            BuiltinType::BuiltinFunction => "builtin_function_or_method",
            BuiltinType::Method => "method",
            BuiltinType::Property => "property",
            BuiltinType::StaticMethod => "staticmethod",
            BuiltinType::ClassMethod => "classmethod",
            BuiltinType::MemberDescriptor => "member_descriptor",
            BuiltinType::GetSetDescriptor => "getset_descriptor",
            BuiltinType::WrapperDescriptor => "wrapper_descriptor",
            BuiltinType::WeakRef => "weakref",
            BuiltinType::Iterator => "iterator",
            BuiltinType::Cell => "cell",
        }
    }
}

/// Registry mapping each built-in type to its immortal type object.
#[derive(Debug, Clone)]
pub struct BuiltinTypes {
    ids: [ObjectId; BuiltinType::COUNT],
}

impl BuiltinTypes {
    pub(crate) fn new(ids: [ObjectId; BuiltinType::COUNT]) -> Self {
        Self { ids }
    }

    pub fn get(&self, which: BuiltinType) -> ObjectId {
        self.ids[which as usize]
    }

    pub fn find(&self, id: ObjectId) -> Option<BuiltinType> {
        BuiltinType::ALL.iter().copied().find(|&t| self.get(t) == id)
    }
}

impl Runtime {
    pub fn builtin(&self, which: BuiltinType) -> ObjectId {
        self.types.get(which)
    }

    /// Borrowed type of an object.
    pub fn type_of(&self, obj: ObjectId) -> PyResult<ObjectId> {
        Ok(self.heap.get(obj)?.ob_type)
    }

    /// The object's type as a new reference.
    pub fn get_type(&mut self, obj: ObjectId) -> PyResult<ObjectId> {
        let ty = self.type_of(obj)?;
        Ok(self.retain(ty))
    }

    pub fn type_object(&self, ty: ObjectId) -> PyResult<&TypeObject> {
        match &self.heap.get(ty)?.data {
            ObjectData::Type(t) => Ok(t),
            other => Err(PyErr::system_error(format!(
                "expected a type object, found {}",
                other.kind_name()
            ))),
        }
    }

    pub fn type_object_mut(&mut self, ty: ObjectId) -> PyResult<&mut TypeObject> {
        match &mut self.heap.get_mut(ty)?.data {
            ObjectData::Type(t) => Ok(t),
            other => Err(PyErr::system_error(format!(
                "expected a type object, found {}",
                other.kind_name()
            ))),
        }
    }

    pub fn is_type(&self, obj: ObjectId) -> bool {
        matches!(
            self.heap.try_get(obj).map(|e| &e.data),
            Some(ObjectData::Type(_))
        )
    }

    /// Operation table of `obj`'s type.
    pub fn slots_of(&self, obj: ObjectId) -> PyResult<&TypeSlots> {
        let ty = self.type_of(obj)?;
        Ok(&self.type_object(ty)?.slots)
    }

    pub fn type_name(&self, ty: ObjectId) -> String {
        self.type_object(ty)
            .map(|t| t.name.clone())
            .unwrap_or_else(|_| "?".to_string())
    }

    pub fn type_name_of(&self, obj: ObjectId) -> String {
        self.type_of(obj)
            .map(|ty| self.type_name(ty))
            .unwrap_or_else(|_| "?".to_string())
    }

    /// `a` is `b` or has `b` in its MRO.
    pub fn is_subtype(&self, a: ObjectId, b: ObjectId) -> bool {
        a == b
            || self
                .type_object(a)
                .map(|t| t.mro.contains(&b))
                .unwrap_or(false)
    }

    pub fn is_instance(&self, obj: ObjectId, ty: ObjectId) -> bool {
        self.type_of(obj)
            .map(|t| self.is_subtype(t, ty))
            .unwrap_or(false)
    }

    pub fn is_heap_type(&self, ty: ObjectId) -> bool {
        self.type_object(ty)
            .map(TypeObject::is_heap_type)
            .unwrap_or(false)
    }

    /// Looks `name` up along the MRO of `ty`. Returns a new reference.
    pub fn lookup(&mut self, ty: ObjectId, name: &str) -> PyResult<Option<ObjectId>> {
        let found = self.lookup_borrowed(ty, name)?;
        Ok(found.map(|id| self.retain(id)))
    }

    pub(crate) fn lookup_borrowed(&self, ty: ObjectId, name: &str) -> PyResult<Option<ObjectId>> {
        let mro = &self.type_object(ty)?.mro;
        for &klass in mro {
            let dict = self.type_object(klass)?.dict;
            if let Some(value) = self.dict_get_str(dict, name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// The type in `ty`'s MRO whose namespace defines `name`.
    pub(crate) fn lookup_owner(&self, ty: ObjectId, name: &str) -> PyResult<Option<ObjectId>> {
        let mro = &self.type_object(ty)?.mro;
        for &klass in mro {
            let dict = self.type_object(klass)?.dict;
            if self.dict_get_str(dict, name)?.is_some() {
                return Ok(Some(klass));
            }
        }
        Ok(None)
    }

    /// Live subclasses registered on `ty`, as new references.
    pub fn subclasses(&mut self, ty: ObjectId) -> PyResult<Vec<ObjectId>> {
        let refs = self.type_object(ty)?.subclasses.clone();
        let mut live = Vec::new();
        for weak in refs {
            if let Some(sub) = self.weak_get(weak)? {
                live.push(sub);
            }
        }
        Ok(live)
    }
}
