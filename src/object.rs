use std::fmt;

use crate::objects::descriptor::Descriptor;
use crate::objects::dict::Dict;
use crate::objects::function::{BoundMethod, Function, NativeFunction};
use crate::objects::instance::Instance;
use crate::objects::iter::SeqIter;
use crate::types::TypeObject;
use crate::weakref::WeakRef;

/// Handle to an object living in the runtime's heap arena.
///
/// The `generation` tag makes handles to freed slots detectable: once a slot
/// is reused its generation is bumped and every older handle goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Placeholder used only while bootstrapping the built-in types.
    pub(crate) const DANGLING: ObjectId = ObjectId {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Stable pseudo-address used for identity ordering and default reprs.
    pub fn address(&self) -> usize {
        0x1000 + ((self.index as usize) << 4)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.address())
    }
}

/// Per-object flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectFlags(u8);

impl ObjectFlags {
    /// Cycle-tracked container.
    pub const TRACKED: ObjectFlags = ObjectFlags(0x1);
    /// Held by the runtime's reuse pool through one non-external reference.
    pub const POOLED: ObjectFlags = ObjectFlags(0x2);
    /// Process-wide singleton: never freed, retain/release are no-ops.
    pub const IMMORTAL: ObjectFlags = ObjectFlags(0x4);
    /// The entry owns a strong reference to its (heap) type.
    pub const OWNS_TYPE: ObjectFlags = ObjectFlags(0x8);
    /// `__del__` already ran for this object.
    pub const FINALIZED: ObjectFlags = ObjectFlags(0x10);

    pub const fn empty() -> Self {
        ObjectFlags(0)
    }

    pub fn contains(self, other: ObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ObjectFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ObjectFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for ObjectFlags {
    type Output = ObjectFlags;

    fn bitor(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | rhs.0)
    }
}

/// Collector marker of a tracked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcState {
    Reachable,
    BeingTraced,
    Candidate,
}

/// Collector bookkeeping carried by every tracked container.
#[derive(Debug, Clone)]
pub struct GcHead {
    /// Generation the container is linked into, `None` while mid-collection.
    pub generation: Option<usize>,
    /// Scratch "trial" reference count used by a collection pass.
    pub gc_refs: isize,
    pub state: GcState,
}

impl GcHead {
    pub fn new(generation: usize) -> Self {
        Self {
            generation: Some(generation),
            gc_refs: 0,
            state: GcState::Reachable,
        }
    }

    /// True while the container belongs to the working set of a collection.
    pub fn is_collecting(&self) -> bool {
        self.generation.is_none()
    }
}

/// One live slot of the heap arena.
#[derive(Debug)]
pub struct HeapEntry {
    pub refcount: usize,
    pub ob_type: ObjectId,
    pub flags: ObjectFlags,
    pub gc: Option<GcHead>,
    /// Non-owning list of weak references observing this object.
    pub weakrefs: Vec<ObjectId>,
    pub data: ObjectData,
}

impl HeapEntry {
    pub fn is_tracked(&self) -> bool {
        self.flags.contains(ObjectFlags::TRACKED)
    }

    pub fn is_immortal(&self) -> bool {
        self.flags.contains(ObjectFlags::IMMORTAL)
    }
}

/// Payload of an object. The variant fixes the memory layout; the entry's
/// `ob_type` fixes the behaviour.
#[derive(Debug)]
pub enum ObjectData {
    None,
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Box<str>),
    Tuple(Vec<ObjectId>),
    List(Vec<ObjectId>),
    Dict(Dict),
    Type(Box<TypeObject>),
    Instance(Instance),
    Function(Function),
    Native(NativeFunction),
    Method(BoundMethod),
    Descriptor(Descriptor),
    WeakRef(WeakRef),
    Iter(SeqIter),
    Cell(Option<ObjectId>),
}

impl ObjectData {
    /// Whether values of this layout can hold references and therefore must
    /// be tracked by the cycle collector.
    pub fn is_container(&self) -> bool {
        !matches!(
            self,
            ObjectData::None
                | ObjectData::NotImplemented
                | ObjectData::Bool(_)
                | ObjectData::Int(_)
                | ObjectData::Float(_)
                | ObjectData::Str(_)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectData::None => "None",
            ObjectData::NotImplemented => "NotImplemented",
            ObjectData::Bool(_) => "Bool",
            ObjectData::Int(_) => "Int",
            ObjectData::Float(_) => "Float",
            ObjectData::Str(_) => "Str",
            ObjectData::Tuple(_) => "Tuple",
            ObjectData::List(_) => "List",
            ObjectData::Dict(_) => "Dict",
            ObjectData::Type(_) => "Type",
            ObjectData::Instance(_) => "Instance",
            ObjectData::Function(_) => "Function",
            ObjectData::Native(_) => "Native",
            ObjectData::Method(_) => "Method",
            ObjectData::Descriptor(_) => "Descriptor",
            ObjectData::WeakRef(_) => "WeakRef",
            ObjectData::Iter(_) => "Iter",
            ObjectData::Cell(_) => "Cell",
        }
    }
}
