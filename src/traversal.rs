//! The traversal contract every container implements.
//!
//! `traverse` calls the visitor once per owned outgoing reference and stops
//! early, returning `false`, as soon as the visitor does. An entry's traversal
//! visits its payload first and then its type when the entry owns it, which
//! is the "chain to the base" step of a heap type instance.

use std::collections::HashSet;

use crate::object::{HeapEntry, ObjectData, ObjectFlags, ObjectId};
use crate::runtime::Runtime;
use crate::PyResult;

pub trait Traverse {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool;
}

impl Traverse for ObjectData {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        match self {
            ObjectData::None
            | ObjectData::NotImplemented
            | ObjectData::Bool(_)
            | ObjectData::Int(_)
            | ObjectData::Float(_)
            | ObjectData::Str(_)
            | ObjectData::Native(_) => true,
            ObjectData::Tuple(items) | ObjectData::List(items) => items.iter().all(|&id| visit(id)),
            ObjectData::Dict(dict) => dict.traverse(visit),
            ObjectData::Type(ty) => ty.traverse(visit),
            ObjectData::Instance(inst) => inst.traverse(visit),
            ObjectData::Function(func) => func.traverse(visit),
            ObjectData::Method(method) => method.traverse(visit),
            ObjectData::Descriptor(descr) => descr.traverse(visit),
            ObjectData::WeakRef(weak) => weak.traverse(visit),
            ObjectData::Iter(iter) => iter.traverse(visit),
            ObjectData::Cell(cell) => cell.is_none_or(|id| visit(id)),
        }
    }
}

impl Traverse for HeapEntry {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        self.data.traverse(visit)
            && (!self.flags.contains(ObjectFlags::OWNS_TYPE) || visit(self.ob_type))
    }
}

impl Runtime {
    /// Owned outgoing references of `obj`, borrowed.
    pub(crate) fn referents_of(&self, obj: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        if let Some(entry) = self.heap.try_get(obj) {
            entry.traverse(&mut |id| {
                out.push(id);
                true
            });
        }
        out
    }

    /// Objects directly referred to by any of `objs`, as a new list.
    pub fn get_referents(&mut self, objs: &[ObjectId]) -> PyResult<ObjectId> {
        let mut found = Vec::new();
        for &obj in objs {
            self.heap.get(obj)?;
            found.extend(self.referents_of(obj));
        }
        Ok(self.new_list(&found))
    }

    /// Tracked containers that refer directly to any of `objs`, as a new list.
    pub fn get_referrers(&mut self, objs: &[ObjectId]) -> PyResult<ObjectId> {
        let targets: HashSet<ObjectId> = objs.iter().copied().collect();
        let mut found = Vec::new();
        for id in self.heap.ids() {
            let Some(entry) = self.heap.try_get(id) else {
                continue;
            };
            if !entry.is_tracked() {
                continue;
            }
            let refers = !entry.traverse(&mut |child| !targets.contains(&child));
            if refers {
                found.push(id);
            }
        }
        Ok(self.new_list(&found))
    }
}
