//! Arena of generation-tagged object slots.
//!
//! Freed slots go onto a free list and are reused by later allocations; every
//! reuse bumps the slot generation so stale `ObjectId`s are rejected instead
//! of silently aliasing a new object.

use log::trace;

use crate::error::PyErr;
use crate::object::{HeapEntry, ObjectData, ObjectFlags, ObjectId};
use crate::PyResult;

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<HeapEntry>,
}

#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
    total_allocations: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, ob_type: ObjectId, data: ObjectData, flags: ObjectFlags) -> ObjectId {
        let kind = data.kind_name();
        let entry = HeapEntry {
            refcount: 1,
            ob_type,
            flags,
            gc: None,
            weakrefs: Vec::new(),
            data,
        };

        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.entry = Some(entry);
            ObjectId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            ObjectId::new(index, 0)
        };

        self.live += 1;
        self.total_allocations += 1;
        trace!("allocated {kind} at {id}");
        id
    }

    /// Removes the entry from the arena and returns it to the caller, which
    /// becomes responsible for releasing whatever it owned.
    pub fn free(&mut self, id: ObjectId) -> Option<HeapEntry> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let entry = slot.entry.take()?;
        self.free_list.push(id.index() as u32);
        self.live -= 1;
        trace!("freed {} at {id}", entry.data.kind_name());
        Some(entry)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.try_get(id).is_some()
    }

    pub fn try_get(&self, id: ObjectId) -> Option<&HeapEntry> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn try_get_mut(&mut self, id: ObjectId) -> Option<&mut HeapEntry> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn get(&self, id: ObjectId) -> PyResult<&HeapEntry> {
        self.try_get(id).ok_or_else(|| stale(id))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> PyResult<&mut HeapEntry> {
        self.try_get_mut(id).ok_or_else(|| stale(id))
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    /// Ids of every live object, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .map(|_| ObjectId::new(index as u32, slot.generation))
        })
    }
}

fn stale(id: ObjectId) -> PyErr {
    PyErr::system_error(format!("stale object reference {id}"))
}
