//! Reference-count lifecycle: `retain`, `release` and the destructor cascade.
//!
//! Releasing the last reference never recurses into children. Dying objects
//! are pushed onto a work queue that the outermost `release` drains, so a
//! million-element cons list is torn down in constant stack depth.

use log::error;

use crate::object::{ObjectData, ObjectFlags, ObjectId};
use crate::runtime::Runtime;

impl ObjectData {
    /// Moves every owned reference out of the payload into `out`, leaving
    /// the payload empty but valid.
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        match self {
            ObjectData::None
            | ObjectData::NotImplemented
            | ObjectData::Bool(_)
            | ObjectData::Int(_)
            | ObjectData::Float(_)
            | ObjectData::Str(_)
            | ObjectData::Native(_) => {}
            ObjectData::Tuple(items) | ObjectData::List(items) => out.append(items),
            ObjectData::Dict(dict) => dict.drain_refs(out),
            ObjectData::Type(ty) => ty.drain_refs(out),
            ObjectData::Instance(inst) => inst.drain_refs(out),
            ObjectData::Function(func) => func.drain_refs(out),
            ObjectData::Method(method) => method.drain_refs(out),
            ObjectData::Descriptor(descr) => descr.drain_refs(out),
            ObjectData::WeakRef(weak) => weak.drain_refs(out),
            ObjectData::Iter(iter) => iter.drain_refs(out),
            ObjectData::Cell(cell) => out.extend(cell.take()),
        }
    }
}

impl Runtime {
    /// Adds a strong reference and returns the same identity.
    pub fn retain(&mut self, obj: ObjectId) -> ObjectId {
        match self.heap.try_get_mut(obj) {
            Some(entry) if entry.is_immortal() => {}
            Some(entry) => entry.refcount += 1,
            None => error!("retain of stale reference {obj}"),
        }
        obj
    }

    /// Drops a strong reference, destroying the object (and transitively
    /// anything only it kept alive) when the count reaches zero.
    pub fn release(&mut self, obj: ObjectId) {
        if !self.decref(obj) {
            return;
        }
        self.dealloc_queue.push(obj);
        if self.deallocating {
            return;
        }

        self.deallocating = true;
        while let Some(next) = self.dealloc_queue.pop() {
            self.dealloc(next);
        }
        self.deallocating = false;

        self.run_pending_callbacks();
    }

    pub fn release_all(&mut self, objs: impl IntoIterator<Item = ObjectId>) {
        for obj in objs {
            self.release(obj);
        }
    }

    /// Returns true when the count dropped to zero.
    fn decref(&mut self, obj: ObjectId) -> bool {
        let Some(entry) = self.heap.try_get_mut(obj) else {
            error!("release of stale reference {obj}");
            return false;
        };
        if entry.is_immortal() {
            return false;
        }
        if entry.refcount > 1 {
            entry.refcount -= 1;
            return false;
        }
        entry.refcount = 0;
        true
    }

    fn dealloc(&mut self, obj: ObjectId) {
        if !self.run_finalizer(obj) {
            return;
        }

        self.clear_weakrefs(obj, |_, _| true);
        self.gc_untrack(obj);
        self.unlink_weakref(obj);

        let Some(mut entry) = self.heap.free(obj) else {
            return;
        };
        let mut children = Vec::new();
        entry.data.drain_refs(&mut children);
        if entry.flags.contains(ObjectFlags::OWNS_TYPE) {
            children.push(entry.ob_type);
        }

        for child in children {
            if self.decref(child) {
                self.dealloc_queue.push(child);
            }
        }
    }

    /// Runs `__del__` once for finalizer-bearing objects. Returns false when
    /// the finalizer resurrected the object.
    fn run_finalizer(&mut self, obj: ObjectId) -> bool {
        let Ok(entry) = self.heap.get(obj) else {
            return false;
        };
        if entry.flags.contains(ObjectFlags::FINALIZED) {
            return true;
        }
        let Ok(Some(finalize)) = self.slots_of(obj).map(|slots| slots.finalize) else {
            return true;
        };

        if let Ok(entry) = self.heap.get_mut(obj) {
            entry.flags.insert(ObjectFlags::FINALIZED);
            entry.refcount = 1;
        }
        if let Err(err) = finalize(self, obj) {
            let context = format!("Exception ignored in __del__ of {}", self.type_name_of(obj));
            self.write_unraisable(err, &context);
        }

        match self.heap.get_mut(obj) {
            Ok(entry) if entry.refcount > 1 => {
                entry.refcount -= 1;
                false
            }
            Ok(entry) => {
                entry.refcount = 0;
                true
            }
            Err(_) => false,
        }
    }

    /// Empties a live object's payload and releases what it held. This is the
    /// collector's way of breaking a cycle.
    pub(crate) fn clear_refs(&mut self, obj: ObjectId) {
        let Some(entry) = self.heap.try_get_mut(obj) else {
            return;
        };
        let mut children = Vec::new();
        entry.data.drain_refs(&mut children);
        self.release_all(children);
    }

    fn run_pending_callbacks(&mut self) {
        if !self.pending_callbacks.is_empty() {
            self.fire_weakref_callbacks("weakref callback");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RuntimeConfig;
    use crate::error::{ErrorKind, PyErr};
    use crate::runtime::Runtime;
    use crate::testing::{make_class, make_method};

    #[test]
    fn test_release_frees_acyclic_graph() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let baseline = rt.live_objects();

        let leaf = rt.new_str("leaf");
        let inner = rt.new_list(&[leaf]);
        let outer = rt.new_tuple(&[inner, leaf]);
        rt.release(leaf);
        rt.release(inner);
        assert_eq!(rt.live_objects(), baseline + 3);

        rt.release(outer);
        assert_eq!(rt.live_objects(), baseline);
    }

    #[test]
    fn test_long_chain_release_does_not_overflow() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_gc_enabled(false));
        let baseline = rt.live_objects();

        let mut head = rt.none();
        for _ in 0..200_000 {
            let cell = rt.new_tuple(&[head]);
            rt.release(head);
            head = cell;
        }
        rt.release(head);
        assert_eq!(rt.live_objects(), baseline);
    }

    #[test]
    fn test_graph_depths_leave_no_leaks() {
        for depth in [1usize, 10, 100, 1000] {
            let mut rt = Runtime::new(RuntimeConfig::default());
            let baseline = rt.live_objects();

            let mut node = rt.new_list(&[]);
            for i in 0..depth {
                let value = rt.new_int(i as i64 * 1_000_003);
                let next = rt.new_list(&[node, value]);
                rt.release(value);
                rt.release(node);
                node = next;
            }
            rt.release(node);
            assert_eq!(rt.live_objects(), baseline, "depth {depth}");
        }
    }

    #[test]
    fn test_retain_returns_same_identity() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let list = rt.new_list(&[]);
        assert_eq!(rt.retain(list), list);
        assert_eq!(rt.refcount(list).unwrap(), 2);
        rt.release(list);
        rt.release(list);
        assert!(!rt.is_alive(list));
    }

    #[test]
    fn test_finalizer_error_on_release_is_unraisable() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_gc_enabled(false));
        let del = make_method(&mut rt, "__del__", |_, _| Err(PyErr::value_error("boom")));
        let noisy = make_class(&mut rt, "Noisy", &[], &[("__del__", del)]);
        let receiver = rt.subscribe_unraisable();

        let obj = rt.call(noisy, &[], &[]).unwrap();
        rt.release(obj);
        assert!(!rt.is_alive(obj));

        let report = receiver.try_recv().unwrap();
        assert_eq!(report.error.kind, ErrorKind::ValueError);
        assert_eq!(report.error.message, "boom");
        assert_eq!(report.context, "Exception ignored in __del__ of Noisy");
        assert!(receiver.try_recv().is_err());
    }
}
