//! Weak references.
//!
//! A weakref observes a tracked container without owning it. The target's
//! heap entry keeps a non-owning list of the weakrefs pointing at it; when the
//! target dies every one of them is cleared before any callback runs, and the
//! callbacks fire afterwards with the weakref as their only argument.

use log::trace;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::runtime::Runtime;
use crate::traversal::Traverse;
use crate::types::{BuiltinType, CompareOp, TypeSlots};
use crate::PyResult;

#[derive(Debug)]
pub struct WeakRef {
    /// The observed object; `None` once it is gone. Not an owned reference.
    pub(crate) target: Option<ObjectId>,
    /// Owned reference to the callback, taken out when it is queued to fire.
    pub(crate) callback: Option<ObjectId>,
    pub(crate) hash: Option<u32>,
}

impl Traverse for WeakRef {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        self.callback.is_none_or(|id| visit(id))
    }
}

impl WeakRef {
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        out.extend(self.callback.take());
    }
}

impl Runtime {
    /// Creates a weak reference to `target`. Fails with `TypeError` unless
    /// the target is a cycle-tracked container. Weakrefs without a callback
    /// are shared between callers.
    pub fn weak_new(&mut self, target: ObjectId, callback: Option<ObjectId>) -> PyResult<ObjectId> {
        let entry = self.heap.get(target)?;
        if !entry.is_tracked() {
            return Err(PyErr::type_error(format!(
                "cannot create weak reference to '{}' object",
                self.type_name_of(target)
            )));
        }
        self.weak_new_unchecked(target, callback)
    }

    pub(crate) fn weak_new_unchecked(
        &mut self,
        target: ObjectId,
        callback: Option<ObjectId>,
    ) -> PyResult<ObjectId> {
        let callback = callback.filter(|&cb| !self.is_none(cb));
        if callback.is_none()
            && let Some(shared) = self.shared_weakref(target)?
        {
            return Ok(self.retain(shared));
        }

        if let Some(cb) = callback {
            self.retain(cb);
        }
        let weak = self.alloc_builtin(
            BuiltinType::WeakRef,
            ObjectData::WeakRef(WeakRef {
                target: Some(target),
                callback,
                hash: None,
            }),
        );
        match self.heap.try_get_mut(target) {
            Some(entry) => entry.weakrefs.push(weak),
            None => {
                // The target died while the weakref was being allocated.
                if let Some(ObjectData::WeakRef(wr)) = self.heap.try_get_mut(weak).map(|e| &mut e.data) {
                    wr.target = None;
                }
            }
        }
        trace!("weakref {weak} -> {target}");
        Ok(weak)
    }

    fn shared_weakref(&self, target: ObjectId) -> PyResult<Option<ObjectId>> {
        let weak_type = self.builtin(BuiltinType::WeakRef);
        let entry = self.heap.get(target)?;
        Ok(entry.weakrefs.iter().copied().find(|&weak| {
            self.heap.try_get(weak).is_some_and(|e| {
                e.ob_type == weak_type
                    && matches!(&e.data, ObjectData::WeakRef(wr) if wr.callback.is_none())
            })
        }))
    }

    pub(crate) fn weakref(&self, weak: ObjectId) -> PyResult<&WeakRef> {
        match &self.heap.get(weak)?.data {
            ObjectData::WeakRef(wr) => Ok(wr),
            _ => Err(PyErr::type_error(format!(
                "expected a weakref, got '{}'",
                self.type_name_of(weak)
            ))),
        }
    }

    /// The live target as a new reference, or `None` once it is gone.
    pub fn weak_get(&mut self, weak: ObjectId) -> PyResult<Option<ObjectId>> {
        let target = self.weakref(weak)?.target;
        Ok(target.map(|id| self.retain(id)))
    }

    pub fn weak_is_dead(&self, weak: ObjectId) -> PyResult<bool> {
        Ok(self.weakref(weak)?.target.is_none())
    }

    /// Number of weak references currently observing `target`.
    pub fn weak_count(&self, target: ObjectId) -> usize {
        self.heap
            .try_get(target)
            .map_or(0, |entry| entry.weakrefs.len())
    }

    /// Weak references currently observing `target`, as new references.
    pub fn weak_refs(&mut self, target: ObjectId) -> Vec<ObjectId> {
        let refs = self
            .heap
            .try_get(target)
            .map(|entry| entry.weakrefs.clone())
            .unwrap_or_default();
        refs.into_iter().map(|weak| self.retain(weak)).collect()
    }

    /// Clears every weakref observing `target`. Callbacks for which `fire`
    /// returns true are queued on `pending_callbacks`; the rest stay with
    /// their weakref and are released with it.
    pub(crate) fn clear_weakrefs(&mut self, target: ObjectId, fire: impl Fn(ObjectId, ObjectId) -> bool) {
        let Some(entry) = self.heap.try_get_mut(target) else {
            return;
        };
        let refs = std::mem::take(&mut entry.weakrefs);

        for weak in refs {
            let Some(entry) = self.heap.try_get_mut(weak) else {
                continue;
            };
            let dying = entry.refcount == 0;
            let ObjectData::WeakRef(wr) = &mut entry.data else {
                continue;
            };
            wr.target = None;
            let Some(callback) = wr.callback else {
                continue;
            };
            if dying || !fire(weak, callback) {
                continue;
            }
            wr.callback = None;
            self.retain(weak);
            self.pending_callbacks.push_back((weak, callback));
        }
    }

    /// Detaches a weakref from its target's list so a later death of the
    /// target does not see it.
    pub(crate) fn unlink_weakref(&mut self, weak: ObjectId) {
        let target = match self.heap.try_get_mut(weak).map(|e| &mut e.data) {
            Some(ObjectData::WeakRef(wr)) => wr.target.take(),
            _ => None,
        };
        if let Some(target) = target
            && let Some(entry) = self.heap.try_get_mut(target)
        {
            entry.weakrefs.retain(|&id| id != weak);
        }
    }

    /// Invokes queued weak reference callbacks. Errors are written to the
    /// unraisable channel attributed to `origin`.
    pub(crate) fn fire_weakref_callbacks(&mut self, origin: &str) {
        while let Some((weak, callback)) = self.pending_callbacks.pop_front() {
            match self.call(callback, &[weak], &[]) {
                Ok(result) => self.release(result),
                Err(err) => {
                    let context = format!("Exception ignored in {origin} {}", self.safe_repr(callback));
                    self.write_unraisable(err, &context);
                }
            }
            self.release(callback);
            self.release(weak);
        }
    }
}

fn weakref_repr(rt: &mut Runtime, weak: ObjectId) -> PyResult<String> {
    let target = rt.weakref(weak)?.target;
    Ok(match target {
        Some(target) => format!(
            "<weakref at {weak}; to '{}' at {target}>",
            rt.type_name_of(target)
        ),
        None => format!("<weakref at {weak}; dead>"),
    })
}

fn weakref_hash(rt: &mut Runtime, weak: ObjectId) -> PyResult<u32> {
    let wr = rt.weakref(weak)?;
    if let Some(hash) = wr.hash {
        return Ok(hash);
    }
    let Some(target) = wr.target else {
        return Err(PyErr::type_error("weak object has gone away"));
    };
    let hash = rt.hash(target)?;
    if let Some(ObjectData::WeakRef(wr)) = rt.heap.try_get_mut(weak).map(|e| &mut e.data) {
        wr.hash = Some(hash);
    }
    Ok(hash)
}

/// Live weakrefs compare their targets; otherwise identity decides.
fn weakref_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
        return Ok(None);
    }
    let (Ok(left), Ok(right)) = (rt.weakref(a).map(|w| w.target), rt.weakref(b).map(|w| w.target)) else {
        return Ok(None);
    };
    let equal = match (left, right) {
        (Some(x), Some(y)) => rt.rich_compare_bool(x, y, CompareOp::Eq)?,
        _ => a == b,
    };
    Ok(Some(equal == (op == CompareOp::Eq)))
}

/// Calling a weakref returns its target, or `None` once it is gone.
fn weakref_call(rt: &mut Runtime, weak: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !args.is_empty() || !kwargs.is_empty() {
        return Err(PyErr::type_error("weakref() takes no arguments"));
    }
    Ok(match rt.weak_get(weak)? {
        Some(target) => target,
        None => rt.none(),
    })
}

/// `weakref(target, callback=None)`.
fn weakref_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], _kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    match *args {
        [target] => rt.weak_new(target, None),
        [target, callback] => rt.weak_new(target, Some(callback)),
        _ => Err(PyErr::type_error(format!(
            "weakref expected 1 or 2 arguments, got {}",
            args.len()
        ))),
    }
}

pub(crate) fn weakref_slots() -> TypeSlots {
    TypeSlots {
        new: Some(weakref_new),
        repr: Some(weakref_repr),
        hash: Some(weakref_hash),
        richcompare: Some(weakref_richcompare),
        call: Some(weakref_call),
        ..TypeSlots::default()
    }
}
