//! The generic sequence iterator: walks `sequence.item` from index 0 until
//! it raises `IndexError`.

use crate::error::{ErrorKind, PyErr};
use crate::object::{ObjectData, ObjectId};
use crate::runtime::Runtime;
use crate::traversal::Traverse;
use crate::types::{BuiltinType, TypeSlots};
use crate::PyResult;

#[derive(Debug)]
pub struct SeqIter {
    /// Owned; dropped once the iterator is exhausted.
    pub(crate) seq: Option<ObjectId>,
    pub(crate) index: i64,
}

impl Traverse for SeqIter {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        self.seq.is_none_or(|id| visit(id))
    }
}

impl SeqIter {
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        out.extend(self.seq.take());
    }
}

impl Runtime {
    /// Iterator over a borrowed sequence.
    pub fn new_seq_iter(&mut self, seq: ObjectId) -> ObjectId {
        self.retain(seq);
        self.alloc_builtin(
            BuiltinType::Iterator,
            ObjectData::Iter(SeqIter {
                seq: Some(seq),
                index: 0,
            }),
        )
    }
}

/// `iter` slot of the built-in sequences.
pub(crate) fn seq_iter(rt: &mut Runtime, seq: ObjectId) -> PyResult<ObjectId> {
    Ok(rt.new_seq_iter(seq))
}

fn iter_state(rt: &Runtime, it: ObjectId) -> PyResult<(Option<ObjectId>, i64)> {
    match &rt.heap.get(it)?.data {
        ObjectData::Iter(state) => Ok((state.seq, state.index)),
        _ => Err(PyErr::system_error("expected a sequence iterator")),
    }
}

fn iter_state_mut(rt: &mut Runtime, it: ObjectId) -> PyResult<&mut SeqIter> {
    match &mut rt.heap.get_mut(it)?.data {
        ObjectData::Iter(state) => Ok(state),
        _ => Err(PyErr::system_error("expected a sequence iterator")),
    }
}

fn iter_next(rt: &mut Runtime, it: ObjectId) -> PyResult<Option<ObjectId>> {
    let (Some(seq), index) = iter_state(rt, it)? else {
        return Ok(None);
    };
    let item = rt.slots_of(seq)?.sequence.item.ok_or_else(|| {
        PyErr::type_error(format!("'{}' object is not iterable", rt.type_name_of(seq)))
    })?;

    match item(rt, seq, index) {
        Ok(value) => {
            iter_state_mut(rt, it)?.index += 1;
            Ok(Some(value))
        }
        Err(err) if err.is(ErrorKind::IndexError) || err.is(ErrorKind::StopIteration) => {
            let exhausted = iter_state_mut(rt, it)?.seq.take();
            if let Some(seq) = exhausted {
                rt.release(seq);
            }
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn iter_self(rt: &mut Runtime, it: ObjectId) -> PyResult<ObjectId> {
    Ok(rt.retain(it))
}

fn iter_length(rt: &mut Runtime, it: ObjectId) -> PyResult<usize> {
    let (Some(seq), index) = iter_state(rt, it)? else {
        return Ok(0);
    };
    let len = rt.measure(seq)?;
    Ok(len.saturating_sub(usize::try_from(index).unwrap_or(0)))
}

pub(crate) fn iter_slots() -> TypeSlots {
    let mut slots = TypeSlots {
        iter: Some(iter_self),
        iternext: Some(iter_next),
        ..TypeSlots::default()
    };
    slots.sequence.length = Some(iter_length);
    slots
}
