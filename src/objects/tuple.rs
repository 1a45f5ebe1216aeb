//! `tuple` and the element-wise helpers shared with `list`.

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::iter::seq_iter;
use crate::objects::{hash_combine, normalize_index};
use crate::runtime::Runtime;
use crate::types::{BuiltinType, CompareOp, TypeSlots};
use crate::PyResult;

const TUPLE_HASH_SEED: u32 = 0x0034_5678;

impl Runtime {
    /// A tuple holding `items` (borrowed; the tuple takes its own references).
    pub fn new_tuple(&mut self, items: &[ObjectId]) -> ObjectId {
        if items.is_empty() {
            let empty = self.empty_tuple();
            return self.retain(empty);
        }
        for &item in items {
            self.retain(item);
        }
        self.alloc_builtin(BuiltinType::Tuple, ObjectData::Tuple(items.to_vec()))
    }

    /// Borrowed copy of a tuple's items.
    pub fn tuple_items(&self, t: ObjectId) -> PyResult<Vec<ObjectId>> {
        match &self.heap.get(t)?.data {
            ObjectData::Tuple(items) => Ok(items.clone()),
            _ => Err(PyErr::type_error(format!(
                "expected tuple, got '{}'",
                self.type_name_of(t)
            ))),
        }
    }
}

/// Items of a tuple or list, each retained. Release with `release_all`.
pub(crate) fn seq_snapshot(rt: &mut Runtime, seq: ObjectId) -> PyResult<Vec<ObjectId>> {
    let items = match &rt.heap.get(seq)?.data {
        ObjectData::Tuple(items) | ObjectData::List(items) => items.clone(),
        _ => {
            return Err(PyErr::type_error(format!(
                "expected a sequence, got '{}'",
                rt.type_name_of(seq)
            )));
        }
    };
    for &item in &items {
        rt.retain(item);
    }
    Ok(items)
}

pub(crate) fn seq_items_len(rt: &Runtime, seq: ObjectId) -> PyResult<usize> {
    match &rt.heap.get(seq)?.data {
        ObjectData::Tuple(items) | ObjectData::List(items) => Ok(items.len()),
        _ => Err(PyErr::type_error(format!(
            "expected a sequence, got '{}'",
            rt.type_name_of(seq)
        ))),
    }
}

/// `open item, item close`, with the recursive placeholder when `seq` is
/// already being printed.
pub(crate) fn seq_repr(rt: &mut Runtime, seq: ObjectId, open: &str, close: &str, trailing_comma: bool) -> PyResult<String> {
    if !rt.repr_enter(seq) {
        return Ok(format!("{open}...{close}"));
    }
    let result = seq_snapshot(rt, seq).and_then(|items| {
        let mut parts = Vec::with_capacity(items.len());
        let mut failed = None;
        for &item in &items {
            match rt.repr(item) {
                Ok(text) => parts.push(text),
                Err(err) => {
                    failed = Some(err);
                    break;
                }
            }
        }
        let count = items.len();
        rt.release_all(items);
        if let Some(err) = failed {
            return Err(err);
        }
        let comma = if trailing_comma && count == 1 { "," } else { "" };
        Ok(format!("{open}{}{comma}{close}", parts.join(", ")))
    });
    rt.repr_leave(seq);
    result
}

/// Lexicographic comparison of two tuples or two lists.
pub(crate) fn seq_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let left = seq_snapshot(rt, a)?;
    let right = match seq_snapshot(rt, b) {
        Ok(items) => items,
        Err(err) => {
            rt.release_all(left);
            return Err(err);
        }
    };
    let result = compare_items(rt, &left, &right, op);
    rt.release_all(left);
    rt.release_all(right);
    result.map(Some)
}

fn compare_items(rt: &mut Runtime, left: &[ObjectId], right: &[ObjectId], op: CompareOp) -> PyResult<bool> {
    if left.len() != right.len() && matches!(op, CompareOp::Eq | CompareOp::Ne) {
        return Ok(op == CompareOp::Ne);
    }
    for (&x, &y) in left.iter().zip(right) {
        if !rt.rich_compare_bool(x, y, CompareOp::Eq)? {
            return match op {
                CompareOp::Eq => Ok(false),
                CompareOp::Ne => Ok(true),
                _ => rt.rich_compare_bool(x, y, op),
            };
        }
    }
    Ok(op.matches(left.len().cmp(&right.len())))
}

pub(crate) fn seq_contains(rt: &mut Runtime, seq: ObjectId, value: ObjectId) -> PyResult<bool> {
    let items = seq_snapshot(rt, seq)?;
    let mut result = Ok(false);
    for &item in &items {
        match rt.rich_compare_bool(item, value, CompareOp::Eq) {
            Ok(false) => {}
            other => {
                result = other;
                break;
            }
        }
    }
    rt.release_all(items);
    result
}

pub(crate) fn seq_length(rt: &mut Runtime, seq: ObjectId) -> PyResult<usize> {
    seq_items_len(rt, seq)
}

/// Borrowed item at a possibly negative index.
pub(crate) fn seq_item_at(rt: &Runtime, seq: ObjectId, index: i64, what: &str) -> PyResult<ObjectId> {
    let item = match &rt.heap.get(seq)?.data {
        ObjectData::Tuple(items) | ObjectData::List(items) => {
            normalize_index(index, items.len()).map(|i| items[i])
        }
        _ => None,
    };
    item.ok_or_else(|| PyErr::index_error(format!("{what} index out of range")))
}

/// Expands an iterable into owned items.
pub(crate) fn collect_iterable(rt: &mut Runtime, iterable: ObjectId) -> PyResult<Vec<ObjectId>> {
    let iter = rt.iterate(iterable)?;
    let mut items = Vec::new();
    loop {
        match rt.next(iter) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => break,
            Err(err) => {
                rt.release(iter);
                rt.release_all(items);
                return Err(err);
            }
        }
    }
    rt.release(iter);
    Ok(items)
}

fn tuple_repr(rt: &mut Runtime, t: ObjectId) -> PyResult<String> {
    seq_repr(rt, t, "(", ")", true)
}

fn tuple_hash(rt: &mut Runtime, t: ObjectId) -> PyResult<u32> {
    let items = seq_snapshot(rt, t)?;
    let mut acc = TUPLE_HASH_SEED;
    let mut result = Ok(());
    for &item in &items {
        match rt.hash(item) {
            Ok(h) => acc = hash_combine(acc, h),
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    let len = items.len() as u32;
    rt.release_all(items);
    result.map(|()| hash_combine(acc, len))
}

fn tuple_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let both = [a, b].iter().all(|&id| {
        matches!(rt.heap.try_get(id).map(|e| &e.data), Some(ObjectData::Tuple(_)))
    });
    if !both {
        return Ok(None);
    }
    seq_richcompare(rt, a, b, op)
}

fn tuple_concat(rt: &mut Runtime, a: ObjectId, b: ObjectId) -> PyResult<ObjectId> {
    let Ok(right) = rt.tuple_items(b) else {
        return Err(PyErr::type_error(format!(
            "can only concatenate tuple (not \"{}\") to tuple",
            rt.type_name_of(b)
        )));
    };
    let mut items = rt.tuple_items(a)?;
    items.extend(right);
    Ok(rt.new_tuple(&items))
}

fn tuple_repeat(rt: &mut Runtime, t: ObjectId, count: i64) -> PyResult<ObjectId> {
    let items = rt.tuple_items(t)?;
    let count = usize::try_from(count).unwrap_or(0);
    if count == 1 {
        return Ok(rt.retain(t));
    }
    let total = items
        .len()
        .checked_mul(count)
        .ok_or_else(|| PyErr::overflow_error("repeated tuple is too long"))?;
    let repeated: Vec<ObjectId> = items.iter().copied().cycle().take(total).collect();
    Ok(rt.new_tuple(&repeated))
}

fn tuple_item(rt: &mut Runtime, t: ObjectId, index: i64) -> PyResult<ObjectId> {
    let item = seq_item_at(rt, t, index, "tuple")?;
    Ok(rt.retain(item))
}

/// `tuple()`, `tuple(iterable)`.
fn tuple_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("tuple() takes no keyword arguments"));
    }
    match *args {
        [] => Ok(rt.new_tuple(&[])),
        [iterable] => {
            if matches!(rt.heap.get(iterable)?.data, ObjectData::Tuple(_)) {
                return Ok(rt.retain(iterable));
            }
            let items = collect_iterable(rt, iterable)?;
            let tuple = rt.new_tuple(&items);
            rt.release_all(items);
            Ok(tuple)
        }
        _ => Err(PyErr::type_error(format!(
            "tuple expected at most 1 argument, got {}",
            args.len()
        ))),
    }
}

pub(crate) fn tuple_slots() -> TypeSlots {
    let mut slots = TypeSlots {
        new: Some(tuple_new),
        repr: Some(tuple_repr),
        hash: Some(tuple_hash),
        richcompare: Some(tuple_richcompare),
        iter: Some(seq_iter),
        ..TypeSlots::default()
    };
    slots.sequence.length = Some(seq_length);
    slots.sequence.concat = Some(tuple_concat);
    slots.sequence.repeat = Some(tuple_repeat);
    slots.sequence.item = Some(tuple_item);
    slots.sequence.contains = Some(seq_contains);
    slots
}
