//! `list`: the mutable sequence.

use std::cmp::Ordering;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::hash_not_implemented;
use crate::objects::iter::seq_iter;
use crate::objects::normalize_index;
use crate::objects::tuple::{
    collect_iterable, seq_contains, seq_item_at, seq_length, seq_repr, seq_richcompare,
};
use crate::runtime::Runtime;
use crate::types::{BuiltinType, CompareOp, TypeSlots};
use crate::PyResult;

impl Runtime {
    /// A list holding `items` (borrowed; the list takes its own references).
    pub fn new_list(&mut self, items: &[ObjectId]) -> ObjectId {
        for &item in items {
            self.retain(item);
        }
        self.alloc_builtin(BuiltinType::List, ObjectData::List(items.to_vec()))
    }

    fn list_vec_mut(&mut self, list: ObjectId) -> PyResult<&mut Vec<ObjectId>> {
        let name = self.type_name_of(list);
        match &mut self.heap.get_mut(list)?.data {
            ObjectData::List(items) => Ok(items),
            _ => Err(PyErr::type_error(format!("expected list, got '{name}'"))),
        }
    }

    /// Borrowed copy of a list's items.
    pub fn list_items(&self, list: ObjectId) -> PyResult<Vec<ObjectId>> {
        match &self.heap.get(list)?.data {
            ObjectData::List(items) => Ok(items.clone()),
            _ => Err(PyErr::type_error(format!(
                "expected list, got '{}'",
                self.type_name_of(list)
            ))),
        }
    }

    pub fn list_len(&self, list: ObjectId) -> PyResult<usize> {
        match &self.heap.get(list)?.data {
            ObjectData::List(items) => Ok(items.len()),
            _ => Err(PyErr::type_error(format!(
                "expected list, got '{}'",
                self.type_name_of(list)
            ))),
        }
    }

    /// Appends a borrowed `value`.
    pub fn list_append(&mut self, list: ObjectId, value: ObjectId) -> PyResult<()> {
        self.list_vec_mut(list)?;
        self.retain(value);
        self.list_vec_mut(list)?.push(value);
        Ok(())
    }

    /// Replaces the item at `index`, or deletes it when `value` is `None`.
    pub fn list_set_item(&mut self, list: ObjectId, index: i64, value: Option<ObjectId>) -> PyResult<()> {
        let len = self.list_len(list)?;
        let Some(i) = normalize_index(index, len) else {
            return Err(PyErr::index_error("list assignment index out of range"));
        };
        if let Some(value) = value {
            self.retain(value);
        }
        let items = self.list_vec_mut(list)?;
        let old = match value {
            Some(value) => std::mem::replace(&mut items[i], value),
            None => items.remove(i),
        };
        self.release(old);
        Ok(())
    }

    /// Removes and returns (as a new reference) the item at `index`.
    pub fn list_pop(&mut self, list: ObjectId, index: i64) -> PyResult<ObjectId> {
        let len = self.list_len(list)?;
        if len == 0 {
            return Err(PyErr::index_error("pop from empty list"));
        }
        let Some(i) = normalize_index(index, len) else {
            return Err(PyErr::index_error("pop index out of range"));
        };
        Ok(self.list_vec_mut(list)?.remove(i))
    }

    /// Stable in-place sort using the total comparison order. The list is
    /// emptied while comparisons run; refilling it from user code is an
    /// error.
    pub fn list_sort(&mut self, list: ObjectId) -> PyResult<()> {
        let items = std::mem::take(self.list_vec_mut(list)?);
        let sorted = merge_sort(self, &items);

        let intruders = std::mem::take(self.list_vec_mut(list)?);
        let result = match sorted {
            Ok(sorted) if intruders.is_empty() => {
                *self.list_vec_mut(list)? = sorted;
                Ok(())
            }
            Ok(_) => {
                *self.list_vec_mut(list)? = items;
                Err(PyErr::value_error("list modified during sort"))
            }
            Err(err) => {
                *self.list_vec_mut(list)? = items;
                Err(err)
            }
        };
        self.release_all(intruders);
        result
    }
}

/// Bottom-up merge sort with a fallible comparison. Never panics on an
/// inconsistent ordering.
fn merge_sort(rt: &mut Runtime, items: &[ObjectId]) -> PyResult<Vec<ObjectId>> {
    let n = items.len();
    let mut src = items.to_vec();
    let mut width = 1;
    while width < n {
        let mut dst = Vec::with_capacity(n);
        for start in (0..n).step_by(2 * width) {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                if rt.compare(src[j], src[i])? == Ordering::Less {
                    dst.push(src[j]);
                    j += 1;
                } else {
                    dst.push(src[i]);
                    i += 1;
                }
            }
            dst.extend_from_slice(&src[i..mid]);
            dst.extend_from_slice(&src[j..end]);
        }
        src = dst;
        width *= 2;
    }
    Ok(src)
}

fn is_list(rt: &Runtime, obj: ObjectId) -> bool {
    matches!(rt.heap.try_get(obj).map(|e| &e.data), Some(ObjectData::List(_)))
}

fn list_repr(rt: &mut Runtime, list: ObjectId) -> PyResult<String> {
    seq_repr(rt, list, "[", "]", false)
}

fn list_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    if !is_list(rt, a) || !is_list(rt, b) {
        return Ok(None);
    }
    seq_richcompare(rt, a, b, op)
}

fn list_concat(rt: &mut Runtime, a: ObjectId, b: ObjectId) -> PyResult<ObjectId> {
    if !is_list(rt, b) {
        return Err(PyErr::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            rt.type_name_of(b)
        )));
    }
    let mut items = rt.list_items(a)?;
    items.extend(rt.list_items(b)?);
    Ok(rt.new_list(&items))
}

fn repeated_items(rt: &Runtime, list: ObjectId, count: i64) -> PyResult<Vec<ObjectId>> {
    let items = rt.list_items(list)?;
    let count = usize::try_from(count).unwrap_or(0);
    let total = items
        .len()
        .checked_mul(count)
        .ok_or_else(|| PyErr::overflow_error("repeated list is too long"))?;
    Ok(items.iter().copied().cycle().take(total).collect())
}

fn list_repeat(rt: &mut Runtime, list: ObjectId, count: i64) -> PyResult<ObjectId> {
    let items = repeated_items(rt, list, count)?;
    Ok(rt.new_list(&items))
}

fn list_item(rt: &mut Runtime, list: ObjectId, index: i64) -> PyResult<ObjectId> {
    let item = seq_item_at(rt, list, index, "list")?;
    Ok(rt.retain(item))
}

fn list_ass_item(rt: &mut Runtime, list: ObjectId, index: i64, value: Option<ObjectId>) -> PyResult<()> {
    rt.list_set_item(list, index, value)
}

/// `list += iterable` extends in place and yields the same list.
fn list_inplace_concat(rt: &mut Runtime, list: ObjectId, other: ObjectId) -> PyResult<ObjectId> {
    let items = collect_iterable(rt, other)?;
    rt.list_vec_mut(list)?.extend(items);
    Ok(rt.retain(list))
}

fn list_inplace_repeat(rt: &mut Runtime, list: ObjectId, count: i64) -> PyResult<ObjectId> {
    let items = repeated_items(rt, list, count)?;
    for &item in &items {
        rt.retain(item);
    }
    let old = std::mem::replace(rt.list_vec_mut(list)?, items);
    rt.release_all(old);
    Ok(rt.retain(list))
}

fn list_copy(rt: &mut Runtime, list: ObjectId) -> PyResult<ObjectId> {
    let items = rt.list_items(list)?;
    Ok(rt.new_list(&items))
}

/// `list()`, `list(iterable)`.
fn list_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("list() takes no keyword arguments"));
    }
    match *args {
        [] => Ok(rt.new_list(&[])),
        [iterable] => {
            let items = collect_iterable(rt, iterable)?;
            let list = rt.new_list(&items);
            rt.release_all(items);
            Ok(list)
        }
        _ => Err(PyErr::type_error(format!(
            "list expected at most 1 argument, got {}",
            args.len()
        ))),
    }
}

pub(crate) fn list_slots() -> TypeSlots {
    let mut slots = TypeSlots {
        new: Some(list_new),
        repr: Some(list_repr),
        hash: Some(hash_not_implemented),
        richcompare: Some(list_richcompare),
        iter: Some(seq_iter),
        copy: Some(list_copy),
        ..TypeSlots::default()
    };
    slots.sequence.length = Some(seq_length);
    slots.sequence.concat = Some(list_concat);
    slots.sequence.repeat = Some(list_repeat);
    slots.sequence.item = Some(list_item);
    slots.sequence.ass_item = Some(list_ass_item);
    slots.sequence.contains = Some(seq_contains);
    slots.sequence.inplace_concat = Some(list_inplace_concat);
    slots.sequence.inplace_repeat = Some(list_inplace_repeat);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use crate::types::BinaryOp;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default())
    }

    fn ints(rt: &mut Runtime, values: &[i64]) -> ObjectId {
        let items: Vec<ObjectId> = values.iter().map(|&v| rt.new_int(v)).collect();
        let list = rt.new_list(&items);
        rt.release_all(items);
        list
    }

    #[test]
    fn test_recursive_repr() {
        let mut rt = runtime();
        let list = rt.new_list(&[]);
        rt.list_append(list, list).unwrap();
        assert_eq!(rt.repr(list).unwrap(), "[[...]]");
    }

    #[test]
    fn test_set_delete_and_pop() {
        let mut rt = runtime();
        let list = ints(&mut rt, &[1, 2, 3]);
        let nine = rt.new_int(9);
        rt.list_set_item(list, -1, Some(nine)).unwrap();
        rt.list_set_item(list, 0, None).unwrap();
        assert_eq!(rt.repr(list).unwrap(), "[2, 9]");

        let popped = rt.list_pop(list, 0).unwrap();
        assert_eq!(rt.int_value(popped).unwrap(), 2);
        let err = rt.list_set_item(list, 5, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexError);
    }

    #[test]
    fn test_sort_mixed_numbers() {
        let mut rt = runtime();
        let list = ints(&mut rt, &[5, -1, 3]);
        let half = rt.new_float(0.5);
        rt.list_append(list, half).unwrap();
        rt.list_sort(list).unwrap();
        assert_eq!(rt.repr(list).unwrap(), "[-1, 0.5, 3, 5]");
    }

    #[test]
    fn test_sort_heterogeneous_is_total() {
        let mut rt = runtime();
        let none = rt.none();
        let text = rt.new_str("z");
        let one = rt.new_int(1);
        let list = rt.new_list(&[text, one, none]);
        rt.list_sort(list).unwrap();
        let items = rt.list_items(list).unwrap();
        assert_eq!(items[0], none);
        assert_eq!(rt.repr(list).unwrap(), "[None, 1, 'z']");
    }

    #[test]
    fn test_inplace_concat_keeps_identity() {
        let mut rt = runtime();
        let list = ints(&mut rt, &[1]);
        let text = rt.new_str("ab");
        let result = rt.inplace_op(list, text, BinaryOp::Add).unwrap();
        assert_eq!(result, list);
        rt.release(result);
        assert_eq!(rt.repr(list).unwrap(), "[1, 'a', 'b']");

        let two = rt.new_int(2);
        let doubled = rt.inplace_op(list, two, BinaryOp::Multiply).unwrap();
        assert_eq!(doubled, list);
        rt.release(doubled);
        assert_eq!(rt.list_len(list).unwrap(), 6);
    }

    #[test]
    fn test_concat_requires_list() {
        let mut rt = runtime();
        let a = ints(&mut rt, &[1]);
        let b = ints(&mut rt, &[2]);
        let joined = rt.binary_op(a, b, BinaryOp::Add).unwrap();
        assert_eq!(rt.repr(joined).unwrap(), "[1, 2]");
        let t = rt.new_tuple(&[]);
        let err = rt.binary_op(a, t, BinaryOp::Add).unwrap_err();
        assert_eq!(err.message, "can only concatenate list (not \"tuple\") to list");
        assert!(rt.equals(a, a).unwrap());
        let a2 = ints(&mut rt, &[1]);
        assert!(rt.equals(a, a2).unwrap());
    }

    #[test]
    fn test_unhashable() {
        let mut rt = runtime();
        let list = rt.new_list(&[]);
        assert_eq!(rt.hash(list).unwrap_err().message, "unhashable type: 'list'");
    }
}
