//! Insertion-ordered hash map keyed by object hash and equality.

use std::collections::HashMap;

use crate::error::{ErrorKind, PyErr};
use crate::object::{ObjectData, ObjectId};
use crate::objects::{hash_not_implemented, hash_str};
use crate::runtime::Runtime;
use crate::traversal::Traverse;
use crate::types::{BuiltinType, CompareOp, TypeSlots};
use crate::PyResult;

#[derive(Debug, Clone, Copy)]
struct DictEntry {
    hash: u32,
    key: ObjectId,
    value: ObjectId,
}

/// Keys and values are owned references.
#[derive(Debug, Default)]
pub struct Dict {
    entries: Vec<Option<DictEntry>>,
    index: HashMap<u32, Vec<usize>>,
    len: usize,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn candidates(&self, hash: u32) -> impl Iterator<Item = (usize, &DictEntry)> + '_ {
        self.index
            .get(&hash)
            .into_iter()
            .flatten()
            .filter_map(|&slot| self.entries[slot].as_ref().map(|entry| (slot, entry)))
    }

    fn key_at(&self, slot: usize) -> Option<ObjectId> {
        self.entries.get(slot)?.as_ref().map(|e| e.key)
    }

    fn insert_new(&mut self, hash: u32, key: ObjectId, value: ObjectId) {
        let slot = self.entries.len();
        self.entries.push(Some(DictEntry { hash, key, value }));
        self.index.entry(hash).or_default().push(slot);
        self.len += 1;
    }

    fn replace_value(&mut self, slot: usize, value: ObjectId) -> Option<ObjectId> {
        let entry = self.entries.get_mut(slot)?.as_mut()?;
        Some(std::mem::replace(&mut entry.value, value))
    }

    fn remove_slot(&mut self, slot: usize) -> Option<DictEntry> {
        let entry = self.entries.get_mut(slot)?.take()?;
        if let Some(slots) = self.index.get_mut(&entry.hash) {
            slots.retain(|&s| s != slot);
            if slots.is_empty() {
                self.index.remove(&entry.hash);
            }
        }
        self.len -= 1;
        self.maybe_compact();
        Some(entry)
    }

    /// Drops vacated slots once they outnumber live ones.
    fn maybe_compact(&mut self) {
        if self.entries.len() < 16 || self.len * 2 > self.entries.len() {
            return;
        }
        let live: Vec<DictEntry> = self.entries.drain(..).flatten().collect();
        self.index.clear();
        self.len = 0;
        for entry in live {
            self.insert_new(entry.hash, entry.key, entry.value);
        }
    }

    /// Live `(key, value)` pairs in insertion order, borrowed.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.entries.iter().flatten().map(|e| (e.key, e.value))
    }

    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        for entry in self.entries.drain(..).flatten() {
            out.push(entry.key);
            out.push(entry.value);
        }
        self.index.clear();
        self.len = 0;
    }
}

impl Traverse for Dict {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        self.iter().all(|(key, value)| visit(key) && visit(value))
    }
}

impl Runtime {
    pub fn new_dict(&mut self) -> ObjectId {
        self.alloc_builtin(BuiltinType::Dict, ObjectData::Dict(Dict::new()))
    }

    pub(crate) fn dict_ref(&self, d: ObjectId) -> PyResult<&Dict> {
        match &self.heap.get(d)?.data {
            ObjectData::Dict(dict) => Ok(dict),
            _ => Err(PyErr::type_error(format!(
                "expected dict, got '{}'",
                self.type_name_of(d)
            ))),
        }
    }

    fn dict_mut(&mut self, d: ObjectId) -> PyResult<&mut Dict> {
        let name = self.type_name_of(d);
        match &mut self.heap.get_mut(d)?.data {
            ObjectData::Dict(dict) => Ok(dict),
            _ => Err(PyErr::type_error(format!("expected dict, got '{name}'"))),
        }
    }

    /// Finds the slot holding a key equal to `key`. Equality may run user
    /// code, so candidates are compared one at a time without holding a
    /// borrow of the dict.
    fn dict_lookup(&mut self, d: ObjectId, key: ObjectId, hash: u32) -> PyResult<Option<usize>> {
        let candidates: Vec<(usize, ObjectId)> = self
            .dict_ref(d)?
            .candidates(hash)
            .map(|(slot, entry)| (slot, entry.key))
            .collect();

        for (slot, candidate) in candidates {
            if candidate == key {
                return Ok(Some(slot));
            }
            self.retain(candidate);
            let equal = self.rich_compare_bool(candidate, key, CompareOp::Eq);
            self.release(candidate);
            if equal? {
                if self.dict_ref(d)?.key_at(slot) != Some(candidate) {
                    return Err(PyErr::runtime_error("dictionary changed size during lookup"));
                }
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    pub fn dict_len(&self, d: ObjectId) -> PyResult<usize> {
        Ok(self.dict_ref(d)?.len())
    }

    /// Value stored under `key`, as a new reference.
    pub fn dict_get(&mut self, d: ObjectId, key: ObjectId) -> PyResult<Option<ObjectId>> {
        let hash = self.hash(key)?;
        let Some(slot) = self.dict_lookup(d, key, hash)? else {
            return Ok(None);
        };
        let value = self.dict_ref(d)?.entries[slot].map(|e| e.value);
        Ok(value.map(|v| self.retain(v)))
    }

    /// String-keyed lookup that never runs user code. The result is borrowed.
    pub fn dict_get_str(&self, d: ObjectId, name: &str) -> PyResult<Option<ObjectId>> {
        Ok(self.dict_find_str(d, name)?.map(|(_, value)| value))
    }

    /// `(name, value)` for every string key, values borrowed.
    pub(crate) fn dict_str_entries(&self, d: ObjectId) -> PyResult<Vec<(String, ObjectId)>> {
        let dict = self.dict_ref(d)?;
        Ok(dict
            .iter()
            .filter_map(|(key, value)| match self.heap.try_get(key).map(|e| &e.data) {
                Some(ObjectData::Str(name)) => Some((name.to_string(), value)),
                _ => None,
            })
            .collect())
    }

    fn dict_find_str(&self, d: ObjectId, name: &str) -> PyResult<Option<(usize, ObjectId)>> {
        let dict = self.dict_ref(d)?;
        for (slot, entry) in dict.candidates(hash_str(name)) {
            if let Some(ObjectData::Str(key)) = self.heap.try_get(entry.key).map(|e| &e.data)
                && &**key == name
            {
                return Ok(Some((slot, entry.value)));
            }
        }
        Ok(None)
    }

    /// Stores `value` under `key`; both are borrowed.
    pub fn dict_set(&mut self, d: ObjectId, key: ObjectId, value: ObjectId) -> PyResult<()> {
        self.dict_ref(d)?;
        let hash = self.hash(key)?;
        let slot = self.dict_lookup(d, key, hash)?;

        self.retain(value);
        match slot {
            Some(slot) => {
                let old = self.dict_mut(d)?.replace_value(slot, value);
                if let Some(old) = old {
                    self.release(old);
                }
            }
            None => {
                self.retain(key);
                self.dict_mut(d)?.insert_new(hash, key, value);
            }
        }
        Ok(())
    }

    pub fn dict_set_str(&mut self, d: ObjectId, name: &str, value: ObjectId) -> PyResult<()> {
        let key = self.intern(name);
        let result = self.dict_set(d, key, value);
        self.release(key);
        result
    }

    /// Removes `key`, raising `KeyError` when absent.
    pub fn dict_del(&mut self, d: ObjectId, key: ObjectId) -> PyResult<()> {
        let hash = self.hash(key)?;
        let Some(slot) = self.dict_lookup(d, key, hash)? else {
            return Err(PyErr::key_error(self.safe_repr(key)));
        };
        self.dict_remove_slot(d, slot)
    }

    /// Removes a string key. Returns false when it was absent.
    pub fn dict_del_str(&mut self, d: ObjectId, name: &str) -> PyResult<bool> {
        let Some((slot, _)) = self.dict_find_str(d, name)? else {
            return Ok(false);
        };
        self.dict_remove_slot(d, slot)?;
        Ok(true)
    }

    fn dict_remove_slot(&mut self, d: ObjectId, slot: usize) -> PyResult<()> {
        if let Some(entry) = self.dict_mut(d)?.remove_slot(slot) {
            self.release(entry.key);
            self.release(entry.value);
        }
        Ok(())
    }

    pub fn dict_contains(&mut self, d: ObjectId, key: ObjectId) -> PyResult<bool> {
        let hash = self.hash(key)?;
        Ok(self.dict_lookup(d, key, hash)?.is_some())
    }

    /// Snapshot of the entries with each key and value retained. The caller
    /// releases them.
    pub(crate) fn dict_snapshot(&mut self, d: ObjectId) -> PyResult<Vec<(ObjectId, ObjectId)>> {
        let pairs: Vec<(ObjectId, ObjectId)> = self.dict_ref(d)?.iter().collect();
        for &(key, value) in &pairs {
            self.retain(key);
            self.retain(value);
        }
        Ok(pairs)
    }

    fn release_pairs(&mut self, pairs: Vec<(ObjectId, ObjectId)>) {
        for (key, value) in pairs {
            self.release(key);
            self.release(value);
        }
    }

    pub fn dict_keys(&mut self, d: ObjectId) -> PyResult<ObjectId> {
        let keys: Vec<ObjectId> = self.dict_ref(d)?.iter().map(|(k, _)| k).collect();
        Ok(self.new_list(&keys))
    }

    pub fn dict_values(&mut self, d: ObjectId) -> PyResult<ObjectId> {
        let values: Vec<ObjectId> = self.dict_ref(d)?.iter().map(|(_, v)| v).collect();
        Ok(self.new_list(&values))
    }

    /// `(key, value)` tuples in insertion order, as a new list.
    pub fn dict_items(&mut self, d: ObjectId) -> PyResult<ObjectId> {
        let pairs: Vec<(ObjectId, ObjectId)> = self.dict_ref(d)?.iter().collect();
        let mut tuples = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            tuples.push(self.new_tuple(&[key, value]));
        }
        let list = self.new_list(&tuples);
        self.release_all(tuples);
        Ok(list)
    }

    /// Copies every entry of `src` into `dst`. Existing keys are replaced
    /// only when `overwrite` is set; otherwise a duplicate is a `KeyError`.
    pub fn dict_merge(&mut self, dst: ObjectId, src: ObjectId, overwrite: bool) -> PyResult<()> {
        let pairs = self.dict_snapshot(src)?;
        let mut result = Ok(());
        for &(key, value) in &pairs {
            if !overwrite && self.dict_contains(dst, key)? {
                result = Err(PyErr::key_error(self.safe_repr(key)));
                break;
            }
            if let Err(err) = self.dict_set(dst, key, value) {
                result = Err(err);
                break;
            }
        }
        self.release_pairs(pairs);
        result
    }

    pub fn dict_copy(&mut self, d: ObjectId) -> PyResult<ObjectId> {
        self.dict_ref(d)?;
        let copy = self.new_dict();
        if let Err(err) = self.dict_merge(copy, d, true) {
            self.release(copy);
            return Err(err);
        }
        Ok(copy)
    }
}

fn dict_repr(rt: &mut Runtime, d: ObjectId) -> PyResult<String> {
    if rt.dict_len(d)? == 0 {
        return Ok("{}".to_string());
    }
    if !rt.repr_enter(d) {
        return Ok("{...}".to_string());
    }
    let result = rt.dict_snapshot(d).and_then(|pairs| {
        let text = repr_pairs(rt, &pairs);
        rt.release_pairs(pairs);
        text
    });
    rt.repr_leave(d);
    result
}

fn repr_pairs(rt: &mut Runtime, pairs: &[(ObjectId, ObjectId)]) -> PyResult<String> {
    let mut parts = Vec::with_capacity(pairs.len());
    for &(key, value) in pairs {
        let key = rt.repr(key)?;
        let value = rt.repr(value)?;
        parts.push(format!("{key}: {value}"));
    }
    Ok(format!("{{{}}}", parts.join(", ")))
}

fn dict_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
        return Ok(None);
    }
    let (Ok(left_len), Ok(right_len)) = (rt.dict_len(a), rt.dict_len(b)) else {
        return Ok(None);
    };
    let mut equal = left_len == right_len;
    if equal {
        let pairs = rt.dict_snapshot(a)?;
        for &(key, value) in &pairs {
            let other = match rt.dict_get(b, key) {
                Ok(other) => other,
                Err(err) => {
                    rt.release_pairs(pairs);
                    return Err(err);
                }
            };
            let Some(other) = other else {
                equal = false;
                break;
            };
            let same = rt.rich_compare_bool(value, other, CompareOp::Eq);
            rt.release(other);
            match same {
                Ok(true) => {}
                Ok(false) => {
                    equal = false;
                    break;
                }
                Err(err) => {
                    rt.release_pairs(pairs);
                    return Err(err);
                }
            }
        }
        rt.release_pairs(pairs);
    }
    Ok(Some(if op == CompareOp::Eq { equal } else { !equal }))
}

fn dict_length(rt: &mut Runtime, d: ObjectId) -> PyResult<usize> {
    rt.dict_len(d)
}

fn dict_subscript(rt: &mut Runtime, d: ObjectId, key: ObjectId) -> PyResult<ObjectId> {
    match rt.dict_get(d, key)? {
        Some(value) => Ok(value),
        None => Err(PyErr::key_error(rt.safe_repr(key))),
    }
}

fn dict_ass_subscript(rt: &mut Runtime, d: ObjectId, key: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
    match value {
        Some(value) => rt.dict_set(d, key, value),
        None => rt.dict_del(d, key),
    }
}

fn dict_contains(rt: &mut Runtime, d: ObjectId, key: ObjectId) -> PyResult<bool> {
    rt.dict_contains(d, key)
}

fn dict_copy(rt: &mut Runtime, d: ObjectId) -> PyResult<ObjectId> {
    rt.dict_copy(d)
}

fn dict_keys(rt: &mut Runtime, d: ObjectId) -> PyResult<ObjectId> {
    rt.dict_keys(d)
}

fn dict_values(rt: &mut Runtime, d: ObjectId) -> PyResult<ObjectId> {
    rt.dict_values(d)
}

fn dict_items(rt: &mut Runtime, d: ObjectId) -> PyResult<ObjectId> {
    rt.dict_items(d)
}

fn dict_iter(rt: &mut Runtime, d: ObjectId) -> PyResult<ObjectId> {
    let keys = rt.dict_keys(d)?;
    let iter = rt.new_seq_iter(keys);
    rt.release(keys);
    Ok(iter)
}

/// `dict()`, `dict(mapping)` and `dict(**kwargs)`.
fn dict_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if args.len() > 1 {
        return Err(PyErr::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.len()
        )));
    }
    let d = rt.new_dict();
    let filled = (|| {
        if let Some(&source) = args.first() {
            rt.dict_merge(d, source, true).map_err(|err| {
                if err.is(ErrorKind::TypeError) {
                    PyErr::type_error(format!(
                        "'{}' object is not a mapping",
                        rt.type_name_of(source)
                    ))
                } else {
                    err
                }
            })?;
        }
        for &(name, value) in kwargs {
            rt.dict_set_str(d, name, value)?;
        }
        Ok(())
    })();
    match filled {
        Ok(()) => Ok(d),
        Err(err) => {
            rt.release(d);
            Err(err)
        }
    }
}

pub(crate) fn dict_slots() -> TypeSlots {
    let mut slots = TypeSlots {
        new: Some(dict_new),
        repr: Some(dict_repr),
        hash: Some(hash_not_implemented),
        richcompare: Some(dict_richcompare),
        iter: Some(dict_iter),
        copy: Some(dict_copy),
        ..TypeSlots::default()
    };
    slots.mapping.length = Some(dict_length);
    slots.mapping.subscript = Some(dict_subscript);
    slots.mapping.ass_subscript = Some(dict_ass_subscript);
    slots.mapping.keys = Some(dict_keys);
    slots.mapping.values = Some(dict_values);
    slots.mapping.items = Some(dict_items);
    slots.sequence.contains = Some(dict_contains);
    slots
}
