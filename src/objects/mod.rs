//! Concrete object layouts and the operation tables of the built-in types.
//!
//! Only the minimal algorithms the object core needs live here; richer
//! container behaviour belongs to the evaluator's standard library.

pub mod descriptor;
pub mod dict;
pub mod float;
pub mod function;
pub mod instance;
pub mod int;
pub mod iter;
pub mod list;
pub mod str;
pub mod tuple;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::runtime::Runtime;
use crate::types::{CompareOp, TypeSlots};
use crate::PyResult;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

pub fn hash_bytes(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ u32::from(b)).wrapping_mul(FNV_PRIME))
}

pub fn hash_str(s: &str) -> u32 {
    hash_bytes(s.as_bytes())
}

/// Hash of an integral value. Shared by `int`, `bool` and integral floats so
/// that `1 == 1.0 == True` hash alike.
pub fn hash_i64(v: i64) -> u32 {
    let bits = v as u64;
    (bits ^ (bits >> 32)) as u32
}

/// Order-dependent combination used by tuples.
pub fn hash_combine(acc: u32, item: u32) -> u32 {
    (acc ^ item)
        .wrapping_mul(0x0100_0193)
        .rotate_left(13)
        .wrapping_add(0x9e37_79b9)
}

/// Object identity hash.
pub fn hash_identity(id: ObjectId) -> u32 {
    let addr = id.address() as u64;
    ((addr >> 4) ^ (addr >> 36)) as u32
}

/// Hash slot of mutable containers.
pub(crate) fn hash_not_implemented(rt: &mut Runtime, obj: ObjectId) -> PyResult<u32> {
    Err(PyErr::type_error(format!(
        "unhashable type: '{}'",
        rt.type_name_of(obj)
    )))
}

/// Normalises a possibly negative sequence index.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

fn none_repr(_rt: &mut Runtime, _obj: ObjectId) -> PyResult<String> {
    Ok("None".to_string())
}

fn none_bool(_rt: &mut Runtime, _obj: ObjectId) -> PyResult<bool> {
    Ok(false)
}

fn none_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !args.is_empty() || !kwargs.is_empty() {
        return Err(PyErr::type_error("NoneType takes no arguments"));
    }
    Ok(rt.none())
}

pub(crate) fn none_slots() -> TypeSlots {
    let mut slots = TypeSlots {
        new: Some(none_new),
        repr: Some(none_repr),
        ..TypeSlots::default()
    };
    slots.number.bool = Some(none_bool);
    slots
}

fn not_implemented_repr(_rt: &mut Runtime, _obj: ObjectId) -> PyResult<String> {
    Ok("NotImplemented".to_string())
}

pub(crate) fn not_implemented_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(not_implemented_repr),
        ..TypeSlots::default()
    }
}

fn cell_contents(rt: &Runtime, cell: ObjectId) -> PyResult<Option<ObjectId>> {
    match &rt.heap.get(cell)?.data {
        ObjectData::Cell(contents) => Ok(*contents),
        _ => Err(PyErr::system_error("expected a cell")),
    }
}

fn cell_repr(rt: &mut Runtime, cell: ObjectId) -> PyResult<String> {
    Ok(match cell_contents(rt, cell)? {
        Some(value) => format!(
            "<cell at {cell}: {} object at {value}>",
            rt.type_name_of(value)
        ),
        None => format!("<cell at {cell}: empty>"),
    })
}

fn cell_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let (Ok(left), Ok(right)) = (cell_contents(rt, a), cell_contents(rt, b)) else {
        return Ok(None);
    };
    match (left, right) {
        (Some(x), Some(y)) => rt.rich_compare_bool(x, y, op).map(Some),
        (x, y) => Ok(Some(op.matches(x.is_some().cmp(&y.is_some())))),
    }
}

pub(crate) fn cell_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(cell_repr),
        richcompare: Some(cell_richcompare),
        hash: Some(hash_not_implemented),
        ..TypeSlots::default()
    }
}

impl Runtime {
    /// A closure cell holding `value` (a borrowed reference).
    pub fn new_cell(&mut self, value: Option<ObjectId>) -> ObjectId {
        if let Some(v) = value {
            self.retain(v);
        }
        self.alloc_builtin(crate::types::BuiltinType::Cell, ObjectData::Cell(value))
    }

    /// The cell's contents as a new reference.
    pub fn cell_get(&mut self, cell: ObjectId) -> PyResult<Option<ObjectId>> {
        let contents = cell_contents(self, cell)?;
        Ok(contents.map(|v| self.retain(v)))
    }

    pub fn cell_set(&mut self, cell: ObjectId, value: Option<ObjectId>) -> PyResult<()> {
        cell_contents(self, cell)?;
        if let Some(v) = value {
            self.retain(v);
        }
        let old = match &mut self.heap.get_mut(cell)?.data {
            ObjectData::Cell(contents) => std::mem::replace(contents, value),
            _ => None,
        };
        if let Some(old) = old {
            self.release(old);
        }
        Ok(())
    }
}
