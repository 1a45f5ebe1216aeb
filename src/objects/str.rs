//! `str`: immutable text.

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::hash_str;
use crate::objects::iter::seq_iter;
use crate::runtime::Runtime;
use crate::types::{BuiltinType, CompareOp, TypeSlots};
use crate::PyResult;

/// Quotes `s` the way the language's `repr` does: single quotes unless the
/// text contains a single quote and no double quote.
pub fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

impl Runtime {
    pub fn new_str(&mut self, value: &str) -> ObjectId {
        self.alloc_builtin(BuiltinType::Str, ObjectData::Str(value.into()))
    }

    /// Borrowed text of a `str`.
    pub fn str_value(&self, obj: ObjectId) -> PyResult<&str> {
        match &self.heap.get(obj)?.data {
            ObjectData::Str(s) => Ok(s),
            _ => Err(PyErr::type_error(format!(
                "expected str, got '{}'",
                self.type_name_of(obj)
            ))),
        }
    }

    pub fn is_str(&self, obj: ObjectId) -> bool {
        matches!(
            self.heap.try_get(obj).map(|e| &e.data),
            Some(ObjectData::Str(_))
        )
    }
}

fn text_of(rt: &Runtime, obj: ObjectId) -> PyResult<String> {
    rt.str_value(obj).map(str::to_string)
}

fn str_repr(rt: &mut Runtime, obj: ObjectId) -> PyResult<String> {
    Ok(quote(rt.str_value(obj)?))
}

fn str_str(rt: &mut Runtime, obj: ObjectId) -> PyResult<String> {
    text_of(rt, obj)
}

fn str_hash(rt: &mut Runtime, obj: ObjectId) -> PyResult<u32> {
    Ok(hash_str(rt.str_value(obj)?))
}

fn str_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let (Ok(x), Ok(y)) = (rt.str_value(a), rt.str_value(b)) else {
        return Ok(None);
    };
    Ok(Some(op.matches(x.cmp(y))))
}

fn str_length(rt: &mut Runtime, obj: ObjectId) -> PyResult<usize> {
    Ok(rt.str_value(obj)?.chars().count())
}

fn str_concat(rt: &mut Runtime, a: ObjectId, b: ObjectId) -> PyResult<ObjectId> {
    let Ok(right) = rt.str_value(b) else {
        return Err(PyErr::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            rt.type_name_of(b)
        )));
    };
    let joined = format!("{}{right}", rt.str_value(a)?);
    Ok(rt.new_str(&joined))
}

fn str_repeat(rt: &mut Runtime, obj: ObjectId, count: i64) -> PyResult<ObjectId> {
    let text = rt.str_value(obj)?;
    let count = usize::try_from(count).unwrap_or(0);
    if text.len().checked_mul(count).is_none_or(|n| n > isize::MAX as usize) {
        return Err(PyErr::overflow_error("repeated string is too long"));
    }
    let repeated = text.repeat(count);
    Ok(rt.new_str(&repeated))
}

fn str_item(rt: &mut Runtime, obj: ObjectId, index: i64) -> PyResult<ObjectId> {
    let text = rt.str_value(obj)?;
    let len = text.chars().count();
    let c = crate::objects::normalize_index(index, len)
        .and_then(|i| text.chars().nth(i))
        .ok_or_else(|| PyErr::index_error("string index out of range"))?;
    let mut buf = [0u8; 4];
    Ok(rt.new_str(c.encode_utf8(&mut buf)))
}

fn str_contains(rt: &mut Runtime, obj: ObjectId, needle: ObjectId) -> PyResult<bool> {
    let Ok(needle) = rt.str_value(needle) else {
        return Err(PyErr::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            rt.type_name_of(needle)
        )));
    };
    Ok(rt.str_value(obj)?.contains(needle))
}

/// `str()`, `str(x)`.
fn str_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("str() takes no keyword arguments"));
    }
    match *args {
        [] => Ok(rt.new_str("")),
        [arg] => {
            if rt.is_str(arg) {
                return Ok(rt.retain(arg));
            }
            let text = rt.str(arg)?;
            Ok(rt.new_str(&text))
        }
        _ => Err(PyErr::type_error(format!(
            "str() takes at most 1 argument ({} given)",
            args.len()
        ))),
    }
}

pub(crate) fn str_slots() -> TypeSlots {
    let mut slots = TypeSlots {
        new: Some(str_new),
        repr: Some(str_repr),
        str: Some(str_str),
        hash: Some(str_hash),
        richcompare: Some(str_richcompare),
        iter: Some(seq_iter),
        ..TypeSlots::default()
    };
    slots.sequence.length = Some(str_length);
    slots.sequence.concat = Some(str_concat);
    slots.sequence.repeat = Some(str_repeat);
    slots.sequence.item = Some(str_item);
    slots.sequence.contains = Some(str_contains);
    slots
}
