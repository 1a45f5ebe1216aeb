//! `float`.

use std::cmp::Ordering;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::int::{compare_i64_f64, int_like};
use crate::objects::{hash_bytes, hash_i64};
use crate::runtime::Runtime;
use crate::types::slots::NumberMethods;
use crate::types::{BinaryOp, BuiltinType, CompareOp, TypeSlots, UnaryOp};
use crate::PyResult;

impl Runtime {
    pub fn new_float(&mut self, value: f64) -> ObjectId {
        self.alloc_builtin(BuiltinType::Float, ObjectData::Float(value))
    }

    /// Value of a `float`, or of an `int`/`bool` widened to one.
    pub fn float_value(&self, obj: ObjectId) -> PyResult<f64> {
        float_like(self, obj).ok_or_else(|| {
            PyErr::type_error(format!(
                "must be real number, not {}",
                self.type_name_of(obj)
            ))
        })
    }
}

fn exact_float(rt: &Runtime, obj: ObjectId) -> Option<f64> {
    match rt.heap.try_get(obj).map(|e| &e.data) {
        Some(ObjectData::Float(f)) => Some(*f),
        _ => None,
    }
}

pub(crate) fn float_like(rt: &Runtime, obj: ObjectId) -> Option<f64> {
    exact_float(rt, obj).or_else(|| int_like(rt, obj).map(|v| v as f64))
}

/// Shortest text that reads back as the same value, positional for
/// exponents in `-4..16` and scientific otherwise.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sci = format!("{:e}", value.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let sign = if value.is_sign_negative() { "-" } else { "" };

    if !(-4..16).contains(&exponent) {
        let (head, tail) = digits.split_at(1);
        let fraction = if tail.is_empty() {
            String::new()
        } else {
            format!(".{tail}")
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{head}{fraction}e{exp_sign}{:02}", exponent.abs());
    }

    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("{sign}0.{zeros}{digits}");
    }
    let int_len = exponent as usize + 1;
    if digits.len() <= int_len {
        let zeros = "0".repeat(int_len - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        let (int_part, frac_part) = digits.split_at(int_len);
        format!("{sign}{int_part}.{frac_part}")
    }
}

fn float_repr(rt: &mut Runtime, obj: ObjectId) -> PyResult<String> {
    Ok(format_float(rt.float_value(obj)?))
}

fn float_hash(rt: &mut Runtime, obj: ObjectId) -> PyResult<u32> {
    let v = rt.float_value(obj)?;
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        return Ok(hash_i64(v as i64));
    }
    Ok(hash_bytes(&v.to_bits().to_le_bytes()))
}

fn float_mod(x: f64, y: f64) -> f64 {
    let r = x % y;
    if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
        r + y
    } else {
        r
    }
}

fn float_binary(rt: &mut Runtime, op: BinaryOp, a: ObjectId, b: ObjectId) -> PyResult<Option<ObjectId>> {
    let (Some(x), Some(y)) = (float_like(rt, a), float_like(rt, b)) else {
        return Ok(None);
    };
    let value = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::TrueDivide => {
            if y == 0.0 {
                return Err(PyErr::zero_division("float division by zero"));
            }
            x / y
        }
        BinaryOp::FloorDivide => {
            if y == 0.0 {
                return Err(PyErr::zero_division("float floor division by zero"));
            }
            ((x - float_mod(x, y)) / y).round()
        }
        BinaryOp::Remainder => {
            if y == 0.0 {
                return Err(PyErr::zero_division("float modulo"));
            }
            float_mod(x, y)
        }
        BinaryOp::LShift | BinaryOp::RShift | BinaryOp::And | BinaryOp::Xor | BinaryOp::Or => {
            return Ok(None);
        }
    };
    Ok(Some(rt.new_float(value)))
}

fn float_pow(rt: &mut Runtime, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<Option<ObjectId>> {
    let (Some(x), Some(y)) = (float_like(rt, a), float_like(rt, b)) else {
        return Ok(None);
    };
    if !rt.is_none(c) {
        return Err(PyErr::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    }
    if x == 0.0 && y < 0.0 {
        return Err(PyErr::zero_division(
            "0.0 cannot be raised to a negative power",
        ));
    }
    if x < 0.0 && y.fract() != 0.0 {
        return Err(PyErr::value_error(
            "negative number cannot be raised to a fractional power",
        ));
    }
    Ok(Some(rt.new_float(x.powf(y))))
}

fn float_unary(rt: &mut Runtime, op: UnaryOp, a: ObjectId) -> PyResult<ObjectId> {
    let x = rt.float_value(a)?;
    let value = match op {
        UnaryOp::Negative => -x,
        UnaryOp::Positive => x,
        UnaryOp::Absolute => x.abs(),
        UnaryOp::Invert => {
            return Err(PyErr::type_error("bad operand type for unary ~: 'float'"));
        }
    };
    Ok(rt.new_float(value))
}

fn float_bool(rt: &mut Runtime, a: ObjectId) -> PyResult<bool> {
    Ok(rt.float_value(a)? != 0.0)
}

fn float_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let ordering = match (exact_float(rt, a), exact_float(rt, b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        (Some(x), None) => match int_like(rt, b) {
            Some(y) => compare_i64_f64(y, x).map(Ordering::reverse),
            None => return Ok(None),
        },
        (None, Some(y)) => match int_like(rt, a) {
            Some(x) => compare_i64_f64(x, y),
            None => return Ok(None),
        },
        (None, None) => return Ok(None),
    };
    Ok(Some(match ordering {
        Some(ordering) => op.matches(ordering),
        None => op == CompareOp::Ne,
    }))
}

fn parse_float_literal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lowered = body.to_ascii_lowercase();
    let magnitude = match lowered.as_str() {
        "inf" | "infinity" => f64::INFINITY,
        "nan" => f64::NAN,
        _ if lowered.starts_with(['+', '-']) || lowered.is_empty() => return None,
        _ if lowered.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | '+' | '-')) => {
            lowered.parse::<f64>().ok()?
        }
        _ => return None,
    };
    Some(sign * magnitude)
}

/// `float()`, `float(x)`.
fn float_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("float() takes no keyword arguments"));
    }
    let arg = match *args {
        [] => return Ok(rt.new_float(0.0)),
        [arg] => arg,
        _ => {
            return Err(PyErr::type_error(format!(
                "float expected at most 1 argument, got {}",
                args.len()
            )));
        }
    };
    if let Some(v) = float_like(rt, arg) {
        return Ok(rt.new_float(v));
    }
    let text = match &rt.heap.get(arg)?.data {
        ObjectData::Str(s) => s.to_string(),
        _ => {
            return Err(PyErr::type_error(format!(
                "float() argument must be a string or a real number, not '{}'",
                rt.type_name_of(arg)
            )));
        }
    };
    match parse_float_literal(&text) {
        Some(v) => Ok(rt.new_float(v)),
        None => Err(PyErr::value_error(format!(
            "could not convert string to float: {}",
            crate::objects::str::quote(&text)
        ))),
    }
}

pub(crate) fn float_slots() -> TypeSlots {
    let mut number = NumberMethods::uniform(float_binary, Some(float_unary));
    number.unary[UnaryOp::Invert.index()] = None;
    number.power = Some(float_pow);
    number.bool = Some(float_bool);
    TypeSlots {
        new: Some(float_new),
        repr: Some(float_repr),
        hash: Some(float_hash),
        richcompare: Some(float_richcompare),
        number,
        ..TypeSlots::default()
    }
}
