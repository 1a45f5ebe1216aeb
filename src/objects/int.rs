//! `int` and `bool`.
//!
//! Integers are 64-bit; results that do not fit raise `OverflowError` rather
//! than being promoted.

use std::cmp::Ordering;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::hash_i64;
use crate::runtime::Runtime;
use crate::types::{BinaryOp, BuiltinType, CompareOp, TypeSlots, UnaryOp};
use crate::types::slots::NumberMethods;
use crate::PyResult;

impl Runtime {
    /// An `int` object; values in the small-int range are shared singletons.
    pub fn new_int(&mut self, value: i64) -> ObjectId {
        let low = self.singletons.small_int_low;
        if let Some(&cached) = value
            .checked_sub(low)
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|offset| self.singletons.small_ints.get(offset))
        {
            return cached;
        }
        self.alloc_builtin(BuiltinType::Int, ObjectData::Int(value))
    }

    pub fn new_bool(&self, value: bool) -> ObjectId {
        self.bool_obj(value)
    }

    /// Value of an `int` or `bool`.
    pub fn int_value(&self, obj: ObjectId) -> PyResult<i64> {
        int_like(self, obj).ok_or_else(|| {
            PyErr::type_error(format!(
                "an integer is required (got type {})",
                self.type_name_of(obj)
            ))
        })
    }
}

pub(crate) fn int_like(rt: &Runtime, obj: ObjectId) -> Option<i64> {
    match rt.heap.try_get(obj).map(|e| &e.data) {
        Some(ObjectData::Int(v)) => Some(*v),
        Some(ObjectData::Bool(b)) => Some(i64::from(*b)),
        _ => None,
    }
}

fn overflow(op: &str) -> PyErr {
    PyErr::overflow_error(format!("integer overflow in {op}"))
}

pub(crate) fn floor_div(x: i64, y: i64) -> PyResult<i64> {
    if y == 0 {
        return Err(PyErr::zero_division("integer division or modulo by zero"));
    }
    let q = x.checked_div(y).ok_or_else(|| overflow("//"))?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

pub(crate) fn floor_mod(x: i64, y: i64) -> PyResult<i64> {
    if y == 0 {
        return Err(PyErr::zero_division("integer modulo by zero"));
    }
    let r = x.checked_rem(y).unwrap_or(0);
    if r != 0 && ((r < 0) != (y < 0)) {
        Ok(r + y)
    } else {
        Ok(r)
    }
}

fn shift_left(x: i64, y: i64) -> PyResult<i64> {
    if y < 0 {
        return Err(PyErr::value_error("negative shift count"));
    }
    if x == 0 {
        return Ok(0);
    }
    if y >= 64 {
        return Err(overflow("<<"));
    }
    let shifted = x << y;
    if shifted >> y != x {
        return Err(overflow("<<"));
    }
    Ok(shifted)
}

fn shift_right(x: i64, y: i64) -> PyResult<i64> {
    if y < 0 {
        return Err(PyErr::value_error("negative shift count"));
    }
    if y >= 64 {
        return Ok(if x < 0 { -1 } else { 0 });
    }
    Ok(x >> y)
}

fn int_binary(rt: &mut Runtime, op: BinaryOp, a: ObjectId, b: ObjectId) -> PyResult<Option<ObjectId>> {
    let (Some(x), Some(y)) = (int_like(rt, a), int_like(rt, b)) else {
        return Ok(None);
    };
    let sym = op.symbol();
    let value = match op {
        BinaryOp::Add => x.checked_add(y).ok_or_else(|| overflow(sym))?,
        BinaryOp::Subtract => x.checked_sub(y).ok_or_else(|| overflow(sym))?,
        BinaryOp::Multiply => x.checked_mul(y).ok_or_else(|| overflow(sym))?,
        BinaryOp::Remainder => floor_mod(x, y)?,
        BinaryOp::FloorDivide => floor_div(x, y)?,
        BinaryOp::TrueDivide => {
            if y == 0 {
                return Err(PyErr::zero_division("division by zero"));
            }
            return Ok(Some(rt.new_float(x as f64 / y as f64)));
        }
        BinaryOp::LShift => shift_left(x, y)?,
        BinaryOp::RShift => shift_right(x, y)?,
        BinaryOp::And => x & y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Or => x | y,
    };
    Ok(Some(rt.new_int(value)))
}

fn mod_pow(base: i64, exp: i64, modulus: i64) -> i64 {
    let m = i128::from(modulus);
    let mut result = 1i128.rem_euclid(m);
    let mut b = i128::from(base).rem_euclid(m);
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b).rem_euclid(m);
        }
        b = (b * b).rem_euclid(m);
        e >>= 1;
    }
    // Result takes the sign of the modulus.
    let r = result as i64;
    if r != 0 && modulus < 0 { r + modulus } else { r }
}

fn int_pow(rt: &mut Runtime, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<Option<ObjectId>> {
    let (Some(x), Some(y)) = (int_like(rt, a), int_like(rt, b)) else {
        return Ok(None);
    };

    if !rt.is_none(c) {
        let Some(m) = int_like(rt, c) else {
            return Ok(None);
        };
        if m == 0 {
            return Err(PyErr::value_error("pow() 3rd argument cannot be 0"));
        }
        if y < 0 {
            return Err(PyErr::value_error(
                "pow() 2nd argument cannot be negative when 3rd argument specified",
            ));
        }
        return Ok(Some(rt.new_int(mod_pow(x, y, m))));
    }

    if y < 0 {
        if x == 0 {
            return Err(PyErr::zero_division(
                "0 cannot be raised to a negative power",
            ));
        }
        return Ok(Some(rt.new_float((x as f64).powf(y as f64))));
    }
    let exp = u32::try_from(y).map_err(|_| overflow("**"))?;
    let value = x.checked_pow(exp).ok_or_else(|| overflow("**"))?;
    Ok(Some(rt.new_int(value)))
}

fn int_unary(rt: &mut Runtime, op: UnaryOp, a: ObjectId) -> PyResult<ObjectId> {
    let x = rt.int_value(a)?;
    let value = match op {
        UnaryOp::Negative => x.checked_neg().ok_or_else(|| overflow("unary -"))?,
        UnaryOp::Positive => x,
        UnaryOp::Absolute => x.checked_abs().ok_or_else(|| overflow("abs()"))?,
        UnaryOp::Invert => !x,
    };
    Ok(rt.new_int(value))
}

fn int_bool(rt: &mut Runtime, a: ObjectId) -> PyResult<bool> {
    Ok(rt.int_value(a)? != 0)
}

fn int_index(rt: &mut Runtime, a: ObjectId) -> PyResult<ObjectId> {
    let v = rt.int_value(a)?;
    Ok(rt.new_int(v))
}

fn int_repr(rt: &mut Runtime, a: ObjectId) -> PyResult<String> {
    Ok(rt.int_value(a)?.to_string())
}

fn int_hash(rt: &mut Runtime, a: ObjectId) -> PyResult<u32> {
    Ok(hash_i64(rt.int_value(a)?))
}

fn int_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    let (Some(x), Some(y)) = (int_like(rt, a), int_like(rt, b)) else {
        return Ok(None);
    };
    Ok(Some(op.matches(x.cmp(&y))))
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() || text.trim().starts_with('_') || text.trim().ends_with('_') {
        return None;
    }
    cleaned.parse::<i64>().ok()
}

/// `int()`, `int(x)`.
fn int_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("int() takes no keyword arguments"));
    }
    let arg = match *args {
        [] => return Ok(rt.new_int(0)),
        [arg] => arg,
        _ => {
            return Err(PyErr::type_error(format!(
                "int() takes at most 1 argument ({} given)",
                args.len()
            )));
        }
    };

    if let Some(v) = int_like(rt, arg) {
        return Ok(rt.new_int(v));
    }
    match &rt.heap.get(arg)?.data {
        ObjectData::Float(f) => {
            let f = *f;
            if f.is_nan() {
                return Err(PyErr::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(PyErr::overflow_error("cannot convert float infinity to integer"));
            }
            let t = f.trunc();
            if t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(PyErr::overflow_error("int too large to convert"));
            }
            Ok(rt.new_int(t as i64))
        }
        ObjectData::Str(s) => {
            let text = s.to_string();
            match parse_int_literal(&text) {
                Some(v) => Ok(rt.new_int(v)),
                None => Err(PyErr::value_error(format!(
                    "invalid literal for int() with base 10: {}",
                    crate::objects::str::quote(&text)
                ))),
            }
        }
        _ => {
            if rt.slots_of(arg)?.number.index.is_some() {
                let v = rt.index(arg)?;
                return Ok(rt.new_int(v));
            }
            Err(PyErr::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                rt.type_name_of(arg)
            )))
        }
    }
}

pub(crate) fn int_slots() -> TypeSlots {
    let mut number = NumberMethods::uniform(int_binary, Some(int_unary));
    number.power = Some(int_pow);
    number.bool = Some(int_bool);
    number.index = Some(int_index);
    TypeSlots {
        new: Some(int_new),
        repr: Some(int_repr),
        hash: Some(int_hash),
        richcompare: Some(int_richcompare),
        number,
        ..TypeSlots::default()
    }
}

fn bool_value(rt: &Runtime, obj: ObjectId) -> Option<bool> {
    match rt.heap.try_get(obj).map(|e| &e.data) {
        Some(ObjectData::Bool(b)) => Some(*b),
        _ => None,
    }
}

fn bool_repr(rt: &mut Runtime, a: ObjectId) -> PyResult<String> {
    match bool_value(rt, a) {
        Some(true) => Ok("True".to_string()),
        Some(false) => Ok("False".to_string()),
        None => int_repr(rt, a),
    }
}

/// `&`, `|` and `^` on two bools stay bools; everything else is integer
/// arithmetic.
fn bool_binary(rt: &mut Runtime, op: BinaryOp, a: ObjectId, b: ObjectId) -> PyResult<Option<ObjectId>> {
    if let (Some(x), Some(y)) = (bool_value(rt, a), bool_value(rt, b)) {
        match op {
            BinaryOp::And => return Ok(Some(rt.bool_obj(x & y))),
            BinaryOp::Or => return Ok(Some(rt.bool_obj(x | y))),
            BinaryOp::Xor => return Ok(Some(rt.bool_obj(x ^ y))),
            _ => {}
        }
    }
    int_binary(rt, op, a, b)
}

/// `bool()`, `bool(x)`.
fn bool_new(rt: &mut Runtime, _ty: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    if !kwargs.is_empty() {
        return Err(PyErr::type_error("bool() takes no keyword arguments"));
    }
    match *args {
        [] => Ok(rt.bool_obj(false)),
        [arg] => {
            let truth = rt.is_true(arg)?;
            Ok(rt.bool_obj(truth))
        }
        _ => Err(PyErr::type_error(format!(
            "bool expected at most 1 argument, got {}",
            args.len()
        ))),
    }
}

pub(crate) fn bool_slots() -> TypeSlots {
    let mut slots = int_slots();
    slots.new = Some(bool_new);
    slots.repr = Some(bool_repr);
    for op in [BinaryOp::And, BinaryOp::Or, BinaryOp::Xor] {
        slots.number.binary[op.index()] = Some(bool_binary);
    }
    slots
}

/// Three-way comparison of two integers, used by the float module for mixed
/// operands.
pub(crate) fn compare_i64_f64(x: i64, y: f64) -> Option<Ordering> {
    if y.is_nan() {
        return None;
    }
    if y >= 9.3e18 {
        return Some(Ordering::Less);
    }
    if y <= -9.3e18 {
        return Some(Ordering::Greater);
    }
    let floor = y.floor();
    match x.cmp(&(floor as i64)) {
        Ordering::Equal if y > floor => Some(Ordering::Less),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default())
    }

    #[test]
    fn test_small_ints_are_shared() {
        let mut rt = runtime();
        let a = rt.new_int(7);
        let b = rt.new_int(7);
        assert_eq!(a, b);
        let c = rt.new_int(100_000);
        let d = rt.new_int(100_000);
        assert_ne!(c, d);
        rt.release(c);
        rt.release(d);
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(floor_div(7, 2).unwrap(), 3);
        assert_eq!(floor_div(-7, 2).unwrap(), -4);
        assert_eq!(floor_mod(-7, 2).unwrap(), 1);
        assert_eq!(floor_mod(7, -2).unwrap(), -1);
        assert_eq!(floor_mod(i64::MIN, -1).unwrap(), 0);
        assert_eq!(
            floor_div(1, 0).unwrap_err().kind,
            ErrorKind::ZeroDivisionError
        );
        assert_eq!(floor_div(i64::MIN, -1).unwrap_err().kind, ErrorKind::OverflowError);
    }

    #[test]
    fn test_overflow_is_signalled() {
        let mut rt = runtime();
        let big = rt.new_int(i64::MAX);
        let one = rt.new_int(1);
        let err = rt.binary_op(big, one, BinaryOp::Add).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverflowError);

        let min = rt.new_int(i64::MIN);
        let err = rt.unary_op(min, UnaryOp::Negative).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverflowError);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(shift_left(1, 10).unwrap(), 1024);
        assert!(shift_left(1, 63).is_err());
        assert!(shift_left(3, 62).is_err());
        assert_eq!(shift_right(-1, 100).unwrap(), -1);
        assert_eq!(
            shift_left(1, -1).unwrap_err().kind,
            ErrorKind::ValueError
        );
    }

    #[test]
    fn test_pow_forms() {
        let mut rt = runtime();
        let two = rt.new_int(2);
        let ten = rt.new_int(10);
        let thousand = rt.new_int(1000);
        let none = rt.none();

        let r = rt.power(two, ten, none).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 1024);
        let r = rt.power(two, ten, thousand).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 24);

        let minus_one = rt.new_int(-1);
        let r = rt.power(two, minus_one, none).unwrap();
        assert_eq!(rt.repr(r).unwrap(), "0.5");
        rt.release(r);
        assert_eq!(mod_pow(3, 3, -5), -3);
    }

    #[test]
    fn test_pow_zero_exponent_is_reduced() {
        let mut rt = runtime();
        let five = rt.new_int(5);
        let zero = rt.new_int(0);
        let one = rt.new_int(1);
        let r = rt.power(five, zero, one).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 0);
        assert_eq!(mod_pow(5, 0, -1), 0);
        assert_eq!(mod_pow(5, 0, 7), 1);
    }

    #[test]
    fn test_bool_ops() {
        let mut rt = runtime();
        let t = rt.bool_obj(true);
        let f = rt.bool_obj(false);
        let r = rt.binary_op(t, f, BinaryOp::Or).unwrap();
        assert_eq!(r, t);
        let r = rt.binary_op(t, t, BinaryOp::Add).unwrap();
        assert_eq!(rt.repr(r).unwrap(), "2");
        assert_eq!(rt.repr(t).unwrap(), "True");
        let one = rt.new_int(1);
        assert_eq!(rt.hash(t).unwrap(), rt.hash(one).unwrap());
    }

    #[test]
    fn test_int_constructor() {
        let mut rt = runtime();
        let int = rt.builtin(BuiltinType::Int);
        let text = rt.new_str(" 1_000 ");
        let r = rt.call(int, &[text], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 1000);
        rt.release(r);

        let bad = rt.new_str("12abc");
        let err = rt.call(int, &[bad], &[]).unwrap_err();
        assert_eq!(err.message, "invalid literal for int() with base 10: '12abc'");

        let f = rt.new_float(-3.9);
        let r = rt.call(int, &[f], &[]).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), -3);
    }

    #[test]
    fn test_compare_i64_f64() {
        assert_eq!(compare_i64_f64(1, 1.5), Some(Ordering::Less));
        assert_eq!(compare_i64_f64(2, 1.5), Some(Ordering::Greater));
        assert_eq!(compare_i64_f64(-2, -1.5), Some(Ordering::Less));
        assert_eq!(compare_i64_f64(3, 3.0), Some(Ordering::Equal));
        assert_eq!(compare_i64_f64(3, f64::NAN), None);
    }
}
