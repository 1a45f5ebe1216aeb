//! Operator dispatch over the number, sequence and mapping tables.
//!
//! For `a op b` the left operand's implementation runs first, unless the
//! right operand's type is a proper subtype of the left operand's type, in
//! which case the right one gets the first chance. An implementation says
//! "not applicable" by returning `Ok(None)`; when both sides decline the
//! sequence table is consulted for `+` and `*`, and only then is the
//! operation a `TypeError`.

use crate::error::PyErr;
use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::types::slots::{BinaryFn, TernaryFn};
use crate::types::{BinaryOp, UnaryOp};
use crate::PyResult;

fn same_binary(a: Option<BinaryFn>, b: Option<BinaryFn>) -> bool {
    matches!((a, b), (Some(f), Some(g)) if std::ptr::fn_addr_eq(f, g))
}

fn same_ternary(a: Option<TernaryFn>, b: Option<TernaryFn>) -> bool {
    matches!((a, b), (Some(f), Some(g)) if std::ptr::fn_addr_eq(f, g))
}

impl Runtime {
    fn binary_op1(&mut self, a: ObjectId, b: ObjectId, op: BinaryOp) -> PyResult<Option<ObjectId>> {
        let ta = self.type_of(a)?;
        let tb = self.type_of(b)?;
        let f1 = self.slots_of(a)?.number.binary[op.index()];
        let mut f2 = if ta != tb {
            self.slots_of(b)?.number.binary[op.index()]
        } else {
            None
        };
        if same_binary(f1, f2) {
            f2 = None;
        }

        if let Some(f1) = f1 {
            if let Some(g) = f2
                && self.is_subtype(tb, ta)
            {
                if let Some(result) = g(self, op, a, b)? {
                    return Ok(Some(result));
                }
                f2 = None;
            }
            if let Some(result) = f1(self, op, a, b)? {
                return Ok(Some(result));
            }
        }
        if let Some(f2) = f2 {
            return f2(self, op, a, b);
        }
        Ok(None)
    }

    fn unsupported(&self, a: ObjectId, b: ObjectId, symbol: &str) -> PyErr {
        PyErr::type_error(format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            self.type_name_of(a),
            self.type_name_of(b)
        ))
    }

    /// `a op b`.
    pub fn binary_op(&mut self, a: ObjectId, b: ObjectId, op: BinaryOp) -> PyResult<ObjectId> {
        if let Some(result) = self.binary_op1(a, b, op)? {
            return Ok(result);
        }
        match op {
            BinaryOp::Add => {
                if let Some(concat) = self.slots_of(a)?.sequence.concat {
                    return concat(self, a, b);
                }
            }
            BinaryOp::Multiply => {
                if let Some(result) = self.sequence_repeat(a, b, false)? {
                    return Ok(result);
                }
            }
            _ => {}
        }
        Err(self.unsupported(a, b, op.symbol()))
    }

    /// `seq * n` or `n * seq` through the sequence table.
    fn sequence_repeat(&mut self, a: ObjectId, b: ObjectId, inplace: bool) -> PyResult<Option<ObjectId>> {
        let sa = self.slots_of(a)?.sequence;
        let repeat_a = if inplace {
            sa.inplace_repeat.or(sa.repeat)
        } else {
            sa.repeat
        };
        if let Some(repeat) = repeat_a {
            let count = self.repeat_count(b)?;
            return repeat(self, a, count).map(Some);
        }
        if inplace {
            return Ok(None);
        }
        if let Some(repeat) = self.slots_of(b)?.sequence.repeat {
            let count = self.repeat_count(a)?;
            return repeat(self, b, count).map(Some);
        }
        Ok(None)
    }

    fn repeat_count(&mut self, count: ObjectId) -> PyResult<i64> {
        if self.slots_of(count)?.number.index.is_none() {
            return Err(PyErr::type_error(format!(
                "can't multiply sequence by non-int of type '{}'",
                self.type_name_of(count)
            )));
        }
        self.index(count)
    }

    /// `a op= b`: the in-place slot, then the binary operator, then the
    /// sequence table (in-place variants first).
    pub fn inplace_op(&mut self, a: ObjectId, b: ObjectId, op: BinaryOp) -> PyResult<ObjectId> {
        if let Some(inplace) = self.slots_of(a)?.number.inplace[op.index()]
            && let Some(result) = inplace(self, op, a, b)?
        {
            return Ok(result);
        }
        if let Some(result) = self.binary_op1(a, b, op)? {
            return Ok(result);
        }
        match op {
            BinaryOp::Add => {
                let seq = self.slots_of(a)?.sequence;
                if let Some(concat) = seq.inplace_concat.or(seq.concat) {
                    return concat(self, a, b);
                }
            }
            BinaryOp::Multiply => {
                if let Some(result) = self.sequence_repeat(a, b, true)? {
                    return Ok(result);
                }
                if let Some(result) = self.sequence_repeat(a, b, false)? {
                    return Ok(result);
                }
            }
            _ => {}
        }
        Err(self.unsupported(a, b, &format!("{}=", op.symbol())))
    }

    fn ternary_op(&mut self, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<Option<ObjectId>> {
        let ta = self.type_of(a)?;
        let tb = self.type_of(b)?;
        let f1 = self.slots_of(a)?.number.power;
        let mut f2 = if ta != tb {
            self.slots_of(b)?.number.power
        } else {
            None
        };
        if same_ternary(f1, f2) {
            f2 = None;
        }

        if let Some(f1) = f1 {
            if let Some(g) = f2
                && self.is_subtype(tb, ta)
            {
                if let Some(result) = g(self, a, b, c)? {
                    return Ok(Some(result));
                }
                f2 = None;
            }
            if let Some(result) = f1(self, a, b, c)? {
                return Ok(Some(result));
            }
        }
        if let Some(f2) = f2
            && let Some(result) = f2(self, a, b, c)?
        {
            return Ok(Some(result));
        }

        if !self.is_none(c) {
            let f3 = self.slots_of(c)?.number.power;
            if !same_ternary(f3, f1)
                && !same_ternary(f3, f2)
                && let Some(f3) = f3
            {
                return f3(self, a, b, c);
            }
        }
        Ok(None)
    }

    fn unsupported_pow(&self, a: ObjectId, b: ObjectId, c: ObjectId, symbol: &str) -> PyErr {
        if self.is_none(c) {
            self.unsupported(a, b, &format!("{symbol} or pow()"))
        } else {
            PyErr::type_error(format!(
                "unsupported operand type(s) for pow(): '{}', '{}', '{}'",
                self.type_name_of(a),
                self.type_name_of(b),
                self.type_name_of(c)
            ))
        }
    }

    /// `pow(a, b, c)`; pass the `None` object as `c` for `a ** b`.
    pub fn power(&mut self, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<ObjectId> {
        match self.ternary_op(a, b, c)? {
            Some(result) => Ok(result),
            None => Err(self.unsupported_pow(a, b, c, "**")),
        }
    }

    /// `a **= b`.
    pub fn inplace_power(&mut self, a: ObjectId, b: ObjectId, c: ObjectId) -> PyResult<ObjectId> {
        if let Some(inplace) = self.slots_of(a)?.number.inplace_power
            && let Some(result) = inplace(self, a, b, c)?
        {
            return Ok(result);
        }
        match self.ternary_op(a, b, c)? {
            Some(result) => Ok(result),
            None => Err(self.unsupported_pow(a, b, c, "**=")),
        }
    }

    /// `-a`, `+a`, `abs(a)`, `~a`.
    pub fn unary_op(&mut self, a: ObjectId, op: UnaryOp) -> PyResult<ObjectId> {
        match self.slots_of(a)?.number.unary[op.index()] {
            Some(unary) => unary(self, op, a),
            None => Err(PyErr::type_error(format!(
                "bad operand type for {}: '{}'",
                op.symbol(),
                self.type_name_of(a)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::testing::{make_class, make_method};

    #[test]
    fn test_mixed_numeric_dispatch() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let two = rt.new_int(2);
        let half = rt.new_float(0.5);
        let r = rt.binary_op(two, half, BinaryOp::Multiply).unwrap();
        assert_eq!(rt.float_value(r).unwrap(), 1.0);
        let r = rt.binary_op(half, two, BinaryOp::Subtract).unwrap();
        assert_eq!(rt.float_value(r).unwrap(), -1.5);

        let text = rt.new_str("x");
        let err = rt.binary_op(two, text, BinaryOp::Subtract).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for -: 'int' and 'str'");
        let err = rt.unary_op(text, UnaryOp::Negative).unwrap_err();
        assert_eq!(err.message, "bad operand type for unary -: 'str'");
    }

    #[test]
    fn test_sequence_repeat_needs_an_integer() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let list = rt.new_list(&[]);
        let half = rt.new_float(0.5);
        let err = rt.binary_op(list, half, BinaryOp::Multiply).unwrap_err();
        assert_eq!(err.message, "can't multiply sequence by non-int of type 'float'");
    }

    #[test]
    fn test_inplace_falls_back_to_binary() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let a = rt.new_int(40);
        let b = rt.new_int(2);
        let r = rt.inplace_op(a, b, BinaryOp::Add).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 42);
        assert_ne!(r, a);

        let t = rt.new_tuple(&[a]);
        let r = rt.inplace_op(t, t, BinaryOp::Add).unwrap();
        assert_eq!(rt.repr(r).unwrap(), "(40, 40)");

        let text = rt.new_str("x");
        let err = rt.inplace_op(a, text, BinaryOp::Subtract).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for -=: 'int' and 'str'");
    }

    #[test]
    fn test_power_errors() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let text = rt.new_str("x");
        let two = rt.new_int(2);
        let none = rt.none();
        let err = rt.power(text, two, none).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for ** or pow(): 'str' and 'int'");
        let err = rt.power(text, two, two).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for pow(): 'str', 'int', 'int'");
        let r = rt.inplace_power(two, two, none).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 4);
    }

    #[test]
    fn test_subclass_operator_goes_first() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&calls);
        let base_add = make_method(&mut rt, "__add__", move |rt, _args| {
            log.lock().push("Base.__add__");
            Ok(rt.new_str("base"))
        });
        let log = Arc::clone(&calls);
        let base_radd = make_method(&mut rt, "__radd__", move |rt, _args| {
            log.lock().push("Base.__radd__");
            Ok(rt.new_str("base"))
        });
        let log = Arc::clone(&calls);
        let sub_add = make_method(&mut rt, "__add__", move |rt, _args| {
            log.lock().push("Sub.__add__");
            Ok(rt.new_str("sub"))
        });
        let log = Arc::clone(&calls);
        let sub_radd = make_method(&mut rt, "__radd__", move |rt, _args| {
            log.lock().push("Sub.__radd__");
            Ok(rt.new_str("sub"))
        });

        let base = make_class(&mut rt, "Base", &[], &[("__add__", base_add), ("__radd__", base_radd)]);
        let sub = make_class(&mut rt, "Sub", &[base], &[("__add__", sub_add), ("__radd__", sub_radd)]);
        let x = rt.call(base, &[], &[]).unwrap();
        let y = rt.call(sub, &[], &[]).unwrap();

        let r = rt.binary_op(x, y, BinaryOp::Add).unwrap();
        assert_eq!(rt.str_value(r).unwrap(), "sub");
        assert_eq!(*calls.lock(), vec!["Sub.__radd__"]);

        calls.lock().clear();
        let r = rt.binary_op(y, x, BinaryOp::Add).unwrap();
        assert_eq!(rt.str_value(r).unwrap(), "sub");
        assert_eq!(*calls.lock(), vec!["Sub.__add__"]);

        calls.lock().clear();
        let r = rt.binary_op(x, x, BinaryOp::Add).unwrap();
        assert_eq!(rt.str_value(r).unwrap(), "base");
        assert_eq!(*calls.lock(), vec!["Base.__add__"]);
    }

    #[test]
    fn test_reflected_operand_after_not_implemented() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let radd = make_method(&mut rt, "__radd__", |rt, args| {
            let left = rt.int_value(args[1])?;
            Ok(rt.new_int(left + 100))
        });
        let class = make_class(&mut rt, "Hundred", &[], &[("__radd__", radd)]);
        let h = rt.call(class, &[], &[]).unwrap();
        let five = rt.new_int(5);
        let r = rt.binary_op(five, h, BinaryOp::Add).unwrap();
        assert_eq!(rt.int_value(r).unwrap(), 105);

        let err = rt.binary_op(h, five, BinaryOp::Add).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for +: 'Hundred' and 'int'");
    }

    #[test]
    fn test_user_unary_and_inplace() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let neg = make_method(&mut rt, "__neg__", |rt, _args| Ok(rt.new_str("negated")));
        let iadd = make_method(&mut rt, "__iadd__", |rt, args| Ok(rt.retain(args[0])));
        let class = make_class(&mut rt, "Acc", &[], &[("__neg__", neg), ("__iadd__", iadd)]);
        let obj = rt.call(class, &[], &[]).unwrap();

        let r = rt.unary_op(obj, UnaryOp::Negative).unwrap();
        assert_eq!(rt.str_value(r).unwrap(), "negated");
        let one = rt.new_int(1);
        let r = rt.inplace_op(obj, one, BinaryOp::Add).unwrap();
        assert_eq!(r, obj);
        let err = rt.unary_op(obj, UnaryOp::Invert).unwrap_err();
        assert_eq!(err.message, "bad operand type for unary ~: 'Acc'");
    }
}
