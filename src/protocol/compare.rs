//! Rich comparison and the total three-way comparison built on top of it.

use std::cmp::Ordering;

use crate::error::PyErr;
use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::types::CompareOp;
use crate::PyResult;

const COMPARE_CONTEXT: &str = " in comparison";

impl Runtime {
    /// `a <op> b`. `Ok(None)` when neither operand's type answers.
    ///
    /// The right operand's reflected comparison goes first when its type is
    /// a proper subtype of the left operand's type.
    pub fn rich_compare(&mut self, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
        self.with_recursion_guard(COMPARE_CONTEXT, |rt| rt.rich_compare_inner(a, b, op))
    }

    fn rich_compare_inner(&mut self, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
        let ta = self.type_of(a)?;
        let tb = self.type_of(b)?;
        let fa = self.slots_of(a)?.richcompare;
        let fb = self.slots_of(b)?.richcompare;

        let mut checked_reverse = false;
        if ta != tb
            && self.is_subtype(tb, ta)
            && let Some(fb) = fb
        {
            checked_reverse = true;
            if let Some(result) = fb(self, b, a, op.swapped())? {
                return Ok(Some(result));
            }
        }
        if let Some(fa) = fa
            && let Some(result) = fa(self, a, b, op)?
        {
            return Ok(Some(result));
        }
        if !checked_reverse
            && let Some(fb) = fb
            && let Some(result) = fb(self, b, a, op.swapped())?
        {
            return Ok(Some(result));
        }
        Ok(None)
    }

    /// `a <op> b` as a boolean. Identity implies equality; unanswered
    /// equality falls back to identity and unanswered ordering is a
    /// `TypeError`.
    pub fn rich_compare_bool(&mut self, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<bool> {
        if a == b {
            match op {
                CompareOp::Eq => return Ok(true),
                CompareOp::Ne => return Ok(false),
                _ => {}
            }
        }
        match self.rich_compare(a, b, op)? {
            Some(result) => Ok(result),
            None => match op {
                CompareOp::Eq => Ok(a == b),
                CompareOp::Ne => Ok(a != b),
                _ => Err(PyErr::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    self.type_name_of(a),
                    self.type_name_of(b)
                ))),
            },
        }
    }

    /// Total three-way comparison used for sorting.
    ///
    /// Tries `==`, `<` and `>` in that order, then either operand's legacy
    /// `compare` slot, and finally a deterministic default order: `None`
    /// below everything, same-type objects by address, otherwise by type
    /// name.
    pub fn compare(&mut self, a: ObjectId, b: ObjectId) -> PyResult<Ordering> {
        if a == b {
            return Ok(Ordering::Equal);
        }
        self.with_recursion_guard(COMPARE_CONTEXT, |rt| {
            if let Some(ordering) = rt.rich_three_way(a, b)? {
                return Ok(ordering);
            }
            if let Some(ordering) = rt.legacy_compare(a, b)? {
                return Ok(ordering);
            }
            Ok(rt.default_order(a, b))
        })
    }

    fn rich_three_way(&mut self, a: ObjectId, b: ObjectId) -> PyResult<Option<Ordering>> {
        const TRIES: [(CompareOp, Ordering); 3] = [
            (CompareOp::Eq, Ordering::Equal),
            (CompareOp::Lt, Ordering::Less),
            (CompareOp::Gt, Ordering::Greater),
        ];
        for (op, outcome) in TRIES {
            if self.rich_compare_inner(a, b, op)? == Some(true) {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    fn legacy_compare(&mut self, a: ObjectId, b: ObjectId) -> PyResult<Option<Ordering>> {
        if let Some(compare) = self.slots_of(a)?.compare
            && let Some(ordering) = compare(self, a, b)?
        {
            return Ok(Some(ordering));
        }
        if let Some(compare) = self.slots_of(b)?.compare
            && let Some(ordering) = compare(self, b, a)?
        {
            return Ok(Some(ordering.reverse()));
        }
        Ok(None)
    }

    fn default_order(&self, a: ObjectId, b: ObjectId) -> Ordering {
        match (self.is_none(a), self.is_none(b)) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let (Ok(ta), Ok(tb)) = (self.type_of(a), self.type_of(b)) else {
            return a.address().cmp(&b.address());
        };
        if ta == tb {
            return a.address().cmp(&b.address());
        }
        self.type_name(ta)
            .cmp(&self.type_name(tb))
            .then_with(|| ta.address().cmp(&tb.address()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use crate::testing::{make_class, make_method};

    #[test]
    fn test_numeric_comparisons() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let one = rt.new_int(1);
        let two = rt.new_float(2.0);
        assert!(rt.rich_compare_bool(one, two, CompareOp::Lt).unwrap());
        assert!(rt.rich_compare_bool(two, one, CompareOp::Ge).unwrap());
        assert_eq!(rt.compare(two, one).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_unordered_types_raise_for_ordering_but_not_equality() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let one = rt.new_int(1);
        let text = rt.new_str("a");
        assert!(!rt.equals(one, text).unwrap());
        assert!(rt.rich_compare_bool(one, text, CompareOp::Ne).unwrap());
        let err = rt.rich_compare_bool(one, text, CompareOp::Lt).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "'<' not supported between instances of 'int' and 'str'");
    }

    #[test]
    fn test_total_order_between_unrelated_types() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let none = rt.none();
        let one = rt.new_int(1);
        let text = rt.new_str("a");
        let list = rt.new_list(&[]);
        assert_eq!(rt.compare(none, one).unwrap(), Ordering::Less);
        assert_eq!(rt.compare(one, none).unwrap(), Ordering::Greater);
        // "int" < "str" by type name.
        assert_eq!(rt.compare(one, text).unwrap(), Ordering::Less);
        assert_eq!(rt.compare(text, list).unwrap(), Ordering::Greater);

        let other = rt.new_list(&[]);
        assert_eq!(rt.compare(list, other).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_sort_mixed_values() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let b = rt.new_str("b");
        let three = rt.new_int(3);
        let none = rt.none();
        let a = rt.new_str("a");
        let one = rt.new_float(1.0);
        let list = rt.new_list(&[b, three, none, a, one]);
        rt.list_sort(list).unwrap();
        assert_eq!(rt.repr(list).unwrap(), "[None, 1.0, 3, 'a', 'b']");
    }

    #[test]
    fn test_legacy_compare_is_consulted_last() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let cmp = make_method(&mut rt, "__cmp__", |rt, args| {
            let mine = rt.get_attr(args[0], "rank")?;
            let theirs = rt.get_attr(args[1], "rank")?;
            let diff = rt.int_value(mine)? - rt.int_value(theirs)?;
            rt.release(mine);
            rt.release(theirs);
            Ok(rt.new_int(diff.signum()))
        });
        let class = make_class(&mut rt, "Ranked", &[], &[("__cmp__", cmp)]);
        let low = rt.call(class, &[], &[]).unwrap();
        let high = rt.call(class, &[], &[]).unwrap();
        let one = rt.new_int(1);
        let nine = rt.new_int(9);
        rt.set_attr(low, "rank", Some(one)).unwrap();
        rt.set_attr(high, "rank", Some(nine)).unwrap();

        assert_eq!(rt.compare(high, low).unwrap(), Ordering::Greater);
        assert_eq!(rt.compare(low, high).unwrap(), Ordering::Less);
        // Rich comparison still declines, so equality stays identity.
        assert!(!rt.equals(low, high).unwrap());
    }

    fn nest_lists(rt: &mut Runtime, depth: usize) -> ObjectId {
        let mut inner = rt.new_list(&[]);
        for _ in 1..depth {
            let outer = rt.new_list(&[inner]);
            rt.release(inner);
            inner = outer;
        }
        inner
    }

    #[test]
    fn test_nesting_below_the_limit_fits_a_default_thread_stack() {
        let worker = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let mut rt = Runtime::new(RuntimeConfig::default());
                let depth = rt.config().recursion_limit - 1;
                let a = nest_lists(&mut rt, depth);
                let b = nest_lists(&mut rt, depth);
                assert!(rt.equals(a, b).unwrap());
                assert!(rt.repr(a).unwrap().starts_with("[[[["));

                let deep_a = nest_lists(&mut rt, depth + 10);
                let deep_b = nest_lists(&mut rt, depth + 10);
                let err = rt.equals(deep_a, deep_b).unwrap_err();
                assert_eq!(err.kind, ErrorKind::RuntimeError);
                assert_eq!(err.message, "maximum recursion depth exceeded in comparison");
                assert_eq!(rt.recursion_depth(), 0);
            })
            .unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn test_subclass_reflected_comparison_goes_first() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let base_lt = make_method(&mut rt, "__lt__", |rt, _args| Ok(rt.bool_obj(false)));
        let sub_gt = make_method(&mut rt, "__gt__", |rt, _args| Ok(rt.bool_obj(true)));
        let base = make_class(&mut rt, "Base", &[], &[("__lt__", base_lt)]);
        let sub = make_class(&mut rt, "Sub", &[base], &[("__gt__", sub_gt)]);
        let x = rt.call(base, &[], &[]).unwrap();
        let y = rt.call(sub, &[], &[]).unwrap();
        // x < y asks Sub.__gt__(y, x) first.
        assert!(rt.rich_compare_bool(x, y, CompareOp::Lt).unwrap());
    }
}
