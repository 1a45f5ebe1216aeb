//! The per-type operation table.
//!
//! Every slot is an optional plain function pointer. An empty slot means the
//! type does not implement the operation; the dispatchers in `protocol` decide
//! what happens then (fallback, reflected operand, or `TypeError`).
//!
//! Slot functions follow one ownership convention: arguments are borrowed,
//! any returned `ObjectId` is a new reference owned by the caller.

use std::cmp::Ordering;

use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::PyResult;

pub type NewFn = fn(&mut Runtime, ObjectId, &[ObjectId], &[(&str, ObjectId)]) -> PyResult<ObjectId>;
pub type InitFn = fn(&mut Runtime, ObjectId, &[ObjectId], &[(&str, ObjectId)]) -> PyResult<()>;
pub type FinalizeFn = fn(&mut Runtime, ObjectId) -> PyResult<()>;
pub type ReprFn = fn(&mut Runtime, ObjectId) -> PyResult<String>;
pub type HashFn = fn(&mut Runtime, ObjectId) -> PyResult<u32>;
/// Legacy three-way comparison; `Ok(None)` means "undefined for these operands".
pub type CompareFn = fn(&mut Runtime, ObjectId, ObjectId) -> PyResult<Option<Ordering>>;
/// Rich comparison; `Ok(None)` means "not applicable".
pub type RichCompareFn = fn(&mut Runtime, ObjectId, ObjectId, CompareOp) -> PyResult<Option<bool>>;
pub type CallFn = fn(&mut Runtime, ObjectId, &[ObjectId], &[(&str, ObjectId)]) -> PyResult<ObjectId>;
pub type GetAttrFn = fn(&mut Runtime, ObjectId, &str) -> PyResult<ObjectId>;
/// `None` as the value deletes the attribute.
pub type SetAttrFn = fn(&mut Runtime, ObjectId, &str, Option<ObjectId>) -> PyResult<()>;
pub type UnaryFn = fn(&mut Runtime, ObjectId) -> PyResult<ObjectId>;
/// `Ok(None)` signals exhaustion.
pub type IterNextFn = fn(&mut Runtime, ObjectId) -> PyResult<Option<ObjectId>>;
/// `get(descriptor, instance_or_none, owning_type)`.
pub type DescrGetFn = fn(&mut Runtime, ObjectId, Option<ObjectId>, ObjectId) -> PyResult<ObjectId>;
/// `set(descriptor, instance, value_or_none)`.
pub type DescrSetFn = fn(&mut Runtime, ObjectId, ObjectId, Option<ObjectId>) -> PyResult<()>;
/// Binary numeric slot; `Ok(None)` is the "not applicable" sentinel.
pub type BinaryFn = fn(&mut Runtime, BinaryOp, ObjectId, ObjectId) -> PyResult<Option<ObjectId>>;
/// Ternary power slot `pow(x, y, z)`; `z` is `None` for the two-argument form.
pub type TernaryFn = fn(&mut Runtime, ObjectId, ObjectId, ObjectId) -> PyResult<Option<ObjectId>>;
pub type UnaryOpFn = fn(&mut Runtime, UnaryOp, ObjectId) -> PyResult<ObjectId>;
pub type InquiryFn = fn(&mut Runtime, ObjectId) -> PyResult<bool>;
pub type LenFn = fn(&mut Runtime, ObjectId) -> PyResult<usize>;
pub type ConcatFn = fn(&mut Runtime, ObjectId, ObjectId) -> PyResult<ObjectId>;
pub type RepeatFn = fn(&mut Runtime, ObjectId, i64) -> PyResult<ObjectId>;
pub type ItemFn = fn(&mut Runtime, ObjectId, i64) -> PyResult<ObjectId>;
pub type AssItemFn = fn(&mut Runtime, ObjectId, i64, Option<ObjectId>) -> PyResult<()>;
pub type ContainsFn = fn(&mut Runtime, ObjectId, ObjectId) -> PyResult<bool>;
pub type SubscriptFn = fn(&mut Runtime, ObjectId, ObjectId) -> PyResult<ObjectId>;
pub type AssSubscriptFn = fn(&mut Runtime, ObjectId, ObjectId, Option<ObjectId>) -> PyResult<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Remainder,
    FloorDivide,
    TrueDivide,
    LShift,
    RShift,
    And,
    Xor,
    Or,
}

impl BinaryOp {
    pub const COUNT: usize = 11;

    pub const ALL: [BinaryOp; BinaryOp::COUNT] = [
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Multiply,
        BinaryOp::Remainder,
        BinaryOp::FloorDivide,
        BinaryOp::TrueDivide,
        BinaryOp::LShift,
        BinaryOp::RShift,
        BinaryOp::And,
        BinaryOp::Xor,
        BinaryOp::Or,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Remainder => "%",
            BinaryOp::FloorDivide => "//",
            BinaryOp::TrueDivide => "/",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::And => "&",
            BinaryOp::Xor => "^",
            BinaryOp::Or => "|",
        }
    }

    pub fn dunder(self) -> &'static str {
        match self {
            BinaryOp::Add => "__add__",
            BinaryOp::Subtract => "__sub__",
            BinaryOp::Multiply => "__mul__",
            BinaryOp::Remainder => "__mod__",
            BinaryOp::FloorDivide => "__floordiv__",
            BinaryOp::TrueDivide => "__truediv__",
            BinaryOp::LShift => "__lshift__",
            BinaryOp::RShift => "__rshift__",
            BinaryOp::And => "__and__",
            BinaryOp::Xor => "__xor__",
            BinaryOp::Or => "__or__",
        }
    }

    pub fn reflected_dunder(self) -> &'static str {
        match self {
            BinaryOp::Add => "__radd__",
            BinaryOp::Subtract => "__rsub__",
            BinaryOp::Multiply => "__rmul__",
            BinaryOp::Remainder => "__rmod__",
            BinaryOp::FloorDivide => "__rfloordiv__",
            BinaryOp::TrueDivide => "__rtruediv__",
            BinaryOp::LShift => "__rlshift__",
            BinaryOp::RShift => "__rrshift__",
            BinaryOp::And => "__rand__",
            BinaryOp::Xor => "__rxor__",
            BinaryOp::Or => "__ror__",
        }
    }

    pub fn inplace_dunder(self) -> &'static str {
        match self {
            BinaryOp::Add => "__iadd__",
            BinaryOp::Subtract => "__isub__",
            BinaryOp::Multiply => "__imul__",
            BinaryOp::Remainder => "__imod__",
            BinaryOp::FloorDivide => "__ifloordiv__",
            BinaryOp::TrueDivide => "__itruediv__",
            BinaryOp::LShift => "__ilshift__",
            BinaryOp::RShift => "__irshift__",
            BinaryOp::And => "__iand__",
            BinaryOp::Xor => "__ixor__",
            BinaryOp::Or => "__ior__",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negative,
    Positive,
    Absolute,
    Invert,
}

impl UnaryOp {
    pub const COUNT: usize = 4;

    pub const ALL: [UnaryOp; UnaryOp::COUNT] = [
        UnaryOp::Negative,
        UnaryOp::Positive,
        UnaryOp::Absolute,
        UnaryOp::Invert,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negative => "unary -",
            UnaryOp::Positive => "unary +",
            UnaryOp::Absolute => "abs()",
            UnaryOp::Invert => "unary ~",
        }
    }

    pub fn dunder(self) -> &'static str {
        match self {
            UnaryOp::Negative => "__neg__",
            UnaryOp::Positive => "__pos__",
            UnaryOp::Absolute => "__abs__",
            UnaryOp::Invert => "__invert__",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl CompareOp {
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Gt,
        CompareOp::Ge,
    ];

    /// The operator to try on the reflected operand.
    pub fn swapped(self) -> CompareOp {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }

    /// Whether a three-way result satisfies this operator.
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn dunder(self) -> &'static str {
        match self {
            CompareOp::Lt => "__lt__",
            CompareOp::Le => "__le__",
            CompareOp::Eq => "__eq__",
            CompareOp::Ne => "__ne__",
            CompareOp::Gt => "__gt__",
            CompareOp::Ge => "__ge__",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NumberMethods {
    pub binary: [Option<BinaryFn>; BinaryOp::COUNT],
    pub inplace: [Option<BinaryFn>; BinaryOp::COUNT],
    pub power: Option<TernaryFn>,
    pub inplace_power: Option<TernaryFn>,
    pub unary: [Option<UnaryOpFn>; UnaryOp::COUNT],
    pub bool: Option<InquiryFn>,
    pub index: Option<UnaryFn>,
}

impl Default for NumberMethods {
    fn default() -> Self {
        Self {
            binary: [None; BinaryOp::COUNT],
            inplace: [None; BinaryOp::COUNT],
            power: None,
            inplace_power: None,
            unary: [None; UnaryOp::COUNT],
            bool: None,
            index: None,
        }
    }
}

impl NumberMethods {
    /// A table that routes every binary and unary operator to one function.
    pub fn uniform(binary: BinaryFn, unary: Option<UnaryOpFn>) -> Self {
        Self {
            binary: [Some(binary); BinaryOp::COUNT],
            unary: [unary; UnaryOp::COUNT],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceMethods {
    pub length: Option<LenFn>,
    pub concat: Option<ConcatFn>,
    pub repeat: Option<RepeatFn>,
    pub item: Option<ItemFn>,
    pub ass_item: Option<AssItemFn>,
    pub contains: Option<ContainsFn>,
    pub inplace_concat: Option<ConcatFn>,
    pub inplace_repeat: Option<RepeatFn>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MappingMethods {
    pub length: Option<LenFn>,
    pub subscript: Option<SubscriptFn>,
    pub ass_subscript: Option<AssSubscriptFn>,
    pub keys: Option<UnaryFn>,
    pub values: Option<UnaryFn>,
    pub items: Option<UnaryFn>,
}

/// The operation table ("object class") of a type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeSlots {
    pub new: Option<NewFn>,
    pub init: Option<InitFn>,
    /// User-level destructor (`__del__`). Its presence makes instances
    /// finalizer-bearing for the collector.
    pub finalize: Option<FinalizeFn>,
    pub repr: Option<ReprFn>,
    pub str: Option<ReprFn>,
    pub hash: Option<HashFn>,
    pub compare: Option<CompareFn>,
    pub richcompare: Option<RichCompareFn>,
    pub call: Option<CallFn>,
    pub getattro: Option<GetAttrFn>,
    pub setattro: Option<SetAttrFn>,
    pub iter: Option<UnaryFn>,
    pub iternext: Option<IterNextFn>,
    pub descr_get: Option<DescrGetFn>,
    pub descr_set: Option<DescrSetFn>,
    pub copy: Option<UnaryFn>,
    pub number: NumberMethods,
    pub sequence: SequenceMethods,
    pub mapping: MappingMethods,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_table_order() {
        for (i, op) in BinaryOp::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
        }
        for (i, op) in UnaryOp::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
        }
    }

    #[test]
    fn test_compare_op_swapped_matches() {
        for op in CompareOp::ALL {
            for ordering in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_eq!(op.matches(ordering), op.swapped().matches(ordering.reverse()));
            }
        }
    }

    #[test]
    fn test_default_slots_are_empty() {
        let slots = TypeSlots::default();
        assert!(slots.repr.is_none());
        assert!(slots.number.binary.iter().all(Option::is_none));
        assert!(slots.mapping.subscript.is_none());
    }
}
