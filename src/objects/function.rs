//! Callables: user functions run by the frame evaluator, native functions,
//! and bound methods.

use std::fmt;
use std::sync::Arc;

use crate::error::PyErr;
use crate::object::{ObjectData, ObjectId};
use crate::objects::{hash_combine, hash_identity};
use crate::runtime::{Code, Frame, Runtime};
use crate::traversal::Traverse;
use crate::types::{BuiltinType, CompareOp, TypeSlots};
use crate::PyResult;

/// Native callable body: `(runtime, positional, keyword) -> new reference`.
pub type NativeFn =
    Arc<dyn Fn(&mut Runtime, &[ObjectId], &[(&str, ObjectId)]) -> PyResult<ObjectId> + Send + Sync>;

/// A function whose body the evaluator interprets.
pub struct Function {
    pub name: String,
    pub code: Code,
    pub globals: ObjectId,
    pub defaults: Vec<ObjectId>,
    pub closure: Vec<ObjectId>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("globals", &self.globals)
            .field("defaults", &self.defaults)
            .field("closure", &self.closure)
            .finish_non_exhaustive()
    }
}

impl Traverse for Function {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        visit(self.globals)
            && self.defaults.iter().all(|&id| visit(id))
            && self.closure.iter().all(|&id| visit(id))
    }
}

impl Function {
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        if self.globals != ObjectId::DANGLING {
            out.push(std::mem::replace(&mut self.globals, ObjectId::DANGLING));
        }
        out.append(&mut self.defaults);
        out.append(&mut self.closure);
    }
}

pub struct NativeFunction {
    pub name: String,
    pub func: NativeFn,
    /// Binds its receiver like a user function when found on a type.
    pub binding: bool,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    pub func: ObjectId,
    pub receiver: ObjectId,
}

impl Traverse for BoundMethod {
    fn traverse(&self, visit: &mut dyn FnMut(ObjectId) -> bool) -> bool {
        (self.func == ObjectId::DANGLING || visit(self.func))
            && (self.receiver == ObjectId::DANGLING || visit(self.receiver))
    }
}

impl BoundMethod {
    pub(crate) fn drain_refs(&mut self, out: &mut Vec<ObjectId>) {
        for slot in [&mut self.func, &mut self.receiver] {
            if *slot != ObjectId::DANGLING {
                out.push(std::mem::replace(slot, ObjectId::DANGLING));
            }
        }
    }
}

impl Runtime {
    /// A user function. Every reference argument is borrowed.
    pub fn new_function(
        &mut self,
        name: &str,
        code: Code,
        globals: ObjectId,
        defaults: &[ObjectId],
        closure: &[ObjectId],
    ) -> ObjectId {
        self.retain(globals);
        for &id in defaults.iter().chain(closure) {
            self.retain(id);
        }
        self.alloc_builtin(
            BuiltinType::Function,
            ObjectData::Function(Function {
                name: name.to_string(),
                code,
                globals,
                defaults: defaults.to_vec(),
                closure: closure.to_vec(),
            }),
        )
    }

    /// A native function that does not bind a receiver.
    pub fn new_native_function(
        &mut self,
        name: &str,
        func: impl Fn(&mut Runtime, &[ObjectId], &[(&str, ObjectId)]) -> PyResult<ObjectId>
            + Send
            + Sync
            + 'static,
    ) -> ObjectId {
        self.alloc_native(name, Arc::new(func), false)
    }

    /// A native function that binds its receiver as the first positional
    /// argument when looked up through an instance.
    pub fn new_native_method(
        &mut self,
        name: &str,
        func: impl Fn(&mut Runtime, &[ObjectId], &[(&str, ObjectId)]) -> PyResult<ObjectId>
            + Send
            + Sync
            + 'static,
    ) -> ObjectId {
        self.alloc_native(name, Arc::new(func), true)
    }

    pub(crate) fn alloc_native(&mut self, name: &str, func: NativeFn, binding: bool) -> ObjectId {
        self.alloc_builtin(
            BuiltinType::BuiltinFunction,
            ObjectData::Native(NativeFunction {
                name: name.to_string(),
                func,
                binding,
            }),
        )
    }

    /// `func` bound to `receiver`; both borrowed.
    pub fn new_bound_method(&mut self, func: ObjectId, receiver: ObjectId) -> ObjectId {
        self.retain(func);
        self.retain(receiver);
        self.alloc_builtin(
            BuiltinType::Method,
            ObjectData::Method(BoundMethod { func, receiver }),
        )
    }

    /// Name of a function, native function or bound method.
    pub fn callable_name(&self, obj: ObjectId) -> Option<String> {
        match &self.heap.try_get(obj)?.data {
            ObjectData::Function(f) => Some(f.name.clone()),
            ObjectData::Native(f) => Some(f.name.clone()),
            ObjectData::Method(m) => self.callable_name(m.func),
            _ => None,
        }
    }
}

struct CallSnapshot {
    code: Code,
    globals: ObjectId,
    defaults: Vec<ObjectId>,
    closure: Vec<ObjectId>,
}

fn function_call(rt: &mut Runtime, func: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let snapshot = match &rt.heap.get(func)?.data {
        ObjectData::Function(f) => CallSnapshot {
            code: Arc::clone(&f.code),
            globals: f.globals,
            defaults: f.defaults.clone(),
            closure: f.closure.clone(),
        },
        _ => return Err(PyErr::system_error("expected a function object")),
    };
    let Some(evaluator) = rt.evaluator() else {
        return Err(PyErr::system_error("no frame evaluator installed"));
    };

    // The function may be dropped by the code it runs.
    rt.retain(func);
    let result = rt.with_recursion_guard(" while calling a Python object", |rt| {
        evaluator.eval_frame(
            rt,
            Frame {
                code: &snapshot.code,
                globals: snapshot.globals,
                args,
                kwargs,
                defaults: &snapshot.defaults,
                closure: &snapshot.closure,
            },
        )
    });
    rt.release(func);
    result
}

fn function_descr_get(rt: &mut Runtime, func: ObjectId, instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    Ok(match instance {
        Some(receiver) if !rt.is_none(receiver) => rt.new_bound_method(func, receiver),
        _ => rt.retain(func),
    })
}

fn function_repr(rt: &mut Runtime, func: ObjectId) -> PyResult<String> {
    let name = rt.callable_name(func).unwrap_or_default();
    Ok(format!("<function {name} at {func}>"))
}

pub(crate) fn function_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(function_repr),
        call: Some(function_call),
        descr_get: Some(function_descr_get),
        ..TypeSlots::default()
    }
}

fn native_call(rt: &mut Runtime, func: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let body = match &rt.heap.get(func)?.data {
        ObjectData::Native(f) => Arc::clone(&f.func),
        _ => return Err(PyErr::system_error("expected a native function")),
    };
    rt.with_recursion_guard(" while calling a Python object", |rt| body(rt, args, kwargs))
}

fn native_descr_get(rt: &mut Runtime, func: ObjectId, instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    let binding = matches!(&rt.heap.get(func)?.data, ObjectData::Native(f) if f.binding);
    Ok(match instance {
        Some(receiver) if binding && !rt.is_none(receiver) => rt.new_bound_method(func, receiver),
        _ => rt.retain(func),
    })
}

fn native_repr(rt: &mut Runtime, func: ObjectId) -> PyResult<String> {
    let name = rt.callable_name(func).unwrap_or_default();
    Ok(format!("<built-in function {name}>"))
}

pub(crate) fn native_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(native_repr),
        call: Some(native_call),
        descr_get: Some(native_descr_get),
        ..TypeSlots::default()
    }
}

fn method_parts(rt: &Runtime, method: ObjectId) -> PyResult<(ObjectId, ObjectId)> {
    match &rt.heap.get(method)?.data {
        ObjectData::Method(m) => Ok((m.func, m.receiver)),
        _ => Err(PyErr::system_error("expected a bound method")),
    }
}

fn method_call(rt: &mut Runtime, method: ObjectId, args: &[ObjectId], kwargs: &[(&str, ObjectId)]) -> PyResult<ObjectId> {
    let (func, receiver) = method_parts(rt, method)?;
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(receiver);
    full.extend_from_slice(args);

    rt.retain(method);
    let result = rt.call(func, &full, kwargs);
    rt.release(method);
    result
}

fn method_repr(rt: &mut Runtime, method: ObjectId) -> PyResult<String> {
    let (func, receiver) = method_parts(rt, method)?;
    let owner = rt.type_name_of(receiver);
    let name = rt.callable_name(func).unwrap_or_else(|| "?".to_string());
    let receiver = rt.repr(receiver)?;
    Ok(format!("<bound method {owner}.{name} of {receiver}>"))
}

fn method_richcompare(rt: &mut Runtime, a: ObjectId, b: ObjectId, op: CompareOp) -> PyResult<Option<bool>> {
    if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
        return Ok(None);
    }
    let (Ok(left), Ok(right)) = (method_parts(rt, a), method_parts(rt, b)) else {
        return Ok(None);
    };
    Ok(Some((left == right) == (op == CompareOp::Eq)))
}

fn method_hash(rt: &mut Runtime, method: ObjectId) -> PyResult<u32> {
    let (func, receiver) = method_parts(rt, method)?;
    Ok(hash_combine(hash_identity(func), hash_identity(receiver)))
}

fn method_descr_get(rt: &mut Runtime, method: ObjectId, _instance: Option<ObjectId>, _owner: ObjectId) -> PyResult<ObjectId> {
    Ok(rt.retain(method))
}

pub(crate) fn method_slots() -> TypeSlots {
    TypeSlots {
        repr: Some(method_repr),
        hash: Some(method_hash),
        richcompare: Some(method_richcompare),
        call: Some(method_call),
        descr_get: Some(method_descr_get),
        ..TypeSlots::default()
    }
}
