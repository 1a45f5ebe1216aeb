//! Helpers shared by the unit tests.

use std::sync::Arc;

use crate::error::PyErr;
use crate::object::ObjectId;
use crate::runtime::{Code, Frame, FrameEvaluator, Runtime};
use crate::PyResult;

type ClosureBody = Box<dyn Fn(&mut Runtime, &Frame<'_>) -> PyResult<ObjectId> + Send + Sync>;

/// Code payload understood by [`ClosureEvaluator`].
pub(crate) struct ClosureCode(ClosureBody);

/// Evaluator whose "bytecode" is a Rust closure.
pub(crate) struct ClosureEvaluator;

impl ClosureEvaluator {
    pub(crate) fn code(
        body: impl Fn(&mut Runtime, &Frame<'_>) -> PyResult<ObjectId> + Send + Sync + 'static,
    ) -> Code {
        Arc::new(ClosureCode(Box::new(body)))
    }
}

impl FrameEvaluator for ClosureEvaluator {
    fn eval_frame(&self, rt: &mut Runtime, frame: Frame<'_>) -> PyResult<ObjectId> {
        let Some(code) = frame.code.downcast_ref::<ClosureCode>() else {
            return Err(PyErr::system_error("code object was not built by ClosureEvaluator"));
        };
        (code.0)(rt, &frame)
    }
}

/// A binding native method; `args[0]` is the receiver.
pub(crate) fn make_method(
    rt: &mut Runtime,
    name: &str,
    body: impl Fn(&mut Runtime, &[ObjectId]) -> PyResult<ObjectId> + Send + Sync + 'static,
) -> ObjectId {
    rt.new_native_method(name, move |rt, args, _kwargs| body(rt, args))
}

/// `class name(*bases)` with `attrs` as the class body.
pub(crate) fn make_class(
    rt: &mut Runtime,
    name: &str,
    bases: &[ObjectId],
    attrs: &[(&str, ObjectId)],
) -> ObjectId {
    let namespace = rt.new_dict();
    for &(key, value) in attrs {
        rt.dict_set_str(namespace, key, value).unwrap();
    }
    let ty = rt.new_type(name, bases, namespace).unwrap();
    rt.release(namespace);
    ty
}
