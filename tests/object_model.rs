use std::sync::Arc;

use parking_lot::Mutex;
use python_runtime::{BuiltinType, ErrorKind, ObjectId, PyResult, Runtime, RuntimeConfig};

fn runtime() -> Runtime {
    // Thresholds high enough that only explicit collections run.
    Runtime::new(RuntimeConfig::default().with_thresholds([100_000, 10, 10]))
}

fn method(
    rt: &mut Runtime,
    name: &str,
    body: impl Fn(&mut Runtime, &[ObjectId]) -> PyResult<ObjectId> + Send + Sync + 'static,
) -> ObjectId {
    rt.new_native_method(name, move |rt, args, _| body(rt, args))
}

fn class(rt: &mut Runtime, name: &str, bases: &[ObjectId], attrs: &[(&str, ObjectId)]) -> ObjectId {
    let namespace = rt.new_dict();
    for &(key, value) in attrs {
        rt.dict_set_str(namespace, key, value).unwrap();
    }
    let ty = rt.new_type(name, bases, namespace).unwrap();
    rt.release(namespace);
    ty
}

fn mro_names(rt: &mut Runtime, ty: ObjectId) -> Vec<String> {
    let mro = rt.get_attr(ty, "__mro__").unwrap();
    let names = rt
        .tuple_items(mro)
        .unwrap()
        .into_iter()
        .map(|t| rt.type_name(t))
        .collect();
    rt.release(mro);
    names
}

#[test]
fn test_diamond_mro() {
    let mut rt = runtime();
    let a = class(&mut rt, "A", &[], &[]);
    let b = class(&mut rt, "B", &[a], &[]);
    let c = class(&mut rt, "C", &[a], &[]);
    let d = class(&mut rt, "D", &[b, c], &[]);
    assert_eq!(mro_names(&mut rt, d), ["D", "B", "C", "A", "object"]);

    let ns = rt.new_dict();
    let err = rt.new_type("E", &[a, d], ns).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

#[test]
fn test_descriptor_precedence() {
    let mut rt = runtime();
    let getter = method(&mut rt, "value", |rt, _| Ok(rt.new_str("from property")));
    let prop = rt.new_property(Some(getter), None, None);
    let plain = method(&mut rt, "plain", |rt, _| Ok(rt.new_str("from method")));
    let cls = class(&mut rt, "Record", &[], &[("value", prop), ("plain", plain)]);
    let obj = rt.call(cls, &[], &[]).unwrap();

    let shadow = rt.new_str("from instance");
    let dict = rt.instance_dict(obj).unwrap();
    rt.dict_set_str(dict, "value", shadow).unwrap();
    rt.dict_set_str(dict, "plain", shadow).unwrap();

    // The property is a data descriptor and wins over the instance dict.
    let value = rt.get_attr(obj, "value").unwrap();
    assert_eq!(rt.str_value(value).unwrap(), "from property");
    // A method is a non-data descriptor and loses to it.
    let plain = rt.get_attr(obj, "plain").unwrap();
    assert_eq!(rt.str_value(plain).unwrap(), "from instance");

    let err = rt.set_attr(obj, "value", Some(shadow)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AttributeError);
}

#[test]
fn test_subclass_reflected_operator_goes_first() {
    let mut rt = runtime();
    let add = method(&mut rt, "__add__", |rt, _| Ok(rt.new_str("Base.__add__")));
    let radd = method(&mut rt, "__radd__", |rt, _| Ok(rt.new_str("Base.__radd__")));
    let base = class(&mut rt, "Base", &[], &[("__add__", add), ("__radd__", radd)]);
    let sub_radd = method(&mut rt, "__radd__", |rt, _| Ok(rt.new_str("Derived.__radd__")));
    let derived = class(&mut rt, "Derived", &[base], &[("__radd__", sub_radd)]);

    let x = rt.call(base, &[], &[]).unwrap();
    let y = rt.call(derived, &[], &[]).unwrap();
    let r = rt.binary_op(x, y, python_runtime::BinaryOp::Add).unwrap();
    assert_eq!(rt.str_value(r).unwrap(), "Derived.__radd__");
    let r = rt.binary_op(y, x, python_runtime::BinaryOp::Add).unwrap();
    assert_eq!(rt.str_value(r).unwrap(), "Base.__add__");
}

#[test]
fn test_cycle_without_finalizer_is_collected() {
    let mut rt = runtime();
    let node = class(&mut rt, "Node", &[], &[]);
    let fired = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&fired);
    let callback = rt.new_native_function("on_dead", move |rt, _, _| {
        *counter.lock() += 1;
        Ok(rt.none())
    });

    let a = rt.call(node, &[], &[]).unwrap();
    let b = rt.call(node, &[], &[]).unwrap();
    rt.set_attr(a, "peer", Some(b)).unwrap();
    rt.set_attr(b, "peer", Some(a)).unwrap();
    let weak = rt.weak_new(a, Some(callback)).unwrap();
    rt.release(a);
    rt.release(b);
    assert!(rt.is_alive(a));

    let collected = rt.gc_collect(None).unwrap();
    assert!(collected >= 2);
    assert!(!rt.is_alive(a));
    assert!(!rt.is_alive(b));
    assert_eq!(rt.weak_get(weak).unwrap(), None);
    assert_eq!(*fired.lock(), 1);

    // Nothing left to find.
    assert_eq!(rt.gc_collect(None).unwrap(), 0);
}

#[test]
fn test_cycle_with_finalizer_is_parked() {
    let mut rt = runtime();
    let calls = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&calls);
    let del = method(&mut rt, "__del__", move |rt, _| {
        *seen.lock() += 1;
        Ok(rt.none())
    });
    let holder = class(&mut rt, "Holder", &[], &[("__del__", del)]);
    let a = rt.call(holder, &[], &[]).unwrap();
    rt.set_attr(a, "me", Some(a)).unwrap();
    rt.release(a);

    let outcome = rt.gc_collect_outcome(2).unwrap();
    assert_eq!(outcome.collected, 0);
    assert!(outcome.uncollectable >= 1);
    assert!(rt.gc_garbage().contains(&a));
    assert!(rt.is_alive(a));
    assert_eq!(*calls.lock(), 0);
}

#[test]
fn test_finalizer_runs_on_last_release() {
    let mut rt = runtime();
    let del = method(&mut rt, "__del__", |_, _| {
        Err(python_runtime::PyErr::value_error("boom"))
    });
    let noisy = class(&mut rt, "Noisy", &[], &[("__del__", del)]);
    let obj = rt.call(noisy, &[], &[]).unwrap();
    rt.release(obj);
    assert!(!rt.is_alive(obj));
    assert_eq!(rt.unraisable_count(), 1);
    let report = &rt.unraisable_history()[0];
    assert_eq!(report.error.message, "boom");
}

#[test]
fn test_repr_of_self_containing_containers() {
    let mut rt = runtime();
    let one = rt.new_int(1);
    let list = rt.new_list(&[one]);
    rt.list_append(list, list).unwrap();
    assert_eq!(rt.repr(list).unwrap(), "[1, [...]]");

    let text = rt.new_str("it's");
    let pair = rt.new_tuple(&[one, text]);
    assert_eq!(rt.repr(pair).unwrap(), "(1, \"it's\")");
}

#[test]
fn test_release_leaves_no_survivors_at_any_depth() {
    let mut rt = runtime();
    let baseline = rt.mortal_objects();
    for depth in [1usize, 10, 100, 1000] {
        let mut head = rt.new_list(&[]);
        for _ in 1..depth {
            let outer = rt.new_list(&[head]);
            rt.release(head);
            head = outer;
        }
        assert_eq!(rt.mortal_objects(), baseline + depth);
        rt.release(head);
        assert_eq!(rt.mortal_objects(), baseline, "depth {depth}");
    }
}

#[test]
fn test_shutdown_reports_no_leaks_for_dropped_classes() {
    let mut rt = runtime();
    let base = class(&mut rt, "Base", &[], &[]);
    let sub = class(&mut rt, "Sub", &[base], &[]);
    let obj = rt.call(sub, &[], &[]).unwrap();
    rt.set_attr(obj, "cls", Some(sub)).unwrap();
    rt.release(obj);
    rt.release(sub);
    rt.release(base);

    let report = rt.shutdown();
    assert_eq!(report.leaked, 0);
    assert_eq!(report.uncollectable, 0);
}

#[test]
fn test_builtin_types_reject_subclassing_and_mutation() {
    let mut rt = runtime();
    let int = rt.builtin(BuiltinType::Int);
    let ns = rt.new_dict();
    assert!(rt.new_type("MyInt", &[int], ns).is_err());
    let one = rt.new_int(1);
    let err = rt.set_attr(int, "x", Some(one)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}
