use criterion::{Criterion, black_box, criterion_group, criterion_main};
use python_runtime::{BinaryOp, ObjectId, Runtime, RuntimeConfig};

fn quiet_runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default().with_gc_enabled(false))
}

fn make_cycles(rt: &mut Runtime, count: usize) {
    for _ in 0..count {
        let a = rt.new_list(&[]);
        let b = rt.new_list(&[a]);
        rt.list_append(a, b).unwrap();
        rt.release(a);
        rt.release(b);
    }
}

fn make_class(rt: &mut Runtime, name: &str, bases: &[ObjectId]) -> ObjectId {
    let namespace = rt.new_dict();
    let ty = rt.new_type(name, bases, namespace).unwrap();
    rt.release(namespace);
    ty
}

fn benchmark_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Allocation");

    group.bench_function("alloc_release_10000_lists", |b| {
        let mut rt = quiet_runtime();
        b.iter(|| {
            for _ in 0..10000 {
                let list = rt.new_list(&[]);
                rt.release(black_box(list));
            }
        });
    });

    group.bench_function("release_chain_of_1000", |b| {
        let mut rt = quiet_runtime();
        b.iter(|| {
            let mut head = rt.new_list(&[]);
            for _ in 0..1000 {
                let outer = rt.new_list(&[head]);
                rt.release(head);
                head = outer;
            }
            rt.release(head);
        });
    });

    group.finish();
}

fn benchmark_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Garbage Collection");

    group.bench_function("collect_empty_runtime", |b| {
        let mut rt = quiet_runtime();
        b.iter(|| black_box(rt.gc_collect(None).unwrap()));
    });

    group.bench_function("collect_1000_cycles", |b| {
        let mut rt = quiet_runtime();
        b.iter(|| {
            make_cycles(&mut rt, 1000);
            black_box(rt.gc_collect(None).unwrap())
        });
    });

    group.bench_function("collect_young_with_10000_survivors", |b| {
        let mut rt = quiet_runtime();
        let keep: Vec<ObjectId> = (0..10000).map(|_| rt.new_list(&[])).collect();
        rt.gc_collect(None).unwrap();
        b.iter(|| {
            make_cycles(&mut rt, 100);
            black_box(rt.gc_collect(Some(0)).unwrap())
        });
        rt.release_all(keep);
    });

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Dispatch");

    group.bench_function("int_add", |b| {
        let mut rt = quiet_runtime();
        let x = rt.new_int(40);
        let y = rt.new_int(2);
        b.iter(|| {
            let r = rt.binary_op(x, y, BinaryOp::Add).unwrap();
            rt.release(black_box(r));
        });
    });

    group.bench_function("attribute_lookup_depth_8", |b| {
        let mut rt = quiet_runtime();
        let mut ty = make_class(&mut rt, "Root", &[]);
        let one = rt.new_int(1);
        rt.set_attr(ty, "answer", Some(one)).unwrap();
        for depth in 0..8 {
            let sub = make_class(&mut rt, &format!("Level{depth}"), &[ty]);
            rt.release(ty);
            ty = sub;
        }
        let obj = rt.call(ty, &[], &[]).unwrap();
        b.iter(|| {
            let v = rt.get_attr(obj, "answer").unwrap();
            rt.release(black_box(v));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_allocation,
    benchmark_collection,
    benchmark_dispatch
);

criterion_main!(benches);
