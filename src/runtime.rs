//! The runtime context that owns the object graph.
//!
//! A `Runtime` owns the heap arena, the built-in type registry, the process
//! singletons (`None`, `NotImplemented`, booleans, small integers), the
//! collector state and the error state. Everything in the object core is a
//! method on `Runtime`, and native callables receive `&mut Runtime`, so the
//! single-threaded ownership model of the object graph is enforced by the
//! borrow checker rather than by convention.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::collector::Collector;
use crate::config::RuntimeConfig;
use crate::errstate::ErrorState;
use crate::heap::Heap;
use crate::object::{ObjectData, ObjectFlags, ObjectId};
use crate::types::{bootstrap, BuiltinType, BuiltinTypes};
use crate::PyResult;

/// Opaque compiled code, produced and interpreted by the evaluator.
pub type Code = Arc<dyn Any + Send + Sync>;

/// Everything the evaluator needs to run one call of a user-defined function.
pub struct Frame<'a> {
    pub code: &'a Code,
    pub globals: ObjectId,
    pub args: &'a [ObjectId],
    pub kwargs: &'a [(&'a str, ObjectId)],
    pub defaults: &'a [ObjectId],
    pub closure: &'a [ObjectId],
}

/// Entry point of the bytecode evaluator.
///
/// Arguments are borrowed, the result is a new reference. Failures are
/// reported through the returned `PyErr`.
pub trait FrameEvaluator: Send + Sync {
    fn eval_frame(&self, rt: &mut Runtime, frame: Frame<'_>) -> PyResult<ObjectId>;
}

#[derive(Debug, Clone)]
pub(crate) struct Singletons {
    pub none: ObjectId,
    pub not_implemented: ObjectId,
    pub true_: ObjectId,
    pub false_: ObjectId,
    pub empty_tuple: ObjectId,
    pub small_int_low: i64,
    pub small_ints: Vec<ObjectId>,
}

impl Singletons {
    fn dangling() -> Self {
        Self {
            none: ObjectId::DANGLING,
            not_implemented: ObjectId::DANGLING,
            true_: ObjectId::DANGLING,
            false_: ObjectId::DANGLING,
            empty_tuple: ObjectId::DANGLING,
            small_int_low: 0,
            small_ints: Vec::new(),
        }
    }
}

/// Outcome of [`Runtime::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Objects freed by the final collections.
    pub collected: usize,
    /// Finalizer-bearing cycles that were still parked at shutdown.
    pub uncollectable: usize,
    /// Mortal objects still alive after teardown.
    pub leaked: usize,
}

pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) types: BuiltinTypes,
    pub(crate) singletons: Singletons,
    pub(crate) collector: Collector,
    pub(crate) errors: ErrorState,
    pub(crate) config: RuntimeConfig,
    pub(crate) bootstrapping: bool,
    pub(crate) dealloc_queue: Vec<ObjectId>,
    pub(crate) deallocating: bool,
    /// Weak reference callbacks waiting for the current teardown to finish,
    /// as `(weakref, callback)` pairs of owned references.
    pub(crate) pending_callbacks: VecDeque<(ObjectId, ObjectId)>,
    interned: HashMap<String, ObjectId>,
    pool: Vec<ObjectId>,
    recursion_depth: usize,
    repr_stack: Vec<ObjectId>,
    evaluator: Option<Arc<dyn FrameEvaluator>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("live_objects", &self.heap.live_count())
            .field("recursion_depth", &self.recursion_depth)
            .field("gc_enabled", &self.collector.enabled)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Creates a runtime and readies every built-in type.
    ///
    /// # Panics
    ///
    /// Panics if the built-in type table is malformed; that is a bug in this
    /// crate, never a user error.
    pub fn new(config: RuntimeConfig) -> Self {
        let mut rt = Self {
            heap: Heap::new(),
            types: BuiltinTypes::new([ObjectId::DANGLING; BuiltinType::COUNT]),
            singletons: Singletons::dangling(),
            collector: Collector::new(&config),
            errors: ErrorState::new(config.unraisable_history),
            config,
            bootstrapping: true,
            dealloc_queue: Vec::new(),
            deallocating: false,
            pending_callbacks: VecDeque::new(),
            interned: HashMap::new(),
            pool: Vec::new(),
            recursion_depth: 0,
            repr_stack: Vec::new(),
            evaluator: None,
        };

        if let Err(err) = bootstrap::install(&mut rt) {
            panic!("runtime bootstrap failed: {err}");
        }
        rt.bootstrapping = false;

        info!(
            "runtime initialised with {} immortal objects",
            rt.heap.live_count()
        );
        rt
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Allocates a new object of type `ty`. The caller owns the returned
    /// reference. Containers are tracked by the collector, which may run a
    /// collection before this returns.
    pub(crate) fn alloc(&mut self, ty: ObjectId, data: ObjectData) -> ObjectId {
        let container = data.is_container();
        let mut flags = ObjectFlags::empty();
        if self.bootstrapping {
            flags.insert(ObjectFlags::IMMORTAL);
        } else if self.is_heap_type(ty) {
            self.retain(ty);
            flags.insert(ObjectFlags::OWNS_TYPE);
        }

        let id = self.heap.allocate(ty, data, flags);
        if container && !self.bootstrapping {
            self.gc_track(id);
        }
        id
    }

    pub(crate) fn alloc_builtin(&mut self, which: BuiltinType, data: ObjectData) -> ObjectId {
        let ty = self.builtin(which);
        self.alloc(ty, data)
    }

    /// Number of live objects, immortal ones included.
    pub fn live_objects(&self) -> usize {
        self.heap.live_count()
    }

    /// Number of live objects that can still be freed.
    pub fn mortal_objects(&self) -> usize {
        self.heap
            .ids()
            .filter(|&id| {
                self.heap
                    .try_get(id)
                    .is_some_and(|entry| !entry.is_immortal())
            })
            .count()
    }

    pub fn is_alive(&self, obj: ObjectId) -> bool {
        self.heap.contains(obj)
    }

    pub fn refcount(&self, obj: ObjectId) -> PyResult<usize> {
        Ok(self.heap.get(obj)?.refcount)
    }

    pub fn none(&self) -> ObjectId {
        self.singletons.none
    }

    pub fn not_implemented(&self) -> ObjectId {
        self.singletons.not_implemented
    }

    pub fn is_none(&self, obj: ObjectId) -> bool {
        obj == self.singletons.none
    }

    pub fn bool_obj(&self, value: bool) -> ObjectId {
        if value {
            self.singletons.true_
        } else {
            self.singletons.false_
        }
    }

    pub fn empty_tuple(&self) -> ObjectId {
        self.singletons.empty_tuple
    }

    /// Returns the interned string object for `name`, a new reference.
    pub fn intern(&mut self, name: &str) -> ObjectId {
        if let Some(&id) = self.interned.get(name) {
            return self.retain(id);
        }
        let id = self.new_str(name);
        self.retain(id);
        self.interned.insert(name.to_string(), id);
        id
    }

    /// Runs `f` one level deeper in the recursion guard, failing with the
    /// "too deep" error once the configured limit is reached.
    pub fn with_recursion_guard<R>(
        &mut self,
        context: &str,
        f: impl FnOnce(&mut Self) -> PyResult<R>,
    ) -> PyResult<R> {
        if self.recursion_depth >= self.config.recursion_limit {
            return Err(crate::error::PyErr::recursion(context));
        }
        self.recursion_depth += 1;
        let result = f(self);
        self.recursion_depth -= 1;
        result
    }

    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth
    }

    /// Marks `obj` as being printed. Returns false if it already is, in which
    /// case the caller must emit the recursive placeholder instead.
    pub(crate) fn repr_enter(&mut self, obj: ObjectId) -> bool {
        if self.repr_stack.contains(&obj) {
            return false;
        }
        self.repr_stack.push(obj);
        true
    }

    pub(crate) fn repr_leave(&mut self, obj: ObjectId) {
        if let Some(pos) = self.repr_stack.iter().rposition(|&id| id == obj) {
            self.repr_stack.remove(pos);
        }
    }

    pub fn set_evaluator(&mut self, evaluator: Arc<dyn FrameEvaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub(crate) fn evaluator(&self) -> Option<Arc<dyn FrameEvaluator>> {
        self.evaluator.clone()
    }

    /// Parks `obj` in the reuse pool. The pool keeps one strong reference,
    /// which the collector does not count as external.
    pub fn pool_adopt(&mut self, obj: ObjectId) -> PyResult<()> {
        let entry = self.heap.get_mut(obj)?;
        if entry.flags.contains(ObjectFlags::POOLED) {
            return Ok(());
        }
        entry.flags.insert(ObjectFlags::POOLED);
        self.retain(obj);
        self.pool.push(obj);
        Ok(())
    }

    /// Releases every pooled object.
    pub fn pool_drain(&mut self) -> usize {
        let pooled = std::mem::take(&mut self.pool);
        let count = pooled.len();
        for obj in pooled {
            if let Some(entry) = self.heap.try_get_mut(obj) {
                entry.flags.remove(ObjectFlags::POOLED);
            }
            self.release(obj);
        }
        count
    }

    /// Drops the pool's reference to `obj`, if it holds one.
    pub(crate) fn pool_forget(&mut self, obj: ObjectId) -> bool {
        let Some(pos) = self.pool.iter().position(|&id| id == obj) else {
            return false;
        };
        self.pool.swap_remove(pos);
        if let Some(entry) = self.heap.try_get_mut(obj) {
            entry.flags.remove(ObjectFlags::POOLED);
        }
        self.release(obj);
        true
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Tears the runtime down: drains the pool, releases interned strings and
    /// parked garbage, and runs full collections until nothing else is freed.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.pool_drain();
        let mut collected = self.gc_collect_full();

        let uncollectable = self.gc_clear_garbage();
        let interned: Vec<ObjectId> = self.interned.drain().map(|(_, id)| id).collect();
        for id in interned {
            self.release(id);
        }

        loop {
            let freed = self.gc_collect_full();
            collected += freed;
            if freed == 0 {
                break;
            }
        }
        self.prune_subclasses();

        let leaked = self.mortal_objects();
        info!("runtime shut down: collected={collected} uncollectable={uncollectable} leaked={leaked}");
        if leaked > 0 {
            debug!("{leaked} objects still alive at shutdown");
        }
        ShutdownReport {
            collected,
            uncollectable,
            leaked,
        }
    }

    fn gc_collect_full(&mut self) -> usize {
        crate::collector::collect_generation(self, 2)
            .map(|outcome| outcome.collected)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_singletons_are_immortal() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let none = rt.none();
        let before = rt.refcount(none).unwrap();
        rt.release(none);
        rt.release(none);
        assert!(rt.is_alive(none));
        assert_eq!(rt.refcount(none).unwrap(), before);
    }

    #[test]
    fn test_intern_returns_same_object() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let a = rt.intern("spam");
        let b = rt.intern("spam");
        assert_eq!(a, b);
        rt.release(a);
        rt.release(b);
        assert!(rt.is_alive(a));
    }

    #[test]
    fn test_recursion_guard_fails_fast() {
        fn dive(rt: &mut Runtime, n: usize) -> PyResult<usize> {
            rt.with_recursion_guard(" in test", |rt| dive(rt, n + 1))
        }

        let mut rt = Runtime::new(RuntimeConfig::default().with_recursion_limit(25));
        let err = dive(&mut rt, 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RuntimeError);
        assert_eq!(rt.recursion_depth(), 0);
    }

    #[test]
    fn test_pool_adopt_and_drain() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let list = rt.new_list(&[]);
        rt.pool_adopt(list).unwrap();
        rt.release(list);
        assert!(rt.is_alive(list));
        assert_eq!(rt.pool_len(), 1);

        assert_eq!(rt.pool_drain(), 1);
        assert!(!rt.is_alive(list));
    }

    #[test]
    fn test_shutdown_reports_no_leaks_for_clean_graph() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let a = rt.new_list(&[]);
        let b = rt.new_list(&[a]);
        rt.list_append(a, b).unwrap();
        rt.release(a);
        rt.release(b);

        let report = rt.shutdown();
        assert_eq!(report.leaked, 0);
        assert_eq!(report.collected, 2);
    }
}
