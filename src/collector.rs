use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use log::{debug, warn};

use crate::config::{RuntimeConfig, DEBUG_COLLECTABLE, DEBUG_SAVEALL, DEBUG_STATS, DEBUG_UNCOLLECTABLE};
use crate::gc::GenerationStats;
use crate::generation::{GenerationManager, NUM_GENERATIONS};
use crate::object::{GcHead, GcState, ObjectData, ObjectFlags, ObjectId};
use crate::runtime::Runtime;
use crate::RuntimeResult;

/// Collector state owned by the runtime.
#[derive(Debug)]
pub struct Collector {
    pub generation_manager: GenerationManager,
    pub enabled: bool,
    pub debug_flags: u32,
    /// Uncollectable objects parked by earlier collections, strong references.
    pub garbage: Vec<ObjectId>,
    pub stats: [GenerationStats; NUM_GENERATIONS],
}

impl Collector {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            generation_manager: GenerationManager::new(config.gc_thresholds),
            enabled: config.gc_enabled,
            debug_flags: config.gc_debug,
            garbage: Vec::new(),
            stats: Default::default(),
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.generation_manager.is_collecting()
    }

    pub fn set_debug(&mut self, flags: u32) {
        self.debug_flags = flags;
    }
}

/// Result of one collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionOutcome {
    pub generation: usize,
    /// Unreachable objects that were freed.
    pub collected: usize,
    /// Unreachable objects parked in the garbage list instead.
    pub uncollectable: usize,
}

/// Collects `generation` together with every younger generation.
///
/// Errors raised by weak reference callbacks or destructors during the pass
/// are written to the unraisable channel and never returned.
pub fn collect_generation(rt: &mut Runtime, generation: usize) -> RuntimeResult<CollectionOutcome> {
    let working = rt.collector.generation_manager.start_collection(generation)?;
    let started = Instant::now();
    debug!(
        "gc: collecting generation {generation}, objects in each generation: {:?}, working set {}",
        rt.collector.generation_manager.counts(),
        working.len()
    );

    let outcome = collect_main(rt, generation, &working);
    rt.collector.generation_manager.end_collection();

    let stats = &mut rt.collector.stats[generation];
    stats.collections += 1;
    stats.collected += outcome.collected;
    stats.uncollectable += outcome.uncollectable;

    let message = format!(
        "gc: done, {} unreachable, {} uncollectable, {:.4}s elapsed",
        outcome.collected + outcome.uncollectable,
        outcome.uncollectable,
        started.elapsed().as_secs_f64()
    );
    if rt.collector.debug_flags & DEBUG_STATS != 0 {
        log::info!("{message}");
    } else {
        debug!("{message}");
    }
    Ok(outcome)
}

fn collect_main(rt: &mut Runtime, generation: usize, working: &[ObjectId]) -> CollectionOutcome {
    let survivor_generation = (generation + 1).min(NUM_GENERATIONS - 1);
    let mut outcome = CollectionOutcome {
        generation,
        ..CollectionOutcome::default()
    };

    update_refs(rt, working);
    subtract_refs(rt, working);
    let unreachable = move_unreachable(rt, working);

    if !unreachable.is_empty() {
        let (doomed, parked) = move_legacy_finalizers(rt, unreachable);
        outcome.uncollectable = parked;

        handle_weakrefs(rt, &doomed);
        rt.fire_weakref_callbacks("garbage collection");
        let doomed = handle_resurrected_objects(rt, doomed);

        outcome.collected = delete_garbage(rt, &doomed);
    }

    restore_survivors(rt, working, survivor_generation);
    outcome
}

fn head_mut(rt: &mut Runtime, id: ObjectId) -> Option<&mut GcHead> {
    rt.heap.try_get_mut(id).and_then(|entry| entry.gc.as_mut())
}

fn head(rt: &Runtime, id: ObjectId) -> Option<&GcHead> {
    rt.heap.try_get(id).and_then(|entry| entry.gc.as_ref())
}

fn in_working_set(rt: &Runtime, id: ObjectId) -> bool {
    head(rt, id).is_some_and(GcHead::is_collecting)
}

/// Seeds each container's scratch count from its true reference count. The
/// reuse pool's reference is not external, so pooled objects discount it.
fn update_refs(rt: &mut Runtime, working: &[ObjectId]) {
    for &id in working {
        let Some(entry) = rt.heap.try_get_mut(id) else {
            continue;
        };
        let pooled = entry.flags.contains(ObjectFlags::POOLED);
        let refs = entry.refcount as isize - isize::from(pooled);
        if let Some(head) = entry.gc.as_mut() {
            head.generation = None;
            head.gc_refs = refs;
            head.state = GcState::BeingTraced;
        }
    }
}

/// Removes references internal to the working set from the scratch counts.
fn subtract_refs(rt: &mut Runtime, working: &[ObjectId]) {
    for &id in working {
        for child in rt.referents_of(id) {
            if let Some(head) = head_mut(rt, child)
                && head.is_collecting()
            {
                head.gc_refs -= 1;
            }
        }
    }
}

/// Marks everything reachable from an externally referenced container and
/// returns the rest as candidates.
fn move_unreachable(rt: &mut Runtime, working: &[ObjectId]) -> Vec<ObjectId> {
    let mut queue = VecDeque::new();
    for &id in working {
        if let Some(head) = head_mut(rt, id)
            && head.gc_refs > 0
        {
            head.state = GcState::Reachable;
            queue.push_back(id);
        }
    }

    while let Some(current) = queue.pop_front() {
        for child in rt.referents_of(current) {
            if let Some(head) = head_mut(rt, child)
                && head.is_collecting()
                && head.state != GcState::Reachable
            {
                head.state = GcState::Reachable;
                queue.push_back(child);
            }
        }
    }

    let mut unreachable = Vec::new();
    for &id in working {
        if let Some(head) = head_mut(rt, id)
            && head.state != GcState::Reachable
        {
            head.state = GcState::Candidate;
            unreachable.push(id);
        }
    }
    unreachable
}

fn has_legacy_finalizer(rt: &Runtime, id: ObjectId) -> bool {
    rt.slots_of(id).is_ok_and(|slots| slots.finalize.is_some())
}

/// Splits the candidates into those that will be destroyed and those parked
/// as uncollectable: finalizer-bearing candidates and everything reachable
/// from them (every candidate under `DEBUG_SAVEALL`). Returns the doomed list
/// and the number parked.
fn move_legacy_finalizers(rt: &mut Runtime, unreachable: Vec<ObjectId>) -> (Vec<ObjectId>, usize) {
    let save_all = rt.collector.debug_flags & DEBUG_SAVEALL != 0;
    let parked: HashSet<ObjectId> = if save_all {
        unreachable.iter().copied().collect()
    } else {
        let roots: Vec<ObjectId> = unreachable
            .iter()
            .copied()
            .filter(|&id| has_legacy_finalizer(rt, id))
            .collect();
        finalizer_reachable(rt, roots)
    };

    let mut doomed = Vec::with_capacity(unreachable.len() - parked.len());
    for id in unreachable {
        if !parked.contains(&id) {
            if rt.collector.debug_flags & DEBUG_COLLECTABLE != 0 {
                debug!("gc: collectable <{} {id}>", rt.type_name_of(id));
            }
            doomed.push(id);
            continue;
        }

        if rt.collector.debug_flags & DEBUG_UNCOLLECTABLE != 0 {
            warn!("gc: uncollectable <{} {id}>", rt.type_name_of(id));
        }
        if let Some(head) = head_mut(rt, id) {
            head.state = GcState::Reachable;
        }
        if !rt.collector.garbage.contains(&id) {
            rt.retain(id);
            rt.collector.garbage.push(id);
        }
    }
    (doomed, parked.len())
}

fn is_candidate(rt: &Runtime, id: ObjectId) -> bool {
    head(rt, id).is_some_and(|head| head.state == GcState::Candidate)
}

/// Candidates reachable from `roots`. The walk never leaves the candidate
/// set, so a finalizer's type, its MRO and the builtins are not visited.
fn finalizer_reachable(rt: &Runtime, roots: Vec<ObjectId>) -> HashSet<ObjectId> {
    let mut reached: HashSet<ObjectId> = roots.iter().copied().collect();
    let mut stack = roots;
    while let Some(current) = stack.pop() {
        for child in rt.referents_of(current) {
            if is_candidate(rt, child) && reached.insert(child) {
                stack.push(child);
            }
        }
    }
    reached
}

/// Clears every weak reference to a doomed object before any callback runs.
/// A callback is skipped when either the weakref or the callback itself is
/// doomed; a doomed weakref to a surviving target is detached so its callback
/// can never fire later.
fn handle_weakrefs(rt: &mut Runtime, doomed: &[ObjectId]) {
    let doomed_set: HashSet<ObjectId> = doomed.iter().copied().collect();

    for &id in doomed {
        let is_weakref = rt
            .heap
            .try_get(id)
            .is_some_and(|entry| matches!(entry.data, ObjectData::WeakRef(_)));
        if is_weakref {
            rt.unlink_weakref(id);
        }

        rt.clear_weakrefs(id, |weak, callback| {
            !doomed_set.contains(&weak) && !doomed_set.contains(&callback)
        });
    }
}

/// Re-runs trial deletion over the doomed set after the weakref callbacks.
/// A callback may have stored a doomed object somewhere live; that object and
/// every doomed object it reaches survive untouched and are promoted with the
/// rest of the survivors.
fn handle_resurrected_objects(rt: &mut Runtime, doomed: Vec<ObjectId>) -> Vec<ObjectId> {
    let doomed: Vec<ObjectId> = doomed.into_iter().filter(|&id| is_candidate(rt, id)).collect();

    for &id in &doomed {
        let Some(entry) = rt.heap.try_get_mut(id) else {
            continue;
        };
        let pooled = entry.flags.contains(ObjectFlags::POOLED);
        let refs = entry.refcount as isize - isize::from(pooled);
        if let Some(head) = entry.gc.as_mut() {
            head.gc_refs = refs;
        }
    }
    for &id in &doomed {
        for child in rt.referents_of(id) {
            if let Some(head) = head_mut(rt, child)
                && head.state == GcState::Candidate
            {
                head.gc_refs -= 1;
            }
        }
    }

    let mut stack: Vec<ObjectId> = doomed
        .iter()
        .copied()
        .filter(|&id| head(rt, id).is_some_and(|head| head.gc_refs > 0))
        .collect();
    for &id in &stack {
        if let Some(head) = head_mut(rt, id) {
            head.state = GcState::Reachable;
        }
    }
    while let Some(current) = stack.pop() {
        for child in rt.referents_of(current) {
            if let Some(head) = head_mut(rt, child)
                && head.state == GcState::Candidate
            {
                head.state = GcState::Reachable;
                stack.push(child);
            }
        }
    }

    let before = doomed.len();
    let doomed: Vec<ObjectId> = doomed.into_iter().filter(|&id| is_candidate(rt, id)).collect();
    if doomed.len() < before {
        debug!("gc: {} object(s) resurrected by weakref callbacks", before - doomed.len());
    }
    doomed
}

/// Breaks the outgoing references of every doomed object, dropping the reuse
/// pool's hold on it first. Returns the number actually freed; objects
/// resurrected by a destructor survive.
fn delete_garbage(rt: &mut Runtime, doomed: &[ObjectId]) -> usize {
    for &id in doomed {
        if !is_candidate(rt, id) {
            continue;
        }
        rt.retain(id);
        rt.pool_forget(id);
        rt.clear_refs(id);
        rt.release(id);
    }

    doomed.iter().filter(|&&id| !rt.is_alive(id)).count()
}

/// Links every surviving member of the working set into `target`; parked
/// garbage goes to the oldest generation.
fn restore_survivors(rt: &mut Runtime, working: &[ObjectId], target: usize) {
    for &id in working {
        if !in_working_set(rt, id) {
            continue;
        }
        let parked = rt.collector.garbage.contains(&id);
        let generation = if parked { NUM_GENERATIONS - 1 } else { target };
        if let Some(head) = head_mut(rt, id) {
            head.generation = Some(generation);
            head.gc_refs = 0;
            head.state = GcState::Reachable;
        }
        rt.collector.generation_manager.insert(generation, id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::{ErrorKind, PyErr, RuntimeError};
    use crate::testing::{make_class, make_method};

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default().with_gc_enabled(false))
    }

    /// Two instances of a fresh class pointing at each other, with no other
    /// references left. Returns `(class, a, b)`.
    fn instance_pair(rt: &mut Runtime) -> (ObjectId, ObjectId, ObjectId) {
        let node = make_class(rt, "Node", &[], &[]);
        let a = rt.call(node, &[], &[]).unwrap();
        let b = rt.call(node, &[], &[]).unwrap();
        rt.set_attr(a, "peer", Some(b)).unwrap();
        rt.set_attr(b, "peer", Some(a)).unwrap();
        (node, a, b)
    }

    fn counting_callback(rt: &mut Runtime, fired: &Arc<Mutex<usize>>) -> ObjectId {
        let fired = Arc::clone(fired);
        rt.new_native_function("on_dead", move |rt, _, _| {
            *fired.lock() += 1;
            Ok(rt.none())
        })
    }

    #[test]
    fn test_collects_two_list_cycle() {
        let mut rt = runtime();
        let baseline = rt.live_objects();
        let a = rt.new_list(&[]);
        let b = rt.new_list(&[a]);
        rt.list_append(a, b).unwrap();
        rt.release(a);
        rt.release(b);
        assert_eq!(rt.live_objects(), baseline + 2);

        let outcome = collect_generation(&mut rt, 0).unwrap();
        assert_eq!(outcome.collected, 2);
        assert_eq!(outcome.uncollectable, 0);
        assert!(!rt.is_alive(a));
        assert!(!rt.is_alive(b));
        assert_eq!(rt.live_objects(), baseline);
    }

    #[test]
    fn test_externally_referenced_cycle_survives_and_is_promoted() {
        let mut rt = runtime();
        let a = rt.new_list(&[]);
        let b = rt.new_list(&[a]);
        rt.list_append(a, b).unwrap();
        rt.release(b);

        let outcome = collect_generation(&mut rt, 0).unwrap();
        assert_eq!(outcome.collected, 0);
        assert!(rt.is_alive(b));
        assert_eq!(rt.gc_generation_of(a), Some(1));
        assert_eq!(rt.gc_generation_of(b), Some(1));

        rt.release(a);
        let outcome = collect_generation(&mut rt, 1).unwrap();
        assert_eq!(outcome.collected, 2);
    }

    #[test]
    fn test_indirectly_referenced_objects_survive() {
        let mut rt = runtime();
        let tail = rt.new_list(&[]);
        let middle = rt.new_list(&[tail]);
        let head = rt.new_list(&[middle]);
        rt.list_append(tail, middle).unwrap();
        rt.release(tail);
        rt.release(middle);

        let outcome = collect_generation(&mut rt, 2).unwrap();
        assert_eq!(outcome.collected, 0);
        assert!(rt.is_alive(tail));
        assert!(rt.is_alive(middle));
        rt.release(head);
        assert_eq!(collect_generation(&mut rt, 2).unwrap().collected, 2);
    }

    #[test]
    fn test_second_collection_is_idempotent() {
        let mut rt = runtime();
        for _ in 0..10 {
            let a = rt.new_list(&[]);
            rt.list_append(a, a).unwrap();
            rt.release(a);
        }
        let first = collect_generation(&mut rt, 2).unwrap();
        assert_eq!(first.collected, 10);
        let second = collect_generation(&mut rt, 2).unwrap();
        assert_eq!(second.collected, 0);
        assert_eq!(second.uncollectable, 0);
    }

    #[test]
    fn test_pooled_reference_is_discounted() {
        let mut rt = runtime();
        let a = rt.new_list(&[]);
        rt.list_append(a, a).unwrap();
        rt.pool_adopt(a).unwrap();
        rt.release(a);

        let outcome = collect_generation(&mut rt, 0).unwrap();
        assert_eq!(outcome.collected, 1);
        assert!(!rt.is_alive(a));
        assert_eq!(rt.pool_len(), 0);
    }

    #[test]
    fn test_save_all_parks_every_candidate() {
        let mut rt = runtime();
        rt.gc_set_debug(DEBUG_SAVEALL);
        let a = rt.new_list(&[]);
        rt.list_append(a, a).unwrap();
        rt.release(a);

        let outcome = collect_generation(&mut rt, 0).unwrap();
        assert_eq!(outcome.collected, 0);
        assert_eq!(outcome.uncollectable, 1);
        assert_eq!(rt.gc_garbage(), vec![a]);
        assert_eq!(rt.gc_generation_of(a), Some(2));

        rt.gc_set_debug(0);
        assert_eq!(rt.gc_clear_garbage(), 1);
        assert_eq!(collect_generation(&mut rt, 2).unwrap().collected, 1);
    }

    #[test]
    fn test_invalid_generation() {
        let mut rt = runtime();
        assert_eq!(
            collect_generation(&mut rt, 3),
            Err(RuntimeError::InvalidGeneration(3))
        );
    }

    #[test]
    fn test_stats_are_recorded() {
        let mut rt = runtime();
        let a = rt.new_list(&[]);
        rt.list_append(a, a).unwrap();
        rt.release(a);
        collect_generation(&mut rt, 1).unwrap();

        let stats = rt.gc_stats();
        assert_eq!(stats.generations[1].collections, 1);
        assert_eq!(stats.generations[1].collected, 1);
        assert_eq!(stats.generations[0].collections, 0);
    }

    #[test]
    fn test_callbacks_run_after_the_whole_batch_is_cleared() {
        let mut rt = runtime();
        let (_node, a, b) = instance_pair(&mut rt);

        let weaks: Arc<Mutex<Vec<ObjectId>>> = Arc::default();
        let seen: Arc<Mutex<Vec<(bool, bool)>>> = Arc::default();
        let (watched, log) = (Arc::clone(&weaks), Arc::clone(&seen));
        let callback = rt.new_native_function("on_dead", move |rt, _, _| {
            let refs = watched.lock().clone();
            let dead = (rt.weak_is_dead(refs[0])?, rt.weak_is_dead(refs[1])?);
            log.lock().push(dead);
            Ok(rt.none())
        });
        let wa = rt.weak_new(a, Some(callback)).unwrap();
        let wb = rt.weak_new(b, Some(callback)).unwrap();
        *weaks.lock() = vec![wa, wb];
        rt.release(callback);
        rt.release(a);
        rt.release(b);

        let outcome = collect_generation(&mut rt, 2).unwrap();
        assert!(outcome.collected >= 2);
        assert!(!rt.is_alive(a));
        assert!(!rt.is_alive(b));
        assert_eq!(*seen.lock(), vec![(true, true), (true, true)]);
    }

    #[test]
    fn test_callback_of_a_doomed_weakref_is_skipped() {
        let mut rt = runtime();
        let fired = Arc::new(Mutex::new(0));
        let callback = counting_callback(&mut rt, &fired);
        let (_node, a, b) = instance_pair(&mut rt);
        let weak = rt.weak_new(b, Some(callback)).unwrap();
        rt.set_attr(a, "watch", Some(weak)).unwrap();
        rt.release_all([weak, callback, a, b]);

        collect_generation(&mut rt, 2).unwrap();
        assert!(!rt.is_alive(a));
        assert!(!rt.is_alive(weak));
        assert!(!rt.is_alive(callback));
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn test_doomed_bound_method_callback_is_skipped() {
        let mut rt = runtime();
        let fired = Arc::new(Mutex::new(0));
        let count = Arc::clone(&fired);
        let on_dead = make_method(&mut rt, "on_dead", move |rt, _| {
            *count.lock() += 1;
            Ok(rt.none())
        });
        let node = make_class(&mut rt, "Watcher", &[], &[("on_dead", on_dead)]);
        let a = rt.call(node, &[], &[]).unwrap();
        let b = rt.call(node, &[], &[]).unwrap();
        rt.set_attr(a, "peer", Some(b)).unwrap();
        rt.set_attr(b, "peer", Some(a)).unwrap();

        // The callback is a method bound to `a`, and `a` owns the weakref.
        let bound = rt.get_attr(a, "on_dead").unwrap();
        let weak = rt.weak_new(b, Some(bound)).unwrap();
        rt.set_attr(a, "watch", Some(weak)).unwrap();
        rt.release_all([weak, bound, a, b]);

        collect_generation(&mut rt, 2).unwrap();
        assert!(!rt.is_alive(a));
        assert!(!rt.is_alive(b));
        assert!(!rt.is_alive(bound));
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn test_doomed_weakref_to_survivor_never_fires() {
        let mut rt = runtime();
        let fired = Arc::new(Mutex::new(0));
        let callback = counting_callback(&mut rt, &fired);
        let survivor = rt.new_list(&[]);
        let holder = rt.new_list(&[]);
        rt.list_append(holder, holder).unwrap();
        let weak = rt.weak_new(survivor, Some(callback)).unwrap();
        rt.list_append(holder, weak).unwrap();
        rt.release_all([weak, callback, holder]);

        collect_generation(&mut rt, 2).unwrap();
        assert!(!rt.is_alive(weak));
        assert_eq!(rt.weak_count(survivor), 0);

        rt.release(survivor);
        assert!(!rt.is_alive(survivor));
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn test_resurrected_objects_survive_and_are_promoted() {
        let mut rt = runtime();
        let (_node, a, b) = instance_pair(&mut rt);
        let kept: Arc<Mutex<Vec<ObjectId>>> = Arc::default();
        let keep = Arc::clone(&kept);
        let callback = rt.new_native_function("resurrect", move |rt, _, _| {
            keep.lock().push(rt.retain(b));
            Ok(rt.none())
        });
        let weak = rt.weak_new(a, Some(callback)).unwrap();
        rt.release(callback);
        rt.release(a);
        rt.release(b);

        let outcome = collect_generation(&mut rt, 0).unwrap();
        assert_eq!(outcome.collected, 0);
        assert_eq!(*kept.lock(), vec![b]);
        assert!(rt.weak_is_dead(weak).unwrap());
        // `b` still reaches `a`, so both come back with their state intact.
        assert!(rt.is_alive(a));
        let peer = rt.get_attr(b, "peer").unwrap();
        assert_eq!(peer, a);
        rt.release(peer);
        assert_eq!(rt.gc_generation_of(a), Some(1));
        assert_eq!(rt.gc_generation_of(b), Some(1));

        let revived = kept.lock().pop().unwrap();
        rt.release(revived);
        assert!(collect_generation(&mut rt, 2).unwrap().collected >= 2);
        assert!(!rt.is_alive(b));
    }

    #[test]
    fn test_callback_errors_are_unraisable() {
        let mut rt = runtime();
        let callback = rt.new_native_function("cb", |_, _, _| Err(PyErr::value_error("callback failed")));
        let (_node, a, b) = instance_pair(&mut rt);
        let weak = rt.weak_new(a, Some(callback)).unwrap();
        rt.release_all([callback, a, b]);

        let outcome = collect_generation(&mut rt, 2).unwrap();
        assert!(outcome.collected >= 2);
        assert!(rt.weak_is_dead(weak).unwrap());
        assert_eq!(rt.unraisable_count(), 1);
        let report = &rt.unraisable_history()[0];
        assert_eq!(report.error.kind, ErrorKind::ValueError);
        assert_eq!(report.error.message, "callback failed");
        assert!(report.context.starts_with("Exception ignored in garbage collection"));
    }

    #[test]
    fn test_finalizer_parks_only_unreachable_objects() {
        let mut rt = runtime();
        let del = make_method(&mut rt, "__del__", |rt, _| Ok(rt.none()));
        let holder = make_class(&mut rt, "Holder", &[], &[("__del__", del)]);
        let obj = rt.call(holder, &[], &[]).unwrap();
        let payload = rt.new_list(&[]);
        rt.set_attr(obj, "me", Some(obj)).unwrap();
        rt.set_attr(obj, "payload", Some(payload)).unwrap();
        rt.release(payload);
        rt.release(obj);

        // A separate finalizer-free cycle in the same pass is still freed.
        let other = rt.new_list(&[]);
        rt.list_append(other, other).unwrap();
        rt.release(other);

        let outcome = collect_generation(&mut rt, 2).unwrap();
        // The instance, its dict and the payload list; never the class.
        assert_eq!(outcome.uncollectable, 3);
        assert_eq!(outcome.collected, 1);
        assert!(!rt.is_alive(other));
        let garbage = rt.gc_garbage();
        assert!(garbage.contains(&obj));
        assert!(garbage.contains(&payload));
        assert!(!garbage.contains(&holder));
    }
}
