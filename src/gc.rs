//! Collector control surface: tracking, automatic triggering, thresholds,
//! statistics and introspection.

use log::{debug, error};

use crate::collector::{self, CollectionOutcome};
use crate::error::RuntimeError;
use crate::generation::NUM_GENERATIONS;
use crate::object::{GcHead, ObjectFlags, ObjectId};
use crate::runtime::Runtime;
use crate::RuntimeResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub collections: usize,
    pub collected: usize,
    pub uncollectable: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcStats {
    pub generations: [GenerationStats; NUM_GENERATIONS],
    /// Allocation/promotion counters, as reported by `gc_count`.
    pub counts: [usize; NUM_GENERATIONS],
    pub total_tracked: usize,
    pub garbage: usize,
}

impl Runtime {
    /// Starts cycle tracking for a container. May run a collection before
    /// returning if generation 0 went over its threshold.
    pub(crate) fn gc_track(&mut self, id: ObjectId) {
        let Some(entry) = self.heap.try_get_mut(id) else {
            return;
        };
        if entry.is_tracked() || entry.is_immortal() {
            return;
        }
        entry.flags.insert(ObjectFlags::TRACKED);
        entry.gc = Some(GcHead::new(0));
        self.collector.generation_manager.add_to_generation0(id);

        self.gc_maybe_collect();
    }

    pub(crate) fn gc_untrack(&mut self, id: ObjectId) {
        let Some(entry) = self.heap.try_get_mut(id) else {
            return;
        };
        entry.flags.remove(ObjectFlags::TRACKED);
        let Some(head) = entry.gc.take() else {
            return;
        };
        if let Some(generation) = head.generation {
            self.collector.generation_manager.remove(generation, id);
        }
    }

    fn gc_maybe_collect(&mut self) {
        if !self.collector.enabled || self.collector.is_collecting() || self.deallocating {
            return;
        }
        let Some(generation) = self.collector.generation_manager.needs_collection() else {
            return;
        };
        debug!("gc: allocation threshold exceeded, collecting generation {generation}");
        if let Err(err) = collector::collect_generation(self, generation) {
            error!("gc: automatic collection failed: {err}");
        }
    }

    pub fn gc_enable(&mut self) {
        self.collector.enabled = true;
    }

    pub fn gc_disable(&mut self) {
        self.collector.enabled = false;
    }

    pub fn gc_is_enabled(&self) -> bool {
        self.collector.enabled
    }

    /// Runs a collection of `generation` (the oldest when `None`) whether or
    /// not automatic collection is enabled. Returns the number of
    /// unreachable objects found, freed and parked alike.
    pub fn gc_collect(&mut self, generation: Option<usize>) -> RuntimeResult<usize> {
        let outcome = self.gc_collect_outcome(generation.unwrap_or(NUM_GENERATIONS - 1))?;
        Ok(outcome.collected + outcome.uncollectable)
    }

    pub fn gc_collect_outcome(&mut self, generation: usize) -> RuntimeResult<CollectionOutcome> {
        collector::collect_generation(self, generation)
    }

    pub fn gc_count(&self) -> [usize; NUM_GENERATIONS] {
        self.collector.generation_manager.counts()
    }

    pub fn gc_get_threshold(&self) -> [usize; NUM_GENERATIONS] {
        self.collector.generation_manager.thresholds()
    }

    pub fn gc_set_threshold(&mut self, generation: usize, threshold: usize) -> RuntimeResult<()> {
        let gen_ref = self
            .collector
            .generation_manager
            .get_generation_mut(generation)
            .ok_or(RuntimeError::InvalidGeneration(generation))?;
        gen_ref.threshold = threshold;
        Ok(())
    }

    pub fn gc_set_debug(&mut self, flags: u32) {
        self.collector.set_debug(flags);
    }

    pub fn gc_get_debug(&self) -> u32 {
        self.collector.debug_flags
    }

    pub fn gc_stats(&self) -> GcStats {
        GcStats {
            generations: self.collector.stats,
            counts: self.gc_count(),
            total_tracked: self.collector.generation_manager.total_objects(),
            garbage: self.collector.garbage.len(),
        }
    }

    /// Uncollectable objects parked by previous collections, borrowed.
    pub fn gc_garbage(&self) -> Vec<ObjectId> {
        self.collector.garbage.clone()
    }

    /// Drops the collector's references to parked garbage. Returns how many
    /// objects were released.
    pub fn gc_clear_garbage(&mut self) -> usize {
        let garbage = std::mem::take(&mut self.collector.garbage);
        let count = garbage.len();
        self.release_all(garbage);
        count
    }

    pub fn gc_is_tracked(&self, obj: ObjectId) -> bool {
        self.heap.try_get(obj).is_some_and(|entry| entry.is_tracked())
    }

    /// Generation `obj` currently belongs to.
    pub fn gc_generation_of(&self, obj: ObjectId) -> Option<usize> {
        self.heap
            .try_get(obj)
            .and_then(|entry| entry.gc.as_ref())
            .and_then(|head| head.generation)
    }

    /// Tracked objects, optionally restricted to one generation, as a new list.
    pub fn gc_get_objects(&mut self, generation: Option<usize>) -> RuntimeResult<ObjectId> {
        let manager = &self.collector.generation_manager;
        let ids: Vec<ObjectId> = match generation {
            Some(g) => manager
                .get_generation(g)
                .ok_or(RuntimeError::InvalidGeneration(g))?
                .members()
                .collect(),
            None => manager.generations.iter().flat_map(|g| g.members()).collect(),
        };
        Ok(self.new_list(&ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    #[test]
    fn test_containers_are_tracked_scalars_are_not() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let list = rt.new_list(&[]);
        let text = rt.new_str("plain");
        assert!(rt.gc_is_tracked(list));
        assert!(!rt.gc_is_tracked(text));
        assert_eq!(rt.gc_generation_of(list), Some(0));
    }

    #[test]
    fn test_threshold_triggers_collection() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_thresholds([10, 10, 10]));
        let baseline = rt.live_objects();
        for _ in 0..50 {
            let a = rt.new_list(&[]);
            rt.list_append(a, a).unwrap();
            rt.release(a);
        }
        assert!(rt.gc_stats().generations[0].collections > 0);
        assert!(rt.live_objects() < baseline + 50);
    }

    #[test]
    fn test_disabled_collector_does_not_run() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_thresholds([5, 10, 10]));
        rt.gc_disable();
        assert!(!rt.gc_is_enabled());
        for _ in 0..20 {
            let a = rt.new_list(&[]);
            rt.list_append(a, a).unwrap();
            rt.release(a);
        }
        assert_eq!(rt.gc_stats().generations[0].collections, 0);

        rt.gc_enable();
        assert_eq!(rt.gc_collect(None).unwrap(), 20);
    }

    #[test]
    fn test_thresholds() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        assert_eq!(rt.gc_get_threshold(), [700, 10, 10]);
        rt.gc_set_threshold(0, 1000).unwrap();
        assert_eq!(rt.gc_get_threshold()[0], 1000);
        assert_eq!(
            rt.gc_set_threshold(3, 1),
            Err(RuntimeError::InvalidGeneration(3))
        );
    }

    #[test]
    fn test_count_follows_tracking() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_gc_enabled(false));
        let before = rt.gc_count()[0];
        let a = rt.new_list(&[]);
        assert_eq!(rt.gc_count()[0], before + 1);
        rt.release(a);
        assert_eq!(rt.gc_count()[0], before);
    }

    #[test]
    fn test_get_objects_by_generation() {
        let mut rt = Runtime::new(RuntimeConfig::default().with_gc_enabled(false));
        let a = rt.new_list(&[]);
        let young = rt.gc_get_objects(Some(0)).unwrap();
        assert!(rt.list_items(young).unwrap().contains(&a));
        rt.release(young);

        rt.gc_collect(Some(0)).unwrap();
        assert_eq!(rt.gc_generation_of(a), Some(1));
        let older = rt.gc_get_objects(Some(1)).unwrap();
        assert!(rt.list_items(older).unwrap().contains(&a));
        assert!(rt.gc_get_objects(Some(7)).is_err());
    }
}
