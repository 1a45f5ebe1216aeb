use std::collections::HashSet;

use crate::error::RuntimeError;
use crate::object::ObjectId;
use crate::RuntimeResult;

pub const NUM_GENERATIONS: usize = 3;

/// One generation: its member containers, an allocation/promotion counter
/// and the threshold that counter is compared against.
#[derive(Debug)]
pub struct Generation {
    pub threshold: usize,
    pub count: usize,
    members: HashSet<ObjectId>,
}

impl Generation {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            count: 0,
            members: HashSet::new(),
        }
    }

    /// A zero threshold disables automatic collection of the generation.
    pub fn should_collect(&self) -> bool {
        self.threshold > 0 && self.count > self.threshold
    }

    pub fn insert(&mut self, id: ObjectId) -> bool {
        self.members.insert(id)
    }

    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.members.iter().copied()
    }

    pub fn drain(&mut self) -> Vec<ObjectId> {
        self.members.drain().collect()
    }
}

#[derive(Debug)]
pub struct GenerationManager {
    pub generations: [Generation; NUM_GENERATIONS],
    pub collecting_generation: Option<usize>,
}

impl GenerationManager {
    pub fn new(thresholds: [usize; NUM_GENERATIONS]) -> Self {
        Self {
            generations: thresholds.map(Generation::new),
            collecting_generation: None,
        }
    }

    pub fn get_generation(&self, generation: usize) -> Option<&Generation> {
        self.generations.get(generation)
    }

    pub fn get_generation_mut(&mut self, generation: usize) -> Option<&mut Generation> {
        self.generations.get_mut(generation)
    }

    /// Links a newly tracked container into generation 0 and bumps its
    /// allocation counter.
    pub fn add_to_generation0(&mut self, id: ObjectId) {
        let young = &mut self.generations[0];
        if young.insert(id) {
            young.count += 1;
        }
    }

    pub fn remove(&mut self, generation: usize, id: ObjectId) {
        let Some(gen_ref) = self.generations.get_mut(generation) else {
            return;
        };
        gen_ref.remove(id);
        if generation == 0 {
            gen_ref.count = gen_ref.count.saturating_sub(1);
        }
    }

    pub fn insert(&mut self, generation: usize, id: ObjectId) {
        let target = generation.min(NUM_GENERATIONS - 1);
        self.generations[target].insert(id);
    }

    /// Oldest generation whose counter exceeds its threshold, provided the
    /// youngest one does.
    pub fn needs_collection(&self) -> Option<usize> {
        if !self.generations[0].should_collect() {
            return None;
        }
        (0..NUM_GENERATIONS)
            .rev()
            .find(|&i| self.generations[i].should_collect())
    }

    /// Marks the start of a collection of `generation` and unlinks the
    /// working set: that generation and every younger one.
    pub fn start_collection(&mut self, generation: usize) -> RuntimeResult<Vec<ObjectId>> {
        if self.collecting_generation.is_some() {
            return Err(RuntimeError::CollectionInProgress);
        }
        if generation >= NUM_GENERATIONS {
            return Err(RuntimeError::InvalidGeneration(generation));
        }

        self.collecting_generation = Some(generation);
        let mut working = Vec::new();
        for gen_ref in &mut self.generations[..=generation] {
            working.extend(gen_ref.drain());
            gen_ref.count = 0;
        }
        if let Some(older) = self.generations.get_mut(generation + 1) {
            older.count += 1;
        }
        Ok(working)
    }

    pub fn end_collection(&mut self) {
        self.collecting_generation = None;
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting_generation.is_some()
    }

    pub fn counts(&self) -> [usize; NUM_GENERATIONS] {
        [
            self.generations[0].count,
            self.generations[1].count,
            self.generations[2].count,
        ]
    }

    pub fn thresholds(&self) -> [usize; NUM_GENERATIONS] {
        [
            self.generations[0].threshold,
            self.generations[1].threshold,
            self.generations[2].threshold,
        ]
    }

    pub fn total_objects(&self) -> usize {
        self.generations.iter().map(Generation::len).sum()
    }
}
