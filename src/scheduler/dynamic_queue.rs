//! Priority sub-queues for dynamically ordered phase types
//!
//! Members of a dynamic type are not ordered when they are queued. Each pop
//! re-runs the type's ordering over everything still waiting, so priorities
//! that depend on the board state are read at the last possible moment.

use std::cmp::Ordering;

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::phase::{DynamicPhaseType, Phase, PhaseName};

/// Decides which of two waiting phases runs first
pub trait PhaseOrdering {
    /// `Ordering::Greater` means `a` runs before `b`; `Equal` is a tie
    fn compare(&mut self, a: &Phase, b: &Phase) -> Ordering;
}

impl<F> PhaseOrdering for F
where
    F: FnMut(&Phase, &Phase) -> Ordering,
{
    fn compare(&mut self, a: &Phase, b: &Phase) -> Ordering {
        self(a, b)
    }
}

/// Default ordering: higher intrinsic priority first
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityOrdering;

impl PhaseOrdering for PriorityOrdering {
    fn compare(&mut self, a: &Phase, b: &Phase) -> Ordering {
        a.priority().cmp(&b.priority())
    }
}

/// How equally-ranked phases are resolved
#[derive(Debug, Clone)]
pub enum TieBreak {
    /// Earliest queued runs first
    Fifo,
    /// Uniform pick among the tied phases, reproducible from the seed
    Seeded(ChaCha8Rng),
}

impl TieBreak {
    pub fn seeded(seed: u64) -> Self {
        TieBreak::Seeded(ChaCha8Rng::seed_from_u64(seed))
    }

    fn pick(&mut self, tied: usize) -> usize {
        match self {
            TieBreak::Fifo => 0,
            TieBreak::Seeded(rng) => rng.gen_range(0..tied),
        }
    }
}

/// Waiting phases of one dynamic type
pub struct DynamicPhaseQueue {
    entries: Vec<Phase>,
    ordering: Box<dyn PhaseOrdering>,
    tie_break: TieBreak,
}

impl DynamicPhaseQueue {
    pub fn new(ordering: Box<dyn PhaseOrdering>, tie_break: TieBreak) -> Self {
        Self {
            entries: Vec::new(),
            ordering,
            tie_break,
        }
    }

    pub fn push(&mut self, phase: Phase) {
        self.entries.push(phase);
    }

    /// Remove and return the phase that should run next
    pub fn pop(&mut self) -> Option<Phase> {
        if self.entries.is_empty() {
            return None;
        }

        // Indices tied for the best rank, in enqueue order
        let mut best: Vec<usize> = vec![0];
        for index in 1..self.entries.len() {
            let leader = best[0];
            match self
                .ordering
                .compare(&self.entries[index], &self.entries[leader])
            {
                Ordering::Greater => {
                    best.clear();
                    best.push(index);
                }
                Ordering::Equal => best.push(index),
                Ordering::Less => {}
            }
        }

        let chosen = best[self.tie_break.pick(best.len())];
        Some(self.entries.remove(chosen))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.entries.iter()
    }

    /// Drop everything, returning how many phases were discarded
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn set_ordering(&mut self, ordering: Box<dyn PhaseOrdering>) {
        self.ordering = ordering;
    }
}

/// One `DynamicPhaseQueue` per dynamic type
pub struct DynamicQueueManager {
    queues: AHashMap<DynamicPhaseType, DynamicPhaseQueue>,
}

impl DynamicQueueManager {
    /// Queues for every dynamic type, ordered by intrinsic priority
    ///
    /// With a seed, ties are broken by a per-type RNG derived from it;
    /// otherwise they run in enqueue order.
    pub fn new(tie_break_seed: Option<u64>) -> Self {
        let mut queues = AHashMap::new();
        for (offset, dynamic_type) in DynamicPhaseType::ALL.into_iter().enumerate() {
            let tie_break = match tie_break_seed {
                Some(seed) => TieBreak::seeded(seed.wrapping_add(offset as u64)),
                None => TieBreak::Fifo,
            };
            queues.insert(
                dynamic_type,
                DynamicPhaseQueue::new(Box::new(PriorityOrdering), tie_break),
            );
        }
        Self { queues }
    }

    /// Take `phase` into its type's queue, or hand it back if it isn't dynamic
    pub fn queue_dynamic_phase(&mut self, phase: Phase) -> Result<DynamicPhaseType, Phase> {
        let Some(dynamic_type) = phase.dynamic_type() else {
            return Err(phase);
        };
        match self.queues.get_mut(&dynamic_type) {
            Some(queue) => {
                queue.push(phase);
                Ok(dynamic_type)
            }
            None => Err(phase),
        }
    }

    pub fn pop_next_phase(&mut self, dynamic_type: DynamicPhaseType) -> Option<Phase> {
        self.queues.get_mut(&dynamic_type)?.pop()
    }

    pub fn set_ordering(
        &mut self,
        dynamic_type: DynamicPhaseType,
        ordering: Box<dyn PhaseOrdering>,
    ) {
        if let Some(queue) = self.queues.get_mut(&dynamic_type) {
            queue.set_ordering(ordering);
        }
    }

    pub fn len(&self, dynamic_type: DynamicPhaseType) -> usize {
        self.queues.get(&dynamic_type).map_or(0, DynamicPhaseQueue::len)
    }

    pub fn exists(&self, name: PhaseName) -> bool {
        self.queues
            .values()
            .any(|queue| queue.iter().any(|phase| phase.is(name)))
    }

    /// Empty every queue, returning the number of phases dropped
    pub fn clear_queues(&mut self) -> usize {
        self.queues.values_mut().map(DynamicPhaseQueue::clear).sum()
    }
}

impl Default for DynamicQueueManager {
    fn default() -> Self {
        Self::new(None)
    }
}
