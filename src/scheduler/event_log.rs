//! Bounded record of scheduler transitions

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::types::Turn;
use crate::phase::DynamicPhaseType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhaseEventType {
    TurnStarted,
    Started { phase: String },
    Resumed { phase: String },
    Overridden { interrupted: Option<String>, by: String },
    DynamicActivated { dynamic_type: DynamicPhaseType, phase: String },
    ConditionalPromoted { phase: String },
    ConditionalsDiscarded { count: usize },
    DeferredFlushed { count: usize },
    OrphansDropped { count: usize },
}

/// Log entry for one scheduler event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub transition: u64,
    pub turn: Turn,
    pub event_type: PhaseEventType,
}

/// Ring buffer of the most recent events
#[derive(Debug, Clone, Default)]
pub struct PhaseEventLog {
    events: VecDeque<PhaseEvent>,
    capacity: usize,
}

impl PhaseEventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, event_type: PhaseEventType, transition: u64, turn: Turn) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(PhaseEvent {
            transition,
            turn,
            event_type,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
