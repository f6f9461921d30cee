//! Phase scheduling - queues, transitions and the handler contract
//!
//! `PhaseManager` owns every queue. Code that gives phases their behavior
//! implements `PhaseHandler` and talks back to the manager only through the
//! `PhaseContext` it is handed on start.

pub mod context;
pub mod driver;
pub mod dynamic_queue;
pub mod event_log;
pub mod helpers;
pub mod manager;

pub use context::{
    completion, PhaseContext, PhaseHandler, PhaseSignal, PhaseStep, PhaseTicket, ScheduleRequest,
};
pub use driver::{run, RunSummary, StopReason};
pub use dynamic_queue::{
    DynamicPhaseQueue, DynamicQueueManager, PhaseOrdering, PriorityOrdering, TieBreak,
};
pub use event_log::{PhaseEvent, PhaseEventLog, PhaseEventType};
pub use helpers::{Entrance, EntranceTiming, SwitchOut, SwitchOutTiming};
pub use manager::{PhaseManager, PhaseStatus, Transition};
