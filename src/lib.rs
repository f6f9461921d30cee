//! Battle Phases - turn and phase scheduling for turn-based battles

pub mod core;
pub mod phase;
pub mod scheduler;
pub mod script;
