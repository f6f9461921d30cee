pub mod config;
pub mod error;
pub mod types;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use types::{BattlerIndex, PhaseId, Turn};
