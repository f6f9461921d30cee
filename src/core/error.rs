use thiserror::Error;

use crate::phase::PhaseName;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Phase queue exhausted after replenishment on turn {turn}")]
    QueueExhausted { turn: u32 },

    #[error("Phase {0} does not exist in the phase registry")]
    UnknownPhase(String),

    #[error("Invalid arguments for {phase}: {reason}")]
    InvalidPhaseArgs { phase: PhaseName, reason: String },

    #[error("Phase {0} dropped its completion signal without ending")]
    PhaseAbandoned(PhaseName),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
