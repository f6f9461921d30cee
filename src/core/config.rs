//! Scheduler configuration with documented constants
//!
//! Every knob the phase manager and the driver read lives here. Values load
//! from TOML; missing keys fall back to the defaults below.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SchedulerError};

/// Configuration for the phase manager and the async driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    // === TURN BOUNDARY ===
    /// Append a synthesized `TurnInit` whenever the primary queue runs dry
    ///
    /// Disabling this turns every empty-queue boundary into a hard
    /// `QueueExhausted` error, which is what an embedding that drives its own
    /// turn structure wants.
    pub auto_turn_init: bool,

    // === TRACING ===
    /// Emit a `debug!` line for every phase start
    pub log_phase_starts: bool,

    /// Number of scheduler events kept in the in-memory event log
    ///
    /// Oldest events are evicted first. Zero disables the log.
    pub event_log_capacity: usize,

    // === DRIVER LIMITS ===
    /// Maximum phase transitions a single driver run may perform
    ///
    /// Guards against scripts whose phases keep re-queueing each other.
    pub max_transitions: u64,

    /// Stop the driver once this many turns have completed
    pub max_turns: Option<u32>,

    // === DYNAMIC ORDERING ===
    /// Seed for random tie-breaks inside dynamic queues
    ///
    /// `None` keeps ties in enqueue order.
    pub tie_break_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_turn_init: true,
            log_phase_starts: true,
            event_log_capacity: 256,
            max_transitions: 10_000,
            max_turns: None,
            tie_break_seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_transitions == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_transitions must be positive".into(),
            ));
        }

        if self.max_turns == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "max_turns must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SchedulerConfig::from_toml_str("max_turns = 3\ntie_break_seed = 7\n").unwrap();

        assert_eq!(config.max_turns, Some(3));
        assert_eq!(config.tie_break_seed, Some(7));
        assert!(config.auto_turn_init);
        assert_eq!(config.event_log_capacity, 256);
    }

    #[test]
    fn test_zero_transition_limit_rejected() {
        let result = SchedulerConfig::from_toml_str("max_transitions = 0");
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let result = SchedulerConfig::from_toml_str("max_turns = \"many\"");
        assert!(matches!(result, Err(SchedulerError::TomlError(_))));
    }
}
