//! Construct phases from a logical name plus an argument list
//!
//! Call sites that only know a phase by name (battle scripts, convenience
//! helpers) go through here instead of naming the `PhaseKind` variant.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SchedulerError};
use crate::core::types::BattlerIndex;
use crate::phase::{DynamicPhaseType, Phase, PhaseKind, PhaseName, SwitchType};

/// One positional constructor argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseArg {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&str> for PhaseArg {
    fn from(value: &str) -> Self {
        PhaseArg::Text(value.to_string())
    }
}

/// Name-keyed phase construction
pub struct PhaseRegistry;

impl PhaseRegistry {
    /// Build the phase called `name` from `args`
    ///
    /// Fails with `UnknownPhase` when no phase kind has that name, and with
    /// `InvalidPhaseArgs` when the arguments don't fit the kind's constructor.
    pub fn create(name: &str, args: &[PhaseArg]) -> Result<Phase> {
        let phase_name: PhaseName = name
            .parse()
            .map_err(SchedulerError::UnknownPhase)?;
        Self::create_named(phase_name, args)
    }

    /// Build a phase from an already-resolved name
    pub fn create_named(name: PhaseName, args: &[PhaseArg]) -> Result<Phase> {
        let mut reader = ArgReader::new(name, args);

        let kind = match name {
            PhaseName::Login => PhaseKind::Login,
            PhaseName::Title => PhaseKind::Title,
            PhaseName::TurnInit => PhaseKind::TurnInit,
            PhaseName::Command => PhaseKind::Command {
                battler: reader.battler()?,
            },
            PhaseName::EnemyCommand => PhaseKind::EnemyCommand {
                battler: reader.battler()?,
            },
            PhaseName::TurnStart => PhaseKind::TurnStart,
            PhaseName::Move => PhaseKind::Move {
                battler: reader.battler()?,
                move_id: reader.int_in_range("move_id", 0, u16::MAX as i64)? as u16,
                priority: reader.int_or("priority", -7, 7, 0)? as i8,
            },
            PhaseName::MoveEffect => PhaseKind::MoveEffect {
                battler: reader.battler()?,
                move_id: reader.int_in_range("move_id", 0, u16::MAX as i64)? as u16,
            },
            PhaseName::MoveEnd => PhaseKind::MoveEnd {
                battler: reader.battler()?,
            },
            PhaseName::Message => PhaseKind::Message {
                text: reader.text("text")?,
            },
            PhaseName::ShowAbility => PhaseKind::ShowAbility {
                battler: reader.battler()?,
                passive: reader.bool_or(false)?,
            },
            PhaseName::HideAbility => PhaseKind::HideAbility,
            PhaseName::AbilityTrigger => PhaseKind::AbilityTrigger {
                battler: reader.battler()?,
                ability_id: reader.int_in_range("ability_id", 0, u16::MAX as i64)? as u16,
                priority: reader.int_or("priority", i8::MIN as i64, i8::MAX as i64, 0)? as i8,
            },
            PhaseName::Summon => PhaseKind::Summon {
                battler: reader.battler()?,
                switch_type: reader.switch_type_or(SwitchType::Initial)?,
            },
            PhaseName::PostSummon => PhaseKind::PostSummon {
                battler: reader.battler()?,
            },
            PhaseName::CheckSwitch => PhaseKind::CheckSwitch {
                battler: reader.battler()?,
            },
            PhaseName::Recall => PhaseKind::Recall {
                battler: reader.battler()?,
                switch_type: reader.switch_type_or(SwitchType::Switch)?,
            },
            PhaseName::Switch => PhaseKind::Switch {
                battler: reader.battler()?,
                switch_type: reader.switch_type_or(SwitchType::Switch)?,
                switch_in: reader.optional_slot()?,
            },
            PhaseName::Faint => PhaseKind::Faint {
                battler: reader.battler()?,
            },
            PhaseName::WeatherEffect => PhaseKind::WeatherEffect,
            PhaseName::PositionalTag => PhaseKind::PositionalTag,
            PhaseName::Berry => PhaseKind::Berry,
            PhaseName::CheckStatusEffect => PhaseKind::CheckStatusEffect,
            PhaseName::TurnEnd => PhaseKind::TurnEnd {
                upcoming_interlude: reader.bool_or(false)?,
            },
            PhaseName::DynamicMarker => PhaseKind::DynamicMarker {
                dynamic_type: reader.dynamic_type()?,
            },
        };

        reader.finish()?;
        Ok(Phase::new(kind))
    }
}

/// Positional reader over constructor arguments
struct ArgReader<'a> {
    phase: PhaseName,
    args: &'a [PhaseArg],
    next: usize,
}

impl<'a> ArgReader<'a> {
    fn new(phase: PhaseName, args: &'a [PhaseArg]) -> Self {
        Self { phase, args, next: 0 }
    }

    fn invalid(&self, reason: String) -> SchedulerError {
        SchedulerError::InvalidPhaseArgs {
            phase: self.phase,
            reason,
        }
    }

    fn take(&mut self) -> Option<&'a PhaseArg> {
        let arg = self.args.get(self.next);
        if arg.is_some() {
            self.next += 1;
        }
        arg
    }

    fn battler(&mut self) -> Result<BattlerIndex> {
        let slot = self.int_in_range("battler", 0, BattlerIndex::ENEMY_2.0 as i64)?;
        Ok(BattlerIndex(slot as u8))
    }

    fn int_in_range(&mut self, field: &str, min: i64, max: i64) -> Result<i64> {
        match self.take() {
            Some(PhaseArg::Int(value)) if (min..=max).contains(value) => Ok(*value),
            Some(PhaseArg::Int(value)) => Err(self.invalid(format!(
                "{} {} outside {}..={}",
                field, value, min, max
            ))),
            Some(other) => Err(self.invalid(format!(
                "{} expects an integer, got {:?}",
                field, other
            ))),
            None => Err(self.invalid(format!("missing {}", field))),
        }
    }

    fn int_or(&mut self, field: &str, min: i64, max: i64, default: i64) -> Result<i64> {
        if self.next >= self.args.len() {
            return Ok(default);
        }
        self.int_in_range(field, min, max)
    }

    fn bool_or(&mut self, default: bool) -> Result<bool> {
        match self.take() {
            None => Ok(default),
            Some(PhaseArg::Bool(value)) => Ok(*value),
            Some(other) => Err(self.invalid(format!("expected a boolean, got {:?}", other))),
        }
    }

    fn text(&mut self, field: &str) -> Result<String> {
        match self.take() {
            Some(PhaseArg::Text(value)) => Ok(value.clone()),
            Some(other) => Err(self.invalid(format!("{} expects text, got {:?}", field, other))),
            None => Err(self.invalid(format!("missing {}", field))),
        }
    }

    fn switch_type_or(&mut self, default: SwitchType) -> Result<SwitchType> {
        match self.take() {
            None => Ok(default),
            Some(PhaseArg::Text(value)) => value.parse().map_err(|e| self.invalid(e)),
            Some(other) => Err(self.invalid(format!("switch type expects text, got {:?}", other))),
        }
    }

    /// Party slot to switch in; `-1` (or absent) defers the choice
    fn optional_slot(&mut self) -> Result<Option<u8>> {
        match self.take() {
            None | Some(PhaseArg::Int(-1)) => Ok(None),
            Some(PhaseArg::Int(value)) if (0..=5).contains(value) => Ok(Some(*value as u8)),
            Some(other) => Err(self.invalid(format!("invalid party slot {:?}", other))),
        }
    }

    fn dynamic_type(&mut self) -> Result<DynamicPhaseType> {
        match self.take() {
            Some(PhaseArg::Text(value)) => match value.as_str() {
                "PostSummon" => Ok(DynamicPhaseType::PostSummon),
                "AbilityTrigger" => Ok(DynamicPhaseType::AbilityTrigger),
                other => Err(self.invalid(format!("unknown dynamic type '{}'", other))),
            },
            Some(other) => Err(self.invalid(format!("dynamic type expects text, got {:?}", other))),
            None => Err(self.invalid("missing dynamic type".into())),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.next < self.args.len() {
            return Err(self.invalid(format!(
                "{} unexpected trailing argument(s)",
                self.args.len() - self.next
            )));
        }
        Ok(())
    }
}
