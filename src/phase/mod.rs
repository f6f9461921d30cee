//! Phases - the units of battle logic the scheduler orders and starts
//!
//! A phase is inert until the manager starts it. The scheduler only cares about
//! its identity (`PhaseName`) and, for dynamic types, its priority. What a phase
//! actually does when started is up to the `PhaseHandler` that embeds the
//! scheduler.

pub mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::{BattlerIndex, PhaseId};

pub use registry::{PhaseArg, PhaseRegistry};

/// How a battler leaves or enters the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchType {
    #[default]
    Switch,
    BatonPass,
    ShedTail,
    Initial,
}

impl FromStr for SwitchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(Self::Switch),
            "baton_pass" => Ok(Self::BatonPass),
            "shed_tail" => Ok(Self::ShedTail),
            "initial" => Ok(Self::Initial),
            other => Err(format!("unknown switch type '{}'", other)),
        }
    }
}

/// Phase kinds whose members run in a recomputed priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicPhaseType {
    /// On-entrance effects, ordered by the battlers' current speed
    PostSummon,
    /// Ability activations competing for the same trigger window
    AbilityTrigger,
}

impl DynamicPhaseType {
    pub const ALL: [DynamicPhaseType; 2] = [Self::PostSummon, Self::AbilityTrigger];
}

/// Payload of a phase, one variant per phase kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhaseKind {
    Login,
    Title,
    TurnInit,
    Command { battler: BattlerIndex },
    EnemyCommand { battler: BattlerIndex },
    TurnStart,
    Move { battler: BattlerIndex, move_id: u16, priority: i8 },
    MoveEffect { battler: BattlerIndex, move_id: u16 },
    MoveEnd { battler: BattlerIndex },
    Message { text: String },
    ShowAbility { battler: BattlerIndex, passive: bool },
    HideAbility,
    AbilityTrigger { battler: BattlerIndex, ability_id: u16, priority: i8 },
    Summon { battler: BattlerIndex, switch_type: SwitchType },
    PostSummon { battler: BattlerIndex },
    CheckSwitch { battler: BattlerIndex },
    Recall { battler: BattlerIndex, switch_type: SwitchType },
    Switch { battler: BattlerIndex, switch_type: SwitchType, switch_in: Option<u8> },
    Faint { battler: BattlerIndex },
    WeatherEffect,
    PositionalTag,
    Berry,
    CheckStatusEffect,
    TurnEnd { upcoming_interlude: bool },
    /// Stand-in for a phase waiting in a dynamic queue
    DynamicMarker { dynamic_type: DynamicPhaseType },
}

impl PhaseKind {
    pub fn name(&self) -> PhaseName {
        match self {
            PhaseKind::Login => PhaseName::Login,
            PhaseKind::Title => PhaseName::Title,
            PhaseKind::TurnInit => PhaseName::TurnInit,
            PhaseKind::Command { .. } => PhaseName::Command,
            PhaseKind::EnemyCommand { .. } => PhaseName::EnemyCommand,
            PhaseKind::TurnStart => PhaseName::TurnStart,
            PhaseKind::Move { .. } => PhaseName::Move,
            PhaseKind::MoveEffect { .. } => PhaseName::MoveEffect,
            PhaseKind::MoveEnd { .. } => PhaseName::MoveEnd,
            PhaseKind::Message { .. } => PhaseName::Message,
            PhaseKind::ShowAbility { .. } => PhaseName::ShowAbility,
            PhaseKind::HideAbility => PhaseName::HideAbility,
            PhaseKind::AbilityTrigger { .. } => PhaseName::AbilityTrigger,
            PhaseKind::Summon { .. } => PhaseName::Summon,
            PhaseKind::PostSummon { .. } => PhaseName::PostSummon,
            PhaseKind::CheckSwitch { .. } => PhaseName::CheckSwitch,
            PhaseKind::Recall { .. } => PhaseName::Recall,
            PhaseKind::Switch { .. } => PhaseName::Switch,
            PhaseKind::Faint { .. } => PhaseName::Faint,
            PhaseKind::WeatherEffect => PhaseName::WeatherEffect,
            PhaseKind::PositionalTag => PhaseName::PositionalTag,
            PhaseKind::Berry => PhaseName::Berry,
            PhaseKind::CheckStatusEffect => PhaseName::CheckStatusEffect,
            PhaseKind::TurnEnd { .. } => PhaseName::TurnEnd,
            PhaseKind::DynamicMarker { .. } => PhaseName::DynamicMarker,
        }
    }

    /// The battler this phase acts for, if any
    pub fn battler(&self) -> Option<BattlerIndex> {
        match self {
            PhaseKind::Command { battler }
            | PhaseKind::EnemyCommand { battler }
            | PhaseKind::Move { battler, .. }
            | PhaseKind::MoveEffect { battler, .. }
            | PhaseKind::MoveEnd { battler }
            | PhaseKind::ShowAbility { battler, .. }
            | PhaseKind::AbilityTrigger { battler, .. }
            | PhaseKind::Summon { battler, .. }
            | PhaseKind::PostSummon { battler }
            | PhaseKind::CheckSwitch { battler }
            | PhaseKind::Recall { battler, .. }
            | PhaseKind::Switch { battler, .. }
            | PhaseKind::Faint { battler } => Some(*battler),
            _ => None,
        }
    }

    /// Intrinsic priority carried by the payload (0 when the kind has none)
    pub fn priority(&self) -> i32 {
        match self {
            PhaseKind::Move { priority, .. } | PhaseKind::AbilityTrigger { priority, .. } => {
                *priority as i32
            }
            _ => 0,
        }
    }

    /// Dynamic queue this kind is routed through, if any
    pub fn dynamic_type(&self) -> Option<DynamicPhaseType> {
        match self {
            PhaseKind::PostSummon { .. } => Some(DynamicPhaseType::PostSummon),
            PhaseKind::AbilityTrigger { .. } => Some(DynamicPhaseType::AbilityTrigger),
            _ => None,
        }
    }
}

/// Logical name of a phase kind, used for lookup, filtering and the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseName {
    Login,
    Title,
    TurnInit,
    Command,
    EnemyCommand,
    TurnStart,
    Move,
    MoveEffect,
    MoveEnd,
    Message,
    ShowAbility,
    HideAbility,
    AbilityTrigger,
    Summon,
    PostSummon,
    CheckSwitch,
    Recall,
    Switch,
    Faint,
    WeatherEffect,
    PositionalTag,
    Berry,
    CheckStatusEffect,
    TurnEnd,
    DynamicMarker,
}

impl PhaseName {
    pub const ALL: [PhaseName; 25] = [
        PhaseName::Login,
        PhaseName::Title,
        PhaseName::TurnInit,
        PhaseName::Command,
        PhaseName::EnemyCommand,
        PhaseName::TurnStart,
        PhaseName::Move,
        PhaseName::MoveEffect,
        PhaseName::MoveEnd,
        PhaseName::Message,
        PhaseName::ShowAbility,
        PhaseName::HideAbility,
        PhaseName::AbilityTrigger,
        PhaseName::Summon,
        PhaseName::PostSummon,
        PhaseName::CheckSwitch,
        PhaseName::Recall,
        PhaseName::Switch,
        PhaseName::Faint,
        PhaseName::WeatherEffect,
        PhaseName::PositionalTag,
        PhaseName::Berry,
        PhaseName::CheckStatusEffect,
        PhaseName::TurnEnd,
        PhaseName::DynamicMarker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Login => "Login",
            PhaseName::Title => "Title",
            PhaseName::TurnInit => "TurnInit",
            PhaseName::Command => "Command",
            PhaseName::EnemyCommand => "EnemyCommand",
            PhaseName::TurnStart => "TurnStart",
            PhaseName::Move => "Move",
            PhaseName::MoveEffect => "MoveEffect",
            PhaseName::MoveEnd => "MoveEnd",
            PhaseName::Message => "Message",
            PhaseName::ShowAbility => "ShowAbility",
            PhaseName::HideAbility => "HideAbility",
            PhaseName::AbilityTrigger => "AbilityTrigger",
            PhaseName::Summon => "Summon",
            PhaseName::PostSummon => "PostSummon",
            PhaseName::CheckSwitch => "CheckSwitch",
            PhaseName::Recall => "Recall",
            PhaseName::Switch => "Switch",
            PhaseName::Faint => "Faint",
            PhaseName::WeatherEffect => "WeatherEffect",
            PhaseName::PositionalTag => "PositionalTag",
            PhaseName::Berry => "Berry",
            PhaseName::CheckStatusEffect => "CheckStatusEffect",
            PhaseName::TurnEnd => "TurnEnd",
            PhaseName::DynamicMarker => "DynamicMarker",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "MovePhase" and "Move" name the same phase
        let bare = s.strip_suffix("Phase").unwrap_or(s);
        PhaseName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == bare)
            .ok_or_else(|| s.to_string())
    }
}

/// A single schedulable unit: identity plus payload
///
/// Phases are not `Clone`: each instance is owned by exactly one queue or slot
/// and is dropped once it ends.
#[derive(Debug, PartialEq)]
pub struct Phase {
    id: PhaseId,
    kind: PhaseKind,
}

impl Phase {
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            id: PhaseId::new(),
            kind,
        }
    }

    pub fn id(&self) -> PhaseId {
        self.id
    }

    pub fn kind(&self) -> &PhaseKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut PhaseKind {
        &mut self.kind
    }

    pub fn name(&self) -> PhaseName {
        self.kind.name()
    }

    pub fn is(&self, name: PhaseName) -> bool {
        self.kind.name() == name
    }

    pub fn battler(&self) -> Option<BattlerIndex> {
        self.kind.battler()
    }

    pub fn priority(&self) -> i32 {
        self.kind.priority()
    }

    pub fn dynamic_type(&self) -> Option<DynamicPhaseType> {
        self.kind.dynamic_type()
    }

    /// Marker that activates the next phase of `dynamic_type`
    pub fn marker(dynamic_type: DynamicPhaseType) -> Self {
        Self::new(PhaseKind::DynamicMarker { dynamic_type })
    }
}

impl From<PhaseKind> for Phase {
    fn from(kind: PhaseKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.battler() {
            Some(battler) => write!(f, "{}({})", self.name(), battler),
            None => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_round_trips_through_from_str() {
        for name in PhaseName::ALL {
            assert_eq!(name.as_str().parse::<PhaseName>(), Ok(name));
        }
    }

    #[test]
    fn test_legacy_phase_suffix_accepted() {
        assert_eq!("TurnInitPhase".parse::<PhaseName>(), Ok(PhaseName::TurnInit));
        assert!("NotAPhase".parse::<PhaseName>().is_err());
    }

    #[test]
    fn test_dynamic_types() {
        let post = Phase::new(PhaseKind::PostSummon { battler: BattlerIndex::ENEMY });
        let trigger = Phase::new(PhaseKind::AbilityTrigger {
            battler: BattlerIndex::PLAYER,
            ability_id: 22,
            priority: 3,
        });
        let moved = Phase::new(PhaseKind::Move {
            battler: BattlerIndex::PLAYER,
            move_id: 33,
            priority: 1,
        });

        assert_eq!(post.dynamic_type(), Some(DynamicPhaseType::PostSummon));
        assert_eq!(trigger.dynamic_type(), Some(DynamicPhaseType::AbilityTrigger));
        assert_eq!(trigger.priority(), 3);
        assert_eq!(moved.dynamic_type(), None);
    }

    #[test]
    fn test_display_includes_battler() {
        let phase = Phase::new(PhaseKind::Faint { battler: BattlerIndex::ENEMY_2 });
        assert_eq!(phase.to_string(), "Faint(enemy#1)");
        assert_eq!(Phase::new(PhaseKind::Berry).to_string(), "Berry");
    }
}
