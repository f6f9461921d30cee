//! Canned phase sequences the battle flow queues over and over

use crate::core::error::{Result, SchedulerError};
use crate::core::types::BattlerIndex;
use crate::phase::{Phase, PhaseArg, PhaseKind, PhaseName, PhaseRegistry, SwitchType};
use crate::scheduler::manager::PhaseManager;

/// Phases removed when an interlude replaces the rest of the turn
const INTERLUDE_SKIPPED: [PhaseName; 3] = [
    PhaseName::WeatherEffect,
    PhaseName::Berry,
    PhaseName::CheckStatusEffect,
];

/// When a switch-out sequence runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchOutTiming {
    /// Right after the current phase
    #[default]
    Eager,
    /// After everything the current phase queues (forced switches)
    Deferred,
}

/// When an entrance sequence runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntranceTiming {
    #[default]
    Eager,
    /// At the end of the primary queue
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchOut {
    pub when: SwitchOutTiming,
    pub switch_type: SwitchType,
    /// Party slot to bring in; `None` picks during the summon
    pub switch_in: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entrance {
    pub when: EntranceTiming,
    /// Offer the player a switch after the entrance. Defaults to true for
    /// player battlers and false for enemies.
    pub check_switch: Option<bool>,
    pub switch_type: SwitchType,
}

pub fn message(text: impl Into<String>) -> Phase {
    Phase::new(PhaseKind::Message { text: text.into() })
}

pub fn ability_display(battler: BattlerIndex, passive: bool, show: bool) -> Phase {
    if show {
        Phase::new(PhaseKind::ShowAbility { battler, passive })
    } else {
        Phase::new(PhaseKind::HideAbility)
    }
}

/// End-of-turn bookkeeping, in the order it runs
pub fn turn_end_phases() -> Vec<Phase> {
    vec![
        Phase::new(PhaseKind::WeatherEffect),
        Phase::new(PhaseKind::PositionalTag),
        Phase::new(PhaseKind::Berry),
        Phase::new(PhaseKind::CheckStatusEffect),
        Phase::new(PhaseKind::TurnEnd {
            upcoming_interlude: false,
        }),
    ]
}

/// `Recall, Switch, Summon, PostSummon` for `battler`
pub fn switch_out_phases(battler: BattlerIndex, params: &SwitchOut) -> Vec<Phase> {
    vec![
        Phase::new(PhaseKind::Recall {
            battler,
            switch_type: params.switch_type,
        }),
        Phase::new(PhaseKind::Switch {
            battler,
            switch_type: params.switch_type,
            switch_in: params.switch_in,
        }),
        Phase::new(PhaseKind::Summon {
            battler,
            switch_type: params.switch_type,
        }),
        Phase::new(PhaseKind::PostSummon { battler }),
    ]
}

/// `Summon` followed by `CheckSwitch` or `PostSummon`
///
/// Enemies never get a switch prompt; asking for one is an error.
pub fn entrance_phases(battler: BattlerIndex, params: &Entrance) -> Result<Vec<Phase>> {
    let check_switch = params.check_switch.unwrap_or(!battler.is_enemy());
    if check_switch && battler.is_enemy() {
        return Err(SchedulerError::InvalidPhaseArgs {
            phase: PhaseName::CheckSwitch,
            reason: format!("cannot check switch for enemy battler {}", battler),
        });
    }

    let follow_up = if check_switch {
        PhaseKind::CheckSwitch { battler }
    } else {
        PhaseKind::PostSummon { battler }
    };
    Ok(vec![
        Phase::new(PhaseKind::Summon {
            battler,
            switch_type: params.switch_type,
        }),
        Phase::new(follow_up),
    ])
}

impl PhaseManager {
    /// Create a phase by name and push it
    pub fn push_new(&mut self, name: &str, args: &[PhaseArg]) -> Result<()> {
        let phase = PhaseRegistry::create(name, args)?;
        self.push(phase, false);
        Ok(())
    }

    /// Create a phase by name and stage it
    pub fn unshift_new(&mut self, name: &str, args: &[PhaseArg]) -> Result<()> {
        let phase = PhaseRegistry::create(name, args)?;
        self.unshift([phase]);
        Ok(())
    }

    /// Stage a message, or push it to the back of the queue when `defer` is set
    pub fn queue_message(&mut self, text: impl Into<String>, defer: bool) {
        let phase = message(text);
        if defer {
            self.push(phase, false);
        } else {
            self.unshift([phase]);
        }
    }

    pub fn queue_ability_display(&mut self, battler: BattlerIndex, passive: bool, show: bool) {
        self.unshift([ability_display(battler, passive, show)]);
    }

    pub fn queue_turn_end_phases(&mut self) {
        for phase in turn_end_phases() {
            self.push(phase, false);
        }
    }

    /// Drop the rest of the turn's upkeep and flag the queued `TurnEnd`
    pub fn on_interlude(&mut self) {
        for name in INTERLUDE_SKIPPED {
            self.remove_all_phases_of_type(name);
        }
        match self.find_phase_mut(PhaseName::TurnEnd) {
            Some(PhaseKind::TurnEnd { upcoming_interlude }) => *upcoming_interlude = true,
            _ => tracing::debug!("Interlude without a queued TurnEnd"),
        }
    }

    /// Abandon the battle and go back to the title screen
    pub fn to_title_screen(&mut self, add_login: bool) {
        self.clear_all_phases();
        if add_login {
            self.unshift([Phase::new(PhaseKind::Login)]);
        }
        self.unshift([Phase::new(PhaseKind::Title)]);
    }

    pub fn queue_battler_switch_out(&mut self, battler: BattlerIndex, params: SwitchOut) {
        let phases = switch_out_phases(battler, &params);
        match params.when {
            SwitchOutTiming::Eager => self.unshift(phases),
            SwitchOutTiming::Deferred => self.stage_last(phases),
        }
    }

    pub fn queue_battler_entrance(
        &mut self,
        battler: BattlerIndex,
        params: Entrance,
    ) -> Result<()> {
        let phases = entrance_phases(battler, &params)?;
        match params.when {
            EntranceTiming::Eager => self.unshift(phases),
            EntranceTiming::Delayed => {
                for phase in phases {
                    self.push(phase, false);
                }
            }
        }
        Ok(())
    }

    /// Queue a faint so it lands once the current move has settled
    ///
    /// Goes right after the last staged `MoveEnd`, else after the last
    /// queued one, else is staged like any other phase.
    pub fn queue_faint_phase(&mut self, battler: BattlerIndex) {
        let faint = Phase::new(PhaseKind::Faint { battler });
        let Err(faint) = self.insert_after_last_staged(PhaseName::MoveEnd, faint) else {
            return;
        };
        if let Err(faint) = self.insert_after_last_queued(PhaseName::MoveEnd, faint) {
            self.unshift([faint]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_end_order() {
        let names: Vec<PhaseName> = turn_end_phases().iter().map(Phase::name).collect();
        assert_eq!(
            names,
            vec![
                PhaseName::WeatherEffect,
                PhaseName::PositionalTag,
                PhaseName::Berry,
                PhaseName::CheckStatusEffect,
                PhaseName::TurnEnd
            ]
        );
    }

    #[test]
    fn test_ability_display_hide() {
        assert_eq!(
            ability_display(BattlerIndex::ENEMY, true, false).name(),
            PhaseName::HideAbility
        );
    }

    #[test]
    fn test_entrance_defaults_by_side() {
        let player = entrance_phases(BattlerIndex::PLAYER, &Entrance::default()).unwrap();
        assert_eq!(player[1].name(), PhaseName::CheckSwitch);

        let enemy = entrance_phases(BattlerIndex::ENEMY, &Entrance::default()).unwrap();
        assert_eq!(enemy[1].name(), PhaseName::PostSummon);
    }

    #[test]
    fn test_enemy_check_switch_rejected() {
        let params = Entrance {
            check_switch: Some(true),
            ..Default::default()
        };
        assert!(entrance_phases(BattlerIndex::ENEMY_2, &params).is_err());
    }

    #[test]
    fn test_interlude_trims_upkeep() {
        let mut manager = PhaseManager::default();
        manager.queue_turn_end_phases();
        manager.on_interlude();

        assert_eq!(
            manager.queued_names(),
            vec![PhaseName::PositionalTag, PhaseName::TurnEnd]
        );
        let turn_end = manager.find_phase(|p| p.is(PhaseName::TurnEnd)).map(Phase::kind);
        assert_eq!(
            turn_end,
            Some(&PhaseKind::TurnEnd {
                upcoming_interlude: true
            })
        );
    }

    #[test]
    fn test_title_screen_clears_and_stages() {
        let mut manager = PhaseManager::default();
        manager.queue_turn_end_phases();
        manager.push(message("later"), true);

        manager.to_title_screen(true);

        assert_eq!(manager.queue_len(), 0);
        assert_eq!(manager.deferred_len(), 0);
        assert_eq!(manager.prepend_names(), vec![PhaseName::Login, PhaseName::Title]);
    }

    #[test]
    fn test_faint_follows_last_move_end() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::MoveEnd { battler: BattlerIndex::PLAYER }), false);
        manager.push(Phase::new(PhaseKind::MoveEnd { battler: BattlerIndex::ENEMY }), false);
        manager.push(Phase::new(PhaseKind::Berry), false);

        manager.queue_faint_phase(BattlerIndex::ENEMY);

        assert_eq!(
            manager.queued_names(),
            vec![PhaseName::MoveEnd, PhaseName::MoveEnd, PhaseName::Faint, PhaseName::Berry]
        );
    }

    #[test]
    fn test_faint_prefers_staged_move_end() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::MoveEnd { battler: BattlerIndex::PLAYER }), false);
        manager.unshift([
            Phase::new(PhaseKind::MoveEnd { battler: BattlerIndex::ENEMY }),
            message("It's super effective!"),
        ]);

        manager.queue_faint_phase(BattlerIndex::PLAYER);

        assert_eq!(
            manager.prepend_names(),
            vec![PhaseName::MoveEnd, PhaseName::Faint, PhaseName::Message]
        );
        assert_eq!(manager.queued_names(), vec![PhaseName::MoveEnd]);
    }

    #[test]
    fn test_deferred_switch_out_lands_after_staged_phases() {
        let mut manager = PhaseManager::default();
        manager.unshift([message("a")]);
        manager.set_queue_splice();

        manager.queue_battler_switch_out(
            BattlerIndex::ENEMY,
            SwitchOut {
                when: SwitchOutTiming::Deferred,
                ..Default::default()
            },
        );
        manager.unshift([message("b")]);

        assert_eq!(
            manager.prepend_names(),
            vec![
                PhaseName::Message,
                PhaseName::Message,
                PhaseName::Recall,
                PhaseName::Switch,
                PhaseName::Summon,
                PhaseName::DynamicMarker
            ]
        );
    }
}
