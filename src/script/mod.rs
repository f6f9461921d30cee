//! Battle scripts loaded from TOML
//!
//! A script seeds the queue with starting phases and attaches rules to phase
//! names. When a phase starts, every matching rule's actions are issued
//! through the phase's context, which makes scripts a compact way to replay
//! scheduling scenarios without writing a handler.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::core::config::SchedulerConfig;
use crate::core::error::{Result, SchedulerError};
use crate::core::types::BattlerIndex;
use crate::phase::{Phase, PhaseArg, PhaseName, PhaseRegistry, SwitchType};
use crate::scheduler::context::{completion, PhaseContext, PhaseHandler, PhaseStep};
use crate::scheduler::helpers::{Entrance, EntranceTiming, SwitchOut, SwitchOutTiming};
use crate::scheduler::manager::PhaseManager;

/// A phase named for the registry, e.g. `{ phase = "Move", args = [2, 33] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub phase: String,
    #[serde(default)]
    pub args: Vec<PhaseArg>,
}

impl PhaseSpec {
    pub fn build(&self) -> Result<Phase> {
        PhaseRegistry::create(&self.phase, &self.args)
    }
}

/// One scheduling operation issued when a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptAction {
    Push {
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
    },
    /// Hold until the next turn boundary
    Defer {
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
    },
    Unshift {
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
    },
    /// Several phases staged in one call, keeping their order
    UnshiftBatch { phases: Vec<PhaseSpec> },
    PushDynamic {
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
    },
    SetSplice,
    ClearSplice,
    PrependTo { target: String, phases: Vec<PhaseSpec> },
    AppendTo { target: String, phases: Vec<PhaseSpec> },
    /// Remove the first queued `phase`, or every one when `all` is set
    Remove {
        phase: String,
        #[serde(default)]
        all: bool,
    },
    Replace {
        target: String,
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
    },
    Override {
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
    },
    /// Queue `phase` once a phase named `after` has started
    Conditional {
        phase: String,
        #[serde(default)]
        args: Vec<PhaseArg>,
        after: String,
    },
    Message {
        text: String,
        #[serde(default)]
        defer: bool,
    },
    TurnEnd,
    Interlude,
    Faint { battler: u8 },
    SwitchOut {
        battler: u8,
        #[serde(default)]
        switch_type: SwitchType,
        #[serde(default)]
        deferred: bool,
        switch_in: Option<u8>,
    },
    Entrance {
        battler: u8,
        #[serde(default)]
        delayed: bool,
        check_switch: Option<bool>,
    },
}

/// Actions to issue whenever a phase named `on` starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRule {
    pub on: String,
    /// Only fire on this turn
    pub turn: Option<u32>,
    /// Fire at most once
    #[serde(default)]
    pub once: bool,
    /// Keep the phase running for this long before it ends
    pub hold_ms: Option<u64>,
    /// Leave the phase running until outside code shifts
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub actions: Vec<ScriptAction>,
}

/// A scheduling scenario: optional config, starting phases and rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleScript {
    pub name: String,
    pub config: Option<SchedulerConfig>,
    #[serde(default)]
    pub start: Vec<PhaseSpec>,
    #[serde(default)]
    pub rules: Vec<ScriptRule>,
}

impl BattleScript {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let script: BattleScript = toml::from_str(content)?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check every phase name and argument list up front so rules can't fail
    /// halfway through a battle
    pub fn validate(&self) -> Result<()> {
        if let Some(config) = &self.config {
            config.validate()?;
        }
        for spec in &self.start {
            spec.build()?;
        }
        for rule in &self.rules {
            parse_name(&rule.on)?;
            for action in &rule.actions {
                validate_action(action)?;
            }
        }
        Ok(())
    }

    /// Push the starting phases onto `manager`
    pub fn seed(&self, manager: &mut PhaseManager) -> Result<()> {
        for spec in &self.start {
            manager.push(spec.build()?, false);
        }
        tracing::debug!("Seeded {} starting phases from '{}'", self.start.len(), self.name);
        Ok(())
    }
}

fn parse_name(name: &str) -> Result<PhaseName> {
    name.parse().map_err(SchedulerError::UnknownPhase)
}

fn battler(slot: u8) -> Result<BattlerIndex> {
    if slot > BattlerIndex::ENEMY_2.0 {
        return Err(SchedulerError::InvalidConfig(format!(
            "battler slot {} out of range",
            slot
        )));
    }
    Ok(BattlerIndex(slot))
}

fn validate_action(action: &ScriptAction) -> Result<()> {
    match action {
        ScriptAction::Push { phase, args }
        | ScriptAction::Defer { phase, args }
        | ScriptAction::Unshift { phase, args }
        | ScriptAction::PushDynamic { phase, args }
        | ScriptAction::Override { phase, args } => {
            PhaseRegistry::create(phase, args)?;
        }
        ScriptAction::UnshiftBatch { phases } => {
            for spec in phases {
                spec.build()?;
            }
        }
        ScriptAction::PrependTo { target, phases } | ScriptAction::AppendTo { target, phases } => {
            parse_name(target)?;
            for spec in phases {
                spec.build()?;
            }
        }
        ScriptAction::Remove { phase, .. } => {
            parse_name(phase)?;
        }
        ScriptAction::Replace { target, phase, args } => {
            parse_name(target)?;
            PhaseRegistry::create(phase, args)?;
        }
        ScriptAction::Conditional { phase, args, after } => {
            parse_name(after)?;
            PhaseRegistry::create(phase, args)?;
        }
        ScriptAction::Faint { battler: slot } | ScriptAction::SwitchOut { battler: slot, .. } => {
            battler(*slot)?;
        }
        ScriptAction::Entrance {
            battler: slot,
            check_switch,
            ..
        } => {
            let index = battler(*slot)?;
            if *check_switch == Some(true) && index.is_enemy() {
                return Err(SchedulerError::InvalidPhaseArgs {
                    phase: PhaseName::CheckSwitch,
                    reason: format!("cannot check switch for enemy battler {}", index),
                });
            }
        }
        ScriptAction::SetSplice
        | ScriptAction::ClearSplice
        | ScriptAction::Message { .. }
        | ScriptAction::TurnEnd
        | ScriptAction::Interlude => {}
    }
    Ok(())
}

struct CompiledRule {
    on: PhaseName,
    rule: ScriptRule,
    fired: bool,
}

/// `PhaseHandler` that plays back a `BattleScript`'s rules
pub struct ScriptedHandler {
    rules: Vec<CompiledRule>,
    /// Names of every phase started so far; read by conditional actions
    started: Rc<RefCell<AHashSet<PhaseName>>>,
}

impl ScriptedHandler {
    pub fn new(script: &BattleScript) -> Result<Self> {
        let rules = script
            .rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    on: parse_name(&rule.on)?,
                    rule: rule.clone(),
                    fired: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            started: Rc::new(RefCell::new(AHashSet::new())),
        })
    }

    pub fn has_started(&self, name: PhaseName) -> bool {
        self.started.borrow().contains(&name)
    }

    fn issue(&self, action: &ScriptAction, ctx: &mut PhaseContext<'_>) -> Result<()> {
        match action {
            ScriptAction::Push { phase, args } => ctx.push(PhaseRegistry::create(phase, args)?),
            ScriptAction::Defer { phase, args } => ctx.defer(PhaseRegistry::create(phase, args)?),
            ScriptAction::Unshift { phase, args } => {
                ctx.unshift([PhaseRegistry::create(phase, args)?])
            }
            ScriptAction::UnshiftBatch { phases } => ctx.unshift(build_all(phases)?),
            ScriptAction::PushDynamic { phase, args } => {
                ctx.push_dynamic(PhaseRegistry::create(phase, args)?)
            }
            ScriptAction::SetSplice => ctx.set_queue_splice(),
            ScriptAction::ClearSplice => ctx.clear_queue_splice(),
            ScriptAction::PrependTo { target, phases } => {
                ctx.prepend_to_phase(build_all(phases)?, parse_name(target)?)
            }
            ScriptAction::AppendTo { target, phases } => {
                ctx.append_to_phase(build_all(phases)?, parse_name(target)?, None)
            }
            ScriptAction::Remove { phase, all } => {
                let name = parse_name(phase)?;
                if *all {
                    ctx.remove_all_phases_of_type(name);
                } else {
                    ctx.try_remove_phase(move |queued| queued.is(name));
                }
            }
            ScriptAction::Replace { target, phase, args } => {
                let name = parse_name(target)?;
                let replacement = PhaseRegistry::create(phase, args)?;
                ctx.try_replace_phase(move |queued| queued.is(name), replacement);
            }
            ScriptAction::Override { phase, args } => {
                if let Err(phase) = ctx.override_phase(PhaseRegistry::create(phase, args)?) {
                    tracing::debug!("Standby occupied, staging {} instead", phase);
                    ctx.unshift([phase]);
                }
            }
            ScriptAction::Conditional { phase, args, after } => {
                let after = parse_name(after)?;
                let started = Rc::clone(&self.started);
                ctx.push_conditional(PhaseRegistry::create(phase, args)?, move || {
                    started.borrow().contains(&after)
                });
            }
            ScriptAction::Message { text, defer } => ctx.queue_message(text.clone(), *defer),
            ScriptAction::TurnEnd => ctx.queue_turn_end_phases(),
            ScriptAction::Interlude => ctx.on_interlude(),
            ScriptAction::Faint { battler: slot } => ctx.queue_faint_phase(battler(*slot)?),
            ScriptAction::SwitchOut {
                battler: slot,
                switch_type,
                deferred,
                switch_in,
            } => {
                let when = if *deferred {
                    SwitchOutTiming::Deferred
                } else {
                    SwitchOutTiming::Eager
                };
                ctx.queue_battler_switch_out(
                    battler(*slot)?,
                    SwitchOut {
                        when,
                        switch_type: *switch_type,
                        switch_in: *switch_in,
                    },
                );
            }
            ScriptAction::Entrance {
                battler: slot,
                delayed,
                check_switch,
            } => {
                let when = if *delayed {
                    EntranceTiming::Delayed
                } else {
                    EntranceTiming::Eager
                };
                ctx.queue_battler_entrance(
                    battler(*slot)?,
                    Entrance {
                        when,
                        check_switch: *check_switch,
                        switch_type: SwitchType::Initial,
                    },
                )?;
            }
        }
        Ok(())
    }
}

fn build_all(specs: &[PhaseSpec]) -> Result<Vec<Phase>> {
    specs.iter().map(PhaseSpec::build).collect()
}

impl PhaseHandler for ScriptedHandler {
    fn start(&mut self, phase: &Phase, ctx: &mut PhaseContext<'_>) -> PhaseStep {
        let name = phase.name();
        self.started.borrow_mut().insert(name);

        let turn = ctx.turn();
        let mut hold = false;
        let mut hold_ms: Option<u64> = None;

        for index in 0..self.rules.len() {
            let compiled = &self.rules[index];
            if compiled.on != name
                || compiled.rule.turn.is_some_and(|t| t != turn)
                || (compiled.rule.once && compiled.fired)
            {
                continue;
            }

            for action in &compiled.rule.actions {
                if let Err(e) = self.issue(action, ctx) {
                    tracing::warn!("Rule on {} skipped action {:?}: {}", name, action, e);
                }
            }
            hold |= compiled.rule.hold;
            hold_ms = hold_ms.max(compiled.rule.hold_ms);
            self.rules[index].fired = true;
        }

        if hold {
            return PhaseStep::Hold;
        }
        match (hold_ms, tokio::runtime::Handle::try_current()) {
            (Some(ms), Ok(handle)) => {
                let (signal, ticket) = completion();
                handle.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    signal.end();
                });
                PhaseStep::Await(ticket)
            }
            _ => PhaseStep::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
name = "one move"

[config]
max_turns = 1

[[start]]
phase = "Summon"
args = [0, "initial"]

[[rules]]
on = "TurnInit"
actions = [
    { op = "push", phase = "Command", args = [0] },
    { op = "turn_end" },
]

[[rules]]
on = "Command"
once = true
actions = [{ op = "message", text = "What will you do?" }]
"#;

    #[test]
    fn test_parse_script() {
        let script = BattleScript::from_toml_str(SCRIPT).unwrap();

        assert_eq!(script.name, "one move");
        assert_eq!(script.config.as_ref().and_then(|c| c.max_turns), Some(1));
        assert_eq!(
            script.start[0].args,
            vec![PhaseArg::Int(0), PhaseArg::Text("initial".into())]
        );
        assert_eq!(script.rules.len(), 2);
        assert_eq!(
            script.rules[0].actions[1],
            ScriptAction::TurnEnd
        );
    }

    #[test]
    fn test_unknown_phase_rejected_on_load() {
        let bad = r#"
name = "bad"

[[rules]]
on = "TurnInit"
actions = [{ op = "push", phase = "Teleport" }]
"#;
        let result = BattleScript::from_toml_str(bad);
        assert!(matches!(result, Err(SchedulerError::UnknownPhase(_))));
    }

    #[test]
    fn test_enemy_check_switch_rejected_on_load() {
        let bad = r#"
name = "bad"

[[rules]]
on = "TurnInit"
actions = [{ op = "entrance", battler = 2, check_switch = true }]
"#;
        assert!(BattleScript::from_toml_str(bad).is_err());
    }

    #[test]
    fn test_seed_pushes_start_phases() {
        let script = BattleScript::from_toml_str(SCRIPT).unwrap();
        let mut manager = PhaseManager::default();

        script.seed(&mut manager).unwrap();

        assert_eq!(manager.queued_names(), vec![PhaseName::Summon]);
    }

    #[test]
    fn test_once_rule_fires_once() {
        let script = BattleScript::from_toml_str(SCRIPT).unwrap();
        let mut handler = ScriptedHandler::new(&script).unwrap();
        let mut manager = PhaseManager::default();
        for _ in 0..2 {
            let command = crate::phase::PhaseKind::Command {
                battler: BattlerIndex::PLAYER,
            };
            manager.push(Phase::new(command), false);
        }

        manager.shift_phase(&mut handler).unwrap();
        assert_eq!(manager.prepend_names(), vec![PhaseName::Message]);

        // The staged message runs next, then the second Command adds nothing
        manager.shift_phase(&mut handler).unwrap();
        manager.shift_phase(&mut handler).unwrap();
        assert_eq!(manager.prepend_len(), 0);
        assert!(handler.has_started(PhaseName::Message));
    }
}
