//! Async loop that keeps a battle moving
//!
//! Phases that end during `start` are shifted past immediately. Phases that
//! return a ticket are awaited, so animations and input can run on the tokio
//! runtime while the scheduler waits. A held phase stops the loop and hands
//! control back to the caller.

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SchedulerError};
use crate::core::types::Turn;
use crate::phase::{Phase, PhaseName};
use crate::scheduler::context::{PhaseContext, PhaseHandler, PhaseStep};
use crate::scheduler::manager::{PhaseManager, PhaseStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The current phase is held for outside code
    Held,
    /// `max_turns` reached at a turn boundary
    TurnLimit,
    /// `max_transitions` reached
    TransitionLimit,
}

/// Outcome of one `run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub turns: Turn,
    pub transitions: u64,
    pub stop_reason: StopReason,
    /// Phases started during this run, in order; activation markers are left out
    pub started: Vec<String>,
}

/// Drive `manager` until a phase holds or a configured limit is reached
///
/// Starts the first phase itself when nothing is current. A ticket whose
/// signal is dropped without firing aborts the run with `PhaseAbandoned`.
pub async fn run<H: PhaseHandler + ?Sized>(
    manager: &mut PhaseManager,
    handler: &mut H,
) -> Result<RunSummary> {
    let max_transitions = manager.config().max_transitions;
    let max_turns = manager.config().max_turns;
    let first_transition = manager.transitions();
    let mut handler = Recording {
        inner: handler,
        started: Vec::new(),
    };

    if manager.current_phase().is_none() {
        manager.shift_phase(&mut handler)?;
    }

    let stop_reason = loop {
        match manager.current_status() {
            Some(PhaseStatus::Held) => break StopReason::Held,
            Some(PhaseStatus::Awaiting) => {
                let name = current_name(manager);
                if let Some(ticket) = manager.take_current_ticket() {
                    if !ticket.wait().await {
                        tracing::warn!("Phase {} dropped its completion signal", name);
                        return Err(SchedulerError::PhaseAbandoned(name));
                    }
                }
                manager.end_current();
            }
            Some(PhaseStatus::Ended) | None => {}
        }

        if manager.transitions() - first_transition >= max_transitions {
            tracing::warn!("Stopping after {} transitions", max_transitions);
            break StopReason::TransitionLimit;
        }
        if let Some(limit) = max_turns {
            if manager.at_turn_boundary() && manager.turn() >= limit {
                tracing::info!("Turn limit {} reached", limit);
                break StopReason::TurnLimit;
            }
        }

        manager.shift_phase(&mut handler)?;
    };

    Ok(RunSummary {
        turns: manager.turn(),
        transitions: manager.transitions() - first_transition,
        stop_reason,
        started: handler.started,
    })
}

/// Forwards to the caller's handler and notes every phase it is asked to
/// start, overrides included
struct Recording<'a, H: ?Sized> {
    inner: &'a mut H,
    started: Vec<String>,
}

impl<H: PhaseHandler + ?Sized> PhaseHandler for Recording<'_, H> {
    fn start(&mut self, phase: &Phase, ctx: &mut PhaseContext<'_>) -> PhaseStep {
        self.started.push(phase.to_string());
        self.inner.start(phase, ctx)
    }
}

fn current_name(manager: &PhaseManager) -> PhaseName {
    manager
        .current_phase()
        .map_or(PhaseName::TurnInit, |phase| phase.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SchedulerConfig;
    use crate::core::types::BattlerIndex;
    use crate::phase::PhaseKind;
    use crate::scheduler::context::completion;

    /// Every turn: one move, then the end-of-turn upkeep
    fn one_move_per_turn(phase: &Phase, ctx: &mut PhaseContext<'_>) -> PhaseStep {
        if phase.is(PhaseName::TurnInit) {
            ctx.push(Phase::new(PhaseKind::Move {
                battler: BattlerIndex::PLAYER,
                move_id: 1,
                priority: 0,
            }));
            ctx.queue_turn_end_phases();
        }
        PhaseStep::End
    }

    #[tokio::test]
    async fn test_stops_at_turn_limit() {
        let config = SchedulerConfig {
            max_turns: Some(2),
            ..Default::default()
        };
        let mut manager = PhaseManager::new(config);
        let mut handler = one_move_per_turn;

        let summary = run(&mut manager, &mut handler).await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::TurnLimit);
        assert_eq!(summary.turns, 2);
        // TurnInit, Move, five upkeep phases, per turn
        assert_eq!(summary.started.len(), 14);
        assert_eq!(summary.started[1], "Move(player#0)");
    }

    #[tokio::test]
    async fn test_stops_at_transition_limit() {
        let config = SchedulerConfig {
            max_transitions: 5,
            ..Default::default()
        };
        let mut manager = PhaseManager::new(config);
        let mut handler = one_move_per_turn;

        let summary = run(&mut manager, &mut handler).await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::TransitionLimit);
        assert_eq!(summary.transitions, 5);
    }

    #[tokio::test]
    async fn test_held_phase_stops_run() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::Command { battler: BattlerIndex::PLAYER }), false);
        let mut handler = |phase: &Phase, _ctx: &mut PhaseContext<'_>| {
            if phase.is(PhaseName::Command) {
                PhaseStep::Hold
            } else {
                PhaseStep::End
            }
        };

        let summary = run(&mut manager, &mut handler).await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Held);
        assert_eq!(summary.started, vec!["Command(player#0)".to_string()]);
    }

    #[tokio::test]
    async fn test_awaits_spawned_signal() {
        let mut manager = PhaseManager::new(SchedulerConfig {
            max_turns: Some(1),
            ..Default::default()
        });
        manager.push(Phase::new(PhaseKind::Message { text: "Go!".into() }), false);
        let mut handler = |phase: &Phase, _ctx: &mut PhaseContext<'_>| {
            if phase.is(PhaseName::Message) {
                let (signal, ticket) = completion();
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    signal.end();
                });
                PhaseStep::Await(ticket)
            } else {
                PhaseStep::End
            }
        };

        let summary = run(&mut manager, &mut handler).await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::TurnLimit);
        assert_eq!(summary.started, vec!["Message".to_string(), "TurnInit".to_string()]);
    }

    #[tokio::test]
    async fn test_override_phase_is_listed_as_started() {
        let mut manager = PhaseManager::new(SchedulerConfig {
            max_turns: Some(1),
            ..Default::default()
        });
        manager.push(Phase::new(PhaseKind::TurnStart), false);
        let mut handler = |phase: &Phase, ctx: &mut PhaseContext<'_>| {
            if phase.is(PhaseName::TurnStart) {
                assert!(ctx.override_phase(Phase::new(PhaseKind::HideAbility)).is_ok());
            }
            PhaseStep::End
        };

        let summary = run(&mut manager, &mut handler).await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::TurnLimit);
        // The resumed TurnStart is not started a second time
        assert_eq!(summary.started, vec!["TurnStart", "HideAbility", "TurnInit"]);
    }

    #[tokio::test]
    async fn test_dropped_signal_is_abandonment() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::Berry), false);
        let mut handler = |_phase: &Phase, _ctx: &mut PhaseContext<'_>| {
            let (signal, ticket) = completion();
            drop(signal);
            PhaseStep::Await(ticket)
        };

        let result = run(&mut manager, &mut handler).await;

        assert!(matches!(
            result,
            Err(SchedulerError::PhaseAbandoned(PhaseName::Berry))
        ));
    }
}
