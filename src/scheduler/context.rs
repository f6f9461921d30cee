//! The contract between the scheduler and the code that gives phases behavior
//!
//! A phase never touches the manager's queues while it runs. Its handler gets
//! a `PhaseContext` with read access to the manager and records every mutation
//! as a `ScheduleRequest`; the manager applies them in order once `start`
//! returns.

use std::fmt;

use tokio::sync::oneshot;

use crate::core::error::Result;
use crate::core::types::{BattlerIndex, Turn};
use crate::phase::{Phase, PhaseArg, PhaseName, PhaseRegistry};
use crate::scheduler::helpers::{self, Entrance, EntranceTiming, SwitchOut, SwitchOutTiming};
use crate::scheduler::manager::PhaseManager;

/// Predicate gating a conditional phase, re-checked at every transition
pub type PhaseCondition = Box<dyn FnMut() -> bool>;

/// Predicate selecting a queued phase
pub type PhaseFilter = Box<dyn Fn(&Phase) -> bool>;

/// How a started phase reports its end
#[derive(Debug)]
pub enum PhaseStep {
    /// Finished inside `start`
    End,
    /// Finishes when the paired `PhaseSignal` fires
    Await(PhaseTicket),
    /// Finishes when outside code calls `shift_phase`
    Hold,
}

/// Receiving half of a phase's completion signal
#[derive(Debug)]
pub struct PhaseTicket {
    rx: oneshot::Receiver<()>,
}

/// Sending half of a phase's completion signal, handed to whatever does the
/// phase's asynchronous work
#[derive(Debug)]
pub struct PhaseSignal {
    tx: oneshot::Sender<()>,
}

/// Create a linked signal/ticket pair
pub fn completion() -> (PhaseSignal, PhaseTicket) {
    let (tx, rx) = oneshot::channel();
    (PhaseSignal { tx }, PhaseTicket { rx })
}

impl PhaseSignal {
    /// Mark the phase as ended
    pub fn end(self) {
        // Receiver gone means the battle was torn down; nothing left to wake.
        let _ = self.tx.send(());
    }
}

impl PhaseTicket {
    /// Wait for the phase to end. Returns false if the signal was dropped
    /// without firing.
    pub async fn wait(self) -> bool {
        self.rx.await.is_ok()
    }

    /// Non-blocking check, usable outside a runtime
    pub fn is_signaled(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Gives phases their behavior
pub trait PhaseHandler {
    /// Begin `phase`'s effects, queue any follow-up work through `ctx`, and
    /// say how the phase will end
    fn start(&mut self, phase: &Phase, ctx: &mut PhaseContext<'_>) -> PhaseStep;
}

impl<F> PhaseHandler for F
where
    F: FnMut(&Phase, &mut PhaseContext<'_>) -> PhaseStep,
{
    fn start(&mut self, phase: &Phase, ctx: &mut PhaseContext<'_>) -> PhaseStep {
        self(phase, ctx)
    }
}

/// A deferred mutation of the manager, produced while a phase starts
pub enum ScheduleRequest {
    Push { phase: Phase, defer: bool },
    Unshift(Vec<Phase>),
    SetQueueSplice,
    ClearQueueSplice,
    PushConditional { phase: Phase, condition: PhaseCondition },
    PushDynamic(Phase),
    TryRemove(PhaseFilter),
    TryRemoveFromPrepend(PhaseFilter),
    TryReplace { filter: PhaseFilter, replacement: Phase },
    PrependTo { phases: Vec<Phase>, target: PhaseName },
    AppendTo { phases: Vec<Phase>, target: PhaseName, condition: Option<PhaseFilter> },
    RemoveAllOfType(PhaseName),
    QueueFaint(BattlerIndex),
    Interlude,
    /// Staged behind everything else this phase queues
    StageLast(Vec<Phase>),
    Override(Phase),
}

impl fmt::Debug for ScheduleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleRequest::Push { phase, defer } => {
                write!(f, "Push({}, defer={})", phase, defer)
            }
            ScheduleRequest::Unshift(phases) => write!(f, "Unshift({} phases)", phases.len()),
            ScheduleRequest::SetQueueSplice => f.write_str("SetQueueSplice"),
            ScheduleRequest::ClearQueueSplice => f.write_str("ClearQueueSplice"),
            ScheduleRequest::PushConditional { phase, .. } => {
                write!(f, "PushConditional({})", phase)
            }
            ScheduleRequest::PushDynamic(phase) => write!(f, "PushDynamic({})", phase),
            ScheduleRequest::TryRemove(_) => f.write_str("TryRemove"),
            ScheduleRequest::TryRemoveFromPrepend(_) => f.write_str("TryRemoveFromPrepend"),
            ScheduleRequest::TryReplace { replacement, .. } => {
                write!(f, "TryReplace(with {})", replacement)
            }
            ScheduleRequest::PrependTo { phases, target } => {
                write!(f, "PrependTo({} phases before {})", phases.len(), target)
            }
            ScheduleRequest::AppendTo { phases, target, .. } => {
                write!(f, "AppendTo({} phases after {})", phases.len(), target)
            }
            ScheduleRequest::RemoveAllOfType(name) => write!(f, "RemoveAllOfType({})", name),
            ScheduleRequest::QueueFaint(battler) => write!(f, "QueueFaint({})", battler),
            ScheduleRequest::Interlude => f.write_str("Interlude"),
            ScheduleRequest::StageLast(phases) => write!(f, "StageLast({} phases)", phases.len()),
            ScheduleRequest::Override(phase) => write!(f, "Override({})", phase),
        }
    }
}

/// Scheduler handle passed to a starting phase
pub struct PhaseContext<'a> {
    manager: &'a PhaseManager,
    requests: Vec<ScheduleRequest>,
    override_claimed: bool,
}

impl<'a> PhaseContext<'a> {
    pub(crate) fn new(manager: &'a PhaseManager) -> Self {
        Self {
            manager,
            requests: Vec::new(),
            override_claimed: false,
        }
    }

    pub(crate) fn into_requests(self) -> Vec<ScheduleRequest> {
        self.requests
    }

    // === READ ACCESS ===

    pub fn turn(&self) -> Turn {
        self.manager.turn()
    }

    pub fn find_phase(&self, filter: impl Fn(&Phase) -> bool) -> Option<&'a Phase> {
        self.manager.find_phase(filter)
    }

    pub fn has_phase_of_type(&self, name: PhaseName) -> bool {
        self.manager.has_phase_of_type(name)
    }

    pub fn standby_occupied(&self) -> bool {
        self.manager.standby_phase().is_some()
    }

    /// Requests recorded so far, in emission order
    pub fn requests(&self) -> &[ScheduleRequest] {
        &self.requests
    }

    // === QUEUE MUTATION ===

    pub fn push(&mut self, phase: Phase) {
        self.requests.push(ScheduleRequest::Push { phase, defer: false });
    }

    /// Hold `phase` until the next turn boundary
    pub fn defer(&mut self, phase: Phase) {
        self.requests.push(ScheduleRequest::Push { phase, defer: true });
    }

    pub fn unshift(&mut self, phases: impl IntoIterator<Item = Phase>) {
        let phases: Vec<Phase> = phases.into_iter().collect();
        if !phases.is_empty() {
            self.requests.push(ScheduleRequest::Unshift(phases));
        }
    }

    pub fn set_queue_splice(&mut self) {
        self.requests.push(ScheduleRequest::SetQueueSplice);
    }

    pub fn clear_queue_splice(&mut self) {
        self.requests.push(ScheduleRequest::ClearQueueSplice);
    }

    pub fn push_conditional(&mut self, phase: Phase, condition: impl FnMut() -> bool + 'static) {
        self.requests.push(ScheduleRequest::PushConditional {
            phase,
            condition: Box::new(condition),
        });
    }

    pub fn push_dynamic(&mut self, phase: Phase) {
        self.requests.push(ScheduleRequest::PushDynamic(phase));
    }

    pub fn try_remove_phase(&mut self, filter: impl Fn(&Phase) -> bool + 'static) {
        self.requests.push(ScheduleRequest::TryRemove(Box::new(filter)));
    }

    pub fn try_remove_from_prepend(&mut self, filter: impl Fn(&Phase) -> bool + 'static) {
        self.requests
            .push(ScheduleRequest::TryRemoveFromPrepend(Box::new(filter)));
    }

    pub fn try_replace_phase(
        &mut self,
        filter: impl Fn(&Phase) -> bool + 'static,
        replacement: Phase,
    ) {
        self.requests.push(ScheduleRequest::TryReplace {
            filter: Box::new(filter),
            replacement,
        });
    }

    pub fn prepend_to_phase(&mut self, phases: impl IntoIterator<Item = Phase>, target: PhaseName) {
        self.requests.push(ScheduleRequest::PrependTo {
            phases: phases.into_iter().collect(),
            target,
        });
    }

    pub fn append_to_phase(
        &mut self,
        phases: impl IntoIterator<Item = Phase>,
        target: PhaseName,
        condition: Option<PhaseFilter>,
    ) {
        self.requests.push(ScheduleRequest::AppendTo {
            phases: phases.into_iter().collect(),
            target,
            condition,
        });
    }

    pub fn remove_all_phases_of_type(&mut self, name: PhaseName) {
        self.requests.push(ScheduleRequest::RemoveAllOfType(name));
    }

    /// Interrupt the starting phase with `phase`
    ///
    /// Returns false when the standby slot is already taken (by an earlier
    /// override or one already requested from this context); the phase is
    /// handed back untouched in that case so the caller can queue it instead.
    pub fn override_phase(&mut self, phase: Phase) -> std::result::Result<(), Phase> {
        if self.override_claimed || self.standby_occupied() {
            return Err(phase);
        }
        self.override_claimed = true;
        self.requests.push(ScheduleRequest::Override(phase));
        Ok(())
    }

    // === CONVENIENCE ===

    pub fn push_new(&mut self, name: &str, args: &[PhaseArg]) -> Result<()> {
        let phase = PhaseRegistry::create(name, args)?;
        self.push(phase);
        Ok(())
    }

    pub fn unshift_new(&mut self, name: &str, args: &[PhaseArg]) -> Result<()> {
        let phase = PhaseRegistry::create(name, args)?;
        self.unshift([phase]);
        Ok(())
    }

    pub fn queue_message(&mut self, text: impl Into<String>, defer: bool) {
        let phase = helpers::message(text);
        if defer {
            self.push(phase);
        } else {
            self.unshift([phase]);
        }
    }

    pub fn queue_ability_display(&mut self, battler: BattlerIndex, passive: bool, show: bool) {
        self.unshift([helpers::ability_display(battler, passive, show)]);
    }

    pub fn queue_turn_end_phases(&mut self) {
        for phase in helpers::turn_end_phases() {
            self.push(phase);
        }
    }

    pub fn queue_faint_phase(&mut self, battler: BattlerIndex) {
        self.requests.push(ScheduleRequest::QueueFaint(battler));
    }

    pub fn on_interlude(&mut self) {
        self.requests.push(ScheduleRequest::Interlude);
    }

    pub fn queue_battler_switch_out(&mut self, battler: BattlerIndex, params: SwitchOut) {
        let phases = helpers::switch_out_phases(battler, &params);
        match params.when {
            SwitchOutTiming::Eager => self.unshift(phases),
            SwitchOutTiming::Deferred => self.requests.push(ScheduleRequest::StageLast(phases)),
        }
    }

    pub fn queue_battler_entrance(
        &mut self,
        battler: BattlerIndex,
        params: Entrance,
    ) -> Result<()> {
        let phases = helpers::entrance_phases(battler, &params)?;
        match params.when {
            EntranceTiming::Eager => self.unshift(phases),
            EntranceTiming::Delayed => {
                for phase in phases {
                    self.push(phase);
                }
            }
        }
        Ok(())
    }
}
