//! Phase manager - owns every phase queue and decides what runs next
//!
//! Containers, in the order `shift_phase` consults them:
//! - standby slot (an overridden phase waiting to resume)
//! - prepend staging queue, merged onto the front of the primary queue
//! - primary queue, FIFO
//! - deferred ("next command") queue, flushed at the turn boundary
//! - conditional list, promoted to the front after every dequeue
//!
//! Dynamically ordered phases sit in `DynamicQueueManager` and are represented
//! in the primary queue by activation markers.

use std::collections::VecDeque;

use crate::core::config::SchedulerConfig;
use crate::core::error::{Result, SchedulerError};
use crate::core::types::{PhaseId, Turn};
use crate::phase::{DynamicPhaseType, Phase, PhaseKind, PhaseName};
use crate::scheduler::context::{
    PhaseCondition, PhaseContext, PhaseHandler, PhaseStep, PhaseTicket, ScheduleRequest,
};
use crate::scheduler::dynamic_queue::{DynamicQueueManager, PhaseOrdering};
use crate::scheduler::event_log::{PhaseEventLog, PhaseEventType};

/// What `shift_phase` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A queued phase was dequeued and started
    Started(PhaseId),
    /// The standby phase became current again without being restarted
    Resumed(PhaseId),
}

/// Where the current phase stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Finished; the next `shift_phase` replaces it
    Ended,
    /// Running until its ticket resolves
    Awaiting,
    /// Running until outside code shifts
    Held,
}

enum Completion {
    Ended,
    Pending(PhaseTicket),
    Held,
}

impl From<PhaseStep> for Completion {
    fn from(step: PhaseStep) -> Self {
        match step {
            PhaseStep::End => Completion::Ended,
            PhaseStep::Await(ticket) => Completion::Pending(ticket),
            PhaseStep::Hold => Completion::Held,
        }
    }
}

struct ActivePhase {
    phase: Phase,
    completion: Completion,
}

impl ActivePhase {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            completion: Completion::Held,
        }
    }
}

struct ConditionalPhase {
    condition: PhaseCondition,
    phase: Phase,
}

/// Orchestrates every phase of a battle
pub struct PhaseManager {
    config: SchedulerConfig,

    phase_queue: VecDeque<Phase>,
    prepend_queue: Vec<Phase>,
    splice_index: Option<usize>,
    conditional_queue: Vec<ConditionalPhase>,
    next_command_queue: Vec<Phase>,
    dynamic_queues: DynamicQueueManager,

    current: Option<ActivePhase>,
    standby: Option<ActivePhase>,

    turn: Turn,
    transitions: u64,
    synthesized_turn_init: Option<PhaseId>,
    last_start_was_turn_init: bool,

    event_log: PhaseEventLog,
}

impl PhaseManager {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            phase_queue: VecDeque::new(),
            prepend_queue: Vec::new(),
            splice_index: None,
            conditional_queue: Vec::new(),
            next_command_queue: Vec::new(),
            dynamic_queues: DynamicQueueManager::new(config.tie_break_seed),
            current: None,
            standby: None,
            turn: 0,
            transitions: 0,
            synthesized_turn_init: None,
            last_start_was_turn_init: false,
            event_log: PhaseEventLog::new(config.event_log_capacity),
            config,
        }
    }

    // === INTROSPECTION ===

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.current.as_ref().map(|active| &active.phase)
    }

    pub fn standby_phase(&self) -> Option<&Phase> {
        self.standby.as_ref().map(|active| &active.phase)
    }

    pub fn current_status(&self) -> Option<PhaseStatus> {
        self.current.as_ref().map(|active| match active.completion {
            Completion::Ended => PhaseStatus::Ended,
            Completion::Pending(_) => PhaseStatus::Awaiting,
            Completion::Held => PhaseStatus::Held,
        })
    }

    /// Take the current phase's completion ticket so it can be awaited
    ///
    /// The phase counts as held afterwards: whoever owns the ticket shifts
    /// once it resolves.
    pub fn take_current_ticket(&mut self) -> Option<PhaseTicket> {
        let active = self.current.as_mut()?;
        match std::mem::replace(&mut active.completion, Completion::Held) {
            Completion::Pending(ticket) => Some(ticket),
            other => {
                active.completion = other;
                None
            }
        }
    }

    /// Mark the current phase as finished, e.g. after its ticket resolved
    pub fn end_current(&mut self) {
        if let Some(active) = self.current.as_mut() {
            active.completion = Completion::Ended;
        }
    }

    /// Whether the current phase has finished, polling its ticket if it has one
    ///
    /// A signaled ticket is consumed and the phase is marked ended.
    pub fn current_finished(&mut self) -> bool {
        let Some(active) = self.current.as_mut() else {
            return false;
        };
        if let Completion::Pending(ticket) = &mut active.completion {
            if ticket.is_signaled() {
                active.completion = Completion::Ended;
            }
        }
        matches!(active.completion, Completion::Ended)
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn event_log(&self) -> &PhaseEventLog {
        &self.event_log
    }

    pub fn queue_len(&self) -> usize {
        self.phase_queue.len()
    }

    pub fn prepend_len(&self) -> usize {
        self.prepend_queue.len()
    }

    pub fn deferred_len(&self) -> usize {
        self.next_command_queue.len()
    }

    pub fn conditional_len(&self) -> usize {
        self.conditional_queue.len()
    }

    pub fn dynamic_len(&self, dynamic_type: DynamicPhaseType) -> usize {
        self.dynamic_queues.len(dynamic_type)
    }

    pub fn splice_index(&self) -> Option<usize> {
        self.splice_index
    }

    pub fn queued_names(&self) -> Vec<PhaseName> {
        self.phase_queue.iter().map(Phase::name).collect()
    }

    pub fn prepend_names(&self) -> Vec<PhaseName> {
        self.prepend_queue.iter().map(Phase::name).collect()
    }

    pub fn deferred_names(&self) -> Vec<PhaseName> {
        self.next_command_queue.iter().map(Phase::name).collect()
    }

    /// Nothing left to run before a new turn would be synthesized
    pub fn at_turn_boundary(&self) -> bool {
        self.standby.is_none() && self.phase_queue.is_empty() && self.prepend_queue.is_empty()
    }

    // === QUEUE MUTATION ===

    /// Append `phase` to the primary queue, or to the deferred queue when
    /// `defer` is set
    ///
    /// Dynamic phases are parked in their sub-queue and represented by an
    /// activation marker in the primary queue, whether deferred or not.
    pub fn push(&mut self, phase: Phase, defer: bool) {
        match self.dynamic_queues.queue_dynamic_phase(phase) {
            Ok(dynamic_type) => self.phase_queue.push_back(Phase::marker(dynamic_type)),
            Err(phase) if defer => self.next_command_queue.push(phase),
            Err(phase) => self.phase_queue.push_back(phase),
        }
    }

    /// Stage `phases` to run right after the current phase
    ///
    /// Without a splice index the batch goes to the end of the staging queue.
    /// With one armed, the batch is inserted at the splice point, so separate
    /// calls stack in reverse while each batch keeps its own order.
    pub fn unshift(&mut self, phases: impl IntoIterator<Item = Phase>) {
        let batch: Vec<Phase> = phases
            .into_iter()
            .map(|phase| self.check_dynamic(phase))
            .collect();

        match self.splice_index {
            Some(index) => {
                for (offset, phase) in batch.into_iter().enumerate() {
                    self.prepend_queue.insert(index + offset, phase);
                }
            }
            None => self.prepend_queue.extend(batch),
        }
    }

    /// Stage `phases` after everything already staged, ignoring the splice
    pub fn stage_last(&mut self, phases: impl IntoIterator<Item = Phase>) {
        let batch: Vec<Phase> = phases
            .into_iter()
            .map(|phase| self.check_dynamic(phase))
            .collect();
        self.prepend_queue.extend(batch);
    }

    pub fn set_queue_splice(&mut self) {
        self.splice_index = Some(self.prepend_queue.len());
    }

    pub fn clear_queue_splice(&mut self) {
        self.splice_index = None;
    }

    /// Queue `phase` once `condition` holds at a transition boundary
    ///
    /// Conditions still false when the primary queue runs dry are discarded.
    pub fn push_conditional(&mut self, phase: Phase, condition: impl FnMut() -> bool + 'static) {
        self.push_conditional_boxed(phase, Box::new(condition));
    }

    fn push_conditional_boxed(&mut self, phase: Phase, condition: PhaseCondition) {
        self.conditional_queue.push(ConditionalPhase { condition, phase });
    }

    /// Route `phase` through its dynamic queue, staging an activation marker
    ///
    /// Returns false if the phase has no dynamic type; it is staged as-is.
    pub fn push_dynamic(&mut self, phase: Phase) -> bool {
        match self.dynamic_queues.queue_dynamic_phase(phase) {
            Ok(dynamic_type) => {
                self.unshift([Phase::marker(dynamic_type)]);
                true
            }
            Err(phase) => {
                self.unshift([phase]);
                false
            }
        }
    }

    /// Replace `phase` with an activation marker if it belongs to a dynamic type
    fn check_dynamic(&mut self, phase: Phase) -> Phase {
        match self.dynamic_queues.queue_dynamic_phase(phase) {
            Ok(dynamic_type) => Phase::marker(dynamic_type),
            Err(phase) => phase,
        }
    }

    /// Install a custom ordering for one dynamic type
    pub fn set_dynamic_ordering(
        &mut self,
        dynamic_type: DynamicPhaseType,
        ordering: impl PhaseOrdering + 'static,
    ) {
        self.dynamic_queues
            .set_ordering(dynamic_type, Box::new(ordering));
    }

    pub fn find_phase(&self, filter: impl Fn(&Phase) -> bool) -> Option<&Phase> {
        self.phase_queue.iter().find(|phase| filter(phase))
    }

    /// Remove the first primary-queue phase matching `filter`
    pub fn try_remove_phase(&mut self, filter: impl Fn(&Phase) -> bool) -> bool {
        match self.phase_queue.iter().position(|phase| filter(phase)) {
            Some(index) => {
                self.phase_queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the first staged phase matching `filter`
    pub fn try_remove_from_prepend(&mut self, filter: impl Fn(&Phase) -> bool) -> bool {
        let Some(index) = self.prepend_queue.iter().position(|phase| filter(phase)) else {
            return false;
        };
        self.prepend_queue.remove(index);
        // Keep the splice point on the same neighbor
        if let Some(splice) = self.splice_index.as_mut() {
            if index < *splice {
                *splice -= 1;
            }
        }
        true
    }

    /// Swap the first primary-queue phase matching `filter` for `replacement`,
    /// keeping its position
    pub fn try_replace_phase(
        &mut self,
        filter: impl Fn(&Phase) -> bool,
        replacement: Phase,
    ) -> bool {
        match self.phase_queue.iter_mut().find(|phase| filter(phase)) {
            Some(slot) => {
                *slot = replacement;
                true
            }
            None => false,
        }
    }

    /// Insert `phases` directly before the first queued phase named `target`
    ///
    /// Falls back to `unshift` when there is no such phase. Returns whether
    /// the anchor was found.
    pub fn prepend_to_phase(
        &mut self,
        phases: impl IntoIterator<Item = Phase>,
        target: PhaseName,
    ) -> bool {
        match self.phase_queue.iter().position(|phase| phase.is(target)) {
            Some(index) => {
                self.insert_at(index, phases);
                true
            }
            None => {
                self.unshift(phases);
                false
            }
        }
    }

    /// Insert `phases` directly after the first queued phase named `target`
    /// that also satisfies `condition`
    ///
    /// Falls back to `unshift` when there is no such phase. Returns whether
    /// the anchor was found.
    pub fn append_to_phase(
        &mut self,
        phases: impl IntoIterator<Item = Phase>,
        target: PhaseName,
        condition: Option<&dyn Fn(&Phase) -> bool>,
    ) -> bool {
        let anchor = self
            .phase_queue
            .iter()
            .position(|phase| phase.is(target) && condition.map_or(true, |cond| cond(phase)));
        match anchor {
            Some(index) => {
                self.insert_at(index + 1, phases);
                true
            }
            None => {
                self.unshift(phases);
                false
            }
        }
    }

    fn insert_at(&mut self, index: usize, phases: impl IntoIterator<Item = Phase>) {
        let batch: Vec<Phase> = phases
            .into_iter()
            .map(|phase| self.check_dynamic(phase))
            .collect();
        for (offset, phase) in batch.into_iter().enumerate() {
            self.phase_queue.insert(index + offset, phase);
        }
    }

    /// Insert `phase` right after the last staged phase named `target`
    pub fn insert_after_last_staged(
        &mut self,
        target: PhaseName,
        phase: Phase,
    ) -> std::result::Result<(), Phase> {
        let Some(anchor) = self.prepend_queue.iter().rposition(|p| p.is(target)) else {
            return Err(phase);
        };
        let phase = self.check_dynamic(phase);
        self.prepend_queue.insert(anchor + 1, phase);
        if let Some(splice) = self.splice_index.as_mut() {
            if anchor < *splice {
                *splice += 1;
            }
        }
        Ok(())
    }

    /// Insert `phase` right after the last primary-queue phase named `target`
    pub fn insert_after_last_queued(
        &mut self,
        target: PhaseName,
        phase: Phase,
    ) -> std::result::Result<(), Phase> {
        let Some(anchor) = self.phase_queue.iter().rposition(|p| p.is(target)) else {
            return Err(phase);
        };
        self.insert_at(anchor + 1, [phase]);
        Ok(())
    }

    /// Payload of the first primary-queue phase named `name`, for in-place edits
    pub fn find_phase_mut(&mut self, name: PhaseName) -> Option<&mut PhaseKind> {
        self.phase_queue
            .iter_mut()
            .find(|phase| phase.is(name))
            .map(Phase::kind_mut)
    }

    /// Whether a phase named `name` waits anywhere, dynamic queues included
    pub fn has_phase_of_type(&self, name: PhaseName) -> bool {
        self.dynamic_queues.exists(name)
            || self.phase_queue.iter().any(|phase| phase.is(name))
            || self.prepend_queue.iter().any(|phase| phase.is(name))
    }

    /// Remove every primary-queue and staged phase named `name`
    ///
    /// Dynamic queues are not touched. Removing activation markers leaves
    /// their phases orphaned until the next turn boundary drops them.
    pub fn remove_all_phases_of_type(&mut self, name: PhaseName) -> usize {
        let before = self.phase_queue.len() + self.prepend_queue.len();
        self.phase_queue.retain(|phase| !phase.is(name));

        if let Some(splice) = self.splice_index {
            let removed_before = self.prepend_queue[..splice.min(self.prepend_queue.len())]
                .iter()
                .filter(|phase| phase.is(name))
                .count();
            self.splice_index = Some(splice - removed_before);
        }
        self.prepend_queue.retain(|phase| !phase.is(name));

        before - (self.phase_queue.len() + self.prepend_queue.len())
    }

    /// Clear the primary queue only
    pub fn clear_phase_queue(&mut self) {
        self.phase_queue.clear();
    }

    /// Clear every queue and the standby slot; the current phase is kept
    pub fn clear_all_phases(&mut self) {
        self.phase_queue.clear();
        self.prepend_queue.clear();
        self.splice_index = None;
        self.conditional_queue.clear();
        self.next_command_queue.clear();
        self.dynamic_queues.clear_queues();
        self.standby = None;
    }

    // === TRANSITIONS ===

    /// Advance to the next phase and start it
    ///
    /// Called whenever the current phase ends. A phase in standby resumes
    /// without being restarted; otherwise staged phases are merged, the turn
    /// boundary is handled if the queue ran dry, the next phase is dequeued,
    /// conditionals are promoted and the new phase is started.
    pub fn shift_phase<H: PhaseHandler + ?Sized>(&mut self, handler: &mut H) -> Result<Transition> {
        if let Some(standby) = self.standby.take() {
            let id = standby.phase.id();
            tracing::debug!("Resume phase {}", standby.phase);
            self.transitions += 1;
            self.log(PhaseEventType::Resumed {
                phase: standby.phase.to_string(),
            });
            self.current = Some(standby);
            return Ok(Transition::Resumed(id));
        }

        self.splice_index = None;
        for phase in self.prepend_queue.drain(..).rev() {
            self.phase_queue.push_front(phase);
        }

        if self.phase_queue.is_empty() {
            self.replenish()?;
        }

        let next = self
            .phase_queue
            .pop_front()
            .ok_or(SchedulerError::QueueExhausted { turn: self.turn })?;
        let id = next.id();
        self.last_start_was_turn_init = self.synthesized_turn_init == Some(id);
        self.current = Some(ActivePhase::new(next));
        self.transitions += 1;

        self.promote_conditionals();
        self.start_current(handler);

        Ok(Transition::Started(id))
    }

    /// Interrupt the current phase with `phase`, which starts immediately
    ///
    /// Only one level of interruption exists: if a phase is already in
    /// standby, `phase` is handed back.
    pub fn override_phase<H: PhaseHandler + ?Sized>(
        &mut self,
        phase: Phase,
        handler: &mut H,
    ) -> std::result::Result<(), Phase> {
        if self.standby.is_some() {
            return Err(phase);
        }

        let interrupted = self.current.as_ref().map(|active| active.phase.to_string());
        tracing::debug!(
            "Override phase {} with {}",
            interrupted.as_deref().unwrap_or("<none>"),
            phase
        );
        self.log(PhaseEventType::Overridden {
            interrupted,
            by: phase.to_string(),
        });

        self.standby = self.current.take();
        self.current = Some(ActivePhase::new(phase));
        self.start_current(handler);
        Ok(())
    }

    /// Move the best waiting phase of `dynamic_type` to the front of the
    /// primary queue
    pub fn start_dynamic_type(&mut self, dynamic_type: DynamicPhaseType) -> bool {
        match self.dynamic_queues.pop_next_phase(dynamic_type) {
            Some(phase) => {
                tracing::debug!("Activate {:?} phase {}", dynamic_type, phase);
                self.log(PhaseEventType::DynamicActivated {
                    dynamic_type,
                    phase: phase.to_string(),
                });
                self.phase_queue.push_front(phase);
                true
            }
            None => {
                tracing::debug!("No queued {:?} phase for marker", dynamic_type);
                false
            }
        }
    }

    /// Apply one request produced by a starting phase
    pub fn apply<H: PhaseHandler + ?Sized>(&mut self, request: ScheduleRequest, handler: &mut H) {
        match request {
            ScheduleRequest::Push { phase, defer } => self.push(phase, defer),
            ScheduleRequest::Unshift(phases) => self.unshift(phases),
            ScheduleRequest::SetQueueSplice => self.set_queue_splice(),
            ScheduleRequest::ClearQueueSplice => self.clear_queue_splice(),
            ScheduleRequest::PushConditional { phase, condition } => {
                self.push_conditional_boxed(phase, condition)
            }
            ScheduleRequest::PushDynamic(phase) => {
                self.push_dynamic(phase);
            }
            ScheduleRequest::TryRemove(filter) => {
                if !self.try_remove_phase(|phase| filter(phase)) {
                    tracing::debug!("No queued phase matched removal request");
                }
            }
            ScheduleRequest::TryRemoveFromPrepend(filter) => {
                if !self.try_remove_from_prepend(|phase| filter(phase)) {
                    tracing::debug!("No staged phase matched removal request");
                }
            }
            ScheduleRequest::TryReplace { filter, replacement } => {
                if !self.try_replace_phase(|phase| filter(phase), replacement) {
                    tracing::debug!("No queued phase matched replacement request");
                }
            }
            ScheduleRequest::PrependTo { phases, target } => {
                self.prepend_to_phase(phases, target);
            }
            ScheduleRequest::AppendTo {
                phases,
                target,
                condition,
            } => {
                self.append_to_phase(phases, target, condition.as_deref());
            }
            ScheduleRequest::RemoveAllOfType(name) => {
                self.remove_all_phases_of_type(name);
            }
            ScheduleRequest::QueueFaint(battler) => self.queue_faint_phase(battler),
            ScheduleRequest::Interlude => self.on_interlude(),
            ScheduleRequest::StageLast(phases) => self.stage_last(phases),
            ScheduleRequest::Override(phase) => {
                if let Err(phase) = self.override_phase(phase, handler) {
                    tracing::warn!("Standby occupied, staging override phase {} instead", phase);
                    self.unshift([phase]);
                }
            }
        }
    }

    /// Turn boundary: the primary queue ran dry
    fn replenish(&mut self) -> Result<()> {
        if self.last_start_was_turn_init && self.next_command_queue.is_empty() {
            // The last turn-init queued nothing; another one would do the same.
            return Err(SchedulerError::QueueExhausted { turn: self.turn });
        }

        let orphans = self.dynamic_queues.clear_queues();
        if orphans > 0 {
            tracing::warn!("Dropped {} dynamic phases without activation markers", orphans);
            self.log(PhaseEventType::OrphansDropped { count: orphans });
        }

        let deferred: Vec<Phase> = self.next_command_queue.drain(..).collect();
        if !deferred.is_empty() {
            tracing::debug!("Flush {} deferred phases", deferred.len());
            self.log(PhaseEventType::DeferredFlushed {
                count: deferred.len(),
            });
        }
        for phase in deferred {
            self.push(phase, false);
        }

        let discarded = self.conditional_queue.len();
        if discarded > 0 {
            tracing::debug!("Discard {} unmet conditional phases", discarded);
            self.conditional_queue.clear();
            self.log(PhaseEventType::ConditionalsDiscarded { count: discarded });
        }

        if self.config.auto_turn_init {
            self.turn += 1;
            let turn_init = Phase::new(PhaseKind::TurnInit);
            self.synthesized_turn_init = Some(turn_init.id());
            self.phase_queue.push_back(turn_init);
            self.log(PhaseEventType::TurnStarted);
        }

        Ok(())
    }

    /// Move every conditional whose predicate now holds to the front of the
    /// primary queue, keeping their relative order
    ///
    /// Phases the current phase stages still run first, since staging is
    /// merged ahead of the queue at the next transition.
    fn promote_conditionals(&mut self) {
        if self.conditional_queue.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.conditional_queue);
        let mut promoted = Vec::new();
        for mut entry in pending {
            if (entry.condition)() {
                tracing::debug!("Condition met for {}", entry.phase);
                self.log(PhaseEventType::ConditionalPromoted {
                    phase: entry.phase.to_string(),
                });
                promoted.push(self.check_dynamic(entry.phase));
            } else {
                self.conditional_queue.push(entry);
            }
        }
        for phase in promoted.into_iter().rev() {
            self.phase_queue.push_front(phase);
        }
    }

    fn start_current<H: PhaseHandler + ?Sized>(&mut self, handler: &mut H) {
        let (label, marker) = match self.current.as_ref() {
            Some(active) => (
                active.phase.to_string(),
                match active.phase.kind() {
                    PhaseKind::DynamicMarker { dynamic_type } => Some(*dynamic_type),
                    _ => None,
                },
            ),
            None => return,
        };

        if self.config.log_phase_starts {
            tracing::debug!("Start phase {}", label);
        }
        self.log(PhaseEventType::Started { phase: label });

        // Markers pop their dynamic phase and end on the spot
        if let Some(dynamic_type) = marker {
            self.start_dynamic_type(dynamic_type);
            if let Some(active) = self.current.as_mut() {
                active.completion = Completion::Ended;
            }
            return;
        }

        let (step, requests) = match self.current.as_ref() {
            Some(active) => {
                let mut ctx = PhaseContext::new(self);
                let step = handler.start(&active.phase, &mut ctx);
                (step, ctx.into_requests())
            }
            None => return,
        };

        if let Some(active) = self.current.as_mut() {
            active.completion = step.into();
        }
        // Anything staged "last" goes behind every other request of this phase
        let (last, requests): (Vec<_>, Vec<_>) = requests
            .into_iter()
            .partition(|request| matches!(request, ScheduleRequest::StageLast(_)));
        for request in requests.into_iter().chain(last) {
            self.apply(request, handler);
        }
    }

    fn log(&mut self, event_type: PhaseEventType) {
        self.event_log.push(event_type, self.transitions, self.turn);
    }
}

impl Default for PhaseManager {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BattlerIndex;

    /// Ends every phase immediately and records start order
    #[derive(Default)]
    struct Recorder {
        started: Vec<PhaseName>,
    }

    impl PhaseHandler for Recorder {
        fn start(&mut self, phase: &Phase, _ctx: &mut PhaseContext<'_>) -> PhaseStep {
            self.started.push(phase.name());
            PhaseStep::End
        }
    }

    fn message(text: &str) -> Phase {
        Phase::new(PhaseKind::Message { text: text.into() })
    }

    #[test]
    fn test_first_shift_synthesizes_turn_init() {
        let mut manager = PhaseManager::default();
        let mut handler = Recorder::default();

        let transition = manager.shift_phase(&mut handler).unwrap();

        assert!(matches!(transition, Transition::Started(_)));
        assert_eq!(manager.turn(), 1);
        assert_eq!(handler.started, vec![PhaseName::TurnInit]);
        assert_eq!(manager.current_status(), Some(PhaseStatus::Ended));
    }

    #[test]
    fn test_unshift_batch_keeps_order_without_splice() {
        let mut manager = PhaseManager::default();
        manager.unshift([message("a"), message("b")]);
        manager.unshift([Phase::new(PhaseKind::Berry)]);

        assert_eq!(
            manager.prepend_names(),
            vec![PhaseName::Message, PhaseName::Message, PhaseName::Berry]
        );
    }

    #[test]
    fn test_splice_resets_on_transition() {
        let mut manager = PhaseManager::default();
        let mut handler = Recorder::default();
        manager.unshift([Phase::new(PhaseKind::Berry)]);
        manager.set_queue_splice();
        assert_eq!(manager.splice_index(), Some(1));

        manager.shift_phase(&mut handler).unwrap();
        assert_eq!(manager.splice_index(), None);
    }

    #[test]
    fn test_remove_from_prepend_keeps_splice_in_bounds() {
        let mut manager = PhaseManager::default();
        manager.unshift([message("a"), Phase::new(PhaseKind::Berry)]);
        manager.set_queue_splice();

        assert!(manager.try_remove_from_prepend(|p| p.is(PhaseName::Message)));
        assert_eq!(manager.splice_index(), Some(1));

        manager.unshift([Phase::new(PhaseKind::HideAbility)]);
        assert_eq!(
            manager.prepend_names(),
            vec![PhaseName::Berry, PhaseName::HideAbility]
        );
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::WeatherEffect), false);
        manager.push(Phase::new(PhaseKind::Berry), false);
        manager.push(Phase::new(PhaseKind::TurnEnd { upcoming_interlude: false }), false);

        let replaced = manager.try_replace_phase(
            |p| p.is(PhaseName::Berry),
            Phase::new(PhaseKind::CheckStatusEffect),
        );

        assert!(replaced);
        assert_eq!(
            manager.queued_names(),
            vec![PhaseName::WeatherEffect, PhaseName::CheckStatusEffect, PhaseName::TurnEnd]
        );
        assert!(!manager.try_replace_phase(
            |p| p.is(PhaseName::Berry),
            Phase::new(PhaseKind::Berry)
        ));
    }

    #[test]
    fn test_prepend_and_append_anchor() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::MoveEnd { battler: BattlerIndex::PLAYER }), false);
        manager.push(Phase::new(PhaseKind::TurnEnd { upcoming_interlude: false }), false);

        assert!(manager.prepend_to_phase([Phase::new(PhaseKind::Berry)], PhaseName::TurnEnd));
        assert!(manager.append_to_phase(
            [Phase::new(PhaseKind::Faint { battler: BattlerIndex::ENEMY })],
            PhaseName::MoveEnd,
            None,
        ));

        assert_eq!(
            manager.queued_names(),
            vec![PhaseName::MoveEnd, PhaseName::Faint, PhaseName::Berry, PhaseName::TurnEnd]
        );
    }

    #[test]
    fn test_missing_anchor_falls_back_to_unshift() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::Berry), false);

        let found = manager.append_to_phase(
            [Phase::new(PhaseKind::WeatherEffect)],
            PhaseName::Berry,
            Some(&|p: &Phase| p.battler().is_some()),
        );

        assert!(!found);
        assert_eq!(manager.prepend_names(), vec![PhaseName::WeatherEffect]);
        assert_eq!(manager.queued_names(), vec![PhaseName::Berry]);
    }

    #[test]
    fn test_dynamic_push_leaves_marker() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::PostSummon { battler: BattlerIndex::ENEMY }), false);

        assert_eq!(manager.queued_names(), vec![PhaseName::DynamicMarker]);
        assert_eq!(manager.dynamic_len(DynamicPhaseType::PostSummon), 1);
        assert!(manager.has_phase_of_type(PhaseName::PostSummon));
    }

    #[test]
    fn test_deferred_dynamic_phase_redirected_on_push() {
        let mut manager = PhaseManager::default();
        let mut handler = Recorder::default();
        manager.push(Phase::new(PhaseKind::PostSummon { battler: BattlerIndex::ENEMY }), true);
        manager.push(Phase::new(PhaseKind::Berry), false);

        assert_eq!(manager.deferred_len(), 0);
        assert_eq!(manager.dynamic_len(DynamicPhaseType::PostSummon), 1);
        assert!(manager.has_phase_of_type(PhaseName::PostSummon));
        assert_eq!(manager.queued_names(), vec![PhaseName::DynamicMarker, PhaseName::Berry]);

        for _ in 0..4 {
            manager.shift_phase(&mut handler).unwrap();
        }

        assert_eq!(
            handler.started,
            vec![PhaseName::PostSummon, PhaseName::Berry, PhaseName::TurnInit]
        );
    }

    #[test]
    fn test_current_finished_stays_true_once_signaled() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::Berry), false);
        let mut signals = Vec::new();
        let mut handler = |_phase: &Phase, _ctx: &mut PhaseContext<'_>| {
            let (signal, ticket) = crate::scheduler::context::completion();
            signals.push(signal);
            PhaseStep::Await(ticket)
        };
        manager.shift_phase(&mut handler).unwrap();
        assert!(!manager.current_finished());

        signals.pop().unwrap().end();

        assert!(manager.current_finished());
        assert!(manager.current_finished());
        assert_eq!(manager.current_status(), Some(PhaseStatus::Ended));
    }

    #[test]
    fn test_remove_all_of_type_counts() {
        let mut manager = PhaseManager::default();
        manager.push(Phase::new(PhaseKind::Berry), false);
        manager.push(message("x"), false);
        manager.push(Phase::new(PhaseKind::Berry), false);
        manager.unshift([Phase::new(PhaseKind::Berry)]);

        assert_eq!(manager.remove_all_phases_of_type(PhaseName::Berry), 3);
        assert_eq!(manager.queued_names(), vec![PhaseName::Message]);
        assert_eq!(manager.prepend_len(), 0);
    }

    #[test]
    fn test_turn_init_that_queues_nothing_is_fatal() {
        let mut manager = PhaseManager::default();
        let mut handler = Recorder::default();

        manager.shift_phase(&mut handler).unwrap();
        let result = manager.shift_phase(&mut handler);

        assert!(matches!(result, Err(SchedulerError::QueueExhausted { turn: 1 })));
    }

    #[test]
    fn test_override_refused_while_standby_occupied() {
        let mut manager = PhaseManager::default();
        let mut handler = Recorder::default();
        manager.push(Phase::new(PhaseKind::Berry), false);
        manager.shift_phase(&mut handler).unwrap();

        assert!(manager
            .override_phase(Phase::new(PhaseKind::WeatherEffect), &mut handler)
            .is_ok());
        let refused = manager.override_phase(Phase::new(PhaseKind::HideAbility), &mut handler);

        assert!(refused.is_err());
        assert_eq!(manager.standby_phase().map(Phase::name), Some(PhaseName::Berry));
    }

    #[test]
    fn test_event_log_records_turn_and_starts() {
        let mut manager = PhaseManager::default();
        let mut handler = Recorder::default();
        manager.push(Phase::new(PhaseKind::Berry), false);
        manager.shift_phase(&mut handler).unwrap();

        let events: Vec<&PhaseEventType> = manager
            .event_log()
            .iter()
            .map(|e| &e.event_type)
            .collect();
        assert_eq!(
            events,
            vec![&PhaseEventType::Started { phase: "Berry".into() }]
        );
    }
}
