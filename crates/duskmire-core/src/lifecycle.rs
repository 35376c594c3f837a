//! Combat lifecycle: creation, lookup, and termination of instances.
//!
//! The `CombatLifecycleManager` is the exclusive owner of the
//! id → instance map and of the participant → combat mapping that enforces
//! the core invariant: *a participant belongs to at most one active combat
//! instance at a time*. It is an explicit value handed to the scheduler and
//! command handlers — there is no module-level combat registry.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::CombatConfig;
use crate::error::CombatError;
use crate::event::{CombatEvent, EventQueue, TerminationReason};
use crate::instance::{CombatId, CombatInstance, Side};
use crate::participant::{ParticipantId, ParticipantRegistry};
use crate::room::RoomId;

/// Creates, looks up, and terminates [`CombatInstance`]s.
#[derive(Debug, Clone, Default)]
pub struct CombatLifecycleManager {
    combats: BTreeMap<CombatId, CombatInstance>,
    by_participant: BTreeMap<ParticipantId, CombatId>,
    next_id: u64,
}

impl CombatLifecycleManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active combat a participant belongs to, if any.
    #[must_use]
    pub fn get_combat_for(&self, participant: ParticipantId) -> Option<CombatId> {
        self.by_participant.get(&participant).copied()
    }

    /// Looks up an instance.
    #[must_use]
    pub fn get(&self, id: CombatId) -> Option<&CombatInstance> {
        self.combats.get(&id)
    }

    /// Mutable instance access for the round executor.
    pub(crate) fn get_mut(&mut self, id: CombatId) -> Option<&mut CombatInstance> {
        self.combats.get_mut(&id)
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combats.len()
    }

    /// Whether no combats are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combats.is_empty()
    }

    /// Ids of instances due for a round at `now_tick`, in ascending id
    /// order so the per-tick scan is deterministic.
    #[must_use]
    pub fn due_combats(&self, now_tick: u64) -> Vec<CombatId> {
        self.combats
            .values()
            .filter(|c| c.is_due(now_tick))
            .map(CombatInstance::id)
            .collect()
    }

    /// Opens a new two-sided instance between `a` (side 0) and `b`
    /// (side 1), marking both in combat.
    ///
    /// Initiative stats are snapshotted from the registry at this moment;
    /// the first round is due one round length after `now_tick`.
    ///
    /// # Errors
    ///
    /// [`CombatError::AlreadyInCombat`] if either participant is engaged,
    /// [`CombatError::UnknownParticipant`] if either is unregistered.
    pub fn start_combat(
        &mut self,
        a: ParticipantId,
        b: ParticipantId,
        combat_room: RoomId,
        now_tick: u64,
        config: &CombatConfig,
        registry: &mut ParticipantRegistry,
        events: &mut EventQueue,
    ) -> Result<CombatId, CombatError> {
        if a == b {
            return Err(CombatError::AlreadyInCombat(a));
        }
        self.ensure_unengaged(a)?;
        self.ensure_unengaged(b)?;
        let a_initiative = registry
            .get(a)
            .ok_or(CombatError::UnknownParticipant(a))?
            .initiative;
        let b_initiative = registry
            .get(b)
            .ok_or(CombatError::UnknownParticipant(b))?
            .initiative;

        self.next_id += 1;
        let id = CombatId::new(self.next_id);

        let mut instance =
            CombatInstance::open(id, combat_room, now_tick, config.round_length_ticks);
        instance.add_combatant(a, Side(0), a_initiative);
        instance.add_combatant(b, Side(1), b_initiative);
        instance.set_opponent(a, b);
        instance.set_opponent(b, a);

        self.combats.insert(id, instance);
        self.by_participant.insert(a, id);
        self.by_participant.insert(b, id);
        registry.set_in_combat(a, true);
        registry.set_in_combat(b, true);

        info!(combat = %id, attacker = %a, defender = %b, "combat started");
        events.push(CombatEvent::CombatStarted {
            combat: id,
            tick: now_tick,
            attacker: a,
            defender: b,
        });
        Ok(id)
    }

    /// Adds a participant to an existing Active instance on `side`.
    ///
    /// # Errors
    ///
    /// [`CombatError::AlreadyInCombat`], [`CombatError::UnknownCombat`],
    /// [`CombatError::CombatNotActive`], or
    /// [`CombatError::UnknownParticipant`].
    pub fn join_combat(
        &mut self,
        combat_id: CombatId,
        participant: ParticipantId,
        side: Side,
        registry: &mut ParticipantRegistry,
    ) -> Result<(), CombatError> {
        self.ensure_unengaged(participant)?;
        let initiative = registry
            .get(participant)
            .ok_or(CombatError::UnknownParticipant(participant))?
            .initiative;
        let instance = self
            .combats
            .get_mut(&combat_id)
            .ok_or(CombatError::UnknownCombat(combat_id))?;
        if !instance.is_active() {
            return Err(CombatError::CombatNotActive(combat_id));
        }

        instance.add_combatant(participant, side, initiative);
        self.by_participant.insert(participant, combat_id);
        registry.set_in_combat(participant, true);
        info!(combat = %combat_id, %participant, side = side.0, "joined combat");
        Ok(())
    }

    /// Terminates an instance. Idempotent: ending an already-ended (and
    /// thus removed) combat is a no-op, not an error.
    ///
    /// Clears the in-combat flag for everyone involved, purges queued
    /// actions, removes the participant mappings, and publishes the
    /// termination notification. Returns whether an instance was ended by
    /// this call.
    pub fn end_combat(
        &mut self,
        id: CombatId,
        reason: TerminationReason,
        now_tick: u64,
        registry: &mut ParticipantRegistry,
        events: &mut EventQueue,
    ) -> bool {
        let Some(mut instance) = self.combats.remove(&id) else {
            return false;
        };

        instance.begin_ending();
        instance.queue_mut().clear();
        for participant in instance.participant_ids() {
            // Fled participants were released earlier and may be mapped to
            // a newer combat by now; only touch members still bound here.
            if self.by_participant.get(&participant) == Some(&id) {
                registry.set_in_combat(participant, false);
                self.by_participant.remove(&participant);
            }
        }
        instance.finish();

        info!(combat = %id, %reason, "combat ended");
        events.push(CombatEvent::CombatEnded {
            combat: id,
            tick: now_tick,
            reason,
        });
        true
    }

    /// Drops the participant → combat mapping for someone who left the
    /// fight early (fled). The instance keeps its combatant entry for side
    /// accounting; the participant is free to fight elsewhere.
    pub(crate) fn release_participant(&mut self, participant: ParticipantId) {
        self.by_participant.remove(&participant);
    }

    /// Fails with `AlreadyInCombat` when the participant is engaged. A
    /// mapping that points at a no-longer-live instance is a structural
    /// invariant violation; it is alerted and force-cleaned rather than
    /// trusted.
    fn ensure_unengaged(&mut self, participant: ParticipantId) -> Result<(), CombatError> {
        if let Some(existing) = self.by_participant.get(&participant).copied() {
            if self.combats.contains_key(&existing) {
                return Err(CombatError::AlreadyInCombat(participant));
            }
            warn!(
                %participant,
                combat = %existing,
                "stale combat mapping; forcing cleanup"
            );
            self.by_participant.remove(&participant);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantSnapshot;

    fn pid(n: u64) -> ParticipantId {
        ParticipantId::new(n)
    }

    fn setup() -> (
        CombatLifecycleManager,
        ParticipantRegistry,
        EventQueue,
        CombatConfig,
    ) {
        let mut registry = ParticipantRegistry::new();
        for n in 1..=3 {
            registry.insert(ParticipantSnapshot::player(
                pid(n),
                RoomId::new("pit"),
                20,
                50,
            ));
        }
        (
            CombatLifecycleManager::new(),
            registry,
            EventQueue::new(),
            CombatConfig::default(),
        )
    }

    #[test]
    fn start_marks_both_in_combat() {
        let (mut mgr, mut reg, mut events, cfg) = setup();

        let id = mgr
            .start_combat(pid(1), pid(2), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap();

        assert!(reg.is_in_combat(pid(1)));
        assert!(reg.is_in_combat(pid(2)));
        assert_eq!(mgr.get_combat_for(pid(1)), Some(id));
        assert_eq!(mgr.get_combat_for(pid(2)), Some(id));
        assert_eq!(events.drain().len(), 1);
    }

    #[test]
    fn engaged_participant_cannot_start_another() {
        let (mut mgr, mut reg, mut events, cfg) = setup();
        mgr.start_combat(pid(1), pid(2), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap();

        let err = mgr
            .start_combat(pid(1), pid(3), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap_err();
        assert_eq!(err, CombatError::AlreadyInCombat(pid(1)));
    }

    #[test]
    fn end_combat_is_idempotent() {
        let (mut mgr, mut reg, mut events, cfg) = setup();
        let id = mgr
            .start_combat(pid(1), pid(2), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap();

        assert!(mgr.end_combat(id, TerminationReason::LastSideStanding, 50, &mut reg, &mut events));
        assert!(!mgr.end_combat(id, TerminationReason::LastSideStanding, 51, &mut reg, &mut events));

        assert!(!reg.is_in_combat(pid(1)));
        assert!(!reg.is_in_combat(pid(2)));
        assert_eq!(mgr.get_combat_for(pid(1)), None);
        // One started + exactly one ended event despite the double call.
        assert_eq!(events.drain().len(), 2);
    }

    #[test]
    fn participants_can_fight_again_after_end() {
        let (mut mgr, mut reg, mut events, cfg) = setup();
        let id = mgr
            .start_combat(pid(1), pid(2), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap();
        mgr.end_combat(id, TerminationReason::RoomMismatch, 10, &mut reg, &mut events);

        let id2 = mgr
            .start_combat(pid(1), pid(2), RoomId::new("pit"), 20, &cfg, &mut reg, &mut events)
            .unwrap();
        assert_ne!(id, id2);
    }

    #[test]
    fn join_respects_one_combat_invariant() {
        let (mut mgr, mut reg, mut events, cfg) = setup();
        let id = mgr
            .start_combat(pid(1), pid(2), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap();

        mgr.join_combat(id, pid(3), Side(1), &mut reg).unwrap();
        assert!(reg.is_in_combat(pid(3)));

        let err = mgr.join_combat(id, pid(3), Side(0), &mut reg).unwrap_err();
        assert_eq!(err, CombatError::AlreadyInCombat(pid(3)));
    }

    #[test]
    fn due_combats_scans_active_instances() {
        let (mut mgr, mut reg, mut events, cfg) = setup();
        let id = mgr
            .start_combat(pid(1), pid(2), RoomId::new("pit"), 0, &cfg, &mut reg, &mut events)
            .unwrap();

        assert!(mgr.due_combats(99).is_empty());
        assert_eq!(mgr.due_combats(100), vec![id]);
    }
}
