//! The combat instance: participants, rounds, and the instance state
//! machine.
//!
//! A `CombatInstance` is the aggregate the scheduler drives: who is
//! fighting whom, which round we are on, when the next round is due, and
//! what everyone has queued. It owns its participant entries and action
//! queue; the id → instance mapping is owned exclusively by the lifecycle
//! manager.
//!
//! # State machine
//!
//! `Active → Ending → Ended`, one-directional. An `Ended` instance is
//! removed from the lifecycle map and never reused; `round_number` never
//! resets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::ActionQueue;
use crate::participant::{ParticipantId, ParticipantRegistry, VitalityStatus};
use crate::room::RoomId;

// =============================================================================
// Identity and state
// =============================================================================

/// Unique identifier for a combat instance.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatId(u64);

impl CombatId {
    /// Creates an id from a raw `u64`.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CombatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombatId({})", self.0)
    }
}

impl fmt::Display for CombatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an instance. Transitions are one-directional.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatState {
    /// Rounds execute, actions may be enqueued.
    Active,
    /// Termination in progress; no further rounds or enqueues.
    Ending,
    /// Terminated. The instance is removed and never reused.
    Ended,
}

/// Which team a combatant fights for. Two-sided fights use sides 0 and 1;
/// joiners pick an existing side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Side(pub u8);

/// A combatant as seen from this round's perspective.
///
/// Incapacitated and Dead are read fresh from the registry, never cached
/// here; only membership facts (side, fled, snapshot initiative, designated
/// opponent) live on the entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CombatantStatus {
    /// Able to act this round.
    Alive,
    /// Vitality at or below zero; skipped as an actor, still targetable.
    Incapacitated,
    /// Dead, or no longer known to the registry.
    Dead,
    /// Escaped the fight.
    Fled,
}

/// Per-combatant transient membership state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantEntry {
    /// Team membership.
    pub side: Side,
    /// Initiative stat, snapshotted when the combatant joined. Mid-combat
    /// stat changes are not modeled.
    pub initiative: i32,
    /// The opponent a synthesized default attack goes after.
    pub opponent: Option<ParticipantId>,
    /// Whether this combatant escaped.
    pub fled: bool,
}

// =============================================================================
// Instance
// =============================================================================

/// One ongoing fight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatInstance {
    id: CombatId,
    state: CombatState,
    /// Room the instance was opened in. Informational: logged on room
    /// mismatch, never authoritative for the melee guard.
    room: RoomId,
    combatants: BTreeMap<ParticipantId, CombatantEntry>,
    round_number: u64,
    round_length_ticks: u64,
    next_round_tick: u64,
    queue: ActionQueue,
}

impl CombatInstance {
    /// Opens an empty instance. The first round is due one full round
    /// length after `now_tick`.
    #[must_use]
    pub fn open(id: CombatId, room: RoomId, now_tick: u64, round_length_ticks: u64) -> Self {
        Self {
            id,
            state: CombatState::Active,
            room,
            combatants: BTreeMap::new(),
            round_number: 0,
            round_length_ticks,
            next_round_tick: now_tick + round_length_ticks,
            queue: ActionQueue::new(),
        }
    }

    /// The instance id.
    #[must_use]
    pub fn id(&self) -> CombatId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CombatState {
        self.state
    }

    /// Whether rounds still execute and actions may be enqueued.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == CombatState::Active
    }

    /// The room the instance was opened in (informational).
    #[must_use]
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Rounds completed so far. Starts at 0, only increases.
    #[must_use]
    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    /// Ticks between rounds; constant for the life of the instance.
    #[must_use]
    pub fn round_length_ticks(&self) -> u64 {
        self.round_length_ticks
    }

    /// Absolute tick the next round executes at.
    #[must_use]
    pub fn next_round_tick(&self) -> u64 {
        self.next_round_tick
    }

    /// Whether a round is due at `now_tick`.
    #[must_use]
    pub fn is_due(&self, now_tick: u64) -> bool {
        self.is_active() && now_tick >= self.next_round_tick
    }

    /// Advances round bookkeeping after a round executed.
    pub(crate) fn advance_round(&mut self) {
        self.round_number += 1;
        self.next_round_tick += self.round_length_ticks;
    }

    /// `Active → Ending`. No-op from any other state.
    pub(crate) fn begin_ending(&mut self) {
        if self.state == CombatState::Active {
            self.state = CombatState::Ending;
        }
    }

    /// `→ Ended`. No-op if already ended.
    pub(crate) fn finish(&mut self) {
        self.state = CombatState::Ended;
    }

    /// Adds a combatant on `side` with a snapshot initiative.
    pub(crate) fn add_combatant(&mut self, id: ParticipantId, side: Side, initiative: i32) {
        self.combatants.insert(
            id,
            CombatantEntry {
                side,
                initiative,
                opponent: None,
                fled: false,
            },
        );
    }

    /// Re-designates a combatant's default-attack opponent.
    pub(crate) fn set_opponent(&mut self, id: ParticipantId, opponent: ParticipantId) {
        if let Some(entry) = self.combatants.get_mut(&id) {
            entry.opponent = Some(opponent);
        }
    }

    /// Marks a combatant fled and drops their pending action.
    pub(crate) fn mark_fled(&mut self, id: ParticipantId) {
        if let Some(entry) = self.combatants.get_mut(&id) {
            entry.fled = true;
        }
        self.queue.purge(id);
    }

    /// Membership entry for one combatant.
    #[must_use]
    pub fn entry(&self, id: ParticipantId) -> Option<&CombatantEntry> {
        self.combatants.get(&id)
    }

    /// Whether a participant belongs to this instance.
    #[must_use]
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.combatants.contains_key(&id)
    }

    /// Participant ids in ascending order.
    #[must_use]
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.combatants.keys().copied().collect()
    }

    /// `(id, snapshot initiative)` pairs for the initiative ordering.
    #[must_use]
    pub fn initiative_pairs(&self) -> Vec<(ParticipantId, i32)> {
        self.combatants
            .iter()
            .map(|(id, e)| (*id, e.initiative))
            .collect()
    }

    /// The action queue for this instance.
    #[must_use]
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Mutable access for enqueue/drain/purge.
    pub(crate) fn queue_mut(&mut self) -> &mut ActionQueue {
        &mut self.queue
    }

    /// This round's view of a combatant, combining membership (fled) with
    /// the registry's current vitality status.
    #[must_use]
    pub fn combatant_status(
        &self,
        id: ParticipantId,
        registry: &ParticipantRegistry,
    ) -> CombatantStatus {
        let Some(entry) = self.combatants.get(&id) else {
            return CombatantStatus::Dead;
        };
        if entry.fled {
            return CombatantStatus::Fled;
        }
        match registry.get(id).map(|s| s.status) {
            Some(VitalityStatus::Dead) | None => CombatantStatus::Dead,
            Some(VitalityStatus::Incapacitated) => CombatantStatus::Incapacitated,
            Some(VitalityStatus::Healthy | VitalityStatus::Critical) => CombatantStatus::Alive,
        }
    }

    /// Sides that still have at least one living, non-fled combatant.
    /// Incapacitated counts as living: the fight stays open until one side
    /// is dead or gone.
    #[must_use]
    pub fn standing_sides(&self, registry: &ParticipantRegistry) -> Vec<Side> {
        let mut sides: Vec<Side> = self
            .combatants
            .keys()
            .filter(|id| {
                matches!(
                    self.combatant_status(**id, registry),
                    CombatantStatus::Alive | CombatantStatus::Incapacitated
                )
            })
            .map(|id| self.combatants[id].side)
            .collect();
        sides.sort_unstable();
        sides.dedup();
        sides
    }

    /// Deterministic default-attack target for `actor`: the designated
    /// opponent while they remain targetable, otherwise the lowest-id
    /// enemy who is. Incapacitated enemies remain valid targets.
    #[must_use]
    pub fn default_target(
        &self,
        actor: ParticipantId,
        registry: &ParticipantRegistry,
    ) -> Option<ParticipantId> {
        let entry = self.combatants.get(&actor)?;

        let targetable = |id: ParticipantId| {
            matches!(
                self.combatant_status(id, registry),
                CombatantStatus::Alive | CombatantStatus::Incapacitated
            )
        };

        if let Some(opponent) = entry.opponent {
            if targetable(opponent) {
                return Some(opponent);
            }
        }

        // BTreeMap iteration: lowest id wins, so retargeting is replayable.
        self.combatants
            .iter()
            .filter(|(id, e)| e.side != entry.side && targetable(**id))
            .map(|(id, _)| *id)
            .next()
    }
}
