//! Participant identity, combat-relevant state, and the registry that owns it.
//!
//! The combat core never reaches into the wider game's character model. It
//! works against a [`ParticipantSnapshot`]: the minimal slice of a player or
//! NPC that rounds need (room, vitality, posture, initiative, in-combat
//! flag). Snapshots live in the [`ParticipantRegistry`] and are mutated only
//! through its named setters — no component outside combat writes vitality,
//! posture, or the in-combat flag directly.
//!
//! # Vitality state machine
//!
//! `Healthy → Critical → Incapacitated → Dead`, driven exclusively by
//! [`ParticipantRegistry::apply_damage`] and
//! [`ParticipantRegistry::apply_healing`]:
//!
//! - Damage that lands vitality at or below zero incapacitates, and the
//!   same call sets posture to Prone. No observer can see vitality ≤ 0
//!   with the participant still Standing.
//! - Damage that lands vitality at or below the configured death threshold
//!   (overkill) kills. Dead is terminal.
//! - Healing above zero lifts incapacitation and stands the participant
//!   back up; healing never raises the dead.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CombatConfig;
use crate::error::CombatError;
use crate::room::RoomId;

// =============================================================================
// Identity
// =============================================================================

/// Unique identifier for a combat participant (player or NPC).
///
/// A newtype over `u64`; ordering follows the numeric value, which the rest
/// of the core relies on for deterministic iteration and tie-breaking.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(u64);

impl ParticipantId {
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

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Whether a participant is controlled by a player session or by the game.
///
/// The distinction matters in exactly one place inside the core: the reward
/// pipeline grants experience only for player-kills-NPC.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantKind {
    /// Controlled by a connected (or grace-period) player session.
    Player,
    /// Server-controlled mob.
    Npc,
}

// =============================================================================
// Posture and vitality
// =============================================================================

/// Physical stance. Mechanically linked to combat: incapacitation forces
/// Prone, recovery restores Standing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Posture {
    /// Upright and able to fight.
    Standing,
    /// Seated (resting, crafting); not set by combat itself.
    Sitting,
    /// On the ground. Forced by incapacitation.
    Prone,
}

/// Vitality-derived condition of a participant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VitalityStatus {
    /// Above the critical floor.
    Healthy,
    /// Low but positive vitality.
    Critical,
    /// Vitality at or below zero. Cannot act, remains a valid target.
    Incapacitated,
    /// Terminal. Reached only by overkill past the death threshold.
    Dead,
}

impl VitalityStatus {
    /// Whether a participant in this state can queue and execute actions.
    #[must_use]
    pub fn can_act(self) -> bool {
        matches!(self, Self::Healthy | Self::Critical)
    }
}

/// The before/after view of a single damage or healing application.
///
/// Both writes happen inside one registry call, so the report is the only
/// way transitions are observed — there is no window where vitality and
/// status disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VitalityReport {
    /// Vitality before the change.
    pub vitality_before: i32,
    /// Vitality after the change (may be negative: overkill).
    pub vitality_after: i32,
    /// Status before the change.
    pub status_before: VitalityStatus,
    /// Status after the change.
    pub status_after: VitalityStatus,
}

impl VitalityReport {
    /// True when this application crossed into Incapacitated.
    #[must_use]
    pub fn became_incapacitated(&self) -> bool {
        self.status_before != VitalityStatus::Incapacitated
            && self.status_after == VitalityStatus::Incapacitated
    }

    /// True when this application crossed into Dead.
    #[must_use]
    pub fn became_dead(&self) -> bool {
        self.status_before != VitalityStatus::Dead && self.status_after == VitalityStatus::Dead
    }

    /// True when healing lifted the participant out of incapacitation.
    #[must_use]
    pub fn recovered(&self) -> bool {
        self.status_before == VitalityStatus::Incapacitated && self.status_after.can_act()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The combat-relevant slice of one participant.
///
/// `room` is a cached copy refreshed by the movement glue via
/// [`ParticipantRegistry::set_room`]; the round executor re-reads rooms from
/// the world collaborator each round rather than trusting this cache for the
/// melee guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    /// The participant's id.
    pub id: ParticipantId,
    /// Player or NPC.
    pub kind: ParticipantKind,
    /// Last known room.
    pub room: RoomId,
    /// Current vitality. Negative values represent overkill.
    pub vitality_current: i32,
    /// Vitality ceiling.
    pub vitality_max: i32,
    /// Physical stance.
    pub posture: Posture,
    /// Derived condition; kept consistent with `vitality_current` by the
    /// registry's apply calls.
    pub status: VitalityStatus,
    /// Initiative stat; snapshotted into an instance at combat start.
    pub initiative: i32,
    /// Offensive ability score (attack scaling).
    pub strength: i32,
    /// Defensive ability score (mitigation scaling).
    pub resilience: i32,
    /// Whether this participant is a member of an active combat instance.
    pub in_combat: bool,
    /// Configured experience value for NPCs; 0 means unconfigured and is
    /// reported as a data warning by the reward pipeline, never an error.
    pub reward_value: u32,
    /// Exactly-once latch for the reward pipeline, set on the death
    /// transition.
    pub reward_dispatched: bool,
}

impl ParticipantSnapshot {
    /// Creates a player snapshot at full vitality, Standing, out of combat.
    #[must_use]
    pub fn player(id: ParticipantId, room: RoomId, vitality_max: i32, initiative: i32) -> Self {
        Self::new(id, ParticipantKind::Player, room, vitality_max, initiative)
    }

    /// Creates an NPC snapshot with a configured experience reward.
    #[must_use]
    pub fn npc(
        id: ParticipantId,
        room: RoomId,
        vitality_max: i32,
        initiative: i32,
        reward_value: u32,
    ) -> Self {
        let mut s = Self::new(id, ParticipantKind::Npc, room, vitality_max, initiative);
        s.reward_value = reward_value;
        s
    }

    fn new(
        id: ParticipantId,
        kind: ParticipantKind,
        room: RoomId,
        vitality_max: i32,
        initiative: i32,
    ) -> Self {
        Self {
            id,
            kind,
            room,
            vitality_current: vitality_max,
            vitality_max,
            posture: Posture::Standing,
            status: VitalityStatus::Healthy,
            initiative,
            strength: 10,
            resilience: 10,
            in_combat: false,
            reward_value: 0,
            reward_dispatched: false,
        }
    }

    /// Sets the offensive ability score.
    #[must_use]
    pub fn with_strength(mut self, strength: i32) -> Self {
        self.strength = strength;
        self
    }

    /// Sets the defensive ability score.
    #[must_use]
    pub fn with_resilience(mut self, resilience: i32) -> Self {
        self.resilience = resilience;
        self
    }

    /// D&D-style ability modifier: `(score - 10) / 2`, truncated toward zero.
    #[must_use]
    pub fn ability_mod(score: i32) -> i32 {
        (score - 10) / 2
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Owner of all [`ParticipantSnapshot`]s known to the combat core.
///
/// Storage is a `BTreeMap` so iteration is deterministic (ascending id).
/// All mutation goes through named calls; in particular the vitality writes
/// in [`apply_damage`](Self::apply_damage) and
/// [`apply_healing`](Self::apply_healing) update vitality, status, and
/// posture as one logical update.
#[derive(Debug, Clone, Default)]
pub struct ParticipantRegistry {
    entries: BTreeMap<ParticipantId, ParticipantSnapshot>,
}

impl ParticipantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a snapshot.
    pub fn insert(&mut self, snapshot: ParticipantSnapshot) {
        self.entries.insert(snapshot.id, snapshot);
    }

    /// Removes a participant (disconnect cleanup, NPC despawn).
    pub fn remove(&mut self, id: ParticipantId) -> Option<ParticipantSnapshot> {
        self.entries.remove(&id)
    }

    /// Looks up a snapshot.
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantSnapshot> {
        self.entries.get(&id)
    }

    /// Read-only movement guard: movement must refuse to move a participant
    /// while this is true.
    #[must_use]
    pub fn is_in_combat(&self, id: ParticipantId) -> bool {
        self.entries.get(&id).is_some_and(|s| s.in_combat)
    }

    /// Number of registered participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates snapshots in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantSnapshot> {
        self.entries.values()
    }

    /// Sets the in-combat flag. Called by the lifecycle manager only.
    pub(crate) fn set_in_combat(&mut self, id: ParticipantId, value: bool) {
        if let Some(s) = self.entries.get_mut(&id) {
            s.in_combat = value;
        }
    }

    /// Updates the cached room after a confirmed move.
    pub fn set_room(&mut self, id: ParticipantId, room: RoomId) -> Result<(), CombatError> {
        let s = self
            .entries
            .get_mut(&id)
            .ok_or(CombatError::UnknownParticipant(id))?;
        s.room = room;
        Ok(())
    }

    /// Sets posture through the narrow setter the persistence glue uses.
    /// Combat-driven posture changes (Prone on incapacitation) happen inside
    /// the apply calls instead, atomically with the vitality write.
    pub fn set_posture(&mut self, id: ParticipantId, posture: Posture) -> Result<(), CombatError> {
        let s = self
            .entries
            .get_mut(&id)
            .ok_or(CombatError::UnknownParticipant(id))?;
        s.posture = posture;
        Ok(())
    }

    /// Applies damage and evaluates the vitality threshold machine.
    ///
    /// Vitality, status, and (on incapacitation or death) posture are
    /// written in this single call. Damage to a Dead participant is ignored.
    pub fn apply_damage(
        &mut self,
        id: ParticipantId,
        amount: i32,
        config: &CombatConfig,
    ) -> Result<VitalityReport, CombatError> {
        let s = self
            .entries
            .get_mut(&id)
            .ok_or(CombatError::UnknownParticipant(id))?;

        let status_before = s.status;
        let vitality_before = s.vitality_current;
        if status_before == VitalityStatus::Dead {
            return Ok(VitalityReport {
                vitality_before,
                vitality_after: vitality_before,
                status_before,
                status_after: status_before,
            });
        }

        s.vitality_current = vitality_before.saturating_sub(amount.max(0));
        let after = s.vitality_current;

        s.status = if after <= -config.death_threshold {
            VitalityStatus::Dead
        } else if after <= 0 {
            VitalityStatus::Incapacitated
        } else if after <= config.critical_floor(s.vitality_max) {
            VitalityStatus::Critical
        } else {
            VitalityStatus::Healthy
        };

        if !s.status.can_act() {
            s.posture = Posture::Prone;
        }

        if s.status != status_before {
            debug!(
                participant = %id,
                from = ?status_before,
                to = ?s.status,
                vitality = after,
                "vitality transition"
            );
        }

        Ok(VitalityReport {
            vitality_before,
            vitality_after: after,
            status_before,
            status_after: s.status,
        })
    }

    /// Applies healing, capped at max vitality.
    ///
    /// Healing that lifts vitality above zero clears incapacitation and
    /// restores Standing posture in the same call. Dead stays dead.
    pub fn apply_healing(
        &mut self,
        id: ParticipantId,
        amount: i32,
        config: &CombatConfig,
    ) -> Result<VitalityReport, CombatError> {
        let s = self
            .entries
            .get_mut(&id)
            .ok_or(CombatError::UnknownParticipant(id))?;

        let status_before = s.status;
        let vitality_before = s.vitality_current;
        if status_before == VitalityStatus::Dead {
            return Ok(VitalityReport {
                vitality_before,
                vitality_after: vitality_before,
                status_before,
                status_after: status_before,
            });
        }

        s.vitality_current = vitality_before
            .saturating_add(amount.max(0))
            .min(s.vitality_max);
        let after = s.vitality_current;

        s.status = if after <= 0 {
            VitalityStatus::Incapacitated
        } else if after <= config.critical_floor(s.vitality_max) {
            VitalityStatus::Critical
        } else {
            VitalityStatus::Healthy
        };

        if vitality_before <= 0 && after > 0 {
            s.posture = Posture::Standing;
        }

        Ok(VitalityReport {
            vitality_before,
            vitality_after: after,
            status_before,
            status_after: s.status,
        })
    }

    /// Claims the exactly-once reward latch for a death.
    ///
    /// Returns true only for the first claim after the death transition;
    /// any later claim (double-delivered death notification, replayed
    /// round) returns false and must not dispatch again.
    pub(crate) fn claim_reward_dispatch(&mut self, id: ParticipantId) -> bool {
        match self.entries.get_mut(&id) {
            Some(s) if !s.reward_dispatched => {
                s.reward_dispatched = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(max: i32) -> (ParticipantRegistry, ParticipantId, CombatConfig) {
        let mut reg = ParticipantRegistry::new();
        let id = ParticipantId::new(1);
        reg.insert(ParticipantSnapshot::player(
            id,
            RoomId::new("hall"),
            max,
            50,
        ));
        (reg, id, CombatConfig::default())
    }

    mod threshold_machine_tests {
        use super::*;

        #[test]
        fn damage_to_zero_incapacitates_and_knocks_prone() {
            let (mut reg, id, cfg) = registry_with(20);

            let report = reg.apply_damage(id, 20, &cfg).unwrap();
            assert!(report.became_incapacitated());

            let s = reg.get(id).unwrap();
            // Atomic: vitality, status and posture agree in one observable update.
            assert_eq!(s.vitality_current, 0);
            assert_eq!(s.status, VitalityStatus::Incapacitated);
            assert_eq!(s.posture, Posture::Prone);
        }

        #[test]
        fn overkill_past_threshold_kills() {
            let (mut reg, id, cfg) = registry_with(20);

            // 20 max + 10 threshold = 30 damage lands exactly at -10.
            let report = reg.apply_damage(id, 30, &cfg).unwrap();
            assert!(report.became_dead());
            assert_eq!(reg.get(id).unwrap().status, VitalityStatus::Dead);
            assert_eq!(reg.get(id).unwrap().posture, Posture::Prone);
        }

        #[test]
        fn shallow_overkill_incapacitates_only() {
            let (mut reg, id, cfg) = registry_with(20);

            let report = reg.apply_damage(id, 25, &cfg).unwrap();
            assert_eq!(report.vitality_after, -5);
            assert_eq!(report.status_after, VitalityStatus::Incapacitated);
            assert!(!report.became_dead());
        }

        #[test]
        fn low_vitality_is_critical() {
            let (mut reg, id, cfg) = registry_with(20);

            let report = reg.apply_damage(id, 16, &cfg).unwrap();
            // 4 <= ceil(20 * 0.25) = 5
            assert_eq!(report.status_after, VitalityStatus::Critical);
            assert_eq!(reg.get(id).unwrap().posture, Posture::Standing);
        }

        #[test]
        fn damage_to_dead_is_ignored() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 100, &cfg).unwrap();
            assert_eq!(reg.get(id).unwrap().status, VitalityStatus::Dead);

            let before = reg.get(id).unwrap().vitality_current;
            let report = reg.apply_damage(id, 10, &cfg).unwrap();
            assert_eq!(report.vitality_after, before);
            assert_eq!(report.status_after, VitalityStatus::Dead);
        }

        #[test]
        fn incapacitated_cannot_act_but_exists() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 22, &cfg).unwrap();

            let s = reg.get(id).unwrap();
            assert!(!s.status.can_act());
            // Still a valid lookup target.
            assert_eq!(s.id, id);
        }
    }

    mod healing_tests {
        use super::*;

        #[test]
        fn healing_above_zero_recovers_and_stands_up() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 23, &cfg).unwrap();

            let report = reg.apply_healing(id, 8, &cfg).unwrap();
            assert!(report.recovered());

            let s = reg.get(id).unwrap();
            assert_eq!(s.vitality_current, 5);
            assert_eq!(s.status, VitalityStatus::Critical);
            assert_eq!(s.posture, Posture::Standing);
        }

        #[test]
        fn healing_caps_at_max() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 5, &cfg).unwrap();

            let report = reg.apply_healing(id, 50, &cfg).unwrap();
            assert_eq!(report.vitality_after, 20);
            assert_eq!(report.status_after, VitalityStatus::Healthy);
        }

        #[test]
        fn healing_never_raises_the_dead() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 100, &cfg).unwrap();

            let report = reg.apply_healing(id, 1000, &cfg).unwrap();
            assert_eq!(report.status_after, VitalityStatus::Dead);
            assert_eq!(
                reg.get(id).unwrap().vitality_current,
                report.vitality_before
            );
        }

        #[test]
        fn partial_healing_leaves_incapacitated_prone() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 28, &cfg).unwrap(); // -8

            let report = reg.apply_healing(id, 5, &cfg).unwrap(); // -3
            assert_eq!(report.status_after, VitalityStatus::Incapacitated);
            assert_eq!(reg.get(id).unwrap().posture, Posture::Prone);
        }
    }

    mod reward_latch_tests {
        use super::*;

        #[test]
        fn latch_claims_exactly_once() {
            let (mut reg, id, cfg) = registry_with(20);
            reg.apply_damage(id, 100, &cfg).unwrap();

            assert!(reg.claim_reward_dispatch(id));
            assert!(!reg.claim_reward_dispatch(id));
        }

        #[test]
        fn latch_on_unknown_participant_is_false() {
            let mut reg = ParticipantRegistry::new();
            assert!(!reg.claim_reward_dispatch(ParticipantId::new(404)));
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn ability_mod_matches_score_table() {
            assert_eq!(ParticipantSnapshot::ability_mod(10), 0);
            assert_eq!(ParticipantSnapshot::ability_mod(16), 3);
            assert_eq!(ParticipantSnapshot::ability_mod(8), -1);
        }

        #[test]
        fn snapshots_serialize() {
            let s = ParticipantSnapshot::npc(
                ParticipantId::new(9),
                RoomId::new("sewer"),
                12,
                30,
                25,
            );
            let json = serde_json::to_string(&s).unwrap();
            let back: ParticipantSnapshot = serde_json::from_str(&json).unwrap();
            assert_eq!(s, back);
        }
    }
}
