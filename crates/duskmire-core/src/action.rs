//! Combat actions and the per-instance action queue.
//!
//! Actions are a closed tagged enum, matched exhaustively by the round
//! executor — a new action kind is a compiler-enforced addition, not a
//! string dispatched at runtime. A participant holds at most one pending
//! action for the next round; enqueuing replaces, never appends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::damage::DamageType;
use crate::participant::ParticipantId;

/// Opaque payload of a queued ability or command.
///
/// Ability *content* (spell lists, cooldowns, resource costs) lives outside
/// the combat core; by the time an ability reaches the queue it has been
/// resolved down to a power, a damage type, and whether it helps or harms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityPayload {
    /// Display name ("smite", "mend"); the embedding server uses it when
    /// rendering combat output, the core never interprets it.
    pub name: String,
    /// Base power before stat scaling. Fixed, not rolled.
    pub power: i32,
    /// Damage type; decides whether the melee room guard applies.
    pub damage_type: DamageType,
    /// Beneficial payloads heal their target instead of harming it, and
    /// are legal against Incapacitated targets.
    pub beneficial: bool,
}

/// One participant's intent for the next round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Basic weapon (or unarmed) attack against a target.
    Attack {
        /// The participant being attacked.
        target: ParticipantId,
    },
    /// A queued ability or command resolved against a target.
    Queued {
        /// The participant the payload applies to.
        target: ParticipantId,
        /// What to do to them.
        payload: AbilityPayload,
    },
    /// Explicitly do nothing this round.
    Idle,
}

impl Action {
    /// The target this action resolves against, if any.
    #[must_use]
    pub fn target(&self) -> Option<ParticipantId> {
        match self {
            Self::Attack { target } | Self::Queued { target, .. } => Some(*target),
            Self::Idle => None,
        }
    }
}

/// Pending actions for one combat instance.
///
/// At most one entry per participant; [`enqueue`](Self::enqueue) overwrites
/// any earlier intent for the same round. The executor drains the whole
/// queue at the top of a round and synthesizes default attacks for
/// participants with no entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionQueue {
    pending: BTreeMap<ParticipantId, Action>,
}

impl ActionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` as `participant`'s intent for the next round,
    /// replacing any earlier one.
    pub fn enqueue(&mut self, participant: ParticipantId, action: Action) {
        self.pending.insert(participant, action);
    }

    /// Whether a participant has a pending action.
    #[must_use]
    pub fn has_pending(&self, participant: ParticipantId) -> bool {
        self.pending.contains_key(&participant)
    }

    /// Returns and clears all pending actions.
    pub fn drain_for_round(&mut self) -> BTreeMap<ParticipantId, Action> {
        std::mem::take(&mut self.pending)
    }

    /// Drops a single participant's pending action (flee, death, leave).
    pub fn purge(&mut self, participant: ParticipantId) {
        self.pending.remove(&participant);
    }

    /// Drops everything (combat termination).
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no actions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u64) -> ParticipantId {
        ParticipantId::new(n)
    }

    #[test]
    fn enqueue_overwrites_not_appends() {
        let mut q = ActionQueue::new();
        q.enqueue(pid(1), Action::Attack { target: pid(2) });
        q.enqueue(pid(1), Action::Idle);

        assert_eq!(q.len(), 1);
        let drained = q.drain_for_round();
        assert_eq!(drained.get(&pid(1)), Some(&Action::Idle));
    }

    #[test]
    fn drain_clears_the_queue() {
        let mut q = ActionQueue::new();
        q.enqueue(pid(1), Action::Attack { target: pid(2) });
        q.enqueue(pid(2), Action::Attack { target: pid(1) });

        let drained = q.drain_for_round();
        assert_eq!(drained.len(), 2);
        assert!(q.is_empty());
        assert!(!q.has_pending(pid(1)));
    }

    #[test]
    fn purge_removes_one_participant_only() {
        let mut q = ActionQueue::new();
        q.enqueue(pid(1), Action::Idle);
        q.enqueue(pid(2), Action::Idle);

        q.purge(pid(1));
        assert!(!q.has_pending(pid(1)));
        assert!(q.has_pending(pid(2)));
    }

    #[test]
    fn action_target_is_exhaustive() {
        assert_eq!(Action::Idle.target(), None);
        assert_eq!(
            Action::Attack { target: pid(5) }.target(),
            Some(pid(5))
        );
    }
}
