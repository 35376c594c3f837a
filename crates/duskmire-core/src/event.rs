//! Outbound combat notifications.
//!
//! The core is synchronous per round; anything other subsystems need to see
//! (chat announcements, reward observers, telemetry) is placed on this
//! queue at well-defined points — combat start, damage application, death,
//! termination — and drained asynchronously by the embedding server. No
//! callbacks reach into the round loop.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::CombatId;
use crate::participant::ParticipantId;

/// Why a force-end was requested from outside the combat core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceEndReason {
    /// A disconnected participant's grace period expired.
    DisconnectGraceExpired,
    /// An administrator ended the fight.
    AdminOverride,
}

/// Why a combat instance ended. Carried on the termination event for
/// observability.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Only one side still had living, non-fled participants.
    LastSideStanding,
    /// A melee action failed the room-consistency check.
    RoomMismatch,
    /// External force-end.
    Forced(ForceEndReason),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastSideStanding => write!(f, "last-side-standing"),
            Self::RoomMismatch => write!(f, "room-mismatch"),
            Self::Forced(ForceEndReason::DisconnectGraceExpired) => write!(f, "disconnect"),
            Self::Forced(ForceEndReason::AdminOverride) => write!(f, "admin-override"),
        }
    }
}

/// A combat notification, stamped with the tick it was emitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// A new instance opened.
    CombatStarted {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// The initiating attacker.
        attacker: ParticipantId,
        /// The initial defender.
        defender: ParticipantId,
    },
    /// Damage landed.
    DamageDealt {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// Round the action resolved in.
        round: u64,
        /// Who dealt it.
        attacker: ParticipantId,
        /// Who took it.
        target: ParticipantId,
        /// Final damage after mitigation.
        amount: i32,
        /// Target vitality after the hit.
        vitality_after: i32,
    },
    /// Healing landed.
    HealingApplied {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// Round the action resolved in.
        round: u64,
        /// Who provided it.
        healer: ParticipantId,
        /// Who received it.
        target: ParticipantId,
        /// Vitality restored.
        amount: i32,
    },
    /// A participant dropped to zero or below and fell prone.
    ParticipantIncapacitated {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// Who fell.
        participant: ParticipantId,
    },
    /// A participant died.
    ParticipantDied {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// Who died.
        victim: ParticipantId,
        /// Whose action killed them.
        killer: ParticipantId,
    },
    /// A participant escaped the fight.
    ParticipantFled {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// Who fled.
        participant: ParticipantId,
    },
    /// Experience was dispatched to a player.
    ExperienceGranted {
        /// Receiving player.
        player: ParticipantId,
        /// Amount granted.
        amount: u32,
        /// Human-readable reason ("killed_rat").
        reason: String,
    },
    /// An instance terminated. Always the final event for its combat id.
    CombatEnded {
        /// The instance.
        combat: CombatId,
        /// Emission tick.
        tick: u64,
        /// Why it ended.
        reason: TerminationReason,
    },
}

/// FIFO queue of combat notifications.
///
/// The engine pushes during round execution; observers drain between ticks.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<CombatEvent>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&mut self, event: CombatEvent) {
        self.events.push_back(event);
    }

    /// Removes and returns all queued events in emission order.
    pub fn drain(&mut self) -> Vec<CombatEvent> {
        self.events.drain(..).collect()
    }

    /// Number of undrained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
