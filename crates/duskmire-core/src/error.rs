//! Error taxonomy for the combat core.
//!
//! Only locally-recoverable conditions are errors. A room-consistency
//! violation is deliberately *not* represented here: it is a first-class
//! termination outcome (see [`crate::event::TerminationReason`]), never an
//! exception. Reward dispatch failures live in [`crate::reward`] and are
//! logged and retried out of band rather than propagated.

use thiserror::Error;

use crate::instance::CombatId;
use crate::participant::ParticipantId;

/// Errors surfaced by the public combat surface.
///
/// None of these propagate through the tick processor. They are returned
/// synchronously to command handlers (e.g. "you are already fighting") and
/// the round loop converts anything invalid into a no-op for the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CombatError {
    /// Start requested for a participant that is already engaged.
    #[error("participant {0} is already in combat")]
    AlreadyInCombat(ParticipantId),

    /// An action was enqueued against an instance that is Ending or Ended.
    #[error("combat {0} is not active")]
    CombatNotActive(CombatId),

    /// No instance with this id exists (ended and removed, or never started).
    #[error("unknown combat {0}")]
    UnknownCombat(CombatId),

    /// The participant id is not present in the registry.
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),
}
