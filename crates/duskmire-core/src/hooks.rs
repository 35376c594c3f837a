//! Collaborator interfaces the combat core consumes.
//!
//! Combat reads equipped-weapon stats, asks the world where a participant
//! currently is, and dispatches experience grants — and nothing more. The
//! embedding server implements these traits and injects them into the
//! engine; tests use in-memory fakes.

use crate::damage::WeaponProfile;
use crate::participant::ParticipantId;
use crate::reward::RewardError;
use crate::room::RoomId;

/// Inventory collaborator: equipped-weapon lookup.
pub trait ArmoryHook: Send + Sync {
    /// The participant's wielded weapon, or `None` for unarmed.
    fn equipped_weapon(&self, participant: ParticipantId) -> Option<WeaponProfile>;
}

/// World/movement collaborator: authoritative current room.
///
/// The round executor calls this fresh each round for the melee guard; the
/// registry's cached room is never trusted for that check. `None` means
/// the participant is not placed in the world (despawned mid-fight), which
/// the executor treats like a room mismatch.
pub trait WorldHook: Send + Sync {
    /// Where the participant is right now.
    fn current_room(&self, participant: ParticipantId) -> Option<RoomId>;
}

/// Progression/persistence collaborator: experience grants.
///
/// Must be fast and non-blocking; a failed grant is retried out of band by
/// the reward pipeline, so implementations should fail fast rather than
/// stall the round loop.
pub trait ProgressionHook: Send + Sync {
    /// Credits `amount` experience to `player`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError`] when the grant could not be recorded; the
    /// caller retries out of band.
    fn grant_experience(
        &mut self,
        player: ParticipantId,
        amount: u32,
        reason: &str,
    ) -> Result<(), RewardError>;
}
