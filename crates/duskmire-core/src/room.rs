//! Room identity and the melee room-consistency guard.
//!
//! Rooms are nodes in the world graph owned elsewhere; combat only compares
//! their ids. The guard is a pure predicate — the *caller* is obligated to
//! terminate the instance when it fails, because a combat between separated
//! participants is never left active.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Opaque world-room identifier.
///
/// Room ids are strings minted by the world graph (`"tavern"`,
/// `"sewer:03"`); combat treats them as opaque and only tests equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room id from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Decides whether a melee action may proceed.
///
/// True only when attacker and target occupy the same room. `combat_room`
/// is informational (it names the room the instance was opened in) and is
/// logged on mismatch, never consulted for the decision.
///
/// On a false return the caller must end the combat instance with a
/// room-mismatch reason — skipping the action and leaving the instance
/// alive would keep a stale combat between separated participants.
///
/// # Example
///
/// ```
/// use duskmire_core::room::{validate_melee, RoomId};
///
/// let tavern = RoomId::new("tavern");
/// let cellar = RoomId::new("cellar");
/// assert!(validate_melee(&tavern, &tavern, &tavern));
/// assert!(!validate_melee(&tavern, &cellar, &tavern));
/// ```
#[must_use]
pub fn validate_melee(attacker_room: &RoomId, target_room: &RoomId, combat_room: &RoomId) -> bool {
    if attacker_room == target_room {
        true
    } else {
        warn!(
            attacker_room = %attacker_room,
            target_room = %target_room,
            combat_room = %combat_room,
            "melee room mismatch"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_room_passes() {
        let r = RoomId::new("gate");
        assert!(validate_melee(&r, &r.clone(), &r));
    }

    #[test]
    fn split_rooms_fail_regardless_of_combat_room() {
        let a = RoomId::new("gate");
        let b = RoomId::new("yard");
        // combat_room matching the attacker must not rescue the check
        assert!(!validate_melee(&a, &b, &a));
        assert!(!validate_melee(&a, &b, &b));
    }

    #[test]
    fn room_ids_compare_by_content() {
        assert_eq!(RoomId::new("gate"), RoomId::from("gate".to_string()));
        assert_ne!(RoomId::new("gate"), RoomId::new("Gate"));
    }
}
