//! Damage resolution.
//!
//! One resolution path for everyone: player weapon swings, NPC natural
//! attacks, and queued offensive abilities all flow through [`resolve`], so
//! there are no asymmetric rules to drift apart. Weapon base damage is a
//! single uniform roll in `[min, max]` made once per action — a blocked or
//! retried action never re-rolls.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::participant::ParticipantSnapshot;

/// Classification of harm, used for mitigation and the melee room guard.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    /// Edged melee damage.
    Slash,
    /// Point melee damage.
    Pierce,
    /// Crushing melee damage; also the unarmed default.
    Blunt,
    /// Magical damage. Not melee: exempt from the room guard and from
    /// resilience mitigation.
    Arcane,
}

impl DamageType {
    /// Whether this damage type requires attacker and target to share a
    /// room.
    #[must_use]
    pub fn is_melee(self) -> bool {
        matches!(self, Self::Slash | Self::Pierce | Self::Blunt)
    }
}

/// Equipped-weapon stats as read from the inventory collaborator.
///
/// Combat only reads these; equipping, durability, and item identity are
/// inventory's problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponProfile {
    /// Minimum base damage (inclusive).
    pub min_damage: i32,
    /// Maximum base damage (inclusive).
    pub max_damage: i32,
    /// Flat bonus added after the roll.
    pub modifier: i32,
    /// The weapon's damage type.
    pub damage_type: DamageType,
}

/// Where an attack's base damage comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackSource {
    /// An equipped weapon: base is rolled in `[min, max]`.
    Weapon(WeaponProfile),
    /// No weapon: a configured constant base, Blunt, no modifier.
    Unarmed {
        /// The constant base damage.
        base: i32,
    },
}

impl AttackSource {
    /// Rolls the base damage exactly once.
    pub fn roll_base<R: Rng>(&self, rng: &mut R) -> i32 {
        match *self {
            Self::Weapon(w) => {
                debug_assert!(w.min_damage <= w.max_damage);
                rng.gen_range(w.min_damage..=w.max_damage)
            }
            Self::Unarmed { base } => base,
        }
    }

    /// The flat modifier contributed by the source.
    #[must_use]
    pub fn modifier(&self) -> i32 {
        match self {
            Self::Weapon(w) => w.modifier,
            Self::Unarmed { .. } => 0,
        }
    }

    /// The source's damage type.
    #[must_use]
    pub fn damage_type(&self) -> DamageType {
        match self {
            Self::Weapon(w) => w.damage_type,
            Self::Unarmed { .. } => DamageType::Blunt,
        }
    }
}

/// Stat scaling applied on top of the base roll.
///
/// Melee damage scales up with the attacker's strength and down with the
/// target's resilience; arcane damage keeps the strength contribution but
/// bypasses resilience entirely.
#[must_use]
pub fn stat_scaling(
    attacker: &ParticipantSnapshot,
    target: &ParticipantSnapshot,
    damage_type: DamageType,
) -> i32 {
    let offense = ParticipantSnapshot::ability_mod(attacker.strength);
    if damage_type.is_melee() {
        offense - ParticipantSnapshot::ability_mod(target.resilience)
    } else {
        offense
    }
}

/// Computes the final damage of one resolved action.
///
/// `final = max(0, base_roll + modifier + stat_scaling)`. The floor is
/// zero, not one: a sufficiently mitigated hit simply does nothing.
/// Applying the result to the target's vitality is the registry's job so
/// the threshold machine runs atomically with the write.
#[must_use]
pub fn resolve(
    attacker: &ParticipantSnapshot,
    target: &ParticipantSnapshot,
    base_roll: i32,
    modifier: i32,
    damage_type: DamageType,
) -> i32 {
    let raw = base_roll + modifier + stat_scaling(attacker, target, damage_type);
    raw.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;
    use crate::room::RoomId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fighter(id: u64, strength: i32, resilience: i32) -> ParticipantSnapshot {
        ParticipantSnapshot::player(ParticipantId::new(id), RoomId::new("pit"), 30, 50)
            .with_strength(strength)
            .with_resilience(resilience)
    }

    #[test]
    fn melee_types_require_same_room() {
        assert!(DamageType::Slash.is_melee());
        assert!(DamageType::Pierce.is_melee());
        assert!(DamageType::Blunt.is_melee());
        assert!(!DamageType::Arcane.is_melee());
    }

    #[test]
    fn weapon_roll_stays_in_band() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let src = AttackSource::Weapon(WeaponProfile {
            min_damage: 3,
            max_damage: 9,
            modifier: 2,
            damage_type: DamageType::Slash,
        });
        for _ in 0..200 {
            let roll = src.roll_base(&mut rng);
            assert!((3..=9).contains(&roll));
        }
    }

    #[test]
    fn unarmed_base_is_constant() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let src = AttackSource::Unarmed { base: 2 };
        for _ in 0..5 {
            assert_eq!(src.roll_base(&mut rng), 2);
        }
        assert_eq!(src.modifier(), 0);
        assert_eq!(src.damage_type(), DamageType::Blunt);
    }

    #[test]
    fn same_function_for_symmetric_fighters() {
        let a = fighter(1, 14, 10);
        let b = fighter(2, 14, 10);
        // Identical stats in both directions resolve identically.
        assert_eq!(
            resolve(&a, &b, 5, 1, DamageType::Slash),
            resolve(&b, &a, 5, 1, DamageType::Slash)
        );
    }

    #[test]
    fn strength_raises_and_resilience_lowers_melee() {
        let strong = fighter(1, 16, 10);
        let tough = fighter(2, 10, 16);
        let plain = fighter(3, 10, 10);

        assert_eq!(resolve(&strong, &plain, 4, 0, DamageType::Blunt), 7);
        assert_eq!(resolve(&plain, &tough, 4, 0, DamageType::Blunt), 1);
    }

    #[test]
    fn arcane_bypasses_resilience() {
        let caster = fighter(1, 10, 10);
        let tough = fighter(2, 10, 18);

        assert_eq!(resolve(&caster, &tough, 6, 0, DamageType::Arcane), 6);
        assert_eq!(resolve(&caster, &tough, 6, 0, DamageType::Blunt), 2);
    }

    #[test]
    fn final_damage_floors_at_zero() {
        let weak = fighter(1, 4, 10);
        let tough = fighter(2, 10, 20);
        assert_eq!(resolve(&weak, &tough, 1, 0, DamageType::Pierce), 0);
    }
}
