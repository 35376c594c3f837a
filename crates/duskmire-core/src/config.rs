//! Combat tuning knobs.
//!
//! The embedding server constructs one [`CombatConfig`] and hands it to the
//! engine; nothing in the core reads configuration from globals or the
//! environment.

use serde::{Deserialize, Serialize};

/// Tunable parameters for combat resolution.
///
/// Defaults match the shipped game balance: a round every 100 ticks
/// (10 real seconds at the 100 ms tick), bare-hands damage of 2, and death
/// at 10 points of overkill past incapacitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Ticks between rounds of a single combat instance. Constant for the
    /// life of each instance; changing it only affects new instances.
    pub round_length_ticks: u64,
    /// Base damage for participants with no equipped weapon.
    pub unarmed_base_damage: i32,
    /// Overkill depth at which Incapacitated becomes Dead: vitality at or
    /// below `-death_threshold` kills outright.
    pub death_threshold: i32,
    /// Fraction of max vitality at or below which a participant counts as
    /// Critical.
    pub critical_fraction: f32,
    /// How many out-of-band retries a failed experience grant gets before
    /// it is dropped with a warning.
    pub reward_retry_limit: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            round_length_ticks: 100,
            unarmed_base_damage: 2,
            death_threshold: 10,
            critical_fraction: 0.25,
            reward_retry_limit: 3,
        }
    }
}

impl CombatConfig {
    /// Vitality at or below this value (but above zero) is Critical.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn critical_floor(&self, vitality_max: i32) -> i32 {
        let scaled = f64::from(vitality_max) * f64::from(self.critical_fraction);
        scaled.ceil() as i32
    }
}
