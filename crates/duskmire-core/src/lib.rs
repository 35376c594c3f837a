//! # Duskmire Core
//!
//! Round-based combat core for Duskmire, a real-time multiplayer text game.
//!
//! This crate turns player and NPC actions into ordered, timed, consistent
//! combat outcomes. It is an in-process engine: its boundary is function
//! calls and drained events, not a wire protocol.
//!
//! ## Architecture
//!
//! - **Registry**: [`participant::ParticipantRegistry`] owns the minimal
//!   combat-relevant snapshot of every player and NPC.
//! - **Instances**: [`instance::CombatInstance`] is the per-fight aggregate
//!   (participants, rounds, queued actions), created and terminated only by
//!   the [`lifecycle::CombatLifecycleManager`].
//! - **Scheduler**: the game clock calls
//!   [`engine::CombatEngine::process_tick`] once per tick; due instances
//!   execute one round each, sequentially, in initiative order.
//! - **Resolution**: [`damage`] is a pure resolution path shared by players
//!   and NPCs; [`room`] guards the same-room melee invariant; [`reward`]
//!   dispatches exactly-once kill experience.
//! - **Events**: everything observable leaves through
//!   [`event::EventQueue`], drained by the embedding server.
//!
//! ## Determinism
//!
//! Same seed + same inputs ⇒ same rounds. Initiative ties break by
//! participant id, storage is `BTreeMap`, and all rolls come from a
//! master-seeded RNG.
//!
//! ## Usage
//!
//! See [`engine::CombatEngine`] for a worked example: construct the engine
//! with your collaborator hooks, register participants, start a fight, and
//! drive it with `process_tick`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod config;
pub mod damage;
pub mod engine;
pub mod error;
pub mod event;
pub mod hooks;
pub mod initiative;
pub mod instance;
pub mod lifecycle;
pub mod participant;
pub mod reward;
pub mod room;

mod scheduler;

#[cfg(test)]
mod tests;

pub use action::{AbilityPayload, Action, ActionQueue};
pub use config::CombatConfig;
pub use damage::{DamageType, WeaponProfile};
pub use engine::CombatEngine;
pub use error::CombatError;
pub use event::{CombatEvent, ForceEndReason, TerminationReason};
pub use hooks::{ArmoryHook, ProgressionHook, WorldHook};
pub use instance::{CombatId, CombatInstance, CombatState, Side};
pub use lifecycle::CombatLifecycleManager;
pub use participant::{
    ParticipantId, ParticipantKind, ParticipantRegistry, ParticipantSnapshot, Posture,
    VitalityStatus,
};
pub use room::RoomId;
