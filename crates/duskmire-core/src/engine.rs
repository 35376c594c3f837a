//! The combat engine facade.
//!
//! `CombatEngine` owns the registry, the lifecycle manager, the reward
//! pipeline, the outbound event queue, and a master-seeded RNG, and exposes
//! the surface the rest of the server talks to: start/end combat, enqueue
//! actions, the movement guard, and the per-tick entry point. It is an
//! explicit value constructed by the embedding server and passed by handle —
//! never module-level state.
//!
//! # Determinism
//!
//! Given the same seed, the same registry contents, and the same sequence
//! of calls, the engine produces identical rounds, damage values, and
//! events. All iteration is over `BTreeMap`s and all rolls come from the
//! seeded RNG.
//!
//! # Example
//!
//! ```
//! use duskmire_core::engine::CombatEngine;
//! use duskmire_core::config::CombatConfig;
//! use duskmire_core::hooks::{ArmoryHook, ProgressionHook, WorldHook};
//! use duskmire_core::damage::WeaponProfile;
//! use duskmire_core::participant::{ParticipantId, ParticipantSnapshot};
//! use duskmire_core::reward::RewardError;
//! use duskmire_core::room::RoomId;
//!
//! struct Unarmed;
//! impl ArmoryHook for Unarmed {
//!     fn equipped_weapon(&self, _: ParticipantId) -> Option<WeaponProfile> { None }
//! }
//! struct OneRoom;
//! impl WorldHook for OneRoom {
//!     fn current_room(&self, _: ParticipantId) -> Option<RoomId> { Some(RoomId::new("pit")) }
//! }
//! struct NoXp;
//! impl ProgressionHook for NoXp {
//!     fn grant_experience(&mut self, _: ParticipantId, _: u32, _: &str) -> Result<(), RewardError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut engine = CombatEngine::new(
//!     CombatConfig::default(),
//!     42,
//!     Box::new(Unarmed),
//!     Box::new(OneRoom),
//!     Box::new(NoXp),
//! );
//!
//! let hero = ParticipantId::new(1);
//! let rat = ParticipantId::new(2);
//! engine.registry_mut().insert(ParticipantSnapshot::player(hero, RoomId::new("pit"), 20, 90));
//! engine.registry_mut().insert(ParticipantSnapshot::npc(rat, RoomId::new("pit"), 10, 40, 5));
//!
//! engine.start_combat(hero, rat).unwrap();
//! assert!(engine.is_in_combat(hero));
//!
//! engine.process_tick(100); // first round
//! assert!(!engine.drain_events().is_empty());
//! ```

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::action::Action;
use crate::config::CombatConfig;
use crate::error::CombatError;
use crate::event::{CombatEvent, EventQueue, ForceEndReason, TerminationReason};
use crate::hooks::{ArmoryHook, ProgressionHook, WorldHook};
use crate::instance::{CombatId, CombatInstance, Side};
use crate::lifecycle::CombatLifecycleManager;
use crate::participant::{ParticipantId, ParticipantRegistry};
use crate::reward::RewardPipeline;
use crate::scheduler::{self, RoundContext};

/// The round-based combat core.
pub struct CombatEngine {
    config: CombatConfig,
    registry: ParticipantRegistry,
    lifecycle: CombatLifecycleManager,
    rewards: RewardPipeline,
    events: EventQueue,
    rng: ChaCha8Rng,
    armory: Box<dyn ArmoryHook>,
    world: Box<dyn WorldHook>,
    master_seed: u64,
    tick: u64,
}

impl std::fmt::Debug for CombatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatEngine")
            .field("tick", &self.tick)
            .field("combats", &self.lifecycle.len())
            .field("participants", &self.registry.len())
            .field("master_seed", &self.master_seed)
            .finish_non_exhaustive()
    }
}

impl CombatEngine {
    /// Creates an engine with injected collaborators and a master seed for
    /// reproducible damage rolls.
    #[must_use]
    pub fn new(
        config: CombatConfig,
        seed: u64,
        armory: Box<dyn ArmoryHook>,
        world: Box<dyn WorldHook>,
        progression: Box<dyn ProgressionHook>,
    ) -> Self {
        Self {
            config,
            registry: ParticipantRegistry::new(),
            lifecycle: CombatLifecycleManager::new(),
            rewards: RewardPipeline::new(progression),
            events: EventQueue::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            armory,
            world,
            master_seed: seed,
            tick: 0,
        }
    }

    /// The participant registry.
    #[must_use]
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// Mutable registry access for setup and for the movement/persistence
    /// glue's narrow setters.
    pub fn registry_mut(&mut self) -> &mut ParticipantRegistry {
        &mut self.registry
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// The master seed the RNG was built from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.master_seed
    }

    /// The last tick handed to [`process_tick`](Self::process_tick).
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Read-only movement guard. Movement (player and NPC alike) must
    /// refuse to move a participant while this returns true.
    #[must_use]
    pub fn is_in_combat(&self, participant: ParticipantId) -> bool {
        self.registry.is_in_combat(participant)
    }

    /// The combat a participant is engaged in, if any.
    #[must_use]
    pub fn get_combat_for(&self, participant: ParticipantId) -> Option<CombatId> {
        self.lifecycle.get_combat_for(participant)
    }

    /// Looks up a live instance.
    #[must_use]
    pub fn combat(&self, id: CombatId) -> Option<&CombatInstance> {
        self.lifecycle.get(id)
    }

    /// Starts a fight between `a` and `b`.
    ///
    /// The combat room is read from the world collaborator (falling back
    /// to `a`'s cached room if the world cannot place them yet).
    ///
    /// # Errors
    ///
    /// [`CombatError::AlreadyInCombat`] or
    /// [`CombatError::UnknownParticipant`].
    pub fn start_combat(
        &mut self,
        a: ParticipantId,
        b: ParticipantId,
    ) -> Result<CombatId, CombatError> {
        let room = match self.world.current_room(a) {
            Some(room) => room,
            None => self
                .registry
                .get(a)
                .ok_or(CombatError::UnknownParticipant(a))?
                .room
                .clone(),
        };
        self.lifecycle.start_combat(
            a,
            b,
            room,
            self.tick,
            &self.config,
            &mut self.registry,
            &mut self.events,
        )
    }

    /// Adds a participant to an existing fight on the given side.
    ///
    /// # Errors
    ///
    /// See [`CombatLifecycleManager::join_combat`].
    pub fn join_combat(
        &mut self,
        combat_id: CombatId,
        participant: ParticipantId,
        side: Side,
    ) -> Result<(), CombatError> {
        self.lifecycle
            .join_combat(combat_id, participant, side, &mut self.registry)
    }

    /// Terminates a fight. Idempotent.
    pub fn end_combat(&mut self, combat_id: CombatId, reason: TerminationReason) -> bool {
        self.lifecycle.end_combat(
            combat_id,
            reason,
            self.tick,
            &mut self.registry,
            &mut self.events,
        )
    }

    /// External force-end (disconnect grace expiry, admin override).
    /// Cooperative: the engine is between rounds whenever command handlers
    /// run, so the request takes effect immediately and never interrupts a
    /// half-applied round.
    pub fn force_end(&mut self, combat_id: CombatId, reason: ForceEndReason) -> bool {
        self.end_combat(combat_id, TerminationReason::Forced(reason))
    }

    /// Registers `participant`'s action for the next round of `combat_id`,
    /// replacing any earlier one.
    ///
    /// An incapacitated participant's action is dropped silently: they
    /// cannot act until healed above zero.
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownCombat`], [`CombatError::CombatNotActive`],
    /// or [`CombatError::UnknownParticipant`] when the participant is not
    /// a member of that combat.
    pub fn enqueue_action(
        &mut self,
        combat_id: CombatId,
        participant: ParticipantId,
        action: Action,
    ) -> Result<(), CombatError> {
        let can_act = self
            .registry
            .get(participant)
            .is_some_and(|s| s.status.can_act());
        let instance = self
            .lifecycle
            .get_mut(combat_id)
            .ok_or(CombatError::UnknownCombat(combat_id))?;
        if !instance.is_active() {
            return Err(CombatError::CombatNotActive(combat_id));
        }
        if !instance.contains(participant) {
            return Err(CombatError::UnknownParticipant(participant));
        }
        if !can_act {
            debug!(%participant, "cannot act; queued action dropped");
            return Ok(());
        }
        instance.queue_mut().enqueue(participant, action);
        Ok(())
    }

    /// Marks a participant as having fled their fight. Called by the
    /// movement glue once a flee attempt succeeds; a participant in no
    /// fight is a no-op.
    ///
    /// Clears the in-combat flag, drops any pending action, and ends the
    /// fight if only one side remains.
    pub fn mark_fled(&mut self, participant: ParticipantId) {
        let Some(combat_id) = self.lifecycle.get_combat_for(participant) else {
            return;
        };
        let standing = {
            let Some(instance) = self.lifecycle.get_mut(combat_id) else {
                return;
            };
            instance.mark_fled(participant);
            instance.standing_sides(&self.registry)
        };

        self.lifecycle.release_participant(participant);
        self.registry.set_in_combat(participant, false);
        self.events.push(CombatEvent::ParticipantFled {
            combat: combat_id,
            tick: self.tick,
            participant,
        });

        if standing.len() <= 1 {
            self.end_combat(combat_id, TerminationReason::LastSideStanding);
        }
    }

    /// Advances the engine to `now_tick`: executes every due round and
    /// flushes pending reward retries. Called once per game tick by the
    /// server's clock driver.
    pub fn process_tick(&mut self, now_tick: u64) {
        self.tick = now_tick;
        let mut ctx = RoundContext {
            registry: &mut self.registry,
            config: &self.config,
            rng: &mut self.rng,
            armory: self.armory.as_ref(),
            world: self.world.as_ref(),
            rewards: &mut self.rewards,
            events: &mut self.events,
            now_tick,
        };
        scheduler::process_tick(now_tick, &mut self.lifecycle, &mut ctx);
    }

    /// Removes and returns all pending combat events in emission order.
    /// Consumed by chat/announcement and reward observers between ticks.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    /// Number of grants awaiting out-of-band retry (observability).
    #[must_use]
    pub fn pending_reward_retries(&self) -> usize {
        self.rewards.pending_retries()
    }
}
