//! Collaborator fakes and factory functions for combat tests.
//!
//! The fakes hand out clonable handles (`Arc<Mutex<..>>`) so a test can
//! keep mutating world placement or inspecting grants after the engine has
//! taken ownership of its boxed hooks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::config::CombatConfig;
use crate::damage::WeaponProfile;
use crate::engine::CombatEngine;
use crate::hooks::{ArmoryHook, ProgressionHook, WorldHook};
use crate::participant::{ParticipantId, ParticipantSnapshot};
use crate::reward::RewardError;
use crate::room::RoomId;

// =============================================================================
// Collaborator fakes
// =============================================================================

/// World placement fake. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct TestWorld {
    rooms: Arc<Mutex<BTreeMap<ParticipantId, RoomId>>>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts (or moves) a participant in a room.
    pub fn place(&self, participant: ParticipantId, room: &str) {
        self.rooms
            .lock()
            .unwrap()
            .insert(participant, RoomId::new(room));
    }

    /// Removes a participant from the world entirely.
    pub fn unplace(&self, participant: ParticipantId) {
        self.rooms.lock().unwrap().remove(&participant);
    }
}

impl WorldHook for TestWorld {
    fn current_room(&self, participant: ParticipantId) -> Option<RoomId> {
        self.rooms.lock().unwrap().get(&participant).cloned()
    }
}

/// Equipped-weapon fake. Participants without an entry fight unarmed.
#[derive(Clone, Default)]
pub struct TestArmory {
    weapons: Arc<Mutex<BTreeMap<ParticipantId, WeaponProfile>>>,
}

impl TestArmory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, participant: ParticipantId, weapon: WeaponProfile) {
        self.weapons.lock().unwrap().insert(participant, weapon);
    }
}

impl ArmoryHook for TestArmory {
    fn equipped_weapon(&self, participant: ParticipantId) -> Option<WeaponProfile> {
        self.weapons.lock().unwrap().get(&participant).copied()
    }
}

/// Records every experience grant; can be told to fail the next N calls.
#[derive(Clone, Default)]
pub struct TestProgression {
    grants: Arc<Mutex<Vec<(ParticipantId, u32, String)>>>,
    fail_next: Arc<Mutex<u32>>,
}

impl TestProgression {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded grants in dispatch order.
    pub fn grants(&self) -> Vec<(ParticipantId, u32, String)> {
        self.grants.lock().unwrap().clone()
    }

    /// Makes the next `n` grant calls fail.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock().unwrap() = n;
    }
}

impl ProgressionHook for TestProgression {
    fn grant_experience(
        &mut self,
        player: ParticipantId,
        amount: u32,
        reason: &str,
    ) -> Result<(), RewardError> {
        let mut remaining = self.fail_next.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RewardError("progression store unavailable".into()));
        }
        self.grants
            .lock()
            .unwrap()
            .push((player, amount, reason.to_string()));
        Ok(())
    }
}

// =============================================================================
// Engine factories
// =============================================================================

/// Handles kept by a test after the engine takes the boxed hooks.
pub struct TestHandles {
    pub world: TestWorld,
    pub armory: TestArmory,
    pub progression: TestProgression,
}

/// Builds an engine with fresh fakes and the default config.
pub fn test_engine(seed: u64) -> (CombatEngine, TestHandles) {
    test_engine_with_config(seed, CombatConfig::default())
}

/// Builds an engine with fresh fakes and an explicit config.
pub fn test_engine_with_config(seed: u64, config: CombatConfig) -> (CombatEngine, TestHandles) {
    let world = TestWorld::new();
    let armory = TestArmory::new();
    let progression = TestProgression::new();

    let engine = CombatEngine::new(
        config,
        seed,
        Box::new(armory.clone()),
        Box::new(world.clone()),
        Box::new(progression.clone()),
    );

    (
        engine,
        TestHandles {
            world,
            armory,
            progression,
        },
    )
}

/// Registers a player at full vitality and places them in the world.
pub fn add_player(
    engine: &mut CombatEngine,
    handles: &TestHandles,
    id: u64,
    room: &str,
    vitality: i32,
    initiative: i32,
) -> ParticipantId {
    let pid = ParticipantId::new(id);
    engine.registry_mut().insert(ParticipantSnapshot::player(
        pid,
        RoomId::new(room),
        vitality,
        initiative,
    ));
    handles.world.place(pid, room);
    pid
}

/// Registers an NPC with a configured kill reward and places it.
pub fn add_npc(
    engine: &mut CombatEngine,
    handles: &TestHandles,
    id: u64,
    room: &str,
    vitality: i32,
    initiative: i32,
    reward: u32,
) -> ParticipantId {
    let pid = ParticipantId::new(id);
    engine.registry_mut().insert(ParticipantSnapshot::npc(
        pid,
        RoomId::new(room),
        vitality,
        initiative,
        reward,
    ));
    handles.world.place(pid, room);
    pid
}
