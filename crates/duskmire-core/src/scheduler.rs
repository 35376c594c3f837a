//! Tick processing and round execution.
//!
//! The game clock drives [`process_tick`] once per tick with the absolute
//! tick number. Every Active instance whose `next_round_tick` has arrived
//! executes one round; the scan is O(active combats) and instances are
//! processed sequentially in ascending id order, so no two rounds of any
//! instance ever run concurrently and tick output is replayable.
//!
//! # Round execution
//!
//! Within a round, actions resolve strictly in initiative order:
//!
//! 1. Compute the acting order from snapshot initiatives.
//! 2. Drain the action queue; actors with no entry get a synthesized
//!    default attack against their designated opponent.
//! 3. Skip actors who cannot act (incapacitated, dead, fled).
//! 4. Melee actions re-validate rooms against the world collaborator. A
//!    mismatch terminates the combat and stops the round — once the room
//!    invariant breaks the instance is no longer coherent, so no further
//!    actions resolve.
//! 5. Damage applies through the registry (which runs the vitality
//!    threshold machine atomically); a death invokes the reward pipeline
//!    and then the termination check.
//!
//! Nothing from action validation escapes this module as an error: an
//! invalid action (target gone, already dead) is a no-op for the round.

use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::action::Action;
use crate::config::CombatConfig;
use crate::damage::{self, AttackSource, DamageType};
use crate::event::{CombatEvent, EventQueue, TerminationReason};
use crate::hooks::{ArmoryHook, WorldHook};
use crate::initiative;
use crate::instance::{CombatInstance, CombatantStatus};
use crate::lifecycle::CombatLifecycleManager;
use crate::participant::{ParticipantId, ParticipantRegistry};
use crate::reward::RewardPipeline;
use crate::room;

/// Everything a round needs besides the instance itself. Borrowed from the
/// engine for the duration of one tick.
pub(crate) struct RoundContext<'a> {
    pub registry: &'a mut ParticipantRegistry,
    pub config: &'a CombatConfig,
    pub rng: &'a mut ChaCha8Rng,
    pub armory: &'a dyn ArmoryHook,
    pub world: &'a dyn WorldHook,
    pub rewards: &'a mut RewardPipeline,
    pub events: &'a mut EventQueue,
    pub now_tick: u64,
}

/// What a round left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    /// The round completed; the next one is scheduled.
    Continued,
    /// The combat terminated mid-round for this reason.
    Terminated(TerminationReason),
}

/// Runs all due rounds for `now_tick`, then flushes pending reward
/// retries.
pub(crate) fn process_tick(
    now_tick: u64,
    lifecycle: &mut CombatLifecycleManager,
    ctx: &mut RoundContext<'_>,
) {
    for id in lifecycle.due_combats(now_tick) {
        let outcome = {
            let Some(instance) = lifecycle.get_mut(id) else {
                continue;
            };
            let outcome = execute_round(instance, ctx);
            if outcome == RoundOutcome::Continued {
                instance.advance_round();
            }
            outcome
        };
        if let RoundOutcome::Terminated(reason) = outcome {
            lifecycle.end_combat(id, reason, now_tick, ctx.registry, ctx.events);
        }
    }

    ctx.rewards
        .flush_retries(ctx.config.reward_retry_limit, ctx.events);
}

/// Executes one round of one instance.
pub(crate) fn execute_round(
    instance: &mut CombatInstance,
    ctx: &mut RoundContext<'_>,
) -> RoundOutcome {
    let acting_order = initiative::order(&instance.initiative_pairs());
    let mut actions = instance.queue_mut().drain_for_round();

    debug!(
        combat = %instance.id(),
        round = instance.round_number(),
        actors = acting_order.len(),
        "executing round"
    );

    for actor in acting_order {
        if instance.combatant_status(actor, ctx.registry) != CombatantStatus::Alive {
            continue;
        }

        let action = actions.remove(&actor).unwrap_or_else(|| {
            match instance.default_target(actor, ctx.registry) {
                Some(target) => Action::Attack { target },
                None => Action::Idle,
            }
        });

        let termination = match action {
            Action::Idle => None,
            Action::Attack { target } => {
                let source = match ctx.armory.equipped_weapon(actor) {
                    Some(weapon) => AttackSource::Weapon(weapon),
                    None => AttackSource::Unarmed {
                        base: ctx.config.unarmed_base_damage,
                    },
                };
                resolve_offensive(instance, ctx, actor, target, source, None)
            }
            Action::Queued { target, payload } => {
                if payload.beneficial {
                    resolve_beneficial(instance, ctx, actor, target, payload.power);
                    None
                } else {
                    let source = AttackSource::Unarmed {
                        base: payload.power,
                    };
                    resolve_offensive(
                        instance,
                        ctx,
                        actor,
                        target,
                        source,
                        Some(payload.damage_type),
                    )
                }
            }
        };

        if let Some(reason) = termination {
            instance.begin_ending();
            return RoundOutcome::Terminated(reason);
        }
    }

    RoundOutcome::Continued
}

/// Resolves one harmful action. Returns a termination reason when the
/// round must stop (room mismatch, or the fight is decided).
fn resolve_offensive(
    instance: &mut CombatInstance,
    ctx: &mut RoundContext<'_>,
    actor: ParticipantId,
    target: ParticipantId,
    source: AttackSource,
    damage_type_override: Option<DamageType>,
) -> Option<TerminationReason> {
    match instance.combatant_status(target, ctx.registry) {
        CombatantStatus::Alive | CombatantStatus::Incapacitated => {}
        CombatantStatus::Dead | CombatantStatus::Fled => {
            debug!(%actor, %target, "attack target is gone; action dropped");
            return None;
        }
    }

    // Aggression re-designates the attacker's default opponent.
    instance.set_opponent(actor, target);

    let damage_type = damage_type_override.unwrap_or_else(|| source.damage_type());
    if damage_type.is_melee() && !melee_rooms_match(instance, ctx, actor, target) {
        return Some(TerminationReason::RoomMismatch);
    }

    // One roll per action; a blocked attack above never got this far.
    let base_roll = source.roll_base(ctx.rng);
    let final_damage = {
        let Some(attacker) = ctx.registry.get(actor) else {
            return None;
        };
        let Some(victim) = ctx.registry.get(target) else {
            return None;
        };
        damage::resolve(attacker, victim, base_roll, source.modifier(), damage_type)
    };

    let Ok(report) = ctx.registry.apply_damage(target, final_damage, ctx.config) else {
        return None;
    };

    ctx.events.push(CombatEvent::DamageDealt {
        combat: instance.id(),
        tick: ctx.now_tick,
        round: instance.round_number(),
        attacker: actor,
        target,
        amount: final_damage,
        vitality_after: report.vitality_after,
    });

    if report.became_incapacitated() {
        ctx.events.push(CombatEvent::ParticipantIncapacitated {
            combat: instance.id(),
            tick: ctx.now_tick,
            participant: target,
        });
    }

    if report.became_dead() {
        ctx.events.push(CombatEvent::ParticipantDied {
            combat: instance.id(),
            tick: ctx.now_tick,
            victim: target,
            killer: actor,
        });
        ctx.rewards
            .on_participant_death(actor, target, ctx.registry, ctx.events);

        if instance.standing_sides(ctx.registry).len() <= 1 {
            return Some(TerminationReason::LastSideStanding);
        }
    }

    None
}

/// Resolves a beneficial queued action. Legal against Incapacitated
/// targets; a dead or fled target makes it a no-op.
fn resolve_beneficial(
    instance: &CombatInstance,
    ctx: &mut RoundContext<'_>,
    actor: ParticipantId,
    target: ParticipantId,
    power: i32,
) {
    match instance.combatant_status(target, ctx.registry) {
        CombatantStatus::Alive | CombatantStatus::Incapacitated => {}
        CombatantStatus::Dead | CombatantStatus::Fled => {
            debug!(%actor, %target, "beneficial target is gone; action dropped");
            return;
        }
    }

    let Ok(report) = ctx.registry.apply_healing(target, power, ctx.config) else {
        return;
    };

    ctx.events.push(CombatEvent::HealingApplied {
        combat: instance.id(),
        tick: ctx.now_tick,
        round: instance.round_number(),
        healer: actor,
        target,
        amount: report.vitality_after - report.vitality_before,
    });
}

/// Re-reads both rooms from the world collaborator and runs the melee
/// guard. A participant the world no longer places anywhere fails the
/// guard the same way a mismatch does.
fn melee_rooms_match(
    instance: &CombatInstance,
    ctx: &RoundContext<'_>,
    actor: ParticipantId,
    target: ParticipantId,
) -> bool {
    let (Some(attacker_room), Some(target_room)) = (
        ctx.world.current_room(actor),
        ctx.world.current_room(target),
    ) else {
        debug!(%actor, %target, "participant unplaced in world; treating as room mismatch");
        return false;
    };
    room::validate_melee(&attacker_room, &target_room, instance.room())
}
