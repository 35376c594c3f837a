//! Experience rewards on participant death.
//!
//! The pipeline dispatches exactly one grant per death, keyed off the
//! registry's reward latch — the latch is set on the death transition, so a
//! double-delivered death notification cannot double-grant, and nobody
//! re-derives "dead" from vitality here. Misconfigured rewards (a valid NPC
//! with no configured value) are a logged data warning, never a crash: the
//! fight must not fail because content data is wrong.
//!
//! Grant dispatch is fire-and-confirm: a failed grant is queued and retried
//! out of band by the tick processor with a bounded number of attempts, and the
//! round loop never waits on it.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::event::{CombatEvent, EventQueue};
use crate::hooks::ProgressionHook;
use crate::participant::{ParticipantId, ParticipantKind, ParticipantRegistry};

/// Failure to record an experience grant with the progression collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("experience dispatch failed: {0}")]
pub struct RewardError(pub String);

/// A grant that failed dispatch and is awaiting retry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingGrant {
    player: ParticipantId,
    amount: u32,
    reason: String,
    attempts: u32,
}

/// Computes and dispatches kill rewards.
pub struct RewardPipeline {
    progression: Box<dyn ProgressionHook>,
    retries: VecDeque<PendingGrant>,
}

impl std::fmt::Debug for RewardPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardPipeline")
            .field("retries", &self.retries.len())
            .finish_non_exhaustive()
    }
}

impl RewardPipeline {
    /// Creates a pipeline dispatching through `progression`.
    #[must_use]
    pub fn new(progression: Box<dyn ProgressionHook>) -> Self {
        Self {
            progression,
            retries: VecDeque::new(),
        }
    }

    /// Handles one death notification.
    ///
    /// Grants experience only for player-kills-NPC, and only if this call
    /// wins the victim's reward latch. Safe to invoke more than once for
    /// the same death; later calls are no-ops.
    pub fn on_participant_death(
        &mut self,
        killer: ParticipantId,
        victim: ParticipantId,
        registry: &mut ParticipantRegistry,
        events: &mut EventQueue,
    ) {
        let killer_is_player = registry
            .get(killer)
            .is_some_and(|s| s.kind == ParticipantKind::Player);
        let victim_reward = match registry.get(victim) {
            Some(s) if s.kind == ParticipantKind::Npc => Some(s.reward_value),
            _ => None,
        };
        if !killer_is_player {
            return;
        }
        let Some(amount) = victim_reward else {
            return;
        };

        if !registry.claim_reward_dispatch(victim) {
            debug!(%victim, "reward already dispatched for this death");
            return;
        }

        if amount == 0 {
            warn!(%victim, "NPC has no configured reward value; granting nothing");
            return;
        }

        let reason = format!("killed_{victim}");
        self.dispatch(killer, amount, reason, 0, events);
    }

    /// Retries failed grants. Called by the tick processor between rounds;
    /// grants that exhaust `retry_limit` attempts are dropped with a
    /// warning.
    pub fn flush_retries(&mut self, retry_limit: u32, events: &mut EventQueue) {
        let pending: Vec<PendingGrant> = self.retries.drain(..).collect();
        for grant in pending {
            if grant.attempts >= retry_limit {
                warn!(
                    player = %grant.player,
                    amount = grant.amount,
                    "dropping experience grant after {} failed attempts",
                    grant.attempts
                );
                continue;
            }
            self.dispatch(
                grant.player,
                grant.amount,
                grant.reason,
                grant.attempts,
                events,
            );
        }
    }

    /// Number of grants awaiting retry.
    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    fn dispatch(
        &mut self,
        player: ParticipantId,
        amount: u32,
        reason: String,
        prior_attempts: u32,
        events: &mut EventQueue,
    ) {
        match self.progression.grant_experience(player, amount, &reason) {
            Ok(()) => {
                events.push(CombatEvent::ExperienceGranted {
                    player,
                    amount,
                    reason,
                });
            }
            Err(e) => {
                warn!(%player, amount, error = %e, "experience dispatch failed; queued for retry");
                self.retries.push_back(PendingGrant {
                    player,
                    amount,
                    reason,
                    attempts: prior_attempts + 1,
                });
            }
        }
    }
}
