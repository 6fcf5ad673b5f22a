//! # Economy Transitions
//!
//! The four pure state transitions of the game. Each checks its
//! preconditions in priority order - the first failure is the reported
//! error - and only then mutates. Callers run transitions on cloned
//! snapshots inside the store's commit boundary, so a returned error
//! never leaves partial state behind.
//!
//! The attack transition must be applied through the store's pair commit:
//! serializing on the target identity is what makes `points >= 0` an
//! invariant rather than a clamp under concurrent attacks.

use crate::config::GameConfig;
use crate::error::{EconomyError, EconomyResult};
use crate::player::Player;
use crate::time::Timestamp;

/// Result of one successful attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttackOutcome {
    /// Attacker balance after the transfer.
    pub attacker_points: u64,
    /// Target balance after the transfer.
    pub target_points: u64,
    /// Whether the attack killed the target.
    pub target_died: bool,
    /// Points actually moved (capped at the target's balance).
    pub stolen: u64,
}

/// Wack your own animal: +`self_wack_gain` points.
///
/// # Errors
///
/// [`EconomyError::AttackerDead`] if the player is dead.
pub fn wack_self(player: &mut Player, config: &GameConfig) -> EconomyResult<u64> {
    if !player.alive {
        return Err(EconomyError::AttackerDead);
    }
    player.points = player.points.saturating_add(config.self_wack_gain);
    Ok(player.points)
}

/// Attack another player, stealing up to `steal_cap` points.
///
/// Preconditions, in order: attacker alive, distinct identities, target
/// alive, target unshielded. (Target existence is the store's concern; by
/// the time both aggregates are in hand it already holds.)
///
/// If the transfer empties the target, the target dies at `now`.
///
/// # Errors
///
/// The first failing precondition as an [`EconomyError`].
pub fn attack(
    attacker: &mut Player,
    target: &mut Player,
    now: Timestamp,
    config: &GameConfig,
) -> EconomyResult<AttackOutcome> {
    if !attacker.alive {
        return Err(EconomyError::AttackerDead);
    }
    if attacker.id == target.id {
        return Err(EconomyError::SelfTarget);
    }
    if !target.alive {
        return Err(EconomyError::TargetDead);
    }
    if target.shield_active(now) {
        return Err(EconomyError::TargetProtected);
    }

    let stolen = config.steal_cap.min(target.points);
    target.points -= stolen;
    attacker.points = attacker.points.saturating_add(stolen);

    let target_died = target.points == 0;
    if target_died {
        target.alive = false;
        target.died_at = Some(now);
    }

    Ok(AttackOutcome {
        attacker_points: attacker.points,
        target_points: target.points,
        target_died,
        stolen,
    })
}

/// Raise a shield for `shield_duration_secs`, burning `shield_cost` points.
///
/// The balance must be strictly above the cost. There is deliberately no
/// aliveness check here.
///
/// # Errors
///
/// [`EconomyError::InsufficientPoints`] when `points <= shield_cost`.
pub fn activate_shield(
    player: &mut Player,
    now: Timestamp,
    config: &GameConfig,
) -> EconomyResult<Timestamp> {
    if player.points <= config.shield_cost {
        return Err(EconomyError::InsufficientPoints {
            required: config.shield_cost,
        });
    }
    player.points -= config.shield_cost;
    let expiry = now.plus_millis(config.shield_duration_millis());
    player.shield_expires_at = Some(expiry);
    Ok(expiry)
}

/// Respawn a dead player after the cooldown.
///
/// Restores the starting balance and zeroes the loss window.
///
/// # Errors
///
/// [`EconomyError::AlreadyAlive`] for living players,
/// [`EconomyError::RespawnTooSoon`] (with whole seconds remaining, rounded
/// up) before the cooldown has elapsed.
pub fn respawn(player: &mut Player, now: Timestamp, config: &GameConfig) -> EconomyResult<()> {
    if player.alive {
        return Err(EconomyError::AlreadyAlive);
    }
    // Invariant 2 guarantees died_at is set for a dead player; a missing
    // value would mean corrupted state, treated as cooldown start = epoch.
    let died_at = player.died_at.unwrap_or_default();
    let elapsed_ms = now.millis_since(died_at);
    let cooldown_ms = config.respawn_cooldown_millis();
    if elapsed_ms < cooldown_ms {
        let remaining_ms = cooldown_ms - elapsed_ms;
        return Err(EconomyError::RespawnTooSoon {
            remaining_seconds: remaining_ms.div_ceil(1000),
        });
    }

    player.points = config.starting_points;
    player.alive = true;
    player.died_at = None;
    player.points_lost_in_window = 0;
    Ok(())
}
