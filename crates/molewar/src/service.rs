//! # The Game Service
//!
//! One object a transport layer talks to. It loads players through the
//! credential verifier, routes every mutation through the store's commit
//! boundary, and pushes throttled alerts out through the configured sink.
//!
//! ## Design principles
//!
//! 1. **Verify, then play** - no operation accepts a raw identity from the
//!    outside; callers hold a [`PlayerId`] only after `authenticate`
//! 2. **Rules inside the lock** - preconditions are re-checked inside the
//!    commit closure, so a snapshot going stale between check and commit
//!    cannot corrupt state
//! 3. **Alerts never block the game** - a failed delivery is a log line,
//!    not an error

use std::path::Path;
use std::sync::Arc;

use molewar_auth::verify;
use molewar_engine::{
    activate_shield, attack, record_loss, respawn, wack_self, AlertKind, AttackOutcome, Clock,
    EconomyError, GameConfig, NewPlayer, Player, PlayerId, Timestamp,
};
use molewar_store::PlayerStore;

use crate::dispatch::AlertSink;
use crate::error::GameResult;

/// The authenticated game-state transition service.
pub struct GameService {
    store: PlayerStore,
    config: GameConfig,
    secret: String,
    sink: Arc<dyn AlertSink>,
}

impl GameService {
    /// Opens the service over the journal at `journal_path`.
    ///
    /// # Errors
    ///
    /// Fails when the journal cannot be opened or replayed.
    pub fn open(
        journal_path: impl AsRef<Path>,
        secret: impl Into<String>,
        config: GameConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn AlertSink>,
    ) -> GameResult<Self> {
        let store = PlayerStore::open(journal_path, clock)?;
        Ok(Self {
            store,
            config,
            secret: secret.into(),
            sink,
        })
    }

    /// The active tuning.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Verifies a credential blob and returns the caller's aggregate,
    /// creating it on first sight.
    ///
    /// # Errors
    ///
    /// Authentication failures from the verifier, or a journal failure
    /// while persisting a first-seen player.
    pub fn authenticate(&self, credential_blob: &str) -> GameResult<Player> {
        let user = verify(credential_blob, &self.secret)?;
        let profile = NewPlayer {
            id: PlayerId::new(user.id.clone()),
            display_name: user.display_name(),
            avatar_url: user.photo_url.clone(),
        };
        let player = self
            .store
            .get_or_create(profile, self.config.starting_points)?;
        tracing::debug!(player = %player.id, "authenticated");
        Ok(player)
    }

    /// Snapshot of one player.
    ///
    /// # Errors
    ///
    /// [`crate::GameError::NotFound`] for an unknown identity.
    pub fn player(&self, id: &PlayerId) -> GameResult<Player> {
        Ok(self.store.get(id)?)
    }

    /// Every player, highest balance first.
    ///
    /// # Errors
    ///
    /// Journal failures while persisting lazy shield clears.
    pub fn roster(&self) -> GameResult<Vec<Player>> {
        let mut roster = self.store.players()?;
        roster.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.id.cmp(&b.id)));
        Ok(roster)
    }

    /// Wack your own animal for a small gain.
    ///
    /// # Errors
    ///
    /// Unknown identity, a dead player, or a journal failure.
    pub fn wack_self(&self, id: &PlayerId) -> GameResult<Player> {
        let config = &self.config;
        let (player, _) = self.store.commit(id, |player, _now| {
            wack_self(player, config)
        })?;
        tracing::debug!(player = %player.id, points = player.points, "self wack");
        Ok(player)
    }

    /// Attack another player, stealing up to the configured cap.
    ///
    /// The target's loss throttle is advanced inside the same commit; any
    /// resulting alert (or the death notice for a kill) is delivered
    /// best-effort after the commit lands.
    ///
    /// # Errors
    ///
    /// The first failing precondition: attacker dead, target unknown,
    /// self-target, target dead, target shielded. Or a journal failure.
    pub fn attack(&self, attacker: &PlayerId, target: &PlayerId) -> GameResult<AttackOutcome> {
        // Precondition priority: a dead attacker is reported before an
        // unknown or aliased target, which the pair commit alone cannot
        // order. Both are re-checked inside the lock.
        let snapshot = self.store.get(attacker)?;
        if !snapshot.alive {
            return Err(EconomyError::AttackerDead.into());
        }
        if attacker == target {
            return Err(EconomyError::SelfTarget.into());
        }

        let config = &self.config;
        let (_, target_after, (outcome, alert)) =
            self.store
                .commit_pair(attacker, target, |attacker, target, now| {
                    let outcome = attack(attacker, target, now, config)?;
                    let alert = if outcome.target_died {
                        None
                    } else {
                        let (counters, alert) =
                            record_loss(target.loss_counters(), outcome.stolen, now, config);
                        target.set_loss_counters(counters);
                        alert
                    };
                    Ok((outcome, alert))
                })?;

        tracing::info!(
            attacker = %attacker,
            target = %target,
            stolen = outcome.stolen,
            killed = outcome.target_died,
            "attack committed"
        );

        if outcome.target_died {
            self.dispatch(&target_after.id, AlertKind::DeathWarning);
        } else if let Some(kind) = alert {
            self.dispatch(&target_after.id, kind);
        }
        Ok(outcome)
    }

    /// Raise a shield, burning the configured cost.
    ///
    /// # Errors
    ///
    /// Unknown identity, insufficient balance, or a journal failure.
    pub fn activate_shield(&self, id: &PlayerId) -> GameResult<(Player, Timestamp)> {
        let config = &self.config;
        let (player, expiry) = self.store.commit(id, |player, now| {
            activate_shield(player, now, config)
        })?;
        tracing::info!(player = %player.id, expiry = expiry.as_millis(), "shield raised");
        Ok((player, expiry))
    }

    /// Respawn a dead player once the cooldown has elapsed.
    ///
    /// # Errors
    ///
    /// Unknown identity, a living player, an unfinished cooldown (with
    /// whole seconds remaining), or a journal failure.
    pub fn respawn(&self, id: &PlayerId) -> GameResult<Player> {
        let config = &self.config;
        let (player, ()) = self.store.commit(id, |player, now| {
            respawn(player, now, config)
        })?;
        tracing::info!(player = %player.id, "respawned");
        Ok(player)
    }

    /// Compacts the journal down to one record per player.
    ///
    /// # Errors
    ///
    /// Journal I/O failures.
    pub fn checkpoint(&self) -> GameResult<()> {
        self.store.checkpoint()?;
        Ok(())
    }

    fn dispatch(&self, player: &PlayerId, kind: AlertKind) {
        if let Err(err) = self.sink.deliver(player, kind) {
            tracing::warn!(player = %player, ?kind, %err, "alert delivery failed");
        }
    }
}
