//! # The Player Aggregate
//!
//! One aggregate per verified external identity. Players are created on
//! first sight and never deleted; death is a state, not removal.
//!
//! ## Invariants
//!
//! 1. `points` is non-negative by construction (`u64`).
//! 2. `alive == false` exactly when `points == 0` and `died_at` is set.
//! 3. Shield activity is a computed view of `now < shield_expires_at`;
//!    the stored field is cleared lazily by the store on access.
//! 4. The identity never changes after creation.

use serde::{Deserialize, Serialize};

use crate::throttle::LossCounters;
use crate::time::Timestamp;

/// Stable external identity key addressing one player aggregate.
///
/// The value is the stringified numeric id from the verified credential.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an already-verified identity string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile fields for a player seen for the first time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPlayer {
    /// Verified identity.
    pub id: PlayerId,
    /// Cosmetic display name.
    pub display_name: String,
    /// Optional avatar image URL.
    pub avatar_url: Option<String>,
}

/// One player's full game state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Immutable identity key.
    pub id: PlayerId,
    /// Cosmetic display name.
    pub display_name: String,
    /// Optional avatar image URL.
    pub avatar_url: Option<String>,
    /// Current point balance.
    pub points: u64,
    /// Whether the player's animal is alive.
    pub alive: bool,
    /// When the player died; set iff `alive` is false.
    pub died_at: Option<Timestamp>,
    /// When the current shield lapses, if one was ever raised.
    pub shield_expires_at: Option<Timestamp>,
    /// Points lost inside the current alert window.
    pub points_lost_in_window: u64,
    /// When the last loss alert fired for this player.
    pub last_notified_at: Option<Timestamp>,
    /// When the aggregate was created.
    pub created_at: Timestamp,
}

impl Player {
    /// Creates the default aggregate for a first-seen identity.
    #[must_use]
    pub fn create(profile: NewPlayer, starting_points: u64, now: Timestamp) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
            points: starting_points,
            alive: true,
            died_at: None,
            shield_expires_at: None,
            points_lost_in_window: 0,
            last_notified_at: None,
            created_at: now,
        }
    }

    /// Whether a shield protects this player at `now`.
    ///
    /// Never trust a stored flag: this is the only truth about shields.
    #[inline]
    #[must_use]
    pub fn shield_active(&self, now: Timestamp) -> bool {
        matches!(self.shield_expires_at, Some(expiry) if now < expiry)
    }

    /// Clears a lapsed shield. Returns true when the stored field changed
    /// (the caller persists the clear as part of the same access).
    pub fn expire_shield(&mut self, now: Timestamp) -> bool {
        match self.shield_expires_at {
            Some(expiry) if now >= expiry => {
                self.shield_expires_at = None;
                true
            }
            _ => false,
        }
    }

    /// The throttle counters carried on this aggregate.
    #[inline]
    #[must_use]
    pub fn loss_counters(&self) -> LossCounters {
        LossCounters {
            points_lost_in_window: self.points_lost_in_window,
            last_notified_at: self.last_notified_at,
        }
    }

    /// Writes updated throttle counters back onto the aggregate.
    pub fn set_loss_counters(&mut self, counters: LossCounters) {
        self.points_lost_in_window = counters.points_lost_in_window;
        self.last_notified_at = counters.last_notified_at;
    }

    /// Checks the death invariant (`alive == false ⇔ points == 0 ∧ died_at`).
    #[must_use]
    pub fn death_state_consistent(&self) -> bool {
        if self.alive {
            self.died_at.is_none()
        } else {
            self.points == 0 && self.died_at.is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(id: &str) -> Player {
        Player::create(
            NewPlayer {
                id: PlayerId::new(id),
                display_name: format!("mole-{id}"),
                avatar_url: None,
            },
            1000,
            Timestamp::from_millis(10_000),
        )
    }

    #[test]
    fn test_created_player_state() {
        let p = fresh("42");
        assert_eq!(p.points, 1000);
        assert!(p.alive);
        assert!(p.died_at.is_none());
        assert!(!p.shield_active(Timestamp::from_millis(10_000)));
        assert!(p.death_state_consistent());
    }

    #[test]
    fn test_shield_view_is_strict() {
        let mut p = fresh("42");
        p.shield_expires_at = Some(Timestamp::from_millis(20_000));
        assert!(p.shield_active(Timestamp::from_millis(19_999)));
        // Exactly at expiry the shield is down.
        assert!(!p.shield_active(Timestamp::from_millis(20_000)));
    }

    #[test]
    fn test_expire_shield_clears_once() {
        let mut p = fresh("42");
        p.shield_expires_at = Some(Timestamp::from_millis(20_000));
        assert!(!p.expire_shield(Timestamp::from_millis(19_999)));
        assert!(p.expire_shield(Timestamp::from_millis(20_000)));
        assert!(p.shield_expires_at.is_none());
        assert!(!p.expire_shield(Timestamp::from_millis(30_000)));
    }
}
