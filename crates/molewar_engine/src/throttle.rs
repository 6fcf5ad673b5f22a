//! # Loss-Alert Throttle
//!
//! Decides whether a victim should be pinged about cumulative point loss
//! without spamming them on every hit.
//!
//! The window is keyed to the time since the last *notification*, not the
//! first loss: the accumulator only resets when a loss is recorded and the
//! prior alert is older than the window. A target that is never attacked
//! again can therefore sit on a stale accumulator indefinitely. That is the
//! shipped behavior and downstream tooling depends on it; do not swap in a
//! fixed sliding window.
//!
//! A killing attack bypasses this entirely - the caller emits
//! [`AlertKind::DeathWarning`] directly.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::time::Timestamp;

/// Kind of alert handed to the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    /// Cumulative losses crossed the alert threshold.
    AttackWarning,
    /// The player's animal was killed.
    DeathWarning,
}

/// The throttle state carried on each player aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossCounters {
    /// Points lost inside the current window.
    pub points_lost_in_window: u64,
    /// When the last alert fired, if ever.
    pub last_notified_at: Option<Timestamp>,
}

/// Records a non-killing loss and decides whether to alert.
///
/// Returns the counters to persist and, at most once per window, an
/// [`AlertKind::AttackWarning`].
#[must_use]
pub fn record_loss(
    counters: LossCounters,
    stolen: u64,
    now: Timestamp,
    config: &GameConfig,
) -> (LossCounters, Option<AlertKind>) {
    let window_start = now.minus_millis(config.loss_window_millis());
    let notified_before_window =
        matches!(counters.last_notified_at, Some(at) if at < window_start);

    let mut accumulated = if notified_before_window {
        0
    } else {
        counters.points_lost_in_window
    };
    accumulated = accumulated.saturating_add(stolen);

    let may_notify = counters.last_notified_at.is_none() || notified_before_window;
    if accumulated >= config.loss_alert_threshold && may_notify {
        let updated = LossCounters {
            points_lost_in_window: 0,
            last_notified_at: Some(now),
        };
        (updated, Some(AlertKind::AttackWarning))
    } else {
        let updated = LossCounters {
            points_lost_in_window: accumulated,
            ..counters
        };
        (updated, None)
    }
}
