//! # Alert Dispatch
//!
//! The seam between game logic and whatever messaging channel reaches
//! players. The service decides *when* to alert (through the engine's
//! throttle); a sink decides *how* the message goes out.
//!
//! Delivery is best-effort by contract: the service logs a failed
//! delivery and moves on. An unreachable messaging channel must never
//! roll back or fail a committed game action.

use molewar_engine::{AlertKind, PlayerId};
use thiserror::Error;

/// A delivery failure inside a sink.
#[derive(Debug, Error)]
#[error("alert delivery failed: {reason}")]
pub struct DispatchError {
    /// Human-readable cause, for the log line.
    pub reason: String,
}

impl DispatchError {
    /// Builds a failure with the given cause.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outbound channel for player alerts.
pub trait AlertSink: Send + Sync {
    /// Delivers one alert to one player.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the channel rejects the message; the
    /// caller logs and continues.
    fn deliver(&self, player: &PlayerId, kind: AlertKind) -> Result<(), DispatchError>;
}

/// Sink that writes alerts to the log. The default when no real channel
/// is wired up.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, player: &PlayerId, kind: AlertKind) -> Result<(), DispatchError> {
        match kind {
            AlertKind::AttackWarning => {
                tracing::info!(player = %player, "alert: heavy losses this window");
            }
            AlertKind::DeathWarning => {
                tracing::info!(player = %player, "alert: animal killed");
            }
        }
        Ok(())
    }
}
