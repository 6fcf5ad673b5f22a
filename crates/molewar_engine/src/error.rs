//! # Engine Error Types
//!
//! Every way a state transition can refuse to run.

use thiserror::Error;

/// Errors produced by the economy transitions and engine configuration.
///
/// Transition errors are preconditions: when one is returned, the stored
/// aggregate is untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// The acting player is dead and cannot act.
    #[error("your animal is dead")]
    AttackerDead,

    /// The target is already dead.
    #[error("target is dead")]
    TargetDead,

    /// The target holds an active shield.
    #[error("target is protected")]
    TargetProtected,

    /// A player tried to attack themselves.
    #[error("cannot attack yourself")]
    SelfTarget,

    /// Not enough points to pay for a shield.
    #[error("need more than {required} points to activate shield")]
    InsufficientPoints {
        /// Balance the shield purchase requires (exclusive bound).
        required: u64,
    },

    /// Respawn requested by a player who is alive.
    #[error("already alive")]
    AlreadyAlive,

    /// Respawn requested before the cooldown elapsed.
    #[error("must wait {remaining_seconds}s to respawn")]
    RespawnTooSoon {
        /// Whole seconds left on the cooldown, rounded up.
        remaining_seconds: u64,
    },

    /// Invalid tuning file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for engine operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
