//! # MOLEWAR Engine
//!
//! Pure game rules for MOLEWAR: the player aggregate, the four economy
//! transitions (self-wack, attack, shield, respawn) and the loss-alert
//! throttle.
//!
//! ## Design principles
//!
//! 1. **Pure transitions** - every function takes the aggregate(s) and
//!    `now`, returns a typed result, and touches nothing else
//! 2. **Lazy time gating** - shields and cooldowns are comparisons against
//!    stored timestamps, never scheduled tasks
//! 3. **First-failure-wins preconditions** - error priority is part of the
//!    contract
//! 4. **External tuning** - all balance values live in [`GameConfig`],
//!    overridable from TOML
//!
//! ## Atomicity
//!
//! Transitions are applied by the store (`molewar_store`) on cloned
//! snapshots inside its commit boundary; the two-aggregate attack must go
//! through the store's pair commit so neither balance is ever observed
//! half-updated.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod player;
pub mod throttle;
pub mod time;
pub mod transitions;

pub use config::GameConfig;
pub use error::{EconomyError, EconomyResult};
pub use player::{NewPlayer, Player, PlayerId};
pub use throttle::{record_loss, AlertKind, LossCounters};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use transitions::{activate_shield, attack, respawn, wack_self, AttackOutcome};
