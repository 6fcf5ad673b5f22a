//! # MOLEWAR
//!
//! Server-authoritative engine for a many-player point-stealing game.
//! Players wack their own animal for points, attack each other to steal
//! them, buy time-limited shields, and respawn after dying.
//!
//! This crate is the facade: [`GameService`] verifies signed credential
//! blobs (`molewar_auth`), applies the pure rules (`molewar_engine`)
//! inside a durable commit boundary (`molewar_store`), and pushes
//! throttled alerts through an [`AlertSink`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use molewar::{GameConfig, GameService, LogSink, SystemClock};
//!
//! # fn main() -> Result<(), molewar::GameError> {
//! let service = GameService::open(
//!     "players.mwjl",
//!     "123456:BOT-SECRET",
//!     GameConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(LogSink),
//! )?;
//!
//! let me = service.authenticate("query_id=...&user=...&hash=...")?;
//! let after = service.wack_self(&me.id)?;
//! assert!(after.points > me.points);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod dispatch;
pub mod error;
pub mod service;

pub use dispatch::{AlertSink, DispatchError, LogSink};
pub use error::{GameError, GameResult};
pub use service::GameService;

pub use molewar_auth::{AuthError, VerifiedUser};
pub use molewar_engine::{
    AlertKind, AttackOutcome, Clock, EconomyError, GameConfig, ManualClock, Player, PlayerId,
    SystemClock, Timestamp,
};
