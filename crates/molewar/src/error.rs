//! Service-level error taxonomy.
//!
//! Everything a caller of [`GameService`](crate::GameService) can see,
//! flattened so a transport layer can map variants to responses without
//! digging through layers.

use molewar_auth::AuthError;
use molewar_engine::{EconomyError, PlayerId};
use molewar_store::{JournalError, StoreError};
use thiserror::Error;

/// Any failure of a game service call.
#[derive(Debug, Error)]
pub enum GameError {
    /// The credential blob failed verification.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The named player has never been seen.
    #[error("unknown player {0}")]
    NotFound(PlayerId),

    /// The rules rejected the action; state is unchanged.
    #[error("action rejected: {0}")]
    Rejected(#[from] EconomyError),

    /// The durable journal failed; the action did not commit.
    #[error("storage failure: {0}")]
    Storage(#[from] JournalError),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            // The service pre-checks self-targeting, so an aliased pair at
            // the store layer is the same caller mistake.
            StoreError::AliasedPair => Self::Rejected(EconomyError::SelfTarget),
            StoreError::Journal(err) => Self::Storage(err),
            StoreError::Rejected(err) => Self::Rejected(err),
        }
    }
}

/// Convenience alias for service results.
pub type GameResult<T> = Result<T, GameError>;
