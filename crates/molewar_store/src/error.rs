//! # Store Error Types

use molewar_engine::{EconomyError, PlayerId};
use thiserror::Error;

/// Errors from the journal file layer.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Underlying file I/O failed.
    #[error("journal i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the journal magic.
    #[error("not a journal file")]
    BadMagic,

    /// The journal was written by an unknown format version.
    #[error("unsupported journal version: {0}")]
    UnsupportedVersion(u32),

    /// A record body cannot be decoded.
    #[error("corrupt journal record: {0}")]
    Corrupt(String),

    /// A snapshot field is too long to encode losslessly.
    #[error("snapshot field of {0} bytes exceeds the journal limit")]
    OversizedField(usize),
}

/// Errors from the player store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No aggregate exists for the identity.
    #[error("player not found: {0}")]
    NotFound(PlayerId),

    /// A pair commit was asked to lock one identity twice.
    #[error("pair commit requires two distinct identities")]
    AliasedPair,

    /// The journal could not persist the commit.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// The transform refused the transition; stored state is untouched.
    #[error(transparent)]
    Rejected(#[from] EconomyError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
