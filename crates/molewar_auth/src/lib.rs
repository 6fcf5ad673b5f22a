//! # MOLEWAR Auth
//!
//! Verification of the opaque identity credential every request carries:
//! an HMAC-SHA256-signed, URL-encoded run of key/value pairs with an
//! embedded JSON user record.
//!
//! The whole crate is pure - same inputs, same verdict - so it can be
//! exercised exhaustively without any live provider.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod verify;

pub use error::{AuthError, AuthResult};
pub use verify::{verify, VerifiedUser};
