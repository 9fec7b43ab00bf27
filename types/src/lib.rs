//! Fundamental types for account verification.
//!
//! Shared by every other crate in the workspace: account addresses, keys and
//! signatures, money amounts, timestamps and the clock trait, the
//! verification status enum, and the error taxonomy surfaced to users.

pub mod address;
pub mod amount;
pub mod error;
pub mod keys;
pub mod status;
pub mod time;

pub use address::AccountAddress;
pub use amount::Cents;
pub use error::VerificationError;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use status::VerificationStatus;
pub use time::{Clock, Timestamp};
