//! Nullable infrastructure for deterministic testing.
//!
//! Everything the verification flows reach outside the process for (clock,
//! signer, verification API) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return scripted, deterministic values
//! - Can be controlled programmatically
//! - Record what was asked of them for assertions
//! - Never touch the network or a real wallet
//!
//! Usage: swap real implementations for nullables in tests.

pub mod api;
pub mod clock;
pub mod signer;

pub use api::{Endpoint, NullApi, RecordedCall};
pub use clock::NullClock;
pub use signer::NullSigner;
