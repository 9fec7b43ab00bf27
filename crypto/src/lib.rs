//! Cryptographic primitives for signed verification requests.
//!
//! - **Ed25519** key generation and seed handling
//! - The [`Signer`] capability: given a payload string, produce a signature
//!   and the public key that made it. Wallet integrations implement it; the
//!   in-process [`KeypairSigner`] backs the CLI and tests.

pub mod keys;
pub mod signer;

pub use keys::{generate_keypair, keypair_from_seed, keypair_from_seed_hex, public_from_private};
pub use signer::{verify_payload, KeypairSigner, SignedPayload, Signer, SignerError};
