//! Account address type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::PublicKey;

/// The account a verification belongs to.
///
/// The address is the hex encoding of the account's Ed25519 public key,
/// which is also what appears in the `/{address}` path segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountAddress(String);

impl AccountAddress {
    /// Wrap a raw address string (trimmed, lowercased).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_ascii_lowercase())
    }

    /// Derive the address of a public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(public_key.to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Well-formed means 64 lowercase hex characters.
    pub fn is_valid(&self) -> bool {
        self.0.len() == 64 && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&PublicKey> for AccountAddress {
    fn from(pk: &PublicKey) -> Self {
        Self::from_public_key(pk)
    }
}
