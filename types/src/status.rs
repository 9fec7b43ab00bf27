//! Verification status shared by the email and PIX flows.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-side status of a verification record.
///
/// Exactly one status holds per flow per account. A JSON `null` status (no
/// record on file) reads as [`VerificationStatus::None`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// No verification on record.
    #[default]
    None,
    /// Challenge issued; waiting on the user.
    Awaiting,
    /// Submitted; the server is settling it out of band.
    Processing,
    /// Proven.
    Verified,
    /// Rejected or attempts exhausted.
    Failed,
    /// Deadline passed before the challenge was answered.
    Expired,
}

impl VerificationStatus {
    /// Terminal statuses can only be left by starting a new verification.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Failed | Self::Expired)
    }

    /// Whether the user (or the server) still has work to do on this record.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Awaiting | Self::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Awaiting => "awaiting",
            Self::Processing => "processing",
            Self::Verified => "verified",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Lenient parse; unknown strings map to `None`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "awaiting" | "pending" => Self::Awaiting,
            "processing" => Self::Processing,
            "verified" => Self::Verified,
            "failed" => Self::Failed,
            "expired" => Self::Expired,
            _ => Self::None,
        }
    }
}

impl<'de> Deserialize<'de> for VerificationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse).unwrap_or_default())
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
