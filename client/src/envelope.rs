//! Signed-request envelope.
//!
//! Every state-changing call carries a canonical, newline-joined payload:
//!
//! ```text
//! {action label}
//! {domain}
//! {Field}: {value}      (one or more)
//! {ISO-8601 timestamp}
//! ```
//!
//! The payload is signed as-is and sent next to the signature and public
//! key. The server re-derives the signature over the literal string, so the
//! payload must never be reformatted after signing.

use serde::{Deserialize, Serialize};
use vouch_crypto::{verify_payload, Signer, SignerError};
use vouch_types::{PublicKey, Signature, Timestamp, VerificationError};

/// Sentinel submitted in place of a confirmation code when the user has none.
pub const NO_CODE_SENTINEL: &str = "NONE";

/// The operation a payload authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    SendEmailCode,
    VerifyEmailCode,
    CreatePixVerification,
    ConfirmPixDeposit,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendEmailCode => "Send email verification code",
            Self::VerifyEmailCode => "Verify email",
            Self::CreatePixVerification => "Create PIX verification",
            Self::ConfirmPixDeposit => "Confirm PIX deposit",
        }
    }
}

/// An unsigned payload under construction.
#[derive(Clone, Debug)]
pub struct Envelope {
    action: Action,
    domain: String,
    fields: Vec<(&'static str, String)>,
    issued_at: Timestamp,
}

impl Envelope {
    pub fn new(action: Action, domain: impl Into<String>, issued_at: Timestamp) -> Self {
        Self {
            action,
            domain: domain.into(),
            fields: Vec::new(),
            issued_at,
        }
    }

    /// Append an operation-specific field. Line breaks in the value are
    /// flattened so the payload keeps one field per line.
    pub fn field(mut self, name: &'static str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref().replace(['\r', '\n'], " ");
        self.fields.push((name, value));
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// The exact string that gets signed.
    pub fn canonical(&self) -> String {
        let mut lines = Vec::with_capacity(self.fields.len() + 3);
        lines.push(self.action.label().to_string());
        lines.push(self.domain.clone());
        for (name, value) in &self.fields {
            lines.push(format!("{name}: {value}"));
        }
        lines.push(self.issued_at.to_iso8601());
        lines.join("\n")
    }

    /// Ask the signer for a signature and wrap everything in a request body.
    pub async fn sign(self, signer: &dyn Signer) -> Result<SignedRequest, VerificationError> {
        let payload = self.canonical();
        let signed = signer
            .sign(&payload)
            .await
            .map_err(signer_error_to_verification)?;
        tracing::debug!(action = self.action.label(), "envelope signed");
        Ok(SignedRequest {
            public_key: signed.public_key,
            signature: signed.signature,
            payload,
        })
    }
}

/// Request body for every signed endpoint: `{publicKey, signature, payload}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub public_key: PublicKey,
    pub signature: Signature,
    pub payload: String,
}

impl SignedRequest {
    /// Verify the signature over the literal payload.
    pub fn verify(&self) -> bool {
        verify_payload(&self.payload, &self.signature, &self.public_key)
    }

    /// The first line of the payload.
    pub fn action_label(&self) -> Option<&str> {
        self.payload.lines().next()
    }

    /// Look up a `{Name}: {value}` field line in the payload.
    pub fn field(&self, name: &str) -> Option<&str> {
        let lines: Vec<&str> = self.payload.lines().collect();
        // Skip the action and domain lines, and the trailing timestamp.
        let body = lines.get(2..lines.len().saturating_sub(1))?;
        body.iter().copied().find_map(|line| {
            line.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix(": "))
        })
    }
}

pub fn signer_error_to_verification(err: SignerError) -> VerificationError {
    match err {
        SignerError::Cancelled => VerificationError::SignatureCancelled,
        SignerError::Unavailable(msg) => VerificationError::Signing(msg),
    }
}
