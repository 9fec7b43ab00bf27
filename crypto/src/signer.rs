//! The signing capability behind every state-changing request.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;
use vouch_types::{KeyPair, PublicKey, Signature};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user declined to sign.
    #[error("signing cancelled by user")]
    Cancelled,

    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// A signature over a payload together with the key that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedPayload {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// Signs payload strings on behalf of the account.
///
/// Implementations may prompt the user, so signing is async and can be
/// cancelled.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The key this signer signs with.
    fn public_key(&self) -> PublicKey;

    async fn sign(&self, payload: &str) -> Result<SignedPayload, SignerError>;
}

/// A signer holding an Ed25519 key pair in memory.
pub struct KeypairSigner {
    signing_key: SigningKey,
    public: PublicKey,
}

impl KeypairSigner {
    pub fn new(keys: KeyPair) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&keys.private.0),
            public: keys.public,
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(crate::keys::keypair_from_seed(seed))
    }
}

#[async_trait]
impl Signer for KeypairSigner {
    fn public_key(&self) -> PublicKey {
        self.public.clone()
    }

    async fn sign(&self, payload: &str) -> Result<SignedPayload, SignerError> {
        let sig = self.signing_key.sign(payload.as_bytes());
        tracing::trace!(bytes = payload.len(), "payload signed");
        Ok(SignedPayload {
            public_key: self.public.clone(),
            signature: Signature(sig.to_bytes()),
        })
    }
}

/// Check a signature over the literal payload string, the way the server
/// re-derives it.
pub fn verify_payload(payload: &str, signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(payload.as_bytes(), &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signature_verifies_over_literal_payload() {
        let signer = KeypairSigner::from_seed(&[3u8; 32]);
        let payload = "Verify email\nmarket.example\nCode: 123456\n2024-05-01T12:00:00.000Z";
        let signed = signer.sign(payload).await.unwrap();
        assert_eq!(signed.public_key, signer.public_key());
        assert!(verify_payload(payload, &signed.signature, &signed.public_key));
    }

    #[tokio::test]
    async fn altered_payload_fails() {
        let signer = KeypairSigner::from_seed(&[3u8; 32]);
        let signed = signer.sign("Code: 123456").await.unwrap();
        assert!(!verify_payload("Code: 123457", &signed.signature, &signed.public_key));
    }

    #[tokio::test]
    async fn wrong_key_fails() {
        let a = KeypairSigner::from_seed(&[1u8; 32]);
        let b = KeypairSigner::from_seed(&[2u8; 32]);
        let signed = a.sign("payload").await.unwrap();
        assert!(!verify_payload("payload", &signed.signature, &b.public_key()));
    }

    #[test]
    fn invalid_public_key_rejected() {
        let bad = PublicKey([0xFF; 32]);
        assert!(!verify_payload("x", &Signature([0u8; 64]), &bad));
    }
}
