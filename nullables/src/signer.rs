//! Nullable signer: a real key, plus a switch to simulate the user
//! declining the signature prompt.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use vouch_crypto::{KeypairSigner, SignedPayload, Signer, SignerError};
use vouch_types::PublicKey;

pub struct NullSigner {
    inner: KeypairSigner,
    cancel: AtomicBool,
    signed: Mutex<Vec<String>>,
}

impl NullSigner {
    /// A signer over a fixed seed, so addresses are stable across runs.
    pub fn new() -> Self {
        Self::from_seed(&[7u8; 32])
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: KeypairSigner::from_seed(seed),
            cancel: AtomicBool::new(false),
            signed: Mutex::new(Vec::new()),
        }
    }

    /// Make every following `sign` call fail as if the user said no.
    pub fn cancel_next(&self, cancel: bool) {
        self.cancel.store(cancel, Ordering::SeqCst);
    }

    /// Every payload signed so far, in order.
    pub fn signed_payloads(&self) -> Vec<String> {
        self.signed
            .lock()
            .map(|payloads| payloads.clone())
            .unwrap_or_default()
    }
}

impl Default for NullSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for NullSigner {
    fn public_key(&self) -> PublicKey {
        self.inner.public_key()
    }

    async fn sign(&self, payload: &str) -> Result<SignedPayload, SignerError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(SignerError::Cancelled);
        }
        if let Ok(mut signed) = self.signed.lock() {
            signed.push(payload.to_string());
        }
        self.inner.sign(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_crypto::verify_payload;

    #[tokio::test]
    async fn signs_and_records() {
        let signer = NullSigner::new();
        let out = signer.sign("hello").await.unwrap();
        assert!(verify_payload("hello", &out.signature, &signer.public_key()));
        assert_eq!(signer.signed_payloads(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_is_distinct() {
        let signer = NullSigner::new();
        signer.cancel_next(true);
        assert_eq!(signer.sign("x").await, Err(SignerError::Cancelled));
        assert!(signer.signed_payloads().is_empty());
    }
}
