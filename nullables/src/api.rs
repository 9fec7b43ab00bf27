//! Nullable verification API: scripted responses, recorded requests.
//!
//! Each endpoint has its own queue of results. A call pops the front of
//! its queue, except that the last entry is sticky: it keeps being
//! returned until something else is scripted behind it. An endpoint with
//! nothing scripted answers `ServerError("no scripted response")`.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vouch_client::{
    EmailVerificationRecord, PixChallengeResponse, PixConfirmResponse, PixVerificationRecord,
    SignedRequest, StatusResponse, ValidationStatusResponse, VerificationApi,
};
use vouch_types::{AccountAddress, VerificationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    SendEmailCode,
    VerifyEmailCode,
    EmailVerification,
    CreatePixVerification,
    ConfirmPixDeposit,
    PixVerification,
    ValidationStatus,
}

/// One call made against the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    /// Body of signed calls.
    pub request: Option<SignedRequest>,
    /// Path parameter of lookups.
    pub address: Option<AccountAddress>,
}

type Script<T> = VecDeque<Result<T, VerificationError>>;

#[derive(Default)]
struct Scripts {
    send_email_code: Script<StatusResponse>,
    verify_email_code: Script<StatusResponse>,
    email_verification: Script<Option<EmailVerificationRecord>>,
    create_pix_verification: Script<PixChallengeResponse>,
    confirm_pix_deposit: Script<PixConfirmResponse>,
    pix_verification: Script<Option<PixVerificationRecord>>,
    validation_status: Script<ValidationStatusResponse>,
}

/// A [`VerificationApi`] that answers from scripts.
#[derive(Default)]
pub struct NullApi {
    scripts: Mutex<Scripts>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Mutex<HashMap<Endpoint, Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl NullApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_send_email_code(&self, result: Result<StatusResponse, VerificationError>) {
        self.script(|s| s.send_email_code.push_back(result));
    }

    pub fn script_verify_email_code(&self, result: Result<StatusResponse, VerificationError>) {
        self.script(|s| s.verify_email_code.push_back(result));
    }

    pub fn script_email_verification(
        &self,
        result: Result<Option<EmailVerificationRecord>, VerificationError>,
    ) {
        self.script(|s| s.email_verification.push_back(result));
    }

    pub fn script_create_pix_verification(
        &self,
        result: Result<PixChallengeResponse, VerificationError>,
    ) {
        self.script(|s| s.create_pix_verification.push_back(result));
    }

    pub fn script_confirm_pix_deposit(&self, result: Result<PixConfirmResponse, VerificationError>) {
        self.script(|s| s.confirm_pix_deposit.push_back(result));
    }

    pub fn script_pix_verification(
        &self,
        result: Result<Option<PixVerificationRecord>, VerificationError>,
    ) {
        self.script(|s| s.pix_verification.push_back(result));
    }

    pub fn script_validation_status(
        &self,
        result: Result<ValidationStatusResponse, VerificationError>,
    ) {
        self.script(|s| s.validation_status.push_back(result));
    }

    /// Make calls to `endpoint` take `delay` (tokio time) before answering.
    pub fn set_latency(&self, endpoint: Endpoint, delay: Duration) {
        if let Ok(mut latency) = self.latency.lock() {
            latency.insert(endpoint, delay);
        }
    }

    /// Get all recorded calls (for assertions).
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls().iter().filter(|c| c.endpoint == endpoint).count()
    }

    /// Highest number of calls that were ever in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Clear scripts and recorded calls.
    pub fn reset(&self) {
        self.script(|s| *s = Scripts::default());
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn script(&self, f: impl FnOnce(&mut Scripts)) {
        if let Ok(mut scripts) = self.scripts.lock() {
            f(&mut scripts);
        }
    }

    async fn answer<T: Clone>(
        &self,
        call: RecordedCall,
        pick: impl FnOnce(&mut Scripts) -> &mut Script<T>,
    ) -> Result<T, VerificationError> {
        let endpoint = call.endpoint;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .latency
            .lock()
            .ok()
            .and_then(|l| l.get(&endpoint).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.scripts.lock() {
            Ok(mut scripts) => next_scripted(pick(&mut scripts)),
            Err(_) => Err(VerificationError::ServerError("script lock poisoned".into())),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn next_scripted<T: Clone>(queue: &mut Script<T>) -> Result<T, VerificationError> {
    match queue.len() {
        0 => Err(VerificationError::ServerError("no scripted response".into())),
        1 => queue[0].clone(),
        _ => queue
            .pop_front()
            .unwrap_or_else(|| Err(VerificationError::ServerError("no scripted response".into()))),
    }
}

fn signed(endpoint: Endpoint, req: &SignedRequest) -> RecordedCall {
    RecordedCall {
        endpoint,
        request: Some(req.clone()),
        address: None,
    }
}

fn lookup(endpoint: Endpoint, address: &AccountAddress) -> RecordedCall {
    RecordedCall {
        endpoint,
        request: None,
        address: Some(address.clone()),
    }
}

#[async_trait]
impl VerificationApi for NullApi {
    async fn send_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError> {
        self.answer(signed(Endpoint::SendEmailCode, req), |s| &mut s.send_email_code)
            .await
    }

    async fn verify_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError> {
        self.answer(signed(Endpoint::VerifyEmailCode, req), |s| &mut s.verify_email_code)
            .await
    }

    async fn email_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<EmailVerificationRecord>, VerificationError> {
        self.answer(lookup(Endpoint::EmailVerification, address), |s| {
            &mut s.email_verification
        })
        .await
    }

    async fn create_pix_verification(
        &self,
        req: &SignedRequest,
    ) -> Result<PixChallengeResponse, VerificationError> {
        self.answer(signed(Endpoint::CreatePixVerification, req), |s| {
            &mut s.create_pix_verification
        })
        .await
    }

    async fn confirm_pix_deposit(
        &self,
        req: &SignedRequest,
    ) -> Result<PixConfirmResponse, VerificationError> {
        self.answer(signed(Endpoint::ConfirmPixDeposit, req), |s| {
            &mut s.confirm_pix_deposit
        })
        .await
    }

    async fn pix_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<PixVerificationRecord>, VerificationError> {
        self.answer(lookup(Endpoint::PixVerification, address), |s| {
            &mut s.pix_verification
        })
        .await
    }

    async fn validation_status(
        &self,
        address: &AccountAddress,
    ) -> Result<ValidationStatusResponse, VerificationError> {
        self.answer(lookup(Endpoint::ValidationStatus, address), |s| {
            &mut s.validation_status
        })
        .await
    }
}
