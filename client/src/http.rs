//! HTTP implementation of [`VerificationApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use vouch_types::{AccountAddress, VerificationError};

use crate::api::VerificationApi;
use crate::envelope::SignedRequest;
use crate::models::{
    EmailVerificationRecord, ErrorBody, MaybeRecord, PixChallengeResponse, PixConfirmResponse,
    PixVerificationRecord, StatusResponse, ValidationStatusResponse,
};

/// HTTP client for the verification endpoints.
///
/// Wraps `reqwest::Client` with the server's base URL. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client with default timeouts (30 s request, 10 s connect).
    pub fn new(base_url: impl Into<String>) -> Result<Self, VerificationError> {
        Self::with_timeouts(base_url, Duration::from_secs(30), Duration::from_secs(10))
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, VerificationError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                VerificationError::ServerError(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, VerificationError> {
        tracing::debug!(path, "POST");
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| VerificationError::ServerError(format!("request failed: {e}")))?;
        decode(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, VerificationError> {
        tracing::debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| VerificationError::ServerError(format!("request failed: {e}")))?;
        decode(path, response).await
    }
}

/// Map non-2xx responses onto the error taxonomy, decode the rest.
async fn decode<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, VerificationError> {
    let status = response.status();
    if !status.is_success() {
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .error
            .or(body.message)
            .unwrap_or_else(|| format!("server returned HTTP {status}"));
        tracing::warn!(path, status = status.as_u16(), %message, "request rejected");
        return Err(VerificationError::from_http_status(status.as_u16(), message));
    }

    response
        .json()
        .await
        .map_err(|e| VerificationError::ServerError(format!("invalid response from {path}: {e}")))
}

#[async_trait]
impl VerificationApi for HttpClient {
    async fn send_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError> {
        self.post_json("/account/email/send-code", req).await
    }

    async fn verify_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError> {
        self.post_json("/account/email/verify-code", req).await
    }

    async fn email_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<EmailVerificationRecord>, VerificationError> {
        let path = format!("/account/email/verify/{address}");
        let record: MaybeRecord<EmailVerificationRecord> = self.get_json(&path).await?;
        Ok(record.into_option())
    }

    async fn create_pix_verification(
        &self,
        req: &SignedRequest,
    ) -> Result<PixChallengeResponse, VerificationError> {
        self.post_json("/account/pix/create-verify", req).await
    }

    async fn confirm_pix_deposit(
        &self,
        req: &SignedRequest,
    ) -> Result<PixConfirmResponse, VerificationError> {
        self.post_json("/account/pix/confirm", req).await
    }

    async fn pix_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<PixVerificationRecord>, VerificationError> {
        let path = format!("/account/pix/verify/{address}");
        let record: MaybeRecord<PixVerificationRecord> = self.get_json(&path).await?;
        Ok(record.into_option())
    }

    async fn validation_status(
        &self,
        address: &AccountAddress,
    ) -> Result<ValidationStatusResponse, VerificationError> {
        self.get_json(&format!("/account/validation-status/{address}"))
            .await
    }
}
