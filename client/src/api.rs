//! The server surface the verification flows consume.

use async_trait::async_trait;
use std::sync::Arc;
use vouch_types::{AccountAddress, VerificationError};

use crate::envelope::SignedRequest;
use crate::models::{
    EmailVerificationRecord, PixChallengeResponse, PixConfirmResponse, PixVerificationRecord,
    StatusResponse, ValidationStatusResponse,
};

/// Account verification endpoints.
///
/// Errors are already mapped onto the [`VerificationError`] taxonomy, so
/// flows never see HTTP status codes.
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// `POST /account/email/send-code`
    async fn send_email_code(&self, req: &SignedRequest)
        -> Result<StatusResponse, VerificationError>;

    /// `POST /account/email/verify-code`
    async fn verify_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError>;

    /// `GET /account/email/verify/{address}`; `None` when nothing is on record.
    async fn email_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<EmailVerificationRecord>, VerificationError>;

    /// `POST /account/pix/create-verify`
    async fn create_pix_verification(
        &self,
        req: &SignedRequest,
    ) -> Result<PixChallengeResponse, VerificationError>;

    /// `POST /account/pix/confirm`
    async fn confirm_pix_deposit(
        &self,
        req: &SignedRequest,
    ) -> Result<PixConfirmResponse, VerificationError>;

    /// `GET /account/pix/verify/{address}`; `None` when nothing is on record.
    async fn pix_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<PixVerificationRecord>, VerificationError>;

    /// `GET /account/validation-status/{address}`
    async fn validation_status(
        &self,
        address: &AccountAddress,
    ) -> Result<ValidationStatusResponse, VerificationError>;
}

#[async_trait]
impl<T: VerificationApi + ?Sized> VerificationApi for Arc<T> {
    async fn send_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError> {
        (**self).send_email_code(req).await
    }

    async fn verify_email_code(
        &self,
        req: &SignedRequest,
    ) -> Result<StatusResponse, VerificationError> {
        (**self).verify_email_code(req).await
    }

    async fn email_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<EmailVerificationRecord>, VerificationError> {
        (**self).email_verification(address).await
    }

    async fn create_pix_verification(
        &self,
        req: &SignedRequest,
    ) -> Result<PixChallengeResponse, VerificationError> {
        (**self).create_pix_verification(req).await
    }

    async fn confirm_pix_deposit(
        &self,
        req: &SignedRequest,
    ) -> Result<PixConfirmResponse, VerificationError> {
        (**self).confirm_pix_deposit(req).await
    }

    async fn pix_verification(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<PixVerificationRecord>, VerificationError> {
        (**self).pix_verification(address).await
    }

    async fn validation_status(
        &self,
        address: &AccountAddress,
    ) -> Result<ValidationStatusResponse, VerificationError> {
        (**self).validation_status(address).await
    }
}
