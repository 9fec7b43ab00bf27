//! Signed-request client for the account verification endpoints.
//!
//! - [`Envelope`] builds the canonical payload and has a [`Signer`] sign it
//! - [`VerificationApi`] is the server surface the flows depend on
//! - [`HttpClient`] implements it over HTTP with `reqwest`
//!
//! [`Signer`]: vouch_crypto::Signer

pub mod api;
pub mod envelope;
pub mod http;
pub mod models;

pub use api::VerificationApi;
pub use envelope::{Action, Envelope, SignedRequest, NO_CODE_SENTINEL};
pub use http::HttpClient;
pub use models::{
    EmailVerificationRecord, PixChallengeResponse, PixConfirmResponse, PixVerificationRecord,
    StatusResponse, ValidationStatusResponse,
};
