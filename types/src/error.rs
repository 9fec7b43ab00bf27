//! Error taxonomy shared by the client and the verification flows.

use thiserror::Error;

/// Every failure a verification flow can surface to the user.
///
/// All payloads are plain strings so the error can be cloned into flow
/// state and displayed verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Local validation failed; no request was sent.
    #[error("{0}")]
    InvalidInput(String),

    /// PIX key failed the CPF/CNPJ checksum; no request was sent.
    #[error("invalid PIX key: {0}")]
    InvalidKey(String),

    #[error("signature request was cancelled")]
    SignatureCancelled,

    #[error("signing failed: {0}")]
    Signing(String),

    /// HTTP 429.
    #[error("{0}")]
    RateLimited(String),

    /// HTTP 404: no verification on record.
    #[error("{0}")]
    NotFound(String),

    /// HTTP 410, or the local deadline elapsed.
    #[error("{0}")]
    Expired(String),

    /// HTTP 403: confirmation budget spent.
    #[error("{0}")]
    AttemptsExceeded(String),

    /// A confirmation was accepted by the server but did not match.
    #[error("{0}")]
    CodeMismatch(String),

    /// Any other server, transport or decoding failure.
    #[error("{0}")]
    ServerError(String),
}

impl VerificationError {
    /// Map an HTTP error status and its `{error}` body to the taxonomy.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            404 => Self::NotFound(message),
            410 => Self::Expired(message),
            403 => Self::AttemptsExceeded(message),
            _ => Self::ServerError(message),
        }
    }

    /// Terminal errors force the flow into its failed state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired(_) | Self::AttemptsExceeded(_))
    }

    /// Errors raised before any request left the client.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidKey(_))
    }
}
