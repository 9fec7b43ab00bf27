//! PIX micro-deposit verification as a pure state machine.
//!
//! [`PixState::apply`] takes the current state, one event and the current
//! time, and returns the next state. It performs no I/O and starts no
//! tasks; the async driver in [`crate::pix_flow`] does that by looking at
//! the step it ends up in.
//!
//! ```text
//! EnterPix ──key ok──▶ ConfirmPixKey ──issued──▶ DepositInstructions
//! DepositInstructions ──verified──▶ Success
//! DepositInstructions ──processing──▶ Processing ──poll verified──▶ Success
//! Processing ──poll awaiting──▶ DepositInstructions
//! any live step ──exhausted / expired / deadline──▶ Failed
//! Failed | Success ──reset──▶ EnterPix
//! ```

use vouch_client::{PixChallengeResponse, PixConfirmResponse, PixVerificationRecord};
use vouch_types::{Cents, Timestamp, VerificationError, VerificationStatus};

use crate::pix_key::PixKey;

const EXHAUSTED_MESSAGE: &str =
    "Maximum confirmation attempts reached. Start a new verification.";
const EXPIRED_MESSAGE: &str = "The deposit window has expired. Start a new verification.";
const LOCAL_TIMEOUT_MESSAGE: &str =
    "Time ran out before the deposit was confirmed. Start a new verification.";
const REJECTED_MESSAGE: &str = "PIX verification failed.";

/// An issued micro-deposit challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixChallenge {
    pub user_pix_key: String,
    pub destination_pix_key: String,
    pub confirmation_value: Cents,
    /// Server display string, or a local `R$` rendering when absent.
    pub confirmation_value_brl: String,
    pub expires_at: Timestamp,
    pub attempts: u32,
    pub max_attempts: u32,
}

impl PixChallenge {
    pub fn issued(user_key: &PixKey, resp: PixChallengeResponse) -> Self {
        let brl = resp
            .confirmation_value_brl
            .unwrap_or_else(|| resp.confirmation_value_cents.to_brl());
        Self {
            user_pix_key: user_key.as_str().to_string(),
            destination_pix_key: resp.destination_pix_key,
            confirmation_value: resp.confirmation_value_cents,
            confirmation_value_brl: brl,
            expires_at: resp.expires_at,
            attempts: resp.attempts.min(resp.max_attempts),
            max_attempts: resp.max_attempts,
        }
    }

    pub fn from_record(record: &PixVerificationRecord) -> Self {
        Self {
            user_pix_key: record.user_pix_key.clone(),
            destination_pix_key: record.destination_pix_key.clone(),
            confirmation_value: record.confirmation_value_cents,
            confirmation_value_brl: record
                .confirmation_value_brl
                .clone()
                .unwrap_or_else(|| record.confirmation_value_cents.to_brl()),
            expires_at: record.expires_at,
            attempts: record.attempts.min(record.max_attempts),
            max_attempts: record.max_attempts,
        }
    }

    /// Fold in server-reported counters. `attempts` never moves backwards.
    pub fn record_attempts(&mut self, attempts: u32, max_attempts: u32) {
        if max_attempts > 0 {
            self.max_attempts = max_attempts;
        }
        self.attempts = self.attempts.max(attempts).min(self.max_attempts);
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Why a verification ended in [`PixStep::Failed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    AttemptsExhausted,
    /// The server reported the challenge expired.
    Expired,
    /// The deadline passed on the local clock.
    LocalTimeout,
    /// The server marked the verification failed.
    Rejected,
}

impl FailureReason {
    fn error(self, server_message: Option<&str>) -> VerificationError {
        match self {
            Self::AttemptsExhausted => VerificationError::AttemptsExceeded(EXHAUSTED_MESSAGE.into()),
            Self::Expired => VerificationError::Expired(
                server_message.unwrap_or(EXPIRED_MESSAGE).to_string(),
            ),
            Self::LocalTimeout => VerificationError::Expired(LOCAL_TIMEOUT_MESSAGE.into()),
            Self::Rejected => VerificationError::ServerError(
                server_message.unwrap_or(REJECTED_MESSAGE).to_string(),
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixStep {
    /// Typing a key. `draft` is what was last submitted or edited.
    EnterPix { draft: String },
    ConfirmPixKey { key: PixKey },
    DepositInstructions { challenge: PixChallenge },
    /// Deposit reported; waiting for the server to match it.
    Processing { challenge: PixChallenge },
    Success,
    Failed { reason: FailureReason },
}

impl PixStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnterPix { .. } => "enter-pix",
            Self::ConfirmPixKey { .. } => "confirm-pix-key",
            Self::DepositInstructions { .. } => "deposit-instructions",
            Self::Processing { .. } => "processing",
            Self::Success => "success",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Everything that can happen to a PIX verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixEvent {
    KeySubmitted(String),
    EditKey,
    ChallengeIssued(PixChallenge),
    CodeEdited(String),
    NoCodeToggled(bool),
    ConfirmAccepted(PixConfirmResponse),
    /// A request failed before producing a response.
    RequestFailed(VerificationError),
    Polled(PixVerificationRecord),
    /// Time moved; only the deadline check runs.
    ClockTick,
    /// A record fetched when resuming an earlier session.
    Restored(PixVerificationRecord),
    Reset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixState {
    pub step: PixStep,
    pub error: Option<VerificationError>,
    pub code_input: String,
    pub no_code_available: bool,
}

impl Default for PixState {
    fn default() -> Self {
        Self {
            step: PixStep::EnterPix {
                draft: String::new(),
            },
            error: None,
            code_input: String::new(),
            no_code_available: false,
        }
    }
}

impl PixState {
    pub fn challenge(&self) -> Option<&PixChallenge> {
        match &self.step {
            PixStep::DepositInstructions { challenge } | PixStep::Processing { challenge } => {
                Some(challenge)
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.challenge().map(|c| c.expires_at)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.step, PixStep::Success | PixStep::Failed { .. })
    }

    /// The next state after `event`, observed at `now`.
    pub fn apply(&self, event: &PixEvent, now: Timestamp) -> PixState {
        if self.is_terminal() {
            return match event {
                PixEvent::Reset => PixState::default(),
                _ => self.clone(),
            };
        }
        let next = self.transition(event);
        next.enforce_deadline(now)
    }

    fn transition(&self, event: &PixEvent) -> PixState {
        match (&self.step, event) {
            (_, PixEvent::Reset) => PixState::default(),

            (PixStep::EnterPix { .. }, PixEvent::KeySubmitted(raw)) => match PixKey::parse(raw) {
                Ok(key) => PixState {
                    step: PixStep::ConfirmPixKey { key },
                    ..PixState::default()
                },
                Err(e) => PixState {
                    step: PixStep::EnterPix { draft: raw.clone() },
                    error: Some(e),
                    ..self.clone()
                },
            },

            (PixStep::ConfirmPixKey { key }, PixEvent::EditKey) => PixState {
                step: PixStep::EnterPix {
                    draft: key.formatted(),
                },
                ..PixState::default()
            },

            (PixStep::ConfirmPixKey { .. }, PixEvent::ChallengeIssued(challenge)) => PixState {
                step: PixStep::DepositInstructions {
                    challenge: challenge.clone(),
                },
                ..PixState::default()
            },

            (PixStep::DepositInstructions { .. }, PixEvent::CodeEdited(code)) => PixState {
                code_input: code.trim().to_string(),
                ..self.clone()
            },

            (PixStep::DepositInstructions { .. }, PixEvent::NoCodeToggled(on)) => PixState {
                no_code_available: *on,
                ..self.clone()
            },

            (PixStep::DepositInstructions { challenge }, PixEvent::ConfirmAccepted(resp)) => {
                self.after_confirm(challenge, resp)
            }

            (_, PixEvent::RequestFailed(err)) => self.after_failure(err),

            (PixStep::Processing { challenge }, PixEvent::Polled(record)) => {
                self.after_poll(challenge, record)
            }

            (PixStep::EnterPix { .. } | PixStep::ConfirmPixKey { .. }, PixEvent::Restored(record)) => {
                self.restore(record)
            }

            // Everything else (poll results outside processing, edits in the
            // wrong step, ticks) leaves the state as it is.
            _ => self.clone(),
        }
    }

    fn after_confirm(&self, challenge: &PixChallenge, resp: &PixConfirmResponse) -> PixState {
        let mut challenge = challenge.clone();
        challenge.record_attempts(resp.attempts, resp.max_attempts);
        let message = resp.message.as_deref();
        match resp.status {
            VerificationStatus::Verified => Self::succeeded(),
            VerificationStatus::Processing => PixState {
                step: PixStep::Processing { challenge },
                error: None,
                ..self.clone()
            },
            VerificationStatus::Failed if challenge.is_exhausted() => {
                Self::failed(FailureReason::AttemptsExhausted, None)
            }
            VerificationStatus::Failed => Self::failed(FailureReason::Rejected, message),
            VerificationStatus::Expired => Self::failed(FailureReason::Expired, message),
            VerificationStatus::Awaiting | VerificationStatus::None => {
                if challenge.is_exhausted() {
                    return Self::failed(FailureReason::AttemptsExhausted, None);
                }
                let message = message.map(str::to_string).unwrap_or_else(|| {
                    format!("{} attempts remaining", challenge.attempts_remaining())
                });
                PixState {
                    step: PixStep::DepositInstructions { challenge },
                    error: Some(VerificationError::CodeMismatch(message)),
                    code_input: String::new(),
                    no_code_available: self.no_code_available,
                }
            }
        }
    }

    fn after_failure(&self, err: &VerificationError) -> PixState {
        let live = matches!(
            self.step,
            PixStep::ConfirmPixKey { .. }
                | PixStep::DepositInstructions { .. }
                | PixStep::Processing { .. }
        );
        match err {
            VerificationError::Expired(msg) if live => PixState {
                step: PixStep::Failed {
                    reason: FailureReason::Expired,
                },
                error: Some(VerificationError::Expired(msg.clone())),
                ..PixState::default()
            },
            VerificationError::AttemptsExceeded(msg) if live => PixState {
                step: PixStep::Failed {
                    reason: FailureReason::AttemptsExhausted,
                },
                error: Some(VerificationError::AttemptsExceeded(msg.clone())),
                ..PixState::default()
            },
            other => PixState {
                error: Some(other.clone()),
                ..self.clone()
            },
        }
    }

    fn after_poll(&self, challenge: &PixChallenge, record: &PixVerificationRecord) -> PixState {
        let mut challenge = challenge.clone();
        challenge.record_attempts(record.attempts, record.max_attempts);
        let message = record.message.as_deref();
        match record.status {
            VerificationStatus::Verified => Self::succeeded(),
            VerificationStatus::Failed if challenge.is_exhausted() => {
                Self::failed(FailureReason::AttemptsExhausted, None)
            }
            VerificationStatus::Failed => Self::failed(FailureReason::Rejected, message),
            VerificationStatus::Expired => Self::failed(FailureReason::Expired, message),
            _ if challenge.is_exhausted() => Self::failed(FailureReason::AttemptsExhausted, None),
            VerificationStatus::Awaiting => {
                let message = message.map(str::to_string).unwrap_or_else(|| {
                    format!(
                        "Deposit not matched yet. {} attempts remaining",
                        challenge.attempts_remaining()
                    )
                });
                PixState {
                    step: PixStep::DepositInstructions { challenge },
                    error: Some(VerificationError::CodeMismatch(message)),
                    code_input: String::new(),
                    no_code_available: self.no_code_available,
                }
            }
            VerificationStatus::Processing | VerificationStatus::None => PixState {
                step: PixStep::Processing { challenge },
                ..self.clone()
            },
        }
    }

    fn restore(&self, record: &PixVerificationRecord) -> PixState {
        let challenge = PixChallenge::from_record(record);
        let message = record.message.as_deref();
        match record.status {
            VerificationStatus::Verified => Self::succeeded(),
            VerificationStatus::Failed if challenge.is_exhausted() => {
                Self::failed(FailureReason::AttemptsExhausted, None)
            }
            VerificationStatus::Failed => Self::failed(FailureReason::Rejected, message),
            VerificationStatus::Expired => Self::failed(FailureReason::Expired, message),
            VerificationStatus::Awaiting | VerificationStatus::Processing
                if challenge.is_exhausted() =>
            {
                Self::failed(FailureReason::AttemptsExhausted, None)
            }
            VerificationStatus::Awaiting => PixState {
                step: PixStep::DepositInstructions { challenge },
                ..PixState::default()
            },
            VerificationStatus::Processing => PixState {
                step: PixStep::Processing { challenge },
                ..PixState::default()
            },
            VerificationStatus::None => self.clone(),
        }
    }

    // A challenge past its deadline is dead whatever the server last said.
    fn enforce_deadline(self, now: Timestamp) -> PixState {
        match self.deadline() {
            Some(deadline) if deadline.has_passed(now) => {
                Self::failed(FailureReason::LocalTimeout, None)
            }
            _ => self,
        }
    }

    fn succeeded() -> PixState {
        PixState {
            step: PixStep::Success,
            ..PixState::default()
        }
    }

    fn failed(reason: FailureReason, server_message: Option<&str>) -> PixState {
        PixState {
            step: PixStep::Failed { reason },
            error: Some(reason.error(server_message)),
            ..PixState::default()
        }
    }
}
