//! Email and PIX verification flows.
//!
//! Two challenge-response stages prove an account controls:
//! 1. **An email address**: a six-digit code is mailed and echoed back.
//! 2. **A PIX key**: the user deposits a randomized amount to a system key and
//!    reports the last characters of the transaction id.
//!
//! Each flow is a pure state machine plus an async driver that owns the
//! countdowns and pollers its current step needs. [`ValidationGate`] turns
//! the combined result into an allow or redirect decision.

pub mod clock;
pub mod config;
pub mod countdown;
pub mod email;
pub mod gate;
pub mod pix_flow;
pub mod pix_key;
pub mod pix_machine;
pub mod poller;
mod tasks;

pub use clock::SystemClock;
pub use config::{FlowConfig, GateRoutes};
pub use countdown::{seconds_remaining, Countdown, CountdownTick, CountdownTimer, TimerEvent};
pub use email::{EmailState, EmailStep, EmailUpdate, EmailVerificationFlow};
pub use gate::{decide, AccountValidationState, DenyReason, GateDecision, ValidationGate};
pub use pix_flow::{PixUpdate, PixVerificationFlow};
pub use pix_key::{PixKey, PixKeyKind};
pub use pix_machine::{FailureReason, PixChallenge, PixEvent, PixState, PixStep};
pub use poller::{ChallengePoller, PollControl};
