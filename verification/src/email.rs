//! Email ownership verification: send a one-time code, echo it back.

use std::sync::Arc;
use vouch_client::{Action, EmailVerificationRecord, Envelope, VerificationApi};
use vouch_crypto::Signer;
use vouch_types::{AccountAddress, Clock, Timestamp, VerificationError, VerificationStatus};

use crate::config::FlowConfig;
use crate::countdown::{CountdownTimer, TimerEvent};
use crate::tasks::{DelayedSignal, SignalBus, TaskSlot, Tagged};

const CODE_LEN: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailStep {
    EnterEmail,
    EnterCode { email: String },
    Success,
}

impl EmailStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnterEmail => "enter-email",
            Self::EnterCode { .. } => "enter-code",
            Self::Success => "success",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailEvent {
    CodeSent(String),
    CodeEdited(String),
    Verified,
    Failed(VerificationError),
    ChangeEmail,
    Restored(EmailVerificationRecord),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailState {
    pub step: EmailStep,
    pub code_input: String,
    pub error: Option<VerificationError>,
}

impl Default for EmailState {
    fn default() -> Self {
        Self {
            step: EmailStep::EnterEmail,
            code_input: String::new(),
            error: None,
        }
    }
}

impl EmailState {
    pub fn email(&self) -> Option<&str> {
        match &self.step {
            EmailStep::EnterCode { email } => Some(email),
            _ => None,
        }
    }

    pub fn apply(&self, event: &EmailEvent) -> EmailState {
        match (&self.step, event) {
            (EmailStep::Success, _) => self.clone(),

            (_, EmailEvent::CodeSent(email)) => EmailState {
                step: EmailStep::EnterCode {
                    email: email.clone(),
                },
                ..EmailState::default()
            },

            (EmailStep::EnterCode { .. }, EmailEvent::CodeEdited(code)) => EmailState {
                code_input: code.trim().to_string(),
                ..self.clone()
            },

            (EmailStep::EnterCode { .. }, EmailEvent::Verified) => EmailState {
                step: EmailStep::Success,
                ..EmailState::default()
            },

            (_, EmailEvent::Failed(err)) => EmailState {
                step: self.step.clone(),
                code_input: String::new(),
                error: Some(err.clone()),
            },

            (EmailStep::EnterCode { .. }, EmailEvent::ChangeEmail) => EmailState::default(),

            (EmailStep::EnterEmail, EmailEvent::Restored(record)) => match record.status {
                VerificationStatus::Verified => EmailState {
                    step: EmailStep::Success,
                    ..EmailState::default()
                },
                VerificationStatus::Awaiting => EmailState {
                    step: EmailStep::EnterCode {
                        email: record.email.clone(),
                    },
                    ..EmailState::default()
                },
                _ => self.clone(),
            },

            _ => self.clone(),
        }
    }
}

/// One `@`, a non-empty local part, a dotted domain, no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug)]
enum EmailSignal {
    Resend(TimerEvent),
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailUpdate {
    /// Seconds until a new code may be requested.
    ResendTick { remaining: u64 },
    ResendAvailable,
    /// The success screen has been shown long enough.
    Completed,
}

pub struct EmailVerificationFlow<A: VerificationApi + 'static> {
    api: Arc<A>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    config: FlowConfig,
    address: AccountAddress,
    state: EmailState,
    bus: SignalBus<EmailSignal>,
    resend: TaskSlot<CountdownTimer>,
    resend_deadline: Option<Timestamp>,
    completion: TaskSlot<DelayedSignal>,
}

impl<A: VerificationApi + 'static> EmailVerificationFlow<A> {
    pub fn new(
        api: Arc<A>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
        config: FlowConfig,
    ) -> Self {
        let address = AccountAddress::from(&signer.public_key());
        Self {
            api,
            signer,
            clock,
            config,
            address,
            state: EmailState::default(),
            bus: SignalBus::new(),
            resend: TaskSlot::empty(),
            resend_deadline: None,
            completion: TaskSlot::empty(),
        }
    }

    pub fn state(&self) -> &EmailState {
        &self.state
    }

    pub fn address(&self) -> &AccountAddress {
        &self.address
    }

    /// Seconds until [`resend`](Self::resend) does anything.
    pub fn resend_remaining(&self) -> u64 {
        self.resend_deadline
            .map(|d| d.secs_until(self.clock.now()))
            .unwrap_or(0)
    }

    pub async fn send_code(&mut self, email: &str) {
        if self.state.step == EmailStep::Success {
            return;
        }
        let email = email.trim().to_string();
        if !is_plausible_email(&email) {
            self.apply(EmailEvent::Failed(VerificationError::InvalidInput(
                "Enter a valid email address".into(),
            )));
            return;
        }

        let sent = async {
            let req = self
                .envelope(Action::SendEmailCode)
                .field("Email", &email)
                .sign(self.signer.as_ref())
                .await?;
            self.api.send_email_code(&req).await
        }
        .await;

        match sent {
            Ok(resp) if resp.status == VerificationStatus::Failed => {
                let message = resp
                    .message
                    .unwrap_or_else(|| "Could not send the verification code".into());
                self.apply(EmailEvent::Failed(VerificationError::ServerError(message)));
            }
            Ok(_) => {
                tracing::info!(address = %self.address, "verification code sent");
                self.apply(EmailEvent::CodeSent(email));
                self.start_resend_cooldown();
            }
            Err(e) => {
                tracing::warn!(error = %e, "send code failed");
                self.apply(EmailEvent::Failed(e));
            }
        }
    }

    pub fn set_code(&mut self, code: &str) {
        self.apply(EmailEvent::CodeEdited(code.to_string()));
    }

    pub async fn verify_code(&mut self, code: &str) {
        if !matches!(self.state.step, EmailStep::EnterCode { .. }) {
            return;
        }
        let code = code.trim().to_string();
        if !is_valid_code(&code) {
            self.apply(EmailEvent::Failed(VerificationError::InvalidInput(
                "The code has 6 digits".into(),
            )));
            return;
        }

        let verified = async {
            let req = self
                .envelope(Action::VerifyEmailCode)
                .field("Code", &code)
                .sign(self.signer.as_ref())
                .await?;
            self.api.verify_email_code(&req).await
        }
        .await;

        match verified {
            Ok(resp) if resp.status == VerificationStatus::Verified => {
                tracing::info!(address = %self.address, "email verified");
                self.apply(EmailEvent::Verified);
                self.resend.clear();
                self.resend_deadline = None;
                self.schedule_completion();
            }
            Ok(resp) => {
                tracing::debug!(status = %resp.status, "code not accepted");
                let message = resp.message.unwrap_or_else(|| "Invalid code".into());
                self.apply(EmailEvent::Failed(VerificationError::CodeMismatch(message)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "verify code failed");
                self.apply(EmailEvent::Failed(e));
            }
        }
    }

    /// Request another code for the same address once the cooldown is over.
    pub async fn resend(&mut self) {
        let remaining = self.resend_remaining();
        if remaining > 0 {
            tracing::debug!(remaining, "resend ignored during cooldown");
            return;
        }
        if let Some(email) = self.state.email().map(str::to_string) {
            self.send_code(&email).await;
        }
    }

    pub fn change_email(&mut self) {
        self.apply(EmailEvent::ChangeEmail);
        self.resend.clear();
        self.resend_deadline = None;
    }

    /// Pick up a code sent in an earlier session.
    pub async fn resume(&mut self) {
        if self.state.step != EmailStep::EnterEmail {
            return;
        }
        match self.api.email_verification(&self.address).await {
            Ok(Some(record)) => {
                tracing::info!(status = %record.status, "resuming email verification");
                self.apply(EmailEvent::Restored(record));
                if self.state.step == EmailStep::Success {
                    self.schedule_completion();
                }
            }
            Ok(None) => tracing::debug!("no email verification on record"),
            Err(e) => tracing::warn!(error = %e, "email verification lookup failed"),
        }
    }

    /// Wait for the next background signal. `None` once nothing is running.
    pub async fn next_update(&mut self) -> Option<EmailUpdate> {
        loop {
            let tagged = match self.bus.try_recv() {
                Some(tagged) => tagged,
                None if self.is_idle() => return None,
                None => self.bus.recv().await?,
            };
            if let Some(update) = self.handle(tagged) {
                return Some(update);
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.resend.is_empty() && self.completion.is_empty()
    }

    fn handle(&mut self, tagged: Tagged<EmailSignal>) -> Option<EmailUpdate> {
        let Tagged { task, signal } = tagged;
        match signal {
            EmailSignal::Resend(event) => {
                if !self.resend.holds(task) {
                    return None;
                }
                match event {
                    TimerEvent::Tick { remaining } => Some(EmailUpdate::ResendTick { remaining }),
                    TimerEvent::Expired => {
                        self.resend.clear();
                        Some(EmailUpdate::ResendAvailable)
                    }
                }
            }
            EmailSignal::Completed => {
                if !self.completion.holds(task) {
                    return None;
                }
                self.completion.clear();
                Some(EmailUpdate::Completed)
            }
        }
    }

    fn envelope(&self, action: Action) -> Envelope {
        Envelope::new(action, self.config.domain.clone(), self.clock.now())
    }

    fn apply(&mut self, event: EmailEvent) {
        let from = self.state.step.name();
        self.state = self.state.apply(&event);
        let to = self.state.step.name();
        if from != to {
            tracing::info!(from, to, "email step changed");
        }
    }

    fn start_resend_cooldown(&mut self) {
        let deadline = self.clock.now().plus_secs(self.config.resend_cooldown_secs);
        let id = self.bus.next_id();
        let send = self.bus.sender(id);
        let timer = CountdownTimer::start(deadline, Arc::clone(&self.clock), move |event| {
            send(EmailSignal::Resend(event))
        });
        self.resend.set(id, timer);
        self.resend_deadline = Some(deadline);
    }

    fn schedule_completion(&mut self) {
        let id = self.bus.next_id();
        let send = self.bus.sender(id);
        let delayed = DelayedSignal::schedule(self.config.email_success_delay(), move || {
            send(EmailSignal::Completed)
        });
        self.completion.set(id, delayed);
    }
}
