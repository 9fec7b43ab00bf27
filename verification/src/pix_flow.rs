//! Async driver for the PIX micro-deposit verification.
//!
//! The driver owns the [`PixState`] and every task the current step needs:
//! the deposit-expiry countdown while a challenge is live, the settlement
//! poller while the server is processing, and the redirect delay after
//! success. Tasks report back through the flow's signal bus; the caller
//! pumps [`PixVerificationFlow::next_update`] to apply them.

use std::sync::Arc;
use vouch_client::{Action, Envelope, PixVerificationRecord, VerificationApi, NO_CODE_SENTINEL};
use vouch_crypto::Signer;
use vouch_types::{AccountAddress, Clock, Timestamp, VerificationError, VerificationStatus};

use crate::config::FlowConfig;
use crate::countdown::{CountdownTimer, TimerEvent};
use crate::pix_machine::{PixChallenge, PixEvent, PixState, PixStep};
use crate::poller::{ChallengePoller, PollControl};
use crate::tasks::{DelayedSignal, SignalBus, TaskSlot, Tagged};

#[derive(Debug)]
enum PixSignal {
    Countdown(TimerEvent),
    Poll(PixVerificationRecord),
    Completed,
}

/// What changed after a background signal was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixUpdate {
    /// Seconds left on the deposit window.
    Tick { remaining: u64 },
    /// The state changed; read it with [`PixVerificationFlow::state`].
    StateChanged,
    /// The success screen has been shown long enough; navigate away.
    Completed { redirect_to: Option<String> },
}

pub struct PixVerificationFlow<A: VerificationApi + 'static> {
    api: Arc<A>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    config: FlowConfig,
    address: AccountAddress,
    return_to: Option<String>,
    state: PixState,
    bus: SignalBus<PixSignal>,
    countdown: TaskSlot<CountdownTimer>,
    poller: TaskSlot<ChallengePoller>,
    completion: TaskSlot<DelayedSignal>,
    completion_scheduled: bool,
    remaining: Option<u64>,
}

impl<A: VerificationApi + 'static> PixVerificationFlow<A> {
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
            return_to: None,
            state: PixState::default(),
            bus: SignalBus::new(),
            countdown: TaskSlot::empty(),
            poller: TaskSlot::empty(),
            completion: TaskSlot::empty(),
            completion_scheduled: false,
            remaining: None,
        }
    }

    /// Where to send the user once verification completes.
    pub fn with_return_to(mut self, url: impl Into<String>) -> Self {
        self.return_to = Some(url.into());
        self
    }

    pub fn state(&self) -> &PixState {
        &self.state
    }

    pub fn address(&self) -> &AccountAddress {
        &self.address
    }

    /// Seconds left on the deposit window, as of the last tick.
    pub fn remaining_secs(&self) -> Option<u64> {
        self.remaining
    }

    pub fn is_polling(&self) -> bool {
        self.poller.get().is_some_and(ChallengePoller::is_active)
    }

    pub fn submit_key(&mut self, raw: &str) {
        self.apply(PixEvent::KeySubmitted(raw.to_string()));
    }

    pub fn edit_key(&mut self) {
        self.apply(PixEvent::EditKey);
    }

    /// Issue a micro-deposit challenge for the confirmed key.
    pub async fn create_verification(&mut self) {
        let PixStep::ConfirmPixKey { key } = &self.state.step else {
            return;
        };
        let key = key.clone();
        let issued = async {
            let req = self
                .envelope(Action::CreatePixVerification)
                .field("PIX key", key.as_str())
                .sign(self.signer.as_ref())
                .await?;
            self.api.create_pix_verification(&req).await
        }
        .await;
        match issued {
            Ok(resp) => {
                tracing::info!(expires_at = %resp.expires_at, "pix challenge issued");
                self.apply(PixEvent::ChallengeIssued(PixChallenge::issued(&key, resp)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "pix challenge request failed");
                self.apply(PixEvent::RequestFailed(e));
            }
        }
    }

    pub fn set_code(&mut self, code: &str) {
        self.apply(PixEvent::CodeEdited(code.to_string()));
    }

    pub fn set_no_code(&mut self, no_code: bool) {
        self.apply(PixEvent::NoCodeToggled(no_code));
    }

    /// Submit the confirmation code (or the no-code sentinel).
    ///
    /// Any poller is cancelled before the request goes out, so a poll
    /// result can never be applied on top of this confirmation.
    pub async fn confirm_deposit(&mut self) {
        if !matches!(self.state.step, PixStep::DepositInstructions { .. }) {
            return;
        }
        self.poller.clear();
        self.apply(PixEvent::ClockTick);
        if !matches!(self.state.step, PixStep::DepositInstructions { .. }) {
            return;
        }

        let code = if self.state.no_code_available {
            NO_CODE_SENTINEL.to_string()
        } else if self.state.code_input.is_empty() {
            self.apply(PixEvent::RequestFailed(VerificationError::InvalidInput(
                "Enter the confirmation code from your deposit receipt".into(),
            )));
            return;
        } else {
            self.state.code_input.clone()
        };

        let confirmed = async {
            let req = self
                .envelope(Action::ConfirmPixDeposit)
                .field("Confirmation code", &code)
                .sign(self.signer.as_ref())
                .await?;
            self.api.confirm_pix_deposit(&req).await
        }
        .await;
        self.poller.clear();
        match confirmed {
            Ok(resp) => {
                tracing::debug!(status = %resp.status, attempts = resp.attempts, "deposit confirmation answered");
                self.apply(PixEvent::ConfirmAccepted(resp));
            }
            Err(e) => {
                tracing::warn!(error = %e, "deposit confirmation failed");
                self.apply(PixEvent::RequestFailed(e));
            }
        }
    }

    /// Pick up a verification started in an earlier session.
    pub async fn resume(&mut self) {
        if !matches!(
            self.state.step,
            PixStep::EnterPix { .. } | PixStep::ConfirmPixKey { .. }
        ) {
            return;
        }
        match self.api.pix_verification(&self.address).await {
            Ok(Some(record)) => {
                tracing::info!(status = %record.status, "resuming pix verification");
                self.apply(PixEvent::Restored(record));
            }
            Ok(None) => tracing::debug!("no pix verification on record"),
            Err(e) => tracing::warn!(error = %e, "pix verification lookup failed"),
        }
    }

    /// Start over: back to key entry with every task cancelled.
    pub fn request_new_verification(&mut self) {
        self.apply(PixEvent::Reset);
    }

    /// Wait for the next background signal and apply it.
    ///
    /// Returns `None` once no task is left that could produce one.
    pub async fn next_update(&mut self) -> Option<PixUpdate> {
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

    /// No timer, poller or pending redirect is left running.
    pub fn is_idle(&self) -> bool {
        self.countdown.is_empty() && self.poller.is_empty() && self.completion.is_empty()
    }

    fn handle(&mut self, tagged: Tagged<PixSignal>) -> Option<PixUpdate> {
        let Tagged { task, signal } = tagged;
        match signal {
            PixSignal::Countdown(event) => {
                if !self.countdown.holds(task) {
                    tracing::debug!(task, "dropping stale countdown signal");
                    return None;
                }
                match event {
                    TimerEvent::Tick { remaining } => {
                        self.remaining = Some(remaining);
                        Some(PixUpdate::Tick { remaining })
                    }
                    TimerEvent::Expired => {
                        self.remaining = Some(0);
                        self.countdown.clear();
                        let now = match self.state.deadline() {
                            Some(deadline) => self.clock.now().max(deadline),
                            None => self.clock.now(),
                        };
                        self.apply_at(PixEvent::ClockTick, now);
                        Some(PixUpdate::StateChanged)
                    }
                }
            }
            PixSignal::Poll(record) => {
                if !self.poller.holds(task) {
                    tracing::debug!(task, "dropping stale poll result");
                    return None;
                }
                let before = self.state.clone();
                self.apply(PixEvent::Polled(record));
                if self.poller.get().is_some_and(|p| !p.is_active()) {
                    // Ended on its own while the state still wants one.
                    self.poller.clear();
                    self.sync_tasks();
                }
                (self.state != before).then_some(PixUpdate::StateChanged)
            }
            PixSignal::Completed => {
                if !self.completion.holds(task) {
                    return None;
                }
                self.completion.clear();
                Some(PixUpdate::Completed {
                    redirect_to: self.return_to.clone(),
                })
            }
        }
    }

    fn envelope(&self, action: Action) -> Envelope {
        Envelope::new(action, self.config.domain.clone(), self.clock.now())
    }

    fn apply(&mut self, event: PixEvent) {
        let now = self.clock.now();
        self.apply_at(event, now);
    }

    fn apply_at(&mut self, event: PixEvent, now: Timestamp) {
        let from = self.state.step.name();
        self.state = self.state.apply(&event, now);
        let to = self.state.step.name();
        if from != to {
            tracing::info!(from, to, "pix step changed");
        }
        self.sync_tasks();
    }

    // Start or stop background tasks to match the current step.
    fn sync_tasks(&mut self) {
        let deadline = self.state.deadline();
        match self.state.step {
            PixStep::DepositInstructions { .. } => {
                self.poller.clear();
                if let Some(deadline) = deadline {
                    self.ensure_countdown(deadline);
                }
            }
            PixStep::Processing { .. } => {
                if let Some(deadline) = deadline {
                    self.ensure_countdown(deadline);
                }
                self.ensure_poller();
            }
            PixStep::Success => {
                self.countdown.clear();
                self.poller.clear();
                self.remaining = None;
                self.ensure_completion();
            }
            _ => {
                self.countdown.clear();
                self.poller.clear();
                self.completion.clear();
                self.completion_scheduled = false;
                self.remaining = None;
            }
        }
    }

    fn ensure_countdown(&mut self, deadline: Timestamp) {
        if self.countdown.get().is_some_and(|t| t.deadline() == deadline) {
            return;
        }
        let id = self.bus.next_id();
        let send = self.bus.sender(id);
        let timer = CountdownTimer::start(deadline, Arc::clone(&self.clock), move |event| {
            send(PixSignal::Countdown(event))
        });
        self.countdown.set(id, timer);
    }

    fn ensure_poller(&mut self) {
        if !self.poller.is_empty() {
            return;
        }
        let id = self.bus.next_id();
        let send = self.bus.sender(id);
        let api = Arc::clone(&self.api);
        let address = self.address.clone();
        let poller = ChallengePoller::start(
            self.config.poll_interval(),
            move || {
                let api = Arc::clone(&api);
                let address = address.clone();
                async move { api.pix_verification(&address).await }
            },
            move |record: Option<PixVerificationRecord>| {
                let Some(record) = record else {
                    return PollControl::Continue;
                };
                // Terminal and awaiting records always leave processing.
                // Otherwise the flow drops the poller when the step changes.
                let stop = record.status.is_terminal()
                    || record.status == VerificationStatus::Awaiting;
                send(PixSignal::Poll(record));
                if stop {
                    PollControl::Stop
                } else {
                    PollControl::Continue
                }
            },
        );
        tracing::debug!(task = id, "settlement polling started");
        self.poller.set(id, poller);
    }

    fn ensure_completion(&mut self) {
        if self.completion_scheduled {
            return;
        }
        let id = self.bus.next_id();
        let send = self.bus.sender(id);
        let delayed = DelayedSignal::schedule(self.config.pix_redirect_delay(), move || {
            send(PixSignal::Completed)
        });
        self.completion.set(id, delayed);
        self.completion_scheduled = true;
    }
}

impl<A: VerificationApi + 'static> std::fmt::Debug for PixVerificationFlow<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixVerificationFlow")
            .field("address", &self.address)
            .field("step", &self.state.step.name())
            .field("polling", &!self.poller.is_empty())
            .finish()
    }
}
