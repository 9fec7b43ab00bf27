//! PIX flow end-to-end against nullable infrastructure:
//! key entry → challenge → confirmation → polling → success or failure.
//!
//! Tokio time is paused, so countdowns, poll intervals and the redirect
//! delay run instantly but in the right order.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use vouch_client::{PixChallengeResponse, PixConfirmResponse, PixVerificationRecord};
use vouch_nullables::{Endpoint, NullApi, NullClock, NullSigner};
use vouch_types::{Cents, Clock, Timestamp, VerificationError, VerificationStatus};
use vouch_verification::{
    FailureReason, FlowConfig, PixStep, PixUpdate, PixVerificationFlow, SystemClock,
};

const NOW: u64 = 1_714_564_800;
const WINDOW: u64 = 600;
const VALID_CPF: &str = "529.982.247-25";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    api: Arc<NullApi>,
    signer: Arc<NullSigner>,
    flow: PixVerificationFlow<NullApi>,
}

fn harness_with_clock(clock: Arc<dyn Clock>) -> Harness {
    let api = Arc::new(NullApi::new());
    let signer = Arc::new(NullSigner::new());
    let flow = PixVerificationFlow::new(
        Arc::clone(&api),
        signer.clone(),
        clock,
        FlowConfig::default(),
    );
    Harness { api, signer, flow }
}

fn harness() -> Harness {
    harness_with_clock(Arc::new(SystemClock::starting_at(Timestamp::new(NOW))))
}

fn challenge_response() -> PixChallengeResponse {
    PixChallengeResponse {
        destination_pix_key: "deposit@market.example".into(),
        confirmation_value_cents: Cents::new(17),
        confirmation_value_brl: Some("R$ 0,17".into()),
        expires_at: Timestamp::new(NOW + WINDOW),
        attempts: 0,
        max_attempts: 3,
    }
}

fn confirm_response(
    status: VerificationStatus,
    attempts: u32,
    message: Option<&str>,
) -> PixConfirmResponse {
    PixConfirmResponse {
        status,
        message: message.map(str::to_string),
        attempts,
        max_attempts: 3,
    }
}

fn record(status: VerificationStatus, attempts: u32) -> PixVerificationRecord {
    PixVerificationRecord {
        user_pix_key: "52998224725".into(),
        destination_pix_key: "deposit@market.example".into(),
        confirmation_value_cents: Cents::new(17),
        confirmation_value_brl: Some("R$ 0,17".into()),
        confirmation_code: None,
        attempts,
        max_attempts: 3,
        expires_at: Timestamp::new(NOW + WINDOW),
        status,
        message: None,
    }
}

/// Drive a fresh flow to deposit instructions.
async fn at_deposit_instructions(h: &mut Harness) {
    h.api
        .script_create_pix_verification(Ok(challenge_response()));
    h.flow.submit_key(VALID_CPF);
    h.flow.create_verification().await;
    assert_eq!(h.flow.state().step.name(), "deposit-instructions");
}

/// Pump updates until the state changes.
async fn until_state_changed(flow: &mut PixVerificationFlow<NullApi>) {
    while let Some(update) = flow.next_update().await {
        if update == PixUpdate::StateChanged {
            return;
        }
    }
    panic!("flow went idle without a state change");
}

// ---------------------------------------------------------------------------
// Key entry and challenge issuance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_key_fails_locally() {
    let mut h = harness();
    h.flow.submit_key("12345678901");
    assert!(matches!(h.flow.state().step, PixStep::EnterPix { .. }));
    assert!(matches!(
        h.flow.state().error,
        Some(VerificationError::InvalidKey(_))
    ));
    h.flow.create_verification().await;
    assert!(h.api.calls().is_empty());
    assert!(h.signer.signed_payloads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn challenge_request_is_signed_with_the_key() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;

    let calls = h.api.calls();
    assert_eq!(calls.len(), 1);
    let req = calls[0].request.as_ref().unwrap();
    assert!(req.verify());
    assert_eq!(req.action_label(), Some("Create PIX verification"));
    assert_eq!(req.field("PIX key"), Some("52998224725"));

    let challenge = h.flow.state().challenge().unwrap();
    assert_eq!(challenge.confirmation_value_brl, "R$ 0,17");
    assert_eq!(challenge.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn countdown_ticks_while_instructions_show() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    assert_eq!(
        h.flow.next_update().await,
        Some(PixUpdate::Tick { remaining: WINDOW })
    );
    assert_eq!(
        h.flow.next_update().await,
        Some(PixUpdate::Tick {
            remaining: WINDOW - 1
        })
    );
    assert_eq!(h.flow.remaining_secs(), Some(WINDOW - 1));
}

#[tokio::test]
async fn cancelled_signature_keeps_step() {
    let mut h = harness();
    h.flow.submit_key(VALID_CPF);
    h.signer.cancel_next(true);
    h.flow.create_verification().await;
    assert_eq!(h.flow.state().step.name(), "confirm-pix-key");
    assert_eq!(
        h.flow.state().error,
        Some(VerificationError::SignatureCancelled)
    );
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn edit_key_returns_to_entry() {
    let mut h = harness();
    h.flow.submit_key("52998224725");
    h.flow.edit_key();
    assert!(matches!(
        &h.flow.state().step,
        PixStep::EnterPix { draft } if draft == VALID_CPF
    ));
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn mismatch_keeps_instructions_and_clears_code() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Awaiting,
        1,
        Some("2 attempts remaining"),
    )));

    h.flow.set_code("XYZ");
    h.flow.confirm_deposit().await;

    let state = h.flow.state();
    assert_eq!(state.step.name(), "deposit-instructions");
    assert_eq!(state.code_input, "");
    assert_eq!(
        state.error.as_ref().map(ToString::to_string).as_deref(),
        Some("2 attempts remaining")
    );
    assert_eq!(state.challenge().unwrap().attempts, 1);

    let confirm = h.api.calls().pop().unwrap();
    assert_eq!(confirm.endpoint, Endpoint::ConfirmPixDeposit);
    let req = confirm.request.unwrap();
    assert_eq!(req.field("Confirmation code"), Some("XYZ"));
    assert!(req.payload.starts_with("Confirm PIX deposit\nlocalhost\n"));
}

#[tokio::test(start_paused = true)]
async fn third_mismatch_exhausts_attempts() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    for (attempts, msg) in [(1, "2 attempts remaining"), (2, "1 attempts remaining")] {
        h.api.script_confirm_pix_deposit(Ok(confirm_response(
            VerificationStatus::Awaiting,
            attempts,
            Some(msg),
        )));
    }
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Awaiting,
        3,
        Some("try again"),
    )));

    for code in ["AAA", "BBB", "CCC"] {
        h.flow.set_code(code);
        h.flow.confirm_deposit().await;
    }

    let state = h.flow.state();
    assert_eq!(
        state.step,
        PixStep::Failed {
            reason: FailureReason::AttemptsExhausted
        }
    );
    assert!(matches!(
        &state.error,
        Some(VerificationError::AttemptsExceeded(msg)) if msg != "try again"
    ));
    assert_eq!(h.api.call_count(Endpoint::ConfirmPixDeposit), 3);
    assert_eq!(h.flow.next_update().await, None);
}

#[tokio::test(start_paused = true)]
async fn no_code_submits_sentinel() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    h.flow.set_no_code(true);
    h.flow.confirm_deposit().await;

    let req = h.api.calls().pop().unwrap().request.unwrap();
    assert_eq!(req.field("Confirmation code"), Some("NONE"));
    assert_eq!(h.flow.state().step.name(), "processing");
}

#[tokio::test(start_paused = true)]
async fn empty_code_is_rejected_locally() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.flow.confirm_deposit().await;
    assert!(matches!(
        h.flow.state().error,
        Some(VerificationError::InvalidInput(_))
    ));
    assert_eq!(h.api.call_count(Endpoint::ConfirmPixDeposit), 0);
}

#[tokio::test(start_paused = true)]
async fn http_errors_map_to_steps() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;

    h.api
        .script_confirm_pix_deposit(Err(VerificationError::RateLimited("slow down".into())));
    h.flow.set_code("AAA");
    h.flow.confirm_deposit().await;
    assert_eq!(h.flow.state().step.name(), "deposit-instructions");
    assert_eq!(
        h.flow.state().error,
        Some(VerificationError::RateLimited("slow down".into()))
    );

    h.api.reset();
    h.api
        .script_confirm_pix_deposit(Err(VerificationError::Expired("verification expired".into())));
    h.flow.set_code("AAA");
    h.flow.confirm_deposit().await;
    assert_eq!(
        h.flow.state().step,
        PixStep::Failed {
            reason: FailureReason::Expired
        }
    );
}

// ---------------------------------------------------------------------------
// Expiry, polling and completion
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn deadline_fails_flow_without_server() {
    let clock = Arc::new(NullClock::new(NOW));
    let mut h = harness_with_clock(clock.clone());
    at_deposit_instructions(&mut h).await;

    clock.set(NOW + WINDOW);
    until_state_changed(&mut h.flow).await;

    assert_eq!(
        h.flow.state().step,
        PixStep::Failed {
            reason: FailureReason::LocalTimeout
        }
    );
    assert!(matches!(
        h.flow.state().error,
        Some(VerificationError::Expired(_))
    ));
    assert_eq!(h.api.call_count(Endpoint::ConfirmPixDeposit), 0);
    assert_eq!(h.flow.next_update().await, None);
}

#[tokio::test(start_paused = true)]
async fn poll_verified_then_redirect_after_two_seconds() {
    let mut h = harness();
    h.flow = h.flow.with_return_to("/sell");
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Processing, 1))));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Verified, 1))));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    assert!(h.flow.is_polling());
    let confirmed_at = Instant::now();

    until_state_changed(&mut h.flow).await;
    assert_eq!(h.flow.state().step, PixStep::Success);
    assert!(!h.flow.is_polling());
    let succeeded_at = Instant::now();
    assert_eq!(succeeded_at - confirmed_at, Duration::from_secs(20));

    assert_eq!(
        h.flow.next_update().await,
        Some(PixUpdate::Completed {
            redirect_to: Some("/sell".into())
        })
    );
    assert_eq!(succeeded_at.elapsed(), Duration::from_secs(2));
    assert_eq!(h.api.call_count(Endpoint::PixVerification), 2);
    assert_eq!(h.flow.next_update().await, None);
}

#[tokio::test(start_paused = true)]
async fn poll_rollback_returns_to_instructions() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    let mut rolled_back = record(VerificationStatus::Awaiting, 1);
    rolled_back.message = Some("Deposit not found, check the code".into());
    h.api.script_pix_verification(Ok(Some(rolled_back)));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    until_state_changed(&mut h.flow).await;

    assert_eq!(h.flow.state().step.name(), "deposit-instructions");
    assert_eq!(
        h.flow.state().error,
        Some(VerificationError::CodeMismatch(
            "Deposit not found, check the code".into()
        ))
    );
    assert!(!h.flow.is_polling());
}

#[tokio::test(start_paused = true)]
async fn poll_failures_keep_polling() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    h.api
        .script_pix_verification(Err(VerificationError::ServerError("boom".into())));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Verified, 1))));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    until_state_changed(&mut h.flow).await;
    assert_eq!(h.flow.state().step, PixStep::Success);
    assert_eq!(h.api.call_count(Endpoint::PixVerification), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_stops_polling() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Failed, 1))));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    until_state_changed(&mut h.flow).await;

    assert_eq!(
        h.flow.state().step,
        PixStep::Failed {
            reason: FailureReason::Rejected
        }
    );
    assert!(!h.flow.is_polling());
    assert_eq!(h.flow.next_update().await, None);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.call_count(Endpoint::PixVerification), 1);
}

#[tokio::test(start_paused = true)]
async fn polling_survives_record_without_attempt_budget() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    let mut odd = record(VerificationStatus::Processing, 1);
    odd.max_attempts = 0;
    h.api.script_pix_verification(Ok(Some(odd)));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Verified, 1))));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    let confirmed_at = Instant::now();

    until_state_changed(&mut h.flow).await;
    assert_eq!(h.flow.state().step, PixStep::Success);
    assert_eq!(confirmed_at.elapsed(), Duration::from_secs(20));
    assert_eq!(h.api.call_count(Endpoint::PixVerification), 2);
}

#[tokio::test(start_paused = true)]
async fn verified_confirm_skips_polling() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Verified,
        1,
        None,
    )));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    assert_eq!(h.flow.state().step, PixStep::Success);
    assert!(!h.flow.is_polling());

    let verified_at = Instant::now();
    assert_eq!(
        h.flow.next_update().await,
        Some(PixUpdate::Completed { redirect_to: None })
    );
    assert_eq!(verified_at.elapsed(), Duration::from_secs(2));
    assert_eq!(h.api.call_count(Endpoint::PixVerification), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_polls_never_overlap() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Processing, 1))));
    h.api
        .set_latency(Endpoint::PixVerification, Duration::from_secs(25));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;

    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(120) {
        if h.flow.next_update().await.is_none() {
            break;
        }
    }
    assert!(h.api.call_count(Endpoint::PixVerification) >= 3);
    assert_eq!(h.api.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_discards_in_flight_poll() {
    let mut h = harness();
    at_deposit_instructions(&mut h).await;
    h.api.script_confirm_pix_deposit(Ok(confirm_response(
        VerificationStatus::Processing,
        1,
        None,
    )));
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Verified, 1))));
    h.api
        .set_latency(Endpoint::PixVerification, Duration::from_secs(5));

    h.flow.set_code("A1B");
    h.flow.confirm_deposit().await;
    // The first poll starts at 10 s and answers at 15 s.
    tokio::time::sleep(Duration::from_secs(12)).await;
    h.flow.request_new_verification();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(matches!(h.flow.state().step, PixStep::EnterPix { .. }));
    assert_eq!(h.flow.next_update().await, None);
    assert!(matches!(h.flow.state().step, PixStep::EnterPix { .. }));
}

#[tokio::test(start_paused = true)]
async fn resume_restarts_polling() {
    let mut h = harness();
    h.api
        .script_pix_verification(Ok(Some(record(VerificationStatus::Processing, 2))));
    h.flow.resume().await;
    assert_eq!(h.flow.state().step.name(), "processing");
    assert!(h.flow.is_polling());
    assert_eq!(h.flow.state().challenge().unwrap().attempts, 2);
}

#[tokio::test]
async fn resume_with_nothing_on_record_is_a_no_op() {
    let mut h = harness();
    h.api.script_pix_verification(Ok(None));
    h.flow.resume().await;
    assert!(matches!(h.flow.state().step, PixStep::EnterPix { .. }));
    assert_eq!(h.flow.next_update().await, None);
}
