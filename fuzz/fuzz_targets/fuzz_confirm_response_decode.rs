#![no_main]

use libfuzzer_sys::fuzz_target;
use vouch_client::{PixChallengeResponse, PixConfirmResponse};
use vouch_types::{Cents, Timestamp};
use vouch_verification::{PixChallenge, PixEvent, PixKey, PixState, PixStep};

const NOW: u64 = 1_714_564_800;

fn awaiting_deposit() -> Option<PixState> {
    let key = PixKey::parse("529.982.247-25").ok()?;
    let challenge = PixChallenge::issued(
        &key,
        PixChallengeResponse {
            destination_pix_key: "11222333000181".into(),
            confirmation_value_cents: Cents::new(17),
            confirmation_value_brl: None,
            expires_at: Timestamp::new(NOW + 600),
            attempts: 0,
            max_attempts: 3,
        },
    );
    let now = Timestamp::new(NOW);
    let state = PixState::default()
        .apply(&PixEvent::KeySubmitted(key.as_str().into()), now)
        .apply(&PixEvent::ChallengeIssued(challenge), now)
        .apply(&PixEvent::CodeEdited("A1B".into()), now);
    Some(state)
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary server bodies must decode or fail cleanly.
    let Ok(resp) = serde_json::from_slice::<PixConfirmResponse>(data) else {
        return;
    };
    let Some(state) = awaiting_deposit() else {
        return;
    };

    let next = state.apply(&PixEvent::ConfirmAccepted(resp), Timestamp::new(NOW + 1));
    if let Some(challenge) = next.challenge() {
        assert!(challenge.attempts <= challenge.max_attempts);
    }
    if matches!(next.step, PixStep::Success) {
        assert!(next.error.is_none());
    }
    // Terminal states ignore everything but a reset.
    if next.is_terminal() {
        let again = next.apply(&PixEvent::ClockTick, Timestamp::new(NOW + 10_000));
        assert_eq!(again, next);
    }
});
