//! Terminal front-ends for the two verification flows.
//!
//! Each loop waits on whichever comes first: a line on stdin or a
//! background update from the flow (countdown tick, poll result, redirect).

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use vouch_client::HttpClient;
use vouch_crypto::Signer;
use vouch_utils::format_countdown;
use vouch_verification::{
    EmailState, EmailStep, EmailUpdate, EmailVerificationFlow, FlowConfig, PixState, PixStep, PixUpdate,
    PixVerificationFlow, SystemClock,
};

pub async fn run_email(
    api: Arc<HttpClient>,
    signer: Arc<dyn Signer>,
    config: FlowConfig,
    email: Option<String>,
) -> anyhow::Result<()> {
    let mut flow = EmailVerificationFlow::new(api, signer, Arc::new(SystemClock::new()), config);
    println!("account {}", flow.address());

    flow.resume().await;
    if let Some(email) = email {
        flow.send_code(&email).await;
    }
    render_email(flow.state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                match flow.state().step.clone() {
                    EmailStep::EnterEmail => flow.send_code(input).await,
                    EmailStep::EnterCode { .. } => match input {
                        "resend" => {
                            let wait = flow.resend_remaining();
                            if wait > 0 {
                                println!("resend available in {}", format_countdown(wait));
                            }
                            flow.resend().await;
                        }
                        "change" => flow.change_email(),
                        code => flow.verify_code(code).await,
                    },
                    EmailStep::Success => {}
                }
                render_email(flow.state());
            }
            update = flow.next_update(), if !flow.is_idle() => match update {
                Some(EmailUpdate::ResendTick { remaining }) if remaining % 60 == 0 => {
                    println!("resend available in {}", format_countdown(remaining));
                }
                Some(EmailUpdate::ResendAvailable) => println!("type \"resend\" for a new code"),
                Some(EmailUpdate::Completed) => {
                    println!("email verified");
                    return Ok(());
                }
                Some(EmailUpdate::ResendTick { .. }) | None => {}
            },
        }
    }
    Ok(())
}

fn render_email(state: &EmailState) {
    if let Some(err) = &state.error {
        println!("error: {err}");
    }
    match &state.step {
        EmailStep::EnterEmail => println!("email address:"),
        EmailStep::EnterCode { email } => {
            println!("6-digit code sent to {email} (\"resend\", \"change\"):")
        }
        EmailStep::Success => println!("verified"),
    }
}

pub async fn run_pix(
    api: Arc<HttpClient>,
    signer: Arc<dyn Signer>,
    config: FlowConfig,
    return_to: Option<String>,
) -> anyhow::Result<()> {
    let mut flow = PixVerificationFlow::new(api, signer, Arc::new(SystemClock::new()), config);
    if let Some(url) = return_to {
        flow = flow.with_return_to(url);
    }
    println!("account {}", flow.address());

    flow.resume().await;
    render_pix(flow.state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                match flow.state().step.clone() {
                    PixStep::EnterPix { .. } => flow.submit_key(input),
                    PixStep::ConfirmPixKey { .. } => {
                        if input.eq_ignore_ascii_case("y") {
                            flow.create_verification().await;
                        } else {
                            flow.edit_key();
                        }
                    }
                    PixStep::DepositInstructions { .. } => {
                        if input.eq_ignore_ascii_case("none") {
                            flow.set_no_code(true);
                        } else {
                            flow.set_no_code(false);
                            flow.set_code(input);
                        }
                        flow.confirm_deposit().await;
                    }
                    PixStep::Failed { .. } => {
                        if input.eq_ignore_ascii_case("y") {
                            flow.request_new_verification();
                        }
                    }
                    PixStep::Processing { .. } => println!("still processing, please wait"),
                    PixStep::Success => {}
                }
                render_pix(flow.state());
            }
            update = flow.next_update(), if !flow.is_idle() => match update {
                Some(PixUpdate::Tick { remaining }) if remaining % 60 == 0 || remaining <= 10 => {
                    println!("time left: {}", format_countdown(remaining));
                }
                Some(PixUpdate::StateChanged) => render_pix(flow.state()),
                Some(PixUpdate::Completed { redirect_to }) => {
                    match redirect_to {
                        Some(url) => println!("verified, continue at {url}"),
                        None => println!("verified"),
                    }
                    return Ok(());
                }
                Some(PixUpdate::Tick { .. }) | None => {}
            },
        }
    }
    Ok(())
}

fn render_pix(state: &PixState) {
    if let Some(err) = &state.error {
        println!("error: {err}");
    }
    match &state.step {
        PixStep::EnterPix { .. } => println!("PIX key (CPF or CNPJ):"),
        PixStep::ConfirmPixKey { key } => println!("use {key} as your PIX key? [y/n]"),
        PixStep::DepositInstructions { challenge } => {
            println!(
                "send exactly {} to PIX key {}",
                challenge.confirmation_value_brl, challenge.destination_pix_key
            );
            println!(
                "then type the last 3 characters of the transaction id, or \"none\" ({} attempts left):",
                challenge.attempts_remaining()
            );
        }
        PixStep::Processing { .. } => println!("deposit reported, waiting for the bank..."),
        PixStep::Success => println!("PIX key verified"),
        PixStep::Failed { .. } => println!("verification failed; start over? [y/n]"),
    }
}
