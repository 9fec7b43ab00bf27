//! Route guard: only fully verified accounts reach protected pages.

use std::sync::Arc;
use url::form_urlencoded;
use vouch_client::{ValidationStatusResponse, VerificationApi};
use vouch_types::{AccountAddress, VerificationError};

use crate::config::GateRoutes;

/// Which verifications an account has completed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountValidationState {
    pub email_verified: bool,
    pub pix_verified: bool,
}

impl AccountValidationState {
    pub fn is_complete(&self) -> bool {
        self.email_verified && self.pix_verified
    }
}

impl From<ValidationStatusResponse> for AccountValidationState {
    fn from(resp: ValidationStatusResponse) -> Self {
        Self {
            email_verified: resp.email_verified,
            pix_verified: resp.pix_verified,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    EmailUnverified,
    PixUnverified,
    /// The status lookup failed; the gate fails closed.
    StatusUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect {
        to: String,
        return_to: Option<String>,
        reason: DenyReason,
    },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Where to navigate, with the return target as a `returnUrl` query
    /// parameter. `None` when access is allowed.
    pub fn target(&self) -> Option<String> {
        let Self::Redirect { to, return_to, .. } = self else {
            return None;
        };
        Some(match return_to {
            Some(back) => {
                let encoded: String = form_urlencoded::byte_serialize(back.as_bytes()).collect();
                let sep = if to.contains('?') { '&' } else { '?' };
                format!("{to}{sep}returnUrl={encoded}")
            }
            None => to.clone(),
        })
    }
}

/// Decide whether `destination` may be shown.
pub fn decide(
    routes: &GateRoutes,
    authenticated: bool,
    state: Result<AccountValidationState, &VerificationError>,
    destination: &str,
) -> GateDecision {
    let redirect = |to: &str, reason| GateDecision::Redirect {
        to: to.to_string(),
        return_to: Some(destination.to_string()),
        reason,
    };
    if !authenticated {
        return GateDecision::Redirect {
            to: routes.entry.clone(),
            return_to: None,
            reason: DenyReason::NotAuthenticated,
        };
    }
    match state {
        Err(_) => redirect(&routes.email, DenyReason::StatusUnavailable),
        Ok(s) if !s.email_verified => redirect(&routes.email, DenyReason::EmailUnverified),
        Ok(s) if !s.pix_verified => redirect(&routes.pix, DenyReason::PixUnverified),
        Ok(_) => GateDecision::Allow,
    }
}

/// Fetches the account's validation status and applies [`decide`].
pub struct ValidationGate<A: VerificationApi> {
    api: Arc<A>,
    routes: GateRoutes,
    last: Option<AccountValidationState>,
}

impl<A: VerificationApi> ValidationGate<A> {
    pub fn new(api: Arc<A>, routes: GateRoutes) -> Self {
        Self {
            api,
            routes,
            last: None,
        }
    }

    /// `account` is `None` when nobody is signed in.
    pub async fn check(&mut self, account: Option<&AccountAddress>, destination: &str) -> GateDecision {
        let Some(address) = account else {
            self.last = None;
            return decide(&self.routes, false, Ok(AccountValidationState::default()), destination);
        };
        let decision = match self.api.validation_status(address).await {
            Ok(resp) => {
                let state = AccountValidationState::from(resp);
                self.last = Some(state);
                decide(&self.routes, true, Ok(state), destination)
            }
            Err(e) => {
                tracing::warn!(error = %e, %address, "validation status unavailable, denying");
                self.last = None;
                decide(&self.routes, true, Err(&e), destination)
            }
        };
        tracing::debug!(%address, destination, allowed = decision.is_allowed(), "gate checked");
        decision
    }

    /// The state from the last successful check.
    pub fn last_state(&self) -> Option<AccountValidationState> {
        self.last
    }

    pub fn logout(&mut self) {
        self.last = None;
    }
}
