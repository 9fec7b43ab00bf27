//! Flow timings, signing domain and gate routes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by both verification flows and the gate.
///
/// Every field has a serde default, so a partial TOML table is enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Domain line of every signed envelope.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Seconds between PIX settlement polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds before a new email code may be requested.
    #[serde(default = "default_resend_cooldown_secs")]
    pub resend_cooldown_secs: u64,

    /// How long the email success screen shows before completion fires.
    #[serde(default = "default_email_success_delay_ms")]
    pub email_success_delay_ms: u64,

    /// How long the PIX success screen shows before redirecting.
    #[serde(default = "default_pix_redirect_delay_ms")]
    pub pix_redirect_delay_ms: u64,

    #[serde(default)]
    pub routes: GateRoutes,
}

/// Where the gate sends users who may not pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRoutes {
    #[serde(default = "default_entry_route")]
    pub entry: String,
    #[serde(default = "default_email_route")]
    pub email: String,
    #[serde(default = "default_pix_route")]
    pub pix: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_resend_cooldown_secs() -> u64 {
    180
}

fn default_email_success_delay_ms() -> u64 {
    1500
}

fn default_pix_redirect_delay_ms() -> u64 {
    2000
}

fn default_entry_route() -> String {
    "/".to_string()
}

fn default_email_route() -> String {
    "/account/verify-email".to_string()
}

fn default_pix_route() -> String {
    "/account/verify-pix".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl FlowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn email_success_delay(&self) -> Duration {
        Duration::from_millis(self.email_success_delay_ms)
    }

    pub fn pix_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.pix_redirect_delay_ms)
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            poll_interval_secs: default_poll_interval_secs(),
            resend_cooldown_secs: default_resend_cooldown_secs(),
            email_success_delay_ms: default_email_success_delay_ms(),
            pix_redirect_delay_ms: default_pix_redirect_delay_ms(),
            routes: GateRoutes::default(),
        }
    }
}

impl Default for GateRoutes {
    fn default() -> Self {
        Self {
            entry: default_entry_route(),
            email: default_email_route(),
            pix: default_pix_route(),
        }
    }
}
