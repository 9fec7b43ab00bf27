//! Wire models for the account verification endpoints.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use vouch_types::time::{rfc3339, rfc3339_deadline};
use vouch_types::{Cents, Timestamp, VerificationStatus};

/// `{status, message?}` returned by the email endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An email verification on record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerificationRecord {
    pub email: String,
    pub status: VerificationStatus,
    #[serde(with = "rfc3339")]
    pub created_at: Timestamp,
}

/// Response to `POST /account/pix/create-verify`: a freshly issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixChallengeResponse {
    pub destination_pix_key: String,
    pub confirmation_value_cents: Cents,
    #[serde(default)]
    pub confirmation_value_brl: Option<String>,
    #[serde(with = "rfc3339_deadline")]
    pub expires_at: Timestamp,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Response to `POST /account/pix/confirm`.
///
/// A 2xx response is not success by itself: `status` decides the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixConfirmResponse {
    #[serde(default)]
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// A PIX verification on record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixVerificationRecord {
    pub user_pix_key: String,
    pub destination_pix_key: String,
    #[serde(
        alias = "confirmation_value",
        deserialize_with = "deserialize_money",
        default
    )]
    pub confirmation_value_cents: Cents,
    #[serde(default)]
    pub confirmation_value_brl: Option<String>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(with = "rfc3339_deadline")]
    pub expires_at: Timestamp,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /account/validation-status/{address}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatusResponse {
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub email_verification_pending: bool,
    #[serde(default)]
    pub pix_verified: bool,
    #[serde(default)]
    pub pix_verification_pending: bool,
}

/// Non-2xx body.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Lookup endpoints answer either a record or `{status: null}`.
///
/// Only a body with no non-null fields reads as "nothing on record"; any
/// other body must decode as a full record or the lookup fails.
#[derive(Debug, Clone)]
pub(crate) enum MaybeRecord<T> {
    Record(T),
    Empty,
}

impl<T> MaybeRecord<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Record(r) => Some(r),
            Self::Empty => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for MaybeRecord<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let empty = match &value {
            serde_json::Value::Null => true,
            serde_json::Value::Object(fields) => fields.values().all(serde_json::Value::is_null),
            _ => false,
        };
        if empty {
            return Ok(Self::Empty);
        }
        T::deserialize(value)
            .map(Self::Record)
            .map_err(<D::Error as serde::de::Error>::custom)
    }
}

fn default_max_attempts() -> u32 {
    3
}

/// Money arrives as integer cents, or as reais (`0.13` / `"0,13"`).
fn deserialize_money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Cents(u64),
        Reais(f64),
        Text(String),
    }

    let cents = match Raw::deserialize(deserializer)? {
        Raw::Cents(c) => c,
        Raw::Reais(r) if r >= 0.0 => (r * 100.0).round() as u64,
        Raw::Reais(r) => {
            return Err(serde::de::Error::custom(format!("negative amount {r}")));
        }
        Raw::Text(t) => {
            let normalized = t.trim().trim_start_matches("R$").trim().replace(',', ".");
            let reais: f64 = normalized
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid amount {t:?}")))?;
            (reais * 100.0).round() as u64
        }
    };
    Ok(Cents::new(cents))
}
