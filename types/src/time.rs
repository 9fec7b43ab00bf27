//! Timestamp type and clock abstraction.
//!
//! Timestamps are Unix epoch seconds (UTC). Countdowns and expiry checks are
//! evaluated at one-second resolution, so nothing finer is kept.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// This timestamp shifted forward by `secs`.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds left until this timestamp is reached, zero once it has passed.
    pub fn secs_until(&self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0)
    }

    /// Whether `now` is at or past this timestamp.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now.0 >= self.0
    }

    /// Parse an RFC 3339 / ISO-8601 string, truncating to whole seconds.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        let parsed = DateTime::parse_from_rfc3339(s).ok()?;
        let secs = parsed.timestamp();
        (secs >= 0).then(|| Self(secs as u64))
    }

    /// Like [`parse_rfc3339`](Self::parse_rfc3339) but rounds any fraction
    /// up, so a deadline never lands before the instant it names.
    pub fn parse_rfc3339_ceil(s: &str) -> Option<Self> {
        let parsed = DateTime::parse_from_rfc3339(s).ok()?;
        let secs = parsed.timestamp();
        let carry = i64::from(parsed.timestamp_subsec_nanos() > 0);
        let secs = secs.checked_add(carry)?;
        (secs >= 0).then(|| Self(secs as u64))
    }

    /// Format as ISO-8601 with millisecond precision and a `Z` suffix,
    /// e.g. `2024-05-01T12:00:00.000Z`.
    pub fn to_iso8601(&self) -> String {
        let dt = DateTime::<Utc>::from_timestamp(self.0 as i64, 0).unwrap_or_default();
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso8601())
    }
}

/// Source of the current time.
///
/// Flows read time only through this trait so tests can drive expiry
/// deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Serde adapter for timestamps carried as RFC 3339 strings on the wire.
///
/// Bare integers are also accepted and read as Unix seconds.
pub mod rfc3339 {
    use super::Timestamp;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_iso8601())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        deserializer.deserialize_any(super::visitor::TsVisitor {
            parse: Timestamp::parse_rfc3339,
        })
    }
}

/// [`rfc3339`] for deadlines: fractional seconds round up.
pub mod rfc3339_deadline {
    use super::Timestamp;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        super::rfc3339::serialize(ts, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        deserializer.deserialize_any(super::visitor::TsVisitor {
            parse: Timestamp::parse_rfc3339_ceil,
        })
    }
}

mod visitor {
    use super::Timestamp;
    use serde::de::{self, Visitor};
    use std::fmt;

    pub(super) struct TsVisitor {
        pub parse: fn(&str) -> Option<Timestamp>,
    }

    impl<'de> Visitor<'de> for TsVisitor {
        type Value = Timestamp;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "an RFC 3339 timestamp or Unix seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            (self.parse)(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Timestamp::new(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(Timestamp::new)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso8601_has_millis_and_z() {
        let ts = Timestamp::new(1_714_564_800);
        assert_eq!(ts.to_iso8601(), "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn parse_accepts_offsets_and_fractions() {
        let a = Timestamp::parse_rfc3339("2024-05-01T12:00:00.250Z").unwrap();
        let b = Timestamp::parse_rfc3339("2024-05-01T09:00:00-03:00").unwrap();
        assert_eq!(a, Timestamp::new(1_714_564_800));
        assert_eq!(a, b);
        assert!(Timestamp::parse_rfc3339("yesterday").is_none());
    }

    #[test]
    fn deadline_parse_rounds_fractions_up() {
        assert_eq!(
            Timestamp::parse_rfc3339_ceil("2024-05-01T12:00:00.900Z"),
            Some(Timestamp::new(1_714_564_801))
        );
        assert_eq!(
            Timestamp::parse_rfc3339_ceil("2024-05-01T12:00:00.001Z"),
            Some(Timestamp::new(1_714_564_801))
        );
        assert_eq!(
            Timestamp::parse_rfc3339_ceil("2024-05-01T12:00:00Z"),
            Some(Timestamp::new(1_714_564_800))
        );
    }

    #[test]
    fn secs_until_saturates() {
        let deadline = Timestamp::new(100);
        assert_eq!(deadline.secs_until(Timestamp::new(40)), 60);
        assert_eq!(deadline.secs_until(Timestamp::new(100)), 0);
        assert_eq!(deadline.secs_until(Timestamp::new(500)), 0);
        assert!(deadline.has_passed(Timestamp::new(100)));
        assert!(!deadline.has_passed(Timestamp::new(99)));
    }

    #[test]
    fn wire_format_accepts_string_or_integer() {
        #[derive(serde::Deserialize)]
        struct Wire {
            #[serde(with = "super::rfc3339")]
            at: Timestamp,
        }
        let s: Wire = serde_json::from_str(r#"{"at":"2024-05-01T12:00:00Z"}"#).unwrap();
        let n: Wire = serde_json::from_str(r#"{"at":1714564800}"#).unwrap();
        assert_eq!(s.at, n.at);
    }

    #[test]
    fn deadline_wire_format_rounds_up() {
        #[derive(serde::Deserialize)]
        struct Wire {
            #[serde(with = "super::rfc3339_deadline")]
            expires_at: Timestamp,
        }
        let w: Wire =
            serde_json::from_str(r#"{"expires_at":"2024-05-01T12:30:00.900Z"}"#).unwrap();
        assert_eq!(w.expires_at, Timestamp::new(1_714_566_601));
        let n: Wire = serde_json::from_str(r#"{"expires_at":1714566600}"#).unwrap();
        assert_eq!(n.expires_at, Timestamp::new(1_714_566_600));
    }
}
