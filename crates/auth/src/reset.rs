//! Password-reset tokens.
//!
//! A pending reset is a random, single-use value with a fixed lifetime. Expiry
//! is checked lazily when the token is presented; nothing sweeps stale tokens.

use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

/// Reset tokens are valid for one hour.
pub const RESET_TTL: Duration = Duration::hours(1);

/// Bytes of OS entropy per token (256 bits).
pub const RESET_TOKEN_BYTES: usize = 32;

/// The single pending reset attached to an identity.
///
/// Issuing a new one replaces the previous value, so only the latest token is
/// ever honoured.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReset {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingReset {
    /// Generate a fresh token expiring [`RESET_TTL`] after `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut buf = [0u8; RESET_TOKEN_BYTES];
        OsRng.fill_bytes(&mut buf);
        Self {
            token: hex::encode(buf),
            expires_at: now + RESET_TTL,
        }
    }

    /// True while `now` is strictly before the expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// True if `candidate` is this token and it has not yet expired.
    pub fn accepts(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        self.is_active(now) && constant_time_eq(self.token.as_bytes(), candidate.as_bytes())
    }
}

// Token values never show up in logs.
impl core::fmt::Debug for PendingReset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingReset")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Build the link mailed to the identity.
pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={}",
        frontend_url.trim_end_matches('/'),
        token
    )
}

/// HTML body of the reset mail.
pub fn reset_mail_body(link: &str) -> String {
    format!(
        "<p>You can reset your password here:</p><p><a href=\"{link}\">{link}</a></p>"
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_256_bit_hex() {
        let reset = PendingReset::generate(Utc::now());
        assert_eq!(reset.token.len(), RESET_TOKEN_BYTES * 2);
        assert!(reset.token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique() {
        let now = Utc::now();
        assert_ne!(PendingReset::generate(now).token, PendingReset::generate(now).token);
    }

    #[test]
    fn expires_after_one_hour() {
        let now = Utc::now();
        let reset = PendingReset::generate(now);
        assert_eq!(reset.expires_at, now + Duration::hours(1));
        assert!(reset.is_active(now + Duration::minutes(59)));
        assert!(!reset.is_active(now + Duration::hours(1)));
    }

    #[test]
    fn accepts_only_matching_unexpired_token() {
        let now = Utc::now();
        let reset = PendingReset::generate(now);
        let token = reset.token.clone();

        assert!(reset.accepts(&token, now));
        assert!(!reset.accepts("deadbeef", now));
        assert!(!reset.accepts(&token, now + RESET_TTL + Duration::seconds(1)));
    }

    #[test]
    fn debug_redacts_token() {
        let reset = PendingReset::generate(Utc::now());
        let rendered = format!("{reset:?}");
        assert!(!rendered.contains(&reset.token));
    }

    #[test]
    fn link_joins_frontend_url() {
        assert_eq!(
            reset_link("https://app.example.com/", "abc"),
            "https://app.example.com/reset-password?token=abc"
        );
    }
}
