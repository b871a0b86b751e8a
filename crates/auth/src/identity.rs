//! Identity model.
//!
//! An identity is never hard-deleted; `deleted` hides it from login and from
//! the uniqueness checks on email and username.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use sesame_core::{IdentityId, RoleId};

use crate::reset::PendingReset;
use crate::roles::Role;

/// Optional profile fields carried alongside the credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub salutation: Option<String>,
    pub title: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub holiday_days: i32,
}

/// A registered principal as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub profile: Profile,
    pub deleted: bool,
    pub pending_reset: Option<PendingReset>,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary::from(self)
    }

    /// Replace the stored hash and drop any pending reset.
    pub fn set_password_hash(&mut self, hash: String, now: DateTime<Utc>) {
        self.password_hash = hash;
        self.pending_reset = None;
        self.updated_at = now;
    }
}

/// Input for creating an identity; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub profile: Profile,
}

impl NewIdentity {
    pub fn into_identity(self, id: IdentityId, now: DateTime<Utc>) -> Identity {
        Identity {
            id,
            email: self.email,
            username: self.username,
            password_hash: self.password_hash,
            profile: self.profile,
            deleted: false,
            pending_reset: None,
            roles: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public view of an identity. Never carries the hash or reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub id: IdentityId,
    pub email: String,
    pub username: String,
    #[serde(flatten)]
    pub profile: Profile,
    pub roles: Vec<Role>,
}

impl From<&Identity> for IdentitySummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            profile: identity.profile.clone(),
            roles: identity.roles.clone(),
        }
    }
}

/// Join row between an identity and a role. Unique per pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityRole {
    pub identity_id: IdentityId,
    pub role_id: RoleId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Identity {
        NewIdentity {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            profile: Profile {
                firstname: Some("Alice".to_string()),
                ..Profile::default()
            },
        }
        .into_identity(IdentityId::new(), now)
    }

    #[test]
    fn new_identity_starts_active_without_roles() {
        let identity = sample(Utc::now());
        assert!(!identity.deleted);
        assert!(identity.roles.is_empty());
        assert!(identity.pending_reset.is_none());
    }

    #[test]
    fn summary_omits_secret() {
        let mut identity = sample(Utc::now());
        identity.roles.push(Role::new("editor"));

        let json = serde_json::to_value(identity.summary()).unwrap();
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["firstname"], "Alice");
        assert_eq!(json["roles"][0], "editor");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("pending_reset").is_none());
    }

    #[test]
    fn set_password_hash_clears_pending_reset() {
        let now = Utc::now();
        let mut identity = sample(now);
        identity.pending_reset = Some(PendingReset::generate(now));

        identity.set_password_hash("$2b$04$other".to_string(), now);

        assert_eq!(identity.password_hash, "$2b$04$other");
        assert!(identity.pending_reset.is_none());
    }
}
