//! Storage contracts for identities and roles.
//!
//! The auth services only see these traits. Uniqueness (email and username
//! among non-deleted identities, role names, identity/role pairs) is enforced
//! by the adapter, not by the caller.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use sesame_auth::{Identity, PendingReset, Role, RoleRecord};
use sesame_core::{IdentityId, RoleId};

pub use in_memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate value for '{field}'")]
    Duplicate { field: &'static str },

    #[error("record not found")]
    NotFound,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Identity persistence.
///
/// Identities returned from any lookup carry their role names.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Non-deleted identity whose email or username equals `login`.
    async fn find_by_login(&self, login: &str) -> Result<Option<Identity>, StoreError>;

    /// Non-deleted identity with this email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Identity by id, soft-deleted ones included.
    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError>;

    /// Insert a new identity. Roles on the value are ignored; use `assign_roles`.
    async fn create(&self, identity: Identity) -> Result<Identity, StoreError>;

    /// Persist scalar fields (email, username, hash, profile, flags, pending reset).
    async fn update(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Store `reset` as the only pending reset of the identity.
    async fn set_pending_reset(&self, id: IdentityId, reset: &PendingReset) -> Result<(), StoreError>;

    /// Non-deleted identity holding `token` with an expiry after `now`.
    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, StoreError>;

    /// Atomically swap in `password_hash` and clear the pending reset, but only
    /// if `token` is still pending and unexpired. Returns the identity that was
    /// updated, `None` if the token was already gone.
    async fn redeem_reset(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityId>, StoreError>;

    /// Add role memberships. Pairs that already exist are left alone.
    async fn assign_roles(&self, id: IdentityId, roles: &[RoleId]) -> Result<(), StoreError>;
}

/// Role persistence.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError>;

    async fn find_role(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError>;

    /// Roles whose names appear in `names`; unknown names are skipped.
    async fn find_roles_by_names(&self, names: &[Role]) -> Result<Vec<RoleRecord>, StoreError>;

    async fn create_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError>;

    async fn update_role(&self, role: &RoleRecord) -> Result<(), StoreError>;

    /// Delete a role and its memberships. Returns `false` if it did not exist.
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError>;
}
