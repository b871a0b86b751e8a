//! `sesame-auth`: credential and session logic.
//!
//! This crate is intentionally decoupled from HTTP and storage: hashing,
//! token signing, the role gate and reset tokens are plain functions over
//! plain data.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod password;
pub mod request;
pub mod reset;
pub mod roles;
pub mod token;

pub use authorize::{AuthzError, RoleGate, authorize};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use identity::{Identity, IdentityRole, IdentitySummary, NewIdentity, Profile};
pub use password::{PasswordError, PasswordHasher};
pub use request::{
    Credentials, Password, Registration, RegistrationFields, ResetConsumption, ResetRequest,
    RoleDraft, RolePatch,
};
pub use reset::{PendingReset, RESET_TTL};
pub use roles::{BACKOFFICE, Role, RoleRecord};
pub use token::{Hs256TokenService, SESSION_TTL, TokenError, TokenVerifier};
