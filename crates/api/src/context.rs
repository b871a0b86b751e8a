use sesame_auth::{Role, SessionClaims};
use sesame_core::IdentityId;

/// Authenticated caller, taken from verified token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: SessionClaims,
}

impl PrincipalContext {
    pub fn new(claims: SessionClaims) -> Self {
        Self { claims }
    }

    pub fn identity_id(&self) -> IdentityId {
        self.claims.sub
    }

    pub fn roles(&self) -> &[Role] {
        &self.claims.roles
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }
}
