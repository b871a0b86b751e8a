//! Authentication, registration and password-reset orchestration.
//!
//! Every operation takes `now` from the caller so expiry decisions are
//! deterministic under test.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use sesame_auth::reset::{reset_link, reset_mail_body};
use sesame_auth::{
    BACKOFFICE, Credentials, Hs256TokenService, IdentitySummary, NewIdentity, Password,
    PendingReset, Profile, Registration, ResetConsumption, ResetRequest, Role, RoleRecord,
    SessionClaims, TokenVerifier,
};
use sesame_core::{IdentityId, RoleId};

use crate::credentials::CredentialVerifier;
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::store::{IdentityStore, RoleStore};

pub const RESET_MAIL_SUBJECT: &str = "Password reset";

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub identity: IdentitySummary,
}

pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    roles: Arc<dyn RoleStore>,
    notifier: Arc<dyn Notifier>,
    credentials: CredentialVerifier,
    tokens: Arc<Hs256TokenService>,
    frontend_url: String,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        roles: Arc<dyn RoleStore>,
        notifier: Arc<dyn Notifier>,
        credentials: CredentialVerifier,
        tokens: Hs256TokenService,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            identities,
            roles,
            notifier,
            credentials,
            tokens: Arc::new(tokens),
            frontend_url: frontend_url.into(),
        }
    }

    /// Verifier sharing this service's signing secret.
    pub fn token_verifier(&self) -> Arc<dyn TokenVerifier> {
        self.tokens.clone()
    }

    pub fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, ServiceError> {
        Ok(self.tokens.verify(token, now)?)
    }

    /// Check a login and mint a session token.
    ///
    /// Unknown identifiers and wrong passwords fail identically; both pay for
    /// one bcrypt verify.
    #[instrument(skip_all, err(level = "debug"))]
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, ServiceError> {
        let identity = self.identities.find_by_login(&credentials.login).await?;

        let matched = self
            .credentials
            .verify(
                &credentials.password,
                identity.as_ref().map(|i| i.password_hash.as_str()),
            )
            .await
            .map_err(ServiceError::Internal)?;

        let identity = match identity {
            Some(identity) if matched => identity,
            _ => {
                tracing::warn!("login rejected");
                return Err(ServiceError::Unauthorized);
            }
        };

        let token = self
            .tokens
            .issue(&identity, now)
            .map_err(ServiceError::internal)?;

        tracing::info!(identity_id = %identity.id, "login succeeded");
        Ok(LoginOutcome {
            token,
            identity: identity.summary(),
        })
    }

    /// Profile of the token's subject, read fresh from the store.
    pub async fn current_identity(&self, claims: &SessionClaims) -> Result<IdentitySummary, ServiceError> {
        match self.identities.find_by_id(claims.sub).await? {
            Some(identity) if !identity.deleted => Ok(identity.summary()),
            _ => Err(ServiceError::NotFound),
        }
    }

    /// Create an identity with initial roles.
    ///
    /// Role names must already exist. Email is checked up front for a clean
    /// error; the store still enforces both unique fields.
    #[instrument(skip_all, err(level = "debug"))]
    pub async fn register(
        &self,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<IdentitySummary, ServiceError> {
        if self.identities.find_by_email(&registration.email).await?.is_some() {
            return Err(ServiceError::Duplicate { field: "email" });
        }

        let role_ids = self.resolve_roles(&registration.roles).await?;
        let password_hash = self
            .credentials
            .hash(&registration.password)
            .await
            .map_err(ServiceError::Internal)?;

        let created = self
            .identities
            .create(
                NewIdentity {
                    email: registration.email,
                    username: registration.username,
                    password_hash,
                    profile: registration.profile,
                }
                .into_identity(IdentityId::new(), now),
            )
            .await?;
        self.identities.assign_roles(created.id, &role_ids).await?;

        let stored = self
            .identities
            .find_by_id(created.id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        tracing::info!(identity_id = %stored.id, roles = stored.roles.len(), "identity registered");
        Ok(stored.summary())
    }

    /// Start a self-service reset.
    ///
    /// Succeeds whether or not the email is known. A mail failure is logged
    /// and swallowed so it cannot be used as an existence oracle either.
    #[instrument(skip_all, err(level = "debug"))]
    pub async fn request_reset(&self, request: &ResetRequest, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let Some(identity) = self.identities.find_by_email(&request.email).await? else {
            tracing::debug!("reset requested for unknown email");
            return Ok(());
        };

        let reset = PendingReset::generate(now);
        self.identities.set_pending_reset(identity.id, &reset).await?;

        let link = reset_link(&self.frontend_url, &reset.token);
        if let Err(err) = self
            .notifier
            .send(&identity.email, RESET_MAIL_SUBJECT, &reset_mail_body(&link))
            .await
        {
            tracing::warn!(identity_id = %identity.id, error = %err, "reset mail not delivered");
        } else {
            tracing::info!(identity_id = %identity.id, expires_at = %reset.expires_at, "reset issued");
        }
        Ok(())
    }

    /// Redeem a reset token for a new password. Works at most once per token.
    #[instrument(skip_all, err(level = "debug"))]
    pub async fn consume_reset(&self, consumption: &ResetConsumption, now: DateTime<Utc>) -> Result<(), ServiceError> {
        // Fail fast before paying for a hash.
        if self
            .identities
            .find_by_reset_token(&consumption.token, now)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidResetToken);
        }

        let password_hash = self
            .credentials
            .hash(&consumption.new_password)
            .await
            .map_err(ServiceError::Internal)?;

        match self
            .identities
            .redeem_reset(&consumption.token, &password_hash, now)
            .await?
        {
            Some(id) => {
                tracing::info!(identity_id = %id, "password reset completed");
                Ok(())
            }
            None => Err(ServiceError::InvalidResetToken),
        }
    }

    /// Tokens are stateless; the client discards its copy.
    pub fn logout(&self, claims: Option<&SessionClaims>) {
        match claims {
            Some(claims) => tracing::info!(identity_id = %claims.sub, "logout acknowledged"),
            None => tracing::debug!("logout acknowledged"),
        }
    }

    /// Soft-delete an identity. It can no longer log in, and its email and
    /// username become available again.
    #[instrument(skip(self, now), fields(identity_id = %id), err(level = "debug"))]
    pub async fn deactivate(&self, id: IdentityId, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let mut identity = match self.identities.find_by_id(id).await? {
            Some(identity) if !identity.deleted => identity,
            _ => return Err(ServiceError::NotFound),
        };

        identity.deleted = true;
        identity.pending_reset = None;
        identity.updated_at = now;
        self.identities.update(&identity).await?;

        tracing::info!("identity deactivated");
        Ok(())
    }

    /// Make sure a `backoffice` identity with this email exists.
    ///
    /// Creates the role and the identity as needed; an existing identity keeps
    /// its password.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        username: &str,
        password: &Password,
        now: DateTime<Utc>,
    ) -> Result<IdentityId, ServiceError> {
        let role_id = match self
            .roles
            .find_roles_by_names(&[Role::new(BACKOFFICE)])
            .await?
            .into_iter()
            .next()
        {
            Some(role) => role.id,
            None => {
                self.roles
                    .create_role(RoleRecord {
                        id: RoleId::new(),
                        name: Role::new(BACKOFFICE),
                        description: Some("Identity and role administration".to_string()),
                    })
                    .await?
                    .id
            }
        };

        let id = match self.identities.find_by_email(email).await? {
            Some(existing) => existing.id,
            None => {
                let password_hash = self
                    .credentials
                    .hash(password)
                    .await
                    .map_err(ServiceError::Internal)?;
                self.identities
                    .create(
                        NewIdentity {
                            email: email.to_string(),
                            username: username.to_string(),
                            password_hash,
                            profile: Profile::default(),
                        }
                        .into_identity(IdentityId::new(), now),
                    )
                    .await?
                    .id
            }
        };

        self.identities.assign_roles(id, &[role_id]).await?;
        tracing::info!(identity_id = %id, "bootstrap admin ready");
        Ok(id)
    }

    async fn resolve_roles(&self, names: &[Role]) -> Result<Vec<RoleId>, ServiceError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.roles.find_roles_by_names(names).await?;
        if let Some(missing) = names.iter().find(|n| !found.iter().any(|r| &r.name == *n)) {
            return Err(ServiceError::Validation {
                field: "roles",
                message: format!("unknown role '{missing}'"),
            });
        }
        Ok(found.into_iter().map(|r| r.id).collect())
    }
}
