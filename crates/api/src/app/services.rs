use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use sesame_auth::{Hs256TokenService, Password, PasswordHasher};
use sesame_infra::{
    AuthConfig, AuthService, CredentialVerifier, IdentityStore, InMemoryDirectory, Notifier,
    PostgresDirectory, RoleService, RoleStore,
};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub roles: Arc<RoleService>,
}

/// Wire stores, hasher and signer from `config`.
///
/// `DATABASE_URL` selects Postgres (schema applied on start); otherwise
/// everything lives in memory and is lost on exit.
pub async fn build_state(config: &AuthConfig, notifier: Arc<dyn Notifier>) -> anyhow::Result<AppState> {
    let (identities, roles): (Arc<dyn IdentityStore>, Arc<dyn RoleStore>) =
        match &config.database_url {
            Some(url) => {
                let directory = Arc::new(
                    PostgresDirectory::connect(url)
                        .await
                        .context("connecting to postgres")?,
                );
                directory.migrate().await.context("applying schema")?;
                tracing::info!("using postgres directory");
                (directory.clone() as Arc<dyn IdentityStore>, directory as Arc<dyn RoleStore>)
            }
            None => {
                let directory = Arc::new(InMemoryDirectory::new());
                tracing::info!("using in-memory directory");
                (directory.clone() as Arc<dyn IdentityStore>, directory as Arc<dyn RoleStore>)
            }
        };

    if config.insecure_secret {
        tracing::warn!("JWT_SECRET not set; signing sessions with the public dev secret");
    }

    let hasher = PasswordHasher::with_cost(config.bcrypt_cost);
    if hasher.cost() != config.bcrypt_cost {
        tracing::warn!(requested = config.bcrypt_cost, applied = hasher.cost(), "bcrypt cost clamped");
    }
    let credentials = CredentialVerifier::new(hasher)?;

    let auth = Arc::new(AuthService::new(
        identities,
        roles.clone(),
        notifier,
        credentials,
        Hs256TokenService::new(config.jwt_secret.as_bytes()),
        config.frontend_url.clone(),
    ));

    if let Some(seed) = &config.seed_admin {
        let password = Password::parse("SEED_ADMIN_PASSWORD", Some(seed.password.clone()))?;
        auth.bootstrap_admin(&seed.email, &seed.username, &password, Utc::now())
            .await
            .context("seeding admin identity")?;
    }

    Ok(AppState {
        auth,
        roles: Arc::new(RoleService::new(roles)),
    })
}
