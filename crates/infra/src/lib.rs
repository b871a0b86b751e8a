//! Infrastructure layer: storage adapters, mail, config and the services that
//! orchestrate them.

pub mod config;
pub mod credentials;
pub mod error;
pub mod notify;
pub mod roles;
pub mod service;
pub mod store;

pub use config::{AuthConfig, ConfigError, SeedAdmin, SmtpSettings};
pub use credentials::CredentialVerifier;
pub use error::ServiceError;
pub use notify::{InMemoryOutbox, LogNotifier, Notifier, NotifyError, OutboundMail, SmtpNotifier};
pub use roles::RoleService;
pub use service::{AuthService, LoginOutcome};
pub use store::{IdentityStore, InMemoryDirectory, PostgresDirectory, RoleStore, StoreError};
