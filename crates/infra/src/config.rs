//! Process configuration from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

use sesame_auth::password::DEFAULT_COST;

pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAIL_FROM: &str = "\"Support\" <no-reply@localhost>";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{name} is required: {reason}")]
    Missing { name: &'static str, reason: &'static str },

    #[error("{missing} is required when {present} is set")]
    Incomplete {
        missing: &'static str,
        present: &'static str,
    },
}

/// Bootstrap identity created at start-up when absent.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP relay used for reset mails.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// User and password for SMTP AUTH.
    pub credentials: Option<(String, String)>,
}

impl core::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.credentials.as_ref().map(|(user, _)| user))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was unset and the dev secret is in use. Only
    /// possible in debug builds or with `ALLOW_INSECURE_JWT_SECRET=true`.
    pub insecure_secret: bool,
    pub frontend_url: String,
    pub mail_from: String,
    /// Requested work factor; the hasher clamps it.
    pub bcrypt_cost: u32,
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub seed_admin: Option<SeedAdmin>,
    /// Absent means reset mails are only logged.
    pub smtp: Option<SmtpSettings>,
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("insecure_secret", &self.insecure_secret)
            .field("frontend_url", &self.frontend_url)
            .field("mail_from", &self.mail_from)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("bind_addr", &self.bind_addr)
            .field("seed_admin", &self.seed_admin)
            .field("smtp", &self.smtp)
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let allow_insecure = match get("ALLOW_INSECURE_JWT_SECRET") {
            Some(raw) => parse_flag("ALLOW_INSECURE_JWT_SECRET", &raw)?,
            None => cfg!(debug_assertions),
        };
        let (jwt_secret, insecure_secret) = resolve_jwt_secret(get("JWT_SECRET"), allow_insecure)?;

        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: "BCRYPT_COST",
                reason: e.to_string(),
            })?,
            None => DEFAULT_COST,
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            name: "BIND_ADDR",
            reason: e.to_string(),
        })?;

        let seed_admin = match (
            get("SEED_ADMIN_EMAIL"),
            get("SEED_ADMIN_USERNAME"),
            get("SEED_ADMIN_PASSWORD"),
        ) {
            (None, None, None) => None,
            (Some(email), username, Some(password)) => {
                let username = username.unwrap_or_else(|| "admin".to_string());
                if username.contains('@') {
                    return Err(ConfigError::Invalid {
                        name: "SEED_ADMIN_USERNAME",
                        reason: "must not contain '@'".to_string(),
                    });
                }
                Some(SeedAdmin {
                    username,
                    email,
                    password,
                })
            }
            (None, _, _) => {
                return Err(ConfigError::Incomplete {
                    missing: "SEED_ADMIN_EMAIL",
                    present: "SEED_ADMIN_PASSWORD",
                });
            }
            (Some(_), _, None) => {
                return Err(ConfigError::Incomplete {
                    missing: "SEED_ADMIN_PASSWORD",
                    present: "SEED_ADMIN_EMAIL",
                });
            }
        };

        let smtp = match get("EMAIL_HOST") {
            Some(host) => {
                let port = match get("EMAIL_PORT") {
                    Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                        name: "EMAIL_PORT",
                        reason: e.to_string(),
                    })?,
                    None => DEFAULT_SMTP_PORT,
                };
                let credentials = match (get("EMAIL_USER"), get("EMAIL_PASSWORD")) {
                    (Some(user), Some(password)) => Some((user, password)),
                    (None, None) => None,
                    (Some(_), None) => {
                        return Err(ConfigError::Incomplete {
                            missing: "EMAIL_PASSWORD",
                            present: "EMAIL_USER",
                        });
                    }
                    (None, Some(_)) => {
                        return Err(ConfigError::Incomplete {
                            missing: "EMAIL_USER",
                            present: "EMAIL_PASSWORD",
                        });
                    }
                };
                Some(SmtpSettings {
                    host,
                    port,
                    credentials,
                })
            }
            None => None,
        };

        let mail_from = get("MAIL_FROM")
            .or_else(|| get("EMAIL_USER").map(|user| format!("\"Support\" <{user}>")))
            .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string());

        Ok(Self {
            jwt_secret,
            insecure_secret,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            mail_from,
            bcrypt_cost,
            database_url: get("DATABASE_URL"),
            bind_addr,
            seed_admin,
            smtp,
        })
    }
}

/// Use the configured secret, or fall back to the public dev secret when the
/// caller allows it.
fn resolve_jwt_secret(
    configured: Option<String>,
    allow_insecure: bool,
) -> Result<(String, bool), ConfigError> {
    match configured {
        Some(secret) => Ok((secret, false)),
        None if allow_insecure => Ok((DEV_JWT_SECRET.to_string(), true)),
        None => Err(ConfigError::Missing {
            name: "JWT_SECRET",
            reason: "set it, or ALLOW_INSECURE_JWT_SECRET=true for local use",
        }),
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected true or false, got {other:?}"),
        }),
    }
}
