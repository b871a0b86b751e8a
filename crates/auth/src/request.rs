//! Typed requests.
//!
//! Transport layers hand over loosely-typed input (optional fields, free-form
//! role arrays); these constructors either produce a fully-formed request or a
//! `DomainError::Validation` naming the offending field.

use chrono::NaiveDate;

use sesame_core::{DomainError, DomainResult};

use crate::identity::Profile;
use crate::password::MAX_SECRET_BYTES;
use crate::roles::Role;

const MAX_NAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 254;

/// A plaintext secret on its way to the hasher. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn parse(field: &'static str, raw: Option<String>) -> DomainResult<Self> {
        let raw = raw.ok_or_else(|| DomainError::validation(field, "is required"))?;
        if raw.is_empty() {
            return Err(DomainError::validation(field, "must not be empty"));
        }
        if raw.len() > MAX_SECRET_BYTES {
            return Err(DomainError::validation(
                field,
                format!("must be at most {MAX_SECRET_BYTES} bytes"),
            ));
        }
        Ok(Self(raw))
    }

    /// Accept whatever was presented for a login attempt. Only absence is an
    /// input error; an empty or over-long secret simply fails to verify.
    pub fn presented(field: &'static str, raw: Option<String>) -> DomainResult<Self> {
        raw.map(Self)
            .ok_or_else(|| DomainError::validation(field, "is required"))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Login input: email or username plus password.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: Password,
}

impl Credentials {
    pub fn new(login: Option<String>, password: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            login: required("emailOrUsername", login)?,
            password: Password::presented("password", password)?,
        })
    }
}

/// Registration of a new identity by a privileged caller.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: Password,
    pub profile: Profile,
    pub roles: Vec<Role>,
}

/// Raw registration fields as they arrive from a transport.
#[derive(Debug, Clone, Default)]
pub struct RegistrationFields {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub salutation: Option<String>,
    pub title: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub start_date: Option<String>,
    pub holiday_days: Option<i32>,
    pub roles: Option<Vec<String>>,
}

impl TryFrom<RegistrationFields> for Registration {
    type Error = DomainError;

    fn try_from(fields: RegistrationFields) -> DomainResult<Self> {
        let email = email("email", fields.email)?;
        let username = username("username", fields.username)?;
        let password = Password::parse("password", fields.password)?;

        let start_date = match optional(fields.start_date) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| DomainError::validation("start_date", "expected YYYY-MM-DD"))?,
            ),
            None => None,
        };

        let holiday_days = fields.holiday_days.unwrap_or(0);
        if holiday_days < 0 {
            return Err(DomainError::validation("holiday_days", "must not be negative"));
        }

        let mut roles = Vec::new();
        for raw in fields.roles.unwrap_or_default() {
            let role = role_name("roles", Some(raw))?;
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        Ok(Self {
            email,
            username,
            password,
            profile: Profile {
                salutation: optional(fields.salutation),
                title: optional(fields.title),
                firstname: optional(fields.firstname),
                lastname: optional(fields.lastname),
                start_date,
                holiday_days,
            },
            roles,
        })
    }
}

/// Self-service reset request.
#[derive(Debug, Clone)]
pub struct ResetRequest {
    pub email: String,
}

impl ResetRequest {
    pub fn new(email_raw: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            email: email("email", email_raw)?,
        })
    }
}

/// Redeeming a reset token for a new password.
#[derive(Debug, Clone)]
pub struct ResetConsumption {
    pub token: String,
    pub new_password: Password,
}

impl ResetConsumption {
    pub fn new(token: Option<String>, new_password: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            token: required("token", token)?,
            new_password: Password::parse("newPassword", new_password)?,
        })
    }
}

/// New role definition.
#[derive(Debug, Clone)]
pub struct RoleDraft {
    pub name: Role,
    pub description: Option<String>,
}

impl RoleDraft {
    pub fn new(name: Option<String>, description: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            name: role_name("name", name)?,
            description,
        })
    }
}

/// Partial role update; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<Role>,
    pub description: Option<String>,
}

impl RolePatch {
    pub fn new(name: Option<String>, description: Option<String>) -> DomainResult<Self> {
        let name = match name {
            Some(raw) => Some(role_name("name", Some(raw))?),
            None => None,
        };
        Ok(Self { name, description })
    }
}

fn required(field: &'static str, raw: Option<String>) -> DomainResult<String> {
    optional(raw).ok_or_else(|| DomainError::validation(field, "is required"))
}

fn optional(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn email(field: &'static str, raw: Option<String>) -> DomainResult<String> {
    let value = required(field, raw)?;
    if value.len() > MAX_EMAIL_LEN {
        return Err(DomainError::validation(field, "is too long"));
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.contains('@') => {
            Ok(value)
        }
        _ => Err(DomainError::validation(field, "is not a valid email address")),
    }
}

fn name(field: &'static str, raw: Option<String>) -> DomainResult<String> {
    let value = required(field, raw)?;
    if value.len() > MAX_NAME_LEN {
        return Err(DomainError::validation(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(DomainError::validation(field, "must not contain whitespace"));
    }
    Ok(value)
}

/// Usernames share the login field with emails, so they may not look like one.
fn username(field: &'static str, raw: Option<String>) -> DomainResult<String> {
    let value = name(field, raw)?;
    if value.contains('@') {
        return Err(DomainError::validation(field, "must not contain '@'"));
    }
    Ok(value)
}

fn role_name(field: &'static str, raw: Option<String>) -> DomainResult<Role> {
    name(field, raw).map(Role::new)
}
