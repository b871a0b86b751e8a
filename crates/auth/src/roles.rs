use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use sesame_core::RoleId;

/// Role allowed to register identities and administer roles.
pub const BACKOFFICE: &str = "backoffice";

/// Role name used for RBAC.
///
/// Tokens and authorization checks work on names only; the stored
/// [`RoleRecord`] carries the id and description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// Persisted role: unique name plus free-form description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: Role,
    pub description: Option<String>,
}
