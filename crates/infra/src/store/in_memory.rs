//! In-memory directory for tests/dev.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sesame_auth::{Identity, IdentityRole, PendingReset, Role, RoleRecord};
use sesame_core::{IdentityId, RoleId};

use super::{IdentityStore, RoleStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    identities: HashMap<IdentityId, Identity>,
    roles: HashMap<RoleId, RoleRecord>,
    memberships: BTreeSet<IdentityRole>,
}

impl Tables {
    /// Attach role names from the join table.
    fn materialize(&self, identity: &Identity) -> Identity {
        let mut roles: Vec<Role> = self
            .memberships
            .iter()
            .filter(|m| m.identity_id == identity.id)
            .filter_map(|m| self.roles.get(&m.role_id).map(|r| r.name.clone()))
            .collect();
        roles.sort();

        Identity {
            roles,
            ..identity.clone()
        }
    }

    fn find_active(&self, pred: impl Fn(&Identity) -> bool) -> Option<Identity> {
        self.identities
            .values()
            .find(|i| !i.deleted && pred(i))
            .map(|i| self.materialize(i))
    }

    /// Enforce email/username uniqueness among non-deleted identities. Both
    /// values share one login namespace, so a username may not equal another
    /// identity's email either.
    fn check_unique(&self, candidate: &Identity) -> Result<(), StoreError> {
        if candidate.deleted {
            return Ok(());
        }
        for other in self.identities.values() {
            if other.id == candidate.id || other.deleted {
                continue;
            }
            if other.email == candidate.email || other.username == candidate.email {
                return Err(StoreError::Duplicate { field: "email" });
            }
            if other.username == candidate.username || other.email == candidate.username {
                return Err(StoreError::Duplicate { field: "username" });
            }
        }
        Ok(())
    }

    fn check_role_name(&self, candidate: &RoleRecord) -> Result<(), StoreError> {
        let taken = self
            .roles
            .values()
            .any(|r| r.id != candidate.id && r.name == candidate.name);
        if taken {
            Err(StoreError::Duplicate { field: "name" })
        } else {
            Ok(())
        }
    }
}

/// Identities, roles and memberships behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Tables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("directory lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("directory lock poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for InMemoryDirectory {
    async fn find_by_login(&self, login: &str) -> Result<Option<Identity>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .find_active(|i| i.email == login)
            .or_else(|| tables.find_active(|i| i.username == login)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let tables = self.read()?;
        Ok(tables.find_active(|i| i.email == email))
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        let tables = self.read()?;
        Ok(tables.identities.get(&id).map(|i| tables.materialize(i)))
    }

    async fn create(&self, identity: Identity) -> Result<Identity, StoreError> {
        let mut tables = self.write()?;
        if tables.identities.contains_key(&identity.id) {
            return Err(StoreError::Duplicate { field: "id" });
        }
        tables.check_unique(&identity)?;

        let stored = Identity {
            roles: Vec::new(),
            ..identity
        };
        tables.identities.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.identities.contains_key(&identity.id) {
            return Err(StoreError::NotFound);
        }
        tables.check_unique(identity)?;

        let stored = Identity {
            roles: Vec::new(),
            ..identity.clone()
        };
        tables.identities.insert(stored.id, stored);
        Ok(())
    }

    async fn set_pending_reset(&self, id: IdentityId, reset: &PendingReset) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let identity = tables.identities.get_mut(&id).ok_or(StoreError::NotFound)?;
        identity.pending_reset = Some(reset.clone());
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, StoreError> {
        let tables = self.read()?;
        Ok(tables.find_active(|i| {
            i.pending_reset
                .as_ref()
                .is_some_and(|r| r.accepts(token, now))
        }))
    }

    async fn redeem_reset(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityId>, StoreError> {
        let mut tables = self.write()?;
        let target = tables.identities.values_mut().find(|i| {
            !i.deleted
                && i.pending_reset
                    .as_ref()
                    .is_some_and(|r| r.accepts(token, now))
        });

        Ok(target.map(|identity| {
            identity.set_password_hash(password_hash.to_string(), now);
            identity.id
        }))
    }

    async fn assign_roles(&self, id: IdentityId, roles: &[RoleId]) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.identities.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        for role_id in roles {
            if !tables.roles.contains_key(role_id) {
                return Err(StoreError::NotFound);
            }
        }
        for role_id in roles {
            tables.memberships.insert(IdentityRole {
                identity_id: id,
                role_id: *role_id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RoleStore for InMemoryDirectory {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let tables = self.read()?;
        let mut roles: Vec<RoleRecord> = tables.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn find_roles_by_names(&self, names: &[Role]) -> Result<Vec<RoleRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .roles
            .values()
            .filter(|r| names.contains(&r.name))
            .cloned()
            .collect())
    }

    async fn create_role(&self, role: RoleRecord) -> Result<RoleRecord, StoreError> {
        let mut tables = self.write()?;
        tables.check_role_name(&role)?;
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, role: &RoleRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.roles.contains_key(&role.id) {
            return Err(StoreError::NotFound);
        }
        tables.check_role_name(role)?;
        tables.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables.roles.remove(&id).is_none() {
            return Ok(false);
        }
        tables.memberships.retain(|m| m.role_id != id);
        Ok(true)
    }
}
