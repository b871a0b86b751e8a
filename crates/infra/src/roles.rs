//! Role administration.

use std::sync::Arc;

use sesame_auth::{RoleDraft, RolePatch, RoleRecord};
use sesame_core::RoleId;

use crate::error::ServiceError;
use crate::store::RoleStore;

pub struct RoleService {
    roles: Arc<dyn RoleStore>,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    pub async fn list(&self) -> Result<Vec<RoleRecord>, ServiceError> {
        Ok(self.roles.list_roles().await?)
    }

    pub async fn get(&self, id: RoleId) -> Result<RoleRecord, ServiceError> {
        self.roles.find_role(id).await?.ok_or(ServiceError::NotFound)
    }

    pub async fn create(&self, draft: RoleDraft) -> Result<RoleRecord, ServiceError> {
        let role = self
            .roles
            .create_role(RoleRecord {
                id: RoleId::new(),
                name: draft.name,
                description: draft.description,
            })
            .await?;
        tracing::info!(role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    /// Apply `patch`; absent fields keep their stored values.
    pub async fn update(&self, id: RoleId, patch: RolePatch) -> Result<RoleRecord, ServiceError> {
        let mut role = self.get(id).await?;
        if let Some(name) = patch.name {
            role.name = name;
        }
        if let Some(description) = patch.description {
            role.description = Some(description);
        }
        self.roles.update_role(&role).await?;
        tracing::info!(role_id = %role.id, "role updated");
        Ok(role)
    }

    /// Remove the role and every membership that referenced it.
    pub async fn delete(&self, id: RoleId) -> Result<(), ServiceError> {
        if self.roles.delete_role(id).await? {
            tracing::info!(role_id = %id, "role deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound)
        }
    }
}
