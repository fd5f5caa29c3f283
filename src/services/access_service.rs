//! The single entry point request-handling collaborators call with their
//! verified (role, school identifier) pair. Keeps the resolve-then-authorize
//! and resolve-then-provision flows in one place instead of scattered across
//! call sites.

use std::sync::Arc;
use tracing::debug;

use crate::database::manager::ConnectionManager;
use crate::database::models::{IdentityRecord, IssuedIdentity};
use crate::database::store::TenantHandle;
use crate::error::CoreError;
use crate::identity::{DateOfBirth, IdentityIssuer};
use crate::permission::PermissionResolver;
use crate::registry::TenantRegistry;
use crate::types::{CanonicalCode, Role};

/// Outcome of an authorization check. Denial is a value, not an error; the
/// caller decides how to answer the requester.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub code: CanonicalCode,
    pub allowed: bool,
}

pub struct AccessService {
    registry: Arc<TenantRegistry>,
    connections: Arc<ConnectionManager>,
    permissions: PermissionResolver,
    identities: IdentityIssuer,
}

impl AccessService {
    pub fn new(registry: Arc<TenantRegistry>, connections: Arc<ConnectionManager>) -> Self {
        Self {
            permissions: PermissionResolver::new(connections.clone(), registry.clone()),
            identities: IdentityIssuer::new(connections.clone()),
            registry,
            connections,
        }
    }

    /// Resolve a human-supplied school identifier to its canonical code.
    pub async fn resolve_school(&self, identifier: &str) -> Result<CanonicalCode, CoreError> {
        Ok(self.registry.resolve(identifier).await?)
    }

    /// Resolve the school and decide whether `role` may perform
    /// `permission` there.
    pub async fn authorize(
        &self,
        role: Role,
        school: &str,
        permission: &str,
    ) -> Result<AccessDecision, CoreError> {
        let code = self.registry.resolve(school).await?;
        let allowed = self.permissions.is_allowed(role, &code, permission).await?;
        debug!(
            "Authorization {}/{}/{}: {}",
            code,
            role,
            permission,
            if allowed { "allowed" } else { "denied" }
        );
        Ok(AccessDecision { code, allowed })
    }

    /// Provision a new user at a school: identifier allocation, initial
    /// credential, persisted hash.
    pub async fn provision_user(
        &self,
        role: Role,
        school: &str,
        date_of_birth: Option<DateOfBirth>,
    ) -> Result<IssuedIdentity, CoreError> {
        let code = self.registry.resolve(school).await?;
        Ok(self.identities.issue(&code, role, date_of_birth).await?)
    }

    /// Reset a user's credential; returns the new plaintext exactly once.
    pub async fn reset_credential(
        &self,
        school: &str,
        user_id: &str,
    ) -> Result<String, CoreError> {
        let code = self.registry.resolve(school).await?;
        Ok(self.identities.reset_credential(&code, user_id).await?)
    }

    /// Look up an issued account, e.g. for the login collaborator to verify
    /// a presented credential against the stored hash.
    pub async fn find_user(
        &self,
        school: &str,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, CoreError> {
        let code = self.registry.resolve(school).await?;
        Ok(self.identities.find(&code, user_id).await?)
    }

    /// Borrow the live store handle for a school, for collaborators working
    /// directly with its sub-collections.
    pub async fn school_handle(&self, school: &str) -> Result<TenantHandle, CoreError> {
        let code = self.registry.resolve(school).await?;
        Ok(self.connections.handle(&code).await?)
    }

    /// Register a school and stamp its tenant-info record. For the Postgres
    /// backend the tenant database must have been provisioned first
    /// (`PgTenantConnector::provision`).
    pub async fn register_school(
        &self,
        code: &str,
        display_name: &str,
    ) -> Result<CanonicalCode, CoreError> {
        let tenant = self.registry.register(code, display_name).await?;
        let code = CanonicalCode::new(&tenant.code);

        let handle = self.connections.handle(&code).await?;
        handle
            .put_tenant_info(&crate::database::models::TenantInfoRecord {
                code: tenant.code.clone(),
                display_name: tenant.display_name.clone(),
                created_at: tenant.created_at,
            })
            .await
            .map_err(crate::database::manager::DatabaseError::from)?;

        Ok(code)
    }

    /// Deactivate a school and drop its cached connection.
    pub async fn deactivate_school(&self, school: &str) -> Result<(), CoreError> {
        let code = self.registry.resolve(school).await?;
        self.registry.deactivate(&code).await?;
        self.connections.invalidate(&code).await;
        Ok(())
    }
}
