//! Layered permission resolution: tenant override, then registry fallback,
//! then the static default table. The whole fallback order lives here and
//! nowhere else.

pub mod defaults;

use std::sync::Arc;
use tracing::debug;

use crate::database::manager::{ConnectionManager, DatabaseError};
use crate::database::models::RolePermissions;
use crate::registry::TenantRegistry;
use crate::types::{CanonicalCode, Role};

pub use defaults::DEFAULT_PERMISSIONS;

pub struct PermissionResolver {
    connections: Arc<ConnectionManager>,
    registry: Arc<TenantRegistry>,
}

impl PermissionResolver {
    pub fn new(connections: Arc<ConnectionManager>, registry: Arc<TenantRegistry>) -> Self {
        Self {
            connections,
            registry,
        }
    }

    /// Decide whether `role` may perform `permission` at the school `code`.
    ///
    /// Read-only and deterministic for fixed inputs and fixed override
    /// state. A missing matrix at any layer is not an error; only an
    /// unreachable tenant store propagates.
    pub async fn is_allowed(
        &self,
        role: Role,
        code: &CanonicalCode,
        permission: &str,
    ) -> Result<bool, DatabaseError> {
        if role == Role::Superadmin {
            return Ok(true);
        }

        // Layer 1: tenant-local override document
        let handle = self.connections.handle(code).await?;
        if let Some(doc) = handle.permission_overrides().await? {
            if let Some(decision) = Self::layer_decision(doc.matrix.role(role), role, permission)
            {
                return Ok(decision);
            }
        }

        // Layer 2: registry-level fallback matrix
        let fallback = self
            .registry
            .fallback_overrides(code)
            .await
            .map_err(|e| DatabaseError::TenantUnreachable(e.to_string()))?;
        if let Some(matrix) = fallback {
            if let Some(decision) = Self::layer_decision(matrix.role(role), role, permission) {
                return Ok(decision);
            }
        }

        // Layer 3: static defaults, deny when the key is absent
        Ok(DEFAULT_PERMISSIONS
            .role(role)
            .and_then(|entry| entry.get(permission).copied())
            .unwrap_or(false))
    }

    /// What one layer says about (role, permission). `None` means the layer
    /// does not decide: no entry for the role, no entry for the key, or the
    /// student all-false signature.
    ///
    /// An empty or all-false student entry is the well-known accidental
    /// save from the matrix editor, which cannot distinguish "locked down"
    /// from "never configured". Treat it as not configured.
    fn layer_decision(
        entry: Option<&RolePermissions>,
        role: Role,
        permission: &str,
    ) -> Option<bool> {
        let entry = entry?;
        if role == Role::Student && entry.values().all(|allowed| !allowed) {
            debug!("Ignoring all-false student permission entry (treated as not configured)");
            return None;
        }
        entry.get(permission).copied()
    }
}
