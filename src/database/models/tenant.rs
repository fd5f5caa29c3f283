use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::PermissionMatrix;

/// Registry record for one school.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Canonical uppercase school code, unique across the registry.
    pub code: String,
    pub display_name: String,
    /// Registry-level permission matrix consulted when a tenant has no
    /// override document of its own.
    pub fallback_overrides: Option<PermissionMatrix>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub trashed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    /// Resolvable tenants: active and not soft-deleted.
    pub fn is_resolvable(&self) -> bool {
        self.is_active && self.trashed_at.is_none() && self.deleted_at.is_none()
    }
}

/// The single metadata record kept inside each tenant store, written at
/// provisioning time. Read for display metadata when the registry is not
/// on the call path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantInfoRecord {
    pub code: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}
