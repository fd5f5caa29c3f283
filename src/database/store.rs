use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::database::models::{IdentityRecord, PermissionOverrideDocument, TenantInfoRecord};
use crate::types::TenantCollection;

/// Errors from a tenant store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                match db_err.code().as_deref() {
                    // 23505 = unique_violation
                    Some("23505") => StoreError::Duplicate(db_err.message().to_string()),
                    // 57014 = query_canceled, raised when statement_timeout expires
                    Some("57014") => StoreError::Unavailable(db_err.message().to_string()),
                    _ => StoreError::Backend(db_err.message().to_string()),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Reusable handle to one tenant's isolated store. Owned by the connection
/// manager's cache; everyone else borrows it per call.
pub type TenantHandle = Arc<dyn TenantStore>;

/// Operations the core needs from a tenant's isolated store: point lookups,
/// a max-of-sequence scan, atomic insert-if-absent and update-by-key,
/// against the named sub-collections.
#[async_trait]
pub trait TenantStore: Send + Sync + std::fmt::Debug {
    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn tenant_info(&self) -> Result<Option<TenantInfoRecord>, StoreError>;

    async fn put_tenant_info(&self, info: &TenantInfoRecord) -> Result<(), StoreError>;

    /// The tenant-local override document, if one has been saved.
    async fn permission_overrides(&self)
        -> Result<Option<PermissionOverrideDocument>, StoreError>;

    /// Replace the override document (at most one per tenant).
    async fn put_permission_overrides(
        &self,
        doc: &PermissionOverrideDocument,
    ) -> Result<(), StoreError>;

    /// Highest sequence number in use in a role collection, if any.
    async fn max_sequence(&self, collection: TenantCollection) -> Result<Option<i64>, StoreError>;

    /// Insert a new account record. Fails with `StoreError::Duplicate` if
    /// the identifier or sequence number is already taken.
    async fn insert_identity(
        &self,
        collection: TenantCollection,
        record: &IdentityRecord,
    ) -> Result<(), StoreError>;

    async fn find_identity(
        &self,
        collection: TenantCollection,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, StoreError>;

    /// Overwrite the stored credential hash and plaintext echo.
    async fn update_credential(
        &self,
        collection: TenantCollection,
        user_id: &str,
        credential_hash: &str,
        credential_echo: Option<&str>,
        change_required: bool,
    ) -> Result<(), StoreError>;

    /// Release backend resources. Called on eviction and shutdown.
    async fn close(&self);
}
