//! Tenant registry: the always-available catalog mapping human-supplied
//! school identifiers to canonical codes and tenant metadata.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config;
use crate::database::models::{PermissionMatrix, Tenant};
use crate::database::store::StoreError;
use crate::types::CanonicalCode;

pub use memory::MemoryRegistryStore;
pub use postgres::PgRegistryStore;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown school: {0}")]
    UnknownSchool(String),

    #[error("School already registered: {0}")]
    AlreadyExists(String),

    #[error("Invalid school code: {0}")]
    InvalidCode(String),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => RegistryError::UnknownSchool(what),
            other => RegistryError::Unavailable(other.to_string()),
        }
    }
}

/// Catalog storage for the registry. Point lookups only.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Case-insensitive exact match on canonical code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Tenant>, StoreError>;

    /// Case-insensitive exact match on display name.
    async fn find_by_display_name(&self, name: &str) -> Result<Option<Tenant>, StoreError>;

    /// Fails with `StoreError::Duplicate` if the code is taken.
    async fn insert(&self, tenant: &Tenant) -> Result<(), StoreError>;

    async fn set_active(&self, code: &str, active: bool) -> Result<(), StoreError>;

    async fn set_fallback_overrides(
        &self,
        code: &str,
        matrix: Option<&PermissionMatrix>,
    ) -> Result<(), StoreError>;
}

pub struct TenantRegistry {
    store: Arc<dyn RegistryStore>,
    /// Legacy shim: pass a well-formed but unregistered code token through
    /// as a literal canonical code. An explicit opt-in, never a silent
    /// default; every use is logged.
    allow_unregistered_codes: bool,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self::with_options(
            store,
            config::config().registry.allow_unregistered_codes,
        )
    }

    pub fn with_options(store: Arc<dyn RegistryStore>, allow_unregistered_codes: bool) -> Self {
        Self {
            store,
            allow_unregistered_codes,
        }
    }

    /// Resolve a human-supplied identifier to a canonical code.
    ///
    /// Matching order: exact case-insensitive code, then exact
    /// case-insensitive display name, then (only when enabled) the literal
    /// code-token shim. Inactive and soft-deleted tenants do not resolve.
    pub async fn resolve(&self, identifier: &str) -> Result<CanonicalCode, RegistryError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(RegistryError::UnknownSchool(identifier.to_string()));
        }

        if let Some(tenant) = self.store.find_by_code(identifier).await? {
            return if tenant.is_resolvable() {
                Ok(CanonicalCode::new(&tenant.code))
            } else {
                debug!("Refusing to resolve inactive tenant: {}", tenant.code);
                Err(RegistryError::UnknownSchool(identifier.to_string()))
            };
        }

        if let Some(tenant) = self.store.find_by_display_name(identifier).await? {
            return if tenant.is_resolvable() {
                Ok(CanonicalCode::new(&tenant.code))
            } else {
                debug!("Refusing to resolve inactive tenant: {}", tenant.code);
                Err(RegistryError::UnknownSchool(identifier.to_string()))
            };
        }

        if Self::is_code_token(identifier) && self.allow_unregistered_codes {
            warn!(
                "Passing unregistered identifier '{}' through as a literal school code \
                 (legacy compatibility shim)",
                identifier
            );
            return Ok(CanonicalCode::new(identifier));
        }

        Err(RegistryError::UnknownSchool(identifier.to_string()))
    }

    /// Register a new school. The code must be a well-formed token; it is
    /// stored uppercased. Provisioning of the tenant store itself is
    /// orchestrated by the access service.
    pub async fn register(
        &self,
        code: &str,
        display_name: &str,
    ) -> Result<Tenant, RegistryError> {
        let code = code.trim();
        if !Self::is_code_token(code) {
            return Err(RegistryError::InvalidCode(format!(
                "'{}' - school codes are 2-12 characters, letters and digits, starting with a letter",
                code
            )));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            code: code.to_ascii_uppercase(),
            display_name: display_name.trim().to_string(),
            fallback_overrides: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            trashed_at: None,
            deleted_at: None,
        };

        match self.store.insert(&tenant).await {
            Ok(()) => Ok(tenant),
            Err(StoreError::Duplicate(_)) => {
                Err(RegistryError::AlreadyExists(tenant.code.clone()))
            }
            Err(other) => Err(other.into()),
        }
    }

    pub async fn get(&self, code: &CanonicalCode) -> Result<Option<Tenant>, RegistryError> {
        Ok(self.store.find_by_code(code.as_str()).await?)
    }

    /// Registry-level fallback matrix for a tenant, if configured.
    pub async fn fallback_overrides(
        &self,
        code: &CanonicalCode,
    ) -> Result<Option<PermissionMatrix>, RegistryError> {
        Ok(self
            .store
            .find_by_code(code.as_str())
            .await?
            .and_then(|tenant| tenant.fallback_overrides))
    }

    /// Soft-deactivation; the record and its tenant data stay in place.
    pub async fn deactivate(&self, code: &CanonicalCode) -> Result<(), RegistryError> {
        self.store.set_active(code.as_str(), false).await?;
        Ok(())
    }

    pub async fn set_fallback_overrides(
        &self,
        code: &CanonicalCode,
        matrix: Option<&PermissionMatrix>,
    ) -> Result<(), RegistryError> {
        self.store
            .set_fallback_overrides(code.as_str(), matrix)
            .await?;
        Ok(())
    }

    /// A plausible school code: 2-12 ASCII alphanumerics starting with a
    /// letter. Anything else is rejected outright, never passed through.
    fn is_code_token(s: &str) -> bool {
        let len_ok = (2..=12).contains(&s.len());
        len_ok
            && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && s.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_registry(allow_unregistered: bool) -> TenantRegistry {
        let store = Arc::new(MemoryRegistryStore::new());
        let registry = TenantRegistry::with_options(store, allow_unregistered);
        registry
            .register("GHS01", "Greenfield High School")
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn resolves_code_case_insensitively() {
        let registry = seeded_registry(false).await;
        let code = registry.resolve("ghs01").await.unwrap();
        assert_eq!(code.as_str(), "GHS01");
    }

    #[tokio::test]
    async fn resolves_display_name() {
        let registry = seeded_registry(false).await;
        let code = registry.resolve("greenfield high school").await.unwrap();
        assert_eq!(code.as_str(), "GHS01");
    }

    #[tokio::test]
    async fn rejects_unknown_identifiers() {
        let registry = seeded_registry(false).await;
        for identifier in ["NOPE99", "Imaginary School", "a", "ghs-01; drop", ""] {
            let err = registry.resolve(identifier).await.unwrap_err();
            assert!(matches!(err, RegistryError::UnknownSchool(_)), "{identifier}");
        }
    }

    #[tokio::test]
    async fn legacy_shim_is_opt_in() {
        // Off by default: a plausible but unregistered code is rejected
        let registry = seeded_registry(false).await;
        assert!(registry.resolve("XYZ42").await.is_err());

        // Explicitly enabled: passed through uppercased
        let registry = seeded_registry(true).await;
        let code = registry.resolve("xyz42").await.unwrap();
        assert_eq!(code.as_str(), "XYZ42");
        // Malformed identifiers are still rejected
        assert!(registry.resolve("not a code!").await.is_err());
    }

    #[tokio::test]
    async fn deactivated_tenant_stops_resolving() {
        let registry = seeded_registry(false).await;
        registry.deactivate(&CanonicalCode::new("GHS01")).await.unwrap();
        assert!(registry.resolve("GHS01").await.is_err());
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_codes() {
        let registry = seeded_registry(false).await;

        let err = registry.register("ghs01", "Other Name").await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));

        let err = registry.register("1ABC", "Leading Digit").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCode(_)));

        let err = registry.register("x", "Too Short").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCode(_)));
    }
}
