//! In-memory registry catalog for fixtures and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex as StdMutex;

use crate::database::models::{PermissionMatrix, Tenant};
use crate::database::store::StoreError;
use crate::registry::RegistryStore;

pub struct MemoryRegistryStore {
    tenants: StdMutex<Vec<Tenant>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            tenants: StdMutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Tenant>, StoreError> {
        let tenants = self.tenants.lock().unwrap();
        Ok(tenants
            .iter()
            .find(|t| t.code.eq_ignore_ascii_case(code) && t.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_display_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        let tenants = self.tenants.lock().unwrap();
        Ok(tenants
            .iter()
            .find(|t| t.display_name.eq_ignore_ascii_case(name) && t.deleted_at.is_none())
            .cloned())
    }

    async fn insert(&self, tenant: &Tenant) -> Result<(), StoreError> {
        let mut tenants = self.tenants.lock().unwrap();
        if tenants
            .iter()
            .any(|t| t.code.eq_ignore_ascii_case(&tenant.code) && t.deleted_at.is_none())
        {
            return Err(StoreError::Duplicate(tenant.code.clone()));
        }
        tenants.push(tenant.clone());
        Ok(())
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<(), StoreError> {
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .iter_mut()
            .find(|t| t.code.eq_ignore_ascii_case(code) && t.deleted_at.is_none())
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
        tenant.is_active = active;
        tenant.updated_at = Utc::now();
        Ok(())
    }

    async fn set_fallback_overrides(
        &self,
        code: &str,
        matrix: Option<&PermissionMatrix>,
    ) -> Result<(), StoreError> {
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .iter_mut()
            .find(|t| t.code.eq_ignore_ascii_case(code) && t.deleted_at.is_none())
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
        tenant.fallback_overrides = matrix.cloned();
        tenant.updated_at = Utc::now();
        Ok(())
    }
}
