//! Postgres registry catalog, backed by the tenants table in the main
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::database::models::{PermissionMatrix, Tenant};
use crate::database::store::StoreError;
use crate::registry::RegistryStore;

pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tenants table if missing. Idempotent.
    pub async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id UUID PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                fallback_overrides JSONB,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                trashed_at TIMESTAMPTZ,
                deleted_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn tenant_from_row(row: &PgRow) -> Result<Tenant, StoreError> {
        let fallback_overrides = row
            .get::<Option<serde_json::Value>, _>("fallback_overrides")
            .map(serde_json::from_value::<PermissionMatrix>)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("malformed fallback matrix: {}", e)))?;
        Ok(Tenant {
            id: row.get("id"),
            code: row.get("code"),
            display_name: row.get("display_name"),
            fallback_overrides,
            is_active: row.get("is_active"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
            trashed_at: row.get::<Option<DateTime<Utc>>, _>("trashed_at"),
            deleted_at: row.get::<Option<DateTime<Utc>>, _>("deleted_at"),
        })
    }
}

#[async_trait]
impl RegistryStore for PgRegistryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM tenants WHERE UPPER(code) = UPPER($1) AND deleted_at IS NULL",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::tenant_from_row(&r)).transpose()
    }

    async fn find_by_display_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM tenants WHERE LOWER(display_name) = LOWER($1) AND deleted_at IS NULL",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::tenant_from_row(&r)).transpose()
    }

    async fn insert(&self, tenant: &Tenant) -> Result<(), StoreError> {
        let fallback_overrides = tenant
            .fallback_overrides
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("unserializable matrix: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO tenants (
                id, code, display_name, fallback_overrides, is_active,
                created_at, updated_at, trashed_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.code)
        .bind(&tenant.display_name)
        .bind(fallback_overrides)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .bind(tenant.trashed_at)
        .bind(tenant.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tenants SET is_active = $2, updated_at = now()
            WHERE UPPER(code) = UPPER($1) AND deleted_at IS NULL
            "#,
        )
        .bind(code)
        .bind(active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(code.to_string()));
        }
        Ok(())
    }

    async fn set_fallback_overrides(
        &self,
        code: &str,
        matrix: Option<&PermissionMatrix>,
    ) -> Result<(), StoreError> {
        let matrix = matrix
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("unserializable matrix: {}", e)))?;
        let result = sqlx::query(
            r#"
            UPDATE tenants SET fallback_overrides = $2, updated_at = now()
            WHERE UPPER(code) = UPPER($1) AND deleted_at IS NULL
            "#,
        )
        .bind(code)
        .bind(matrix)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(code.to_string()));
        }
        Ok(())
    }
}
