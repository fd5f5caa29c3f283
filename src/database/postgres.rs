//! Postgres tenant store: one database per school, one table per
//! sub-collection.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;

use crate::database::models::{
    IdentityRecord, PermissionMatrix, PermissionOverrideDocument, TenantInfoRecord,
};
use crate::database::store::{StoreError, TenantStore};
use crate::types::{Role, TenantCollection};

#[derive(Debug)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create every named sub-collection table. Runs at provisioning time;
    /// idempotent so re-provisioning a partially created tenant is safe.
    pub async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        for collection in [
            TenantCollection::Admins,
            TenantCollection::Teachers,
            TenantCollection::Students,
            TenantCollection::Parents,
        ] {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    user_id TEXT PRIMARY KEY,
                    seq BIGINT NOT NULL UNIQUE,
                    role TEXT NOT NULL,
                    school_code TEXT NOT NULL,
                    credential_hash TEXT NOT NULL,
                    credential_echo TEXT,
                    credential_change_required BOOLEAN NOT NULL DEFAULT FALSE,
                    date_of_birth DATE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#,
                collection.name()
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }

        // Document collections; their record shapes belong to the
        // collaborators that read and write them.
        for collection in [
            TenantCollection::Messages,
            TenantCollection::Results,
            TenantCollection::Timetables,
        ] {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    body JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#,
                collection.name()
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS permission_overrides (
                code TEXT PRIMARY KEY,
                matrix JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_info (
                code TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Identity operations only run against the account collections.
    fn account_table(collection: TenantCollection) -> Result<&'static str, StoreError> {
        match collection {
            TenantCollection::Admins
            | TenantCollection::Teachers
            | TenantCollection::Students
            | TenantCollection::Parents => Ok(collection.name()),
            other => Err(StoreError::Backend(format!(
                "collection {} does not hold accounts",
                other
            ))),
        }
    }

    fn identity_from_row(row: &PgRow) -> Result<IdentityRecord, StoreError> {
        let role_text: String = row.get("role");
        let role = Role::from_str(&role_text)
            .map_err(|_| StoreError::Backend(format!("unknown role in store: {}", role_text)))?;
        Ok(IdentityRecord {
            user_id: row.get("user_id"),
            seq: row.get("seq"),
            role,
            school_code: row.get("school_code"),
            credential_hash: row.get("credential_hash"),
            credential_echo: row.get("credential_echo"),
            credential_change_required: row.get("credential_change_required"),
            date_of_birth: row.get::<Option<NaiveDate>, _>("date_of_birth"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        })
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn tenant_info(&self) -> Result<Option<TenantInfoRecord>, StoreError> {
        let row = sqlx::query("SELECT code, display_name, created_at FROM tenant_info LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| TenantInfoRecord {
            code: r.get("code"),
            display_name: r.get("display_name"),
            created_at: r.get::<DateTime<Utc>, _>("created_at"),
        }))
    }

    async fn put_tenant_info(&self, info: &TenantInfoRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tenant_info (code, display_name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET display_name = EXCLUDED.display_name
            "#,
        )
        .bind(&info.code)
        .bind(&info.display_name)
        .bind(info.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn permission_overrides(
        &self,
    ) -> Result<Option<PermissionOverrideDocument>, StoreError> {
        let row = sqlx::query("SELECT code, matrix FROM permission_overrides LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let matrix: serde_json::Value = r.get("matrix");
            let matrix: PermissionMatrix = serde_json::from_value(matrix)
                .map_err(|e| StoreError::Backend(format!("malformed override matrix: {}", e)))?;
            Ok(PermissionOverrideDocument {
                code: r.get("code"),
                matrix,
            })
        })
        .transpose()
    }

    async fn put_permission_overrides(
        &self,
        doc: &PermissionOverrideDocument,
    ) -> Result<(), StoreError> {
        let matrix = serde_json::to_value(&doc.matrix)
            .map_err(|e| StoreError::Backend(format!("unserializable matrix: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO permission_overrides (code, matrix, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (code) DO UPDATE SET matrix = EXCLUDED.matrix, updated_at = now()
            "#,
        )
        .bind(&doc.code)
        .bind(matrix)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn max_sequence(&self, collection: TenantCollection) -> Result<Option<i64>, StoreError> {
        let table = Self::account_table(collection)?;
        let max: Option<i64> =
            sqlx::query_scalar(&format!("SELECT MAX(seq) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn insert_identity(
        &self,
        collection: TenantCollection,
        record: &IdentityRecord,
    ) -> Result<(), StoreError> {
        let table = Self::account_table(collection)?;
        let query = format!(
            r#"
            INSERT INTO {} (
                user_id, seq, role, school_code, credential_hash,
                credential_echo, credential_change_required, date_of_birth,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            table
        );
        sqlx::query(&query)
            .bind(&record.user_id)
            .bind(record.seq)
            .bind(record.role.as_str())
            .bind(&record.school_code)
            .bind(&record.credential_hash)
            .bind(&record.credential_echo)
            .bind(record.credential_change_required)
            .bind(record.date_of_birth)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_identity(
        &self,
        collection: TenantCollection,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let table = Self::account_table(collection)?;
        let row = sqlx::query(&format!("SELECT * FROM {} WHERE user_id = $1", table))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::identity_from_row(&r)).transpose()
    }

    async fn update_credential(
        &self,
        collection: TenantCollection,
        user_id: &str,
        credential_hash: &str,
        credential_echo: Option<&str>,
        change_required: bool,
    ) -> Result<(), StoreError> {
        let table = Self::account_table(collection)?;
        let query = format!(
            r#"
            UPDATE {} SET
                credential_hash = $2,
                credential_echo = $3,
                credential_change_required = $4,
                updated_at = now()
            WHERE user_id = $1
            "#,
            table
        );
        let result = sqlx::query(&query)
            .bind(user_id)
            .bind(credential_hash)
            .bind(credential_echo)
            .bind(change_required)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
