use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CanonicalCode, Role};

/// Persisted account record in a role sub-collection.
///
/// `user_id` is unique within (tenant, role) for the lifetime of the tenant
/// and is never reused, even after the account is deactivated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub user_id: String,
    /// Numeric part of `user_id`; the store's uniqueness constraint and
    /// max-scan both key off this.
    pub seq: i64,
    pub role: Role,
    pub school_code: String,
    /// Argon2id PHC string.
    pub credential_hash: String,
    /// Plaintext kept only so an administrator can view it once; replaced
    /// (never merely hidden) on credential reset.
    pub credential_echo: Option<String>,
    pub credential_change_required: bool,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the issuer hands back to the provisioning collaborator. Carries the
/// plaintext exactly once.
#[derive(Debug, Clone)]
pub struct IssuedIdentity {
    pub user_id: String,
    pub role: Role,
    pub school_code: CanonicalCode,
    pub credential: String,
    pub credential_change_required: bool,
}
