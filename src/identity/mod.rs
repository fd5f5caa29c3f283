//! Sequential identifier and initial-credential issuance.

pub mod credential;

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config;
use crate::database::manager::{ConnectionManager, DatabaseError};
use crate::database::models::{IdentityRecord, IssuedIdentity};
use crate::database::store::{StoreError, TenantHandle};
use crate::types::{CanonicalCode, Role, TenantCollection};

pub use credential::{verify_credential, DateOfBirth};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Duplicate identifier for {code}/{role} after {attempts} attempts")]
    DuplicateIdentifier {
        code: String,
        role: Role,
        attempts: u32,
    },

    #[error("Role {0} is not provisioned per tenant")]
    UnsupportedRole(Role),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Credential hashing failed: {0}")]
    Crypto(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        IdentityError::Database(err.into())
    }
}

#[derive(Debug, Clone)]
pub struct IssuerSettings {
    pub credential_length: usize,
    pub max_retries: u32,
    pub pad_width: usize,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        let identity = &config::config().identity;
        Self {
            credential_length: identity.credential_length,
            max_retries: identity.max_issue_retries,
            pad_width: identity.sequence_pad_width,
        }
    }
}

/// Issues `<ROLETAG><zero-padded sequence>` identifiers, unique per
/// (tenant, role) and never reused.
///
/// Sequence numbers come from an in-process counter per namespace, seeded
/// from the store's current maximum on first use. The store's uniqueness
/// constraint is the safety net: a duplicate insert (another process issuing
/// into the same namespace) re-seeds the counter from the store and retries,
/// bounded by `max_retries`.
pub struct IdentityIssuer {
    connections: Arc<ConnectionManager>,
    counters: Mutex<HashMap<(String, Role), i64>>,
    settings: IssuerSettings,
}

impl IdentityIssuer {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self::with_settings(connections, IssuerSettings::default())
    }

    pub fn with_settings(connections: Arc<ConnectionManager>, settings: IssuerSettings) -> Self {
        Self {
            connections,
            counters: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Provision a new account: allocate the next identifier in the
    /// (tenant, role) namespace, derive or generate the initial credential,
    /// and persist the hashed record.
    pub async fn issue(
        &self,
        code: &CanonicalCode,
        role: Role,
        date_of_birth: Option<DateOfBirth>,
    ) -> Result<IssuedIdentity, IdentityError> {
        let (tag, collection) = match (role.tag(), role.collection()) {
            (Some(tag), Some(collection)) => (tag, collection),
            _ => return Err(IdentityError::UnsupportedRole(role)),
        };

        let handle = self.connections.handle(code).await?;

        // Students enrolled with a parseable date of birth get the DDMMYYYY
        // credential; everyone else gets a generated one. An unparseable
        // date falls back to generation rather than failing enrollment.
        let parsed_dob = date_of_birth.as_ref().and_then(|dob| dob.as_date());
        let plaintext = match (role, parsed_dob) {
            (Role::Student, Some(date)) => credential::credential_from_date(date),
            _ => credential::generate_credential(self.settings.credential_length),
        };
        let credential_hash = credential::hash_credential(&plaintext)
            .map_err(|e| IdentityError::Crypto(e.to_string()))?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let seq = self.next_sequence(code, role, collection, &handle).await?;
            let user_id = format!("{}{:0width$}", tag, seq, width = self.settings.pad_width);
            let now = Utc::now();
            let record = IdentityRecord {
                user_id: user_id.clone(),
                seq,
                role,
                school_code: code.as_str().to_string(),
                credential_hash: credential_hash.clone(),
                credential_echo: Some(plaintext.clone()),
                credential_change_required: false,
                date_of_birth: parsed_dob,
                created_at: now,
                updated_at: now,
            };

            match handle.insert_identity(collection, &record).await {
                Ok(()) => {
                    info!("Issued {} for {}/{}", user_id, code, role);
                    return Ok(IssuedIdentity {
                        user_id,
                        role,
                        school_code: code.clone(),
                        credential: plaintext,
                        credential_change_required: false,
                    });
                }
                Err(StoreError::Duplicate(_)) => {
                    if attempts >= self.settings.max_retries {
                        return Err(IdentityError::DuplicateIdentifier {
                            code: code.as_str().to_string(),
                            role,
                            attempts,
                        });
                    }
                    warn!(
                        "Identifier {} already taken in {}/{}, reconciling and retrying",
                        user_id, code, role
                    );
                    self.reconcile(code, role, collection, &handle).await?;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Replace a user's credential with a freshly generated one. Returns the
    /// plaintext exactly once; the stored echo is overwritten, so the
    /// previous plaintext is no longer derivable from the store.
    pub async fn reset_credential(
        &self,
        code: &CanonicalCode,
        user_id: &str,
    ) -> Result<String, IdentityError> {
        let (_, collection) = Self::role_for_user_id(user_id)?;
        let handle = self.connections.handle(code).await?;

        let plaintext = credential::generate_credential(self.settings.credential_length);
        let credential_hash = credential::hash_credential(&plaintext)
            .map_err(|e| IdentityError::Crypto(e.to_string()))?;

        match handle
            .update_credential(collection, user_id, &credential_hash, Some(&plaintext), true)
            .await
        {
            Ok(()) => {
                info!("Reset credential for {}/{}", code, user_id);
                Ok(plaintext)
            }
            Err(StoreError::NotFound(_)) => Err(IdentityError::UnknownUser(user_id.to_string())),
            Err(other) => Err(other.into()),
        }
    }

    /// Look up an issued account by its identifier.
    pub async fn find(
        &self,
        code: &CanonicalCode,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, IdentityError> {
        let (_, collection) = Self::role_for_user_id(user_id)?;
        let handle = self.connections.handle(code).await?;
        Ok(handle.find_identity(collection, user_id).await?)
    }

    /// Reserve the next sequence number for (code, role). The counter map
    /// lock is never held across store I/O.
    async fn next_sequence(
        &self,
        code: &CanonicalCode,
        role: Role,
        collection: TenantCollection,
        handle: &TenantHandle,
    ) -> Result<i64, IdentityError> {
        let key = (code.as_str().to_string(), role);
        {
            let mut counters = self.counters.lock().await;
            if let Some(current) = counters.get_mut(&key) {
                *current += 1;
                return Ok(*current);
            }
        }

        // Unseeded namespace: scan the store outside the lock, then seed.
        // Losing the seeding race is fine; or_insert keeps the winner.
        let max = handle.max_sequence(collection).await?.unwrap_or(0);
        let mut counters = self.counters.lock().await;
        let current = counters.entry(key).or_insert(max);
        *current += 1;
        Ok(*current)
    }

    /// Pull the counter up to the store's maximum after a duplicate insert.
    async fn reconcile(
        &self,
        code: &CanonicalCode,
        role: Role,
        collection: TenantCollection,
        handle: &TenantHandle,
    ) -> Result<(), IdentityError> {
        let max = handle.max_sequence(collection).await?.unwrap_or(0);
        let mut counters = self.counters.lock().await;
        let current = counters.entry((code.as_str().to_string(), role)).or_insert(0);
        *current = (*current).max(max);
        Ok(())
    }

    fn role_for_user_id(user_id: &str) -> Result<(Role, TenantCollection), IdentityError> {
        let tag: String = user_id
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        Role::from_tag(&tag)
            .and_then(|role| role.collection().map(|collection| (role, collection)))
            .ok_or_else(|| IdentityError::UnknownUser(user_id.to_string()))
    }
}
