//! In-memory tenant store backend, used by fixtures, local development and
//! the integration suites. Mirrors the Postgres backend's semantics,
//! including duplicate-key rejection on insert.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use crate::database::manager::DatabaseError;
use crate::database::models::{IdentityRecord, PermissionOverrideDocument, TenantInfoRecord};
use crate::database::store::{StoreError, TenantHandle, TenantStore};
use crate::database::connector::TenantConnector;
use crate::types::{CanonicalCode, TenantCollection};

#[derive(Default, Debug)]
struct Data {
    tenant_info: Option<TenantInfoRecord>,
    permission_overrides: Option<PermissionOverrideDocument>,
    // collection -> seq -> record; BTreeMap keeps the max-scan trivial
    identities: HashMap<TenantCollection, BTreeMap<i64, IdentityRecord>>,
}

/// Backing data shared by every store handle for the same tenant, so a
/// recreated connection sees the same records, like reconnecting to a
/// database server would.
#[derive(Default, Debug)]
struct Backing {
    data: StdMutex<Data>,
    fail_ping: AtomicBool,
}

#[derive(Debug)]
pub struct MemoryTenantStore {
    backing: Arc<Backing>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self {
            backing: Arc::new(Backing::default()),
        }
    }

    fn with_backing(backing: Arc<Backing>) -> Self {
        Self { backing }
    }
}

impl Default for MemoryTenantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.backing.fail_ping.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated dead store".into()));
        }
        Ok(())
    }

    async fn tenant_info(&self) -> Result<Option<TenantInfoRecord>, StoreError> {
        Ok(self.backing.data.lock().unwrap().tenant_info.clone())
    }

    async fn put_tenant_info(&self, info: &TenantInfoRecord) -> Result<(), StoreError> {
        self.backing.data.lock().unwrap().tenant_info = Some(info.clone());
        Ok(())
    }

    async fn permission_overrides(
        &self,
    ) -> Result<Option<PermissionOverrideDocument>, StoreError> {
        Ok(self.backing.data.lock().unwrap().permission_overrides.clone())
    }

    async fn put_permission_overrides(
        &self,
        doc: &PermissionOverrideDocument,
    ) -> Result<(), StoreError> {
        self.backing.data.lock().unwrap().permission_overrides = Some(doc.clone());
        Ok(())
    }

    async fn max_sequence(&self, collection: TenantCollection) -> Result<Option<i64>, StoreError> {
        let data = self.backing.data.lock().unwrap();
        Ok(data
            .identities
            .get(&collection)
            .and_then(|records| records.keys().next_back().copied()))
    }

    async fn insert_identity(
        &self,
        collection: TenantCollection,
        record: &IdentityRecord,
    ) -> Result<(), StoreError> {
        let mut data = self.backing.data.lock().unwrap();
        let records = data.identities.entry(collection).or_default();
        if records.contains_key(&record.seq)
            || records.values().any(|r| r.user_id == record.user_id)
        {
            return Err(StoreError::Duplicate(record.user_id.clone()));
        }
        records.insert(record.seq, record.clone());
        Ok(())
    }

    async fn find_identity(
        &self,
        collection: TenantCollection,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let data = self.backing.data.lock().unwrap();
        Ok(data
            .identities
            .get(&collection)
            .and_then(|records| records.values().find(|r| r.user_id == user_id).cloned()))
    }

    async fn update_credential(
        &self,
        collection: TenantCollection,
        user_id: &str,
        credential_hash: &str,
        credential_echo: Option<&str>,
        change_required: bool,
    ) -> Result<(), StoreError> {
        let mut data = self.backing.data.lock().unwrap();
        let record = data
            .identities
            .get_mut(&collection)
            .and_then(|records| records.values_mut().find(|r| r.user_id == user_id))
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        record.credential_hash = credential_hash.to_string();
        record.credential_echo = credential_echo.map(|s| s.to_string());
        record.credential_change_required = change_required;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn close(&self) {}
}

/// Connector over in-memory stores. Counts setup calls so tests can assert
/// the singleflight guarantee, and can simulate dead stores and failed
/// connection attempts.
pub struct MemoryTenantConnector {
    backings: StdMutex<HashMap<String, Arc<Backing>>>,
    connections_created: AtomicUsize,
    connect_attempts: AtomicUsize,
    fail_connects: AtomicBool,
    connect_delay_ms: AtomicU64,
}

impl MemoryTenantConnector {
    pub fn new() -> Self {
        Self {
            backings: StdMutex::new(HashMap::new()),
            connections_created: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            fail_connects: AtomicBool::new(false),
            connect_delay_ms: AtomicU64::new(0),
        }
    }

    /// Underlying connections established so far.
    pub fn connections_created(&self) -> usize {
        self.connections_created.load(Ordering::SeqCst)
    }

    /// Setup calls, including failed ones.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    /// Make an existing tenant's handles fail their liveness probe.
    pub fn fail_pings(&self, code: &CanonicalCode, fail: bool) {
        let backing = self.backing_for(code);
        backing.fail_ping.store(fail, Ordering::SeqCst);
    }

    /// Stretch connection setup, widening the race window for concurrency
    /// tests.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn backing_for(&self, code: &CanonicalCode) -> Arc<Backing> {
        let mut backings = self.backings.lock().unwrap();
        backings
            .entry(code.as_str().to_string())
            .or_default()
            .clone()
    }
}

impl Default for MemoryTenantConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantConnector for MemoryTenantConnector {
    async fn connect(&self, code: &CanonicalCode) -> Result<TenantHandle, DatabaseError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(DatabaseError::TenantUnreachable(format!(
                "simulated connection failure for {}",
                code
            )));
        }

        let backing = self.backing_for(code);
        self.connections_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryTenantStore::with_backing(backing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::Role;

    fn record(user_id: &str, seq: i64) -> IdentityRecord {
        IdentityRecord {
            user_id: user_id.to_string(),
            seq,
            role: Role::Student,
            school_code: "GHS01".to_string(),
            credential_hash: "$argon2id$stub".to_string(),
            credential_echo: None,
            credential_change_required: false,
            date_of_birth: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_sequence() {
        let store = MemoryTenantStore::new();
        store
            .insert_identity(TenantCollection::Students, &record("STU0001", 1))
            .await
            .unwrap();

        let err = store
            .insert_identity(TenantCollection::Students, &record("STU0001", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn max_sequence_tracks_inserts() {
        let store = MemoryTenantStore::new();
        assert_eq!(
            store.max_sequence(TenantCollection::Students).await.unwrap(),
            None
        );

        store
            .insert_identity(TenantCollection::Students, &record("STU0001", 1))
            .await
            .unwrap();
        store
            .insert_identity(TenantCollection::Students, &record("STU0003", 3))
            .await
            .unwrap();

        assert_eq!(
            store.max_sequence(TenantCollection::Students).await.unwrap(),
            Some(3)
        );
        // Other collections are unaffected
        assert_eq!(
            store.max_sequence(TenantCollection::Teachers).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn reconnect_sees_same_records() {
        let connector = MemoryTenantConnector::new();
        let code = CanonicalCode::new("GHS01");

        let first = connector.connect(&code).await.unwrap();
        first
            .insert_identity(TenantCollection::Students, &record("STU0001", 1))
            .await
            .unwrap();

        let second = connector.connect(&code).await.unwrap();
        let found = second
            .find_identity(TenantCollection::Students, "STU0001")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
