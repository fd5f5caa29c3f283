use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config;
use crate::database::connector::TenantConnector;
use crate::database::store::{StoreError, TenantHandle};
use crate::types::CanonicalCode;

/// Errors from the connection manager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid tenant database name: {0}")]
    InvalidTenantName(String),

    #[error("Tenant unreachable: {0}")]
    TenantUnreachable(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DatabaseError {
    fn from(err: StoreError) -> Self {
        match err {
            // Infrastructure failures keep their transient classification
            StoreError::Unavailable(msg) => DatabaseError::TenantUnreachable(msg),
            other => DatabaseError::Store(other),
        }
    }
}

/// Timeouts governing connection setup and the liveness probe. Defaults come
/// from the global config; tests inject tighter values.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        let db = &config::config().database;
        Self {
            connect_timeout: Duration::from_secs(db.connect_timeout_secs),
            probe_timeout: Duration::from_secs(db.probe_timeout_secs),
        }
    }
}

/// Cache of live tenant handles, keyed by canonical school code.
///
/// The only component that creates connection resources. Creation on a cache
/// miss runs under a per-key gate so concurrent callers for the same
/// uninitialized tenant share one setup instead of racing; callers for other
/// tenants are unaffected. Every cached handle is probed before it is handed
/// out and recreated once if found broken.
pub struct ConnectionManager {
    connector: Arc<dyn TenantConnector>,
    handles: RwLock<HashMap<String, TenantHandle>>,
    init_locks: StdMutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    settings: ManagerSettings,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn TenantConnector>) -> Self {
        Self::with_settings(connector, ManagerSettings::default())
    }

    pub fn with_settings(connector: Arc<dyn TenantConnector>, settings: ManagerSettings) -> Self {
        Self {
            connector,
            handles: RwLock::new(HashMap::new()),
            init_locks: StdMutex::new(HashMap::new()),
            settings,
        }
    }

    /// Get the live handle for a tenant, connecting on first use.
    pub async fn handle(&self, code: &CanonicalCode) -> Result<TenantHandle, DatabaseError> {
        // Fast path: cached handle that still answers its probe
        if let Some(handle) = self.cached(code).await {
            if self.probe(&handle).await {
                return Ok(handle);
            }
            self.evict(code, "liveness probe failed").await;
        }

        // Setup gate for this key only; the guard is dropped on every exit
        // path, and setup below is timeout-bounded, so a stuck first caller
        // cannot block waiters forever.
        let gate = self.init_lock(code);
        let _guard = gate.lock().await;

        // A waiter may find the cache populated by whoever held the gate
        if let Some(handle) = self.cached(code).await {
            if self.probe(&handle).await {
                return Ok(handle);
            }
            self.evict(code, "liveness probe failed").await;
        }

        let handle = self.establish(code).await?;
        self.handles
            .write()
            .await
            .insert(code.as_str().to_string(), handle.clone());
        info!("Cached tenant handle for: {}", code);
        Ok(handle)
    }

    /// Connect with one bounded retry before surfacing the failure.
    async fn establish(&self, code: &CanonicalCode) -> Result<TenantHandle, DatabaseError> {
        match self.try_connect(code).await {
            Ok(handle) => Ok(handle),
            Err(first_err) => {
                warn!("Connection setup for {} failed, retrying once: {}", code, first_err);
                self.try_connect(code).await
            }
        }
    }

    async fn try_connect(&self, code: &CanonicalCode) -> Result<TenantHandle, DatabaseError> {
        match timeout(self.settings.connect_timeout, self.connector.connect(code)).await {
            Ok(result) => result,
            Err(_) => Err(DatabaseError::TenantUnreachable(format!(
                "connection setup for {} timed out after {:?}",
                code, self.settings.connect_timeout
            ))),
        }
    }

    async fn probe(&self, handle: &TenantHandle) -> bool {
        matches!(
            timeout(self.settings.probe_timeout, handle.ping()).await,
            Ok(Ok(()))
        )
    }

    async fn cached(&self, code: &CanonicalCode) -> Option<TenantHandle> {
        self.handles.read().await.get(code.as_str()).cloned()
    }

    fn init_lock(&self, code: &CanonicalCode) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.init_locks.lock().expect("init lock map poisoned");
        locks
            .entry(code.as_str().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn evict(&self, code: &CanonicalCode, reason: &str) {
        if let Some(handle) = self.handles.write().await.remove(code.as_str()) {
            warn!("Evicting tenant handle for {}: {}", code, reason);
            handle.close().await;
        }
    }

    /// Explicit eviction, e.g. after a tenant is deactivated.
    pub async fn invalidate(&self, code: &CanonicalCode) {
        if let Some(handle) = self.handles.write().await.remove(code.as_str()) {
            handle.close().await;
            info!("Invalidated tenant handle for: {}", code);
        }
    }

    /// Close and remove all handles (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut handles = self.handles.write().await;
        for (code, handle) in handles.drain() {
            handle.close().await;
            info!("Closed tenant handle: {}", code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryTenantConnector;

    fn tight_settings() -> ManagerSettings {
        ManagerSettings {
            connect_timeout: Duration::from_millis(250),
            probe_timeout: Duration::from_millis(250),
        }
    }

    #[tokio::test]
    async fn sequential_calls_share_one_handle() {
        let connector = Arc::new(MemoryTenantConnector::new());
        let manager = ConnectionManager::with_settings(connector.clone(), tight_settings());
        let code = CanonicalCode::new("GHS01");

        let first = manager.handle(&code).await.unwrap();
        let second = manager.handle(&code).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connections_created(), 1);
    }

    #[tokio::test]
    async fn distinct_tenants_get_distinct_handles() {
        let connector = Arc::new(MemoryTenantConnector::new());
        let manager = ConnectionManager::with_settings(connector.clone(), tight_settings());

        let a = manager.handle(&CanonicalCode::new("AAA")).await.unwrap();
        let b = manager.handle(&CanonicalCode::new("BBB")).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connections_created(), 2);
    }

    #[tokio::test]
    async fn broken_handle_is_recreated() {
        let connector = Arc::new(MemoryTenantConnector::new());
        let manager = ConnectionManager::with_settings(connector.clone(), tight_settings());
        let code = CanonicalCode::new("GHS01");

        let first = manager.handle(&code).await.unwrap();
        connector.fail_pings(&code, true);

        // Probe fails, entry is evicted, a fresh connection is established
        let second = manager.handle(&code).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connections_created(), 2);
    }

    #[tokio::test]
    async fn unreachable_tenant_surfaces_after_retry() {
        let connector = Arc::new(MemoryTenantConnector::new());
        connector.fail_connects(true);
        let manager = ConnectionManager::with_settings(connector.clone(), tight_settings());

        let err = manager.handle(&CanonicalCode::new("GHS01")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::TenantUnreachable(_)));
        // initial attempt plus exactly one retry
        assert_eq!(connector.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn invalidate_drops_cached_handle() {
        let connector = Arc::new(MemoryTenantConnector::new());
        let manager = ConnectionManager::with_settings(connector.clone(), tight_settings());
        let code = CanonicalCode::new("GHS01");

        let first = manager.handle(&code).await.unwrap();
        manager.invalidate(&code).await;
        let second = manager.handle(&code).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connections_created(), 2);
    }
}
