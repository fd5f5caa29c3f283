//! Shared fixtures for the integration suites: a memory-backed platform
//! with one registered school.

use std::sync::Arc;
use std::time::Duration;

use campus_core::database::manager::{ConnectionManager, ManagerSettings};
use campus_core::database::memory::MemoryTenantConnector;
use campus_core::registry::{MemoryRegistryStore, TenantRegistry};
use campus_core::services::AccessService;

pub const SCHOOL_CODE: &str = "GHS01";
pub const SCHOOL_NAME: &str = "Greenfield High School";

pub struct TestPlatform {
    pub connector: Arc<MemoryTenantConnector>,
    pub connections: Arc<ConnectionManager>,
    pub registry: Arc<TenantRegistry>,
    pub service: Arc<AccessService>,
}

pub fn tight_settings() -> ManagerSettings {
    ManagerSettings {
        connect_timeout: Duration::from_millis(500),
        probe_timeout: Duration::from_millis(500),
    }
}

/// Platform with one registered school and no connections established yet.
pub async fn platform() -> TestPlatform {
    campus_core::init_tracing();

    let connector = Arc::new(MemoryTenantConnector::new());
    let connections = Arc::new(ConnectionManager::with_settings(
        connector.clone(),
        tight_settings(),
    ));
    let registry = Arc::new(TenantRegistry::with_options(
        Arc::new(MemoryRegistryStore::new()),
        false,
    ));
    registry.register(SCHOOL_CODE, SCHOOL_NAME).await.unwrap();

    let service = Arc::new(AccessService::new(registry.clone(), connections.clone()));
    TestPlatform {
        connector,
        connections,
        registry,
        service,
    }
}
