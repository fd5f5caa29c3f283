pub mod connector;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use connector::{PgTenantConnector, TenantConnector};
pub use manager::{ConnectionManager, DatabaseError, ManagerSettings};
pub use store::{StoreError, TenantHandle, TenantStore};
