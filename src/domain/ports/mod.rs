//! Port trait definitions (Hexagonal Architecture)
//!
//! - MonitoringApi: bulk change calls and read-only state queries
//! - InventoryApi: paginated inventory search
//! - CredentialProvider: login credentials for session re-establishment

pub mod credentials;
pub mod inventory_api;
pub mod monitoring_api;

pub use credentials::{CredentialProvider, StaticCredentials};
pub use inventory_api::InventoryApi;
pub use monitoring_api::MonitoringApi;
