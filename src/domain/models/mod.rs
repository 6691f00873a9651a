pub mod batch;
pub mod change;
pub mod classification;
pub mod config;
pub mod entity;
pub mod inventory;
pub mod state;

pub use batch::{AggregatedResults, Batch, BatchId};
pub use change::{ChangeKind, ChangeRequest, ChangeScope, DesiredChange, DowntimeWindow, Toggles};
pub use classification::{
    Classification, Outcome, ReconciliationResult, ReviewItem, ReviewReason, RoundRecord,
};
pub use config::{
    Config, Credentials, DispatchConfig, InventoryConfig, LogFormat, LoggingConfig,
    MonitoringConfig, RateLimitConfig, ReconcileConfig, RotationPolicy,
};
pub use entity::{Entity, ServiceScope, WILDCARD};
pub use inventory::{InventoryPage, InventoryQuery, InventoryRow, PagingInfo};
pub use state::{
    ActualState, BulkChangeResponse, EntityReport, EntityState, MaintenanceEvent, ServiceState,
};
