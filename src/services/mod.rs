//! Service layer: batching, aggregation, diffing and the retry loop.

pub mod batch_dispatcher;
pub mod inventory_service;
pub mod result_aggregator;
pub mod retry_coordinator;
pub mod state_differ;

pub use batch_dispatcher::{BatchDispatcher, WorkerFuture};
pub use inventory_service::{InventoryPager, InventoryService};
pub use result_aggregator::{AggregatorMessage, ResultAggregator};
pub use retry_coordinator::RetryCoordinator;
pub use state_differ::{DiffReport, StateDiffer};
