//! fleetmon - bulk monitoring changes that converge
//!
//! fleetmon applies a desired change (enable or disable checks and
//! notifications, schedule or delete downtime, acknowledge, run passive
//! checks) to many entities at once through a monitoring system's bulk API.
//! Entities are split into batches and dispatched to a bounded pool of
//! workers. After each change the actual state is queried back and diffed
//! against the request, and only what still differs is retried, up to a
//! fixed budget.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): dispatch, aggregation, diffing and the
//!   retry loop
//! - **Infrastructure Layer** (`infrastructure`): HTTP adapters, config and
//!   logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fleetmon::{ChangeKind, DesiredChange, Entity, RetryCoordinator, ServiceScope, Toggles};
//!
//! let change = DesiredChange::new(
//!     ChangeKind::Disable(Toggles::new(true, false)),
//!     ServiceScope::from_names(["HTTP"]),
//! )?;
//! let coordinator = RetryCoordinator::from_config(Arc::new(client), &config);
//! let result = coordinator.run(&change, &[Entity::from("h1")]).await?;
//! assert!(result.is_clean());
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, RemoteError};
pub use domain::models::{
    ChangeKind, Classification, Config, DesiredChange, DowntimeWindow, Entity, InventoryQuery,
    Outcome, ReconciliationResult, ReviewReason, ServiceScope, Toggles,
};
pub use domain::ports::{CredentialProvider, InventoryApi, MonitoringApi, StaticCredentials};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BatchDispatcher, InventoryService, RetryCoordinator, StateDiffer};
