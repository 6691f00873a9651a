use async_trait::async_trait;

use crate::domain::errors::RemoteError;
use crate::domain::models::{ActualState, BulkChangeResponse, ChangeRequest, Entity, ServiceScope};

/// Port for the monitoring bulk-change API.
///
/// Implementations own transport-level retries (read timeouts and
/// re-authentication); anything they return as an error is fatal to the run.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Apply a change to the request's entities and services.
    async fn submit(&self, request: &ChangeRequest<'_>) -> Result<BulkChangeResponse, RemoteError>;

    /// Read the current state of `services` on `entities`. Never mutates.
    async fn query_state(
        &self,
        entities: &[Entity],
        services: &ServiceScope,
    ) -> Result<ActualState, RemoteError>;
}
