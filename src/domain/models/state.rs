//! Actual-state snapshots as reported by the monitoring API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::{Entity, ServiceScope};

/// One maintenance window recorded against a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceEvent {
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Reported state of a single alert service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// `None` when the API did not report the flag.
    pub checks_enabled: Option<bool>,
    pub notifications_enabled: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub maintenance: Vec<MaintenanceEvent>,
}

impl ServiceState {
    pub fn with_flags(checks: bool, notifications: bool) -> Self {
        Self {
            checks_enabled: Some(checks),
            notifications_enabled: Some(notifications),
            ..Self::default()
        }
    }

    pub fn maintenance_count(&self) -> usize {
        self.maintenance.len()
    }
}

/// Every reported service of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub services: BTreeMap<String, ServiceState>,
}

impl EntityState {
    pub fn new(services: impl IntoIterator<Item = (String, ServiceState)>) -> Self {
        Self {
            services: services.into_iter().collect(),
        }
    }

    /// Services that fall inside `scope`.
    pub fn in_scope<'a>(
        &'a self,
        scope: &'a ServiceScope,
    ) -> impl Iterator<Item = (&'a String, &'a ServiceState)> + 'a {
        self.services
            .iter()
            .filter(move |(name, _)| scope.contains(name))
    }
}

/// A full actual-state snapshot keyed by entity.
pub type ActualState = BTreeMap<Entity, EntityState>;

/// Per-entity outcome of one bulk change call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    /// The API's own claim, which is not trusted for convergence.
    pub success: bool,
    #[serde(default)]
    pub state: EntityState,
}

/// Wire-level result of a bulk change call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkChangeResponse {
    pub entities: BTreeMap<Entity, EntityReport>,
}

impl BulkChangeResponse {
    /// Merge a later response in. Entities it reports replace their earlier
    /// entries; every other entity keeps its last report.
    pub fn absorb(&mut self, later: Self) {
        self.entities.extend(later.entities);
    }

    /// Flatten the reports into an actual-state snapshot.
    pub fn into_state(self) -> ActualState {
        self.entities
            .into_iter()
            .map(|(entity, report)| (entity, report.state))
            .collect()
    }
}
