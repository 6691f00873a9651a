//! Common test utilities for integration tests
//!
//! `SimulatedMonitoring` is an in-memory monitoring system: change calls
//! really alter its state, except for service pairs marked stubborn, which
//! ignore a set number of change calls first.

#![allow(dead_code)]

use async_trait::async_trait;
use fleetmon::domain::errors::RemoteError;
use fleetmon::domain::models::{
    ActualState, BulkChangeResponse, ChangeKind, ChangeRequest, Entity, EntityReport,
    EntityState, MaintenanceEvent, ServiceScope, ServiceState,
};
use fleetmon::domain::ports::MonitoringApi;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded change call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCall {
    pub kind: &'static str,
    pub entities: Vec<Entity>,
    pub services: ServiceScope,
}

#[derive(Default)]
pub struct SimulatedMonitoring {
    state: Mutex<ActualState>,
    stubborn: Mutex<BTreeMap<(String, String), u32>>,
    changes: Mutex<Vec<ChangeCall>>,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    latency: Duration,
}

impl SimulatedMonitoring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long, so concurrent calls overlap.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add an entity whose services all start with the given flags.
    #[must_use]
    pub fn with_entity(self, entity: &str, services: &[&str], checks: bool, notify: bool) -> Self {
        self.state.lock().unwrap().insert(
            Entity::from(entity),
            EntityState::new(
                services
                    .iter()
                    .map(|s| ((*s).to_string(), ServiceState::with_flags(checks, notify))),
            ),
        );
        self
    }

    /// `entity`/`service` ignores the next `misses` change calls.
    #[must_use]
    pub fn with_stubborn(self, entity: &str, service: &str, misses: u32) -> Self {
        self.stubborn
            .lock()
            .unwrap()
            .insert((entity.to_string(), service.to_string()), misses);
        self
    }

    /// Set one service's maintenance count directly.
    pub fn set_maintenance(&self, entity: &str, service: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        let svc = state
            .get_mut(&Entity::from(entity))
            .and_then(|e| e.services.get_mut(service))
            .unwrap();
        svc.maintenance = vec![maintenance(); count];
    }

    pub fn changes(&self) -> Vec<ChangeCall> {
        self.changes.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ActualState {
        self.state.lock().unwrap().clone()
    }

    fn ignores(&self, entity: &str, service: &str) -> bool {
        let mut stubborn = self.stubborn.lock().unwrap();
        match stubborn.get_mut(&(entity.to_string(), service.to_string())) {
            Some(misses) if *misses > 0 => {
                *misses -= 1;
                true
            }
            _ => false,
        }
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn apply(kind: &ChangeKind, service: &mut ServiceState) {
    match kind {
        ChangeKind::Enable(toggles) | ChangeKind::Disable(toggles) => {
            let desired = matches!(kind, ChangeKind::Enable(_));
            if toggles.checks {
                service.checks_enabled = Some(desired);
            }
            if toggles.notifications {
                service.notifications_enabled = Some(desired);
            }
        }
        ChangeKind::Downtime(_) => service.maintenance.push(maintenance()),
        ChangeKind::DowntimeDelete => service.maintenance.clear(),
        ChangeKind::Ack { .. } | ChangeKind::AckDelete | ChangeKind::PassiveRun { .. } => {}
    }
}

pub fn maintenance() -> MaintenanceEvent {
    MaintenanceEvent {
        created_by: Some("fleetmon".to_string()),
        end_time: None,
    }
}

#[async_trait]
impl MonitoringApi for SimulatedMonitoring {
    async fn submit(&self, request: &ChangeRequest<'_>) -> Result<BulkChangeResponse, RemoteError> {
        self.enter().await;
        self.changes.lock().unwrap().push(ChangeCall {
            kind: request.kind.name(),
            entities: request.entities.clone(),
            services: request.services.clone(),
        });

        let mut response = BulkChangeResponse::default();
        {
            let mut state = self.state.lock().unwrap();
            for entity in &request.entities {
                let Some(entity_state) = state.get_mut(entity) else {
                    continue;
                };
                for (name, service) in &mut entity_state.services {
                    if request.services.contains(name) && !self.ignores(entity.name(), name) {
                        apply(request.kind, service);
                    }
                }
                response.entities.insert(
                    entity.clone(),
                    EntityReport {
                        success: true,
                        state: entity_state.clone(),
                    },
                );
            }
        }

        self.leave();
        Ok(response)
    }

    async fn query_state(
        &self,
        entities: &[Entity],
        services: &ServiceScope,
    ) -> Result<ActualState, RemoteError> {
        self.enter().await;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let snapshot = {
            let state = self.state.lock().unwrap();
            entities
                .iter()
                .filter_map(|entity| {
                    state.get(entity).map(|s| {
                        let visible = s
                            .in_scope(services)
                            .map(|(name, svc)| (name.clone(), svc.clone()));
                        (entity.clone(), EntityState::new(visible))
                    })
                })
                .collect()
        };

        self.leave();
        Ok(snapshot)
    }
}

pub fn entities(names: &[&str]) -> Vec<Entity> {
    names.iter().map(|n| Entity::from(*n)).collect()
}

pub fn services(names: &[&str]) -> ServiceScope {
    ServiceScope::from_names(names.iter().copied())
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
