/// Request and response bodies of the monitoring bulk API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::models::{
    BulkChangeResponse, ChangeRequest, Entity, EntityReport, EntityState, MaintenanceEvent,
    ServiceState,
};

/// Body of every bulk call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkRequest {
    /// Entity names
    pub entities: Vec<String>,

    /// Alert services; `["*"]` for all
    pub service_list: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_checks: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Maintenance length in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    /// Maintenance start, epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

impl BulkRequest {
    /// Body for a read-only state query.
    pub fn query(entities: &[Entity], service_list: Vec<String>) -> Self {
        Self {
            entities: entities.iter().map(|e| e.name().to_string()).collect(),
            service_list,
            ..Self::default()
        }
    }
}

impl From<&ChangeRequest<'_>> for BulkRequest {
    fn from(request: &ChangeRequest<'_>) -> Self {
        use crate::domain::models::ChangeKind;

        let mut body = Self::query(&request.entities, request.services.to_wire());
        match request.kind {
            ChangeKind::Enable(toggles) | ChangeKind::Disable(toggles) => {
                let desired = matches!(request.kind, ChangeKind::Enable(_));
                body.enable_checks = toggles.checks.then_some(desired);
                body.notify = toggles.notifications.then_some(desired);
                body.comment.clone_from(&toggles.comment);
            }
            ChangeKind::Downtime(window) => {
                body.comment = Some(window.comment.clone());
                body.duration = Some(window.duration_secs);
                body.start_time = Some(window.start_time.timestamp());
            }
            ChangeKind::Ack { comment } => body.comment = Some(comment.clone()),
            ChangeKind::DowntimeDelete | ChangeKind::AckDelete | ChangeKind::PassiveRun { .. } => {}
        }
        body
    }
}

/// Login body for `/auth`
#[derive(Serialize)]
pub struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Top-level response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub data: EnvelopeData,
}

/// Change calls answer under `response`, queries under `results`.
#[derive(Debug, Deserialize)]
pub struct EnvelopeData {
    #[serde(default, alias = "results")]
    pub response: BTreeMap<String, WireEntity>,
}

/// One entity's entry in a response
#[derive(Debug, Default, Deserialize)]
pub struct WireEntity {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub alert_services: BTreeMap<String, WireService>,
}

/// One alert service's entry
#[derive(Debug, Default, Deserialize)]
pub struct WireService {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub data: WireServiceData,
}

/// Service state payload; flags arrive as booleans or strings.
#[derive(Debug, Default, Deserialize)]
pub struct WireServiceData {
    #[serde(default)]
    pub checks: Option<Value>,

    #[serde(default)]
    pub notifications: Option<Value>,

    #[serde(default)]
    pub status_string: Option<String>,

    #[serde(default)]
    pub maintenance: Vec<WireMaintenance>,
}

/// A maintenance window as reported
#[derive(Debug, Default, Deserialize)]
pub struct WireMaintenance {
    #[serde(default)]
    pub created_by: Option<String>,

    /// Epoch seconds or an RFC 3339 string
    #[serde(default)]
    pub end_time: Option<Value>,
}

fn flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "enabled" => Some(true),
            "false" | "no" | "off" | "0" | "disabled" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

impl From<WireService> for ServiceState {
    fn from(service: WireService) -> Self {
        let data = service.data;
        Self {
            checks_enabled: flag(data.checks.as_ref()),
            notifications_enabled: flag(data.notifications.as_ref()),
            status: data.status_string,
            maintenance: data
                .maintenance
                .into_iter()
                .map(|m| MaintenanceEvent {
                    created_by: m.created_by,
                    end_time: timestamp(m.end_time.as_ref()),
                })
                .collect(),
        }
    }
}

impl From<WireEntity> for EntityReport {
    fn from(entity: WireEntity) -> Self {
        let derived = entity
            .alert_services
            .values()
            .all(|svc| svc.success.unwrap_or(true));
        let success = entity.success.unwrap_or(derived);
        let state = EntityState::new(
            entity
                .alert_services
                .into_iter()
                .map(|(name, svc)| (name, ServiceState::from(svc))),
        );
        Self { success, state }
    }
}

impl From<Envelope> for BulkChangeResponse {
    fn from(envelope: Envelope) -> Self {
        Self {
            entities: envelope
                .data
                .response
                .into_iter()
                .map(|(name, entity)| (Entity::from(name), EntityReport::from(entity)))
                .collect(),
        }
    }
}
