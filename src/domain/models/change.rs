//! Desired-state changes and the per-round request built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::entity::{Entity, ServiceScope};
use crate::domain::errors::{DomainError, DomainResult};

/// Which monitoring flags an enable/disable change touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    pub checks: bool,
    pub notifications: bool,
    /// Free-form comment recorded with the change.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Toggles {
    /// Requesting neither flag means both.
    pub fn new(checks: bool, notifications: bool) -> Self {
        let (checks, notifications) = if checks || notifications {
            (checks, notifications)
        } else {
            (true, true)
        };
        Self {
            checks,
            notifications,
            comment: None,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A maintenance window to schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeWindow {
    pub comment: String,
    /// Window length in seconds.
    pub duration_secs: u64,
    pub start_time: DateTime<Utc>,
}

/// The kind of change, with its parameters as variant payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChangeKind {
    Enable(Toggles),
    Disable(Toggles),
    Downtime(DowntimeWindow),
    DowntimeDelete,
    Ack { comment: String },
    AckDelete,
    PassiveRun { submit: bool },
}

impl ChangeKind {
    /// Whether the result is checked against a follow-up state query.
    pub const fn is_validated(&self) -> bool {
        matches!(self, Self::Enable(_) | Self::Disable(_) | Self::Downtime(_))
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Enable(_) => "enable",
            Self::Disable(_) => "disable",
            Self::Downtime(_) => "downtime",
            Self::DowntimeDelete => "downtime-delete",
            Self::Ack { .. } => "ack",
            Self::AckDelete => "ack-delete",
            Self::PassiveRun { .. } => "passive",
        }
    }

    /// Desired value and flags for enable/disable kinds.
    pub const fn toggle_target(&self) -> Option<(bool, &Toggles)> {
        match self {
            Self::Enable(toggles) => Some((true, toggles)),
            Self::Disable(toggles) => Some((false, toggles)),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operator's desired change. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredChange {
    kind: ChangeKind,
    scope: ServiceScope,
}

impl DesiredChange {
    /// Build a change. Maintenance windows always start out covering every
    /// service, since counts are compared across the whole service set.
    pub fn new(kind: ChangeKind, scope: ServiceScope) -> DomainResult<Self> {
        if scope.is_empty() {
            return Err(DomainError::InvalidChange(
                "service scope names no services".to_string(),
            ));
        }
        let scope = match kind {
            ChangeKind::Downtime(ref window) => {
                if window.duration_secs == 0 {
                    return Err(DomainError::InvalidChange(
                        "downtime duration must be positive".to_string(),
                    ));
                }
                ServiceScope::All
            }
            ChangeKind::DowntimeDelete => ServiceScope::All,
            _ => scope,
        };
        Ok(Self { kind, scope })
    }

    pub const fn kind(&self) -> &ChangeKind {
        &self.kind
    }

    pub const fn scope(&self) -> &ServiceScope {
        &self.scope
    }
}

/// Entities and services one round of a change applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeScope {
    pub entities: BTreeSet<Entity>,
    pub services: ServiceScope,
}

impl ChangeScope {
    pub fn new(entities: impl IntoIterator<Item = Entity>, services: ServiceScope) -> Self {
        Self {
            entities: entities.into_iter().collect(),
            services,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() || self.services.is_empty()
    }

    /// Restrict this scope to what `current` already covers.
    #[must_use]
    pub fn narrowed_within(&self, current: &Self) -> Self {
        Self {
            entities: self
                .entities
                .intersection(&current.entities)
                .cloned()
                .collect(),
            services: self.services.intersect(&current.services),
        }
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.entities.is_subset(&other.entities) && self.services.is_subset_of(&other.services)
    }
}

/// A single call to the bulk change API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest<'a> {
    pub kind: &'a ChangeKind,
    pub entities: Vec<Entity>,
    pub services: ServiceScope,
}

impl<'a> ChangeRequest<'a> {
    pub fn new(kind: &'a ChangeKind, scope: &ChangeScope) -> Self {
        Self {
            kind,
            entities: scope.entities.iter().cloned().collect(),
            services: scope.services.clone(),
        }
    }
}
