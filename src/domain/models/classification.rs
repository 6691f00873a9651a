//! Per-entity classification and the final reconciliation result.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::change::ChangeKind;
use super::entity::{Entity, ServiceScope};
use super::state::BulkChangeResponse;

/// Why automatic reconciliation was withheld for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// More than two distinct maintenance counts.
    AmbiguousCounts,
    /// Two maintenance counts more than one apart.
    CountGap,
    /// The entity reported no services that could be compared.
    NoServices,
    /// The validation query did not return the entity.
    NotReported,
    /// Its lagging services share nothing with the other lagging hosts.
    NoSharedServices,
    /// Lagging services moved outside the previous retry scope.
    Regressed,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AmbiguousCounts => "more than two distinct maintenance counts",
            Self::CountGap => "maintenance counts differ by more than one",
            Self::NoServices => "no comparable services reported",
            Self::NotReported => "entity missing from validation response",
            Self::NoSharedServices => "lagging services not shared with other hosts",
            Self::Regressed => "lagging services outside previous retry scope",
        };
        f.write_str(text)
    }
}

/// Outcome of comparing one entity's desired and actual state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Classification {
    Success,
    Failure { services: BTreeSet<String> },
    Partial { failing: BTreeSet<String> },
    Review {
        services: BTreeSet<String>,
        reason: ReviewReason,
    },
}

impl Classification {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether another round could fix this entity.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Failure { .. } | Self::Partial { .. })
    }

    /// Services implicated in a non-success outcome.
    pub fn services(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Success => None,
            Self::Failure { services } | Self::Review { services, .. } => Some(services),
            Self::Partial { failing } => Some(failing),
        }
    }

    /// Display marker for reports: `true`, `false`, `PARTIAL:a, b` or `REVIEW`.
    pub fn marker(&self) -> String {
        match self {
            Self::Success => "true".to_string(),
            Self::Failure { .. } => "false".to_string(),
            Self::Partial { failing } => format!(
                "PARTIAL:{}",
                failing.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            Self::Review { .. } => "REVIEW".to_string(),
        }
    }
}

/// How a reconciliation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing left that another round could fix.
    Converged,
    /// The retry budget ran out with failures remaining.
    Exhausted,
    /// The change kind is never validated.
    Unvalidated,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Unvalidated => write!(f, "unvalidated"),
        }
    }
}

/// What one change+validate round covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    /// 1-based round number.
    pub round: u32,
    pub entities: BTreeSet<Entity>,
    pub services: ServiceScope,
    /// Entities still Failure or Partial after the round.
    pub failing: usize,
}

/// An entity held back for a human to look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewItem {
    pub entity: Entity,
    pub services: BTreeSet<String>,
    pub reason: ReviewReason,
}

/// Final classified outcome of a change request.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub change_kind: ChangeKind,
    pub outcome: Outcome,
    /// Validation rounds performed.
    pub rounds: u32,
    pub classifications: BTreeMap<Entity, Classification>,
    pub history: Vec<RoundRecord>,
    /// Last bulk change response, as returned by the API.
    pub response: BulkChangeResponse,
}

impl ReconciliationResult {
    pub fn classification(&self, entity: &Entity) -> Option<&Classification> {
        self.classifications.get(entity)
    }

    pub fn marker(&self, entity: &Entity) -> Option<String> {
        self.classification(entity).map(Classification::marker)
    }

    pub fn review_queue(&self) -> Vec<ReviewItem> {
        self.classifications
            .iter()
            .filter_map(|(entity, class)| match class {
                Classification::Review { services, reason } => Some(ReviewItem {
                    entity: entity.clone(),
                    services: services.clone(),
                    reason: *reason,
                }),
                _ => None,
            })
            .collect()
    }

    /// Entities another round could still have fixed.
    pub fn unresolved(&self) -> impl Iterator<Item = (&Entity, &Classification)> {
        self.classifications
            .iter()
            .filter(|(_, class)| class.is_retryable())
    }

    pub fn is_clean(&self) -> bool {
        self.classifications.values().all(Classification::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_markers() {
        assert_eq!(Classification::Success.marker(), "true");
        assert_eq!(
            Classification::Failure {
                services: set(&["HOST"])
            }
            .marker(),
            "false"
        );
        assert_eq!(
            Classification::Partial {
                failing: set(&["TIME", "PUCK"])
            }
            .marker(),
            "PARTIAL:PUCK, TIME"
        );
        assert_eq!(
            Classification::Review {
                services: set(&[]),
                reason: ReviewReason::NotReported
            }
            .marker(),
            "REVIEW"
        );
    }

    #[test]
    fn test_review_queue_lists_only_review_entities() {
        let mut classifications = BTreeMap::new();
        classifications.insert(Entity::from("h1"), Classification::Success);
        classifications.insert(
            Entity::from("h2"),
            Classification::Review {
                services: set(&["A", "B", "C"]),
                reason: ReviewReason::CountGap,
            },
        );
        let result = ReconciliationResult {
            change_kind: ChangeKind::AckDelete,
            outcome: Outcome::Converged,
            rounds: 1,
            classifications,
            history: Vec::new(),
            response: BulkChangeResponse::default(),
        };

        let queue = result.review_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].entity, Entity::from("h2"));
        assert_eq!(queue[0].reason, ReviewReason::CountGap);
        assert!(!result.is_clean());
        assert_eq!(result.unresolved().count(), 0);
    }
}
