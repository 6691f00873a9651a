//! Classifies entities by comparing a requested change against the state the
//! monitoring API reports afterwards.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::domain::models::{
    ActualState, ChangeKind, ChangeScope, Classification, Entity, EntityState, ReviewReason,
    ServiceScope, Toggles,
};

/// Classifications for one round plus the scope another round should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub classifications: BTreeMap<Entity, Classification>,
    /// `None` when nothing can be fixed by retrying.
    pub retry: Option<ChangeScope>,
}

impl DiffReport {
    pub fn failing(&self) -> usize {
        self.classifications
            .values()
            .filter(|class| class.is_retryable())
            .count()
    }
}

/// Stateless comparison of desired and actual state.
pub struct StateDiffer;

impl StateDiffer {
    /// Classify every entity of `round` against `actual`.
    ///
    /// Entities missing from `actual` become `Review(NotReported)` and are
    /// never retried. Kinds that are not validated are accepted as sent.
    pub fn diff(kind: &ChangeKind, round: &ChangeScope, actual: &ActualState) -> DiffReport {
        if let Some((desired, toggles)) = kind.toggle_target() {
            return diff_toggles(desired, toggles, round, actual);
        }
        match kind {
            ChangeKind::Downtime(_) => diff_downtime(round, actual),
            _ => Self::accept(round),
        }
    }

    /// Every entity of the round is a success; nothing to retry.
    pub fn accept(round: &ChangeScope) -> DiffReport {
        DiffReport {
            classifications: round
                .entities
                .iter()
                .map(|entity| (entity.clone(), Classification::Success))
                .collect(),
            retry: None,
        }
    }
}

fn not_reported(round: &ChangeScope) -> Classification {
    let services = match &round.services {
        ServiceScope::All => BTreeSet::new(),
        ServiceScope::Named(names) => names.clone(),
    };
    Classification::Review {
        services,
        reason: ReviewReason::NotReported,
    }
}

fn classify_toggles(
    desired: bool,
    toggles: &Toggles,
    scope: &ServiceScope,
    state: &EntityState,
) -> Classification {
    let mut compared = 0usize;
    let mut mismatched = 0usize;
    let mut failing = BTreeSet::new();
    let mut seen = BTreeSet::new();

    for (service, svc) in state.in_scope(scope) {
        seen.insert(service.clone());
        let flags = [
            (toggles.checks, svc.checks_enabled),
            (toggles.notifications, svc.notifications_enabled),
        ];
        for (requested, reported) in flags {
            let Some(value) = reported.filter(|_| requested) else {
                continue;
            };
            compared += 1;
            if value != desired {
                mismatched += 1;
                failing.insert(service.clone());
            }
        }
    }

    if compared == 0 {
        Classification::Review {
            services: seen,
            reason: ReviewReason::NoServices,
        }
    } else if mismatched == 0 {
        Classification::Success
    } else if mismatched == compared {
        Classification::Failure { services: failing }
    } else {
        Classification::Partial { failing }
    }
}

fn diff_toggles(
    desired: bool,
    toggles: &Toggles,
    round: &ChangeScope,
    actual: &ActualState,
) -> DiffReport {
    let mut classifications = BTreeMap::new();
    let mut retry_entities = BTreeSet::new();
    let mut retry_services = BTreeSet::new();

    for entity in &round.entities {
        let class = actual.get(entity).map_or_else(
            || not_reported(round),
            |state| classify_toggles(desired, toggles, &round.services, state),
        );
        if class.is_retryable() {
            retry_entities.insert(entity.clone());
            if let Some(services) = class.services() {
                retry_services.extend(services.iter().cloned());
            }
        }
        debug!(entity = %entity, marker = %class.marker(), "Entity classified");
        classifications.insert(entity.clone(), class);
    }

    let retry = (!retry_entities.is_empty()).then(|| ChangeScope {
        entities: retry_entities,
        services: ServiceScope::Named(retry_services),
    });
    DiffReport {
        classifications,
        retry,
    }
}

/// Services grouped by how many maintenance events they carry.
fn maintenance_groups(state: &EntityState) -> BTreeMap<usize, BTreeSet<String>> {
    let mut groups: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for (service, svc) in &state.services {
        groups
            .entry(svc.maintenance_count())
            .or_default()
            .insert(service.clone());
    }
    groups
}

/// Lagging services of one entity, or its final classification.
enum DowntimeVerdict {
    Done(Classification),
    Lagging(BTreeSet<String>),
}

fn judge_downtime(scope: &ServiceScope, state: &EntityState) -> DowntimeVerdict {
    let all: BTreeSet<String> = state.services.keys().cloned().collect();
    let review = |reason| {
        DowntimeVerdict::Done(Classification::Review {
            services: all.clone(),
            reason,
        })
    };

    let groups = maintenance_groups(state);
    let mut counts = groups.iter();
    match (counts.next(), counts.next(), counts.next()) {
        (None, _, _) => review(ReviewReason::NoServices),
        (Some(_), None, _) => DowntimeVerdict::Done(Classification::Success),
        (Some((low, lagging)), Some((high, _)), None) => {
            if high - low != 1 {
                return review(ReviewReason::CountGap);
            }
            let within: BTreeSet<String> = lagging
                .iter()
                .filter(|service| scope.contains(service))
                .cloned()
                .collect();
            if within.is_empty() {
                DowntimeVerdict::Done(Classification::Review {
                    services: lagging.clone(),
                    reason: ReviewReason::Regressed,
                })
            } else {
                DowntimeVerdict::Lagging(within)
            }
        }
        (Some(_), Some(_), Some(_)) => review(ReviewReason::AmbiguousCounts),
    }
}

fn diff_downtime(round: &ChangeScope, actual: &ActualState) -> DiffReport {
    let mut classifications = BTreeMap::new();
    let mut retry_entities = BTreeSet::new();
    let mut shared: Option<BTreeSet<String>> = None;

    // BTreeSet iteration keeps the running intersection in host-name order.
    for entity in &round.entities {
        let Some(state) = actual.get(entity) else {
            classifications.insert(entity.clone(), not_reported(round));
            continue;
        };

        let class = match judge_downtime(&round.services, state) {
            DowntimeVerdict::Done(class) => class,
            DowntimeVerdict::Lagging(lagging) => {
                let overlap: BTreeSet<String> = shared
                    .as_ref()
                    .map_or_else(|| lagging.clone(), |s| s.intersection(&lagging).cloned().collect());
                if overlap.is_empty() {
                    Classification::Review {
                        services: lagging,
                        reason: ReviewReason::NoSharedServices,
                    }
                } else {
                    shared = Some(overlap);
                    retry_entities.insert(entity.clone());
                    Classification::Partial { failing: lagging }
                }
            }
        };
        debug!(entity = %entity, marker = %class.marker(), "Entity classified");
        classifications.insert(entity.clone(), class);
    }

    let retry = shared
        .filter(|_| !retry_entities.is_empty())
        .map(|services| ChangeScope {
            entities: retry_entities,
            services: ServiceScope::Named(services),
        });
    DiffReport {
        classifications,
        retry,
    }
}
