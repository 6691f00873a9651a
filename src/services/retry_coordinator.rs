//! Change, validate and narrow until the fleet converges or the retry budget
//! runs out.

use futures::FutureExt;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActualState, Batch, BulkChangeResponse, ChangeKind, ChangeRequest, ChangeScope,
    Classification, Config, DesiredChange, Entity, Outcome, ReconciliationResult, RoundRecord,
    ServiceScope,
};
use crate::domain::ports::MonitoringApi;
use crate::services::batch_dispatcher::BatchDispatcher;
use crate::services::state_differ::StateDiffer;

/// Loop position, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initial,
    Validating { round: u32 },
    Retrying { round: u32, budget_left: u32 },
    Converged,
    Exhausted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Validating { round } => write!(f, "validating(round {round})"),
            Self::Retrying { round, budget_left } => {
                write!(f, "retrying(round {round}, {budget_left} left)")
            }
            Self::Converged => write!(f, "converged"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Drives a [`DesiredChange`] to convergence, one round at a time.
pub struct RetryCoordinator {
    api: Arc<dyn MonitoringApi>,
    dispatcher: BatchDispatcher,
    batch_size: usize,
    retry_budget: u32,
    settle_delay: Duration,
}

impl RetryCoordinator {
    pub fn new(api: Arc<dyn MonitoringApi>, dispatcher: BatchDispatcher) -> Self {
        Self {
            api,
            dispatcher,
            batch_size: 500,
            retry_budget: 2,
            settle_delay: Duration::ZERO,
        }
    }

    pub fn from_config(api: Arc<dyn MonitoringApi>, config: &Config) -> Self {
        Self::new(api, BatchDispatcher::from_config(&config.dispatch))
            .with_batch_size(config.dispatch.batch_size)
            .with_retry_budget(config.reconcile.retry_budget)
            .with_settle_delay(Duration::from_millis(config.reconcile.settle_delay_ms))
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub const fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Apply `change` to `entities` and reconcile.
    ///
    /// Transport failures are errors. Entities that never converge are
    /// reported through the result's classifications.
    #[instrument(skip(self, change, entities), fields(kind = %change.kind(), entities = entities.len()))]
    pub async fn run(
        &self,
        change: &DesiredChange,
        entities: &[Entity],
    ) -> DomainResult<ReconciliationResult> {
        let kind = change.kind();
        let mut scope = ChangeScope::new(entities.iter().cloned(), change.scope().clone());
        let mut classifications = BTreeMap::new();
        let mut history = Vec::new();
        let mut response = BulkChangeResponse::default();
        let mut budget = self.retry_budget;
        let mut rounds = 0u32;
        let mut phase = Phase::Initial;

        if scope.is_empty() {
            info!("Nothing to change");
            let outcome = if kind.is_validated() {
                Outcome::Converged
            } else {
                Outcome::Unvalidated
            };
            return Ok(build_result(kind, outcome, 0, classifications, history, response));
        }

        loop {
            response.absorb(self.submit(kind, &scope).await?);

            if !kind.is_validated() {
                classifications.extend(StateDiffer::accept(&scope).classifications);
                info!(entities = scope.entities.len(), "Change applied without validation");
                return Ok(build_result(kind, Outcome::Unvalidated, 0, classifications, history, response));
            }

            rounds += 1;
            transition(&mut phase, Phase::Validating { round: rounds });
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }

            let actual = self.validate(kind, &scope).await?;
            let report = StateDiffer::diff(kind, &scope, &actual);
            let failing = report.failing();
            history.push(RoundRecord {
                round: rounds,
                entities: scope.entities.clone(),
                services: scope.services.clone(),
                failing,
            });
            classifications.extend(report.classifications);

            let next = report
                .retry
                .map(|proposed| proposed.narrowed_within(&scope))
                .filter(|next| !next.is_empty());

            let Some(next) = next else {
                transition(&mut phase, Phase::Converged);
                return Ok(Self::finish(kind, Outcome::Converged, rounds, classifications, history, response));
            };

            if budget == 0 {
                transition(&mut phase, Phase::Exhausted);
                warn!(failing, "Retry budget exhausted with entities still failing");
                return Ok(Self::finish(kind, Outcome::Exhausted, rounds, classifications, history, response));
            }

            budget -= 1;
            transition(
                &mut phase,
                Phase::Retrying {
                    round: rounds + 1,
                    budget_left: budget,
                },
            );
            info!(
                entities = next.entities.len(),
                services = %next.services,
                "Narrowing scope for next round"
            );
            scope = next;
        }
    }

    /// Issue the change call for every batch of the round.
    async fn submit(&self, kind: &ChangeKind, scope: &ChangeScope) -> DomainResult<BulkChangeResponse> {
        let batches = BatchDispatcher::partition(&entity_list(scope), self.batch_size);
        let api = Arc::clone(&self.api);
        let kind = kind.clone();
        let services = scope.services.clone();

        let results = self
            .dispatcher
            .dispatch(batches, move |batch: Batch| {
                let api = Arc::clone(&api);
                let kind = kind.clone();
                let services = services.clone();
                async move {
                    let request = ChangeRequest {
                        kind: &kind,
                        entities: batch.members,
                        services,
                    };
                    api.submit(&request)
                        .await
                        .map(|resp| resp.entities)
                        .map_err(DomainError::from)
                }
                .boxed()
            })
            .await?;

        Ok(BulkChangeResponse {
            entities: results.into_rows(),
        })
    }

    /// Read-only state query for the round's entities.
    ///
    /// Maintenance counts are compared across every service, so downtime
    /// rounds always read the full service set.
    async fn validate(&self, kind: &ChangeKind, scope: &ChangeScope) -> DomainResult<ActualState> {
        let services = match kind {
            ChangeKind::Downtime(_) => ServiceScope::All,
            _ => scope.services.clone(),
        };
        let batches = BatchDispatcher::partition(&entity_list(scope), self.batch_size);
        let api = Arc::clone(&self.api);

        let results = self
            .dispatcher
            .dispatch(batches, move |batch: Batch| {
                let api = Arc::clone(&api);
                let services = services.clone();
                async move {
                    api.query_state(&batch.members, &services)
                        .await
                        .map_err(DomainError::from)
                }
                .boxed()
            })
            .await?;
        Ok(results.into_rows())
    }

    fn finish(
        kind: &ChangeKind,
        outcome: Outcome,
        rounds: u32,
        classifications: BTreeMap<Entity, Classification>,
        history: Vec<RoundRecord>,
        response: BulkChangeResponse,
    ) -> ReconciliationResult {
        let result = build_result(kind, outcome, rounds, classifications, history, response);
        for item in result.review_queue() {
            warn!(
                entity = %item.entity,
                reason = %item.reason,
                services = ?item.services,
                "Entity needs manual review"
            );
        }
        info!(outcome = %result.outcome, rounds, "Reconciliation finished");
        result
    }
}

fn build_result(
    kind: &ChangeKind,
    outcome: Outcome,
    rounds: u32,
    classifications: BTreeMap<Entity, Classification>,
    history: Vec<RoundRecord>,
    response: BulkChangeResponse,
) -> ReconciliationResult {
    ReconciliationResult {
        change_kind: kind.clone(),
        outcome,
        rounds,
        classifications,
        history,
        response,
    }
}

fn entity_list(scope: &ChangeScope) -> Vec<Entity> {
    scope.entities.iter().cloned().collect()
}

fn transition(phase: &mut Phase, next: Phase) {
    info!(from = %phase, to = %next, "Reconciliation state change");
    *phase = next;
}
