//! Bounded fan-out of batch workers.

use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AggregatedResults, Batch, DispatchConfig, Entity};
use crate::services::result_aggregator::{AggregatorMessage, ResultAggregator};

/// Future returned by a batch worker: one remote call's rows, keyed by entity.
pub type WorkerFuture<T> = BoxFuture<'static, DomainResult<BTreeMap<Entity, T>>>;

/// Runs one worker per batch, never more than `max_workers` at once.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    max_workers: usize,
}

impl BatchDispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.max_workers)
    }

    /// Split `entities` into ordered batches of at most `batch_size`.
    ///
    /// Repeated names keep their first position only, so batches never
    /// overlap.
    pub fn partition(entities: &[Entity], batch_size: usize) -> Vec<Batch> {
        let mut seen = HashSet::new();
        let unique: Vec<Entity> = entities
            .iter()
            .filter(|entity| seen.insert(*entity))
            .cloned()
            .collect();

        unique
            .chunks(batch_size.max(1))
            .enumerate()
            .map(|(index, members)| Batch::new(index, members.to_vec()))
            .collect()
    }

    /// Run `worker` once per batch and merge every batch's rows.
    ///
    /// The first worker error or panic aborts every other worker and is
    /// returned; an incomplete result set is never returned.
    pub async fn dispatch<T, F>(
        &self,
        batches: Vec<Batch>,
        worker: F,
    ) -> DomainResult<AggregatedResults<T>>
    where
        T: Send + 'static,
        F: Fn(Batch) -> WorkerFuture<T>,
    {
        let batch_count = batches.len();
        let expected = batches.iter().map(|batch| batch.id).collect();
        let aggregator = ResultAggregator::spawn(batch_count);
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        info!(batch_count, max_workers = self.max_workers, "Dispatching batches");

        for batch in batches {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(err) = settle(joined) {
                    tasks.abort_all();
                    return Err(err);
                }
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DomainError::WorkerPanicked("worker semaphore closed".to_string()))?;

            let tx = aggregator.sender();
            let (id, index, size) = (batch.id, batch.index, batch.len());
            let call = worker(batch);

            tasks.spawn(async move {
                let _permit = permit;
                let rows = call.await.map_err(|err| match err {
                    DomainError::Remote(source) => DomainError::WorkerFailed { batch_id: id, source },
                    other => other,
                })?;
                tx.send(AggregatorMessage::Batch { id, index, rows })
                    .await
                    .map_err(|_| DomainError::WorkerPanicked("result aggregator stopped".to_string()))
            });

            debug!(
                batch = %id,
                index,
                size,
                in_flight = self.max_workers - semaphore.available_permits(),
                "Batch worker started"
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = settle(joined) {
                tasks.abort_all();
                return Err(err);
            }
        }

        aggregator.finish(expected).await
    }
}

fn settle(joined: Result<DomainResult<()>, JoinError>) -> DomainResult<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            error!(error = %err, "Batch worker failed, aborting dispatch");
            Err(err)
        }
        Err(join_err) => {
            error!(error = %join_err, "Batch worker panicked, aborting dispatch");
            Err(DomainError::WorkerPanicked(join_err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::RemoteError;
    use futures::FutureExt;

    fn entities(names: &[&str]) -> Vec<Entity> {
        names.iter().map(|n| Entity::from(*n)).collect()
    }

    #[test]
    fn test_partition_is_ordered_and_bounded() {
        let batches = BatchDispatcher::partition(&entities(&["a", "b", "c", "d", "e"]), 2);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].members, entities(&["a", "b"]));
        assert_eq!(batches[2].members, entities(&["e"]));
        assert_eq!(batches[2].index, 2);
    }

    #[test]
    fn test_partition_drops_repeated_names() {
        let batches = BatchDispatcher::partition(&entities(&["a", "b", "a", "c"]), 10);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].members, entities(&["a", "b", "c"]));
    }

    #[test]
    fn test_partition_empty_input() {
        assert!(BatchDispatcher::partition(&[], 10).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_merges_all_batches() {
        let dispatcher = BatchDispatcher::new(2);
        let batches = BatchDispatcher::partition(&entities(&["a", "b", "c"]), 1);

        let results = dispatcher
            .dispatch(batches, |batch| {
                async move {
                    let rows: BTreeMap<Entity, usize> = batch
                        .members
                        .into_iter()
                        .map(|e| {
                            let len = e.name().len();
                            (e, len)
                        })
                        .collect();
                    Ok(rows)
                }
                .boxed()
            })
            .await
            .unwrap();

        assert_eq!(results.rows.len(), 3);
        assert_eq!(results.batches.len(), 3);
    }

    #[tokio::test]
    async fn test_worker_error_aborts_dispatch() {
        let dispatcher = BatchDispatcher::new(4);
        let batches = BatchDispatcher::partition(&entities(&["a", "b", "c", "d"]), 1);

        let result = dispatcher
            .dispatch(batches, |batch| {
                async move {
                    if batch.index == 2 {
                        Err(DomainError::from(RemoteError::Unauthorized))
                    } else {
                        Ok(BTreeMap::<Entity, ()>::new())
                    }
                }
                .boxed()
            })
            .await;

        assert!(matches!(
            result,
            Err(DomainError::WorkerFailed {
                source: RemoteError::Unauthorized,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_worker_panic_aborts_dispatch() {
        let dispatcher = BatchDispatcher::new(1);
        let batches = BatchDispatcher::partition(&entities(&["a", "b"]), 1);

        let result = dispatcher
            .dispatch(batches, |batch| {
                async move {
                    assert!(batch.index != 0, "worker blew up");
                    Ok(BTreeMap::<Entity, ()>::new())
                }
                .boxed()
            })
            .await;

        assert!(matches!(result, Err(DomainError::WorkerPanicked(_))));
    }
}
