//! Single-writer collector for per-batch results.
//!
//! Workers send their rows over one `mpsc` channel; a dedicated task owns the
//! merged map and answers exactly once, when told every batch was dispatched.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AggregatedResults, BatchId, Entity};

/// Messages understood by the aggregator task.
#[derive(Debug)]
pub enum AggregatorMessage<T> {
    /// Rows produced by one batch worker.
    Batch {
        id: BatchId,
        index: usize,
        rows: BTreeMap<Entity, T>,
    },
    /// Every worker has finished; verify and hand back the merged rows.
    AllDispatched {
        expected: Vec<BatchId>,
        reply: oneshot::Sender<DomainResult<AggregatedResults<T>>>,
    },
}

/// Merge state, kept separate from the task so it can be driven directly.
#[derive(Debug)]
pub struct BatchCollector<T> {
    rows: BTreeMap<Entity, (usize, T)>,
    seen: HashSet<BatchId>,
    duplicate: Option<BatchId>,
}

impl<T> Default for BatchCollector<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            seen: HashSet::new(),
            duplicate: None,
        }
    }
}

impl<T> BatchCollector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch. When two batches report the same entity the lower
    /// batch index wins, whatever the arrival order.
    pub fn merge(&mut self, id: BatchId, index: usize, rows: BTreeMap<Entity, T>) {
        if !self.seen.insert(id) {
            warn!(batch = %id, "Batch reported more than once");
            self.duplicate.get_or_insert(id);
            return;
        }
        for (entity, value) in rows {
            match self.rows.entry(entity) {
                Entry::Vacant(slot) => {
                    slot.insert((index, value));
                }
                Entry::Occupied(mut slot) => {
                    if index < slot.get().0 {
                        slot.insert((index, value));
                    }
                }
            }
        }
    }

    /// Verify every expected batch reported exactly once.
    pub fn finish(self, expected: Vec<BatchId>) -> DomainResult<AggregatedResults<T>> {
        if let Some(id) = self.duplicate {
            return Err(DomainError::DuplicateBatch(id));
        }
        let missing: Vec<BatchId> = expected
            .iter()
            .filter(|id| !self.seen.contains(id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::MissingBatches(missing));
        }
        let expected_set: HashSet<&BatchId> = expected.iter().collect();
        let unexpected = self.seen.iter().filter(|id| !expected_set.contains(id)).count();
        if unexpected > 0 {
            warn!(unexpected, "Ignoring rows from batches that were not dispatched");
        }

        let rows = self
            .rows
            .into_iter()
            .map(|(entity, (_, value))| (entity, value))
            .collect();
        Ok(AggregatedResults::new(rows, expected))
    }
}

/// Handle to a running aggregator task.
pub struct ResultAggregator<T> {
    tx: mpsc::Sender<AggregatorMessage<T>>,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> ResultAggregator<T> {
    /// Start the collector task with a channel of `capacity` messages.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(rx));
        Self { tx, handle }
    }

    /// A sender for one worker.
    pub fn sender(&self) -> mpsc::Sender<AggregatorMessage<T>> {
        self.tx.clone()
    }

    /// Signal that every worker is done and wait for the merged result.
    pub async fn finish(self, expected: Vec<BatchId>) -> DomainResult<AggregatedResults<T>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(AggregatorMessage::AllDispatched { expected, reply })
            .await
            .map_err(|_| DomainError::WorkerPanicked("result aggregator stopped".to_string()))?;
        drop(self.tx);

        let result = response.await.map_err(|_| {
            DomainError::WorkerPanicked("result aggregator exited before replying".to_string())
        })?;
        if let Err(err) = self.handle.await {
            warn!(error = %err, "Result aggregator task did not shut down cleanly");
        }
        result
    }
}

async fn run<T>(mut rx: mpsc::Receiver<AggregatorMessage<T>>) {
    let mut collector = BatchCollector::new();
    while let Some(message) = rx.recv().await {
        match message {
            AggregatorMessage::Batch { id, index, rows } => {
                debug!(batch = %id, index, rows = rows.len(), "Batch received");
                collector.merge(id, index, rows);
            }
            AggregatorMessage::AllDispatched { expected, reply } => {
                // Receiver gone means the caller stopped waiting; nothing to do.
                let _ = reply.send(collector.finish(expected));
                return;
            }
        }
    }
}
