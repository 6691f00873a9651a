use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::entity::Entity;

/// Opaque identifier of one dispatched batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A contiguous slice of the entity list handed to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: BatchId,
    /// Position of the batch in the partition, starting at 0.
    pub index: usize,
    pub members: Vec<Entity>,
}

impl Batch {
    pub fn new(index: usize, members: Vec<Entity>) -> Self {
        Self {
            id: BatchId::new(),
            index,
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Merged output of one dispatch: one row per entity and the batches
/// that contributed, in partition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedResults<T> {
    pub rows: BTreeMap<Entity, T>,
    pub batches: Vec<BatchId>,
}

impl<T> AggregatedResults<T> {
    pub const fn new(rows: BTreeMap<Entity, T>, batches: Vec<BatchId>) -> Self {
        Self { rows, batches }
    }

    pub fn into_rows(self) -> BTreeMap<Entity, T> {
        self.rows
    }
}

impl<T> Default for AggregatedResults<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            batches: Vec::new(),
        }
    }
}
