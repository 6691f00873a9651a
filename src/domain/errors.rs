//! Domain errors for the fleetmon reconciliation engine.
//!
//! Only transport and authentication problems are errors. Entities that did
//! not converge are reported as [`Classification`](super::models::Classification)
//! data, never through these types.

use thiserror::Error;

use super::models::BatchId;

fn format_batch_ids(ids: &[BatchId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while talking to a remote collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection refused, DNS failure or any other transport-level failure.
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// The request did not complete within its read timeout.
    ///
    /// Raised per attempt with the timeout that was in force; the timeout
    /// ladder returns it unchanged once the ceiling is passed.
    #[error("Read timeout after {timeout_secs}s (ceiling {ceiling_secs}s)")]
    ReadTimeout { timeout_secs: u64, ceiling_secs: u64 },

    /// A single 401 from the remote side.
    #[error("Unauthorized")]
    Unauthorized,

    /// Re-authentication was attempted the maximum number of times.
    #[error("Authentication failed after {attempts} attempts")]
    AuthenticationFailed { attempts: u32 },

    /// Any other non-success HTTP status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded into the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether the error is a per-attempt read timeout.
    pub const fn is_read_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout { .. })
    }
}

/// Domain-level errors of a dispatch, query or reconciliation run.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Worker for batch {batch_id} failed: {source}")]
    WorkerFailed {
        batch_id: BatchId,
        #[source]
        source: RemoteError,
    },

    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Batch {0} was reported more than once")]
    DuplicateBatch(BatchId),

    #[error("Batches never reported: {}", format_batch_ids(.0))]
    MissingBatches(Vec<BatchId>),

    #[error("Pagination did not finish within {pages} pages")]
    PaginationRunaway { pages: u32 },

    #[error("Invalid change request: {0}")]
    InvalidChange(String),
}

impl DomainError {
    /// The remote error underneath, if the failure came from a collaborator.
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) | Self::WorkerFailed { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
