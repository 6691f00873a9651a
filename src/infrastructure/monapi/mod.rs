//! Monitoring bulk-change API adapter

pub mod client;
pub mod rate_limiter;
pub mod session;
pub mod timeout;
pub mod types;

pub use client::{route, MonApiClient, BULK_PATH};
pub use rate_limiter::RequestLimiter;
pub use session::Session;
pub use timeout::TimeoutLadder;
pub use types::{BulkRequest, Envelope};
