//! Infrastructure layer module
//!
//! Adapters behind the domain ports and the ambient stack:
//! - Monitoring bulk API client (session auth, timeout ladder, rate limit)
//! - Inventory search client
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod inventory;
pub mod logging;
pub mod monapi;
