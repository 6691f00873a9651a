//! Domain layer for fleetmon
//!
//! Core models, errors and the ports the engine talks through.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, RemoteError};
