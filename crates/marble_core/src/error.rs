//! Error types for the simulation core.
//!
//! These cover construction and serialization failures only. Runtime
//! anomalies inside a tick (duplicate modules, full queues, malformed
//! commands) are non-fatal [`Fault`](crate::fault::Fault) records, not
//! errors; nothing inside a tick may halt it.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// The supplied configuration cannot produce a running simulation.
    /// The simulation either fully starts or fully fails to start.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Unknown part identifier.
    #[error("Unknown part ID: {0}")]
    UnknownPart(u32),

    /// Invalid simulation state for the requested operation.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
